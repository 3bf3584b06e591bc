//! Parameters of a single generation call and its result.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;
use varia_core::attributes::TemperatureMap;
use varia_core::bars::BarRange;
use varia_core::request::{SamplingStrategy, VariationRequest};

/// Each repetition of a batch asks the model for exactly one variation.
pub const VARIATIONS_PER_CALL: u32 = 1;

/// What one repetition asks of the generator, borrowed from the request.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationParams<'a> {
    pub input_path: &'a Path,
    pub n_var: u32,
    pub attributes: &'a BTreeSet<usize>,
    pub temperatures: &'a TemperatureMap,
    /// `None` places no bar restriction on the variation.
    pub bars: Option<&'a [BarRange]>,
    pub bar_level: bool,
    pub sampling: SamplingStrategy,
    pub new_notes: bool,
    pub variation_percentage: u32,
}

impl<'a> GenerationParams<'a> {
    pub fn for_repetition(request: &'a VariationRequest) -> Self {
        Self {
            input_path: &request.input_path,
            n_var: VARIATIONS_PER_CALL,
            attributes: &request.attributes,
            temperatures: &request.temperatures,
            bars: request.bars.ranges(),
            bar_level: request.bar_level,
            sampling: request.sampling(),
            new_notes: request.new_notes,
            variation_percentage: request.variation_percentage,
        }
    }
}

/// Encoded output track returned by the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedVariation {
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use varia_core::request::{RequestOrigin, VariationForm};
    use varia_core::types::SessionId;

    use super::*;

    fn request(form: VariationForm) -> VariationRequest {
        VariationRequest::from_form(
            form,
            RequestOrigin {
                input_path: PathBuf::from("uploads/5/song.mid"),
                output_name: "song.mid".into(),
                session_id: SessionId::new("sid"),
                user_id: 5,
            },
        )
        .unwrap()
    }

    #[test]
    fn entire_track_sends_null_bars() {
        let request = request(VariationForm {
            attribute_flags: vec!["false".into(), "true".into()],
            entire_track: Some("true".into()),
            ..Default::default()
        });
        let json = serde_json::to_value(GenerationParams::for_repetition(&request)).unwrap();

        assert!(json["bars"].is_null());
        assert_eq!(json["n_var"], 1);
        assert_eq!(json["attributes"], serde_json::json!([1]));
        assert_eq!(json["sampling"], "argmax");
        assert_eq!(json["input_path"], "uploads/5/song.mid");
        assert_eq!(json["temperatures"]["3"], 3.0);
    }

    #[test]
    fn bar_level_request_sends_ranges_and_multinomial() {
        let request = request(VariationForm {
            bar_boundaries: ["4", "6", "1", "2"].map(String::from).to_vec(),
            bar_level: Some("true".into()),
            variation_amount: Some(80),
            ..Default::default()
        });
        let json = serde_json::to_value(GenerationParams::for_repetition(&request)).unwrap();

        assert_eq!(
            json["bars"],
            serde_json::json!([{"start": 1, "end": 2}, {"start": 4, "end": 6}])
        );
        assert_eq!(json["sampling"], "multinomial");
        assert_eq!(json["bar_level"], true);
        assert_eq!(json["variation_percentage"], 80);
    }
}
