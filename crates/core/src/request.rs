//! Construction of a [`VariationRequest`] from raw upload form fields.
//!
//! A request is built once per upload, never mutated afterwards, and is
//! the unit of work carried through the queue to a job executor.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::attributes::{parse_attribute_flags, TemperatureMap};
use crate::bars::{normalize_bar_ranges, pair_boundaries, BarSelection};
use crate::error::CoreError;
use crate::types::{DbId, SessionId};

// ---------------------------------------------------------------------------
// Limits and defaults
// ---------------------------------------------------------------------------

/// Upper bound on repetitions in a single batch.
pub const MAX_JOBS_PER_BATCH: u32 = 32;

/// Repetitions used when the form omits `jobs`.
pub const DEFAULT_JOBS: u32 = 1;

/// Alteration percentage used when the form omits it.
pub const DEFAULT_VARIATION_PERCENTAGE: u32 = 50;

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// How the generator picks tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStrategy {
    /// Deterministic most-likely choice.
    Argmax,
    /// Probabilistic draw.
    Multinomial,
}

impl SamplingStrategy {
    /// Bar-level granularity always samples multinomially.
    pub fn for_granularity(bar_level: bool) -> Self {
        if bar_level {
            SamplingStrategy::Multinomial
        } else {
            SamplingStrategy::Argmax
        }
    }
}

/// Parse a form boolean. Only the literal `"true"` is true; anything else,
/// including a missing field, is false.
pub fn parse_form_bool(raw: Option<&str>) -> bool {
    raw == Some("true")
}

// ---------------------------------------------------------------------------
// Raw form
// ---------------------------------------------------------------------------

/// Raw upload form fields, before validation.
#[derive(Debug, Clone, Default)]
pub struct VariationForm {
    /// Attribute inclusion flags in attribute order (`"true"` / `"false"`).
    pub attribute_flags: Vec<String>,
    /// Flat bar boundaries as submitted, two entries per range. Only
    /// parsed when the selection is restricted.
    pub bar_boundaries: Vec<String>,
    /// `"true"` selects the whole track and ignores `bar_boundaries`.
    pub entire_track: Option<String>,
    /// Positional temperature overrides.
    pub temperatures: Vec<f64>,
    pub jobs: Option<u32>,
    pub bar_level: Option<String>,
    pub new_notes: Option<String>,
    pub variation_amount: Option<u32>,
}

/// Request-scoped facts that do not come from the form itself.
#[derive(Debug, Clone)]
pub struct RequestOrigin {
    /// Where the uploaded input was persisted.
    pub input_path: PathBuf,
    /// Sanitised output filename stem.
    pub output_name: String,
    pub session_id: SessionId,
    pub user_id: DbId,
}

// ---------------------------------------------------------------------------
// VariationRequest
// ---------------------------------------------------------------------------

/// Validated, normalised parameters for one variation batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationRequest {
    pub input_path: PathBuf,
    pub output_name: String,
    /// Number of repetitions, `1..=MAX_JOBS_PER_BATCH`.
    pub jobs: u32,
    pub session_id: SessionId,
    pub user_id: DbId,
    /// Indices of the musical attributes allowed to vary.
    pub attributes: BTreeSet<usize>,
    pub temperatures: TemperatureMap,
    pub bars: BarSelection,
    /// Bar-level rather than note-level granularity.
    pub bar_level: bool,
    /// Whether new notes may be inserted.
    pub new_notes: bool,
    /// Share of the selected region that may be altered, `0..=100`.
    pub variation_percentage: u32,
}

impl VariationRequest {
    /// Validate and normalise raw form fields into a request.
    pub fn from_form(form: VariationForm, origin: RequestOrigin) -> Result<Self, CoreError> {
        let jobs = form.jobs.unwrap_or(DEFAULT_JOBS);
        validate_jobs(jobs)?;

        let variation_percentage = form
            .variation_amount
            .unwrap_or(DEFAULT_VARIATION_PERCENTAGE);
        validate_percentage(variation_percentage)?;

        let bars = if parse_form_bool(form.entire_track.as_deref()) {
            BarSelection::EntireTrack
        } else {
            bar_selection(&form.bar_boundaries)?
        };

        Ok(Self {
            input_path: origin.input_path,
            output_name: origin.output_name,
            jobs,
            session_id: origin.session_id,
            user_id: origin.user_id,
            attributes: parse_attribute_flags(&form.attribute_flags),
            temperatures: TemperatureMap::with_overrides(&form.temperatures)?,
            bars,
            bar_level: parse_form_bool(form.bar_level.as_deref()),
            new_notes: parse_form_bool(form.new_notes.as_deref()),
            variation_percentage,
        })
    }

    /// Sampling strategy implied by the granularity flag.
    pub fn sampling(&self) -> SamplingStrategy {
        SamplingStrategy::for_granularity(self.bar_level)
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Parse, pair and normalise boundaries for a restricted selection.
fn bar_selection(raw: &[String]) -> Result<BarSelection, CoreError> {
    let boundaries = parse_boundaries(raw)?;
    let ranges = pair_boundaries(&boundaries)?;
    if ranges.is_empty() {
        return Err(CoreError::Validation(
            "Select at least one bar range or choose the entire track".to_string(),
        ));
    }
    Ok(BarSelection::Ranges(normalize_bar_ranges(&ranges)))
}

fn parse_boundaries(raw: &[String]) -> Result<Vec<u32>, CoreError> {
    raw.iter()
        .map(|value| {
            value.trim().parse::<u32>().map_err(|_| {
                CoreError::Validation(format!("Invalid bar boundary '{value}'"))
            })
        })
        .collect()
}

pub fn validate_jobs(jobs: u32) -> Result<(), CoreError> {
    if (1..=MAX_JOBS_PER_BATCH).contains(&jobs) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "jobs must be between 1 and {MAX_JOBS_PER_BATCH}, got {jobs}"
        )))
    }
}

pub fn validate_percentage(percentage: u32) -> Result<(), CoreError> {
    if percentage <= 100 {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "variation amount must be between 0 and 100, got {percentage}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::bars::BarRange;

    fn origin() -> RequestOrigin {
        RequestOrigin {
            input_path: PathBuf::from("uploads/1/song.mid"),
            output_name: "song.mid".to_string(),
            session_id: SessionId::new("sid-1"),
            user_id: 1,
        }
    }

    fn form_with_bars(boundaries: &[u32]) -> VariationForm {
        VariationForm {
            attribute_flags: vec!["false".into(), "false".into(), "false".into(), "true".into()],
            bar_boundaries: boundaries.iter().map(u32::to_string).collect(),
            jobs: Some(2),
            ..Default::default()
        }
    }

    #[test]
    fn boundaries_are_paired_and_normalized() {
        let request = VariationRequest::from_form(form_with_bars(&[3, 5, 1, 2, 2, 4]), origin())
            .unwrap();
        assert_eq!(
            request.bars,
            BarSelection::Ranges(vec![BarRange::new(1, 5).unwrap()])
        );
        assert_eq!(request.attributes, BTreeSet::from([3]));
        assert_eq!(request.jobs, 2);
    }

    #[test]
    fn entire_track_ignores_boundaries() {
        let mut form = form_with_bars(&[9, 1, 7]);
        form.entire_track = Some("true".into());
        let request = VariationRequest::from_form(form, origin()).unwrap();
        assert_eq!(request.bars, BarSelection::EntireTrack);
    }

    #[test]
    fn entire_track_ignores_unparseable_boundaries() {
        let mut form = form_with_bars(&[]);
        form.bar_boundaries = vec!["".into(), "-1".into(), "abc".into()];
        form.entire_track = Some("true".into());
        let request = VariationRequest::from_form(form, origin()).unwrap();
        assert_eq!(request.bars, BarSelection::EntireTrack);
    }

    #[test]
    fn unparseable_boundary_is_rejected_for_restricted_selection() {
        let mut form = form_with_bars(&[]);
        form.bar_boundaries = vec!["1".into(), "-1".into()];
        assert_matches!(
            VariationRequest::from_form(form, origin()),
            Err(CoreError::Validation(msg)) if msg.contains("-1")
        );
    }

    #[test]
    fn boundaries_tolerate_surrounding_whitespace() {
        let mut form = form_with_bars(&[]);
        form.bar_boundaries = vec![" 2".into(), "4 ".into()];
        let request = VariationRequest::from_form(form, origin()).unwrap();
        assert_eq!(
            request.bars,
            BarSelection::Ranges(vec![BarRange::new(2, 4).unwrap()])
        );
    }

    #[test]
    fn restricted_selection_requires_ranges() {
        assert_matches!(
            VariationRequest::from_form(form_with_bars(&[]), origin()),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn odd_boundaries_are_rejected() {
        assert_matches!(
            VariationRequest::from_form(form_with_bars(&[1, 2, 3]), origin()),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn booleans_are_permissive() {
        let mut form = form_with_bars(&[1, 2]);
        form.bar_level = Some("TRUE".into());
        form.new_notes = Some("true".into());
        let request = VariationRequest::from_form(form, origin()).unwrap();
        assert!(!request.bar_level);
        assert!(request.new_notes);
        assert_eq!(request.sampling(), SamplingStrategy::Argmax);
    }

    #[test]
    fn bar_level_forces_multinomial_sampling() {
        let mut form = form_with_bars(&[1, 2]);
        form.bar_level = Some("true".into());
        let request = VariationRequest::from_form(form, origin()).unwrap();
        assert_eq!(request.sampling(), SamplingStrategy::Multinomial);
    }

    #[test]
    fn defaults_apply_when_fields_missing() {
        let mut form = form_with_bars(&[1, 2]);
        form.jobs = None;
        let request = VariationRequest::from_form(form, origin()).unwrap();
        assert_eq!(request.jobs, DEFAULT_JOBS);
        assert_eq!(request.variation_percentage, DEFAULT_VARIATION_PERCENTAGE);
        assert_eq!(request.temperatures, TemperatureMap::default());
    }

    #[test]
    fn job_count_is_bounded() {
        let mut form = form_with_bars(&[1, 2]);
        form.jobs = Some(0);
        assert_matches!(
            VariationRequest::from_form(form.clone(), origin()),
            Err(CoreError::Validation(_))
        );
        form.jobs = Some(MAX_JOBS_PER_BATCH + 1);
        assert_matches!(
            VariationRequest::from_form(form, origin()),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn percentage_above_hundred_is_rejected() {
        let mut form = form_with_bars(&[1, 2]);
        form.variation_amount = Some(101);
        assert_matches!(
            VariationRequest::from_form(form, origin()),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn request_round_trips_through_json() {
        let mut form = form_with_bars(&[1, 2, 6, 8]);
        form.temperatures = vec![0.5, 1.5];
        form.bar_level = Some("true".into());
        let request = VariationRequest::from_form(form, origin()).unwrap();

        let encoded = serde_json::to_string(&request).unwrap();
        let decoded: VariationRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, request);
    }
}
