//! Musical attributes a variation may alter, and their sampling temperatures.
//!
//! The attribute order is fixed: index `i` of every flag list and
//! temperature list refers to `MusicalAttribute::ALL[i]`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// MusicalAttribute
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MusicalAttribute {
    Bar,
    Position,
    Instrument,
    Pitch,
    Duration,
    Velocity,
    TimeSignature,
    Tempo,
}

impl MusicalAttribute {
    /// Every attribute, in index order.
    pub const ALL: [MusicalAttribute; 8] = [
        MusicalAttribute::Bar,
        MusicalAttribute::Position,
        MusicalAttribute::Instrument,
        MusicalAttribute::Pitch,
        MusicalAttribute::Duration,
        MusicalAttribute::Velocity,
        MusicalAttribute::TimeSignature,
        MusicalAttribute::Tempo,
    ];

    /// Position of this attribute in the fixed order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name of the upload form field carrying this attribute's flag.
    pub fn form_field(self) -> &'static str {
        match self {
            MusicalAttribute::Bar => "bar",
            MusicalAttribute::Position => "position",
            MusicalAttribute::Instrument => "instrument",
            MusicalAttribute::Pitch => "pitch",
            MusicalAttribute::Duration => "duration",
            MusicalAttribute::Velocity => "velocity",
            MusicalAttribute::TimeSignature => "timesignature",
            MusicalAttribute::Tempo => "tempo",
        }
    }

    /// Temperature used when the request does not override it.
    pub fn default_temperature(self) -> f64 {
        match self {
            MusicalAttribute::Pitch | MusicalAttribute::Velocity => 3.0,
            _ => 1.0,
        }
    }

    /// Look up an attribute by its form field name.
    pub fn from_form_field(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.form_field() == name)
    }
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

/// Convert raw form flags into the set of attribute indices to vary.
///
/// Index `i` is included iff `flags[i]` is exactly `"true"`.
pub fn parse_attribute_flags<S: AsRef<str>>(flags: &[S]) -> BTreeSet<usize> {
    flags
        .iter()
        .enumerate()
        .filter(|(_, flag)| flag.as_ref() == "true")
        .map(|(i, _)| i)
        .collect()
}

// ---------------------------------------------------------------------------
// TemperatureMap
// ---------------------------------------------------------------------------

/// Per-attribute temperature scaling, keyed by attribute index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemperatureMap(BTreeMap<usize, f64>);

impl TemperatureMap {
    /// Defaults with positional overrides applied.
    ///
    /// `overrides[i]` replaces the temperature of `MusicalAttribute::ALL[i]`.
    /// Values must be finite and strictly positive.
    pub fn with_overrides(overrides: &[f64]) -> Result<Self, CoreError> {
        if overrides.len() > MusicalAttribute::ALL.len() {
            return Err(CoreError::Validation(format!(
                "At most {} temperatures may be given, got {}",
                MusicalAttribute::ALL.len(),
                overrides.len()
            )));
        }

        let mut map = Self::default();
        for (index, &value) in overrides.iter().enumerate() {
            if !value.is_finite() || value <= 0.0 {
                return Err(CoreError::Validation(format!(
                    "Temperature for {:?} must be a positive number, got {value}",
                    MusicalAttribute::ALL[index]
                )));
            }
            map.0.insert(index, value);
        }
        Ok(map)
    }

    pub fn get(&self, attribute: MusicalAttribute) -> f64 {
        self.0
            .get(&attribute.index())
            .copied()
            .unwrap_or_else(|| attribute.default_temperature())
    }

    pub fn as_map(&self) -> &BTreeMap<usize, f64> {
        &self.0
    }
}

impl Default for TemperatureMap {
    fn default() -> Self {
        Self(
            MusicalAttribute::ALL
                .into_iter()
                .map(|a| (a.index(), a.default_temperature()))
                .collect(),
        )
    }
}
