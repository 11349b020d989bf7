//! Speech-alignment payload returned by the synthesis service.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Per-character alignment as parallel arrays.
///
/// The arrays come straight off the wire and carry no guaranteed invariants;
/// the media crate validates their lengths before extracting word timings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CharacterAlignment {
    pub characters: Vec<String>,

    #[serde(rename = "character_start_times_seconds", alias = "char_start")]
    pub char_start: Vec<f64>,

    #[serde(rename = "character_end_times_seconds", alias = "char_end")]
    pub char_end: Vec<f64>,
}

impl CharacterAlignment {
    /// Build an alignment from a string with one timing pair per character.
    pub fn from_text(text: &str, starts: Vec<f64>, ends: Vec<f64>) -> Self {
        Self {
            characters: text.chars().map(|c| c.to_string()).collect(),
            char_start: starts,
            char_end: ends,
        }
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Whether all three arrays have the same length.
    pub fn is_consistent(&self) -> bool {
        self.characters.len() == self.char_start.len()
            && self.characters.len() == self.char_end.len()
    }
}
