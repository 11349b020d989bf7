//! Caption timing and caption style definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default font family for burned-in captions.
pub const DEFAULT_FONT: &str = "Arial";
/// Default caption font size (pixels in the 1080x1920 reference frame).
pub const DEFAULT_FONT_SIZE: u32 = 72;
/// Default caption fill color.
pub const DEFAULT_FONT_COLOR: &str = "#FFFFFF";
/// Default caption outline color.
pub const DEFAULT_STROKE_COLOR: &str = "#000000";
/// Default caption outline width.
pub const DEFAULT_STROKE_WIDTH: u32 = 4;
/// Default opacity of the optional background box.
pub const DEFAULT_BACKGROUND_OPACITY: f32 = 0.5;

/// A single spoken word with its start/end offsets in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WordTiming {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

impl WordTiming {
    pub fn new(word: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            word: word.into(),
            start,
            end,
        }
    }
}

/// First violation of word timing order in `words`, if any.
///
/// Every word must have finite, non-negative offsets with `start <= end`, and
/// must not start before the previous word ends.
pub fn find_timing_violation(words: &[WordTiming]) -> Option<String> {
    let mut prev: Option<&WordTiming> = None;
    for (i, word) in words.iter().enumerate() {
        if !word.start.is_finite() || !word.end.is_finite() {
            return Some(format!("word {} ({:?}) has a non-finite offset", i, word.word));
        }
        if word.start < 0.0 || word.start > word.end {
            return Some(format!(
                "word {} ({:?}) spans {:.3}s..{:.3}s",
                i, word.word, word.start, word.end
            ));
        }
        if let Some(prev) = prev {
            if word.start < prev.end {
                return Some(format!(
                    "word {} ({:?}) starts at {:.3}s, before {:?} ends at {:.3}s",
                    i, word.word, word.start, prev.word, prev.end
                ));
            }
        }
        prev = Some(word);
    }
    None
}

/// A span of on-screen caption text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionChunk {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl CaptionChunk {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

/// Vertical placement of captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionPosition {
    Top,
    #[default]
    Center,
    Bottom,
}

impl CaptionPosition {
    pub const ALL: &'static [CaptionPosition] = &[
        CaptionPosition::Top,
        CaptionPosition::Center,
        CaptionPosition::Bottom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionPosition::Top => "top",
            CaptionPosition::Center => "center",
            CaptionPosition::Bottom => "bottom",
        }
    }
}

impl fmt::Display for CaptionPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How caption text appears over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionAnimation {
    /// Chunks of `words_per_chunk` words.
    #[default]
    None,
    /// One word on screen at a time.
    WordByWord,
}

/// User-facing caption style configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionSettings {
    #[serde(default = "default_font")]
    pub font: String,

    /// Requested size; clamped into a legible range by the style compiler.
    #[serde(default = "default_font_size")]
    pub font_size: u32,

    /// `#RRGGBB`
    #[serde(default = "default_font_color")]
    pub font_color: String,

    /// `#RRGGBB`
    #[serde(default = "default_stroke_color")]
    pub stroke_color: String,

    #[serde(default = "default_stroke_width")]
    pub stroke_width: u32,

    #[serde(default)]
    pub position: CaptionPosition,

    #[serde(default)]
    pub animation: CaptionAnimation,

    /// Optional translucent box behind the text (`#RRGGBB`).
    #[serde(default)]
    pub background_color: Option<String>,

    /// Opacity of the background box (0.0 - 1.0).
    #[serde(default = "default_background_opacity")]
    pub background_opacity: f32,
}

fn default_font() -> String {
    DEFAULT_FONT.to_string()
}
fn default_font_size() -> u32 {
    DEFAULT_FONT_SIZE
}
fn default_font_color() -> String {
    DEFAULT_FONT_COLOR.to_string()
}
fn default_stroke_color() -> String {
    DEFAULT_STROKE_COLOR.to_string()
}
fn default_stroke_width() -> u32 {
    DEFAULT_STROKE_WIDTH
}
fn default_background_opacity() -> f32 {
    DEFAULT_BACKGROUND_OPACITY
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            font: DEFAULT_FONT.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            font_color: DEFAULT_FONT_COLOR.to_string(),
            stroke_color: DEFAULT_STROKE_COLOR.to_string(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            position: CaptionPosition::default(),
            animation: CaptionAnimation::default(),
            background_color: None,
            background_opacity: DEFAULT_BACKGROUND_OPACITY,
        }
    }
}

impl CaptionSettings {
    pub fn with_position(mut self, position: CaptionPosition) -> Self {
        self.position = position;
        self
    }

    pub fn with_colors(mut self, font: impl Into<String>, stroke: impl Into<String>) -> Self {
        self.font_color = font.into();
        self.stroke_color = stroke.into();
        self
    }

    pub fn with_background(mut self, color: impl Into<String>, opacity: f32) -> Self {
        self.background_color = Some(color.into());
        self.background_opacity = opacity.clamp(0.0, 1.0);
        self
    }

    /// Check every color field, returning the name of the first malformed one.
    pub fn invalid_color(&self) -> Option<(&'static str, &str)> {
        if !is_hex_color(&self.font_color) {
            return Some(("font_color", &self.font_color));
        }
        if !is_hex_color(&self.stroke_color) {
            return Some(("stroke_color", &self.stroke_color));
        }
        match self.background_color.as_deref() {
            Some(bg) if !is_hex_color(bg) => Some(("background_color", bg)),
            _ => None,
        }
    }
}

/// Whether `s` is a `#RRGGBB` hex color.
pub fn is_hex_color(s: &str) -> bool {
    match s.strip_prefix('#') {
        Some(hex) => hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color_validation() {
        assert!(is_hex_color("#FFFFFF"));
        assert!(is_hex_color("#00ff7a"));
        assert!(!is_hex_color("FFFFFF"));
        assert!(!is_hex_color("#FFF"));
        assert!(!is_hex_color("#GGGGGG"));
        assert!(!is_hex_color("#FFFFFF00"));
    }

    #[test]
    fn test_settings_defaults_from_empty_json() {
        let settings: CaptionSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, CaptionSettings::default());
        assert_eq!(settings.position, CaptionPosition::Center);
        assert!(settings.invalid_color().is_none());
    }

    #[test]
    fn test_invalid_color_reports_field() {
        let settings = CaptionSettings::default().with_colors("#FFFFFF", "black");
        assert_eq!(settings.invalid_color(), Some(("stroke_color", "black")));

        let settings = CaptionSettings::default().with_background("#12", 0.4);
        assert_eq!(settings.invalid_color().map(|(f, _)| f), Some("background_color"));
    }

    #[test]
    fn test_timing_violations() {
        let ordered = vec![
            WordTiming::new("a", 0.0, 0.4),
            WordTiming::new("b", 0.4, 0.9),
            WordTiming::new("c", 1.2, 1.5),
        ];
        assert_eq!(find_timing_violation(&ordered), None);
        assert_eq!(find_timing_violation(&[]), None);

        let overlapping = vec![
            WordTiming::new("a", 0.0, 2.0),
            WordTiming::new("b", 0.5, 2.5),
        ];
        assert!(find_timing_violation(&overlapping).unwrap().contains("word 1"));

        let reversed = vec![WordTiming::new("a", 1.0, 0.5)];
        assert!(find_timing_violation(&reversed).is_some());

        let non_finite = vec![WordTiming::new("a", 0.0, f64::INFINITY)];
        assert!(find_timing_violation(&non_finite).is_some());
    }

    #[test]
    fn test_animation_serde() {
        let json = serde_json::to_string(&CaptionAnimation::WordByWord).unwrap();
        assert_eq!(json, "\"word_by_word\"");
    }
}
