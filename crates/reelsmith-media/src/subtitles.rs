//! Subtitle track and burn-in style compilation.
//!
//! Captions are written as SRT and rendered by libass through FFmpeg's
//! `subtitles` filter. The look is expressed as an ASS `force_style` string
//! laid out on a 1080x1920 reference frame.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::debug;

use reelsmith_models::caption::DEFAULT_FONT;
use reelsmith_models::encoding::{OUTPUT_HEIGHT, OUTPUT_WIDTH};
use reelsmith_models::{CaptionChunk, CaptionPosition, CaptionSettings};

use crate::error::{MediaError, MediaResult};

/// Smallest font size rendered, in reference-frame pixels.
pub const MIN_FONT_SIZE: u32 = 32;
/// Largest font size rendered, in reference-frame pixels.
pub const MAX_FONT_SIZE: u32 = 140;
/// Horizontal margin on both sides.
pub const HORIZONTAL_MARGIN: u32 = 60;
/// ASS numpad alignment: bottom-center. Shared by every position.
pub const ANCHOR_BOTTOM_CENTER: u8 = 2;

const ASS_BORDER_OUTLINE: u8 = 1;
const ASS_BORDER_BOX: u8 = 3;

/// Vertical margin from the bottom edge for each caption position.
pub fn position_margin(position: CaptionPosition) -> u32 {
    match position {
        CaptionPosition::Top => 1500,
        CaptionPosition::Center => 860,
        CaptionPosition::Bottom => 200,
    }
}

/// Convert `#RRGGBB` to libass `&HAABBGGRR`.
///
/// `alpha` is ASS transparency: `0x00` is opaque, `0xFF` fully transparent.
pub fn hex_to_ass_color(hex: &str, alpha: u8) -> MediaResult<String> {
    let digits = hex
        .strip_prefix('#')
        .filter(|d| d.len() == 6 && d.chars().all(|c| c.is_ascii_hexdigit()))
        .ok_or_else(|| MediaError::style(format!("invalid hex color {:?}, expected #RRGGBB", hex)))?;

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16)
            .map_err(|e| MediaError::style(format!("invalid hex color {:?}: {}", hex, e)))
    };
    let (r, g, b) = (channel(0..2)?, channel(2..4)?, channel(4..6)?);

    Ok(format!("&H{:02X}{:02X}{:02X}{:02X}", alpha, b, g, r))
}

/// ASS transparency byte for a fill opacity in `[0, 1]`.
pub fn opacity_to_alpha(opacity: f32) -> u8 {
    let opacity = if opacity.is_finite() { opacity.clamp(0.0, 1.0) } else { 1.0 };
    ((1.0 - opacity) * 255.0).round() as u8
}

/// Font size forced into the legible range.
pub fn clamp_font_size(size: u32) -> u32 {
    size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

/// Resolved burn-in style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStyle {
    pub font_name: String,
    pub font_size: u32,
    pub primary_colour: String,
    pub outline_colour: String,
    pub back_colour: String,
    pub bold: bool,
    pub outline: u32,
    pub shadow: u32,
    pub border_style: u8,
    pub alignment: u8,
    pub margin_l: u32,
    pub margin_r: u32,
    pub margin_v: u32,
}

impl CompiledStyle {
    /// Comma-separated `Key=Value` pairs for `force_style`.
    ///
    /// Key order is fixed so equal styles render byte-identical strings.
    pub fn to_force_style(&self) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            "PlayResX={},PlayResY={},Fontname={},Fontsize={},PrimaryColour={},OutlineColour={},BackColour={},Bold={},Outline={},Shadow={},BorderStyle={},Alignment={},MarginL={},MarginR={},MarginV={}",
            OUTPUT_WIDTH,
            OUTPUT_HEIGHT,
            self.font_name,
            self.font_size,
            self.primary_colour,
            self.outline_colour,
            self.back_colour,
            u8::from(self.bold),
            self.outline,
            self.shadow,
            self.border_style,
            self.alignment,
            self.margin_l,
            self.margin_r,
            self.margin_v,
        );
        out
    }
}

/// Compile caption settings into a burn-in style.
pub fn compile_style(settings: &CaptionSettings) -> MediaResult<CompiledStyle> {
    let primary_colour = hex_to_ass_color(&settings.font_color, 0)?;
    let outline_colour = hex_to_ass_color(&settings.stroke_color, 0)?;

    let (back_colour, border_style) = match &settings.background_color {
        Some(fill) => (
            hex_to_ass_color(fill, opacity_to_alpha(settings.background_opacity))?,
            ASS_BORDER_BOX,
        ),
        None => (hex_to_ass_color("#000000", 0)?, ASS_BORDER_OUTLINE),
    };

    // Font names end up inside a comma-separated list
    let font_name = settings.font.replace([',', '\''], " ").trim().to_string();
    let font_name = if font_name.is_empty() {
        DEFAULT_FONT.to_string()
    } else {
        font_name
    };

    let font_size = clamp_font_size(settings.font_size);
    if font_size != settings.font_size {
        debug!(
            requested = settings.font_size,
            used = font_size,
            "Clamped caption font size"
        );
    }

    Ok(CompiledStyle {
        font_name,
        font_size,
        primary_colour,
        outline_colour,
        back_colour,
        bold: true,
        outline: settings.stroke_width,
        shadow: 0,
        border_style,
        alignment: ANCHOR_BOTTOM_CENTER,
        margin_l: HORIZONTAL_MARGIN,
        margin_r: HORIZONTAL_MARGIN,
        margin_v: position_margin(settings.position),
    })
}

/// Format seconds as `HH:MM:SS,mmm`.
pub fn format_srt_timestamp(seconds: f64) -> String {
    let total_ms = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    };
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Render chunks as SRT text.
pub fn render_srt(chunks: &[CaptionChunk]) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let _ = writeln!(out, "{}", i + 1);
        let _ = writeln!(
            out,
            "{} --> {}",
            format_srt_timestamp(chunk.start),
            format_srt_timestamp(chunk.end)
        );
        let _ = writeln!(out, "{}", chunk.text);
        out.push('\n');
    }
    out
}

/// Write chunks to an SRT file.
pub async fn write_srt(chunks: &[CaptionChunk], path: &Path) -> MediaResult<()> {
    tokio::fs::write(path, render_srt(chunks)).await?;
    debug!(path = %path.display(), entries = chunks.len(), "Wrote subtitle track");
    Ok(())
}

/// Compiled subtitle artifacts ready for burn-in.
#[derive(Debug, Clone)]
pub struct SubtitleTrack {
    pub srt_path: PathBuf,
    pub style: CompiledStyle,
}

impl SubtitleTrack {
    /// FFmpeg `subtitles` filter burning this track in.
    pub fn filter(&self, fonts_dir: Option<&Path>) -> String {
        subtitles_filter(&self.srt_path, &self.style, fonts_dir)
    }
}

/// Write the SRT into `dir` and compile the style.
pub async fn compile_subtitles(
    settings: &CaptionSettings,
    chunks: &[CaptionChunk],
    dir: &Path,
) -> MediaResult<SubtitleTrack> {
    let style = compile_style(settings)?;
    let srt_path = dir.join("captions.srt");
    write_srt(chunks, &srt_path).await?;
    Ok(SubtitleTrack { srt_path, style })
}

/// Build the `subtitles=` filter expression.
pub fn subtitles_filter(srt_path: &Path, style: &CompiledStyle, fonts_dir: Option<&Path>) -> String {
    let mut filter = format!(
        "subtitles='{}':force_style='{}'",
        escape_filter_path(&srt_path.to_string_lossy()),
        style.to_force_style()
    );
    if let Some(dir) = fonts_dir {
        let _ = write!(filter, ":fontsdir='{}'", escape_filter_path(&dir.to_string_lossy()));
    }
    filter
}

fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "\\\\").replace('\'', "\\'").replace(':', "\\:")
}
