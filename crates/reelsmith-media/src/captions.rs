//! Caption chunk building.
//!
//! Two strategies:
//! - timing-driven: fixed-size groups of word timings (preferred)
//! - line-estimated: script lines timed from an assumed speaking rate

use tracing::debug;

use reelsmith_models::{CaptionAnimation, CaptionChunk, CaptionSource, CaptionSettings, WordTiming};

use crate::alignment::extract_word_timings;
use crate::error::MediaResult;

/// Assumed speaking rate for script lines without timing.
pub const DEFAULT_WORDS_PER_MINUTE: f64 = 150.0;
/// Gap inserted between consecutive estimated lines.
pub const LINE_GAP_SECS: f64 = 0.1;

/// Partition word timings into chunks of `words_per_chunk` words.
///
/// Each chunk starts at its first word's start and ends at its last word's
/// end; the final chunk may hold fewer words.
pub fn chunk_word_timings(words: &[WordTiming], words_per_chunk: usize) -> Vec<CaptionChunk> {
    let size = words_per_chunk.max(1);
    let words: Vec<&WordTiming> = words.iter().filter(|w| !w.word.trim().is_empty()).collect();

    words
        .chunks(size)
        .filter_map(|group| {
            let first = group.first()?;
            let last = group.last()?;
            let text = group
                .iter()
                .map(|w| w.word.trim())
                .collect::<Vec<_>>()
                .join(" ");
            Some(CaptionChunk::new(text, first.start, last.end))
        })
        .collect()
}

/// Time script lines back-to-back from zero at `words_per_minute`.
pub fn estimate_line_chunks(lines: &[String], words_per_minute: f64) -> Vec<CaptionChunk> {
    let rate = if words_per_minute > 0.0 {
        words_per_minute
    } else {
        DEFAULT_WORDS_PER_MINUTE
    };
    let seconds_per_word = 60.0 / rate;

    let mut chunks = Vec::new();
    let mut cursor = 0.0;

    for line in lines {
        let text = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            continue;
        }
        let word_count = text.split(' ').count() as f64;
        let end = cursor + word_count * seconds_per_word;
        chunks.push(CaptionChunk::new(text, cursor, end));
        cursor = end + LINE_GAP_SECS;
    }

    chunks
}

/// Keep chunks inside `[0, total]`: later chunks are dropped, overhanging ends cut.
pub fn clamp_to_duration(chunks: Vec<CaptionChunk>, total: f64) -> Vec<CaptionChunk> {
    chunks
        .into_iter()
        .filter(|c| c.start < total)
        .map(|mut c| {
            c.end = c.end.min(total);
            c
        })
        .collect()
}

/// Build the caption chunks for a composition.
///
/// Alignment payloads are converted to word timings first; `WordByWord`
/// animation forces one word per chunk.
pub fn build_caption_chunks(
    source: &CaptionSource,
    settings: &CaptionSettings,
    words_per_chunk: usize,
    total_duration: f64,
) -> MediaResult<Vec<CaptionChunk>> {
    let words_per_chunk = match settings.animation {
        CaptionAnimation::WordByWord => 1,
        CaptionAnimation::None => words_per_chunk,
    };

    let chunks = match source {
        CaptionSource::None => Vec::new(),
        CaptionSource::WordTimings { words } => chunk_word_timings(words, words_per_chunk),
        CaptionSource::Alignment { alignment } => {
            let words = extract_word_timings(alignment)?;
            debug!(words = words.len(), "Extracted word timings from alignment");
            chunk_word_timings(&words, words_per_chunk)
        }
        CaptionSource::Script { lines } => estimate_line_chunks(lines, DEFAULT_WORDS_PER_MINUTE),
    };

    Ok(clamp_to_duration(chunks, total_duration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelsmith_models::CharacterAlignment;

    fn words(n: usize, spacing: f64) -> Vec<WordTiming> {
        (0..n)
            .map(|i| {
                let start = i as f64 * spacing;
                WordTiming::new(format!("w{}", i), start, start + spacing * 0.8)
            })
            .collect()
    }

    #[test]
    fn test_chunk_count_is_ceil() {
        for n in 1..=12 {
            for k in 1..=5 {
                let chunks = chunk_word_timings(&words(n, 0.5), k);
                assert_eq!(chunks.len(), (n + k - 1) / k, "n={} k={}", n, k);
            }
        }
    }

    #[test]
    fn test_chunk_bounds_match_words() {
        let input = words(7, 0.5);
        let chunks = chunk_word_timings(&input, 3);

        assert_eq!(chunks[0].text, "w0 w1 w2");
        assert_eq!(chunks[0].start, input[0].start);
        assert_eq!(chunks[0].end, input[2].end);
        assert_eq!(chunks[2].text, "w6");
        assert_eq!(chunks[2].start, input[6].start);
        assert_eq!(chunks[2].end, input[6].end);

        for pair in chunks.windows(2) {
            assert!(pair[0].end <= pair[1].start);
            assert!(pair[0].start < pair[1].start);
        }
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let input = words(9, 0.3);
        assert_eq!(chunk_word_timings(&input, 2), chunk_word_timings(&input, 2));
    }

    #[test]
    fn test_zero_chunk_size_means_one() {
        assert_eq!(chunk_word_timings(&words(3, 0.5), 0).len(), 3);
    }

    #[test]
    fn test_line_estimation() {
        let lines = vec![
            "one two three".to_string(),
            "   ".to_string(),
            "four five".to_string(),
        ];
        let chunks = estimate_line_chunks(&lines, 150.0);

        assert_eq!(chunks.len(), 2);
        // 150 wpm = 0.4s per word
        assert!((chunks[0].start - 0.0).abs() < 1e-9);
        assert!((chunks[0].end - 1.2).abs() < 1e-9);
        assert!((chunks[1].start - 1.3).abs() < 1e-9);
        assert!((chunks[1].end - 2.1).abs() < 1e-9);
    }

    #[test]
    fn test_clamp_to_duration() {
        let chunks = vec![
            CaptionChunk::new("a", 0.0, 1.0),
            CaptionChunk::new("b", 1.5, 3.0),
            CaptionChunk::new("c", 3.0, 4.0),
        ];
        let clamped = clamp_to_duration(chunks, 2.5);
        assert_eq!(clamped.len(), 2);
        assert!((clamped[1].end - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_end_to_end_twenty_words() {
        // 20 words across a 12.4s voice track
        let input: Vec<WordTiming> = (0..20)
            .map(|i| {
                let start = 0.2 + i as f64 * 0.6;
                WordTiming::new(format!("word{}", i), start, start + 0.5)
            })
            .collect();
        let source = CaptionSource::WordTimings { words: input.clone() };

        let chunks =
            build_caption_chunks(&source, &CaptionSettings::default(), 2, 12.4).unwrap();

        assert_eq!(chunks.len(), 10);
        let last = chunks.last().unwrap();
        assert!((last.end - input[19].end).abs() < 1e-9);
        assert!(last.end <= 12.4);
    }

    #[test]
    fn test_word_by_word_animation() {
        let source = CaptionSource::WordTimings { words: words(4, 0.5) };
        let settings = CaptionSettings {
            animation: CaptionAnimation::WordByWord,
            ..Default::default()
        };
        let chunks = build_caption_chunks(&source, &settings, 3, 10.0).unwrap();
        assert_eq!(chunks.len(), 4);
    }

    #[test]
    fn test_alignment_source() {
        let text = "hi there friend";
        let n = text.chars().count();
        let alignment = CharacterAlignment::from_text(
            text,
            (0..n).map(|i| i as f64 * 0.1).collect(),
            (0..n).map(|i| (i + 1) as f64 * 0.1).collect(),
        );
        let chunks = build_caption_chunks(
            &CaptionSource::Alignment { alignment },
            &CaptionSettings::default(),
            2,
            10.0,
        )
        .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "hi there");
        assert_eq!(chunks[1].text, "friend");
    }

    #[test]
    fn test_no_captions() {
        let chunks =
            build_caption_chunks(&CaptionSource::None, &CaptionSettings::default(), 2, 5.0).unwrap();
        assert!(chunks.is_empty());
    }
}
