//! Character alignment to word timing extraction.
//!
//! The synthesis service reports one start/end offset per character. Words
//! are recovered by splitting on whitespace characters: a word starts at its
//! first character's start and ends at its last character's end.

use reelsmith_models::{CharacterAlignment, WordTiming};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Group a per-character alignment into ordered word timings.
pub fn extract_word_timings(alignment: &CharacterAlignment) -> MediaResult<Vec<WordTiming>> {
    if !alignment.is_consistent() {
        return Err(MediaError::alignment(format!(
            "array lengths differ: {} characters, {} start times, {} end times",
            alignment.characters.len(),
            alignment.char_start.len(),
            alignment.char_end.len()
        )));
    }

    let mut words = Vec::new();
    let mut buffer = WordBuffer::default();

    for (i, ch) in alignment.characters.iter().enumerate() {
        let (start, end) = (alignment.char_start[i], alignment.char_end[i]);
        if !start.is_finite() || !end.is_finite() {
            return Err(MediaError::alignment(format!(
                "non-finite timing at character {}",
                i
            )));
        }

        if !ch.is_empty() && ch.chars().all(char::is_whitespace) {
            buffer.flush_into(&mut words)?;
        } else {
            buffer.push(ch, start, end);
        }
    }
    // Trailing word without terminating whitespace
    buffer.flush_into(&mut words)?;

    Ok(words)
}

#[derive(Default)]
struct WordBuffer {
    text: String,
    start: Option<f64>,
    end: f64,
}

impl WordBuffer {
    fn push(&mut self, ch: &str, start: f64, end: f64) {
        if ch.is_empty() {
            return;
        }
        if self.start.is_none() {
            self.start = Some(start);
        }
        self.text.push_str(ch);
        self.end = end;
    }

    fn flush_into(&mut self, words: &mut Vec<WordTiming>) -> MediaResult<()> {
        let buffer = std::mem::take(self);
        let Some(start) = buffer.start else {
            return Ok(());
        };
        let word = buffer.text.trim();
        if word.is_empty() {
            return Ok(());
        }

        if let Some(prev) = words.last_mut() {
            if start < prev.start {
                return Err(MediaError::alignment(format!(
                    "word {:?} starts at {:.3}s, before previous word {:?} at {:.3}s",
                    word, start, prev.word, prev.start
                )));
            }
            // Neighbouring words must not overlap on screen
            if start < prev.end {
                debug!(
                    word = %prev.word,
                    end = prev.end,
                    next_start = start,
                    "Trimming overlapping word end"
                );
                prev.end = start;
            }
        }

        words.push(WordTiming::new(word, start, buffer.end.max(start)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Evenly spaced characters, 0.1s each.
    fn uniform(text: &str) -> CharacterAlignment {
        let n = text.chars().count();
        let starts = (0..n).map(|i| i as f64 * 0.1).collect();
        let ends = (0..n).map(|i| (i + 1) as f64 * 0.1).collect();
        CharacterAlignment::from_text(text, starts, ends)
    }

    #[test]
    fn test_two_words() {
        let words = extract_word_timings(&uniform("hi there")).unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].word, "hi");
        assert_eq!(words[1].word, "there");
        assert!((words[0].start - 0.0).abs() < 1e-9);
        assert!((words[0].end - 0.2).abs() < 1e-9);
        assert!((words[1].start - 0.3).abs() < 1e-9);
        assert!((words[1].end - 0.8).abs() < 1e-9);
        assert!(words[0].end < words[1].start);
    }

    #[test]
    fn test_contiguous_characters_share_boundary() {
        // No pause between "hi" and "there": the space has zero width
        let alignment = CharacterAlignment::from_text(
            "hi there",
            vec![0.0, 0.1, 0.2, 0.2, 0.3, 0.4, 0.5, 0.6],
            vec![0.1, 0.2, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7],
        );
        let words = extract_word_timings(&alignment).unwrap();
        assert_eq!(words.len(), 2);
        assert!((words[0].end - 0.2).abs() < 1e-9);
        assert!((words[1].start - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_and_trailing_whitespace() {
        let words = extract_word_timings(&uniform("  one  two \n")).unwrap();
        let text: Vec<_> = words.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(text, vec!["one", "two"]);
    }

    #[test]
    fn test_empty_alignment() {
        let words = extract_word_timings(&CharacterAlignment::default()).unwrap();
        assert!(words.is_empty());
    }

    #[test]
    fn test_length_mismatch_is_parse_error() {
        let alignment = CharacterAlignment::from_text("abc", vec![0.0, 0.1, 0.2], vec![0.1]);
        let err = extract_word_timings(&alignment).unwrap_err();
        assert!(matches!(err, MediaError::AlignmentParse(_)));
    }

    #[test]
    fn test_non_finite_time_is_parse_error() {
        let alignment = CharacterAlignment::from_text("ab", vec![0.0, f64::NAN], vec![0.1, 0.2]);
        assert!(extract_word_timings(&alignment).is_err());
    }

    #[test]
    fn test_decreasing_word_start_is_parse_error() {
        let alignment = CharacterAlignment::from_text(
            "a b",
            vec![1.0, 1.1, 0.5],
            vec![1.1, 1.2, 0.6],
        );
        assert!(extract_word_timings(&alignment).is_err());
    }

    #[test]
    fn test_overlapping_words_are_trimmed() {
        let alignment = CharacterAlignment::from_text(
            "ab cd",
            vec![0.0, 0.5, 0.9, 0.15, 0.3],
            vec![0.5, 0.9, 0.9, 0.2, 0.4],
        );
        let words = extract_word_timings(&alignment).unwrap();
        assert_eq!(words.len(), 2);
        assert!((words[0].end - 0.15).abs() < 1e-9);
        assert!((words[1].start - 0.15).abs() < 1e-9);
        assert!((words[1].end - 0.4).abs() < 1e-9);
        assert_eq!(reelsmith_models::find_timing_violation(&words), None);
    }

    #[test]
    fn test_multi_codepoint_entries() {
        let alignment = CharacterAlignment {
            characters: vec!["ca".into(), "fé".into(), " ".into(), "ok".into()],
            char_start: vec![0.0, 0.2, 0.4, 0.5],
            char_end: vec![0.2, 0.4, 0.5, 0.7],
        };
        let words = extract_word_timings(&alignment).unwrap();
        assert_eq!(words[0].word, "café");
        assert_eq!(words[1].word, "ok");
    }
}
