use serde::{Deserialize, Serialize};

use crate::shayari::error::PipelineError;
use crate::shayari::model::SubtitleSegment;

/// Shortest recital that can still be captioned.
pub const MIN_AUDIO_SECONDS: f64 = 0.5;
/// Allowed slack between the last caption end and the recital end.
pub const COVERAGE_TOLERANCE_SECONDS: f64 = 0.05;

const MAX_PHRASE_WORDS: usize = 6;
const PHRASE_BREAK_SECONDS: f64 = 1.2;
const MIN_SEGMENT_SECONDS: f64 = 0.05;

/// A transcribed word and the moment it starts in the recital audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordStamp {
    pub word: String,
    pub start: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One caption per source line, keeping the source spelling.
    #[default]
    Line,
    /// Transcribed words grouped on pauses.
    Phrase,
}

/// Turn word timings into ordered, gap-free caption segments.
///
/// Each segment runs until the next one starts; the last runs to the end
/// of the audio.
pub fn build_segments(
    words: &[WordStamp],
    source_text: &str,
    audio_duration: f64,
    granularity: Granularity,
) -> Result<Vec<SubtitleSegment>, PipelineError> {
    if !audio_duration.is_finite() || audio_duration < MIN_AUDIO_SECONDS {
        return Err(PipelineError::Alignment(format!(
            "recital audio is {:.2}s, shorter than the {:.1}s minimum",
            audio_duration, MIN_AUDIO_SECONDS
        )));
    }

    let words = clean_words(words, audio_duration);
    if words.is_empty() {
        return Err(PipelineError::Alignment(
            "no spoken words were detected in the recital audio".to_string(),
        ));
    }

    let starts: Vec<(f64, String)> = match granularity {
        Granularity::Line => line_starts(&words, source_text),
        Granularity::Phrase => phrase_starts(&words),
    };

    let mut merged: Vec<(f64, String)> = Vec::with_capacity(starts.len());
    for (start, text) in starts {
        match merged.last_mut() {
            Some((prev_start, prev_text)) if start - *prev_start < MIN_SEGMENT_SECONDS => {
                prev_text.push(' ');
                prev_text.push_str(&text);
            }
            _ => merged.push((start, text)),
        }
    }

    let mut segments = Vec::with_capacity(merged.len());
    for (i, (start, text)) in merged.iter().enumerate() {
        let end = merged
            .get(i + 1)
            .map(|(next, _)| *next)
            .unwrap_or(audio_duration);
        segments.push(SubtitleSegment {
            start_seconds: *start,
            end_seconds: end,
            text: text.clone(),
        });
    }

    validate_segments(&segments, audio_duration)?;
    Ok(segments)
}

/// Sort by start, drop unusable stamps and anything past the end of the audio.
fn clean_words(words: &[WordStamp], audio_duration: f64) -> Vec<WordStamp> {
    let max_start = audio_duration - MIN_SEGMENT_SECONDS;
    let mut cleaned: Vec<WordStamp> = words
        .iter()
        .filter(|w| !w.word.trim().is_empty())
        .filter(|w| w.start.is_finite() && w.start >= 0.0 && w.start < max_start)
        .map(|w| WordStamp {
            word: w.word.trim().to_string(),
            start: w.start,
        })
        .collect();
    cleaned.sort_by(|a, b| a.start.total_cmp(&b.start));
    cleaned
}

fn phrase_starts(words: &[WordStamp]) -> Vec<(f64, String)> {
    let mut phrases: Vec<(f64, Vec<&str>)> = Vec::new();
    let mut last_start: Option<f64> = None;

    for word in words {
        let flush = match (phrases.last(), last_start) {
            (Some((_, cluster)), Some(prev)) => {
                word.start - prev > PHRASE_BREAK_SECONDS || cluster.len() >= MAX_PHRASE_WORDS
            }
            _ => true,
        };
        if flush {
            phrases.push((word.start, vec![word.word.as_str()]));
        } else if let Some((_, cluster)) = phrases.last_mut() {
            cluster.push(word.word.as_str());
        }
        last_start = Some(word.start);
    }

    phrases
        .into_iter()
        .map(|(start, cluster)| (start, cluster.join(" ")))
        .collect()
}

/// Map each source line onto the transcribed word where it should begin,
/// in proportion to its position in the source text.
fn line_starts(words: &[WordStamp], source_text: &str) -> Vec<(f64, String)> {
    let lines: Vec<&str> = source_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return phrase_starts(words);
    }

    let line_word_counts: Vec<usize> = lines
        .iter()
        .map(|l| l.split_whitespace().count().max(1))
        .collect();
    let total_source_words: usize = line_word_counts.iter().sum();
    let spoken = words.len();

    let mut result = Vec::with_capacity(lines.len());
    let mut offset = 0usize;
    for (line, count) in lines.iter().zip(line_word_counts) {
        let index = (offset * spoken / total_source_words).min(spoken - 1);
        result.push((words[index].start, (*line).to_string()));
        offset += count;
    }
    result
}

/// Ordered, non-overlapping, strictly positive spans ending at the audio end.
pub fn validate_segments(
    segments: &[SubtitleSegment],
    audio_duration: f64,
) -> Result<(), PipelineError> {
    let Some(last) = segments.last() else {
        return Err(PipelineError::Alignment("no caption segments".to_string()));
    };
    for pair in segments.windows(2) {
        if pair[1].start_seconds < pair[0].end_seconds - 1e-9 {
            return Err(PipelineError::Alignment(format!(
                "caption at {:.2}s overlaps the previous one ending at {:.2}s",
                pair[1].start_seconds, pair[0].end_seconds
            )));
        }
    }
    if let Some(bad) = segments.iter().find(|s| s.end_seconds <= s.start_seconds) {
        return Err(PipelineError::Alignment(format!(
            "caption {:?} has an empty span",
            bad.text
        )));
    }
    if (last.end_seconds - audio_duration).abs() > COVERAGE_TOLERANCE_SECONDS {
        return Err(PipelineError::Alignment(format!(
            "captions end at {:.2}s but the recital lasts {:.2}s",
            last.end_seconds, audio_duration
        )));
    }
    Ok(())
}
