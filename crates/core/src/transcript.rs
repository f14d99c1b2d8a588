//! Transcript rendering.
//!
//! Speech models tend to emit the same line several times over adjacent
//! windows. Consecutive segments with identical text collapse into one segment
//! spanning all of them before the transcript is rendered.

use serde::{Deserialize, Serialize};

/// One timed piece of recognized speech, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Merge runs of consecutive segments that carry the same text.
pub fn merge_repeated(segments: impl IntoIterator<Item = Segment>) -> Vec<Segment> {
    let mut merged: Vec<Segment> = Vec::new();
    for segment in segments {
        match merged.last_mut() {
            Some(last) if last.text == segment.text => last.end = segment.end,
            _ => merged.push(segment),
        }
    }
    merged
}

/// Text produced by the transform step.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript(String);

impl Transcript {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Render as `start-end: text` lines, one per merged segment.
    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Self {
        let lines: Vec<String> = merge_repeated(segments)
            .iter()
            .map(|s| format!("{:.2}-{:.2}: {}", s.start, s.end, s.text))
            .collect();
        Self(lines.join("\n"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Transcript {
    fn from(value: String) -> Self {
        Self(value)
    }
}
