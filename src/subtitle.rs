use serde::{Deserialize, Serialize};

/// One transcribed span in the source language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Transcribed text
    pub text: String,
}

impl SubtitleSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Times are finite, non-negative and ordered
    pub fn is_well_formed(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start >= 0.0 && self.end >= self.start
    }
}

/// A segment paired with its translation.
///
/// The translation field keeps the `chinese` key used by existing sidecar
/// documents and players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BilingualSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(rename = "chinese")]
    pub translation: String,
}

impl BilingualSegment {
    pub fn new(segment: SubtitleSegment, translation: String) -> Self {
        Self {
            start: segment.start,
            end: segment.end,
            text: segment.text,
            translation,
        }
    }
}

/// Total duration covered by a set of segments (0 when empty)
pub fn total_duration(segments: &[BilingualSegment]) -> f64 {
    segments.iter().map(|s| s.end).fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_segments() {
        assert!(SubtitleSegment::new(0.0, 1.5, "hello").is_well_formed());
        assert!(SubtitleSegment::new(2.0, 2.0, "instant").is_well_formed());
        assert!(!SubtitleSegment::new(-1.0, 1.0, "negative").is_well_formed());
        assert!(!SubtitleSegment::new(3.0, 2.0, "reversed").is_well_formed());
        assert!(!SubtitleSegment::new(0.0, f64::NAN, "nan").is_well_formed());
    }

    #[test]
    fn test_total_duration() {
        assert_eq!(total_duration(&[]), 0.0);

        let segments = vec![
            BilingualSegment::new(SubtitleSegment::new(0.0, 4.0, "a"), "甲".to_string()),
            BilingualSegment::new(SubtitleSegment::new(4.0, 9.25, "b"), "乙".to_string()),
            BilingualSegment::new(SubtitleSegment::new(1.0, 2.0, "c"), "丙".to_string()),
        ];
        assert_eq!(total_duration(&segments), 9.25);
    }

    #[test]
    fn test_bilingual_serializes_chinese_key() {
        let segment = BilingualSegment::new(SubtitleSegment::new(0.0, 1.0, "hi"), "你好".to_string());
        let json = serde_json::to_value(&segment).unwrap();
        assert_eq!(json["chinese"], "你好");
        assert_eq!(json["text"], "hi");
    }
}
