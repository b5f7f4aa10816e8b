use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype wrapper for narrative IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NarrativeId(pub u64);

impl fmt::Display for NarrativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "narrative-{}", self.0)
    }
}

/// Points at one segment of one narrative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentRef {
    pub narrative: NarrativeId,
    pub sequence_number: u64,
}

/// One generated unit of text. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub narrative: NarrativeId,
    pub content: String,
    pub sequence_number: u64,
    pub is_merged: bool,
    /// Set only when `is_merged`.
    pub merged_from: Option<SegmentRef>,
}

impl Segment {
    pub fn new(narrative: NarrativeId, sequence_number: u64, content: String) -> Self {
        Self {
            narrative,
            content,
            sequence_number,
            is_merged: false,
            merged_from: None,
        }
    }

    pub fn merged(
        narrative: NarrativeId,
        sequence_number: u64,
        content: String,
        merged_from: SegmentRef,
    ) -> Self {
        Self {
            narrative,
            content,
            sequence_number,
            is_merged: true,
            merged_from: Some(merged_from),
        }
    }

    pub fn reference(&self) -> SegmentRef {
        SegmentRef {
            narrative: self.narrative,
            sequence_number: self.sequence_number,
        }
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}
