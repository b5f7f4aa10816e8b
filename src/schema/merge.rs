use serde::{Deserialize, Serialize};
use std::fmt;

use super::segment::{NarrativeId, Segment};

/// Newtype wrapper for merge request IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MergeRequestId(pub u64);

impl fmt::Display for MergeRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "merge-{}", self.0)
    }
}

/// Lifecycle of a merge request. Every state other than `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl MergeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// The target's answer to a merge request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeDecision {
    Accept,
    Reject,
}

impl MergeDecision {
    pub fn status(&self) -> MergeStatus {
        match self {
            Self::Accept => MergeStatus::Accepted,
            Self::Reject => MergeStatus::Rejected,
        }
    }
}

/// A request to fuse the source narrative's latest segment into the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub id: MergeRequestId,
    pub source: NarrativeId,
    pub target: NarrativeId,
    /// The source's latest segment at request time.
    pub source_segment: Segment,
    pub status: MergeStatus,
}

impl MergeRequest {
    pub fn is_pending(&self) -> bool {
        self.status == MergeStatus::Pending
    }
}
