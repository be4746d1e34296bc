use serde::{Deserialize, Serialize};

use crate::{NagKind, QueueStatus, TaskStatus, Uniqid};

/// One queued or running delivery, as reported outward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemView {
    pub uniqid: Uniqid,
    pub message: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub originated_from: Option<String>,
    pub status: TaskStatus,
}

/// One active recurring registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NagView {
    pub uniqid: Uniqid,
    pub nag_type: NagKind,
    /// RFC 3339 deadline, for `until_date` registrations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until_date: Option<String>,
    /// Fires left, for `remain_count` registrations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remain_count: Option<u32>,
    pub frequency_mins: u64,
    pub message: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub originated_from: Option<String>,
    /// Rate-limit period.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub once_per_n_mins: Option<u64>,
    /// RFC 3339 end of the currently open rate-limit window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitView {
    pub uniqid: Uniqid,
    pub until: String,
}

/// Point-in-time view of the whole daemon state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub queue_status: QueueStatus,
    pub muted: bool,
    pub running: Option<ItemView>,
    pub pending: Vec<ItemView>,
    pub nags: Vec<NagView>,
    pub rate_limits: Vec<RateLimitView>,
}
