use async_trait::async_trait;
use nag_model::{QueueStatus, Snapshot, Uniqid};
use serde::Serialize;

use crate::{command::Command, error::ApiError};

/// Result of one control command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    /// One-shot notification queued (or suppressed by its rate limit).
    Notified {
        uniqid: Uniqid,
        rate_limited_until: Option<String>,
        warnings: Vec<String>,
    },
    /// Recurring notification registered.
    Registered {
        uniqid: Uniqid,
        warnings: Vec<String>,
    },
    QueueStatus {
        status: QueueStatus,
    },
    MuteStatus {
        muted: bool,
    },
    Acknowledged {
        uniqid: Uniqid,
        removed: bool,
    },
    Messages {
        why: String,
        messages: Snapshot,
    },
    /// A status report for this reason went out recently.
    Debounced {
        why: String,
        until: String,
    },
}

/// Compact daemon status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub queue_status: QueueStatus,
    pub muted: bool,
    pub running: Option<Uniqid>,
    pub pending: usize,
    pub nags: usize,
}

impl From<&Snapshot> for StatusSummary {
    fn from(s: &Snapshot) -> Self {
        Self {
            queue_status: s.queue_status,
            muted: s.muted,
            running: s.running.as_ref().map(|i| i.uniqid.clone()),
            pending: s.pending.len(),
            nags: s.nags.len(),
        }
    }
}

/// Notification control API handler.
///
/// This trait abstracts the backend implementation, allowing users to:
/// - Use the provided `NotifierAdapter`
/// - Implement custom handlers with additional logic (auth, auditing, etc.)
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Run one control command.
    async fn execute(&self, command: Command) -> Result<Reply, ApiError>;

    /// Full state, never debounced.
    async fn messages(&self) -> Result<Snapshot, ApiError>;

    async fn status(&self) -> Result<StatusSummary, ApiError> {
        Ok(StatusSummary::from(&self.messages().await?))
    }
}
