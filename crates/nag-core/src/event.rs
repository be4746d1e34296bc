//! Events published by the queue and the notifier on broadcast channels.

use nag_model::{LoopEnd, NagKind, Uniqid};
use time::OffsetDateTime;

use crate::task::TaskRef;

#[derive(Debug, Clone)]
pub enum QueueEvent {
    Enqueued { task: TaskRef, priority: i64 },
    Dequeued { task: TaskRef },
    Started { task: TaskRef },
    Finished { task: TaskRef },
    /// Interrupted and put back with its original priority.
    Killed { task: TaskRef },
    Errored { task: TaskRef, reason: String },
    LoopStarted,
    LoopEnded { reason: LoopEnd },
}

impl QueueEvent {
    pub fn task(&self) -> Option<&TaskRef> {
        match self {
            QueueEvent::Enqueued { task, .. }
            | QueueEvent::Dequeued { task }
            | QueueEvent::Started { task }
            | QueueEvent::Finished { task }
            | QueueEvent::Killed { task }
            | QueueEvent::Errored { task, .. } => Some(task),
            QueueEvent::LoopStarted | QueueEvent::LoopEnded { .. } => None,
        }
    }
}

/// Why a recurring registration went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveReason {
    /// A new registration took over the same uniqid.
    Replaced,
    /// Removed on request.
    Acknowledged,
    /// The last counted fire happened.
    Depleted,
    /// The until-date passed.
    Expired,
}

impl RemoveReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoveReason::Replaced => "replaced",
            RemoveReason::Acknowledged => "acknowledged",
            RemoveReason::Depleted => "depleted",
            RemoveReason::Expired => "expired",
        }
    }
}

impl std::fmt::Display for RemoveReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum NagEvent {
    Registered { uniqid: Uniqid, kind: NagKind },
    Removed { uniqid: Uniqid, reason: RemoveReason },
    RateLimited { uniqid: Uniqid, until: OffsetDateTime },
    MuteChanged { muted: bool },
}
