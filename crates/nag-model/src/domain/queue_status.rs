use serde::{Deserialize, Serialize};

/// Outward status of the task queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    /// No run loop and no suspend request.
    Idle,
    /// The run loop is alive.
    Running,
    /// Suspended; pending entries wait for `resume` or `step`.
    Suspended,
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            QueueStatus::Idle => "idle",
            QueueStatus::Running => "running",
            QueueStatus::Suspended => "suspended",
        })
    }
}

/// Why a run loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoopEnd {
    NoMoreItems,
    Suspend,
    RunOnceFinished,
}

impl std::fmt::Display for LoopEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LoopEnd::NoMoreItems => "no-more-items",
            LoopEnd::Suspend => "suspend",
            LoopEnd::RunOnceFinished => "run-once-finished",
        })
    }
}
