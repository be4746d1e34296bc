use serde::{Deserialize, Serialize};

/// Execution state of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting in the queue (or never started).
    #[default]
    Idle,
    /// Delivery in progress.
    Executing,
    /// A kill was requested and the cancel hook has not finished.
    Killing,
    /// The cancel hook finished; the task is about to be re-queued.
    Killed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Idle => "idle",
            TaskStatus::Executing => "executing",
            TaskStatus::Killing => "killing",
            TaskStatus::Killed => "killed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
