use nag_model::TaskId;
use thiserror::Error;

/// Failure reported by a delivery backend or its cancel hook.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("delivery failed: {0}")]
    Failed(String),
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("non-zero exit code: {code}")]
    NonZeroExit { code: i32 },
    #[error("terminated by signal")]
    KilledBySignal,
    #[error("io error: {0}")]
    Io(String),
    #[error("cancelled")]
    Cancelled,
    #[error("no delivery backend selected for message {0}")]
    NoBackend(String),
    #[error("cancel hook failed: {0}")]
    Cancel(String),
}

impl From<std::io::Error> for DeliveryError {
    fn from(e: std::io::Error) -> Self {
        DeliveryError::Io(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("not suspended (or nothing pending)")]
    NotSuspended,
    #[error("failed to kill task {task}: {source}")]
    Kill {
        task: TaskId,
        #[source]
        source: DeliveryError,
    },
    #[error("suspend aborted: queue resumed before the run loop drained")]
    SuspendAborted,
    #[error("run loop terminated abnormally: {0}")]
    LoopAborted(String),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("invalid recurrence: {0}")]
    InvalidRecurrence(String),
    #[error("failed to build delivery task: {0}")]
    Delivery(#[from] DeliveryError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}
