use nag_core::DeliveryError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("missing program")]
    MissingProgram,
    #[error("empty shell script")]
    EmptyScript,
    #[error("duplicate backend name: {0}")]
    DuplicateBackend(String),
    #[error("non-zero exit code: {code}")]
    NonZeroExit { code: i32 },
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("killed by signal")]
    KilledBySignal,
    #[error("io error: {0}")]
    Io(String),
}

pub type ExecResult<T> = Result<T, ExecError>;

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::Io(e.to_string())
    }
}

impl From<ExecError> for DeliveryError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::NonZeroExit { code } => DeliveryError::NonZeroExit { code },
            ExecError::Spawn(reason) => DeliveryError::Spawn(reason),
            ExecError::KilledBySignal => DeliveryError::KilledBySignal,
            ExecError::Io(reason) => DeliveryError::Io(reason),
            other => DeliveryError::Failed(other.to_string()),
        }
    }
}
