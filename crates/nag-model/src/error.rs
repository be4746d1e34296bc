use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid period: {0} (expected minutes, \"N unit\" or [N, \"unit\"])")]
    InvalidPeriod(String),
    #[error("invalid until date: {0} (expected RFC 3339 or epoch millis)")]
    InvalidUntil(String),
    #[error("invalid urgency: {0} (expected bool or integer)")]
    InvalidUrgency(String),
}
