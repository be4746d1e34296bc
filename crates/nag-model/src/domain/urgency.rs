use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Where a submission lands in the queue.
///
/// On the wire this is `false` (append), `true` (preempt) or an integer N
/// (overtake N entries).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawUrgency", into = "RawUrgency")]
pub enum Urgency {
    /// Append behind everything already pending.
    #[default]
    Normal,
    /// Cut the line by N sequence positions.
    Ahead(i64),
    /// Go to the front and interrupt the running task.
    Preempt,
}

impl Urgency {
    pub fn is_preempt(&self) -> bool {
        matches!(self, Urgency::Preempt)
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawUrgency {
    Flag(bool),
    Steps(i64),
    Fractional(f64),
}

impl TryFrom<RawUrgency> for Urgency {
    type Error = ModelError;

    fn try_from(raw: RawUrgency) -> Result<Self, Self::Error> {
        match raw {
            RawUrgency::Flag(true) => Ok(Urgency::Preempt),
            RawUrgency::Flag(false) => Ok(Urgency::Normal),
            RawUrgency::Steps(n) => Ok(Urgency::Ahead(n)),
            RawUrgency::Fractional(f) if f.is_finite() => Ok(Urgency::Ahead(f.ceil() as i64)),
            RawUrgency::Fractional(f) => Err(ModelError::InvalidUrgency(f.to_string())),
        }
    }
}

impl From<Urgency> for RawUrgency {
    fn from(u: Urgency) -> Self {
        match u {
            Urgency::Normal => RawUrgency::Flag(false),
            Urgency::Preempt => RawUrgency::Flag(true),
            Urgency::Ahead(n) => RawUrgency::Steps(n),
        }
    }
}
