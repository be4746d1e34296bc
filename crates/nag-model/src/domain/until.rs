use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::ModelError;

/// Absolute wall-clock deadline of an `until`-style recurrence.
///
/// Wire forms: an RFC 3339 string or epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawUntil", into = "String")]
pub struct Until(OffsetDateTime);

impl Until {
    pub fn at(ts: OffsetDateTime) -> Self {
        Self(ts)
    }

    pub fn from_epoch_millis(ms: i64) -> Result<Self, ModelError> {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
            .map(Self)
            .map_err(|_| ModelError::InvalidUntil(ms.to_string()))
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        self.0
    }

    /// `true` once `now` has reached the deadline.
    pub fn has_passed(&self, now: OffsetDateTime) -> bool {
        now >= self.0
    }

    pub fn to_rfc3339(&self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.0.unix_timestamp().to_string())
    }
}

impl FromStr for Until {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OffsetDateTime::parse(s.trim(), &Rfc3339)
            .map(Self)
            .map_err(|_| ModelError::InvalidUntil(s.to_string()))
    }
}

impl From<Until> for String {
    fn from(u: Until) -> Self {
        u.to_rfc3339()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUntil {
    Millis(i64),
    Text(String),
}

impl TryFrom<RawUntil> for Until {
    type Error = ModelError;

    fn try_from(raw: RawUntil) -> Result<Self, Self::Error> {
        match raw {
            RawUntil::Millis(ms) => Until::from_epoch_millis(ms),
            RawUntil::Text(s) => s.parse(),
        }
    }
}
