use std::{str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ModelError;

const UNITS: &[(&str, u64)] = &[
    ("minutes", 1),
    ("minute", 1),
    ("mins", 1),
    ("min", 1),
    ("m", 1),
    ("hours", 60),
    ("hour", 60),
    ("hrs", 60),
    ("hr", 60),
    ("h", 60),
    ("days", 60 * 24),
    ("day", 60 * 24),
    ("d", 60 * 24),
];

/// A span of time with whole-minute resolution.
///
/// Accepted wire forms:
/// - a number of minutes (`15`, `2.5`)
/// - a string `"N unit"` (`"2 hours"`, `"30min"`, `"1.5 d"`)
/// - a pair `[N, "unit"]`
///
/// Fractions always round up to the next whole minute. Spans longer than
/// [`Period::MAX`] are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPeriod", into = "u64")]
pub struct Period {
    minutes: u64,
}

impl Period {
    /// Roughly a century.
    pub const MAX: Period = Period::minutes(100 * 366 * 24 * 60);

    pub const fn minutes(minutes: u64) -> Self {
        Self { minutes }
    }

    pub const fn as_minutes(&self) -> u64 {
        self.minutes
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.minutes.saturating_mul(60))
    }

    /// `t` shifted by this span; `None` past the last representable date.
    pub fn after(&self, t: OffsetDateTime) -> Option<OffsetDateTime> {
        let secs = i64::try_from(self.minutes).ok()?.checked_mul(60)?;
        t.checked_add(time::Duration::seconds(secs))
    }

    pub fn is_bounded(&self) -> bool {
        *self <= Self::MAX
    }

    pub fn is_zero(&self) -> bool {
        self.minutes == 0
    }

    fn from_amount(amount: f64, multiplier: u64, input: &str) -> Result<Self, ModelError> {
        let minutes = (amount * multiplier as f64).ceil();
        if !minutes.is_finite() || minutes < 0.0 || minutes > Self::MAX.minutes as f64 {
            return Err(ModelError::InvalidPeriod(input.to_string()));
        }
        Ok(Self {
            minutes: minutes as u64,
        })
    }

    fn with_unit(amount: f64, unit: &str, input: &str) -> Result<Self, ModelError> {
        let unit = unit.trim().to_ascii_lowercase();
        let multiplier = UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, m)| *m)
            .ok_or_else(|| ModelError::InvalidPeriod(input.to_string()))?;
        Self::from_amount(amount, multiplier, input)
    }
}

impl FromStr for Period {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase();
        let split = norm
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
            .unwrap_or(norm.len());
        let (number, unit) = norm.split_at(split);
        let amount: f64 = number
            .replace(',', "")
            .parse()
            .map_err(|_| ModelError::InvalidPeriod(s.to_string()))?;

        if unit.trim().is_empty() {
            return Err(ModelError::InvalidPeriod(s.to_string()));
        }
        Self::with_unit(amount, unit, s)
    }
}

impl From<Period> for u64 {
    fn from(p: Period) -> Self {
        p.minutes
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} min", self.minutes)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPeriod {
    Minutes(f64),
    Text(String),
    Pair(f64, String),
}

impl TryFrom<RawPeriod> for Period {
    type Error = ModelError;

    fn try_from(raw: RawPeriod) -> Result<Self, Self::Error> {
        match raw {
            RawPeriod::Minutes(n) => Period::from_amount(n, 1, &n.to_string()),
            RawPeriod::Text(s) => s.parse(),
            RawPeriod::Pair(n, unit) => Period::with_unit(n, &unit, &format!("[{n}, {unit}]")),
        }
    }
}
