use serde::{Deserialize, Serialize};

/// Terminal condition of a recurring registration.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NagKind {
    /// Keeps firing until a wall-clock date has passed.
    UntilDate,
    /// Keeps firing until a fixed number of fires is used up.
    RemainCount,
}

impl NagKind {
    /// Returns a short symbolic identifier, used in logs and status reports:
    /// - `"until_date"`
    /// - `"remain_count"`
    pub fn kind(&self) -> &'static str {
        match self {
            NagKind::UntilDate => "until_date",
            NagKind::RemainCount => "remain_count",
        }
    }
}

impl std::fmt::Display for NagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}
