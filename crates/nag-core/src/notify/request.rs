use nag_model::{NagKind, Period, Uniqid, Until, Urgency};
use time::OffsetDateTime;

use crate::{queue::SubmitReceipt, uniqid::default_uniqid};

/// One notification as asked for by a client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotifyRequest {
    pub message: String,
    pub tags: Vec<String>,
    pub originated_from: Option<String>,
    /// Derived from the content when absent.
    pub uniqid: Option<Uniqid>,
    pub urgency: Urgency,
    /// Rate-limit period: at most one emission per window.
    pub once_per: Option<Period>,
}

impl NotifyRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_uniqid(mut self, uniqid: impl Into<Uniqid>) -> Self {
        self.uniqid = Some(uniqid.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.originated_from = Some(source.into());
        self
    }

    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    pub fn once_per(mut self, period: Period) -> Self {
        self.once_per = Some(period);
        self
    }

    /// Explicit uniqid, or one derived from message, tags and source.
    pub fn resolve_uniqid(&self) -> Uniqid {
        self.uniqid.clone().unwrap_or_else(|| {
            default_uniqid(&self.message, &self.tags, self.originated_from.as_deref())
        })
    }
}

/// When a recurring registration ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Until(Until),
    Times(u32),
}

impl Terminal {
    pub fn kind(&self) -> NagKind {
        match self {
            Terminal::Until(_) => NagKind::UntilDate,
            Terminal::Times(_) => NagKind::RemainCount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recurrence {
    pub terminal: Terminal,
    pub every: Period,
    pub request: NotifyRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitOutcome {
    Emitted {
        uniqid: Uniqid,
        receipt: SubmitReceipt,
    },
    /// Suppressed: a window for this uniqid is open until `until`.
    RateLimited {
        uniqid: Uniqid,
        until: OffsetDateTime,
    },
}

impl EmitOutcome {
    pub fn uniqid(&self) -> &str {
        match self {
            EmitOutcome::Emitted { uniqid, .. } | EmitOutcome::RateLimited { uniqid, .. } => uniqid,
        }
    }

    pub fn is_emitted(&self) -> bool {
        matches!(self, EmitOutcome::Emitted { .. })
    }
}
