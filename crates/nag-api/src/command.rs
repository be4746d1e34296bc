//! Control commands and their payload formats.

use nag_core::NotifyRequest;
use nag_model::{Period, Until, Urgency};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Notify(NotifyCommand),
    Suspend { kill: bool },
    Resume,
    Step,
    Mute,
    Unmute,
    Acknowledge { uniqid: String },
    QueryMessages,
}

impl Command {
    /// Parse a command by name (`notify`, `suspend`, `ack`, ...) and its raw body.
    pub fn parse(name: &str, body: &str) -> Result<Self, ApiError> {
        match name {
            "notify" => NotifyCommand::parse(body).map(Command::Notify),
            "suspend" => Ok(Command::Suspend {
                kill: parse_suspend(body),
            }),
            "resume" => Ok(Command::Resume),
            "step" => Ok(Command::Step),
            "mute" => Ok(Command::Mute),
            "unmute" => Ok(Command::Unmute),
            "ack" | "acknowledge" => parse_ack(body).map(|uniqid| Command::Acknowledge { uniqid }),
            "query_messages" => Ok(Command::QueryMessages),
            other => Err(ApiError::UnknownCommand(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Notify(_) => "notify",
            Command::Suspend { .. } => "suspend",
            Command::Resume => "resume",
            Command::Step => "step",
            Command::Mute => "mute",
            Command::Unmute => "unmute",
            Command::Acknowledge { .. } => "acknowledge",
            Command::QueryMessages => "query_messages",
        }
    }
}

/// `{"kill": true}`; anything unparsable means a plain suspend.
fn parse_suspend(body: &str) -> bool {
    #[derive(Deserialize)]
    struct SuspendBody {
        #[serde(default)]
        kill: bool,
    }
    serde_json::from_str::<SuspendBody>(body)
        .map(|b| b.kill)
        .unwrap_or(false)
}

/// `{"uniqid": "..."}` or the raw uniqid.
fn parse_ack(body: &str) -> Result<String, ApiError> {
    #[derive(Deserialize)]
    struct AckBody {
        uniqid: Option<String>,
    }
    let uniqid = match serde_json::from_str::<AckBody>(body) {
        Ok(parsed) => parsed.uniqid.unwrap_or_default(),
        Err(_) => body.trim().to_string(),
    };
    if uniqid.trim().is_empty() {
        return Err(ApiError::InvalidRequest("empty uniqid".into()));
    }
    Ok(uniqid)
}

/// What to do with a suspended queue once the notification is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Then {
    Resume,
    Step,
}

impl Then {
    pub fn as_str(&self) -> &'static str {
        match self {
            Then::Resume => "resume",
            Then::Step => "step",
        }
    }
}

/// A `notify` command.
///
/// Either JSON, or plain text where `#words` become tags.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NotifyCommand {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub originated_from: Option<String>,
    #[serde(default)]
    pub uniqid: Option<String>,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub until: Option<Until>,
    #[serde(default, rename = "for")]
    pub lasting: Option<Period>,
    #[serde(default)]
    pub times: Option<f64>,
    #[serde(default)]
    pub frequency: Option<Period>,
    #[serde(default)]
    pub once_per: Option<Period>,
    #[serde(default)]
    pub then: Option<Then>,
}

/// How a notify command is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Once,
    Until { until: Until, every: Period },
    For { lasting: Period, every: Period },
    Times { times: u32, every: Period },
}

impl NotifyCommand {
    pub fn parse(body: &str) -> Result<Self, ApiError> {
        let trimmed = body.trim();
        if trimmed.starts_with('{') {
            return serde_json::from_str(trimmed)
                .map_err(|e| ApiError::InvalidRequest(format!("notify payload: {e}")));
        }
        Ok(Self::plain(trimmed))
    }

    /// `"Dryer finished #home #plugin:speak"`
    pub fn plain(text: &str) -> Self {
        let (tags, words): (Vec<&str>, Vec<&str>) = text
            .split_whitespace()
            .partition(|w| w.len() > 1 && w.starts_with('#'));
        Self {
            message: words.join(" "),
            tags: tags.iter().map(|t| t[1..].to_string()).collect(),
            ..Self::default()
        }
    }

    /// Recurrence to use. The first of `until`, `for`, `times` present wins.
    pub fn plan(&self) -> Result<Plan, ApiError> {
        if self.until.is_none() && self.lasting.is_none() && self.times.is_none() {
            return Ok(Plan::Once);
        }
        let every = self
            .frequency
            .ok_or_else(|| ApiError::InvalidRequest("frequency is required for recurring notifications".into()))?;

        if let Some(until) = self.until {
            return Ok(Plan::Until { until, every });
        }
        if let Some(lasting) = self.lasting {
            if lasting.is_zero() {
                return Err(ApiError::InvalidRequest("invalid .for value".into()));
            }
            return Ok(Plan::For { lasting, every });
        }
        match self.times {
            Some(t) if t.is_finite() && t >= 0.0 => Ok(Plan::Times {
                times: t.ceil().min(f64::from(u32::MAX)) as u32,
                every,
            }),
            _ => Err(ApiError::InvalidRequest("invalid .times value".into())),
        }
    }

    /// The frequency is shorter than the rate limit.
    pub fn outpaces_rate_limit(&self) -> bool {
        matches!((self.frequency, self.once_per), (Some(f), Some(limit)) if f < limit)
    }

    pub fn request(&self) -> NotifyRequest {
        NotifyRequest {
            message: self.message.clone(),
            tags: self.tags.clone(),
            originated_from: self.originated_from.clone(),
            uniqid: self.uniqid.clone().filter(|u| !u.is_empty()),
            urgency: self.urgency,
            once_per: self.once_per,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_extracts_tags() {
        let cmd = NotifyCommand::parse("Dryer finished #home  #plugin:speak now").unwrap();
        assert_eq!(cmd.message, "Dryer finished now");
        assert_eq!(cmd.tags, vec!["home", "plugin:speak"]);
        assert_eq!(cmd.plan().unwrap(), Plan::Once);
    }

    #[test]
    fn lone_hash_stays_in_message() {
        let cmd = NotifyCommand::plain("call # 5");
        assert_eq!(cmd.message, "call # 5");
        assert!(cmd.tags.is_empty());
    }

    #[test]
    fn json_recurrence_with_units() {
        let cmd = NotifyCommand::parse(
            r#"{"message":"water","uniqid":"w","for":"2 hours","frequency":[30,"min"],"once_per":45,"urgency":2}"#,
        )
        .unwrap();
        assert_eq!(
            cmd.plan().unwrap(),
            Plan::For {
                lasting: Period::minutes(120),
                every: Period::minutes(30)
            }
        );
        assert_eq!(cmd.urgency, Urgency::Ahead(2));
        assert!(cmd.outpaces_rate_limit());

        let req = cmd.request();
        assert_eq!(req.uniqid.as_deref(), Some("w"));
        assert_eq!(req.once_per, Some(Period::minutes(45)));
    }

    #[test]
    fn until_takes_precedence_and_times_are_rounded_up() {
        let cmd = NotifyCommand::parse(
            r#"{"message":"m","until":1893553445000,"times":3,"frequency":"1 h"}"#,
        )
        .unwrap();
        assert!(matches!(cmd.plan().unwrap(), Plan::Until { .. }));

        let cmd = NotifyCommand::parse(r#"{"message":"m","times":2.2,"frequency":5}"#).unwrap();
        assert_eq!(
            cmd.plan().unwrap(),
            Plan::Times {
                times: 3,
                every: Period::minutes(5)
            }
        );
    }

    #[test]
    fn recurrence_needs_frequency() {
        let cmd = NotifyCommand::parse(r#"{"message":"m","times":2}"#).unwrap();
        assert!(matches!(cmd.plan(), Err(ApiError::InvalidRequest(_))));
    }

    #[test]
    fn bad_json_is_rejected() {
        assert!(matches!(
            NotifyCommand::parse(r#"{"message": "m", "until": "not a date"}"#),
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[test]
    fn ack_accepts_json_or_raw() {
        assert_eq!(
            Command::parse("ack", r#"{"uniqid":"abc"}"#).unwrap(),
            Command::Acknowledge {
                uniqid: "abc".into()
            }
        );
        assert_eq!(
            Command::parse("acknowledge", " abc ").unwrap(),
            Command::Acknowledge {
                uniqid: "abc".into()
            }
        );
        assert!(matches!(
            Command::parse("ack", "  "),
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(matches!(
            Command::parse("ack", "{}"),
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[test]
    fn suspend_kill_flag_is_optional() {
        assert_eq!(
            Command::parse("suspend", r#"{"kill":true}"#).unwrap(),
            Command::Suspend { kill: true }
        );
        assert_eq!(
            Command::parse("suspend", "").unwrap(),
            Command::Suspend { kill: false }
        );
    }

    #[test]
    fn unknown_command() {
        assert!(matches!(
            Command::parse("reboot", ""),
            Err(ApiError::UnknownCommand(_))
        ));
    }
}
