use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use nag_core::{Clock, EmitOutcome, Notifier, SystemClock};
use nag_model::{QueueStatus, Snapshot, Until};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::{
    command::{Command, NotifyCommand, Plan, Then},
    error::ApiError,
    handler::{ApiHandler, Reply},
};

/// Cooldown between status reports for the same reason.
pub const STATUS_DEBOUNCE: Duration = Duration::from_secs(5 * 60);

const QUERY_REASON: &str = "request-received";

/// Adapter that bridges [`Notifier`] to [`ApiHandler`].
pub struct NotifierAdapter {
    notifier: Notifier,
    debounce: Debounce,
}

impl NotifierAdapter {
    pub fn new(notifier: Notifier) -> Self {
        Self::with_clock(notifier, Arc::new(SystemClock))
    }

    pub fn with_clock(notifier: Notifier, clock: Arc<dyn Clock>) -> Self {
        Self {
            notifier,
            debounce: Debounce::new(STATUS_DEBOUNCE, clock),
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    async fn notify(&self, cmd: NotifyCommand) -> Result<Reply, ApiError> {
        let plan = cmd.plan()?;
        let mut warnings = Vec::new();
        if plan != Plan::Once && cmd.outpaces_rate_limit() {
            warnings.push("frequency is below once_per; some repeats will be rate-limited".to_string());
        }

        let request = cmd.request();
        let (uniqid, rate_limited_until) = match plan {
            Plan::Once => match self.notifier.emit_once(request).await? {
                EmitOutcome::Emitted { uniqid, .. } => (uniqid, None),
                EmitOutcome::RateLimited { uniqid, until } => {
                    (uniqid, Some(Until::at(until).to_rfc3339()))
                }
            },
            Plan::Until { until, every } => {
                (self.notifier.notify_until(until, every, request).await?, None)
            }
            Plan::For { lasting, every } => {
                (self.notifier.notify_for(lasting, every, request).await?, None)
            }
            Plan::Times { times, every } => {
                (self.notifier.notify_times(times, every, request).await?, None)
            }
        };

        if let Some(w) = cmd.then.and_then(|then| self.then(then)) {
            warnings.push(w);
        }

        Ok(match plan {
            Plan::Once => Reply::Notified {
                uniqid,
                rate_limited_until,
                warnings,
            },
            _ => Reply::Registered { uniqid, warnings },
        })
    }

    /// Post-enqueue action; only meaningful while suspended.
    fn then(&self, then: Then) -> Option<String> {
        let status = self.notifier.queue_status();
        if status != QueueStatus::Suspended {
            warn!(target: "nag.api", ?then, %status, "post-enqueue action skipped: queue is not suspended");
            return Some(format!("queue is {status}, ignoring then: {}", then.as_str()));
        }
        match then {
            Then::Resume => {
                info!(target: "nag.api", "resume after enqueue");
                self.notifier.resume();
            }
            Then::Step => {
                info!(target: "nag.api", "step after enqueue");
                let notifier = self.notifier.clone();
                tokio::spawn(async move {
                    if let Err(e) = notifier.step().await {
                        warn!(target: "nag.api", error = %e, "step after enqueue failed");
                    }
                });
            }
        }
        None
    }
}

#[async_trait]
impl ApiHandler for NotifierAdapter {
    async fn execute(&self, command: Command) -> Result<Reply, ApiError> {
        debug!(target: "nag.api", command = command.name(), "command received");
        match command {
            Command::Notify(cmd) => self.notify(cmd).await,
            Command::Suspend { kill } => {
                info!(target: "nag.api", kill, "suspend job queue");
                self.notifier.suspend(kill).await?;
                Ok(Reply::QueueStatus {
                    status: self.notifier.queue_status(),
                })
            }
            Command::Resume => {
                info!(target: "nag.api", "resume job queue");
                self.notifier.resume();
                Ok(Reply::QueueStatus {
                    status: self.notifier.queue_status(),
                })
            }
            Command::Step => {
                info!(target: "nag.api", "step job queue");
                self.notifier.step().await?;
                Ok(Reply::QueueStatus {
                    status: self.notifier.queue_status(),
                })
            }
            Command::Mute => {
                self.notifier.mute();
                Ok(Reply::MuteStatus { muted: true })
            }
            Command::Unmute => {
                self.notifier.unmute();
                Ok(Reply::MuteStatus { muted: false })
            }
            Command::Acknowledge { uniqid } => {
                info!(target: "nag.api", %uniqid, "acknowledge");
                let removed = self.notifier.remove(&uniqid);
                Ok(Reply::Acknowledged { uniqid, removed })
            }
            Command::QueryMessages => match self.debounce.check(QUERY_REASON) {
                Ok(()) => Ok(Reply::Messages {
                    why: QUERY_REASON.to_string(),
                    messages: self.notifier.snapshot(),
                }),
                Err(until) => {
                    debug!(target: "nag.api", why = QUERY_REASON, "status report debounced");
                    Ok(Reply::Debounced {
                        why: QUERY_REASON.to_string(),
                        until: Until::at(until).to_rfc3339(),
                    })
                }
            },
        }
    }

    async fn messages(&self) -> Result<Snapshot, ApiError> {
        Ok(self.notifier.snapshot())
    }
}

/// Per-reason cooldown.
struct Debounce {
    period: Duration,
    clock: Arc<dyn Clock>,
    until: Mutex<HashMap<String, OffsetDateTime>>,
}

impl Debounce {
    fn new(period: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            period,
            clock,
            until: Mutex::new(HashMap::new()),
        }
    }

    /// `Err(until)` while cooling down; otherwise starts a new cooldown.
    fn check(&self, why: &str) -> Result<(), OffsetDateTime> {
        let now = self.clock.now();
        let mut until = self.until.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(&end) = until.get(why).filter(|&&end| now <= end) {
            return Err(end);
        }
        until.insert(why.to_string(), now + self.period);
        Ok(())
    }
}
