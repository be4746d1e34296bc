use nag_core::{NagEvent, QueueEvent, TaskRef};
use tracing::{debug, error, info, trace, warn};

pub trait View {
    fn as_task(&self) -> &str;
    fn as_uniqid(&self) -> &str;
    fn as_backend(&self) -> &str;
}

impl View for TaskRef {
    #[inline]
    fn as_task(&self) -> &str {
        self.id().as_str()
    }
    #[inline]
    fn as_uniqid(&self) -> &str {
        self.uniqid()
    }
    #[inline]
    fn as_backend(&self) -> &str {
        self.backend()
    }
}

#[inline]
pub fn message_for(event: &QueueEvent) -> &'static str {
    match event {
        // admission
        QueueEvent::Enqueued { .. } => "delivery queued",
        QueueEvent::Dequeued { .. } => "queued delivery dropped",

        // lifecycle
        QueueEvent::Started { .. } => "delivery starting",
        QueueEvent::Finished { .. } => "delivery finished",
        QueueEvent::Killed { .. } => "delivery interrupted; re-queued with its priority",
        QueueEvent::Errored { .. } => "delivery failed; discarded",

        // loop
        QueueEvent::LoopStarted => "run loop started",
        QueueEvent::LoopEnded { .. } => "run loop ended",
    }
}

#[inline]
pub fn nag_message_for(event: &NagEvent) -> &'static str {
    match event {
        NagEvent::Registered { .. } => "nag registered",
        NagEvent::Removed { .. } => "nag removed",
        NagEvent::RateLimited { .. } => "notification suppressed by rate limit",
        NagEvent::MuteChanged { muted: true } => "recurring notifications muted",
        NagEvent::MuteChanged { muted: false } => "recurring notifications unmuted",
    }
}

#[inline]
pub fn log_queue_event(event: &QueueEvent) {
    let msg = message_for(event);

    match event {
        QueueEvent::Enqueued { task, priority } => trace!(
            target: "nag.journal",
            task = task.as_task(),
            uniqid = task.as_uniqid(),
            priority,
            "{msg}"
        ),
        QueueEvent::Dequeued { task } => {
            debug!(target: "nag.journal", task = task.as_task(), uniqid = task.as_uniqid(), "{msg}")
        }
        QueueEvent::Started { task } => info!(
            target: "nag.journal",
            task = task.as_task(),
            uniqid = task.as_uniqid(),
            backend = task.as_backend(),
            "{msg}"
        ),
        QueueEvent::Finished { task } => {
            debug!(target: "nag.journal", task = task.as_task(), uniqid = task.as_uniqid(), "{msg}")
        }
        QueueEvent::Killed { task } => {
            info!(target: "nag.journal", task = task.as_task(), uniqid = task.as_uniqid(), "{msg}")
        }
        QueueEvent::Errored { task, reason } => error!(
            target: "nag.journal",
            task = task.as_task(),
            uniqid = task.as_uniqid(),
            backend = task.as_backend(),
            reason = %reason,
            "{msg}"
        ),
        QueueEvent::LoopStarted => trace!(target: "nag.journal", "{msg}"),
        QueueEvent::LoopEnded { reason } => debug!(target: "nag.journal", reason = %reason, "{msg}"),
    }
}

#[inline]
pub fn log_nag_event(event: &NagEvent) {
    let msg = nag_message_for(event);

    match event {
        NagEvent::Registered { uniqid, kind } => {
            debug!(target: "nag.journal", %uniqid, %kind, "{msg}")
        }
        NagEvent::Removed { uniqid, reason } => {
            debug!(target: "nag.journal", %uniqid, %reason, "{msg}")
        }
        NagEvent::RateLimited { uniqid, until } => {
            debug!(target: "nag.journal", %uniqid, %until, "{msg}")
        }
        NagEvent::MuteChanged { .. } => warn!(target: "nag.journal", "{msg}"),
    }
}
