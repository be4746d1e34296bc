//! Recurring registrations ("nags"), rate limiting and mute on top of the queue.
//!
//! Every registration has its own timer task. Timers and the expiry sweep only
//! hold a weak reference to the notifier and are cancelled through child
//! tokens of one root token.

mod request;
mod state;

pub use request::{EmitOutcome, NotifyRequest, Recurrence, Terminal};

use std::{
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use nag_model::{ItemView, LoopEnd, Payload, Period, QueueStatus, Snapshot, Uniqid, Until};
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::{
    clock::{Clock, SystemClock},
    deliver::DeliveryFactory,
    error::{NotifyError, QueueError},
    event::{NagEvent, RemoveReason},
    queue::TaskQueue,
    task::{Task, TaskRef},
};
use state::{NagRecord, NagState, TerminalState};

const EVENT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct NotifierConfig {
    /// How often until-date registrations past their date are purged.
    pub sweep_interval: Duration,
    pub clock: Arc<dyn Clock>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(1),
            clock: Arc::new(SystemClock),
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    shared: Arc<Shared>,
}

struct Shared {
    queue: TaskQueue,
    factory: Arc<dyn DeliveryFactory>,
    clock: Arc<dyn Clock>,
    state: NagState,
    muted: AtomicBool,
    generation: AtomicU64,
    events: broadcast::Sender<NagEvent>,
    shutdown: CancellationToken,
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl Notifier {
    pub fn new(queue: TaskQueue, factory: Arc<dyn DeliveryFactory>) -> Self {
        Self::with_config(queue, factory, NotifierConfig::default())
    }

    /// Build the notifier and start its expiry sweep. Must run inside a tokio runtime.
    pub fn with_config(
        queue: TaskQueue,
        factory: Arc<dyn DeliveryFactory>,
        config: NotifierConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Arc::new(Shared {
            queue,
            factory,
            clock: config.clock,
            state: NagState::new(),
            muted: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            events,
            shutdown: CancellationToken::new(),
        });
        spawn_sweep(Arc::downgrade(&shared), config.sweep_interval);
        Self { shared }
    }

    fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NagEvent> {
        self.shared.events.subscribe()
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.shared.queue
    }

    fn emit(&self, event: NagEvent) {
        let _ = self.shared.events.send(event);
    }

    /// Emit one notification, subject to its rate limit.
    #[instrument(level = "debug", skip(self, request), fields(uniqid = tracing::field::Empty))]
    pub async fn emit_once(&self, request: NotifyRequest) -> Result<EmitOutcome, NotifyError> {
        let uniqid = request.resolve_uniqid();
        tracing::Span::current().record("uniqid", uniqid.as_str());

        if let Some(period) = request.once_per.filter(|p| !p.is_zero()) {
            let now = self.shared.clock.now();
            let end = period.after(now).ok_or_else(|| {
                NotifyError::InvalidRecurrence(format!("once_per {period} is out of range"))
            })?;
            if let Err(until) = self.shared.state.try_open_window(&uniqid, now, end) {
                warn!(target: "nag.notify", %uniqid, until = %Until::at(until).to_rfc3339(), "rate limited; notification suppressed");
                self.emit(NagEvent::RateLimited {
                    uniqid: uniqid.clone(),
                    until,
                });
                return Ok(EmitOutcome::RateLimited { uniqid, until });
            }
        }

        let payload = Payload {
            uniqid: uniqid.clone(),
            message: request.message,
            tags: request.tags,
            originated_from: request.originated_from,
        };
        let deliver = self.shared.factory.build(&payload)?;
        let task = Task::new(payload, deliver);
        info!(target: "nag.notify", %uniqid, task = %task.id(), backend = task.backend(), "notify");

        let receipt = self.shared.queue.submit(task, request.urgency).await?;
        Ok(EmitOutcome::Emitted { uniqid, receipt })
    }

    /// Nag until the given date.
    pub async fn notify_until(
        &self,
        until: Until,
        every: Period,
        request: NotifyRequest,
    ) -> Result<Uniqid, NotifyError> {
        self.register(Recurrence {
            terminal: Terminal::Until(until),
            every,
            request,
        })
        .await
    }

    /// Nag for the given span, starting now.
    pub async fn notify_for(
        &self,
        lasting: Period,
        every: Period,
        request: NotifyRequest,
    ) -> Result<Uniqid, NotifyError> {
        let until = lasting
            .after(self.shared.clock.now())
            .map(Until::at)
            .ok_or_else(|| NotifyError::InvalidRecurrence(format!("for {lasting} is out of range")))?;
        self.notify_until(until, every, request).await
    }

    /// Nag exactly `times` times (the immediate fire included).
    pub async fn notify_times(
        &self,
        times: u32,
        every: Period,
        request: NotifyRequest,
    ) -> Result<Uniqid, NotifyError> {
        self.register(Recurrence {
            terminal: Terminal::Times(times),
            every,
            request,
        })
        .await
    }

    /// Create (or replace) a recurring registration and fire it once right away.
    pub async fn register(&self, recurrence: Recurrence) -> Result<Uniqid, NotifyError> {
        let Recurrence {
            terminal,
            every,
            mut request,
        } = recurrence;

        if every.is_zero() {
            return Err(NotifyError::InvalidRecurrence(
                "frequency must be at least one minute".into(),
            ));
        }
        if !every.is_bounded() {
            return Err(NotifyError::InvalidRecurrence(format!(
                "frequency {every} is out of range"
            )));
        }
        if let Some(limit) = request.once_per.filter(|p| !p.is_bounded()) {
            return Err(NotifyError::InvalidRecurrence(format!(
                "once_per {limit} is out of range"
            )));
        }
        let terminal = match terminal {
            Terminal::Times(0) => {
                return Err(NotifyError::InvalidRecurrence(
                    "times must be greater than zero".into(),
                ));
            }
            Terminal::Times(n) => TerminalState::Remaining(n),
            Terminal::Until(u) => TerminalState::Until(u),
        };

        let uniqid = request.resolve_uniqid();
        request.uniqid = Some(uniqid.clone());
        if let Some(limit) = request.once_per.filter(|limit| every < *limit) {
            warn!(target: "nag.notify", %uniqid, every = %every, once_per = %limit, "frequency is below the rate limit; some fires will be suppressed");
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let timer = self.shared.shutdown.child_token();
        let record = NagRecord {
            uniqid: uniqid.clone(),
            generation,
            terminal,
            every,
            request,
            timer: timer.clone(),
        };
        let kind = record.kind();

        if let Some(old) = self.shared.state.insert(record) {
            old.timer.cancel();
            debug!(target: "nag.notify", %uniqid, "replacing existing nag");
            self.emit(NagEvent::Removed {
                uniqid: uniqid.clone(),
                reason: RemoveReason::Replaced,
            });
        }
        info!(target: "nag.notify", %uniqid, %kind, every = %every, "nag registered");
        self.emit(NagEvent::Registered {
            uniqid: uniqid.clone(),
            kind,
        });

        self.arm(uniqid.clone(), generation, every, timer);
        self.fire(&uniqid, generation).await;
        Ok(uniqid)
    }

    fn arm(&self, uniqid: Uniqid, generation: u64, every: Period, timer: CancellationToken) {
        let weak = Arc::downgrade(&self.shared);
        let period = every.as_duration();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = timer.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(shared) = weak.upgrade() else { break };
                        Notifier::from_shared(shared).on_tick(&uniqid, generation).await;
                    }
                }
            }
            trace!(target: "nag.notify", %uniqid, generation, "timer stopped");
        });
    }

    async fn on_tick(&self, uniqid: &str, generation: u64) {
        let now = self.shared.clock.now();
        if self.shared.state.is_expired(uniqid, generation, now) {
            self.drop_nag(uniqid, generation, RemoveReason::Expired);
            return;
        }
        self.fire(uniqid, generation).await;
    }

    async fn fire(&self, uniqid: &str, generation: u64) {
        let Some(request) = self.shared.state.request_for(uniqid, generation) else {
            return;
        };
        if self.is_muted() {
            warn!(target: "nag.notify", %uniqid, "muted; nag fire skipped");
            return;
        }

        match self.emit_once(request).await {
            Ok(outcome) => trace!(target: "nag.notify", %uniqid, emitted = outcome.is_emitted(), "nag fired"),
            Err(e) => warn!(target: "nag.notify", %uniqid, error = %e, "nag fire failed"),
        }

        if let Some(0) = self.shared.state.decrement(uniqid, generation) {
            self.drop_nag(uniqid, generation, RemoveReason::Depleted);
        }
    }

    fn drop_nag(&self, uniqid: &str, generation: u64, reason: RemoveReason) {
        if let Some(record) = self.shared.state.remove_if(uniqid, generation) {
            record.timer.cancel();
            info!(target: "nag.notify", %uniqid, %reason, "nag removed");
            self.emit(NagEvent::Removed {
                uniqid: record.uniqid,
                reason,
            });
        }
    }

    /// Purge until-date registrations whose date has passed.
    pub fn sweep(&self) -> usize {
        let now = self.shared.clock.now();
        let closed = self.shared.state.prune_windows(now);
        if closed > 0 {
            trace!(target: "nag.notify", closed, "rate-limit windows pruned");
        }
        let expired = self.shared.state.take_expired(now);
        for record in &expired {
            record.timer.cancel();
            info!(target: "nag.notify", uniqid = %record.uniqid, "nag expired; purged");
            self.emit(NagEvent::Removed {
                uniqid: record.uniqid.clone(),
                reason: RemoveReason::Expired,
            });
        }
        expired.len()
    }

    /// Stop nagging about `uniqid`. Returns `false` when nothing was registered.
    pub fn remove(&self, uniqid: &str) -> bool {
        match self.shared.state.remove(uniqid) {
            Some(record) => {
                record.timer.cancel();
                warn!(target: "nag.notify", %uniqid, "removing repeating nag");
                self.emit(NagEvent::Removed {
                    uniqid: record.uniqid,
                    reason: RemoveReason::Acknowledged,
                });
                true
            }
            None => {
                warn!(target: "nag.notify", %uniqid, "no repeating nag to remove");
                false
            }
        }
    }

    pub fn is_registered(&self, uniqid: &str) -> bool {
        self.shared.state.contains(uniqid)
    }

    pub fn nag_count(&self) -> usize {
        self.shared.state.len()
    }

    /// Suppress recurring fires. One-shot emissions are unaffected.
    pub fn mute(&self) {
        if !self.shared.muted.swap(true, Ordering::SeqCst) {
            info!(target: "nag.notify", "muted");
            self.emit(NagEvent::MuteChanged { muted: true });
        }
    }

    pub fn unmute(&self) {
        if self.shared.muted.swap(false, Ordering::SeqCst) {
            info!(target: "nag.notify", "unmuted");
            self.emit(NagEvent::MuteChanged { muted: false });
        }
    }

    pub fn is_muted(&self) -> bool {
        self.shared.muted.load(Ordering::SeqCst)
    }

    pub async fn suspend(&self, kill_running: bool) -> Result<(), QueueError> {
        self.shared.queue.suspend(kill_running).await
    }

    pub fn resume(&self) -> Option<JoinHandle<LoopEnd>> {
        self.shared.queue.resume()
    }

    pub async fn step(&self) -> Result<LoopEnd, QueueError> {
        self.shared.queue.step().await
    }

    pub fn queue_status(&self) -> QueueStatus {
        self.shared.queue.status()
    }

    /// Drop queued (not running) deliveries of `uniqid`.
    pub fn dequeue(&self, uniqid: &str) -> usize {
        self.shared.queue.dequeue_where(|task| task.uniqid() == uniqid)
    }

    pub fn snapshot(&self) -> Snapshot {
        let queue = self.shared.queue.view();
        let (nags, rate_limits) = self.shared.state.views(self.shared.clock.now());
        Snapshot {
            queue_status: queue.status,
            muted: self.is_muted(),
            running: queue.running.as_ref().map(item_view),
            pending: queue.pending.iter().map(item_view).collect(),
            nags,
            rate_limits,
        }
    }

    /// Cancel every timer and the sweep. Queued deliveries are left alone.
    pub fn shutdown(&self) {
        info!(target: "nag.notify", nags = self.nag_count(), "notifier shutting down");
        self.shared.shutdown.cancel();
    }
}

fn item_view(task: &TaskRef) -> ItemView {
    let payload = task.payload();
    ItemView {
        uniqid: payload.uniqid.clone(),
        message: payload.message.clone(),
        tags: payload.tags.clone(),
        originated_from: payload.originated_from.clone(),
        status: task.status(),
    }
}

fn spawn_sweep(weak: Weak<Shared>, every: Duration) {
    let Some(shutdown) = weak.upgrade().map(|s| s.shutdown.clone()) else {
        return;
    };
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(shared) = weak.upgrade() else { break };
                    Notifier::from_shared(shared).sweep();
                }
            }
        }
        trace!(target: "nag.notify", "sweep stopped");
    });
}
