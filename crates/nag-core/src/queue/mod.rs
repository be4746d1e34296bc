//! Priority task queue with a single run loop.
//!
//! Lower priority values run first. Normal submissions take the next value of
//! a per-queue sequence; `Preempt` goes in front of everything and kills the
//! running task, which is put back with its original priority.

mod state;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nag_model::{LoopEnd, QueueStatus, TaskId, Urgency};
use tokio::{
    sync::{broadcast, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, instrument, trace, warn};

use crate::{
    error::{DeliveryError, QueueError},
    event::QueueEvent,
    task::{ExecOutcome, TaskRef},
};
use state::{LoopState, Transition};

const EVENT_CAPACITY: usize = 256;

/// Result of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub task_id: TaskId,
    pub priority: i64,
    /// The queue was suspended; the entry waits for `resume` or `step`.
    pub queued_while_suspended: bool,
}

/// Consistent read of the queue taken under one lock.
#[derive(Debug, Clone)]
pub struct QueueView {
    pub status: QueueStatus,
    pub running: Option<TaskRef>,
    pub pending: Vec<TaskRef>,
}

#[derive(Clone)]
pub struct TaskQueue {
    shared: Arc<Shared>,
}

struct Shared {
    inner: Mutex<QueueInner>,
    events: broadcast::Sender<QueueEvent>,
}

#[derive(Clone)]
struct Entry {
    priority: i64,
    task: TaskRef,
}

struct QueueInner {
    state: LoopState,
    pending: Vec<Entry>,
    running: Option<Entry>,
    suspend_waiters: Vec<oneshot::Sender<()>>,
    run_once: bool,
    seq: i64,
}

impl QueueInner {
    fn priority_for(&mut self, urgency: Urgency) -> i64 {
        match urgency {
            Urgency::Normal => self.next_seq(),
            Urgency::Ahead(n) => self.next_seq().saturating_sub(n),
            Urgency::Preempt => self
                .pending
                .first()
                .into_iter()
                .chain(self.running.as_ref())
                .map(|e| e.priority)
                .min()
                .map_or(0, |min| min.saturating_sub(1)),
        }
    }

    fn next_seq(&mut self) -> i64 {
        self.seq += 1;
        self.seq
    }

    /// Stable sorted insert: equal priorities keep insertion order.
    fn insert(&mut self, entry: Entry) {
        let at = self.pending.partition_point(|e| e.priority <= entry.priority);
        self.pending.insert(at, entry);
    }

    fn transition(&mut self, t: Transition) {
        let next = self.state.apply(t);
        if next != self.state {
            trace!(target: "nag.queue", from = ?self.state, to = ?next, "loop state");
        }
        self.state = next;
    }

    fn finish(&mut self, end: LoopEnd) -> Option<LoopEnd> {
        self.run_once = false;
        self.transition(Transition::Stop(end));
        for waiter in self.suspend_waiters.drain(..) {
            let _ = waiter.send(());
        }
        Some(end)
    }

    /// Checked at the top of every iteration, under the same lock as the pop.
    fn stop_before_next(&mut self) -> Option<LoopEnd> {
        if self.state == LoopState::Draining {
            self.finish(LoopEnd::Suspend)
        } else if self.pending.is_empty() {
            self.finish(LoopEnd::NoMoreItems)
        } else {
            None
        }
    }

    fn stop_after_run(&mut self) -> Option<LoopEnd> {
        if self.state == LoopState::Draining {
            self.finish(LoopEnd::Suspend)
        } else if self.run_once {
            self.finish(LoopEnd::RunOnceFinished)
        } else {
            None
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: QueueEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(QueueInner {
                    state: LoopState::Idle,
                    pending: Vec::new(),
                    running: None,
                    suspend_waiters: Vec::new(),
                    run_once: false,
                    seq: 0,
                }),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.shared.events.subscribe()
    }

    /// Queue a task.
    ///
    /// With [`Urgency::Preempt`] the running task is killed first and this call
    /// waits for the kill. A failed kill is reported, but the new entry stays
    /// queued and the loop is started regardless.
    #[instrument(level = "debug", skip(self, task), fields(task = %task.id(), uniqid = %task.uniqid()))]
    pub async fn submit(&self, task: TaskRef, urgency: Urgency) -> Result<SubmitReceipt, QueueError> {
        let (priority, victim) = {
            let mut inner = self.shared.lock();
            let priority = inner.priority_for(urgency);
            inner.insert(Entry {
                priority,
                task: task.clone(),
            });
            let victim = match urgency {
                Urgency::Preempt => inner.running.as_ref().map(|e| e.task.clone()),
                _ => None,
            };
            (priority, victim)
        };
        debug!(target: "nag.queue", priority, ?urgency, "enqueued");
        self.shared.emit(QueueEvent::Enqueued {
            task: task.clone(),
            priority,
        });

        let killed = match &victim {
            Some(running) => {
                info!(target: "nag.queue", victim = %running.id(), "preempting running task");
                running.kill().await
            }
            None => Ok(()),
        };

        let queued_while_suspended = {
            let mut inner = self.shared.lock();
            match inner.state {
                LoopState::Idle => {
                    self.start_locked(&mut inner);
                    false
                }
                // a step re-suspends after its one entry
                LoopState::Running => inner.run_once,
                LoopState::Draining | LoopState::Suspended => true,
            }
        };
        if queued_while_suspended {
            debug!(target: "nag.queue", "queue suspended; task waits for resume");
        }

        if let (Err(source), Some(running)) = (killed, victim) {
            return Err(QueueError::Kill {
                task: running.id().clone(),
                source,
            });
        }

        Ok(SubmitReceipt {
            task_id: task.id().clone(),
            priority,
            queued_while_suspended,
        })
    }

    /// Stop the loop after the current task.
    ///
    /// Returns at once if no loop is running. With `kill_running`, the running
    /// task is killed (and re-queued) concurrently.
    pub async fn suspend(&self, kill_running: bool) -> Result<(), QueueError> {
        let (drained, victim) = {
            let mut inner = self.shared.lock();
            inner.transition(Transition::RequestSuspend);
            if !inner.state.is_alive() {
                debug!(target: "nag.queue", "suspended (loop was not running)");
                return Ok(());
            }
            let (tx, rx) = oneshot::channel();
            inner.suspend_waiters.push(tx);
            let victim = if kill_running {
                inner.running.as_ref().map(|e| e.task.clone())
            } else {
                None
            };
            (rx, victim)
        };
        info!(target: "nag.queue", kill_running, "suspend requested");

        let drain = async { drained.await.map_err(|_| QueueError::SuspendAborted) };
        let kill = async {
            match &victim {
                Some(task) => task.kill().await.map_err(|source| QueueError::Kill {
                    task: task.id().clone(),
                    source,
                }),
                None => Ok(()),
            }
        };
        tokio::try_join!(drain, kill)?;
        Ok(())
    }

    /// Clear a suspend request; restarts the loop when work is pending.
    ///
    /// Suspend calls still waiting for a drain fail with
    /// [`QueueError::SuspendAborted`].
    pub fn resume(&self) -> Option<JoinHandle<LoopEnd>> {
        let mut inner = self.shared.lock();
        inner.transition(Transition::Resume);
        inner.run_once = false;
        inner.suspend_waiters.clear();
        info!(target: "nag.queue", status = %inner.state.status(), "resumed");

        if inner.state == LoopState::Idle && !inner.pending.is_empty() {
            Some(self.start_locked(&mut inner))
        } else {
            None
        }
    }

    /// Run exactly one pending entry while suspended, then suspend again.
    pub async fn step(&self) -> Result<LoopEnd, QueueError> {
        let handle = {
            let mut inner = self.shared.lock();
            if inner.state != LoopState::Suspended || inner.pending.is_empty() {
                warn!(target: "nag.queue", status = %inner.state.status(), pending = inner.pending.len(), "step ignored: not suspended or nothing pending");
                return Err(QueueError::NotSuspended);
            }
            inner.run_once = true;
            self.start_locked(&mut inner)
        };
        handle
            .await
            .map_err(|e| QueueError::LoopAborted(e.to_string()))
    }

    /// Drop pending entries matching `pred`. Returns how many were removed.
    pub fn dequeue_where<F>(&self, pred: F) -> usize
    where
        F: Fn(&TaskRef) -> bool,
    {
        let removed: Vec<Entry> = {
            let mut inner = self.shared.lock();
            let (gone, kept) = std::mem::take(&mut inner.pending)
                .into_iter()
                .partition(|e| pred(&e.task));
            inner.pending = kept;
            gone
        };
        for entry in &removed {
            debug!(target: "nag.queue", task = %entry.task.id(), uniqid = %entry.task.uniqid(), "dequeued");
            self.shared.emit(QueueEvent::Dequeued {
                task: entry.task.clone(),
            });
        }
        removed.len()
    }

    pub fn status(&self) -> QueueStatus {
        self.shared.lock().state.status()
    }

    pub fn running(&self) -> Option<TaskRef> {
        self.shared.lock().running.as_ref().map(|e| e.task.clone())
    }

    /// Pending tasks in execution order.
    pub fn pending(&self) -> Vec<TaskRef> {
        self.shared
            .lock()
            .pending
            .iter()
            .map(|e| e.task.clone())
            .collect()
    }

    /// Pending priorities in execution order.
    pub fn priorities(&self) -> Vec<i64> {
        self.shared.lock().pending.iter().map(|e| e.priority).collect()
    }

    pub fn view(&self) -> QueueView {
        let inner = self.shared.lock();
        QueueView {
            status: inner.state.status(),
            running: inner.running.as_ref().map(|e| e.task.clone()),
            pending: inner.pending.iter().map(|e| e.task.clone()).collect(),
        }
    }

    fn start_locked(&self, inner: &mut QueueInner) -> JoinHandle<LoopEnd> {
        inner.transition(Transition::Start);
        tokio::spawn(run_loop(self.shared.clone()))
    }
}

async fn execute(task: TaskRef) -> Result<ExecOutcome, DeliveryError> {
    task.execute().await
}

async fn run_loop(shared: Arc<Shared>) -> LoopEnd {
    debug!(target: "nag.queue", "run loop started");
    shared.emit(QueueEvent::LoopStarted);

    let end = loop {
        let entry = {
            let mut inner = shared.lock();
            if let Some(end) = inner.stop_before_next() {
                break end;
            }
            let entry = inner.pending.remove(0);
            inner.running = Some(entry.clone());
            entry
        };
        let task = entry.task.clone();
        debug!(target: "nag.queue", task = %task.id(), uniqid = %task.uniqid(), priority = entry.priority, "run");
        shared.emit(QueueEvent::Started { task: task.clone() });

        // A panicking delivery must not take the loop down with it.
        let outcome = match tokio::spawn(execute(task.clone())).await {
            Ok(res) => res.map_err(|e| e.to_string()),
            Err(join) => {
                warn!(target: "nag.queue", task = %task.id(), error = %join, "delivery panicked");
                task.reset();
                Err(format!("delivery panicked: {join}"))
            }
        };

        let (event, stop) = {
            let mut inner = shared.lock();
            inner.running = None;
            let event = match outcome {
                Ok(ExecOutcome::Done) => QueueEvent::Finished { task },
                Ok(ExecOutcome::Killed) => {
                    task.reset();
                    inner.insert(entry);
                    QueueEvent::Killed { task }
                }
                Err(reason) => QueueEvent::Errored { task, reason },
            };
            (event, inner.stop_after_run())
        };
        shared.emit(event);

        if let Some(end) = stop {
            break end;
        }
    };

    debug!(target: "nag.queue", reason = %end, "run loop ended");
    shared.emit(QueueEvent::LoopEnded { reason: end });
    end
}
