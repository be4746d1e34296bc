use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use nag_model::Payload;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::error::DeliveryError;

/// Per-execution handle shared between the engine and a running delivery.
///
/// Carries the kill signal towards the backend and the busy flag / process id
/// back to the engine's cancel hook.
#[derive(Clone)]
pub struct ExecContext {
    inner: Arc<ExecInner>,
}

struct ExecInner {
    cancel: CancellationToken,
    busy: watch::Sender<bool>,
    pid: Mutex<Option<u32>>,
}

impl ExecContext {
    pub fn new() -> Self {
        let (busy, _) = watch::channel(false);
        Self {
            inner: Arc::new(ExecInner {
                cancel: CancellationToken::new(),
                busy,
                pid: Mutex::new(None),
            }),
        }
    }

    /// True once a kill was requested for this execution.
    pub fn is_killed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Resolves when a kill is requested.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.cancel.cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    pub(crate) fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    /// Record the OS process id of the spawned child, if the backend has one.
    pub fn report_pid(&self, pid: u32) {
        *self.inner.pid.lock().unwrap_or_else(PoisonError::into_inner) = Some(pid);
    }

    pub fn pid(&self) -> Option<u32> {
        *self.inner.pid.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the delivery as inside (or out of) uninterruptible work.
    pub fn set_busy(&self, busy: bool) {
        self.inner.busy.send_replace(busy);
    }

    pub fn is_busy(&self) -> bool {
        *self.inner.busy.borrow()
    }

    /// Marks the delivery busy until the guard is dropped.
    pub fn busy_guard(&self) -> BusyGuard {
        self.set_busy(true);
        BusyGuard { ctx: self.clone() }
    }

    /// Wait until the delivery is no longer busy.
    pub async fn wait_until_idle(&self) {
        let mut rx = self.inner.busy.subscribe();
        // Sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|busy| !*busy).await;
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BusyGuard {
    ctx: ExecContext,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.ctx.set_busy(false);
    }
}

/// A delivery backend bound to one task.
///
/// `deliver` must observe [`ExecContext::cancelled`] and return promptly once
/// killed. `request_cancel` is awaited by the engine after the kill signal; the
/// default waits until the delivery left its busy section.
#[async_trait]
pub trait Deliver: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn deliver(&self, payload: &Payload, ctx: &ExecContext) -> Result<(), DeliveryError>;

    async fn request_cancel(&self, ctx: &ExecContext) -> Result<(), DeliveryError> {
        ctx.wait_until_idle().await;
        Ok(())
    }
}

pub type DeliverRef = Arc<dyn Deliver>;

/// Builds the delivery for a message. Backend selection lives behind this seam.
pub trait DeliveryFactory: Send + Sync + 'static {
    fn build(&self, payload: &Payload) -> Result<DeliverRef, DeliveryError>;
}
