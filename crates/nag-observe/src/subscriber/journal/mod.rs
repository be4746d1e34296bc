use nag_core::{NagEvent, QueueEvent};
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::warn;

use crate::subscriber::view::{log_nag_event, log_queue_event};

/// Writes queue and notifier events to the log.
///
/// Each `follow_*` call spawns a task draining one broadcast receiver until
/// its sender is gone; the handle yields how many events were logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct Journal;

impl Journal {
    pub fn new() -> Self {
        Self
    }

    pub fn name(&self) -> &'static str {
        "journal"
    }

    pub fn follow_queue(&self, rx: broadcast::Receiver<QueueEvent>) -> JoinHandle<u64> {
        tokio::spawn(drain(rx, |ev: &QueueEvent| log_queue_event(ev)))
    }

    pub fn follow_notifier(&self, rx: broadcast::Receiver<NagEvent>) -> JoinHandle<u64> {
        tokio::spawn(drain(rx, |ev: &NagEvent| log_nag_event(ev)))
    }
}

async fn drain<E, F>(mut rx: broadcast::Receiver<E>, log: F) -> u64
where
    E: Clone + Send + 'static,
    F: Fn(&E) + Send + 'static,
{
    let mut logged = 0;
    loop {
        match rx.recv().await {
            Ok(ev) => {
                log(&ev);
                logged += 1;
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(target: "nag.journal", missed, "journal lagged; events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
    logged
}
