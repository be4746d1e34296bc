#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use nag_core::{Clock, Deliver, DeliverRef, DeliveryError, DeliveryFactory, ExecContext, Task, TaskRef};
use nag_model::Payload;
use time::OffsetDateTime;
use tokio::time::Instant;

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub fn count(log: &Log, entry: &str) -> usize {
    log.lock().unwrap().iter().filter(|e| *e == entry).count()
}

/// Works for `work`, logging start / done / killed with the message.
pub struct Recorder {
    pub log: Log,
    pub work: Duration,
}

#[async_trait]
impl Deliver for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn deliver(&self, payload: &Payload, ctx: &ExecContext) -> Result<(), DeliveryError> {
        self.log.lock().unwrap().push(format!("start:{}", payload.message));
        tokio::select! {
            _ = ctx.cancelled() => {
                self.log.lock().unwrap().push(format!("killed:{}", payload.message));
                Err(DeliveryError::Cancelled)
            }
            _ = tokio::time::sleep(self.work) => {
                self.log.lock().unwrap().push(format!("done:{}", payload.message));
                Ok(())
            }
        }
    }
}

pub struct Failing;

#[async_trait]
impl Deliver for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    async fn deliver(&self, _: &Payload, _: &ExecContext) -> Result<(), DeliveryError> {
        Err(DeliveryError::Failed("boom".into()))
    }
}

pub struct Panicking;

#[async_trait]
impl Deliver for Panicking {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn deliver(&self, _: &Payload, _: &ExecContext) -> Result<(), DeliveryError> {
        panic!("backend bug");
    }
}

/// Stops when told, but its cancel hook always fails.
pub struct RefusingCancel;

#[async_trait]
impl Deliver for RefusingCancel {
    fn name(&self) -> &str {
        "refusing"
    }

    async fn deliver(&self, _: &Payload, ctx: &ExecContext) -> Result<(), DeliveryError> {
        ctx.cancelled().await;
        Ok(())
    }

    async fn request_cancel(&self, _: &ExecContext) -> Result<(), DeliveryError> {
        Err(DeliveryError::Cancel("refused".into()))
    }
}

pub struct RecorderFactory {
    pub log: Log,
    pub work: Duration,
}

impl DeliveryFactory for RecorderFactory {
    fn build(&self, _: &Payload) -> Result<DeliverRef, DeliveryError> {
        Ok(Arc::new(Recorder {
            log: self.log.clone(),
            work: self.work,
        }))
    }
}

pub fn recorder(log: &Log, work: Duration) -> DeliverRef {
    Arc::new(Recorder {
        log: log.clone(),
        work,
    })
}

pub fn task(message: &str, deliver: DeliverRef) -> TaskRef {
    Task::new(
        Payload {
            uniqid: message.to_string(),
            message: message.to_string(),
            tags: vec![],
            originated_from: None,
        },
        deliver,
    )
}

pub fn messages(tasks: &[TaskRef]) -> Vec<String> {
    tasks.iter().map(|t| t.payload().message.clone()).collect()
}

/// Wall clock that follows tokio's (possibly paused) time.
pub struct TokioClock {
    base: OffsetDateTime,
    start: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            base: OffsetDateTime::UNIX_EPOCH + time::Duration::days(20_000),
            start: Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> OffsetDateTime {
        self.base + self.start.elapsed()
    }
}

pub const SECOND: Duration = Duration::from_secs(1);

pub fn mins(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}
