use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use nag_model::{Payload, TaskId, TaskStatus};
use tracing::{debug, info, trace, warn};

use crate::{
    deliver::{DeliverRef, ExecContext},
    error::DeliveryError,
};

pub type TaskRef = Arc<Task>;

/// How an execution ended when the delivery did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecOutcome {
    Done,
    Killed,
}

/// A unit of queued work: one delivery of one payload.
pub struct Task {
    id: TaskId,
    payload: Payload,
    deliver: DeliverRef,
    state: Mutex<TaskState>,
}

#[derive(Default)]
struct TaskState {
    status: TaskStatus,
    killed: bool,
    exec: Option<ExecContext>,
}

impl Task {
    pub fn new(payload: Payload, deliver: DeliverRef) -> TaskRef {
        Arc::new(Self {
            id: TaskId::from(uuid::Uuid::new_v4().to_string()),
            payload,
            deliver,
            state: Mutex::new(TaskState::default()),
        })
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn uniqid(&self) -> &str {
        &self.payload.uniqid
    }

    pub fn backend(&self) -> &str {
        self.deliver.name()
    }

    pub fn status(&self) -> TaskStatus {
        self.lock().status
    }

    pub fn is_killed(&self) -> bool {
        self.lock().killed
    }

    /// Process id reported by the current execution, if any.
    pub fn pid(&self) -> Option<u32> {
        self.lock().exec.as_ref().and_then(ExecContext::pid)
    }

    fn lock(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) async fn execute(&self) -> Result<ExecOutcome, DeliveryError> {
        let ctx = ExecContext::new();
        {
            let mut st = self.lock();
            st.status = TaskStatus::Executing;
            st.exec = Some(ctx.clone());
        }
        trace!(target: "nag.task", task = %self.id, backend = self.backend(), "execute");

        let result = self.deliver.deliver(&self.payload, &ctx).await;

        let mut st = self.lock();
        st.exec = None;
        if st.killed {
            if let Err(e) = &result {
                debug!(target: "nag.task", task = %self.id, error = %e, "delivery ended with error after kill");
            }
            return Ok(ExecOutcome::Killed);
        }
        st.status = TaskStatus::Idle;
        result.map(|()| ExecOutcome::Done)
    }

    /// Cooperative kill of the current execution.
    ///
    /// Signals the delivery, then waits for its cancel hook. On hook failure
    /// the status stays `Killing`.
    pub async fn kill(&self) -> Result<(), DeliveryError> {
        let ctx = {
            let mut st = self.lock();
            match st.status {
                TaskStatus::Executing | TaskStatus::Killing => {}
                TaskStatus::Idle | TaskStatus::Killed => {
                    debug!(target: "nag.task", task = %self.id, status = %st.status, "not executing; nothing to kill");
                    return Ok(());
                }
            }
            st.killed = true;
            st.status = TaskStatus::Killing;
            match st.exec.clone() {
                Some(ctx) => ctx,
                None => return Ok(()),
            }
        };

        ctx.cancel();
        if let Err(e) = self.deliver.request_cancel(&ctx).await {
            warn!(target: "nag.task", task = %self.id, error = %e, "cancel hook failed");
            return Err(e);
        }

        let mut st = self.lock();
        if st.status == TaskStatus::Killing {
            st.status = TaskStatus::Killed;
        }
        info!(target: "nag.task", task = %self.id, uniqid = %self.payload.uniqid, "killed");
        Ok(())
    }

    /// Back to a fresh idle state before re-queueing.
    pub(crate) fn reset(&self) {
        let mut st = self.lock();
        st.status = TaskStatus::Idle;
        st.killed = false;
        st.exec = None;
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("uniqid", &self.payload.uniqid)
            .field("backend", &self.backend())
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deliver::Deliver;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Sleepy;

    #[async_trait]
    impl Deliver for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        async fn deliver(&self, _: &Payload, ctx: &ExecContext) -> Result<(), DeliveryError> {
            tokio::select! {
                _ = ctx.cancelled() => Err(DeliveryError::Cancelled),
                _ = tokio::time::sleep(Duration::from_secs(60)) => Ok(()),
            }
        }
    }

    struct StubbornHook;

    #[async_trait]
    impl Deliver for StubbornHook {
        fn name(&self) -> &str {
            "stubborn"
        }

        async fn deliver(&self, _: &Payload, ctx: &ExecContext) -> Result<(), DeliveryError> {
            ctx.cancelled().await;
            Ok(())
        }

        async fn request_cancel(&self, _: &ExecContext) -> Result<(), DeliveryError> {
            Err(DeliveryError::Cancel("refused".into()))
        }
    }

    fn payload() -> Payload {
        Payload {
            uniqid: "u1".into(),
            message: "hello".into(),
            tags: vec![],
            originated_from: None,
        }
    }

    #[tokio::test]
    async fn kill_on_idle_task_is_noop() {
        let task = Task::new(payload(), Arc::new(Sleepy));
        task.kill().await.unwrap();
        assert_eq!(task.status(), TaskStatus::Idle);
        assert!(!task.is_killed());
    }

    #[tokio::test]
    async fn kill_interrupts_execution_and_reset_clears_it() {
        let task = Task::new(payload(), Arc::new(Sleepy));
        let run = {
            let task = task.clone();
            tokio::spawn(async move { task.execute().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(task.status(), TaskStatus::Executing);

        task.kill().await.unwrap();
        assert_eq!(task.status(), TaskStatus::Killed);
        assert_eq!(run.await.unwrap().unwrap(), ExecOutcome::Killed);

        task.reset();
        assert_eq!(task.status(), TaskStatus::Idle);
        assert!(!task.is_killed());
    }

    #[tokio::test]
    async fn failing_cancel_hook_leaves_task_killing() {
        let task = Task::new(payload(), Arc::new(StubbornHook));
        let run = {
            let task = task.clone();
            tokio::spawn(async move { task.execute().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = task.kill().await.unwrap_err();
        assert_eq!(err, DeliveryError::Cancel("refused".into()));
        assert_eq!(task.status(), TaskStatus::Killing);
        assert_eq!(run.await.unwrap().unwrap(), ExecOutcome::Killed);
    }
}
