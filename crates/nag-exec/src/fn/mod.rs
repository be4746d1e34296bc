use std::{future::Future, pin::Pin, sync::Arc};

use async_trait::async_trait;
use nag_core::{Deliver, DeliveryError, ExecContext};
use nag_model::Payload;
use tracing::trace;

type BoxFut = Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send>>;
type DeliverFn = dyn Fn(Payload, ExecContext) -> BoxFut + Send + Sync;

/// Delivery backed by an in-process async function.
///
/// The function receives its own copy of the payload and the execution
/// context; it is expected to watch `ctx.cancelled()`.
#[derive(Clone)]
pub struct FnDelivery {
    name: String,
    f: Arc<DeliverFn>,
}

impl FnDelivery {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Payload, ExecContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DeliveryError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(move |payload, ctx| Box::pin(f(payload, ctx))),
        }
    }
}

#[async_trait]
impl Deliver for FnDelivery {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, payload: &Payload, ctx: &ExecContext) -> Result<(), DeliveryError> {
        trace!(target: "nag.exec.fn", backend = %self.name, uniqid = %payload.uniqid, "call");
        (self.f)(payload.clone(), ctx.clone()).await
    }
}
