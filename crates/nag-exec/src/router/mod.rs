use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use nag_core::{Deliver, DeliverRef, DeliveryError, DeliveryFactory, ExecContext};
use nag_model::Payload;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{ExecError, ExecResult};

/// A named delivery backend.
#[derive(Clone)]
pub struct Backend {
    pub name: String,
    pub deliver: DeliverRef,
    /// Used when a message names no backend through its tags.
    pub enabled_by_default: bool,
}

impl Backend {
    pub fn new(name: impl Into<String>, deliver: DeliverRef) -> Self {
        Self {
            name: name.into(),
            deliver,
            enabled_by_default: true,
        }
    }

    pub fn opt_in(mut self) -> Self {
        self.enabled_by_default = false;
        self
    }
}

/// Chooses the backends for each message.
///
/// Tags `plugin:a,b` / `plugins:a` select backends by name; otherwise every
/// backend enabled by default is used. Several backends run concurrently as
/// one delivery.
#[derive(Default, Clone)]
pub struct DeliveryRouter {
    backends: Vec<Backend>,
}

impl DeliveryRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, backend: Backend) -> ExecResult<()> {
        if self.backends.iter().any(|b| b.name == backend.name) {
            return Err(ExecError::DuplicateBackend(backend.name));
        }
        debug!(target: "nag.exec.router", backend = %backend.name, default = backend.enabled_by_default, "backend registered");
        self.backends.push(backend);
        Ok(())
    }

    pub fn with(mut self, backend: Backend) -> ExecResult<Self> {
        self.register(backend)?;
        Ok(self)
    }

    pub fn names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Backends a payload would be delivered through.
    pub fn select(&self, payload: &Payload) -> Vec<&Backend> {
        match payload.requested_backends() {
            Some(requested) => {
                let mut seen = HashSet::new();
                requested
                    .into_iter()
                    .filter(|name| seen.insert(*name))
                    .filter_map(|name| {
                        let found = self.backends.iter().find(|b| b.name == name);
                        if found.is_none() {
                            warn!(target: "nag.exec.router", backend = name, uniqid = %payload.uniqid, "unknown backend requested; skipped");
                        }
                        found
                    })
                    .collect()
            }
            None => self
                .backends
                .iter()
                .filter(|b| b.enabled_by_default)
                .collect(),
        }
    }
}

impl DeliveryFactory for DeliveryRouter {
    fn build(&self, payload: &Payload) -> Result<DeliverRef, DeliveryError> {
        let mut selected = self.select(payload);
        match selected.len() {
            0 => Err(DeliveryError::NoBackend(payload.uniqid.clone())),
            1 => Ok(selected.remove(0).deliver.clone()),
            _ => Ok(Arc::new(FanOut::new(
                selected.into_iter().map(|b| b.deliver.clone()).collect(),
            ))),
        }
    }
}

/// Several backends delivering the same payload at once.
struct FanOut {
    name: String,
    members: Vec<DeliverRef>,
}

impl FanOut {
    fn new(members: Vec<DeliverRef>) -> Self {
        let name = members
            .iter()
            .map(|m| m.name())
            .collect::<Vec<_>>()
            .join("+");
        Self { name, members }
    }
}

#[async_trait]
impl Deliver for FanOut {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, payload: &Payload, ctx: &ExecContext) -> Result<(), DeliveryError> {
        let mut set = JoinSet::new();
        for member in &self.members {
            let (member, payload, ctx) = (member.clone(), payload.clone(), ctx.clone());
            set.spawn(async move { member.deliver(&payload, &ctx).await });
        }

        let mut first_err = None;
        while let Some(joined) = set.join_next().await {
            let res = joined.map_err(|e| DeliveryError::Failed(format!("backend task: {e}")))?;
            if let Err(e) = res {
                first_err.get_or_insert(e);
            }
        }
        if ctx.is_killed() {
            return Err(DeliveryError::Cancelled);
        }
        first_err.map_or(Ok(()), Err)
    }

    async fn request_cancel(&self, ctx: &ExecContext) -> Result<(), DeliveryError> {
        for member in &self.members {
            member.request_cancel(ctx).await?;
        }
        Ok(())
    }
}
