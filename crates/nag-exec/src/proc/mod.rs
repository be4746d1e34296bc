use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use async_trait::async_trait;
use nag_core::{Deliver, DeliveryError, ExecContext};
use nag_model::Payload;
use serde::Deserialize;
use tracing::trace;

use crate::{
    error::{ExecError, ExecResult},
    util::{apply_env, cmd_program, run_child},
};

/// Program to run for every notification.
///
/// Arguments may carry `{message}`, `{tags}`, `{uniqid}` and `{source}`.
#[derive(Clone, Debug, Deserialize)]
pub struct ProcConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Return an error if exit code != 0
    #[serde(default = "default_fail_on_non_zero")]
    pub fail_on_non_zero: bool,
    /// Time between SIGTERM and a hard kill when the delivery is cancelled.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
}

fn default_fail_on_non_zero() -> bool {
    true
}

fn default_kill_grace_ms() -> u64 {
    2_000
}

impl ProcConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            fail_on_non_zero: default_fail_on_non_zero(),
            kill_grace_ms: default_kill_grace_ms(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Delivery backend spawning one process per notification.
pub struct ProcDelivery {
    name: String,
    cfg: ProcConfig,
}

impl ProcDelivery {
    pub fn new(cfg: ProcConfig) -> ExecResult<Self> {
        if cfg.program.trim().is_empty() {
            return Err(ExecError::MissingProgram);
        }
        Ok(Self {
            name: "proc".into(),
            cfg,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(&self) -> &ProcConfig {
        &self.cfg
    }
}

#[async_trait]
impl Deliver for ProcDelivery {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, payload: &Payload, ctx: &ExecContext) -> Result<(), DeliveryError> {
        let mut cmd = cmd_program(&self.cfg.program, &self.cfg.args, payload);
        apply_env(&mut cmd, &self.cfg.env, self.cfg.cwd.as_deref(), payload);

        trace!(target: "nag.exec.proc", backend = %self.name, program = %self.cfg.program, uniqid = %payload.uniqid, "spawn");
        run_child(
            cmd,
            ctx,
            &self.name,
            self.cfg.fail_on_non_zero,
            Duration::from_millis(self.cfg.kill_grace_ms),
        )
        .await
    }
}

#[cfg(feature = "shell")]
pub mod shell;
