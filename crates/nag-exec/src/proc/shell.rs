use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use async_trait::async_trait;
use nag_core::{Deliver, DeliveryError, ExecContext};
use nag_model::Payload;
use serde::Deserialize;
use tokio::process::Command;
use tracing::trace;

use crate::{
    error::{ExecError, ExecResult},
    util::{apply_env, render, run_child},
};

#[derive(Clone, Debug, Deserialize)]
pub struct ShellConfig {
    /// Placeholders are substituted before the script reaches the shell.
    pub script: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default = "default_fail_on_non_zero")]
    pub fail_on_non_zero: bool,
}

fn default_fail_on_non_zero() -> bool {
    true
}

/// Runs a script in the platform shell (`sh -c` / `cmd /C`).
pub struct ShellDelivery {
    name: String,
    cfg: ShellConfig,
}

impl ShellDelivery {
    pub fn new(cfg: ShellConfig) -> ExecResult<Self> {
        if cfg.script.trim().is_empty() {
            return Err(ExecError::EmptyScript);
        }
        Ok(Self {
            name: "shell".into(),
            cfg,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl Deliver for ShellDelivery {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, payload: &Payload, ctx: &ExecContext) -> Result<(), DeliveryError> {
        let script = render(&self.cfg.script, payload);
        cfg_if::cfg_if! {
            if #[cfg(target_family = "windows")] {
                let mut cmd = Command::new("cmd");
                cmd.arg("/C").arg(&script);
            } else {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(&script);
            }
        }
        apply_env(&mut cmd, &self.cfg.env, self.cfg.cwd.as_deref(), payload);

        trace!(target: "nag.exec.shell", backend = %self.name, %script, "spawn");
        run_child(cmd, ctx, &self.name, self.cfg.fail_on_non_zero, Duration::from_secs(2)).await
    }
}
