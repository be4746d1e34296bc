use std::{
    collections::BTreeMap,
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use nag_core::DeliverRef;
use nag_exec::{Backend, DeliveryRouter, ExecError, ProcConfig, ProcDelivery, ShellConfig, ShellDelivery};
use nag_observe::LoggerConfig;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 7878;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("backend {name}: {source}")]
    Backend {
        name: String,
        #[source]
        source: ExecError,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Daemon configuration file (TOML).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub listen: SocketAddr,
    /// How often expired dated registrations are purged.
    pub sweep_interval_ms: u64,
    pub logger: LoggerConfig,
    pub backends: Vec<BackendConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            sweep_interval_ms: 1_000,
            logger: LoggerConfig::default(),
            backends: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Proc,
    Shell,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    #[serde(default)]
    pub kind: BackendKind,
    /// Program for `proc`, script for `shell`. Placeholders like `{message}` are expanded.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default = "enabled_by_default")]
    pub enabled_by_default: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        raw.parse()
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn build_router(&self) -> Result<DeliveryRouter, ConfigError> {
        let mut router = DeliveryRouter::new();
        for b in &self.backends {
            let wrap = |source| ConfigError::Backend {
                name: b.name.clone(),
                source,
            };
            let mut backend = Backend::new(&b.name, b.build().map_err(wrap)?);
            backend.enabled_by_default = b.enabled_by_default;
            router.register(backend).map_err(wrap)?;
        }
        Ok(router)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::Invalid("sweep_interval_ms must be > 0".into()));
        }
        if let Some(b) = self.backends.iter().find(|b| b.name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "backend with command {:?} has no name",
                b.command
            )));
        }
        if let Some(b) = self
            .backends
            .iter()
            .find(|b| b.kind == BackendKind::Shell && !b.args.is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "backend {}: shell backends take no args",
                b.name
            )));
        }
        Ok(())
    }
}

impl std::str::FromStr for DaemonConfig {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let cfg: DaemonConfig = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

impl BackendConfig {
    fn build(&self) -> Result<DeliverRef, ExecError> {
        let deliver: DeliverRef = match self.kind {
            BackendKind::Proc => {
                let mut cfg = ProcConfig::new(&self.command).args(&self.args);
                cfg.env = self.env.clone();
                Arc::new(ProcDelivery::new(cfg)?.with_name(&self.name))
            }
            BackendKind::Shell => {
                let cfg = ShellConfig {
                    script: self.command.clone(),
                    env: self.env.clone(),
                    cwd: None,
                    fail_on_non_zero: true,
                };
                Arc::new(ShellDelivery::new(cfg)?.with_name(&self.name))
            }
        };
        Ok(deliver)
    }
}
