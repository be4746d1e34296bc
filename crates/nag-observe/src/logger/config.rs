use std::io::IsTerminal;

use serde::Deserialize;

use crate::logger::format::LoggerFormat;

/// Environment variable overriding the configured level / filter directives.
pub const LOG_ENV: &str = "NAGD_LOG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directives, e.g. `info` or `info,nag.queue=debug`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let use_color = cfg!(test) || std::io::stdout().is_terminal();
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color,
        }
    }
}

impl LoggerConfig {
    /// Apply the `NAGD_LOG` override, if set and non-empty.
    pub fn with_env_override(mut self) -> Self {
        if let Some(level) = std::env::var(LOG_ENV).ok().filter(|l| !l.trim().is_empty()) {
            self.level = level;
        }
        self
    }
}
