//! Control surface of the notification daemon.
//!
//! Commands arrive as a name plus a raw body (`notify`, `suspend`, `ack`, ...),
//! are parsed into [`Command`] and run against an [`ApiHandler`].

mod command;
pub use command::{Command, NotifyCommand, Plan, Then};

mod error;
pub use error::ApiError;

mod handler;
pub use handler::{ApiHandler, Reply, StatusSummary};

mod adapter;
pub use adapter::{NotifierAdapter, STATUS_DEBOUNCE};

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpApi;

#[cfg(feature = "http")]
pub use axum;
