//! Plain data types shared by every layer of the notification daemon.
//!
//! Nothing in here is async or owns resources; the engine lives in `nag-core`.

mod domain;
pub use domain::*;

mod kind;
pub use kind::NagKind;

mod error;
pub use error::ModelError;
