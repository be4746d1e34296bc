//! Delivery backends for the notification queue.
//!
//! - [`ProcDelivery`]: runs a program per notification (feature `proc`, default).
//! - `ShellDelivery`: runs a shell snippet (feature `shell`).
//! - [`FnDelivery`]: in-process async closure.
//! - [`DeliveryRouter`]: picks backends per message from `plugin:` tags.

mod error;
pub use error::{ExecError, ExecResult};

mod util;

pub mod r#fn;
pub use r#fn::FnDelivery;

pub mod router;
pub use router::{Backend, DeliveryRouter};

#[cfg(feature = "proc")]
pub mod proc;
#[cfg(feature = "proc")]
pub use proc::{ProcConfig, ProcDelivery};
#[cfg(feature = "shell")]
pub use proc::shell::{ShellConfig, ShellDelivery};

pub mod prelude {
    pub use crate::error::{ExecError, ExecResult};
    pub use crate::{Backend, DeliveryRouter, FnDelivery};

    #[cfg(feature = "proc")]
    pub use crate::{ProcConfig, ProcDelivery};
    #[cfg(feature = "shell")]
    pub use crate::{ShellConfig, ShellDelivery};
}
