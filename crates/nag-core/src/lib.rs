//! Job-scheduling and recurrence engine of the notification daemon.
//!
//! - [`queue`]: priority task queue with cooperative preemption and suspend / resume / step.
//! - [`notify`]: recurring registrations (nags), rate limiting and mute on top of the queue.
//! - [`deliver`]: the seam delivery backends implement.

pub mod clock;
pub mod deliver;
pub mod error;
pub mod event;
pub mod notify;
pub mod queue;
pub mod task;
mod uniqid;

pub use clock::{Clock, FakeClock, SystemClock};
pub use deliver::{Deliver, DeliverRef, DeliveryFactory, ExecContext};
pub use error::{DeliveryError, NotifyError, QueueError};
pub use event::{NagEvent, QueueEvent, RemoveReason};
pub use notify::{EmitOutcome, Notifier, NotifierConfig, NotifyRequest, Recurrence, Terminal};
pub use queue::{QueueView, SubmitReceipt, TaskQueue};
pub use task::{Task, TaskRef};
pub use uniqid::default_uniqid;
