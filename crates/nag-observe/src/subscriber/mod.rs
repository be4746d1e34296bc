mod journal;
mod view;

pub use journal::Journal;
pub use view::{View, log_nag_event, log_queue_event, message_for, nag_message_for};
