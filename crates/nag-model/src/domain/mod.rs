mod task_id;
pub use task_id::TaskId;

mod payload;
pub use payload::Payload;

mod urgency;
pub use urgency::Urgency;

mod period;
pub use period::Period;

mod until;
pub use until::Until;

mod task_status;
pub use task_status::TaskStatus;

mod queue_status;
pub use queue_status::{LoopEnd, QueueStatus};

mod snapshot;
pub use snapshot::{ItemView, NagView, RateLimitView, Snapshot};

/// Stable identity of a notification for recurrence, rate limiting and acknowledgement.
pub type Uniqid = String;

/// Tag prefix selecting delivery backends explicitly (`plugin:name1,name2`).
pub const TAG_PLUGIN_PREFIXES: [&str; 2] = ["plugin:", "plugins:"];
