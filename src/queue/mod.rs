//! The review queue: due selection and content resolution.

mod review;
mod select;

pub use review::{AttachmentId, AttachmentLocator, ContentResolver, Prompt, ReviewItem, fetch_review_queue};
pub use select::{DEFAULT_FUZZY_WINDOW_MILLIS, DEFAULT_QUEUE_LIMIT, QueueConfig, fuzzy_due_threshold, select_due};
