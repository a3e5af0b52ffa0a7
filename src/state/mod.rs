//! State module for tracking job progress
//!
//! # Components
//!
//! - `JobStatus`: the job state machine (queued, processing, completed, failed)
//! - `StatusEntry`: the value kept in the status store for each task
//! - `TaskMessage`: the descriptor carried by the task queue

mod entry;
mod job_status;
mod message;

// Re-export main types
pub use entry::StatusEntry;
pub use job_status::JobStatus;
pub use message::TaskMessage;
