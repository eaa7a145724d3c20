//! Live tail sessions for logframe
//!
//! This crate drives a circular table from a sequence of tail responses. The
//! transport that produces the responses lives outside logframe; a session
//! only consumes what it is handed, one response at a time.

mod session;

pub use session::{TailSession, TailStats};

// Re-export types used in our public API
pub use logframe_transform::{CircularTable, SharedCircularTable};
pub use logframe_types::StreamsResponse;
