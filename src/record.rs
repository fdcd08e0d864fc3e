//! Zero-copy structured views over a record's payload bytes.
//!
//! Views borrow the session's receive buffer, which is overwritten by every
//! read; the borrow checker therefore guarantees no view survives the next
//! [`next_record`](crate::Session::next_record) call. All views are
//! read-only; no mutation path is exposed.

pub mod config;
pub mod event;
pub mod status;

pub use config::{ConfigView, TraceMapEntry};
pub use event::{ChannelQuery, ChannelReadout, EventView, SparseAccessError};
pub use status::{CardStatusView, StatusView};
