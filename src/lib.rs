//! An efficient zero-copy reader for FlashCam's FCIO data-acquisition
//! streams.
//!
//! Strobe decodes the tagged binary records a FlashCam front end writes to
//! files, buffers, and sockets (optionally transport-compressed) into
//! structured views that borrow the receive buffer instead of copying it.
//! The configuration record at the head of a stream fixes the dimensions
//! (channels, samples, triggers, cards) of every record that follows; event
//! and status views are projected against that captured schema.
//!
//! Most users should begin with [`Options`] to open a [`Session`], then
//! drive one of its cursors:
//!
//! ```
//! let mut session = strobe::Options::file("run-0021.fcio").open()?;
//!
//! let mut events = session.events();
//! while let Some(event) = events.next()? {
//!     let region = event.dead_region();
//!     println!("event {} at {} ns", event.eventnumber(), event.runtime_ns());
//!     let (_, total_dead_sec) = events.dead_time(region);
//! }
//! ```
//!
//! Views are short-lived by construction: the receive buffer is overwritten
//! by every read, and the borrow checker refuses a view held across the
//! next one.

pub mod metrics;
pub mod record;
pub mod schema;
pub mod session;
pub mod transport;
pub mod wire;

pub use metrics::{DeadRegion, DeadTimeTracker, pps_ticks_to_seconds};
pub use record::{
    CardStatusView, ChannelQuery, ChannelReadout, ConfigView, EventView, SparseAccessError,
    StatusView, TraceMapEntry,
};
pub use schema::{Schema, SchemaError};
pub use session::{Error, Events, Options, Records, Session, Statuses};
pub use transport::{Compression, Source, Transport, TransportError};
pub use wire::{ProtocolError, Tag};
