//! Wire-level protocol knowledge: the stream preamble and record tags.
//!
//! A stream opens with a fixed 68-byte preamble (a distinguished header tag
//! and a padded protocol name), followed by records. Each record is a 4-byte
//! little-endian tag holding the *negation* of its kind id, immediately
//! followed by a kind-specific payload.

use thiserror::Error;

/// Distinguished tag value opening every stream.
pub const PREAMBLE_TAG: i32 = -1_000_000_001;

/// Protocol name carried in the preamble.
pub const PROTOCOL_NAME: &str = "FlashCamV1";

/// Width of the padded protocol-name field following the preamble tag.
pub const PROTOCOL_FIELD_BYTES: usize = 64;

/// Upper bound on the configured channel count.
pub const MAX_CHANNELS: i32 = 2304;

/// Upper bound on the configured samples per trace.
pub const MAX_SAMPLES: i32 = 8192;

/// Upper bound on the card count of a status record.
pub const MAX_CARDS: i32 = 256;

/// An error in the framing of the stream.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The stream does not open with the distinguished preamble tag.
    #[error("Not an FCIO stream (preamble tag {0}).")]
    Preamble(i32),
    /// The preamble names a protocol this reader does not speak.
    #[error("Unknown stream protocol {0:?}.")]
    Protocol(String),
    /// A record announced a kind id outside the known set.
    #[error("Unknown record kind {0}; the stream cannot be resynchronized.")]
    UnknownKind(i32),
    /// A record declared a trace count its configuration does not allow.
    #[error("{tag:?} record declares {found} traces, expected {bound} {expected}.")]
    TraceCount {
        tag: Tag,
        found: i32,
        expected: i32,
        bound: &'static str,
    },
    /// A status record declared an out-of-range card count.
    #[error("Status record declares {0} cards.")]
    CardCount(i32),
}

/// The structural kind of a record.
///
/// On the wire a record's tag is the negation of its kind id; [`Tag::from_kind`]
/// maps decoded (positive) kind ids back onto this set. Kind ids outside the
/// set decode to [`Tag::Unrecognized`]: they are reported, never silently
/// skipped, but their payload length is unknowable, so the stream ends there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Dimensional parameters governing the layout of all later records.
    Config,
    /// A dense event: every configured channel is present.
    Event,
    /// Data-taking health counters for every card in the crate.
    Status,
    /// A reconstructed event (recognized and consumed, no structured view).
    RecEvent,
    /// A sparse event: only a subset of channels is present.
    SparseEvent,
    /// An event's scalar fields and trace list without its traces.
    EventHeader,
    /// A kind id outside the known set.
    Unrecognized(i32),
}

impl Tag {
    /// Map a decoded (positive) kind id onto the known set.
    pub fn from_kind(kind: i32) -> Tag {
        match kind {
            1 => Tag::Config,
            3 => Tag::Event,
            4 => Tag::Status,
            5 => Tag::RecEvent,
            6 => Tag::SparseEvent,
            7 => Tag::EventHeader,
            k => Tag::Unrecognized(k),
        }
    }

    /// The kind id encoded (negated) in this record's wire tag.
    pub fn kind(self) -> i32 {
        match self {
            Tag::Config => 1,
            Tag::Event => 3,
            Tag::Status => 4,
            Tag::RecEvent => 5,
            Tag::SparseEvent => 6,
            Tag::EventHeader => 7,
            Tag::Unrecognized(k) => k,
        }
    }

    /// Whether records of this kind carry an event view.
    pub(crate) fn is_event(self) -> bool {
        matches!(self, Tag::Event | Tag::SparseEvent | Tag::EventHeader)
    }
}

/// Validate the preamble's header tag and padded protocol-name field.
pub fn validate_preamble(tag: i32, name: &[u8]) -> Result<(), ProtocolError> {
    if tag != PREAMBLE_TAG {
        return Err(ProtocolError::Preamble(tag));
    }

    // The name field is padded with zeroes or spaces to its full width.
    let name = name.split(|&b| b == 0).next().unwrap_or(name).trim_ascii_end();
    if name != PROTOCOL_NAME.as_bytes() {
        let name = String::from_utf8_lossy(name).into_owned();
        return Err(ProtocolError::Protocol(name));
    }

    Ok(())
}
