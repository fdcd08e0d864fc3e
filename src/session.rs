//! Sessions: opening a stream, driving the frame reader, and the lazy
//! record cursors.
//!
//! A [`Session`] owns the transport and a single receive buffer that every
//! record is read into; the views handed out by its accessors and cursors
//! borrow that buffer and end at the next read.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use log::{debug, trace, warn};
use thiserror::Error;

use crate::metrics::{DeadRegion, DeadTimeTracker};
use crate::record::config::CONFIG_HEAD_BYTES;
use crate::record::event::EVENT_HEAD_BYTES;
use crate::record::status::{CARD_STATUS_BYTES, STATUS_HEAD_BYTES};
use crate::record::{ConfigView, EventView, SparseAccessError, StatusView};
use crate::schema::{Schema, SchemaError};
use crate::transport::{Compression, Source, Transport, TransportError};
use crate::wire::{self, MAX_CARDS, MAX_CHANNELS, ProtocolError, Tag};

/// A reconstructed event's fixed payload: type, pulser, the three field
/// arrays, and the total pulse count. The same width as an event head.
const REC_EVENT_BYTES: usize = EVENT_HEAD_BYTES;

/// Errors occurring while opening or reading a stream.
#[derive(Debug, Error)]
pub enum Error {
    /// An error from the byte transport.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// An error in the framing of the stream.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// An error in the stream's dimensional parameters.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Trigger traces were requested from a sparse record.
    #[error(transparent)]
    Sparse(#[from] SparseAccessError),
    /// The session is not open.
    #[error("The session is not open.")]
    NotOpen,
}

/// Options configuring how a stream is opened.
#[derive(Debug, Clone)]
pub struct Options {
    source: Source,
    timeout: u32,
    buffer_size: usize,
    compression: Compression,
    debug: u8,
}

impl Options {
    fn new(source: Source) -> Options {
        Options {
            source,
            timeout: 0,
            buffer_size: 0,
            compression: Compression::Auto,
            debug: 0,
        }
    }

    /// Read from a local file, decompressed according to
    /// [`compression`](Options::compression).
    pub fn file(path: impl Into<PathBuf>) -> Options {
        Options::new(Source::File(path.into()))
    }

    /// Read from a raw in-memory buffer.
    pub fn memory(bytes: Vec<u8>) -> Options {
        Options::new(Source::Memory(bytes))
    }

    /// Read from a network peer serving the stream.
    pub fn peer(addr: SocketAddr) -> Options {
        Options::new(Source::Peer(addr))
    }

    /// Bound blocking reads on network peers, in seconds. Zero (the
    /// default) blocks indefinitely.
    pub fn timeout(mut self, seconds: u32) -> Options {
        self.timeout = seconds;
        self
    }

    /// Pre-size the receive buffer, in bytes. Zero (the default) lets the
    /// buffer grow on demand.
    pub fn buffer_size(mut self, bytes: usize) -> Options {
        self.buffer_size = bytes;
        self
    }

    /// Select the transport compression. The default sniffs the source
    /// name's suffix.
    pub fn compression(mut self, compression: Compression) -> Options {
        self.compression = compression;
        self
    }

    /// Raise per-record log verbosity.
    pub fn debug(mut self, level: u8) -> Options {
        self.debug = level;
        self
    }

    /// Open the stream, read its preamble, and scan forward to the first
    /// configuration record so that views are live immediately.
    pub fn open(self) -> Result<Session, Error> {
        let transport = Transport::open(self.source, self.timeout, self.compression)?;

        let mut session = Session {
            transport,
            state: State::Unopened,
            schema: None,
            buf: Vec::with_capacity(self.buffer_size),
            payload: 0,
            last: None,
            dead_time: DeadTimeTracker::new(),
            debug: self.debug,
        };
        session.read_header()?;

        loop {
            match session.next_record()? {
                Some(Tag::Config) => break,
                Some(Tag::Unrecognized(_)) | None => {
                    warn!("stream ended before any configuration record");
                    break;
                }
                Some(tag) => trace!("skipping {tag:?} record before configuration"),
            }
        }

        Ok(session)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unopened,
    HeaderRead,
    Streaming,
    Closed,
}

/// An open record stream and its captured schema.
#[derive(Debug)]
pub struct Session {
    transport: Transport,
    state: State,
    schema: Option<Schema>,
    buf: Vec<u8>,
    payload: usize,
    last: Option<Tag>,
    dead_time: DeadTimeTracker,
    debug: u8,
}

impl Session {
    /// Read and validate the stream preamble.
    ///
    /// Called once by [`Options::open`]; valid only before any record has
    /// been read.
    pub fn read_header(&mut self) -> Result<(), Error> {
        if self.state != State::Unopened {
            return Err(Error::NotOpen);
        }

        let mut head = [0; 4 + wire::PROTOCOL_FIELD_BYTES];
        let full = self
            .transport
            .read_full(&mut head)
            .map_err(TransportError::Read)?;
        if !full {
            self.state = State::Closed;
            let err = io::Error::from(io::ErrorKind::UnexpectedEof);
            return Err(TransportError::Read(err).into());
        }

        let tag = i32::from_le_bytes(head[..4].try_into().unwrap());
        if let Err(err) = wire::validate_preamble(tag, &head[4..]) {
            self.state = State::Closed;
            return Err(err.into());
        }

        self.state = State::HeaderRead;
        debug!("stream speaks {}", wire::PROTOCOL_NAME);
        Ok(())
    }

    /// Read the next record into the receive buffer and return its tag, or
    /// `None` at end of stream.
    ///
    /// A configuration record repopulates the schema before this returns, so
    /// later views always see the schema in effect at their position in the
    /// stream. A [`Tag::Unrecognized`] record closes the session: without a
    /// known payload length the stream cannot be resynchronized.
    pub fn next_record(&mut self) -> Result<Option<Tag>, Error> {
        match self.state {
            State::HeaderRead | State::Streaming => {}
            State::Unopened | State::Closed => return Err(Error::NotOpen),
        }

        let mut raw = [0; 4];
        match self.transport.read_full(&mut raw) {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(err) => {
                self.state = State::Closed;
                return Err(TransportError::Read(err).into());
            }
        }

        let raw = i32::from_le_bytes(raw);
        if raw == 0 {
            debug!("terminating tag; closing the session");
            self.state = State::Closed;
            return Ok(None);
        }

        let tag = Tag::from_kind(raw.wrapping_neg());
        let read = match tag {
            Tag::Config => self.read_config(),
            Tag::Event | Tag::SparseEvent | Tag::EventHeader => self.read_event(tag),
            Tag::Status => self.read_status(),
            Tag::RecEvent => self.read_rec_event(),
            Tag::Unrecognized(kind) => {
                warn!("unknown record kind {kind}; closing the session");
                self.state = State::Closed;
                self.last = Some(tag);
                return Ok(Some(tag));
            }
        };

        match read {
            Ok(true) => {
                self.state = State::Streaming;
                self.last = Some(tag);
                if self.debug > 1 {
                    trace!("{tag:?} record ({} payload bytes)", self.payload);
                }
                Ok(Some(tag))
            }
            Ok(false) => {
                // The record was cut short and may have partially overwritten
                // the buffer; there is no current record anymore.
                self.last = None;
                Ok(None)
            }
            Err(err) => {
                self.state = State::Closed;
                self.last = None;
                Err(err)
            }
        }
    }

    /// The schema captured from the most recent configuration record.
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// The tag of the current record.
    pub fn last_tag(&self) -> Option<Tag> {
        self.last
    }

    /// A view of the current record, if it is a configuration record.
    pub fn config(&self) -> Option<ConfigView<'_>> {
        (self.last == Some(Tag::Config))
            .then(|| ConfigView::decode(&self.buf[..self.payload]))
            .flatten()
    }

    /// A view of the current record, if it is an event, sparse-event, or
    /// event-header record.
    pub fn event(&self) -> Option<EventView<'_>> {
        let tag = self.last.filter(|t| t.is_event())?;
        EventView::decode(&self.buf[..self.payload], self.schema.as_ref()?, tag)
    }

    /// A view of the current record, if it is a status record.
    pub fn status(&self) -> Option<StatusView<'_>> {
        (self.last == Some(Tag::Status))
            .then(|| StatusView::decode(&self.buf[..self.payload], self.schema.as_ref()?))
            .flatten()
    }

    /// Fold an event's dead region into the session's running total.
    ///
    /// Returns the interval contributed by this region and the cumulative
    /// total, in seconds. Call once per event, in encounter order.
    pub fn dead_time(&mut self, region: DeadRegion) -> (f64, f64) {
        self.dead_time.observe(region)
    }

    /// The session's running dead-time state.
    pub fn dead_time_tracker(&self) -> &DeadTimeTracker {
        &self.dead_time
    }

    /// A cursor over every remaining record.
    pub fn records(&mut self) -> Records<'_> {
        Records { session: self }
    }

    /// A cursor over the remaining event and sparse-event records.
    pub fn events(&mut self) -> Events<'_> {
        Events { session: self }
    }

    /// A cursor over the remaining status records.
    pub fn statuses(&mut self) -> Statuses<'_> {
        Statuses { session: self }
    }

    /// Release the stream. Closing is idempotent; further reads fail with
    /// [`Error::NotOpen`].
    pub fn close(&mut self) -> Result<(), Error> {
        if self.state == State::Closed {
            return Ok(());
        }
        self.state = State::Closed;
        self.transport.close()?;
        Ok(())
    }

    /// Grow the receive buffer as needed and fill `start..start + len`.
    fn fill(&mut self, start: usize, len: usize) -> Result<bool, Error> {
        if self.buf.len() < start + len {
            self.buf.resize(start + len, 0);
        }
        self.transport
            .read_full(&mut self.buf[start..start + len])
            .map_err(|err| TransportError::Read(err).into())
    }

    fn read_config(&mut self) -> Result<bool, Error> {
        if !self.fill(0, CONFIG_HEAD_BYTES)? {
            return Ok(false);
        }

        let adcs = i32::from_le_bytes(self.buf[4..8].try_into().unwrap());
        if adcs <= 0 || adcs > MAX_CHANNELS {
            return Err(SchemaError::ChannelCount(adcs).into());
        }

        let map_bytes = adcs as usize * 4;
        if !self.fill(CONFIG_HEAD_BYTES, map_bytes)? {
            return Ok(false);
        }
        self.payload = CONFIG_HEAD_BYTES + map_bytes;

        let view = ConfigView::decode(&self.buf[..self.payload])
            .expect("config payload sized by the reader");
        let schema = Schema::capture(&view)?;
        if let Some(old) = &self.schema {
            if *old != schema {
                debug!("configuration replaced; earlier views are stale");
            }
        }
        self.schema = Some(schema);
        Ok(true)
    }

    fn read_event(&mut self, tag: Tag) -> Result<bool, Error> {
        if !self.fill(0, EVENT_HEAD_BYTES)? {
            return Ok(false);
        }

        let num_traces = i32::from_le_bytes(
            self.buf[EVENT_HEAD_BYTES - 4..EVENT_HEAD_BYTES].try_into().unwrap(),
        );

        // A header-only record can precede the configuration (it carries no
        // trace blocks); sized records cannot.
        let adcs = match (&self.schema, tag) {
            (Some(schema), _) => schema.adcs,
            (None, Tag::EventHeader) => MAX_CHANNELS,
            (None, _) => return Err(SchemaError::Missing.into()),
        };

        let bound = match tag {
            Tag::Event if num_traces != adcs => Some("exactly"),
            Tag::SparseEvent if num_traces < 0 || num_traces >= adcs => Some("fewer than"),
            Tag::EventHeader if num_traces < 0 || num_traces > adcs => Some("at most"),
            _ => None,
        };
        if let Some(bound) = bound {
            return Err(ProtocolError::TraceCount {
                tag,
                found: num_traces,
                expected: adcs,
                bound,
            }
            .into());
        }

        let list_bytes = num_traces as usize * 2;
        if !self.fill(EVENT_HEAD_BYTES, list_bytes)? {
            return Ok(false);
        }

        let block_bytes = match (tag, &self.schema) {
            (Tag::Event, Some(schema)) => {
                (num_traces as usize + schema.triggers as usize) * schema.block_words() * 2
            }
            (Tag::SparseEvent, Some(schema)) => num_traces as usize * schema.block_words() * 2,
            _ => 0,
        };
        if !self.fill(EVENT_HEAD_BYTES + list_bytes, block_bytes)? {
            return Ok(false);
        }

        self.payload = EVENT_HEAD_BYTES + list_bytes + block_bytes;
        Ok(true)
    }

    fn read_status(&mut self) -> Result<bool, Error> {
        if self.schema.is_none() {
            return Err(SchemaError::Missing.into());
        }

        if !self.fill(0, STATUS_HEAD_BYTES)? {
            return Ok(false);
        }

        let cards = i32::from_le_bytes(
            self.buf[STATUS_HEAD_BYTES - 8..STATUS_HEAD_BYTES - 4].try_into().unwrap(),
        );
        if cards < 0 || cards > MAX_CARDS {
            return Err(ProtocolError::CardCount(cards).into());
        }

        let body = cards as usize * CARD_STATUS_BYTES;
        if !self.fill(STATUS_HEAD_BYTES, body)? {
            return Ok(false);
        }

        self.payload = STATUS_HEAD_BYTES + body;
        Ok(true)
    }

    fn read_rec_event(&mut self) -> Result<bool, Error> {
        if !self.fill(0, REC_EVENT_BYTES)? {
            return Ok(false);
        }
        self.payload = REC_EVENT_BYTES;
        Ok(true)
    }
}

/// A forward-only cursor over every record of a session.
///
/// Dropping the cursor leaves the session open; a later cursor resumes from
/// the current stream position.
pub struct Records<'s> {
    session: &'s mut Session,
}

impl Records<'_> {
    /// The next record's tag, or `None` at end of stream.
    pub fn next(&mut self) -> Result<Option<Tag>, Error> {
        self.session.next_record()
    }

    /// A view of the current record, if it is a configuration record.
    pub fn config(&self) -> Option<ConfigView<'_>> {
        self.session.config()
    }

    /// A view of the current record, if it is an event-carrying record.
    pub fn event(&self) -> Option<EventView<'_>> {
        self.session.event()
    }

    /// A view of the current record, if it is a status record.
    pub fn status(&self) -> Option<StatusView<'_>> {
        self.session.status()
    }
}

/// A forward-only cursor over a session's event and sparse-event records.
pub struct Events<'s> {
    session: &'s mut Session,
}

impl Events<'_> {
    /// The next event view, or `None` at end of stream.
    pub fn next(&mut self) -> Result<Option<EventView<'_>>, Error> {
        loop {
            match self.session.next_record()? {
                None => return Ok(None),
                Some(Tag::Event | Tag::SparseEvent) => break,
                Some(Tag::Unrecognized(kind)) => {
                    return Err(ProtocolError::UnknownKind(kind).into());
                }
                Some(_) => {}
            }
        }
        Ok(self.session.event())
    }

    /// Fold an event's dead region into the session's running total.
    pub fn dead_time(&mut self, region: DeadRegion) -> (f64, f64) {
        self.session.dead_time(region)
    }
}

/// A forward-only cursor over a session's status records.
pub struct Statuses<'s> {
    session: &'s mut Session,
}

impl Statuses<'_> {
    /// The next status view, or `None` at end of stream.
    pub fn next(&mut self) -> Result<Option<StatusView<'_>>, Error> {
        loop {
            match self.session.next_record()? {
                None => return Ok(None),
                Some(Tag::Status) => break,
                Some(Tag::Unrecognized(kind)) => {
                    return Err(ProtocolError::UnknownKind(kind).into());
                }
                Some(_) => {}
            }
        }
        Ok(self.session.status())
    }
}
