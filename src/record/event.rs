//! The event-record view and its derived quantities.
//!
//! Dense events carry one trace block per configured channel followed by the
//! trigger-sum blocks; sparse events carry blocks for the listed channels
//! only, and no trigger region. Every block is `eventsamples + 2` words: the
//! fpga baseline, the fpga integrator, then the trace.

use thiserror::Error;
use zerocopy::byteorder::little_endian::{F32, I32, U16};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::metrics::DeadRegion;
use crate::schema::{Schema, SchemaError};
use crate::wire::Tag;

/// Trigger traces were requested from a record that does not carry them.
#[derive(Debug, Error)]
#[error("No trigger traces on a sparse record ({found} of {expected} channels present).")]
pub struct SparseAccessError {
    /// Channels present in the record.
    pub found: i32,
    /// Channels the configuration declares.
    pub expected: i32,
}

/// Fixed-width scalars opening an event record.
#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub(crate) struct EventHead {
    pub event_type: I32,
    pub pulser: F32,
    pub timeoffset: [I32; 10],
    pub timestamp: [I32; 10],
    pub deadregion: [I32; 10],
    pub num_traces: I32,
}

pub(crate) const EVENT_HEAD_BYTES: usize = size_of::<EventHead>();

/// A channel selector for [`EventView::find_trace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelQuery {
    /// An ADC channel index, matched against the trace list.
    Index(u16),
    /// A packed tracemap word, matched against the configuration.
    Map(u32),
    /// A card address and card channel, packed as `(address << 16) | channel`.
    Card { address: u16, channel: u16 },
}

/// One present channel's decoded readout.
pub struct ChannelReadout<'b> {
    /// The channel's index in the configuration.
    pub trace_index: u16,
    /// The channel's card address on the backplane.
    pub card_address: u16,
    /// The channel's channel number within its card.
    pub card_channel: u16,
    /// The fpga baseline, normalized by the baseline precision.
    pub fpga_baseline: f64,
    /// The fpga energy, per the configured ADC width.
    pub fpga_energy: f64,
    /// The raw trace.
    pub trace: &'b [U16],
}

/// Decoded view of an event, sparse-event, or event-header record.
#[derive(Clone, Copy)]
pub struct EventView<'b> {
    head: &'b EventHead,
    trace_list: &'b [U16],
    traces: &'b [U16],
    schema: &'b Schema,
    has_triggers: bool,
}

impl<'b> EventView<'b> {
    pub(crate) fn decode(payload: &'b [u8], schema: &'b Schema, tag: Tag) -> Option<EventView<'b>> {
        let (head, rest) = EventHead::ref_from_prefix(payload).ok()?;
        let num_traces = usize::try_from(head.num_traces.get()).ok()?;
        let (trace_list, rest) = <[U16]>::ref_from_prefix_with_elems(rest, num_traces).ok()?;
        let traces = <[U16]>::ref_from_bytes(rest).ok()?;

        let expected = match tag {
            Tag::Event => (num_traces + schema.triggers as usize) * schema.block_words(),
            Tag::SparseEvent => num_traces * schema.block_words(),
            _ => 0,
        };
        if traces.len() != expected {
            return None;
        }

        Some(EventView {
            head,
            trace_list,
            traces,
            schema,
            has_triggers: tag == Tag::Event,
        })
    }

    /// The schema in effect when this record was read.
    pub fn schema(&self) -> &'b Schema {
        self.schema
    }

    /// The trigger type of this event.
    pub fn event_type(&self) -> i32 {
        self.head.event_type.get()
    }

    /// The pulser amplitude active during this event.
    pub fn pulser(&self) -> f32 {
        self.head.pulser.get()
    }

    /// The number of traces actually present in this event.
    pub fn num_traces(&self) -> usize {
        self.trace_list.len()
    }

    /// Whether every configured channel is present.
    pub fn is_dense(&self) -> bool {
        self.num_traces() == self.schema.adcs as usize
    }

    /// The ADC channel indices present in this event, in block order.
    pub fn trace_list(&self) -> &'b [U16] {
        self.trace_list
    }

    /// The raw timestamp fields.
    pub fn timestamp(&self) -> &'b [I32; 10] {
        &self.head.timestamp
    }

    /// The raw time-offset fields.
    pub fn timeoffset(&self) -> &'b [I32; 10] {
        &self.head.timeoffset
    }

    /// The raw dead-region fields.
    pub fn deadregion(&self) -> &'b [I32; 10] {
        &self.head.deadregion
    }

    /// The running event number.
    pub fn eventnumber(&self) -> i32 {
        self.head.timestamp[0].get()
    }

    /// Whole pulse-per-second intervals since the acquisition started.
    pub fn timestamp_pps(&self) -> i32 {
        self.head.timestamp[1].get()
    }

    /// Clock ticks into the current pulse-per-second interval.
    pub fn timestamp_ticks(&self) -> i32 {
        self.head.timestamp[2].get()
    }

    /// Clock ticks per pulse-per-second interval.
    pub fn timestamp_maxticks(&self) -> i32 {
        self.head.timestamp[3].get()
    }

    pub fn timeoffset_mu_sec(&self) -> i32 {
        self.head.timeoffset[0].get()
    }

    pub fn timeoffset_mu_usec(&self) -> i32 {
        self.head.timeoffset[1].get()
    }

    pub fn timeoffset_master_sec(&self) -> i32 {
        self.head.timeoffset[2].get()
    }

    pub fn timeoffset_dt_mu_usec(&self) -> i32 {
        self.head.timeoffset[3].get()
    }

    pub fn timeoffset_abs_mu_usec(&self) -> i32 {
        self.head.timeoffset[4].get()
    }

    pub fn timeoffset_start_sec(&self) -> i32 {
        self.head.timeoffset[5].get()
    }

    pub fn timeoffset_start_usec(&self) -> i32 {
        self.head.timeoffset[6].get()
    }

    /// The fpga baseline scalar of the `i`-th present channel.
    pub fn baseline(&self, i: usize) -> Option<u16> {
        if i >= self.num_traces() {
            return None;
        }
        self.traces.get(i * self.schema.block_words()).map(|w| w.get())
    }

    /// The fpga integrator scalar of the `i`-th present channel.
    pub fn integrator(&self, i: usize) -> Option<u16> {
        if i >= self.num_traces() {
            return None;
        }
        self.traces
            .get(i * self.schema.block_words() + 1)
            .map(|w| w.get())
    }

    /// The trace of the `i`-th present channel.
    pub fn trace(&self, i: usize) -> Option<&'b [U16]> {
        if i >= self.num_traces() {
            return None;
        }
        let start = i * self.schema.block_words() + 2;
        self.traces.get(start..start + self.schema.eventsamples as usize)
    }

    /// The traces of all present channels, in block order.
    pub fn traces(&self) -> Vec<&'b [U16]> {
        (0..self.num_traces()).filter_map(|i| self.trace(i)).collect()
    }

    /// The trigger-sum traces.
    ///
    /// Only dense records carry a trigger region; on sparse records this
    /// fails and the session remains usable.
    pub fn trigger_traces(&self) -> Result<Vec<&'b [U16]>, SparseAccessError> {
        if !self.has_triggers {
            return Err(SparseAccessError {
                found: self.num_traces() as i32,
                expected: self.schema.adcs,
            });
        }

        let block = self.schema.block_words();
        let base = self.schema.adcs as usize * block;
        let samples = self.schema.eventsamples as usize;
        Ok((0..self.schema.triggers as usize)
            .map(|t| {
                let start = base + t * block + 2;
                &self.traces[start..start + samples]
            })
            .collect())
    }

    /// The trace of the channel selected by `query`, or `None` when no
    /// present channel matches.
    pub fn find_trace(&self, query: ChannelQuery) -> Option<&'b [U16]> {
        let position = match query {
            ChannelQuery::Index(index) => self.position_of(index),
            ChannelQuery::Map(map) => self.position_of_map(map),
            ChannelQuery::Card { address, channel } => {
                self.position_of_map((address as u32) << 16 | channel as u32)
            }
        }?;
        self.trace(position)
    }

    /// Where a channel index sits in this event's trace list.
    fn position_of(&self, index: u16) -> Option<usize> {
        self.trace_list.iter().position(|t| t.get() == index)
    }

    /// Where a packed tracemap word's channel sits in this event's trace list.
    fn position_of_map(&self, map: u32) -> Option<usize> {
        let channel = self.schema.tracemap().iter().position(|&m| m == map)?;
        self.position_of(channel as u16)
    }
}
