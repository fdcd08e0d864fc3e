//! The status-record view and its per-card sub-records.

use zerocopy::byteorder::little_endian::{I32, U16, U32};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::schema::Schema;

/// Fixed-width scalars opening a status record.
#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub(crate) struct StatusHead {
    pub status: I32,
    pub statustime: [I32; 10],
    pub cards: I32,
    pub size: I32,
}

pub(crate) const STATUS_HEAD_BYTES: usize = size_of::<StatusHead>();

/// One card's fixed-size status block.
#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub(crate) struct CardStatusBlock {
    pub reqid: U32,
    pub status: U32,
    pub eventno: U32,
    pub pps: U32,
    pub ticks: U32,
    pub maxticks: U32,
    pub numenv: U32,
    pub numctilinks: U32,
    pub numlinks: U32,
    pub dummy: U32,
    pub totalerrors: U32,
    pub othererrors: [U16; 5],
    pub environment: [U16; 16],
    pub ctierrors: [U16; 4],
    pub linkerrors: [U16; 64],
}

pub(crate) const CARD_STATUS_BYTES: usize = size_of::<CardStatusBlock>();

/// Decoded view of a status record.
#[derive(Clone, Copy)]
pub struct StatusView<'b> {
    head: &'b StatusHead,
    cards: &'b [CardStatusBlock],
    schema: &'b Schema,
}

impl<'b> StatusView<'b> {
    pub(crate) fn decode(payload: &'b [u8], schema: &'b Schema) -> Option<StatusView<'b>> {
        let (head, rest) = StatusHead::ref_from_prefix(payload).ok()?;
        let count = usize::try_from(head.cards.get()).ok()?;
        let (cards, rest) = <[CardStatusBlock]>::ref_from_prefix_with_elems(rest, count).ok()?;

        rest.is_empty().then_some(StatusView { head, cards, schema })
    }

    /// The crate-level status code: 0 errors, 1 no errors.
    pub fn status(&self) -> i32 {
        self.head.status.get()
    }

    /// The raw status-time fields: master sec/usec, server sec/usec, and
    /// start-time sec/usec at indices 5 and 6.
    pub fn statustime(&self) -> &'b [I32; 10] {
        &self.head.statustime
    }

    /// The master card's clock at the time of the status, in seconds.
    pub fn statustime_master_sec(&self) -> f64 {
        self.head.statustime[0].get() as f64 + self.head.statustime[1].get() as f64 * 1e-6
    }

    /// The readout server's clock at the time of the status, in seconds.
    pub fn statustime_server_sec(&self) -> f64 {
        self.head.statustime[2].get() as f64 + self.head.statustime[3].get() as f64 * 1e-6
    }

    /// The master card's clock at the start of the run, in seconds.
    pub fn starttime_master_sec(&self) -> f64 {
        self.head.statustime[5].get() as f64 + self.head.statustime[6].get() as f64 * 1e-6
    }

    /// Cards reporting in this record.
    pub fn cards(&self) -> usize {
        self.cards.len()
    }

    /// The declared per-card payload size in bytes.
    pub fn size(&self) -> i32 {
        self.head.size.get()
    }

    /// Every card's status, master cards first, then trigger, then ADC.
    pub fn card_status(&self) -> Vec<CardStatusView<'b>> {
        self.cards.iter().map(|block| CardStatusView { block }).collect()
    }

    /// The master cards' statuses.
    pub fn master_card_status(&self) -> Vec<CardStatusView<'b>> {
        self.partition(0, self.schema.mastercards)
    }

    /// The trigger cards' statuses.
    pub fn trigger_card_status(&self) -> Vec<CardStatusView<'b>> {
        self.partition(self.schema.mastercards, self.schema.triggercards)
    }

    /// The ADC cards' statuses.
    pub fn adc_card_status(&self) -> Vec<CardStatusView<'b>> {
        let start = self.schema.mastercards + self.schema.triggercards;
        self.partition(start, self.cards.len() as i32 - start)
    }

    fn partition(&self, start: i32, count: i32) -> Vec<CardStatusView<'b>> {
        let start = (start.max(0) as usize).min(self.cards.len());
        let end = (start + count.max(0) as usize).min(self.cards.len());
        self.cards[start..end]
            .iter()
            .map(|block| CardStatusView { block })
            .collect()
    }
}

/// Decoded view of one card's status block.
#[derive(Clone, Copy)]
pub struct CardStatusView<'b> {
    block: &'b CardStatusBlock,
}

impl<'b> CardStatusView<'b> {
    /// The request id the card is answering.
    pub fn reqid(&self) -> u32 {
        self.block.reqid.get()
    }

    /// The card's status code.
    pub fn status(&self) -> u32 {
        self.block.status.get()
    }

    /// The card's current event counter.
    pub fn eventno(&self) -> u32 {
        self.block.eventno.get()
    }

    /// Whole pulse-per-second intervals on the card's clock.
    pub fn pps(&self) -> u32 {
        self.block.pps.get()
    }

    /// Clock ticks into the current pulse-per-second interval.
    pub fn ticks(&self) -> u32 {
        self.block.ticks.get()
    }

    /// Clock ticks per pulse-per-second interval.
    pub fn maxticks(&self) -> u32 {
        self.block.maxticks.get()
    }

    pub fn numenv(&self) -> u32 {
        self.block.numenv.get()
    }

    pub fn numctilinks(&self) -> u32 {
        self.block.numctilinks.get()
    }

    pub fn numlinks(&self) -> u32 {
        self.block.numlinks.get()
    }

    pub fn dummy(&self) -> u32 {
        self.block.dummy.get()
    }

    /// Errors of all classes accumulated by the card.
    pub fn totalerrors(&self) -> u32 {
        self.block.totalerrors.get()
    }

    /// The fixed five miscellaneous error counters.
    pub fn othererrors(&self) -> &'b [U16; 5] {
        &self.block.othererrors
    }

    /// Environment sensor readings, truncated to the declared count.
    pub fn environment(&self) -> &'b [U16] {
        let n = (self.block.numenv.get() as usize).min(self.block.environment.len());
        &self.block.environment[..n]
    }

    /// CTI link error counters, truncated to the declared count.
    pub fn ctierrors(&self) -> &'b [U16] {
        let n = (self.block.numctilinks.get() as usize).min(self.block.ctierrors.len());
        &self.block.ctierrors[..n]
    }

    /// Link error counters, truncated to the declared count.
    pub fn linkerrors(&self) -> &'b [U16] {
        let n = (self.block.numlinks.get() as usize).min(self.block.linkerrors.len());
        &self.block.linkerrors[..n]
    }
}
