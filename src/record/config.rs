//! The configuration-record view.

use tartan_bitfield::bitfield;
use zerocopy::byteorder::little_endian::{I32, U32};
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// Fixed-width scalars opening a configuration record.
#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub(crate) struct ConfigHead {
    pub telid: I32,
    pub adcs: I32,
    pub triggers: I32,
    pub eventsamples: I32,
    pub adcbits: I32,
    pub sumlength: I32,
    pub blprecision: I32,
    pub mastercards: I32,
    pub triggercards: I32,
    pub adccards: I32,
    pub gps: I32,
}

pub(crate) const CONFIG_HEAD_BYTES: usize = size_of::<ConfigHead>();

bitfield! {
    /// One channel's position in the crate, packed as a tracemap word: the
    /// card address in the high half, the card channel in the low half.
    pub struct TraceMapEntry(u32) {
        [0..16] pub channel: u16,
        [16..32] pub address: u16,
    }
}

/// Decoded view of a configuration record.
#[derive(Clone, Copy)]
pub struct ConfigView<'b> {
    head: &'b ConfigHead,
    tracemap: &'b [U32],
}

impl<'b> ConfigView<'b> {
    pub(crate) fn decode(payload: &'b [u8]) -> Option<ConfigView<'b>> {
        let (head, rest) = ConfigHead::ref_from_prefix(payload).ok()?;
        let tracemap = <[U32]>::ref_from_bytes(rest).ok()?;

        let adcs = usize::try_from(head.adcs.get()).ok()?;
        (tracemap.len() == adcs).then_some(ConfigView { head, tracemap })
    }

    /// Telescope/crate id.
    pub fn telid(&self) -> i32 {
        self.head.telid.get()
    }

    /// Number of configured ADC channels.
    pub fn adcs(&self) -> i32 {
        self.head.adcs.get()
    }

    /// Number of trigger-sum channels.
    pub fn triggers(&self) -> i32 {
        self.head.triggers.get()
    }

    /// Samples per trace.
    pub fn eventsamples(&self) -> i32 {
        self.head.eventsamples.get()
    }

    /// ADC quantization width in bits.
    pub fn adcbits(&self) -> i32 {
        self.head.adcbits.get()
    }

    /// Integrator summation length in samples.
    pub fn sumlength(&self) -> i32 {
        self.head.sumlength.get()
    }

    /// Fixed-point scale of the fpga baseline.
    pub fn blprecision(&self) -> i32 {
        self.head.blprecision.get()
    }

    /// Master cards in the crate.
    pub fn mastercards(&self) -> i32 {
        self.head.mastercards.get()
    }

    /// Trigger cards in the crate.
    pub fn triggercards(&self) -> i32 {
        self.head.triggercards.get()
    }

    /// ADC cards in the crate.
    pub fn adccards(&self) -> i32 {
        self.head.adccards.get()
    }

    /// Time-offset source: 0 without gps, positive with gps.
    pub fn gps(&self) -> i32 {
        self.head.gps.get()
    }

    /// The packed card-address/card-channel word of every channel.
    pub fn tracemap(&self) -> &'b [U32] {
        self.tracemap
    }

    /// A channel's card address on the backplane.
    pub fn card_address(&self, channel: usize) -> Option<u16> {
        let entry = self.tracemap.get(channel)?;
        Some(TraceMapEntry(entry.get()).address())
    }

    /// A channel's channel number within its card.
    pub fn card_channel(&self, channel: usize) -> Option<u16> {
        let entry = self.tracemap.get(channel)?;
        Some(TraceMapEntry(entry.get()).channel())
    }
}
