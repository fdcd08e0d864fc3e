//! Session-scoped dimensional parameters captured from configuration records.

use thiserror::Error;

use crate::record::ConfigView;
use crate::wire::{MAX_CHANNELS, MAX_SAMPLES};

/// An error in the stream's dimensional parameters.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// No configuration record has been seen yet.
    #[error("No configuration record has been seen yet.")]
    Missing,
    /// The configuration declares an out-of-range channel count.
    #[error("Configuration declares {0} channels.")]
    ChannelCount(i32),
    /// The configuration declares an out-of-range sample count.
    #[error("Configuration declares {0} samples per trace.")]
    SampleCount(i32),
    /// The configuration declares an out-of-range trigger count.
    #[error("Configuration declares {0} trigger channels.")]
    TriggerCount(i32),
    /// The configuration declares a negative card count.
    #[error("Configuration declares {0} cards.")]
    CardCount(i32),
    /// No energy calibration is defined for this ADC width.
    #[error("No energy calibration is defined for {0}-bit ADCs.")]
    AdcBits(i32),
    /// The gps flag is negative, selecting no time-offset source.
    #[error("Negative gps flag ({0}) selects no time-offset source.")]
    Gps(i32),
}

/// Dimensional parameters fixing the layout of all records that follow a
/// configuration record.
///
/// Captured from the first configuration record of a session and treated as
/// immutable; a later configuration record *replaces* the schema wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Telescope/crate id.
    pub telid: i32,
    /// Number of configured ADC channels.
    pub adcs: i32,
    /// Number of trigger-sum channels.
    pub triggers: i32,
    /// Samples per trace.
    pub eventsamples: i32,
    /// ADC quantization width in bits.
    pub adcbits: i32,
    /// Integrator summation length in samples.
    pub sumlength: i32,
    /// Fixed-point scale of the fpga baseline.
    pub blprecision: i32,
    /// Master cards in the crate.
    pub mastercards: i32,
    /// Trigger cards in the crate.
    pub triggercards: i32,
    /// ADC cards in the crate.
    pub adccards: i32,
    /// Time-offset source: 0 without gps, positive with gps.
    pub gps: i32,
    tracemap: Vec<u32>,
}

impl Schema {
    /// Capture a schema from a configuration record.
    ///
    /// The view's dimensions are validated here once so every later layout
    /// computation can rely on them.
    pub fn capture(config: &ConfigView) -> Result<Schema, SchemaError> {
        let adcs = config.adcs();
        if adcs <= 0 || adcs > MAX_CHANNELS {
            return Err(SchemaError::ChannelCount(adcs));
        }

        let eventsamples = config.eventsamples();
        if eventsamples <= 0 || eventsamples > MAX_SAMPLES {
            return Err(SchemaError::SampleCount(eventsamples));
        }

        let triggers = config.triggers();
        if triggers < 0 || triggers > MAX_CHANNELS {
            return Err(SchemaError::TriggerCount(triggers));
        }

        for cards in [config.mastercards(), config.triggercards(), config.adccards()] {
            if cards < 0 {
                return Err(SchemaError::CardCount(cards));
            }
        }

        Ok(Schema {
            telid: config.telid(),
            adcs,
            triggers,
            eventsamples,
            adcbits: config.adcbits(),
            sumlength: config.sumlength(),
            blprecision: config.blprecision(),
            mastercards: config.mastercards(),
            triggercards: config.triggercards(),
            adccards: config.adccards(),
            gps: config.gps(),
            tracemap: config.tracemap().iter().map(|m| m.get()).collect(),
        })
    }

    /// The packed card-address/card-channel word of every configured channel.
    pub fn tracemap(&self) -> &[u32] {
        &self.tracemap
    }

    /// Words per channel block in an event's trace region: the baseline and
    /// integrator scalars plus one word per sample.
    pub(crate) fn block_words(&self) -> usize {
        self.eventsamples as usize + 2
    }
}
