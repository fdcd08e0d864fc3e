//! Derived physical quantities: time conversion, dead-time accounting, and
//! fpga baseline/energy normalization.

use crate::record::event::{ChannelReadout, EventView};
use crate::record::TraceMapEntry;
use crate::schema::SchemaError;

/// Convert a pps/ticks counter pair to seconds.
///
/// The denominator is the raw `maxticks` value; the nanosecond paths below
/// divide the sample period by `maxticks + 1`. Both forms appear in the
/// acquisition's own arithmetic and are kept distinct per use site.
pub fn pps_ticks_to_seconds(pps: i32, ticks: i32, maxticks: i32) -> f64 {
    (pps as f64 * maxticks as f64 + ticks as f64) / maxticks as f64
}

/// One event's dead region: the interval during which the acquisition could
/// not accept new triggers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeadRegion {
    pub start_pps: i32,
    pub start_ticks: i32,
    pub stop_pps: i32,
    pub stop_ticks: i32,
    pub maxticks: i32,
}

impl DeadRegion {
    /// The region's start since acquisition start, in seconds.
    pub fn start_sec(&self) -> f64 {
        pps_ticks_to_seconds(self.start_pps, self.start_ticks, self.maxticks)
    }

    /// The region's stop since acquisition start, in seconds.
    pub fn stop_sec(&self) -> f64 {
        pps_ticks_to_seconds(self.stop_pps, self.stop_ticks, self.maxticks)
    }
}

/// Running dead-time accounting across a session's events.
///
/// Events repeat the most recent dead region until a new one opens, so an
/// interval only counts when its stop time advances past everything already
/// recorded; replayed or out-of-order regions contribute zero.
#[derive(Debug, Default, Clone)]
pub struct DeadTimeTracker {
    last_stop_sec: f64,
    total_sec: f64,
}

impl DeadTimeTracker {
    pub fn new() -> DeadTimeTracker {
        DeadTimeTracker::default()
    }

    /// Fold one dead region into the running total.
    ///
    /// Returns the interval contributed by this region (zero unless its stop
    /// strictly exceeds the last recorded stop) and the cumulative total.
    pub fn observe(&mut self, region: DeadRegion) -> (f64, f64) {
        let stop = region.stop_sec();
        if stop > self.last_stop_sec {
            self.last_stop_sec = stop;
            let interval = stop - region.start_sec();
            self.total_sec += interval;
            (interval, self.total_sec)
        } else {
            (0.0, self.total_sec)
        }
    }

    /// The stop time of the last counted dead region, in seconds.
    pub fn last_stop_sec(&self) -> f64 {
        self.last_stop_sec
    }

    /// The accumulated dead time, in seconds.
    pub fn total_sec(&self) -> f64 {
        self.total_sec
    }
}

impl<'b> EventView<'b> {
    /// The sampling period, in nanoseconds.
    pub fn last_sample_period_ns(&self) -> f64 {
        1e9 / (self.timestamp_maxticks() as f64 + 1.0)
    }

    /// Event time relative to the acquisition start, in nanoseconds.
    pub fn runtime_ns(&self) -> i64 {
        let sample_period = 1e9 / (self.timestamp_maxticks() as f64 + 1.0);
        let event_ns = (self.timestamp_ticks() as f64 * sample_period) as i64;
        let start_ns = self.timeoffset_start_sec() as f64 * 1e9
            + self.timeoffset_start_usec() as f64 * 1e3;
        self.timestamp_pps() as i64 * 1_000_000_000 + event_ns - start_ns as i64
    }

    /// Event time relative to the acquisition start, in seconds.
    pub fn runtime_sec(&self) -> f64 {
        self.runtime_ns() as f64 * 1e-9
    }

    /// Absolute event time, in nanoseconds.
    ///
    /// Without gps (`gps == 0`) the readout server's second/microsecond
    /// offset anchors the event; with gps (`gps > 0`) the master card's
    /// second offset does. The branch is on the flag's sign: a negative flag
    /// selects no offset source and fails.
    pub fn event_time_ns(&self) -> Result<i64, SchemaError> {
        let gps = self.schema().gps;
        let offset_ns = if gps == 0 {
            self.timeoffset_mu_sec() as i64 * 1_000_000_000
                + self.timeoffset_mu_usec() as i64 * 1_000
        } else if gps > 0 {
            self.timeoffset_master_sec() as i64 * 1_000_000_000
        } else {
            return Err(SchemaError::Gps(gps));
        };
        Ok(self.runtime_ns() + offset_ns)
    }

    /// Absolute event time, in seconds.
    pub fn event_time_sec(&self) -> Result<f64, SchemaError> {
        Ok(self.event_time_ns()? as f64 * 1e-9)
    }

    /// This event's dead region.
    pub fn dead_region(&self) -> DeadRegion {
        let region = self.deadregion();
        DeadRegion {
            start_pps: region[0].get(),
            start_ticks: region[1].get(),
            stop_pps: region[2].get(),
            stop_ticks: region[3].get(),
            maxticks: region[4].get(),
        }
    }

    /// The present channels' fpga baselines, normalized by the baseline
    /// precision.
    pub fn fpga_baselines(&self) -> Vec<f64> {
        let precision = self.schema().blprecision as f64;
        (0..self.num_traces())
            .filter_map(|i| self.baseline(i))
            .map(|b| b as f64 / precision)
            .collect()
    }

    /// The present channels' fpga energies.
    ///
    /// 12-bit ADCs scale the baseline-subtracted integrator by
    /// `sumlength / blprecision`; 16-bit ADCs report the integrator as-is.
    /// No calibration is defined for other widths.
    pub fn fpga_energies(&self) -> Result<Vec<f64>, SchemaError> {
        let schema = self.schema();
        match schema.adcbits {
            12 => {
                let scale = schema.sumlength as f64 / schema.blprecision as f64;
                Ok((0..self.num_traces())
                    .filter_map(|i| Some((self.integrator(i)?, self.baseline(i)?)))
                    .map(|(integrator, baseline)| {
                        (integrator as f64 - baseline as f64) * scale
                    })
                    .collect())
            }
            16 => Ok((0..self.num_traces())
                .filter_map(|i| self.integrator(i))
                .map(|integrator| integrator as f64)
                .collect()),
            bits => Err(SchemaError::AdcBits(bits)),
        }
    }

    /// Every present channel's decoded readout, in block order.
    pub fn readouts(&self) -> Result<Vec<ChannelReadout<'b>>, SchemaError> {
        let energies = self.fpga_energies()?;
        let baselines = self.fpga_baselines();
        let tracemap = self.schema().tracemap();

        Ok((0..self.num_traces())
            .filter_map(|i| {
                let trace_index = self.trace_list().get(i)?.get();
                let entry = TraceMapEntry::from(*tracemap.get(trace_index as usize)?);
                Some(ChannelReadout {
                    trace_index,
                    card_address: entry.address(),
                    card_channel: entry.channel(),
                    fpga_baseline: *baselines.get(i)?,
                    fpga_energy: *energies.get(i)?,
                    trace: self.trace(i)?,
                })
            })
            .collect())
    }
}
