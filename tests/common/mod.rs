//! Synthetic little-endian stream construction shared by the integration
//! tests.

#![allow(dead_code)]

use strobe::{Options, Session};

pub const PREAMBLE_TAG: i32 = -1_000_000_001;
pub const PROTOCOL_NAME: &str = "FlashCamV1";

/// Configuration-record dimensions, with small defaults the tests share.
#[derive(Clone, Copy)]
pub struct Dimensions {
    pub telid: i32,
    pub adcs: i32,
    pub triggers: i32,
    pub eventsamples: i32,
    pub adcbits: i32,
    pub sumlength: i32,
    pub blprecision: i32,
    pub mastercards: i32,
    pub triggercards: i32,
    pub adccards: i32,
    pub gps: i32,
}

impl Default for Dimensions {
    fn default() -> Dimensions {
        Dimensions {
            telid: 1,
            adcs: 4,
            triggers: 1,
            eventsamples: 4,
            adcbits: 12,
            sumlength: 128,
            blprecision: 1,
            mastercards: 1,
            triggercards: 1,
            adccards: 2,
            gps: 0,
        }
    }
}

/// One present channel's block in an event frame.
#[derive(Clone)]
pub struct ChannelBlock {
    pub baseline: u16,
    pub integrator: u16,
    pub samples: Vec<u16>,
}

/// An event, sparse-event, or event-header frame under construction.
#[derive(Clone)]
pub struct EventFrame {
    pub event_type: i32,
    pub pulser: f32,
    pub timeoffset: [i32; 10],
    pub timestamp: [i32; 10],
    pub deadregion: [i32; 10],
    pub trace_list: Vec<u16>,
    pub channels: Vec<ChannelBlock>,
    pub trigger_sums: Vec<Vec<u16>>,
}

impl EventFrame {
    /// A dense event: every configured channel present, one trigger sum per
    /// configured trigger channel, recognizable ramp samples.
    pub fn dense(dims: &Dimensions) -> EventFrame {
        let samples = dims.eventsamples as usize;
        EventFrame {
            event_type: 1,
            pulser: 0.0,
            timeoffset: [0; 10],
            timestamp: [7, 1, 250, 249_999_999, 0, 0, 0, 0, 0, 0],
            deadregion: [0; 10],
            trace_list: (0..dims.adcs as u16).collect(),
            channels: (0..dims.adcs as u16)
                .map(|ch| ChannelBlock {
                    baseline: 100 + ch,
                    integrator: 300 + ch,
                    samples: (0..samples as u16).map(|s| ch * 10 + s).collect(),
                })
                .collect(),
            trigger_sums: vec![vec![0; samples]; dims.triggers as usize],
        }
    }

    /// A sparse event carrying only the listed channels.
    pub fn sparse(dims: &Dimensions, present: &[u16]) -> EventFrame {
        let mut frame = EventFrame::dense(dims);
        frame.trace_list = present.to_vec();
        frame.channels = present
            .iter()
            .map(|&ch| ChannelBlock {
                baseline: 100 + ch,
                integrator: 300 + ch,
                samples: (0..dims.eventsamples as u16).map(|s| ch * 10 + s).collect(),
            })
            .collect();
        frame.trigger_sums.clear();
        frame
    }
}

/// One card's block in a status frame, all counters zero by default.
#[derive(Clone)]
pub struct CardStatusFrame {
    pub reqid: u32,
    pub status: u32,
    pub eventno: u32,
    pub pps: u32,
    pub ticks: u32,
    pub maxticks: u32,
    pub numenv: u32,
    pub numctilinks: u32,
    pub numlinks: u32,
    pub dummy: u32,
    pub totalerrors: u32,
    pub othererrors: [u16; 5],
    pub environment: [u16; 16],
    pub ctierrors: [u16; 4],
    pub linkerrors: [u16; 64],
}

impl Default for CardStatusFrame {
    fn default() -> CardStatusFrame {
        CardStatusFrame {
            reqid: 0,
            status: 0,
            eventno: 0,
            pps: 0,
            ticks: 0,
            maxticks: 0,
            numenv: 0,
            numctilinks: 0,
            numlinks: 0,
            dummy: 0,
            totalerrors: 0,
            othererrors: [0; 5],
            environment: [0; 16],
            ctierrors: [0; 4],
            linkerrors: [0; 64],
        }
    }
}

/// A little-endian record stream under construction.
pub struct StreamBuilder {
    buf: Vec<u8>,
}

impl StreamBuilder {
    /// A stream opening with the expected preamble.
    pub fn new() -> StreamBuilder {
        StreamBuilder::preamble_with(PREAMBLE_TAG, PROTOCOL_NAME)
    }

    /// An empty stream, without a preamble.
    pub fn bare() -> StreamBuilder {
        StreamBuilder { buf: Vec::new() }
    }

    /// A stream opening with an arbitrary preamble.
    pub fn preamble_with(tag: i32, name: &str) -> StreamBuilder {
        let mut builder = StreamBuilder::bare();
        builder.put_i32(tag);
        let mut field = [0u8; 64];
        field[..name.len()].copy_from_slice(name.as_bytes());
        builder.buf.extend_from_slice(&field);
        builder
    }

    pub fn put_i32(&mut self, value: i32) -> &mut StreamBuilder {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_u32(&mut self, value: u32) -> &mut StreamBuilder {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_u16(&mut self, value: u16) -> &mut StreamBuilder {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_f32(&mut self, value: f32) -> &mut StreamBuilder {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Write a record tag for a kind id (negated on the wire).
    pub fn tag(&mut self, kind: i32) -> &mut StreamBuilder {
        self.put_i32(-kind)
    }

    /// Write a configuration record with an identity-free tracemap supplied
    /// by the caller.
    pub fn config(&mut self, dims: &Dimensions, tracemap: &[u32]) -> &mut StreamBuilder {
        assert_eq!(tracemap.len(), dims.adcs.max(0) as usize);
        self.tag(1);
        self.put_i32(dims.telid);
        self.put_i32(dims.adcs);
        self.put_i32(dims.triggers);
        self.put_i32(dims.eventsamples);
        self.put_i32(dims.adcbits);
        self.put_i32(dims.sumlength);
        self.put_i32(dims.blprecision);
        self.put_i32(dims.mastercards);
        self.put_i32(dims.triggercards);
        self.put_i32(dims.adccards);
        self.put_i32(dims.gps);
        for &entry in tracemap {
            self.put_u32(entry);
        }
        self
    }

    fn event_head(&mut self, frame: &EventFrame) {
        self.put_i32(frame.event_type);
        self.put_f32(frame.pulser);
        for v in frame.timeoffset {
            self.put_i32(v);
        }
        for v in frame.timestamp {
            self.put_i32(v);
        }
        for v in frame.deadregion {
            self.put_i32(v);
        }
        self.put_i32(frame.trace_list.len() as i32);
        for &index in &frame.trace_list {
            self.put_u16(index);
        }
    }

    fn channel_blocks(&mut self, frame: &EventFrame) {
        for block in &frame.channels {
            self.put_u16(block.baseline);
            self.put_u16(block.integrator);
            for &sample in &block.samples {
                self.put_u16(sample);
            }
        }
    }

    /// Write a dense event record (kind 3).
    pub fn event(&mut self, frame: &EventFrame) -> &mut StreamBuilder {
        self.tag(3);
        self.event_head(frame);
        self.channel_blocks(frame);
        for sum in &frame.trigger_sums {
            self.put_u16(0);
            self.put_u16(0);
            for &sample in sum {
                self.put_u16(sample);
            }
        }
        self
    }

    /// Write a sparse event record (kind 6).
    pub fn sparse_event(&mut self, frame: &EventFrame) -> &mut StreamBuilder {
        self.tag(6);
        self.event_head(frame);
        self.channel_blocks(frame);
        self
    }

    /// Write an event-header record (kind 7).
    pub fn event_header(&mut self, frame: &EventFrame) -> &mut StreamBuilder {
        self.tag(7);
        self.event_head(frame);
        self
    }

    /// Write a reconstructed-event record (kind 5).
    pub fn rec_event(&mut self) -> &mut StreamBuilder {
        self.tag(5);
        self.put_i32(1);
        self.put_f32(0.0);
        for _ in 0..30 {
            self.put_i32(0);
        }
        self.put_i32(0);
        self
    }

    /// Write a status record (kind 4).
    pub fn status(
        &mut self,
        status: i32,
        statustime: [i32; 10],
        cards: &[CardStatusFrame],
    ) -> &mut StreamBuilder {
        self.tag(4);
        self.put_i32(status);
        for v in statustime {
            self.put_i32(v);
        }
        self.put_i32(cards.len() as i32);
        self.put_i32(222);
        for card in cards {
            self.put_u32(card.reqid);
            self.put_u32(card.status);
            self.put_u32(card.eventno);
            self.put_u32(card.pps);
            self.put_u32(card.ticks);
            self.put_u32(card.maxticks);
            self.put_u32(card.numenv);
            self.put_u32(card.numctilinks);
            self.put_u32(card.numlinks);
            self.put_u32(card.dummy);
            self.put_u32(card.totalerrors);
            for v in card.othererrors {
                self.put_u16(v);
            }
            for v in card.environment {
                self.put_u16(v);
            }
            for v in card.ctierrors {
                self.put_u16(v);
            }
            for v in card.linkerrors {
                self.put_u16(v);
            }
        }
        self
    }

    pub fn finish(&self) -> Vec<u8> {
        self.buf.clone()
    }
}

/// A four-channel tracemap: cards 0x20 and 0x21, two channels each.
pub fn tracemap_2x2() -> Vec<u32> {
    vec![0x0020_0000, 0x0020_0001, 0x0021_0000, 0x0021_0001]
}

/// Open an in-memory session over finished stream bytes.
pub fn open_memory(bytes: Vec<u8>) -> Session {
    Options::memory(bytes).open().expect("stream opens")
}
