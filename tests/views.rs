//! Structured views: shapes, strided projections, and the sparse invariant.

mod common;

use common::{CardStatusFrame, Dimensions, EventFrame, StreamBuilder, open_memory, tracemap_2x2};
use strobe::Tag;

#[test]
fn config_view_exposes_the_dimensions() {
    let dims = Dimensions::default();
    let mut stream = StreamBuilder::new();
    stream.config(&dims, &tracemap_2x2());

    let session = open_memory(stream.finish());
    let config = session.config().expect("config view");

    assert_eq!(config.telid(), 1);
    assert_eq!(config.adcs(), 4);
    assert_eq!(config.triggers(), 1);
    assert_eq!(config.eventsamples(), 4);
    assert_eq!(config.adcbits(), 12);
    assert_eq!(config.sumlength(), 128);
    assert_eq!(config.blprecision(), 1);
    assert_eq!(config.mastercards(), 1);
    assert_eq!(config.triggercards(), 1);
    assert_eq!(config.adccards(), 2);
    assert_eq!(config.gps(), 0);

    let map: Vec<u32> = config.tracemap().iter().map(|m| m.get()).collect();
    assert_eq!(map, tracemap_2x2());
    assert_eq!(config.card_address(2), Some(0x21));
    assert_eq!(config.card_channel(2), Some(0));
    assert_eq!(config.card_address(4), None);

    let schema = session.schema().unwrap();
    assert_eq!(schema.tracemap(), &tracemap_2x2()[..]);
}

#[test]
fn dense_event_views_project_every_channel() {
    let dims = Dimensions::default();
    let mut stream = StreamBuilder::new();
    stream.config(&dims, &tracemap_2x2()).event(&EventFrame::dense(&dims));

    let mut session = open_memory(stream.finish());
    assert_eq!(session.next_record().unwrap(), Some(Tag::Event));

    let event = session.event().expect("event view");
    assert_eq!(event.num_traces(), 4);
    assert!(event.is_dense());
    assert_eq!(event.eventnumber(), 7);
    assert_eq!(event.event_type(), 1);
    assert_eq!(event.pulser(), 0.0);

    let list: Vec<u16> = event.trace_list().iter().map(|t| t.get()).collect();
    assert_eq!(list, [0, 1, 2, 3]);

    let traces = event.traces();
    assert_eq!(traces.len(), 4);
    for (ch, trace) in traces.iter().enumerate() {
        assert_eq!(trace.len(), 4);
        let samples: Vec<u16> = trace.iter().map(|s| s.get()).collect();
        let expected: Vec<u16> = (0..4).map(|s| ch as u16 * 10 + s).collect();
        assert_eq!(samples, expected);
    }

    for ch in 0..4 {
        assert_eq!(event.baseline(ch), Some(100 + ch as u16));
        assert_eq!(event.integrator(ch), Some(300 + ch as u16));
    }
    assert_eq!(event.baseline(4), None);
    assert_eq!(event.trace(4), None);

    let sums = event.trigger_traces().expect("dense records carry sums");
    assert_eq!(sums.len(), 1);
    assert_eq!(sums[0].len(), 4);
}

#[test]
fn sparse_event_views_are_restricted_to_present_channels() {
    let dims = Dimensions::default();
    let mut stream = StreamBuilder::new();
    stream
        .config(&dims, &tracemap_2x2())
        .sparse_event(&EventFrame::sparse(&dims, &[1, 3]));

    let mut session = open_memory(stream.finish());
    assert_eq!(session.next_record().unwrap(), Some(Tag::SparseEvent));

    let event = session.event().expect("event view");
    assert_eq!(event.num_traces(), 2);
    assert!(!event.is_dense());
    assert!(event.num_traces() <= session.schema().unwrap().adcs as usize);

    let list: Vec<u16> = event.trace_list().iter().map(|t| t.get()).collect();
    assert_eq!(list, [1, 3]);

    // Blocks are compact: row 0 holds channel 1, row 1 holds channel 3.
    assert_eq!(event.baseline(0), Some(101));
    assert_eq!(event.baseline(1), Some(103));
    let samples: Vec<u16> = event.trace(1).unwrap().iter().map(|s| s.get()).collect();
    assert_eq!(samples, [30, 31, 32, 33]);

    let err = event.trigger_traces().unwrap_err();
    assert_eq!(err.found, 2);
    assert_eq!(err.expected, 4);
}

#[test]
fn event_header_views_carry_no_trace_blocks() {
    let dims = Dimensions::default();
    let mut stream = StreamBuilder::new();
    stream
        .config(&dims, &tracemap_2x2())
        .event_header(&EventFrame::dense(&dims));

    let mut session = open_memory(stream.finish());
    assert_eq!(session.next_record().unwrap(), Some(Tag::EventHeader));

    let event = session.event().expect("event view");
    assert_eq!(event.num_traces(), 4);
    assert_eq!(event.eventnumber(), 7);
    assert_eq!(event.trace(0), None);
    assert!(event.traces().is_empty());
    assert!(event.trigger_traces().is_err());
}

#[test]
fn status_views_partition_cards_by_schema_counts() {
    let dims = Dimensions::default();

    let cards: Vec<CardStatusFrame> = (0..4)
        .map(|i| CardStatusFrame {
            reqid: 100 + i,
            eventno: 7,
            pps: 12,
            ticks: 5000,
            maxticks: 249_999_999,
            numenv: 3,
            numctilinks: 2,
            numlinks: 5,
            totalerrors: i,
            environment: [900; 16],
            ..CardStatusFrame::default()
        })
        .collect();

    let statustime = [10, 500_000, 11, 250_000, 0, 9, 750_000, 0, 0, 0];

    let mut stream = StreamBuilder::new();
    stream.config(&dims, &tracemap_2x2()).status(1, statustime, &cards);

    let mut session = open_memory(stream.finish());
    assert_eq!(session.next_record().unwrap(), Some(Tag::Status));

    let status = session.status().expect("status view");
    assert_eq!(status.status(), 1);
    assert_eq!(status.cards(), 4);
    assert_eq!(status.size(), 222);
    assert_eq!(status.statustime_master_sec(), 10.5);
    assert_eq!(status.statustime_server_sec(), 11.25);
    assert_eq!(status.starttime_master_sec(), 9.75);

    assert_eq!(status.card_status().len(), 4);
    let master = status.master_card_status();
    assert_eq!(master.len(), 1);
    assert_eq!(master[0].reqid(), 100);

    let trigger = status.trigger_card_status();
    assert_eq!(trigger.len(), 1);
    assert_eq!(trigger[0].reqid(), 101);

    let adc = status.adc_card_status();
    assert_eq!(adc.len(), 2);
    assert_eq!(adc[0].reqid(), 102);
    assert_eq!(adc[1].reqid(), 103);

    let card = &master[0];
    assert_eq!(card.eventno(), 7);
    assert_eq!(card.pps(), 12);
    assert_eq!(card.ticks(), 5000);
    assert_eq!(card.maxticks(), 249_999_999);
    assert_eq!(card.totalerrors(), 0);
    assert_eq!(card.environment().len(), 3);
    assert_eq!(card.environment()[0].get(), 900);
    assert_eq!(card.ctierrors().len(), 2);
    assert_eq!(card.linkerrors().len(), 5);
}

#[test]
fn an_empty_status_record_has_no_cards() {
    let dims = Dimensions::default();
    let mut stream = StreamBuilder::new();
    stream.config(&dims, &tracemap_2x2()).status(0, [0; 10], &[]);

    let mut session = open_memory(stream.finish());
    assert_eq!(session.next_record().unwrap(), Some(Tag::Status));

    let status = session.status().expect("status view");
    assert_eq!(status.cards(), 0);
    assert!(status.card_status().is_empty());
    assert!(status.adc_card_status().is_empty());
}

#[test]
fn view_accessors_match_the_current_record_kind() {
    let dims = Dimensions::default();
    let mut stream = StreamBuilder::new();
    stream.config(&dims, &tracemap_2x2()).event(&EventFrame::dense(&dims));

    let mut session = open_memory(stream.finish());
    assert!(session.config().is_some());
    assert!(session.event().is_none());
    assert!(session.status().is_none());

    session.next_record().unwrap();
    assert!(session.config().is_none());
    assert!(session.event().is_some());
    assert!(session.status().is_none());
}
