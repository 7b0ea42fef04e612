//! Integration tests for I2C decoding
//!
//! These tests run the I2C decoder through the capture layer:
//! - Transactions loaded from text captures
//! - Sync cursor handling through the sample source
//! - The bus error threshold

mod common;

use busdecode_rs::capture::CaptureData;
use busdecode_rs::decoder::{I2cConfig, I2cDecoder, I2cEvent, ProtocolDecoder, MAX_BUS_ERRORS};
use busdecode_rs::format::EventFormatter;
use busdecode_rs::signal::I2cWaveform;
use busdecode_rs::types::DataFormat;
use common::builders::{i2c_write, to_text, CaptureBuilder};
use common::{assert_ordered, ch, cursor, kinds};
use std::io::Cursor;

/// START, `rounds` mid-byte SDA glitches, then a valid write to 0x50
fn glitched_bus(rounds: usize) -> (Vec<u8>, Vec<u8>) {
    let mut wave = I2cWaveform::new(2);
    wave.start();
    for _ in 0..rounds {
        wave.bit(true);
        wave.bit(false);
        wave.bit(true);
        wave.toggle_sda();
    }
    wave.stop();
    wave.start();
    wave.byte(0xA0, true);
    wave.stop();
    wave.finish()
}

#[test]
fn test_write_transaction_from_text_capture() {
    let (scl, sda) = i2c_write(3, 0x50, &[0x12, 0x34]);
    let text = to_text(&[&scl, &sda]);
    let capture = CaptureData::from_reader(100_000, Cursor::new(text)).unwrap();

    let mut decoder = I2cDecoder::new(I2cConfig::new(ch(0), ch(1)));
    let events = decoder.analyze(&capture);

    assert_eq!(
        kinds(events),
        vec![
            I2cEvent::Start,
            I2cEvent::Address7Write(0x50),
            I2cEvent::Ack,
            I2cEvent::Data(0x12),
            I2cEvent::Ack,
            I2cEvent::Data(0x34),
            I2cEvent::Ack,
            I2cEvent::Stop
        ]
    );
    assert_ordered(events);
}

#[test]
fn test_labels_for_transaction() {
    let (scl, sda) = i2c_write(2, 0x50, &[0x0A]);
    let capture = CaptureBuilder::new(100_000)
        .channel(ch(4), scl)
        .channel(ch(5), sda)
        .build();

    let mut decoder = I2cDecoder::new(I2cConfig::new(ch(4), ch(5)));
    let formatter = EventFormatter::new(DataFormat::Decimal);
    let labels: Vec<_> = decoder
        .analyze(&capture)
        .iter()
        .map(|e| formatter.label(e))
        .collect();

    let short: Vec<_> = labels.iter().map(|l| l.short_text.as_str()).collect();
    assert_eq!(short, vec!["S", "W:0x50", "A", "10", "A", "P"]);
    assert_eq!(labels[1].long_text, "Write to 0x50");
    assert!(labels[0].stop.is_none());
    assert!(labels[1].stop.is_some());
}

#[test]
fn test_unassigned_or_missing_channel_gives_nothing() {
    let (scl, sda) = i2c_write(2, 0x50, &[]);
    let capture = CaptureBuilder::new(100_000)
        .channel(ch(0), scl)
        .channel(ch(1), sda)
        .build();

    let mut unassigned = I2cDecoder::new(I2cConfig {
        sda: None,
        ..I2cConfig::new(ch(0), ch(1))
    });
    assert!(unassigned.analyze(&capture).is_empty());

    let mut missing = I2cDecoder::new(I2cConfig::new(ch(0), ch(7)));
    assert!(missing.analyze(&capture).is_empty());
}

#[test]
fn test_sync_cursor_skips_first_transaction() {
    let (mut scl, mut sda) = i2c_write(2, 0x20, &[0x01]);
    let resume = scl.len() - 1;
    let (scl2, sda2) = i2c_write(2, 0x21, &[0x02]);
    scl.extend(scl2);
    sda.extend(sda2);

    let capture = CaptureBuilder::new(100_000)
        .channel(ch(0), scl)
        .channel(ch(1), sda)
        .cursor(cursor(3), resume)
        .build();

    let mut config = I2cConfig::new(ch(0), ch(1));
    config.sync_cursor = Some(cursor(3));
    let mut decoder = I2cDecoder::new(config);
    let events = decoder.analyze(&capture);

    assert_eq!(events[1].kind, I2cEvent::Address7Write(0x21));
    assert!(events.iter().all(|e| e.start > resume));

    // An unplaced cursor starts at sample 0
    let mut config = I2cConfig::new(ch(0), ch(1));
    config.sync_cursor = Some(cursor(4));
    let mut decoder = I2cDecoder::new(config);
    assert_eq!(
        decoder.analyze(&capture)[1].kind,
        I2cEvent::Address7Write(0x20)
    );
}

#[test]
fn test_errors_up_to_threshold_keep_decoding() {
    let (scl, sda) = glitched_bus(MAX_BUS_ERRORS);
    let mut decoder = I2cDecoder::new(I2cConfig::default());
    let events = decoder.decode_samples(&scl, &sda, None);

    let errors = events.iter().filter(|e| e.kind == I2cEvent::Error).count();
    assert_eq!(errors, MAX_BUS_ERRORS);
    assert_eq!(
        kinds(&events[events.len() - 4..]),
        vec![
            I2cEvent::Start,
            I2cEvent::Address7Write(0x50),
            I2cEvent::Ack,
            I2cEvent::Stop
        ]
    );
}

#[test]
fn test_exceeding_threshold_halts_pass() {
    let (scl, sda) = glitched_bus(MAX_BUS_ERRORS + 3);
    let mut decoder = I2cDecoder::new(I2cConfig::default());
    let events = decoder.decode_samples(&scl, &sda, None);

    // START plus the error that crossed the threshold, nothing after
    assert_eq!(events.len(), MAX_BUS_ERRORS + 2);
    assert_eq!(events[0].kind, I2cEvent::Start);
    assert!(events[1..].iter().all(|e| e.kind == I2cEvent::Error));
}

#[test]
fn test_repeated_analyze_is_identical() {
    let (scl, sda) = i2c_write(2, 0x3C, &[0xDE, 0xAD]);
    let capture = CaptureBuilder::new(100_000)
        .channel(ch(0), scl)
        .channel(ch(1), sda)
        .build();

    let mut decoder = I2cDecoder::new(I2cConfig::new(ch(0), ch(1)));
    let first = decoder.analyze(&capture).to_vec();
    let second = decoder.analyze(&capture).to_vec();
    assert_eq!(first, second);
    assert_eq!(decoder.events(), &first[..]);
}
