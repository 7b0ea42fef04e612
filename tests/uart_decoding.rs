//! Integration tests for UART decoding
//!
//! These tests cover frame decoding through the capture layer:
//! - Text decoding at various framings
//! - The samples-per-bit floor
//! - Fatal stop-bit errors

mod common;

use busdecode_rs::decoder::uart::FrameFormat;
use busdecode_rs::decoder::{Parity, ProtocolDecoder, UartConfig, UartDecoder, UartEvent};
use busdecode_rs::format::EventFormatter;
use busdecode_rs::signal::UartWaveform;
use busdecode_rs::types::DataFormat;
use common::builders::{uart_line, CaptureBuilder};
use common::{assert_ordered, ch, kinds};

#[test]
fn test_decode_text_message() {
    let capture = CaptureBuilder::new(96_000)
        .channel(ch(2), uart_line(10, b"Hello"))
        .build();

    let mut decoder = UartDecoder::new(UartConfig::new(ch(2), 9600));
    let events = decoder.analyze(&capture);

    let text: Vec<u8> = events
        .iter()
        .filter_map(|e| match e.kind {
            UartEvent::Data(v) => Some(v as u8),
            _ => None,
        })
        .collect();
    assert_eq!(text, b"Hello");
    assert_ordered(events);

    let formatter = EventFormatter::new(DataFormat::Ascii);
    assert_eq!(formatter.label(&events[0]).short_text, "'H'");
}

#[test]
fn test_seven_bits_even_parity_two_stops() {
    let frame = FrameFormat {
        data_bits: 7,
        stop_bits: 2,
        parity: Parity::Even,
    };
    let mut wave = UartWaveform::new(5, frame);
    wave.idle(2);
    for &byte in b"7E2" {
        wave.frame(byte as u16);
    }
    wave.idle(2);

    let capture = CaptureBuilder::new(50_000)
        .channel(ch(0), wave.finish())
        .build();
    let mut decoder = UartDecoder::new(UartConfig {
        data_bits: 7,
        stop_bits: 2,
        parity: Parity::Even,
        ..UartConfig::new(ch(0), 10_000)
    });

    assert_eq!(
        kinds(decoder.analyze(&capture)),
        vec![
            UartEvent::Data(b'7' as u16),
            UartEvent::Data(b'E' as u16),
            UartEvent::Data(b'2' as u16)
        ]
    );
}

#[test]
fn test_nine_bit_values() {
    let frame = FrameFormat {
        data_bits: 9,
        ..Default::default()
    };
    let mut wave = UartWaveform::new(4, frame);
    wave.idle(1);
    wave.frame(0x1A5);
    wave.idle(1);

    let mut decoder = UartDecoder::new(UartConfig {
        data_bits: 9,
        ..UartConfig::new(ch(0), 1000)
    });
    let events = decoder.decode_samples(&wave.finish(), 4000, None);
    assert_eq!(kinds(events), vec![UartEvent::Data(0x1A5)]);
}

#[test]
fn test_too_few_samples_per_bit() {
    let capture = CaptureBuilder::new(1200)
        .channel(ch(0), uart_line(1, b"abc"))
        .build();

    let mut decoder = UartDecoder::new(UartConfig::new(ch(0), 9600));
    assert!(decoder.analyze(&capture).is_empty());
}

#[test]
fn test_low_stop_bit_halts_decoding() {
    let mut wave = UartWaveform::new(8, FrameFormat::default());
    wave.idle(1);
    wave.frame(b'o' as u16);
    wave.frame(b'k' as u16);
    wave.frame_with_low_stop(0x00);
    wave.idle(1);
    wave.frame(b'x' as u16);
    wave.idle(1);

    let mut decoder = UartDecoder::new(UartConfig::new(ch(0), 1000));
    let events = decoder.decode_samples(&wave.finish(), 8000, None);

    assert_eq!(
        kinds(events),
        vec![
            UartEvent::Data(b'o' as u16),
            UartEvent::Data(b'k' as u16),
            UartEvent::FrameError
        ]
    );
    // Frame error spans the whole broken frame
    let error = &events[2];
    assert_eq!(error.len(), 10 * 8);
}

#[test]
fn test_idle_line_gives_nothing() {
    let mut decoder = UartDecoder::new(UartConfig::new(ch(0), 9600));
    assert!(decoder.decode_samples(&[1; 500], 96_000, None).is_empty());
    assert!(decoder.decode_samples(&[], 96_000, None).is_empty());
}
