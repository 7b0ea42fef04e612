//! Text labels for decoded events
//!
//! Consumers that draw events need a short label that fits a narrow span and
//! a long label for tooltips or wide spans. [`EventFormatter`] derives both
//! from an event's kind and value using the configured [`DataFormat`].
//! Addresses are always shown in hex.

use crate::decoder::{I2cEvent, SpiEvent, UartEvent};
use crate::types::{DataFormat, DecodedEvent, EventKind};
use serde::Serialize;

/// Display text for one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventLabel {
    pub start: usize,
    pub stop: Option<usize>,
    /// Kind identifier, e.g. `"DATA"`
    pub kind: &'static str,
    pub short_text: String,
    pub long_text: String,
    pub is_error: bool,
}

/// Event kinds that can be turned into text
pub trait Describe: EventKind {
    fn short_text(&self, formatter: &EventFormatter) -> String;
    fn long_text(&self, formatter: &EventFormatter) -> String;
}

/// Formats event values and builds labels
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFormatter {
    pub format: DataFormat,
}

impl EventFormatter {
    pub fn new(format: DataFormat) -> Self {
        Self { format }
    }

    /// Format a data value
    pub fn value(&self, value: u32) -> String {
        match self.format {
            DataFormat::Hex => hex(value),
            DataFormat::Decimal => value.to_string(),
            DataFormat::Ascii => match char::from_u32(value) {
                Some(c) if c.is_ascii_graphic() || c == ' ' => format!("'{}'", c),
                _ => hex(value),
            },
        }
    }

    /// Format a bus address
    pub fn address(&self, address: u32) -> String {
        hex(address)
    }

    /// Build the label for an event
    pub fn label<K: Describe>(&self, event: &DecodedEvent<K>) -> EventLabel {
        EventLabel {
            start: event.start,
            stop: event.stop,
            kind: event.kind.name(),
            short_text: event.kind.short_text(self),
            long_text: event.kind.long_text(self),
            is_error: event.kind.is_error(),
        }
    }
}

fn hex(value: u32) -> String {
    format!("0x{:02X}", value)
}

impl Describe for I2cEvent {
    fn short_text(&self, f: &EventFormatter) -> String {
        match *self {
            I2cEvent::Start => "S".to_string(),
            I2cEvent::Stop => "P".to_string(),
            I2cEvent::Ack => "A".to_string(),
            I2cEvent::Nack => "N".to_string(),
            I2cEvent::Data(v) => f.value(v as u32),
            I2cEvent::Address7Write(a) => format!("W:{}", f.address(a as u32)),
            I2cEvent::Address7Read(a) => format!("R:{}", f.address(a as u32)),
            I2cEvent::Address10Write(a) => format!("W:{}", f.address(a as u32)),
            I2cEvent::Address10Read(a) => format!("R:{}", f.address(a as u32)),
            I2cEvent::Error => "E".to_string(),
        }
    }

    fn long_text(&self, f: &EventFormatter) -> String {
        match *self {
            I2cEvent::Start => "Start".to_string(),
            I2cEvent::Stop => "Stop".to_string(),
            I2cEvent::Ack => "ACK".to_string(),
            I2cEvent::Nack => "NACK".to_string(),
            I2cEvent::Data(v) => format!("Data: {}", f.value(v as u32)),
            I2cEvent::Address7Write(a) => format!("Write to {}", f.address(a as u32)),
            I2cEvent::Address7Read(a) => format!("Read from {}", f.address(a as u32)),
            I2cEvent::Address10Write(a) => format!("Write to {} (10-bit)", f.address(a as u32)),
            I2cEvent::Address10Read(a) => format!("Read from {} (10-bit)", f.address(a as u32)),
            I2cEvent::Error => "Bus error".to_string(),
        }
    }
}

impl Describe for UartEvent {
    fn short_text(&self, f: &EventFormatter) -> String {
        match *self {
            UartEvent::Data(v) => f.value(v as u32),
            UartEvent::ParityError(_) => "PE".to_string(),
            UartEvent::FrameError => "FE".to_string(),
        }
    }

    fn long_text(&self, f: &EventFormatter) -> String {
        match *self {
            UartEvent::Data(v) => format!("Data: {}", f.value(v as u32)),
            UartEvent::ParityError(v) => format!("Parity error ({})", f.value(v as u32)),
            UartEvent::FrameError => "Frame error".to_string(),
        }
    }
}

impl Describe for SpiEvent {
    fn short_text(&self, f: &EventFormatter) -> String {
        match *self {
            SpiEvent::Data { mosi, miso: None } => f.value(mosi as u32),
            SpiEvent::Data {
                mosi,
                miso: Some(miso),
            } => format!("{}/{}", f.value(mosi as u32), f.value(miso as u32)),
            SpiEvent::FrameError => "FE".to_string(),
        }
    }

    fn long_text(&self, f: &EventFormatter) -> String {
        match *self {
            SpiEvent::Data { mosi, miso: None } => format!("MOSI: {}", f.value(mosi as u32)),
            SpiEvent::Data {
                mosi,
                miso: Some(miso),
            } => format!(
                "MOSI: {}, MISO: {}",
                f.value(mosi as u32),
                f.value(miso as u32)
            ),
            SpiEvent::FrameError => "Frame error".to_string(),
        }
    }
}
