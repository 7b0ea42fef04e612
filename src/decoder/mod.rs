//! Protocol decoders
//!
//! Every decoder turns sample arrays into an ordered list of
//! [`DecodedEvent`]s. A decoder is configured once and may be run many
//! times; each [`ProtocolDecoder::analyze`] call throws away the previous
//! events and rescans from the start (or from the sync cursor).
//!
//! - [`i2c`] - two-wire bus (SCL/SDA), 7- and 10-bit addressing
//! - [`uart`] - asynchronous serial with majority-vote bit sampling
//! - [`spi`] - clocked serial with optional enable framing
//!
//! Decoding never fails. A decoder with unassigned channels, missing or
//! unequal sample arrays, or timing it cannot resolve returns no events.
//! Protocol violations show up as error-kind events in the list.

pub mod i2c;
pub mod spi;
pub mod uart;

pub use i2c::{I2cConfig, I2cDecoder, I2cEvent, MAX_BUS_ERRORS};
pub use spi::{EnablePolarity, SpiConfig, SpiDecoder, SpiEvent, SpiMode};
pub use uart::{Parity, UartConfig, UartDecoder, UartEvent, MIN_SAMPLES_PER_BIT};

use crate::capture::SampleSource;
use crate::config::DecoderConfig;
use crate::format::{Describe, EventFormatter, EventLabel};
use crate::types::{DataFormat, DecodedEvent, EventKind, Protocol};

/// Common interface of the protocol decoders
pub trait ProtocolDecoder {
    type Event: EventKind;

    /// Display name of this decoder instance
    fn name(&self) -> &str;

    fn protocol(&self) -> Protocol;

    /// Display format for decoded values
    fn format(&self) -> DataFormat;

    /// Rebuild the event list from `source`
    fn analyze(&mut self, source: &dyn SampleSource) -> &[DecodedEvent<Self::Event>];

    /// Events of the last pass
    fn events(&self) -> &[DecodedEvent<Self::Event>];
}

/// Index the scan starts at: the sync position if it lies inside the
/// arrays, otherwise 0.
pub fn scan_origin(sync: Option<usize>, len: usize) -> usize {
    match sync {
        Some(pos) if pos < len => pos,
        _ => 0,
    }
}

/// Any of the protocol decoders
#[derive(Debug, Clone)]
pub enum Decoder {
    I2c(I2cDecoder),
    Uart(UartDecoder),
    Spi(SpiDecoder),
}

impl Decoder {
    /// Build the decoder a configuration describes
    pub fn from_config(config: DecoderConfig) -> Self {
        match config {
            DecoderConfig::I2c(c) => Decoder::I2c(I2cDecoder::new(c)),
            DecoderConfig::Uart(c) => Decoder::Uart(UartDecoder::new(c)),
            DecoderConfig::Spi(c) => Decoder::Spi(SpiDecoder::new(c)),
        }
    }

    /// Current configuration
    pub fn config(&self) -> DecoderConfig {
        match self {
            Decoder::I2c(d) => DecoderConfig::I2c(d.config().clone()),
            Decoder::Uart(d) => DecoderConfig::Uart(d.config().clone()),
            Decoder::Spi(d) => DecoderConfig::Spi(d.config().clone()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Decoder::I2c(d) => d.name(),
            Decoder::Uart(d) => d.name(),
            Decoder::Spi(d) => d.name(),
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            Decoder::I2c(d) => d.protocol(),
            Decoder::Uart(d) => d.protocol(),
            Decoder::Spi(d) => d.protocol(),
        }
    }

    pub fn format(&self) -> DataFormat {
        match self {
            Decoder::I2c(d) => d.format(),
            Decoder::Uart(d) => d.format(),
            Decoder::Spi(d) => d.format(),
        }
    }

    /// Run a pass, returning the number of events decoded
    pub fn analyze(&mut self, source: &dyn SampleSource) -> usize {
        match self {
            Decoder::I2c(d) => d.analyze(source).len(),
            Decoder::Uart(d) => d.analyze(source).len(),
            Decoder::Spi(d) => d.analyze(source).len(),
        }
    }

    /// Labels for the events of the last pass in the decoder's own format
    pub fn labels(&self) -> Vec<EventLabel> {
        self.labels_with(&EventFormatter::new(self.format()))
    }

    /// Labels for the events of the last pass
    pub fn labels_with(&self, formatter: &EventFormatter) -> Vec<EventLabel> {
        match self {
            Decoder::I2c(d) => label_all(d.events(), formatter),
            Decoder::Uart(d) => label_all(d.events(), formatter),
            Decoder::Spi(d) => label_all(d.events(), formatter),
        }
    }
}

fn label_all<K: Describe>(events: &[DecodedEvent<K>], formatter: &EventFormatter) -> Vec<EventLabel> {
    events.iter().map(|e| formatter.label(e)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureData;
    use crate::signal::UartWaveform;
    use crate::types::{ChannelId, CursorId};

    #[test]
    fn test_scan_origin() {
        assert_eq!(scan_origin(None, 100), 0);
        assert_eq!(scan_origin(Some(40), 100), 40);
        assert_eq!(scan_origin(Some(99), 100), 99);
        assert_eq!(scan_origin(Some(100), 100), 0);
    }

    #[test]
    fn test_decoder_from_config_runs_pass() {
        let rx = ChannelId::new(2).unwrap();
        let mut wave = UartWaveform::new(10, Default::default());
        wave.idle(1);
        wave.frame(b'h' as u16);
        wave.frame(b'i' as u16);
        wave.idle(1);

        let capture = CaptureData::new(96_000).with_channel(rx, wave.finish());
        let mut config = UartConfig::new(rx, 9600);
        config.format = DataFormat::Ascii;

        let mut decoder = Decoder::from_config(DecoderConfig::Uart(config));
        assert_eq!(decoder.protocol(), Protocol::Uart);
        assert_eq!(decoder.analyze(&capture), 2);

        let labels = decoder.labels();
        assert_eq!(labels[0].short_text, "'h'");
        assert_eq!(labels[1].short_text, "'i'");
    }

    #[test]
    fn test_unassigned_channels_clear_previous_events() {
        let rx = ChannelId::new(0).unwrap();
        let mut wave = UartWaveform::new(10, Default::default());
        wave.idle(1);
        wave.frame(0x10);
        wave.idle(1);
        let capture = CaptureData::new(96_000).with_channel(rx, wave.finish());

        let mut decoder = UartDecoder::new(UartConfig::new(rx, 9600));
        assert_eq!(decoder.analyze(&capture).len(), 1);

        decoder.set_config(UartConfig {
            rx: None,
            ..decoder.config().clone()
        });
        assert!(decoder.analyze(&capture).is_empty());
        assert!(decoder.events().is_empty());
    }

    #[test]
    fn test_sync_cursor_resolved_through_source() {
        let rx = ChannelId::new(1).unwrap();
        let mut wave = UartWaveform::new(10, Default::default());
        wave.idle(1);
        wave.frame(0x01);
        let resume = wave.len();
        wave.idle(1);
        wave.frame(0x02);
        wave.idle(1);

        let cursor = CursorId::new(2).unwrap();
        let capture = CaptureData::new(96_000)
            .with_channel(rx, wave.finish())
            .with_cursor(cursor, resume);

        let mut config = UartConfig::new(rx, 9600);
        config.sync_cursor = Some(cursor);
        let mut decoder = UartDecoder::new(config);

        let events = decoder.analyze(&capture);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, UartEvent::Data(0x02));
    }
}
