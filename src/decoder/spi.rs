//! SPI decoder
//!
//! Decodes a clock line with MOSI and optional MISO data lines into words.
//! An optional enable (chip select) line restricts decoding to the periods
//! where it is asserted.
//!
//! # Clock Modes
//!
//! | Mode | CPOL | CPHA | Sampling edge |
//! |------|------|------|---------------|
//! | 0    | 0    | 0    | rising        |
//! | 1    | 0    | 1    | falling       |
//! | 2    | 1    | 0    | falling       |
//! | 3    | 1    | 1    | rising        |
//!
//! Bits are shifted in MSB-first. When the enable line is released part way
//! through a word a frame error covering the partial word is reported.

use crate::capture::SampleSource;
use crate::decoder::{scan_origin, ProtocolDecoder};
use crate::types::{ChannelId, CursorId, DataFormat, DecodedEvent, EventKind, Protocol};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Supported bits per word
pub const WORD_BITS: RangeInclusive<u8> = 4..=16;

/// Events produced by the SPI decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpiEvent {
    /// A complete word. `miso` is `None` when no MISO channel is assigned.
    Data { mosi: u16, miso: Option<u16> },
    /// Enable was released in the middle of a word
    FrameError,
}

impl EventKind for SpiEvent {
    fn value(&self) -> Option<u32> {
        match *self {
            SpiEvent::Data { mosi, .. } => Some(mosi as u32),
            SpiEvent::FrameError => None,
        }
    }

    fn is_error(&self) -> bool {
        matches!(self, SpiEvent::FrameError)
    }

    fn name(&self) -> &'static str {
        match self {
            SpiEvent::Data { .. } => "DATA",
            SpiEvent::FrameError => "FRAME_ERROR",
        }
    }
}

/// SPI clock mode (polarity and phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SpiMode {
    #[default]
    Mode0,
    Mode1,
    Mode2,
    Mode3,
}

impl SpiMode {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(SpiMode::Mode0),
            1 => Some(SpiMode::Mode1),
            2 => Some(SpiMode::Mode2),
            3 => Some(SpiMode::Mode3),
            _ => None,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            SpiMode::Mode0 => 0,
            SpiMode::Mode1 => 1,
            SpiMode::Mode2 => 2,
            SpiMode::Mode3 => 3,
        }
    }

    /// Clock idle level
    pub fn cpol(&self) -> bool {
        matches!(self, SpiMode::Mode2 | SpiMode::Mode3)
    }

    /// Whether data is sampled on the second (trailing) clock edge
    pub fn cpha(&self) -> bool {
        matches!(self, SpiMode::Mode1 | SpiMode::Mode3)
    }

    /// Clock level right after the sampling edge
    pub fn sample_level(&self) -> bool {
        self.cpol() == self.cpha()
    }
}

impl TryFrom<u8> for SpiMode {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        SpiMode::from_index(value).ok_or_else(|| format!("SPI mode {} out of range", value))
    }
}

impl From<SpiMode> for u8 {
    fn from(mode: SpiMode) -> u8 {
        mode.index()
    }
}

/// Level at which the enable line selects the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnablePolarity {
    #[default]
    ActiveLow,
    ActiveHigh,
}

impl EnablePolarity {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(EnablePolarity::ActiveLow),
            1 => Some(EnablePolarity::ActiveHigh),
            _ => None,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            EnablePolarity::ActiveLow => 0,
            EnablePolarity::ActiveHigh => 1,
        }
    }

    /// Enable level that selects the device
    pub fn active_level(&self) -> bool {
        matches!(self, EnablePolarity::ActiveHigh)
    }
}

/// SPI decoder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiConfig {
    /// Display name of the decoder
    #[serde(default)]
    pub name: String,
    /// Clock channel
    pub sck: Option<ChannelId>,
    /// Master-out channel
    pub mosi: Option<ChannelId>,
    /// Master-in channel
    #[serde(default)]
    pub miso: Option<ChannelId>,
    /// Enable (chip select) channel
    #[serde(default)]
    pub enable: Option<ChannelId>,
    #[serde(default)]
    pub mode: SpiMode,
    #[serde(default)]
    pub enable_polarity: EnablePolarity,
    /// Bits per word (4 to 16)
    #[serde(default = "default_word_bits")]
    pub data_bits: u8,
    /// Display format for data values
    #[serde(default)]
    pub format: DataFormat,
    /// Cursor to start decoding from
    #[serde(default)]
    pub sync_cursor: Option<CursorId>,
}

fn default_word_bits() -> u8 {
    8
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            name: Protocol::Spi.display_name().to_string(),
            sck: None,
            mosi: None,
            miso: None,
            enable: None,
            mode: SpiMode::Mode0,
            enable_polarity: EnablePolarity::ActiveLow,
            data_bits: 8,
            format: DataFormat::Hex,
            sync_cursor: None,
        }
    }
}

impl SpiConfig {
    /// Create config for the given clock and MOSI channels
    pub fn new(sck: ChannelId, mosi: ChannelId) -> Self {
        Self {
            sck: Some(sck),
            mosi: Some(mosi),
            ..Default::default()
        }
    }
}

/// Sample lines handed to [`SpiDecoder::decode_samples`]
#[derive(Debug, Clone, Copy)]
pub struct SpiLines<'a> {
    pub sck: &'a [u8],
    pub mosi: &'a [u8],
    pub miso: Option<&'a [u8]>,
    pub enable: Option<&'a [u8]>,
}

impl SpiLines<'_> {
    /// Length shared by all lines, `None` if they differ or are empty
    fn common_len(&self) -> Option<usize> {
        let len = self.sck.len();
        let same = self.mosi.len() == len
            && self.miso.map_or(true, |m| m.len() == len)
            && self.enable.map_or(true, |e| e.len() == len);
        (same && len > 0).then_some(len)
    }
}

/// Word being shifted in
#[derive(Debug, Default)]
struct WordAccumulator {
    start: Option<usize>,
    bits: u8,
    mosi: u16,
    miso: u16,
}

impl WordAccumulator {
    fn reset(&mut self, start: Option<usize>) {
        *self = WordAccumulator {
            start,
            ..Default::default()
        };
    }

    fn shift(&mut self, index: usize, mosi: bool, miso: bool) {
        self.start.get_or_insert(index);
        self.mosi = (self.mosi << 1) | mosi as u16;
        self.miso = (self.miso << 1) | miso as u16;
        self.bits += 1;
    }
}

/// Look up the configured channels. An assigned optional channel that the
/// source does not carry disables decoding like a missing clock does.
fn resolve_lines<'a>(config: &SpiConfig, source: &'a dyn SampleSource) -> Option<SpiLines<'a>> {
    let sck = source.digital(config.sck?)?;
    let mosi = source.digital(config.mosi?)?;
    let miso = match config.miso {
        Some(ch) => Some(source.digital(ch)?),
        None => None,
    };
    let enable = match config.enable {
        Some(ch) => Some(source.digital(ch)?),
        None => None,
    };

    Some(SpiLines {
        sck,
        mosi,
        miso,
        enable,
    })
}

/// SPI protocol decoder
#[derive(Debug, Clone)]
pub struct SpiDecoder {
    config: SpiConfig,
    events: Vec<DecodedEvent<SpiEvent>>,
}

impl SpiDecoder {
    /// Create a decoder with the given configuration
    pub fn new(config: SpiConfig) -> Self {
        Self {
            config,
            events: Vec::new(),
        }
    }

    /// Get current config
    pub fn config(&self) -> &SpiConfig {
        &self.config
    }

    /// Replace the configuration. Events are kept until the next pass.
    pub fn set_config(&mut self, config: SpiConfig) {
        self.config = config;
    }

    /// Decode raw sample arrays, starting at `sync` if it lies inside them
    pub fn decode_samples(
        &mut self,
        lines: SpiLines<'_>,
        sync: Option<usize>,
    ) -> &[DecodedEvent<SpiEvent>] {
        self.events.clear();

        let Some(len) = lines.common_len() else {
            tracing::debug!("SPI '{}': sample lines empty or unequal", self.config.name);
            return &self.events;
        };

        let word_bits = self.config.data_bits;
        if !WORD_BITS.contains(&word_bits) {
            tracing::warn!(
                "SPI '{}': {} bit words not supported, not decoding",
                self.config.name,
                word_bits
            );
            return &self.events;
        }
        let sample_level = self.config.mode.sample_level();
        let active_level = self.config.enable_polarity.active_level();
        let is_selected = |i: usize| lines.enable.map_or(true, |e| (e[i] != 0) == active_level);

        let origin = scan_origin(sync, len);
        let mut selected = is_selected(origin);
        let mut prev_sck = lines.sck[origin] != 0;
        let mut word = WordAccumulator::default();
        if selected && lines.enable.is_some() {
            word.reset(Some(origin));
        }

        for i in (origin + 1)..len {
            let now_selected = is_selected(i);
            if now_selected != selected {
                if now_selected {
                    word.reset(Some(i));
                } else {
                    if word.bits > 0 {
                        let start = word.start.unwrap_or(i);
                        self.events
                            .push(DecodedEvent::spanning(SpiEvent::FrameError, start, i));
                    }
                    word.reset(None);
                }
                selected = now_selected;
            }

            let sck = lines.sck[i] != 0;
            let sampling_edge = sck != prev_sck && sck == sample_level;
            prev_sck = sck;

            if !selected || !sampling_edge {
                continue;
            }

            let miso = lines.miso.map_or(false, |m| m[i] != 0);
            word.shift(i, lines.mosi[i] != 0, miso);

            if word.bits >= word_bits {
                let kind = SpiEvent::Data {
                    mosi: word.mosi,
                    miso: lines.miso.map(|_| word.miso),
                };
                let start = word.start.unwrap_or(i);
                self.events.push(DecodedEvent::spanning(kind, start, i));
                word.reset(None);
            }
        }

        tracing::debug!(
            "SPI '{}': decoded {} events from sample {}",
            self.config.name,
            self.events.len(),
            origin
        );

        &self.events
    }
}

impl ProtocolDecoder for SpiDecoder {
    type Event = SpiEvent;

    fn name(&self) -> &str {
        &self.config.name
    }

    fn protocol(&self) -> Protocol {
        Protocol::Spi
    }

    fn format(&self) -> DataFormat {
        self.config.format
    }

    fn analyze(&mut self, source: &dyn SampleSource) -> &[DecodedEvent<SpiEvent>] {
        let Some(lines) = resolve_lines(&self.config, source) else {
            self.events.clear();
            return &self.events;
        };

        let sync = self
            .config
            .sync_cursor
            .and_then(|c| source.cursor_position(c));

        self.decode_samples(lines, sync)
    }

    fn events(&self) -> &[DecodedEvent<SpiEvent>] {
        &self.events
    }
}
