//! UART decoder
//!
//! Decodes one asynchronous serial line into data bytes, using the configured
//! baud rate, data bits, stop bits and parity.
//!
//! # Bit Sampling
//!
//! Each bit is decided by majority vote over a window of
//! `sample_rate / baud_rate` samples. A level change in the second half of
//! a window ends the window early at that edge, so the decoder re-aligns to
//! the transmitter's bit boundaries as it goes. Changes in the first half are
//! treated as jitter.
//!
//! Below [`MIN_SAMPLES_PER_BIT`] samples per bit nothing is decoded.
//!
//! # Frames
//!
//! ```text
//!  idle  start  d0 d1 ... dN  [parity]  stop [stop]  idle
//!  ‾‾‾‾‾‾|_____|XX|XX|...|XX|   XX    |‾‾‾‾|‾‾‾‾|‾‾‾‾‾‾
//! ```
//!
//! Until the first start bit has been seen the decoder hunts for edges
//! and ignores whatever it finds that is not a start bit. A low level on the
//! very first sample is taken as a falling edge from idle. A stop bit read as
//! 0 is a frame error and ends the pass, since bit alignment is lost.
//!
//! A config with data or stop bit counts outside [`DATA_BITS`] and
//! [`STOP_BITS`] decodes nothing.

use crate::capture::SampleSource;
use crate::decoder::{scan_origin, ProtocolDecoder};
use crate::types::{ChannelId, CursorId, DataFormat, DecodedEvent, EventKind, Protocol};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Fewest samples per bit that can be decoded reliably
pub const MIN_SAMPLES_PER_BIT: usize = 3;

/// Supported data bits per character
pub const DATA_BITS: RangeInclusive<u8> = 5..=9;

/// Supported stop bits per character
pub const STOP_BITS: RangeInclusive<u8> = 1..=2;

/// Events produced by the UART decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UartEvent {
    /// A correctly framed character
    Data(u16),
    /// A framed character whose parity bit did not match
    ParityError(u16),
    /// A start or stop bit had the wrong level
    FrameError,
}

impl EventKind for UartEvent {
    fn value(&self) -> Option<u32> {
        match *self {
            UartEvent::Data(v) | UartEvent::ParityError(v) => Some(v as u32),
            UartEvent::FrameError => None,
        }
    }

    fn is_error(&self) -> bool {
        !matches!(self, UartEvent::Data(_))
    }

    fn name(&self) -> &'static str {
        match self {
            UartEvent::Data(_) => "DATA",
            UartEvent::ParityError(_) => "PARITY_ERROR",
            UartEvent::FrameError => "FRAME_ERROR",
        }
    }
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// No parity bit
    #[default]
    None,
    /// Data bits plus parity bit hold an odd number of ones
    Odd,
    /// Data bits plus parity bit hold an even number of ones
    Even,
    /// Parity bit is always 1
    Mark,
    /// Parity bit is always 0
    Space,
}

impl Parity {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Parity::None => "None",
            Parity::Odd => "Odd",
            Parity::Even => "Even",
            Parity::Mark => "Mark",
            Parity::Space => "Space",
        }
    }

    /// Get all parity modes in settings-index order
    pub fn all() -> &'static [Parity] {
        &[
            Parity::None,
            Parity::Odd,
            Parity::Even,
            Parity::Mark,
            Parity::Space,
        ]
    }

    /// Index used by the settings string
    pub fn settings_index(&self) -> u32 {
        Self::all().iter().position(|p| p == self).unwrap_or(0) as u32
    }

    /// Look up a parity mode by its settings index
    pub fn from_settings_index(index: u32) -> Option<Self> {
        Self::all().get(index as usize).copied()
    }

    /// Expected parity bit given the number of ones in the data bits.
    /// `None` when there is no parity bit.
    pub fn expected_bit(&self, ones: u32) -> Option<bool> {
        match self {
            Parity::None => None,
            Parity::Odd => Some(ones % 2 == 0),
            Parity::Even => Some(ones % 2 == 1),
            Parity::Mark => Some(true),
            Parity::Space => Some(false),
        }
    }
}

/// Character framing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    /// Data bits per character (5 to 9)
    pub data_bits: u8,
    /// Stop bits per character (1 or 2)
    pub stop_bits: u8,
    pub parity: Parity,
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self {
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
        }
    }
}

/// UART decoder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UartConfig {
    /// Display name of the decoder
    #[serde(default)]
    pub name: String,
    /// Receive channel
    pub rx: Option<ChannelId>,
    /// Display format for data values
    #[serde(default)]
    pub format: DataFormat,
    /// Baud rate in bits per second
    pub baud_rate: u32,
    /// Data bits per character (5 to 9)
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    /// Stop bits per character (1 or 2)
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: Parity,
    /// Cursor to start decoding from
    #[serde(default)]
    pub sync_cursor: Option<CursorId>,
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            name: Protocol::Uart.display_name().to_string(),
            rx: None,
            format: DataFormat::Hex,
            baud_rate: 115_200,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            sync_cursor: None,
        }
    }
}

impl UartConfig {
    /// Create config for a receive channel at the given baud rate
    pub fn new(rx: ChannelId, baud_rate: u32) -> Self {
        Self {
            rx: Some(rx),
            baud_rate,
            ..Default::default()
        }
    }

    /// Framing described by this config
    pub fn frame(&self) -> FrameFormat {
        FrameFormat {
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            parity: self.parity,
        }
    }

    /// Whether the data and stop bit counts are ones the decoder can frame
    pub fn has_supported_frame(&self) -> bool {
        DATA_BITS.contains(&self.data_bits) && STOP_BITS.contains(&self.stop_bits)
    }

    /// Samples per bit at `sample_rate`, `None` if below the decoding floor
    pub fn samples_per_bit(&self, sample_rate: u32) -> Option<usize> {
        if self.baud_rate == 0 {
            return None;
        }
        let spb = (sample_rate / self.baud_rate) as usize;
        (spb >= MIN_SAMPLES_PER_BIT).then_some(spb)
    }
}

/// One majority-voted bit window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bit {
    pub level: bool,
    /// First sample of the window
    pub start: usize,
    /// One past the last sample of the window
    pub end: usize,
}

/// Cuts a sample array into bit windows
#[derive(Debug)]
pub struct BitSampler<'a> {
    samples: &'a [u8],
    samples_per_bit: usize,
    pos: usize,
}

impl<'a> BitSampler<'a> {
    pub fn new(samples: &'a [u8], samples_per_bit: usize, pos: usize) -> Self {
        Self {
            samples,
            samples_per_bit,
            pos,
        }
    }

    /// Current sample position
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Sample the next bit window. `None` once a full window no longer fits.
    pub fn next_bit(&mut self) -> Option<Bit> {
        let start = self.pos;
        if start + self.samples_per_bit > self.samples.len() {
            return None;
        }

        let half = self.samples_per_bit / 2;
        let mut ones = 0;
        let mut scanned = 0;

        for k in 0..self.samples_per_bit {
            let level = self.samples[start + k];
            // Resync on edges in the second half of the window
            if k >= half && k > 0 && level != self.samples[start + k - 1] {
                break;
            }
            if level != 0 {
                ones += 1;
            }
            scanned += 1;
        }

        self.pos = start + scanned;
        Some(Bit {
            level: 2 * ones >= scanned,
            start,
            end: self.pos,
        })
    }

    /// Move to the next level change at or after the current position
    pub fn seek_edge(&mut self) -> bool {
        // The line before the first sample counts as idle high
        if self.pos == 0 && self.samples.first() == Some(&0) {
            return true;
        }
        let from = self.pos.max(1);
        match (from..self.samples.len()).find(|&i| self.samples[i] != self.samples[i - 1]) {
            Some(i) => {
                self.pos = i;
                true
            }
            None => {
                self.pos = self.samples.len();
                false
            }
        }
    }

    /// Move to the next low sample at or after the current position
    pub fn seek_low(&mut self) -> bool {
        match (self.pos..self.samples.len()).find(|&i| self.samples[i] == 0) {
            Some(i) => {
                self.pos = i;
                true
            }
            None => {
                self.pos = self.samples.len();
                false
            }
        }
    }
}

/// Position within a character frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartState {
    Start,
    Data,
    Parity,
    Stop,
}

/// Result of feeding one bit to the frame machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameStep {
    Continue,
    Emit(DecodedEvent<UartEvent>),
    /// Bit alignment is lost; the pass must end after this event
    Halt(DecodedEvent<UartEvent>),
}

/// Bit-by-bit UART frame state machine
#[derive(Debug, Clone)]
pub struct UartFrameMachine {
    frame: FrameFormat,
    state: UartState,
    locked: bool,
    frame_start: usize,
    value: u16,
    bits_read: u8,
    ones: u32,
    parity_error: bool,
    stops_read: u8,
}

impl UartFrameMachine {
    pub fn new(frame: FrameFormat) -> Self {
        Self {
            frame,
            state: UartState::Start,
            locked: false,
            frame_start: 0,
            value: 0,
            bits_read: 0,
            ones: 0,
            parity_error: false,
            stops_read: 0,
        }
    }

    pub fn state(&self) -> UartState {
        self.state
    }

    /// Whether a start bit has ever been accepted
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn step(&mut self, bit: Bit) -> FrameStep {
        match self.state {
            UartState::Start => {
                if !bit.level {
                    self.locked = true;
                    self.frame_start = bit.start;
                    self.value = 0;
                    self.bits_read = 0;
                    self.ones = 0;
                    self.parity_error = false;
                    self.stops_read = 0;
                    self.state = UartState::Data;
                    FrameStep::Continue
                } else if self.locked {
                    FrameStep::Emit(DecodedEvent::spanning(
                        UartEvent::FrameError,
                        bit.start,
                        bit.end,
                    ))
                } else {
                    FrameStep::Continue
                }
            }
            UartState::Data => {
                if bit.level {
                    self.value |= 1 << self.bits_read;
                    self.ones += 1;
                }
                self.bits_read += 1;
                if self.bits_read >= self.frame.data_bits {
                    self.state = if self.frame.parity == Parity::None {
                        UartState::Stop
                    } else {
                        UartState::Parity
                    };
                }
                FrameStep::Continue
            }
            UartState::Parity => {
                self.parity_error = self
                    .frame
                    .parity
                    .expected_bit(self.ones)
                    .is_some_and(|expected| expected != bit.level);
                self.state = UartState::Stop;
                FrameStep::Continue
            }
            UartState::Stop => {
                if !bit.level {
                    return FrameStep::Halt(DecodedEvent::spanning(
                        UartEvent::FrameError,
                        self.frame_start,
                        bit.end,
                    ));
                }

                self.stops_read += 1;
                if self.stops_read < self.frame.stop_bits {
                    return FrameStep::Continue;
                }

                self.state = UartState::Start;
                let kind = if self.parity_error {
                    UartEvent::ParityError(self.value)
                } else {
                    UartEvent::Data(self.value)
                };
                FrameStep::Emit(DecodedEvent::spanning(kind, self.frame_start, bit.end))
            }
        }
    }
}

/// UART protocol decoder
#[derive(Debug, Clone)]
pub struct UartDecoder {
    config: UartConfig,
    events: Vec<DecodedEvent<UartEvent>>,
}

impl UartDecoder {
    /// Create a decoder with the given configuration
    pub fn new(config: UartConfig) -> Self {
        Self {
            config,
            events: Vec::new(),
        }
    }

    /// Get current config
    pub fn config(&self) -> &UartConfig {
        &self.config
    }

    /// Replace the configuration. Events are kept until the next pass.
    pub fn set_config(&mut self, config: UartConfig) {
        self.config = config;
    }

    /// Decode a raw sample array, starting at `sync` if it lies inside it
    pub fn decode_samples(
        &mut self,
        samples: &[u8],
        sample_rate: u32,
        sync: Option<usize>,
    ) -> &[DecodedEvent<UartEvent>] {
        self.events.clear();

        if samples.is_empty() {
            return &self.events;
        }

        if !self.config.has_supported_frame() {
            tracing::warn!(
                "UART '{}': {} data bits / {} stop bits not supported, not decoding",
                self.config.name,
                self.config.data_bits,
                self.config.stop_bits
            );
            return &self.events;
        }

        let Some(samples_per_bit) = self.config.samples_per_bit(sample_rate) else {
            tracing::warn!(
                "UART '{}': {} baud is too fast for {} Hz sampling, not decoding",
                self.config.name,
                self.config.baud_rate,
                sample_rate
            );
            return &self.events;
        };

        let origin = scan_origin(sync, samples.len());
        let mut sampler = BitSampler::new(samples, samples_per_bit, origin);
        let mut machine = UartFrameMachine::new(self.config.frame());

        loop {
            if machine.state() == UartState::Start {
                let found = if machine.is_locked() {
                    sampler.seek_low()
                } else {
                    sampler.seek_edge()
                };
                if !found {
                    break;
                }
            }

            let Some(bit) = sampler.next_bit() else {
                break;
            };

            match machine.step(bit) {
                FrameStep::Continue => {}
                FrameStep::Emit(event) => self.events.push(event),
                FrameStep::Halt(event) => {
                    tracing::warn!(
                        "UART '{}': frame error at sample {}, stopping",
                        self.config.name,
                        bit.start
                    );
                    self.events.push(event);
                    break;
                }
            }
        }

        tracing::debug!(
            "UART '{}': decoded {} events from sample {} ({} samples/bit)",
            self.config.name,
            self.events.len(),
            origin,
            samples_per_bit
        );

        &self.events
    }
}

impl ProtocolDecoder for UartDecoder {
    type Event = UartEvent;

    fn name(&self) -> &str {
        &self.config.name
    }

    fn protocol(&self) -> Protocol {
        Protocol::Uart
    }

    fn format(&self) -> DataFormat {
        self.config.format
    }

    fn analyze(&mut self, source: &dyn SampleSource) -> &[DecodedEvent<UartEvent>] {
        let Some(samples) = self.config.rx.and_then(|rx| source.digital(rx)) else {
            self.events.clear();
            return &self.events;
        };

        let sync = self
            .config
            .sync_cursor
            .and_then(|c| source.cursor_position(c));

        self.decode_samples(samples, source.sample_rate(), sync)
    }

    fn events(&self) -> &[DecodedEvent<UartEvent>] {
        &self.events
    }
}
