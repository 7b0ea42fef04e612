//! I2C bus decoder
//!
//! Decodes an SCL/SDA channel pair into START, STOP, address, data and
//! acknowledge events.
//!
//! # Bit Windows
//!
//! SDA is sampled on every rising SCL edge and shifted MSB-first into the
//! byte accumulator. The falling SCL edge after the eighth bit closes the
//! byte, and the ninth rising edge carries the acknowledge bit.
//!
//! An SDA transition while SCL is high is a START (falling SDA) or STOP
//! (rising SDA). It is only legal at a byte boundary: with 1 to 6 bits still
//! outstanding it is reported as a bus error instead. A repeated START or a
//! STOP always follows one clocked bit of the next byte, so 7 outstanding
//! bits is a boundary as well.
//!
//! # Addressing
//!
//! The first byte after START is the address. A first byte of `11110xxD`
//! opens a 10-bit address whose low 8 bits come from the second byte.
//!
//! # Fault Tolerance
//!
//! Nothing is decoded before the first START. More than [`MAX_BUS_ERRORS`]
//! bus errors abort the pass.

use crate::capture::SampleSource;
use crate::decoder::{scan_origin, ProtocolDecoder};
use crate::types::{ChannelId, CursorId, DataFormat, DecodedEvent, EventKind, Protocol};
use serde::{Deserialize, Serialize};

/// Bus errors tolerated in one pass before decoding is aborted
pub const MAX_BUS_ERRORS: usize = 5;

/// Address prefix (top 5 bits) that marks the first byte of a 10-bit address
const TEN_BIT_PREFIX: u8 = 0b11110;

const BITS_PER_BYTE: u8 = 8;

/// Events produced by the I2C decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum I2cEvent {
    Start,
    Stop,
    Ack,
    Nack,
    Data(u8),
    Address7Write(u8),
    Address7Read(u8),
    Address10Write(u16),
    Address10Read(u16),
    /// Bus error (SDA changed while SCL was high in the middle of a byte)
    Error,
}

impl I2cEvent {
    /// Direction bit of an address event (1 = read)
    pub fn direction(&self) -> Option<u8> {
        match self {
            I2cEvent::Address7Write(_) | I2cEvent::Address10Write(_) => Some(0),
            I2cEvent::Address7Read(_) | I2cEvent::Address10Read(_) => Some(1),
            _ => None,
        }
    }

    /// Whether this is one of the address kinds
    pub fn is_address(&self) -> bool {
        self.direction().is_some()
    }
}

impl EventKind for I2cEvent {
    fn value(&self) -> Option<u32> {
        match *self {
            I2cEvent::Data(v) | I2cEvent::Address7Write(v) | I2cEvent::Address7Read(v) => {
                Some(v as u32)
            }
            I2cEvent::Address10Write(a) | I2cEvent::Address10Read(a) => Some(a as u32),
            _ => None,
        }
    }

    fn is_error(&self) -> bool {
        matches!(self, I2cEvent::Error)
    }

    fn name(&self) -> &'static str {
        match self {
            I2cEvent::Start => "START",
            I2cEvent::Stop => "STOP",
            I2cEvent::Ack => "ACK",
            I2cEvent::Nack => "NACK",
            I2cEvent::Data(_) => "DATA",
            I2cEvent::Address7Write(_) => "ADDRESS_7_WRITE",
            I2cEvent::Address7Read(_) => "ADDRESS_7_READ",
            I2cEvent::Address10Write(_) => "ADDRESS_10_WRITE",
            I2cEvent::Address10Read(_) => "ADDRESS_10_READ",
            I2cEvent::Error => "ERROR",
        }
    }
}

/// I2C decoder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct I2cConfig {
    /// Display name of the decoder
    #[serde(default)]
    pub name: String,
    /// Clock channel
    pub scl: Option<ChannelId>,
    /// Data channel
    pub sda: Option<ChannelId>,
    /// Display format for data bytes
    #[serde(default)]
    pub format: DataFormat,
    /// Cursor to start decoding from
    #[serde(default)]
    pub sync_cursor: Option<CursorId>,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            name: Protocol::I2c.display_name().to_string(),
            scl: None,
            sda: None,
            format: DataFormat::Hex,
            sync_cursor: None,
        }
    }
}

impl I2cConfig {
    /// Create config for the given clock and data channels
    pub fn new(scl: ChannelId, sda: ChannelId) -> Self {
        Self {
            scl: Some(scl),
            sda: Some(sda),
            ..Default::default()
        }
    }
}

/// Where the bus is within a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BusPhase {
    /// No transaction open (before the first START or after STOP)
    Idle,
    /// Next byte is the (first) address byte
    Address,
    /// Next byte holds the low 8 bits of a 10-bit address
    Address10Low { high: u16, read: bool },
    /// Bytes are data until the next START/STOP
    Data,
}

/// Sample-by-sample I2C state machine
#[derive(Debug, Clone)]
pub struct I2cMachine {
    phase: BusPhase,
    start_found: bool,
    /// Bits still expected for the current byte (8 down to 0)
    bits_left: u8,
    byte: u8,
    byte_start: usize,
    scl: bool,
    sda: bool,
    errors: usize,
}

impl I2cMachine {
    /// Create a machine whose line history starts at the given levels
    pub fn new(scl: u8, sda: u8) -> Self {
        Self {
            phase: BusPhase::Idle,
            start_found: false,
            bits_left: BITS_PER_BYTE,
            byte: 0,
            byte_start: 0,
            scl: scl != 0,
            sda: sda != 0,
            errors: 0,
        }
    }

    /// Number of bus errors seen so far
    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// Feed the line levels at sample `index`
    pub fn step(&mut self, index: usize, scl: u8, sda: u8) -> Option<DecodedEvent<I2cEvent>> {
        let (scl, sda) = (scl != 0, sda != 0);
        let (prev_scl, prev_sda) = (self.scl, self.sda);
        self.scl = scl;
        self.sda = sda;

        match (prev_scl, scl) {
            (true, false) => self.scl_falling(index),
            (false, true) => self.scl_rising(index, sda, sda != prev_sda),
            (true, true) if sda != prev_sda => self.sda_changed_while_high(index, sda),
            _ => None,
        }
    }

    fn reset_byte(&mut self) {
        self.bits_left = BITS_PER_BYTE;
        self.byte = 0;
    }

    fn bus_error(&mut self, index: usize) -> Option<DecodedEvent<I2cEvent>> {
        self.errors += 1;
        self.reset_byte();
        Some(DecodedEvent::open(I2cEvent::Error, index))
    }

    fn scl_falling(&mut self, index: usize) -> Option<DecodedEvent<I2cEvent>> {
        if self.phase == BusPhase::Idle {
            return None;
        }

        match self.bits_left {
            BITS_PER_BYTE => {
                self.byte_start = index;
                None
            }
            0 => self.complete_byte(index),
            _ => None,
        }
    }

    fn scl_rising(
        &mut self,
        index: usize,
        sda: bool,
        sda_changed: bool,
    ) -> Option<DecodedEvent<I2cEvent>> {
        if self.phase == BusPhase::Idle {
            return None;
        }

        // SDA must be stable before SCL rises
        if sda_changed {
            return self.bus_error(index);
        }

        if self.bits_left == 0 {
            self.reset_byte();
            let kind = if sda { I2cEvent::Nack } else { I2cEvent::Ack };
            return Some(DecodedEvent::open(kind, index));
        }

        self.byte = (self.byte << 1) | sda as u8;
        self.bits_left -= 1;
        None
    }

    fn sda_changed_while_high(
        &mut self,
        index: usize,
        sda: bool,
    ) -> Option<DecodedEvent<I2cEvent>> {
        if self.start_found && (1..=6).contains(&self.bits_left) {
            return self.bus_error(index);
        }

        if !sda {
            self.start_found = true;
            self.phase = BusPhase::Address;
            self.reset_byte();
            Some(DecodedEvent::open(I2cEvent::Start, index))
        } else if self.start_found {
            self.phase = BusPhase::Idle;
            self.reset_byte();
            Some(DecodedEvent::open(I2cEvent::Stop, index))
        } else {
            None
        }
    }

    fn complete_byte(&mut self, index: usize) -> Option<DecodedEvent<I2cEvent>> {
        let byte = self.byte;
        let read = byte & 0x01 == 1;

        let kind = match self.phase {
            BusPhase::Idle => return None,
            BusPhase::Address if byte >> 3 == TEN_BIT_PREFIX => {
                self.phase = BusPhase::Address10Low {
                    high: ((byte & 0x06) as u16) << 7,
                    read,
                };
                return None;
            }
            BusPhase::Address => {
                self.phase = BusPhase::Data;
                if read {
                    I2cEvent::Address7Read(byte >> 1)
                } else {
                    I2cEvent::Address7Write(byte >> 1)
                }
            }
            BusPhase::Address10Low { high, read } => {
                self.phase = BusPhase::Data;
                let address = high | byte as u16;
                if read {
                    I2cEvent::Address10Read(address)
                } else {
                    I2cEvent::Address10Write(address)
                }
            }
            BusPhase::Data => I2cEvent::Data(byte),
        };

        Some(DecodedEvent::spanning(kind, self.byte_start, index))
    }
}

/// I2C protocol decoder
#[derive(Debug, Clone)]
pub struct I2cDecoder {
    config: I2cConfig,
    events: Vec<DecodedEvent<I2cEvent>>,
}

impl I2cDecoder {
    /// Create a decoder with the given configuration
    pub fn new(config: I2cConfig) -> Self {
        Self {
            config,
            events: Vec::new(),
        }
    }

    /// Get current config
    pub fn config(&self) -> &I2cConfig {
        &self.config
    }

    /// Replace the configuration. Events are kept until the next pass.
    pub fn set_config(&mut self, config: I2cConfig) {
        self.config = config;
    }

    /// Decode raw SCL/SDA arrays, starting at `sync` if it lies inside them
    pub fn decode_samples(
        &mut self,
        scl: &[u8],
        sda: &[u8],
        sync: Option<usize>,
    ) -> &[DecodedEvent<I2cEvent>] {
        self.events.clear();

        if scl.is_empty() || scl.len() != sda.len() {
            tracing::debug!(
                "I2C '{}': nothing to decode ({} SCL / {} SDA samples)",
                self.config.name,
                scl.len(),
                sda.len()
            );
            return &self.events;
        }

        let origin = scan_origin(sync, scl.len());
        let mut machine = I2cMachine::new(scl[origin], sda[origin]);

        for i in (origin + 1)..scl.len() {
            let Some(event) = machine.step(i, scl[i], sda[i]) else {
                continue;
            };
            self.events.push(event);

            if machine.error_count() > MAX_BUS_ERRORS {
                tracing::warn!(
                    "I2C '{}': aborting at sample {} after {} bus errors",
                    self.config.name,
                    i,
                    machine.error_count()
                );
                break;
            }
        }

        tracing::debug!(
            "I2C '{}': decoded {} events from sample {}",
            self.config.name,
            self.events.len(),
            origin
        );

        &self.events
    }
}

impl ProtocolDecoder for I2cDecoder {
    type Event = I2cEvent;

    fn name(&self) -> &str {
        &self.config.name
    }

    fn protocol(&self) -> Protocol {
        Protocol::I2c
    }

    fn format(&self) -> DataFormat {
        self.config.format
    }

    fn analyze(&mut self, source: &dyn SampleSource) -> &[DecodedEvent<I2cEvent>] {
        let (Some(scl), Some(sda)) = (self.config.scl, self.config.sda) else {
            self.events.clear();
            return &self.events;
        };

        let (Some(scl), Some(sda)) = (source.digital(scl), source.digital(sda)) else {
            self.events.clear();
            return &self.events;
        };

        let sync = self
            .config
            .sync_cursor
            .and_then(|c| source.cursor_position(c));

        self.decode_samples(scl, sda, sync)
    }

    fn events(&self) -> &[DecodedEvent<I2cEvent>] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::I2cWaveform;

    fn kinds(events: &[DecodedEvent<I2cEvent>]) -> Vec<I2cEvent> {
        events.iter().map(|e| e.kind).collect()
    }

    fn decode(scl: &[u8], sda: &[u8]) -> Vec<DecodedEvent<I2cEvent>> {
        let mut decoder = I2cDecoder::new(I2cConfig::default());
        decoder.decode_samples(scl, sda, None).to_vec()
    }

    #[test]
    fn test_seven_bit_read_address() {
        let mut wave = I2cWaveform::new(4);
        wave.start();
        wave.byte(0xA1, true);
        wave.stop();
        let (scl, sda) = wave.finish();

        let events = decode(&scl, &sda);
        assert_eq!(
            kinds(&events),
            vec![
                I2cEvent::Start,
                I2cEvent::Address7Read(0x50),
                I2cEvent::Ack,
                I2cEvent::Stop
            ]
        );
        assert_eq!(events[1].kind.direction(), Some(1));
        assert!(events[1].stop.is_some());
    }

    #[test]
    fn test_ten_bit_address() {
        let mut wave = I2cWaveform::new(4);
        wave.start();
        wave.byte(0xF2, true);
        wave.byte(0x34, true);
        wave.byte(0x99, false);
        wave.stop();
        let (scl, sda) = wave.finish();

        let events = decode(&scl, &sda);
        assert_eq!(
            kinds(&events),
            vec![
                I2cEvent::Start,
                I2cEvent::Ack,
                I2cEvent::Address10Write(((0xF2 & 0x06) << 7) | 0x34),
                I2cEvent::Ack,
                I2cEvent::Data(0x99),
                I2cEvent::Nack,
                I2cEvent::Stop
            ]
        );
    }

    #[test]
    fn test_repeated_start_rearms_address() {
        let mut wave = I2cWaveform::new(4);
        wave.start();
        wave.byte(0x90, true);
        wave.byte(0x01, true);
        wave.start();
        wave.byte(0x91, true);
        wave.byte(0x55, false);
        wave.stop();
        let (scl, sda) = wave.finish();

        let events = decode(&scl, &sda);
        assert_eq!(
            kinds(&events),
            vec![
                I2cEvent::Start,
                I2cEvent::Address7Write(0x48),
                I2cEvent::Ack,
                I2cEvent::Data(0x01),
                I2cEvent::Ack,
                I2cEvent::Start,
                I2cEvent::Address7Read(0x48),
                I2cEvent::Ack,
                I2cEvent::Data(0x55),
                I2cEvent::Nack,
                I2cEvent::Stop
            ]
        );
    }

    #[test]
    fn test_nothing_before_first_start() {
        let mut wave = I2cWaveform::new(4);
        // Clocked bits and a STOP-like edge with no START in front
        wave.bit(true);
        wave.bit(false);
        wave.stop();
        let (scl, sda) = wave.finish();

        assert!(decode(&scl, &sda).is_empty());
    }

    #[test]
    fn test_mid_byte_transition_is_error() {
        let mut wave = I2cWaveform::new(4);
        wave.start();
        wave.bit(true);
        wave.bit(false);
        wave.bit(true);
        wave.toggle_sda();
        let (scl, sda) = wave.finish();

        let events = decode(&scl, &sda);
        assert_eq!(kinds(&events), vec![I2cEvent::Start, I2cEvent::Error]);
        assert!(events[1].is_open());
    }

    #[test]
    fn test_transition_after_one_bit_is_not_error() {
        // 7 bits outstanding counts as a byte boundary
        let mut wave = I2cWaveform::new(4);
        wave.start();
        wave.bit(true);
        wave.toggle_sda();
        let (scl, sda) = wave.finish();

        assert_eq!(
            kinds(&decode(&scl, &sda)),
            vec![I2cEvent::Start, I2cEvent::Start]
        );
    }

    #[test]
    fn test_unequal_lengths_yield_nothing() {
        let mut wave = I2cWaveform::new(4);
        wave.start();
        wave.byte(0xA0, true);
        let (scl, mut sda) = wave.finish();
        sda.pop();

        assert!(decode(&scl, &sda).is_empty());
        assert!(decode(&[], &[]).is_empty());
    }

    #[test]
    fn test_sync_cursor_start() {
        let mut wave = I2cWaveform::new(4);
        wave.start();
        wave.byte(0xA0, true);
        wave.stop();
        let resume = wave.len();
        wave.idle(8);
        wave.start();
        wave.byte(0xA2, true);
        wave.stop();
        let (scl, sda) = wave.finish();

        let mut decoder = I2cDecoder::new(I2cConfig::default());
        let events = decoder.decode_samples(&scl, &sda, Some(resume));
        assert_eq!(events[1].kind, I2cEvent::Address7Write(0x51));
        assert!(events.iter().all(|e| e.start > resume));

        // Out of range cursor decodes from the beginning
        let events = decoder.decode_samples(&scl, &sda, Some(scl.len() + 10));
        assert_eq!(events[1].kind, I2cEvent::Address7Write(0x50));
    }

    /// Machine right after a START, with SCL and SDA history at the last index
    fn started() -> (I2cMachine, usize) {
        let mut machine = I2cMachine::new(1, 1);
        assert_eq!(machine.step(1, 1, 0).map(|e| e.kind), Some(I2cEvent::Start));
        (machine, 1)
    }

    /// Clock bits in, leaving SCL high after the last one
    fn clock_bits(machine: &mut I2cMachine, index: &mut usize, bits: &[bool]) -> Vec<I2cEvent> {
        let mut events = Vec::new();
        for &bit in bits {
            let held = machine.sda as u8;
            for (scl, sda) in [(0, held), (0, bit as u8), (1, bit as u8)] {
                *index += 1;
                events.extend(machine.step(*index, scl, sda).map(|e| e.kind));
            }
        }
        events
    }

    fn toggle_sda_high(machine: &mut I2cMachine, index: &mut usize) -> Option<I2cEvent> {
        assert!(machine.scl);
        *index += 1;
        let sda = !machine.sda as u8;
        machine.step(*index, 1, sda).map(|e| e.kind)
    }

    #[test]
    fn test_transition_with_six_bits_left_is_error() {
        let (mut machine, mut index) = started();
        clock_bits(&mut machine, &mut index, &[true, false]);
        assert_eq!(machine.bits_left, 6);

        assert_eq!(toggle_sda_high(&mut machine, &mut index), Some(I2cEvent::Error));
        assert_eq!(machine.bits_left, BITS_PER_BYTE);
    }

    #[test]
    fn test_transition_with_one_bit_left_is_error() {
        let (mut machine, mut index) = started();
        clock_bits(&mut machine, &mut index, &[true; 7]);
        assert_eq!(machine.bits_left, 1);

        assert_eq!(toggle_sda_high(&mut machine, &mut index), Some(I2cEvent::Error));
        assert_eq!(machine.error_count(), 1);
    }

    #[test]
    fn test_transition_before_ack_clock_is_start() {
        // All 8 bits in, SCL has not fallen for the ACK bit yet
        let (mut machine, mut index) = started();
        clock_bits(&mut machine, &mut index, &[true; 8]);
        assert_eq!(machine.bits_left, 0);

        assert_eq!(toggle_sda_high(&mut machine, &mut index), Some(I2cEvent::Start));
        assert_eq!(machine.error_count(), 0);
    }

    #[test]
    fn test_transition_at_byte_boundary_is_stop() {
        let (mut machine, mut index) = started();
        let address = [true, false, true, false, false, false, false, false];
        assert!(clock_bits(&mut machine, &mut index, &address).is_empty());
        assert_eq!(
            clock_bits(&mut machine, &mut index, &[false]),
            vec![I2cEvent::Address7Write(0x50), I2cEvent::Ack]
        );
        assert_eq!(machine.bits_left, BITS_PER_BYTE);

        assert_eq!(toggle_sda_high(&mut machine, &mut index), Some(I2cEvent::Stop));
        assert_eq!(machine.error_count(), 0);
    }

    #[test]
    fn test_setup_violation_on_rising_edge() {
        let mut machine = I2cMachine::new(1, 1);
        assert_eq!(machine.step(1, 1, 0).map(|e| e.kind), Some(I2cEvent::Start));
        assert_eq!(machine.step(2, 0, 0), None);
        // SDA changes on the same sample SCL rises
        assert_eq!(machine.step(3, 1, 1).map(|e| e.kind), Some(I2cEvent::Error));
        assert_eq!(machine.error_count(), 1);
    }
}
