//! Signal generation
//!
//! Synthesizes digital waveforms, both for generate-mode channels of a
//! session and for exercising the decoders without captured hardware data.
//!
//! # Main Types
//!
//! - [`SignalBuilder`] - Appends runs of levels to one channel
//! - [`UartWaveform`] - Idle time and character frames on one line
//! - [`I2cWaveform`] - START/STOP conditions, bytes and acknowledge bits on SCL/SDA
//! - [`SpiWaveform`] - Clocked words with enable framing in any clock mode
//! - [`GeneratorPattern`] - Serializable pattern rendered to a channel

use crate::decoder::uart::FrameFormat;
use crate::decoder::{EnablePolarity, SpiMode};
use serde::{Deserialize, Serialize};

/// Builds the sample vector of one channel
#[derive(Debug, Clone)]
pub struct SignalBuilder {
    samples: Vec<u8>,
    level: u8,
}

impl SignalBuilder {
    /// Start an empty channel that idles at `level`
    pub fn new(level: u8) -> Self {
        Self {
            samples: Vec::new(),
            level: (level != 0) as u8,
        }
    }

    /// Level of the last sample, or the idle level when empty
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Append `count` samples at `level`
    pub fn push(&mut self, level: u8, count: usize) {
        self.level = (level != 0) as u8;
        self.samples.extend(std::iter::repeat(self.level).take(count));
    }

    /// Append `count` samples at the current level
    pub fn hold(&mut self, count: usize) {
        self.push(self.level, count);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.samples
    }
}

/// UART line waveform at a fixed number of samples per bit
#[derive(Debug, Clone)]
pub struct UartWaveform {
    line: SignalBuilder,
    samples_per_bit: usize,
    frame: FrameFormat,
}

impl UartWaveform {
    pub fn new(samples_per_bit: usize, frame: FrameFormat) -> Self {
        Self {
            line: SignalBuilder::new(1),
            samples_per_bit,
            frame,
        }
    }

    /// Idle (high) line for `bits` bit times
    pub fn idle(&mut self, bits: usize) {
        self.line.push(1, bits * self.samples_per_bit);
    }

    /// One character with correct parity and stop bits
    pub fn frame(&mut self, value: u16) {
        let parity = self.frame.parity.expected_bit(self.data_ones(value));
        self.write_frame(value, parity, true);
    }

    /// One character with the given parity bit, right or wrong
    pub fn frame_with_parity(&mut self, value: u16, parity_bit: bool) {
        self.write_frame(value, Some(parity_bit), true);
    }

    /// One character whose stop bits are held low
    pub fn frame_with_low_stop(&mut self, value: u16) {
        let parity = self.frame.parity.expected_bit(self.data_ones(value));
        self.write_frame(value, parity, false);
    }

    pub fn len(&self) -> usize {
        self.line.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.line.finish()
    }

    fn data_ones(&self, value: u16) -> u32 {
        let mask = (1u32 << self.frame.data_bits) - 1;
        (value as u32 & mask).count_ones()
    }

    fn write_frame(&mut self, value: u16, parity: Option<bool>, stop_level: bool) {
        let spb = self.samples_per_bit;
        self.line.push(0, spb);
        for bit in 0..self.frame.data_bits {
            self.line.push(((value >> bit) & 1) as u8, spb);
        }
        if let Some(parity) = parity {
            self.line.push(parity as u8, spb);
        }
        for _ in 0..self.frame.stop_bits {
            self.line.push(stop_level as u8, spb);
        }
    }
}

/// I2C bus waveform built from quarter-bit steps
#[derive(Debug, Clone)]
pub struct I2cWaveform {
    quarter: usize,
    scl: SignalBuilder,
    sda: SignalBuilder,
}

impl I2cWaveform {
    /// `quarter` is a quarter of one SCL period in samples
    pub fn new(quarter: usize) -> Self {
        Self {
            quarter: quarter.max(1),
            scl: SignalBuilder::new(1),
            sda: SignalBuilder::new(1),
        }
    }

    fn step(&mut self, scl: u8, sda: u8, quarters: usize) {
        let count = quarters * self.quarter;
        self.scl.push(scl, count);
        self.sda.push(sda, count);
    }

    /// START, or repeated START when a transaction is open
    pub fn start(&mut self) {
        if self.scl.is_empty() || (self.scl.level() == 1 && self.sda.level() == 1) {
            self.step(1, 1, 2);
        } else {
            let sda = self.sda.level();
            self.step(0, sda, 1);
            self.step(0, 1, 1);
            self.step(1, 1, 2);
        }
        self.step(1, 0, 2);
    }

    /// STOP condition
    pub fn stop(&mut self) {
        let sda = self.sda.level();
        self.step(0, sda, 1);
        self.step(0, 0, 1);
        self.step(1, 0, 2);
        self.step(1, 1, 2);
    }

    /// One clocked bit; SDA changes only while SCL is low
    pub fn bit(&mut self, level: bool) {
        let sda = self.sda.level();
        self.step(0, sda, 1);
        self.step(0, level as u8, 1);
        self.step(1, level as u8, 2);
    }

    /// Eight data bits MSB-first followed by the acknowledge bit
    pub fn byte(&mut self, value: u8, acked: bool) {
        for bit in (0..8).rev() {
            self.bit((value >> bit) & 1 == 1);
        }
        self.bit(!acked);
    }

    /// Flip SDA while SCL is high
    pub fn toggle_sda(&mut self) {
        let sda = self.sda.level() ^ 1;
        self.step(1, sda, 2);
    }

    /// Hold both lines for `samples` samples
    pub fn idle(&mut self, samples: usize) {
        self.scl.hold(samples);
        self.sda.hold(samples);
    }

    pub fn len(&self) -> usize {
        self.scl.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scl.is_empty()
    }

    /// SCL and SDA sample vectors
    pub fn finish(self) -> (Vec<u8>, Vec<u8>) {
        (self.scl.finish(), self.sda.finish())
    }
}

/// Sample vectors of an SPI bus
#[derive(Debug, Clone, Default)]
pub struct SpiSignals {
    pub sck: Vec<u8>,
    pub mosi: Vec<u8>,
    pub miso: Vec<u8>,
    pub enable: Vec<u8>,
}

/// SPI bus waveform
#[derive(Debug, Clone)]
pub struct SpiWaveform {
    mode: SpiMode,
    polarity: EnablePolarity,
    data_bits: u8,
    half_period: usize,
    sck: SignalBuilder,
    mosi: SignalBuilder,
    miso: SignalBuilder,
    enable: SignalBuilder,
}

impl SpiWaveform {
    /// The bus starts deselected with the clock at its idle level
    pub fn new(mode: SpiMode, polarity: EnablePolarity, data_bits: u8, half_period: usize) -> Self {
        Self {
            mode,
            polarity,
            data_bits,
            half_period: half_period.max(1),
            sck: SignalBuilder::new(mode.cpol() as u8),
            mosi: SignalBuilder::new(0),
            miso: SignalBuilder::new(0),
            enable: SignalBuilder::new(!polarity.active_level() as u8),
        }
    }

    fn step(&mut self, sck: bool, samples: usize) {
        self.sck.push(sck as u8, samples);
        self.mosi.hold(samples);
        self.miso.hold(samples);
        self.enable.hold(samples);
    }

    fn set_data(&mut self, mosi: bool, miso: bool) {
        // zero-length push only changes the level
        self.mosi.push(mosi as u8, 0);
        self.miso.push(miso as u8, 0);
    }

    /// Clock idle for `samples` samples
    pub fn idle(&mut self, samples: usize) {
        self.step(self.mode.cpol(), samples);
    }

    /// Assert the enable line
    pub fn select(&mut self) {
        self.enable.push(self.polarity.active_level() as u8, 0);
        self.idle(self.half_period);
    }

    /// Release the enable line
    pub fn deselect(&mut self) {
        self.enable.push(!self.polarity.active_level() as u8, 0);
        self.idle(self.half_period);
    }

    /// One bit on each data line
    pub fn bit(&mut self, mosi: bool, miso: bool) {
        let idle = self.mode.cpol();
        let h = self.half_period;
        if self.mode.cpha() {
            // Data changes on the leading edge, sampled on the trailing one
            self.set_data(mosi, miso);
            self.step(!idle, h);
            self.step(idle, h);
        } else {
            self.set_data(mosi, miso);
            self.step(idle, h);
            self.step(!idle, h);
        }
    }

    /// One word MSB-first on both data lines
    pub fn word(&mut self, mosi: u16, miso: u16) {
        for bit in (0..self.data_bits).rev() {
            self.bit((mosi >> bit) & 1 == 1, (miso >> bit) & 1 == 1);
        }
    }

    /// Loose MOSI bits with MISO low
    pub fn bits(&mut self, mosi: &[bool]) {
        for &level in mosi {
            self.bit(level, false);
        }
    }

    pub fn len(&self) -> usize {
        self.sck.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sck.is_empty()
    }

    pub fn finish(self) -> SpiSignals {
        SpiSignals {
            sck: self.sck.finish(),
            mosi: self.mosi.finish(),
            miso: self.miso.finish(),
            enable: self.enable.finish(),
        }
    }
}

/// Pattern driven onto a generate-mode channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GeneratorPattern {
    /// Fixed level
    Constant { level: u8 },
    /// Square wave starting low
    Clock { half_period: usize },
    /// Explicit sample levels, held at the last level or repeated
    Levels {
        levels: Vec<u8>,
        #[serde(default)]
        repeat: bool,
    },
    /// 8N1 text transmission after two idle bit times
    Uart { baud_rate: u32, text: String },
}

impl GeneratorPattern {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            GeneratorPattern::Constant { .. } => "Constant",
            GeneratorPattern::Clock { .. } => "Clock",
            GeneratorPattern::Levels { .. } => "Levels",
            GeneratorPattern::Uart { .. } => "UART",
        }
    }

    /// Render exactly `len` samples at `sample_rate`
    pub fn render(&self, len: usize, sample_rate: u32) -> Vec<u8> {
        let mut samples = match self {
            GeneratorPattern::Constant { level } => vec![(*level != 0) as u8; len],
            GeneratorPattern::Clock { half_period } => {
                if *half_period == 0 {
                    vec![0; len]
                } else {
                    (0..len).map(|i| ((i / half_period) % 2) as u8).collect()
                }
            }
            GeneratorPattern::Levels { levels, repeat } => {
                let levels: Vec<u8> = levels.iter().map(|&l| (l != 0) as u8).collect();
                match (levels.last(), *repeat) {
                    (None, _) => vec![0; len],
                    (Some(_), true) => levels.iter().copied().cycle().take(len).collect(),
                    (Some(&last), false) => levels
                        .iter()
                        .copied()
                        .chain(std::iter::repeat(last))
                        .take(len)
                        .collect(),
                }
            }
            GeneratorPattern::Uart { baud_rate, text } => {
                let spb = match *baud_rate {
                    0 => 0,
                    baud => (sample_rate / baud) as usize,
                };
                if spb == 0 {
                    tracing::warn!("{} baud cannot be generated at {} Hz", baud_rate, sample_rate);
                    vec![1; len]
                } else {
                    let mut wave = UartWaveform::new(spb, FrameFormat::default());
                    wave.idle(2);
                    for byte in text.bytes() {
                        wave.frame(byte as u16);
                    }
                    wave.finish()
                }
            }
        };
        // Line idles high once a UART message is done
        let fill = matches!(self, GeneratorPattern::Uart { .. }) as u8;
        samples.resize(len, fill);
        samples
    }
}
