//! Core data types for busdecode-rs
//!
//! This module contains the data model shared by every protocol decoder.
//!
//! # Main Types
//!
//! - [`ChannelId`] - Index of a digital capture channel
//! - [`CursorId`] - Index of a UI cursor that can act as a sync point
//! - [`DecodedEvent`] - One decoded protocol event with its sample span
//! - [`EventKind`] - Common behavior of the per-protocol event kind enums
//! - [`DataFormat`] - Display radix for decoded values
//! - [`Protocol`] - The supported bus protocols
//!
//! # Sample Spans
//!
//! Events span `[start, stop)` in sample indices of the capture. Point-like
//! events (I2C START/STOP/ACK, bus errors) have no fixed end and carry
//! `stop == None`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of digital channels a capture can carry
pub const MAX_DIGITAL_CHANNELS: usize = 16;

/// Number of cursors (cursor 0 is the trigger cursor)
pub const NUM_CURSORS: usize = 5;

/// Index of a digital capture channel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ChannelId(u8);

impl ChannelId {
    /// Create a channel id, returning `None` if out of range
    pub fn new(index: u8) -> Option<Self> {
        ((index as usize) < MAX_DIGITAL_CHANNELS).then_some(Self(index))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u8> for ChannelId {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        ChannelId::new(value).ok_or_else(|| format!("channel {} out of range", value))
    }
}

impl From<ChannelId> for u8 {
    fn from(id: ChannelId) -> u8 {
        id.0
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({})", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D{}", self.0)
    }
}

/// Index of a cursor. Cursor positions are owned by the sample source.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CursorId(u8);

impl CursorId {
    /// The cursor placed at the trigger point of a capture
    pub const TRIGGER: CursorId = CursorId(0);

    /// Create a cursor id, returning `None` if out of range
    pub fn new(index: u8) -> Option<Self> {
        ((index as usize) < NUM_CURSORS).then_some(Self(index))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u8> for CursorId {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        CursorId::new(value).ok_or_else(|| format!("cursor {} out of range", value))
    }
}

impl From<CursorId> for u8 {
    fn from(id: CursorId) -> u8 {
        id.0
    }
}

impl fmt::Debug for CursorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CursorId({})", self.0)
    }
}

/// Common behavior of the per-protocol event kinds
pub trait EventKind: fmt::Debug + Clone + PartialEq {
    /// Integer payload (data byte, address), if the kind carries one
    fn value(&self) -> Option<u32>;

    /// Whether this kind reports a protocol violation
    fn is_error(&self) -> bool;

    /// Short identifier of the kind, e.g. `"ADDRESS_7_READ"`
    fn name(&self) -> &'static str;
}

/// A decoded protocol event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedEvent<K> {
    /// What was decoded
    pub kind: K,
    /// First sample index of the event
    pub start: usize,
    /// End sample index, `None` when the event has no fixed end
    pub stop: Option<usize>,
}

impl<K> DecodedEvent<K> {
    /// Create an event spanning `start..stop`
    pub fn spanning(kind: K, start: usize, stop: usize) -> Self {
        Self {
            kind,
            start,
            stop: Some(stop),
        }
    }

    /// Create an event with no fixed end
    pub fn open(kind: K, start: usize) -> Self {
        Self {
            kind,
            start,
            stop: None,
        }
    }

    /// Number of samples the event covers (0 for open events)
    pub fn len(&self) -> usize {
        self.stop.map(|s| s.saturating_sub(self.start)).unwrap_or(0)
    }

    /// Whether the event has no fixed end
    pub fn is_open(&self) -> bool {
        self.stop.is_none()
    }
}

/// Display format for decoded values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// Printable characters, hex for everything else
    Ascii,
    /// Decimal
    Decimal,
    /// Hexadecimal with `0x` prefix
    #[default]
    Hex,
}

impl DataFormat {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            DataFormat::Ascii => "ASCII",
            DataFormat::Decimal => "Decimal",
            DataFormat::Hex => "Hex",
        }
    }

    /// Get all formats in settings-index order
    pub fn all() -> &'static [DataFormat] {
        &[DataFormat::Ascii, DataFormat::Decimal, DataFormat::Hex]
    }

    /// Index used by the settings string
    pub fn settings_index(&self) -> u32 {
        match self {
            DataFormat::Ascii => 0,
            DataFormat::Decimal => 1,
            DataFormat::Hex => 2,
        }
    }

    /// Look up a format by its settings index
    pub fn from_settings_index(index: u32) -> Option<Self> {
        Self::all().get(index as usize).copied()
    }
}

impl std::str::FromStr for DataFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ascii" => Ok(DataFormat::Ascii),
            "dec" | "decimal" => Ok(DataFormat::Decimal),
            "hex" => Ok(DataFormat::Hex),
            other => Err(format!("unknown data format '{}'", other)),
        }
    }
}

/// Supported bus protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    I2c,
    Uart,
    Spi,
}

impl Protocol {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Protocol::I2c => "I2C",
            Protocol::Uart => "UART",
            Protocol::Spi => "SPI",
        }
    }

    /// Tag that opens a settings string for this protocol
    pub fn settings_tag(&self) -> &'static str {
        self.display_name()
    }

    /// Get all protocols
    pub fn all() -> &'static [Protocol] {
        &[Protocol::I2c, Protocol::Uart, Protocol::Spi]
    }

    /// Look up a protocol by its settings tag
    pub fn from_settings_tag(tag: &str) -> Option<Self> {
        Self::all().iter().copied().find(|p| p.settings_tag() == tag)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
