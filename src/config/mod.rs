//! Configuration module for busdecode-rs
//!
//! This module handles everything a decoding session is set up from:
//! - Decoder configurations and their settings-string form
//! - Default decoder naming
//! - Session files (`.toml`) holding channels, cursors and decoders
//!
//! # Main Types
//!
//! - [`DecoderConfig`] - Configuration of any one decoder
//! - [`DecoderNamer`] - Hands out default names like "UART 2"
//! - [`SessionFile`] - Persisted session
//! - [`ChannelConfig`] / [`ChannelUsage`] - Per-channel capture or generate setup
//!
//! # Example
//!
//! ```ignore
//! use busdecode_rs::config::{DecoderConfig, SessionFile};
//!
//! let config = DecoderConfig::from_settings_string("UART;Console;0;0;9600;8;1;0;-1")?;
//! let session = SessionFile::load("bench.toml")?;
//! for decoder in session.decoder_configs()? {
//!     println!("{}", decoder.to_settings_string());
//! }
//! ```

pub mod session;
pub mod settings;

pub use session::{ChannelConfig, ChannelUsage, CursorPosition, DecoderEntry, SessionFile};
pub use settings::{from_settings_string, to_settings_string};

use crate::decoder::{I2cConfig, SpiConfig, UartConfig};
use crate::error::{DecodeError, Result};
use crate::types::{ChannelId, CursorId, DataFormat, Protocol};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration of one decoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum DecoderConfig {
    I2c(I2cConfig),
    Uart(UartConfig),
    Spi(SpiConfig),
}

impl DecoderConfig {
    /// Protocol this configuration decodes
    pub fn protocol(&self) -> Protocol {
        match self {
            DecoderConfig::I2c(_) => Protocol::I2c,
            DecoderConfig::Uart(_) => Protocol::Uart,
            DecoderConfig::Spi(_) => Protocol::Spi,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DecoderConfig::I2c(c) => &c.name,
            DecoderConfig::Uart(c) => &c.name,
            DecoderConfig::Spi(c) => &c.name,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        match self {
            DecoderConfig::I2c(c) => c.name = name,
            DecoderConfig::Uart(c) => c.name = name,
            DecoderConfig::Spi(c) => c.name = name,
        }
    }

    pub fn format(&self) -> DataFormat {
        match self {
            DecoderConfig::I2c(c) => c.format,
            DecoderConfig::Uart(c) => c.format,
            DecoderConfig::Spi(c) => c.format,
        }
    }

    /// Cursor decoding starts from, if any
    pub fn sync_cursor(&self) -> Option<CursorId> {
        match self {
            DecoderConfig::I2c(c) => c.sync_cursor,
            DecoderConfig::Uart(c) => c.sync_cursor,
            DecoderConfig::Spi(c) => c.sync_cursor,
        }
    }

    /// Channels this decoder reads
    pub fn channels(&self) -> Vec<ChannelId> {
        let lines = match self {
            DecoderConfig::I2c(c) => vec![c.scl, c.sda],
            DecoderConfig::Uart(c) => vec![c.rx],
            DecoderConfig::Spi(c) => vec![c.sck, c.mosi, c.miso, c.enable],
        };
        lines.into_iter().flatten().collect()
    }

    /// Check numeric fields against the ranges the settings string accepts
    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| Err(DecodeError::Config(message));
        match self {
            DecoderConfig::I2c(_) => Ok(()),
            DecoderConfig::Uart(c) => {
                if c.baud_rate == 0 {
                    return fail(format!("{}: baud rate must be positive", c.name));
                }
                if !settings::UART_DATA_BITS.contains(&c.data_bits) {
                    return fail(format!("{}: {} data bits not supported", c.name, c.data_bits));
                }
                if !settings::UART_STOP_BITS.contains(&c.stop_bits) {
                    return fail(format!("{}: {} stop bits not supported", c.name, c.stop_bits));
                }
                Ok(())
            }
            DecoderConfig::Spi(c) => {
                if !settings::SPI_DATA_BITS.contains(&c.data_bits) {
                    return fail(format!("{}: {} bit words not supported", c.name, c.data_bits));
                }
                Ok(())
            }
        }
    }

    /// Encode as a settings string
    pub fn to_settings_string(&self) -> String {
        settings::to_settings_string(self)
    }

    /// Parse a settings string, all-or-nothing
    pub fn from_settings_string(text: &str) -> Result<Self> {
        settings::from_settings_string(text)
    }
}

impl From<I2cConfig> for DecoderConfig {
    fn from(config: I2cConfig) -> Self {
        DecoderConfig::I2c(config)
    }
}

impl From<UartConfig> for DecoderConfig {
    fn from(config: UartConfig) -> Self {
        DecoderConfig::Uart(config)
    }
}

impl From<SpiConfig> for DecoderConfig {
    fn from(config: SpiConfig) -> Self {
        DecoderConfig::Spi(config)
    }
}

/// Counter object for default decoder names
///
/// Each protocol counts separately: "I2C 1", "UART 1", "I2C 2".
#[derive(Debug, Clone, Default)]
pub struct DecoderNamer {
    counts: HashMap<Protocol, u32>,
}

impl DecoderNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next default name for `protocol`
    pub fn next_name(&mut self, protocol: Protocol) -> String {
        let count = self.counts.entry(protocol).or_insert(0);
        *count += 1;
        format!("{} {}", protocol.display_name(), count)
    }

    /// Give `config` a default name if it has none
    pub fn name_if_empty(&mut self, config: &mut DecoderConfig) {
        if config.name().trim().is_empty() {
            let name = self.next_name(config.protocol());
            config.set_name(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namer_counts_per_protocol() {
        let mut namer = DecoderNamer::new();
        assert_eq!(namer.next_name(Protocol::I2c), "I2C 1");
        assert_eq!(namer.next_name(Protocol::Uart), "UART 1");
        assert_eq!(namer.next_name(Protocol::I2c), "I2C 2");

        // Independent namers do not share counts
        let mut other = DecoderNamer::new();
        assert_eq!(other.next_name(Protocol::I2c), "I2C 1");
    }

    #[test]
    fn test_name_if_empty() {
        let mut namer = DecoderNamer::new();
        let mut config = DecoderConfig::Spi(SpiConfig {
            name: String::new(),
            ..Default::default()
        });
        namer.name_if_empty(&mut config);
        assert_eq!(config.name(), "SPI 1");

        namer.name_if_empty(&mut config);
        assert_eq!(config.name(), "SPI 1");
    }

    #[test]
    fn test_validate_ranges() {
        let rx = ChannelId::new(0).unwrap();
        let mut uart = UartConfig::new(rx, 9600);
        assert!(DecoderConfig::Uart(uart.clone()).validate().is_ok());

        uart.data_bits = 12;
        assert!(DecoderConfig::Uart(uart.clone()).validate().is_err());

        uart.data_bits = 8;
        uart.baud_rate = 0;
        assert!(DecoderConfig::Uart(uart).validate().is_err());

        let spi = SpiConfig {
            data_bits: 3,
            ..Default::default()
        };
        assert!(DecoderConfig::Spi(spi).validate().is_err());
    }

    #[test]
    fn test_channels_skip_unassigned() {
        let sck = ChannelId::new(2).unwrap();
        let mosi = ChannelId::new(3).unwrap();
        let config = DecoderConfig::Spi(SpiConfig::new(sck, mosi));
        assert_eq!(config.channels(), vec![sck, mosi]);
    }

    #[test]
    fn test_structured_config_json() {
        let rx = ChannelId::new(1).unwrap();
        let config = DecoderConfig::Uart(UartConfig::new(rx, 19200));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"protocol\":\"uart\""));

        let back: DecoderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
