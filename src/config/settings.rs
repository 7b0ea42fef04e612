//! Settings string codec for decoder configurations
//!
//! A decoder configuration persists as a single line of `;`-joined fields.
//! The first field is the protocol tag and fixes the schema of the rest:
//!
//! ```text
//! I2C;name;scl;sda;format;cursor
//! UART;name;rx;format;baud;data_bits;stop_bits;parity;cursor
//! SPI;name;sck;mosi;miso;enable;mode;enable_polarity;data_bits;format;cursor
//! ```
//!
//! Channels and cursors are written as their index, or `-1` when unassigned.
//! `format` is the [`DataFormat`] index (0 ASCII, 1 decimal, 2 hex),
//! `parity` the [`Parity`] index (0 none, 1 odd, 2 even, 3 mark, 4 space),
//! `enable_polarity` 0 for active low and 1 for active high.
//!
//! Parsing is all-or-nothing: a wrong tag, a wrong field count or any
//! value out of range fails the whole string.

use super::DecoderConfig;
use crate::decoder::{spi, uart, EnablePolarity, I2cConfig, Parity, SpiConfig, SpiMode, UartConfig};
use crate::error::{DecodeError, Result};
use crate::types::{ChannelId, CursorId, DataFormat, Protocol};
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Field separator
pub const SEPARATOR: char = ';';

/// Textual form of an unassigned channel or cursor
pub const UNASSIGNED: i32 = -1;

/// Valid UART data bits
pub const UART_DATA_BITS: RangeInclusive<u8> = uart::DATA_BITS;

/// Valid UART stop bits
pub const UART_STOP_BITS: RangeInclusive<u8> = uart::STOP_BITS;

/// Valid SPI word widths
pub const SPI_DATA_BITS: RangeInclusive<u8> = spi::WORD_BITS;

const I2C_FIELDS: usize = 6;
const UART_FIELDS: usize = 9;
const SPI_FIELDS: usize = 11;

/// Encode a configuration as a settings string
pub fn to_settings_string(config: &DecoderConfig) -> String {
    let tag = config.protocol().settings_tag();
    let fields: Vec<String> = match config {
        DecoderConfig::I2c(c) => vec![
            tag.to_string(),
            clean_name(&c.name),
            channel_field(c.scl),
            channel_field(c.sda),
            c.format.settings_index().to_string(),
            cursor_field(c.sync_cursor),
        ],
        DecoderConfig::Uart(c) => vec![
            tag.to_string(),
            clean_name(&c.name),
            channel_field(c.rx),
            c.format.settings_index().to_string(),
            c.baud_rate.to_string(),
            c.data_bits.to_string(),
            c.stop_bits.to_string(),
            c.parity.settings_index().to_string(),
            cursor_field(c.sync_cursor),
        ],
        DecoderConfig::Spi(c) => vec![
            tag.to_string(),
            clean_name(&c.name),
            channel_field(c.sck),
            channel_field(c.mosi),
            channel_field(c.miso),
            channel_field(c.enable),
            c.mode.index().to_string(),
            c.enable_polarity.index().to_string(),
            c.data_bits.to_string(),
            c.format.settings_index().to_string(),
            cursor_field(c.sync_cursor),
        ],
    };
    fields.join(&SEPARATOR.to_string())
}

/// Parse a settings string
pub fn from_settings_string(settings: &str) -> Result<DecoderConfig> {
    let fields: Vec<&str> = settings.trim().split(SEPARATOR).collect();
    let tag = fields[0].trim();
    let protocol = Protocol::from_settings_tag(tag)
        .ok_or_else(|| DecodeError::Settings(format!("unknown protocol tag '{}'", tag)))?;

    let expected = match protocol {
        Protocol::I2c => I2C_FIELDS,
        Protocol::Uart => UART_FIELDS,
        Protocol::Spi => SPI_FIELDS,
    };
    if fields.len() != expected {
        return Err(DecodeError::Settings(format!(
            "{} settings need {} fields, got {}",
            protocol,
            expected,
            fields.len()
        )));
    }

    let mut reader = FieldReader::new(&fields[1..]);
    let config = match protocol {
        Protocol::I2c => DecoderConfig::I2c(I2cConfig {
            name: reader.name(),
            scl: reader.channel("scl")?,
            sda: reader.channel("sda")?,
            format: reader.format()?,
            sync_cursor: reader.cursor()?,
        }),
        Protocol::Uart => DecoderConfig::Uart(UartConfig {
            name: reader.name(),
            rx: reader.channel("rx")?,
            format: reader.format()?,
            baud_rate: reader.number("baud", 1..=u32::MAX)?,
            data_bits: reader.number("data_bits", UART_DATA_BITS)?,
            stop_bits: reader.number("stop_bits", UART_STOP_BITS)?,
            parity: {
                let index = reader.number("parity", 0..=4)?;
                Parity::from_settings_index(index)
                    .ok_or_else(|| DecodeError::Settings(format!("invalid parity {}", index)))?
            },
            sync_cursor: reader.cursor()?,
        }),
        Protocol::Spi => DecoderConfig::Spi(SpiConfig {
            name: reader.name(),
            sck: reader.channel("sck")?,
            mosi: reader.channel("mosi")?,
            miso: reader.channel("miso")?,
            enable: reader.channel("enable")?,
            mode: {
                let index = reader.number("mode", 0..=3)?;
                SpiMode::from_index(index)
                    .ok_or_else(|| DecodeError::Settings(format!("invalid SPI mode {}", index)))?
            },
            enable_polarity: {
                let index = reader.number("enable_polarity", 0..=1)?;
                EnablePolarity::from_index(index).ok_or_else(|| {
                    DecodeError::Settings(format!("invalid enable polarity {}", index))
                })?
            },
            data_bits: reader.number("data_bits", SPI_DATA_BITS)?,
            format: reader.format()?,
            sync_cursor: reader.cursor()?,
        }),
    };

    Ok(config)
}

// Names are free text; the separator would break the schema
fn clean_name(name: &str) -> String {
    name.replace(SEPARATOR, ",")
}

fn channel_field(channel: Option<ChannelId>) -> String {
    channel.map_or(UNASSIGNED, |c| c.index() as i32).to_string()
}

fn cursor_field(cursor: Option<CursorId>) -> String {
    cursor.map_or(UNASSIGNED, |c| c.index() as i32).to_string()
}

/// Sequential reader over the fields after the tag
struct FieldReader<'a> {
    fields: &'a [&'a str],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(fields: &'a [&'a str]) -> Self {
        Self { fields, pos: 0 }
    }

    fn next(&mut self) -> &'a str {
        // Field count is checked before reading
        let field = self.fields.get(self.pos).copied().unwrap_or("");
        self.pos += 1;
        field.trim()
    }

    fn name(&mut self) -> String {
        self.next().to_string()
    }

    fn number<T>(&mut self, what: &str, range: RangeInclusive<T>) -> Result<T>
    where
        T: FromStr + PartialOrd + Display,
    {
        let field = self.next();
        let value: T = field
            .parse()
            .map_err(|_| DecodeError::Settings(format!("{} '{}' is not a number", what, field)))?;
        if !range.contains(&value) {
            return Err(DecodeError::Settings(format!(
                "{} {} outside {}..={}",
                what,
                value,
                range.start(),
                range.end()
            )));
        }
        Ok(value)
    }

    /// An index field where -1 means unassigned
    fn optional_index(&mut self, what: &str, limit: usize) -> Result<Option<u8>> {
        let value: i32 = self.number(what, UNASSIGNED..=(limit as i32 - 1))?;
        Ok(u8::try_from(value).ok())
    }

    fn channel(&mut self, what: &str) -> Result<Option<ChannelId>> {
        let index = self.optional_index(what, crate::types::MAX_DIGITAL_CHANNELS)?;
        Ok(index.and_then(ChannelId::new))
    }

    fn cursor(&mut self) -> Result<Option<CursorId>> {
        let index = self.optional_index("cursor", crate::types::NUM_CURSORS)?;
        Ok(index.and_then(CursorId::new))
    }

    fn format(&mut self) -> Result<DataFormat> {
        let index = self.number("format", 0..=2)?;
        DataFormat::from_settings_index(index)
            .ok_or_else(|| DecodeError::Settings(format!("invalid format {}", index)))
    }
}
