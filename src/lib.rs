//! # busdecode-rs: Logic Analyzer Protocol Decoders
//!
//! Turns digital sample arrays from a logic analyzer capture into ordered
//! lists of protocol events for I2C, UART and SPI buses. Decoders are pure
//! functions of (samples, configuration): each pass rebuilds its event list
//! from the scan origin.
//!
//! ## Architecture
//!
//! - **Capture**: [`capture::SampleSource`] supplies per-channel samples, the
//!   sample rate and cursor positions; [`capture::CaptureData`] is the
//!   in-memory implementation
//! - **Decoders**: per-protocol state machines behind [`decoder::ProtocolDecoder`]
//! - **Format**: [`format::EventFormatter`] turns events into short/long labels
//! - **Config**: decoder configurations, the settings-string codec and TOML
//!   session files
//! - **Signal**: waveform synthesis for generate-mode channels and tests
//!
//! ## Example
//!
//! ```ignore
//! use busdecode_rs::{
//!     capture::CaptureData,
//!     config::DecoderConfig,
//!     decoder::Decoder,
//! };
//!
//! let capture = CaptureData::from_reader(1_000_000, std::io::BufReader::new(file))?;
//! let config = DecoderConfig::from_settings_string("I2C;Sensors;0;1;2;-1")?;
//!
//! let mut decoder = Decoder::from_config(config);
//! decoder.analyze(&capture);
//! for label in decoder.labels() {
//!     println!("{:>8} {}", label.start, label.long_text);
//! }
//! ```

pub mod capture;
pub mod config;
pub mod decoder;
pub mod error;
pub mod format;
pub mod signal;
pub mod types;

// Re-export commonly used types
pub use capture::{CaptureData, SampleSource, TriggerCondition};
pub use config::{DecoderConfig, DecoderNamer, SessionFile};
pub use decoder::{Decoder, ProtocolDecoder};
pub use error::{DecodeError, Result};
pub use format::{EventFormatter, EventLabel};
pub use types::{ChannelId, CursorId, DataFormat, DecodedEvent, EventKind, Protocol};
