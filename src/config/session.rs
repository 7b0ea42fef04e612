//! Session files
//!
//! A session file is TOML describing how a capture is decoded: its sample
//! rate, where the cursors sit, what each channel is used for, and the
//! decoders to run. Decoders can be written as tables or as settings
//! strings:
//!
//! ```toml
//! sample_rate = 1000000
//!
//! [[cursor]]
//! id = 1
//! position = 2400
//!
//! [[channel]]
//! id = 0
//! name = "SCL"
//! usage = { mode = "capture", trigger = "falling" }
//!
//! [[channel]]
//! id = 4
//! name = "Loopback"
//! usage = { mode = "generate", pattern = { kind = "uart", baud_rate = 9600, text = "hi" } }
//!
//! [[decoder]]
//! protocol = "i2c"
//! scl = 0
//! sda = 1
//!
//! decoder_settings = ["UART;Console;4;0;9600;8;1;0;-1"]
//! ```

use super::{DecoderConfig, DecoderNamer};
use crate::capture::{CaptureData, SampleSource, TriggerCondition};
use crate::error::{DecodeError, Result, ResultExt};
use crate::signal::GeneratorPattern;
use crate::types::{ChannelId, CursorId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Session file extension
pub const SESSION_FILE_EXTENSION: &str = "toml";

/// What a channel is used for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ChannelUsage {
    /// Input channel, optionally the trigger source
    Capture {
        #[serde(default)]
        trigger: Option<TriggerCondition>,
    },
    /// Output channel driven by a pattern
    Generate { pattern: GeneratorPattern },
}

impl Default for ChannelUsage {
    fn default() -> Self {
        ChannelUsage::Capture { trigger: None }
    }
}

/// Per-channel configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub id: ChannelId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub usage: ChannelUsage,
}

impl ChannelConfig {
    /// Capture channel without a trigger
    pub fn capture(id: ChannelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            usage: ChannelUsage::default(),
        }
    }

    /// Set the trigger condition, turning the channel into a capture channel
    pub fn with_trigger(mut self, trigger: TriggerCondition) -> Self {
        self.usage = ChannelUsage::Capture {
            trigger: Some(trigger),
        };
        self
    }

    /// Generate channel
    pub fn generate(id: ChannelId, name: impl Into<String>, pattern: GeneratorPattern) -> Self {
        Self {
            id,
            name: name.into(),
            usage: ChannelUsage::Generate { pattern },
        }
    }

    pub fn trigger(&self) -> Option<TriggerCondition> {
        match &self.usage {
            ChannelUsage::Capture { trigger } => *trigger,
            ChannelUsage::Generate { .. } => None,
        }
    }
}

/// A placed cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub id: CursorId,
    pub position: usize,
}

/// A decoder as written in a session file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderEntry {
    Settings(String),
    Structured(DecoderConfig),
}

impl DecoderEntry {
    /// Resolve to a validated configuration
    pub fn resolve(&self) -> Result<DecoderConfig> {
        let config = match self {
            DecoderEntry::Settings(text) => DecoderConfig::from_settings_string(text)?,
            DecoderEntry::Structured(config) => config.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Persisted decoding session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFile {
    /// Capture sample rate in Hz
    #[serde(default)]
    pub sample_rate: Option<u32>,

    #[serde(default, rename = "cursor")]
    pub cursors: Vec<CursorPosition>,

    #[serde(default, rename = "channel")]
    pub channels: Vec<ChannelConfig>,

    #[serde(default, rename = "decoder")]
    pub decoders: Vec<DecoderConfig>,

    /// Decoders in settings-string form
    #[serde(default)]
    pub decoder_settings: Vec<String>,
}

impl SessionFile {
    /// Load a session file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session file {:?}", path))?;
        Self::from_toml_str(&content).in_file(path)
    }

    /// Parse a session from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let session: Self = toml::from_str(content)
            .map_err(|e| DecodeError::Config(format!("Failed to parse session: {}", e)))?;
        tracing::debug!(
            "Loaded session: {} channels, {} decoders",
            session.channels.len(),
            session.decoders.len() + session.decoder_settings.len()
        );
        Ok(session)
    }

    /// Serialize to TOML text
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DecodeError::Serialization(format!("Failed to serialize session: {}", e)))
    }

    /// Save the session to disk
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = self.to_toml_string()?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write session file {:?}", path))
    }

    /// All decoders of the session, validated and named.
    ///
    /// Table entries come first, then settings strings. Unnamed decoders get
    /// a default name from `namer`.
    pub fn decoder_configs_with(&self, namer: &mut DecoderNamer) -> Result<Vec<DecoderConfig>> {
        let entries = self
            .decoders
            .iter()
            .cloned()
            .map(DecoderEntry::Structured)
            .chain(self.decoder_settings.iter().cloned().map(DecoderEntry::Settings));

        let mut configs = Vec::new();
        for (i, entry) in entries.enumerate() {
            let mut config = entry
                .resolve()
                .with_context(|| format!("Decoder {}", i + 1))?;
            namer.name_if_empty(&mut config);
            configs.push(config);
        }
        Ok(configs)
    }

    /// All decoders of the session with a fresh namer
    pub fn decoder_configs(&self) -> Result<Vec<DecoderConfig>> {
        self.decoder_configs_with(&mut DecoderNamer::new())
    }

    /// The first capture channel with a trigger condition
    pub fn trigger_channel(&self) -> Option<(ChannelId, TriggerCondition)> {
        self.channels
            .iter()
            .find_map(|c| c.trigger().map(|t| (c.id, t)))
    }

    /// Put the session's cursors and generated channels into `capture`.
    ///
    /// Generated channels are rendered to the capture's sample count and
    /// replace any captured samples on that channel.
    pub fn apply_to(&self, capture: &mut CaptureData) {
        for cursor in &self.cursors {
            capture.set_cursor(cursor.id, Some(cursor.position));
        }

        let len = capture.sample_count();
        let sample_rate = capture.sample_rate();
        for channel in &self.channels {
            if let ChannelUsage::Generate { pattern } = &channel.usage {
                tracing::debug!("Generating {} on {}", pattern.display_name(), channel.id);
                capture.set_channel(channel.id, pattern.render(len, sample_rate));
            }
        }
    }
}
