//! Capture data: the sample source decoders read from
//!
//! A [`SampleSource`] supplies one array of logic levels per digital channel,
//! all sharing one index space, together with the sample rate and any cursor
//! positions the user has placed. [`CaptureData`] is the in-memory
//! implementation used by the binary and the tests.
//!
//! # Text Captures
//!
//! [`CaptureData::from_reader`] loads a plain text capture: one row per
//! sample, whitespace separated `0`/`1` columns, where column `k` holds
//! channel `k`. Blank lines and lines starting with `#` are ignored.
//!
//! ```text
//! # scl sda
//! 1 1
//! 1 0
//! 0 0
//! ```

use crate::error::{DecodeError, Result};
use crate::types::{ChannelId, CursorId, MAX_DIGITAL_CHANNELS, NUM_CURSORS};
use serde::{Deserialize, Serialize};
use std::io::BufRead;

/// Supplier of captured samples
pub trait SampleSource {
    /// Samples of a digital channel, `None` if the channel was not captured
    fn digital(&self, channel: ChannelId) -> Option<&[u8]>;

    /// Sample rate in samples per second
    fn sample_rate(&self) -> u32;

    /// Sample index of a cursor, `None` if the cursor is not placed
    fn cursor_position(&self, cursor: CursorId) -> Option<usize>;
}

/// Condition used to locate a trigger point in a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerCondition {
    /// Line is high
    High,
    /// Line is low
    Low,
    /// Line goes from low to high
    Rising,
    /// Line goes from high to low
    Falling,
}

impl TriggerCondition {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            TriggerCondition::High => "High",
            TriggerCondition::Low => "Low",
            TriggerCondition::Rising => "Rising Edge",
            TriggerCondition::Falling => "Falling Edge",
        }
    }

    /// Check the condition at `index` of `samples`
    pub fn matches(&self, samples: &[u8], index: usize) -> bool {
        let Some(&level) = samples.get(index) else {
            return false;
        };
        let previous = index.checked_sub(1).and_then(|i| samples.get(i)).copied();

        match self {
            TriggerCondition::High => level != 0,
            TriggerCondition::Low => level == 0,
            TriggerCondition::Rising => previous == Some(0) && level != 0,
            TriggerCondition::Falling => matches!(previous, Some(p) if p != 0) && level == 0,
        }
    }
}

/// In-memory capture of digital channels
#[derive(Debug, Clone, Default)]
pub struct CaptureData {
    sample_rate: u32,
    channels: Vec<Option<Vec<u8>>>,
    cursors: [Option<usize>; NUM_CURSORS],
}

impl CaptureData {
    /// Create an empty capture
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: vec![None; MAX_DIGITAL_CHANNELS],
            cursors: [None; NUM_CURSORS],
        }
    }

    /// Add a channel (builder style)
    pub fn with_channel(mut self, channel: ChannelId, samples: Vec<u8>) -> Self {
        self.set_channel(channel, samples);
        self
    }

    /// Set or replace the samples of a channel
    pub fn set_channel(&mut self, channel: ChannelId, samples: Vec<u8>) {
        if self.channels.len() < MAX_DIGITAL_CHANNELS {
            self.channels.resize(MAX_DIGITAL_CHANNELS, None);
        }
        self.channels[channel.index()] = Some(samples);
    }

    /// Place or clear a cursor
    pub fn set_cursor(&mut self, cursor: CursorId, position: Option<usize>) {
        self.cursors[cursor.index()] = position;
    }

    /// Place a cursor (builder style)
    pub fn with_cursor(mut self, cursor: CursorId, position: usize) -> Self {
        self.set_cursor(cursor, Some(position));
        self
    }

    /// Channels that hold samples
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_some())
            .filter_map(|(i, _)| ChannelId::new(i as u8))
            .collect()
    }

    /// Number of samples in the longest channel
    pub fn sample_count(&self) -> usize {
        self.channels
            .iter()
            .flatten()
            .map(|c| c.len())
            .max()
            .unwrap_or(0)
    }

    /// First sample index where `condition` holds on `channel`
    pub fn find_trigger(&self, channel: ChannelId, condition: TriggerCondition) -> Option<usize> {
        let samples = self.digital(channel)?;
        (0..samples.len()).find(|&i| condition.matches(samples, i))
    }

    /// Load a text capture (see module docs)
    pub fn from_reader(sample_rate: u32, reader: impl BufRead) -> Result<Self> {
        let mut columns: Vec<Vec<u8>> = Vec::new();

        for (line_idx, line) in reader.lines().enumerate() {
            let line_no = line_idx + 1;
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let levels = trimmed
                .split_whitespace()
                .map(|field| match field {
                    "0" => Ok(0u8),
                    "1" => Ok(1u8),
                    other => Err(DecodeError::Capture {
                        line: line_no,
                        message: format!("expected 0 or 1, found '{}'", other),
                    }),
                })
                .collect::<Result<Vec<u8>>>()?;

            if columns.is_empty() {
                if levels.len() > MAX_DIGITAL_CHANNELS {
                    return Err(DecodeError::Capture {
                        line: line_no,
                        message: format!(
                            "{} columns exceeds the {} available channels",
                            levels.len(),
                            MAX_DIGITAL_CHANNELS
                        ),
                    });
                }
                columns = vec![Vec::new(); levels.len()];
            } else if levels.len() != columns.len() {
                return Err(DecodeError::Capture {
                    line: line_no,
                    message: format!(
                        "expected {} columns, found {}",
                        columns.len(),
                        levels.len()
                    ),
                });
            }

            for (column, level) in columns.iter_mut().zip(levels) {
                column.push(level);
            }
        }

        let mut capture = CaptureData::new(sample_rate);
        for (i, samples) in columns.into_iter().enumerate() {
            if let Some(id) = ChannelId::new(i as u8) {
                capture.set_channel(id, samples);
            }
        }

        tracing::debug!(
            "Loaded capture with {} channels, {} samples",
            capture.channel_ids().len(),
            capture.sample_count()
        );

        Ok(capture)
    }
}

impl SampleSource for CaptureData {
    fn digital(&self, channel: ChannelId) -> Option<&[u8]> {
        self.channels
            .get(channel.index())
            .and_then(|c| c.as_deref())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn cursor_position(&self, cursor: CursorId) -> Option<usize> {
        self.cursors[cursor.index()]
    }
}
