//! Test data builders for captures and bus traffic

use busdecode_rs::capture::CaptureData;
use busdecode_rs::decoder::uart::FrameFormat;
use busdecode_rs::signal::{I2cWaveform, UartWaveform};
use busdecode_rs::types::{ChannelId, CursorId};

/// Builder for in-memory captures
pub struct CaptureBuilder {
    capture: CaptureData,
}

impl CaptureBuilder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            capture: CaptureData::new(sample_rate),
        }
    }

    pub fn channel(mut self, id: ChannelId, samples: Vec<u8>) -> Self {
        self.capture.set_channel(id, samples);
        self
    }

    pub fn cursor(mut self, id: CursorId, position: usize) -> Self {
        self.capture.set_cursor(id, Some(position));
        self
    }

    pub fn build(self) -> CaptureData {
        self.capture
    }
}

/// One I2C write: START, address byte, data bytes (all ACKed), STOP
pub fn i2c_write(quarter: usize, address: u8, data: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut wave = I2cWaveform::new(quarter);
    wave.idle(quarter * 2);
    wave.start();
    wave.byte(address << 1, true);
    for &byte in data {
        wave.byte(byte, true);
    }
    wave.stop();
    wave.idle(quarter * 2);
    wave.finish()
}

/// 8N1 UART line carrying `bytes` with one idle bit around the traffic
pub fn uart_line(samples_per_bit: usize, bytes: &[u8]) -> Vec<u8> {
    let mut wave = UartWaveform::new(samples_per_bit, FrameFormat::default());
    wave.idle(1);
    for &byte in bytes {
        wave.frame(byte as u16);
    }
    wave.idle(1);
    wave.finish()
}

/// Render columns of samples in the text capture format
pub fn to_text(columns: &[&[u8]]) -> String {
    let rows = columns.iter().map(|c| c.len()).min().unwrap_or(0);
    let mut text = String::from("# generated capture\n");
    for row in 0..rows {
        let line: Vec<String> = columns.iter().map(|c| c[row].to_string()).collect();
        text.push_str(&line.join(" "));
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_text_rows() {
        let text = to_text(&[&[1, 0], &[0, 1]]);
        assert_eq!(text, "# generated capture\n1 0\n0 1\n");
    }
}
