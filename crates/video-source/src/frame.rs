//! Video frame types

use crate::SourceError;

/// Decoded RGB video frame
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Native frame width
    pub width: u32,
    /// Native frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Create a black frame, mostly useful for wiring tests
    pub fn blank(width: u32, height: u32, sequence: u32) -> Self {
        Self::new(
            vec![0; (width * height * 3) as usize],
            width,
            height,
            0,
            sequence,
        )
    }

    /// Native pixel dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Check the buffer matches the declared dimensions
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.width == 0 || self.height == 0 {
            return Err(SourceError::Format(format!(
                "zero-sized frame {}x{}",
                self.width, self.height
            )));
        }

        let expected = self.width as usize * self.height as usize * 3;
        if self.data.len() != expected {
            return Err(SourceError::Format(format!(
                "expected {} bytes for {}x{} RGB, got {}",
                expected,
                self.width,
                self.height,
                self.data.len()
            )));
        }

        Ok(())
    }
}
