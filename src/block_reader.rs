//! Block reader - buffered, seek-capable view over one volume.
//!
//! Maintains a sliding window over one volume's bytes. Reads larger than the
//! window bypass it. The reader does no I/O of its own; it delegates to the
//! volume's [`FileMedia`].

use crate::error::Result;
use crate::file_media::{FileMedia, ReadInterval};
use std::sync::Arc;

/// Default sliding-window size, per `spec.md` §4.1.
pub const DEFAULT_BUFFER_SIZE: u64 = 64 * 1024;

/// Buffered reader over one volume's [`FileMedia`].
pub struct BlockReader {
    media: Arc<dyn FileMedia>,
    buffer_size: u64,
    window_start: u64,
    window: Vec<u8>,
}

impl BlockReader {
    pub fn new(media: Arc<dyn FileMedia>) -> Self {
        Self::with_buffer_size(media, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(media: Arc<dyn FileMedia>, buffer_size: u64) -> Self {
        Self {
            media,
            buffer_size,
            window_start: 0,
            window: Vec::new(),
        }
    }

    pub fn volume_length(&self) -> u64 {
        self.media.length()
    }

    fn in_window(&self, offset: u64, n: u64) -> bool {
        !self.window.is_empty()
            && offset >= self.window_start
            && offset + n <= self.window_start + self.window.len() as u64
    }

    /// Read exactly `n` bytes starting at `offset`, refilling the sliding
    /// window as needed. Requests larger than the buffer bypass it entirely.
    pub async fn read_exact(&mut self, offset: u64, n: u64) -> Result<Vec<u8>> {
        if n > self.buffer_size {
            return self
                .media
                .read_range(ReadInterval {
                    start: offset,
                    end: offset + n - 1,
                })
                .await;
        }

        if !self.in_window(offset, n) {
            let window_end = (offset + self.buffer_size).min(self.media.length()) - 1;
            self.window = self
                .media
                .read_range(ReadInterval {
                    start: offset,
                    end: window_end,
                })
                .await?;
            self.window_start = offset;
        }

        let rel = (offset - self.window_start) as usize;
        Ok(self.window[rel..rel + n as usize].to_vec())
    }

    /// Read `n` bytes at `offset` without disturbing the current window's
    /// logical read position (header peeks during size discovery).
    pub async fn peek(&self, offset: u64, n: u64) -> Result<Vec<u8>> {
        if self.in_window(offset, n) {
            let rel = (offset - self.window_start) as usize;
            return Ok(self.window[rel..rel + n as usize].to_vec());
        }
        let end = (offset + n - 1).min(self.media.length().saturating_sub(1));
        self.media
            .read_range(ReadInterval {
                start: offset,
                end,
            })
            .await
    }
}
