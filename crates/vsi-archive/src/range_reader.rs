//! Blocking `Read + Seek` view of a [`RangeSource`].
//!
//! Reads are served from a buffered window. A miss fetches a new window
//! with one range request; consecutive sequential misses double the window
//! so large entries need few requests. Must only be driven from a blocking
//! thread (`spawn_blocking`), never from inside the async runtime.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use bytes::Bytes;
use tokio::runtime::Handle;

use crate::source::RangeSource;

const MIN_WINDOW: u64 = 64 * 1024;
const MAX_WINDOW: u64 = 8 * 1024 * 1024;

#[derive(Clone)]
pub struct RangeReader {
    source: Arc<dyn RangeSource>,
    handle: Handle,
    len: u64,
    pos: u64,
    window: Bytes,
    window_start: u64,
    window_size: u64,
}

impl RangeReader {
    /// `len` is the total size of `source`.
    pub fn new(source: Arc<dyn RangeSource>, handle: Handle, len: u64) -> Self {
        Self {
            source,
            handle,
            len,
            pos: 0,
            window: Bytes::new(),
            window_start: 0,
            window_size: MIN_WINDOW,
        }
    }

    fn window_end(&self) -> u64 {
        self.window_start + self.window.len() as u64
    }

    fn in_window(&self, pos: u64) -> bool {
        pos >= self.window_start && pos < self.window_end()
    }

    fn fill(&mut self) -> io::Result<()> {
        let sequential = !self.window.is_empty() && self.pos == self.window_end();
        self.window_size = if sequential {
            (self.window_size * 2).min(MAX_WINDOW)
        } else {
            MIN_WINDOW
        };

        // Near the end, pull the window back so tail scans hit one fetch
        let start = self.pos.min(self.len.saturating_sub(self.window_size));
        let len = self.window_size.min(self.len - start);
        let data = self
            .handle
            .block_on(self.source.read_range(start, len))
            .map_err(io::Error::other)?;

        self.window_start = start;
        self.window = data;
        Ok(())
    }
}

impl Read for RangeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.pos >= self.len {
            return Ok(0);
        }
        if !self.in_window(self.pos) {
            self.fill()?;
        }

        let offset = (self.pos - self.window_start) as usize;
        let available = &self.window[offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for RangeReader {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        let pos = match target {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        let pos = pos.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of archive")
        })?;
        self.pos = pos;
        Ok(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryRangeSource;

    fn reader(data: Vec<u8>) -> RangeReader {
        let len = data.len() as u64;
        let source: Arc<dyn RangeSource> = Arc::new(MemoryRangeSource::new("mem", data));
        RangeReader::new(source, Handle::current(), len)
    }

    #[tokio::test]
    async fn test_read_and_seek() {
        let data: Vec<u8> = (0..=255u8).cycle().take(200_000).collect();
        let expected = data.clone();

        let mut r = reader(data);
        let out = tokio::task::spawn_blocking(move || {
            let mut tail = [0u8; 4];
            r.seek(SeekFrom::End(-4)).unwrap();
            r.read_exact(&mut tail).unwrap();

            let mut all = Vec::new();
            r.seek(SeekFrom::Start(0)).unwrap();
            r.read_to_end(&mut all).unwrap();
            (tail, all)
        })
        .await
        .unwrap();

        assert_eq!(&out.0[..], &expected[expected.len() - 4..]);
        assert_eq!(out.1, expected);
    }

    #[tokio::test]
    async fn test_seek_before_start_fails() {
        let mut r = reader(vec![0; 10]);
        let err = tokio::task::spawn_blocking(move || r.seek(SeekFrom::Current(-1)))
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
