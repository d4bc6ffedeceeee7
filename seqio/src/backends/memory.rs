//! Random-access backend over a `Vec<u8>`

use crate::backend::Backend;
use crate::error::DeviceError;
use crate::open_mode::OpenMode;

#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    data: Vec<u8>,
    cursor: usize,
    writable: bool,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend over existing content
    #[must_use]
    pub fn with_data(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl Backend for MemoryBackend {
    fn open(&mut self, mode: OpenMode) -> Result<(), DeviceError> {
        if !mode.is_readable() && !mode.is_writable() {
            return Err(DeviceError::Unsupported("buffer access not specified"));
        }
        if mode.contains(OpenMode::TRUNCATE) {
            self.data.clear();
        }
        self.writable = mode.is_writable();
        self.cursor = 0;
        Ok(())
    }

    fn read_data(&mut self, buf: &mut [u8]) -> i64 {
        let available = self.data.len().saturating_sub(self.cursor);
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.cursor..self.cursor + n]);
        self.cursor += n;
        #[allow(clippy::cast_possible_wrap)]
        {
            n as i64
        }
    }

    fn write_data(&mut self, buf: &[u8]) -> i64 {
        let end = self.cursor + buf.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.cursor..end].copy_from_slice(buf);
        self.cursor = end;
        #[allow(clippy::cast_possible_wrap)]
        {
            buf.len() as i64
        }
    }

    /// Seeking past the end of a writable buffer zero-fills the gap.
    fn seek(&mut self, pos: i64) -> Result<(), DeviceError> {
        let target = usize::try_from(pos).map_err(|_| DeviceError::InvalidPosition(pos))?;
        if target > self.data.len() {
            if !self.writable {
                return Err(DeviceError::InvalidPosition(pos));
            }
            self.data.resize(target, 0);
        }
        self.cursor = target;
        Ok(())
    }

    fn size(&self) -> Option<i64> {
        i64::try_from(self.data.len()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_at_cursor() {
        let mut backend = MemoryBackend::with_data(b"hello".to_vec());
        backend.open(OpenMode::READ_WRITE).unwrap();

        let mut buf = [0u8; 2];
        assert_eq!(backend.read_data(&mut buf), 2);
        assert_eq!(&buf, b"he");

        assert_eq!(backend.write_data(b"LLO!"), 4);
        assert_eq!(backend.data(), b"heLLO!");
        assert_eq!(backend.read_data(&mut buf), 0);
    }

    #[test]
    fn test_truncate_on_open() {
        let mut backend = MemoryBackend::with_data(b"old".to_vec());
        backend
            .open(OpenMode::WRITE_ONLY | OpenMode::TRUNCATE)
            .unwrap();
        assert_eq!(backend.size(), Some(0));
    }

    #[test]
    fn test_seek_past_end() {
        let mut backend = MemoryBackend::with_data(b"ab".to_vec());
        backend.open(OpenMode::READ_ONLY).unwrap();
        assert!(matches!(
            backend.seek(5),
            Err(DeviceError::InvalidPosition(5))
        ));

        backend.open(OpenMode::READ_WRITE).unwrap();
        backend.seek(4).unwrap();
        assert_eq!(backend.data(), b"ab\0\0");
    }

    #[test]
    fn test_open_needs_access() {
        let mut backend = MemoryBackend::new();
        assert!(backend.open(OpenMode::TEXT).is_err());
    }
}
