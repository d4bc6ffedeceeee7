#![allow(dead_code)]

use seqio::{Backend, Device, DeviceConfig, DeviceError, MemoryBackend, OpenMode};
use std::collections::VecDeque;

/// Backend that hands out pre-recorded pieces, one per `read_data` call.
///
/// A piece larger than the caller's buffer is split and the rest is served
/// by the next call. An empty piece reads as 0 bytes.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    pub pieces: VecDeque<Vec<u8>>,
    pub sequential: bool,
    pub written: Vec<u8>,
    pub read_calls: usize,
    pub probe_calls: usize,
}

impl ScriptedBackend {
    pub fn sequential(pieces: &[&[u8]]) -> Self {
        Self {
            pieces: pieces.iter().map(|p| p.to_vec()).collect(),
            sequential: true,
            ..Self::default()
        }
    }

    pub fn random_access(pieces: &[&[u8]]) -> Self {
        Self {
            sequential: false,
            ..Self::sequential(pieces)
        }
    }
}

impl Backend for ScriptedBackend {
    fn is_sequential(&self) -> bool {
        self.sequential
    }

    fn read_data(&mut self, buf: &mut [u8]) -> i64 {
        if buf.is_empty() {
            self.probe_calls += 1;
            return 0;
        }
        self.read_calls += 1;
        let Some(mut piece) = self.pieces.pop_front() else {
            return 0;
        };
        let n = piece.len().min(buf.len());
        buf[..n].copy_from_slice(&piece[..n]);
        if n < piece.len() {
            self.pieces.push_front(piece.split_off(n));
        }
        n as i64
    }

    fn write_data(&mut self, buf: &[u8]) -> i64 {
        self.written.extend_from_slice(buf);
        buf.len() as i64
    }

    fn bytes_available(&self) -> i64 {
        if self.sequential {
            self.pieces.iter().map(Vec::len).sum::<usize>() as i64
        } else {
            0
        }
    }
}

/// Random-access memory backend whose `seek` can be made to fail.
#[derive(Debug, Default)]
pub struct StuckSeekBackend {
    pub inner: MemoryBackend,
    pub fail_seeks: bool,
}

impl StuckSeekBackend {
    pub fn with_data(data: &[u8]) -> Self {
        Self {
            inner: MemoryBackend::with_data(data.to_vec()),
            fail_seeks: false,
        }
    }
}

impl Backend for StuckSeekBackend {
    fn read_data(&mut self, buf: &mut [u8]) -> i64 {
        self.inner.read_data(buf)
    }

    fn write_data(&mut self, buf: &[u8]) -> i64 {
        self.inner.write_data(buf)
    }

    fn open(&mut self, mode: OpenMode) -> Result<(), DeviceError> {
        self.inner.open(mode)
    }

    fn seek(&mut self, pos: i64) -> Result<(), DeviceError> {
        if self.fail_seeks {
            return Err(DeviceError::Failed(format!("seek to {pos} refused")));
        }
        self.inner.seek(pos)
    }

    fn size(&self) -> Option<i64> {
        self.inner.size()
    }
}

pub fn with_chunk_size<B: Backend>(backend: B, read_chunk_size: usize) -> Device<B> {
    Device::with_config(
        backend,
        &DeviceConfig {
            read_chunk_size,
            ..DeviceConfig::default()
        },
    )
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| b"abcdefghij\n"[i % 11]).collect()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
