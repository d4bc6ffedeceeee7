//! Random-access backend over a file on disk
//!
//! Open flags map onto `std::fs::OpenOptions`:
//!
//! | `OpenMode`                     | effect                               |
//! |--------------------------------|--------------------------------------|
//! | `WRITE_ONLY` alone             | create, truncate                     |
//! | `APPEND`                       | create, writes go to the end         |
//! | `TRUNCATE`                     | truncate                             |
//! | `NEW_ONLY`                     | fail if the file exists              |
//! | `EXISTING_ONLY`                | fail if the file does not exist      |
//!
//! With native line endings enabled, text-mode writes to a write-only file
//! expand `"\n"` into `"\r\n"`. The device counts the bytes it was handed,
//! so its position then trails the file offset. Files opened for reading
//! too are written untranslated and keep positions exact. Reads need
//! nothing special: the device strips `'\r'` in text mode anyway.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::backend::Backend;
use crate::error::DeviceError;
use crate::open_mode::OpenMode;
use crate::text_mode;

#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: Option<File>,
    native_line_endings: bool,
    text: bool,
    readable: bool,
}

impl FileBackend {
    /// Backend for `path`. Nothing is touched until the device opens.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
            native_line_endings: cfg!(windows),
            text: false,
            readable: false,
        }
    }

    /// Write `"\r\n"` line endings in text mode (default: on Windows only).
    #[must_use]
    pub fn with_native_line_endings(mut self, enabled: bool) -> Self {
        self.native_line_endings = enabled;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn options_for(mode: OpenMode) -> Result<OpenOptions, DeviceError> {
        if !mode.is_readable() && !mode.is_writable() && !mode.contains(OpenMode::APPEND) {
            return Err(DeviceError::Unsupported("file access not specified"));
        }
        if mode.contains(OpenMode::NEW_ONLY | OpenMode::EXISTING_ONLY) {
            return Err(DeviceError::Unsupported(
                "NEW_ONLY and EXISTING_ONLY are mutually exclusive",
            ));
        }

        let append = mode.contains(OpenMode::APPEND);
        let writable = mode.is_writable() || append;
        let truncate = mode.contains(OpenMode::TRUNCATE)
            || (writable
                && !mode.is_readable()
                && !append
                && !mode.contains(OpenMode::NEW_ONLY)
                && !mode.contains(OpenMode::EXISTING_ONLY));

        let mut options = OpenOptions::new();
        options.read(mode.is_readable());
        if append {
            options.append(true);
        } else {
            options.write(writable).truncate(truncate && writable);
        }
        if mode.contains(OpenMode::NEW_ONLY) {
            options.create_new(true);
        } else if writable && !mode.contains(OpenMode::EXISTING_ONLY) {
            options.create(true);
        }
        Ok(options)
    }
}

#[allow(clippy::cast_possible_wrap)]
fn as_count(n: usize) -> i64 {
    n as i64
}

impl Backend for FileBackend {
    fn open(&mut self, mode: OpenMode) -> Result<(), DeviceError> {
        let options = Self::options_for(mode)?;
        let file = options.open(&self.path)?;
        debug!(path = %self.path.display(), mode = ?mode, "file opened");
        self.file = Some(file);
        self.text = mode.is_text();
        self.readable = mode.is_readable();
        if self.text && self.native_line_endings && mode.is_readable() {
            debug!(path = %self.path.display(), "read-write text file: line endings kept as is");
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            debug!(path = %self.path.display(), "file closed");
        }
    }

    fn read_data(&mut self, buf: &mut [u8]) -> i64 {
        let Some(file) = self.file.as_mut() else {
            return -1;
        };
        match file.read(buf) {
            Ok(n) => {
                trace!(path = %self.path.display(), wanted = buf.len(), got = n, "read");
                as_count(n)
            }
            Err(e) => {
                log::warn!("FileBackend::read_data: {}: {e}", self.path.display());
                -1
            }
        }
    }

    /// Returns the number of caller bytes consumed, even when line endings
    /// were expanded on the way to disk.
    fn write_data(&mut self, buf: &[u8]) -> i64 {
        let Some(file) = self.file.as_mut() else {
            return -1;
        };
        let expand = self.text && self.native_line_endings && !self.readable;
        let bytes = if expand {
            text_mode::restore_carriage_returns(buf)
        } else {
            std::borrow::Cow::Borrowed(buf)
        };
        match file.write_all(&bytes) {
            Ok(()) => {
                trace!(path = %self.path.display(), bytes = buf.len(), "write");
                as_count(buf.len())
            }
            Err(e) => {
                log::warn!("FileBackend::write_data: {}: {e}", self.path.display());
                -1
            }
        }
    }

    fn seek(&mut self, pos: i64) -> Result<(), DeviceError> {
        let target = u64::try_from(pos).map_err(|_| DeviceError::InvalidPosition(pos))?;
        let file = self.file.as_mut().ok_or(DeviceError::NotOpen)?;
        file.seek(SeekFrom::Start(target))?;
        trace!(path = %self.path.display(), pos = pos, "seek");
        Ok(())
    }

    fn size(&self) -> Option<i64> {
        let len = self.file.as_ref()?.metadata().ok()?.len();
        i64::try_from(len).ok()
    }
}
