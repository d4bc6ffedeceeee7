//! Backend hooks of a device
//!
//! A [`Backend`] is the part of a device that actually moves bytes: a file,
//! a pipe, a socket. [`Device`](crate::Device) wraps it and adds buffering,
//! positions, transactions and text mode.
//!
//! Only [`read_data`](Backend::read_data) and
//! [`write_data`](Backend::write_data) are required. The other hooks have
//! defaults describing a trivial random-access backend.
//!
//! Byte counts follow the POSIX convention: a non-negative count on success,
//! `-1` on failure.

use crate::error::DeviceError;
use crate::open_mode::OpenMode;

pub trait Backend {
    /// Read up to `buf.len()` bytes into `buf`.
    ///
    /// Returns the number of bytes read, 0 when nothing is available (or at
    /// the end of the stream), or -1 on error.
    ///
    /// The device calls this with an empty `buf` as a probe once its buffer
    /// runs dry, so that backends can refill or detect the end of the stream.
    fn read_data(&mut self, buf: &mut [u8]) -> i64;

    /// Write `buf`. Returns the number of bytes written or -1 on error.
    fn write_data(&mut self, buf: &[u8]) -> i64;

    /// Sequential backends have no position and no size.
    ///
    /// The device asks once per `open` and caches the answer.
    fn is_sequential(&self) -> bool {
        false
    }

    /// Acquire whatever the backend needs for `mode`.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be opened in `mode`.
    fn open(&mut self, _mode: OpenMode) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Release backend resources. Called after the device state is reset.
    fn close(&mut self) {}

    /// Move the backend cursor to `pos`.
    ///
    /// # Errors
    /// Returns an error if the backend cannot reposition.
    fn seek(&mut self, _pos: i64) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Total size, if the backend knows it.
    fn size(&self) -> Option<i64> {
        None
    }

    /// Bytes ready in the backend beyond what the device has buffered.
    fn bytes_available(&self) -> i64 {
        0
    }

    /// Whether the backend has reached its end, if it can tell.
    fn at_end(&self) -> Option<bool> {
        None
    }

    /// Specialised line reader: read up to and including `'\n'`, at most
    /// `buf.len()` bytes. `None` lets the device read byte by byte.
    fn read_line_data(&mut self, _buf: &mut [u8]) -> Option<i64> {
        None
    }

    /// Specialised skip. `None` lets the device skip by reading.
    fn skip_data(&mut self, _max_size: i64) -> Option<i64> {
        None
    }

    /// Block until data can be read or `msecs` elapse (-1: no timeout).
    fn wait_for_ready_read(&mut self, _msecs: i32) -> bool {
        false
    }

    /// Block until pending output is written or `msecs` elapse (-1: no timeout).
    fn wait_for_bytes_written(&mut self, _msecs: i32) -> bool {
        false
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn read_data(&mut self, buf: &mut [u8]) -> i64 {
        (**self).read_data(buf)
    }

    fn write_data(&mut self, buf: &[u8]) -> i64 {
        (**self).write_data(buf)
    }

    fn is_sequential(&self) -> bool {
        (**self).is_sequential()
    }

    fn open(&mut self, mode: OpenMode) -> Result<(), DeviceError> {
        (**self).open(mode)
    }

    fn close(&mut self) {
        (**self).close();
    }

    fn seek(&mut self, pos: i64) -> Result<(), DeviceError> {
        (**self).seek(pos)
    }

    fn size(&self) -> Option<i64> {
        (**self).size()
    }

    fn bytes_available(&self) -> i64 {
        (**self).bytes_available()
    }

    fn at_end(&self) -> Option<bool> {
        (**self).at_end()
    }

    fn read_line_data(&mut self, buf: &mut [u8]) -> Option<i64> {
        (**self).read_line_data(buf)
    }

    fn skip_data(&mut self, max_size: i64) -> Option<i64> {
        (**self).skip_data(max_size)
    }

    fn wait_for_ready_read(&mut self, msecs: i32) -> bool {
        (**self).wait_for_ready_read(msecs)
    }

    fn wait_for_bytes_written(&mut self, msecs: i32) -> bool {
        (**self).wait_for_bytes_written(msecs)
    }
}
