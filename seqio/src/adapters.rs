//! `std::io` and `embedded_io` views of a device
//!
//! The device reports failures with `-1`; the adapters turn that into a
//! [`DeviceError`] built from the device state and its error string.
//!
//! A sequential device that has nothing buffered yet is not at its end:
//! `Read::read` waits for the backend before reporting 0, so that generic
//! consumers like `read_to_end` stop only at the real end of the stream.

use std::io;

use crate::backend::Backend;
use crate::device::Device;
use crate::error::DeviceError;

impl<B: Backend> Device<B> {
    fn read_error(&self) -> DeviceError {
        if !self.is_open() {
            DeviceError::NotOpen
        } else if !self.is_readable() {
            DeviceError::NotReadable
        } else {
            DeviceError::Failed(self.error_string().to_string())
        }
    }

    fn write_error(&self) -> DeviceError {
        if !self.is_open() {
            DeviceError::NotOpen
        } else if !self.is_writable() {
            DeviceError::NotWritable
        } else {
            DeviceError::Failed(self.error_string().to_string())
        }
    }

    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        loop {
            let n = self.read(buf);
            if n < 0 {
                return Err(self.read_error());
            }
            if n > 0 || buf.is_empty() || self.at_end() || !self.is_sequential() {
                return Ok(usize::try_from(n).unwrap_or(0));
            }
            if !self.wait_for_ready_read(-1) {
                return Ok(0);
            }
        }
    }

    fn write_checked(&mut self, buf: &[u8]) -> Result<usize, DeviceError> {
        let n = self.write(buf);
        if n < 0 {
            return Err(self.write_error());
        }
        Ok(usize::try_from(n).unwrap_or(0))
    }

    fn seek_to(&mut self, target: Option<i64>) -> Result<u64, DeviceError> {
        if self.is_sequential() {
            return Err(DeviceError::SequentialSeek);
        }
        let target = target.ok_or(DeviceError::InvalidPosition(-1))?;
        if !self.seek(target) {
            if !self.is_open() {
                return Err(DeviceError::NotOpen);
            }
            if target < 0 {
                return Err(DeviceError::InvalidPosition(target));
            }
            return Err(DeviceError::Failed(self.error_string().to_string()));
        }
        u64::try_from(target).map_err(|_| DeviceError::InvalidPosition(target))
    }

    fn flush_pending(&mut self) -> Result<(), DeviceError> {
        if self.bytes_to_write() > 0 && !self.wait_for_bytes_written(-1) {
            return Err(self.write_error());
        }
        Ok(())
    }
}

impl<B: Backend> io::Read for Device<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_blocking(buf)?)
    }
}

impl<B: Backend> io::Write for Device<B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_checked(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.flush_pending()?)
    }
}

impl<B: Backend> io::Seek for Device<B> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let target = match pos {
            io::SeekFrom::Start(n) => i64::try_from(n).ok(),
            io::SeekFrom::Current(d) => self.pos().checked_add(d),
            io::SeekFrom::End(d) => self.size().checked_add(d),
        };
        Ok(self.seek_to(target)?)
    }
}

impl<B: Backend> embedded_io::ErrorType for Device<B> {
    type Error = embedded_io::ErrorKind;
}

impl<B: Backend> embedded_io::Read for Device<B> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.read_blocking(buf).map_err(|e| e.embedded_kind())
    }
}

impl<B: Backend> embedded_io::Write for Device<B> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.write_checked(buf).map_err(|e| e.embedded_kind())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.flush_pending().map_err(|e| e.embedded_kind())
    }
}

impl<B: Backend> embedded_io::Seek for Device<B> {
    fn seek(&mut self, pos: embedded_io::SeekFrom) -> Result<u64, Self::Error> {
        let target = match pos {
            embedded_io::SeekFrom::Start(n) => i64::try_from(n).ok(),
            embedded_io::SeekFrom::Current(d) => self.pos().checked_add(d),
            embedded_io::SeekFrom::End(d) => self.size().checked_add(d),
        };
        self.seek_to(target).map_err(|e| e.embedded_kind())
    }
}
