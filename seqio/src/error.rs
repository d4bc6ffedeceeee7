//! Error type for device operations
//!
//! The byte-transfer calls of [`Device`](crate::Device) report failure with a
//! `-1` sentinel. [`DeviceError`] is what backends return from `open`/`seek`,
//! what the device records as its error string, and what the `std::io` and
//! `embedded_io` adapters hand out.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device not open")]
    NotOpen,

    #[error("device already open")]
    AlreadyOpen,

    #[error("device not open for reading")]
    NotReadable,

    #[error("device not open for writing")]
    NotWritable,

    #[error("cannot seek on a sequential device")]
    SequentialSeek,

    #[error("invalid position: {0}")]
    InvalidPosition(i64),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("stream closed")]
    Closed,

    #[error("{0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl DeviceError {
    /// Closest `std::io::ErrorKind`
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub fn io_error_kind(&self) -> io::ErrorKind {
        match self {
            Self::NotOpen | Self::NotReadable | Self::NotWritable => io::ErrorKind::PermissionDenied,
            Self::AlreadyOpen => io::ErrorKind::AlreadyExists,
            Self::SequentialSeek | Self::Unsupported(_) => io::ErrorKind::Unsupported,
            Self::InvalidPosition(_) => io::ErrorKind::InvalidInput,
            Self::Closed => io::ErrorKind::BrokenPipe,
            Self::Failed(_) => io::ErrorKind::Other,
            Self::Io(e) => e.kind(),
        }
    }

    /// Closest `embedded_io::ErrorKind`
    #[must_use]
    pub fn embedded_kind(&self) -> embedded_io::ErrorKind {
        io_kind_to_embedded(self.io_error_kind())
    }
}

impl From<DeviceError> for io::Error {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::Io(e) => e,
            other => io::Error::new(other.io_error_kind(), other.to_string()),
        }
    }
}

/// Convert `std::io::ErrorKind` to `embedded_io::ErrorKind`
#[must_use]
#[allow(clippy::match_same_arms)] // Common kinds are listed for documentation
pub fn io_kind_to_embedded(kind: io::ErrorKind) -> embedded_io::ErrorKind {
    match kind {
        io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
        io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
        io::ErrorKind::ConnectionRefused => embedded_io::ErrorKind::ConnectionRefused,
        io::ErrorKind::ConnectionReset => embedded_io::ErrorKind::ConnectionReset,
        io::ErrorKind::ConnectionAborted => embedded_io::ErrorKind::ConnectionAborted,
        io::ErrorKind::NotConnected => embedded_io::ErrorKind::NotConnected,
        io::ErrorKind::AddrInUse => embedded_io::ErrorKind::AddrInUse,
        io::ErrorKind::AddrNotAvailable => embedded_io::ErrorKind::AddrNotAvailable,
        io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
        io::ErrorKind::AlreadyExists => embedded_io::ErrorKind::AlreadyExists,
        io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
        io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
        io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
        io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
        io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
        io::ErrorKind::OutOfMemory => embedded_io::ErrorKind::OutOfMemory,
        _ => embedded_io::ErrorKind::Other,
    }
}
