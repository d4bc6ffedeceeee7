//! Buffered, position-tracking byte devices
//!
//! A [`Device`] wraps a [`Backend`] (anything that can read and write raw
//! bytes) and layers on top of it:
//!
//! - chunked read buffering ([`RingBuffer`]) with zero-copy chunk hand-off
//! - peeking, line reading, skipping and seeking
//! - read transactions that can be rolled back
//! - text mode (`'\r'` stripping)
//! - several read and write channels ([`ChannelSet`])
//! - event notification ([`EventHub`])
//!
//! ```
//! use seqio::{Device, MemoryBackend, OpenMode};
//!
//! let mut device = Device::new(MemoryBackend::with_data(b"one\ntwo\n".to_vec()));
//! assert!(device.open(OpenMode::READ_ONLY));
//! assert_eq!(device.read_line(0), b"one\n");
//! assert_eq!(device.read_all(), b"two\n");
//! assert!(device.at_end());
//! ```

pub mod adapters;
pub mod backend;
pub mod backends;
pub mod channels;
pub mod device;
pub mod error;
pub mod events;
pub mod open_mode;
pub mod ring_buffer;
pub mod text_mode;

pub use backend::Backend;
pub use backends::{pipe, FileBackend, MemoryBackend, PipeReader, PipeWriter};
pub use channels::ChannelSet;
pub use device::{AccessMode, Device, DeviceConfig};
pub use error::DeviceError;
pub use events::{DeviceEvent, EventHub};
pub use open_mode::OpenMode;
pub use ring_buffer::RingBuffer;
