//! Ready-made backends
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  Device (buffering layer)           │
//! │  - read buffer per read channel     │
//! │  - positions, transactions          │
//! │  - text mode                        │
//! └─────────────────────────────────────┘
//!          ▲
//!          │ read_data / write_data / seek
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  Backend                            │
//! │  - moves bytes, nothing else        │
//! └─────────────────────────────────────┘
//!      ▲              ▲            ▲
//!      │              │            │
//!  MemoryBackend   FileBackend   pipe()
//!  (random access) (random      (sequential,
//!                   access)      cross-thread)
//! ```

pub mod file;
pub mod memory;
pub mod pipe;

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use pipe::{pipe, PipeReader, PipeWriter};
