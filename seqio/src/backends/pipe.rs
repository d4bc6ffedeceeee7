//! In-memory pipe between threads
//!
//! - One [`PipeWriter`] appends to a shared queue
//! - One [`PipeReader`] drains it; both are backends, so each end can sit
//!   under its own [`Device`](crate::Device)
//! - Readers never block in `read_data`; blocking is opt-in through
//!   `wait_for_ready_read`
//!
//! ```text
//! Device<PipeWriter> ──write_data──▶ [ RingBuffer ] ──read_data──▶ Device<PipeReader>
//!                                    (Mutex + Condvar)
//! ```

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::Backend;
use crate::error::DeviceError;
use crate::open_mode::OpenMode;
use crate::ring_buffer::RingBuffer;

/// Shared state between writer and reader
struct SharedQueue {
    buffer: RingBuffer,
    errno: i32,
    closed: bool,
}

struct Shared {
    queue: Mutex<SharedQueue>,
    ready: Condvar,
}

/// Action to take when the reader has caught up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitAction {
    /// Writer is alive; more data may come
    Wait,
    /// Data is available
    DontWait,
    /// Writer closed and everything was read
    Closed,
    /// Writer reported an error and everything was read
    Error,
}

impl SharedQueue {
    // Priority: data first, so that a reader drains everything before
    // observing the error or the close.
    fn wait_action(&self) -> WaitAction {
        if !self.buffer.is_empty() {
            WaitAction::DontWait
        } else if self.errno != 0 {
            WaitAction::Error
        } else if self.closed {
            WaitAction::Closed
        } else {
            WaitAction::Wait
        }
    }
}

/// Create a connected writer/reader pair.
#[must_use]
pub fn pipe(debug_hint: &str) -> (PipeWriter, PipeReader) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(SharedQueue {
            buffer: RingBuffer::default(),
            errno: 0,
            closed: false,
        }),
        ready: Condvar::new(),
    });
    let writer = PipeWriter {
        shared: Arc::clone(&shared),
        debug_hint: debug_hint.to_string(),
    };
    let reader = PipeReader {
        shared,
        debug_hint: debug_hint.to_string(),
    };
    (writer, reader)
}

/// Writer side of the pipe
///
/// # Thread Safety
///
/// All methods take `&self`; the writer can be shared between threads behind
/// an `Arc`. The queue lock is released before waking the reader.
pub struct PipeWriter {
    shared: Arc<Shared>,
    debug_hint: String,
}

impl PipeWriter {
    /// Append `data` (POSIX-style).
    ///
    /// Returns the number of bytes written, 0 for an empty write (the reader
    /// is not woken), or -1 if the pipe is closed or in error state.
    pub fn write(&self, data: &[u8]) -> i64 {
        {
            let mut queue = self.shared.queue.lock();
            if queue.closed || queue.errno != 0 {
                return -1;
            }
            if data.is_empty() {
                return 0;
            }
            queue.buffer.append(data);
        }
        self.shared.ready.notify_all();
        #[allow(clippy::cast_possible_wrap)]
        {
            data.len() as i64
        }
    }

    /// Put the pipe into error state; the reader sees -1 after draining.
    pub fn set_error(&self, errno: i32) {
        self.shared.queue.lock().errno = errno;
        self.shared.ready.notify_all();
    }

    #[must_use]
    pub fn get_error(&self) -> i32 {
        self.shared.queue.lock().errno
    }

    /// Close the pipe; the reader sees the end of the stream after draining.
    pub fn close(&self) {
        let was_closed = std::mem::replace(&mut self.shared.queue.lock().closed, true);
        if was_closed {
            // The guard is gone; formatting `self` locks the queue again.
            log::warn!("PipeWriter::close() called on already closed pipe: {self:?}");
            return;
        }
        self.shared.ready.notify_all();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.queue.lock().closed
    }
}

impl Backend for PipeWriter {
    fn is_sequential(&self) -> bool {
        true
    }

    fn open(&mut self, mode: OpenMode) -> Result<(), DeviceError> {
        if mode.is_readable() {
            return Err(DeviceError::Unsupported("pipe writer cannot be read"));
        }
        if self.is_closed() {
            return Err(DeviceError::Closed);
        }
        Ok(())
    }

    fn close(&mut self) {
        if !self.is_closed() {
            PipeWriter::close(self);
        }
    }

    fn read_data(&mut self, _buf: &mut [u8]) -> i64 {
        log::warn!("PipeWriter::read_data: write-only end: {self:?}");
        -1
    }

    fn write_data(&mut self, buf: &[u8]) -> i64 {
        PipeWriter::write(self, buf)
    }

    fn wait_for_bytes_written(&mut self, _msecs: i32) -> bool {
        // Writes land in the queue synchronously.
        true
    }
}

impl fmt::Debug for PipeWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.shared.queue.lock();
        write!(
            f,
            "Pipe.Writer(closed={}, queued={}, errno={}, hint={})",
            queue.closed,
            queue.buffer.size(),
            queue.errno,
            self.debug_hint
        )
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        if !self.is_closed() {
            PipeWriter::close(self);
        }
    }
}

/// Reader side of the pipe
///
/// A sequential backend: `read_data` returns what is queued right now, 0 if
/// nothing is, and -1 once the writer has reported an error and the queue
/// is drained.
pub struct PipeReader {
    shared: Arc<Shared>,
    debug_hint: String,
}

impl PipeReader {
    /// Errno reported by the writer (0: none)
    #[must_use]
    pub fn get_error(&self) -> i32 {
        self.shared.queue.lock().errno
    }

    /// Whether the writer closed the pipe
    #[must_use]
    pub fn is_writer_closed(&self) -> bool {
        self.shared.queue.lock().closed
    }
}

impl Backend for PipeReader {
    fn is_sequential(&self) -> bool {
        true
    }

    fn open(&mut self, mode: OpenMode) -> Result<(), DeviceError> {
        if mode.is_writable() {
            return Err(DeviceError::Unsupported("pipe reader cannot be written"));
        }
        Ok(())
    }

    fn read_data(&mut self, buf: &mut [u8]) -> i64 {
        let mut queue = self.shared.queue.lock();
        match queue.wait_action() {
            WaitAction::DontWait => {
                let n = queue.buffer.read(buf);
                #[allow(clippy::cast_possible_wrap)]
                {
                    n as i64
                }
            }
            WaitAction::Error => -1,
            WaitAction::Closed | WaitAction::Wait => 0,
        }
    }

    fn write_data(&mut self, _buf: &[u8]) -> i64 {
        log::warn!("PipeReader::write_data: read-only end: {self:?}");
        -1
    }

    fn bytes_available(&self) -> i64 {
        #[allow(clippy::cast_possible_wrap)]
        {
            self.shared.queue.lock().buffer.size() as i64
        }
    }

    fn at_end(&self) -> Option<bool> {
        let action = self.shared.queue.lock().wait_action();
        Some(matches!(action, WaitAction::Closed | WaitAction::Error))
    }

    /// Wait until data is queued or the writer goes away.
    ///
    /// Returns true only if data is available.
    fn wait_for_ready_read(&mut self, msecs: i32) -> bool {
        let mut queue = self.shared.queue.lock();
        loop {
            match queue.wait_action() {
                WaitAction::DontWait => return true,
                WaitAction::Closed | WaitAction::Error => return false,
                WaitAction::Wait => {}
            }
            if msecs < 0 {
                self.shared.ready.wait(&mut queue);
            } else {
                let timeout = Duration::from_millis(u64::from(msecs.unsigned_abs()));
                if self.shared.ready.wait_for(&mut queue, timeout).timed_out() {
                    return queue.wait_action() == WaitAction::DontWait;
                }
            }
        }
    }
}

impl fmt::Debug for PipeReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.shared.queue.lock();
        write!(
            f,
            "Pipe.Reader(queued={}, writer_closed={}, errno={}, hint={})",
            queue.buffer.size(),
            queue.closed,
            queue.errno,
            self.debug_hint
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_drains_before_eof() {
        let (writer, mut reader) = pipe("test");
        assert_eq!(writer.write(b"abc"), 3);
        writer.close();

        assert_eq!(reader.at_end(), Some(false));
        let mut buf = [0u8; 8];
        assert_eq!(reader.read_data(&mut buf), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(reader.read_data(&mut buf), 0);
        assert_eq!(reader.at_end(), Some(true));
    }

    #[test]
    fn test_empty_read_while_writer_alive() {
        let (_writer, mut reader) = pipe("test");
        let mut buf = [0u8; 8];
        assert_eq!(reader.read_data(&mut buf), 0);
        assert_eq!(reader.at_end(), Some(false));
    }

    #[test]
    fn test_error_after_drain() {
        let (writer, mut reader) = pipe("test");
        writer.write(b"x");
        writer.set_error(5);

        let mut buf = [0u8; 8];
        assert_eq!(reader.read_data(&mut buf), 1);
        assert_eq!(reader.read_data(&mut buf), -1);
        assert_eq!(reader.get_error(), 5);
    }

    #[test]
    fn test_write_after_close_fails() {
        let (writer, _reader) = pipe("test");
        writer.close();
        assert_eq!(writer.write(b"late"), -1);
        assert_eq!(writer.write(b""), -1);
    }

    #[test]
    fn test_second_close_with_warnings_enabled() {
        let _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::Warn)
            .try_init();

        let (writer, reader) = pipe("twice");
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            writer.close();
            writer.close();
            let _ = done_tx.send(writer.is_closed());
        });
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(3)), Ok(true));
        assert!(reader.is_writer_closed());
    }

    #[test]
    fn test_drop_closes_writer() {
        let (writer, reader) = pipe("test");
        drop(writer);
        assert!(reader.is_writer_closed());
    }

    #[test]
    fn test_wait_times_out() {
        let (_writer, mut reader) = pipe("test");
        assert!(!reader.wait_for_ready_read(10));
    }

    #[test]
    fn test_wait_wakes_on_write() {
        let (writer, mut reader) = pipe("test");
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            writer.write(b"wake");
            writer
        });
        assert!(reader.wait_for_ready_read(-1));
        assert_eq!(reader.bytes_available(), 4);
        handle.join().unwrap();
    }
}
