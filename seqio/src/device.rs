//! Buffered device over a [`Backend`]
//!
//! [`Device`] turns the two primitive backend hooks into a full stream API:
//! buffered and unbuffered reads, peeking, line reads, skipping, seeking,
//! read transactions, text mode and multiple read/write channels.
//!
//! # Positions
//!
//! For random-access backends the device tracks two positions:
//!
//! - `pos`: bytes consumed or produced from the caller's point of view;
//! - `device_pos`: where the backend cursor is known to be.
//!
//! The read buffer holds the bytes between them, so outside transactions and
//! peeks `device_pos - pos == buffered bytes`. The backend is repositioned
//! only when the two disagree at the moment it has to be read or written.
//!
//! Sequential backends have neither; `pos` stays 0.
//!
//! # Transactions
//!
//! ```text
//! Idle ──start──▶ Started ──commit───▶ Idle
//!                    │
//!                    └────rollback──▶ Idle
//! ```
//!
//! On a sequential device reads inside a transaction only move a marker
//! through the read buffer; nothing is freed until commit. On a random-access
//! device the starting position is saved and restored on rollback.
//!
//! # Errors
//!
//! Byte-transfer calls return `-1` only when nothing could be transferred;
//! partial progress is reported as a short count. Misuse (wrong open mode,
//! negative sizes, nested transactions) is logged as a warning and answered
//! with the sentinel value of the call.

use std::ffi::CStr;
use std::fmt;

use crate::backend::Backend;
use crate::channels::ChannelSet;
use crate::error::DeviceError;
use crate::events::{DeviceEvent, EventHub};
use crate::open_mode::OpenMode;
use crate::ring_buffer::RingBuffer;
use crate::text_mode;

/// Default granularity of the read buffer
pub const DEFAULT_READ_CHUNK_SIZE: usize = 16384;

/// Default granularity of the write buffer (0: writes pass through)
pub const DEFAULT_WRITE_CHUNK_SIZE: usize = 0;

/// Default number of events a lagging subscriber may fall behind
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

const SKIP_SCRATCH_SIZE: usize = 4096;
const MIN_LINE_CHUNK: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Sequential,
    RandomAccess,
}

impl AccessMode {
    fn of<B: Backend + ?Sized>(backend: &B) -> Self {
        if backend.is_sequential() {
            Self::Sequential
        } else {
            Self::RandomAccess
        }
    }
}

/// Buffering configuration of a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Chunk size of read buffers; 0 reads straight from the backend
    pub read_chunk_size: usize,
    /// Chunk size of write buffers; 0 writes straight to the backend
    pub write_chunk_size: usize,
    /// Capacity of the event channel handed to subscribers
    pub event_capacity: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            write_chunk_size: DEFAULT_WRITE_CHUNK_SIZE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

#[allow(clippy::cast_possible_wrap)]
fn to_i64(n: usize) -> i64 {
    n as i64
}

fn to_usize(n: i64) -> usize {
    usize::try_from(n.max(0)).unwrap_or(usize::MAX)
}

fn warn_usage(function: &str, message: &str) {
    log::warn!("Device::{function}: {message}");
}

/// Buffered, position-tracking device over a [`Backend`].
///
/// A device is meant to be driven from a single owner; it has no internal
/// locking.
pub struct Device<B: Backend> {
    backend: B,
    open_mode: OpenMode,
    pos: i64,
    device_pos: i64,
    access_mode: Option<AccessMode>,
    transaction_started: bool,
    transaction_pos: i64,
    read_channels: ChannelSet,
    write_channels: ChannelSet,
    error_string: Option<String>,
    events: EventHub,
}

impl<B: Backend> Device<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, &DeviceConfig::default())
    }

    #[must_use]
    pub fn with_config(backend: B, config: &DeviceConfig) -> Self {
        Self {
            backend,
            open_mode: OpenMode::NOT_OPEN,
            pos: 0,
            device_pos: 0,
            access_mode: None,
            transaction_started: false,
            transaction_pos: 0,
            read_channels: ChannelSet::new(config.read_chunk_size),
            write_channels: ChannelSet::new(config.write_chunk_size),
            error_string: None,
            events: EventHub::new(config.event_capacity, "device"),
        }
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Direct access to the backend.
    ///
    /// Moving the backend cursor behind the device's back is not tracked.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[must_use]
    pub fn into_backend(self) -> B {
        self.backend
    }

    #[must_use]
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    #[must_use]
    pub fn open_mode(&self) -> OpenMode {
        self.open_mode
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open_mode != OpenMode::NOT_OPEN
    }

    #[must_use]
    pub fn is_readable(&self) -> bool {
        self.open_mode.is_readable()
    }

    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.open_mode.is_writable()
    }

    #[must_use]
    pub fn is_text_mode_enabled(&self) -> bool {
        self.open_mode.is_text()
    }

    pub fn set_text_mode_enabled(&mut self, enabled: bool) {
        if !self.is_open() {
            warn_usage("setTextModeEnabled", "The device is not open");
            return;
        }
        self.open_mode.set(OpenMode::TEXT, enabled);
    }

    /// Whether the backend is sequential.
    ///
    /// Resolved once per `open`; a closed device that was never opened asks
    /// the backend.
    #[must_use]
    pub fn is_sequential(&self) -> bool {
        self.access_mode
            .unwrap_or_else(|| AccessMode::of(&self.backend))
            == AccessMode::Sequential
    }

    /// Human-readable description of the last error
    #[must_use]
    pub fn error_string(&self) -> &str {
        self.error_string.as_deref().unwrap_or("Unknown error")
    }

    pub fn set_error_string(&mut self, message: impl Into<String>) {
        self.error_string = Some(message.into());
    }

    #[must_use]
    pub fn read_chunk_size(&self) -> usize {
        self.read_channels.chunk_size()
    }

    /// Chunk size for read buffers created from now on (0 disables read
    /// buffering).
    pub fn set_read_chunk_size(&mut self, size: usize) {
        self.read_channels.set_chunk_size(size);
    }

    #[must_use]
    pub fn write_chunk_size(&self) -> usize {
        self.write_channels.chunk_size()
    }

    pub fn set_write_chunk_size(&mut self, size: usize) {
        self.write_channels.set_chunk_size(size);
    }

    fn check_readable(&self, function: &str) -> bool {
        if self.open_mode.is_readable() {
            return true;
        }
        if self.is_open() {
            warn_usage(function, "WriteOnly device");
        } else {
            warn_usage(function, "device not open");
        }
        false
    }

    fn check_writable(&self, function: &str) -> bool {
        if self.open_mode.is_writable() {
            return true;
        }
        if self.is_open() {
            warn_usage(function, "ReadOnly device");
        } else {
            warn_usage(function, "device not open");
        }
        false
    }

    // ------------------------------------------------------------------
    // Open / close
    // ------------------------------------------------------------------

    /// Open the device in `mode`.
    ///
    /// Returns false (and records the error string) if the backend refuses.
    pub fn open(&mut self, mode: OpenMode) -> bool {
        if self.is_open() {
            let e = DeviceError::AlreadyOpen;
            warn_usage("open", &e.to_string());
            self.error_string = Some(e.to_string());
            return false;
        }
        if let Err(e) = self.backend.open(mode) {
            log::debug!("Device::open: backend refused {mode:?}: {e}");
            self.error_string = Some(e.to_string());
            return false;
        }

        self.open_mode = mode;
        self.access_mode = Some(AccessMode::of(&self.backend));
        self.device_pos = 0;
        self.transaction_started = false;
        self.transaction_pos = 0;

        self.read_channels.reset();
        self.write_channels.reset();
        self.read_channels
            .set_count(usize::from(mode.is_readable()));
        self.write_channels
            .set_count(usize::from(mode.is_writable()));

        self.pos = if mode.contains(OpenMode::APPEND) {
            self.size()
        } else {
            0
        };
        self.error_string = None;

        log::debug!(
            "Device::open: mode={mode:?}, access={:?}, pos={}",
            self.access_mode,
            self.pos
        );
        true
    }

    /// Close the device.
    ///
    /// Read buffers are dropped. Write buffers are kept so that pending
    /// output can still drain after a logical close.
    pub fn close(&mut self) {
        if !self.is_open() {
            return;
        }

        self.events.emit(DeviceEvent::AboutToClose);

        self.open_mode = OpenMode::NOT_OPEN;
        self.pos = 0;
        self.transaction_started = false;
        self.transaction_pos = 0;
        self.read_channels.set_count(0);
        self.write_channels.detach_count();

        self.backend.close();
        log::debug!("Device::close: done");
    }

    // ------------------------------------------------------------------
    // Positions
    // ------------------------------------------------------------------

    /// Logical position (always 0 for sequential devices)
    #[must_use]
    pub fn pos(&self) -> i64 {
        self.pos
    }

    /// Size of the device.
    ///
    /// Sequential devices report [`bytes_available`](Self::bytes_available)
    /// unless the backend knows better.
    #[must_use]
    pub fn size(&self) -> i64 {
        match self.backend.size() {
            Some(size) => size,
            None if self.is_sequential() => self.bytes_available(),
            None => 0,
        }
    }

    /// Bytes that can be read without blocking.
    #[must_use]
    pub fn bytes_available(&self) -> i64 {
        if self.is_sequential() {
            let buffered = to_i64(self.read_channels.size()) - self.transaction_pos;
            buffered + self.backend.bytes_available()
        } else {
            (self.size() - self.pos).max(0)
        }
    }

    /// Bytes waiting in the current write buffer
    #[must_use]
    pub fn bytes_to_write(&self) -> i64 {
        to_i64(self.write_channels.size())
    }

    #[must_use]
    pub fn at_end(&self) -> bool {
        if !self.is_open() {
            return true;
        }
        self.is_buffer_empty()
            && self
                .backend
                .at_end()
                .unwrap_or_else(|| self.bytes_available() == 0)
    }

    /// Move to `pos`. Only random-access devices can seek.
    pub fn seek(&mut self, pos: i64) -> bool {
        if self.is_sequential() {
            warn_usage("seek", "Cannot call seek on a sequential device");
            return false;
        }
        if !self.is_open() {
            warn_usage("seek", "The device is not open");
            return false;
        }
        if pos < 0 {
            log::warn!("Device::seek: Invalid pos: {pos}");
            return false;
        }
        if let Err(e) = self.backend.seek(pos) {
            log::debug!("Device::seek: backend failed to seek to {pos}: {e}");
            self.error_string = Some(e.to_string());
            return false;
        }

        self.device_pos = pos;
        self.seek_buffer(pos);
        true
    }

    /// Seek to the start.
    pub fn reset(&mut self) -> bool {
        self.seek(0)
    }

    // Move the logical position, keeping whatever part of the read buffer is
    // still ahead of it.
    fn seek_buffer(&mut self, new_pos: i64) {
        let offset = new_pos - self.pos;
        self.pos = new_pos;
        if offset < 0 || offset >= to_i64(self.read_channels.size()) {
            self.read_channels.clear();
        } else {
            self.read_channels.free(to_usize(offset));
        }
    }

    fn is_buffer_empty(&self) -> bool {
        self.read_channels.is_empty()
            || (self.transaction_started
                && self.is_sequential()
                && to_usize(self.transaction_pos) == self.read_channels.size())
    }

    fn probe_backend(&mut self) {
        self.backend.read_data(&mut []);
    }

    // ------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------

    /// Read up to `data.len()` bytes.
    ///
    /// Returns the number of bytes read (0 at the end of the stream) or -1
    /// if nothing could be read because of an error.
    pub fn read(&mut self, data: &mut [u8]) -> i64 {
        let sequential = self.is_sequential();

        if data.len() == 1 && !(sequential && self.transaction_started) {
            while let Some(c) = self.read_channels.get_char() {
                if !sequential {
                    self.pos += 1;
                }
                if c == b'\r' && self.open_mode.is_text() {
                    continue;
                }
                data[0] = c;
                if self.read_channels.is_empty() {
                    self.probe_backend();
                }
                return 1;
            }
        }

        if !self.check_readable("read") {
            return -1;
        }
        self.read_impl(data, false)
    }

    /// Read up to `max_size` bytes into a new vector.
    pub fn read_bytes(&mut self, max_size: i64) -> Vec<u8> {
        if max_size < 0 {
            warn_usage("read", "Called with maxSize < 0");
            return Vec::new();
        }
        if !self.check_readable("read") {
            return Vec::new();
        }

        let max_len = to_usize(max_size);
        // Hand out a whole buffered chunk without copying when it fits exactly.
        if max_len > 0
            && !self.transaction_started
            && !self.open_mode.is_text()
            && self
                .read_channels
                .buffer()
                .is_some_and(|b| b.next_data_block().len() == max_len)
        {
            let chunk = self
                .read_channels
                .buffer_mut()
                .map(RingBuffer::read_chunk)
                .unwrap_or_default();
            if !self.is_sequential() {
                self.pos += max_size;
            }
            if self.read_channels.is_empty() {
                self.probe_backend();
            }
            return chunk;
        }

        // Grow the result step by step so that a huge `max_size` only costs
        // what the device can actually deliver.
        let mut result = Vec::new();
        let mut total = 0;
        while total < max_len {
            let step = self.read_capacity_hint(max_len - total);
            result.resize(total + step, 0);
            let n = self.read_impl(&mut result[total..], false);
            if n <= 0 {
                break;
            }
            total += to_usize(n);
            if to_usize(n) < step {
                break;
            }
        }
        result.truncate(total);
        result
    }

    // Bytes worth allocating for a read of at most `wanted` bytes: what is
    // known to be available plus one read chunk.
    fn read_capacity_hint(&self, wanted: usize) -> usize {
        let available = to_usize(self.bytes_available());
        wanted.min(available.saturating_add(self.next_read_all_chunk()))
    }

    /// Read everything until the end of the stream.
    pub fn read_all(&mut self) -> Vec<u8> {
        let mut result = Vec::new();
        if !self.check_readable("read") {
            return result;
        }

        let sequential = self.is_sequential();
        let known = if sequential { 0 } else { self.size() };

        if known == 0 {
            // Size unknown: read chunk by chunk until the backend runs dry.
            let buffered = if sequential {
                self.read_channels.size() - to_usize(self.transaction_pos)
            } else {
                self.read_channels.size()
            };
            let mut chunk = self.next_read_all_chunk().max(buffered);
            let mut total = 0;
            loop {
                result.resize(total + chunk, 0);
                let n = self.read_impl(&mut result[total..], false);
                if n <= 0 {
                    break;
                }
                total += to_usize(n);
                chunk = self.next_read_all_chunk();
            }
            result.truncate(total);
        } else {
            result.resize(to_usize(known - self.pos), 0);
            let n = self.read_impl(&mut result, false);
            result.truncate(to_usize(n));
        }
        result
    }

    fn next_read_all_chunk(&self) -> usize {
        match self.read_channels.buffer_chunk_size() {
            0 => DEFAULT_READ_CHUNK_SIZE,
            size => size,
        }
    }

    /// Copy up to `data.len()` bytes without consuming them.
    pub fn peek(&mut self, data: &mut [u8]) -> i64 {
        if !self.check_readable("peek") {
            return -1;
        }
        self.read_impl(data, true)
    }

    /// Peek up to `max_size` bytes into a new vector.
    pub fn peek_bytes(&mut self, max_size: i64) -> Vec<u8> {
        if max_size < 0 {
            warn_usage("peek", "Called with maxSize < 0");
            return Vec::new();
        }
        if !self.check_readable("peek") {
            return Vec::new();
        }
        // Peeking cannot be repeated to grow the result, so the hint caps it.
        let mut result = vec![0; self.read_capacity_hint(to_usize(max_size))];
        let n = self.read_impl(&mut result, true);
        result.truncate(to_usize(n));
        result
    }

    // Core read loop shared by read, peek and the transaction machinery.
    //
    // Each pass drains the read buffer, then either reads straight into the
    // caller's slice or refills the buffer and goes around again. In text
    // mode every newly copied region is stripped of '\r', which frees room
    // for more bytes and sends the loop around once more.
    fn read_impl(&mut self, data: &mut [u8], peeking: bool) -> i64 {
        let chunk_size = self.read_channels.chunk_size();
        let buffered = chunk_size != 0 && !self.open_mode.contains(OpenMode::UNBUFFERED);
        let sequential = self.is_sequential();
        let keep_data_in_buffer = if sequential {
            peeking || self.transaction_started
        } else {
            peeking && buffered
        };
        let text = self.open_mode.is_text();

        let saved_pos = self.pos;
        let mut out = 0;
        let mut text_from = 0;
        let mut made_buffer_reads_only = true;
        let mut device_at_eof = false;
        let mut buffer_pos = if sequential && self.transaction_started {
            to_usize(self.transaction_pos)
        } else {
            0
        };

        loop {
            let from_buffer = if keep_data_in_buffer {
                self.read_channels.peek(&mut data[out..], buffer_pos)
            } else {
                self.read_channels.read(&mut data[out..])
            };
            if from_buffer > 0 {
                buffer_pos += from_buffer;
                if !sequential {
                    self.pos += to_i64(from_buffer);
                }
                out += from_buffer;
            }

            let wanted = data.len() - out;
            if wanted > 0 && !device_at_eof {
                let mut from_device: i64 = 0;
                if sequential || self.pos == self.device_pos || self.seek(self.pos) {
                    made_buffer_reads_only = false;
                    if (!buffered || wanted >= chunk_size) && !keep_data_in_buffer {
                        from_device = self.backend.read_data(&mut data[out..]);
                        device_at_eof = from_device != to_i64(wanted);
                        if from_device > 0 {
                            out += to_usize(from_device);
                            if !sequential {
                                self.pos += from_device;
                                self.device_pos += from_device;
                            }
                        }
                    } else {
                        // Peeking an unbuffered device still needs a buffer
                        // to keep the bytes in; size it to the request.
                        let to_buffer = if chunk_size != 0 && (buffered || chunk_size < wanted) {
                            chunk_size
                        } else {
                            wanted
                        };
                        if to_buffer == 0 {
                            device_at_eof = true;
                        } else if let Some(region) = self.read_channels.reserve(to_buffer) {
                            from_device = self.backend.read_data(region);
                            device_at_eof = from_device != to_i64(to_buffer);
                            let filled = to_usize(from_device).min(to_buffer);
                            self.read_channels.chop(to_buffer - filled);
                            if filled > 0 {
                                if !sequential {
                                    self.device_pos += to_i64(filled);
                                }
                                continue;
                            }
                        } else {
                            device_at_eof = true;
                        }
                    }
                } else {
                    from_device = -1;
                }

                if from_device < 0 && out == 0 {
                    return -1;
                }
            }

            if text && text_from < out {
                let kept = text_mode::strip_carriage_returns(&mut data[text_from..out]);
                out = text_from + kept;
                text_from = out;
                continue;
            }

            break;
        }

        if keep_data_in_buffer {
            if peeking {
                self.pos = saved_pos;
            } else {
                self.transaction_pos = to_i64(buffer_pos);
            }
        } else if peeking {
            self.seek_buffer(saved_pos);
        }

        if made_buffer_reads_only && self.is_buffer_empty() {
            self.probe_backend();
        }

        to_i64(out)
    }

    /// Read one byte.
    pub fn get_char(&mut self) -> Option<u8> {
        let mut c = [0u8; 1];
        (self.read(&mut c) == 1).then_some(c[0])
    }

    /// Push `c` back so that the next read returns it first.
    pub fn unget_char(&mut self, c: u8) {
        if !self.check_readable("ungetChar") {
            return;
        }
        if self.transaction_started {
            warn_usage("ungetChar", "Called while transaction is in progress");
            return;
        }
        self.read_channels.unget_char(c);
        if !self.is_sequential() {
            self.pos -= 1;
        }
    }

    /// Whether a complete line is already buffered
    #[must_use]
    pub fn can_read_line(&self) -> bool {
        let from = if self.is_sequential() {
            to_usize(self.transaction_pos)
        } else {
            0
        };
        self.read_channels
            .index_of(b'\n', self.read_channels.size(), from)
            .is_some()
    }

    /// Read one line into `data`, including the `'\n'`, and NUL-terminate
    /// it. At most `data.len() - 1` bytes are read.
    ///
    /// Returns the line length without the terminator, or -1 if nothing could
    /// be read.
    pub fn read_line_into(&mut self, data: &mut [u8]) -> i64 {
        if data.len() < 2 {
            warn_usage("readLine", "Called with maxSize < 2");
            return -1;
        }
        if !self.check_readable("readLine") {
            return -1;
        }

        // Leave room for the terminator.
        let max_len = data.len() - 1;
        let sequential = self.is_sequential();
        let keep_data_in_buffer = sequential && self.transaction_started;
        let text = self.open_mode.is_text();

        let mut so_far = 0;
        if keep_data_in_buffer {
            let from = to_usize(self.transaction_pos);
            if from < self.read_channels.size() {
                let wanted = self
                    .read_channels
                    .index_of(b'\n', max_len, from)
                    .map_or(max_len, |i| i - from + 1);
                so_far = self.read_channels.peek(&mut data[..wanted], from);
                self.transaction_pos += to_i64(so_far);
                if to_usize(self.transaction_pos) == self.read_channels.size() {
                    self.probe_backend();
                }
            }
        } else if !self.read_channels.is_empty() {
            so_far = self.read_channels.read_line(data).unwrap_or(0);
            if self.read_channels.is_empty() {
                self.probe_backend();
            }
            if !sequential {
                self.pos += to_i64(so_far);
            }
        }

        if so_far > 0 && data[so_far - 1] == b'\n' {
            if text && so_far > 1 && data[so_far - 2] == b'\r' {
                so_far -= 1;
                data[so_far - 1] = b'\n';
            }
            data[so_far] = 0;
            return to_i64(so_far);
        }

        if !sequential && self.pos != self.device_pos && !self.seek(self.pos) {
            data[so_far] = 0;
            return if so_far > 0 { to_i64(so_far) } else { -1 };
        }

        // Inside a transaction the generic reader must be used: it keeps the
        // bytes in the read buffer.
        let rest = &mut data[so_far..max_len];
        let (read_bytes, generic) = if keep_data_in_buffer {
            (self.read_line_generic(rest), true)
        } else {
            match self.backend.read_line_data(rest) {
                Some(n) => (n, false),
                None => (self.read_line_generic(rest), true),
            }
        };

        if read_bytes < 0 {
            data[so_far] = 0;
            return if so_far > 0 { to_i64(so_far) } else { -1 };
        }
        so_far += to_usize(read_bytes);
        if !generic && !sequential {
            self.pos += read_bytes;
            // The backend moved on its own; force a reseek before the next
            // access.
            self.device_pos = -1;
        }
        data[so_far] = 0;

        if text {
            so_far = text_mode::collapse_crlf(data, so_far);
        }
        to_i64(so_far)
    }

    // Byte-at-a-time line reader used when the backend has no line reader of
    // its own.
    fn read_line_generic(&mut self, buf: &mut [u8]) -> i64 {
        let mut so_far = 0;
        let mut last_read = 0;
        let mut c = [0u8; 1];

        while so_far < buf.len() {
            last_read = self.read(&mut c);
            if last_read != 1 {
                break;
            }
            buf[so_far] = c[0];
            so_far += 1;
            if c[0] == b'\n' {
                break;
            }
        }

        if last_read != 1 && so_far == 0 {
            return if self.is_sequential() { last_read } else { -1 };
        }
        to_i64(so_far)
    }

    /// Read one line of at most `max_size` bytes (0: no limit).
    pub fn read_line(&mut self, max_size: i64) -> Vec<u8> {
        let mut result = Vec::new();
        if !self.check_readable("readLine") {
            return result;
        }
        if max_size < 0 {
            warn_usage("readLine", "Called with maxSize < 0");
            return result;
        }

        let limit = if max_size == 0 {
            usize::MAX
        } else {
            to_usize(max_size)
        };
        let mut total = 0;
        while total < limit {
            let step = (limit - total)
                .min(self.read_channels.buffer_chunk_size().max(MIN_LINE_CHUNK));
            result.resize(total + step + 1, 0);
            let n = self.read_line_into(&mut result[total..]);
            if n <= 0 {
                break;
            }
            total += to_usize(n);
            if result[total - 1] == b'\n' || to_usize(n) < step {
                break;
            }
        }
        result.truncate(total);
        result
    }

    /// Skip up to `max_size` bytes.
    ///
    /// Random-access devices seek over what is not buffered. Text-mode
    /// devices and sequential devices inside a transaction always skip by
    /// reading.
    pub fn skip(&mut self, max_size: i64) -> i64 {
        if max_size < 0 {
            warn_usage("skip", "Called with maxSize < 0");
            return -1;
        }
        if !self.check_readable("skip") {
            return -1;
        }

        let sequential = self.is_sequential();
        if (sequential && self.transaction_started) || self.open_mode.is_text() {
            return self.skip_by_reading(max_size);
        }

        let mut max_size = max_size;
        let mut skipped = 0;
        if !self.read_channels.is_empty() {
            skipped = to_i64(self.read_channels.skip(to_usize(max_size)));
            if !sequential {
                self.pos += skipped;
            }
            if self.read_channels.is_empty() {
                self.probe_backend();
            }
            if skipped == max_size {
                return skipped;
            }
            max_size -= skipped;
        }

        // The read buffer is empty now; seek over the rest if the size is
        // known.
        if !sequential {
            let to_skip = (self.size() - self.pos).min(max_size);
            if to_skip > 0 {
                if !self.seek(self.pos + to_skip) {
                    return if skipped > 0 { skipped } else { -1 };
                }
                if to_skip == max_size {
                    return skipped + max_size;
                }
                skipped += to_skip;
                max_size -= to_skip;
            }
        }

        let result = match self.backend.skip_data(max_size) {
            Some(n) => {
                if n > 0 && !sequential {
                    self.pos += n;
                    self.device_pos = -1;
                }
                n
            }
            None => self.skip_by_reading(max_size),
        };

        if skipped == 0 {
            result
        } else if result == -1 {
            skipped
        } else {
            skipped + result
        }
    }

    fn skip_by_reading(&mut self, mut max_size: i64) -> i64 {
        let mut scratch = [0u8; SKIP_SCRATCH_SIZE];
        let mut so_far = 0;
        loop {
            let wanted = to_usize(max_size).min(SKIP_SCRATCH_SIZE);
            let n = self.read_impl(&mut scratch[..wanted], false);

            // A short read means there is nothing more for now.
            if n != to_i64(wanted) {
                if so_far == 0 {
                    return n;
                }
                if n == -1 {
                    return so_far;
                }
                return so_far + n;
            }

            so_far += n;
            max_size -= n;
            if max_size <= 0 {
                return so_far;
            }
        }
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Start a read transaction. Transactions do not nest.
    pub fn start_transaction(&mut self) {
        if self.transaction_started {
            warn_usage(
                "startTransaction",
                "Called while transaction already in progress",
            );
            return;
        }
        self.transaction_pos = self.pos;
        self.transaction_started = true;
    }

    /// Keep what was read since the transaction started.
    pub fn commit_transaction(&mut self) {
        if !self.transaction_started {
            warn_usage("commitTransaction", "Called while no transaction in progress");
            return;
        }
        if self.is_sequential() {
            self.read_channels.free(to_usize(self.transaction_pos));
        }
        self.transaction_started = false;
        self.transaction_pos = 0;
    }

    /// Return to where the transaction started; the same bytes will be read
    /// again.
    pub fn rollback_transaction(&mut self) {
        if !self.transaction_started {
            warn_usage("rollbackTransaction", "Called while no transaction in progress");
            return;
        }
        if !self.is_sequential() {
            self.seek_buffer(self.transaction_pos);
        }
        self.transaction_started = false;
        self.transaction_pos = 0;
    }

    #[must_use]
    pub fn is_transaction_started(&self) -> bool {
        self.transaction_started
    }

    // ------------------------------------------------------------------
    // Writing
    // ------------------------------------------------------------------

    /// Write `data`.
    ///
    /// Returns the number of bytes written or -1 on error.
    pub fn write(&mut self, data: &[u8]) -> i64 {
        if !self.check_writable("write") {
            return -1;
        }
        if data.is_empty() {
            return 0;
        }

        let sequential = self.is_sequential();
        if !sequential && self.pos != self.device_pos && !self.seek(self.pos) {
            return -1;
        }

        let written = self.backend.write_data(data);
        if written > 0 {
            if !sequential {
                self.pos += written;
                self.device_pos += written;
                // Bytes ahead in the read buffer were just overwritten.
                self.read_channels.skip(to_usize(written));
            }
            self.events.emit(DeviceEvent::BytesWritten(written));
            self.events.emit(DeviceEvent::ChannelBytesWritten {
                channel: self.write_channels.current(),
                bytes: written,
            });
        }
        written
    }

    pub fn write_str(&mut self, data: &str) -> i64 {
        self.write(data.as_bytes())
    }

    /// Write a NUL-terminated string without its terminator.
    pub fn write_cstr(&mut self, data: &CStr) -> i64 {
        self.write(data.to_bytes())
    }

    pub fn put_char(&mut self, c: u8) -> bool {
        self.write(&[c]) == 1
    }

    /// Buffer of the current write channel.
    ///
    /// Writes bypass it; backends that queue output may stage bytes here and
    /// report them through [`bytes_to_write`](Self::bytes_to_write).
    pub fn write_buffer_mut(&mut self) -> Option<&mut RingBuffer> {
        self.write_channels.buffer_mut()
    }

    // ------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------

    #[must_use]
    pub fn read_channel_count(&self) -> usize {
        self.read_channels.count()
    }

    #[must_use]
    pub fn write_channel_count(&self) -> usize {
        self.write_channels.count()
    }

    pub fn set_read_channel_count(&mut self, count: usize) {
        self.read_channels.set_count(count);
    }

    pub fn set_write_channel_count(&mut self, count: usize) {
        self.write_channels.set_count(count);
    }

    #[must_use]
    pub fn current_read_channel(&self) -> usize {
        self.read_channels.current()
    }

    pub fn set_current_read_channel(&mut self, channel: usize) {
        if self.transaction_started {
            warn_usage(
                "setCurrentReadChannel",
                "Failed due to read transaction being in progress",
            );
            return;
        }
        if !self.read_channels.set_current(channel) {
            log::warn!("Device::setCurrentReadChannel: no read channel {channel}");
        }
    }

    #[must_use]
    pub fn current_write_channel(&self) -> usize {
        self.write_channels.current()
    }

    pub fn set_current_write_channel(&mut self, channel: usize) {
        if !self.write_channels.set_current(channel) {
            log::warn!("Device::setCurrentWriteChannel: no write channel {channel}");
        }
    }

    /// Buffered bytes of read channel `channel`
    #[must_use]
    pub fn channel_bytes_available(&self, channel: usize) -> i64 {
        self.read_channels
            .get(channel)
            .map_or(0, |b| to_i64(b.size()))
    }

    /// Append bytes that arrived on read channel `channel`.
    ///
    /// Meant for push-style (sequential) backends that multiplex several
    /// streams. Emits `ChannelReadyRead`, and `ReadyRead` when `channel` is
    /// the current one. Returns false if the channel does not exist.
    pub fn deliver_read_data(&mut self, channel: usize, data: &[u8]) -> bool {
        if !self.read_channels.append_to(channel, data) {
            log::warn!("Device::deliver_read_data: no read channel {channel}");
            return false;
        }
        self.announce_read_data(channel, data.len());
        true
    }

    /// Like [`deliver_read_data`](Self::deliver_read_data), adopting the
    /// vector as a chunk when the channel is unbuffered.
    pub fn deliver_read_chunk(&mut self, channel: usize, data: Vec<u8>) -> bool {
        let len = data.len();
        match self.read_channels.get_mut(channel) {
            Some(buffer) => buffer.append_owned(data),
            None => {
                log::warn!("Device::deliver_read_chunk: no read channel {channel}");
                return false;
            }
        }
        self.announce_read_data(channel, len);
        true
    }

    fn announce_read_data(&self, channel: usize, len: usize) {
        if len == 0 {
            return;
        }
        self.events.emit(DeviceEvent::ChannelReadyRead(channel));
        if channel == self.read_channels.current() {
            self.events.emit(DeviceEvent::ReadyRead);
        }
    }

    /// Announce that no more data will arrive on the read side.
    pub fn finish_read_channel(&self) {
        self.events.emit(DeviceEvent::ReadChannelFinished);
    }

    // ------------------------------------------------------------------
    // Blocking helpers
    // ------------------------------------------------------------------

    /// Block until the backend has data or `msecs` elapse (-1: no timeout).
    pub fn wait_for_ready_read(&mut self, msecs: i32) -> bool {
        if !self.check_readable("waitForReadyRead") {
            return false;
        }
        let ready = self.backend.wait_for_ready_read(msecs);
        if ready {
            self.events.emit(DeviceEvent::ReadyRead);
        }
        ready
    }

    /// Block until pending output is written or `msecs` elapse (-1: no
    /// timeout).
    pub fn wait_for_bytes_written(&mut self, msecs: i32) -> bool {
        if !self.check_writable("waitForBytesWritten") {
            return false;
        }
        self.backend.wait_for_bytes_written(msecs)
    }
}

impl<B: Backend> fmt::Debug for Device<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("open_mode", &self.open_mode)
            .field("access_mode", &self.access_mode)
            .field("pos", &self.pos)
            .field("device_pos", &self.device_pos)
            .field("transaction_started", &self.transaction_started)
            .field("transaction_pos", &self.transaction_pos)
            .field("buffered", &self.read_channels.size())
            .field("read_channels", &self.read_channels.count())
            .field("write_channels", &self.write_channels.count())
            .finish_non_exhaustive()
    }
}
