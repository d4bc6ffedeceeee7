//! Per-direction channel buffers
//!
//! A device keeps one [`ChannelSet`] for reading and one for writing. Each
//! channel owns a [`RingBuffer`]; the "current" channel is stored as an
//! index and looked up on every access, so growing or shrinking the set
//! never leaves a dangling reference behind.
//!
//! The current index stays below the count whenever the count is non-zero.
//! When it does not address a buffer (no channels yet), the buffer
//! operations below are no-ops that report nothing buffered.

use crate::ring_buffer::RingBuffer;

#[derive(Debug, Clone)]
pub struct ChannelSet {
    buffers: Vec<RingBuffer>,
    count: usize,
    current: usize,
    chunk_size: usize,
}

impl ChannelSet {
    /// Create an empty set whose buffers will use `chunk_size` granularity.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            buffers: Vec::new(),
            count: 0,
            current: 0,
            chunk_size,
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Resize the set.
    ///
    /// New buffers get the configured chunk size; buffers that already exist
    /// keep the chunk size they were created with.
    pub fn set_count(&mut self, count: usize) {
        if count > self.buffers.len() {
            let chunk_size = self.chunk_size;
            self.buffers
                .resize_with(count, || RingBuffer::new(chunk_size));
        } else {
            self.buffers.truncate(count);
        }
        self.count = count;
        if count > 0 && self.current >= count {
            self.current = 0;
        }
    }

    /// Drop every buffer and set the count to 0.
    pub fn reset(&mut self) {
        self.buffers.clear();
        self.count = 0;
    }

    /// Set the count to 0 while keeping the buffers and their content.
    pub fn detach_count(&mut self) {
        self.count = 0;
    }

    #[must_use]
    pub fn current(&self) -> usize {
        self.current
    }

    /// Select the current channel; returns false (and changes nothing) if
    /// `channel` is out of range.
    pub fn set_current(&mut self, channel: usize) -> bool {
        if self.count > 0 && channel >= self.count {
            return false;
        }
        self.current = channel;
        true
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size;
    }

    #[must_use]
    pub fn get(&self, channel: usize) -> Option<&RingBuffer> {
        self.buffers.get(channel)
    }

    pub fn get_mut(&mut self, channel: usize) -> Option<&mut RingBuffer> {
        self.buffers.get_mut(channel)
    }

    /// Buffer of the current channel
    #[must_use]
    pub fn buffer(&self) -> Option<&RingBuffer> {
        self.buffers.get(self.current)
    }

    pub fn buffer_mut(&mut self) -> Option<&mut RingBuffer> {
        self.buffers.get_mut(self.current)
    }

    /// Append `data` to the buffer of `channel`; returns false if the
    /// channel does not exist.
    pub fn append_to(&mut self, channel: usize, data: &[u8]) -> bool {
        match self.buffers.get_mut(channel) {
            Some(b) => {
                b.append(data);
                true
            }
            None => false,
        }
    }

    // Null-safe operations on the current buffer

    #[must_use]
    pub fn size(&self) -> usize {
        self.buffer().map_or(0, RingBuffer::size)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer().map_or(true, RingBuffer::is_empty)
    }

    /// Chunk size of the current buffer (0 when there is none)
    #[must_use]
    pub fn buffer_chunk_size(&self) -> usize {
        self.buffer().map_or(0, RingBuffer::chunk_size)
    }

    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        self.buffer_mut().map_or(0, |b| b.read(dst))
    }

    #[must_use]
    pub fn peek(&self, dst: &mut [u8], pos: usize) -> usize {
        self.buffer().map_or(0, |b| b.peek(dst, pos))
    }

    pub fn skip(&mut self, bytes: usize) -> usize {
        self.buffer_mut().map_or(0, |b| b.skip(bytes))
    }

    pub fn free(&mut self, bytes: usize) {
        if let Some(b) = self.buffer_mut() {
            b.free(bytes);
        }
    }

    pub fn chop(&mut self, bytes: usize) {
        if let Some(b) = self.buffer_mut() {
            b.chop(bytes);
        }
    }

    pub fn clear(&mut self) {
        if let Some(b) = self.buffer_mut() {
            b.clear();
        }
    }

    /// Reserve `bytes` at the tail of the current buffer.
    pub fn reserve(&mut self, bytes: usize) -> Option<&mut [u8]> {
        self.buffer_mut().map(|b| b.reserve(bytes))
    }

    pub fn get_char(&mut self) -> Option<u8> {
        self.buffer_mut().and_then(RingBuffer::get_char)
    }

    pub fn unget_char(&mut self, c: u8) {
        if let Some(b) = self.buffer_mut() {
            b.unget_char(c);
        }
    }

    #[must_use]
    pub fn index_of(&self, byte: u8, max_len: usize, pos: usize) -> Option<usize> {
        self.buffer().and_then(|b| b.index_of(byte, max_len, pos))
    }

    pub fn read_line(&mut self, dst: &mut [u8]) -> Option<usize> {
        self.buffer_mut().and_then(|b| b.read_line(dst))
    }
}
