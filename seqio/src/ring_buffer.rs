//! Chunked byte queue
//!
//! A [`RingBuffer`] is the read (or write) buffer of one device channel.
//! Bytes are kept in a sequence of chunks; each chunk owns (or shares) a
//! contiguous allocation and exposes a `[head, tail)` window of valid bytes.
//!
//! ```text
//!  front                                            back
//!  ┌──────────────┐  ┌──────────────────┐  ┌──────────────┐
//!  │ ....[head    │  │[head        tail)│  │[head   tail).│
//!  └──────────────┘  └──────────────────┘  └──────────────┘
//!   free/read/peek                          append/reserve
//!   unget (reserve_front)                   chop
//! ```
//!
//! Appended bytes never move. Only whole emptied chunks are dropped from the
//! front, and only whole chunks are added at either end.

use std::collections::VecDeque;
use std::sync::Arc;

/// Default chunk granularity
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Contiguous storage with a `[head, tail)` window of valid bytes.
///
/// The storage may be shared with another owner. A shared chunk is never
/// mutated in place; it is detached first.
#[derive(Debug, Clone, Default)]
struct Chunk {
    data: Arc<Vec<u8>>,
    head: usize,
    tail: usize,
}

impl Chunk {
    fn with_capacity(alloc: usize) -> Self {
        Self {
            data: Arc::new(vec![0; alloc]),
            head: 0,
            tail: 0,
        }
    }

    fn from_shared(data: Arc<Vec<u8>>) -> Self {
        let tail = data.len();
        Self { data, head: 0, tail }
    }

    fn is_shared(&self) -> bool {
        Arc::strong_count(&self.data) > 1
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn len(&self) -> usize {
        self.tail - self.head
    }

    /// Free room after the tail
    fn available(&self) -> usize {
        self.capacity() - self.tail
    }

    fn as_slice(&self) -> &[u8] {
        &self.data[self.head..self.tail]
    }

    /// Prepare an empty chunk for at least `alloc` bytes, reusing the
    /// storage when it is private and large enough.
    fn allocate(&mut self, alloc: usize) {
        debug_assert_eq!(self.len(), 0);
        if self.capacity() < alloc || self.is_shared() {
            self.data = Arc::new(vec![0; alloc]);
        }
        self.head = 0;
        self.tail = 0;
    }

    /// Copy the valid window into a private allocation if the storage is
    /// shared.
    fn detach(&mut self) {
        if self.is_shared() {
            let window = self.as_slice().to_vec();
            self.head = 0;
            self.tail = window.len();
            self.data = Arc::new(window);
        }
    }

    fn storage_mut(&mut self) -> &mut [u8] {
        self.detach();
        Arc::make_mut(&mut self.data).as_mut_slice()
    }

    fn grow(&mut self, bytes: usize) {
        assert!(bytes <= self.available(), "chunk overflow");
        self.tail += bytes;
    }

    fn shrink(&mut self, bytes: usize) {
        assert!(bytes <= self.len(), "chunk underflow");
        self.tail -= bytes;
    }

    fn advance(&mut self, bytes: usize) {
        assert!(bytes <= self.len(), "chunk underflow");
        self.head += bytes;
    }

    fn retreat(&mut self, bytes: usize) {
        assert!(bytes <= self.head, "no room before head");
        self.head -= bytes;
    }

    fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    fn release(&mut self) {
        self.data = Arc::default();
        self.reset();
    }

    /// Turn the valid window into an owned vector, without copying when the
    /// storage is private.
    fn into_vec(self) -> Vec<u8> {
        let (head, tail) = (self.head, self.tail);
        match Arc::try_unwrap(self.data) {
            Ok(mut data) => {
                data.truncate(tail);
                if head > 0 {
                    data.copy_within(head.., 0);
                    data.truncate(tail - head);
                }
                data
            }
            Err(shared) => shared[head..tail].to_vec(),
        }
    }
}

/// Growable queue of bytes built from chunks.
///
/// `basic_block_size` is the allocation granularity. A value of 0 disables
/// buffering granularity: every reservation gets its own exactly-sized chunk
/// and [`append_owned`](Self::append_owned) adopts the caller's vector.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    chunks: VecDeque<Chunk>,
    size: usize,
    basic_block_size: usize,
}

impl RingBuffer {
    #[must_use]
    pub fn new(basic_block_size: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            size: 0,
            basic_block_size,
        }
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.basic_block_size
    }

    pub fn set_chunk_size(&mut self, size: usize) {
        self.basic_block_size = size;
    }

    /// Number of buffered bytes
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The first contiguous readable block
    #[must_use]
    pub fn next_data_block(&self) -> &[u8] {
        match self.chunks.front() {
            Some(chunk) => chunk.as_slice(),
            None => &[],
        }
    }

    /// Drop `bytes` from the head.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` exceeds [`size`](Self::size).
    pub fn free(&mut self, mut bytes: usize) {
        assert!(
            bytes <= self.size,
            "RingBuffer::free: {bytes} bytes requested, {} buffered",
            self.size
        );

        while bytes > 0 {
            let chunk_len = self.chunks[0].len();

            if self.chunks.len() == 1 || chunk_len > bytes {
                if self.size == bytes {
                    self.reset_or_clear(0);
                } else {
                    self.chunks[0].advance(bytes);
                    self.size -= bytes;
                }
                return;
            }

            self.size -= chunk_len;
            bytes -= chunk_len;
            self.chunks.pop_front();
        }
    }

    /// Drop `bytes` from the tail.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` exceeds [`size`](Self::size).
    pub fn chop(&mut self, mut bytes: usize) {
        assert!(
            bytes <= self.size,
            "RingBuffer::chop: {bytes} bytes requested, {} buffered",
            self.size
        );

        while bytes > 0 {
            let last = self.chunks.len() - 1;
            let chunk_len = self.chunks[last].len();

            if last == 0 || chunk_len > bytes {
                if self.size == bytes {
                    self.reset_or_clear(last);
                } else {
                    self.chunks[last].shrink(bytes);
                    self.size -= bytes;
                }
                return;
            }

            self.size -= chunk_len;
            bytes -= chunk_len;
            self.chunks.pop_back();
        }
    }

    // The buffer became empty: keep one small private chunk around to avoid
    // reallocating on the next write, otherwise release everything.
    fn reset_or_clear(&mut self, index: usize) {
        let chunk = &mut self.chunks[index];
        if chunk.capacity() <= self.basic_block_size && !chunk.is_shared() {
            chunk.reset();
            self.size = 0;
        } else {
            self.clear();
        }
    }

    /// Drop all bytes, keeping at most one released chunk.
    pub fn clear(&mut self) {
        if self.chunks.is_empty() {
            return;
        }
        self.chunks.truncate(1);
        self.chunks[0].release();
        self.size = 0;
    }

    /// Grow the tail by `bytes` and return the new region for the caller to
    /// fill.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is 0.
    pub fn reserve(&mut self, bytes: usize) -> &mut [u8] {
        assert!(bytes > 0, "RingBuffer::reserve: empty reservation");

        let chunk_size = self.basic_block_size.max(bytes);
        if self.size == 0 {
            match self.chunks.back_mut() {
                Some(chunk) => chunk.allocate(chunk_size),
                None => self.chunks.push_back(Chunk::with_capacity(chunk_size)),
            }
        } else {
            let chunk = &self.chunks[self.chunks.len() - 1];
            if self.basic_block_size == 0 || chunk.is_shared() || bytes > chunk.available() {
                self.chunks.push_back(Chunk::with_capacity(chunk_size));
            }
        }

        self.size += bytes;
        let last = self.chunks.len() - 1;
        let chunk = &mut self.chunks[last];
        let start = chunk.tail;
        chunk.grow(bytes);
        &mut chunk.storage_mut()[start..start + bytes]
    }

    /// Grow the head by `bytes` and return the new region for the caller to
    /// fill.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is 0.
    pub fn reserve_front(&mut self, bytes: usize) -> &mut [u8] {
        assert!(bytes > 0, "RingBuffer::reserve_front: empty reservation");

        let chunk_size = self.basic_block_size.max(bytes);
        let fresh = if self.size == 0 {
            match self.chunks.front_mut() {
                Some(chunk) => chunk.allocate(chunk_size),
                None => self.chunks.push_front(Chunk::with_capacity(chunk_size)),
            }
            true
        } else {
            let chunk = &self.chunks[0];
            if self.basic_block_size == 0 || chunk.is_shared() || bytes > chunk.head {
                self.chunks.push_front(Chunk::with_capacity(chunk_size));
                true
            } else {
                false
            }
        };

        let chunk = &mut self.chunks[0];
        if fresh {
            chunk.grow(chunk_size);
            chunk.advance(chunk_size - bytes);
        } else {
            chunk.retreat(bytes);
        }
        self.size += bytes;

        let head = chunk.head;
        &mut chunk.storage_mut()[head..head + bytes]
    }

    /// Copy `data` to the tail.
    pub fn append(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.reserve(data.len()).copy_from_slice(data);
    }

    /// Append an owned buffer.
    ///
    /// With a block size of 0 the vector itself becomes a chunk (no copy);
    /// otherwise the bytes are copied like [`append`](Self::append).
    pub fn append_owned(&mut self, data: Vec<u8>) {
        if data.is_empty() {
            return;
        }
        if self.basic_block_size == 0 {
            self.adopt(Chunk::from_shared(Arc::new(data)));
        } else {
            self.append(&data);
        }
    }

    /// Append shared storage as a chunk without copying.
    ///
    /// The chunk stays copy-on-write for as long as `data` has other owners.
    pub fn append_shared(&mut self, data: Arc<Vec<u8>>) {
        if data.is_empty() {
            return;
        }
        self.adopt(Chunk::from_shared(data));
    }

    fn adopt(&mut self, chunk: Chunk) {
        self.size += chunk.len();
        if self.size != chunk.len() || self.chunks.is_empty() {
            self.chunks.push_back(chunk);
        } else {
            let last = self.chunks.len() - 1;
            self.chunks[last] = chunk;
        }
    }

    /// Consume up to `dst.len()` bytes into `dst`.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let to_read = self.size.min(dst.len());
        let mut read_so_far = 0;
        while read_so_far < to_read {
            let block = self.next_data_block();
            let n = (to_read - read_so_far).min(block.len());
            dst[read_so_far..read_so_far + n].copy_from_slice(&block[..n]);
            read_so_far += n;
            self.free(n);
        }
        read_so_far
    }

    /// Take the whole first chunk as an owned buffer.
    ///
    /// No bytes are copied unless the chunk storage is shared.
    pub fn read_chunk(&mut self) -> Vec<u8> {
        if self.size == 0 {
            return Vec::new();
        }
        match self.chunks.pop_front() {
            Some(chunk) => {
                self.size -= chunk.len();
                chunk.into_vec()
            }
            None => Vec::new(),
        }
    }

    /// Discard up to `bytes` from the head; returns the number discarded.
    pub fn skip(&mut self, bytes: usize) -> usize {
        let bytes = bytes.min(self.size);
        self.free(bytes);
        bytes
    }

    /// Copy up to `dst.len()` bytes starting `pos` bytes past the head,
    /// without consuming anything.
    #[must_use]
    pub fn peek(&self, dst: &mut [u8], mut pos: usize) -> usize {
        let max_len = dst.len();
        let mut read_so_far = 0;
        for chunk in &self.chunks {
            if read_so_far == max_len {
                break;
            }
            let block = chunk.as_slice();
            if pos < block.len() {
                let n = (block.len() - pos).min(max_len - read_so_far);
                dst[read_so_far..read_so_far + n].copy_from_slice(&block[pos..pos + n]);
                read_so_far += n;
                pos = 0;
            } else {
                pos -= block.len();
            }
        }
        read_so_far
    }

    /// Position (counted from the head) of the first `byte` found within
    /// `max_len` bytes starting at `pos`.
    #[must_use]
    pub fn index_of(&self, byte: u8, max_len: usize, pos: usize) -> Option<usize> {
        if max_len == 0 {
            return None;
        }

        let mut to_skip = pos;
        let mut scanned = 0;
        for chunk in &self.chunks {
            let mut block = chunk.as_slice();
            if to_skip >= block.len() {
                to_skip -= block.len();
                continue;
            }
            block = &block[to_skip..];
            to_skip = 0;

            let window = block.len().min(max_len - scanned);
            if let Some(i) = block[..window].iter().position(|&b| b == byte) {
                return Some(pos + scanned + i);
            }
            scanned += window;
            if scanned == max_len {
                return None;
            }
        }
        None
    }

    #[must_use]
    pub fn can_read_line(&self) -> bool {
        self.index_of(b'\n', self.size, 0).is_some()
    }

    /// Consume one line (up to and including `'\n'`, at most
    /// `dst.len() - 1` bytes) and NUL-terminate it.
    ///
    /// Returns `None` if the buffer is empty.
    ///
    /// # Panics
    ///
    /// Panics if `dst` has room for less than one byte plus the terminator.
    pub fn read_line(&mut self, dst: &mut [u8]) -> Option<usize> {
        assert!(dst.len() > 1, "RingBuffer::read_line: destination too small");
        if self.is_empty() {
            return None;
        }

        let max_len = dst.len() - 1;
        let wanted = self.index_of(b'\n', max_len, 0).map_or(max_len, |i| i + 1);
        let n = self.read(&mut dst[..wanted]);
        dst[n] = 0;
        Some(n)
    }

    pub fn get_char(&mut self) -> Option<u8> {
        let c = *self.next_data_block().first()?;
        self.free(1);
        Some(c)
    }

    pub fn put_char(&mut self, c: u8) {
        self.reserve(1)[0] = c;
    }

    pub fn unget_char(&mut self, c: u8) {
        self.reserve_front(1)[0] = c;
    }

    /// Collect all buffered bytes into one vector, leaving the buffer intact.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size);
        for chunk in &self.chunks {
            out.extend_from_slice(chunk.as_slice());
        }
        out
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE)
    }
}
