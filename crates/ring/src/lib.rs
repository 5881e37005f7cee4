// SPDX-License-Identifier: MIT

//! Fixed-capacity circular byte buffer for terminal output replay.
//!
//! Every terminal session owns exactly one [`RingBuffer`]. The session's
//! output pump appends every chunk it reads from the pseudo-terminal; a
//! reconnecting client calls [`RingBuffer::snapshot`] to reconstruct the
//! last `capacity` bytes of visible output before subscribing to the live
//! stream.

/// Bounded byte log. After N total appended bytes, `snapshot()` returns the
/// last `min(N, capacity)` bytes verbatim; chunks larger than capacity are
/// truncated to their tail before being written in.
#[derive(Debug)]
pub struct RingBuffer {
    buf: Vec<u8>,
    capacity: usize,
    write_pos: usize,
    total_written: u64,
}

impl RingBuffer {
    /// Create a new ring buffer with the given capacity in bytes.
    pub fn new(capacity: usize) -> Self {
        Self { buf: vec![0u8; capacity], capacity, write_pos: 0, total_written: 0 }
    }

    /// Append bytes to the buffer, overwriting the oldest data once full.
    ///
    /// O(size of drop + size of input): a chunk larger than `capacity` is
    /// first truncated to its tail, so at most `capacity` bytes are ever
    /// copied per call regardless of input size.
    pub fn append(&mut self, data: &[u8]) {
        if self.capacity == 0 {
            self.total_written = self.total_written.saturating_add(data.len() as u64);
            return;
        }

        let data = if data.len() > self.capacity { &data[data.len() - self.capacity..] } else { data };

        let start = self.write_pos;
        let end = start + data.len();
        if end <= self.capacity {
            self.buf[start..end].copy_from_slice(data);
        } else {
            let first = self.capacity - start;
            self.buf[start..self.capacity].copy_from_slice(&data[..first]);
            self.buf[..data.len() - first].copy_from_slice(&data[first..]);
        }

        self.write_pos = end % self.capacity;
        self.total_written = self.total_written.saturating_add(data.len() as u64);
    }

    /// Return an independent copy of the currently retained bytes, oldest
    /// first. Length equals `min(total_written(), capacity)`.
    pub fn snapshot(&self) -> Vec<u8> {
        let len = self.len();
        if len == 0 {
            return Vec::new();
        }

        let start = if self.write_pos >= len { self.write_pos - len } else { self.capacity - (len - self.write_pos) };

        if start + len <= self.capacity {
            self.buf[start..start + len].to_vec()
        } else {
            let first = self.capacity - start;
            let mut out = Vec::with_capacity(len);
            out.extend_from_slice(&self.buf[start..self.capacity]);
            out.extend_from_slice(&self.buf[..len - first]);
            out
        }
    }

    /// Number of bytes currently retained (`min(total_written(), capacity)`).
    pub fn len(&self) -> usize {
        std::cmp::min(self.total_written, self.capacity as u64) as usize
    }

    /// Whether the buffer currently retains zero bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes ever appended, including ones since overwritten.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// The fixed capacity this buffer was constructed with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
