use ahash::AHashMap;

/// Upper bound of idle buffers kept for any single key length.
const MAX_IDLE_PER_LENGTH: usize = 64;

/// Largest capacity reserved up front for a fresh buffer. Longer keys grow as
/// their bytes are read, so a corrupt length cannot reserve memory on its own.
const MAX_RESERVED_CAPACITY: usize = 4096;

/// Reusable key buffers, pooled by key length.
///
/// A merge pass reads one key per record; most keys of an index share a handful
/// of lengths, so recycling the buffers by length removes the per-record
/// allocation. The pool belongs to one merge pass and is cleared when it ends.
#[derive(Debug, Default)]
pub struct KeyBufferPool {
    idle: AHashMap<usize, Vec<Vec<u8>>>,
    reused: u64,
    allocated: u64,
}

impl KeyBufferPool {
    pub fn new() -> KeyBufferPool {
        KeyBufferPool::default()
    }

    /// Returns an empty buffer for a key of `len` bytes. A fresh buffer reserves
    /// at most `MAX_RESERVED_CAPACITY` bytes.
    pub fn acquire(&mut self, len: usize) -> Vec<u8> {
        if let Some(mut buf) = self.idle.get_mut(&len).and_then(Vec::pop) {
            buf.clear();
            self.reused += 1;
            buf
        } else {
            self.allocated += 1;
            Vec::with_capacity(len.min(MAX_RESERVED_CAPACITY))
        }
    }

    /// Returns a buffer to the pool, filed under its current length.
    pub fn release(&mut self, buf: Vec<u8>) {
        if buf.is_empty() {
            return;
        }
        let idle = self.idle.entry(buf.len()).or_default();
        if idle.len() < MAX_IDLE_PER_LENGTH {
            idle.push(buf);
        }
    }

    /// Drops every pooled buffer.
    pub fn clear(&mut self) {
        self.idle.clear();
    }

    pub fn idle_count(&self) -> usize {
        self.idle.values().map(Vec::len).sum()
    }

    /// Number of `acquire` calls served from the pool.
    pub fn reused(&self) -> u64 {
        self.reused
    }

    pub fn allocated(&self) -> u64 {
        self.allocated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuse_by_length() {
        let mut pool = KeyBufferPool::new();
        let mut buf = pool.acquire(5);
        buf.extend_from_slice(b"smith");
        let ptr = buf.as_ptr();
        pool.release(buf);
        assert_eq!(pool.idle_count(), 1);

        // A different length does not take the pooled buffer
        let other = pool.acquire(3);
        assert!(other.is_empty());
        assert_eq!(pool.reused(), 0);

        let again = pool.acquire(5);
        assert!(again.is_empty());
        assert_eq!(again.as_ptr(), ptr);
        assert_eq!(pool.reused(), 1);
        assert_eq!(pool.allocated(), 2);
    }

    #[test]
    fn test_fresh_buffer_capacity_is_bounded() {
        let mut pool = KeyBufferPool::new();
        assert!(pool.acquire(16).capacity() >= 16);
        assert!(pool.acquire(0xFFFF_FFF0).capacity() <= MAX_RESERVED_CAPACITY);
    }

    #[test]
    fn test_clear() {
        let mut pool = KeyBufferPool::new();
        for len in 1..10 {
            pool.release(vec![0u8; len]);
        }
        pool.release(Vec::new());
        assert_eq!(pool.idle_count(), 9);
        pool.clear();
        assert_eq!(pool.idle_count(), 0);
    }
}
