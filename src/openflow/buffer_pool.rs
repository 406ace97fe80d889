/*!
A process wide pool of reusable message buffers.

Buffers are handed out by value and come back by value, so a buffer
never has two owners. The capacity of a `PoolBuffer` can grow but
never shrink: the type offers no operation that would give memory
back, which keeps every buffer eligible for reuse.
*/

use std::io;
use std::io::Read;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// The largest OpenFlow message plus room for Ethernet framing
pub const POOL_BUFFER_CAPACITY: usize = 0xffff + 64;

/// Default number of idle buffers kept for reuse
pub const DEFAULT_MAX_IDLE: usize = 64;

/// A byte buffer that always has at least `POOL_BUFFER_CAPACITY` capacity
#[derive(Debug)]
pub struct PoolBuffer {
    bytes: Vec<u8>,
}

impl PoolBuffer {
    fn new() -> PoolBuffer {
        PoolBuffer {
            bytes: Vec::with_capacity(POOL_BUFFER_CAPACITY),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    /// Empties the buffer, keeping its memory
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    /// Appends `n` zero bytes and returns them for in place initialization
    pub fn extend_zeroed(&mut self, n: usize) -> &mut [u8] {
        let start = self.bytes.len();
        self.bytes.resize(start + n, 0);
        &mut self.bytes[start..]
    }

    /// Replaces the content with a single read from `reader`.
    /// Returns the number of bytes read, 0 meaning end of stream.
    pub fn read_from<R: Read>(&mut self, reader: &mut R) -> io::Result<usize> {
        let capacity = self.bytes.capacity();
        self.bytes.resize(capacity, 0);
        match reader.read(&mut self.bytes) {
            Ok(n) => {
                self.bytes.truncate(n);
                Ok(n)
            }
            Err(e) => {
                self.bytes.clear();
                Err(e)
            }
        }
    }
}

impl Deref for PoolBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl DerefMut for PoolBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

/// Hands out `PoolBuffer`s, recycling released ones
#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<PoolBuffer>>,
    max_idle: usize,
    allocated: AtomicUsize,
    in_use: AtomicUsize,
}

impl BufferPool {
    /// Creates an empty pool that keeps at most `max_idle` released buffers
    pub fn new(max_idle: usize) -> BufferPool {
        BufferPool {
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
            allocated: AtomicUsize::new(0),
            in_use: AtomicUsize::new(0),
        }
    }

    /// Takes an empty buffer from the pool or allocates a new one
    pub fn acquire(&self) -> PoolBuffer {
        let recycled = self.idle.lock().unwrap_or_else(PoisonError::into_inner).pop();
        self.in_use.fetch_add(1, Ordering::AcqRel);
        match recycled {
            Some(buf) => buf,
            None => {
                let n = self.allocated.fetch_add(1, Ordering::AcqRel) + 1;
                trace!("Allocating pool buffer number {}", n);
                PoolBuffer::new()
            }
        }
    }

    /// Gives a buffer back for reuse
    pub fn release(&self, mut buf: PoolBuffer) {
        buf.clear();
        self.in_use.fetch_sub(1, Ordering::AcqRel);
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }

    /// Number of buffers that were ever allocated
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }

    /// Number of buffers currently checked out
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// Number of buffers waiting for reuse
    pub fn idle(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        BufferPool::new(DEFAULT_MAX_IDLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn buffers_are_recycled() {
        let pool = BufferPool::new(4);
        let mut buf = pool.acquire();
        assert!(buf.capacity() >= POOL_BUFFER_CAPACITY);
        buf.extend_from_slice(&[1, 2, 3]);
        pool.release(buf);
        assert_eq!(1, pool.idle());
        assert_eq!(0, pool.in_use());

        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert_eq!(1, pool.allocated());
        assert_eq!(1, pool.in_use());
        pool.release(buf);
    }

    #[test]
    fn idle_buffers_are_bounded() {
        let pool = BufferPool::new(1);
        let a = pool.acquire();
        let b = pool.acquire();
        pool.release(a);
        pool.release(b);
        assert_eq!(1, pool.idle());
        assert_eq!(2, pool.allocated());
    }

    #[test]
    fn capacity_survives_use() {
        let pool = BufferPool::new(2);
        let mut buf = pool.acquire();
        buf.extend_zeroed(POOL_BUFFER_CAPACITY + 10);
        buf.clear();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= POOL_BUFFER_CAPACITY);
        pool.release(buf);
        assert!(pool.acquire().capacity() >= POOL_BUFFER_CAPACITY);
    }

    #[test]
    fn read_from_stream() {
        let pool = BufferPool::default();
        let mut buf = pool.acquire();
        let mut stream = Cursor::new(vec![9; 10]);
        assert_eq!(10, buf.read_from(&mut stream).unwrap());
        assert_eq!(&[9; 10][..], &buf[..]);
        assert_eq!(0, buf.read_from(&mut stream).unwrap());
        assert!(buf.is_empty());
    }
}
