/*!
The write side of a switch connection.

Any thread may enqueue complete messages. The enqueuer that finds no
write in flight becomes the writer and drains the queue, every other
enqueuer only appends. This keeps exactly one write in flight and
writes messages in the order they were enqueued. Written buffers go
back to the pool right after their write completed.

The queue is unbounded: a producer is never slowed down by a slow switch.
*/

use crate::openflow::buffer_pool::{BufferPool, PoolBuffer};

use std::collections::VecDeque;
use std::io;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Writes pooled message buffers to a stream in strict FIFO order
#[derive(Debug)]
pub struct WriteChannel<W> {
    sink: Mutex<W>,
    pending: Mutex<VecDeque<PoolBuffer>>,
    /// Enqueued buffers whose write did not complete yet
    in_flight: AtomicUsize,
    poisoned: AtomicBool,
    pool: Arc<BufferPool>,
}

impl<W: Write> WriteChannel<W> {
    pub fn new(sink: W, pool: Arc<BufferPool>) -> WriteChannel<W> {
        WriteChannel {
            sink: Mutex::new(sink),
            pending: Mutex::new(VecDeque::new()),
            in_flight: AtomicUsize::new(0),
            poisoned: AtomicBool::new(false),
            pool,
        }
    }

    /// The pool the written buffers are returned to
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Takes over a complete message and writes it after all
    /// previously enqueued ones.
    ///
    /// The write may happen on this thread before returning or on the
    /// thread that currently drains the queue. An error is returned if
    /// a write performed by this call failed or if an earlier write
    /// failed; in both cases the connection is unusable.
    pub fn enqueue(&self, buf: PoolBuffer) -> io::Result<()> {
        if self.poisoned.load(Ordering::Acquire) {
            self.pool.release(buf);
            return Err(Self::broken());
        }
        lock(&self.pending).push_back(buf);
        if self.in_flight.fetch_add(1, Ordering::AcqRel) > 0 {
            // the current writer will pick it up
            return Ok(());
        }
        self.drain()
    }

    fn drain(&self) -> io::Result<()> {
        let mut result = Ok(());
        loop {
            let next = lock(&self.pending).pop_front();
            if let Some(buf) = next {
                if !self.poisoned.load(Ordering::Acquire) {
                    if let Err(e) = self.write(&buf) {
                        error!("Writing to the switch failed: {}", e);
                        self.poisoned.store(true, Ordering::Release);
                        result = Err(e);
                    }
                }
                self.pool.release(buf);
            }
            if self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
                return result;
            }
        }
    }

    fn write(&self, buf: &[u8]) -> io::Result<()> {
        let mut sink = lock(&self.sink);
        sink.write_all(buf)?;
        sink.flush()
    }

    /// Number of enqueued buffers whose write did not complete yet
    #[cfg(test)]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Checks if a write failed
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    fn broken() -> io::Error {
        io::Error::new(io::ErrorKind::BrokenPipe, "an earlier write to the switch failed")
    }

    /// Gives access to the underlying stream, waiting for a running write
    pub fn with_sink<T, F: FnOnce(&mut W) -> T>(&self, f: F) -> T {
        f(&mut lock(&self.sink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    /// Records writes and how many ran at the same time
    #[derive(Default)]
    struct Recorder {
        writes: Vec<Vec<u8>>,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
        fail_after: Option<usize>,
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_after == Some(self.writes.len()) {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
            }
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_micros(50));
            self.writes.push(buf.to_vec());
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn buffer(pool: &BufferPool, content: &[u8]) -> PoolBuffer {
        let mut buf = pool.acquire();
        buf.extend_from_slice(content);
        buf
    }

    #[test]
    fn writes_in_enqueue_order() {
        let pool = Arc::new(BufferPool::new(8));
        let channel = WriteChannel::new(Recorder::default(), pool.clone());
        for i in 0..5u8 {
            channel.enqueue(buffer(&pool, &[i; 3])).unwrap();
        }
        let writes = channel.with_sink(|r| r.writes.clone());
        assert_eq!(vec![vec![0; 3], vec![1; 3], vec![2; 3], vec![3; 3], vec![4; 3]], writes);
        assert_eq!(0, channel.in_flight());
        assert_eq!(0, pool.in_use());
    }

    #[test]
    fn concurrent_enqueues() {
        const THREADS: u8 = 8;
        const PER_THREAD: u8 = 25;

        let pool = Arc::new(BufferPool::new(64));
        let recorder = Recorder::default();
        let max_active = recorder.max_active.clone();
        let channel = Arc::new(WriteChannel::new(recorder, pool.clone()));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let channel = channel.clone();
                let pool = pool.clone();
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        channel.enqueue(buffer(&pool, &[t, i, t, i])).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let writes = channel.with_sink(|r| r.writes.clone());
        assert_eq!(THREADS as usize * PER_THREAD as usize, writes.len());
        assert_eq!(1, max_active.load(Ordering::SeqCst));
        for t in 0..THREADS {
            let own: Vec<u8> = writes.iter().filter(|w| w[0] == t).map(|w| w[1]).collect();
            let expected: Vec<u8> = (0..PER_THREAD).collect();
            assert_eq!(expected, own, "writes of thread {} out of order", t);
        }
        for w in &writes {
            assert_eq!(w[0], w[2]);
            assert_eq!(w[1], w[3]);
        }
        assert_eq!(0, channel.in_flight());
        assert_eq!(0, pool.in_use());
    }

    #[test]
    fn failed_write_poisons_the_channel() {
        let pool = Arc::new(BufferPool::new(8));
        let recorder = Recorder {
            fail_after: Some(1),
            ..Recorder::default()
        };
        let channel = WriteChannel::new(recorder, pool.clone());
        channel.enqueue(buffer(&pool, &[1])).unwrap();
        let err = channel.enqueue(buffer(&pool, &[2])).unwrap_err();
        assert_eq!(io::ErrorKind::ConnectionReset, err.kind());
        assert!(channel.is_poisoned());
        let err = channel.enqueue(buffer(&pool, &[3])).unwrap_err();
        assert_eq!(io::ErrorKind::BrokenPipe, err.kind());
        assert_eq!(1, channel.with_sink(|r| r.writes.len()));
        assert_eq!(0, pool.in_use());
    }
}
