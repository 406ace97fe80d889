/*!
Splits the byte stream of a switch connection into OpenFlow messages.

A single socket read may contain any number of messages, the last of
which may be incomplete. Complete messages are handed out as slices
of the read buffer, incomplete ones are carried over in a pooled tail
buffer until the next read completes them.
*/

use crate::openflow::buffer_pool::{BufferPool, PoolBuffer};
use crate::openflow::error::Result;
use crate::openflow::messages::{OfpHeader, OfpMessage};

use std::cmp::min;

/// How far the next message has been received
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameState {
    /// Fewer than 8 bytes are buffered
    AwaitingHeader,
    /// The header is known, its body is incomplete
    AwaitingBody {
        /// Total length of the message from its header
        length: usize,
    },
    /// A complete message is buffered
    Ready,
}

impl FrameState {
    /// Determines the state of a buffer that starts at a message boundary.
    /// Fails if a header declares less than the header length.
    pub fn of(bytes: &[u8]) -> Result<FrameState> {
        if bytes.len() < OfpHeader::header_length() {
            return Ok(FrameState::AwaitingHeader);
        }
        let length = OfpHeader::parse(bytes)?.length();
        if bytes.len() < length {
            Ok(FrameState::AwaitingBody { length })
        }
        else {
            Ok(FrameState::Ready)
        }
    }
}

/// Lazily yields the complete messages at the start of a byte slice.
/// Iteration stops at the first incomplete message, which is left
/// in `remainder()`, or after the first malformed header.
#[derive(Debug)]
pub struct Frames<'a> {
    bytes: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> Frames<'a> {
    pub fn new(bytes: &'a [u8]) -> Frames<'a> {
        Frames {
            bytes,
            pos: 0,
            failed: false,
        }
    }

    /// The bytes that do not form a complete message (yet)
    pub fn remainder(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    fn next_message(&mut self) -> Result<Option<OfpMessage<'a>>> {
        let rest = self.remainder();
        if FrameState::of(rest)? != FrameState::Ready {
            return Ok(None);
        }
        let header = OfpHeader::parse(rest)?;
        let msg = OfpMessage::new(header, &rest[..header.length()])?;
        self.pos += header.length();
        Ok(Some(msg))
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = Result<OfpMessage<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_message() {
            Ok(msg) => msg.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Reassembles messages across socket reads of one connection
#[derive(Debug)]
pub struct Framer {
    tail: PoolBuffer,
    state: FrameState,
}

impl Framer {
    /// Creates a framer with a reassembly buffer from `pool`
    pub fn new(pool: &BufferPool) -> Framer {
        Framer {
            tail: pool.acquire(),
            state: FrameState::AwaitingHeader,
        }
    }

    /// The state of the carried over, incomplete message
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Number of bytes carried over from previous reads
    pub fn buffered(&self) -> usize {
        self.tail.len()
    }

    /// Feeds the bytes of one socket read.
    ///
    /// `handle` is called once for every message completed by `data`,
    /// in stream order. Processing stops at the first error, either a
    /// malformed header or an error returned by `handle`.
    pub fn process<F>(&mut self, data: &[u8], mut handle: F) -> Result<()>
    where
        F: FnMut(OfpMessage) -> Result<()>,
    {
        let mut data = data;
        if !self.tail.is_empty() {
            data = self.complete_tail(data);
            match FrameState::of(&self.tail)? {
                FrameState::Ready => {
                    let header = OfpHeader::parse(&self.tail)?;
                    let result = OfpMessage::new(header, &self.tail).and_then(&mut handle);
                    self.tail.clear();
                    result?;
                }
                state => {
                    self.state = state;
                    return Ok(());
                }
            }
        }

        let mut frames = Frames::new(data);
        for msg in &mut frames {
            handle(msg?)?;
        }
        let rest = frames.remainder();
        self.state = FrameState::of(rest)?;
        self.tail.extend_from_slice(rest);
        trace!("Carrying over {} bytes, {:?}", rest.len(), self.state);
        Ok(())
    }

    /// Moves as many bytes from `data` into the tail as the pending
    /// message still needs and returns what is left of `data`
    fn complete_tail<'d>(&mut self, data: &'d [u8]) -> &'d [u8] {
        let header_length = OfpHeader::header_length();
        let mut data = data;
        if self.tail.len() < header_length {
            let n = min(header_length - self.tail.len(), data.len());
            self.tail.extend_from_slice(&data[..n]);
            data = &data[n..];
        }
        if let Ok(FrameState::AwaitingBody { length }) = FrameState::of(&self.tail) {
            let n = min(length - self.tail.len(), data.len());
            self.tail.extend_from_slice(&data[..n]);
            data = &data[n..];
        }
        data
    }

    /// Stops reassembly and gives the tail buffer back
    pub fn close(self, pool: &BufferPool) {
        if self.buffered() > 0 {
            debug!(
                "Dropping {} bytes of an incomplete message, {:?}",
                self.buffered(),
                self.state()
            );
        }
        pool.release(self.tail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openflow::error::Error;

    fn message(typ: u8, xid: u32, body_len: usize) -> Vec<u8> {
        let len = 8 + body_len;
        let mut m = vec![5, typ, (len >> 8) as u8, len as u8];
        m.extend_from_slice(&xid.to_be_bytes());
        m.extend((0..body_len).map(|i| i as u8));
        m
    }

    fn stream() -> Vec<u8> {
        let mut s = vec![];
        s.extend(message(0, 1, 8));
        s.extend(message(2, 2, 0));
        s.extend(message(10, 3, 300));
        s.extend(message(6, 4, 24));
        s.extend(message(3, 5, 1));
        s
    }

    fn feed(framer: &mut Framer, chunks: &[&[u8]]) -> Vec<Vec<u8>> {
        let mut out = vec![];
        for chunk in chunks {
            framer
                .process(chunk, |m| {
                    out.push(m.bytes().to_vec());
                    Ok(())
                })
                .unwrap();
        }
        out
    }

    #[test]
    fn one_read_many_messages() {
        let pool = BufferPool::new(1);
        let mut framer = Framer::new(&pool);
        let s = stream();
        let msgs = feed(&mut framer, &[&s[..]]);
        assert_eq!(5, msgs.len());
        assert_eq!(message(10, 3, 300), msgs[2]);
        assert_eq!(0, framer.buffered());
        assert_eq!(FrameState::AwaitingHeader, framer.state());
        framer.close(&pool);
        assert_eq!(0, pool.in_use());
    }

    #[test]
    fn chunking_invariance() {
        let s = stream();
        let pool = BufferPool::new(1);
        let expected = feed(&mut Framer::new(&pool), &[&s[..]]);

        for size in 1..s.len() {
            let mut framer = Framer::new(&pool);
            let chunks: Vec<&[u8]> = s.chunks(size).collect();
            assert_eq!(expected, feed(&mut framer, &chunks), "chunk size {}", size);
            assert_eq!(0, framer.buffered());
            framer.close(&pool);
        }
    }

    #[test]
    fn uneven_chunks() {
        let s = stream();
        let pool = BufferPool::new(1);
        let expected = feed(&mut Framer::new(&pool), &[&s[..]]);
        let cuts = [0, 3, 4, 17, 18, 30, 200, 333, s.len()];
        let chunks: Vec<&[u8]> = cuts.windows(2).map(|w| &s[w[0]..w[1]]).collect();
        assert_eq!(expected, feed(&mut Framer::new(&pool), &chunks));
    }

    #[test]
    fn truncated_header_is_buffered() {
        let pool = BufferPool::new(1);
        let mut framer = Framer::new(&pool);
        let m = message(0, 7, 8);
        assert!(feed(&mut framer, &[&m[..5]]).is_empty());
        assert_eq!(FrameState::AwaitingHeader, framer.state());
        assert_eq!(5, framer.buffered());
        assert_eq!(vec![m.clone()], feed(&mut framer, &[&m[5..]]));
        assert_eq!(0, framer.buffered());
    }

    #[test]
    fn truncated_body_is_buffered() {
        let pool = BufferPool::new(1);
        let mut framer = Framer::new(&pool);
        let m = message(10, 7, 100);
        assert!(feed(&mut framer, &[&m[..50], &m[50..60]]).is_empty());
        assert_eq!(FrameState::AwaitingBody { length: 108 }, framer.state());
        let mut next = m[60..].to_vec();
        next.extend(message(2, 8, 0));
        let msgs = feed(&mut framer, &[&next[..]]);
        assert_eq!(2, msgs.len());
        assert_eq!(m, msgs[0]);
    }

    #[test]
    fn short_length_is_malformed() {
        let pool = BufferPool::new(1);
        let mut framer = Framer::new(&pool);
        let bad = [5, 0, 0, 4, 0, 0, 0, 1];
        let err = framer.process(&bad, |_| Ok(())).unwrap_err();
        assert_eq!(Error::MalformedMessage("header length below minimum"), err);
    }

    #[test]
    fn short_length_in_tail_is_malformed() {
        let pool = BufferPool::new(1);
        let mut framer = Framer::new(&pool);
        framer.process(&[5, 0, 0], |_| Ok(())).unwrap();
        assert!(framer.process(&[0, 0, 0, 0, 1], |_| Ok(())).is_err());
    }

    #[test]
    fn handler_errors_stop_processing() {
        let pool = BufferPool::new(1);
        let mut framer = Framer::new(&pool);
        let s = stream();
        let mut seen = 0;
        let result = framer.process(&s, |_| {
            seen += 1;
            Err(Error::MalformedMessage("test"))
        });
        assert!(result.is_err());
        assert_eq!(1, seen);
    }

    #[test]
    fn frames_remainder() {
        let mut s = message(2, 1, 4);
        s.extend_from_slice(&message(2, 2, 4)[..9]);
        let mut frames = Frames::new(&s);
        let first = frames.next().unwrap().unwrap();
        assert_eq!(1, first.header().xid());
        assert_eq!(&[0, 1, 2, 3], first.body());
        assert!(frames.next().is_none());
        assert_eq!(9, frames.remainder().len());
    }
}
