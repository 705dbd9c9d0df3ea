//! Per-direction byte buffer with an explicit mark/reset cursor.
//!
//! Every multi-byte read that might run past the data received so far is
//! guarded by a mark set before the read and a reset restoring the cursor on
//! underflow. This is what lets the token parsers handle arbitrarily
//! fragmented TCP delivery: a failed read leaves the buffer exactly as it
//! was, and the caller retries after the next segment arrives.

use bytes::{Buf, BytesMut};
use memchr::memmem;

#[derive(Debug, Default)]
pub struct SessionBuffer {
    data: BytesMut,
    pos: usize,
    mark: usize,
}

impl SessionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Remember the current cursor so a later `reset` can roll back to it.
    pub fn mark(&mut self) {
        self.mark = self.pos;
    }

    /// Roll the cursor back to the last mark.
    pub fn reset(&mut self) {
        self.pos = self.mark;
    }

    pub fn readable_bytes(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Total bytes currently held, including any already read but not yet
    /// reclaimed by `compact`.
    pub fn held_bytes(&self) -> usize {
        self.data.len()
    }

    /// Distance from the cursor to the first occurrence of `delimiter`, not
    /// counting the delimiter itself.
    pub fn bytes_before(&self, delimiter: &[u8]) -> Option<usize> {
        memmem::find(&self.data[self.pos..], delimiter)
    }

    pub fn get(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    /// All-or-nothing read of `n` bytes. The cursor does not move on
    /// underflow.
    pub fn get_n(&mut self, n: usize) -> Option<Vec<u8>> {
        if self.readable_bytes() < n {
            return None;
        }
        let out = self.data[self.pos..self.pos + n].to_vec();
        self.pos += n;
        Some(out)
    }

    pub fn peek(&self, n: usize) -> Option<&[u8]> {
        self.data.get(self.pos..self.pos + n)
    }

    /// Advance the cursor without copying. Returns false (cursor unmoved) on
    /// underflow.
    pub fn skip(&mut self, n: usize) -> bool {
        if self.readable_bytes() < n {
            return false;
        }
        self.pos += n;
        true
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        debug_assert!(pos <= self.data.len());
        self.pos = pos.min(self.data.len());
    }

    /// Unread bytes from the cursor to the end.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    /// Consume and return everything from the cursor to the end.
    pub fn take_all(&mut self) -> Vec<u8> {
        let out = self.data[self.pos..].to_vec();
        self.pos = self.data.len();
        out
    }

    /// Drop bytes that both the cursor and the mark have passed. Called after
    /// each complete message so long-lived sessions do not grow unbounded.
    pub fn compact(&mut self) {
        let consumed = self.pos.min(self.mark);
        if consumed == 0 {
            return;
        }
        self.data.advance(consumed);
        self.pos -= consumed;
        self.mark -= consumed;
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.pos = 0;
        self.mark = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_reset_round_trip() {
        let mut buf = SessionBuffer::new();
        buf.append(b"GET / HTTP/1.1");
        buf.mark();
        assert_eq!(buf.get_n(4), Some(b"GET ".to_vec()));
        buf.reset();
        assert_eq!(buf.position(), 0);
        assert_eq!(buf.get_n(3), Some(b"GET".to_vec()));
    }

    #[test]
    fn test_get_n_underflow_leaves_cursor() {
        let mut buf = SessionBuffer::new();
        buf.append(b"abc");
        assert_eq!(buf.get_n(5), None);
        assert_eq!(buf.position(), 0, "underflow must not move the cursor");
        assert_eq!(buf.get_n(3), Some(b"abc".to_vec()));
    }

    #[test]
    fn test_bytes_before_scans_from_cursor() {
        let mut buf = SessionBuffer::new();
        buf.append(b"aaa\r\nbbb\r\n");
        assert_eq!(buf.bytes_before(b"\r\n"), Some(3));
        assert!(buf.skip(5));
        assert_eq!(buf.bytes_before(b"\r\n"), Some(3));
        assert!(buf.skip(5));
        assert_eq!(buf.bytes_before(b"\r\n"), None);
    }

    #[test]
    fn test_append_after_partial_read() {
        let mut buf = SessionBuffer::new();
        buf.append(b"par");
        assert_eq!(buf.bytes_before(b"\r\n"), None);
        buf.append(b"tial\r\n");
        assert_eq!(buf.bytes_before(b"\r\n"), Some(7));
    }

    #[test]
    fn test_compact_preserves_unread_bytes() {
        let mut buf = SessionBuffer::new();
        buf.append(b"consumed|remaining");
        assert!(buf.skip(9));
        buf.mark();
        buf.compact();
        assert_eq!(buf.position(), 0);
        assert_eq!(buf.as_slice(), b"remaining");
        buf.mark();
        buf.reset();
        assert_eq!(buf.as_slice(), b"remaining");
    }

    #[test]
    fn test_compact_respects_outstanding_mark() {
        let mut buf = SessionBuffer::new();
        buf.append(b"0123456789");
        assert!(buf.skip(2));
        buf.mark();
        assert!(buf.skip(5));
        // Mark at 2 is still live: only the first 2 bytes may be dropped
        buf.compact();
        assert_eq!(buf.position(), 5);
        buf.reset();
        assert_eq!(buf.as_slice(), b"23456789");
    }

    #[test]
    fn test_take_all_drains() {
        let mut buf = SessionBuffer::new();
        buf.append(b"leftover");
        assert!(buf.skip(4));
        assert_eq!(buf.take_all(), b"over");
        assert_eq!(buf.readable_bytes(), 0);
    }
}
