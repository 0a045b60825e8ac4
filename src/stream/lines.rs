//! Newline framing for chunked response bodies.
//!
//! Chunks arrive with arbitrary boundaries; [`LineBuffer`] reassembles them
//! into lines terminated by `\n` (an optional preceding `\r` is dropped).

/// Accumulates body chunks and hands out complete lines.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buffer: Vec<u8>,
    // Bytes at the front of `buffer` already known to contain no newline.
    scanned: usize,
}

impl LineBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of body bytes.
    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Removes and returns the next complete line, without its terminator.
    pub(crate) fn next_line(&mut self) -> Option<Vec<u8>> {
        let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') else {
            self.scanned = self.buffer.len();
            return None;
        };
        let end = self.scanned + offset;
        let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
        self.scanned = 0;
        line.pop();
        strip_carriage_return(&mut line);
        Some(line)
    }

    /// Returns whatever is left after the body ended without a final newline.
    pub(crate) fn take_remainder(&mut self) -> Option<Vec<u8>> {
        self.scanned = 0;
        if self.buffer.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.buffer);
        strip_carriage_return(&mut line);
        Some(line)
    }

    /// Number of buffered bytes not yet returned.
    pub(crate) fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn strip_carriage_return(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_split_across_chunks() {
        let mut lines = LineBuffer::new();
        lines.push(b"{\"a\":");
        assert_eq!(lines.next_line(), None);
        lines.push(b"1}\r\n{\"b\"");
        assert_eq!(lines.next_line().unwrap(), b"{\"a\":1}");
        assert_eq!(lines.next_line(), None);
        lines.push(b":2}\n");
        assert_eq!(lines.next_line().unwrap(), b"{\"b\":2}");
        assert_eq!(lines.pending(), 0);
    }

    #[test]
    fn test_keep_alive_lines_are_empty() {
        let mut lines = LineBuffer::new();
        lines.push(b"\r\n\r\n{}\r\n");
        assert_eq!(lines.next_line().unwrap(), b"");
        assert_eq!(lines.next_line().unwrap(), b"");
        assert_eq!(lines.next_line().unwrap(), b"{}");
        assert_eq!(lines.next_line(), None);
    }

    #[test]
    fn test_remainder_without_trailing_newline() {
        let mut lines = LineBuffer::new();
        lines.push(b"{\"a\":1}\n{\"b\":2}\r");
        assert_eq!(lines.next_line().unwrap(), b"{\"a\":1}");
        assert_eq!(lines.next_line(), None);
        assert_eq!(lines.take_remainder().unwrap(), b"{\"b\":2}");
        assert_eq!(lines.take_remainder(), None);
    }

    #[test]
    fn test_scan_offset_survives_multiple_partial_pushes() {
        let mut lines = LineBuffer::new();
        for chunk in [&b"ab"[..], b"cd", b"ef"] {
            lines.push(chunk);
            assert_eq!(lines.next_line(), None);
        }
        lines.push(b"\nxy");
        assert_eq!(lines.next_line().unwrap(), b"abcdef");
        assert_eq!(lines.pending(), 2);
    }
}
