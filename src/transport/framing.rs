// Line framing
// Bounded newline-delimited frames over a byte stream

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

/// Largest config write the device accepts, matching a BLE characteristic
pub const MAX_CONFIG_LINE: usize = 512;

/// Largest record line the consumer accepts from a device
pub const MAX_RECORD_LINE: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// One line without its terminator. Bytes are passed through unchecked.
    Line(Vec<u8>),
    /// A line longer than the limit, discarded up to its newline
    Oversized,
}

/// Reads newline-terminated frames of at most `max_len` bytes
///
/// Partial input is kept between calls, so `next_frame` can be raced in
/// `tokio::select!` without losing bytes.
pub struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    max_len: usize,
    discarding: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R, max_len: usize) -> Self {
        LineReader {
            reader: BufReader::new(reader),
            buf: Vec::new(),
            max_len,
            discarding: false,
        }
    }

    /// Next complete frame, or `None` at end of stream.
    /// An unterminated tail at end of stream is dropped.
    pub async fn next_frame(&mut self) -> std::io::Result<Option<Frame>> {
        loop {
            // Room for a full line plus its newline
            let limit = (self.max_len + 1).saturating_sub(self.buf.len()) as u64;
            let read = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut self.buf)
                .await?;
            if read == 0 {
                return Ok(None);
            }

            if self.buf.last() == Some(&b'\n') {
                let mut line = std::mem::take(&mut self.buf);
                if std::mem::take(&mut self.discarding) {
                    return Ok(Some(Frame::Oversized));
                }
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(Some(Frame::Line(line)));
            }

            if self.buf.len() > self.max_len {
                self.discarding = true;
                self.buf.clear();
            }
        }
    }
}

/// True for frames with nothing but whitespace
pub fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|b| b.is_ascii_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lines_split_and_terminators_stripped() {
        let input: &[u8] = b"{\"a\":1}\r\n\n{\"b\":2}\n";
        let mut reader = LineReader::new(input, 64);
        assert_eq!(reader.next_frame().await.unwrap(), Some(Frame::Line(b"{\"a\":1}".to_vec())));
        assert_eq!(reader.next_frame().await.unwrap(), Some(Frame::Line(Vec::new())));
        assert_eq!(reader.next_frame().await.unwrap(), Some(Frame::Line(b"{\"b\":2}".to_vec())));
        assert_eq!(reader.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_utf8_passed_through() {
        let input: &[u8] = b"{\"impact_threshold\":\xff}\n";
        let mut reader = LineReader::new(input, 64);
        assert_eq!(
            reader.next_frame().await.unwrap(),
            Some(Frame::Line(b"{\"impact_threshold\":\xff}".to_vec()))
        );
    }

    #[tokio::test]
    async fn test_oversized_line_discarded_then_reading_resumes() {
        let mut input = vec![b'x'; 50];
        input.push(b'\n');
        input.extend_from_slice(b"ok\n");
        let mut reader = LineReader::new(input.as_slice(), 8);
        assert_eq!(reader.next_frame().await.unwrap(), Some(Frame::Oversized));
        assert_eq!(reader.next_frame().await.unwrap(), Some(Frame::Line(b"ok".to_vec())));
    }

    #[tokio::test]
    async fn test_line_at_exact_limit_accepted() {
        let mut input = vec![b'y'; 8];
        input.push(b'\n');
        let mut reader = LineReader::new(input.as_slice(), 8);
        assert_eq!(reader.next_frame().await.unwrap(), Some(Frame::Line(vec![b'y'; 8])));
    }

    #[tokio::test]
    async fn test_unterminated_tail_dropped() {
        let input: &[u8] = b"partial";
        let mut reader = LineReader::new(input, 64);
        assert_eq!(reader.next_frame().await.unwrap(), None);
    }

    #[test]
    fn test_blank_detection() {
        assert!(is_blank(b""));
        assert!(is_blank(b" \t"));
        assert!(!is_blank(b" {}"));
    }
}
