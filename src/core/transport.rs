/*!
 * Row transport between the reader and classifier stages
 *
 * Rows travel over an ordered byte stream (an OS pipe in the running
 * pipeline). Each row is framed as a 4-byte big-endian length followed by
 * the row bytes. End-of-stream is only clean on a frame boundary.
 */

use std::io::{self, PipeReader, PipeWriter, Read, Write};

use super::source::Row;
use crate::error::{HeadcutError, Result};

/// Bytes of framing in front of every row
pub const FRAME_HEADER_LEN: usize = 4;

/// Writing half, owned by the reader stage
pub struct RowSender<W: Write> {
    inner: W,
}

impl<W: Write> RowSender<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn send(&mut self, row: &Row) -> Result<()> {
        let len = u32::try_from(row.len()).map_err(|_| {
            HeadcutError::MalformedFrame(format!("row of {} bytes cannot be framed", row.len()))
        })?;

        // Header and payload in one write so a frame never straddles two
        // partially delivered writes
        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + row.len());
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(row.as_bytes());

        self.inner.write_all(&frame).map_err(HeadcutError::Transport)?;
        self.inner.flush().map_err(HeadcutError::Transport)?;
        Ok(())
    }

    /// Close the write end; the receiver sees end-of-stream after the
    /// frames already sent
    pub fn close(self) {
        drop(self.inner);
    }
}

/// Reading half, owned by the classifier stage
pub struct RowReceiver<R: Read> {
    inner: R,
    max_frame_len: usize,
}

impl<R: Read> RowReceiver<R> {
    pub fn new(inner: R, max_frame_len: usize) -> Self {
        Self {
            inner,
            max_frame_len,
        }
    }

    /// Next row, `None` on a clean end-of-stream
    pub fn recv(&mut self) -> Result<Option<Row>> {
        let mut header = [0u8; FRAME_HEADER_LEN];
        let filled = read_full(&mut self.inner, &mut header)?;

        if filled == 0 {
            return Ok(None);
        }
        if filled < FRAME_HEADER_LEN {
            return Err(HeadcutError::MalformedFrame(format!(
                "stream ended inside a frame header ({} of {} bytes)",
                filled, FRAME_HEADER_LEN
            )));
        }

        let len = u32::from_be_bytes(header) as usize;
        if len > self.max_frame_len {
            return Err(HeadcutError::MalformedFrame(format!(
                "frame of {} bytes exceeds the {} byte row bound",
                len, self.max_frame_len
            )));
        }

        let mut payload = vec![0u8; len];
        let filled = read_full(&mut self.inner, &mut payload)?;
        if filled < len {
            return Err(HeadcutError::MalformedFrame(format!(
                "stream ended inside a frame ({} of {} bytes)",
                filled, len
            )));
        }

        Ok(Some(Row::new(payload)))
    }

    pub fn close(self) {
        drop(self.inner);
    }
}

/// Like `read_exact`, but reports how much was read before end-of-stream
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(HeadcutError::Transport(e)),
        }
    }
    Ok(filled)
}

/// Create both halves over an anonymous OS pipe
pub fn row_transport(max_row_len: usize) -> Result<(RowSender<PipeWriter>, RowReceiver<PipeReader>)> {
    let (reader, writer) = io::pipe()
        .map_err(|e| HeadcutError::Setup(format!("could not create row transport: {}", e)))?;
    Ok((RowSender::new(writer), RowReceiver::new(reader, max_row_len)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::thread;

    fn row(s: &str) -> Row {
        Row::new(s.as_bytes().to_vec())
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_frames_preserve_order_and_bytes() {
        let mut sender = RowSender::new(Vec::new());
        sender.send(&row("first\n")).unwrap();
        sender.send(&row("")).unwrap();
        sender.send(&row("tail")).unwrap();

        let mut receiver = RowReceiver::new(Cursor::new(sender.inner), 1024);
        assert_eq!(receiver.recv().unwrap(), Some(row("first\n")));
        assert_eq!(receiver.recv().unwrap(), Some(row("")));
        assert_eq!(receiver.recv().unwrap(), Some(row("tail")));
        assert_eq!(receiver.recv().unwrap(), None);
    }

    #[test]
    fn test_frame_layout() {
        let mut sender = RowSender::new(Vec::new());
        sender.send(&row("ab")).unwrap();
        assert_eq!(sender.inner, vec![0, 0, 0, 2, b'a', b'b']);
    }

    #[test]
    fn test_partial_header_is_malformed() {
        let mut receiver = RowReceiver::new(Cursor::new(vec![0u8, 0]), 1024);
        assert!(matches!(receiver.recv(), Err(HeadcutError::MalformedFrame(_))));
    }

    #[test]
    fn test_partial_payload_is_malformed() {
        let mut receiver = RowReceiver::new(Cursor::new(vec![0u8, 0, 0, 5, b'a']), 1024);
        assert!(matches!(receiver.recv(), Err(HeadcutError::MalformedFrame(_))));
    }

    #[test]
    fn test_oversize_frame_rejected() {
        let mut receiver = RowReceiver::new(Cursor::new(vec![0u8, 0, 4, 0]), 1024);
        assert!(matches!(receiver.recv(), Err(HeadcutError::MalformedFrame(_))));
    }

    #[test]
    fn test_write_failure_is_transport_error() {
        let mut sender = RowSender::new(BrokenPipe);
        let err = sender.send(&row("x\n")).unwrap_err();
        assert!(matches!(err, HeadcutError::Transport(_)));
    }

    #[test]
    fn test_os_pipe_across_threads() {
        let (mut sender, mut receiver) = row_transport(1024).unwrap();

        let producer = thread::spawn(move || {
            for i in 0..20 {
                sender.send(&row(&format!("row {}\n", i))).unwrap();
            }
            sender.close();
        });

        let mut received = Vec::new();
        while let Some(r) = receiver.recv().unwrap() {
            received.push(r);
        }
        producer.join().unwrap();

        assert_eq!(received.len(), 20);
        assert_eq!(received[7], row("row 7\n"));
    }

    #[test]
    fn test_send_after_receiver_closed_fails() {
        let (mut sender, receiver) = row_transport(1024).unwrap();
        receiver.close();
        assert!(sender.send(&row("orphan\n")).is_err());
    }
}
