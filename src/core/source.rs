/*!
 * Bounded row reading from the external source
 *
 * A row is one line including its `\n` terminator, capped at a maximum
 * length. Overlong lines are truncated and the rest of the line is
 * skipped; the remainder never becomes a row of its own.
 */

use std::io::{self, BufRead};

/// One line of input, terminator included when present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    bytes: Vec<u8>,
    truncated: bool,
}

impl Row {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            truncated: false,
        }
    }

    /// Full row as written to the sink
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Row without its line terminator
    pub fn content(&self) -> &[u8] {
        self.bytes.strip_suffix(b"\n").unwrap_or(&self.bytes)
    }

    /// Whether bytes were dropped to respect the row bound
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }
}

/// Reads rows of at most `max_row_len` bytes from a buffered source
pub struct RowReader<R> {
    inner: R,
    max_row_len: usize,
}

impl<R: BufRead> RowReader<R> {
    pub fn new(inner: R, max_row_len: usize) -> Self {
        Self {
            inner,
            max_row_len: max_row_len.max(1),
        }
    }

    pub fn max_row_len(&self) -> usize {
        self.max_row_len
    }

    /// Read the next row, `None` once the source is exhausted
    pub fn next_row(&mut self) -> io::Result<Option<Row>> {
        let mut content = Vec::new();
        let mut overflow = false;
        let mut terminated = false;
        let mut saw_input = false;

        loop {
            let (used, found_newline) = {
                let available = match self.inner.fill_buf() {
                    Ok(buf) => buf,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                };

                if available.is_empty() {
                    break;
                }
                saw_input = true;

                let (line, used, found_newline) = match available.iter().position(|&b| b == b'\n') {
                    Some(i) => (&available[..i], i + 1, true),
                    None => (available, available.len(), false),
                };

                // Keep at most max_row_len content bytes; the final cut
                // happens once we know whether a terminator follows
                let room = self.max_row_len - content.len();
                if line.len() > room {
                    overflow = true;
                }
                content.extend_from_slice(&line[..line.len().min(room)]);

                (used, found_newline)
            };

            self.inner.consume(used);

            if found_newline {
                terminated = true;
                break;
            }
        }

        if !saw_input {
            return Ok(None);
        }

        if terminated {
            let limit = self.max_row_len - 1;
            if content.len() > limit {
                content.truncate(limit);
                overflow = true;
            }
            content.push(b'\n');
        }

        Ok(Some(Row {
            bytes: content,
            truncated: overflow,
        }))
    }
}

impl<R: BufRead> Iterator for RowReader<R> {
    type Item = io::Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    fn rows(input: &[u8], max: usize) -> Vec<Row> {
        RowReader::new(Cursor::new(input.to_vec()), max)
            .collect::<io::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_splits_on_newline_and_keeps_terminator() {
        let rows = rows(b"alpha\nbeta\n", 1024);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].as_bytes(), b"alpha\n");
        assert_eq!(rows[1].as_bytes(), b"beta\n");
        assert_eq!(rows[1].content(), b"beta");
    }

    #[test]
    fn test_last_line_without_terminator() {
        let rows = rows(b"alpha\nomega", 1024);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].as_bytes(), b"omega");
        assert_eq!(rows[1].content(), b"omega");
    }

    #[test]
    fn test_empty_source_yields_nothing() {
        assert!(rows(b"", 1024).is_empty());
    }

    #[test]
    fn test_blank_line_is_a_row() {
        let rows = rows(b"\n\n", 1024);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].as_bytes(), b"\n");
        assert!(rows[0].content().is_empty());
    }

    #[test]
    fn test_overlong_line_truncated_not_split() {
        let rows = rows(b"abcdefghij\nnext\n", 5);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].as_bytes(), b"abcd\n");
        assert!(rows[0].was_truncated());
        assert_eq!(rows[1].as_bytes(), b"next\n");
        assert!(!rows[1].was_truncated());
    }

    #[test]
    fn test_unterminated_overlong_line_truncated_to_bound() {
        let rows = rows(b"abcdefghij", 5);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].as_bytes(), b"abcde");
        assert!(rows[0].was_truncated());
    }

    #[test]
    fn test_exact_fit_is_not_truncated() {
        let rows = rows(b"abcd\n", 5);
        assert_eq!(rows[0].as_bytes(), b"abcd\n");
        assert!(!rows[0].was_truncated());
    }

    #[test]
    fn test_line_spanning_small_buffer_refills() {
        let long = "x".repeat(100);
        let input = format!("{}\nshort\n", long);
        let reader = BufReader::with_capacity(8, Cursor::new(input.into_bytes()));
        let rows: Vec<Row> = RowReader::new(reader, 1024)
            .collect::<io::Result<Vec<_>>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].content(), long.as_bytes());
        assert_eq!(rows[1].as_bytes(), b"short\n");
    }

    #[test]
    fn test_truncation_across_buffer_refills() {
        let input = format!("{}\nz\n", "y".repeat(50));
        let reader = BufReader::with_capacity(7, Cursor::new(input.into_bytes()));
        let rows: Vec<Row> = RowReader::new(reader, 10)
            .collect::<io::Result<Vec<_>>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].as_bytes(), format!("{}\n", "y".repeat(9)).as_bytes());
        assert_eq!(rows[1].as_bytes(), b"z\n");
    }

    #[test]
    fn test_crlf_kept_in_content() {
        let rows = rows(b"dos\r\n", 1024);
        assert_eq!(rows[0].content(), b"dos\r");
        assert_eq!(rows[0].as_bytes(), b"dos\r\n");
    }
}
