//! Reader for the `|`-separated, `^`-terminated flat-file encoding
//!
//! A record ends at a `^` that is followed by a line break or end of input,
//! or at the `|^|` triple. A separator directly before the ending `^` is a
//! trailer rather than the start of an empty field. Every other `^` is data,
//! as are line breaks inside a record.

use std::collections::VecDeque;
use std::io::{self, BufRead, Bytes};

pub const SEPARATOR: u8 = b'|';
pub const TERMINATOR: u8 = b'^';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Line on which the record starts, 1-based
    pub line: u64,
    pub fields: Vec<String>,
}

#[derive(Debug)]
pub enum ReadError {
    Io(io::Error),
    /// Input ended inside a record
    UnexpectedEof { line: u64 },
}

impl From<io::Error> for ReadError {
    fn from(err: io::Error) -> Self {
        ReadError::Io(err)
    }
}

pub struct RecordReader<R: BufRead> {
    bytes: Bytes<R>,
    lookahead: VecDeque<u8>,
    line: u64,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            bytes: reader.bytes(),
            lookahead: VecDeque::with_capacity(4),
            line: 1,
        }
    }

    fn fill(&mut self, n: usize) -> io::Result<()> {
        while self.lookahead.len() < n {
            match self.bytes.next() {
                Some(byte) => self.lookahead.push_back(byte?),
                None => break,
            }
        }
        Ok(())
    }

    fn peek(&mut self, offset: usize) -> io::Result<Option<u8>> {
        self.fill(offset + 1)?;
        Ok(self.lookahead.get(offset).copied())
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        self.fill(1)?;
        let byte = self.lookahead.pop_front();
        if byte == Some(b'\n') {
            self.line += 1;
        }
        Ok(byte)
    }

    /// True when the bytes at `offset` are a line break or end of input
    fn at_line_end(&mut self, offset: usize) -> io::Result<bool> {
        Ok(match self.peek(offset)? {
            None | Some(b'\n') => true,
            Some(b'\r') => matches!(self.peek(offset + 1)?, None | Some(b'\n')),
            Some(_) => false,
        })
    }

    fn skip_line_break(&mut self) -> io::Result<()> {
        if self.peek(0)? == Some(b'\r') {
            self.next_byte()?;
        }
        if self.peek(0)? == Some(b'\n') {
            self.next_byte()?;
        }
        Ok(())
    }

    /// Read the next record; `None` at clean end of input
    pub fn next_record(&mut self) -> Result<Option<Record>, ReadError> {
        // Blank lines between records
        while let Some(byte) = self.peek(0)? {
            if byte == b'\n' || byte == b'\r' {
                self.next_byte()?;
            } else {
                break;
            }
        }
        if self.peek(0)?.is_none() {
            return Ok(None);
        }

        let line = self.line;
        let mut fields = Vec::new();
        let mut current: Vec<u8> = Vec::new();
        loop {
            let Some(byte) = self.next_byte()? else {
                return Err(ReadError::UnexpectedEof { line });
            };
            match byte {
                SEPARATOR if self.peek(0)? == Some(TERMINATOR) => {
                    if self.peek(1)? == Some(SEPARATOR) {
                        self.next_byte()?;
                        self.next_byte()?;
                        self.skip_line_break()?;
                        break;
                    }
                    if self.at_line_end(1)? {
                        self.next_byte()?;
                        self.skip_line_break()?;
                        break;
                    }
                    fields.push(decode(&current));
                    current.clear();
                }
                SEPARATOR => {
                    fields.push(decode(&current));
                    current.clear();
                }
                TERMINATOR if self.at_line_end(0)? => {
                    self.skip_line_break()?;
                    break;
                }
                other => current.push(other),
            }
        }
        fields.push(decode(&current));
        Ok(Some(Record { line, fields }))
    }
}

/// Dumps are mostly ASCII with the odd Latin-1 byte; keep whatever is valid UTF-8
fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn read_all(input: &str) -> Vec<Vec<String>> {
        let mut reader = RecordReader::new(input.as_bytes());
        let mut records = Vec::new();
        while let Some(record) = reader.next_record().unwrap() {
            records.push(record.fields);
        }
        records
    }

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_terminator_at_line_end() {
        assert_eq!(
            read_all("a|b|c^\n1|text|2.5^\n"),
            vec![row(&["a", "b", "c"]), row(&["1", "text", "2.5"])]
        );
    }

    #[test]
    fn test_triple_terminator() {
        assert_eq!(
            read_all("1|KAAA|DT|^|\n2|KBBB||^|\r\n"),
            vec![row(&["1", "KAAA", "DT"]), row(&["2", "KBBB", ""])]
        );
    }

    #[test]
    fn test_terminator_inside_field_is_data() {
        assert_eq!(read_all("1|val^ue|3^\n"), vec![row(&["1", "val^ue", "3"])]);
        assert_eq!(read_all("1|^x|3^\n"), vec![row(&["1", "^x", "3"])]);
    }

    #[test]
    fn test_line_break_inside_record() {
        assert_eq!(
            read_all("1|first line\nsecond line|2^\n"),
            vec![row(&["1", "first line\nsecond line", "2"])]
        );
    }

    #[test]
    fn test_last_record_without_newline_and_blank_lines() {
        assert_eq!(
            read_all("\n\na|b^\n\n1|2^"),
            vec![row(&["a", "b"]), row(&["1", "2"])]
        );
    }

    #[test]
    fn test_unterminated_record() {
        let mut reader = RecordReader::new("a|b^\n1|2".as_bytes());
        assert!(reader.next_record().unwrap().is_some());
        match reader.next_record() {
            Err(ReadError::UnexpectedEof { line }) => assert_eq!(line, 2),
            other => panic!("Expected UnexpectedEof, got {:?}", other),
        }
    }

    #[test]
    fn test_record_line_numbers() {
        let mut reader = RecordReader::new("a|b^\n1|x\ny^\n2|z^\n".as_bytes());
        let lines: Vec<u64> = std::iter::from_fn(|| reader.next_record().unwrap())
            .map(|r| r.line)
            .collect();
        assert_eq!(lines, vec![1, 2, 4]);
    }
}
