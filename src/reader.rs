//! Position-tracking byte reader feeding the streaming parser.
//!
//! Wraps any [`Read`] source and maintains the `(byte_offset, line, column)`
//! triple as bytes are consumed through the [`BufRead`] interface. A line
//! feed (0x0A) increments the line and resets the column; any other byte
//! increments the column, so a CR+LF pair counts as a single line increment.
//!
//! Seeking is supported only for checkpoint resume: [`PositionedReader::resume`]
//! rebuilds `line` and `column` by rescanning the file from the start up to
//! the checkpoint offset in one sequential pass, without parsing.

use crate::error::{Result, XmlGuardianError};
use crate::model::Position;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

const LINE_FEED: u8 = 0x0A;

/// A buffered reader that tracks the position of the next unread byte.
#[derive(Debug)]
pub struct PositionedReader<R> {
    inner: BufReader<R>,
    byte_offset: u64,
    line: u64,
    column: u64,
}

impl<R: Read> PositionedReader<R> {
    /// Wrap a source, starting at the origin position.
    pub fn new(source: R) -> Self {
        Self::with_capacity(64 * 1024, source)
    }

    /// Wrap a source with an explicit buffer capacity.
    pub fn with_capacity(capacity: usize, source: R) -> Self {
        Self {
            inner: BufReader::with_capacity(capacity, source),
            byte_offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Position of the next byte to be consumed.
    #[must_use]
    pub fn position(&self) -> Position {
        Position {
            byte_offset: self.byte_offset,
            line: self.line,
            column: self.column,
        }
    }

    /// Total bytes consumed so far.
    #[must_use]
    pub fn bytes_consumed(&self) -> u64 {
        self.byte_offset
    }

}

impl PositionedReader<File> {
    /// Open a file for reading from its first byte.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| XmlGuardianError::io(path, e))?;
        Ok(Self::new(file))
    }

    /// Open a file and advance to `byte_offset`, rebuilding line and column
    /// by scanning the skipped prefix.
    pub fn resume(path: &Path, byte_offset: u64) -> Result<Self> {
        let mut reader = Self::open(path)?;
        let mut remaining = byte_offset;
        while remaining > 0 {
            let available = {
                let buf = reader
                    .fill_buf()
                    .map_err(|e| XmlGuardianError::io(path, e))?;
                if buf.is_empty() {
                    return Err(XmlGuardianError::io(
                        path,
                        std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            format!("file shorter than resume offset {byte_offset}"),
                        ),
                    ));
                }
                buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX))
            };
            reader.consume(available);
            remaining -= available as u64;
        }
        Ok(reader)
    }
}

impl<R: Read> Read for PositionedReader<R> {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: Read> BufRead for PositionedReader<R> {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        // The consumed prefix is still sitting in the BufReader's buffer, so
        // it can be scanned for line feeds before being released.
        let buffered = self.inner.buffer();
        let amt = amt.min(buffered.len());
        let mut line = self.line;
        let mut column = self.column;
        for &byte in &buffered[..amt] {
            if byte == LINE_FEED {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        self.line = line;
        self.column = column;
        self.byte_offset += amt as u64;
        self.inner.consume(amt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;

    fn reader_over(content: &str) -> PositionedReader<Cursor<Vec<u8>>> {
        PositionedReader::new(Cursor::new(content.as_bytes().to_vec()))
    }

    fn consume_all<R: Read>(reader: &mut PositionedReader<R>) {
        let mut sink = Vec::new();
        reader.read_to_end(&mut sink).unwrap();
    }

    #[test]
    fn test_initial_position() {
        let reader = reader_over("abc");
        assert_eq!(reader.position(), Position::start());
    }

    #[test]
    fn test_column_advances_per_byte() {
        let mut reader = reader_over("abc");
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte).unwrap();
        reader.read_exact(&mut byte).unwrap();
        let pos = reader.position();
        assert_eq!(pos.byte_offset, 2);
        assert_eq!(pos.line, 1);
        assert_eq!(pos.column, 3);
    }

    #[test]
    fn test_line_feed_resets_column() {
        let mut reader = reader_over("ab\ncd");
        consume_all(&mut reader);
        let pos = reader.position();
        assert_eq!(pos.byte_offset, 5);
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 3);
    }

    #[test]
    fn test_crlf_counts_one_line() {
        let mut reader = reader_over("a\r\nb\r\nc");
        consume_all(&mut reader);
        let pos = reader.position();
        assert_eq!(pos.line, 3);
        assert_eq!(pos.column, 2);
    }

    #[test]
    fn test_positions_survive_small_buffer() {
        let content = "line one\nline two\nline three\n";
        let mut reader =
            PositionedReader::with_capacity(4, Cursor::new(content.as_bytes().to_vec()));
        consume_all(&mut reader);
        let pos = reader.position();
        assert_eq!(pos.byte_offset, content.len() as u64);
        assert_eq!(pos.line, 4);
        assert_eq!(pos.column, 1);
    }

    #[test]
    fn test_resume_rebuilds_line_and_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.xml");
        let content = "<a>\n<b>\n</b>\n</a>\n";
        std::fs::File::create(&path)
            .unwrap()
            .write_all(content.as_bytes())
            .unwrap();

        // Offset 8 lands just after "<a>\n<b>\n", at line 3, column 1.
        let reader = PositionedReader::resume(&path, 8).unwrap();
        let pos = reader.position();
        assert_eq!(pos.byte_offset, 8);
        assert_eq!(pos.line, 3);
        assert_eq!(pos.column, 1);
    }

    #[test]
    fn test_resume_past_eof_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.xml");
        std::fs::write(&path, "<a/>").unwrap();
        let err = PositionedReader::resume(&path, 1000).unwrap_err();
        assert!(matches!(err, XmlGuardianError::Io { .. }));
    }
}
