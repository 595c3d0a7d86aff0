//! Incremental reader for the `results` array of a query service response.
//!
//! The response body is scanned byte by byte. Sibling fields are skipped
//! structurally and only one array element is held in memory at a time.

use crate::config::TransientPolicy;
use crate::error::{ClientError, Result};
use std::io::BufRead;

/// Row source backed by a network response.
pub type RowStream = ArrayStream<Box<dyn BufRead + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    First,
    Rest,
    Done,
}

pub struct ArrayStream<R> {
    reader: R,
    policy: TransientPolicy,
    position: Position,
    capture: Option<Vec<u8>>,
}

impl<R: BufRead> ArrayStream<R> {
    /// Advance `reader` to the first element of the array stored under `field`
    /// in the top-level object.
    pub fn locate(reader: R, field: &str, policy: TransientPolicy) -> Result<Self> {
        let mut stream = ArrayStream {
            reader,
            policy,
            position: Position::First,
            capture: None,
        };
        stream.advance_to_field(field)?;
        Ok(stream)
    }

    /// Next raw element, or `None` once the closing bracket is reached.
    pub fn next_value(&mut self) -> Result<Option<serde_json::Value>> {
        if self.position == Position::Done {
            return Ok(None);
        }
        self.skip_whitespace()?;
        if self.peek()? == Some(b']') {
            self.bump()?;
            self.position = Position::Done;
            return Ok(None);
        }
        if self.position == Position::Rest {
            self.expect(b',')?;
            self.skip_whitespace()?;
        }
        self.capture = Some(Vec::new());
        let scanned = self.skip_value();
        let bytes = self.capture.take().unwrap_or_default();
        scanned?;
        self.position = Position::Rest;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ClientError::protocol(format!("malformed result row: {}", e)))
    }

    pub fn is_done(&self) -> bool {
        self.position == Position::Done
    }

    fn advance_to_field(&mut self, field: &str) -> Result<()> {
        self.skip_whitespace()?;
        self.expect(b'{')?;
        loop {
            self.skip_whitespace()?;
            match self.peek()? {
                Some(b'}') => {
                    return Err(ClientError::protocol(format!("'{}' not found in response", field)));
                }
                Some(b',') => {
                    self.bump()?;
                    continue;
                }
                _ => {}
            }
            let name = self.read_field_name()?;
            self.skip_whitespace()?;
            self.expect(b':')?;
            self.skip_whitespace()?;
            if name == field {
                if self.peek()? != Some(b'[') {
                    return Err(ClientError::protocol(format!("'{}' is not an array", field)));
                }
                self.bump()?;
                return Ok(());
            }
            self.skip_value()?;
        }
    }

    fn read_field_name(&mut self) -> Result<String> {
        if self.peek()? != Some(b'"') {
            return Err(ClientError::protocol("expected field name"));
        }
        self.capture = Some(Vec::new());
        let scanned = self.skip_value();
        let bytes = self.capture.take().unwrap_or_default();
        scanned?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::protocol(format!("malformed field name: {}", e)))
    }

    /// Consume one complete JSON value starting at the current byte.
    fn skip_value(&mut self) -> Result<()> {
        match self.peek()? {
            Some(b'"') => {
                self.bump()?;
                self.skip_string_body()
            }
            Some(b'{') | Some(b'[') => {
                self.bump()?;
                let mut depth = 1usize;
                while depth > 0 {
                    match self.require()? {
                        b'"' => self.skip_string_body()?,
                        b'{' | b'[' => depth += 1,
                        b'}' | b']' => depth -= 1,
                        _ => {}
                    }
                }
                Ok(())
            }
            Some(_) => {
                while let Some(b) = self.peek()? {
                    if matches!(b, b',' | b'}' | b']') || b.is_ascii_whitespace() {
                        break;
                    }
                    self.bump()?;
                }
                Ok(())
            }
            None => Err(truncated()),
        }
    }

    /// Opening quote already consumed.
    fn skip_string_body(&mut self) -> Result<()> {
        loop {
            match self.require()? {
                b'\\' => {
                    self.require()?;
                }
                b'"' => return Ok(()),
                _ => {}
            }
        }
    }

    fn skip_whitespace(&mut self) -> Result<()> {
        while let Some(b) = self.peek()? {
            if !b.is_ascii_whitespace() {
                break;
            }
            self.bump()?;
        }
        Ok(())
    }

    fn expect(&mut self, wanted: u8) -> Result<()> {
        let found = self.require()?;
        if found != wanted {
            return Err(ClientError::protocol(format!(
                "expected '{}' but found '{}'",
                wanted as char, found as char
            )));
        }
        Ok(())
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        let policy = self.policy;
        let buf = self
            .reader
            .fill_buf()
            .map_err(|e| policy.io_error(&e, "failed to read result"))?;
        Ok(buf.first().copied())
    }

    fn bump(&mut self) -> Result<Option<u8>> {
        let byte = self.peek()?;
        if let Some(b) = byte {
            self.reader.consume(1);
            if let Some(capture) = self.capture.as_mut() {
                capture.push(b);
            }
        }
        Ok(byte)
    }

    fn require(&mut self) -> Result<u8> {
        self.bump()?.ok_or_else(truncated)
    }
}

fn truncated() -> ClientError {
    ClientError::protocol("unexpected end of response")
}

impl<R: BufRead> Iterator for ArrayStream<R> {
    type Item = Result<serde_json::Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.next_value();
        if item.is_err() {
            self.position = Position::Done;
        }
        item.transpose()
    }
}
