//! Incremental reader for documents whose top level is a JSON array.
//!
//! The array is consumed one element at a time: the opening bracket, each
//! element, and the closing bracket are separate calls, so a caller can act on
//! elements (and flush its own buffers) before the end of the document is
//! checked. At most one element is held in memory.

use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::errors::ParserError;

pub struct JsonArrayReader<R> {
    reader: R,
    position: u64,
    elements: usize,
    buf: Vec<u8>,
}

impl<R> JsonArrayReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            position: 0,
            elements: 0,
            buf: Vec::new(),
        }
    }

    /// Number of elements decoded so far.
    pub fn elements_read(&self) -> usize {
        self.elements
    }

    /// Byte offset of the next unread byte.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Consumes the opening `[` of the document.
    pub async fn open(&mut self) -> Result<(), ParserError> {
        self.expect_byte(b'[', "[").await
    }

    /// Whether another element follows. Returns false at `]` or end of input;
    /// neither is consumed.
    pub async fn has_next(&mut self) -> Result<bool, ParserError> {
        self.skip_whitespace().await?;
        Ok(!matches!(self.peek().await?, None | Some(b']')))
    }

    /// Decodes the next element, consuming the separating comma if needed.
    pub async fn next_element<T: DeserializeOwned>(&mut self) -> Result<T, ParserError> {
        if self.elements > 0 {
            self.expect_byte(b',', ",").await?;
        }
        self.skip_whitespace().await?;
        self.read_value().await?;

        let index = self.elements;
        let value = serde_json::from_slice(&self.buf)
            .map_err(|source| ParserError::Element { index, source })?;
        self.elements += 1;
        Ok(value)
    }

    /// Consumes the closing `]`.
    pub async fn close(&mut self) -> Result<(), ParserError> {
        self.expect_byte(b']', "]").await
    }

    async fn peek(&mut self) -> Result<Option<u8>, ParserError> {
        let chunk = self.reader.fill_buf().await?;
        Ok(chunk.first().copied())
    }

    fn advance(&mut self, amount: usize) {
        self.reader.consume(amount);
        self.position += amount as u64;
    }

    async fn skip_whitespace(&mut self) -> Result<(), ParserError> {
        loop {
            let (skipped, available) = {
                let chunk = self.reader.fill_buf().await?;
                let skipped = chunk
                    .iter()
                    .take_while(|byte| is_whitespace(**byte))
                    .count();
                (skipped, chunk.len())
            };
            self.advance(skipped);
            if available == 0 || skipped < available {
                return Ok(());
            }
        }
    }

    async fn expect_byte(&mut self, expected: u8, token: &'static str) -> Result<(), ParserError> {
        self.skip_whitespace().await?;
        match self.peek().await? {
            Some(byte) if byte == expected => {
                self.advance(1);
                Ok(())
            }
            Some(byte) => Err(ParserError::UnexpectedToken {
                expected: token,
                found: byte as char,
                offset: self.position,
            }),
            None => Err(ParserError::UnexpectedEof {
                expected: token,
                offset: self.position,
            }),
        }
    }

    /// Copies the bytes of one JSON value into `buf`. Strings are tracked so
    /// that brackets and commas inside them do not end the value.
    async fn read_value(&mut self) -> Result<(), ParserError> {
        self.buf.clear();
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        loop {
            let (consumed, done) = {
                let chunk = self.reader.fill_buf().await?;
                if chunk.is_empty() {
                    return Err(ParserError::UnexpectedEof {
                        expected: "array element",
                        offset: self.position,
                    });
                }

                let mut consumed = 0;
                let mut done = false;
                for &byte in chunk {
                    if in_string {
                        consumed += 1;
                        if escaped {
                            escaped = false;
                        } else if byte == b'\\' {
                            escaped = true;
                        } else if byte == b'"' {
                            in_string = false;
                            if depth == 0 {
                                done = true;
                                break;
                            }
                        }
                        continue;
                    }

                    match byte {
                        b'"' => {
                            in_string = true;
                            consumed += 1;
                        }
                        b'{' | b'[' => {
                            depth += 1;
                            consumed += 1;
                        }
                        b'}' | b']' if depth == 0 => {
                            done = true;
                            break;
                        }
                        b'}' | b']' => {
                            depth -= 1;
                            consumed += 1;
                            if depth == 0 {
                                done = true;
                                break;
                            }
                        }
                        b',' if depth == 0 => {
                            done = true;
                            break;
                        }
                        byte if depth == 0 && is_whitespace(byte) => {
                            done = true;
                            break;
                        }
                        _ => consumed += 1,
                    }
                }

                self.buf.extend_from_slice(&chunk[..consumed]);
                (consumed, done)
            };

            self.advance(consumed);
            if done {
                return Ok(());
            }
        }
    }
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}
