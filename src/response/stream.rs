//! Streaming body sink.
//!
//! Writes the response event straight to an output as the handler produces
//! body bytes: the event without its body is emitted on commit, the body is
//! appended as JSON string content, and the closing quote and brace follow
//! on finish.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lambda_runtime::tracing::debug;
use std::io::{self, Write};

use super::head_event;
use super::writer::{BodySink, ResponseHead};
use crate::config::ContainerConfig;
use crate::models::{EventShape, ResponseEvent};

const REPLACEMENT: char = '\u{FFFD}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyEncoding {
    Text,
    Base64,
}

/// Body sink that serializes the response event incrementally.
///
/// The base64 decision is made at commit time from the head alone: only
/// textual content types are streamed as text, and a body that starts
/// without any content type is treated as binary. Text bodies that turn out
/// not to be UTF-8 have the offending sequences replaced with U+FFFD.
pub struct StreamingBody<'w> {
    out: &'w mut dyn Write,
    shape: EventShape,
    config: &'w ContainerConfig,
    encoding: Option<BodyEncoding>,
    pending: Vec<u8>,
    finished: bool,
}

impl<'w> StreamingBody<'w> {
    pub fn new(out: &'w mut dyn Write, shape: EventShape, config: &'w ContainerConfig) -> Self {
        Self {
            out,
            shape,
            config,
            encoding: None,
            pending: Vec::new(),
            finished: false,
        }
    }

    #[must_use]
    pub const fn is_committed(&self) -> bool {
        self.encoding.is_some()
    }

    /// Writes a complete event in place of the streamed one. Only possible
    /// while nothing has been committed.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::Other`] when the head was already sent, or
    /// any error from the output.
    pub fn write_event(&mut self, event: &ResponseEvent) -> io::Result<()> {
        if self.is_committed() {
            return Err(io::Error::other("response already committed"));
        }
        serde_json::to_writer(&mut *self.out, event)?;
        self.finished = true;
        self.out.flush()
    }

    fn write_json_text(&mut self, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let quoted = serde_json::to_vec(text)?;
        // Strip the surrounding quotes; the opening one was written on commit.
        self.out.write_all(&quoted[1..quoted.len() - 1])
    }

    fn write_text(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.pending.extend_from_slice(bytes);
        let mut text = String::new();
        let mut consumed = 0;
        loop {
            let rest = &self.pending[consumed..];
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    text.push_str(std::str::from_utf8(&rest[..valid_up_to]).unwrap_or_default());
                    if let Some(invalid) = e.error_len() {
                        text.push(REPLACEMENT);
                        consumed += valid_up_to + invalid;
                    } else {
                        // Incomplete sequence at the end; wait for more bytes.
                        consumed += valid_up_to;
                        break;
                    }
                }
            }
        }
        self.pending.drain(..consumed);
        self.write_json_text(&text)
    }

    /// Writes the event head and opens the body string. `body_follows` is
    /// false when the response is being closed without a body.
    fn open(&mut self, head: &ResponseHead, body_follows: bool) -> io::Result<()> {
        let untyped_body = body_follows && head.content_type().is_none();
        let binary = head.is_binary(self.config) || untyped_body;
        let event = head_event(head.status, head.wire_headers(), binary, self.shape);
        let mut prefix = serde_json::to_vec(&event)?;
        // `{...}` without a body: reopen the object and start the body string.
        prefix.pop();
        prefix.extend_from_slice(br#","body":""#);
        self.out.write_all(&prefix)?;

        self.encoding = Some(if binary {
            BodyEncoding::Base64
        } else {
            BodyEncoding::Text
        });
        debug!(status = head.status, binary, "Committed streamed response");
        Ok(())
    }

    fn write_base64(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.pending.extend_from_slice(bytes);
        let whole = self.pending.len() / 3 * 3;
        if whole > 0 {
            let encoded = STANDARD.encode(&self.pending[..whole]);
            self.out.write_all(encoded.as_bytes())?;
            self.pending.drain(..whole);
        }
        Ok(())
    }
}

impl BodySink for StreamingBody<'_> {
    fn commit(&mut self, head: &ResponseHead) -> io::Result<bool> {
        if self.encoding.is_none() {
            self.open(head, true)?;
        }
        Ok(true)
    }

    fn write_body(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self.encoding {
            Some(BodyEncoding::Text) => self.write_text(bytes),
            Some(BodyEncoding::Base64) => self.write_base64(bytes),
            None => Err(io::Error::other("body written before commit")),
        }
    }

    fn flush_body(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn finish(&mut self, head: &ResponseHead) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        if self.encoding.is_none() {
            self.open(head, false)?;
        }
        let rest = std::mem::take(&mut self.pending);
        match self.encoding {
            Some(BodyEncoding::Base64) if !rest.is_empty() => {
                self.out.write_all(STANDARD.encode(&rest).as_bytes())?;
            }
            Some(BodyEncoding::Text) if !rest.is_empty() => {
                self.write_json_text(&String::from_utf8_lossy(&rest))?;
            }
            _ => {}
        }
        self.out.write_all(br#""}"#)?;
        self.finished = true;
        self.out.flush()
    }
}
