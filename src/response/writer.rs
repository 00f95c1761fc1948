//! The response object handed to downstream handlers.

use lambda_runtime::tracing::warn;
use std::io::{self, Write};

use crate::config::{ContainerConfig, is_text_content_type};
use crate::cookie::Cookie;
use crate::multimap::MultiValueMap;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const SET_COOKIE: &str = "Set-Cookie";

/// Everything about a response except its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: MultiValueMap,
    pub cookies: Vec<Cookie>,
    /// Set by the handler to force a base64-encoded body.
    pub binary: bool,
}

impl Default for ResponseHead {
    fn default() -> Self {
        Self {
            status: 200,
            headers: MultiValueMap::headers(),
            cookies: Vec::new(),
            binary: false,
        }
    }
}

impl ResponseHead {
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.first(CONTENT_TYPE)
    }

    /// Headers as sent on the wire: the handler's headers followed by one
    /// `Set-Cookie` value per cookie.
    #[must_use]
    pub fn wire_headers(&self) -> MultiValueMap {
        let mut headers = self.headers.clone();
        for cookie in &self.cookies {
            headers.add(SET_COOKIE, cookie.to_set_cookie());
        }
        headers
    }

    /// Whether the body goes out base64-encoded, judged from the head alone:
    /// the handler marked it binary, or its content type is a configured
    /// binary type or not textual at all. A missing content type is left to
    /// the caller.
    #[must_use]
    pub fn is_binary(&self, config: &ContainerConfig) -> bool {
        self.binary
            || self.content_type().is_some_and(|ct| {
                config.is_binary_content_type(ct) || !is_text_content_type(ct)
            })
    }
}

/// Destination of response body bytes.
///
/// The buffered backend keeps bytes in memory until the container builds the
/// response event. The streaming backend writes the serialized event as the
/// handler produces the body.
pub trait BodySink {
    /// Called before the first body byte is written and on explicit flushes.
    /// Returns `true` once the head has been sent and can no longer change.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying output.
    fn commit(&mut self, head: &ResponseHead) -> io::Result<bool>;

    /// # Errors
    ///
    /// Returns any error from the underlying output.
    fn write_body(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// # Errors
    ///
    /// Returns any error from the underlying output.
    fn flush_body(&mut self) -> io::Result<()>;

    /// Completes the body. Commits `head` first if nothing was written yet.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying output.
    fn finish(&mut self, head: &ResponseHead) -> io::Result<()>;
}

/// In-memory body.
#[derive(Debug, Default)]
pub struct BufferedBody {
    bytes: Vec<u8>,
}

impl BufferedBody {
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl BodySink for BufferedBody {
    fn commit(&mut self, _head: &ResponseHead) -> io::Result<bool> {
        Ok(false)
    }

    fn write_body(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }

    fn flush_body(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn finish(&mut self, _head: &ResponseHead) -> io::Result<()> {
        Ok(())
    }
}

/// Captures the status, headers, cookies and body a handler produces for a
/// single invocation.
///
/// Once a streaming sink has committed the head, later status, header and
/// cookie changes are dropped with a warning.
pub struct ResponseWriter<'a> {
    head: ResponseHead,
    sink: &'a mut dyn BodySink,
    config: &'a ContainerConfig,
    committed: bool,
}

impl<'a> ResponseWriter<'a> {
    pub fn new(sink: &'a mut dyn BodySink, config: &'a ContainerConfig) -> Self {
        Self {
            head: ResponseHead::default(),
            sink,
            config,
            committed: false,
        }
    }

    fn head_mut(&mut self, operation: &str) -> Option<&mut ResponseHead> {
        if self.committed {
            warn!(operation, "Response already committed, ignoring change");
            None
        } else {
            Some(&mut self.head)
        }
    }

    #[must_use]
    pub const fn status(&self) -> u16 {
        self.head.status
    }

    /// Overwrites the status code.
    pub fn set_status(&mut self, status: u16) {
        if let Some(head) = self.head_mut("set_status") {
            head.status = status;
        }
    }

    /// Adds a header value, keeping earlier values for the same name.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        if let Some(head) = self.head_mut("add_header") {
            head.headers.add(name, value);
        }
    }

    /// Replaces every value of a header.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        if let Some(head) = self.head_mut("set_header") {
            head.headers.set(name, value);
        }
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.first(name)
    }

    #[must_use]
    pub const fn headers(&self) -> &MultiValueMap {
        &self.head.headers
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.set_header(CONTENT_TYPE, content_type);
    }

    /// Appends a cookie. Cookies with the same name are all kept.
    pub fn add_cookie(&mut self, cookie: Cookie) {
        if let Some(head) = self.head_mut("add_cookie") {
            head.cookies.push(cookie);
        }
    }

    #[must_use]
    pub fn cookies(&self) -> &[Cookie] {
        &self.head.cookies
    }

    /// Forces the body to be sent base64-encoded.
    pub fn mark_binary(&mut self) {
        if let Some(head) = self.head_mut("mark_binary") {
            head.binary = true;
        }
    }

    #[must_use]
    pub const fn is_committed(&self) -> bool {
        self.committed
    }

    fn commit(&mut self) -> io::Result<()> {
        if !self.committed {
            self.committed = self.sink.commit(&self.head)?;
        }
        Ok(())
    }

    /// Appends body bytes, or streams them out when the sink streams.
    ///
    /// # Errors
    ///
    /// Returns any error from the output sink.
    pub fn write_body(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        if !self.committed && self.head.content_type().is_none() {
            self.head
                .headers
                .set(CONTENT_TYPE, self.config.default_content_type.clone());
        }
        self.commit()?;
        self.sink.write_body(bytes)
    }

    /// # Errors
    ///
    /// Returns any error from the output sink.
    pub fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.write_body(text.as_bytes())
    }

    /// Commits the head and flushes written bytes to the sink.
    ///
    /// # Errors
    ///
    /// Returns any error from the output sink.
    pub fn flush_body(&mut self) -> io::Result<()> {
        self.commit()?;
        self.sink.flush_body()
    }

    /// Ends the handler's access to the response.
    #[must_use]
    pub fn into_head(self) -> ResponseHead {
        self.head
    }
}

impl Write for ResponseWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_body(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_body()
    }
}
