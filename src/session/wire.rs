//! Frame codec for the camera service protocol.
//!
//! One frame is a UTF-8 JSON object terminated by a single newline. If the
//! object declares `bufValueSize`, exactly that many raw payload bytes
//! follow before the next frame's text begins. Payload bytes are opaque
//! binary data and are never scanned for the newline delimiter.

use std::io::Read;

use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

use crate::session::command::Command;
use crate::session::error::{ProtocolError, Result, TransportError};

const READ_CHUNK: usize = 4096;

/// Parsed text portion of a response frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseHeader {
    pub tag: String,
    #[serde(default)]
    pub buf_value_size: Option<usize>,
    #[serde(default)]
    pub str_value: Option<String>,
    #[serde(default)]
    pub obj_value: Option<Value>,
}

/// One demultiplexable unit from the wire: header plus the binary payload
/// the header declared, if any. A declared size of zero yields an empty
/// payload, not `None`.
#[derive(Debug, Clone)]
pub struct ResponseFrame {
    pub header: ResponseHeader,
    pub payload: Option<Vec<u8>>,
}

impl ResponseFrame {
    pub fn tag(&self) -> &str {
        &self.header.tag
    }

    pub fn payload(&self) -> Result<&[u8]> {
        self.payload
            .as_deref()
            .ok_or_else(|| {
                ProtocolError::MissingField {
                    tag: self.header.tag.clone(),
                    field: "bufValueSize",
                }
                .into()
            })
    }

    pub fn str_value(&self) -> Result<&str> {
        self.header.str_value.as_deref().ok_or_else(|| {
            ProtocolError::MissingField {
                tag: self.header.tag.clone(),
                field: "strValue",
            }
            .into()
        })
    }

    pub fn obj_value(&self) -> Result<&Value> {
        self.header.obj_value.as_ref().ok_or_else(|| {
            ProtocolError::MissingField {
                tag: self.header.tag.clone(),
                field: "objValue",
            }
            .into()
        })
    }
}

/// Serialize a command into its wire frame.
pub fn encode_command(command: &Command) -> Result<Vec<u8>> {
    let mut frame = serde_json::to_vec(command).map_err(ProtocolError::MalformedFrame)?;
    frame.push(b'\n');
    Ok(frame)
}

/// Buffered frame reader over a byte stream.
///
/// Reads in chunks and scans only header bytes for the delimiter, keeping
/// any bytes past the current frame for the next call.
pub struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Read one header line plus its declared payload.
    ///
    /// Fails with [`TransportError::ConnectionClosed`] if the stream ends
    /// before a complete frame was observed; a partial frame is never
    /// returned.
    pub fn read_frame(&mut self) -> Result<ResponseFrame> {
        let line = self.read_header_line()?;
        let header: ResponseHeader =
            serde_json::from_slice(&line).map_err(ProtocolError::MalformedFrame)?;
        trace!(tag = %header.tag, payload = ?header.buf_value_size, "frame header");

        let payload = match header.buf_value_size {
            Some(size) => {
                while self.buf.len() < size {
                    self.fill()?;
                }
                Some(self.buf.drain(..size).collect())
            }
            None => None,
        };
        Ok(ResponseFrame { header, payload })
    }

    fn read_header_line(&mut self) -> Result<Vec<u8>> {
        let mut searched = 0;
        loop {
            if let Some(pos) = self.buf[searched..].iter().position(|&b| b == b'\n') {
                let newline = searched + pos;
                let mut line: Vec<u8> = self.buf.drain(..=newline).collect();
                line.pop();
                return Ok(line);
            }
            searched = self.buf.len();
            self.fill()?;
        }
    }

    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.inner.read(&mut chunk).map_err(|e| match e.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
                TransportError::Timeout
            }
            std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::ConnectionReset => {
                TransportError::ConnectionClosed
            }
            _ => TransportError::Io(e),
        })?;
        if n == 0 {
            return Err(TransportError::ConnectionClosed.into());
        }
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(())
    }
}
