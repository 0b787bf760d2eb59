//! Error taxonomy for the capture session protocol.
//!
//! Transport failures leave the socket in an unknown framing state: the
//! connection must be torn down and reopened. Protocol failures are fatal to
//! the current operation but the connection may be reused since framing was
//! not corrupted. Configuration failures are rejected before anything is
//! sent. None of these are retried inside the client.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("socket operation timed out")]
    Timeout,

    #[error("port forwarding failed: {0}")]
    Forward(String),

    #[error("no local port available to forward to the device")]
    NoPortAvailable,

    #[error("could not acquire the host-local port allocation lock")]
    LockUnavailable,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("unexpected response tag: expected {expected}, got {actual}")]
    UnexpectedTag { expected: String, actual: String },

    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    #[error("response {tag} is missing {field}")]
    MissingField { tag: String, field: &'static str },

    #[error("could not parse {tag} values from {values:?}")]
    MalformedValues { tag: String, values: String },

    #[error("image buffer {tag} does not match any requested surface")]
    UnroutableBuffer { tag: String },

    #[error("received more than {expected} buffers for {tag}")]
    ExcessBuffers { tag: String, expected: usize },

    #[error("capture ended with inconsistent buffer accounting for {tag}")]
    BufferAccounting { tag: String },

    #[error(
        "surface {index} ({format}): requested {requested_width}x{requested_height}, \
         device delivered {actual_width}x{actual_height}"
    )]
    SizeMismatch {
        index: usize,
        format: String,
        requested_width: u32,
        requested_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("3A did not converge: {0}")]
    ConvergenceFailed(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("duplicate {format} surface for camera {camera}")]
    DuplicateFormat { format: String, camera: String },

    #[error("two yuv surfaces of {bytes} bytes on camera {camera} cannot be told apart")]
    AmbiguousYuvSize { bytes: usize, camera: String },

    #[error("at most one raw output format is allowed per request")]
    ConflictingRawFormats,

    #[error("{physical} is not a physical sub-camera of {logical}")]
    InvalidSubCamera { physical: String, logical: String },

    #[error("zoom ratio {0} outside device range")]
    ZoomRatioOutOfRange(f64),

    #[error("unsupported request combination: {0}")]
    UnsupportedCombination(&'static str),

    #[error("camera properties required but not fetched yet")]
    MissingProperties,
}

/// Umbrella error surfaced by session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Protocol(ProtocolError::MalformedFrame(err))
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
