//! Capture session protocol client.
//!
//! Drives the device-side camera service over a forwarded TCP socket:
//! newline-delimited JSON command frames out, tagged response frames
//! (optionally carrying binary image payloads) back. The session issues one
//! logical operation at a time; capture responses are reassembled by the
//! capture multiplexer.

pub mod capture;
pub mod client;
pub mod command;
pub mod error;
pub mod format;
pub mod forward;
pub mod state;
pub mod transport;
pub mod wire;

#[cfg(test)]
mod tests;

pub use capture::Capture;
pub use client::{CameraSession, CaptureOptions, ThreeARequest, ThreeAResult};
pub use command::{CaptureRequest, Command, OutputSurfaceSpec, ReprocessFormat};
pub use error::{ConfigError, ProtocolError, Result, SessionError, TransportError};
pub use format::SurfaceFormat;
pub use forward::{AdbForwarder, PortForwarder, allocate_local_port};
pub use state::SessionState;
pub use transport::{TcpTransport, Transport, TransportConfig};
pub use wire::{FrameReader, ResponseFrame, ResponseHeader};
