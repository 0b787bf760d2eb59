//! TCP transport for the capture session.
//!
//! One session owns one connection and issues synchronous request/response
//! exchanges; suspension happens only in `recv_frame`, bounded by the
//! configured timeout. After a timeout the stream's framing state is
//! indeterminate and the connection must be reopened, not reused.

use std::io::Write;
use std::net::{Ipv4Addr, TcpStream};
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::session::error::{Result, TransportError};
use crate::session::wire::{FrameReader, ResponseFrame};

/// Transport and port-allocation parameters.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Timeout for each socket operation.
    pub base_timeout: Duration,
    /// Extra slack for commands with device-side warm-up work.
    pub extra_timeout: Duration,
    /// Fixed service port on the device.
    pub remote_port: u16,
    /// First local port probed when no forward exists yet.
    pub local_port_start: u16,
    /// Number of candidate local ports.
    pub local_port_count: u16,
    /// Attempts to grab the host-local allocation lock.
    pub lock_retries: u32,
    /// Delay between lock attempts.
    pub lock_backoff: Duration,
    /// Lock file shared by all clients on this host.
    pub lock_path: PathBuf,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_timeout: Duration::from_secs(20),
            extra_timeout: Duration::from_secs(5),
            remote_port: 6000,
            local_port_start: 6000,
            local_port_count: 100,
            lock_retries: 100,
            lock_backoff: Duration::from_millis(50),
            lock_path: std::env::temp_dir().join("camlink-port-lock"),
        }
    }
}

impl TransportConfig {
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct TransportConfigBuilder {
    base_timeout: Option<Duration>,
    extra_timeout: Option<Duration>,
    remote_port: Option<u16>,
    local_port_start: Option<u16>,
    local_port_count: Option<u16>,
    lock_path: Option<PathBuf>,
}

impl TransportConfigBuilder {
    pub fn base_timeout(mut self, timeout: Duration) -> Self {
        self.base_timeout = Some(timeout);
        self
    }

    pub fn extra_timeout(mut self, timeout: Duration) -> Self {
        self.extra_timeout = Some(timeout);
        self
    }

    pub fn remote_port(mut self, port: u16) -> Self {
        self.remote_port = Some(port);
        self
    }

    pub fn local_port_range(mut self, start: u16, count: u16) -> Self {
        self.local_port_start = Some(start);
        self.local_port_count = Some(count);
        self
    }

    pub fn lock_path(mut self, path: PathBuf) -> Self {
        self.lock_path = Some(path);
        self
    }

    pub fn build(self) -> TransportConfig {
        let default = TransportConfig::default();
        TransportConfig {
            base_timeout: self.base_timeout.unwrap_or(default.base_timeout),
            extra_timeout: self.extra_timeout.unwrap_or(default.extra_timeout),
            remote_port: self.remote_port.unwrap_or(default.remote_port),
            local_port_start: self.local_port_start.unwrap_or(default.local_port_start),
            local_port_count: self.local_port_count.unwrap_or(default.local_port_count),
            lock_retries: default.lock_retries,
            lock_backoff: default.lock_backoff,
            lock_path: self.lock_path.unwrap_or(default.lock_path),
        }
    }
}

/// Frame-level connection to the device service.
///
/// The trait is the seam between the session logic and the socket, so the
/// capture multiplexer and 3A loop can be driven by a scripted transport
/// in tests.
pub trait Transport {
    fn send_frame(&mut self, frame: &[u8]) -> Result<()>;

    /// Receive one complete frame, blocking up to the current timeout.
    fn recv_frame(&mut self) -> Result<ResponseFrame>;

    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    fn timeout(&self) -> Duration;
}

/// The real transport: one TCP connection to a locally forwarded port.
pub struct TcpTransport {
    reader: FrameReader<TcpStream>,
    writer: TcpStream,
    timeout: Duration,
}

impl TcpTransport {
    /// Connect to the forwarded local port for this device.
    pub fn connect(local_port: u16, config: &TransportConfig) -> Result<Self> {
        debug!(local_port, "connecting to forwarded service port");
        let stream = TcpStream::connect((Ipv4Addr::LOCALHOST, local_port))
            .map_err(TransportError::Io)?;
        stream
            .set_read_timeout(Some(config.base_timeout))
            .map_err(TransportError::Io)?;
        let writer = stream.try_clone().map_err(TransportError::Io)?;
        Ok(Self {
            reader: FrameReader::new(stream),
            writer,
            timeout: config.base_timeout,
        })
    }
}

impl Transport for TcpTransport {
    fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.writer.write_all(frame).map_err(TransportError::Io)?;
        self.writer.flush().map_err(TransportError::Io)?;
        Ok(())
    }

    fn recv_frame(&mut self) -> Result<ResponseFrame> {
        self.reader.read_frame()
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.reader
            .get_ref()
            .set_read_timeout(Some(timeout))
            .map_err(TransportError::Io)?;
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
