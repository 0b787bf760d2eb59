//! Host-to-device port forwarding and local port allocation.
//!
//! Every session needs a local TCP port forwarded to the fixed service port
//! on its device. If a forward already exists for the device it is reused;
//! otherwise a bounded range of candidate ports is probed and the first one
//! for which the forwarding tool succeeds is claimed. Concurrent client
//! processes on one host serialize the negotiation through an atomically
//! created lock file. The lock is advisory between cooperating processes
//! only and carries no protocol traffic.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::Command as ProcessCommand;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::session::error::{Result, TransportError};
use crate::session::transport::TransportConfig;

/// Locks considered abandoned after this age are broken.
const LOCK_STALE_AFTER: Duration = Duration::from_secs(10);

/// One existing host-to-device forward mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardEntry {
    pub serial: String,
    pub local_port: u16,
    pub remote_port: u16,
}

/// Seam over the host's forwarding tool.
pub trait PortForwarder {
    /// All forward mappings currently established on this host.
    fn list(&self) -> Result<Vec<ForwardEntry>>;

    /// Try to establish a forward; `false` means the tool refused the port.
    fn forward(&self, local_port: u16, remote_port: u16) -> Result<bool>;
}

/// Port forwarding through the `adb` command-line tool.
pub struct AdbForwarder {
    serial: String,
}

impl AdbForwarder {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
        }
    }
}

impl PortForwarder for AdbForwarder {
    fn list(&self) -> Result<Vec<ForwardEntry>> {
        let output = ProcessCommand::new("adb")
            .args(["forward", "--list"])
            .output()
            .map_err(|e| TransportError::Forward(format!("adb forward --list: {e}")))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut entries = Vec::new();
        for line in stdout.lines() {
            // "<serial> tcp:<local> tcp:<remote>"
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 {
                continue;
            }
            let (Some(local), Some(remote)) = (
                fields[1].strip_prefix("tcp:").and_then(|p| p.parse().ok()),
                fields[2].strip_prefix("tcp:").and_then(|p| p.parse().ok()),
            ) else {
                continue;
            };
            entries.push(ForwardEntry {
                serial: fields[0].to_owned(),
                local_port: local,
                remote_port: remote,
            });
        }
        Ok(entries)
    }

    fn forward(&self, local_port: u16, remote_port: u16) -> Result<bool> {
        let output = ProcessCommand::new("adb")
            .args([
                "-s",
                &self.serial,
                "forward",
                &format!("tcp:{local_port}"),
                &format!("tcp:{remote_port}"),
            ])
            .output()
            .map_err(|e| TransportError::Forward(format!("adb forward: {e}")))?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(output.status.success() && !stderr.contains("error"))
    }
}

/// Held for the duration of a port negotiation; releasing is dropping.
struct PortLock {
    path: PathBuf,
}

impl PortLock {
    fn acquire(config: &TransportConfig) -> Result<Self> {
        for _ in 0..config.lock_retries {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&config.lock_path)
            {
                Ok(_) => {
                    return Ok(Self {
                        path: config.lock_path.clone(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if lock_is_stale(&config.lock_path) {
                        warn!(path = %config.lock_path.display(), "breaking stale port lock");
                        let _ = std::fs::remove_file(&config.lock_path);
                        continue;
                    }
                    std::thread::sleep(config.lock_backoff);
                }
                Err(e) => return Err(TransportError::Io(e).into()),
            }
        }
        Err(TransportError::LockUnavailable.into())
    }
}

impl Drop for PortLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn lock_is_stale(path: &std::path::Path) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .map(|age| age > LOCK_STALE_AFTER)
        .unwrap_or(false)
}

/// Secure a local port forwarded to the device's service port.
///
/// Reuses an existing mapping for this device when one exists; otherwise
/// probes the configured candidate range and claims the first port the
/// forwarder accepts.
pub fn allocate_local_port(
    forwarder: &dyn PortForwarder,
    serial: &str,
    config: &TransportConfig,
) -> Result<u16> {
    let _lock = PortLock::acquire(config)?;

    let mut used = HashSet::new();
    for entry in forwarder.list()? {
        if entry.serial == serial && entry.remote_port == config.remote_port {
            debug!(port = entry.local_port, "reusing existing forward");
            return Ok(entry.local_port);
        }
        used.insert(entry.local_port);
    }

    let start = config.local_port_start;
    for port in start..start.saturating_add(config.local_port_count) {
        if used.contains(&port) {
            continue;
        }
        if forwarder.forward(port, config.remote_port)? {
            info!(port, serial, "claimed forwarded port");
            return Ok(port);
        }
    }
    Err(TransportError::NoPortAvailable.into())
}
