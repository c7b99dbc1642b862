//! OS-level port availability probing.

use crate::error::{Error, Result};
use crate::model::Protocol;
use std::net::{TcpListener, UdpSocket};

/// Probes the host's network stack for port availability by attempting a
/// bind. Asking the OS directly is more reliable than parsing `/proc/net`
/// or shelling `lsof`, and needs no elevated permissions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortScanner;

impl PortScanner {
    pub fn new() -> Self {
        PortScanner
    }

    /// Check whether a port is free for the given protocol.
    ///
    /// TCP binds a stream listener, UDP a packet socket. Docker publishes on
    /// 0.0.0.0, but on macOS a 127.0.0.1 bind can succeed while 0.0.0.0 is
    /// taken, so both addresses are probed. The probe sockets are dropped
    /// (closed) immediately.
    pub fn is_available(&self, port: u16, protocol: Protocol) -> bool {
        match protocol {
            Protocol::Tcp => {
                TcpListener::bind(("0.0.0.0", port)).is_ok()
                    && TcpListener::bind(("127.0.0.1", port)).is_ok()
            }
            Protocol::Udp => {
                UdpSocket::bind(("0.0.0.0", port)).is_ok()
                    && UdpSocket::bind(("127.0.0.1", port)).is_ok()
            }
        }
    }

    /// First available port in `[start, end]`, scanning upward. The
    /// deterministic order makes repeated runs pick the same port.
    pub fn find_available(&self, start: u16, end: u16, protocol: Protocol) -> Result<u16> {
        for port in start..=end {
            if self.is_available(port, protocol) {
                return Ok(port);
            }
        }
        Err(Error::PortAllocation(format!(
            "no available {protocol} port found in range {start}-{end}"
        )))
    }

    /// Ports in `[start, end]` that fail the TCP availability check.
    /// Diagnostics only (surfaced by `doctor`).
    pub fn used_ports(&self, start: u16, end: u16) -> Vec<u16> {
        (start..=end)
            .filter(|&port| !self.is_available(port, Protocol::Tcp))
            .collect()
    }
}
