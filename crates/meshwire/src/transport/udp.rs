// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP broadcast transport on the fixed discovery port.
//!
//! One socket serves both directions: it is bound to the discovery port
//! with address and port reuse enabled so that several processes on the
//! same host can participate, and it carries the broadcast flag for the
//! outgoing announcements.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use crate::config::{DEF_BROADCAST_ADDR, DISCOVERY_PORT, MAX_DATAGRAM_SIZE};
use crate::error::Result;
use crate::transport::{Datagram, DiscoveryTransport};

/// Broadcast socket shared by the reception worker, the beacons, and the
/// engine's one-shot sends.
pub struct UdpBroadcastTransport {
    socket: UdpSocket,
    /// Destination of every outgoing datagram (broadcast address + port).
    dest: SocketAddr,
    /// Primary non-loopback address of this host.
    host_addr: String,
}

impl UdpBroadcastTransport {
    /// Open the transport on the well-known discovery port.
    pub fn open() -> Result<Self> {
        Self::with_config(DISCOVERY_PORT, DEF_BROADCAST_ADDR)
    }

    /// Open on a custom port and broadcast address. Used by tests to stay
    /// off the well-known port and to loop datagrams through localhost.
    pub fn with_config(port: u16, broadcast_addr: Ipv4Addr) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        // Several discovery participants on one host share the port.
        #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
        socket.set_reuse_port(true)?;
        socket.set_broadcast(true)?;

        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        socket.bind(&bind_addr.into())?;

        let socket: UdpSocket = socket.into();
        let host_addr = detect_host_addr();
        log::debug!(
            "[udp] bound 0.0.0.0:{} broadcast={} host_addr={}",
            port,
            broadcast_addr,
            host_addr
        );

        Ok(Self {
            socket,
            dest: SocketAddr::V4(SocketAddrV4::new(broadcast_addr, port)),
            host_addr,
        })
    }
}

impl DiscoveryTransport for UdpBroadcastTransport {
    fn broadcast(&self, payload: &[u8]) -> Result<()> {
        let sent = self.socket.send_to(payload, self.dest)?;
        log::trace!("[udp] sent {} bytes -> {}", sent, self.dest);
        Ok(())
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Datagram>> {
        // A zero timeout would switch the socket to non-blocking semantics.
        let timeout = timeout.max(Duration::from_millis(1));
        self.socket.set_read_timeout(Some(timeout))?;

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        match self.socket.recv_from(&mut buf) {
            Ok((len, from)) => Ok(Some(Datagram {
                source_ip: from.ip().to_string(),
                payload: buf[..len].to_vec(),
            })),
            Err(err)
                if err.kind() == io::ErrorKind::WouldBlock
                    || err.kind() == io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn local_host_addr(&self) -> &str {
        &self.host_addr
    }
}

/// Primary non-loopback IPv4 address of this host, or loopback when no
/// interface qualifies (isolated machines and sandboxes).
fn detect_host_addr() -> String {
    match local_ip_address::list_afinet_netifas() {
        Ok(interfaces) => {
            for (name, ip) in interfaces {
                if let IpAddr::V4(ipv4) = ip {
                    if !ipv4.is_loopback() {
                        log::debug!("[udp] host address {} (interface {})", ipv4, name);
                        return ipv4.to_string();
                    }
                }
            }
            log::debug!("[udp] no non-loopback interface, using loopback");
            Ipv4Addr::LOCALHOST.to_string()
        }
        Err(err) => {
            log::debug!("[udp] interface enumeration failed: {}", err);
            Ipv4Addr::LOCALHOST.to_string()
        }
    }
}
