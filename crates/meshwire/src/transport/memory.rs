// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process broadcast bus.
//!
//! Models a broadcast domain inside one process: every datagram sent by
//! any endpoint is delivered to all endpoints, the sender included, each
//! tagged with the sender's configured host address. The scenario tests
//! run whole discovery engines over this transport, and simulations can
//! use it to wire several engines together without touching the network.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::error::Result;
use crate::transport::{Datagram, DiscoveryTransport};

/// A simulated broadcast domain. Create endpoints with
/// [`MemoryBus::endpoint`]; dropping an endpoint detaches it from the bus.
#[derive(Default)]
pub struct MemoryBus {
    endpoints: Mutex<Vec<Sender<Datagram>>>,
}

impl MemoryBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a new endpoint that claims to live on `host_addr`.
    ///
    /// Endpoints on the same simulated host share the address string,
    /// which is what host-scope filtering compares.
    pub fn endpoint(self: &Arc<Self>, host_addr: &str) -> MemoryTransport {
        let (tx, rx) = mpsc::channel();
        self.endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);

        MemoryTransport {
            bus: Arc::clone(self),
            host_addr: host_addr.to_string(),
            rx: Mutex::new(rx),
        }
    }

    fn deliver(&self, datagram: &Datagram) {
        let mut endpoints = self
            .endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Dropped endpoints are pruned as their channels disconnect.
        endpoints.retain(|tx| tx.send(datagram.clone()).is_ok());
    }
}

/// One endpoint of a [`MemoryBus`].
pub struct MemoryTransport {
    bus: Arc<MemoryBus>,
    host_addr: String,
    rx: Mutex<Receiver<Datagram>>,
}

impl DiscoveryTransport for MemoryTransport {
    fn broadcast(&self, payload: &[u8]) -> Result<()> {
        self.bus.deliver(&Datagram {
            source_ip: self.host_addr.clone(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Datagram>> {
        let rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        match rx.recv_timeout(timeout) {
            Ok(datagram) => Ok(Some(datagram)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    fn local_host_addr(&self) -> &str {
        &self.host_addr
    }
}
