// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared vocabulary types: visibility scopes, publisher kinds, and the
//! endpoint payload handed to discovery callbacks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Visibility policy of an advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// Never leaves the owning process.
    Process,
    /// Accepted only from datagrams originating on the local host.
    Host,
    /// Visible to the whole broadcast domain.
    #[default]
    All,
}

impl Scope {
    /// Wire encoding of this scope.
    pub fn as_u8(self) -> u8 {
        match self {
            Scope::Process => 0,
            Scope::Host => 1,
            Scope::All => 2,
        }
    }

    /// Decode a wire scope byte.
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Scope::Process),
            1 => Some(Scope::Host),
            2 => Some(Scope::All),
            _ => None,
        }
    }
}

/// Whether an advertisement names a message topic or an RPC service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherKind {
    /// Message stream topic.
    Msg,
    /// Request/reply service.
    Srv,
}

/// Addressing information delivered to discovery callbacks.
///
/// Disconnection events caused by a peer process vanishing as a whole
/// (farewell datagram or silence expiry) carry empty `topic`, address, and
/// `node_uuid` fields with [`Scope::All`]: only the process UUID is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Topic or service name.
    pub topic: String,
    /// Endpoint the transport connects to for data.
    pub data_addr: String,
    /// Endpoint the transport connects to for control traffic.
    pub ctrl_addr: String,
    /// UUID of the process hosting the node.
    pub process_uuid: String,
    /// UUID of the node within its process.
    pub node_uuid: String,
    /// Visibility scope of the advertisement.
    pub scope: Scope,
}

impl Endpoint {
    /// Event payload for a whole process disappearing: no topic is known,
    /// only the process UUID.
    pub fn process_lost(process_uuid: &str) -> Self {
        Endpoint {
            topic: String::new(),
            data_addr: String::new(),
            ctrl_addr: String::new(),
            process_uuid: process_uuid.to_string(),
            node_uuid: String::new(),
            scope: Scope::All,
        }
    }
}

/// Callback invoked on discovery events.
///
/// Callbacks are dispatched outside the engine lock, so they may call back
/// into the engine.
pub type DiscoveryCallback = Arc<dyn Fn(&Endpoint) + Send + Sync + 'static>;

/// Generate a process UUID for callers that do not bring their own.
///
/// Combines the wall clock, the OS process id, and a per-process counter,
/// which is unique enough to tell apart processes sharing a broadcast
/// domain. Not a cryptographic identifier.
pub fn generate_process_uuid() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let nanos = now.as_nanos() as u64;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);

    format!(
        "{:08x}-{:04x}-{:04x}-{:016x}",
        std::process::id(),
        seq & 0xFFFF,
        (nanos >> 48) as u16,
        nanos
    )
}
