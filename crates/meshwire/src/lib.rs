// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # meshwire - LAN peer discovery
//!
//! Peer discovery for a decentralized publish/subscribe and request/reply
//! transport. Each process broadcasts small UDP datagrams on a fixed port
//! and maintains a live view of which remote processes are alive, which
//! nodes they host, what topics and services those nodes advertise, and
//! the transport endpoints on which to reach them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meshwire::{generate_process_uuid, Discovery, PublisherKind, Scope};
//!
//! fn main() -> meshwire::Result<()> {
//!     let discovery = Discovery::new(&generate_process_uuid(), false)?;
//!
//!     // Announce a topic published by node "n1" of this process.
//!     discovery.advertise(
//!         PublisherKind::Msg,
//!         "/sensors/imu",
//!         "tcp://192.168.1.5:45001",
//!         "tcp://192.168.1.5:45002",
//!         "n1",
//!         Scope::All,
//!     )?;
//!
//!     // React to remote publishers as they appear.
//!     discovery.set_connection_callback(|endpoint| {
//!         println!("found {} at {}", endpoint.topic, endpoint.data_addr);
//!     });
//!     discovery.discover("/camera/front", false);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## How it works
//!
//! ```text
//! +--------------------------------------------------------------+
//! |  process A                         process B                 |
//! |  advertise("/t") --- ADVERTISE --> registry + onConnection   |
//! |  beacon repeats every interval --> (duplicates coalesce)     |
//! |  HELLO heartbeat ----------------> activity table refresh    |
//! |  drop(Discovery) --- BYE --------> onDisconnection           |
//! |  (silence > threshold) ----------> reaped + onDisconnection  |
//! |                    <-- SUBSCRIBE - discover("/t")            |
//! |  one-shot ADVERTISE reply ------->                           |
//! +--------------------------------------------------------------+
//! ```
//!
//! Discovery is best-effort: nothing is acknowledged, and the protocol
//! heals itself through periodic re-announcement and liveness reaping.
//!
//! ## Modules Overview
//!
//! - [`discovery`] - the engine (start here)
//! - [`wire`] - datagram wire format and publisher records
//! - [`registry`] - the address index
//! - [`transport`] - UDP broadcast, in-process bus, repeating beacons
//! - [`config`] - protocol constants and default tunables

/// Protocol constants and default tunables.
pub mod config;
/// The discovery engine: workers, state machine, public API.
pub mod discovery;
/// Error type for discovery operations.
pub mod error;
/// Address registry: topic -> process -> records.
pub mod registry;
/// Datagram transports and repeating beacons.
pub mod transport;
/// Scopes, publisher kinds, callback payloads.
pub mod types;
/// Discovery wire format.
pub mod wire;

pub use discovery::Discovery;
pub use error::{Error, Result};
pub use registry::{AddressBook, AddressRecord};
pub use transport::{
    Beacon, Datagram, DiscoveryTransport, MemoryBus, MemoryTransport, UdpBroadcastTransport,
};
pub use types::{generate_process_uuid, DiscoveryCallback, Endpoint, PublisherKind, Scope};
pub use wire::{
    AdvertisementBody, DiscoveryMsg, Header, MessagePublisher, MsgType, Publisher,
    ServicePublisher,
};

/// meshwire version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
