// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global configuration - single source of truth.
//!
//! This module centralizes every protocol constant and default tunable.
//! Never hardcode these values elsewhere.

use std::net::Ipv4Addr;
use std::time::Duration;

// =======================================================================
// Wire protocol
// =======================================================================

/// UDP port shared by every discovery participant on the broadcast domain.
///
/// Compile-time constant: all processes on a subnet must agree on it, so it
/// is deliberately not runtime-configurable.
pub const DISCOVERY_PORT: u16 = 11312;

/// Discovery wire protocol version.
///
/// Carried in the first two bytes of every datagram; receivers drop frames
/// with any other value.
pub const WIRE_VERSION: u16 = 1;

/// Default destination for outgoing discovery datagrams.
pub const DEF_BROADCAST_ADDR: Ipv4Addr = Ipv4Addr::BROADCAST;

/// Receive buffer size for a single discovery datagram.
///
/// Discovery frames carry a handful of length-prefixed strings (UUIDs,
/// topic, two endpoint URIs); 4 KiB leaves ample headroom over any
/// realistic frame while staying well under typical socket buffers.
pub const MAX_DATAGRAM_SIZE: usize = 4096;

// =======================================================================
// Default tunables (milliseconds)
// =======================================================================

/// A process with no datagram received for longer than this is declared
/// dead and reaped by the activity sweep.
pub const DEF_SILENCE_INTERVAL_MS: u64 = 3000;

/// Period of the activity sweep that reaps silent processes.
pub const DEF_ACTIVITY_INTERVAL_MS: u64 = 100;

/// Period at which an advertisement beacon re-broadcasts its record.
pub const DEF_ADVERTISE_INTERVAL_MS: u64 = 1000;

/// Period of the HELLO heartbeat that keeps this process alive on peers.
pub const DEF_HEARTBEAT_INTERVAL_MS: u64 = 1000;

// =======================================================================
// Internal timing
// =======================================================================

/// Reception poll timeout. Bounds how long the reception worker blocks in
/// the listener before re-checking the shutdown flag.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(250);

/// Pause after broadcasting the farewell datagram at shutdown, giving the
/// frame time to leave the host before the socket closes.
pub const SHUTDOWN_LINGER: Duration = Duration::from_millis(100);

/// Granularity of interruptible worker sleeps. Bounds shutdown latency of
/// the heartbeat, sweep, and beacon threads.
pub const SLEEP_CHUNK: Duration = Duration::from_millis(25);
