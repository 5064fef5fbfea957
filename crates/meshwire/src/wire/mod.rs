// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery wire format.
//!
//! Every datagram starts with a fixed [`Header`]; advertisement and
//! withdrawal kinds append an [`AdvertisementBody`]. The richer
//! [`Publisher`] records travel as opaque payloads of the surrounding
//! transport.
//!
//! # Modules
//!
//! - `cursor` - bounds-checked little-endian readers and writers
//! - `header` - the fixed datagram header and message type codes
//! - `message` - complete datagrams (header + optional body)
//! - `publisher` - message/service publisher records

/// Bounds-checked little-endian readers and writers.
pub mod cursor;
/// Fixed datagram header and message type codes.
pub mod header;
/// Complete datagrams: header plus optional advertisement body.
pub mod message;
/// Message and service publisher records.
pub mod publisher;

pub use header::{Header, MsgType};
pub use message::{AdvertisementBody, DiscoveryMsg};
pub use publisher::{MessagePublisher, Publisher, ServicePublisher};
