// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed header carried by every discovery datagram.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! | version u16 | puuid_len u64 | puuid bytes | topic_len u16 | topic bytes |
//! | type u8 | flags u16 |
//! ```

use crate::config::WIRE_VERSION;
use crate::error::{Error, Result};
use crate::wire::cursor::{FrameReader, FrameWriter};

/// Discovery message kinds and their wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    /// Topic advertisement (carries an advertisement body).
    Adv = 1,
    /// Topic discovery request.
    Sub = 2,
    /// Topic withdrawal (carries an advertisement body).
    Unadv = 3,
    /// Liveness heartbeat.
    Hello = 4,
    /// Graceful departure of a whole process.
    Bye = 5,
    /// Service advertisement (carries an advertisement body).
    AdvSrv = 6,
    /// Service discovery request.
    SubSrv = 7,
    /// Service withdrawal (carries an advertisement body).
    UnadvSrv = 8,
}

impl MsgType {
    /// Decode a wire type code.
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(MsgType::Adv),
            2 => Some(MsgType::Sub),
            3 => Some(MsgType::Unadv),
            4 => Some(MsgType::Hello),
            5 => Some(MsgType::Bye),
            6 => Some(MsgType::AdvSrv),
            7 => Some(MsgType::SubSrv),
            8 => Some(MsgType::UnadvSrv),
            _ => None,
        }
    }

    /// Whether datagrams of this kind carry an advertisement body.
    pub fn has_body(self) -> bool {
        matches!(
            self,
            MsgType::Adv | MsgType::Unadv | MsgType::AdvSrv | MsgType::UnadvSrv
        )
    }

    /// Short name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            MsgType::Adv => "ADVERTISE",
            MsgType::Sub => "SUBSCRIBE",
            MsgType::Unadv => "UNADVERTISE",
            MsgType::Hello => "HELLO",
            MsgType::Bye => "BYE",
            MsgType::AdvSrv => "ADVERTISE_SRV",
            MsgType::SubSrv => "SUBSCRIBE_SRV",
            MsgType::UnadvSrv => "UNADVERTISE_SRV",
        }
    }
}

/// Header present on every discovery datagram.
///
/// The wire version is not stored: the encoder always writes
/// [`WIRE_VERSION`] and the decoder rejects anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// UUID of the sending process.
    pub process_uuid: String,
    /// Topic this datagram refers to; empty for HELLO and BYE.
    pub topic: String,
    /// Message kind.
    pub msg_type: MsgType,
    /// Reserved; always zero on this protocol version.
    pub flags: u16,
}

impl Header {
    pub fn new(process_uuid: &str, topic: &str, msg_type: MsgType) -> Self {
        Header {
            process_uuid: process_uuid.to_string(),
            topic: topic.to_string(),
            msg_type,
            flags: 0,
        }
    }

    pub(crate) fn write_into(&self, w: &mut FrameWriter) {
        w.write_u16_le(WIRE_VERSION);
        w.write_str_u64(&self.process_uuid);
        w.write_str_u16(&self.topic);
        w.write_u8(self.msg_type as u8);
        w.write_u16_le(self.flags);
    }

    pub(crate) fn read_from(r: &mut FrameReader<'_>) -> Result<Self> {
        let version = r.read_u16_le("version")?;
        if version != WIRE_VERSION {
            return Err(Error::Malformed(format!(
                "unsupported wire version {} (expected {})",
                version, WIRE_VERSION
            )));
        }

        let process_uuid = r.read_str_u64("process uuid")?;
        let topic = r.read_str_u16("topic")?;
        let raw_type = r.read_u8("message type")?;
        let msg_type = MsgType::from_u8(raw_type)
            .ok_or_else(|| Error::Malformed(format!("unknown message type {}", raw_type)))?;
        let flags = r.read_u16_le("flags")?;

        Ok(Header {
            process_uuid,
            topic,
            msg_type,
            flags,
        })
    }
}
