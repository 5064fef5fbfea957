// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Complete discovery datagrams: header plus optional advertisement body.
//!
//! Advertisement and withdrawal datagrams (`ADVERTISE`, `UNADVERTISE`, and
//! their service twins) append an addressing body after the header:
//!
//! ```text
//! | data_addr_len u64 | data_addr | ctrl_addr_len u64 | ctrl_addr |
//! | node_uuid_len u64 | node_uuid | scope u8 |
//! ```
//!
//! The remaining kinds (`SUBSCRIBE`, `HELLO`, `BYE`) are header-only.

use crate::error::{Error, Result};
use crate::types::Scope;
use crate::wire::cursor::{FrameReader, FrameWriter};
use crate::wire::header::{Header, MsgType};

/// Addressing body of an advertisement or withdrawal datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementBody {
    /// Endpoint the transport connects to for data.
    pub data_addr: String,
    /// Endpoint the transport connects to for control traffic.
    pub ctrl_addr: String,
    /// UUID of the advertising node within its process.
    pub node_uuid: String,
    /// Visibility scope of the advertisement.
    pub scope: Scope,
}

impl AdvertisementBody {
    fn write_into(&self, w: &mut FrameWriter) {
        w.write_str_u64(&self.data_addr);
        w.write_str_u64(&self.ctrl_addr);
        w.write_str_u64(&self.node_uuid);
        w.write_u8(self.scope.as_u8());
    }

    fn read_from(r: &mut FrameReader<'_>) -> Result<Self> {
        let data_addr = r.read_str_u64("data address")?;
        let ctrl_addr = r.read_str_u64("control address")?;
        let node_uuid = r.read_str_u64("node uuid")?;
        let raw_scope = r.read_u8("scope")?;
        let scope = Scope::from_u8(raw_scope)
            .ok_or_else(|| Error::Malformed(format!("unknown scope {}", raw_scope)))?;

        Ok(AdvertisementBody {
            data_addr,
            ctrl_addr,
            node_uuid,
            scope,
        })
    }
}

/// A discovery datagram ready to be packed, or freshly unpacked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryMsg {
    pub header: Header,
    /// Present exactly when `header.msg_type.has_body()`.
    pub body: Option<AdvertisementBody>,
}

impl DiscoveryMsg {
    /// Liveness heartbeat for the given process.
    pub fn hello(process_uuid: &str) -> Self {
        DiscoveryMsg {
            header: Header::new(process_uuid, "", MsgType::Hello),
            body: None,
        }
    }

    /// Farewell announcing the departure of a whole process.
    pub fn bye(process_uuid: &str) -> Self {
        DiscoveryMsg {
            header: Header::new(process_uuid, "", MsgType::Bye),
            body: None,
        }
    }

    /// Discovery request for a topic (`service` selects the RPC variant).
    pub fn subscription(process_uuid: &str, topic: &str, service: bool) -> Self {
        let msg_type = if service { MsgType::SubSrv } else { MsgType::Sub };
        DiscoveryMsg {
            header: Header::new(process_uuid, topic, msg_type),
            body: None,
        }
    }

    /// Advertisement or withdrawal datagram for one (topic, node) record.
    pub fn advertisement(
        msg_type: MsgType,
        process_uuid: &str,
        topic: &str,
        data_addr: &str,
        ctrl_addr: &str,
        node_uuid: &str,
        scope: Scope,
    ) -> Self {
        DiscoveryMsg {
            header: Header::new(process_uuid, topic, msg_type),
            body: Some(AdvertisementBody {
                data_addr: data_addr.to_string(),
                ctrl_addr: ctrl_addr.to_string(),
                node_uuid: node_uuid.to_string(),
                scope,
            }),
        }
    }

    /// Serialize into a wire frame.
    ///
    /// Fails with [`Error::Incomplete`] when the body does not match the
    /// message kind (missing for an advertisement kind, or present for a
    /// header-only kind). No partial frame is produced.
    pub fn pack(&self) -> Result<Vec<u8>> {
        let mut w = FrameWriter::with_capacity(64);
        self.header.write_into(&mut w);

        match (self.header.msg_type.has_body(), &self.body) {
            (true, Some(body)) => body.write_into(&mut w),
            (true, None) => {
                return Err(Error::Incomplete(format!(
                    "{} datagram needs an advertisement body",
                    self.header.msg_type.name()
                )));
            }
            (false, Some(_)) => {
                return Err(Error::Incomplete(format!(
                    "{} datagram does not take a body",
                    self.header.msg_type.name()
                )));
            }
            (false, None) => {}
        }

        Ok(w.into_vec())
    }

    /// Parse a wire frame.
    ///
    /// Fails with [`Error::Malformed`] on short buffers, truncated strings,
    /// unknown type or scope codes, an unsupported wire version, or bytes
    /// trailing the frame.
    pub fn unpack(bytes: &[u8]) -> Result<Self> {
        let mut r = FrameReader::new(bytes);
        let header = Header::read_from(&mut r)?;

        let body = if header.msg_type.has_body() {
            Some(AdvertisementBody::read_from(&mut r)?)
        } else {
            None
        };

        if r.remaining() != 0 {
            return Err(Error::Malformed(format!(
                "{} trailing bytes after {} frame",
                r.remaining(),
                header.msg_type.name()
            )));
        }

        Ok(DiscoveryMsg { header, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_adv(msg_type: MsgType) -> DiscoveryMsg {
        DiscoveryMsg::advertisement(
            msg_type,
            "proc-1111",
            "/telemetry/battery",
            "tcp://10.0.0.7:45100",
            "tcp://10.0.0.7:45101",
            "node-2222",
            Scope::Host,
        )
    }

    #[test]
    fn test_advertisement_kinds_roundtrip() {
        for msg_type in [
            MsgType::Adv,
            MsgType::Unadv,
            MsgType::AdvSrv,
            MsgType::UnadvSrv,
        ] {
            let msg = sample_adv(msg_type);
            let frame = msg.pack().expect("packs");
            let decoded = DiscoveryMsg::unpack(&frame).expect("unpacks");
            assert_eq!(decoded, msg, "kind {:?}", msg_type);
        }
    }

    #[test]
    fn test_header_only_kinds_roundtrip() {
        let msgs = [
            DiscoveryMsg::hello("proc-1111"),
            DiscoveryMsg::bye("proc-1111"),
            DiscoveryMsg::subscription("proc-1111", "/telemetry/battery", false),
            DiscoveryMsg::subscription("proc-1111", "/robot/set_pose", true),
        ];
        for msg in msgs {
            let frame = msg.pack().expect("packs");
            let decoded = DiscoveryMsg::unpack(&frame).expect("unpacks");
            assert_eq!(decoded, msg);
            assert!(decoded.body.is_none());
        }
    }

    #[test]
    fn test_pack_is_stable() {
        // pack(unpack(frame)) reproduces the frame byte for byte.
        let frame = sample_adv(MsgType::Adv).pack().expect("packs");
        let reframed = DiscoveryMsg::unpack(&frame)
            .expect("unpacks")
            .pack()
            .expect("repacks");
        assert_eq!(reframed, frame);
    }

    #[test]
    fn test_missing_body_refused() {
        let msg = DiscoveryMsg {
            header: Header::new("proc-1111", "/t", MsgType::Adv),
            body: None,
        };
        assert!(matches!(msg.pack(), Err(Error::Incomplete(_))));
    }

    #[test]
    fn test_spurious_body_refused() {
        let mut msg = sample_adv(MsgType::Adv);
        msg.header.msg_type = MsgType::Hello;
        assert!(matches!(msg.pack(), Err(Error::Incomplete(_))));
    }

    #[test]
    fn test_truncations_rejected() {
        let frame = sample_adv(MsgType::AdvSrv).pack().expect("packs");
        // Every proper prefix must fail, never panic.
        for cut in 0..frame.len() {
            assert!(DiscoveryMsg::unpack(&frame[..cut]).is_err(), "cut {}", cut);
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut frame = DiscoveryMsg::hello("proc-1111").pack().expect("packs");
        frame.push(0);
        assert!(matches!(
            DiscoveryMsg::unpack(&frame),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_scope_rejected() {
        let frame = sample_adv(MsgType::Adv).pack().expect("packs");
        let mut corrupted = frame.clone();
        let last = corrupted.len() - 1;
        corrupted[last] = 9; // scope byte is the final body byte
        assert!(DiscoveryMsg::unpack(&corrupted).is_err());
    }
}
