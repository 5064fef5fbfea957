// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Length-prefixed publisher records exchanged by the surrounding
//! transport.
//!
//! These records describe a publishing endpoint in more detail than the
//! discovery body: message publishers add a control endpoint and the
//! message type name, service publishers a socket id and the request and
//! response type names. The discovery engine itself treats them opaquely.
//!
//! The process UUID travels in the discovery header and is therefore not
//! repeated in the record bytes; `unpack` leaves the field empty for the
//! caller to fill in from the header.

use crate::error::{Error, Result};
use crate::types::Scope;
use crate::wire::cursor::{FrameReader, FrameWriter};

/// Common part of every publisher record.
///
/// Wire layout: `u64 topic_len | topic | u64 addr_len | addr |
/// u64 node_uuid_len | node_uuid | u8 scope`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Publisher {
    pub topic: String,
    /// Endpoint the transport connects to for data.
    pub addr: String,
    /// Not serialized; carried by the discovery header.
    pub process_uuid: String,
    pub node_uuid: String,
    pub scope: Scope,
}

impl Publisher {
    pub fn new(topic: &str, addr: &str, process_uuid: &str, node_uuid: &str, scope: Scope) -> Self {
        Publisher {
            topic: topic.to_string(),
            addr: addr.to_string(),
            process_uuid: process_uuid.to_string(),
            node_uuid: node_uuid.to_string(),
            scope,
        }
    }

    /// Serialized size of this record in bytes.
    pub fn encoded_len(&self) -> usize {
        8 + self.topic.len() + 8 + self.addr.len() + 8 + self.node_uuid.len() + 1
    }

    /// Serialize; refuses an incomplete record without producing bytes.
    pub fn pack(&self) -> Result<Vec<u8>> {
        let mut w = FrameWriter::with_capacity(self.encoded_len());
        self.write_into(&mut w)?;
        Ok(w.into_vec())
    }

    /// Parse a record; the process UUID field is left empty.
    pub fn unpack(bytes: &[u8]) -> Result<Self> {
        let mut r = FrameReader::new(bytes);
        let publisher = Self::read_from(&mut r)?;
        reject_trailing(&r, "publisher")?;
        Ok(publisher)
    }

    fn check_complete(&self) -> Result<()> {
        if self.topic.is_empty() || self.addr.is_empty() || self.node_uuid.is_empty() {
            return Err(Error::Incomplete(
                "publisher needs a topic, an address, and a node uuid".into(),
            ));
        }
        Ok(())
    }

    fn write_into(&self, w: &mut FrameWriter) -> Result<()> {
        self.check_complete()?;
        w.write_str_u64(&self.topic);
        w.write_str_u64(&self.addr);
        w.write_str_u64(&self.node_uuid);
        w.write_u8(self.scope.as_u8());
        Ok(())
    }

    fn read_from(r: &mut FrameReader<'_>) -> Result<Self> {
        let topic = r.read_str_u64("topic")?;
        let addr = r.read_str_u64("address")?;
        let node_uuid = r.read_str_u64("node uuid")?;
        let raw_scope = r.read_u8("scope")?;
        let scope = Scope::from_u8(raw_scope)
            .ok_or_else(|| Error::Malformed(format!("unknown scope {}", raw_scope)))?;

        Ok(Publisher {
            topic,
            addr,
            process_uuid: String::new(),
            node_uuid,
            scope,
        })
    }
}

/// Publisher record for a message topic.
///
/// Appends `u64 ctrl_len | ctrl | u64 type_name_len | type_name` to the
/// common record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessagePublisher {
    pub publisher: Publisher,
    /// Endpoint the transport connects to for control traffic.
    pub ctrl_addr: String,
    /// Fully qualified name of the message type.
    pub msg_type_name: String,
}

impl MessagePublisher {
    pub fn encoded_len(&self) -> usize {
        self.publisher.encoded_len() + 8 + self.ctrl_addr.len() + 8 + self.msg_type_name.len()
    }

    pub fn pack(&self) -> Result<Vec<u8>> {
        if self.ctrl_addr.is_empty() || self.msg_type_name.is_empty() {
            return Err(Error::Incomplete(
                "message publisher needs a control address and a message type name".into(),
            ));
        }

        let mut w = FrameWriter::with_capacity(self.encoded_len());
        self.publisher.write_into(&mut w)?;
        w.write_str_u64(&self.ctrl_addr);
        w.write_str_u64(&self.msg_type_name);
        Ok(w.into_vec())
    }

    pub fn unpack(bytes: &[u8]) -> Result<Self> {
        let mut r = FrameReader::new(bytes);
        let publisher = Publisher::read_from(&mut r)?;
        let ctrl_addr = r.read_str_u64("control address")?;
        let msg_type_name = r.read_str_u64("message type name")?;
        reject_trailing(&r, "message publisher")?;

        Ok(MessagePublisher {
            publisher,
            ctrl_addr,
            msg_type_name,
        })
    }
}

/// Publisher record for an RPC service.
///
/// Appends `u64 socket_id_len | socket_id | u64 req_type_len | req_type |
/// u64 rep_type_len | rep_type` to the common record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServicePublisher {
    pub publisher: Publisher,
    /// Identity of the responder socket the requester dials.
    pub socket_id: String,
    /// Fully qualified name of the request type.
    pub req_type_name: String,
    /// Fully qualified name of the response type.
    pub rep_type_name: String,
}

impl ServicePublisher {
    pub fn encoded_len(&self) -> usize {
        self.publisher.encoded_len()
            + 8
            + self.socket_id.len()
            + 8
            + self.req_type_name.len()
            + 8
            + self.rep_type_name.len()
    }

    pub fn pack(&self) -> Result<Vec<u8>> {
        if self.socket_id.is_empty()
            || self.req_type_name.is_empty()
            || self.rep_type_name.is_empty()
        {
            return Err(Error::Incomplete(
                "service publisher needs a socket id and request/response type names".into(),
            ));
        }

        let mut w = FrameWriter::with_capacity(self.encoded_len());
        self.publisher.write_into(&mut w)?;
        w.write_str_u64(&self.socket_id);
        w.write_str_u64(&self.req_type_name);
        w.write_str_u64(&self.rep_type_name);
        Ok(w.into_vec())
    }

    pub fn unpack(bytes: &[u8]) -> Result<Self> {
        let mut r = FrameReader::new(bytes);
        let publisher = Publisher::read_from(&mut r)?;
        let socket_id = r.read_str_u64("socket id")?;
        let req_type_name = r.read_str_u64("request type name")?;
        let rep_type_name = r.read_str_u64("response type name")?;
        reject_trailing(&r, "service publisher")?;

        Ok(ServicePublisher {
            publisher,
            socket_id,
            req_type_name,
            rep_type_name,
        })
    }
}

fn reject_trailing(r: &FrameReader<'_>, what: &str) -> Result<()> {
    if r.remaining() != 0 {
        return Err(Error::Malformed(format!(
            "{} trailing bytes after {} record",
            r.remaining(),
            what
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Publisher {
        Publisher::new(
            "/fleet/pose",
            "tcp://10.1.2.3:46000",
            "proc-3333",
            "node-4444",
            Scope::All,
        )
    }

    #[test]
    fn test_publisher_roundtrip_drops_process_uuid() {
        let record = base();
        let bytes = record.pack().expect("packs");
        assert_eq!(bytes.len(), record.encoded_len());

        let decoded = Publisher::unpack(&bytes).expect("unpacks");
        // The process UUID travels in the header, not the record.
        assert!(decoded.process_uuid.is_empty());
        assert_eq!(decoded.topic, record.topic);
        assert_eq!(decoded.addr, record.addr);
        assert_eq!(decoded.node_uuid, record.node_uuid);
        assert_eq!(decoded.scope, record.scope);
    }

    #[test]
    fn test_publisher_incomplete_refused() {
        let mut record = base();
        record.topic.clear();
        assert!(matches!(record.pack(), Err(Error::Incomplete(_))));

        let mut record = base();
        record.addr.clear();
        assert!(matches!(record.pack(), Err(Error::Incomplete(_))));

        let mut record = base();
        record.node_uuid.clear();
        assert!(matches!(record.pack(), Err(Error::Incomplete(_))));
    }

    #[test]
    fn test_message_publisher_roundtrip() {
        let record = MessagePublisher {
            publisher: base(),
            ctrl_addr: "tcp://10.1.2.3:46001".into(),
            msg_type_name: "fleet.msgs.Pose".into(),
        };
        let bytes = record.pack().expect("packs");
        assert_eq!(bytes.len(), record.encoded_len());

        let decoded = MessagePublisher::unpack(&bytes).expect("unpacks");
        assert_eq!(decoded.ctrl_addr, record.ctrl_addr);
        assert_eq!(decoded.msg_type_name, record.msg_type_name);
        assert_eq!(decoded.publisher.topic, record.publisher.topic);
    }

    #[test]
    fn test_message_publisher_incomplete_refused() {
        let record = MessagePublisher {
            publisher: base(),
            ctrl_addr: String::new(),
            msg_type_name: "fleet.msgs.Pose".into(),
        };
        assert!(matches!(record.pack(), Err(Error::Incomplete(_))));

        let record = MessagePublisher {
            publisher: base(),
            ctrl_addr: "tcp://10.1.2.3:46001".into(),
            msg_type_name: String::new(),
        };
        assert!(matches!(record.pack(), Err(Error::Incomplete(_))));
    }

    #[test]
    fn test_service_publisher_roundtrip() {
        let record = ServicePublisher {
            publisher: base(),
            socket_id: "responder-7".into(),
            req_type_name: "fleet.srv.SetPoseRequest".into(),
            rep_type_name: "fleet.srv.SetPoseReply".into(),
        };
        let bytes = record.pack().expect("packs");
        assert_eq!(bytes.len(), record.encoded_len());

        let decoded = ServicePublisher::unpack(&bytes).expect("unpacks");
        assert_eq!(decoded.socket_id, record.socket_id);
        assert_eq!(decoded.req_type_name, record.req_type_name);
        assert_eq!(decoded.rep_type_name, record.rep_type_name);
    }

    #[test]
    fn test_service_publisher_incomplete_refused() {
        let record = ServicePublisher {
            publisher: base(),
            socket_id: String::new(),
            req_type_name: "req".into(),
            rep_type_name: "rep".into(),
        };
        assert!(matches!(record.pack(), Err(Error::Incomplete(_))));
    }

    #[test]
    fn test_truncated_records_rejected() {
        let bytes = MessagePublisher {
            publisher: base(),
            ctrl_addr: "tcp://10.1.2.3:46001".into(),
            msg_type_name: "fleet.msgs.Pose".into(),
        }
        .pack()
        .expect("packs");

        for cut in [0, 7, 8, bytes.len() / 2, bytes.len() - 1] {
            assert!(MessagePublisher::unpack(&bytes[..cut]).is_err(), "cut {}", cut);
        }
    }
}
