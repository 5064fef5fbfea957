// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory index of advertised addresses.
//!
//! Maps `topic -> process UUID -> ordered address records`. The engine
//! holds one of these behind its mutex; the operations here are pure data
//! structure work with no locking or I/O of their own.

use std::collections::HashMap;

use crate::types::Scope;

/// One advertised (topic, node) address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
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

/// Records of one topic, keyed by process UUID. Per-process records keep
/// insertion order.
pub type TopicRecords = HashMap<String, Vec<AddressRecord>>;

/// Index of every address known to the local process, own and remote.
///
/// Invariants:
/// - at most one record per (topic, process UUID, node UUID);
/// - a stored record's UUIDs equal the keys it is stored under;
/// - removing the last record of an inner map removes the map, so empty
///   topics and processes are never observable.
#[derive(Debug, Default)]
pub struct AddressBook {
    topics: HashMap<String, TopicRecords>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an address. Returns `true` only when the record is new; an
    /// existing record for the same (topic, process, node) is kept
    /// untouched and `false` is returned.
    pub fn add(
        &mut self,
        topic: &str,
        data_addr: &str,
        ctrl_addr: &str,
        process_uuid: &str,
        node_uuid: &str,
        scope: Scope,
    ) -> bool {
        let records = self
            .topics
            .entry(topic.to_string())
            .or_default()
            .entry(process_uuid.to_string())
            .or_default();

        if records.iter().any(|r| r.node_uuid == node_uuid) {
            return false;
        }

        records.push(AddressRecord {
            data_addr: data_addr.to_string(),
            ctrl_addr: ctrl_addr.to_string(),
            process_uuid: process_uuid.to_string(),
            node_uuid: node_uuid.to_string(),
            scope,
        });
        true
    }

    /// Look up one record by exact (topic, process, node) match.
    pub fn get(&self, topic: &str, process_uuid: &str, node_uuid: &str) -> Option<&AddressRecord> {
        self.topics
            .get(topic)?
            .get(process_uuid)?
            .iter()
            .find(|r| r.node_uuid == node_uuid)
    }

    /// Every record advertised for a topic, keyed by process UUID.
    pub fn get_all(&self, topic: &str) -> Option<&TopicRecords> {
        self.topics.get(topic)
    }

    /// Whether any process advertises the topic.
    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    /// Whether the given process advertises the topic.
    pub fn has_any(&self, topic: &str, process_uuid: &str) -> bool {
        self.topics
            .get(topic)
            .is_some_and(|procs| procs.contains_key(process_uuid))
    }

    /// Remove one node's record under a topic. Returns whether a record
    /// was removed. Empty inner and outer maps are cleaned up.
    pub fn del_by_node(&mut self, topic: &str, process_uuid: &str, node_uuid: &str) -> bool {
        let Some(procs) = self.topics.get_mut(topic) else {
            return false;
        };
        let Some(records) = procs.get_mut(process_uuid) else {
            return false;
        };

        let before = records.len();
        records.retain(|r| r.node_uuid != node_uuid);
        let removed = records.len() != before;

        if records.is_empty() {
            procs.remove(process_uuid);
        }
        if procs.is_empty() {
            self.topics.remove(topic);
        }
        removed
    }

    /// Remove every record of a process across all topics. Returns whether
    /// anything was removed.
    pub fn del_by_proc(&mut self, process_uuid: &str) -> bool {
        let before = self.record_count();
        self.topics.retain(|_, procs| {
            procs.remove(process_uuid);
            !procs.is_empty()
        });
        self.record_count() != before
    }

    /// Number of topics with at least one record.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Total number of stored records.
    pub fn record_count(&self) -> usize {
        self.topics
            .values()
            .flat_map(|procs| procs.values())
            .map(|records| records.len())
            .sum()
    }

    /// Dump the index through the log facade (verbose diagnostics).
    pub fn log_state(&self) {
        if self.topics.is_empty() {
            log::info!("[registry]   <empty>");
            return;
        }
        for (topic, procs) in &self.topics {
            log::info!("[registry]   topic [{}]", topic);
            for (process_uuid, records) in procs {
                for record in records {
                    log::info!(
                        "[registry]     {} node {} data {} ctrl {} scope {:?}",
                        process_uuid,
                        record.node_uuid,
                        record.data_addr,
                        record.ctrl_addr,
                        record.scope
                    );
                }
            }
        }
    }
}
