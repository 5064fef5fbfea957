// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The discovery engine.
//!
//! Owns the address registry, the per-peer activity table, and the
//! per-(topic, node) advertisement beacons, all behind one mutex, and runs
//! three workers against them:
//!
//! - **reception** polls the transport and drives the protocol state
//!   machine for every incoming datagram;
//! - **heartbeat** broadcasts a periodic `HELLO` so peers keep this
//!   process alive in their activity tables;
//! - **activity sweep** reaps peers that have been silent for longer than
//!   the silence interval.
//!
//! The lock is never held across a send, a poll, or a sleep, and
//! callbacks are always dispatched after it is released, so a callback may
//! call back into the engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::{
    DEF_ACTIVITY_INTERVAL_MS, DEF_ADVERTISE_INTERVAL_MS, DEF_HEARTBEAT_INTERVAL_MS,
    DEF_SILENCE_INTERVAL_MS, POLL_TIMEOUT, SHUTDOWN_LINGER,
};
use crate::error::{Error, Result};
use crate::registry::{AddressBook, AddressRecord};
use crate::transport::beacon::sleep_with_shutdown;
use crate::transport::{Beacon, Datagram, DiscoveryTransport, UdpBroadcastTransport};
use crate::types::{DiscoveryCallback, Endpoint, PublisherKind, Scope};
use crate::wire::{DiscoveryMsg, MsgType};

/// Callback invocations collected under the lock, executed after release.
type Pending = Vec<(DiscoveryCallback, Endpoint)>;

/// Everything guarded by the engine mutex.
struct State {
    book: AddressBook,
    /// Last datagram seen per remote process.
    activity: HashMap<String, Instant>,
    /// One repeating beacon per locally advertised (topic, node) with a
    /// scope that leaves the process.
    beacons: HashMap<String, HashMap<String, Beacon>>,

    silence_interval_ms: u64,
    activity_interval_ms: u64,
    advertise_interval_ms: u64,
    heartbeat_interval_ms: u64,

    on_connection: Option<DiscoveryCallback>,
    on_disconnection: Option<DiscoveryCallback>,
    on_connection_srv: Option<DiscoveryCallback>,
    on_disconnection_srv: Option<DiscoveryCallback>,
}

struct Inner {
    process_uuid: String,
    host_addr: String,
    verbose: bool,
    transport: Arc<dyn DiscoveryTransport>,
    shutdown: AtomicBool,
    state: Mutex<State>,
}

impl Inner {
    /// Take the engine lock, recovering from poisoning: a panic in another
    /// thread must not wedge discovery for the rest of the process.
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Dump the engine state through the log facade. Takes the engine lock
    /// itself; callers must not hold it.
    fn log_state(&self) {
        let state = self.state();
        log::info!("[discovery] ---------------");
        log::info!("[discovery] process {}", self.process_uuid);
        log::info!("[discovery] host {}", self.host_addr);
        log::info!(
            "[discovery] intervals: activity {} ms, heartbeat {} ms, advertise {} ms, silence {} ms",
            state.activity_interval_ms,
            state.heartbeat_interval_ms,
            state.advertise_interval_ms,
            state.silence_interval_ms
        );
        log::info!("[discovery] known addresses:");
        state.book.log_state();
        if state.activity.is_empty() {
            log::info!("[discovery] activity: <empty>");
        } else {
            for (process_uuid, last_seen) in &state.activity {
                log::info!(
                    "[discovery] activity: {} seen {} ms ago",
                    process_uuid,
                    last_seen.elapsed().as_millis()
                );
            }
        }
        log::info!("[discovery] ---------------");
    }
}

/// LAN peer discovery service.
///
/// One instance per process is typical; the process UUID passed at
/// construction identifies this process on the broadcast domain and must
/// not be reused by another live process.
///
/// Dropping the engine broadcasts a farewell so peers disconnect promptly
/// instead of waiting out the silence interval.
pub struct Discovery {
    inner: Arc<Inner>,
    workers: Vec<JoinHandle<()>>,
}

impl Discovery {
    /// Open the UDP broadcast transport on the discovery port and start
    /// the three workers. The engine accepts API calls as soon as this
    /// returns.
    pub fn new(process_uuid: &str, verbose: bool) -> Result<Self> {
        let transport = Arc::new(UdpBroadcastTransport::open()?);
        Ok(Self::with_transport(process_uuid, verbose, transport))
    }

    /// Start the engine over a caller-supplied transport. This is how
    /// simulations and the scenario tests wire several engines to one
    /// in-process bus.
    pub fn with_transport(
        process_uuid: &str,
        verbose: bool,
        transport: Arc<dyn DiscoveryTransport>,
    ) -> Self {
        let host_addr = transport.local_host_addr().to_string();
        let inner = Arc::new(Inner {
            process_uuid: process_uuid.to_string(),
            host_addr,
            verbose,
            transport,
            shutdown: AtomicBool::new(false),
            state: Mutex::new(State {
                book: AddressBook::new(),
                activity: HashMap::new(),
                beacons: HashMap::new(),
                silence_interval_ms: DEF_SILENCE_INTERVAL_MS,
                activity_interval_ms: DEF_ACTIVITY_INTERVAL_MS,
                advertise_interval_ms: DEF_ADVERTISE_INTERVAL_MS,
                heartbeat_interval_ms: DEF_HEARTBEAT_INTERVAL_MS,
                on_connection: None,
                on_disconnection: None,
                on_connection_srv: None,
                on_disconnection_srv: None,
            }),
        });

        let workers = vec![
            spawn_worker("meshwire-reception", &inner, reception_loop),
            spawn_worker("meshwire-heartbeat", &inner, heartbeat_loop),
            spawn_worker("meshwire-sweep", &inner, sweep_loop),
        ];

        let engine = Self { inner, workers };
        if verbose {
            engine.print_state();
        }
        engine
    }

    // ===== Advertisement =====

    /// Advertise a (topic, node) record.
    ///
    /// The record is stored locally; unless its scope is
    /// [`Scope::Process`], a repeating beacon starts announcing it on the
    /// broadcast domain every advertise interval.
    ///
    /// Fails with [`Error::Incomplete`] when the topic, the data address,
    /// or the node UUID is empty; nothing is stored in that case.
    pub fn advertise(
        &self,
        kind: PublisherKind,
        topic: &str,
        data_addr: &str,
        ctrl_addr: &str,
        node_uuid: &str,
        scope: Scope,
    ) -> Result<()> {
        if topic.is_empty() || data_addr.is_empty() || node_uuid.is_empty() {
            return Err(Error::Incomplete(
                "advertisement needs a topic, a data address, and a node uuid".into(),
            ));
        }

        let inner = &self.inner;
        let mut state = inner.state();

        state.book.add(
            topic,
            data_addr,
            ctrl_addr,
            &inner.process_uuid,
            node_uuid,
            scope,
        );

        if scope == Scope::Process {
            return Ok(());
        }

        let already_beaconing = state
            .beacons
            .get(topic)
            .is_some_and(|nodes| nodes.contains_key(node_uuid));
        if already_beaconing {
            return Ok(());
        }

        // Announce the record as stored: a repeated advertise keeps the
        // original endpoints.
        let Some(record) = state.book.get(topic, &inner.process_uuid, node_uuid).cloned() else {
            return Ok(());
        };
        let payload = DiscoveryMsg::advertisement(
            advertise_type(kind),
            &inner.process_uuid,
            topic,
            &record.data_addr,
            &record.ctrl_addr,
            &record.node_uuid,
            record.scope,
        )
        .pack()?;

        let interval = Duration::from_millis(state.advertise_interval_ms);
        let beacon = Beacon::spawn(Arc::clone(&inner.transport), payload, interval);
        state
            .beacons
            .entry(topic.to_string())
            .or_default()
            .insert(node_uuid.to_string(), beacon);

        log::debug!(
            "[discovery] {} advertising [{}] node {} scope {:?}",
            inner.process_uuid,
            topic,
            node_uuid,
            scope
        );
        Ok(())
    }

    /// Withdraw a previously advertised (topic, node) record.
    ///
    /// A no-op when the record is unknown. For records whose scope leaves
    /// the process, a one-shot withdrawal datagram tells peers to
    /// disconnect, and the record's beacon stops.
    pub fn unadvertise(&self, kind: PublisherKind, topic: &str, node_uuid: &str) {
        let inner = &self.inner;
        let mut farewell = None;
        let mut beacon = None;

        {
            let mut state = inner.state();

            let Some(record) = state.book.get(topic, &inner.process_uuid, node_uuid).cloned()
            else {
                return;
            };

            state.book.del_by_node(topic, &inner.process_uuid, node_uuid);

            if record.scope != Scope::Process {
                match DiscoveryMsg::advertisement(
                    unadvertise_type(kind),
                    &inner.process_uuid,
                    topic,
                    &record.data_addr,
                    &record.ctrl_addr,
                    &record.node_uuid,
                    record.scope,
                )
                .pack()
                {
                    Ok(payload) => farewell = Some(payload),
                    Err(err) => log::debug!("[discovery] withdrawal not packable: {}", err),
                }
            }

            if let Some(nodes) = state.beacons.get_mut(topic) {
                beacon = nodes.remove(node_uuid);
                if nodes.is_empty() {
                    state.beacons.remove(topic);
                }
            }
        }

        // Stop the beacon (joining its thread, outside the lock) before the
        // withdrawal goes out: no stale advertisement may trail it.
        drop(beacon);

        if let Some(payload) = farewell {
            if let Err(err) = inner.transport.broadcast(&payload) {
                log::debug!("[discovery] withdrawal broadcast failed: {}", err);
            }
        }
    }

    // ===== Discovery =====

    /// Ask the broadcast domain who publishes `topic`.
    ///
    /// A discovery request goes out immediately; peers that host the topic
    /// answer with one-shot advertisements. Records already cached locally
    /// are replayed through the connection callback right away: all of
    /// them for a message topic, at most one for a service (a service
    /// request wants a single responder).
    pub fn discover(&self, topic: &str, is_service: bool) {
        let inner = &self.inner;

        let request = DiscoveryMsg::subscription(&inner.process_uuid, topic, is_service);
        match request.pack() {
            Ok(payload) => {
                if let Err(err) = inner.transport.broadcast(&payload) {
                    log::debug!("[discovery] discovery request failed: {}", err);
                }
            }
            Err(err) => log::debug!("[discovery] discovery request not packable: {}", err),
        }

        let mut pending: Pending = Vec::new();
        {
            let state = inner.state();
            let Some(procs) = state.book.get_all(topic) else {
                return;
            };

            'topic: for (process_uuid, records) in procs {
                for record in records {
                    // Replay only what this process may act on: narrow
                    // scopes are replayed for our own records alone, and
                    // remote peers re-answer the request themselves.
                    let local = process_uuid == &inner.process_uuid;
                    if record.scope != Scope::All && !local {
                        continue;
                    }

                    let endpoint = record_endpoint(topic, record);
                    if is_service {
                        if let Some(cb) = &state.on_connection_srv {
                            pending.push((Arc::clone(cb), endpoint));
                        }
                        break 'topic;
                    }
                    if let Some(cb) = &state.on_connection {
                        pending.push((Arc::clone(cb), endpoint));
                    }
                }
            }
        }
        dispatch(pending);
    }

    /// Every cached record for a topic, own and remote.
    pub fn addresses(&self, topic: &str) -> Vec<Endpoint> {
        let state = self.inner.state();
        let Some(procs) = state.book.get_all(topic) else {
            return Vec::new();
        };
        procs
            .values()
            .flatten()
            .map(|record| record_endpoint(topic, record))
            .collect()
    }

    // ===== Callbacks =====

    /// Called when a message topic advertisement is first seen.
    pub fn set_connection_callback<F>(&self, cb: F)
    where
        F: Fn(&Endpoint) + Send + Sync + 'static,
    {
        self.inner.state().on_connection = Some(Arc::new(cb));
    }

    /// Called when a message topic is withdrawn or its process disappears.
    pub fn set_disconnection_callback<F>(&self, cb: F)
    where
        F: Fn(&Endpoint) + Send + Sync + 'static,
    {
        self.inner.state().on_disconnection = Some(Arc::new(cb));
    }

    /// Called when a service advertisement is first seen.
    pub fn set_connection_srv_callback<F>(&self, cb: F)
    where
        F: Fn(&Endpoint) + Send + Sync + 'static,
    {
        self.inner.state().on_connection_srv = Some(Arc::new(cb));
    }

    /// Called when a service is withdrawn or its process disappears.
    pub fn set_disconnection_srv_callback<F>(&self, cb: F)
    where
        F: Fn(&Endpoint) + Send + Sync + 'static,
    {
        self.inner.state().on_disconnection_srv = Some(Arc::new(cb));
    }

    // ===== Tunables =====

    /// Silence after which a peer is declared dead (ms).
    pub fn silence_interval(&self) -> u64 {
        self.inner.state().silence_interval_ms
    }

    pub fn set_silence_interval(&self, ms: u64) {
        self.inner.state().silence_interval_ms = ms;
    }

    /// Period of the activity sweep (ms).
    pub fn activity_interval(&self) -> u64 {
        self.inner.state().activity_interval_ms
    }

    pub fn set_activity_interval(&self, ms: u64) {
        self.inner.state().activity_interval_ms = ms;
    }

    /// Period of the repeating advertisement beacons (ms). Applies to
    /// beacons created after the change.
    pub fn advertise_interval(&self) -> u64 {
        self.inner.state().advertise_interval_ms
    }

    pub fn set_advertise_interval(&self, ms: u64) {
        self.inner.state().advertise_interval_ms = ms;
    }

    /// Period of the HELLO heartbeat (ms).
    pub fn heartbeat_interval(&self) -> u64 {
        self.inner.state().heartbeat_interval_ms
    }

    pub fn set_heartbeat_interval(&self, ms: u64) {
        self.inner.state().heartbeat_interval_ms = ms;
    }

    // ===== Introspection =====

    /// UUID identifying this process on the broadcast domain.
    pub fn process_uuid(&self) -> &str {
        &self.inner.process_uuid
    }

    /// Address peers see as this process's host, used for host-scope
    /// filtering.
    pub fn host_addr(&self) -> &str {
        &self.inner.host_addr
    }

    /// Dump the engine state through the log facade. In verbose mode the
    /// same dump also follows every processed datagram.
    pub fn print_state(&self) {
        self.inner.log_state();
    }
}

impl Drop for Discovery {
    fn drop(&mut self) {
        self.inner.shutdown.store(true, Ordering::Relaxed);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }

        // Silence the beacons first (each drop joins one broadcaster
        // thread): no advertisement may trail the farewell.
        let beacons = std::mem::take(&mut self.inner.state().beacons);
        drop(beacons);

        // Tell peers we are leaving so they disconnect promptly. Best
        // effort: on failure the silence interval cleans up after us.
        match DiscoveryMsg::bye(&self.inner.process_uuid).pack() {
            Ok(payload) => {
                if let Err(err) = self.inner.transport.broadcast(&payload) {
                    log::debug!("[discovery] farewell broadcast failed: {}", err);
                }
            }
            Err(err) => log::debug!("[discovery] farewell not packable: {}", err),
        }
        thread::sleep(SHUTDOWN_LINGER);
    }
}

// ===== Workers =====

fn spawn_worker(name: &str, inner: &Arc<Inner>, body: fn(&Inner)) -> JoinHandle<()> {
    let inner = Arc::clone(inner);
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || body(&inner))
        .unwrap_or_else(|err| panic!("failed to spawn {}: {}", name, err))
}

fn reception_loop(inner: &Inner) {
    loop {
        if inner.shutdown.load(Ordering::Relaxed) {
            break;
        }

        match inner.transport.recv_timeout(POLL_TIMEOUT) {
            Ok(Some(datagram)) => {
                handle_datagram(inner, &datagram);
                if inner.verbose {
                    log::info!(
                        "[discovery] {} received a datagram from {}",
                        inner.process_uuid,
                        datagram.source_ip
                    );
                    inner.log_state();
                }
            }
            Ok(None) => {}
            Err(err) => log::debug!("[discovery] receive failed: {}", err),
        }
    }
}

fn heartbeat_loop(inner: &Inner) {
    loop {
        if inner.shutdown.load(Ordering::Relaxed) {
            break;
        }

        match DiscoveryMsg::hello(&inner.process_uuid).pack() {
            Ok(payload) => {
                if let Err(err) = inner.transport.broadcast(&payload) {
                    log::debug!("[discovery] heartbeat failed: {}", err);
                }
            }
            Err(err) => log::debug!("[discovery] heartbeat not packable: {}", err),
        }

        let interval = Duration::from_millis(inner.state().heartbeat_interval_ms);
        sleep_with_shutdown(&inner.shutdown, interval);
    }
}

fn sweep_loop(inner: &Inner) {
    loop {
        if inner.shutdown.load(Ordering::Relaxed) {
            break;
        }

        let mut pending: Pending = Vec::new();
        let interval;
        {
            let mut state = inner.state();
            let silence = Duration::from_millis(state.silence_interval_ms);
            let now = Instant::now();

            // Scan first, mutate after: removals must not disturb the
            // iteration, and our own entry is never reaped.
            let expired: Vec<String> = state
                .activity
                .iter()
                .filter(|(uuid, last_seen)| {
                    uuid.as_str() != inner.process_uuid
                        && now.duration_since(**last_seen) > silence
                })
                .map(|(uuid, _)| uuid.clone())
                .collect();

            for process_uuid in expired {
                log::debug!(
                    "[discovery] {} reaping silent peer {}",
                    inner.process_uuid,
                    process_uuid
                );
                state.book.del_by_proc(&process_uuid);
                state.activity.remove(&process_uuid);
                if let Some(cb) = &state.on_disconnection {
                    pending.push((Arc::clone(cb), Endpoint::process_lost(&process_uuid)));
                }
            }

            interval = Duration::from_millis(state.activity_interval_ms);
        }
        dispatch(pending);

        sleep_with_shutdown(&inner.shutdown, interval);
    }
}

// ===== Protocol state machine =====

fn handle_datagram(inner: &Inner, datagram: &Datagram) {
    let msg = match DiscoveryMsg::unpack(&datagram.payload) {
        Ok(msg) => msg,
        Err(err) => {
            log::debug!(
                "[discovery] dropping datagram from {}: {}",
                datagram.source_ip,
                err
            );
            return;
        }
    };

    // Our own broadcasts loop back; they carry no news.
    if msg.header.process_uuid == inner.process_uuid {
        return;
    }

    let mut pending: Pending = Vec::new();
    let mut replies: Vec<Vec<u8>> = Vec::new();
    {
        let mut state = inner.state();
        state
            .activity
            .insert(msg.header.process_uuid.clone(), Instant::now());

        match msg.header.msg_type {
            MsgType::Hello => {}
            MsgType::Bye => handle_bye(&mut state, &msg.header.process_uuid, &mut pending),
            MsgType::Adv | MsgType::AdvSrv => {
                handle_advertisement(inner, &mut state, &msg, &datagram.source_ip, &mut pending);
            }
            MsgType::Sub | MsgType::SubSrv => {
                handle_subscription(inner, &state, &msg, &datagram.source_ip, &mut replies);
            }
            MsgType::Unadv | MsgType::UnadvSrv => {
                handle_withdrawal(inner, &mut state, &msg, &datagram.source_ip, &mut pending);
            }
        }
    }

    for payload in replies {
        if let Err(err) = inner.transport.broadcast(&payload) {
            log::debug!("[discovery] reply broadcast failed: {}", err);
        }
    }
    dispatch(pending);
}

fn handle_bye(state: &mut State, process_uuid: &str, pending: &mut Pending) {
    log::debug!("[discovery] peer {} said goodbye", process_uuid);
    state.activity.remove(process_uuid);
    state.book.del_by_proc(process_uuid);
    if let Some(cb) = &state.on_disconnection {
        pending.push((Arc::clone(cb), Endpoint::process_lost(process_uuid)));
    }
}

fn handle_advertisement(
    inner: &Inner,
    state: &mut State,
    msg: &DiscoveryMsg,
    source_ip: &str,
    pending: &mut Pending,
) {
    let Some(body) = &msg.body else { return };
    let topic = &msg.header.topic;
    let process_uuid = &msg.header.process_uuid;

    if outside_scope(body.scope, source_ip, &inner.host_addr) {
        return;
    }

    let connection_cb = match msg.header.msg_type {
        MsgType::Adv => state.on_connection.clone(),
        _ => state.on_connection_srv.clone(),
    };
    let disconnection_cb = match msg.header.msg_type {
        MsgType::Adv => state.on_disconnection.clone(),
        _ => state.on_disconnection_srv.clone(),
    };

    // A node re-announcing with new endpoints has moved: retire the old
    // record, then treat the new one as a fresh connection.
    if let Some(existing) = state.book.get(topic, process_uuid, &body.node_uuid) {
        if existing.data_addr == body.data_addr && existing.ctrl_addr == body.ctrl_addr {
            return; // periodic re-announcement, already known
        }
        let old = record_endpoint(topic, existing);
        state.book.del_by_node(topic, process_uuid, &body.node_uuid);
        if let Some(cb) = &disconnection_cb {
            pending.push((Arc::clone(cb), old));
        }
        log::debug!(
            "[discovery] node {} on [{}] moved to {}",
            body.node_uuid,
            topic,
            body.data_addr
        );
    }

    let added = state.book.add(
        topic,
        &body.data_addr,
        &body.ctrl_addr,
        process_uuid,
        &body.node_uuid,
        body.scope,
    );
    if added {
        if let Some(cb) = &connection_cb {
            pending.push((
                Arc::clone(cb),
                Endpoint {
                    topic: topic.clone(),
                    data_addr: body.data_addr.clone(),
                    ctrl_addr: body.ctrl_addr.clone(),
                    process_uuid: process_uuid.clone(),
                    node_uuid: body.node_uuid.clone(),
                    scope: body.scope,
                },
            ));
        }
    }
}

fn handle_subscription(
    inner: &Inner,
    state: &State,
    msg: &DiscoveryMsg,
    source_ip: &str,
    replies: &mut Vec<Vec<u8>>,
) {
    let topic = &msg.header.topic;
    if !state.book.has_any(topic, &inner.process_uuid) {
        return;
    }
    let Some(procs) = state.book.get_all(topic) else {
        return;
    };
    let Some(records) = procs.get(&inner.process_uuid) else {
        return;
    };

    let reply_type = match msg.header.msg_type {
        MsgType::Sub => MsgType::Adv,
        _ => MsgType::AdvSrv,
    };

    for record in records {
        // The requester only gets records it is allowed to see.
        if outside_scope(record.scope, source_ip, &inner.host_addr) {
            continue;
        }

        match DiscoveryMsg::advertisement(
            reply_type,
            &inner.process_uuid,
            topic,
            &record.data_addr,
            &record.ctrl_addr,
            &record.node_uuid,
            record.scope,
        )
        .pack()
        {
            Ok(payload) => replies.push(payload),
            Err(err) => log::debug!("[discovery] reply not packable: {}", err),
        }
    }
}

fn handle_withdrawal(
    inner: &Inner,
    state: &mut State,
    msg: &DiscoveryMsg,
    source_ip: &str,
    pending: &mut Pending,
) {
    let Some(body) = &msg.body else { return };
    let topic = &msg.header.topic;
    let process_uuid = &msg.header.process_uuid;

    if outside_scope(body.scope, source_ip, &inner.host_addr) {
        return;
    }

    let cb = match msg.header.msg_type {
        MsgType::Unadv => state.on_disconnection.clone(),
        _ => state.on_disconnection_srv.clone(),
    };
    if let Some(cb) = cb {
        pending.push((
            cb,
            Endpoint {
                topic: topic.clone(),
                data_addr: body.data_addr.clone(),
                ctrl_addr: body.ctrl_addr.clone(),
                process_uuid: process_uuid.clone(),
                node_uuid: body.node_uuid.clone(),
                scope: body.scope,
            },
        ));
    }

    state.book.del_by_node(topic, process_uuid, &body.node_uuid);
}

// ===== Helpers =====

/// Scope filter applied to incoming advertisements and outgoing
/// subscription replies: process-scoped records never cross, host-scoped
/// records only between sockets on the same host.
fn outside_scope(scope: Scope, source_ip: &str, local_host: &str) -> bool {
    match scope {
        Scope::Process => true,
        Scope::Host => source_ip != local_host,
        Scope::All => false,
    }
}

fn record_endpoint(topic: &str, record: &AddressRecord) -> Endpoint {
    Endpoint {
        topic: topic.to_string(),
        data_addr: record.data_addr.clone(),
        ctrl_addr: record.ctrl_addr.clone(),
        process_uuid: record.process_uuid.clone(),
        node_uuid: record.node_uuid.clone(),
        scope: record.scope,
    }
}

fn advertise_type(kind: PublisherKind) -> MsgType {
    match kind {
        PublisherKind::Msg => MsgType::Adv,
        PublisherKind::Srv => MsgType::AdvSrv,
    }
}

fn unadvertise_type(kind: PublisherKind) -> MsgType {
    match kind {
        PublisherKind::Msg => MsgType::Unadv,
        PublisherKind::Srv => MsgType::UnadvSrv,
    }
}

fn dispatch(pending: Pending) {
    for (cb, endpoint) in pending {
        cb(&endpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryBus;
    use std::sync::Mutex as StdMutex;

    fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        done()
    }

    fn collector() -> (Arc<StdMutex<Vec<Endpoint>>>, impl Fn(&Endpoint) + Send + Sync) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |ep: &Endpoint| {
            sink.lock().unwrap_or_else(PoisonError::into_inner).push(ep.clone())
        })
    }

    #[test]
    fn test_beacon_follows_registry() {
        let bus = MemoryBus::new();
        let engine = Discovery::with_transport("proc-a", false, Arc::new(bus.endpoint("h1")));
        engine.set_advertise_interval(50);

        engine
            .advertise(
                PublisherKind::Msg,
                "/t",
                "tcp://1:1",
                "tcp://1:2",
                "n1",
                Scope::All,
            )
            .expect("advertise");
        {
            let state = engine.inner.state();
            assert!(state.beacons.get("/t").is_some_and(|n| n.contains_key("n1")));
            assert!(state.book.get("/t", "proc-a", "n1").is_some());
        }

        engine.unadvertise(PublisherKind::Msg, "/t", "n1");
        {
            let state = engine.inner.state();
            assert!(state.beacons.is_empty());
            assert!(state.book.get("/t", "proc-a", "n1").is_none());
        }
    }

    #[test]
    fn test_process_scope_stays_local() {
        let bus = MemoryBus::new();
        let engine = Discovery::with_transport("proc-a", false, Arc::new(bus.endpoint("h1")));

        engine
            .advertise(
                PublisherKind::Msg,
                "/t",
                "inproc://queue",
                "",
                "n1",
                Scope::Process,
            )
            .expect("advertise");

        let state = engine.inner.state();
        assert!(state.beacons.is_empty(), "process scope must not beacon");
        assert!(state.book.get("/t", "proc-a", "n1").is_some());
    }

    #[test]
    fn test_incomplete_advertisement_refused() {
        let bus = MemoryBus::new();
        let engine = Discovery::with_transport("proc-a", false, Arc::new(bus.endpoint("h1")));

        let result = engine.advertise(PublisherKind::Msg, "", "tcp://1:1", "", "n1", Scope::All);
        assert!(matches!(result, Err(Error::Incomplete(_))));
        assert_eq!(engine.inner.state().book.record_count(), 0);
    }

    #[test]
    fn test_self_datagrams_are_inert() {
        let bus = MemoryBus::new();
        let engine = Discovery::with_transport("proc-a", false, Arc::new(bus.endpoint("h1")));
        let (seen, cb) = collector();
        engine.set_connection_callback(cb);

        // A datagram claiming our own process UUID, as a mis-looped echo.
        let echo = DiscoveryMsg::advertisement(
            MsgType::Adv,
            "proc-a",
            "/t",
            "tcp://9:9",
            "tcp://9:10",
            "n9",
            Scope::All,
        )
        .pack()
        .expect("packs");
        bus.endpoint("h1").broadcast(&echo).expect("send");

        thread::sleep(Duration::from_millis(200));
        assert_eq!(engine.inner.state().book.record_count(), 0);
        assert!(seen.lock().unwrap_or_else(PoisonError::into_inner).is_empty());
        assert!(engine.inner.state().activity.is_empty());
    }

    #[test]
    fn test_connection_fires_once_per_record() {
        let bus = MemoryBus::new();
        let engine = Discovery::with_transport("proc-b", false, Arc::new(bus.endpoint("h1")));
        let (seen, cb) = collector();
        engine.set_connection_callback(cb);

        let raw = bus.endpoint("h1");
        let adv = DiscoveryMsg::advertisement(
            MsgType::Adv,
            "proc-a",
            "/t",
            "tcp://1:1",
            "tcp://1:2",
            "n1",
            Scope::All,
        )
        .pack()
        .expect("packs");

        for _ in 0..4 {
            raw.broadcast(&adv).expect("send");
        }

        assert!(wait_until(Duration::from_secs(2), || {
            !seen.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
        }));
        thread::sleep(Duration::from_millis(200));

        let seen = seen.lock().unwrap_or_else(PoisonError::into_inner);
        assert_eq!(seen.len(), 1, "duplicate advertisements must coalesce");
        assert_eq!(seen[0].topic, "/t");
        assert_eq!(seen[0].process_uuid, "proc-a");
    }

    #[test]
    fn test_readvertise_with_new_endpoints_replaces_record() {
        let bus = MemoryBus::new();
        let engine = Discovery::with_transport("proc-b", false, Arc::new(bus.endpoint("h1")));
        let (connections, on_conn) = collector();
        let (disconnections, on_disc) = collector();
        engine.set_connection_callback(on_conn);
        engine.set_disconnection_callback(on_disc);

        let raw = bus.endpoint("h1");
        let old = DiscoveryMsg::advertisement(
            MsgType::Adv,
            "proc-a",
            "/t",
            "tcp://1:1",
            "tcp://1:2",
            "n1",
            Scope::All,
        )
        .pack()
        .expect("packs");
        let moved = DiscoveryMsg::advertisement(
            MsgType::Adv,
            "proc-a",
            "/t",
            "tcp://2:1",
            "tcp://2:2",
            "n1",
            Scope::All,
        )
        .pack()
        .expect("packs");

        raw.broadcast(&old).expect("send");
        assert!(wait_until(Duration::from_secs(2), || {
            connections.lock().unwrap_or_else(PoisonError::into_inner).len() == 1
        }));

        raw.broadcast(&moved).expect("send");
        assert!(wait_until(Duration::from_secs(2), || {
            connections.lock().unwrap_or_else(PoisonError::into_inner).len() == 2
        }));

        let disconnections = disconnections.lock().unwrap_or_else(PoisonError::into_inner);
        assert_eq!(disconnections.len(), 1);
        assert_eq!(disconnections[0].data_addr, "tcp://1:1");

        let connections = connections.lock().unwrap_or_else(PoisonError::into_inner);
        assert_eq!(connections[1].data_addr, "tcp://2:1");

        let state = engine.inner.state();
        let record = state.book.get("/t", "proc-a", "n1").expect("record kept");
        assert_eq!(record.data_addr, "tcp://2:1");
    }

    #[test]
    fn test_callback_may_reenter_engine() {
        let bus = MemoryBus::new();
        let engine = Arc::new(Discovery::with_transport(
            "proc-b",
            false,
            Arc::new(bus.endpoint("h1")),
        ));

        // Re-entering the engine from a callback must not deadlock.
        let reentrant = Arc::clone(&engine);
        let observed = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&observed);
        engine.set_connection_callback(move |ep: &Endpoint| {
            let cached = reentrant.addresses(&ep.topic);
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(cached.len());
        });

        let adv = DiscoveryMsg::advertisement(
            MsgType::Adv,
            "proc-a",
            "/t",
            "tcp://1:1",
            "tcp://1:2",
            "n1",
            Scope::All,
        )
        .pack()
        .expect("packs");
        bus.endpoint("h1").broadcast(&adv).expect("send");

        assert!(wait_until(Duration::from_secs(2), || {
            !observed.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
        }));
        let observed = observed.lock().unwrap_or_else(PoisonError::into_inner);
        assert_eq!(observed[0], 1);
    }

    #[test]
    fn test_discover_service_replays_at_most_one() {
        let bus = MemoryBus::new();
        let engine = Discovery::with_transport("proc-b", false, Arc::new(bus.endpoint("h1")));
        let (seen, cb) = collector();
        engine.set_connection_srv_callback(cb);

        let raw = bus.endpoint("h1");
        for node in ["n1", "n2", "n3"] {
            let adv = DiscoveryMsg::advertisement(
                MsgType::AdvSrv,
                "proc-a",
                "/svc",
                "tcp://1:1",
                "tcp://1:2",
                node,
                Scope::All,
            )
            .pack()
            .expect("packs");
            raw.broadcast(&adv).expect("send");
        }

        assert!(wait_until(Duration::from_secs(2), || {
            seen.lock().unwrap_or_else(PoisonError::into_inner).len() == 3
        }));
        seen.lock().unwrap_or_else(PoisonError::into_inner).clear();

        engine.discover("/svc", true);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(
            seen.lock().unwrap_or_else(PoisonError::into_inner).len(),
            1,
            "service discovery replays a single responder"
        );
    }
}
