// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Repeating advertisement broadcaster.
//!
//! A beacon owns a background thread that re-broadcasts one pre-packed
//! frame at a fixed interval until the handle is dropped. It holds only a
//! transport handle and the payload, never a pointer back into the engine,
//! so the engine can own beacons without a reference cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::SLEEP_CHUNK;
use crate::transport::DiscoveryTransport;

/// Handle to a repeating broadcaster. Dropping it stops the thread and
/// waits for it to exit.
pub struct Beacon {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Beacon {
    /// Start broadcasting `payload` every `interval`. The first frame goes
    /// out immediately.
    pub fn spawn(
        transport: Arc<dyn DiscoveryTransport>,
        payload: Vec<u8>,
        interval: Duration,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);

        let handle = thread::spawn(move || beacon_loop(&*transport, &payload, interval, &flag));

        Self {
            shutdown,
            handle: Some(handle),
        }
    }
}

impl Drop for Beacon {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn beacon_loop(
    transport: &dyn DiscoveryTransport,
    payload: &[u8],
    interval: Duration,
    shutdown: &AtomicBool,
) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        // Send failures are transient on a best-effort medium; the next
        // period retries.
        if let Err(err) = transport.broadcast(payload) {
            log::debug!("[beacon] broadcast failed: {}", err);
        }

        sleep_with_shutdown(shutdown, interval);
    }
}

/// Sleep for `total`, waking early when the shutdown flag is raised.
pub(crate) fn sleep_with_shutdown(shutdown: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    while Instant::now() < deadline {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        thread::sleep(SLEEP_CHUNK.min(deadline.saturating_duration_since(Instant::now())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryBus;

    #[test]
    fn test_beacon_repeats_payload() {
        let bus = MemoryBus::new();
        let listener = bus.endpoint("10.0.0.2");
        let sender = Arc::new(bus.endpoint("10.0.0.1"));

        let beacon = Beacon::spawn(sender, b"announce".to_vec(), Duration::from_millis(40));

        let mut frames = 0;
        let deadline = Instant::now() + Duration::from_millis(500);
        while frames < 3 && Instant::now() < deadline {
            if let Some(datagram) = listener
                .recv_timeout(Duration::from_millis(100))
                .expect("receive")
            {
                assert_eq!(datagram.payload, b"announce");
                frames += 1;
            }
        }
        assert!(frames >= 3, "beacon must re-broadcast (saw {})", frames);

        drop(beacon);
    }

    #[test]
    fn test_beacon_stops_on_drop() {
        let bus = MemoryBus::new();
        let listener = bus.endpoint("10.0.0.2");
        let sender = Arc::new(bus.endpoint("10.0.0.1"));

        let beacon = Beacon::spawn(sender, b"announce".to_vec(), Duration::from_millis(20));
        thread::sleep(Duration::from_millis(60));
        drop(beacon); // joins the thread; nothing is sent afterwards

        while listener
            .recv_timeout(Duration::from_millis(20))
            .expect("drain")
            .is_some()
        {}

        assert!(listener
            .recv_timeout(Duration::from_millis(100))
            .expect("receive")
            .is_none());
    }

    #[test]
    fn test_sleep_with_shutdown_wakes_early() {
        let flag = AtomicBool::new(true);
        let start = Instant::now();
        sleep_with_shutdown(&flag, Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
