//! Background decoding of forwarded telegrams into a shared [`Store`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info};

use crate::decode::{Decoder, Readings};
use crate::engine::StopToken;
use crate::queue::PacketQueue;
use crate::stats::Heartbeat;

/// How long one decode pass waits for a telegram before checking the stop
/// token again.
const IDLE_WAIT: Duration = Duration::from_millis(100);

/// The latest readings, shared between the decode service and consumers.
#[derive(Debug, Default)]
pub struct Store {
    readings: Mutex<Readings>,
}

impl Store {
    pub fn snapshot(&self) -> Readings {
        match self.readings.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update(&self, f: impl FnOnce(&mut Readings)) {
        let mut guard = match self.readings.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard);
    }
}

/// Consumes the engine's inbound queue and keeps the [`Store`] current.
pub struct DecodeService {
    inbound: Arc<PacketQueue>,
    store: Arc<Store>,
    decoder: Decoder,
    heartbeat: Arc<Heartbeat>,
    stop: StopToken,
}

impl DecodeService {
    pub fn new(inbound: Arc<PacketQueue>) -> Self {
        Self {
            inbound,
            store: Arc::new(Store::default()),
            decoder: Decoder::new(),
            heartbeat: Arc::new(Heartbeat::default()),
            stop: StopToken::default(),
        }
    }

    pub fn store(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }

    /// Updated whenever a telegram has been decoded.
    pub fn heartbeat(&self) -> Arc<Heartbeat> {
        Arc::clone(&self.heartbeat)
    }

    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// Wait up to `timeout` for one telegram and decode it. Returns false
    /// if none arrived.
    pub fn poll_once(&mut self, timeout: Duration) -> bool {
        match self.inbound.recv_timeout(timeout) {
            Some(telegram) => {
                debug!("decoding {}", telegram);
                self.heartbeat.touch();
                let decoder = &mut self.decoder;
                self.store.update(|readings| {
                    decoder.decode(&telegram, readings);
                });
                true
            }
            None => false,
        }
    }

    /// Decode telegrams until the stop token fires.
    pub fn run(&mut self) {
        info!("decode service started");
        while !self.stop.is_stopped() {
            self.poll_once(IDLE_WAIT);
        }
        info!("decode service stopped");
    }
}
