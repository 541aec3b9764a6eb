//! The bus access engine: framing, arbitration and transmission around a
//! serial port.
//!
//! [`Engine::run`] owns the port and must never block longer than a read
//! timeout: the master polls us only briefly, and a missed poll window
//! means a missed transmit opportunity. Everything slow (decoding,
//! consumers) happens behind the inbound queue on other threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info, trace};

use crate::framer::FrameDecoder;
use crate::mac::{Action, BusState, Mac};
use crate::port::{EmsPort, READ_TIMEOUT};
use crate::queue::PacketQueue;
use crate::stats::{Heartbeat, Stats};
use crate::telegram::Telegram;
use crate::transmit::Transmitter;
use crate::types::DeviceId;

/// Cooperative stop flag, shared by cloning.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Drives one serial port: bytes in, telegrams out, polls answered.
pub struct Engine<P: EmsPort> {
    port: P,
    framer: FrameDecoder,
    mac: Mac,
    tx: Transmitter,
    inbound: Arc<PacketQueue>,
    outbound: Arc<PacketQueue>,
    stats: Arc<Stats>,
    heartbeat: Arc<Heartbeat>,
    stop: StopToken,
}

impl<P: EmsPort> Engine<P> {
    pub fn new(port: P, client_id: DeviceId) -> Self {
        Self {
            port,
            framer: FrameDecoder::default(),
            mac: Mac::new(client_id),
            tx: Transmitter::new(client_id),
            inbound: Arc::new(PacketQueue::default()),
            outbound: Arc::new(PacketQueue::default()),
            stats: Arc::new(Stats::default()),
            heartbeat: Arc::new(Heartbeat::default()),
            stop: StopToken::default(),
        }
    }

    /// Telegrams received from the bus, for the decode service or other
    /// consumers.
    pub fn inbound(&self) -> Arc<PacketQueue> {
        Arc::clone(&self.inbound)
    }

    /// Telegrams waiting to be sent at the next poll.
    pub fn outbound(&self) -> Arc<PacketQueue> {
        Arc::clone(&self.outbound)
    }

    pub fn stats(&self) -> Arc<Stats> {
        Arc::clone(&self.stats)
    }

    /// Updated whenever a complete telegram arrives.
    pub fn heartbeat(&self) -> Arc<Heartbeat> {
        Arc::clone(&self.heartbeat)
    }

    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    pub fn bus_state(&self) -> BusState {
        self.mac.state()
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// One read step: wait up to [`READ_TIMEOUT`] for a byte and run it
    /// through framing and arbitration.
    pub fn step(&mut self) {
        match self.port.read_byte(READ_TIMEOUT) {
            Ok(Some(byte)) => {
                trace!("RD {:02x}", byte);
                if let Some(telegram) = self.framer.push_byte(byte) {
                    self.on_telegram(telegram);
                }
            }
            Ok(None) => {}
            Err(e) => error!("bus read failed: {:?}", e),
        }
    }

    /// Read and arbitrate until the stop token fires, then log the
    /// statistics summary.
    pub fn run(&mut self) {
        info!("bus access started as {}", self.mac.client_id());
        while !self.stop.is_stopped() {
            self.step();
        }
        self.stats.log_summary();
        info!("bus access stopped");
    }

    fn on_telegram(&mut self, telegram: Telegram) {
        if telegram.is_mac() {
            trace!("RX {}", telegram);
        } else {
            debug!("RX {}", telegram);
        }
        self.heartbeat.touch();
        match self.mac.on_telegram(&telegram, &self.stats) {
            Action::None => {}
            Action::Forward => self.forward(telegram),
            Action::Acquire => {
                self.tx.open_window();
                self.run_transmitter();
            }
            Action::Transmit => self.run_transmitter(),
            Action::TransmitThenForward => {
                // Answer the pending poll before handing the telegram on.
                self.run_transmitter();
                self.forward(telegram);
            }
        }
    }

    fn run_transmitter(&mut self) {
        let disposition = self
            .tx
            .handle_poll(&mut self.port, &self.outbound, &self.stats);
        self.mac.apply(disposition);
    }

    fn forward(&mut self, telegram: Telegram) {
        if self.inbound.try_send(telegram).is_err() {
            error!("inbound queue full, dropping telegram");
        }
    }
}

#[cfg(test)]
mod engine_tests {
    use super::StopToken;

    #[test]
    fn test_stop_token_shared() {
        let token = StopToken::new();
        let clone = token.clone();
        assert!(!clone.is_stopped());
        token.stop();
        assert!(clone.is_stopped());
    }
}
