//! Receive and transmit counters, and the liveness stamps downstream
//! watchdogs poll.

use core::sync::atomic::{AtomicU32, Ordering};
use log::info;

/// Monotonic bus counters. The bus worker is the only writer; any thread
/// may read. Counters are never reset while the engine runs.
#[derive(Debug, Default)]
pub struct Stats {
    rx_mac_errors: AtomicU32,
    rx_total: AtomicU32,
    rx_success: AtomicU32,
    rx_short: AtomicU32,
    rx_sender: AtomicU32,
    rx_format: AtomicU32,
    /// Reserved: the receive path deliberately skips checksum validation
    /// (see [`crate::mac::Mac`]), so nothing increments this today.
    rx_crc: AtomicU32,
    tx_total: AtomicU32,
    tx_fail: AtomicU32,
}

/// A consistent point-in-time copy of the counters.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub rx_mac_errors: u32,
    pub rx_total: u32,
    pub rx_success: u32,
    pub rx_short: u32,
    pub rx_sender: u32,
    pub rx_format: u32,
    pub rx_crc: u32,
    pub tx_total: u32,
    pub tx_fail: u32,
}

impl Stats {
    fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_mac_error(&self) {
        Self::bump(&self.rx_mac_errors);
    }

    pub(crate) fn count_rx_total(&self) {
        Self::bump(&self.rx_total);
    }

    pub(crate) fn count_rx_success(&self) {
        Self::bump(&self.rx_success);
    }

    pub(crate) fn count_rx_short(&self) {
        Self::bump(&self.rx_short);
    }

    pub(crate) fn count_rx_sender(&self) {
        Self::bump(&self.rx_sender);
    }

    pub(crate) fn count_rx_format(&self) {
        Self::bump(&self.rx_format);
    }

    pub(crate) fn count_tx_total(&self) {
        Self::bump(&self.tx_total);
    }

    pub(crate) fn count_tx_fail(&self) {
        Self::bump(&self.tx_fail);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rx_mac_errors: self.rx_mac_errors.load(Ordering::Relaxed),
            rx_total: self.rx_total.load(Ordering::Relaxed),
            rx_success: self.rx_success.load(Ordering::Relaxed),
            rx_short: self.rx_short.load(Ordering::Relaxed),
            rx_sender: self.rx_sender.load(Ordering::Relaxed),
            rx_format: self.rx_format.load(Ordering::Relaxed),
            rx_crc: self.rx_crc.load(Ordering::Relaxed),
            tx_total: self.tx_total.load(Ordering::Relaxed),
            tx_fail: self.tx_fail.load(Ordering::Relaxed),
        }
    }

    /// Log the counter block, as the engine does on shutdown.
    pub fn log_summary(&self) {
        let s = self.snapshot();
        info!("statistics");
        info!("  RX bus access errors {}", s.rx_mac_errors);
        info!("  RX total             {}", s.rx_total);
        info!("  RX success           {}", s.rx_success);
        info!("  RX too short         {}", s.rx_short);
        info!("  RX wrong sender      {}", s.rx_sender);
        info!("  RX format errors     {}", s.rx_format);
        info!("  TX total             {}", s.tx_total);
        info!("  TX failures          {}", s.tx_fail);
    }
}

/// Unix-seconds stamp refreshed by a worker to signal it is alive.
#[cfg(feature = "std")]
#[derive(Debug, Default)]
pub struct Heartbeat(core::sync::atomic::AtomicU64);

#[cfg(feature = "std")]
impl Heartbeat {
    pub fn touch(&self) {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.0.store(secs, Ordering::Relaxed);
    }

    /// Seconds since the unix epoch at the last refresh, or `None` if the
    /// worker never ran.
    pub fn last(&self) -> Option<u64> {
        match self.0.load(Ordering::Relaxed) {
            0 => None,
            secs => Some(secs),
        }
    }
}
