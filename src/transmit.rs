//! Telegram transmission inside our poll window.
//!
//! Every byte we put on the wire is echoed back by the bus hardware; the
//! echo is verified before the next byte goes out, and a mismatch aborts
//! the attempt (somebody else was sending at the same time). A complete
//! telegram is closed with a line break, which the master acknowledges by
//! echoing [`BREAK_ECHO`].

use std::time::{Duration, Instant};

use log::{debug, error, trace};

use crate::framer::{send_break, BREAK_ECHO};
use crate::mac::TxDisposition;
use crate::port::{EmsPort, READ_TIMEOUT};
use crate::queue::PacketQueue;
use crate::stats::Stats;
use crate::telegram::{Telegram, MIN_DATA_LEN};
use crate::types::DeviceId;

/// How often a telegram is retried before it is dropped.
pub const MAX_TX_RETRIES: u8 = 5;

/// How long we may keep the bus after a poll before falling silent.
pub const MAX_BUS_TIME: Duration = Duration::from_millis(200);

#[derive(Debug)]
struct TxAttempt {
    telegram: Telegram,
    retries: u8,
}

/// Sends queued telegrams whenever the master polls us and reports how
/// each attempt left the bus.
#[derive(Debug)]
pub struct Transmitter {
    client_id: DeviceId,
    attempt: Option<TxAttempt>,
    window: Option<Instant>,
}

impl Transmitter {
    pub fn new(client_id: DeviceId) -> Self {
        Self {
            client_id,
            attempt: None,
            window: None,
        }
    }

    /// Mark the instant the master handed us the bus.
    pub fn open_window(&mut self) {
        self.window = Some(Instant::now());
    }

    /// We hold the bus: send the pending telegram, or give the bus back
    /// with a one-byte release reply.
    pub fn handle_poll<P: EmsPort>(
        &mut self,
        port: &mut P,
        outbound: &PacketQueue,
        stats: &Stats,
    ) -> TxDisposition {
        if let Some(attempt) = &self.attempt {
            if attempt.retries > MAX_TX_RETRIES {
                error!(
                    "transmit failed {} times, dropping telegram",
                    attempt.retries
                );
                stats.count_tx_fail();
                self.attempt = None;
            }
        }
        if self.attempt.is_none() {
            if let Some(mut telegram) = outbound.try_recv() {
                if telegram.len() >= MIN_DATA_LEN {
                    telegram.stamp(self.client_id);
                }
                self.attempt = Some(TxAttempt {
                    telegram,
                    retries: 0,
                });
            }
        }

        let held = self.window.map_or(Duration::MAX, |since| since.elapsed());

        match self.attempt.take() {
            Some(attempt) if held < MAX_BUS_TIME => {
                stats.count_tx_total();
                debug!("TX {}", attempt.telegram);
                if send_frame(port, attempt.telegram.as_bytes()) {
                    self.complete_send(port, &attempt.telegram)
                } else {
                    error!(
                        "transmit failed, retry {}/{}",
                        attempt.retries, MAX_TX_RETRIES
                    );
                    self.attempt = Some(TxAttempt {
                        retries: attempt.retries + 1,
                        telegram: attempt.telegram,
                    });
                    TxDisposition::Released
                }
            }
            other => {
                // Nothing to send, or the window is over.
                self.attempt = other;
                self.send_release(port);
                TxDisposition::Released
            }
        }
    }

    fn complete_send<P: EmsPort>(
        &mut self,
        port: &mut P,
        telegram: &Telegram,
    ) -> TxDisposition {
        match telegram.dest_raw() {
            None | Some(0x00) => {
                // Nobody answers a broadcast; the window ends here.
                self.send_release(port);
                TxDisposition::Released
            }
            Some(dest) if dest & 0x80 != 0 => TxDisposition::Read([
                dest & 0x7f,
                telegram.source(),
                telegram.msg_type().unwrap_or(0),
                telegram.offset().unwrap_or(0),
            ]),
            Some(_) => TxDisposition::Wrote,
        }
    }

    fn send_release<P: EmsPort>(&mut self, port: &mut P) {
        trace!("TX release {}", self.client_id);
        if !send_frame(port, &[self.client_id.get()]) {
            error!("poll release reply failed");
        }
    }
}

fn send_frame<P: EmsPort>(port: &mut P, bytes: &[u8]) -> bool {
    for &byte in bytes {
        if !send_byte(port, byte) {
            return false;
        }
    }
    if let Err(e) = send_break(port) {
        error!("sending break failed: {:?}", e);
        return false;
    }
    expect_break_echo(port)
}

fn send_byte<P: EmsPort>(port: &mut P, byte: u8) -> bool {
    trace!("WR {:02x}", byte);
    if let Err(e) = port.write_byte(byte) {
        error!("write failed: {:?}", e);
        return false;
    }
    if !expect_echo(port, byte) {
        return false;
    }
    // Parity escaping doubles a 0xff on the wire.
    if byte == 0xff && !expect_echo(port, 0xff) {
        return false;
    }
    true
}

fn expect_echo<P: EmsPort>(port: &mut P, expected: u8) -> bool {
    match port.read_byte(READ_TIMEOUT) {
        Ok(Some(echo)) => {
            trace!("RD {:02x}", echo);
            if echo == expected {
                true
            } else {
                error!(
                    "echo mismatch: sent {:#04x} but read {:#04x}",
                    expected, echo
                );
                false
            }
        }
        Ok(None) => {
            error!("no echo within {:?}", READ_TIMEOUT);
            false
        }
        Err(e) => {
            error!("read failed while waiting for the echo: {:?}", e);
            false
        }
    }
}

fn expect_break_echo<P: EmsPort>(port: &mut P) -> bool {
    for &expected in BREAK_ECHO.iter() {
        match port.read_byte(READ_TIMEOUT) {
            Ok(Some(byte)) if byte == expected => {}
            _ => {
                error!("telegram not acknowledged by the bus master");
                return false;
            }
        }
    }
    true
}
