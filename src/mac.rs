//! The bus arbitration (MAC) state machine.
//!
//! The master polls each device in turn by sending a one-byte bus assign
//! with bit 7 set. The polled device may then:
//! - broadcast a telegram (destination `0x00`, nobody answers),
//! - write to another device (acknowledged with a one-byte `0x01`),
//! - read another device (destination ORed with `0x80`, the answer follows
//!   immediately),
//! and finally gives the bus back by sending its own id as a single byte.
//!
//! [`Mac`] observes every telegram on the line, validates it against the
//! current [`BusState`], counts protocol violations, and tells the engine
//! what to do next ([`Action`]): forward the telegram to the inbound queue,
//! start or continue a transmit window, or both. Forwarded telegrams are
//! pushed without checksum validation; checking here costs latency and
//! risks missing the next poll window.

use log::error;

use crate::parser::{parse_event, EventToken, Header};
use crate::stats::Stats;
use crate::telegram::{Telegram, HEADER_LEN};
use crate::types::{DeviceId, MASTER_ID};

/// The MAC acknowledgement byte.
pub const ACK_VALUE: u8 = 0x01;

/// Whose turn it is on the bus, as far as this engine observed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BusState {
    /// Nobody holds the bus (only the master may send).
    Released,
    /// A device has been polled and may transmit.
    Assigned,
    /// The polled device sent a write and awaits the ACK.
    Wrote,
    /// The polled device sent a read request and awaits the answer.
    Read,
}

/// What the engine must do after [`Mac::on_telegram`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing further.
    None,
    /// Push the telegram to the inbound queue.
    Forward,
    /// The master granted us the bus: open a transmit window and send.
    Acquire,
    /// We may send (again) within the current window.
    Transmit,
    /// Send first (the poll window is time-critical), then forward.
    TransmitThenForward,
}

/// How a transmit attempt left the bus; applied back onto the state
/// machine by the engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TxDisposition {
    /// Nothing sent, a release reply sent, or the attempt failed.
    Released,
    /// A write went out; the ACK is expected next.
    Wrote,
    /// A read request went out; the answer must carry this header.
    Read([u8; HEADER_LEN]),
}

/// The arbitration state machine. Owns [`BusState`], the polled id and the
/// pending read expectation; nothing else mutates them.
#[derive(Debug)]
pub struct Mac {
    state: BusState,
    polled_id: Option<DeviceId>,
    read_expected: Option<[u8; HEADER_LEN]>,
    client_id: DeviceId,
}

impl Mac {
    pub fn new(client_id: DeviceId) -> Self {
        Self {
            state: BusState::Released,
            polled_id: None,
            read_expected: None,
            client_id,
        }
    }

    pub fn state(&self) -> BusState {
        self.state
    }

    pub fn polled_id(&self) -> Option<DeviceId> {
        self.polled_id
    }

    pub fn client_id(&self) -> DeviceId {
        self.client_id
    }

    /// Process one observed telegram and decide what the engine does next.
    #[must_use]
    pub fn on_telegram(&mut self, telegram: &Telegram, stats: &Stats) -> Action {
        match parse_event(telegram.as_bytes()) {
            EventToken::Ack => self.on_ack(stats),
            EventToken::Release(id) => self.on_release(id, stats),
            EventToken::Assign(id) => self.on_assign(id, stats),
            EventToken::UnknownMac(byte) => {
                error!("ignored unknown MAC byte {:#04x}", byte);
                stats.count_mac_error();
                Action::None
            }
            EventToken::Short => {
                stats.count_rx_total();
                error!("ignored short telegram ({} bytes)", telegram.len());
                if self.state == BusState::Wrote || self.state == BusState::Read {
                    self.state = BusState::Assigned;
                }
                stats.count_rx_short();
                Action::None
            }
            EventToken::Data(header) => self.on_data(header, stats),
        }
    }

    /// Apply the outcome of a transmit attempt.
    pub fn apply(&mut self, disposition: TxDisposition) {
        match disposition {
            TxDisposition::Released => self.state = BusState::Released,
            TxDisposition::Wrote => self.state = BusState::Wrote,
            TxDisposition::Read(expected) => {
                self.read_expected = Some(expected);
                self.state = BusState::Read;
            }
        }
    }

    fn polled_raw(&self) -> u8 {
        self.polled_id.map_or(0, DeviceId::get)
    }

    fn expected_matches(&self, header: &Header) -> bool {
        self.read_expected
            == Some([
                header.src,
                header.dest_raw,
                header.msg_type,
                header.offset,
            ])
    }

    fn on_ack(&mut self, stats: &Stats) -> Action {
        if self.state != BusState::Wrote {
            error!(
                "ACK without a prior write from {:#04x}",
                self.polled_raw()
            );
            stats.count_mac_error();
        }
        if self.polled_id == Some(self.client_id) {
            // Our write went through; we may send the next telegram.
            Action::Transmit
        } else {
            self.state = BusState::Assigned;
            Action::None
        }
    }

    fn on_release(&mut self, id: u8, stats: &Stats) -> Action {
        if self.state != BusState::Assigned {
            error!("bus release from {:#04x} without a prior poll", id);
            stats.count_mac_error();
        }
        self.polled_id = None;
        self.state = BusState::Released;
        Action::None
    }

    fn on_assign(&mut self, id: u8, stats: &Stats) -> Action {
        // Assigned is also legal here: the previously polled device may not
        // exist and never sends its release.
        if self.state != BusState::Released && self.state != BusState::Assigned {
            error!(
                "bus assign to {:#04x} without a prior release from {:#04x}",
                id,
                self.polled_raw()
            );
            stats.count_mac_error();
        }
        let id = DeviceId::masked(id);
        self.polled_id = Some(id);
        if id == self.client_id {
            Action::Acquire
        } else {
            self.state = BusState::Assigned;
            Action::None
        }
    }

    fn on_data(&mut self, header: Header, stats: &Stats) -> Action {
        stats.count_rx_total();
        let mut action = Action::Forward;

        // The master never polls itself, so it may send whenever the bus is
        // free. Bus timeouts are not modelled here, so the master can also
        // legitimately show up while this engine still believes the bus is
        // assigned. Accept its telegrams and resynchronize, unless this is
        // the read answer the master owes a device.
        if header.src == MASTER_ID.get()
            && !(self.state == BusState::Read && self.expected_matches(&header))
        {
            self.state = BusState::Released;
        } else if self.state == BusState::Assigned {
            if Some(header.src) != self.polled_id.map(DeviceId::get)
                && header.src != MASTER_ID.get()
            {
                error!(
                    "ignored telegram from {:#04x} instead of polled {:#04x}",
                    header.src,
                    self.polled_raw()
                );
                stats.count_rx_sender();
                return Action::None;
            }
            let dest = header.dest_raw & 0x7f;
            if header.dest_raw & 0x80 != 0 {
                if dest < 0x08 {
                    error!(
                        "ignored read from {:#04x} to invalid address {:#04x}",
                        header.src, dest
                    );
                    stats.count_rx_format();
                    return Action::None;
                }
                // The answer follows immediately, with this header.
                self.read_expected =
                    Some([dest, header.src, header.msg_type, header.offset]);
                self.state = BusState::Read;
            } else {
                if dest > 0x00 && dest < 0x08 {
                    error!(
                        "ignored write from {:#04x} to invalid address {:#04x}",
                        header.src, dest
                    );
                    stats.count_rx_format();
                    return Action::None;
                }
                if dest >= 0x08 {
                    self.state = BusState::Wrote;
                }
                // A broadcast changes nothing; only forward it.
            }
        } else if self.state == BusState::Read {
            self.state = BusState::Assigned;
            if !self.expected_matches(&header) {
                error!(
                    "ignored unexpected read answer header {:02x} {:02x} {:02x} {:02x}",
                    header.src, header.dest_raw, header.msg_type, header.offset
                );
                stats.count_rx_format();
                return Action::None;
            }
            if self.polled_id == Some(self.client_id) {
                action = Action::TransmitThenForward;
            }
        } else if self.state == BusState::Wrote {
            error!(
                "telegram from {:#04x} while waiting for a write ACK",
                header.src
            );
            stats.count_rx_sender();
            return Action::None;
        } else if header.src != MASTER_ID.get() {
            error!(
                "telegram from {:#04x} while the bus is not assigned",
                header.src
            );
            stats.count_rx_sender();
            return Action::None;
        }

        stats.count_rx_success();
        action
    }
}

#[cfg(test)]
mod mac_tests {
    use super::{Action, BusState, Mac, TxDisposition};
    use crate::stats::Stats;
    use crate::telegram::Telegram;
    use crate::types::device_id;

    fn telegram(bytes: &[u8]) -> Telegram {
        Telegram::from_bytes(bytes).unwrap()
    }

    fn mac_in_state(state: BusState) -> Mac {
        // The client id is chosen so none of the generic events address us.
        let mut mac = Mac::new(device_id(0x0c));
        mac.state = state;
        mac.polled_id = Some(device_id(0x0b));
        mac
    }

    const ALL_STATES: [BusState; 4] = [
        BusState::Released,
        BusState::Assigned,
        BusState::Wrote,
        BusState::Read,
    ];

    #[test]
    fn test_ack_from_all_states() {
        for state in ALL_STATES {
            let mut mac = mac_in_state(state);
            let stats = Stats::default();
            let action = mac.on_telegram(&telegram(&[0x01]), &stats);
            assert_eq!(action, Action::None);
            assert_eq!(mac.state(), BusState::Assigned);
            let expect_error = u32::from(state != BusState::Wrote);
            assert_eq!(stats.snapshot().rx_mac_errors, expect_error, "{:?}", state);
        }
    }

    #[test]
    fn test_release_from_all_states() {
        for state in ALL_STATES {
            let mut mac = mac_in_state(state);
            let stats = Stats::default();
            let action = mac.on_telegram(&telegram(&[0x0b]), &stats);
            assert_eq!(action, Action::None);
            assert_eq!(mac.state(), BusState::Released);
            assert_eq!(mac.polled_id(), None);
            let expect_error = u32::from(state != BusState::Assigned);
            assert_eq!(stats.snapshot().rx_mac_errors, expect_error, "{:?}", state);
        }
    }

    #[test]
    fn test_assign_from_all_states() {
        for state in ALL_STATES {
            let mut mac = mac_in_state(state);
            let stats = Stats::default();
            let action = mac.on_telegram(&telegram(&[0x8b]), &stats);
            assert_eq!(action, Action::None);
            assert_eq!(mac.state(), BusState::Assigned);
            assert_eq!(mac.polled_id(), Some(device_id(0x0b)));
            let invalid = state == BusState::Wrote || state == BusState::Read;
            assert_eq!(stats.snapshot().rx_mac_errors, u32::from(invalid), "{:?}", state);
        }
    }

    #[test]
    fn test_unknown_mac_byte() {
        for byte in [0x00, 0x02, 0x07] {
            let mut mac = mac_in_state(BusState::Released);
            let stats = Stats::default();
            assert_eq!(mac.on_telegram(&telegram(&[byte]), &stats), Action::None);
            assert_eq!(stats.snapshot().rx_mac_errors, 1);
            assert_eq!(mac.state(), BusState::Released);
        }
    }

    #[test]
    fn test_assign_release_scenario() {
        // Poll of device 0x0b observed from the outside.
        let mut mac = Mac::new(device_id(0x0c));
        let stats = Stats::default();
        assert_eq!(mac.on_telegram(&telegram(&[0x8b]), &stats), Action::None);
        assert_eq!(mac.state(), BusState::Assigned);
        assert_eq!(mac.polled_id(), Some(device_id(0x0b)));
        assert_eq!(mac.on_telegram(&telegram(&[0x0b]), &stats), Action::None);
        assert_eq!(mac.state(), BusState::Released);
        assert_eq!(mac.polled_id(), None);
        assert_eq!(stats.snapshot().rx_mac_errors, 0);
    }

    #[test]
    fn test_assign_to_us_acquires() {
        let mut mac = Mac::new(device_id(0x0b));
        let stats = Stats::default();
        assert_eq!(mac.on_telegram(&telegram(&[0x8b]), &stats), Action::Acquire);
        assert_eq!(mac.polled_id(), Some(device_id(0x0b)));
    }

    #[test]
    fn test_ack_for_us_transmits_again() {
        let mut mac = Mac::new(device_id(0x0b));
        let stats = Stats::default();
        let _ = mac.on_telegram(&telegram(&[0x8b]), &stats);
        mac.apply(TxDisposition::Wrote);
        assert_eq!(mac.on_telegram(&telegram(&[0x01]), &stats), Action::Transmit);
        assert_eq!(stats.snapshot().rx_mac_errors, 0);
    }

    #[test]
    fn test_short_telegram_counts_and_resets() {
        for state in ALL_STATES {
            let mut mac = mac_in_state(state);
            let stats = Stats::default();
            let action = mac.on_telegram(&telegram(&[0x0b, 0x08, 0xf0]), &stats);
            assert_eq!(action, Action::None);
            let s = stats.snapshot();
            assert_eq!(s.rx_total, 1);
            assert_eq!(s.rx_short, 1);
            assert_eq!(s.rx_success, 0);
            let expected = match state {
                BusState::Wrote | BusState::Read => BusState::Assigned,
                other => other,
            };
            assert_eq!(mac.state(), expected);
        }
    }

    #[test]
    fn test_broadcast_forwarded_without_state_change() {
        let mut mac = mac_in_state(BusState::Assigned);
        let stats = Stats::default();
        let t = telegram(&[0x0b, 0x00, 0xe4, 0x00, 0x01, 0xf4, 0x00]);
        assert_eq!(mac.on_telegram(&t, &stats), Action::Forward);
        assert_eq!(mac.state(), BusState::Assigned);
        assert_eq!(stats.snapshot().rx_success, 1);
    }

    #[test]
    fn test_write_sets_wrote() {
        let mut mac = mac_in_state(BusState::Assigned);
        let stats = Stats::default();
        let t = telegram(&[0x0b, 0x10, 0x3d, 0x00, 0x2a, 0x00]);
        assert_eq!(mac.on_telegram(&t, &stats), Action::Forward);
        assert_eq!(mac.state(), BusState::Wrote);
    }

    #[test]
    fn test_read_request_sets_expectation() {
        let mut mac = mac_in_state(BusState::Assigned);
        let stats = Stats::default();
        let request = telegram(&[0x0b, 0x90, 0x3d, 0x00, 0x0c, 0x00]);
        assert_eq!(mac.on_telegram(&request, &stats), Action::Forward);
        assert_eq!(mac.state(), BusState::Read);

        // The matching answer is forwarded and re-arms the assigned state.
        let answer = telegram(&[0x10, 0x0b, 0x3d, 0x00, 0x2a, 0x00]);
        assert_eq!(mac.on_telegram(&answer, &stats), Action::Forward);
        assert_eq!(mac.state(), BusState::Assigned);
        assert_eq!(stats.snapshot().rx_success, 2);
    }

    #[test]
    fn test_mismatched_read_answer_dropped() {
        let mut mac = mac_in_state(BusState::Assigned);
        let stats = Stats::default();
        let request = telegram(&[0x0b, 0x90, 0x3d, 0x00, 0x0c, 0x00]);
        let _ = mac.on_telegram(&request, &stats);
        let wrong = telegram(&[0x10, 0x0b, 0x06, 0x00, 0x2a, 0x00]);
        assert_eq!(mac.on_telegram(&wrong, &stats), Action::None);
        assert_eq!(mac.state(), BusState::Assigned);
        assert_eq!(stats.snapshot().rx_format, 1);
    }

    #[test]
    fn test_wrong_sender_dropped() {
        let mut mac = mac_in_state(BusState::Assigned);
        let stats = Stats::default();
        let t = telegram(&[0x21, 0x00, 0xe4, 0x00, 0x01, 0xf4]);
        assert_eq!(mac.on_telegram(&t, &stats), Action::None);
        assert_eq!(stats.snapshot().rx_sender, 1);
        assert_eq!(stats.snapshot().rx_success, 0);
    }

    #[test]
    fn test_reserved_destination_dropped() {
        let mut mac = mac_in_state(BusState::Assigned);
        let stats = Stats::default();
        let read = telegram(&[0x0b, 0x87, 0x3d, 0x00, 0x0c, 0x00]);
        assert_eq!(mac.on_telegram(&read, &stats), Action::None);
        let write = telegram(&[0x0b, 0x07, 0x3d, 0x00, 0x0c, 0x00]);
        assert_eq!(mac.on_telegram(&write, &stats), Action::None);
        assert_eq!(stats.snapshot().rx_format, 2);
    }

    #[test]
    fn test_master_preempts() {
        for state in [BusState::Assigned, BusState::Wrote, BusState::Read] {
            let mut mac = mac_in_state(state);
            let stats = Stats::default();
            let t = telegram(&[0x08, 0x00, 0xe5, 0x00, 0xa6, 0x00]);
            assert_eq!(mac.on_telegram(&t, &stats), Action::Forward);
            assert_eq!(mac.state(), BusState::Released);
            assert_eq!(stats.snapshot().rx_success, 1);
        }
    }

    #[test]
    fn test_master_read_answer_not_preempted() {
        // A device reads from the master: the answer comes from 0x08 and
        // must be matched against the expectation, not treated as preemption.
        let mut mac = mac_in_state(BusState::Assigned);
        let stats = Stats::default();
        let request = telegram(&[0x0b, 0x88, 0x14, 0x00, 0x03, 0x00]);
        let _ = mac.on_telegram(&request, &stats);
        assert_eq!(mac.state(), BusState::Read);
        let answer = telegram(&[0x08, 0x0b, 0x14, 0x00, 0x01, 0x02, 0x03, 0x00]);
        assert_eq!(mac.on_telegram(&answer, &stats), Action::Forward);
        assert_eq!(mac.state(), BusState::Assigned);
    }

    #[test]
    fn test_data_while_released_dropped() {
        let mut mac = Mac::new(device_id(0x0c));
        let stats = Stats::default();
        let t = telegram(&[0x10, 0x00, 0x06, 0x00, 0x18, 0x07]);
        assert_eq!(mac.on_telegram(&t, &stats), Action::None);
        assert_eq!(stats.snapshot().rx_sender, 1);
    }

    #[test]
    fn test_data_while_wrote_dropped() {
        let mut mac = mac_in_state(BusState::Wrote);
        let stats = Stats::default();
        let t = telegram(&[0x0b, 0x00, 0xe4, 0x00, 0x01, 0xf4]);
        assert_eq!(mac.on_telegram(&t, &stats), Action::None);
        assert_eq!(mac.state(), BusState::Wrote);
        assert_eq!(stats.snapshot().rx_sender, 1);
    }
}
