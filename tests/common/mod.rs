#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use ems_proto::{crc8, EmsPort, BREAK_ECHO};

/// Serial port double. Receive bytes are scripted with the `feed_*`
/// methods; writes are recorded and, with local echo on, mirrored back
/// the way the bus hardware does.
pub struct SimPort {
    rx: VecDeque<u8>,
    written: Vec<u8>,
    echo: bool,
    break_parity: bool,
    fail_read: bool,
    fail_write: bool,
}

impl SimPort {
    pub fn new() -> SimPort {
        SimPort {
            rx: VecDeque::new(),
            written: Vec::new(),
            echo: false,
            break_parity: false,
            fail_read: false,
            fail_write: false,
        }
    }

    pub fn with_echo() -> SimPort {
        SimPort {
            echo: true,
            ..SimPort::new()
        }
    }

    /// Queue raw receive bytes, without any framing.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Queue one telegram as it appears on the wire: `0xff` doubled by the
    /// parity escaping and a break sequence appended.
    pub fn feed_telegram(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.rx.push_back(byte);
            if byte == 0xff {
                self.rx.push_back(0xff);
            }
        }
        self.feed(&BREAK_ECHO);
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    pub fn clear_written(&mut self) {
        self.written.clear();
    }

    /// Fail the next read with an error.
    pub fn trigger_read_error(&mut self) {
        self.fail_read = true;
    }

    /// Fail the next write with an error.
    pub fn trigger_write_error(&mut self) {
        self.fail_write = true;
    }
}

impl EmsPort for SimPort {
    type Error = ();

    fn read_byte(&mut self, _timeout: Duration) -> Result<Option<u8>, ()> {
        if self.fail_read {
            self.fail_read = false;
            return Err(());
        }
        Ok(self.rx.pop_front())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), ()> {
        if self.fail_write {
            self.fail_write = false;
            return Err(());
        }
        self.written.push(byte);
        if self.echo {
            if self.break_parity && byte == 0x00 {
                self.rx.extend(BREAK_ECHO.iter().copied());
            } else {
                self.rx.push_back(byte);
                if byte == 0xff {
                    self.rx.push_back(0xff);
                }
            }
        }
        Ok(())
    }

    fn set_break_parity(&mut self, enabled: bool) -> Result<(), ()> {
        self.break_parity = enabled;
        Ok(())
    }
}

/// Append the EMS check byte to a telegram body.
pub fn with_crc(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    out.push(crc8(bytes));
    out
}
