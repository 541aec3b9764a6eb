//! Line framing: the EMS bus has no start/stop bytes, telegrams end with an
//! electrical BREAK. On the receive side the UART surfaces that as an escape
//! sequence: a literal `0xff` followed by `0x00` announces that the next
//! byte carried a parity mark, and a parity-marked `0x00` is the BREAK. A
//! doubled `0xff 0xff` collapses to one `0xff` data byte.

use arrayvec::ArrayVec;
use core::mem;
use log::{trace, warn};

use crate::port::EmsPort;
use crate::telegram::{Telegram, MAX_TELEGRAM_SIZE};

/// What the line reads back after a BREAK was written.
pub const BREAK_ECHO: [u8; 3] = [0xff, 0x00, 0x00];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Escape {
    /// Plain data bytes.
    Clear,
    /// A `0xff` was seen; the next byte decides what it meant.
    Prefix,
    /// `0xff 0x00` was seen; the next byte carries a parity mark.
    Marked,
}

/// Incremental telegram framer. Feed it raw line bytes one at a time;
/// it yields a [`Telegram`] whenever a BREAK terminates a non-empty
/// byte sequence.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: ArrayVec<u8, MAX_TELEGRAM_SIZE>,
    escape: Escape,
    overflowed: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buf: ArrayVec::new(),
            escape: Escape::Clear,
            overflowed: false,
        }
    }

    /// Consume one byte from the line. Returns the completed telegram when
    /// `byte` turns out to be the BREAK.
    pub fn push_byte(&mut self, byte: u8) -> Option<Telegram> {
        match self.escape {
            Escape::Clear => {
                if byte == 0xff {
                    self.escape = Escape::Prefix;
                    return None;
                }
            }
            Escape::Prefix => {
                if byte == 0x00 {
                    self.escape = Escape::Marked;
                    return None;
                }
                self.escape = Escape::Clear;
                if byte != 0xff {
                    // Neither a mark nor a doubled 0xff. Cannot be; drop it.
                    trace!("dropping invalid escape sequence ff {:02x}", byte);
                    return None;
                }
                // A doubled 0xff is a single data byte.
            }
            Escape::Marked => {
                self.escape = Escape::Clear;
                if byte == 0x00 {
                    // Parity-marked 0x00: the BREAK ends the telegram.
                    return self.complete();
                }
                // Other bytes are never sent with a parity mark; keep it
                // as data anyway.
                warn!("parity-marked byte {:02x} inside telegram", byte);
            }
        }
        self.store(byte);
        None
    }

    fn store(&mut self, byte: u8) {
        if self.buf.try_push(byte).is_err() {
            if !self.overflowed {
                warn!(
                    "maximum telegram size reached, ignoring further bytes. \
                     Is the serial line detecting breaks?"
                );
                self.overflowed = true;
            }
        }
    }

    fn complete(&mut self) -> Option<Telegram> {
        self.overflowed = false;
        let bytes = mem::take(&mut self.buf);
        if bytes.is_empty() {
            // Consecutive BREAKs on an idle line.
            None
        } else {
            Some(Telegram::from_vec(bytes))
        }
    }
}

/// Terminate a transmission: a single zero byte written with the line
/// parity toggled comes out as the BREAK, then the parity is restored.
pub fn send_break<P: EmsPort>(port: &mut P) -> Result<(), P::Error> {
    port.set_break_parity(true)?;
    trace!("WR 00 (break)");
    port.write_byte(0x00)?;
    port.set_break_parity(false)
}
