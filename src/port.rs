//! Abstract access to the serial line. The engine needs exactly three
//! things from a port: a bounded wait for the next byte, a byte write, and
//! the parity toggle used to emit the BREAK. Opening and configuring the
//! physical device stays with the embedder.

use core::fmt::Debug;
use core::time::Duration;

/// Longest the engine waits for a byte, an echo or the BREAK
/// acknowledgement. Every suspension point on the line is bounded by this.
pub const READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Byte-level serial line access.
pub trait EmsPort {
    type Error: Debug;

    /// Wait up to `timeout` for the next byte. Returns `Ok(None)` when the
    /// wait elapsed without data.
    fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, Self::Error>;

    /// Write a single byte to the line.
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Enable or disable the parity bit on transmitted bytes. A `0x00`
    /// written with parity enabled comes out as the BREAK; the UART cannot
    /// send a ninth data bit, so even parity stands in for it.
    fn set_break_parity(&mut self, enabled: bool) -> Result<(), Self::Error>;
}
