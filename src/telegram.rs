//! The EMS telegram: a 1 to 32 byte sequence as it appears between two
//! BREAKs on the bus.
//!
//! Data telegrams are at least [`MIN_DATA_LEN`] bytes: source id,
//! destination id (bit 7 = read request), message type, payload bytes and a
//! trailing checksum. A single byte is a MAC control telegram (poll, bus
//! release or ACK).

use arrayvec::ArrayVec;
use core::fmt;
use snafu::ensure;

use crate::types::{DeviceId, Error, InvalidTelegramLengthSnafu};

/// Longest telegram the bus carries.
pub const MAX_TELEGRAM_SIZE: usize = 32;
/// Source, destination, type and offset bytes.
pub const HEADER_LEN: usize = 4;
/// Anything shorter than this is not decodable as data.
pub const MIN_DATA_LEN: usize = 6;

type TelegramBytes = ArrayVec<u8, MAX_TELEGRAM_SIZE>;

/// One complete telegram, with named accessors instead of raw offset
/// arithmetic. All accessors beyond byte 0 are bounds-checked and return
/// `None` past the end of the telegram.
///
/// ## Example
/// ```
/// use ems_proto::Telegram;
/// let t = Telegram::from_bytes(&[0x08, 0x00, 0xbf, 0x00, 0x5f, 0x00]).unwrap();
/// assert_eq!(t.source(), 0x08);
/// assert_eq!(t.dest(), Some(0x00));
/// assert_eq!(t.msg_type(), Some(0xbf));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telegram {
    bytes: TelegramBytes,
}

impl Telegram {
    /// Copy `bytes` into a new telegram.
    /// # Errors
    /// Returns [`Error::InvalidTelegramLength`] unless `1 <= len <= 32`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        ensure!(
            !bytes.is_empty() && bytes.len() <= MAX_TELEGRAM_SIZE,
            InvalidTelegramLengthSnafu
        );
        let mut buf = TelegramBytes::new();
        // Length was checked above.
        let _ = buf.try_extend_from_slice(bytes);
        Ok(Self { bytes: buf })
    }

    pub(crate) fn from_vec(bytes: TelegramBytes) -> Self {
        debug_assert!(!bytes.is_empty());
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// A one-byte telegram is a MAC control byte, not data.
    pub fn is_mac(&self) -> bool {
        self.len() == 1
    }

    /// The sending device id (or the MAC control byte itself).
    pub fn source(&self) -> u8 {
        self.bytes[0]
    }

    /// The destination byte as transmitted, including the read-request flag.
    pub fn dest_raw(&self) -> Option<u8> {
        self.data_at(1)
    }

    /// The destination id with the read-request flag stripped.
    pub fn dest(&self) -> Option<u8> {
        self.dest_raw().map(|d| d & 0x7f)
    }

    /// True if bit 7 of the destination marks this telegram as a read
    /// request.
    pub fn is_read_request(&self) -> bool {
        matches!(self.dest_raw(), Some(d) if d & 0x80 != 0)
    }

    /// The message type byte.
    pub fn msg_type(&self) -> Option<u8> {
        self.data_at(2)
    }

    /// The first payload byte, used as a page offset by monitor telegrams.
    pub fn offset(&self) -> Option<u8> {
        self.data_at(3)
    }

    /// The byte at `offset`, if the telegram is long enough.
    pub fn data_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(offset).copied()
    }

    /// The trailing checksum byte of a data telegram.
    pub fn check_byte(&self) -> Option<u8> {
        if self.len() >= MIN_DATA_LEN {
            self.bytes.last().copied()
        } else {
            None
        }
    }

    /// Validate the trailing checksum. The receive path never calls this
    /// (validation would risk missing the next poll window); it is offered
    /// to consumers that want it.
    pub fn crc_ok(&self) -> bool {
        match self.check_byte() {
            Some(check) => crc8(&self.bytes[..self.len() - 1]) == check,
            None => false,
        }
    }

    /// Prepare the telegram for transmit: set byte 0 to our id and write
    /// the checksum into the last byte. Only meaningful for data telegrams.
    pub fn stamp(&mut self, source: DeviceId) {
        debug_assert!(self.len() >= MIN_DATA_LEN);
        self.bytes[0] = source.get();
        let last = self.len() - 1;
        self.bytes[last] = crc8(&self.bytes[..last]);
    }
}

impl fmt::Display for Telegram {
    /// Hex dump with the header and the checksum visually separated, e.g.
    /// `08 00 bf 00  04 13  bb`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.len();
        for (i, byte) in self.bytes.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02x}", byte)?;
            if (i + 1 == HEADER_LEN || i + 2 == len) && i + 1 < len {
                write!(f, " ")?;
            }
        }
        Ok(())
    }
}

/// The 8-bit checksum used on the EMS bus: shift left with the carry fed
/// back into bit 0, xoring in polynomial `0x0C` on carry, over every byte
/// except the trailing checksum slot.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;
    for &byte in data {
        let carry = crc & 0x80 != 0;
        if carry {
            crc ^= 0x0c;
        }
        crc = (crc << 1) & 0xfe;
        if carry {
            crc |= 0x01;
        }
        crc ^= byte;
    }
    crc
}

#[cfg(test)]
mod telegram_tests {
    use super::{crc8, Telegram, MAX_TELEGRAM_SIZE};
    use crate::types::device_id;

    #[test]
    fn test_length_bounds() {
        assert!(Telegram::from_bytes(&[]).is_err());
        assert!(Telegram::from_bytes(&[0u8; MAX_TELEGRAM_SIZE + 1]).is_err());
        assert_eq!(Telegram::from_bytes(&[0x01]).unwrap().len(), 1);
        assert_eq!(
            Telegram::from_bytes(&[0u8; MAX_TELEGRAM_SIZE]).unwrap().len(),
            MAX_TELEGRAM_SIZE
        );
    }

    #[test]
    fn test_accessors() {
        let t = Telegram::from_bytes(&[0x10, 0x8b, 0x3d, 0x02, 0x2a, 0x00]).unwrap();
        assert!(!t.is_mac());
        assert_eq!(t.source(), 0x10);
        assert_eq!(t.dest_raw(), Some(0x8b));
        assert_eq!(t.dest(), Some(0x0b));
        assert!(t.is_read_request());
        assert_eq!(t.msg_type(), Some(0x3d));
        assert_eq!(t.offset(), Some(0x02));
        assert_eq!(t.data_at(4), Some(0x2a));
        assert_eq!(t.data_at(6), None);

        let mac = Telegram::from_bytes(&[0x01]).unwrap();
        assert!(mac.is_mac());
        assert_eq!(mac.dest_raw(), None);
        assert!(!mac.is_read_request());
        assert_eq!(mac.check_byte(), None);
    }

    #[test]
    fn test_stamp_round_trip() {
        // The working-mode read command a client would queue: destination
        // and payload survive stamping, source and checksum are rewritten.
        let mut t = Telegram::from_bytes(&[0x00, 0x90, 0x3d, 0x00, 0x2a, 0x00, 0x00]).unwrap();
        t.stamp(device_id(0x0b));
        assert_eq!(t.source(), 0x0b);
        assert_eq!(t.dest(), Some(0x10));
        assert!(t.is_read_request());
        assert_eq!(t.msg_type(), Some(0x3d));
        assert_eq!(t.data_at(4), Some(0x2a));
        assert_eq!(t.check_byte(), Some(0x0d));
        assert!(t.crc_ok());
    }

    #[test]
    fn test_crc8_stability() {
        assert_eq!(crc8(&[]), 0x00);
        assert_eq!(crc8(&[0x80, 0x00]), 0x19);
        assert_eq!(crc8(&[0x0b, 0x90, 0x3d, 0x00, 0x2a, 0x00]), 0x0d);
        // Stable across repeated computation of the identical payload.
        let payload = [0x08, 0x00, 0xe4, 0x00, 0x01, 0xf4];
        assert_eq!(crc8(&payload), crc8(&payload));
    }

    #[test]
    fn test_crc_mismatch_detected() {
        let mut t = Telegram::from_bytes(&[0x00, 0x10, 0x3d, 0x00, 0x2a, 0x00, 0x00]).unwrap();
        t.stamp(device_id(0x0b));
        assert!(t.crc_ok());
        let mut corrupted = t.as_bytes().to_vec();
        corrupted[4] ^= 0x01;
        assert!(!Telegram::from_bytes(&corrupted).unwrap().crc_ok());
    }

    #[test]
    fn test_display_grouping() {
        let t = Telegram::from_bytes(&[0x08, 0x00, 0xbf, 0x00, 0x04, 0x13, 0xbb]).unwrap();
        assert_eq!(format!("{}", t), "08 00 bf 00  04 13  bb");
        let mac = Telegram::from_bytes(&[0x8b]).unwrap();
        assert_eq!(format!("{}", mac), "8b");
    }
}
