//! This module defines range-checked types for EMS bus device ids,
//! meant to simplify correct usage of the API.

use snafu::{ensure, OptionExt, Snafu};

use core::convert::{TryFrom, TryInto};
use core::fmt;
use core::ops::Deref;

/// Error type for this crate
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// The value isn't a valid EMS device id.
    #[snafu(display("Invalid device id"))]
    InvalidDeviceId,
    /// The byte sequence can't form a telegram.
    #[snafu(display("Invalid telegram length"))]
    InvalidTelegramLength,
    /// The bounded queue has reached its capacity.
    #[snafu(display("Queue full"))]
    QueueFull,
}

const fn invalid_device_id() -> InvalidDeviceIdSnafu {
    InvalidDeviceIdSnafu
}

pub(crate) const fn queue_full() -> QueueFullSnafu {
    QueueFullSnafu
}

/// `DeviceId` is a range-checked [0x00, 0x7F] integer, representing a bus
/// participant. Device ids are seven bits wide on the wire: bit 7 of the
/// destination byte marks a read request, and bit 7 of a MAC control byte
/// marks a bus assign.
///
/// ## Example
/// ```
/// use ems_proto::DeviceId;
/// use std::convert::TryInto;
/// let id = DeviceId::new(0x0b).unwrap();
/// let id: DeviceId = 0x0b.try_into().unwrap();
/// ```
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct DeviceId(u8);

/// Create a new [`DeviceId`], panics if it is out of range.
pub const fn device_id(id: u8) -> DeviceId {
    if id <= 0x7f {
        return DeviceId(id);
    }
    panic!("Invalid device id.")
}

/// Destination id of broadcast telegrams.
pub const BROADCAST_ID: DeviceId = device_id(0x00);
/// The bus master (the boiler main controller). Only the master assigns
/// the bus.
pub const MASTER_ID: DeviceId = device_id(0x08);
/// The id this engine answers polls under, unless configured otherwise.
pub const DEFAULT_CLIENT_ID: DeviceId = device_id(0x0b);
/// The wall thermostat on a standard installation.
pub const THERMOSTAT_ID: DeviceId = device_id(0x10);

impl DeviceId {
    /// Create a new device id, checking that it fits in seven bits.
    /// # Errors
    /// Returns [`Error::InvalidDeviceId`] if `id` is out of range.
    pub fn new(id: impl TryInto<u8>) -> Result<Self, Error> {
        let id = id.try_into().ok().with_context(invalid_device_id)?;
        ensure!(id <= 0x7f, invalid_device_id());
        Ok(Self(id))
    }

    /// Strip the wire flag bit and take the remaining seven bits as an id.
    pub(crate) const fn masked(byte: u8) -> Self {
        Self(byte & 0x7f)
    }

    /// The raw id byte.
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Deref for DeviceId {
    type Target = u8;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq<u8> for DeviceId {
    fn eq(&self, other: &u8) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Trait to convert `T: TryInto<u8>` into a [`DeviceId`].
pub trait IntoDeviceId {
    /// Convert self to a `DeviceId`.
    /// # Errors
    /// Returns [`Error::InvalidDeviceId`] if self isn't a valid device id.
    fn into_device_id(self) -> Result<DeviceId, Error>;
}

impl IntoDeviceId for DeviceId {
    fn into_device_id(self) -> Result<DeviceId, Error> {
        Ok(self)
    }
}

impl<T> IntoDeviceId for T
where
    T: TryInto<u8>,
{
    fn into_device_id(self) -> Result<DeviceId, Error> {
        DeviceId::new(self)
    }
}

impl TryFrom<u8> for DeviceId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
