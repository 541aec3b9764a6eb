//! Bus access and telegram decoding for the EMS heating bus used by
//! Buderus/Bosch boilers and their thermostats.
//!
//! The core is sans-io and usable without `std`: wire framing
//! ([`FrameDecoder`]), bus arbitration ([`Mac`]) and telegram decoding
//! ([`Decoder`]) work on bytes and [`Telegram`]s without touching a port.
//! The `std` feature (on by default) adds the threaded plumbing:
//! [`Engine`] drives a serial port through the [`EmsPort`] trait, forwards
//! telegrams into a bounded [`PacketQueue`] and answers the master's
//! polls; [`DecodeService`] turns forwarded telegrams into [`Readings`].
//!
//! ```
//! use ems_proto::{device_id, Telegram};
//!
//! // A read request for the thermostat working mode, ready to queue.
//! let mut telegram = Telegram::from_bytes(&[0x00, 0x90, 0x3d, 0x00, 0x0c, 0x00]).unwrap();
//! telegram.stamp(device_id(0x0b));
//! assert!(telegram.crc_ok());
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

mod decode;
pub mod devices;
mod framer;
mod mac;
mod parser;
mod port;
mod stats;
mod telegram;
mod types;

#[cfg(feature = "std")]
mod engine;
#[cfg(feature = "std")]
mod queue;
#[cfg(feature = "std")]
mod service;
#[cfg(feature = "std")]
mod transmit;

pub use decode::{BusTime, Decoder, Readings};
pub use framer::{FrameDecoder, BREAK_ECHO};
pub use mac::{Action, BusState, Mac, TxDisposition, ACK_VALUE};
pub use port::{EmsPort, READ_TIMEOUT};
pub use stats::{Stats, StatsSnapshot};
pub use telegram::{crc8, Telegram, HEADER_LEN, MAX_TELEGRAM_SIZE, MIN_DATA_LEN};
pub use types::{
    device_id, DeviceId, Error, IntoDeviceId, BROADCAST_ID, DEFAULT_CLIENT_ID, MASTER_ID,
    THERMOSTAT_ID,
};

#[cfg(feature = "std")]
pub use engine::{Engine, StopToken};
#[cfg(feature = "std")]
pub use queue::{PacketQueue, QUEUE_CAPACITY};
#[cfg(feature = "std")]
pub use service::{DecodeService, Store};
#[cfg(feature = "std")]
pub use stats::Heartbeat;
#[cfg(feature = "std")]
pub use transmit::{MAX_BUS_TIME, MAX_TX_RETRIES};
