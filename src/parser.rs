//! nom parser turning a completed telegram into a bus event token, plus the
//! big-endian field readers the decoder uses.

use nom::branch::alt;
use nom::combinator::{map, verify};
use nom::number::complete::{be_i16, be_u16, be_u24, u8 as any_byte};
use nom::sequence::tuple;
use nom::IResult;

use crate::mac::ACK_VALUE;
use crate::telegram::MIN_DATA_LEN;

type NomError<'a> = nom::error::Error<&'a [u8]>;

/// What a completed telegram means at the MAC layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum EventToken {
    /// The master acknowledged a write.
    Ack,
    /// The named device gives the bus back to the master.
    Release(u8),
    /// The master grants the bus to the id in the low seven bits.
    Assign(u8),
    /// A MAC byte outside the defined ranges.
    UnknownMac(u8),
    /// Too short to be data, too long to be a MAC byte.
    Short,
    /// A data telegram of at least [`MIN_DATA_LEN`] bytes.
    Data(Header),
}

/// The four header bytes of a data telegram.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Header {
    pub src: u8,
    pub dest_raw: u8,
    pub msg_type: u8,
    pub offset: u8,
}

pub(crate) fn parse_event(buf: &[u8]) -> EventToken {
    match buf.len() {
        1 => match mac_event(buf) {
            Ok((_, token)) => token,
            Err(_) => EventToken::UnknownMac(buf[0]),
        },
        l if l < MIN_DATA_LEN => EventToken::Short,
        _ => match header(buf) {
            Ok((_, header)) => EventToken::Data(header),
            Err(_) => EventToken::Short,
        },
    }
}

fn mac_event(buf: &[u8]) -> IResult<&[u8], EventToken> {
    alt((
        map(verify(any_byte, |b: &u8| *b == ACK_VALUE), |_| {
            EventToken::Ack
        }),
        map(
            verify(any_byte, |b: &u8| (0x08..0x80).contains(b)),
            EventToken::Release,
        ),
        map(verify(any_byte, |b: &u8| b & 0x80 != 0), |b| {
            EventToken::Assign(b & 0x7f)
        }),
        map(any_byte, EventToken::UnknownMac),
    ))(buf)
}

fn header(buf: &[u8]) -> IResult<&[u8], Header> {
    map(
        tuple((any_byte, any_byte, any_byte, any_byte)),
        |(src, dest_raw, msg_type, offset)| Header {
            src,
            dest_raw,
            msg_type,
            offset,
        },
    )(buf)
}

/// Big-endian u16 starting at `offset`, `None` past the end.
pub(crate) fn be_u16_at(buf: &[u8], offset: usize) -> Option<u16> {
    let tail = buf.get(offset..)?;
    be_u16::<_, NomError<'_>>(tail).ok().map(|(_, v)| v)
}

/// Big-endian i16 starting at `offset`, for fields that go negative.
pub(crate) fn be_i16_at(buf: &[u8], offset: usize) -> Option<i16> {
    let tail = buf.get(offset..)?;
    be_i16::<_, NomError<'_>>(tail).ok().map(|(_, v)| v)
}

/// Big-endian 3-byte counter starting at `offset`.
pub(crate) fn be_u24_at(buf: &[u8], offset: usize) -> Option<u32> {
    let tail = buf.get(offset..)?;
    be_u24::<_, NomError<'_>>(tail).ok().map(|(_, v)| v)
}
