//! ## Canopy wire codec
//!
//! Every packet on the wire is a fixed 20-byte big-endian header followed
//! by a US-ASCII body:
//!
//! ```text
//!  __________________________________________________________________
//! |  Version (2 bytes)  |  Type (2 bytes)  |  Body length (4 bytes)  |
//! |------------------------------------------------------------------|
//! |               source IP, four octets as u16 (8 bytes)            |
//! |------------------------------------------------------------------|
//! |                      source port as u32 (4 bytes)                |
//! |------------------------------------------------------------------|
//! |                               BODY                               |
//! |__________________________________________________________________|
//! ```
//!
//! Addresses inside bodies always use the canonical text form: the IP as
//! four zero-padded three-digit octets (15 characters) and the port as
//! five zero-padded decimal digits.

pub mod address;
pub mod packet;

use std::{array::TryFromSliceError, str::Utf8Error};

#[derive(Debug)]
pub enum Error {
    InvalidInput,
    PacketTooShort,
    BodyNotAscii,
    UnknownKind,
    BadAddress,
    PathTooLong,
    Utf8Error(Utf8Error),
    TryFromSliceError(TryFromSliceError),
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidInput, Self::InvalidInput) => true,
            (Self::PacketTooShort, Self::PacketTooShort) => true,
            (Self::BodyNotAscii, Self::BodyNotAscii) => true,
            (Self::UnknownKind, Self::UnknownKind) => true,
            (Self::BadAddress, Self::BadAddress) => true,
            (Self::PathTooLong, Self::PathTooLong) => true,
            (Self::Utf8Error(a), Self::Utf8Error(b)) => a == b,
            (Self::TryFromSliceError(_), Self::TryFromSliceError(_)) => true,
            _ => false,
        }
    }
}

impl Eq for Error {}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<Utf8Error> for Error {
    fn from(value: Utf8Error) -> Self {
        Self::Utf8Error(value)
    }
}

impl From<TryFromSliceError> for Error {
    fn from(value: TryFromSliceError) -> Self {
        Self::TryFromSliceError(value)
    }
}

/// Size of the fixed packet header.
pub const HEADER_SIZE: usize = 20;

/// Reads the total on-wire size of the packet starting at `bytes[0]`.
///
/// The body length field is trusted here only for frame reassembly; the
/// dispatcher re-checks it against the decoded body.
///
/// # Test
///
/// ```
/// let buffer = [
///     0x00, 0x01, 0x00, 0x04, 0x00, 0x00, 0x00, 0x0c, 0x00, 0xc0, 0x00,
///     0xa8, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0xfd, 0xe8,
/// ];
///
/// assert_eq!(canopy_server_codec::packet_size(&buffer).unwrap(), 32);
/// assert!(canopy_server_codec::packet_size(&buffer[..10]).is_err());
/// ```
pub fn packet_size(bytes: &[u8]) -> Result<usize, Error> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::PacketTooShort);
    }

    let length = u32::from_be_bytes(bytes[4..8].try_into()?) as usize;
    Ok(HEADER_SIZE + length)
}
