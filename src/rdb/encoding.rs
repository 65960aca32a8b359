//! Length and string encodings shared by every RDB opcode.
//!
//! The first byte's top two bits select the size format; the `11` form
//! switches to the special integer encodings, where the "string" is a
//! little-endian unsigned integer rendered as decimal text.

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum RdbError {
    #[error("unexpected end of RDB data")]
    UnexpectedEof,
    #[error("invalid magic string")]
    InvalidMagic,
    #[error("unsupported encoding")]
    UnsupportedEncoding,
    #[error("invalid UTF-8 in encoded string")]
    InvalidUtf8,
    #[error("unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),
    #[error("failed to read RDB file: {0}")]
    Io(String),
}

#[derive(Debug, PartialEq)]
pub(crate) enum EncodedSize {
    /// A plain size: the next `n` bytes are raw string content.
    Normal(usize),
    Uint8,
    Uint16,
    Uint32,
}

pub(crate) fn take_bytes(data: &[u8], cursor: usize, len: usize) -> Result<&[u8], RdbError> {
    data.get(cursor..cursor + len).ok_or(RdbError::UnexpectedEof)
}

/// Reads a size specifier. Returns the decoded form and the bytes consumed.
pub(crate) fn read_encoded_size(data: &[u8], cursor: usize) -> Result<(EncodedSize, usize), RdbError> {
    let first = *data.get(cursor).ok_or(RdbError::UnexpectedEof)?;

    match first >> 6 {
        0b00 => Ok((EncodedSize::Normal((first & 0x3F) as usize), 1)),
        0b01 => {
            let second = *data.get(cursor + 1).ok_or(RdbError::UnexpectedEof)?;
            let size = (((first & 0x3F) as usize) << 8) | second as usize;
            Ok((EncodedSize::Normal(size), 2))
        }
        0b10 => {
            let bytes: [u8; 4] = take_bytes(data, cursor + 1, 4)?
                .try_into()
                .map_err(|_| RdbError::UnexpectedEof)?;
            Ok((EncodedSize::Normal(u32::from_be_bytes(bytes) as usize), 5))
        }
        _ => match first & 0x3F {
            0 => Ok((EncodedSize::Uint8, 1)),
            1 => Ok((EncodedSize::Uint16, 1)),
            2 => Ok((EncodedSize::Uint32, 1)),
            _ => Err(RdbError::UnsupportedEncoding),
        },
    }
}

/// Reads an encoded string: raw bytes for the NORMAL form, a decimal
/// rendering for the integer forms.
pub(crate) fn read_encoded_string(data: &[u8], cursor: usize) -> Result<(String, usize), RdbError> {
    let (size, mut read) = read_encoded_size(data, cursor)?;

    let value = match size {
        EncodedSize::Normal(len) => {
            let bytes = take_bytes(data, cursor + read, len)?;
            read += len;
            String::from_utf8(bytes.to_vec()).map_err(|_| RdbError::InvalidUtf8)?
        }
        EncodedSize::Uint8 => {
            let value = *data.get(cursor + read).ok_or(RdbError::UnexpectedEof)?;
            read += 1;
            value.to_string()
        }
        EncodedSize::Uint16 => {
            let bytes: [u8; 2] = take_bytes(data, cursor + read, 2)?
                .try_into()
                .map_err(|_| RdbError::UnexpectedEof)?;
            read += 2;
            u16::from_le_bytes(bytes).to_string()
        }
        EncodedSize::Uint32 => {
            let bytes: [u8; 4] = take_bytes(data, cursor + read, 4)?
                .try_into()
                .map_err(|_| RdbError::UnexpectedEof)?;
            read += 4;
            u32::from_le_bytes(bytes).to_string()
        }
    };

    Ok((value, read))
}

/// Reads an integer in any of the size encodings.
pub(crate) fn read_length_encoded_int(data: &[u8], cursor: usize) -> Result<(u64, usize), RdbError> {
    let (size, mut read) = read_encoded_size(data, cursor)?;

    let value = match size {
        EncodedSize::Normal(value) => value as u64,
        EncodedSize::Uint8 => {
            let value = *data.get(cursor + read).ok_or(RdbError::UnexpectedEof)?;
            read += 1;
            value as u64
        }
        EncodedSize::Uint16 => {
            let bytes: [u8; 2] = take_bytes(data, cursor + read, 2)?
                .try_into()
                .map_err(|_| RdbError::UnexpectedEof)?;
            read += 2;
            u16::from_le_bytes(bytes) as u64
        }
        EncodedSize::Uint32 => {
            let bytes: [u8; 4] = take_bytes(data, cursor + read, 4)?
                .try_into()
                .map_err(|_| RdbError::UnexpectedEof)?;
            read += 4;
            u32::from_le_bytes(bytes) as u64
        }
    };

    Ok((value, read))
}
