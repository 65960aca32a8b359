//! The opcode walk over an RDB snapshot.
//!
//! Only the sections this server restores are materialised: AUX fields
//! become startup parameters, string/list/set values land in the keyspace,
//! expiry opcodes attach absolute deadlines to the pair that follows them.
//! Database selectors and resize hints are read and logged but otherwise
//! ignored (there is a single keyspace).

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::rdb::encoding::{
    RdbError, read_encoded_string, read_length_encoded_int, take_bytes,
};
use crate::resp::RespValue;

const AUX_OPCODE: u8 = 0xFA;
const RESIZE_DB_OPCODE: u8 = 0xFB;
const EXPIRE_TIME_MS_OPCODE: u8 = 0xFC;
const EXPIRE_TIME_OPCODE: u8 = 0xFD;
const SELECT_DB_OPCODE: u8 = 0xFE;
const EOF_OPCODE: u8 = 0xFF;

const STRING_VALUE_TYPE: u8 = 0x00;
const LIST_VALUE_TYPE: u8 = 0x01;
const SET_VALUE_TYPE: u8 = 0x02;

/// Everything a snapshot contributes to a fresh store.
#[derive(Debug, Default, PartialEq)]
pub struct RdbSnapshot {
    pub params: HashMap<String, String>,
    pub keys: Vec<RdbKey>,
}

#[derive(Debug, PartialEq)]
pub struct RdbKey {
    pub key: String,
    pub value: RespValue,
    /// Absolute expiry in milliseconds since epoch, when present.
    pub expires_at_ms: Option<i64>,
}

/// Loads and parses the snapshot at `path`. A missing file is not an
/// error: startup proceeds with an empty keyspace.
pub fn read_rdb_file(path: &Path) -> Result<RdbSnapshot, RdbError> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Ok(RdbSnapshot::default());
        }
        Err(error) => return Err(RdbError::Io(error.to_string())),
    };

    parse_rdb(&data)
}

/// Walks a complete in-memory snapshot.
pub fn parse_rdb(data: &[u8]) -> Result<RdbSnapshot, RdbError> {
    let header = take_bytes(data, 0, 9)?;
    if &header[..5] != b"REDIS" {
        return Err(RdbError::InvalidMagic);
    }

    let version = std::str::from_utf8(&header[5..])
        .ok()
        .and_then(|digits| digits.parse::<u32>().ok())
        .ok_or(RdbError::InvalidMagic)?;
    debug!(version, "reading RDB snapshot");

    let mut snapshot = RdbSnapshot::default();
    let mut cursor = 9usize;

    loop {
        let opcode = *data.get(cursor).ok_or(RdbError::UnexpectedEof)?;
        cursor += 1;

        match opcode {
            AUX_OPCODE => {
                let (key, read) = read_encoded_string(data, cursor)?;
                cursor += read;
                let (value, read) = read_encoded_string(data, cursor)?;
                cursor += read;

                snapshot.params.insert(key, value);
            }
            RESIZE_DB_OPCODE => {
                let (keyspace_size, read) = read_length_encoded_int(data, cursor)?;
                cursor += read;
                let (expiry_size, read) = read_length_encoded_int(data, cursor)?;
                cursor += read;

                debug!(keyspace_size, expiry_size, "resize hint");
            }
            EXPIRE_TIME_MS_OPCODE => {
                let bytes: [u8; 8] = take_bytes(data, cursor, 8)?
                    .try_into()
                    .map_err(|_| RdbError::UnexpectedEof)?;
                cursor += 8;
                let expires_at_ms = u64::from_le_bytes(bytes) as i64;

                let (key, value, read) = read_key_value(data, cursor)?;
                cursor += read;

                snapshot.keys.push(RdbKey {
                    key,
                    value,
                    expires_at_ms: Some(expires_at_ms),
                });
            }
            EXPIRE_TIME_OPCODE => {
                let bytes: [u8; 4] = take_bytes(data, cursor, 4)?
                    .try_into()
                    .map_err(|_| RdbError::UnexpectedEof)?;
                cursor += 4;
                let expires_at_ms = u32::from_le_bytes(bytes) as i64 * 1000;

                let (key, value, read) = read_key_value(data, cursor)?;
                cursor += read;

                snapshot.keys.push(RdbKey {
                    key,
                    value,
                    expires_at_ms: Some(expires_at_ms),
                });
            }
            SELECT_DB_OPCODE => {
                let (database, read) = read_length_encoded_int(data, cursor)?;
                cursor += read;

                debug!(database, "database selector");
            }
            EOF_OPCODE => {
                let _checksum = take_bytes(data, cursor, 8)?;
                break;
            }
            STRING_VALUE_TYPE | LIST_VALUE_TYPE | SET_VALUE_TYPE => {
                // The opcode byte doubles as the value type.
                cursor -= 1;
                let (key, value, read) = read_key_value(data, cursor)?;
                cursor += read;

                snapshot.keys.push(RdbKey {
                    key,
                    value,
                    expires_at_ms: None,
                });
            }
            other => return Err(RdbError::UnknownOpcode(other)),
        }
    }

    Ok(snapshot)
}

/// Reads a value-type byte, the key, and the typed value.
fn read_key_value(data: &[u8], cursor: usize) -> Result<(String, RespValue, usize), RdbError> {
    let value_type = *data.get(cursor).ok_or(RdbError::UnexpectedEof)?;
    let mut read = 1usize;

    let (key, key_read) = read_encoded_string(data, cursor + read)?;
    read += key_read;

    let value = match value_type {
        STRING_VALUE_TYPE => {
            let (value, value_read) = read_encoded_string(data, cursor + read)?;
            read += value_read;
            RespValue::BulkString(value)
        }
        LIST_VALUE_TYPE => {
            let (items, list_read) = read_string_list(data, cursor + read)?;
            read += list_read;
            RespValue::Array(items.into_iter().map(RespValue::BulkString).collect())
        }
        SET_VALUE_TYPE => {
            let (items, list_read) = read_string_list(data, cursor + read)?;
            read += list_read;
            RespValue::Set(items.into_iter().map(RespValue::BulkString).collect())
        }
        other => return Err(RdbError::UnknownOpcode(other)),
    };

    Ok((key, value, read))
}

/// A count followed by that many encoded strings.
fn read_string_list(data: &[u8], cursor: usize) -> Result<(Vec<String>, usize), RdbError> {
    let (count, mut read) = read_length_encoded_int(data, cursor)?;

    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (item, item_read) = read_encoded_string(data, cursor + read)?;
        read += item_read;
        items.push(item);
    }

    Ok((items, read))
}
