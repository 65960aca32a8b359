//! RESP wire format: typed values, encoder and a byte-counting decoder.
//!
//! The decoder consumes from the bounded byte channel fed by a connection's
//! reader task and reports how many bytes each value occupied on the wire.
//! That count is what replication offset accounting is built on, so every
//! decode path must tally the bytes it consumes, including tag bytes and
//! line terminators.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

use crate::stream::Stream;

/// Inbound side of a connection's byte channel.
pub type ByteSource = mpsc::Receiver<u8>;

/// Capacity of the per-connection byte channel.
pub const BYTE_CHANNEL_CAPACITY: usize = 1 << 14;

#[derive(Error, Debug, PartialEq)]
pub enum RespError {
    #[error("connection closed")]
    ConnectionClosed,
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
    #[error("invalid integer {0}")]
    InvalidInteger(String),
    #[error("invalid length {0}")]
    InvalidLength(i64),
    #[error("expected a bulk string snapshot")]
    InvalidSnapshotFraming,
}

/// A single RESP value.
///
/// `Stream` is the in-memory representation of a stream key and is never
/// serialised directly; command handlers present stream contents as arrays.
#[derive(Debug, Clone)]
pub enum RespValue {
    SimpleString(String),
    SimpleError(String),
    Integer(i64),
    BulkString(String),
    NullBulkString,
    Array(Vec<RespValue>),
    Null,
    Boolean(bool),
    Map(Vec<(RespValue, RespValue)>),
    Set(Vec<RespValue>),
    Stream(Arc<Mutex<Stream>>),
}

impl PartialEq for RespValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RespValue::SimpleString(a), RespValue::SimpleString(b)) => a == b,
            (RespValue::SimpleError(a), RespValue::SimpleError(b)) => a == b,
            (RespValue::Integer(a), RespValue::Integer(b)) => a == b,
            (RespValue::BulkString(a), RespValue::BulkString(b)) => a == b,
            (RespValue::NullBulkString, RespValue::NullBulkString) => true,
            (RespValue::Array(a), RespValue::Array(b)) => a == b,
            (RespValue::Null, RespValue::Null) => true,
            (RespValue::Boolean(a), RespValue::Boolean(b)) => a == b,
            (RespValue::Map(a), RespValue::Map(b)) => a == b,
            (RespValue::Set(a), RespValue::Set(b)) => a == b,
            // Streams are shared handles; identity is the only meaningful equality.
            (RespValue::Stream(a), RespValue::Stream(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl RespValue {
    /// Builds a command call: an array of bulk strings.
    pub fn command(parts: &[&str]) -> RespValue {
        RespValue::Array(
            parts
                .iter()
                .map(|part| RespValue::BulkString(part.to_string()))
                .collect(),
        )
    }

    /// Returns the text of a SimpleString or BulkString.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            RespValue::SimpleString(s) | RespValue::BulkString(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns an Integer, or a string value parsed as a signed integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            RespValue::Integer(value) => Some(*value),
            _ => self.as_string()?.parse::<i64>().ok(),
        }
    }

    /// Serialises the value into its wire representation.
    pub fn encode(&self) -> String {
        match self {
            RespValue::SimpleString(s) => format!("+{}\r\n", s),
            RespValue::SimpleError(s) => format!("-{}\r\n", s),
            RespValue::Integer(value) => format!(":{}\r\n", value),
            RespValue::BulkString(s) => format!("${}\r\n{}\r\n", s.len(), s),
            RespValue::NullBulkString => "$-1\r\n".to_string(),
            RespValue::Array(items) => {
                let mut encoded = format!("*{}\r\n", items.len());
                for item in items {
                    encoded.push_str(&item.encode());
                }
                encoded
            }
            RespValue::Null => "_\r\n".to_string(),
            RespValue::Boolean(true) => "#t\r\n".to_string(),
            RespValue::Boolean(false) => "#f\r\n".to_string(),
            RespValue::Map(pairs) => {
                let mut encoded = format!("%{}\r\n", pairs.len());
                for (key, value) in pairs {
                    encoded.push_str(&key.encode());
                    encoded.push_str(&value.encode());
                }
                encoded
            }
            RespValue::Set(items) => {
                let mut encoded = format!("~{}\r\n", items.len());
                for item in items {
                    encoded.push_str(&item.encode());
                }
                encoded
            }
            RespValue::Stream(_) => String::new(),
        }
    }
}

/// Frames an RDB snapshot for the replication stream.
///
/// The snapshot rides on a bulk string header but carries NO trailing CRLF,
/// which is why it cannot go through [`RespValue::encode`].
pub fn encode_snapshot(data: &[u8]) -> Vec<u8> {
    let mut framed = format!("${}\r\n", data.len()).into_bytes();
    framed.extend_from_slice(data);
    framed
}

/// Reads a snapshot framed by [`encode_snapshot`] off the byte channel.
///
/// Returns the consumed byte count alongside the raw payload. The payload is
/// binary and must bypass the UTF-8 text decoding of [`decode`].
pub async fn read_snapshot(source: &mut ByteSource) -> Result<(usize, Vec<u8>), RespError> {
    let tag = next_byte(source).await?;
    if tag != b'$' {
        return Err(RespError::InvalidSnapshotFraming);
    }

    let (mut read, length) = decode_integer(source).await?;
    read += 1;

    let length = usize::try_from(length).map_err(|_| RespError::InvalidLength(length))?;
    let mut payload = Vec::with_capacity(length);

    for _ in 0..length {
        payload.push(next_byte(source).await?);
    }
    read += length;

    Ok((read, payload))
}

/// Decodes one value off the byte channel.
///
/// Returns `(bytes_consumed, value)`. An unknown tag consumes only itself
/// and yields `Null`; the caller treats that as protocol noise. Blocks until
/// the channel produces enough bytes; a closed channel is reported as
/// [`RespError::ConnectionClosed`].
pub async fn decode(source: &mut ByteSource) -> Result<(usize, RespValue), RespError> {
    let tag = next_byte(source).await?;

    let (read, value) = match tag {
        b'+' => {
            let (read, line) = decode_line(source).await?;
            (read, RespValue::SimpleString(line))
        }
        b'-' => {
            let (read, line) = decode_line(source).await?;
            (read, RespValue::SimpleError(line))
        }
        b':' => {
            let (read, value) = decode_integer(source).await?;
            (read, RespValue::Integer(value))
        }
        b'$' => decode_bulk_string(source).await?,
        b'*' => decode_array(source).await?,
        b'_' => {
            next_byte(source).await?;
            next_byte(source).await?;
            (2, RespValue::Null)
        }
        b'#' => {
            let flag = next_byte(source).await?;
            next_byte(source).await?;
            next_byte(source).await?;
            (3, RespValue::Boolean(flag == b't'))
        }
        b'%' => decode_map(source).await?,
        b'~' => decode_set(source).await?,
        _ => return Ok((1, RespValue::Null)),
    };

    Ok((read + 1, value))
}

async fn next_byte(source: &mut ByteSource) -> Result<u8, RespError> {
    source.recv().await.ok_or(RespError::ConnectionClosed)
}

/// Reads up to and including a CRLF; the terminator is counted but stripped.
async fn decode_line(source: &mut ByteSource) -> Result<(usize, String), RespError> {
    let mut buf: Vec<u8> = Vec::new();

    loop {
        buf.push(next_byte(source).await?);

        if buf.len() >= 2 && buf[buf.len() - 2] == b'\r' && buf[buf.len() - 1] == b'\n' {
            break;
        }
    }

    let read = buf.len();
    buf.truncate(read - 2);

    let line = String::from_utf8(buf).map_err(|_| RespError::InvalidUtf8)?;

    Ok((read, line))
}

async fn decode_integer(source: &mut ByteSource) -> Result<(usize, i64), RespError> {
    let (read, line) = decode_line(source).await?;

    let value = line
        .parse::<i64>()
        .map_err(|_| RespError::InvalidInteger(line.clone()))?;

    Ok((read, value))
}

async fn decode_bulk_string(source: &mut ByteSource) -> Result<(usize, RespValue), RespError> {
    let (mut read, length) = decode_integer(source).await?;

    if length == -1 {
        return Ok((read, RespValue::NullBulkString));
    }

    let length = usize::try_from(length).map_err(|_| RespError::InvalidLength(length))?;
    let mut buf = Vec::with_capacity(length);

    // Length-delimited: the content may itself contain CRLF.
    for _ in 0..length {
        buf.push(next_byte(source).await?);
    }
    next_byte(source).await?;
    next_byte(source).await?;
    read += length + 2;

    let content = String::from_utf8(buf).map_err(|_| RespError::InvalidUtf8)?;

    Ok((read, RespValue::BulkString(content)))
}

async fn decode_array(source: &mut ByteSource) -> Result<(usize, RespValue), RespError> {
    let (mut read, length) = decode_integer(source).await?;

    if length == -1 {
        return Ok((read, RespValue::Null));
    }

    let length = usize::try_from(length).map_err(|_| RespError::InvalidLength(length))?;
    let mut items = Vec::with_capacity(length);

    for _ in 0..length {
        let (item_read, item) = Box::pin(decode(source)).await?;
        read += item_read;
        items.push(item);
    }

    Ok((read, RespValue::Array(items)))
}

async fn decode_map(source: &mut ByteSource) -> Result<(usize, RespValue), RespError> {
    let (mut read, length) = decode_integer(source).await?;

    let length = usize::try_from(length).map_err(|_| RespError::InvalidLength(length))?;
    let mut pairs = Vec::with_capacity(length);

    for _ in 0..length {
        let (key_read, key) = Box::pin(decode(source)).await?;
        let (value_read, value) = Box::pin(decode(source)).await?;
        read += key_read + value_read;
        pairs.push((key, value));
    }

    Ok((read, RespValue::Map(pairs)))
}

async fn decode_set(source: &mut ByteSource) -> Result<(usize, RespValue), RespError> {
    let (mut read, length) = decode_integer(source).await?;

    let length = usize::try_from(length).map_err(|_| RespError::InvalidLength(length))?;
    let mut items = Vec::with_capacity(length);

    for _ in 0..length {
        let (item_read, item) = Box::pin(decode(source)).await?;
        read += item_read;
        items.push(item);
    }

    Ok((read, RespValue::Set(items)))
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::{
        BYTE_CHANNEL_CAPACITY, ByteSource, RespError, RespValue, decode, encode_snapshot,
        read_snapshot,
    };

    async fn source_from(bytes: &[u8]) -> ByteSource {
        let (sender, receiver) = mpsc::channel(BYTE_CHANNEL_CAPACITY);
        for &byte in bytes {
            sender.send(byte).await.unwrap();
        }
        receiver
    }

    #[test]
    fn test_encode() {
        let test_cases = vec![
            (RespValue::SimpleString("OK".to_string()), "+OK\r\n"),
            (
                RespValue::SimpleError("ERR oops".to_string()),
                "-ERR oops\r\n",
            ),
            (RespValue::Integer(42), ":42\r\n"),
            (RespValue::Integer(-42), ":-42\r\n"),
            (RespValue::BulkString("hello".to_string()), "$5\r\nhello\r\n"),
            (RespValue::BulkString(String::new()), "$0\r\n\r\n"),
            (RespValue::NullBulkString, "$-1\r\n"),
            (RespValue::Null, "_\r\n"),
            (RespValue::Boolean(true), "#t\r\n"),
            (RespValue::Boolean(false), "#f\r\n"),
            (
                RespValue::Array(vec![
                    RespValue::BulkString("ECHO".to_string()),
                    RespValue::BulkString("hey".to_string()),
                ]),
                "*2\r\n$4\r\nECHO\r\n$3\r\nhey\r\n",
            ),
            (RespValue::Array(Vec::new()), "*0\r\n"),
            (
                RespValue::Map(vec![(
                    RespValue::BulkString("role".to_string()),
                    RespValue::BulkString("master".to_string()),
                )]),
                "%1\r\n$4\r\nrole\r\n$6\r\nmaster\r\n",
            ),
            (
                RespValue::Set(vec![RespValue::BulkString("a".to_string())]),
                "~1\r\n$1\r\na\r\n",
            ),
        ];

        for (value, expected) in test_cases {
            assert_eq!(value.encode(), expected, "encoding {:?}", value);
        }
    }

    #[tokio::test]
    async fn test_decode_round_trip() {
        let test_cases = vec![
            RespValue::SimpleString("abc".to_string()),
            RespValue::Integer(-42),
            RespValue::BulkString("line one\r\nline two".to_string()),
            RespValue::NullBulkString,
            RespValue::Null,
            RespValue::Boolean(true),
            RespValue::Array(vec![
                RespValue::Array(vec![RespValue::BulkString("nested".to_string())]),
                RespValue::BulkString("flat".to_string()),
            ]),
            RespValue::Map(vec![
                (
                    RespValue::BulkString("one".to_string()),
                    RespValue::Integer(1),
                ),
                (
                    RespValue::BulkString("two".to_string()),
                    RespValue::Integer(2),
                ),
            ]),
            RespValue::Set(vec![
                RespValue::BulkString("a".to_string()),
                RespValue::BulkString("b".to_string()),
                RespValue::BulkString("c".to_string()),
            ]),
        ];

        for value in test_cases {
            let encoded = value.encode();
            let mut source = source_from(encoded.as_bytes()).await;

            let (read, decoded) = decode(&mut source).await.unwrap();

            assert_eq!(decoded, value, "round trip of {}", encoded.escape_debug());
            assert_eq!(
                read,
                encoded.len(),
                "byte count of {}",
                encoded.escape_debug()
            );
        }
    }

    #[tokio::test]
    async fn test_decode_byte_counts() {
        let test_cases = vec![
            ("+PONG\r\n", 7),
            (":123\r\n", 6),
            ("$3\r\nfoo\r\n", 9),
            ("*1\r\n$4\r\nPING\r\n", 14),
            ("$-1\r\n", 5),
            ("_\r\n", 3),
            ("#f\r\n", 4),
        ];

        for (input, expected_read) in test_cases {
            let mut source = source_from(input.as_bytes()).await;
            let (read, _) = decode(&mut source).await.unwrap();
            assert_eq!(read, expected_read, "byte count of {}", input.escape_debug());
        }
    }

    #[tokio::test]
    async fn test_decode_integer_signs() {
        let test_cases = vec![(":+5\r\n", 5), (":-5\r\n", -5), (":0\r\n", 0)];

        for (input, expected) in test_cases {
            let mut source = source_from(input.as_bytes()).await;
            let (_, value) = decode(&mut source).await.unwrap();
            assert_eq!(value, RespValue::Integer(expected), "decoding {}", input);
        }
    }

    #[tokio::test]
    async fn test_decode_null_array() {
        let mut source = source_from(b"*-1\r\n").await;
        let (read, value) = decode(&mut source).await.unwrap();
        assert_eq!(value, RespValue::Null);
        assert_eq!(read, 5);
    }

    #[tokio::test]
    async fn test_decode_unknown_tag_is_noise() {
        let mut source = source_from(b"?rest").await;
        let (read, value) = decode(&mut source).await.unwrap();
        assert_eq!(read, 1);
        assert_eq!(value, RespValue::Null);
    }

    #[tokio::test]
    async fn test_decode_closed_channel() {
        let mut source = source_from(b"").await;
        let result = decode(&mut source).await;
        assert_eq!(result, Err(RespError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_snapshot_framing_has_no_trailing_terminator() {
        let payload = b"REDIS0011\xff\x00\x00\x00\x00\x00\x00\x00\x00";
        let framed = encode_snapshot(payload);

        assert_eq!(&framed[..5], b"$18\r\n".as_slice());
        assert_eq!(&framed[5..], payload.as_slice());

        let mut source = source_from(&framed).await;
        let (read, decoded) = read_snapshot(&mut source).await.unwrap();
        assert_eq!(decoded, payload.to_vec());
        assert_eq!(read, framed.len());
    }

    #[test]
    fn test_as_int() {
        let test_cases = vec![
            (RespValue::Integer(7), Some(7)),
            (RespValue::BulkString("12".to_string()), Some(12)),
            (RespValue::BulkString("-3".to_string()), Some(-3)),
            (RespValue::SimpleString("4".to_string()), Some(4)),
            (RespValue::BulkString("four".to_string()), None),
            (RespValue::Null, None),
        ];

        for (value, expected) in test_cases {
            assert_eq!(value.as_int(), expected, "as_int of {:?}", value);
        }
    }
}
