//! Stream keys: ordered entries addressed by composite `ms-seq` identifiers.
//!
//! A stream owns its own lock (the store hands out shared handles), so a
//! blocking reader can poll entries without pinning the whole keyspace.

use jiff::Timestamp;
use thiserror::Error;

use crate::resp::RespValue;

#[derive(Error, Debug, PartialEq)]
pub enum StreamIdError {
    #[error("invalid id format")]
    InvalidFormat,
    #[error("ERR The ID {0} does not have a valid timestamp")]
    InvalidTimestamp(String),
    #[error("ERR The ID {0} does not have a valid sequence number")]
    InvalidSequence(String),
    #[error("ERR The ID specified in XADD must be greater than 0-0")]
    ZeroId,
    #[error("ERR The ID specified in XADD is equal or smaller than the target stream top item")]
    NotGreaterThanTop,
}

/// A stream entry identifier, ordered by `(ms, seq)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

impl StreamId {
    /// Parses a full `<ms>-<seq>` identifier. Both halves must be numeric.
    pub fn parse(id: &str) -> Result<Self, StreamIdError> {
        let (ms_part, seq_part) = split_id(id)?;

        let ms = ms_part
            .parse::<u64>()
            .map_err(|_| StreamIdError::InvalidTimestamp(id.to_string()))?;
        let seq = seq_part
            .parse::<u64>()
            .map_err(|_| StreamIdError::InvalidSequence(id.to_string()))?;

        Ok(StreamId { ms, seq })
    }

    /// Parses a range bound: a bare `<ms>` is allowed and the missing
    /// sequence defaults to `default_seq` (0 for a start bound, `u64::MAX`
    /// for an end bound).
    pub fn parse_bound(id: &str, default_seq: u64) -> Result<Self, StreamIdError> {
        if id.contains('-') {
            return Self::parse(id);
        }

        let ms = id
            .parse::<u64>()
            .map_err(|_| StreamIdError::InvalidTimestamp(id.to_string()))?;

        Ok(StreamId {
            ms,
            seq: default_seq,
        })
    }
}

fn split_id(id: &str) -> Result<(&str, &str), StreamIdError> {
    let mut parts = id.split('-');

    match (parts.next(), parts.next(), parts.next()) {
        (Some(ms), Some(seq), None) => Ok((ms, seq)),
        _ => Err(StreamIdError::InvalidFormat),
    }
}

/// One stream entry: an identifier plus its field/value pairs in insertion
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: StreamId,
    pub fields: Vec<(String, RespValue)>,
}

/// An append-only sequence of entries with strictly ascending identifiers.
#[derive(Debug, Default)]
pub struct Stream {
    entries: Vec<StreamEntry>,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[StreamEntry] {
        &self.entries
    }

    /// The identifier of the newest entry.
    pub fn top_id(&self) -> Option<StreamId> {
        self.entries.last().map(|entry| entry.id)
    }

    /// Appends an entry. Callers must have resolved the identifier through
    /// [`Stream::next_id`] first; ordering is not re-checked here.
    pub fn add_entry(&mut self, id: StreamId, fields: Vec<(String, RespValue)>) {
        self.entries.push(StreamEntry { id, fields });
    }

    /// Resolves an XADD identifier against the current top entry.
    ///
    /// `*` auto-generates `<now_ms>-0`. `<ms>-*` picks the next free
    /// sequence for that timestamp. An explicit `<ms>-<seq>` must be
    /// strictly greater than the top and must not be `0-0`.
    pub fn next_id(&self, requested: &str) -> Result<StreamId, StreamIdError> {
        if requested == "*" {
            return Ok(StreamId {
                ms: unix_time_ms(),
                seq: 0,
            });
        }

        let (ms_part, seq_part) = split_id(requested)?;
        let ms = ms_part
            .parse::<u64>()
            .map_err(|_| StreamIdError::InvalidTimestamp(requested.to_string()))?;

        let top = self.top_id().unwrap_or_default();

        if seq_part == "*" {
            return if ms < top.ms {
                Err(StreamIdError::NotGreaterThanTop)
            } else if ms == top.ms {
                Ok(StreamId {
                    ms,
                    seq: top.seq + 1,
                })
            } else {
                Ok(StreamId { ms, seq: 0 })
            };
        }

        let seq = seq_part
            .parse::<u64>()
            .map_err(|_| StreamIdError::InvalidSequence(requested.to_string()))?;
        let id = StreamId { ms, seq };

        if id == StreamId::default() {
            return Err(StreamIdError::ZeroId);
        }
        if id <= top {
            return Err(StreamIdError::NotGreaterThanTop);
        }

        Ok(id)
    }

    /// Index of the first entry with `id >= bound`.
    pub fn lower_bound(&self, bound: StreamId) -> usize {
        self.entries.partition_point(|entry| entry.id < bound)
    }

    /// Index just past the last entry with `id <= bound`.
    pub fn upper_bound(&self, bound: StreamId) -> usize {
        self.entries.partition_point(|entry| entry.id <= bound)
    }

    /// Entries STRICTLY after `bound`, the XREAD read set.
    pub fn entries_after(&self, bound: StreamId) -> &[StreamEntry] {
        &self.entries[self.upper_bound(bound)..]
    }
}

/// Renders entries the way XRANGE and XREAD present them: each entry is a
/// two-element array of the identifier and a flat field/value array.
pub fn entries_to_resp(entries: &[StreamEntry]) -> RespValue {
    RespValue::Array(
        entries
            .iter()
            .map(|entry| {
                let mut data = Vec::with_capacity(entry.fields.len() * 2);
                for (field, value) in &entry.fields {
                    data.push(RespValue::BulkString(field.clone()));
                    data.push(value.clone());
                }

                RespValue::Array(vec![
                    RespValue::BulkString(entry.id.to_string()),
                    RespValue::Array(data),
                ])
            })
            .collect(),
    )
}

/// Wall-clock milliseconds since the epoch, for auto-generated identifiers.
pub fn unix_time_ms() -> u64 {
    let now = Timestamp::now().as_millisecond();
    u64::try_from(now).unwrap_or(0)
}
