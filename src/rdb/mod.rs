//! RDB snapshot support: a reader for the on-disk format and the canned
//! empty snapshot a primary serves to replicas on PSYNC.
//!
//! Persistence is read-only; nothing in this crate writes an RDB file.

mod encoding;
mod reader;

pub use encoding::RdbError;
pub use reader::{RdbKey, RdbSnapshot, parse_rdb, read_rdb_file};

/// An empty database: magic, a few AUX fields and the EOF checksum.
/// Served verbatim as the full-resync payload.
pub const EMPTY_SNAPSHOT: &[u8] =
    b"REDIS0011\xfa\x09redis-ver\x057.2.0\xfa\x0aredis-bits\xc0\x40\xfa\x05ctime\xc2\x6d\x08\xbc\x65\xfa\x08used-mem\xc2\xb0\xc4\x10\x00\xfa\x08aof-base\xc0\x00\xff\xf0\x6e\x3b\xfe\xc0\xff\x5a\xa2";
