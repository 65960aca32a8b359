use thiserror::Error;

use crate::stream::StreamIdError;

/// Client-visible command failures. Each variant's message is exactly what
/// the peer sees inside the `-<message>\r\n` error reply.
#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("expected command name as string")]
    ExpectedCommandName,
    #[error("unknown command {0}")]
    UnknownCommand(String),
    #[error("invalid number of arguments to {0} command")]
    InvalidArity(&'static str),
    #[error("expected a string {0}")]
    ExpectedString(&'static str),
    #[error("key must be a string")]
    KeyNotAString,
    #[error("value must be a string")]
    ValueNotAString,
    #[error("expected flag to be a string")]
    FlagNotAString,
    #[error("expected an expiry value")]
    ExpectedExpiryValue,
    #[error("expected expiry value to be an integer")]
    ExpiryNotAnInteger,
    #[error("unknown argument to SET command")]
    UnknownSetArgument,
    #[error("invalid use of the CONFIG GET command")]
    InvalidConfigSubcommand,
    #[error("invalid glob pattern {0}")]
    InvalidGlobPattern(String),
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,
    #[error("ERR key does not exist in store")]
    KeyNotFound,
    #[error("ERR key does not hold a stream value")]
    NotAStream,
    #[error("key has a non stream value type")]
    XaddNotAStream,
    #[error("expected a list of key/value pairs")]
    UnpairedEntryFields,
    #[error("expected stream entry keys to be strings")]
    EntryFieldNotAString,
    #[error("ERR the start argument is not a valid string")]
    RangeStartNotAString,
    #[error("ERR the end argument is not a valid string")]
    RangeEndNotAString,
    #[error("invalid XREAD command option {0}")]
    InvalidXreadOption(String),
    #[error("expected timeout to be a number")]
    TimeoutNotANumber,
    #[error("expected numreplicas to be an integer")]
    NumReplicasNotAnInteger,
    #[error("expected timeout to be an integer")]
    TimeoutNotAnInteger,
    #[error("invalid listening port")]
    InvalidListeningPort,
    #[error("invalid response to ACK")]
    InvalidAckOffset,
    #[error("no master_replid found")]
    NoReplicationId,
    #[error("no master_repl_offset found")]
    NoReplicationOffset,
    #[error("ERR EXEC without MULTI")]
    ExecWithoutMulti,
    #[error("ERR DISCARD without MULTI")]
    DiscardWithoutMulti,
    #[error("{0}")]
    StreamId(#[from] StreamIdError),
}
