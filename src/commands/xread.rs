use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::store::Store;
use crate::stream::{Stream, StreamId, entries_to_resp};

pub struct XreadArguments {
    block_ms: Option<u64>,
    queries: Vec<(String, String)>,
}

impl XreadArguments {
    pub fn parse(call: &[RespValue]) -> Result<Self, CommandError> {
        if call.len() < 4 {
            return Err(CommandError::InvalidArity("XREAD"));
        }

        let first = call[1]
            .as_string()
            .ok_or(CommandError::ExpectedString("for stream key"))?;

        let (block_ms, streams_index) = if first.eq_ignore_ascii_case("block") {
            let timeout = call
                .get(2)
                .and_then(|value| value.as_int())
                .ok_or(CommandError::TimeoutNotANumber)?;
            (Some(timeout.max(0) as u64), 3)
        } else {
            (None, 1)
        };

        let keyword = call
            .get(streams_index)
            .and_then(|value| value.as_string())
            .ok_or(CommandError::InvalidArity("XREAD"))?;
        if !keyword.eq_ignore_ascii_case("streams") {
            return Err(CommandError::InvalidXreadOption(keyword.to_string()));
        }

        let data = &call[streams_index + 1..];
        if data.is_empty() || data.len() % 2 != 0 {
            return Err(CommandError::InvalidArity("XREAD"));
        }

        let half = data.len() / 2;
        let mut queries = Vec::with_capacity(half);
        for i in 0..half {
            let key = data[i]
                .as_string()
                .ok_or(CommandError::ExpectedString("for stream key"))?
                .to_string();
            let id = data[half + i]
                .as_string()
                .ok_or(CommandError::ExpectedString("for stream key"))?
                .to_string();
            queries.push((key, id));
        }

        Ok(Self { block_ms, queries })
    }
}

/// XREAD: per stream, entries STRICTLY after the given identifier. `$`
/// resolves to the stream's top at parse time, so a blocking read only sees
/// entries added after the command arrived.
pub async fn xread(call: &[RespValue], store: &Store) -> Result<Option<RespValue>, CommandError> {
    let arguments = XreadArguments::parse(call)?;

    let mut targets = Vec::with_capacity(arguments.queries.len());
    for (key, id) in &arguments.queries {
        let handle = match store.get(key).await {
            None => return Err(CommandError::KeyNotFound),
            Some(RespValue::Stream(handle)) => handle,
            Some(_) => return Err(CommandError::NotAStream),
        };

        let start = if id == "$" {
            handle.lock().await.top_id().unwrap_or_default()
        } else {
            StreamId::parse_bound(id, 0)?
        };

        targets.push((key.clone(), handle, start));
    }

    let Some(block_ms) = arguments.block_ms else {
        return Ok(Some(read_streams(&targets, false).await));
    };

    // Poll with an absolute deadline; a zero timeout blocks indefinitely.
    let deadline = (block_ms > 0).then(|| Instant::now() + Duration::from_millis(block_ms));

    loop {
        let reads = read_streams(&targets, true).await;
        if let RespValue::Array(ref items) = reads {
            if !items.is_empty() {
                return Ok(Some(reads));
            }
        }

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Ok(Some(RespValue::NullBulkString));
            }
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// One `[key, entries]` pair per stream. In blocking mode streams with no
/// new entries are omitted so an all-quiet pass yields an empty array.
async fn read_streams(
    targets: &[(String, Arc<Mutex<Stream>>, StreamId)],
    skip_empty: bool,
) -> RespValue {
    let mut reads = Vec::with_capacity(targets.len());

    for (key, handle, start) in targets {
        let stream = handle.lock().await;
        let entries = stream.entries_after(*start);

        if entries.is_empty() && skip_empty {
            continue;
        }

        reads.push(RespValue::Array(vec![
            RespValue::BulkString(key.clone()),
            entries_to_resp(entries),
        ]));
    }

    RespValue::Array(reads)
}
