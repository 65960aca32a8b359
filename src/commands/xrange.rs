use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::store::Store;
use crate::stream::{StreamEntry, StreamId, entries_to_resp};

/// XRANGE: inclusive on both ends. `-` and `+` are the open sentinels; a
/// bare `<ms>` bound defaults its sequence to 0 (start) or the maximum
/// (end).
pub async fn xrange(call: &[RespValue], store: &Store) -> Result<Option<RespValue>, CommandError> {
    if call.len() != 4 {
        return Err(CommandError::InvalidArity("XRANGE"));
    }

    let key = call[1]
        .as_string()
        .ok_or(CommandError::ExpectedString("key"))?;
    let start = call[2]
        .as_string()
        .ok_or(CommandError::RangeStartNotAString)?;
    let end = call[3]
        .as_string()
        .ok_or(CommandError::RangeEndNotAString)?;

    let handle = match store.get(key).await {
        None => return Err(CommandError::KeyNotFound),
        Some(RespValue::Stream(handle)) => handle,
        Some(_) => return Err(CommandError::NotAStream),
    };

    let stream = handle.lock().await;

    let from = if start == "-" {
        0
    } else {
        stream.lower_bound(StreamId::parse_bound(start, 0)?)
    };
    let to = if end == "+" {
        stream.entries().len()
    } else {
        stream.upper_bound(StreamId::parse_bound(end, u64::MAX)?)
    };

    let entries: &[StreamEntry] = if from < to {
        &stream.entries()[from..to]
    } else {
        &[]
    };

    Ok(Some(entries_to_resp(entries)))
}
