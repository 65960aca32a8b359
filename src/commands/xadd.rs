use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::store::Store;
use crate::stream::Stream;

pub struct XaddArguments {
    key: String,
    requested_id: String,
    fields: Vec<(String, RespValue)>,
}

impl XaddArguments {
    pub fn parse(call: &[RespValue]) -> Result<Self, CommandError> {
        if call.len() < 5 {
            return Err(CommandError::InvalidArity("XADD"));
        }
        if (call.len() - 3) % 2 != 0 {
            return Err(CommandError::UnpairedEntryFields);
        }

        let key = call[1]
            .as_string()
            .ok_or(CommandError::ExpectedString("stream key"))?
            .to_string();
        let requested_id = call[2]
            .as_string()
            .ok_or(CommandError::ExpectedString("entry id"))?
            .to_string();

        let mut fields = Vec::with_capacity((call.len() - 3) / 2);
        for pair in call[3..].chunks(2) {
            let field = pair[0]
                .as_string()
                .ok_or(CommandError::EntryFieldNotAString)?
                .to_string();
            fields.push((field, pair[1].clone()));
        }

        Ok(Self {
            key,
            requested_id,
            fields,
        })
    }
}

/// XADD: resolves the requested identifier against the stream's top entry
/// and appends. Creates the stream on first use.
pub async fn xadd(call: &[RespValue], store: &Store) -> Result<Option<RespValue>, CommandError> {
    let arguments = XaddArguments::parse(call)?;

    let handle = match store.get(&arguments.key).await {
        Some(RespValue::Stream(handle)) => handle,
        Some(_) => return Err(CommandError::XaddNotAStream),
        None => {
            let handle = Arc::new(Mutex::new(Stream::new()));
            store
                .set(&arguments.key, RespValue::Stream(Arc::clone(&handle)))
                .await;
            handle
        }
    };

    // The store lock is already released; only the stream lock is held
    // while the identifier is resolved and the entry appended.
    let id = {
        let mut stream = handle.lock().await;
        let id = stream.next_id(&arguments.requested_id)?;
        stream.add_entry(id, arguments.fields);
        id
    };

    Ok(Some(RespValue::BulkString(id.to_string())))
}
