use globset::Glob;

use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::store::Store;

pub async fn keys(call: &[RespValue], store: &Store) -> Result<Option<RespValue>, CommandError> {
    if call.len() != 2 {
        return Err(CommandError::InvalidArity("KEYS"));
    }

    let pattern = call[1]
        .as_string()
        .ok_or(CommandError::ExpectedString("search parameter"))?;

    let matcher = Glob::new(pattern)
        .map_err(|error| CommandError::InvalidGlobPattern(error.to_string()))?
        .compile_matcher();

    let matched = store
        .keys()
        .await
        .into_iter()
        .filter(|key| matcher.is_match(key))
        .map(RespValue::BulkString)
        .collect();

    Ok(Some(RespValue::Array(matched)))
}
