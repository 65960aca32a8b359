use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::store::Store;

pub async fn type_command(
    call: &[RespValue],
    store: &Store,
) -> Result<Option<RespValue>, CommandError> {
    if call.len() != 2 {
        return Err(CommandError::InvalidArity("TYPE"));
    }

    let key = call[1]
        .as_string()
        .ok_or(CommandError::ExpectedString("value for key"))?;

    let classification = store.type_of_value(key).await;

    Ok(Some(RespValue::SimpleString(classification.to_string())))
}
