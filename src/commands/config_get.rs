use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::store::Store;

/// CONFIG GET: returns a two-element array of the parameter name and its
/// value, or a null bulk string when the parameter was never set.
pub async fn config_get(
    call: &[RespValue],
    store: &Store,
) -> Result<Option<RespValue>, CommandError> {
    if call.len() != 3 {
        return Err(CommandError::InvalidArity("CONFIG"));
    }

    let subcommand = call[1]
        .as_string()
        .ok_or(CommandError::ExpectedString("subcommand to CONFIG command"))?;
    if !subcommand.eq_ignore_ascii_case("GET") {
        return Err(CommandError::InvalidConfigSubcommand);
    }

    let param = call[2]
        .as_string()
        .ok_or(CommandError::ExpectedString("param"))?;

    let value = match store.get_param(param).await {
        Some(value) => RespValue::BulkString(value),
        None => RespValue::NullBulkString,
    };

    Ok(Some(RespValue::Array(vec![
        RespValue::BulkString(param.to_string()),
        value,
    ])))
}

#[cfg(test)]
mod tests {
    use super::config_get;
    use crate::commands::CommandError;
    use crate::resp::RespValue;
    use crate::store::Store;

    fn call(parts: &[&str]) -> Vec<RespValue> {
        let RespValue::Array(elements) = RespValue::command(parts) else {
            unreachable!();
        };
        elements
    }

    #[tokio::test]
    async fn test_config_get() {
        let store = Store::new();
        store.set_param("dir", "/tmp").await;

        assert_eq!(
            config_get(&call(&["CONFIG", "GET", "dir"]), &store).await,
            Ok(Some(RespValue::Array(vec![
                RespValue::BulkString("dir".to_string()),
                RespValue::BulkString("/tmp".to_string()),
            ])))
        );

        assert_eq!(
            config_get(&call(&["CONFIG", "get", "dbfilename"]), &store).await,
            Ok(Some(RespValue::Array(vec![
                RespValue::BulkString("dbfilename".to_string()),
                RespValue::NullBulkString,
            ])))
        );
    }

    #[tokio::test]
    async fn test_config_get_errors() {
        let store = Store::new();

        assert_eq!(
            config_get(&call(&["CONFIG", "GET"]), &store).await,
            Err(CommandError::InvalidArity("CONFIG"))
        );
        assert_eq!(
            config_get(&call(&["CONFIG", "SET", "dir"]), &store).await,
            Err(CommandError::InvalidConfigSubcommand)
        );
    }
}
