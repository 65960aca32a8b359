use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::store::Store;

pub async fn get(call: &[RespValue], store: &Store) -> Result<Option<RespValue>, CommandError> {
    if call.len() != 2 {
        return Err(CommandError::InvalidArity("GET"));
    }

    let key = call[1].as_string().ok_or(CommandError::KeyNotAString)?;

    let value = store.get(key).await.unwrap_or(RespValue::NullBulkString);

    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::get;
    use crate::commands::CommandError;
    use crate::resp::RespValue;
    use crate::store::Store;

    #[tokio::test]
    async fn test_get() {
        let store = Store::new();
        store
            .set("fruit", RespValue::BulkString("mango".to_string()))
            .await;

        let call = vec![
            RespValue::BulkString("GET".to_string()),
            RespValue::BulkString("fruit".to_string()),
        ];
        assert_eq!(
            get(&call, &store).await,
            Ok(Some(RespValue::BulkString("mango".to_string())))
        );

        let missing = vec![
            RespValue::BulkString("GET".to_string()),
            RespValue::BulkString("missing".to_string()),
        ];
        assert_eq!(
            get(&missing, &store).await,
            Ok(Some(RespValue::NullBulkString))
        );
    }

    #[tokio::test]
    async fn test_get_arity() {
        let store = Store::new();
        let call = vec![RespValue::BulkString("GET".to_string())];

        assert_eq!(
            get(&call, &store).await,
            Err(CommandError::InvalidArity("GET"))
        );
    }
}
