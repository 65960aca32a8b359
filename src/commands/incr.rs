use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::store::Store;

/// INCR: an absent key becomes 1; an integer-parseable value is bumped;
/// anything else is a domain error.
pub async fn incr(call: &[RespValue], store: &Store) -> Result<Option<RespValue>, CommandError> {
    if call.len() != 2 {
        return Err(CommandError::InvalidArity("INCR"));
    }

    let key = call[1]
        .as_string()
        .ok_or(CommandError::ExpectedString("key"))?;

    let value = match store.get(key).await {
        Some(stored) => stored.as_int().ok_or(CommandError::NotAnInteger)? + 1,
        None => 1,
    };

    store
        .set(key, RespValue::BulkString(value.to_string()))
        .await;

    Ok(Some(RespValue::Integer(value)))
}

#[cfg(test)]
mod tests {
    use super::incr;
    use crate::commands::CommandError;
    use crate::resp::RespValue;
    use crate::store::Store;

    fn call(key: &str) -> Vec<RespValue> {
        vec![
            RespValue::BulkString("INCR".to_string()),
            RespValue::BulkString(key.to_string()),
        ]
    }

    #[tokio::test]
    async fn test_incr_absent_key_starts_at_one() {
        let store = Store::new();

        assert_eq!(
            incr(&call("counter"), &store).await,
            Ok(Some(RespValue::Integer(1)))
        );
        assert_eq!(
            incr(&call("counter"), &store).await,
            Ok(Some(RespValue::Integer(2)))
        );
        assert_eq!(
            store.get("counter").await,
            Some(RespValue::BulkString("2".to_string()))
        );
    }

    #[tokio::test]
    async fn test_incr_existing_number() {
        let store = Store::new();
        store
            .set("counter", RespValue::BulkString("41".to_string()))
            .await;

        assert_eq!(
            incr(&call("counter"), &store).await,
            Ok(Some(RespValue::Integer(42)))
        );
    }

    #[tokio::test]
    async fn test_incr_non_numeric_value() {
        let store = Store::new();
        store
            .set("name", RespValue::BulkString("mango".to_string()))
            .await;

        assert_eq!(
            incr(&call("name"), &store).await,
            Err(CommandError::NotAnInteger)
        );
    }
}
