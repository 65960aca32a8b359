use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::store::Store;

pub struct SetArguments {
    key: String,
    value: RespValue,
    ttl_ms: Option<u64>,
}

impl SetArguments {
    pub fn parse(call: &[RespValue]) -> Result<Self, CommandError> {
        if call.len() != 3 && call.len() != 5 {
            return Err(CommandError::InvalidArity("SET"));
        }

        let key = call[1]
            .as_string()
            .ok_or(CommandError::KeyNotAString)?
            .to_string();

        if call[2].as_string().is_none() {
            return Err(CommandError::ValueNotAString);
        }
        let value = call[2].clone();

        let mut ttl_ms = None;
        if call.len() == 5 {
            let flag = call[3].as_string().ok_or(CommandError::FlagNotAString)?;
            if !flag.eq_ignore_ascii_case("px") {
                return Err(CommandError::UnknownSetArgument);
            }

            let expiry = call[4]
                .as_string()
                .ok_or(CommandError::ExpectedExpiryValue)?;
            ttl_ms = Some(
                expiry
                    .parse::<u64>()
                    .map_err(|_| CommandError::ExpiryNotAnInteger)?,
            );
        }

        Ok(Self { key, value, ttl_ms })
    }
}

pub async fn set(call: &[RespValue], store: &Store) -> Result<Option<RespValue>, CommandError> {
    let arguments = SetArguments::parse(call)?;

    match arguments.ttl_ms {
        Some(ttl_ms) => {
            store
                .set_with_expiry(&arguments.key, arguments.value, ttl_ms)
                .await
        }
        None => store.set(&arguments.key, arguments.value).await,
    }

    Ok(Some(RespValue::SimpleString("OK".to_string())))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::set;
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
    async fn test_set() {
        let store = Store::new();

        let reply = set(&call(&["SET", "fruit", "mango"]), &store).await;
        assert_eq!(reply, Ok(Some(RespValue::SimpleString("OK".to_string()))));
        assert_eq!(
            store.get("fruit").await,
            Some(RespValue::BulkString("mango".to_string()))
        );
    }

    #[tokio::test]
    async fn test_set_with_relative_expiry() {
        let store = Store::new();

        set(&call(&["SET", "temp", "1", "px", "40"]), &store)
            .await
            .unwrap();
        assert!(store.get("temp").await.is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(store.get("temp").await, None);
    }

    #[tokio::test]
    async fn test_set_argument_errors() {
        let store = Store::new();

        let test_cases = vec![
            (call(&["SET", "k"]), CommandError::InvalidArity("SET")),
            (
                call(&["SET", "k", "v", "px"]),
                CommandError::InvalidArity("SET"),
            ),
            (
                call(&["SET", "k", "v", "ex", "10"]),
                CommandError::UnknownSetArgument,
            ),
            (
                call(&["SET", "k", "v", "px", "soon"]),
                CommandError::ExpiryNotAnInteger,
            ),
        ];

        for (elements, expected) in test_cases {
            assert_eq!(set(&elements, &store).await, Err(expected));
        }
    }
}
