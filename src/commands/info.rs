use crate::commands::CommandError;
use crate::resp::RespValue;
use crate::store::Store;

/// INFO: renders the replication section. Asking for any other section
/// yields no reply at all.
pub async fn info(call: &[RespValue], store: &Store) -> Result<Option<RespValue>, CommandError> {
    if call.len() > 2 {
        return Err(CommandError::InvalidArity("INFO"));
    }

    if let Some(section) = call.get(1) {
        let section = section
            .as_string()
            .ok_or(CommandError::ExpectedString("argument for INFO"))?;

        if !section.eq_ignore_ascii_case("replication") {
            return Ok(None);
        }
    }

    let role = if store.get_param("replicaof").await.is_some() {
        "slave"
    } else {
        "master"
    };

    let mut lines = vec![format!("role:{}", role)];
    if role == "master" {
        let replid = store.get_param("master_replid").await.unwrap_or_default();
        let offset = store
            .get_param("master_repl_offset")
            .await
            .unwrap_or_default();

        lines.push(format!("master_replid:{}", replid));
        lines.push(format!("master_repl_offset:{}", offset));
    }

    Ok(Some(RespValue::BulkString(lines.join("\r\n"))))
}

#[cfg(test)]
mod tests {
    use super::info;
    use crate::resp::RespValue;
    use crate::store::Store;

    fn call(parts: &[&str]) -> Vec<RespValue> {
        let RespValue::Array(elements) = RespValue::command(parts) else {
            unreachable!();
        };
        elements
    }

    #[tokio::test]
    async fn test_info_replication_for_master() {
        let store = Store::new();
        store.set_param("master_replid", "abc123").await;
        store.set_param("master_repl_offset", "0").await;

        let reply = info(&call(&["INFO", "replication"]), &store).await.unwrap();

        assert_eq!(
            reply,
            Some(RespValue::BulkString(
                "role:master\r\nmaster_replid:abc123\r\nmaster_repl_offset:0".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_info_replication_for_replica() {
        let store = Store::new();
        store.set_param("replicaof", "127.0.0.1:6379").await;

        let reply = info(&call(&["INFO", "replication"]), &store).await.unwrap();

        assert_eq!(reply, Some(RespValue::BulkString("role:slave".to_string())));
    }

    #[tokio::test]
    async fn test_info_unknown_section_is_silent() {
        let store = Store::new();

        let reply = info(&call(&["INFO", "keyspace"]), &store).await.unwrap();

        assert_eq!(reply, None);
    }
}
