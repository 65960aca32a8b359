use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::commands::{CommandError, psync::send_ack_probe};
use crate::connection::Connection;
use crate::resp::RespValue;
use crate::store::Store;

pub struct WaitArguments {
    num_replicas: usize,
    timeout_ms: u64,
}

impl WaitArguments {
    pub fn parse(call: &[RespValue]) -> Result<Self, CommandError> {
        if call.len() != 3 {
            return Err(CommandError::InvalidArity("WAIT"));
        }

        let num_replicas = call[1]
            .as_int()
            .ok_or(CommandError::NumReplicasNotAnInteger)?
            .max(0) as usize;
        let timeout_ms = call[2]
            .as_int()
            .ok_or(CommandError::TimeoutNotAnInteger)?
            .max(0) as u64;

        Ok(Self {
            num_replicas,
            timeout_ms,
        })
    }
}

/// WAIT: probe every replica, then poll until enough of them have
/// acknowledged all propagated bytes or the deadline passes. A zero
/// timeout counts once and returns immediately.
pub async fn wait(call: &[RespValue], store: &Store) -> Result<Option<RespValue>, CommandError> {
    let arguments = WaitArguments::parse(call)?;

    let replicas = store.replicas().await;
    for replica in &replicas {
        send_ack_probe(replica).await;
    }

    let deadline = Instant::now() + Duration::from_millis(arguments.timeout_ms);

    let mut acknowledged = count_acknowledged(&replicas).await;
    while acknowledged < arguments.num_replicas && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
        acknowledged = count_acknowledged(&replicas).await;
    }

    Ok(Some(RespValue::Integer(acknowledged as i64)))
}

async fn count_acknowledged(replicas: &[Arc<Connection>]) -> usize {
    let mut count = 0;

    for replica in replicas {
        let state = replica.state().await;
        if state.expected_offset == state.offset {
            count += 1;
        }
    }

    count
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::wait;
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
    async fn test_wait_with_no_replicas() {
        let store = Store::new();

        let started = Instant::now();
        let reply = wait(&call(&["WAIT", "0", "100"]), &store).await;

        assert_eq!(reply, Ok(Some(RespValue::Integer(0))));
        assert!(
            started.elapsed() < Duration::from_millis(50),
            "an already-met threshold must not wait for the deadline"
        );
    }

    #[tokio::test]
    async fn test_wait_times_out_at_zero_count() {
        let store = Store::new();

        let started = Instant::now();
        let reply = wait(&call(&["WAIT", "1", "80"]), &store).await;
        let elapsed = started.elapsed();

        assert_eq!(reply, Ok(Some(RespValue::Integer(0))));
        assert!(
            elapsed >= Duration::from_millis(80),
            "returned after {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_wait_argument_errors() {
        let store = Store::new();

        let test_cases = vec![
            (call(&["WAIT", "1"]), CommandError::InvalidArity("WAIT")),
            (
                call(&["WAIT", "one", "100"]),
                CommandError::NumReplicasNotAnInteger,
            ),
            (
                call(&["WAIT", "1", "soon"]),
                CommandError::TimeoutNotAnInteger,
            ),
        ];

        for (elements, expected) in test_cases {
            assert_eq!(wait(&elements, &store).await, Err(expected));
        }
    }
}
