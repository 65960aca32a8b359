use crate::commands::CommandError;
use crate::resp::RespValue;

pub fn echo(call: &[RespValue]) -> Result<Option<RespValue>, CommandError> {
    if call.len() != 2 {
        return Err(CommandError::InvalidArity("ECHO"));
    }

    let message = call[1].as_string().ok_or(CommandError::ValueNotAString)?;

    Ok(Some(RespValue::BulkString(message.to_string())))
}

#[cfg(test)]
mod tests {
    use super::echo;
    use crate::commands::CommandError;
    use crate::resp::RespValue;

    #[test]
    fn test_echo() {
        let test_cases = vec![
            (
                RespValue::command(&["ECHO", "hey"]),
                Ok(Some(RespValue::BulkString("hey".to_string()))),
            ),
            (
                RespValue::command(&["ECHO"]),
                Err(CommandError::InvalidArity("ECHO")),
            ),
            (
                RespValue::command(&["ECHO", "a", "b"]),
                Err(CommandError::InvalidArity("ECHO")),
            ),
        ];

        for (call, expected) in test_cases {
            let RespValue::Array(elements) = call else {
                unreachable!();
            };
            assert_eq!(echo(&elements), expected);
        }
    }
}
