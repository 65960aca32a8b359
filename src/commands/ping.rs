use crate::commands::CommandError;
use crate::resp::RespValue;

pub fn ping(_call: &[RespValue]) -> Result<Option<RespValue>, CommandError> {
    Ok(Some(RespValue::SimpleString("PONG".to_string())))
}
