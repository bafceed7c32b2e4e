//! Command-line parameter literals.
//!
//! `null`, integers, floats, `x'0A0B'` blobs and `'quoted'` text are
//! recognized; anything else is taken as text verbatim.

use sqlrunner_core::Value;

pub fn parse_param(raw: &str) -> Result<Value, String> {
    if raw.eq_ignore_ascii_case("null") {
        return Ok(Value::Null);
    }
    if let Some(hex) = strip_blob(raw) {
        return decode_hex(hex).map(Value::Blob);
    }
    if let Some(text) = raw
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return Ok(Value::Text(text.replace("''", "'")));
    }
    if let Ok(integer) = raw.parse::<i64>() {
        return Ok(Value::Integer(integer));
    }
    if let Ok(real) = raw.parse::<f64>() {
        if real.is_finite() {
            return Ok(Value::Real(real));
        }
    }
    Ok(Value::Text(raw.to_string()))
}

fn strip_blob(raw: &str) -> Option<&str> {
    raw.strip_prefix("x'")
        .or_else(|| raw.strip_prefix("X'"))
        .and_then(|rest| rest.strip_suffix('\''))
}

fn decode_hex(digits: &str) -> Result<Vec<u8>, String> {
    hex::decode(digits).map_err(|err| match err {
        hex::FromHexError::OddLength => {
            format!("blob literal `{digits}` has an odd number of digits")
        }
        other => format!("blob literal `{digits}` is not hexadecimal: {other}"),
    })
}
