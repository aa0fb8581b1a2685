use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Value, json};

use crate::{Error, Result};

pub const JNAP_PATH: &str = "/JNAP/";
pub const ACTION_HEADER: &str = "x-jnap-action";
pub const GET_ATTRIBUTES: &str = "http://phyn.com/jnap/uponorsky/GetAttributes";
pub const SET_ATTRIBUTES: &str = "http://phyn.com/jnap/uponorsky/SetAttributes";

const RESULT_OK: &str = "OK";

#[derive(Debug, Deserialize)]
struct WaspVar {
    #[serde(rename = "waspVarName")]
    name: String,
    #[serde(rename = "waspVarValue")]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct GetAttributesOutput {
    vars: Vec<WaspVar>,
}

#[derive(Debug, Deserialize)]
struct GetAttributesResponse {
    output: GetAttributesOutput,
}

pub fn get_attributes_payload() -> Value {
    json!({})
}

pub fn set_attributes_payload(vars: &[(String, String)]) -> Value {
    let vars: Vec<Value> = vars
        .iter()
        .map(|(name, value)| json!({ "waspVarName": name, "waspVarValue": value }))
        .collect();
    json!({ "vars": vars })
}

/// Flattens `{"output": {"vars": [...]}}` into name -> value. Non-string
/// values are kept in their JSON text form.
pub fn parse_get_attributes(body: Value) -> Result<HashMap<String, String>> {
    let response: GetAttributesResponse = serde_json::from_value(body)
        .map_err(|e| Error::Protocol(format!("unexpected GetAttributes response: {e}")))?;
    Ok(response
        .output
        .vars
        .into_iter()
        .map(|var| {
            let value = match var.value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (var.name, value)
        })
        .collect())
}

/// A missing `result` is accepted; any other value than `"OK"` is not.
pub fn check_set_attributes(body: &Value) -> Result<()> {
    match body.get("result") {
        None => Ok(()),
        Some(Value::String(s)) if s == RESULT_OK => Ok(()),
        Some(_) => Err(Error::Rejected(body.to_string())),
    }
}
