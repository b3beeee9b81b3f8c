use axum::Json;
use memory_core::error::Result;
use serde_json::Value;

/// Every tool response takes this shape on the wire, success or failure —
/// tool-call errors never surface as an HTTP error status, only as
/// `{ok:false, error}` inside a `200 OK` body.
pub fn envelope(result: Result<Value>) -> Json<Value> {
    match result {
        Ok(Value::Object(mut map)) => {
            map.insert("ok".to_string(), Value::Bool(true));
            Json(Value::Object(map))
        }
        Ok(other) => Json(serde_json::json!({"ok": true, "result": other})),
        Err(e) => Json(serde_json::json!({"ok": false, "error": e.to_string()})),
    }
}
