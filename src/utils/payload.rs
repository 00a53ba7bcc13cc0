//! Helpers that turn caller parameters into outgoing JSON bodies.
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{SdError, SdResult};

pub const MODEL_CHECKPOINT_KEY: &str = "sd_model_checkpoint";

/// Serialize `params` and require the result to be a JSON object.
pub fn to_payload_object<P: Serialize + ?Sized>(params: &P) -> SdResult<Map<String, Value>> {
    match serde_json::to_value(params)? {
        Value::Object(map) => Ok(map),
        other => Err(SdError::InvalidParams(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Insert `model` as `sd_model_checkpoint` unless the payload already has that key.
///
/// Any caller value is kept as is, `null` included. Returns whether the
/// payload was changed.
pub fn inject_model_checkpoint(payload: &mut Map<String, Value>, model: Option<&str>) -> bool {
    let Some(model) = model else { return false };
    if payload.contains_key(MODEL_CHECKPOINT_KEY) {
        return false;
    }
    payload.insert(MODEL_CHECKPOINT_KEY.to_string(), Value::String(model.to_string()));
    true
}

/// Set `init_images` to a single-element list holding `image`.
pub fn attach_init_image(payload: &mut Map<String, Value>, image: &str) {
    payload.insert("init_images".to_string(), Value::Array(vec![Value::String(image.to_string())]));
}

pub fn attach_mask(payload: &mut Map<String, Value>, mask: &str) {
    payload.insert("mask".to_string(), Value::String(mask.to_string()));
}

/// A task id goes straight into the URL path, so it must be a single safe segment.
///
/// Only ASCII alphanumerics, underscore and hyphen are allowed.
pub fn validate_task_id(id: &str) -> SdResult<()> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(SdError::InvalidTaskId(id.to_string()));
    }
    Ok(())
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_to_payload_object_rejects_non_objects() {
        assert!(to_payload_object(&json!({"prompt": "cat"})).is_ok());
        assert!(matches!(to_payload_object(&json!(["cat"])), Err(SdError::InvalidParams(_))));
        assert!(matches!(to_payload_object("cat"), Err(SdError::InvalidParams(_))));
    }

    #[test]
    fn test_inject_when_absent() {
        let mut p = obj(json!({"prompt": "cat"}));
        assert!(inject_model_checkpoint(&mut p, Some("modelB")));
        assert_eq!(Value::Object(p), json!({"prompt": "cat", "sd_model_checkpoint": "modelB"}));
    }

    #[test]
    fn test_caller_value_wins() {
        let mut p = obj(json!({"prompt": "cat", "sd_model_checkpoint": "Y"}));
        assert!(!inject_model_checkpoint(&mut p, Some("X")));
        assert_eq!(p["sd_model_checkpoint"], "Y");
    }

    #[test]
    fn test_explicit_null_is_kept() {
        let mut p = obj(json!({"sd_model_checkpoint": null}));
        assert!(!inject_model_checkpoint(&mut p, Some("X")));
        assert!(p["sd_model_checkpoint"].is_null());
    }

    #[test]
    fn test_no_selection_leaves_payload_alone() {
        let mut p = obj(json!({"prompt": "cat"}));
        assert!(!inject_model_checkpoint(&mut p, None));
        assert!(!p.contains_key(MODEL_CHECKPOINT_KEY));
    }

    #[test]
    fn test_attach_images() {
        let mut p = obj(json!({"prompt": "cat", "init_images": ["old"]}));
        attach_init_image(&mut p, "SU5JVA==");
        attach_mask(&mut p, "TUFTSw==");
        assert_eq!(p["init_images"], json!(["SU5JVA=="]));
        assert_eq!(p["mask"], "TUFTSw==");
    }

    #[test]
    fn test_validate_task_id() {
        assert!(validate_task_id("task-0042").is_ok());
        assert!(validate_task_id("3f2b1c9e-aaaa-4bbb-8ccc-0123456789ab").is_ok());
        assert!(validate_task_id("task_7").is_ok());
        for bad in ["", ".", "..", "..\\options", "a\\b", "a/b", "../x", "id?x=1", "id#frag", "a b", "%2e", "t\u{e9}"] {
            assert!(matches!(validate_task_id(bad), Err(SdError::InvalidTaskId(_))), "{bad}");
        }
    }
}
