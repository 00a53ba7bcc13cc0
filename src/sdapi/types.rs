//! Request and response shapes for the `/sdapi/v1` endpoints.
//!
//! The server owns these schemas, so every type keeps the fields this crate
//! relies on and collects the rest into a flattened `extra` map.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Base64-encoded images, in the order the server returned them.
pub type GeneratedImages = Vec<String>;

/// Parameters for a generation request.
///
/// Unset fields are left out of the payload entirely so the server applies its
/// own defaults. Anything not covered by a named field goes into `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfg_scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_iter: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denoising_strength: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sd_model_checkpoint: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GenerationParams {
    pub fn new(prompt: impl Into<String>) -> Self {
        GenerationParams { prompt: Some(prompt.into()), ..Default::default() }
    }

    pub fn negative_prompt(mut self, text: impl Into<String>) -> Self {
        self.negative_prompt = Some(text.into());
        self
    }

    pub fn steps(mut self, steps: u32) -> Self {
        self.steps = Some(steps);
        self
    }

    pub fn sampler(mut self, name: impl Into<String>) -> Self {
        self.sampler_name = Some(name.into());
        self
    }

    pub fn cfg_scale(mut self, cfg: f64) -> Self {
        self.cfg_scale = Some(cfg);
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn batch_size(mut self, n: u32) -> Self {
        self.batch_size = Some(n);
        self
    }

    pub fn denoising_strength(mut self, strength: f64) -> Self {
        self.denoising_strength = Some(strength);
        self
    }

    /// Pin a checkpoint for this request only; overrides the client's selected model.
    pub fn checkpoint(mut self, title: impl Into<String>) -> Self {
        self.sd_model_checkpoint = Some(title.into());
        self
    }

    /// Set any server-defined key not covered by a named field.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Entry of `/sdapi/v1/sd-models`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub title: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModelDescriptor {
    pub fn model_name(&self) -> Option<&str> {
        self.extra.get("model_name").and_then(|v| v.as_str())
    }
}

/// Entry of `/sdapi/v1/samplers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Entry of `/sdapi/v1/upscalers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpscalerDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Handle returned by `/sdapi/v1/async-txt2img`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        TaskId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        TaskId(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        TaskId(id.to_string())
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Body shapes we only read one field from. A missing field decodes to `None`.
#[derive(Debug, Deserialize)]
pub(crate) struct ImagesResponse {
    #[serde(default)]
    pub images: Option<GeneratedImages>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TaskSubmitResponse {
    #[serde(default)]
    pub task_id: Option<TaskId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unset_fields_are_omitted() {
        let params = GenerationParams::new("cat");
        assert_eq!(serde_json::to_value(&params).unwrap(), json!({"prompt": "cat"}));
    }

    #[test]
    fn test_builder_and_extra_keys() {
        let params = GenerationParams::new("a lighthouse at dusk")
            .steps(30)
            .size(768, 512)
            .sampler("DPM++ 2M Karras")
            .set("restore_faces", true);
        let v = serde_json::to_value(&params).unwrap();
        assert_eq!(v["steps"], 30);
        assert_eq!(v["width"], 768);
        assert_eq!(v["height"], 512);
        assert_eq!(v["sampler_name"], "DPM++ 2M Karras");
        assert_eq!(v["restore_faces"], true);
        assert!(v.get("seed").is_none());
    }

    #[test]
    fn test_params_collect_unknown_keys() {
        let params: GenerationParams = serde_json::from_value(json!({
            "prompt": "cat",
            "tiling": false,
            "override_settings": {"CLIP_stop_at_last_layers": 2}
        }))
        .unwrap();
        assert_eq!(params.prompt.as_deref(), Some("cat"));
        assert_eq!(params.extra["tiling"], false);
        assert_eq!(params.extra["override_settings"]["CLIP_stop_at_last_layers"], 2);
    }

    #[test]
    fn test_model_descriptor_keeps_server_fields() {
        let m: ModelDescriptor = serde_json::from_value(json!({
            "title": "v1-5-pruned-emaonly.safetensors [6ce0161689]",
            "model_name": "v1-5-pruned-emaonly",
            "hash": "6ce0161689"
        }))
        .unwrap();
        assert_eq!(m.title, "v1-5-pruned-emaonly.safetensors [6ce0161689]");
        assert_eq!(m.model_name(), Some("v1-5-pruned-emaonly"));
        assert_eq!(m.extra["hash"], "6ce0161689");
    }

    #[test]
    fn test_images_response_missing_field() {
        let r: ImagesResponse = serde_json::from_value(json!({})).unwrap();
        assert!(r.images.is_none());
        let r: ImagesResponse = serde_json::from_value(json!({"images": ["AAA=="], "info": "{}"})).unwrap();
        assert_eq!(r.images, Some(vec!["AAA==".to_string()]));
    }

    #[test]
    fn test_task_id_is_transparent() {
        let r: TaskSubmitResponse = serde_json::from_value(json!({"task_id": "f3a9-01"})).unwrap();
        let id = r.task_id.unwrap();
        assert_eq!(id.as_str(), "f3a9-01");
        assert_eq!(id.to_string(), "f3a9-01");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("f3a9-01"));
    }
}
