//! Thin HTTP client for the Stable Diffusion `/sdapi/v1` endpoints.
//!
//! - `txt2img`, `img2img`, `inpaint` post generation parameters and return
//!   the base64 `images` list.
//! - `submit_txt2img_async` / `task_result` are the fire-and-poll pair; the
//!   caller owns the polling loop.
//! - `models`, `samplers`, `upscalers`, `progress`, `options` are plain reads.
//! - `select_model` validates a checkpoint title against `/sd-models` before
//!   remembering it for later `txt2img` calls.
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{ClientConfig, DEFAULT_BASE_URL};
use crate::error::{SdError, SdResult};
use crate::sdapi::types::{
    GeneratedImages, ImagesResponse, ModelDescriptor, SamplerDescriptor, TaskId, TaskSubmitResponse,
    UpscalerDescriptor,
};
use crate::utils::payload::{attach_init_image, attach_mask, inject_model_checkpoint, to_payload_object, validate_task_id};

fn normalize(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Client for one Stable Diffusion server.
///
/// Holds one piece of session state, the selected checkpoint. It is changed
/// only through [`SdClient::select_model`] and [`SdClient::clear_model`], which
/// take `&mut self`; wrap the client in a lock if several tasks need to share
/// one selection. Clones share the connection pool but not the selection.
#[derive(Debug, Clone)]
pub struct SdClient {
    client: Client,
    base_url: String,
    selected_model: Option<String>,
}

impl SdClient {
    /// Build a client for `base_url` with the default 300 second timeout.
    pub fn new(base_url: impl Into<String>) -> SdResult<Self> {
        Self::from_config(&ClientConfig::default().with_base_url(base_url))
    }

    /// Client for a server on `http://127.0.0.1:7860`.
    pub fn local() -> SdResult<Self> {
        Self::new(DEFAULT_BASE_URL)
    }

    pub fn from_config(config: &ClientConfig) -> SdResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(SdClient { client, base_url: normalize(&config.base_url), selected_model: None })
    }

    /// Use a caller-built `reqwest::Client` (custom timeouts, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Checkpoint title sent with `txt2img` requests that don't name one.
    pub fn selected_model(&self) -> Option<&str> {
        self.selected_model.as_deref()
    }

    // ── Generation ──────────────────────────────────────────────────

    /// Generate images from a text prompt.
    ///
    /// If a model was selected and `params` has no `sd_model_checkpoint`, the
    /// selected title is added to the request. Returns `None` when the response
    /// carries no `images` field.
    pub async fn txt2img<P: Serialize + ?Sized>(&self, params: &P) -> SdResult<Option<GeneratedImages>> {
        let mut payload = to_payload_object(params)?;
        if inject_model_checkpoint(&mut payload, self.selected_model()) {
            tracing::debug!("Injected selected model {:?} into txt2img payload", self.selected_model);
        }
        self.post_for_images("/sdapi/v1/txt2img", payload).await
    }

    /// Generate images from `init_image` (base64) guided by `params`.
    pub async fn img2img<P: Serialize + ?Sized>(
        &self,
        params: &P,
        init_image: &str,
    ) -> SdResult<Option<GeneratedImages>> {
        let mut payload = to_payload_object(params)?;
        attach_init_image(&mut payload, init_image);
        self.post_for_images("/sdapi/v1/img2img", payload).await
    }

    /// Repaint the regions of `init_image` selected by `mask` (both base64).
    pub async fn inpaint<P: Serialize + ?Sized>(
        &self,
        params: &P,
        init_image: &str,
        mask: &str,
    ) -> SdResult<Option<GeneratedImages>> {
        let mut payload = to_payload_object(params)?;
        attach_init_image(&mut payload, init_image);
        attach_mask(&mut payload, mask);
        self.post_for_images("/sdapi/v1/inpaint", payload).await
    }

    // ── Async tasks ─────────────────────────────────────────────────

    /// Queue a text-to-image job without waiting for it. Returns `None` when
    /// the server answers without a `task_id`.
    pub async fn submit_txt2img_async<P: Serialize + ?Sized>(&self, params: &P) -> SdResult<Option<TaskId>> {
        let payload = to_payload_object(params)?;
        let resp = self.post_json("/sdapi/v1/async-txt2img", &Value::Object(payload)).await?;
        let body: TaskSubmitResponse = read_json(resp).await?;
        match &body.task_id {
            Some(id) => tracing::info!("Submitted async txt2img task {}", id),
            None => tracing::warn!("async-txt2img response had no task_id"),
        }
        Ok(body.task_id)
    }

    /// Fetch the images of a finished task. `None` means no `images` yet.
    pub async fn task_result(&self, task_id: impl AsRef<str>) -> SdResult<Option<GeneratedImages>> {
        let task_id = task_id.as_ref();
        validate_task_id(task_id)?;
        let resp = self.get(&format!("/sdapi/v1/task-result/{}", task_id)).await?;
        let body: ImagesResponse = read_json(resp).await?;
        Ok(body.images)
    }

    // ── Server state ────────────────────────────────────────────────

    /// Current generation progress as reported by the server.
    pub async fn progress(&self) -> SdResult<Option<Value>> {
        self.get_optional_body("/sdapi/v1/progress").await
    }

    /// Server options (`/sdapi/v1/options`).
    pub async fn options(&self) -> SdResult<Option<Value>> {
        self.get_optional_body("/sdapi/v1/options").await
    }

    /// Update server options. Returns true only when the server answers 200.
    pub async fn set_options<C: Serialize + ?Sized>(&self, options: &C) -> SdResult<bool> {
        let resp = self.post_json("/sdapi/v1/options", options).await?;
        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("Failed to set options. Status: {}, Body: {}", status, body);
            return Ok(false);
        }
        Ok(true)
    }

    // ── Discovery ───────────────────────────────────────────────────

    pub async fn models(&self) -> SdResult<Vec<ModelDescriptor>> {
        let resp = self.get("/sdapi/v1/sd-models").await?;
        read_json(resp).await
    }

    pub async fn samplers(&self) -> SdResult<Vec<SamplerDescriptor>> {
        let resp = self.get("/sdapi/v1/samplers").await?;
        read_json(resp).await
    }

    pub async fn upscalers(&self) -> SdResult<Vec<UpscalerDescriptor>> {
        let resp = self.get("/sdapi/v1/upscalers").await?;
        read_json(resp).await
    }

    // ── Model selection ─────────────────────────────────────────────

    /// Remember `title` as the checkpoint for later `txt2img` calls.
    ///
    /// The title must match a descriptor from `/sdapi/v1/sd-models` exactly.
    /// On failure the previous selection is kept.
    pub async fn select_model(&mut self, title: &str) -> SdResult<()> {
        let models = self.models().await?;
        if !models.iter().any(|m| m.title == title) {
            tracing::warn!("Rejected model selection '{}': not among {} available models", title, models.len());
            return Err(SdError::InvalidModel(title.to_string()));
        }
        tracing::info!("Selected model '{}'", title);
        self.selected_model = Some(title.to_string());
        Ok(())
    }

    pub fn clear_model(&mut self) {
        self.selected_model = None;
    }

    // ── Plumbing ────────────────────────────────────────────────────

    async fn post_for_images(&self, path: &str, payload: Map<String, Value>) -> SdResult<Option<GeneratedImages>> {
        let resp = self.post_json(path, &Value::Object(payload)).await?;
        let body: ImagesResponse = read_json(resp).await?;
        if body.images.is_none() {
            tracing::warn!("Response from {} had no images field", path);
        }
        Ok(body.images)
    }

    async fn get_optional_body(&self, path: &str) -> SdResult<Option<Value>> {
        let resp = self.get(path).await?;
        let body: Value = read_json(resp).await?;
        Ok(if body.is_null() { None } else { Some(body) })
    }

    async fn get(&self, path: &str) -> SdResult<Response> {
        let url = format!("{}{}", self.base_url, path);
        tracing::info!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        Ok(response)
    }

    /// POST a JSON body. The status is left for the caller to judge.
    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> SdResult<Response> {
        let url = format!("{}{}", self.base_url, path);
        tracing::info!("POST {}", url);
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!("Payload: {}", serde_json::to_string(body)?);
        }
        let response = self.client.post(&url).json(body).send().await?;
        Ok(response)
    }
}

/// Decode a successful response body, or turn a failed status into `SdError::Http`.
async fn read_json<T: DeserializeOwned>(response: Response) -> SdResult<T> {
    let status = response.status();
    if !status.is_success() {
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_else(|_| "Unable to read error body".to_string());
        tracing::error!("Request to {} failed. Status: {}, Body: {}", url, status, body);
        return Err(SdError::Http { status: status.as_u16(), body });
    }
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
