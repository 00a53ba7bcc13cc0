//! Stable Diffusion API client library
//!
//! Modules:
//! - `sdapi`: Async client for the `/sdapi/v1` REST endpoints plus the
//!   request/response types it speaks.
//! - `utils`: Payload helpers (model injection, init images) and `KEY=VALUE`
//!   override parsing used by the `sdctl` binary.
//! - `config`: Env-driven configuration loader.
//! - `error`: Common error type and alias.
//!
//! Re-exports are provided for common types: `ClientConfig`, `SdClient`,
//! `GenerationParams`, the descriptor types, and `TaskId`.
pub mod sdapi;
pub mod utils;
pub mod config;
pub mod error;

pub use config::ClientConfig;
pub use error::{SdError, SdResult};
pub use sdapi::client::SdClient;
pub use sdapi::types::{
    GeneratedImages, GenerationParams, ModelDescriptor, SamplerDescriptor, TaskId, UpscalerDescriptor,
};
