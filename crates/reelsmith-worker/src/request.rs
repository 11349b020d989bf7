//! Request file loading.

use std::path::Path;

use serde_json::Value;

use reelsmith_models::CompositionRequest;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

const BUFFER_FIELD: &str = "normalize_buffer_secs";

/// Parse a request, filling the normalization buffer from config when the
/// request leaves it out.
pub fn parse_request(json: &str, config: &WorkerConfig) -> WorkerResult<CompositionRequest> {
    let mut value: Value = serde_json::from_str(json)?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| WorkerError::invalid_request("request must be a JSON object"))?;

    if !object.contains_key(BUFFER_FIELD) {
        object.insert(BUFFER_FIELD.to_string(), Value::from(config.normalize_buffer_secs));
    }

    Ok(serde_json::from_value(value)?)
}

pub async fn load_request(path: &Path, config: &WorkerConfig) -> WorkerResult<CompositionRequest> {
    let json = tokio::fs::read_to_string(path).await?;
    parse_request(&json, config)
}
