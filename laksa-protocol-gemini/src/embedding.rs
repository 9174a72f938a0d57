//! Gemini batch embeddings.

use serde_json::{json, Value};

use laksa_core::config::{ModelConfig, ProviderConfig};
use laksa_core::error::LlmError;
use laksa_core::execution::ProviderRequest;
use laksa_core::keys::CredentialLease;

pub(crate) fn build_embeddings_request(
    texts: &[String],
    task_type: Option<&str>,
    credential: &CredentialLease,
    provider: &ProviderConfig,
    model: &ModelConfig,
) -> Result<ProviderRequest, LlmError> {
    let api_model = if model.model_name.starts_with("models/") {
        model.model_name.clone()
    } else {
        format!("models/{}", model.model_name)
    };
    let url = format!(
        "{}/v1beta/{}:batchEmbedContents?key={}",
        provider.resolved_api_base()?,
        api_model,
        credential.expose(),
    );

    let requests: Vec<Value> = texts
        .iter()
        .map(|text| {
            // Empty strings are rejected upstream; send a space instead.
            let safe = if text.is_empty() { " " } else { text.as_str() };
            let mut entry = json!({
                "model": api_model,
                "content": {"parts": [{"text": safe}]},
            });
            if let Some(task) = task_type {
                entry["taskType"] = json!(task.to_uppercase());
            }
            entry
        })
        .collect();

    let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
    for (name, value) in &provider.default_headers {
        headers.push((name.clone(), value.clone()));
    }

    Ok(ProviderRequest {
        url,
        headers,
        body: json!({ "requests": requests }),
    })
}

pub(crate) fn parse_embeddings_response(body: &Value) -> Result<Vec<Vec<f32>>, LlmError> {
    let embeddings = body["embeddings"]
        .as_array()
        .ok_or_else(|| LlmError::Parse("embeddings response missing 'embeddings'".into()))?;
    embeddings
        .iter()
        .map(|entry| {
            entry["values"]
                .as_array()
                .ok_or_else(|| LlmError::Parse("embedding entry missing 'values'".into()))
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_f64)
                        .map(|v| v as f32)
                        .collect()
                })
        })
        .collect()
}
