//! Text generation through the registry adapter

use crate::parsing::cleanup_think_tags;
use equity_core::{CapabilityAdapter, CapabilityError, CapabilityRequest, DataDomain, Subject};
use serde_json::{Value, json};

/// Ask the text-generation adapter for a completion, with reasoning blocks
/// stripped
pub(crate) async fn generate(
    adapter: &dyn CapabilityAdapter,
    subject: &Subject,
    system: &str,
    prompt: &str,
) -> Result<String, CapabilityError> {
    let request = CapabilityRequest::new(DataDomain::TextGeneration, subject.clone())
        .with_params(json!({ "system": system, "prompt": prompt }));

    let response = adapter.call(request).await?;
    let text = response.get("text").and_then(Value::as_str).ok_or_else(|| {
        CapabilityError::malformed(format!(
            "text generation adapter '{}' returned no 'text' field",
            adapter.name()
        ))
    })?;

    let cleaned = cleanup_think_tags(text);
    if cleaned.is_empty() {
        return Err(CapabilityError::malformed("completion is empty after cleanup"));
    }
    Ok(cleaned)
}
