//! Optional LLM enhancement pass over a finished record.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use storelens_core::LlmConfig;
use thiserror::Error;

use crate::record::AggregateRecord;

/// Products and FAQs sent to the model are capped to keep prompts small.
const MAX_PROMPT_PRODUCTS: usize = 10;
const MAX_PROMPT_FAQS: usize = 10;
const MAX_PROMPT_BRAND_CHARS: usize = 2_000;

/// Derived fields added on top of the extracted record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnhancementFields {
    pub insights_summary: Option<String>,
    pub product_analysis: Option<Value>,
    pub social_analysis: Option<Value>,
}

#[derive(Debug, Error)]
#[error("enhancement unavailable: {0}")]
pub struct EnhancementUnavailable(pub String);

/// Produces derived fields for a record. Failures never touch the record.
#[async_trait]
pub trait Enhancer: Send + Sync {
    async fn enhance(
        &self,
        record: &AggregateRecord,
    ) -> Result<EnhancementFields, EnhancementUnavailable>;
}

/// OpenAI-compatible chat-completions client.
pub struct LlmEnhancer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl LlmEnhancer {
    /// # Errors
    ///
    /// Returns [`EnhancementUnavailable`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, EnhancementUnavailable> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EnhancementUnavailable(format!("client build failed: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn prompt(record: &AggregateRecord) -> String {
        let products: Vec<Value> = record
            .products
            .iter()
            .take(MAX_PROMPT_PRODUCTS)
            .map(|p| {
                json!({
                    "title": p.title,
                    "product_type": p.product_type,
                    "vendor": p.vendor,
                    "price": p.price,
                    "tags": p.tags,
                })
            })
            .collect();
        let brand: String = record
            .brand_context
            .as_deref()
            .unwrap_or_default()
            .chars()
            .take(MAX_PROMPT_BRAND_CHARS)
            .collect();
        let store = json!({
            "store_url": record.store_url,
            "product_count": record.products.len(),
            "products": products,
            "brand_context": brand,
            "social_handles": record.social_handles,
            "faqs": record.faqs.iter().take(MAX_PROMPT_FAQS).collect::<Vec<_>>(),
        });

        format!(
            "Analyze this online store and respond with a single JSON object with keys:\n\
             \"insights_summary\": a paragraph (max 200 words) on what the brand sells, its \
             audience and key selling points;\n\
             \"product_analysis\": {{\"categories\": {{category: count}}, \"analysis\": string}};\n\
             \"social_analysis\": {{\"analysis\": string, \"recommendations\": [string]}}.\n\n\
             Store data:\n{store}"
        )
    }
}

#[async_trait]
impl Enhancer for LlmEnhancer {
    async fn enhance(
        &self,
        record: &AggregateRecord,
    ) -> Result<EnhancementFields, EnhancementUnavailable> {
        let body = json!({
            "model": self.model,
            "temperature": 0.2,
            "messages": [
                {"role": "system", "content": "You are an e-commerce analyst. Reply with JSON only."},
                {"role": "user", "content": Self::prompt(record)},
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EnhancementUnavailable(format!("LLM request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(EnhancementUnavailable(format!(
                "LLM returned status {}",
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| EnhancementUnavailable(format!("LLM response parse error: {e}")))?;

        let content = payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| EnhancementUnavailable("LLM response has no message content".into()))?;

        parse_fields(content)
    }
}

/// Reads the model's JSON reply, tolerating prose or code fences around it.
fn parse_fields(content: &str) -> Result<EnhancementFields, EnhancementUnavailable> {
    let object = serde_json::from_str::<Value>(content.trim())
        .ok()
        .filter(Value::is_object)
        .or_else(|| {
            let start = content.find('{')?;
            let end = content.rfind('}')?;
            serde_json::from_str::<Value>(content.get(start..=end)?).ok()
        })
        .ok_or_else(|| EnhancementUnavailable("no JSON object in LLM reply".into()))?;

    let fields = EnhancementFields {
        insights_summary: object
            .get("insights_summary")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned),
        product_analysis: object.get("product_analysis").filter(|v| !v.is_null()).cloned(),
        social_analysis: object.get("social_analysis").filter(|v| !v.is_null()).cloned(),
    };

    if fields == EnhancementFields::default() {
        return Err(EnhancementUnavailable("LLM reply had none of the expected keys".into()));
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json_reply() {
        let fields = parse_fields(
            r#"{"insights_summary":"Boots.","product_analysis":{"categories":{"boots":3}},"social_analysis":null}"#,
        )
        .unwrap();
        assert_eq!(fields.insights_summary.as_deref(), Some("Boots."));
        assert_eq!(fields.product_analysis.unwrap()["categories"]["boots"], 3);
        assert!(fields.social_analysis.is_none());
    }

    #[test]
    fn parses_fenced_reply() {
        let reply = "Here you go:\n```json\n{\"insights_summary\": \"Handmade boots.\"}\n```";
        let fields = parse_fields(reply).unwrap();
        assert_eq!(fields.insights_summary.as_deref(), Some("Handmade boots."));
    }

    #[test]
    fn rejects_reply_without_json() {
        assert!(parse_fields("Sorry, I cannot help with that.").is_err());
        assert!(parse_fields(r#"{"unrelated": 1}"#).is_err());
    }

    #[test]
    fn prompt_includes_store_data() {
        let mut record = AggregateRecord::empty("https://boots.example.com");
        record.brand_context = Some("Handmade leather boots.".into());
        let prompt = LlmEnhancer::prompt(&record);
        assert!(prompt.contains("https://boots.example.com"));
        assert!(prompt.contains("Handmade leather boots."));
    }
}
