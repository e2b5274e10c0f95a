//! Vision-model provider speaking the OpenAI chat-completions protocol.
//!
//! The document image is sent together with a strict JSON schema, so the
//! model answers with a record in the same shape as [`InvoiceExtract`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{env_key, http_client, snippet, Provider, ProviderOutput};
use crate::document::Document;
use crate::error::ProviderError;
use crate::models::config::VisionConfig;
use crate::models::invoice::InvoiceExtract;

const SYSTEM_PROMPT: &str = "You extract data from Argentine AFIP invoices. \
Read the image carefully and answer only with JSON that matches the schema.\n\
- type_letter is the letter in the header box (A, B or C); doc_code is 01, 06 or 11.\n\
- point_of_sale has 4 digits and invoice_number 8 digits, zero padded.\n\
- tax ids (CUIT) are 11 digits without dashes.\n\
- dates use YYYY-MM-DD.\n\
- amounts are plain numbers with a dot as decimal separator (1234.56, never 1.234,56).\n\
- tax rates are fractions (0.21 for 21%).\n\
- authorization is the CAE number and its expiry date.\n\
- confidence reflects legibility: 0.9-1.0 everything clear, 0.7-0.8 mostly legible, \
0.5-0.6 several fields doubtful, below 0.5 largely illegible.\n\
- set needs_review when the image is poor, a critical field is missing, or confidence is below 0.8.";

const USER_PROMPT: &str = "Extract every visible field of this invoice. \
Pay special attention to numbers and dates.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<Content<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Content<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
    detail: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: &'static str,
    json_schema: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Output schema sent with every request.
pub fn invoice_schema() -> Value {
    let party = json!({
        "type": "object",
        "properties": {
            "name": { "type": "string" },
            "tax_id": { "type": "string", "pattern": "^[0-9]{11}$" }
        }
    });
    let date = json!({ "type": "string", "format": "date" });

    json!({
        "type": "object",
        "properties": {
            "type_letter": { "type": "string", "enum": ["A", "B", "C"] },
            "doc_code": { "type": "string", "enum": ["01", "06", "11"] },
            "point_of_sale": { "type": "string", "pattern": "^[0-9]{4}$" },
            "invoice_number": { "type": "string", "pattern": "^[0-9]{8}$" },
            "document_id": { "type": "string" },
            "issue_date": date,
            "due_date": date,
            "service_period": {
                "type": "object",
                "properties": { "from": date, "to": date }
            },
            "supplier": party,
            "customer": party,
            "amounts": {
                "type": "object",
                "properties": {
                    "net": { "type": "number" },
                    "taxes": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "type": { "type": "string" },
                                "rate": { "type": "number" },
                                "amount": { "type": "number" }
                            }
                        }
                    },
                    "total": { "type": "number" },
                    "currency_code": { "type": "string", "enum": ["ARS", "USD", "EUR"] }
                }
            },
            "payment_terms": { "type": "string" },
            "bank": {
                "type": "object",
                "properties": {
                    "bank_name": { "type": "string" },
                    "branch": { "type": "string" },
                    "cbu": { "type": "string", "pattern": "^[0-9]{22}$" }
                }
            },
            "authorization": {
                "type": "object",
                "properties": { "number": { "type": "string" }, "due_date": date }
            },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
            "needs_review": { "type": "boolean" }
        },
        "required": ["type_letter", "amounts", "confidence", "needs_review"]
    })
}

/// Multimodal model provider.
pub struct VisionProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    detail: String,
}

impl VisionProvider {
    /// Build from configuration, reading the key from the configured
    /// environment variable.
    pub fn from_config(config: &VisionConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: env_key(&config.api_key_env),
            max_tokens: config.max_tokens,
            detail: config.detail.clone(),
        })
    }

    /// Override the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn request_body<'a>(&'a self, url: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: MessageContent::Text(SYSTEM_PROMPT),
                },
                Message {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        Content::Text { text: USER_PROMPT },
                        Content::ImageUrl {
                            image_url: ImageUrl {
                                url,
                                detail: &self.detail,
                            },
                        },
                    ]),
                },
            ],
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                r#type: "json_schema",
                json_schema: json!({
                    "name": "invoice_extraction",
                    "schema": invoice_schema()
                }),
            },
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> ProviderError {
        ProviderError::MalformedResponse {
            provider: self.name().to_string(),
            reason: reason.into(),
        }
    }

    /// Decode the assistant message into a record.
    fn parse_content(&self, content: &str) -> Result<InvoiceExtract, ProviderError> {
        let json = strip_code_fences(content);
        serde_json::from_str(json).map_err(|e| {
            self.malformed(format!("invalid JSON ({}): {}", e, snippet(json)))
        })
    }
}

#[async_trait]
impl Provider for VisionProvider {
    fn name(&self) -> &str {
        "vision"
    }

    /// Image URLs only; chat vision endpoints do not read PDFs.
    fn accepts(&self, document: &Document) -> bool {
        match document {
            Document::Url(_) => document.data_mime() != Some("application/pdf"),
            Document::Text { .. } => false,
        }
    }

    async fn extract(&self, document: &Document) -> Result<ProviderOutput, ProviderError> {
        let Document::Url(url) = document else {
            return Err(ProviderError::Unsupported {
                provider: self.name().to_string(),
                reference: document.reference(),
            });
        };
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ProviderError::NotConfigured(self.name().to_string()));
        };

        debug!("Sending {} to {} ({})", document.reference(), self.endpoint, self.model);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&self.request_body(url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: self.name().to_string(),
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| self.malformed(e.to_string()))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| self.malformed("no content in response"))?;

        let record = self.parse_content(&content)?;
        debug!("Vision model reported confidence {:.2}", record.confidence);
        Ok(ProviderOutput::Structured(Box::new(record)))
    }
}

/// Remove a surrounding markdown code fence, if any.
fn strip_code_fences(response: &str) -> &str {
    if let Some(rest) = response.split("```json").nth(1) {
        rest.split("```").next().unwrap_or(rest).trim()
    } else if response.contains("```") {
        response.split("```").nth(1).unwrap_or(response).trim()
    } else {
        response.trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::TypeLetter;
    use rust_decimal::Decimal;

    fn provider() -> VisionProvider {
        VisionProvider::from_config(&VisionConfig::default(), Duration::from_secs(5))
            .unwrap()
            .with_api_key("test")
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {} "), "{}");
    }

    #[test]
    fn test_parse_content_is_lenient_about_numbers() {
        let content = r#"{
            "type_letter": "A",
            "point_of_sale": 3,
            "invoice_number": "00003526",
            "supplier": {"name": "ACME SERVICES S.A.", "tax_id": "30-71438582-4"},
            "amounts": {"net": "375.000,00", "taxes": [{"type": "IVA", "rate": 21, "amount": 78750}], "total": 453750.0},
            "confidence": 0.92,
            "needs_review": false
        }"#;
        let record = provider().parse_content(content).unwrap();
        assert_eq!(record.type_letter, Some(TypeLetter::A));
        assert_eq!(record.amounts.net, Some(Decimal::new(37500000, 2)));
        assert_eq!(record.amounts.total, Some(Decimal::new(45375000, 2)));
        assert_eq!(record.amounts.currency_code, "ARS");
        assert!((record.confidence - 0.92).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        assert!(matches!(
            provider().parse_content("I could not read the invoice."),
            Err(ProviderError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_accepts_images_not_pdfs() {
        let p = provider();
        assert!(p.accepts(&Document::url("https://example.com/factura.jpg")));
        assert!(p.accepts(&Document::url("data:image/png;base64,AAAA")));
        assert!(!p.accepts(&Document::url("data:application/pdf;base64,AAAA")));
        assert!(!p.accepts(&Document::text("FACTURA", "memo")));
    }

    #[test]
    fn test_request_body_carries_schema() {
        let p = provider();
        let body = serde_json::to_value(p.request_body("https://example.com/f.png")).unwrap();
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "invoice_extraction");
        assert_eq!(body["messages"][1]["content"][1]["type"], "image_url");
        assert_eq!(body["messages"][1]["content"][1]["image_url"]["detail"], "high");
        assert_eq!(body["max_tokens"], 2000);
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let mut p = provider();
        p.api_key = None;
        let result = p.extract(&Document::url("https://example.com/f.png")).await;
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }
}
