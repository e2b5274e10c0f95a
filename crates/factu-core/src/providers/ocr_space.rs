//! OCR.space text recognition provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{env_key, http_client, snippet, Provider, ProviderOutput};
use crate::document::Document;
use crate::error::ProviderError;
use crate::models::config::OcrSpaceConfig;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceResponse {
    #[serde(default)]
    parsed_results: Vec<ParsedResult>,
    #[serde(default)]
    is_errored_on_processing: bool,
    #[serde(default)]
    error_message: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    #[serde(default)]
    parsed_text: String,
}

/// Generic OCR provider; its text goes through the heuristic extractor.
pub struct OcrSpaceProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    language: String,
}

impl OcrSpaceProvider {
    pub fn from_config(config: &OcrSpaceConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: config.endpoint.clone(),
            api_key: env_key(&config.api_key_env).unwrap_or_else(|| config.fallback_api_key.clone()),
            language: config.language.clone(),
        })
    }

    /// Form fields for one request. Inline documents travel as
    /// `base64Image`, remote ones as `url`.
    fn form<'a>(&'a self, url: &'a str) -> Vec<(&'static str, &'a str)> {
        let source = if url.starts_with("data:") {
            ("base64Image", url)
        } else {
            ("url", url)
        };
        vec![
            ("apikey", self.api_key.as_str()),
            source,
            ("language", self.language.as_str()),
            ("isOverlayRequired", "false"),
            ("detectOrientation", "true"),
            ("scale", "true"),
            ("isTable", "true"),
        ]
    }

    /// Uploads go to `/parse/image`, URL fetches to `/parse/imageurl`.
    fn endpoint_for(&self, url: &str) -> String {
        match self.endpoint.strip_suffix("url") {
            Some(upload) if url.starts_with("data:") => upload.to_string(),
            _ => self.endpoint.clone(),
        }
    }

    fn read_text(&self, response: OcrSpaceResponse) -> Result<String, ProviderError> {
        if response.is_errored_on_processing {
            let reason = match response.error_message {
                Some(Value::String(s)) => s,
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
                _ => "processing failed".to_string(),
            };
            return Err(ProviderError::MalformedResponse {
                provider: self.name().to_string(),
                reason,
            });
        }

        response
            .parsed_results
            .into_iter()
            .next()
            .map(|r| r.parsed_text)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ProviderError::NoText(self.name().to_string()))
    }
}

#[async_trait]
impl Provider for OcrSpaceProvider {
    fn name(&self) -> &str {
        "ocr_space"
    }

    fn accepts(&self, document: &Document) -> bool {
        matches!(document, Document::Url(_))
    }

    async fn extract(&self, document: &Document) -> Result<ProviderOutput, ProviderError> {
        let Document::Url(url) = document else {
            return Err(ProviderError::Unsupported {
                provider: self.name().to_string(),
                reference: document.reference(),
            });
        };

        let endpoint = self.endpoint_for(url);
        debug!("Sending {} to {}", document.reference(), endpoint);
        let response = self
            .client
            .post(&endpoint)
            .form(&self.form(url))
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

        let parsed: OcrSpaceResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    provider: self.name().to_string(),
                    reason: e.to_string(),
                })?;
        let text = self.read_text(parsed)?;
        debug!("OCR.space returned {} chars", text.len());
        Ok(ProviderOutput::PlainText(text))
    }
}
