//! Extraction providers.
//!
//! A provider turns a [`Document`] into either a structured record or plain
//! text that the heuristic extractor reads. Providers never panic on bad
//! input; every fault is a [`ProviderError`] the pipeline records and
//! steps past.

mod ocr_space;
mod offline;
mod text;
mod vision;

pub use ocr_space::OcrSpaceProvider;
pub use offline::OfflineProvider;
pub use text::TextProvider;
pub use vision::{invoice_schema, VisionProvider};

use std::time::Duration;

use async_trait::async_trait;

use crate::document::Document;
use crate::error::ProviderError;
use crate::models::invoice::InvoiceExtract;

/// What a successful provider call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutput {
    /// A record the provider filled in itself.
    Structured(Box<InvoiceExtract>),
    /// Recognized text, still to be parsed.
    PlainText(String),
}

/// A single extraction backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Identifier recorded in the audit trail.
    fn name(&self) -> &str;

    /// Whether this provider can handle the document at all.
    fn accepts(&self, document: &Document) -> bool;

    async fn extract(&self, document: &Document) -> Result<ProviderOutput, ProviderError>;
}

/// HTTP client shared by the remote providers.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Read an API key from the environment, ignoring blank values.
pub(crate) fn env_key(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Shorten a response body for error messages.
pub(crate) fn snippet(body: &str) -> String {
    const MAX: usize = 300;
    if body.chars().count() <= MAX {
        body.to_string()
    } else {
        let head: String = body.chars().take(MAX).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_truncates_long_bodies() {
        assert_eq!(snippet("short"), "short");
        let long = "x".repeat(400);
        let cut = snippet(&long);
        assert_eq!(cut.len(), 303);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_env_key_ignores_missing() {
        assert_eq!(env_key("FACTU_TEST_SURELY_UNSET_KEY"), None);
    }
}
