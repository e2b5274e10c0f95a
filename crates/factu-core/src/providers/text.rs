//! Pass-through provider for documents that are already text.

use async_trait::async_trait;

use super::{Provider, ProviderOutput};
use crate::document::Document;
use crate::error::ProviderError;

/// Hands `Document::Text` to the heuristic extractor unchanged.
pub struct TextProvider;

impl TextProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for TextProvider {
    fn name(&self) -> &str {
        "text"
    }

    fn accepts(&self, document: &Document) -> bool {
        document.is_text()
    }

    async fn extract(&self, document: &Document) -> Result<ProviderOutput, ProviderError> {
        match document {
            Document::Text { text, .. } if text.trim().is_empty() => {
                Err(ProviderError::NoText(self.name().to_string()))
            }
            Document::Text { text, .. } => Ok(ProviderOutput::PlainText(text.clone())),
            Document::Url(_) => Err(ProviderError::Unsupported {
                provider: self.name().to_string(),
                reference: document.reference(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passes_text_through() {
        let doc = Document::text("FACTURA A", "memo");
        let out = TextProvider::new().extract(&doc).await.unwrap();
        assert_eq!(out, ProviderOutput::PlainText("FACTURA A".to_string()));
    }

    #[tokio::test]
    async fn test_blank_text_is_a_fault() {
        let doc = Document::text("  \n ", "memo");
        assert!(matches!(
            TextProvider::new().extract(&doc).await,
            Err(ProviderError::NoText(_))
        ));
    }

    #[test]
    fn test_rejects_urls() {
        assert!(!TextProvider::new().accepts(&Document::url("https://x/y.png")));
    }
}
