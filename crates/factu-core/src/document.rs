//! Input documents handed to the extraction pipeline.

use std::fmt;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use crate::error::{FactuError, Result};
use crate::models::config::PdfConfig;
use crate::pdf::{PdfExtractor, PdfProcessor, PdfType};

/// A document to extract invoice fields from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Document {
    /// Text that was already recognized elsewhere.
    Text { text: String, reference: String },
    /// A fetchable reference: `http(s)://` or an inline `data:` URL.
    Url(String),
}

impl Document {
    /// Wrap already-recognized text.
    pub fn text(text: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            reference: reference.into(),
        }
    }

    /// Wrap a fetchable URL.
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    /// Load a local file.
    ///
    /// Plain text is read as is. PDFs with a text layer become text, other
    /// PDFs and images are inlined as `data:` URLs for the remote providers.
    pub fn from_path(path: &Path, config: &PdfConfig) -> Result<Self> {
        let reference = path.display().to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "txt" | "text" => {
                let text = std::fs::read_to_string(path)?;
                Ok(Self::Text { text, reference })
            }
            "pdf" => {
                let data = std::fs::read(path)?;
                let mut extractor =
                    PdfExtractor::new().with_min_text_length(config.min_text_length);
                extractor.load(&data)?;
                let content = extractor.extract_all()?;
                match content.pdf_type {
                    PdfType::Text => {
                        debug!("Using PDF text layer of {}", reference);
                        Ok(Self::Text {
                            text: content.text,
                            reference,
                        })
                    }
                    PdfType::Scanned => {
                        debug!("{} has no text layer, inlining for OCR", reference);
                        Ok(Self::Url(data_url("application/pdf", &data)))
                    }
                }
            }
            other => match image_mime(other) {
                Some(mime) => {
                    let data = std::fs::read(path)?;
                    Ok(Self::Url(data_url(mime, &data)))
                }
                None => Err(FactuError::Document(format!(
                    "unsupported file type: {}",
                    reference
                ))),
            },
        }
    }

    /// Provenance stored in `source_reference`.
    pub fn reference(&self) -> String {
        match self {
            Self::Text { reference, .. } => reference.clone(),
            Self::Url(url) if url.starts_with("data:") => {
                let mime = url
                    .trim_start_matches("data:")
                    .split([';', ','])
                    .next()
                    .unwrap_or_default();
                format!("inline:{}", mime)
            }
            Self::Url(url) => url.clone(),
        }
    }

    /// MIME type of an inline `data:` URL.
    pub fn data_mime(&self) -> Option<&str> {
        match self {
            Self::Url(url) => url
                .strip_prefix("data:")
                .and_then(|rest| rest.split([';', ',']).next()),
            Self::Text { .. } => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference())
    }
}

fn image_mime(extension: &str) -> Option<&'static str> {
    match extension {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "tif" | "tiff" => Some("image/tiff"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

fn data_url(mime: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(data))
}
