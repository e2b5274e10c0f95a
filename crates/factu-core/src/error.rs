//! Error types for the factu-core library.

use thiserror::Error;

/// Main error type for the factu library.
#[derive(Error, Debug)]
pub enum FactuError {
    /// Extraction provider error.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Input document could not be prepared.
    #[error("document error: {0}")]
    Document(String),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Faults raised by a single provider attempt.
///
/// These never reach the caller of the pipeline: the orchestrator records
/// them in the audit trail and moves on to the next provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider lacks credentials or was disabled.
    #[error("{0} is not configured")]
    NotConfigured(String),

    /// The provider cannot handle this kind of document.
    #[error("{provider} does not accept {reference}")]
    Unsupported { provider: String, reference: String },

    /// Transport-level failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote service answered with a non-success status.
    #[error("{provider} returned {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    /// The attempt did not finish within the configured bound.
    #[error("{provider} timed out after {secs}s")]
    Timeout { provider: String, secs: u64 },

    /// The response could not be decoded into the expected shape.
    #[error("malformed response from {provider}: {reason}")]
    MalformedResponse { provider: String, reason: String },

    /// The provider ran but recognized no text.
    #[error("{0} extracted no text")]
    NoText(String),
}

/// Errors related to reading the PDF text layer.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,
}

/// Result type for the factu library.
pub type Result<T> = std::result::Result<T, FactuError>;
