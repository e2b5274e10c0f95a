//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{FactuError, Result};
use crate::models::invoice::RolePreference;

/// Main configuration for the factu pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FactuConfig {
    /// Heuristic and review-gate settings.
    pub extraction: ExtractionConfig,

    /// Provider ladder settings.
    pub providers: ProvidersConfig,

    /// PDF input settings.
    pub pdf: PdfConfig,
}

/// Heuristic extraction and review configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Confidence at or above which the ladder stops.
    pub accept_threshold: f32,

    /// Confidence below which the offline rung runs.
    pub fallback_threshold: f32,

    /// Records below this confidence are flagged for review.
    pub review_threshold: f32,

    /// Absolute tolerance for `net + taxes == total`.
    pub total_tolerance: f64,

    /// Rate assumed when only the total is known.
    pub default_tax_rate: f64,

    pub default_tax_type: String,

    /// Currency if not detected.
    pub default_currency: String,

    /// Derive net and tax from the total when they are missing.
    pub backfill_taxes: bool,

    /// Enable CUIT checksum validation.
    pub validate_tax_id: bool,

    pub role_preference: RolePreference,

    /// Lines searched after a date label.
    pub date_lookahead: usize,

    /// Lines searched after an amount label.
    pub amount_lookahead: usize,

    /// Lines searched after a name label.
    pub name_lookahead: usize,

    /// Header lines scanned for a business name when no label matched.
    pub header_lines: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            accept_threshold: 0.8,
            fallback_threshold: 0.6,
            review_threshold: 0.8,
            total_tolerance: 1.0,
            default_tax_rate: 0.21,
            default_tax_type: "IVA".to_string(),
            default_currency: "ARS".to_string(),
            backfill_taxes: true,
            validate_tax_id: true,
            role_preference: RolePreference::Issuer,
            date_lookahead: 2,
            amount_lookahead: 2,
            name_lookahead: 3,
            header_lines: 10,
        }
    }
}

/// Provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Upper bound for a single provider attempt.
    pub timeout_secs: u64,

    pub vision: VisionConfig,

    pub ocr_space: OcrSpaceConfig,

    pub offline: OfflineConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            vision: VisionConfig::default(),
            ocr_space: OcrSpaceConfig::default(),
            offline: OfflineConfig::default(),
        }
    }
}

/// OpenAI-compatible vision model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub max_tokens: u32,
    /// Image detail hint (`low`, `high`, `auto`).
    pub detail: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: 2000,
            detail: "high".to_string(),
        }
    }
}

/// OCR.space text-extraction API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSpaceConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub api_key_env: String,
    /// Public free-tier key used when the variable is unset.
    pub fallback_api_key: String,
    pub language: String,
}

impl Default for OcrSpaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.ocr.space/parse/imageurl".to_string(),
            api_key_env: "OCR_SPACE_API_KEY".to_string(),
            fallback_api_key: "helloworld".to_string(),
            language: "spa".to_string(),
        }
    }
}

/// What the offline provider returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineMode {
    /// Empty low-confidence record.
    #[default]
    Placeholder,
    /// Canned sample invoice run through the text heuristic.
    Sample,
}

/// Offline/simulated provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    pub enabled: bool,
    pub mode: OfflineMode,
    /// Reported confidence; never above 0.5.
    pub confidence: f32,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: OfflineMode::Placeholder,
            confidence: 0.3,
        }
    }
}

/// PDF input configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Minimum text length to treat a PDF as text-based.
    pub min_text_length: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self { min_text_length: 50 }
    }
}

impl FactuConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| FactuError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
