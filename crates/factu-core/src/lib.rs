//! Core library for Argentine invoice field extraction.
//!
//! This crate provides:
//! - Rule-based parsers for amounts, dates, tax ids and the AFIP QR code
//! - A heuristic extractor that turns recognized text into an invoice record
//! - Remote providers (vision model, OCR.space) and an offline stand-in
//! - An orchestrator that runs the providers as a fallback ladder
//! - A review gate that normalizes records and flags doubtful ones

pub mod document;
pub mod error;
pub mod invoice;
pub mod models;
pub mod pdf;
pub mod pipeline;
pub mod providers;

pub use document::Document;
pub use error::{FactuError, ProviderError, Result};
pub use invoice::{HeuristicExtractor, ReviewGate, ReviewIssue};
pub use models::config::FactuConfig;
pub use models::invoice::{
    Amounts, AuditLog, InvoiceExtract, Party, RolePreference, TaxLine, TypeLetter,
};
pub use pipeline::{Gate, Pipeline, Rung};
pub use providers::{Provider, ProviderOutput};
