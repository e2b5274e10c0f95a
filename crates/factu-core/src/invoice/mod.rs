//! Invoice field extraction from text and record validation.

mod parser;
mod review;
pub mod rules;

pub use parser::{pad_digits, HeuristicExtractor};
pub use review::{ReviewGate, ReviewIssue};
