//! dmarc-align Library
//!
//! This library provides the core functionality for dmarc-align: configuration,
//! error handling, data models, RFC 7489 identifier alignment and verdict
//! evaluation, aggregate report parsing, archive extraction, and the table/CSV/JSON
//! output layer.

pub mod alignment;
pub mod config;
pub mod discovery;
pub mod error;
pub mod evaluator;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod xml_parser;
pub mod zip_handler;

pub use alignment::{is_relaxed_aligned, is_strict_aligned};
pub use config::Config;
pub use evaluator::{evaluate, evaluate_record};
pub use pipeline::analyze_directory;
pub use xml_parser::parse_report;
pub use zip_handler::extract_archives;
