//! Infrastructure services

mod ingestion_service;
mod security_analyzer;

pub use ingestion_service::{
    parse_csv, parse_jsonl, IngestionFormat, IngestionRecord, IngestionReport, IngestionService,
    MAX_TEXT_BYTES,
};
pub use security_analyzer::VectorSecurityAnalyzer;
