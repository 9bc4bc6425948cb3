//! The ingestion stages: Fetcher, Extractor,
//! Chunker, Atom Generator, Validator, Quality Scorer, and Embedder. Each
//! stage is a standalone building block; `kb-coordinator` wires them into
//! the seven-stage pipeline.

pub mod document;
pub mod embedding;
pub mod fetcher;
pub mod generator;
pub mod quality;
pub mod validator;

pub use document::chunker::chunk_document;
pub use document::{extract, sniff_source_type, Block, ExtractedDocument, ExtractionError};
pub use embedding::create_embedder;
pub use fetcher::{FetchedDocument, Fetcher};
pub use generator::AtomGenerator;
pub use quality::{detect_features, score, DocumentFeatures};
pub use validator::{validate, ValidationResult};
