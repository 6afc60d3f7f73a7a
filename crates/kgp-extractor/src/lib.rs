//! KGP Extractor - Triplet extraction and validation
//!
//! Turns model output into validated relationship tables:
//! - [`decoder`]: tagged sequence to triplets
//! - [`backend`] and [`extract`]: model adapters producing entity and
//!   relationship tables
//! - [`resolver`]: entity types projected onto relationships
//! - [`validation`]: filtering and normalization stages

pub mod backend;
pub mod decoder;
pub mod extract;
pub mod preprocess;
pub mod resolver;
pub mod validation;

pub use backend::{Backend, GenerationParams, SequenceModel, SpanModel, SpanPrediction};
pub use decoder::{decode, decode_with_stats, DecodeStats};
pub use extract::{extract, Extraction};
pub use preprocess::{Preprocessor, TextCleaner};
pub use resolver::resolve_types;
pub use validation::{
    normalize_entity_names, Stage, StageReport, ValidatedTables, ValidationOutcome,
    ValidationPipeline,
};
