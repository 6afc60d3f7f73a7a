//! KGP Core - Domain models, errors, and shared types
//!
//! This crate defines the abstractions shared by every stage of the
//! text-to-knowledge-graph pipeline:
//! - Triplets, entity records and relationship records
//! - Canonical relation labels
//! - Common error types
//! - Configuration management
//! - CSV artifact storage

pub mod artifacts;
pub mod config;

pub use artifacts::{ArtifactPath, ArtifactStore};
pub use config::{
    AppConfig, BackendKind, ConfigError, DatabaseConfig, ExtractionConfig, LoggingConfig,
    StorageConfig,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel used for an entity type or confidence that could not be determined
pub const UNDEFINED: &str = "UNDEFINED";

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for KGP operations
#[derive(Error, Debug)]
pub enum KgpError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Extraction error: {0}")]
    ExtractionError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid graph label {label:?}: {reason}")]
    InvalidLabel { label: String, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for KgpError {
    fn from(err: ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KgpError>;

// ============================================================================
// Triplets
// ============================================================================

/// A (subject, relation, object) fact produced by an extraction model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triplet {
    /// Head entity text
    pub subject: String,

    /// Head entity type label, or [`UNDEFINED`]
    pub subject_type: String,

    /// Relation text as emitted by the model
    pub relation: String,

    /// Tail entity text
    pub object: String,

    /// Tail entity type label, or [`UNDEFINED`]
    pub object_type: String,

    /// Model confidence, `None` when the model does not score triplets
    pub confidence: Option<f32>,
}

impl Triplet {
    /// Create a triplet with undefined types and confidence
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            subject_type: UNDEFINED.to_string(),
            relation: relation.into(),
            object: object.into(),
            object_type: UNDEFINED.to_string(),
            confidence: None,
        }
    }

    /// Set both entity types
    pub fn with_types(
        mut self,
        subject_type: impl Into<String>,
        object_type: impl Into<String>,
    ) -> Self {
        self.subject_type = subject_type.into();
        self.object_type = object_type.into();
        self
    }

    /// Set confidence score
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// A triplet is complete when subject, relation and object are all non-empty
    pub fn is_complete(&self) -> bool {
        !self.subject.is_empty() && !self.relation.is_empty() && !self.object.is_empty()
    }
}

// ============================================================================
// Tabular records
// ============================================================================

/// One row of the entity table (`entity, entity_type`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Normalized entity text; the node key in the graph
    #[serde(rename = "entity")]
    pub name: String,

    /// Entity type label; `None` is a null cell
    pub entity_type: Option<String>,
}

impl EntityRecord {
    pub fn new(name: impl Into<String>, entity_type: Option<String>) -> Self {
        Self {
            name: name.into(),
            entity_type,
        }
    }

    /// The type label to use in the graph, falling back to [`UNDEFINED`]
    pub fn label(&self) -> &str {
        self.entity_type.as_deref().unwrap_or(UNDEFINED)
    }
}

/// One row of the relationship table
///
/// Columns: `subject, subject_entity_type, relationship, object,
/// object_entity_type, confidence`. Text columns are optional because rows
/// read back from CSV may contain null cells; the validation pipeline removes
/// them before anything is written to the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub subject: Option<String>,
    pub subject_entity_type: Option<String>,
    pub relationship: String,
    pub object: Option<String>,
    pub object_entity_type: Option<String>,
    #[serde(with = "confidence_cell", default)]
    pub confidence: Option<f32>,
}

impl RelationshipRecord {
    /// Create a row with unresolved entity types
    pub fn new(
        subject: impl Into<String>,
        relationship: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: Some(subject.into()),
            subject_entity_type: None,
            relationship: relationship.into(),
            object: Some(object.into()),
            object_entity_type: None,
            confidence: None,
        }
    }

    /// Set both entity type columns
    pub fn with_types(
        mut self,
        subject_type: impl Into<String>,
        object_type: impl Into<String>,
    ) -> Self {
        self.subject_entity_type = Some(subject_type.into());
        self.object_entity_type = Some(object_type.into());
        self
    }

    /// Set confidence score
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

impl From<Triplet> for RelationshipRecord {
    fn from(t: Triplet) -> Self {
        Self {
            subject: Some(t.subject),
            subject_entity_type: Some(t.subject_type),
            relationship: t.relation,
            object: Some(t.object),
            object_entity_type: Some(t.object_type),
            confidence: t.confidence,
        }
    }
}

/// CSV representation of the confidence column: a float or `UNDEFINED`
mod confidence_cell {
    use serde::{de, Deserialize, Deserializer, Serializer};

    use super::UNDEFINED;

    pub fn serialize<S: Serializer>(value: &Option<f32>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(c) => serializer.serialize_f32(*c),
            None => serializer.serialize_str(UNDEFINED),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<f32>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) if s.eq_ignore_ascii_case(UNDEFINED) => Ok(None),
            Some(s) => s
                .parse::<f32>()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("invalid confidence value: {s}"))),
        }
    }
}

// ============================================================================
// Relation labels
// ============================================================================

/// Convert free relation text into a graph edge label
///
/// Upper-cases, turns spaces into underscores and drops everything outside
/// `[A-Z0-9_]`, so `"is a type of"` becomes `"IS_A_TYPE_OF"`.
pub fn canonical_relation(raw: &str) -> String {
    raw.to_uppercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

/// Check whether a label is already in canonical relation form
pub fn is_canonical_relation(label: &str) -> bool {
    !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_canonical_relation() {
        assert_eq!(canonical_relation("is a type of"), "IS_A_TYPE_OF");
        assert_eq!(canonical_relation("president of"), "PRESIDENT_OF");
        assert_eq!(canonical_relation("country (of origin)"), "COUNTRY_OF_ORIGIN");
        assert_eq!(canonical_relation("héad-of"), "HADOF");
    }

    #[test]
    fn test_canonical_relation_empty_after_cleanup() {
        assert_eq!(canonical_relation("?!"), "");
        assert!(!is_canonical_relation(""));
    }

    #[test]
    fn test_triplet_completeness() {
        assert!(Triplet::new("obama", "president of", "usa").is_complete());
        assert!(!Triplet::new("obama", "", "usa").is_complete());
        assert!(!Triplet::new("", "president of", "usa").is_complete());
    }

    #[test]
    fn test_relationship_from_triplet() {
        let triplet = Triplet::new("asia", "contains", "japan")
            .with_types("LOC", "GPE")
            .with_confidence(0.8);
        let row = RelationshipRecord::from(triplet);

        assert_eq!(row.subject.as_deref(), Some("asia"));
        assert_eq!(row.subject_entity_type.as_deref(), Some("LOC"));
        assert_eq!(row.object_entity_type.as_deref(), Some("GPE"));
        assert_eq!(row.confidence, Some(0.8));
    }

    #[test]
    fn test_entity_label_fallback() {
        assert_eq!(EntityRecord::new("asia", Some("LOC".into())).label(), "LOC");
        assert_eq!(EntityRecord::new("asia", None).label(), UNDEFINED);
    }

    proptest! {
        #[test]
        fn canonical_relation_is_always_label_safe(raw in ".*") {
            let label = canonical_relation(&raw);
            prop_assert!(label.is_empty() || is_canonical_relation(&label));
        }

        #[test]
        fn canonical_relation_is_idempotent(raw in "[a-zA-Z0-9 _-]{0,30}") {
            let once = canonical_relation(&raw);
            prop_assert_eq!(canonical_relation(&once), once);
        }
    }
}
