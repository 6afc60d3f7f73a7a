//! CSV artifact storage
//!
//! Every pipeline stage exchanges tables through CSV files at well-known
//! logical paths. The store resolves those paths against a root directory.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::{BackendKind, KgpError, Result, StorageConfig};

/// Column of the input table holding coreference-resolved, cleaned text
pub const TEXT_COLUMN: &str = "coref_text";

/// Well-known artifact locations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactPath {
    /// Cleaned input texts
    InputTexts,
    /// Raw model entities for a method
    ModelEntities(BackendKind),
    /// Raw model relationships for a method
    ModelRelationships(BackendKind),
    /// Entities after validation
    ValidatedEntities(BackendKind),
    /// Relationships after validation
    ValidatedRelationships(BackendKind),
}

impl ArtifactPath {
    /// Logical path relative to the store root
    pub fn logical_path(&self) -> String {
        match self {
            Self::InputTexts => "data/clean-data/merged_df.csv".to_string(),
            Self::ModelEntities(m) => format!("data/model-output/entities_df_{m}.csv"),
            Self::ModelRelationships(m) => format!("data/model-output/relationships_df_{m}.csv"),
            Self::ValidatedEntities(m) => format!("data/validation/entities_df_{m}.csv"),
            Self::ValidatedRelationships(m) => format!("data/validation/relationships_df_{m}.csv"),
        }
    }
}

impl std::fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.logical_path())
    }
}

/// Filesystem-backed artifact store
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at a directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create from config
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.root.clone())
    }

    /// Absolute location of an artifact
    pub fn resolve(&self, path: ArtifactPath) -> PathBuf {
        self.root.join(path.logical_path())
    }

    /// Read a whole table
    pub fn read_table<T: DeserializeOwned>(&self, path: ArtifactPath) -> Result<Vec<T>> {
        let file = self.resolve(path);
        let mut reader = csv::Reader::from_path(&file).map_err(|e| {
            KgpError::StorageError(format!("Failed to open {}: {e}", file.display()))
        })?;

        let rows = reader
            .deserialize()
            .collect::<std::result::Result<Vec<T>, _>>()
            .map_err(|e| KgpError::StorageError(format!("Failed to read {path}: {e}")))?;

        info!("Read {} rows from {}", rows.len(), path);
        Ok(rows)
    }

    /// Write a whole table, replacing any previous artifact
    pub fn write_table<T: Serialize>(&self, path: ArtifactPath, rows: &[T]) -> Result<()> {
        let file = self.resolve(path);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                KgpError::StorageError(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let mut writer = csv::Writer::from_path(&file).map_err(|e| {
            KgpError::StorageError(format!("Failed to create {}: {e}", file.display()))
        })?;
        for row in rows {
            writer
                .serialize(row)
                .map_err(|e| KgpError::StorageError(format!("Failed to write {path}: {e}")))?;
        }
        writer
            .flush()
            .map_err(|e| KgpError::StorageError(format!("Failed to flush {path}: {e}")))?;

        info!("Wrote {} rows to {}", rows.len(), path);
        Ok(())
    }

    /// Read the text column of the input table
    pub fn read_texts(&self) -> Result<Vec<String>> {
        let path = ArtifactPath::InputTexts;
        let file = self.resolve(path);
        let mut reader = csv::Reader::from_path(&file).map_err(|e| {
            KgpError::StorageError(format!("Failed to open {}: {e}", file.display()))
        })?;

        let headers = reader
            .headers()
            .map_err(|e| KgpError::StorageError(format!("Failed to read {path}: {e}")))?;
        let column = headers
            .iter()
            .position(|h| h == TEXT_COLUMN)
            .ok_or_else(|| {
                KgpError::StorageError(format!("{path} has no '{TEXT_COLUMN}' column"))
            })?;

        let mut texts = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|e| KgpError::StorageError(format!("Failed to read {path}: {e}")))?;
            if let Some(text) = record.get(column) {
                texts.push(text.to_string());
            }
        }

        info!("Read {} texts from {}", texts.len(), path);
        Ok(texts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntityRecord, RelationshipRecord};

    #[test]
    fn test_logical_paths() {
        assert_eq!(
            ArtifactPath::ModelRelationships(BackendKind::Sequences).logical_path(),
            "data/model-output/relationships_df_mrebel.csv"
        );
        assert_eq!(
            ArtifactPath::ValidatedEntities(BackendKind::Spans).logical_path(),
            "data/validation/entities_df_relik.csv"
        );
    }

    #[test]
    fn test_relationship_table_keeps_nulls_and_undefined_confidence() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let path = ArtifactPath::ModelRelationships(BackendKind::Sequences);

        let mut missing_type = RelationshipRecord::new("asia", "CONTAINS", "japan");
        missing_type.object_entity_type = Some("LOC".into());
        let rows = vec![
            RelationshipRecord::new("barack obama", "PRESIDENT_OF", "united states")
                .with_types("PERSON", "COUNTRY")
                .with_confidence(0.5),
            missing_type,
        ];
        store.write_table(path, &rows).unwrap();

        let raw = std::fs::read_to_string(store.resolve(path)).unwrap();
        assert!(raw.starts_with(
            "subject,subject_entity_type,relationship,object,object_entity_type,confidence"
        ));
        assert!(raw.contains("UNDEFINED"));

        let back: Vec<RelationshipRecord> = store.read_table(path).unwrap();
        assert_eq!(back, rows);
        assert_eq!(back[1].subject_entity_type, None);
        assert_eq!(back[1].confidence, None);
    }

    #[test]
    fn test_entity_table_column_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let path = ArtifactPath::ValidatedEntities(BackendKind::Spans);

        store
            .write_table(path, &[EntityRecord::new("asia", Some("LOC".into()))])
            .unwrap();

        let raw = std::fs::read_to_string(store.resolve(path)).unwrap();
        assert!(raw.starts_with("entity,entity_type"));
    }

    #[test]
    fn test_read_texts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let file = store.resolve(ArtifactPath::InputTexts);
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(
            &file,
            "source,text,coref_text\nnews,Raw one,Clean one\nleaks,\"Raw, two\",\"Clean, two\"\n",
        )
        .unwrap();

        let texts = store.read_texts().unwrap();
        assert_eq!(texts, vec!["Clean one", "Clean, two"]);
    }

    #[test]
    fn test_read_texts_requires_text_column() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let file = store.resolve(ArtifactPath::InputTexts);
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "source,text\nnews,Raw\n").unwrap();

        assert!(matches!(
            store.read_texts(),
            Err(KgpError::StorageError(_))
        ));
    }
}
