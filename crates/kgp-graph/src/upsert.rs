//! Idempotent upsert of validated tables into a graph store

use kgp_core::{EntityRecord, KgpError, RelationshipRecord, Result, UNDEFINED};
use tracing::{info, warn};

use crate::{EdgeProperties, GraphLabel, GraphStore};

/// Property holding an entity's name on its node
pub const KEY_PROPERTY: &str = "name";

/// A row that was not written, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    /// Zero-based position in the input table
    pub row: usize,
    pub reason: String,
}

/// Outcome of an upsert batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertReport {
    pub written: usize,
    pub rejected: Vec<RejectedRow>,
}

impl UpsertReport {
    fn reject(&mut self, row: usize, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(row, reason = %reason, "Rejected row");
        self.rejected.push(RejectedRow { row, reason });
    }
}

/// Writes entity and relationship tables through a [`GraphStore`]
pub struct GraphUpserter<'a> {
    store: &'a dyn GraphStore,
    key_property: GraphLabel,
}

impl<'a> GraphUpserter<'a> {
    pub fn new(store: &'a dyn GraphStore) -> Result<Self> {
        Ok(Self {
            store,
            key_property: GraphLabel::new(KEY_PROPERTY)?,
        })
    }

    /// Merge one node per entity, labeled by its type
    pub async fn upsert_entities(&self, entities: &[EntityRecord]) -> Result<UpsertReport> {
        let mut report = UpsertReport::default();

        for (row, entity) in entities.iter().enumerate() {
            let label = match GraphLabel::new(entity.label()) {
                Ok(label) => label,
                Err(e) => {
                    report.reject(row, e.to_string());
                    continue;
                }
            };
            self.store
                .merge_node(&label, &self.key_property, &entity.name)
                .await?;
            report.written += 1;
        }

        info!(
            store = self.store.name(),
            written = report.written,
            rejected = report.rejected.len(),
            "Upserted entities"
        );
        Ok(report)
    }

    /// Merge both endpoints of each relationship and the edge between them
    ///
    /// Confidence is only recorded when the edge is first created.
    pub async fn upsert_relationships(
        &self,
        relationships: &[RelationshipRecord],
    ) -> Result<UpsertReport> {
        let mut report = UpsertReport::default();

        for (row, record) in relationships.iter().enumerate() {
            let (subject, object) = match (record.subject.as_deref(), record.object.as_deref()) {
                (Some(s), Some(o)) if !s.is_empty() && !o.is_empty() => (s, o),
                _ => {
                    report.reject(row, "missing subject or object");
                    continue;
                }
            };

            let labels = Self::edge_labels(record);
            let (subject_label, object_label, edge_label) = match labels {
                Ok(labels) => labels,
                Err(e) => {
                    report.reject(row, e.to_string());
                    continue;
                }
            };

            let from = self
                .store
                .merge_node(&subject_label, &self.key_property, subject)
                .await?;
            let to = self
                .store
                .merge_node(&object_label, &self.key_property, object)
                .await?;
            let on_create = EdgeProperties {
                confidence: record.confidence,
            };
            self.store
                .merge_edge(&from, &to, &edge_label, &on_create)
                .await?;
            report.written += 1;
        }

        info!(
            store = self.store.name(),
            written = report.written,
            rejected = report.rejected.len(),
            "Upserted relationships"
        );
        Ok(report)
    }

    fn edge_labels(record: &RelationshipRecord) -> Result<(GraphLabel, GraphLabel, GraphLabel)> {
        let type_label = |t: &Option<String>| GraphLabel::new(t.as_deref().unwrap_or(UNDEFINED));
        let subject = type_label(&record.subject_entity_type)?;
        let object = type_label(&record.object_entity_type)?;
        let edge = GraphLabel::new(record.relationship.as_str()).map_err(|e| match e {
            KgpError::InvalidLabel { label, reason } => KgpError::InvalidLabel {
                label,
                reason: format!("relationship {reason}"),
            },
            other => other,
        })?;
        Ok((subject, object, edge))
    }
}
