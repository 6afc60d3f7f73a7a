//! Entity type resolution
//!
//! Entity types are computed once per unique entity string. This module
//! projects them back onto every relationship row that references the
//! entity as subject or as object.

use std::collections::HashMap;

use kgp_core::{EntityRecord, RelationshipRecord, UNDEFINED};

/// Attach `subject_entity_type` and `object_entity_type` to each row
///
/// Equivalent to a left join of the relationships against the entity table
/// on `object` and again on `subject`. Unmatched endpoints and entities with
/// no type get [`UNDEFINED`], never a null. When the entity table holds the
/// same name twice the first row wins.
pub fn resolve_types(
    relationships: Vec<RelationshipRecord>,
    entities: &[EntityRecord],
) -> Vec<RelationshipRecord> {
    let mut types: HashMap<&str, &str> = HashMap::with_capacity(entities.len());
    for entity in entities {
        types.entry(entity.name.as_str()).or_insert_with(|| entity.label());
    }

    let lookup = |name: Option<&str>| -> String {
        name.and_then(|n| types.get(n).copied())
            .unwrap_or(UNDEFINED)
            .to_string()
    };

    relationships
        .into_iter()
        .map(|row| RelationshipRecord {
            object_entity_type: Some(lookup(row.object.as_deref())),
            subject_entity_type: Some(lookup(row.subject.as_deref())),
            ..row
        })
        .collect()
}
