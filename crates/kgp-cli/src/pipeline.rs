//! Pipeline stages wired to the artifact store

use kgp_core::{ArtifactPath, ArtifactStore, BackendKind, EntityRecord, RelationshipRecord, Result};
use kgp_extractor::{extract, Backend, Extraction, Preprocessor, TextCleaner, ValidationPipeline};
use kgp_graph::{GraphStore, GraphUpserter, UpsertReport};
use tracing::info;

/// Read input texts, run the backend and write the model-output tables
pub async fn extract_stage(
    store: &ArtifactStore,
    backend: &Backend,
    clean: bool,
) -> Result<Extraction> {
    let mut texts = store.read_texts()?;
    if clean {
        let cleaner = TextCleaner;
        texts = texts
            .iter()
            .map(|t| cleaner.resolve_and_clean(t))
            .collect::<Result<Vec<_>>>()?;
    }

    let extraction = extract(&texts, backend).await?;
    let kind = backend.kind();
    store.write_table(ArtifactPath::ModelEntities(kind), &extraction.entities)?;
    store.write_table(
        ArtifactPath::ModelRelationships(kind),
        &extraction.relationships,
    )?;

    let stats = extraction.decode_stats;
    if stats.segments_seen > 0 {
        info!(
            segments = stats.segments_seen,
            emitted = stats.triplets_emitted,
            dropped = stats.triplets_dropped,
            "Decoded generated sequences"
        );
    }
    Ok(extraction)
}

/// Row counts of a validation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationSummary {
    pub relationships_in: usize,
    pub relationships_out: usize,
    pub entities_out: usize,
}

/// Resolve types, run the reference pipeline and write validation tables
pub fn validate_stage(store: &ArtifactStore, kind: BackendKind) -> Result<ValidationSummary> {
    let entities: Vec<EntityRecord> = store.read_table(ArtifactPath::ModelEntities(kind))?;
    let relationships: Vec<RelationshipRecord> =
        store.read_table(ArtifactPath::ModelRelationships(kind))?;
    let relationships_in = relationships.len();

    let tables = ValidationPipeline::reference().run_tables(relationships, entities);
    let (entities, outcome) = (tables.entities, tables.relationships);

    store.write_table(ArtifactPath::ValidatedEntities(kind), &entities)?;
    store.write_table(ArtifactPath::ValidatedRelationships(kind), &outcome.rows)?;

    info!(
        "Validation kept {} of {} relationships",
        outcome.rows.len(),
        relationships_in
    );
    Ok(ValidationSummary {
        relationships_in,
        relationships_out: outcome.rows.len(),
        entities_out: entities.len(),
    })
}

/// Upsert the validation tables into a graph store
pub async fn upload_stage(
    store: &ArtifactStore,
    kind: BackendKind,
    graph: &dyn GraphStore,
) -> Result<(UpsertReport, UpsertReport)> {
    let entities: Vec<EntityRecord> = store.read_table(ArtifactPath::ValidatedEntities(kind))?;
    let relationships: Vec<RelationshipRecord> =
        store.read_table(ArtifactPath::ValidatedRelationships(kind))?;

    let upserter = GraphUpserter::new(graph)?;
    let entity_report = upserter.upsert_entities(&entities).await?;
    let relationship_report = upserter.upsert_relationships(&relationships).await?;

    info!(
        store = graph.name(),
        nodes = entity_report.written,
        edges = relationship_report.written,
        "Upload complete"
    );
    Ok((entity_report, relationship_report))
}
