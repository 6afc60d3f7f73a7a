//! Pipeline Integration Tests
//!
//! Drives decode, extraction, type resolution, validation and graph upsert
//! end to end with stub models and the in-memory graph store.

use std::collections::HashMap;

use async_trait::async_trait;
use kgp_core::{EntityRecord, KgpError, RelationshipRecord, Result, UNDEFINED};
use kgp_extractor::backend::{PredictedSpan, PredictedTriplet};
use kgp_extractor::{
    extract, Backend, GenerationParams, SequenceModel, SpanModel, SpanPrediction,
    ValidationPipeline,
};
use kgp_graph::{GraphLabel, GraphUpserter, MemoryGraphStore, NodeId};

// =============================================================================
// Stub models
// =============================================================================

struct ScriptedGenerator(HashMap<String, Vec<String>>);

#[async_trait]
impl SequenceModel for ScriptedGenerator {
    async fn generate(&self, text: &str, _params: &GenerationParams) -> Result<Vec<String>> {
        Ok(self.0.get(text).cloned().unwrap_or_default())
    }
}

struct ScriptedLinker(HashMap<String, SpanPrediction>);

#[async_trait]
impl SpanModel for ScriptedLinker {
    async fn infer(&self, text: &str) -> Result<SpanPrediction> {
        Ok(self.0.get(text).cloned().unwrap_or_default())
    }
}

struct Unreachable;

#[async_trait]
impl SpanModel for Unreachable {
    async fn infer(&self, _text: &str) -> Result<SpanPrediction> {
        Err(KgpError::ExtractionError("connection refused".to_string()))
    }
}

const OBAMA: &str = "Barack Obama was the president of the United States.";
const TOWERS: &str = "The twin towers stood in New York City until 2001.";

fn generator() -> ScriptedGenerator {
    ScriptedGenerator(HashMap::from([
        (
            OBAMA.to_string(),
            vec![
                "<s><triplet> Barack Obama <per> United States <loc> president of</s>".to_string(),
                // Beam duplicate plus a truncated tail
                concat!(
                    "<s><triplet> Barack Obama <per> United States <loc> president of ",
                    "<triplet> Obama <per>"
                )
                .to_string(),
            ],
        ),
        (
            TOWERS.to_string(),
            vec![
                concat!(
                    "<s><triplet> twin towers <loc> New York City <loc> located in ",
                    "<triplet> twin towers <loc> 2001 <date> end time</s>"
                )
                .to_string(),
            ],
        ),
    ]))
}

fn node(label: &str, key: &str) -> NodeId {
    NodeId {
        label: GraphLabel::new(label).unwrap(),
        key: key.to_string(),
    }
}

async fn validate_and_upload(
    store: &MemoryGraphStore,
    entities: Vec<EntityRecord>,
    relationships: Vec<RelationshipRecord>,
) -> (usize, usize) {
    let tables = ValidationPipeline::reference().run_tables(relationships, entities);

    let upserter = GraphUpserter::new(store).unwrap();
    let nodes = upserter.upsert_entities(&tables.entities).await.unwrap();
    let edges = upserter
        .upsert_relationships(&tables.relationships.rows)
        .await
        .unwrap();
    (nodes.written, edges.written)
}

// =============================================================================
// Sequence backend
// =============================================================================

#[tokio::test]
async fn test_sequence_pipeline_end_to_end() {
    let backend = Backend::Sequences(Box::new(generator()), GenerationParams::default());
    let texts = vec![OBAMA.to_string(), TOWERS.to_string()];

    let extraction = extract(&texts, &backend).await.unwrap();
    assert_eq!(extraction.relationships.len(), 3);
    assert_eq!(extraction.decode_stats.triplets_dropped, 1);

    let store = MemoryGraphStore::new();
    let (_, edges) = validate_and_upload(
        &store,
        extraction.entities.clone(),
        extraction.relationships.clone(),
    )
    .await;

    // The 2001 row is removed by the redundancy filter
    assert_eq!(edges, 2);
    assert_eq!(store.edge_count(), 2);
    assert!(store
        .edge(
            &node("PER", "barack_obama"),
            &node("LOC", "united_states"),
            "PRESIDENT_OF"
        )
        .is_some());
    assert!(store
        .edge(
            &node("LOC", "twin_towers"),
            &node("LOC", "new_york_city"),
            "LOCATED_IN"
        )
        .is_some());
}

#[tokio::test]
async fn test_repeated_runs_are_idempotent() {
    let backend = Backend::Sequences(Box::new(generator()), GenerationParams::default());
    let texts = vec![OBAMA.to_string(), TOWERS.to_string()];
    let store = MemoryGraphStore::new();

    let extraction = extract(&texts, &backend).await.unwrap();
    validate_and_upload(&store, extraction.entities, extraction.relationships).await;
    let (nodes, edges) = (store.node_count(), store.edge_count());

    let extraction = extract(&texts, &backend).await.unwrap();
    validate_and_upload(&store, extraction.entities, extraction.relationships).await;

    assert_eq!(store.node_count(), nodes);
    assert_eq!(store.edge_count(), edges);
}

// =============================================================================
// Span backend
// =============================================================================

#[tokio::test]
async fn test_span_pipeline_keeps_confidence() {
    let prediction = SpanPrediction {
        spans: vec![
            PredictedSpan {
                text: "Ada Lovelace".to_string(),
                label: "PERSON".to_string(),
            },
            PredictedSpan {
                text: "Charles Babbage".to_string(),
                label: "PERSON".to_string(),
            },
        ],
        triplets: vec![PredictedTriplet {
            subject: "Ada Lovelace".to_string(),
            label: "worked with".to_string(),
            object: "Charles Babbage".to_string(),
            confidence: 0.87,
        }],
    };
    let text = "Ada Lovelace worked with Charles Babbage.".to_string();
    let backend = Backend::Spans(Box::new(ScriptedLinker(HashMap::from([(
        text.clone(),
        prediction,
    )]))));

    let extraction = extract(&[text], &backend).await.unwrap();
    let store = MemoryGraphStore::new();
    let (nodes, edges) =
        validate_and_upload(&store, extraction.entities, extraction.relationships).await;

    assert_eq!((nodes, edges), (2, 1));
    let edge = store
        .edge(
            &node("PERSON", "ada_lovelace"),
            &node("PERSON", "charles_babbage"),
            "WORKED_WITH",
        )
        .unwrap();
    assert_eq!(edge.confidence, Some(0.87));
}

#[tokio::test]
async fn test_unknown_endpoint_types_become_undefined() {
    let relationships = vec![RelationshipRecord::new("grace hopper", "INVENTED", "compilers")];
    let store = MemoryGraphStore::new();

    let (_, edges) = validate_and_upload(&store, Vec::new(), relationships).await;

    assert_eq!(edges, 1);
    assert_eq!(store.nodes_with_label(UNDEFINED), 2);
}

#[tokio::test]
async fn test_backend_failure_propagates() {
    let backend = Backend::Spans(Box::new(Unreachable));

    let result = extract(&["anything".to_string()], &backend).await;

    assert!(matches!(result, Err(KgpError::ExtractionError(_))));
}
