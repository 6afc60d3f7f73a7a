//! Entity-relation extraction adapter
//!
//! Runs a [`Backend`] over a batch of texts and normalizes whatever it
//! returns into the shared entity and relationship tables.

use std::collections::HashSet;

use tracing::{debug, info};

use kgp_core::{canonical_relation, EntityRecord, RelationshipRecord, Result, Triplet};

use crate::backend::{Backend, GenerationParams, SequenceModel, SpanModel};
use crate::decoder::{decode_with_stats, DecodeStats};

/// Entity and relationship tables produced from one batch of texts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub entities: Vec<EntityRecord>,
    pub relationships: Vec<RelationshipRecord>,
    /// Decoder counters, all zero for span backends
    pub decode_stats: DecodeStats,
}

/// Extract entities and relationships from every text
pub async fn extract(texts: &[String], backend: &Backend) -> Result<Extraction> {
    info!(
        "Extracting entities and relationships from {} texts with {}",
        texts.len(),
        backend.kind()
    );

    let (entities, relationships, decode_stats) = match backend {
        Backend::Spans(model) => {
            let (entities, relationships) = run_span_model(texts, model.as_ref()).await?;
            (entities, relationships, DecodeStats::default())
        }
        Backend::Sequences(model, params) => {
            run_sequence_model(texts, model.as_ref(), params).await?
        }
    };

    let extraction = Extraction {
        entities: dedupe_entities(entities),
        relationships: dedupe_relationships(relationships),
        decode_stats,
    };

    info!(
        "Extracted {} unique entities and {} unique relationships",
        extraction.entities.len(),
        extraction.relationships.len()
    );
    Ok(extraction)
}

async fn run_span_model(
    texts: &[String],
    model: &dyn SpanModel,
) -> Result<(Vec<EntityRecord>, Vec<RelationshipRecord>)> {
    let mut entities = Vec::new();
    let mut relationships = Vec::new();

    for (index, text) in texts.iter().enumerate() {
        debug!("Extracting entity-relationship for {}/{}", index + 1, texts.len());
        let prediction = model.infer(text).await?;

        entities.extend(
            prediction
                .spans
                .into_iter()
                .map(|span| EntityRecord::new(span.text, Some(span.label))),
        );
        relationships.extend(prediction.triplets.into_iter().map(|t| {
            RelationshipRecord::new(t.subject, t.label, t.object).with_confidence(t.confidence)
        }));
    }

    Ok((entities, relationships))
}

async fn run_sequence_model(
    texts: &[String],
    model: &dyn SequenceModel,
    params: &GenerationParams,
) -> Result<(Vec<EntityRecord>, Vec<RelationshipRecord>, DecodeStats)> {
    let mut triplets: Vec<Triplet> = Vec::new();
    let mut stats = DecodeStats::default();

    for (index, text) in texts.iter().enumerate() {
        debug!("Generating sequences for {}/{}", index + 1, texts.len());
        for sequence in model.generate(text, params).await? {
            let (decoded, decoded_stats) = decode_with_stats(&sequence);
            triplets.extend(decoded);
            stats += decoded_stats;
        }
    }

    info!(
        "Decoded {} triplets from {} segments ({} incomplete dropped)",
        stats.triplets_emitted, stats.segments_seen, stats.triplets_dropped
    );

    let entities = triplets
        .iter()
        .flat_map(|t| {
            [
                EntityRecord::new(t.subject.clone(), Some(t.subject_type.clone())),
                EntityRecord::new(t.object.clone(), Some(t.object_type.clone())),
            ]
        })
        .collect();
    let relationships = triplets.into_iter().map(RelationshipRecord::from).collect();

    Ok((entities, relationships, stats))
}

/// Lower-case names, upper-case types, keep the first row per name
pub fn dedupe_entities(entities: Vec<EntityRecord>) -> Vec<EntityRecord> {
    let mut seen = HashSet::new();
    entities
        .into_iter()
        .map(|e| EntityRecord {
            name: e.name.to_lowercase(),
            entity_type: e.entity_type.map(|t| t.to_uppercase()),
        })
        .filter(|e| seen.insert(e.name.clone()))
        .collect()
}

/// Lower-case text, canonicalize relation labels, keep the first row per
/// (subject, relationship, object)
///
/// Rows whose relation has no ASCII letter or digit canonicalize to an empty
/// label and are dropped.
pub fn dedupe_relationships(relationships: Vec<RelationshipRecord>) -> Vec<RelationshipRecord> {
    let mut seen = HashSet::new();
    let mut unlabeled = 0usize;
    let mut kept = Vec::with_capacity(relationships.len());

    for r in relationships {
        let relationship = canonical_relation(&r.relationship);
        if relationship.is_empty() {
            unlabeled += 1;
            continue;
        }
        let row = RelationshipRecord {
            subject: r.subject.map(|s| s.to_lowercase()),
            subject_entity_type: r.subject_entity_type.map(|t| t.to_uppercase()),
            relationship,
            object: r.object.map(|o| o.to_lowercase()),
            object_entity_type: r.object_entity_type.map(|t| t.to_uppercase()),
            confidence: r.confidence,
        };
        if seen.insert((row.subject.clone(), row.relationship.clone(), row.object.clone())) {
            kept.push(row);
        }
    }

    if unlabeled > 0 {
        info!("Dropped {} relationships whose label has no usable characters", unlabeled);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{PredictedSpan, PredictedTriplet, SpanPrediction};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct FixedSpans(HashMap<String, SpanPrediction>);

    #[async_trait]
    impl SpanModel for FixedSpans {
        async fn infer(&self, text: &str) -> Result<SpanPrediction> {
            Ok(self.0.get(text).cloned().unwrap_or_default())
        }
    }

    struct FixedSequences(Vec<String>);

    #[async_trait]
    impl SequenceModel for FixedSequences {
        async fn generate(&self, _text: &str, params: &GenerationParams) -> Result<Vec<String>> {
            Ok(self
                .0
                .iter()
                .take(params.num_return_sequences)
                .cloned()
                .collect())
        }
    }

    fn span(text: &str, label: &str) -> PredictedSpan {
        PredictedSpan {
            text: text.to_string(),
            label: label.to_string(),
        }
    }

    #[tokio::test]
    async fn test_span_backend() {
        let prediction = SpanPrediction {
            spans: vec![
                span("Barack Obama", "PER"),
                span("Hawaii", "LOC"),
                span("barack obama", "ORG"),
            ],
            triplets: vec![
                PredictedTriplet {
                    subject: "Barack Obama".into(),
                    label: "place of birth".into(),
                    object: "Hawaii".into(),
                    confidence: 0.91,
                },
                PredictedTriplet {
                    subject: "barack obama".into(),
                    label: "Place of Birth".into(),
                    object: "HAWAII".into(),
                    confidence: 0.42,
                },
            ],
        };
        let text = "Barack Obama was born in Hawaii".to_string();
        let backend = Backend::Spans(Box::new(FixedSpans(HashMap::from([(
            text.clone(),
            prediction,
        )]))));

        let extraction = extract(&[text], &backend).await.unwrap();

        assert_eq!(
            extraction.entities,
            vec![
                EntityRecord::new("barack obama", Some("PER".into())),
                EntityRecord::new("hawaii", Some("LOC".into())),
            ]
        );
        assert_eq!(extraction.relationships.len(), 1);
        let row = &extraction.relationships[0];
        assert_eq!(row.relationship, "PLACE_OF_BIRTH");
        assert_eq!(row.subject.as_deref(), Some("barack obama"));
        assert_eq!(row.confidence, Some(0.91));
        assert_eq!(row.subject_entity_type, None);
    }

    #[tokio::test]
    async fn test_sequence_backend_concatenates_all_sequences() {
        let backend = Backend::Sequences(
            Box::new(FixedSequences(vec![
                "<s><triplet> Paris <loc> France <loc> capital of</s>".into(),
                "<s><triplet> Paris <loc> France <loc> capital of</s>".into(),
                "<s><triplet> Paris <loc> Seine <loc> located next to</s>".into(),
            ])),
            GenerationParams::default(),
        );

        let texts = vec!["Paris is the capital of France".to_string(), "Paris".to_string()];
        let extraction = extract(&texts, &backend).await.unwrap();

        assert_eq!(extraction.decode_stats.triplets_emitted, 6);
        assert_eq!(extraction.decode_stats.segments_seen, 6);
        assert_eq!(
            extraction
                .relationships
                .iter()
                .map(|r| r.relationship.as_str())
                .collect::<Vec<_>>(),
            vec!["CAPITAL_OF", "LOCATED_NEXT_TO"]
        );
        assert_eq!(
            extraction.relationships[0].subject_entity_type.as_deref(),
            Some("LOC")
        );
        assert_eq!(extraction.relationships[0].confidence, None);
        assert_eq!(
            extraction
                .entities
                .iter()
                .map(|e| e.name.as_str())
                .collect::<Vec<_>>(),
            vec!["paris", "france", "seine"]
        );
    }

    #[tokio::test]
    async fn test_return_sequence_count_is_respected() {
        let backend = Backend::Sequences(
            Box::new(FixedSequences(vec![
                "<triplet> Rome <loc> Italy <loc> capital of".into(),
                "<triplet> Milan <loc> Italy <loc> located in".into(),
            ])),
            GenerationParams {
                num_return_sequences: 1,
                ..GenerationParams::default()
            },
        );

        let extraction = extract(&["Rome".to_string()], &backend).await.unwrap();
        assert_eq!(extraction.relationships.len(), 1);
    }

    #[test]
    fn test_dedupe_entities_first_type_wins() {
        let deduped = dedupe_entities(vec![
            EntityRecord::new("Asia", Some("loc".into())),
            EntityRecord::new("ASIA", Some("ORG".into())),
            EntityRecord::new("Europe", None),
        ]);

        assert_eq!(
            deduped,
            vec![
                EntityRecord::new("asia", Some("LOC".into())),
                EntityRecord::new("europe", None),
            ]
        );
    }

    #[test]
    fn test_dedupe_relationships_drops_unlabeled_rows() {
        let deduped = dedupe_relationships(vec![
            RelationshipRecord::new("Zurich", "位于", "Switzerland"),
            RelationshipRecord::new("Zurich", "?!", "Switzerland"),
            RelationshipRecord::new("Zurich", "located in", "Switzerland"),
        ]);

        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].relationship, "LOCATED_IN");
        assert_eq!(deduped[0].subject.as_deref(), Some("zurich"));
    }

    #[tokio::test]
    async fn test_non_latin_relation_never_reaches_output() {
        let prediction = SpanPrediction {
            spans: vec![span("Zurich", "LOC"), span("Switzerland", "LOC")],
            triplets: vec![PredictedTriplet {
                subject: "Zurich".into(),
                label: "位于".into(),
                object: "Switzerland".into(),
                confidence: 0.9,
            }],
        };
        let text = "Zurich liegt in der Schweiz".to_string();
        let backend = Backend::Spans(Box::new(FixedSpans(HashMap::from([(
            text.clone(),
            prediction,
        )]))));

        let extraction = extract(&[text], &backend).await.unwrap();

        assert!(extraction.relationships.is_empty());
        assert_eq!(extraction.entities.len(), 2);
    }
}
