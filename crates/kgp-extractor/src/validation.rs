//! Triplet validation pipeline
//!
//! Each stage is a pure function from a relationship table to a new table
//! plus a [`StageReport`]. Stages never fail on content: bad rows are
//! dropped or rewritten, and the report says how many.
//!
//! Reference order:
//! 1. [`drop_nulls`]
//! 2. [`drop_redundant`]
//! 3. [`replace_special_chars`]

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::info;

use kgp_core::{EntityRecord, RelationshipRecord};

use crate::resolver::resolve_types;

/// Runs of anything that is not a letter or number, underscores included
static SPECIAL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{Alphabetic}\p{N}]+").expect("special char pattern"));
static DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").expect("digit pattern"));

/// Entity names this short carry no information
const MIN_ENTITY_CHARS: usize = 4;

// ============================================================================
// Stage reports
// ============================================================================

/// A validation stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    NullFilter,
    RedundancyFilter,
    SpecialCharNormalizer,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NullFilter => "null_filter",
            Self::RedundancyFilter => "redundancy_filter",
            Self::SpecialCharNormalizer => "special_char_normalizer",
        }
    }

    /// Run this stage on a table
    pub fn apply(self, rows: Vec<RelationshipRecord>) -> (Vec<RelationshipRecord>, StageReport) {
        match self {
            Self::NullFilter => drop_nulls(rows),
            Self::RedundancyFilter => drop_redundant(rows),
            Self::SpecialCharNormalizer => replace_special_chars(rows),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Row accounting for one stage run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub rows_in: usize,
    pub rows_out: usize,
    /// Rows whose subject was rewritten
    pub subjects_changed: usize,
    /// Rows whose object was rewritten
    pub objects_changed: usize,
}

impl StageReport {
    fn new(stage: Stage, rows_in: usize, rows_out: usize) -> Self {
        Self {
            stage,
            rows_in,
            rows_out,
            subjects_changed: 0,
            objects_changed: 0,
        }
    }

    pub fn dropped(&self) -> usize {
        self.rows_in - self.rows_out
    }

    /// Share of input rows dropped, in percent
    pub fn drop_pct(&self) -> f64 {
        percent(self.dropped(), self.rows_in)
    }

    fn log_drops(&self, reason: &str) {
        if self.dropped() > 0 {
            info!(
                "Out of {} rows, a total of {} ({:.1}%) rows have been dropped due to {}",
                self.rows_in,
                self.dropped(),
                self.drop_pct(),
                reason
            );
        } else {
            info!("No rows were dropped.");
        }
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

// ============================================================================
// Stages
// ============================================================================

/// Drop rows with a null subject, object, or entity type
pub fn drop_nulls(rows: Vec<RelationshipRecord>) -> (Vec<RelationshipRecord>, StageReport) {
    let rows_in = rows.len();
    let kept: Vec<_> = rows
        .into_iter()
        .filter(|r| {
            r.subject.is_some()
                && r.object.is_some()
                && r.subject_entity_type.is_some()
                && r.object_entity_type.is_some()
        })
        .collect();

    let report = StageReport::new(Stage::NullFilter, rows_in, kept.len());
    report.log_drops(
        "missing values in at least one of: subject, object, subject_entity_type, object_entity_type",
    );
    (kept, report)
}

/// True when an entity name is too short or contains a digit
///
/// Length is measured on the name as it will be stored, after special
/// character runs collapse, so that normalized output is never dropped by
/// a later pass. This is stricter than the raw length: `"ab!!!!"` has six
/// characters but stores as `"ab_"` and is dropped. A null name is
/// redundant.
pub fn is_redundant(name: Option<&str>) -> bool {
    match name {
        None => true,
        Some(text) => {
            DIGIT.is_match(text)
                || SPECIAL_CHARS.replace_all(text, "_").chars().count() < MIN_ENTITY_CHARS
        }
    }
}

/// Drop rows whose subject or object contains a digit or has at most three
/// characters
pub fn drop_redundant(rows: Vec<RelationshipRecord>) -> (Vec<RelationshipRecord>, StageReport) {
    let rows_in = rows.len();
    let kept: Vec<_> = rows
        .into_iter()
        .filter(|r| !is_redundant(r.subject.as_deref()) && !is_redundant(r.object.as_deref()))
        .collect();

    let report = StageReport::new(Stage::RedundancyFilter, rows_in, kept.len());
    report.log_drops("not passing quality checks");
    (kept, report)
}

/// Collapse each run of non-alphanumeric characters (underscores included)
/// into one `_`
pub fn normalize_name(name: &str) -> String {
    SPECIAL_CHARS.replace_all(name, "_").into_owned()
}

/// Rewrite subject and object of every row with [`normalize_name`]
pub fn replace_special_chars(
    rows: Vec<RelationshipRecord>,
) -> (Vec<RelationshipRecord>, StageReport) {
    let rows_in = rows.len();
    let mut report = StageReport::new(Stage::SpecialCharNormalizer, rows_in, rows_in);

    let rewritten: Vec<_> = rows
        .into_iter()
        .map(|mut row| {
            if let Some(subject) = row.subject.as_mut() {
                let normalized = normalize_name(subject);
                if normalized != *subject {
                    report.subjects_changed += 1;
                    *subject = normalized;
                }
            }
            if let Some(object) = row.object.as_mut() {
                let normalized = normalize_name(object);
                if normalized != *object {
                    report.objects_changed += 1;
                    *object = normalized;
                }
            }
            row
        })
        .collect();

    info!(
        "Out of a total {} rows, {} ({:.1}%) object names and {} ({:.1}%) subject names were changed",
        rows_in,
        report.objects_changed,
        percent(report.objects_changed, rows_in),
        report.subjects_changed,
        percent(report.subjects_changed, rows_in)
    );
    (rewritten, report)
}

/// Apply the subject/object rewrite to the entity table, keeping the first
/// row for names that collapse together
pub fn normalize_entity_names(entities: Vec<EntityRecord>) -> Vec<EntityRecord> {
    let mut seen = HashSet::new();
    entities
        .into_iter()
        .map(|e| EntityRecord {
            name: normalize_name(&e.name),
            ..e
        })
        .filter(|e| seen.insert(e.name.clone()))
        .collect()
}

// ============================================================================
// Pipeline
// ============================================================================

/// Result of running a pipeline
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub rows: Vec<RelationshipRecord>,
    pub reports: Vec<StageReport>,
}

impl ValidationOutcome {
    /// Rows removed across all stages
    pub fn total_dropped(&self) -> usize {
        self.reports.iter().map(StageReport::dropped).sum()
    }
}

/// An ordered list of stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPipeline {
    stages: Vec<Stage>,
}

impl ValidationPipeline {
    /// Null filter, redundancy filter, special character normalizer
    pub fn reference() -> Self {
        Self::new(vec![
            Stage::NullFilter,
            Stage::RedundancyFilter,
            Stage::SpecialCharNormalizer,
        ])
    }

    /// A pipeline with caller-chosen stages and order
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn run(&self, rows: Vec<RelationshipRecord>) -> ValidationOutcome {
        let mut reports = Vec::with_capacity(self.stages.len());
        let rows = self.stages.iter().fold(rows, |rows, stage| {
            let (rows, report) = stage.apply(rows);
            reports.push(report);
            rows
        });

        ValidationOutcome { rows, reports }
    }
}

/// Validated entity and relationship tables
#[derive(Debug, Clone)]
pub struct ValidatedTables {
    pub entities: Vec<EntityRecord>,
    pub relationships: ValidationOutcome,
}

impl ValidationPipeline {
    /// Validate a relationship table together with its entity table
    ///
    /// Types are resolved before the stages run, then resolved again against
    /// the normalized entity table. When two entity names normalize to the
    /// same key the first entity's type wins, and every relationship
    /// endpoint with that key carries the same type.
    pub fn run_tables(
        &self,
        relationships: Vec<RelationshipRecord>,
        entities: Vec<EntityRecord>,
    ) -> ValidatedTables {
        let typed = resolve_types(relationships, &entities);
        let mut outcome = self.run(typed);
        let entities = normalize_entity_names(entities);
        outcome.rows = resolve_types(outcome.rows, &entities);

        ValidatedTables {
            entities,
            relationships: outcome,
        }
    }
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::reference()
    }
}

// ============================================================================
// Tests
// ============================================================================
