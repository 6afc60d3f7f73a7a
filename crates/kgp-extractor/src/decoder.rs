//! Linearized triplet decoder
//!
//! Sequence-to-sequence extraction models emit a flat token stream such as
//!
//! ```text
//! <triplet> Barack Obama <PERSON> United States <COUNTRY> president of
//! ```
//!
//! where the same bracket tokens both delimit fields and switch between them.
//! There are no closing tokens: the field that is currently open follows
//! only from the markers seen so far. The decoder tracks that with an
//! explicit [`Role`] and one transition per marker kind.
//!
//! Decoding is total. Malformed or truncated input yields fewer triplets,
//! never an error or a panic.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use kgp_core::{Triplet, UNDEFINED};

/// Tokens opening a new group of triplets sharing one head entity
const SEGMENT_MARKERS: [&str; 2] = ["<triplet>", "<relation>"];

/// Sequence start/end, padding and language-tag tokens added by the tokenizer
static BOILERPLATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"</?s>|<pad>|__[a-z]{2}__|\b[a-z]{2}_[A-Z]{2}\b").expect("boilerplate pattern")
});

// ============================================================================
// Tokens and roles
// ============================================================================

/// Classified token of a tagged sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    /// `<triplet>` and its alias
    SegmentStart,
    /// `<LABEL>`, carrying the bracket content
    TypeMarker(&'a str),
    /// Any other token
    Text(&'a str),
}

impl<'a> Token<'a> {
    fn classify(raw: &'a str) -> Self {
        if SEGMENT_MARKERS.contains(&raw) {
            Self::SegmentStart
        } else if raw.len() >= 2 && raw.starts_with('<') && raw.ends_with('>') {
            Self::TypeMarker(&raw[1..raw.len() - 1])
        } else {
            Self::Text(raw)
        }
    }
}

/// Field the decoder is currently filling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Role {
    /// Before the first segment marker
    #[default]
    Idle,
    /// Head entity text, right after a segment marker
    Head,
    /// Tail entity text, after the head's type marker
    Tail,
    /// Relation text, after the tail's type marker
    Relation,
}

// ============================================================================
// Decoder
// ============================================================================

/// Counters describing one decoding run
///
/// Segments and triplets do not reconcile: a segment sharing one head
/// across several tails emits more than one triplet, and a segment that is
/// cut off by the next marker before any relation text is discarded without
/// being counted as dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Segment markers encountered
    pub segments_seen: usize,
    /// Complete triplets returned
    pub triplets_emitted: usize,
    /// Flushes discarded for a missing subject, relation or object
    pub triplets_dropped: usize,
}

impl std::ops::AddAssign for DecodeStats {
    fn add_assign(&mut self, other: Self) {
        self.segments_seen += other.segments_seen;
        self.triplets_emitted += other.triplets_emitted;
        self.triplets_dropped += other.triplets_dropped;
    }
}

#[derive(Debug, Default)]
struct DecoderState {
    role: Role,
    subject: String,
    subject_type: String,
    object: String,
    object_type: String,
    relation: String,
    triplets: Vec<Triplet>,
    stats: DecodeStats,
}

impl DecoderState {
    fn on_segment_start(&mut self) {
        self.stats.segments_seen += 1;
        if !self.relation.is_empty() {
            self.flush();
        }
        self.subject.clear();
        self.subject_type.clear();
        self.object.clear();
        self.object_type.clear();
        self.relation.clear();
        self.role = Role::Head;
    }

    fn on_type_marker(&mut self, label: &str) {
        match self.role {
            Role::Head | Role::Relation => {
                if !self.relation.is_empty() {
                    self.flush();
                    // consumed by the emitted triplet
                    self.relation.clear();
                }
                self.object.clear();
                self.subject_type = label.to_string();
                self.role = Role::Tail;
            }
            Role::Tail | Role::Idle => {
                self.object_type = label.to_string();
                self.relation.clear();
                self.role = Role::Relation;
            }
        }
    }

    fn on_text(&mut self, token: &str) {
        let buffer = match self.role {
            Role::Head => &mut self.subject,
            Role::Tail => &mut self.object,
            Role::Relation => &mut self.relation,
            Role::Idle => return,
        };
        if !buffer.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(token);
    }

    fn flush(&mut self) {
        let triplet = Triplet {
            subject: self.subject.trim().to_string(),
            subject_type: type_or_undefined(&self.subject_type),
            relation: self.relation.trim().to_string(),
            object: self.object.trim().to_string(),
            object_type: type_or_undefined(&self.object_type),
            confidence: None,
        };

        if triplet.is_complete() {
            self.triplets.push(triplet);
            self.stats.triplets_emitted += 1;
        } else {
            self.stats.triplets_dropped += 1;
        }
    }

    fn finish(mut self) -> (Vec<Triplet>, DecodeStats) {
        let all_present = [
            &self.subject,
            &self.relation,
            &self.object,
            &self.subject_type,
            &self.object_type,
        ]
        .iter()
        .all(|field| !field.trim().is_empty());

        if all_present {
            self.flush();
        } else if !(self.subject.is_empty() && self.relation.is_empty() && self.object.is_empty()) {
            self.stats.triplets_dropped += 1;
        }

        (self.triplets, self.stats)
    }
}

fn type_or_undefined(label: &str) -> String {
    let label = label.trim();
    if label.is_empty() {
        UNDEFINED.to_string()
    } else {
        label.to_string()
    }
}

/// Remove tokenizer boilerplate so it never reaches the state machine
pub fn strip_boilerplate(sequence: &str) -> String {
    BOILERPLATE.replace_all(sequence, " ").into_owned()
}

/// Decode one tagged sequence into triplets
pub fn decode(sequence: &str) -> Vec<Triplet> {
    decode_with_stats(sequence).0
}

/// Decode one tagged sequence, also reporting what was seen and dropped
pub fn decode_with_stats(sequence: &str) -> (Vec<Triplet>, DecodeStats) {
    let cleaned = strip_boilerplate(sequence);
    let mut state = DecoderState::default();

    for raw in cleaned.split_whitespace() {
        match Token::classify(raw) {
            Token::SegmentStart => state.on_segment_start(),
            Token::TypeMarker(label) => state.on_type_marker(label),
            Token::Text(text) => state.on_text(text),
        }
    }

    let (triplets, stats) = state.finish();
    debug!(
        "Decoded {} triplets from {} segments ({} dropped)",
        stats.triplets_emitted, stats.segments_seen, stats.triplets_dropped
    );
    (triplets, stats)
}

// ============================================================================
// Tests
// ============================================================================
