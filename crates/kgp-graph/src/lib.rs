//! KGP Graph - Graph database abstraction
//!
//! Provides create-or-merge writes of entities and relationships into a
//! property graph, over SurrealDB or an in-memory petgraph store.

use async_trait::async_trait;
use kgp_core::Result;
use serde::Serialize;

pub mod label;
pub mod memory_store;
pub mod surrealdb_store;
pub mod upsert;

pub use label::GraphLabel;
pub use memory_store::MemoryGraphStore;
pub use surrealdb_store::SurrealDbStore;
pub use upsert::{GraphUpserter, RejectedRow, UpsertReport};

/// Identity of a merged node: its label and key value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub label: GraphLabel,
    pub key: String,
}

/// Store-specific identifier of a merged edge
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeId(pub String);

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Properties written only when an edge is first created
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EdgeProperties {
    pub confidence: Option<f32>,
}

/// Trait for graph database operations
///
/// Both operations are merges: calling them again with the same arguments
/// returns the existing node or edge and changes nothing.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create-if-absent a node labeled `label` whose `key_property` is `value`
    async fn merge_node(
        &self,
        label: &GraphLabel,
        key_property: &GraphLabel,
        value: &str,
    ) -> Result<NodeId>;

    /// Create-if-absent a directed `label` edge, setting `on_create` only
    /// when the edge is new
    async fn merge_edge(
        &self,
        from: &NodeId,
        to: &NodeId,
        label: &GraphLabel,
        on_create: &EdgeProperties,
    ) -> Result<EdgeId>;

    /// Get store name for logging
    fn name(&self) -> &str;
}
