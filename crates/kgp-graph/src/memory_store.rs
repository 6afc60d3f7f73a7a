//! In-memory graph store
//!
//! A petgraph-backed [`GraphStore`] with the same merge semantics as the
//! database store. Used for dry runs and tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kgp_core::{KgpError, Result};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::{EdgeId, EdgeProperties, GraphLabel, GraphStore, NodeId};

/// A node held by the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredNode {
    pub label: String,
    pub properties: HashMap<String, String>,
}

/// An edge held by the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEdge {
    pub label: String,
    pub confidence: Option<f32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    graph: DiGraph<StoredNode, StoredEdge>,
    nodes: HashMap<NodeId, NodeIndex>,
    edges: HashMap<(NodeIndex, NodeIndex, GraphLabel), EdgeIndex>,
}

/// Graph store living in process memory
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    inner: Mutex<Inner>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| KgpError::DatabaseError("In-memory graph lock poisoned".to_string()))
    }

    pub fn node_count(&self) -> usize {
        self.lock().map(|g| g.graph.node_count()).unwrap_or(0)
    }

    pub fn edge_count(&self) -> usize {
        self.lock().map(|g| g.graph.edge_count()).unwrap_or(0)
    }

    /// Look up a node by identity
    pub fn node(&self, id: &NodeId) -> Option<StoredNode> {
        let inner = self.lock().ok()?;
        let index = *inner.nodes.get(id)?;
        inner.graph.node_weight(index).cloned()
    }

    /// Look up the `label` edge between two nodes
    pub fn edge(&self, from: &NodeId, to: &NodeId, label: &str) -> Option<StoredEdge> {
        let inner = self.lock().ok()?;
        let source = *inner.nodes.get(from)?;
        let target = *inner.nodes.get(to)?;
        inner
            .graph
            .edges_connecting(source, target)
            .find(|e| e.weight().label == label)
            .map(|e| e.weight().clone())
    }

    /// Count nodes carrying a label
    pub fn nodes_with_label(&self, label: &str) -> usize {
        self.lock()
            .map(|g| g.graph.node_weights().filter(|n| n.label == label).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn merge_node(
        &self,
        label: &GraphLabel,
        key_property: &GraphLabel,
        value: &str,
    ) -> Result<NodeId> {
        let id = NodeId {
            label: label.clone(),
            key: value.to_string(),
        };

        let mut guard = self.lock()?;
        let inner = &mut *guard;
        if !inner.nodes.contains_key(&id) {
            let index = inner.graph.add_node(StoredNode {
                label: label.to_string(),
                properties: HashMap::from([(key_property.to_string(), value.to_string())]),
            });
            inner.nodes.insert(id.clone(), index);
        }

        Ok(id)
    }

    async fn merge_edge(
        &self,
        from: &NodeId,
        to: &NodeId,
        label: &GraphLabel,
        on_create: &EdgeProperties,
    ) -> Result<EdgeId> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let lookup = |id: &NodeId| {
            inner.nodes.get(id).copied().ok_or_else(|| {
                KgpError::DatabaseError(format!("Node {}:{} does not exist", id.label, id.key))
            })
        };
        let source = lookup(from)?;
        let target = lookup(to)?;

        let key = (source, target, label.clone());
        let index = match inner.edges.get(&key).copied() {
            Some(index) => index,
            None => {
                let index = inner.graph.add_edge(
                    source,
                    target,
                    StoredEdge {
                        label: label.to_string(),
                        confidence: on_create.confidence,
                        created_at: Utc::now(),
                    },
                );
                inner.edges.insert(key, index);
                index
            }
        };

        Ok(EdgeId(format!("{}:{}", label, index.index())))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
