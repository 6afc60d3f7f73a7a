//! SurrealDB implementation for graph storage
//!
//! Nodes are records in a table named after their label, keyed by the
//! merge value. Edges are relation tables named after the relationship.

use async_trait::async_trait;
use kgp_core::{DatabaseConfig, KgpError, Result};
use serde::Deserialize;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tracing::debug;

use crate::{EdgeId, EdgeProperties, GraphLabel, GraphStore, NodeId};

/// SurrealDB graph store implementation
pub struct SurrealDbStore {
    client: Surreal<Client>,
}

impl SurrealDbStore {
    /// Create a new SurrealDB connection
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        // The surrealdb crate adds the scheme itself
        let url = config
            .surrealdb_url
            .strip_prefix("ws://")
            .or_else(|| config.surrealdb_url.strip_prefix("wss://"))
            .unwrap_or(&config.surrealdb_url);

        let client = Surreal::new::<Ws>(url)
            .await
            .map_err(|e| KgpError::DatabaseError(format!("SurrealDB connection failed: {e}")))?;

        client
            .signin(Root {
                username: &config.surrealdb_user,
                password: &config.surrealdb_pass,
            })
            .await
            .map_err(|e| KgpError::DatabaseError(format!("SurrealDB auth failed: {e}")))?;

        client
            .use_ns(&config.surrealdb_namespace)
            .use_db(&config.surrealdb_database)
            .await
            .map_err(|e| KgpError::DatabaseError(format!("SurrealDB namespace error: {e}")))?;

        Ok(Self { client })
    }
}

#[derive(Debug, Deserialize)]
struct IdRecord {
    id: surrealdb::sql::Thing,
}

fn node_query(key_property: &GraphLabel) -> String {
    format!(
        "UPSERT type::thing($table, $value) SET {} = $value RETURN NONE",
        key_property.quoted()
    )
}

fn edge_query(label: &GraphLabel) -> String {
    let edge = label.quoted();
    format!(
        "BEGIN TRANSACTION;
         LET $src = type::thing($from_table, $from_key);
         LET $dst = type::thing($to_table, $to_key);
         IF array::len((SELECT id FROM {edge} WHERE in = $src AND out = $dst)) = 0 {{
             RELATE $src->{edge}->$dst SET confidence = $confidence, created_at = time::now();
         }};
         COMMIT TRANSACTION;"
    )
}

fn edge_lookup_query(label: &GraphLabel) -> String {
    format!(
        "SELECT id FROM {} WHERE in = type::thing($from_table, $from_key) \
         AND out = type::thing($to_table, $to_key) LIMIT 1",
        label.quoted()
    )
}

#[async_trait]
impl GraphStore for SurrealDbStore {
    async fn merge_node(
        &self,
        label: &GraphLabel,
        key_property: &GraphLabel,
        value: &str,
    ) -> Result<NodeId> {
        self.client
            .query(node_query(key_property))
            .bind(("table", label.to_string()))
            .bind(("value", value.to_string()))
            .await
            .and_then(|response| response.check())
            .map_err(|e| KgpError::DatabaseError(format!("Failed to merge node {label}: {e}")))?;

        Ok(NodeId {
            label: label.clone(),
            key: value.to_string(),
        })
    }

    async fn merge_edge(
        &self,
        from: &NodeId,
        to: &NodeId,
        label: &GraphLabel,
        on_create: &EdgeProperties,
    ) -> Result<EdgeId> {
        self.client
            .query(edge_query(label))
            .bind(("from_table", from.label.to_string()))
            .bind(("from_key", from.key.clone()))
            .bind(("to_table", to.label.to_string()))
            .bind(("to_key", to.key.clone()))
            .bind(("confidence", on_create.confidence))
            .await
            .and_then(|response| response.check())
            .map_err(|e| KgpError::DatabaseError(format!("Failed to merge edge {label}: {e}")))?;

        let records: Vec<IdRecord> = self
            .client
            .query(edge_lookup_query(label))
            .bind(("from_table", from.label.to_string()))
            .bind(("from_key", from.key.clone()))
            .bind(("to_table", to.label.to_string()))
            .bind(("to_key", to.key.clone()))
            .await
            .map_err(|e| KgpError::DatabaseError(format!("Edge lookup failed: {e}")))?
            .take(0)
            .map_err(|e| KgpError::DatabaseError(format!("Result extraction failed: {e}")))?;

        let id = records.into_iter().next().map(|r| r.id.to_string()).ok_or_else(|| {
            KgpError::DatabaseError(format!(
                "Edge {label} from {}:{} to {}:{} missing after merge",
                from.label, from.key, to.label, to.key
            ))
        })?;
        debug!(edge = %id, "Merged edge");

        Ok(EdgeId(id))
    }

    fn name(&self) -> &str {
        "surrealdb"
    }
}
