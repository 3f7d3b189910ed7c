//! PostgreSQL authority for chains and canvas documents.
//!
//! # Tables
//!
//! | Table | Contents |
//! |-------|----------|
//! | `flow_item_sequences` | last entity id per item type |
//! | `flow_items` | business entities created from the canvas |
//! | `flow_nodes` | chain nodes, one row per node |
//! | `flow_edges` | chain edges |
//! | `flow_ui` | canvas documents, one row per work request |
//!
//! See [`crate::migrations`] for the schema.
//!
//! # Example
//!
//! ```ignore
//! use flowchain::backend::PostgresBackend;
//!
//! let backend = PostgresBackend::connect("postgresql://localhost/portal", 16).await?;
//! let chain = backend.get_flow_chain(51).await?;
//! ```

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use serde_json::Value as JsonValue;
use tokio_postgres::{NoTls, Row};

use super::{validate_create, validate_save, FlowBackend};
use crate::error::AppError;
use crate::models::{
    generate_ulid, CanvasLayout, CanvasState, CreateFlowItemRequest, CreatedFlowItem, FlowChain,
    FlowEdge, FlowNode, NodeType, SaveCanvasRequest, SavedCanvas,
};
use crate::reference::encode;

const SELECT_NODES: &str = "SELECT id, entity_id, node_type, doc_no, title, status, \
     priority, assignee_name, version \
     FROM flow_nodes WHERE work_request_id = $1 ORDER BY created_at, id";

const SELECT_EDGES: &str = "SELECT id, source, target \
     FROM flow_edges WHERE work_request_id = $1 ORDER BY created_at, id";

/// PostgreSQL-backed [`FlowBackend`].
///
/// This type is cheap to clone - the underlying connection pool is `Arc`-based.
#[derive(Clone)]
pub struct PostgresBackend {
    pool: Pool,
}

impl PostgresBackend {
    /// Creates a new backend with connection pooling.
    pub async fn connect(connection_string: &str, pool_size: usize) -> Result<Self, AppError> {
        let pg_config: tokio_postgres::Config = connection_string.parse().map_err(|e| {
            AppError::Internal(format!("Invalid PostgreSQL connection string: {}", e))
        })?;

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(pool_size)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create connection pool: {}", e)))?;

        Ok(Self { pool })
    }

    /// Gets a connection from the pool.
    pub(crate) async fn connection(&self) -> Result<Object, AppError> {
        Ok(self.pool.get().await?)
    }

    /// Register a work request and its root node if it has none yet.
    pub async fn seed_work_request(
        &self,
        work_request_id: i64,
        title: &str,
    ) -> Result<FlowNode, AppError> {
        let mut conn = self.connection().await?;
        let tx = conn.transaction().await?;

        let existing = tx
            .query_opt(
                "SELECT id, entity_id, node_type, doc_no, title, status, \
                 priority, assignee_name, version \
                 FROM flow_nodes WHERE work_request_id = $1 AND node_type = 'WORK_REQUEST'",
                &[&work_request_id],
            )
            .await?;
        if let Some(row) = existing {
            return row_to_node(&row);
        }

        let node_type = NodeType::WorkRequest;
        let doc_no = encode(node_type.ref_type(), work_request_id);
        let status = node_type.spec().initial_status;
        tx.execute(
            "INSERT INTO flow_items (item_type, entity_id, doc_no, title, status) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT (item_type, entity_id) DO NOTHING",
            &[&node_type.as_str(), &work_request_id, &doc_no, &title, &status],
        )
        .await?;

        let node = FlowNode {
            id: generate_ulid(),
            entity_id: work_request_id,
            node_type,
            doc_no,
            title: title.to_string(),
            status: status.to_string(),
            priority: None,
            assignee_name: None,
            version: None,
        };
        insert_node(&tx, work_request_id, &node).await?;
        tx.commit().await?;

        Ok(node)
    }
}

async fn insert_node(
    tx: &deadpool_postgres::Transaction<'_>,
    work_request_id: i64,
    node: &FlowNode,
) -> Result<(), AppError> {
    tx.execute(
        "INSERT INTO flow_nodes \
         (id, work_request_id, entity_id, node_type, doc_no, title, status, \
          priority, assignee_name, version) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        &[
            &node.id,
            &work_request_id,
            &node.entity_id,
            &node.node_type.as_str(),
            &node.doc_no,
            &node.title,
            &node.status,
            &node.priority,
            &node.assignee_name,
            &node.version,
        ],
    )
    .await?;
    Ok(())
}

fn row_to_node(row: &Row) -> Result<FlowNode, AppError> {
    let node_type: String = row.try_get("node_type")?;
    Ok(FlowNode {
        id: row.try_get("id")?,
        entity_id: row.try_get("entity_id")?,
        node_type: node_type.parse()?,
        doc_no: row.try_get("doc_no")?,
        title: row.try_get("title")?,
        status: row.try_get("status")?,
        priority: row.try_get("priority")?,
        assignee_name: row.try_get("assignee_name")?,
        version: row.try_get("version")?,
    })
}

fn row_to_edge(row: &Row) -> Result<FlowEdge, AppError> {
    Ok(FlowEdge {
        id: row.try_get("id")?,
        source: row.try_get("source")?,
        target: row.try_get("target")?,
    })
}

fn row_to_canvas(row: &Row) -> Result<CanvasState, AppError> {
    let positions: JsonValue = row.try_get("positions")?;
    let edges: JsonValue = row.try_get("edges")?;
    let custom_nodes: JsonValue = row.try_get("custom_nodes")?;
    Ok(CanvasState {
        version: row.try_get("version")?,
        positions: serde_json::from_value(positions)?,
        edges: serde_json::from_value(edges)?,
        custom_nodes: serde_json::from_value(custom_nodes)?,
    })
}

/// Serialize the three JSONB columns of a canvas document.
fn layout_columns(layout: &CanvasLayout) -> Result<(JsonValue, JsonValue, JsonValue), AppError> {
    Ok((
        serde_json::to_value(&layout.positions)?,
        serde_json::to_value(&layout.edges)?,
        serde_json::to_value(&layout.custom_nodes)?,
    ))
}

#[async_trait]
impl FlowBackend for PostgresBackend {
    async fn get_flow_chain(&self, work_request_id: i64) -> Result<FlowChain, AppError> {
        let conn = self.connection().await?;
        let nodes = conn
            .query(SELECT_NODES, &[&work_request_id])
            .await?
            .iter()
            .map(row_to_node)
            .collect::<Result<Vec<_>, _>>()?;
        if nodes.is_empty() {
            return Err(AppError::NotFound(format!(
                "Work request {} has no flow chain",
                work_request_id
            )));
        }

        let edges = conn
            .query(SELECT_EDGES, &[&work_request_id])
            .await?
            .iter()
            .map(row_to_edge)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FlowChain { nodes, edges })
    }

    async fn create_flow_item(
        &self,
        work_request_id: i64,
        request: &CreateFlowItemRequest,
    ) -> Result<CreatedFlowItem, AppError> {
        let mut conn = self.connection().await?;
        let tx = conn.transaction().await?;

        // Lock the chain so concurrent creations under it serialize.
        let nodes = tx
            .query(
                "SELECT id, entity_id, node_type, doc_no, title, status, \
                 priority, assignee_name, version \
                 FROM flow_nodes WHERE work_request_id = $1 FOR UPDATE",
                &[&work_request_id],
            )
            .await?
            .iter()
            .map(row_to_node)
            .collect::<Result<Vec<_>, _>>()?;
        let chain = FlowChain {
            nodes,
            edges: Vec::new(),
        };
        let parent_node_id = validate_create(&chain, request)?.id.clone();

        let item_type = request.item_type;
        let entity_id: i64 = tx
            .query_one(
                "INSERT INTO flow_item_sequences (item_type, last_id) VALUES ($1, 1) \
                 ON CONFLICT (item_type) \
                 DO UPDATE SET last_id = flow_item_sequences.last_id + 1 \
                 RETURNING last_id",
                &[&item_type.as_str()],
            )
            .await?
            .try_get(0)?;

        let title = request.title.trim();
        let doc_no = encode(item_type.ref_type(), entity_id);
        let status = item_type.spec().initial_status;
        tx.execute(
            "INSERT INTO flow_items (item_type, entity_id, doc_no, title, status) \
             VALUES ($1, $2, $3, $4, $5)",
            &[&item_type.as_str(), &entity_id, &doc_no, &title, &status],
        )
        .await?;

        let node_id = generate_ulid();
        let created = CreatedFlowItem {
            node_id: node_id.clone(),
            entity_id,
            node_type: item_type,
            doc_no,
            title: title.to_string(),
            status: status.to_string(),
            edge_id: generate_ulid(),
            edge_source: parent_node_id,
            edge_target: node_id,
        };
        insert_node(&tx, work_request_id, &created.node()).await?;
        tx.execute(
            "INSERT INTO flow_edges (id, work_request_id, source, target) \
             VALUES ($1, $2, $3, $4)",
            &[
                &created.edge_id,
                &work_request_id,
                &created.edge_source,
                &created.edge_target,
            ],
        )
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn get_flow_ui(&self, work_request_id: i64) -> Result<CanvasState, AppError> {
        let conn = self.connection().await?;
        let row = conn
            .query_opt(
                "SELECT version, positions, edges, custom_nodes \
                 FROM flow_ui WHERE work_request_id = $1",
                &[&work_request_id],
            )
            .await?;

        match row {
            Some(row) => row_to_canvas(&row),
            None => Ok(CanvasState::default()),
        }
    }

    async fn put_flow_ui(
        &self,
        work_request_id: i64,
        request: &SaveCanvasRequest,
    ) -> Result<SavedCanvas, AppError> {
        validate_save(request)?;
        let (positions, edges, custom_nodes) = layout_columns(&request.layout)?;
        let conn = self.connection().await?;

        // Compare-and-swap: the row only changes when the stored version is
        // the one the client saw. Version 0 means "no row yet".
        let saved = if request.expected_version == 0 {
            conn.query_opt(
                "INSERT INTO flow_ui \
                 (work_request_id, version, positions, edges, custom_nodes) \
                 VALUES ($1, 1, $2, $3, $4) \
                 ON CONFLICT (work_request_id) DO NOTHING \
                 RETURNING version",
                &[&work_request_id, &positions, &edges, &custom_nodes],
            )
            .await?
        } else {
            conn.query_opt(
                "UPDATE flow_ui \
                 SET version = version + 1, positions = $3, edges = $4, \
                     custom_nodes = $5, updated_at = NOW() \
                 WHERE work_request_id = $1 AND version = $2 \
                 RETURNING version",
                &[
                    &work_request_id,
                    &request.expected_version,
                    &positions,
                    &edges,
                    &custom_nodes,
                ],
            )
            .await?
        };

        if let Some(row) = saved {
            return Ok(SavedCanvas {
                version: row.try_get(0)?,
            });
        }

        let actual: i64 = conn
            .query_opt(
                "SELECT version FROM flow_ui WHERE work_request_id = $1",
                &[&work_request_id],
            )
            .await?
            .map(|row| row.try_get(0))
            .transpose()?
            .unwrap_or(0);
        Err(AppError::VersionConflict {
            expected: request.expected_version,
            actual: Some(actual),
        })
    }
}
