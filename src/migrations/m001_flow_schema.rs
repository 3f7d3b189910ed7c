//! Chain schema: item sequences, items, nodes and edges.

pub(super) const SQL: &str = r#"
CREATE TABLE IF NOT EXISTS flow_item_sequences (
    item_type TEXT PRIMARY KEY,
    last_id BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS flow_items (
    item_type TEXT NOT NULL,
    entity_id BIGINT NOT NULL,
    doc_no TEXT NOT NULL,
    title TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (item_type, entity_id)
);

CREATE TABLE IF NOT EXISTS flow_nodes (
    id TEXT PRIMARY KEY,
    work_request_id BIGINT NOT NULL,
    entity_id BIGINT NOT NULL,
    node_type TEXT NOT NULL,
    doc_no TEXT NOT NULL,
    title TEXT NOT NULL,
    status TEXT NOT NULL,
    priority TEXT,
    assignee_name TEXT,
    version TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS flow_nodes_work_request_idx
ON flow_nodes (work_request_id);

-- One root per chain
CREATE UNIQUE INDEX IF NOT EXISTS flow_nodes_root_idx
ON flow_nodes (work_request_id) WHERE node_type = 'WORK_REQUEST';

CREATE TABLE IF NOT EXISTS flow_edges (
    id TEXT PRIMARY KEY,
    work_request_id BIGINT NOT NULL,
    source TEXT NOT NULL REFERENCES flow_nodes (id),
    target TEXT NOT NULL REFERENCES flow_nodes (id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS flow_edges_work_request_idx
ON flow_edges (work_request_id);
"#;
