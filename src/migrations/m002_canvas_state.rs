//! Canvas documents, one per root work request.

pub(super) const SQL: &str = r#"
CREATE TABLE IF NOT EXISTS flow_ui (
    work_request_id BIGINT PRIMARY KEY,
    version BIGINT NOT NULL CHECK (version > 0),
    positions JSONB NOT NULL DEFAULT '{}'::jsonb,
    edges JSONB NOT NULL DEFAULT '[]'::jsonb,
    custom_nodes JSONB NOT NULL DEFAULT '[]'::jsonb,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;
