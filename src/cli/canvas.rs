//! Canvas layout commands.

use clap::Subcommand;
use color_eyre::Result;
use serde_json::json;

use crate::models::Position;
use crate::services::CanvasSession;

use super::chain::resolve_doc_no;
use super::{connect, print_json};

/// Canvas subcommands.
#[derive(Subcommand)]
pub enum CanvasCommand {
    /// Print the rendered canvas: nodes with resolved positions and edges
    Show {
        /// Work request ID
        work_request_id: i64,
    },

    /// Move a node and save the layout
    #[command(allow_negative_numbers = true)]
    Move {
        /// Work request ID
        work_request_id: i64,

        /// Node ID or document number
        node: String,

        x: f64,

        y: f64,
    },
}

impl CanvasCommand {
    /// Run the canvas subcommand.
    pub async fn run(&self) -> Result<()> {
        match self {
            CanvasCommand::Show { work_request_id } => show(*work_request_id).await,
            CanvasCommand::Move {
                work_request_id,
                node,
                x,
                y,
            } => move_node(*work_request_id, node, Position::new(*x, *y)).await,
        }
    }
}

async fn show(work_request_id: i64) -> Result<()> {
    let ctx = connect().await?;
    let session = CanvasSession::open(&ctx, work_request_id).await?;
    print_json(&json!({
        "version": session.saved().version,
        "nodes": session.rendered_nodes(),
        "edges": session.rendered_edges(),
    }))
}

async fn move_node(work_request_id: i64, node: &str, position: Position) -> Result<()> {
    let ctx = connect().await?;
    let mut session = CanvasSession::open(&ctx, work_request_id).await?;

    let node_id = match resolve_doc_no(session.chain(), node) {
        Ok(found) => found.id.clone(),
        Err(_) => node.to_string(),
    };

    session.drag_end(&node_id, position).await?;
    let version = session.flush().await?.unwrap_or(session.saved().version);
    print_json(&json!({ "nodeId": node_id, "version": version }))
}
