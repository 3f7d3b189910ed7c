//! Domain models for the work-item relationship graph.

mod canvas;
mod flow;
mod item;
mod node_type;

pub use canvas::{CanvasLayout, CanvasState, SaveCanvasRequest, SavedCanvas};
pub use flow::{
    default_positions, FlowChain, FlowEdge, FlowNode, Position, COLUMN_WIDTH, ROW_HEIGHT,
};
pub use item::{CreateFlowItemRequest, CreatedFlowItem};
pub use node_type::{route_for, NodeType, NodeTypeSpec};

/// Generate a new ULID string.
pub fn generate_ulid() -> String {
    ulid::Ulid::new().to_string()
}
