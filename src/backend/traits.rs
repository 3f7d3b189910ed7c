//! The backend contract consumed by the graph subsystem.
//!
//! Each method corresponds to one endpoint of the portal's REST API:
//!
//! | Method | Endpoint |
//! |--------|----------|
//! | [`get_flow_chain`](FlowBackend::get_flow_chain) | `GET /work-requests/{id}/flow-chain` |
//! | [`create_flow_item`](FlowBackend::create_flow_item) | `POST /work-requests/{id}/flow-items` |
//! | [`get_flow_ui`](FlowBackend::get_flow_ui) | `GET /work-requests/{id}/flow-ui` |
//! | [`put_flow_ui`](FlowBackend::put_flow_ui) | `PUT /work-requests/{id}/flow-ui` |

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{
    CanvasState, CreateFlowItemRequest, CreatedFlowItem, FlowChain, SaveCanvasRequest,
    SavedCanvas,
};

/// Storage and transport for chains and canvas documents.
#[async_trait]
pub trait FlowBackend: Send + Sync {
    /// Fetch the structural graph rooted at a work request.
    async fn get_flow_chain(&self, work_request_id: i64) -> Result<FlowChain, AppError>;

    /// Create the backing business entity and splice it into the chain.
    ///
    /// Entity creation and the new node/edge are one atomic unit: either all
    /// three exist afterwards or none do.
    async fn create_flow_item(
        &self,
        work_request_id: i64,
        request: &CreateFlowItemRequest,
    ) -> Result<CreatedFlowItem, AppError>;

    /// Fetch the canvas document, or the version-0 baseline if none was saved.
    async fn get_flow_ui(&self, work_request_id: i64) -> Result<CanvasState, AppError>;

    /// Replace the canvas document if `expected_version` matches.
    ///
    /// Returns [`AppError::VersionConflict`] without touching stored state
    /// when the versions differ.
    async fn put_flow_ui(
        &self,
        work_request_id: i64,
        request: &SaveCanvasRequest,
    ) -> Result<SavedCanvas, AppError>;
}
