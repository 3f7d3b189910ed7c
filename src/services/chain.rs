//! Chain loading.

use tracing::info;

use crate::context::{AppBackend, Context};
use crate::di::FromRef;
use crate::error::AppError;
use crate::models::FlowChain;

/// Service for fetching the structural graph of a work request.
///
/// The backend is the source of truth for graph shape; the chain is
/// returned as-is without re-validating it.
#[derive(Clone)]
pub struct ChainService {
    backend: AppBackend,
}

impl FromRef<Context> for ChainService {
    fn from_ref(ctx: &Context) -> Self {
        Self::new(AppBackend::from_ref(ctx))
    }
}

impl ChainService {
    pub fn new(backend: AppBackend) -> Self {
        Self { backend }
    }

    /// Fetch the full chain rooted at a work request in one call.
    pub async fn load_chain(&self, work_request_id: i64) -> Result<FlowChain, AppError> {
        let chain = self.backend.get_flow_chain(work_request_id).await?;
        info!(
            work_request_id,
            nodes = chain.nodes.len(),
            edges = chain.edges.len(),
            "Loaded flow chain"
        );
        Ok(chain)
    }
}
