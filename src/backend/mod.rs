//! Backend implementations for chain and canvas storage.
//!
//! Every backend implements [`FlowBackend`]:
//!
//! | Backend | Module | Role |
//! |---------|--------|------|
//! | Portal REST API | [`http`] | Client of a remote authority |
//! | PostgreSQL | [`postgres`] | Authority backed by a database |
//! | In-process | [`memory`] | Authority held in memory |
//!
//! The two authorities enforce the same rules: creation is atomic and a
//! canvas save is a compare-and-swap on the document version.

pub mod http;
pub mod memory;
pub mod postgres;
mod traits;

pub use http::HttpBackend;
pub use memory::MemoryBackend;
pub use postgres::PostgresBackend;
pub use traits::FlowBackend;

use crate::error::AppError;
use crate::models::{CreateFlowItemRequest, FlowChain, FlowNode, SaveCanvasRequest};

/// Check a creation request against the chain it targets.
///
/// Shared by the authorities so both reject the same inputs. Returns the
/// parent node on success.
pub(crate) fn validate_create<'a>(
    chain: &'a FlowChain,
    request: &CreateFlowItemRequest,
) -> Result<&'a FlowNode, AppError> {
    if request.title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if !request.parent_type.can_have_children() {
        return Err(AppError::InvalidParent {
            node_type: request.parent_type.to_string(),
        });
    }
    if !request
        .parent_type
        .allowed_child_types()
        .contains(&request.item_type)
    {
        return Err(AppError::Validation(format!(
            "{} cannot be created under {}",
            request.item_type, request.parent_type
        )));
    }

    chain
        .node_for_entity(request.parent_type, request.parent_id)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "{} {} is not part of this chain",
                request.parent_type, request.parent_id
            ))
        })
}

/// Check a canvas document before it replaces the stored one.
pub(crate) fn validate_save(request: &SaveCanvasRequest) -> Result<(), AppError> {
    if request.expected_version < 0 {
        return Err(AppError::Validation(
            "expectedVersion must not be negative".to_string(),
        ));
    }
    if let Some(node) = request
        .layout
        .custom_nodes
        .iter()
        .find(|n| !n.node_type.is_annotation())
    {
        return Err(AppError::Validation(format!(
            "Custom node {} has structural type {}",
            node.id, node.node_type
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Backend wrappers for exercising in-flight and failure behaviour.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use super::{FlowBackend, MemoryBackend};
    use crate::error::AppError;
    use crate::models::{
        CanvasState, CreateFlowItemRequest, CreatedFlowItem, FlowChain, SaveCanvasRequest,
        SavedCanvas,
    };

    /// Wraps a [`MemoryBackend`], counting creation calls.
    ///
    /// When gated, each creation waits for a permit released through
    /// [`GatedBackend::release`], which keeps a request in flight for as long
    /// as a test needs. A scripted failure replaces the next creation result.
    #[derive(Clone)]
    pub(crate) struct GatedBackend {
        pub inner: MemoryBackend,
        creates: Arc<AtomicUsize>,
        gate: Option<Arc<Semaphore>>,
        failure: Arc<parking_lot::Mutex<Option<AppError>>>,
    }

    impl GatedBackend {
        pub fn new(inner: MemoryBackend) -> Self {
            Self {
                inner,
                creates: Arc::new(AtomicUsize::new(0)),
                gate: None,
                failure: Arc::new(parking_lot::Mutex::new(None)),
            }
        }

        pub fn gated(inner: MemoryBackend) -> Self {
            Self {
                gate: Some(Arc::new(Semaphore::new(0))),
                ..Self::new(inner)
            }
        }

        pub fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(1);
            }
        }

        pub fn fail_next_create(&self, err: AppError) {
            *self.failure.lock() = Some(err);
        }

        pub fn create_calls(&self) -> usize {
            self.creates.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FlowBackend for GatedBackend {
        async fn get_flow_chain(&self, work_request_id: i64) -> Result<FlowChain, AppError> {
            self.inner.get_flow_chain(work_request_id).await
        }

        async fn create_flow_item(
            &self,
            work_request_id: i64,
            request: &CreateFlowItemRequest,
        ) -> Result<CreatedFlowItem, AppError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                let permit = gate
                    .acquire()
                    .await
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                permit.forget();
            }
            let scripted = self.failure.lock().take();
            if let Some(err) = scripted {
                return Err(err);
            }
            self.inner.create_flow_item(work_request_id, request).await
        }

        async fn get_flow_ui(&self, work_request_id: i64) -> Result<CanvasState, AppError> {
            self.inner.get_flow_ui(work_request_id).await
        }

        async fn put_flow_ui(
            &self,
            work_request_id: i64,
            request: &SaveCanvasRequest,
        ) -> Result<SavedCanvas, AppError> {
            self.inner.put_flow_ui(work_request_id, request).await
        }
    }
}
