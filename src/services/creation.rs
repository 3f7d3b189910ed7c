//! Item creation protocol behind the "add item" dialog.
//!
//! # States
//!
//! ```text
//! Idle ──open──▶ Adding ──select_type──▶ TypeSelected ──submit──▶ Saving
//!  ▲                                                               │
//!  └──────────────── success (Committed) ◀─────────────────────────┤
//!                                        Failed ◀── error ─────────┘
//! ```
//!
//! `Failed` keeps the dialog open with the title and type preserved, so a
//! retry is one more `submit`. Validation failures never leave the client.
//!
//! Closing the dialog while `Saving` does not cancel the request. Every
//! `open` starts a new session; a result arriving for a session that is no
//! longer current is discarded instead of merged.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::context::AppBackend;
use crate::error::AppError;
use crate::models::{CreateFlowItemRequest, CreatedFlowItem, FlowNode, NodeType};

/// Message shown for a blank title.
pub const TITLE_REQUIRED: &str = "Title is required";

/// The node an item is being added under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub node_id: String,
    pub node_type: NodeType,
    pub entity_id: i64,
}

impl ParentRef {
    /// Reject parents that have no outgoing connection point.
    pub fn of(node: &FlowNode) -> Result<Self, AppError> {
        if !node.node_type.can_have_children() {
            return Err(AppError::InvalidParent {
                node_type: node.node_type.to_string(),
            });
        }
        Ok(Self {
            node_id: node.id.clone(),
            node_type: node.node_type,
            entity_id: node.entity_id,
        })
    }

    /// Build the backend request for a child of this parent.
    pub fn create_request(&self, item_type: NodeType, title: &str) -> CreateFlowItemRequest {
        CreateFlowItemRequest {
            parent_type: self.node_type,
            parent_id: self.entity_id,
            item_type,
            title: title.trim().to_string(),
        }
    }
}

/// Where the dialog is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalState {
    Idle,
    Adding,
    TypeSelected,
    Saving,
    Failed,
}

/// The dialog's user input.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalForm {
    pub parent: ParentRef,
    pub allowed_types: Vec<NodeType>,
    pub item_type: NodeType,
    pub title: String,
    /// Inline error, from validation or a failed save.
    pub error: Option<String>,
}

/// Outcome of [`AddItemModal::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Saved; the dialog is closed. Merge the item into the chain.
    Committed(CreatedFlowItem),
    /// Blocked locally; no request was sent.
    Invalid(String),
    /// The request failed; the dialog stays open for a retry.
    Failed(String),
    /// The dialog was closed or reopened while saving; the result was dropped.
    Discarded,
    /// Nothing to submit, or a save is already in flight.
    Ignored,
}

#[derive(Debug)]
struct ModalInner {
    phase: ModalState,
    form: Option<ModalForm>,
    /// Bumped on every open and close.
    session: u64,
}

/// "Add item" dialog controller for one chain.
#[derive(Clone)]
pub struct AddItemModal {
    backend: AppBackend,
    work_request_id: i64,
    inner: Arc<Mutex<ModalInner>>,
}

impl AddItemModal {
    pub fn new(backend: AppBackend, work_request_id: i64) -> Self {
        Self {
            backend,
            work_request_id,
            inner: Arc::new(Mutex::new(ModalInner {
                phase: ModalState::Idle,
                form: None,
                session: 0,
            })),
        }
    }

    pub fn phase(&self) -> ModalState {
        self.inner.lock().phase
    }

    pub fn form(&self) -> Option<ModalForm> {
        self.inner.lock().form.clone()
    }

    pub fn is_saving(&self) -> bool {
        self.phase() == ModalState::Saving
    }

    /// Open the dialog under `parent`. The first allowed type is preselected.
    pub fn open(&self, parent: &FlowNode) -> Result<(), AppError> {
        let parent = ParentRef::of(parent)?;
        let allowed_types = parent.node_type.allowed_child_types().to_vec();
        let item_type = *allowed_types
            .first()
            .ok_or_else(|| AppError::Internal(format!("{} has no child types", parent.node_type)))?;

        let mut inner = self.inner.lock();
        inner.session += 1;
        inner.phase = ModalState::Adding;
        inner.form = Some(ModalForm {
            parent,
            allowed_types,
            item_type,
            title: String::new(),
            error: None,
        });
        debug!(session = inner.session, "Opened add-item dialog");
        Ok(())
    }

    /// Close the dialog. An in-flight save keeps running; its result is dropped.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.session += 1;
        inner.phase = ModalState::Idle;
        inner.form = None;
    }

    /// Pick the item type. Must be one of the allowed types.
    pub fn select_type(&self, item_type: NodeType) -> Result<(), AppError> {
        let mut inner = self.inner.lock();
        if inner.phase == ModalState::Saving {
            return Ok(());
        }
        let form = inner
            .form
            .as_mut()
            .ok_or_else(|| AppError::Validation("Dialog is not open".to_string()))?;
        if !form.allowed_types.contains(&item_type) {
            return Err(AppError::Validation(format!(
                "{} cannot be added under {}",
                item_type, form.parent.node_type
            )));
        }
        form.item_type = item_type;
        inner.phase = ModalState::TypeSelected;
        Ok(())
    }

    /// Update the title buffer. Local only.
    pub fn set_title(&self, title: &str) {
        let mut inner = self.inner.lock();
        if inner.phase == ModalState::Saving {
            return;
        }
        if let Some(form) = inner.form.as_mut() {
            form.title = title.to_string();
        }
    }

    /// Validate and send the creation request.
    ///
    /// All failures are reported in the outcome and on the form; none
    /// propagate, since a failed add must not disturb the rendered chain.
    pub async fn submit(&self) -> SubmitOutcome {
        let (session, request) = {
            let mut inner = self.inner.lock();
            if matches!(inner.phase, ModalState::Idle | ModalState::Saving) {
                return SubmitOutcome::Ignored;
            }
            let session = inner.session;
            let Some(form) = inner.form.as_mut() else {
                return SubmitOutcome::Ignored;
            };

            if form.title.trim().is_empty() {
                form.error = Some(TITLE_REQUIRED.to_string());
                return SubmitOutcome::Invalid(TITLE_REQUIRED.to_string());
            }

            form.error = None;
            let request = form.parent.create_request(form.item_type, &form.title);
            inner.phase = ModalState::Saving;
            (session, request)
        };

        let result = self
            .backend
            .create_flow_item(self.work_request_id, &request)
            .await;

        let mut inner = self.inner.lock();
        if inner.session != session {
            debug!(session, "Dropping result for a closed add-item dialog");
            return SubmitOutcome::Discarded;
        }

        match result {
            Ok(created) => {
                info!(
                    work_request_id = self.work_request_id,
                    node_id = %created.node_id,
                    doc_no = %created.doc_no,
                    "Created flow item"
                );
                inner.session += 1;
                inner.phase = ModalState::Idle;
                inner.form = None;
                SubmitOutcome::Committed(created)
            }
            Err(err) => {
                let message = err.user_message();
                warn!(
                    work_request_id = self.work_request_id,
                    "Flow item creation failed: {}",
                    err
                );
                inner.phase = ModalState::Failed;
                if let Some(form) = inner.form.as_mut() {
                    form.error = Some(message.clone());
                }
                SubmitOutcome::Failed(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::GatedBackend;
    use crate::backend::{FlowBackend, MemoryBackend};

    async fn setup(backend: GatedBackend) -> (AddItemModal, FlowNode, GatedBackend) {
        let root = backend.inner.seed_work_request(51, "Login revamp");
        let modal = AddItemModal::new(Arc::new(backend.clone()), 51);
        (modal, root, backend)
    }

    #[tokio::test]
    async fn test_open_preselects_first_allowed_type() {
        let (modal, root, _) = setup(GatedBackend::new(MemoryBackend::new())).await;
        modal.open(&root).unwrap();

        assert_eq!(modal.phase(), ModalState::Adding);
        let form = modal.form().unwrap();
        assert_eq!(form.item_type, NodeType::TechTask);
        assert_eq!(
            form.allowed_types,
            vec![
                NodeType::TechTask,
                NodeType::TestScenario,
                NodeType::Deployment
            ]
        );
    }

    #[tokio::test]
    async fn test_open_on_leaf_parent_is_rejected() {
        let (modal, mut root, _) = setup(GatedBackend::new(MemoryBackend::new())).await;
        root.node_type = NodeType::TestScenario;
        assert!(matches!(
            modal.open(&root),
            Err(AppError::InvalidParent { .. })
        ));
        assert_eq!(modal.phase(), ModalState::Idle);
    }

    #[tokio::test]
    async fn test_select_type_outside_allowed_set() {
        let (modal, root, _) = setup(GatedBackend::new(MemoryBackend::new())).await;
        modal.open(&root).unwrap();
        assert!(modal.select_type(NodeType::Defect).is_err());
        modal.select_type(NodeType::Deployment).unwrap();
        assert_eq!(modal.phase(), ModalState::TypeSelected);
    }

    #[tokio::test]
    async fn test_blank_title_never_calls_backend() {
        let (modal, root, backend) = setup(GatedBackend::new(MemoryBackend::new())).await;
        modal.open(&root).unwrap();
        modal.set_title("   ");

        assert_eq!(
            modal.submit().await,
            SubmitOutcome::Invalid(TITLE_REQUIRED.to_string())
        );
        assert_eq!(backend.create_calls(), 0);
        assert_eq!(modal.phase(), ModalState::Adding);
        assert_eq!(modal.form().unwrap().error.as_deref(), Some(TITLE_REQUIRED));
    }

    #[tokio::test]
    async fn test_commit_closes_dialog() {
        let (modal, root, backend) = setup(GatedBackend::new(MemoryBackend::new())).await;
        modal.open(&root).unwrap();
        modal.select_type(NodeType::TestScenario).unwrap();
        modal.set_title("Login smoke test");

        let SubmitOutcome::Committed(created) = modal.submit().await else {
            panic!("expected commit");
        };
        assert_eq!(created.node_type, NodeType::TestScenario);
        assert_eq!(created.edge_source, root.id);
        assert_eq!(modal.phase(), ModalState::Idle);
        assert!(modal.form().is_none());

        let chain = backend.get_flow_chain(51).await.unwrap();
        assert_eq!(chain.nodes.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_preserves_input_for_retry() {
        let (modal, root, backend) = setup(GatedBackend::new(MemoryBackend::new())).await;
        backend.fail_next_create(AppError::Backend(String::new()));
        modal.open(&root).unwrap();
        modal.set_title("Refactor auth");

        assert_eq!(
            modal.submit().await,
            SubmitOutcome::Failed(crate::error::GENERIC_CREATE_FAILURE.to_string())
        );
        assert_eq!(modal.phase(), ModalState::Failed);
        let form = modal.form().unwrap();
        assert_eq!(form.title, "Refactor auth");
        assert!(form.error.is_some());

        assert!(matches!(
            modal.submit().await,
            SubmitOutcome::Committed(_)
        ));
        assert_eq!(backend.create_calls(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_submit_while_saving_is_ignored() {
        let (modal, root, backend) = setup(GatedBackend::gated(MemoryBackend::new())).await;
        modal.open(&root).unwrap();
        modal.set_title("Refactor auth");

        let first = tokio::spawn({
            let modal = modal.clone();
            async move { modal.submit().await }
        });
        while !modal.is_saving() {
            tokio::task::yield_now().await;
        }

        assert_eq!(modal.submit().await, SubmitOutcome::Ignored);
        backend.release();
        assert!(matches!(
            first.await.unwrap(),
            SubmitOutcome::Committed(_)
        ));
        assert_eq!(backend.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_close_during_save_discards_result() {
        let (modal, root, backend) = setup(GatedBackend::gated(MemoryBackend::new())).await;
        modal.open(&root).unwrap();
        modal.set_title("Refactor auth");

        let pending = tokio::spawn({
            let modal = modal.clone();
            async move { modal.submit().await }
        });
        while !modal.is_saving() {
            tokio::task::yield_now().await;
        }

        modal.close();
        backend.release();
        assert_eq!(pending.await.unwrap(), SubmitOutcome::Discarded);
        assert_eq!(modal.phase(), ModalState::Idle);

        // The request was not cancelled: the item exists server-side.
        let chain = backend.get_flow_chain(51).await.unwrap();
        assert_eq!(chain.nodes.len(), 2);
    }
}
