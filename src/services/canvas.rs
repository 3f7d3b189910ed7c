//! Canvas state store: versioned read-modify-write of the layout document.
//!
//! The store remembers the version it last observed for every work request
//! and sends it as `expectedVersion` on the next save. A rejected save is
//! reported as [`AppError::VersionConflict`] and never retried with the same
//! version; [`CanvasStore::reload_and_reapply`] is the recovery path.
//!
//! Saves and loads for one work request are strictly sequential: each holds
//! a per-work-request async lock across its backend call, so two writes
//! from this client never race on the same expected version. Different
//! work requests never contend.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::context::{AppBackend, Context};
use crate::di::FromRef;
use crate::error::AppError;
use crate::models::{CanvasLayout, CanvasState, SaveCanvasRequest};

/// Client-side handle on canvas documents.
///
/// Clones share the version cache and the save locks.
#[derive(Clone)]
pub struct CanvasStore {
    backend: AppBackend,
    versions: Arc<Mutex<HashMap<i64, i64>>>,
    locks: Arc<Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>>,
}

impl FromRef<Context> for CanvasStore {
    fn from_ref(ctx: &Context) -> Self {
        Self::new(AppBackend::from_ref(ctx))
    }
}

impl CanvasStore {
    pub fn new(backend: AppBackend) -> Self {
        Self {
            backend,
            versions: Arc::new(Mutex::new(HashMap::new())),
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The version this client last observed, if it has loaded or saved.
    pub fn cached_version(&self, work_request_id: i64) -> Option<i64> {
        self.versions.lock().get(&work_request_id).copied()
    }

    fn lock_for(&self, work_request_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(work_request_id)
            .or_default()
            .clone()
    }

    /// Fetch the current document and remember its version.
    pub async fn load(&self, work_request_id: i64) -> Result<CanvasState, AppError> {
        let lock = self.lock_for(work_request_id);
        let _guard = lock.lock().await;
        self.load_locked(work_request_id).await
    }

    async fn load_locked(&self, work_request_id: i64) -> Result<CanvasState, AppError> {
        let state = self.backend.get_flow_ui(work_request_id).await?;
        self.versions.lock().insert(work_request_id, state.version);
        info!(
            work_request_id,
            version = state.version,
            positions = state.positions.len(),
            custom_nodes = state.custom_nodes.len(),
            "Loaded canvas state"
        );
        Ok(state)
    }

    /// Replace the document, expecting the last observed version.
    ///
    /// A work request this client has never loaded is saved against the
    /// baseline version 0. Returns the new version.
    pub async fn save(&self, work_request_id: i64, layout: CanvasLayout) -> Result<i64, AppError> {
        let lock = self.lock_for(work_request_id);
        let _guard = lock.lock().await;
        self.save_locked(work_request_id, layout).await
    }

    async fn save_locked(
        &self,
        work_request_id: i64,
        layout: CanvasLayout,
    ) -> Result<i64, AppError> {
        let expected_version = self.cached_version(work_request_id).unwrap_or(0);
        let request = SaveCanvasRequest {
            expected_version,
            layout,
        };

        match self.backend.put_flow_ui(work_request_id, &request).await {
            Ok(saved) => {
                self.versions.lock().insert(work_request_id, saved.version);
                debug!(
                    work_request_id,
                    expected_version,
                    version = saved.version,
                    "Saved canvas state"
                );
                Ok(saved.version)
            }
            Err(err) => {
                if err.is_version_conflict() {
                    warn!(work_request_id, expected_version, "Canvas save rejected: {}", err);
                }
                Err(err)
            }
        }
    }

    /// Recover from a conflict: reload the authoritative document, re-apply
    /// the caller's pending edits on top of it, and save once.
    ///
    /// `edit` receives the fresh document and returns the layout to write.
    /// Returns the document as saved. A second conflict is returned to the
    /// caller rather than retried.
    pub async fn reload_and_reapply<F>(
        &self,
        work_request_id: i64,
        edit: F,
    ) -> Result<CanvasState, AppError>
    where
        F: FnOnce(&CanvasState) -> CanvasLayout + Send,
    {
        let lock = self.lock_for(work_request_id);
        let _guard = lock.lock().await;

        let fresh = self.load_locked(work_request_id).await?;
        let layout = edit(&fresh);
        let version = self.save_locked(work_request_id, layout.clone()).await?;
        info!(
            work_request_id,
            from = fresh.version,
            to = version,
            "Re-applied pending canvas edits"
        );
        Ok(CanvasState::from_layout(version, layout))
    }
}
