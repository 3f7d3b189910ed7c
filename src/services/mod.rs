//! Client-side services for chains and canvases.
//!
//! Services hold an [`AppBackend`](crate::context::AppBackend) and are
//! resolved from the [`Context`](crate::context::Context) through `FromRef`.
//! Local UI state (dialog, drafts, pending layout edits) lives behind short
//! synchronous locks; the only suspension points are backend calls.

mod canvas;
mod chain;
mod creation;
mod draft;
mod session;

pub use canvas::CanvasStore;
pub use chain::ChainService;
pub use creation::{AddItemModal, ModalForm, ModalState, ParentRef, SubmitOutcome, TITLE_REQUIRED};
pub use draft::{CommittedDraft, DraftCommitOutcome, DraftController, DraftNode};
pub use session::{positions_by_id, CanvasSession, LayoutEdit, NodeOrigin, RenderedNode};
