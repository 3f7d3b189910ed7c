//! Chain and item creation command handlers.

use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::di::FromRef;
use crate::models::{FlowChain, FlowNode, NodeType};
use crate::reference;
use crate::services::{AddItemModal, ChainService, SubmitOutcome};

use super::{connect, print_json, App};

impl App {
    /// Print the chain rooted at a work request.
    pub async fn run_chain(&self, work_request_id: i64) -> Result<()> {
        let ctx = connect().await?;
        let chain = ChainService::from_ref(&ctx)
            .load_chain(work_request_id)
            .await?;
        print_json(&chain)
    }

    /// Create one item under the node with document number `parent`.
    pub async fn run_add(
        &self,
        work_request_id: i64,
        parent: &str,
        item_type: NodeType,
        title: &str,
    ) -> Result<()> {
        let ctx = connect().await?;
        let chain = ChainService::from_ref(&ctx)
            .load_chain(work_request_id)
            .await?;
        let parent = resolve_doc_no(&chain, parent)?;

        let modal = AddItemModal::new(ctx.backend.clone(), work_request_id);
        modal.open(parent)?;
        modal.select_type(item_type)?;
        modal.set_title(title);

        match modal.submit().await {
            SubmitOutcome::Committed(created) => print_json(&created),
            SubmitOutcome::Invalid(message) | SubmitOutcome::Failed(message) => {
                Err(eyre!(message))
            }
            SubmitOutcome::Discarded | SubmitOutcome::Ignored => {
                Err(eyre!("Item was not created"))
            }
        }
    }
}

/// Find the chain node a document number points at.
pub(super) fn resolve_doc_no<'a>(chain: &'a FlowChain, doc_no: &str) -> Result<&'a FlowNode> {
    let decoded =
        reference::decode(doc_no).ok_or_else(|| eyre!("Not a document number: {}", doc_no))?;
    let node_type = decoded
        .ref_type
        .node_type()
        .ok_or_else(|| eyre!("{} items are not part of a chain", decoded.ref_type))?;
    chain
        .node_for_entity(node_type, decoded.ref_id)
        .ok_or_else(|| eyre!("{} is not part of this chain", doc_no))
}
