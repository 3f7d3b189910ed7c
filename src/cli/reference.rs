//! Document number commands.

use clap::Subcommand;
use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::reference::{self, RefType};

use super::print_json;

/// Document number subcommands.
#[derive(Subcommand)]
pub enum RefCommand {
    /// Decode a document number such as WR-051
    Decode { doc_no: String },

    /// Encode a reference type and id as a document number
    Encode {
        /// Reference type, e.g. WORK_REQUEST
        ref_type: RefType,
        id: i64,
    },
}

impl RefCommand {
    /// Run the ref subcommand.
    pub fn run(&self) -> Result<()> {
        match self {
            RefCommand::Decode { doc_no } => {
                let decoded = reference::decode(doc_no)
                    .ok_or_else(|| eyre!("Not a document number: {}", doc_no))?;
                print_json(&decoded)
            }
            RefCommand::Encode { ref_type, id } => {
                println!("{}", reference::encode(*ref_type, *id));
                Ok(())
            }
        }
    }
}
