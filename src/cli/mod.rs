//! CLI module for Flowchain.
//!
//! Subcommands:
//! - `init`: Create the PostgreSQL schema
//! - `chain`: Print the chain rooted at a work request
//! - `add`: Create an item under a chain node
//! - `canvas`: Inspect or edit the canvas layout
//! - `ref`: Encode and decode document numbers
//!
//! Every command prints JSON on stdout; logs go to stderr.

mod canvas;
mod chain;
mod init;
mod reference;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::config::Config;
use crate::context::Context;
use crate::models::NodeType;

pub use canvas::CanvasCommand;
pub use reference::RefCommand;

/// Flowchain - work-item relationship graph
#[derive(Parser)]
#[command(name = "flowchain")]
#[command(about = "Work-item relationship graph with a collaborative canvas")]
#[command(version)]
pub struct App {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize the PostgreSQL schema
    Init,

    /// Print the chain rooted at a work request
    Chain {
        /// Work request ID
        work_request_id: i64,
    },

    /// Create an item under a node of the chain
    Add {
        /// Work request ID
        work_request_id: i64,

        /// Document number of the parent, e.g. WR-051
        #[arg(long)]
        parent: String,

        /// Item type: TECH_TASK, TEST_SCENARIO or DEPLOYMENT
        #[arg(long = "type")]
        item_type: NodeType,

        /// Item title
        #[arg(long)]
        title: String,
    },

    /// Canvas layout commands
    Canvas {
        #[command(subcommand)]
        command: CanvasCommand,
    },

    /// Document number commands
    Ref {
        #[command(subcommand)]
        command: RefCommand,
    },
}

impl App {
    /// Run the CLI application.
    pub async fn run(self) -> color_eyre::Result<()> {
        match &self.command {
            Command::Init => self.run_init().await,
            Command::Chain { work_request_id } => self.run_chain(*work_request_id).await,
            Command::Add {
                work_request_id,
                parent,
                item_type,
                title,
            } => {
                self.run_add(*work_request_id, parent, *item_type, title)
                    .await
            }
            Command::Canvas { command } => command.run().await,
            Command::Ref { command } => command.run(),
        }
    }
}

/// Load configuration and connect the configured backend.
async fn connect() -> color_eyre::Result<Context> {
    let config = Config::load()?;
    Ok(Context::from_config(config).await?)
}

fn print_json<T: Serialize>(value: &T) -> color_eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
