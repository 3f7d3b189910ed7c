//! Flowchain - work-item relationship graph with a collaborative canvas.
//!
//! Loads the chain of items rooted at a work request, creates linked items
//! under it, and keeps a per-chain layout document under optimistic
//! concurrency.

pub mod backend;
pub mod cli;
pub mod config;
pub mod context;
pub mod di;
pub mod error;
pub mod migrations;
pub mod models;
pub mod reference;
pub mod services;

pub use di::FromRef;
