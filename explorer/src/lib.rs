//! Block explorer live-update backend
//!
//! This crate holds the latest chain and mempool summaries for the explorer
//! pages and pushes change notifications to connected websocket clients.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod indexer;
pub mod models;
pub mod services;
pub mod store;
pub mod templates;
pub mod websocket;

pub use error::{ExplorerError, Result};
pub use services::LiveServices;
pub use store::SharedStateStore;
pub use websocket::{EventHub, EventKind, UpdateEnvelope};
