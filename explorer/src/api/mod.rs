//! HTTP API: pull-based summary routes and the websocket endpoint

pub mod routes;
pub mod server;

pub use server::ApiServer;
