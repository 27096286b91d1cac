//! Error types for the explorer

use thiserror::Error;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Error, Debug)]
pub enum ExplorerError {
    /// The event hub has been stopped and accepts no more requests.
    #[error("Event hub closed")]
    HubClosed,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template {name} failed to load: {source}")]
    Template {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ExplorerError>;

impl From<toml::de::Error> for ExplorerError {
    fn from(err: toml::de::Error) -> Self {
        ExplorerError::Config(err.to_string())
    }
}

impl From<axum::Error> for ExplorerError {
    fn from(err: axum::Error) -> Self {
        ExplorerError::Transport(err.to_string())
    }
}

impl IntoResponse for ExplorerError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ExplorerError::HubClosed => (StatusCode::SERVICE_UNAVAILABLE, "Hub closed"),
            ExplorerError::Transport(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Transport error"),
            ExplorerError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error"),
            ExplorerError::Template { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "Template error"),
            ExplorerError::Serialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Serialization error"),
            ExplorerError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO error"),
            ExplorerError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
            ExplorerError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "Invalid input"),
            ExplorerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
        };

        let body = Json(json!({
            "error": error_message,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_closed_maps_to_service_unavailable() {
        let response = ExplorerError::HubClosed.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = ExplorerError::NotFound("block".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_toml_error_becomes_config_error() {
        let err = toml::from_str::<toml::Value>("[server").unwrap_err();
        let converted: ExplorerError = err.into();
        assert!(matches!(converted, ExplorerError::Config(_)));
    }
}
