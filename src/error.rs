use crate::types::DocFailure;
use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum TenantryError {
    #[error("{} engine on index \"{index}\" already exists", upper_first(.plugin))]
    EngineAlreadyExists { plugin: String, index: String },

    #[error("{} engine on index \"{index}\" does not exist", upper_first(.plugin))]
    EngineNotFound { plugin: String, index: String },

    #[error("Cannot acquire lock \"{name}\": {reason}")]
    LockAcquisition { name: String, reason: String },

    #[error("Cannot convert documents of {index}/{collection}: {message}")]
    Conversion {
        index: String,
        collection: String,
        message: String,
    },

    #[error("Bulk write on {index}/{collection} failed for {} document(s)", .failures.len())]
    BulkWrite {
        index: String,
        collection: String,
        failures: Vec<DocFailure>,
    },

    #[error("Implementation error: {0}")]
    Implementation(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index already exists: {0}")]
    IndexAlreadyExists(String),

    #[error("Collection not found: {index}/{collection}")]
    CollectionNotFound { index: String, collection: String },

    #[error("Document not found: {index}/{collection}/{id}")]
    DocumentNotFound {
        index: String,
        collection: String,
        id: String,
    },

    #[error("Document already exists: {index}/{collection}/{id}")]
    DocumentConflict {
        index: String,
        collection: String,
        id: String,
    },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TenantryError>;

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl From<std::io::Error> for TenantryError {
    fn from(e: std::io::Error) -> Self {
        TenantryError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for TenantryError {
    fn from(e: serde_json::Error) -> Self {
        TenantryError::Json(e.to_string())
    }
}

impl TenantryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            TenantryError::EngineAlreadyExists { .. } => StatusCode::CONFLICT,
            TenantryError::EngineNotFound { .. } => StatusCode::NOT_FOUND,
            TenantryError::LockAcquisition { .. } => StatusCode::SERVICE_UNAVAILABLE,
            TenantryError::Conversion { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            TenantryError::BulkWrite { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            TenantryError::Implementation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TenantryError::IndexNotFound(_) => StatusCode::NOT_FOUND,
            TenantryError::IndexAlreadyExists(_) => StatusCode::CONFLICT,
            TenantryError::CollectionNotFound { .. } => StatusCode::NOT_FOUND,
            TenantryError::DocumentNotFound { .. } => StatusCode::NOT_FOUND,
            TenantryError::DocumentConflict { .. } => StatusCode::CONFLICT,
            TenantryError::InvalidDocument(_) => StatusCode::BAD_REQUEST,
            TenantryError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TenantryError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TenantryError::Json(_) => StatusCode::BAD_REQUEST,
            TenantryError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable identifier for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            TenantryError::EngineAlreadyExists { .. } => "engine_already_exists",
            TenantryError::EngineNotFound { .. } => "engine_not_found",
            TenantryError::LockAcquisition { .. } => "lock_acquisition_failure",
            TenantryError::Conversion { .. } => "conversion_failure",
            TenantryError::BulkWrite { .. } => "bulk_write_failure",
            TenantryError::Implementation(_) => "implementation_error",
            TenantryError::IndexNotFound(_) => "index_not_found",
            TenantryError::IndexAlreadyExists(_) => "index_already_exists",
            TenantryError::CollectionNotFound { .. } => "collection_not_found",
            TenantryError::DocumentNotFound { .. } => "document_not_found",
            TenantryError::DocumentConflict { .. } => "document_conflict",
            TenantryError::InvalidDocument(_) => "invalid_document",
            TenantryError::Store(_) => "store_error",
            TenantryError::Io(_) => "io_error",
            TenantryError::Json(_) => "json_error",
            TenantryError::Config(_) => "config_error",
        }
    }
}

// Axum IntoResponse implementation (feature-gated)
#[cfg(feature = "axum-support")]
use axum::response::{IntoResponse, Json, Response};
#[cfg(feature = "axum-support")]
use serde::Serialize;

#[cfg(feature = "axum-support")]
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failures: Option<Vec<DocFailure>>,
}

#[cfg(feature = "axum-support")]
impl IntoResponse for TenantryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let failures = match &self {
            TenantryError::BulkWrite { failures, .. } => Some(failures.clone()),
            _ => None,
        };

        if status.is_server_error() {
            tracing::error!("[HTTP] {} ({})", self, self.code());
        }

        let error_response = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
            request_id: format!("req_tn_{}", uuid::Uuid::new_v4()),
            failures,
        };

        let mut response = (status, Json(error_response)).into_response();
        if matches!(&self, TenantryError::LockAcquisition { .. }) {
            response
                .headers_mut()
                .insert("Retry-After", http::HeaderValue::from_static("1"));
        }
        response
    }
}
