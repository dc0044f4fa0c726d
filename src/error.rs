use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    // Lex/parse errors
    #[error("Syntax error: {0}")]
    SyntaxError(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Unterminated text: {0}")]
    UnterminatedText(String),

    // Evaluation errors
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Unsupported type for literal parsing: {0}")]
    UnsupportedLiteralType(String),

    #[error("Invalid literal: {0}")]
    InvalidLiteral(String),

    // Storage errors
    #[error("Container '{0}' not found")]
    ContainerNotFound(String),

    #[error("Snapshot '{0}' not found")]
    SnapshotNotFound(String),

    #[error("Document with id '{0}' not found")]
    DocumentNotFound(String),

    #[error("Blob '{0}' not found")]
    BlobNotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Container '{0}' holds a different row type")]
    ContainerTypeMismatch(String),

    #[error("Invalid partition key: {0}")]
    InvalidPartitionKey(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Coarse grouping of [`DbError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Tokenizer and parser failures; no query model was produced.
    Parse,
    /// Failures binding or evaluating a parsed query against a row type.
    Evaluation,
    /// Lookups and mutations on containers, snapshots and blobs.
    Storage,
    Internal,
}

impl DbError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DbError::SyntaxError(_)
            | DbError::StateError(_)
            | DbError::NotSupported(_)
            | DbError::UnterminatedText(_) => ErrorCategory::Parse,
            DbError::UnknownColumn(_)
            | DbError::UnsupportedLiteralType(_)
            | DbError::InvalidLiteral(_) => ErrorCategory::Evaluation,
            DbError::ContainerNotFound(_)
            | DbError::SnapshotNotFound(_)
            | DbError::DocumentNotFound(_)
            | DbError::BlobNotFound(_)
            | DbError::Conflict(_)
            | DbError::ContainerTypeMismatch(_)
            | DbError::InvalidPartitionKey(_)
            | DbError::InvalidDocument(_)
            | DbError::Cancelled => ErrorCategory::Storage,
            DbError::JsonError(_) | DbError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DbError::ContainerNotFound(_)
                | DbError::SnapshotNotFound(_)
                | DbError::DocumentNotFound(_)
                | DbError::BlobNotFound(_)
        )
    }

    /// The message without the category prefix added by `Display`.
    pub fn message(&self) -> String {
        match self {
            DbError::SyntaxError(msg)
            | DbError::StateError(msg)
            | DbError::NotSupported(msg)
            | DbError::UnterminatedText(msg)
            | DbError::UnknownColumn(msg)
            | DbError::UnsupportedLiteralType(msg)
            | DbError::InvalidLiteral(msg)
            | DbError::Conflict(msg)
            | DbError::InvalidPartitionKey(msg)
            | DbError::InvalidDocument(msg) => msg.clone(),
            _ => self.to_string(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            DbError::SyntaxError(_) => "SyntaxError",
            DbError::StateError(_) => "StateError",
            DbError::NotSupported(_) => "NotSupported",
            DbError::UnterminatedText(_) => "UnterminatedText",
            DbError::UnknownColumn(_) => "UnknownColumn",
            DbError::UnsupportedLiteralType(_) => "UnsupportedLiteralType",
            DbError::InvalidLiteral(_) => "InvalidLiteral",
            DbError::ContainerNotFound(_) => "ContainerNotFound",
            DbError::SnapshotNotFound(_) => "SnapshotNotFound",
            DbError::DocumentNotFound(_) => "DocumentNotFound",
            DbError::BlobNotFound(_) => "BlobNotFound",
            DbError::Conflict(_) => "Conflict",
            DbError::ContainerTypeMismatch(_) => "ContainerTypeMismatch",
            DbError::InvalidPartitionKey(_) => "InvalidPartitionKey",
            DbError::InvalidDocument(_) => "InvalidDocument",
            DbError::Cancelled => "Cancelled",
            DbError::JsonError(_) => "JsonError",
            DbError::InternalError(_) => "InternalError",
        }
    }
}

impl serde::Serialize for DbError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl IntoResponse for DbError {
    fn into_response(self) -> Response {
        let status = match &self {
            DbError::ContainerNotFound(_)
            | DbError::SnapshotNotFound(_)
            | DbError::DocumentNotFound(_)
            | DbError::BlobNotFound(_) => StatusCode::NOT_FOUND,
            DbError::Conflict(_) | DbError::ContainerTypeMismatch(_) => StatusCode::CONFLICT,
            DbError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            DbError::JsonError(_) | DbError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        };

        let body = serde_json::json!({
            "error": self.message(),
            "code": status.as_u16(),
            "type": self.type_name(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DbError::ContainerNotFound("teams".to_string());
        assert_eq!(err.to_string(), "Container 'teams' not found");

        let err = DbError::SnapshotNotFound("baseline".to_string());
        assert_eq!(err.to_string(), "Snapshot 'baseline' not found");

        let err = DbError::DocumentNotFound("doc123".to_string());
        assert_eq!(err.to_string(), "Document with id 'doc123' not found");

        let err = DbError::SyntaxError("no table".to_string());
        assert_eq!(err.to_string(), "Syntax error: no table");

        let err = DbError::UnsupportedLiteralType("Json".to_string());
        assert_eq!(
            err.to_string(),
            "Unsupported type for literal parsing: Json"
        );

        let err = DbError::Cancelled;
        assert_eq!(err.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            DbError::StateError("x".into()).category(),
            ErrorCategory::Parse
        );
        assert_eq!(
            DbError::UnterminatedText("x".into()).category(),
            ErrorCategory::Parse
        );
        assert_eq!(
            DbError::UnknownColumn("x".into()).category(),
            ErrorCategory::Evaluation
        );
        assert_eq!(
            DbError::SnapshotNotFound("x".into()).category(),
            ErrorCategory::Storage
        );
    }

    #[test]
    fn test_not_found() {
        assert!(DbError::ContainerNotFound("c".into()).is_not_found());
        assert!(DbError::BlobNotFound("a/b".into()).is_not_found());
        assert!(!DbError::Conflict("dup".into()).is_not_found());
    }

    #[test]
    fn test_message_strips_prefix() {
        let err = DbError::NotSupported("ArrayDelimiter token ','".to_string());
        assert_eq!(err.message(), "ArrayDelimiter token ','");
    }

    #[test]
    fn test_into_response_status() {
        let resp = DbError::DocumentNotFound("x".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = DbError::SyntaxError("x".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = DbError::Conflict("x".into()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
