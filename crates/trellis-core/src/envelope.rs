//! Wire-level problem envelope and the error → envelope mapper.
//!
//! The envelope is the only externally observable failure shape. Mapping is a
//! pure function over the closed [`ErrorKind`] set with a fixed status table:
//!
//! | kind | status |
//! |---|---|
//! | `Validation` | 400 |
//! | `Unauthorized` | 401 |
//! | `Forbidden` | 403 |
//! | `NotFound` | 404 |
//! | `Conflict` | 409 |
//! | `Unexpected` | 500 |
//!
//! The match is exhaustive, so adding a kind without updating the table is a
//! compile error.

use crate::error::{AppError, ErrorKind};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

impl ErrorKind {
    /// Returns the fixed HTTP status for this kind.
    #[must_use]
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the envelope title for this kind.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Validation => "One or more validation errors occurred",
            Self::Unauthorized => "Authentication is required",
            Self::Forbidden => "Access is denied",
            Self::NotFound => "The specified resource was not found",
            Self::Conflict => "A conflict occurred",
            Self::Unexpected => "An unexpected error occurred",
        }
    }
}

/// Serializable problem envelope rendered to callers on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemEnvelope {
    /// HTTP status classification.
    pub status: u16,
    /// Short, kind-level summary.
    pub title: String,
    /// Machine-readable error code for client-side branching.
    pub code: String,
    /// Human-readable detail.
    pub detail: String,
    /// Field-level validation messages; present only for validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<HashMap<String, Vec<String>>>,
}

impl AppError {
    /// Renders this error as the wire-level problem envelope.
    #[must_use]
    pub fn to_envelope(&self) -> ProblemEnvelope {
        let kind = self.kind();
        let fields = match kind {
            ErrorKind::Validation if !self.details().is_empty() => {
                Some(self.details().as_map().clone())
            }
            _ => None,
        };
        ProblemEnvelope {
            status: kind.status_code().as_u16(),
            title: kind.title().to_string(),
            code: self.code().to_string(),
            detail: self.message().to_string(),
            fields,
        }
    }
}
