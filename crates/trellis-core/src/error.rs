//! Tagged error and result model.
//!
//! Every stage and every business handler in Trellis speaks the same failure
//! vocabulary: [`AppResult<T>`], which is either `Ok(T)` or an [`AppError`]
//! carrying exactly one [`ErrorKind`]. Errors are built only through the
//! per-kind constructors so the `kind`/`code` pairing stays consistent; there
//! is no way to assemble an error whose kind contradicts its payload.
//!
//! # Invariants
//!
//! - The kind taxonomy is closed: six kinds, no open-ended "other".
//! - `details` may be non-empty only for [`ErrorKind::Validation`]; all other
//!   constructors leave it empty.
//! - Errors are constructed once and passed up the chain unchanged; stages
//!   never mutate or retry them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias using [`AppError`].
pub type AppResult<T> = Result<T, AppError>;

/// Machine-readable code attached to cancellation failures.
///
/// Cancellation is not a dedicated kind; it surfaces as
/// [`ErrorKind::Unexpected`] with this code so callers can still branch on it.
pub const CANCELLED_CODE: &str = "operation.cancelled";

/// The closed set of failure classifications.
///
/// Adding a variant here is deliberately noisy: the envelope mapper matches
/// exhaustively, so every new kind forces a status-table update at compile
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Structural or semantic request validation failed.
    Validation,
    /// The requested resource does not exist.
    NotFound,
    /// The operation conflicts with current state (e.g. duplicate).
    Conflict,
    /// No resolvable identity on an operation that requires one.
    Unauthorized,
    /// The caller is authenticated but not allowed to perform the operation.
    Forbidden,
    /// Anything unanticipated: infrastructure faults, panics, cancellation.
    Unexpected,
}

/// The single error type flowing through the pipeline.
///
/// # Example
///
/// ```
/// use trellis_core::{AppError, ErrorKind};
///
/// let err = AppError::not_found("Todo.NotFound", "the todo does not exist");
/// assert_eq!(err.kind(), ErrorKind::NotFound);
/// assert_eq!(err.code(), "Todo.NotFound");
/// assert!(err.details().is_empty());
/// ```
#[derive(Error, Debug)]
#[error("{code}: {message}")]
pub struct AppError {
    kind: ErrorKind,
    code: String,
    message: String,
    details: FieldErrors,
    /// The underlying infrastructure fault, never exposed to clients.
    #[source]
    source: Option<anyhow::Error>,
}

impl AppError {
    fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            details: FieldErrors::new(),
            source: None,
        }
    }

    /// Creates a validation error without field-level findings.
    #[must_use]
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, code, message)
    }

    /// Creates a validation error carrying field-level findings.
    #[must_use]
    pub fn validation_with_fields(
        code: impl Into<String>,
        message: impl Into<String>,
        details: FieldErrors,
    ) -> Self {
        Self {
            details,
            ..Self::new(ErrorKind::Validation, code, message)
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, code, message)
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, code, message)
    }

    /// Creates an unauthorized error.
    #[must_use]
    pub fn unauthorized(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, code, message)
    }

    /// Creates a forbidden error.
    #[must_use]
    pub fn forbidden(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, code, message)
    }

    /// Creates an unexpected error.
    #[must_use]
    pub fn unexpected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, code, message)
    }

    /// Creates an unexpected error wrapping the underlying fault.
    pub fn unexpected_with_source(
        code: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::new(ErrorKind::Unexpected, code, message)
        }
    }

    /// Creates the error surfaced when a stage observes cancellation before
    /// starting blocking work.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::unexpected(CANCELLED_CODE, "the operation was cancelled before completion")
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the machine-readable code (e.g. `"Todo.NotFound"`).
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the field-level findings (empty for non-validation errors).
    #[must_use]
    pub const fn details(&self) -> &FieldErrors {
        &self.details
    }
}

/// Equality over the externally observable parts of the error.
///
/// The opaque `source` chain is ignored: two errors that render identically
/// to a caller compare equal.
impl PartialEq for AppError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.code == other.code
            && self.message == other.message
            && self.details == other.details
    }
}

/// Field-level validation findings.
///
/// Field names are case-insensitive: keys are normalised to lowercase on
/// insert, and messages for a field keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldErrors {
    fields: HashMap<String, Vec<String>>,
}

impl FieldErrors {
    /// Creates an empty set of findings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a finding for a field.
    pub fn add(&mut self, field: impl AsRef<str>, message: impl Into<String>) {
        self.fields
            .entry(field.as_ref().to_lowercase())
            .or_default()
            .push(message.into());
    }

    /// Returns the ordered messages recorded for a field, if any.
    #[must_use]
    pub fn messages(&self, field: &str) -> Option<&[String]> {
        self.fields.get(&field.to_lowercase()).map(Vec::as_slice)
    }

    /// Returns `true` if no findings were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of fields with findings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Borrows the underlying field → messages map.
    #[must_use]
    pub const fn as_map(&self) -> &HashMap<String, Vec<String>> {
        &self.fields
    }

    /// Consumes the findings, yielding the field → messages map.
    #[must_use]
    pub fn into_map(self) -> HashMap<String, Vec<String>> {
        self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_pair_kind_and_code() {
        let cases = [
            (AppError::validation("Todo.Validation", "bad"), ErrorKind::Validation),
            (AppError::not_found("Todo.NotFound", "gone"), ErrorKind::NotFound),
            (AppError::conflict("Tag.Duplicate", "exists"), ErrorKind::Conflict),
            (AppError::unauthorized("Auth.Missing", "who?"), ErrorKind::Unauthorized),
            (AppError::forbidden("Auth.Denied", "no"), ErrorKind::Forbidden),
            (AppError::unexpected("Infra.Down", "boom"), ErrorKind::Unexpected),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind);
        }
    }

    #[test]
    fn only_validation_carries_details() {
        let mut findings = FieldErrors::new();
        findings.add("title", "must not be empty");

        let err = AppError::validation_with_fields("Todo.Validation", "invalid", findings);
        assert!(!err.details().is_empty());

        let err = AppError::not_found("Todo.NotFound", "gone");
        assert!(err.details().is_empty());
    }

    #[test]
    fn field_names_are_case_insensitive() {
        let mut findings = FieldErrors::new();
        findings.add("Title", "must not be empty");
        findings.add("TITLE", "too long");

        assert_eq!(findings.len(), 1);
        let messages = findings.messages("title").unwrap();
        assert_eq!(messages, ["must not be empty", "too long"]);
    }

    #[test]
    fn messages_keep_insertion_order() {
        let mut findings = FieldErrors::new();
        findings.add("title", "first");
        findings.add("title", "second");
        findings.add("title", "third");

        assert_eq!(
            findings.messages("title").unwrap(),
            ["first", "second", "third"]
        );
    }

    #[test]
    fn cancelled_is_unexpected_with_stable_code() {
        let err = AppError::cancelled();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert_eq!(err.code(), CANCELLED_CODE);
    }

    #[test]
    fn equality_ignores_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let with_source = AppError::unexpected_with_source("Infra.Down", "boom", io);
        let without = AppError::unexpected("Infra.Down", "boom");
        assert_eq!(with_source, without);
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = AppError::conflict("Tag.Duplicate", "tag already exists");
        assert_eq!(err.to_string(), "Tag.Duplicate: tag already exists");
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
    }
}
