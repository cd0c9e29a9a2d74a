//! # Trellis Core
//!
//! Core types and traits for the Trellis request pipeline: the tagged
//! error/result model every stage speaks, the wire-level problem envelope,
//! caller identity and its resolution seam, the per-invocation context, and
//! the business handler traits.
//!
//! The pipeline itself (stage chain, fixed stages, auditing hook) lives in
//! `trellis-pipeline`; this crate is the shared vocabulary.
//!
//! ## Error model
//!
//! Every fallible operation returns [`AppResult<T>`]. Failures are one of a
//! closed set of [`ErrorKind`]s, built only through per-kind constructors on
//! [`AppError`], and rendered to callers exclusively through
//! [`ProblemEnvelope`]:
//!
//! ```
//! use trellis_core::AppError;
//!
//! let envelope = AppError::not_found("Todo.NotFound", "no such todo").to_envelope();
//! assert_eq!(envelope.status, 404);
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod identity;

// Re-export main types at crate root
pub use context::{CancelToken, PipelineContext, RequestId};
pub use envelope::ProblemEnvelope;
pub use error::{AppError, AppResult, ErrorKind, FieldErrors, CANCELLED_CODE};
pub use handler::{BoxFuture, FnHandler, Handler, OperationRequest};
pub use identity::{Identity, IdentityProvider, UserProvisioner};
