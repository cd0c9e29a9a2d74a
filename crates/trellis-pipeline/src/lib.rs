//! # Trellis Pipeline
//!
//! Fixed-order request pipeline for the Trellis framework: the generic,
//! ordered chain that wraps every CRUD operation's business handler with
//! composable stages.
//!
//! ```text
//! Request → Logging → Identity → Validation → Transaction → Handler
//! ```
//!
//! | Stage | Purpose |
//! |-------|---------|
//! | Logging | Observe entry, outcome, and duration of every attempt |
//! | Identity | Resolve and cache the caller identity, provision users |
//! | Validation | Aggregate field-level findings, fail fast |
//! | Transaction | Atomic begin/flush/commit or rollback, audit stamping |
//!
//! ## Key properties
//!
//! - **Fixed order**: stages cannot be reordered; only the observational
//!   logging stage may be left out, without changing any result.
//! - **Single failure channel**: stages and handlers speak `AppResult`
//!   exclusively; panics are caught once at the outermost boundary.
//! - **Strict fail-fast**: a failing stage prevents everything nested
//!   inside it from running, and nothing above it can undo the failure.
//! - **Two-outcome transactions**: every opened transaction commits or
//!   rolls back on every exit path, panics and cancellation included.
//!
//! The shared vocabulary (error model, envelope, identity, context,
//! handler traits) lives in `trellis-core`.

#![doc(html_root_url = "https://docs.rs/trellis-pipeline/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod audit;
pub mod pipeline;
pub mod stage;
pub mod stages;
pub mod store;

// Re-export main types at crate root
pub use audit::{AuditStamp, AuditStamper, Auditable, SYSTEM_ACTOR};
pub use pipeline::{BoxedStage, Pipeline, PipelineBuilder, StageKind};
pub use stage::{Next, Stage};
pub use stages::{
    IdentityEnrichmentStage, LoggingStage, OperationTiming, TransactionStage, ValidationStage,
    Validator,
};
pub use store::{EntityState, TransactionalStore};
