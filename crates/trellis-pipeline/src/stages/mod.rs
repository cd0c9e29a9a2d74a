//! The fixed stage implementations.
//!
//! Execution order per request, outermost first:
//!
//! ```text
//! Request → Logging → IdentityEnrichment → Validation → Transaction → Handler
//! ```
//!
//! - **Logging** is outermost so every attempt is observed, even ones that
//!   fail enrichment.
//! - **Identity enrichment** runs before validation so identity problems are
//!   reported before content problems, and so validation can rely on the
//!   identity field it binds onto the request.
//! - **Transaction** is innermost so a validation or enrichment failure
//!   never opens a transaction, but once opened it wraps the handler and its
//!   persistence flush.

pub mod identity;
pub mod logging;
pub mod transaction;
pub mod validation;

pub use identity::IdentityEnrichmentStage;
pub use logging::{LoggingStage, OperationTiming};
pub use transaction::TransactionStage;
pub use validation::{ValidationStage, Validator};
