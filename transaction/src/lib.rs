//! Arbor Transaction
//!
//! Begin/end-bracketed batches of mutations over a node subtree.
//!
//! Responsibilities:
//! - Log every mutation made inside a transaction as an undoable operation
//! - Raise the Beginning/Ending/Ended/Cancelled lifecycle to listeners
//! - Roll back the log on cancel, restoring the exact prior state

mod context;
mod lifecycle;
mod operation;

pub use context::{TransactionContext, TransactionOptions, TransactionPhase};
pub use lifecycle::{BeginArgs, ValidationContext, ValidationListener};
pub use operation::Operation;
