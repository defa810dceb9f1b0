//! Arbor integration test support.
//!
//! A small library schema wired with the full validator stack, a change log
//! that records reported changes as text, and a JSON snapshot of a tree for
//! structural comparisons.

mod change_log;
mod library;
mod snapshot;

pub use change_log::ChangeLog;
pub use library::{Library, LibraryOptions, References, Reporter};
pub use snapshot::snapshot;

/// Everything a scenario test usually needs.
pub mod prelude {
    pub use crate::{snapshot, ChangeLog, Library, LibraryOptions};
    pub use arbor_core::{NodeId, Value};
    pub use arbor_dom::{Dom, DomError, DomResult};
    pub use arbor_transaction::{TransactionContext, TransactionOptions, TransactionPhase};
    pub use arbor_validation::{CollisionPolicy, UniqueIdOptions};
}
