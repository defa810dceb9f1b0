//! Arbor Validation
//!
//! Observers and validators bound to a subtree, and the validators that
//! enforce invariants at transaction boundaries:
//! - attribute and child rules
//! - id uniqueness per subtree, category or parent
//! - locking
//! - reference integrity with cascading detach
//! - dependency-ordered recomputation
//! - change coalescing for reporting

mod data;
mod dependency;
mod id_index;
mod locking;
mod namer;
mod observer;
mod reference;
mod reporter;
mod scope;
mod unique;
mod validator;

#[cfg(test)]
mod testing;

pub use data::DataValidator;
pub use dependency::{DependencyRules, DependencyValidator};
pub use id_index::IdIndex;
pub use locking::{LockingOptions, LockingValidator};
pub use namer::UniqueNamer;
pub use observer::{Observe, Observer};
pub use reference::{DetachOwners, Reference, ReferenceHandler, ReferenceValidator};
pub use reporter::{AttributeChange, ChildChange, ReportListener, TransactionReporter};
pub use scope::Scope;
pub use unique::{CollisionPolicy, IdScope, UniqueIdOptions, UniqueIdValidator};
pub use validator::{Validate, Validator};
