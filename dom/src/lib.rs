//! Arbor DOM
//!
//! Node storage and the node tree:
//! - `Dom`, the arena owning every node and its flat slot array
//! - attribute and child accessors raising change events
//! - lineage-scoped event dispatch and explicit subscriptions
//! - traversal, deep copy and capability queries over extensions

mod copy;
mod dom;
mod error;
mod events;
mod extension;
mod traversal;

pub use dom::*;
pub use error::*;
pub use events::*;
pub use extension::*;
pub use traversal::*;
