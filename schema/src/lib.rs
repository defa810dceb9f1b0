//! Arbor Schema
//!
//! The metadata model: attribute types, field declarations, node types with
//! inheritance-aware slot merging, validation rules and the type registry.

mod attribute_type;
mod capability;
mod error;
mod field;
mod node_type;
mod rules;
mod schema;

pub use attribute_type::*;
pub use capability::*;
pub use error::*;
pub use field::*;
pub use node_type::*;
pub use rules::*;
pub use schema::*;
