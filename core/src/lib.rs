//! Arbor Core Types
//!
//! This crate provides the foundational types shared by every Arbor crate:
//! - Identity types (NodeId, TypeId)
//! - Value types (the Value enum stored in attribute slots)
//! - Violation records produced by validators

mod id;
mod value;
mod violation;

pub use id::*;
pub use value::*;
pub use violation::*;
