//! Potential Action – a constraint-driven state manager for schema.org Actions
//!
//! This crate implements client-side handling of JSON-LD Action objects whose
//! properties carry `-input`/`-output` PropertyValueSpecification markers:
//! - Parsing compact (`"required maxlength=100 name=q"`) and structured constraints
//! - Compiling constraints into date/number/string field validators
//! - Building nested input/output schemas that mirror the Action's shape
//! - Extracting and merging the editable ActionState and named variables
//! - Driving the `Potential → Active → Completed/Failed` lifecycle around an async handler

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Constraint, state, and lifecycle engine
pub mod engine;

/// HTML-style value grammars shared by the engine
pub mod util;

// Re-export key types for convenience
pub use engine::{ActionStore, Mode, Node, StoreConfig};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Schema.org type name accepted for structured constraints
pub const PROPERTY_VALUE_SPECIFICATION: &str = "PropertyValueSpecification";
