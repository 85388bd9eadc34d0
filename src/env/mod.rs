//! Variable environment and substitution
//!
//! This module owns the scoped variable store, the value and assignment
//! types, and the `$(name)` substitution engine.

pub mod environment;
pub mod subst;
pub mod value;

// Re-export main types
pub use environment::{is_reserved, Environment, Filter, VerboseTopic};
pub use subst::escape;
pub use value::{Assignment, Value, Vars};
