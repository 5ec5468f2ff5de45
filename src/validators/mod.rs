//! Runtime validators
//!
//! Everything here borrows a [`crate::CompiledSchema`] and keeps only
//! per-instance scratch, so any number of validators can share one schema.

pub mod all_group;
pub mod documents;
pub mod elements;
pub mod models;
pub mod simple_types;

pub use all_group::AllGroupValidator;
pub use documents::{DocumentValidator, Event};
pub use elements::{ElementOutcome, ElementValidator};
pub use models::{ContentValidator, DfaValidator, MatchResult, SimpleSequenceValidator};
pub use simple_types::{SimpleTypeValidator, SimpleValue};
