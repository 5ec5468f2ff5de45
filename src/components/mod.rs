//! The raw schema component model
//!
//! This is the input side of the compiler: owned, tree-shaped component
//! definitions whose cross references are QNames. Built by an external
//! schema parser (or by hand, through the builder methods) and consumed
//! read-only by [`crate::compiler::compile`].

pub mod attributes;
pub mod builtins;
pub mod complex_types;
pub mod elements;
pub mod facets;
pub mod groups;
pub mod particles;
pub mod schema;
pub mod simple_types;
pub mod wildcards;

pub use attributes::{AttributeDecl, AttributeGroupDef, AttributeRef, AttributeUseDecl, AttributeUseMode};
pub use builtins::{BuiltinType, IntegerKind, Primitive, StringKind};
pub use complex_types::{ComplexContent, ComplexTypeDef, DerivationMethod, DerivationSet};
pub use elements::{ElementDecl, Form, IdentityConstraint, IdentityConstraintKind, ValueConstraint};
pub use facets::{Facet, FacetKind, WhiteSpace};
pub use groups::{ElementUse, ModelGroup, ModelGroupDef, ModelType, Particle, Term};
pub use particles::{MaxOccurs, Occurs};
pub use schema::{ParticleCap, TypeDefinition, XsdSchema};
pub use simple_types::{SimpleDerivation, SimpleTypeDef, TypeRef, Variety};
pub use wildcards::{NamespaceConstraint, NamespaceName, ProcessContents, Wildcard};
