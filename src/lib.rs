//! # xmlschema-compiler
//!
//! Compiles an XML Schema 1.0 component graph into an immutable artifact
//! that validates instance documents in one forward pass.
//!
//! ## Pipeline
//!
//! - Resolve: every QName reference is checked against the schema and the
//!   built-in table; loader placeholders are rejected.
//! - Register: types, elements and attributes get stable integer IDs and
//!   the derivation, group, attribute-group and substitution graphs are
//!   checked for cycles.
//! - Simple types: each simple type becomes a facet program over interned
//!   canonical values.
//! - Complex types: attribute uses and wildcards are merged along the
//!   derivation chain and element content becomes a Glushkov DFA with
//!   occurrence counters, or an all-group table.
//!
//! ## Example
//!
//! ```rust
//! use xmlschema_compiler::components::{ElementDecl, Particle, ComplexTypeDef, TypeRef, XsdSchema};
//! use xmlschema_compiler::limits::Limits;
//! use xmlschema_compiler::namespaces::QName;
//! use xmlschema_compiler::validators::{DocumentValidator, Event};
//!
//! let mut schema = XsdSchema::new(None);
//! schema.add_element(ElementDecl::new("root").with_type(TypeRef::complex(
//!     ComplexTypeDef::element_only(
//!         None,
//!         Particle::sequence(vec![Particle::element(
//!             ElementDecl::new("item").with_type(TypeRef::xsd("int")),
//!         )]),
//!     ),
//! )));
//!
//! let compiled = xmlschema_compiler::compile(&schema, &Limits::default()).unwrap();
//! let errors = DocumentValidator::validate_events(
//!     &compiled,
//!     vec![
//!         Event::start(QName::local("root")),
//!         Event::start(QName::local("item")),
//!         Event::chars("42"),
//!         Event::End,
//!         Event::End,
//!     ],
//! );
//! assert!(errors.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod limits;

pub mod names;
pub mod namespaces;

pub mod components;
pub mod values;

pub mod compiled;
pub mod compiler;

pub mod validators;

pub use compiled::CompiledSchema;
pub use compiler::compile;
pub use error::{Error, Result};

/// Version of the xmlschema-compiler library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XSD 1.0 namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XML namespace
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// XML Schema instance namespace (`xsi:type`, `xsi:nil`)
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
