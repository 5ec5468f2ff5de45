//! XSD simple type definitions and type references

use super::complex_types::DerivationSet;
use super::facets::{Facet, FacetKind, WhiteSpace};
use super::schema::TypeDefinition;
use crate::namespaces::QName;

/// Reference to a type from a declaration or derivation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// `type=`, `base=`, `itemType=`, `memberTypes=` by QName
    Named(QName),
    /// Stand-in left by the loader for a component it could not locate
    Placeholder(QName),
    /// Anonymous type defined in place
    Inline(Box<TypeDefinition>),
}

impl TypeRef {
    /// Reference to a built-in by local name
    pub fn xsd(local_name: &str) -> Self {
        TypeRef::Named(QName::xsd(local_name))
    }

    /// Reference by QName
    pub fn named(name: QName) -> Self {
        TypeRef::Named(name)
    }

    /// Anonymous simple type
    pub fn simple(def: SimpleTypeDef) -> Self {
        TypeRef::Inline(Box::new(TypeDefinition::Simple(def)))
    }

    /// Anonymous complex type
    pub fn complex(def: super::complex_types::ComplexTypeDef) -> Self {
        TypeRef::Inline(Box::new(TypeDefinition::Complex(def)))
    }
}

/// Variety of a simple type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variety {
    /// Atomic
    Atomic,
    /// List
    List,
    /// Union
    Union,
}

/// How a simple type is derived
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleDerivation {
    /// `xs:restriction`
    Restriction {
        /// Base type
        base: TypeRef,
        /// Facets of this restriction step, in source order
        facets: Vec<Facet>,
    },
    /// `xs:list`
    List {
        /// Item type
        item_type: TypeRef,
    },
    /// `xs:union`
    Union {
        /// Member types, `memberTypes` first then inline members
        member_types: Vec<TypeRef>,
    },
}

/// A user-defined simple type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleTypeDef {
    /// Local name; `None` for anonymous types
    pub name: Option<String>,
    /// `final`; `None` takes the schema's finalDefault
    pub final_set: Option<DerivationSet>,
    /// Derivation
    pub derivation: SimpleDerivation,
}

impl SimpleTypeDef {
    /// Restriction of `base`
    pub fn restriction(name: Option<&str>, base: TypeRef) -> Self {
        Self {
            name: name.map(String::from),
            final_set: None,
            derivation: SimpleDerivation::Restriction {
                base,
                facets: Vec::new(),
            },
        }
    }

    /// List of `item_type`
    pub fn list(name: Option<&str>, item_type: TypeRef) -> Self {
        Self {
            name: name.map(String::from),
            final_set: None,
            derivation: SimpleDerivation::List { item_type },
        }
    }

    /// Union of `member_types`
    pub fn union(name: Option<&str>, member_types: Vec<TypeRef>) -> Self {
        Self {
            name: name.map(String::from),
            final_set: None,
            derivation: SimpleDerivation::Union { member_types },
        }
    }

    /// Add a facet to a restriction; ignored for list and union
    pub fn with_facet(mut self, facet: Facet) -> Self {
        if let SimpleDerivation::Restriction { facets, .. } = &mut self.derivation {
            facets.push(facet);
        }
        self
    }

    /// Set `final`
    pub fn with_final(mut self, final_set: DerivationSet) -> Self {
        self.final_set = Some(final_set);
        self
    }

    /// Facets of this step (empty for list and union)
    pub fn facets(&self) -> &[Facet] {
        match &self.derivation {
            SimpleDerivation::Restriction { facets, .. } => facets,
            _ => &[],
        }
    }

    /// Explicit whiteSpace override of this step
    pub fn white_space(&self) -> Option<WhiteSpace> {
        self.facets()
            .iter()
            .rev()
            .find(|f| f.kind == FacetKind::WhiteSpace)
            .and_then(|f| WhiteSpace::from_str(f.value.trim()))
    }
}
