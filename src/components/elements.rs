//! XSD element declarations, value constraints and identity constraints

use super::complex_types::DerivationSet;
use super::simple_types::TypeRef;
use crate::namespaces::{NamespaceContext, QName};

/// Element/attribute form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Form {
    /// Local name is qualified with the target namespace
    Qualified,
    /// Local name is in no namespace
    #[default]
    Unqualified,
}

impl Form {
    /// Parse from string value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "qualified" => Some(Self::Qualified),
            "unqualified" => Some(Self::Unqualified),
            _ => None,
        }
    }
}

/// A `default` or `fixed` lexical with the namespaces in scope where it appeared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueConstraint {
    /// Lexical form
    pub lexical: String,
    /// Prefix bindings in scope at the declaration
    pub namespaces: NamespaceContext,
}

impl ValueConstraint {
    /// Create a value constraint with no prefix bindings
    pub fn new(lexical: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            namespaces: NamespaceContext::new(),
        }
    }

    /// Attach the namespace context
    pub fn with_namespaces(mut self, namespaces: NamespaceContext) -> Self {
        self.namespaces = namespaces;
        self
    }
}

/// Identity constraint category
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityConstraintKind {
    /// xs:unique
    Unique,
    /// xs:key
    Key,
    /// xs:keyref with its `refer`
    KeyRef(QName),
}

/// An identity constraint as written on an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConstraint {
    /// Local name
    pub name: String,
    /// Category
    pub kind: IdentityConstraintKind,
    /// Selector XPath
    pub selector: String,
    /// Field XPaths
    pub fields: Vec<String>,
    /// Prefix bindings for the XPaths
    pub namespaces: NamespaceContext,
}

impl IdentityConstraint {
    /// Create an identity constraint
    pub fn new(name: &str, kind: IdentityConstraintKind, selector: &str, fields: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind,
            selector: selector.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            namespaces: NamespaceContext::new(),
        }
    }
}

/// An element declaration (global, or local inside a particle)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDecl {
    /// Local name
    pub name: String,
    /// `form`; `None` takes elementFormDefault (local declarations only)
    pub form: Option<Form>,
    /// Declared type; `None` is the head's type or anyType
    pub type_ref: Option<TypeRef>,
    /// `nillable="true"`
    pub nillable: bool,
    /// `abstract="true"`
    pub is_abstract: bool,
    /// `default`
    pub default: Option<ValueConstraint>,
    /// `fixed`
    pub fixed: Option<ValueConstraint>,
    /// `substitutionGroup`
    pub substitution_group: Option<QName>,
    /// `block`; `None` takes blockDefault
    pub block: Option<DerivationSet>,
    /// `final`; `None` takes finalDefault
    pub final_set: Option<DerivationSet>,
    /// Identity constraints
    pub identity_constraints: Vec<IdentityConstraint>,
}

impl ElementDecl {
    /// Create a declaration
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            form: None,
            type_ref: None,
            nillable: false,
            is_abstract: false,
            default: None,
            fixed: None,
            substitution_group: None,
            block: None,
            final_set: None,
            identity_constraints: Vec::new(),
        }
    }

    /// Set the type
    pub fn with_type(mut self, type_ref: TypeRef) -> Self {
        self.type_ref = Some(type_ref);
        self
    }

    /// Set `form`
    pub fn with_form(mut self, form: Form) -> Self {
        self.form = Some(form);
        self
    }

    /// Set the substitution group head
    pub fn substitutes(mut self, head: QName) -> Self {
        self.substitution_group = Some(head);
        self
    }

    /// Set `block`
    pub fn with_block(mut self, block: DerivationSet) -> Self {
        self.block = Some(block);
        self
    }

    /// Set `default`
    pub fn with_default(mut self, value: ValueConstraint) -> Self {
        self.default = Some(value);
        self
    }

    /// Set `fixed`
    pub fn with_fixed(mut self, value: ValueConstraint) -> Self {
        self.fixed = Some(value);
        self
    }

    /// Set `nillable`
    pub fn nillable(mut self) -> Self {
        self.nillable = true;
        self
    }

    /// Set `abstract`
    pub fn abstract_element(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Add an identity constraint
    pub fn with_identity_constraint(mut self, constraint: IdentityConstraint) -> Self {
        self.identity_constraints.push(constraint);
        self
    }
}
