//! XSD attribute declarations, attribute uses and attribute groups

use std::fmt;

use super::elements::{Form, ValueConstraint};
use super::simple_types::TypeRef;
use super::wildcards::Wildcard;
use crate::namespaces::QName;

/// Attribute use mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttributeUseMode {
    /// Attribute is optional (default)
    #[default]
    Optional,
    /// Attribute is required
    Required,
    /// Attribute is prohibited
    Prohibited,
}

impl AttributeUseMode {
    /// Parse from string value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "optional" => Some(Self::Optional),
            "required" => Some(Self::Required),
            "prohibited" => Some(Self::Prohibited),
            _ => None,
        }
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optional => "optional",
            Self::Required => "required",
            Self::Prohibited => "prohibited",
        }
    }
}

impl fmt::Display for AttributeUseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An attribute declaration (global, or local inside a use)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDecl {
    /// Local name
    pub name: String,
    /// `form`; `None` takes attributeFormDefault (local declarations only)
    pub form: Option<Form>,
    /// Declared type; `None` is anySimpleType
    pub type_ref: Option<TypeRef>,
    /// `default`
    pub default: Option<ValueConstraint>,
    /// `fixed`
    pub fixed: Option<ValueConstraint>,
}

impl AttributeDecl {
    /// Create a declaration
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            form: None,
            type_ref: None,
            default: None,
            fixed: None,
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
}

/// Local declaration or `ref=` to a global attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeRef {
    /// Declared in place
    Local(AttributeDecl),
    /// Reference to a global attribute
    Ref(QName),
}

/// An attribute use inside a complex type or attribute group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeUseDecl {
    /// The declaration used
    pub attribute: AttributeRef,
    /// `use`
    pub use_mode: AttributeUseMode,
    /// `default` on the use (overrides the declaration's)
    pub default: Option<ValueConstraint>,
    /// `fixed` on the use (overrides the declaration's)
    pub fixed: Option<ValueConstraint>,
}

impl AttributeUseDecl {
    /// Use of a local declaration
    pub fn local(decl: AttributeDecl) -> Self {
        Self {
            attribute: AttributeRef::Local(decl),
            use_mode: AttributeUseMode::Optional,
            default: None,
            fixed: None,
        }
    }

    /// Use of a global declaration
    pub fn reference(name: QName) -> Self {
        Self {
            attribute: AttributeRef::Ref(name),
            use_mode: AttributeUseMode::Optional,
            default: None,
            fixed: None,
        }
    }

    /// Set `use`
    pub fn with_use(mut self, use_mode: AttributeUseMode) -> Self {
        self.use_mode = use_mode;
        self
    }

    /// `use="required"`
    pub fn required(self) -> Self {
        self.with_use(AttributeUseMode::Required)
    }

    /// `use="prohibited"`
    pub fn prohibited(self) -> Self {
        self.with_use(AttributeUseMode::Prohibited)
    }

    /// Set `default` on the use
    pub fn with_default(mut self, value: ValueConstraint) -> Self {
        self.default = Some(value);
        self
    }

    /// Set `fixed` on the use
    pub fn with_fixed(mut self, value: ValueConstraint) -> Self {
        self.fixed = Some(value);
        self
    }

    /// Fixed value from the use or the local declaration
    pub fn effective_fixed(&self) -> Option<&ValueConstraint> {
        self.fixed.as_ref().or(match &self.attribute {
            AttributeRef::Local(decl) => decl.fixed.as_ref(),
            AttributeRef::Ref(_) => None,
        })
    }
}

/// A named attribute group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeGroupDef {
    /// Local name
    pub name: String,
    /// Attribute uses
    pub attributes: Vec<AttributeUseDecl>,
    /// Nested attribute group references
    pub attribute_groups: Vec<QName>,
    /// `xs:anyAttribute`
    pub any_attribute: Option<Wildcard>,
}

impl AttributeGroupDef {
    /// Create an empty attribute group
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            attribute_groups: Vec::new(),
            any_attribute: None,
        }
    }

    /// Add an attribute use
    pub fn with_attribute(mut self, attribute: AttributeUseDecl) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add a nested group reference
    pub fn with_attribute_group(mut self, group: QName) -> Self {
        self.attribute_groups.push(group);
        self
    }

    /// Set the wildcard
    pub fn with_any_attribute(mut self, wildcard: Wildcard) -> Self {
        self.any_attribute = Some(wildcard);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_use_mode() {
        assert_eq!(AttributeUseMode::from_str("required"), Some(AttributeUseMode::Required));
        assert_eq!(AttributeUseMode::from_str("sometimes"), None);
        assert_eq!(AttributeUseMode::default().as_str(), "optional");
    }

    #[test]
    fn test_effective_fixed() {
        let decl = AttributeDecl::new("v").with_fixed(ValueConstraint::new("1"));
        let use_ = AttributeUseDecl::local(decl);
        assert_eq!(use_.effective_fixed().map(|v| v.lexical.as_str()), Some("1"));

        let use_ = use_.with_fixed(ValueConstraint::new("2"));
        assert_eq!(use_.effective_fixed().map(|v| v.lexical.as_str()), Some("2"));

        let by_ref = AttributeUseDecl::reference(QName::local("v")).prohibited();
        assert!(by_ref.effective_fixed().is_none());
        assert_eq!(by_ref.use_mode, AttributeUseMode::Prohibited);
    }
}
