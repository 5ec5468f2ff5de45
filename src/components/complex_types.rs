//! XSD complex type definitions and derivation sets

use std::fmt;

use super::attributes::AttributeUseDecl;
use super::facets::Facet;
use super::groups::Particle;
use super::simple_types::TypeRef;
use super::wildcards::Wildcard;
use crate::namespaces::QName;

/// Derivation method for types and substitutions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DerivationMethod {
    /// Derivation by extension
    Extension,
    /// Derivation by restriction
    Restriction,
    /// Derivation by list
    List,
    /// Derivation by union
    Union,
    /// Element substitution
    Substitution,
}

impl DerivationMethod {
    /// Parse from string value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "extension" => Some(Self::Extension),
            "restriction" => Some(Self::Restriction),
            "list" => Some(Self::List),
            "union" => Some(Self::Union),
            "substitution" => Some(Self::Substitution),
            _ => None,
        }
    }

    /// Attribute spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extension => "extension",
            Self::Restriction => "restriction",
            Self::List => "list",
            Self::Union => "union",
            Self::Substitution => "substitution",
        }
    }

    fn bit(&self) -> u8 {
        match self {
            Self::Extension => 1,
            Self::Restriction => 2,
            Self::List => 4,
            Self::Union => 8,
            Self::Substitution => 16,
        }
    }
}

impl fmt::Display for DerivationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Small bitset over [`DerivationMethod`] (`block`, `final`, `blockDefault`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct DerivationSet(u8);

impl DerivationSet {
    const ALL_METHODS: [DerivationMethod; 5] = [
        DerivationMethod::Extension,
        DerivationMethod::Restriction,
        DerivationMethod::List,
        DerivationMethod::Union,
        DerivationMethod::Substitution,
    ];

    /// The empty set
    pub fn empty() -> Self {
        Self(0)
    }

    /// `#all`
    pub fn all() -> Self {
        Self(0b1_1111)
    }

    /// Set from a list of methods
    pub fn of(methods: &[DerivationMethod]) -> Self {
        methods.iter().fold(Self::empty(), |set, m| set.with(*m))
    }

    /// Parse a `block`/`final` attribute value
    pub fn from_attr(value: &str) -> Option<Self> {
        let value = value.trim();
        if value == "#all" {
            return Some(Self::all());
        }
        let mut set = Self::empty();
        for token in value.split_whitespace() {
            set.insert(DerivationMethod::from_str(token)?);
        }
        Some(set)
    }

    /// Add a method
    pub fn insert(&mut self, method: DerivationMethod) {
        self.0 |= method.bit();
    }

    /// Builder form of [`DerivationSet::insert`]
    pub fn with(mut self, method: DerivationMethod) -> Self {
        self.insert(method);
        self
    }

    /// Membership test
    pub fn contains(&self, method: DerivationMethod) -> bool {
        self.0 & method.bit() != 0
    }

    /// Union of two sets
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// True if no method is in the set
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Raw bits, used by the digest
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Iterate the methods in the set
    pub fn iter(&self) -> impl Iterator<Item = DerivationMethod> + '_ {
        Self::ALL_METHODS.into_iter().filter(|m| self.contains(*m))
    }
}

impl fmt::Display for DerivationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|m| m.as_str()).collect();
        f.write_str(&names.join(" "))
    }
}

/// Content of a complex type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComplexContent {
    /// No element or character content (implicit restriction of anyType)
    Empty,
    /// A particle directly under the type (implicit restriction of anyType)
    ElementOnly(Particle),
    /// `xs:simpleContent`
    SimpleContent {
        /// Base type (simple, or complex with simple content)
        base: TypeRef,
        /// Extension or restriction
        derivation: DerivationMethod,
        /// Facets of a simple-content restriction
        facets: Vec<Facet>,
    },
    /// `xs:complexContent`
    ComplexContent {
        /// Base complex type
        base: TypeRef,
        /// Extension or restriction
        derivation: DerivationMethod,
        /// The particle of this derivation step
        particle: Option<Particle>,
    },
}

/// A complex type definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexTypeDef {
    /// Local name; `None` for anonymous types
    pub name: Option<String>,
    /// `abstract="true"`
    pub is_abstract: bool,
    /// `mixed="true"`
    pub mixed: bool,
    /// `final`; `None` takes the schema's finalDefault
    pub final_set: Option<DerivationSet>,
    /// `block`; `None` takes the schema's blockDefault
    pub block: Option<DerivationSet>,
    /// Content discriminator
    pub content: ComplexContent,
    /// Local attribute uses
    pub attributes: Vec<AttributeUseDecl>,
    /// Attribute group references
    pub attribute_groups: Vec<QName>,
    /// Local `xs:anyAttribute`
    pub any_attribute: Option<Wildcard>,
}

impl ComplexTypeDef {
    /// Create a complex type with the given content
    pub fn new(name: Option<&str>, content: ComplexContent) -> Self {
        Self {
            name: name.map(String::from),
            is_abstract: false,
            mixed: false,
            final_set: None,
            block: None,
            content,
            attributes: Vec::new(),
            attribute_groups: Vec::new(),
            any_attribute: None,
        }
    }

    /// Element-only content with the given particle
    pub fn element_only(name: Option<&str>, particle: Particle) -> Self {
        Self::new(name, ComplexContent::ElementOnly(particle))
    }

    /// Complex content derived from `base`
    pub fn derived(
        name: Option<&str>,
        base: TypeRef,
        derivation: DerivationMethod,
        particle: Option<Particle>,
    ) -> Self {
        Self::new(
            name,
            ComplexContent::ComplexContent {
                base,
                derivation,
                particle,
            },
        )
    }

    /// Simple content derived from `base`
    pub fn simple_content(name: Option<&str>, base: TypeRef, derivation: DerivationMethod) -> Self {
        Self::new(
            name,
            ComplexContent::SimpleContent {
                base,
                derivation,
                facets: Vec::new(),
            },
        )
    }

    /// Add a local attribute use
    pub fn with_attribute(mut self, attribute: AttributeUseDecl) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add an attribute group reference
    pub fn with_attribute_group(mut self, group: QName) -> Self {
        self.attribute_groups.push(group);
        self
    }

    /// Set the attribute wildcard
    pub fn with_any_attribute(mut self, wildcard: Wildcard) -> Self {
        self.any_attribute = Some(wildcard);
        self
    }

    /// Set `mixed`
    pub fn mixed(mut self) -> Self {
        self.mixed = true;
        self
    }

    /// Set `abstract`
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Set `block`
    pub fn with_block(mut self, block: DerivationSet) -> Self {
        self.block = Some(block);
        self
    }

    /// Set `final`
    pub fn with_final(mut self, final_set: DerivationSet) -> Self {
        self.final_set = Some(final_set);
        self
    }

    /// Derivation method from the base, restriction of anyType when implicit
    pub fn derivation(&self) -> DerivationMethod {
        match &self.content {
            ComplexContent::SimpleContent { derivation, .. }
            | ComplexContent::ComplexContent { derivation, .. } => *derivation,
            _ => DerivationMethod::Restriction,
        }
    }

    /// Explicit base reference, `None` when the base is implicitly anyType
    pub fn base(&self) -> Option<&TypeRef> {
        match &self.content {
            ComplexContent::SimpleContent { base, .. }
            | ComplexContent::ComplexContent { base, .. } => Some(base),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_set_from_attr() {
        let set = DerivationSet::from_attr("extension restriction").unwrap();
        assert!(set.contains(DerivationMethod::Extension));
        assert!(set.contains(DerivationMethod::Restriction));
        assert!(!set.contains(DerivationMethod::Substitution));

        let all = DerivationSet::from_attr("#all").unwrap();
        assert!(all.contains(DerivationMethod::Substitution));
        assert!(DerivationSet::from_attr("bogus").is_none());
        assert!(DerivationSet::from_attr("").unwrap().is_empty());
    }

    #[test]
    fn test_derivation_set_display() {
        let set = DerivationSet::of(&[DerivationMethod::Restriction, DerivationMethod::Extension]);
        assert_eq!(set.to_string(), "extension restriction");
    }

    #[test]
    fn test_complex_type_derivation() {
        let ct = ComplexTypeDef::new(Some("T"), ComplexContent::Empty);
        assert_eq!(ct.derivation(), DerivationMethod::Restriction);
        assert!(ct.base().is_none());

        let ct = ComplexTypeDef::derived(
            Some("D"),
            TypeRef::Named(QName::local("B")),
            DerivationMethod::Extension,
            None,
        );
        assert_eq!(ct.derivation(), DerivationMethod::Extension);
        assert_eq!(ct.base(), Some(&TypeRef::Named(QName::local("B"))));
    }
}
