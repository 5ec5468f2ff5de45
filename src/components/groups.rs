//! XSD particles and model groups
//!
//! A particle is an element use, a wildcard, an inline model group or a
//! reference to a named group, each with its own occurrence bounds.

use std::fmt;

use super::elements::ElementDecl;
use super::particles::Occurs;
use super::wildcards::Wildcard;
use crate::namespaces::QName;

/// Model group compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModelType {
    /// Elements must appear in order
    Sequence,
    /// Exactly one of the elements must appear
    Choice,
    /// All elements must appear (in any order)
    All,
}

impl ModelType {
    /// Parse from the compositor's local name
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sequence" => Some(Self::Sequence),
            "choice" => Some(Self::Choice),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    /// Local name of the compositor
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequence => "sequence",
            Self::Choice => "choice",
            Self::All => "all",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local element declaration or `ref=` to a global element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementUse {
    /// Declared in place
    Local(Box<ElementDecl>),
    /// Reference to a global element
    Ref(QName),
}

/// Term of a particle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// Element use
    Element(ElementUse),
    /// `xs:any`
    Wildcard(Wildcard),
    /// Inline model group
    Group(ModelGroup),
    /// `xs:group ref=`
    GroupRef(QName),
}

/// A particle: a term with occurrence bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Particle {
    /// Occurrence bounds
    pub occurs: Occurs,
    /// The term
    pub term: Term,
}

impl Particle {
    /// Create a particle
    pub fn new(term: Term, occurs: Occurs) -> Self {
        Self { occurs, term }
    }

    /// Local element declaration occurring once
    pub fn element(decl: ElementDecl) -> Self {
        Self::new(Term::Element(ElementUse::Local(Box::new(decl))), Occurs::once())
    }

    /// Reference to a global element occurring once
    pub fn element_ref(name: QName) -> Self {
        Self::new(Term::Element(ElementUse::Ref(name)), Occurs::once())
    }

    /// Wildcard occurring once
    pub fn wildcard(wildcard: Wildcard) -> Self {
        Self::new(Term::Wildcard(wildcard), Occurs::once())
    }

    /// Inline model group occurring once
    pub fn group(kind: ModelType, particles: Vec<Particle>) -> Self {
        Self::new(Term::Group(ModelGroup::new(kind, particles)), Occurs::once())
    }

    /// `xs:sequence`
    pub fn sequence(particles: Vec<Particle>) -> Self {
        Self::group(ModelType::Sequence, particles)
    }

    /// `xs:choice`
    pub fn choice(particles: Vec<Particle>) -> Self {
        Self::group(ModelType::Choice, particles)
    }

    /// `xs:all`
    pub fn all(particles: Vec<Particle>) -> Self {
        Self::group(ModelType::All, particles)
    }

    /// Reference to a named group occurring once
    pub fn group_ref(name: QName) -> Self {
        Self::new(Term::GroupRef(name), Occurs::once())
    }

    /// Replace the occurrence bounds
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }

    /// Shorthand for bounded occurrence
    pub fn occurs(self, min: u32, max: u32) -> Self {
        self.with_occurs(Occurs::range(min, max))
    }

    /// `minOccurs="0"`, keeping maxOccurs
    pub fn optional(mut self) -> Self {
        self.occurs.min = 0;
        self
    }
}

/// An inline model group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelGroup {
    /// Compositor
    pub kind: ModelType,
    /// Child particles in source order
    pub particles: Vec<Particle>,
}

impl ModelGroup {
    /// Create a model group
    pub fn new(kind: ModelType, particles: Vec<Particle>) -> Self {
        Self { kind, particles }
    }
}

/// A named model group (`xs:group name=`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelGroupDef {
    /// Local name
    pub name: String,
    /// The group
    pub group: ModelGroup,
}

impl ModelGroupDef {
    /// Create a named group
    pub fn new(name: &str, kind: ModelType, particles: Vec<Particle>) -> Self {
        Self {
            name: name.to_string(),
            group: ModelGroup::new(kind, particles),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::particles::MaxOccurs;

    #[test]
    fn test_model_type() {
        assert_eq!(ModelType::from_str("choice"), Some(ModelType::Choice));
        assert_eq!(ModelType::All.to_string(), "all");
        assert_eq!(ModelType::from_str("bag"), None);
    }

    #[test]
    fn test_particle_builders() {
        let p = Particle::sequence(vec![
            Particle::element(ElementDecl::new("a")).occurs(1, 2),
            Particle::element(ElementDecl::new("b")).optional(),
        ])
        .occurs(2, 2);

        assert_eq!(p.occurs, Occurs::range(2, 2));
        match &p.term {
            Term::Group(group) => {
                assert_eq!(group.kind, ModelType::Sequence);
                assert_eq!(group.particles.len(), 2);
                assert_eq!(group.particles[1].occurs.min, 0);
                assert_eq!(group.particles[1].occurs.max, MaxOccurs::Bounded(1));
            }
            other => panic!("unexpected term {:?}", other),
        }
    }
}
