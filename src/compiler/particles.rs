//! Particle flattening
//!
//! Turns the borrowed particle tree of a complex type into a
//! [`FlatParticle`] tree: group references expanded, `maxOccurs=0`
//! particles dropped, restriction caps and occurrence limits applied,
//! and trivial single-child groups collapsed.

use std::collections::BTreeMap;

use tracing::trace;

use super::registry::{Registry, TypeSlot};
use super::resolver::SchemaIndex;
use crate::compiled::{ElemId, TypeId, ANY_TYPE};
use crate::components::{
    ComplexContent, DerivationMethod, ModelType, Occurs, Particle, Term, Wildcard,
};
use crate::error::{CompileError, CompileErrorKind};
use crate::limits::Limits;
use crate::namespaces::QName;

type Result<T> = std::result::Result<T, CompileError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FlatTerm {
    Element {
        elem: ElemId,
        name: QName,
        /// The element heads a non-empty substitution group
        substitutable: bool,
    },
    Wildcard(Wildcard),
    Group {
        kind: ModelType,
        children: Vec<FlatParticle>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FlatParticle {
    pub occurs: Occurs,
    pub term: FlatTerm,
}

impl FlatParticle {
    /// Element particles in document order
    pub fn elements(&self) -> Vec<(ElemId, &QName)> {
        let mut out = Vec::new();
        self.collect_elements(&mut out);
        out
    }

    fn collect_elements<'a>(&'a self, out: &mut Vec<(ElemId, &'a QName)>) {
        match &self.term {
            FlatTerm::Element { elem, name, .. } => out.push((*elem, name)),
            FlatTerm::Wildcard(_) => {}
            FlatTerm::Group { children, .. } => {
                for child in children {
                    child.collect_elements(out);
                }
            }
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(
            self.term,
            FlatTerm::Group {
                kind: ModelType::All,
                ..
            }
        )
    }
}

/// Flattens particles for one owning type
pub(crate) struct Flattener<'a, 's> {
    registry: &'a Registry<'s>,
    index: &'a SchemaIndex<'s>,
    limits: &'a Limits,
    substitutions: &'a BTreeMap<ElemId, Vec<ElemId>>,
    owner: Option<QName>,
    stack: Vec<QName>,
}

impl<'a, 's> Flattener<'a, 's> {
    pub fn new(
        registry: &'a Registry<'s>,
        index: &'a SchemaIndex<'s>,
        limits: &'a Limits,
        substitutions: &'a BTreeMap<ElemId, Vec<ElemId>>,
    ) -> Self {
        Self {
            registry,
            index,
            limits,
            substitutions,
            owner: None,
            stack: Vec::new(),
        }
    }

    /// Effective content particle of a complex type
    ///
    /// Extension content is `sequence(base, local)`; restriction content is
    /// the local particle alone.
    pub fn content_of(&mut self, id: TypeId) -> Result<Option<FlatParticle>> {
        let mut chain = Vec::new();
        let mut current = id;
        // walk extension steps down to the first non-extension ancestor
        loop {
            chain.push(current);
            let TypeSlot::Complex(def) = self.registry.type_info(current).slot else {
                break;
            };
            match &def.content {
                ComplexContent::ComplexContent {
                    derivation: DerivationMethod::Extension,
                    ..
                } => match self.registry.base_of(current) {
                    Some((base, _)) if base != ANY_TYPE && !chain.contains(&base) => current = base,
                    _ => break,
                },
                _ => break,
            }
        }

        let mut content: Option<FlatParticle> = None;
        for ty in chain.into_iter().rev() {
            let local = self.local_particle(ty)?;
            content = match (content, local) {
                (None, local) => local,
                (base, None) => base,
                (Some(base), Some(local)) => {
                    if base.is_all() || local.is_all() {
                        return Err(CompileError::new(
                            CompileErrorKind::StructureViolation,
                            format!(
                                "{} extends content with an all group",
                                self.registry.type_info(id).display_name()
                            ),
                        ));
                    }
                    Some(FlatParticle {
                        occurs: Occurs::once(),
                        term: FlatTerm::Group {
                            kind: ModelType::Sequence,
                            children: vec![base, local],
                        },
                    })
                }
            };
        }
        Ok(content)
    }

    fn local_particle(&mut self, id: TypeId) -> Result<Option<FlatParticle>> {
        let TypeSlot::Complex(def) = self.registry.type_info(id).slot else {
            return Ok(None);
        };
        self.owner = self.registry.type_info(id).name.clone();
        let particle = match &def.content {
            ComplexContent::ElementOnly(particle) => Some(particle),
            ComplexContent::ComplexContent { particle, .. } => particle.as_ref(),
            ComplexContent::Empty | ComplexContent::SimpleContent { .. } => None,
        };
        match particle {
            Some(particle) => self.flatten(particle),
            None => Ok(None),
        }
    }

    fn occurs(&self, particle: &Particle) -> Occurs {
        let mut occurs = particle.occurs;
        if let (Some(owner), Term::Element(use_)) = (&self.owner, &particle.term) {
            let cap = self
                .registry
                .element_of_use(use_)
                .map(|elem| &self.registry.elements[elem.index()].name)
                .and_then(|name| self.index.caps.get(&(owner.clone(), name.clone())));
            if let Some(cap) = cap {
                occurs.max = occurs.max.min(*cap);
                if let Some(max) = occurs.max.bound() {
                    occurs.min = occurs.min.min(max);
                }
            }
        }
        Occurs::new(
            self.limits.cap_min_occurs(occurs.min),
            self.limits.cap_max_occurs(occurs.max),
        )
    }

    /// Flatten one particle; `None` when it contributes nothing
    pub fn flatten(&mut self, particle: &Particle) -> Result<Option<FlatParticle>> {
        let occurs = self.occurs(particle);
        if occurs.is_empty() {
            return Ok(None);
        }
        let term = match &particle.term {
            Term::Element(use_) => {
                let elem = self.registry.element_of_use(use_).ok_or_else(|| {
                    CompileError::new(
                        CompileErrorKind::UnresolvedReference,
                        "element particle does not resolve to a declaration",
                    )
                })?;
                FlatTerm::Element {
                    elem,
                    name: self.registry.elements[elem.index()].name.clone(),
                    substitutable: self
                        .substitutions
                        .get(&elem)
                        .map_or(false, |members| !members.is_empty()),
                }
            }
            Term::Wildcard(wildcard) => FlatTerm::Wildcard(wildcard.clone()),
            Term::Group(group) => {
                let children = self.flatten_all(&group.particles)?;
                FlatTerm::Group {
                    kind: group.kind,
                    children,
                }
            }
            Term::GroupRef(name) => {
                if self.stack.contains(name) {
                    trace!(group = %name, "circular group reference skipped");
                    return Ok(None);
                }
                let def = self.index.groups.get(name).copied().ok_or_else(|| {
                    CompileError::new(
                        CompileErrorKind::UnresolvedReference,
                        format!("model group {} not found", name),
                    )
                })?;
                self.stack.push(name.clone());
                let children = self.flatten_all(&def.group.particles);
                self.stack.pop();
                FlatTerm::Group {
                    kind: def.group.kind,
                    children: children?,
                }
            }
        };
        Ok(simplify(FlatParticle { occurs, term }))
    }

    fn flatten_all(&mut self, particles: &[Particle]) -> Result<Vec<FlatParticle>> {
        let mut out = Vec::with_capacity(particles.len());
        for particle in particles {
            if let Some(flat) = self.flatten(particle)? {
                out.push(flat);
            }
        }
        Ok(out)
    }
}

/// Drop empty groups and collapse single-child groups
fn simplify(particle: FlatParticle) -> Option<FlatParticle> {
    let FlatParticle { occurs, term } = particle;
    match term {
        FlatTerm::Group { children, .. } if children.is_empty() => None,
        FlatTerm::Group { kind, mut children } if kind != ModelType::All && children.len() == 1 => {
            if occurs.is_once() {
                children.pop()
            } else if children[0].occurs.is_once() {
                let mut child = children.pop()?;
                child.occurs = occurs;
                Some(child)
            } else {
                Some(FlatParticle {
                    occurs,
                    term: FlatTerm::Group { kind, children },
                })
            }
        }
        term => Some(FlatParticle { occurs, term }),
    }
}

/// Same-named elements in one content model must share a type
pub(crate) fn check_consistent_declarations(
    registry: &Registry<'_>,
    owner: TypeId,
    content: &FlatParticle,
) -> Result<()> {
    let mut seen: BTreeMap<&QName, TypeId> = BTreeMap::new();
    for (elem, name) in content.elements() {
        let ty = registry.element_type(elem);
        match seen.get(name) {
            Some(&other) if other != ty => {
                return Err(CompileError::new(
                    CompileErrorKind::StructureViolation,
                    format!(
                        "element {} appears with different types in the content of {}",
                        name,
                        registry.type_info(owner).display_name()
                    ),
                ));
            }
            Some(_) => {}
            None => {
                seen.insert(name, ty);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::cycles::check_cycles;
    use crate::compiler::resolver::resolve;
    use crate::compiler::substitutions::substitution_groups;
    use crate::components::{
        ComplexTypeDef, ElementDecl, MaxOccurs, ModelGroupDef, TypeRef, XsdSchema,
    };

    fn flatten_type(schema: &XsdSchema, ty: &str, limits: &Limits) -> Result<Option<FlatParticle>> {
        let index = resolve(schema)?;
        let mut registry = Registry::build(&index);
        check_cycles(&index, &registry)?;
        registry.assign_element_types();
        let groups = substitution_groups(&registry)?;
        let id = registry.global_types[&QName::local(ty)];
        let mut flattener = Flattener::new(&registry, &index, limits, &groups);
        let content = flattener.content_of(id)?;
        if let Some(content) = &content {
            check_consistent_declarations(&registry, id, content)?;
        }
        Ok(content)
    }

    fn names(particle: &FlatParticle) -> Vec<String> {
        particle.elements().iter().map(|(_, n)| n.to_string()).collect()
    }

    #[test]
    fn test_group_refs_expand_and_zero_max_drops() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_group(ModelGroupDef::new(
                "g",
                ModelType::Sequence,
                vec![
                    Particle::element(ElementDecl::new("x")),
                    Particle::element(ElementDecl::new("gone")).occurs(0, 0),
                ],
            ))
            .add_complex_type(ComplexTypeDef::element_only(
                Some("T"),
                Particle::sequence(vec![
                    Particle::element(ElementDecl::new("a")),
                    Particle::group_ref(QName::local("g")),
                ]),
            ));
        let flat = flatten_type(&schema, "T", &Limits::default()).unwrap().unwrap();
        assert_eq!(names(&flat), vec!["a", "x"]);
    }

    #[test]
    fn test_extension_appends_local_content() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_complex_type(ComplexTypeDef::element_only(
                Some("B"),
                Particle::sequence(vec![
                    Particle::element(ElementDecl::new("a")),
                    Particle::element(ElementDecl::new("b")),
                ]),
            ))
            .add_complex_type(ComplexTypeDef::derived(
                Some("D"),
                TypeRef::named(QName::local("B")),
                DerivationMethod::Extension,
                Some(Particle::sequence(vec![Particle::element(ElementDecl::new("c"))])),
            ));
        let flat = flatten_type(&schema, "D", &Limits::default()).unwrap().unwrap();
        assert_eq!(names(&flat), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_caps_and_limits() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_complex_type(ComplexTypeDef::element_only(
                Some("T"),
                Particle::sequence(vec![
                    Particle::element(ElementDecl::new("a")).occurs(1, 10),
                    Particle::element(ElementDecl::new("b")).occurs(0, 50_000),
                ]),
            ))
            .add_particle_cap(QName::local("T"), QName::local("a"), MaxOccurs::Bounded(3));
        let flat = flatten_type(&schema, "T", &Limits::default()).unwrap().unwrap();
        let FlatTerm::Group { children, .. } = &flat.term else {
            panic!("expected a group");
        };
        assert_eq!(children[0].occurs, Occurs::range(1, 3));
        assert_eq!(children[1].occurs.max, MaxOccurs::Unbounded);
    }

    #[test]
    fn test_single_child_groups_collapse() {
        let mut schema = XsdSchema::new(None);
        schema.add_complex_type(ComplexTypeDef::element_only(
            Some("T"),
            Particle::sequence(vec![Particle::choice(vec![Particle::element(ElementDecl::new("a"))])])
                .occurs(2, 4),
        ));
        let flat = flatten_type(&schema, "T", &Limits::default()).unwrap().unwrap();
        assert!(matches!(flat.term, FlatTerm::Element { .. }));
        assert_eq!(flat.occurs, Occurs::range(2, 4));
    }

    #[test]
    fn test_inconsistent_declarations() {
        let mut schema = XsdSchema::new(None);
        schema.add_complex_type(ComplexTypeDef::element_only(
            Some("T"),
            Particle::sequence(vec![
                Particle::element(ElementDecl::new("a").with_type(TypeRef::xsd("int"))),
                Particle::element(ElementDecl::new("a").with_type(TypeRef::xsd("string"))),
            ]),
        ));
        assert_eq!(
            flatten_type(&schema, "T", &Limits::default()).unwrap_err().kind,
            CompileErrorKind::StructureViolation
        );
    }
}
