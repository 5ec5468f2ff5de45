//! Reference resolution and structural checks
//!
//! Builds the QName indexes over the borrowed schema and walks every
//! component reachable from the globals. Each named type, element, group
//! and attribute group moves `Unseen -> Resolving -> Resolved`; meeting a
//! node that is still `Resolving` is a recursive reference and is allowed
//! here (derivation cycles are rejected by the cycle detector).

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, instrument, trace};

use crate::components::builtins::get_builtin_type;
use crate::components::{
    AttributeDecl, AttributeGroupDef, AttributeRef, AttributeUseDecl,
    AttributeUseMode, BuiltinType, ComplexContent, ElementDecl, ElementUse,
    IdentityConstraintKind, MaxOccurs, ModelGroup, ModelGroupDef, ModelType, Particle,
    SimpleDerivation, Term, TypeDefinition, TypeRef, XsdSchema,
};
use crate::error::{CompileError, CompileErrorKind};
use crate::namespaces::QName;

type Result<T> = std::result::Result<T, CompileError>;

/// Look up a built-in type by its XSD-namespace QName
pub(crate) fn builtin(name: &QName) -> Option<&'static BuiltinType> {
    if name.namespace() == Some(crate::XSD_NAMESPACE) {
        get_builtin_type(name.local_name())
    } else {
        None
    }
}

/// QName indexes over a borrowed schema
#[derive(Debug)]
pub(crate) struct SchemaIndex<'s> {
    pub schema: &'s XsdSchema,
    pub types: BTreeMap<QName, &'s TypeDefinition>,
    pub elements: BTreeMap<QName, &'s ElementDecl>,
    pub attributes: BTreeMap<QName, &'s AttributeDecl>,
    pub groups: BTreeMap<QName, &'s ModelGroupDef>,
    pub attribute_groups: BTreeMap<QName, &'s AttributeGroupDef>,
    pub identity_constraints: BTreeSet<QName>,
    pub caps: BTreeMap<(QName, QName), MaxOccurs>,
}

impl<'s> SchemaIndex<'s> {
    /// QName of a global component or identity constraint
    pub fn qname(&self, local: &str) -> QName {
        self.schema.qname(local)
    }

    /// Whether a type reference names a simple type
    pub fn is_simple(&self, type_ref: &TypeRef) -> Option<bool> {
        match type_ref {
            TypeRef::Named(name) => match builtin(name) {
                Some(b) => Some(!b.is_complex()),
                None => self
                    .types
                    .get(name)
                    .map(|def| matches!(def, TypeDefinition::Simple(_))),
            },
            TypeRef::Placeholder(_) => None,
            TypeRef::Inline(def) => Some(matches!(**def, TypeDefinition::Simple(_))),
        }
    }

    /// Whether a type reference names a type usable as a simple-content base
    fn has_simple_content(&self, type_ref: &TypeRef) -> bool {
        let def = match type_ref {
            TypeRef::Named(name) => match builtin(name) {
                Some(b) => return !b.is_complex(),
                None => match self.types.get(name) {
                    Some(def) => *def,
                    None => return false,
                },
            },
            TypeRef::Placeholder(_) => return false,
            TypeRef::Inline(def) => def,
        };
        match def {
            TypeDefinition::Simple(_) => true,
            TypeDefinition::Complex(ct) => matches!(ct.content, ComplexContent::SimpleContent { .. }),
        }
    }
}

fn duplicate(kind: &str, name: &QName) -> CompileError {
    CompileError::new(
        CompileErrorKind::StructureViolation,
        format!("duplicate global {} '{}'", kind, name),
    )
}

fn unresolved(kind: &str, name: &QName) -> CompileError {
    CompileError::new(
        CompileErrorKind::UnresolvedReference,
        format!("unknown {} '{}'", kind, name),
    )
}

fn violation(message: impl Into<String>) -> CompileError {
    CompileError::new(CompileErrorKind::StructureViolation, message)
}

fn collect_constraints<'s>(
    decl: &'s ElementDecl,
    schema: &XsdSchema,
    names: &mut BTreeSet<QName>,
) -> Result<()> {
    for constraint in &decl.identity_constraints {
        let name = schema.qname(&constraint.name);
        if !names.insert(name.clone()) {
            return Err(duplicate("identity constraint", &name));
        }
    }
    if let Some(TypeRef::Inline(def)) = &decl.type_ref {
        collect_in_type(def, schema, names)?;
    }
    Ok(())
}

fn collect_in_type(def: &TypeDefinition, schema: &XsdSchema, names: &mut BTreeSet<QName>) -> Result<()> {
    if let TypeDefinition::Complex(ct) = def {
        let particle = match &ct.content {
            ComplexContent::ElementOnly(p) => Some(p),
            ComplexContent::ComplexContent { particle, .. } => particle.as_ref(),
            _ => None,
        };
        if let Some(p) = particle {
            collect_in_particle(p, schema, names)?;
        }
    }
    Ok(())
}

fn collect_in_particle(particle: &Particle, schema: &XsdSchema, names: &mut BTreeSet<QName>) -> Result<()> {
    match &particle.term {
        Term::Element(ElementUse::Local(decl)) => collect_constraints(decl, schema, names),
        Term::Group(group) => group
            .particles
            .iter()
            .try_for_each(|p| collect_in_particle(p, schema, names)),
        _ => Ok(()),
    }
}

/// Index the schema and check every reference
#[instrument(skip_all, fields(target_namespace = ?schema.target_namespace))]
pub(crate) fn resolve(schema: &XsdSchema) -> Result<SchemaIndex<'_>> {
    let mut index = SchemaIndex {
        schema,
        types: BTreeMap::new(),
        elements: BTreeMap::new(),
        attributes: BTreeMap::new(),
        groups: BTreeMap::new(),
        attribute_groups: BTreeMap::new(),
        identity_constraints: BTreeSet::new(),
        caps: BTreeMap::new(),
    };

    for def in &schema.types {
        let local = def
            .name()
            .ok_or_else(|| violation("global type definitions must be named"))?;
        let name = schema.qname(local);
        if builtin(&name).is_some() || index.types.insert(name.clone(), def).is_some() {
            return Err(duplicate("type", &name));
        }
    }
    for decl in &schema.elements {
        let name = schema.qname(&decl.name);
        if index.elements.insert(name.clone(), decl).is_some() {
            return Err(duplicate("element", &name));
        }
    }
    for decl in &schema.attributes {
        let name = schema.qname(&decl.name);
        if index.attributes.insert(name.clone(), decl).is_some() {
            return Err(duplicate("attribute", &name));
        }
    }
    for def in &schema.groups {
        let name = schema.qname(&def.name);
        if index.groups.insert(name.clone(), def).is_some() {
            return Err(duplicate("group", &name));
        }
    }
    for def in &schema.attribute_groups {
        let name = schema.qname(&def.name);
        if index.attribute_groups.insert(name.clone(), def).is_some() {
            return Err(duplicate("attribute group", &name));
        }
    }

    let mut constraints = BTreeSet::new();
    for decl in &schema.elements {
        collect_constraints(decl, schema, &mut constraints)?;
    }
    for def in &schema.types {
        collect_in_type(def, schema, &mut constraints)?;
    }
    for def in &schema.groups {
        for particle in &def.group.particles {
            collect_in_particle(particle, schema, &mut constraints)?;
        }
    }
    index.identity_constraints = constraints;

    for cap in &schema.particle_restriction_caps {
        if !index.types.contains_key(&cap.type_name) {
            return Err(unresolved("type", &cap.type_name));
        }
        index
            .caps
            .insert((cap.type_name.clone(), cap.element.clone()), cap.max);
    }

    let mut resolver = Resolver::new(&index);
    for def in &schema.types {
        if let Some(local) = def.name() {
            resolver.resolve_type_name(&schema.qname(local))?;
        }
    }
    for decl in &schema.elements {
        resolver.resolve_element_name(&schema.qname(&decl.name))?;
    }
    for decl in &schema.attributes {
        resolver.visit_attribute_decl(decl)?;
    }
    for def in &schema.groups {
        resolver.resolve_group_name(&schema.qname(&def.name))?;
    }
    for def in &schema.attribute_groups {
        resolver.resolve_attribute_group(&schema.qname(&def.name))?;
    }

    debug!(
        types = index.types.len(),
        elements = index.elements.len(),
        attributes = index.attributes.len(),
        groups = index.groups.len(),
        "schema resolved"
    );
    Ok(index)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unseen,
    Resolving,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Simple,
    Complex,
    Any,
}

struct Resolver<'i, 's> {
    index: &'i SchemaIndex<'s>,
    types: BTreeMap<QName, State>,
    elements: BTreeMap<QName, State>,
    groups: BTreeMap<QName, State>,
    attribute_groups: BTreeMap<QName, State>,
}

impl<'i, 's> Resolver<'i, 's> {
    fn new(index: &'i SchemaIndex<'s>) -> Self {
        Self {
            index,
            types: BTreeMap::new(),
            elements: BTreeMap::new(),
            groups: BTreeMap::new(),
            attribute_groups: BTreeMap::new(),
        }
    }

    /// Move a node to `Resolving`; `false` when it needs no visit
    fn enter(states: &mut BTreeMap<QName, State>, name: &QName) -> bool {
        let state = states.entry(name.clone()).or_insert(State::Unseen);
        match *state {
            State::Unseen => {
                *state = State::Resolving;
                true
            }
            State::Resolving | State::Resolved => false,
        }
    }

    fn resolve_type_name(&mut self, name: &QName) -> Result<()> {
        if builtin(name).is_some() {
            return Ok(());
        }
        let def = *self
            .index
            .types
            .get(name)
            .ok_or_else(|| unresolved("type", name))?;
        if Self::enter(&mut self.types, name) {
            trace!(%name, "resolving type");
            self.visit_type_def(def)
                .map_err(|e| e.with_component(format!("type {}", name)))?;
            self.types.insert(name.clone(), State::Resolved);
        }
        Ok(())
    }

    fn resolve_element_name(&mut self, name: &QName) -> Result<()> {
        let decl = *self
            .index
            .elements
            .get(name)
            .ok_or_else(|| unresolved("element", name))?;
        if Self::enter(&mut self.elements, name) {
            self.visit_element(decl)
                .map_err(|e| e.with_component(format!("element {}", name)))?;
            self.elements.insert(name.clone(), State::Resolved);
        }
        Ok(())
    }

    fn resolve_group_name(&mut self, name: &QName) -> Result<()> {
        let def = *self
            .index
            .groups
            .get(name)
            .ok_or_else(|| unresolved("group", name))?;
        if Self::enter(&mut self.groups, name) {
            self.visit_group(&def.group)
                .map_err(|e| e.with_component(format!("group {}", name)))?;
            self.groups.insert(name.clone(), State::Resolved);
        }
        Ok(())
    }

    fn resolve_attribute_group(&mut self, name: &QName) -> Result<()> {
        let def = *self
            .index
            .attribute_groups
            .get(name)
            .ok_or_else(|| unresolved("attribute group", name))?;
        if Self::enter(&mut self.attribute_groups, name) {
            for use_ in &def.attributes {
                self.visit_attribute_use(use_)?;
            }
            for nested in &def.attribute_groups {
                self.resolve_attribute_group(nested)?;
            }
            self.attribute_groups.insert(name.clone(), State::Resolved);
        }
        Ok(())
    }

    fn visit_type_ref(&mut self, type_ref: &TypeRef, expect: Expect) -> Result<()> {
        if let TypeRef::Placeholder(name) = type_ref {
            return Err(CompileError::new(
                CompileErrorKind::UnresolvedPlaceholder,
                format!("placeholder for '{}' was never resolved", name),
            ));
        }
        if let TypeRef::Named(name) = type_ref {
            if builtin(name).is_none() && !self.index.types.contains_key(name) {
                return Err(unresolved("type", name));
            }
        }
        match (expect, self.index.is_simple(type_ref)) {
            (Expect::Simple, Some(false)) => {
                return Err(violation("a complex type is used where a simple type is required"))
            }
            (Expect::Complex, Some(true)) => {
                return Err(violation("a simple type is used as the base of complex content"))
            }
            _ => {}
        }
        match type_ref {
            TypeRef::Named(name) => self.resolve_type_name(name),
            TypeRef::Inline(def) => self.visit_type_def(def),
            TypeRef::Placeholder(_) => Ok(()),
        }
    }

    fn visit_type_def(&mut self, def: &TypeDefinition) -> Result<()> {
        match def {
            TypeDefinition::Simple(st) => match &st.derivation {
                SimpleDerivation::Restriction { base, .. } => self.visit_type_ref(base, Expect::Simple),
                SimpleDerivation::List { item_type } => self.visit_type_ref(item_type, Expect::Simple),
                SimpleDerivation::Union { member_types } => {
                    if member_types.is_empty() {
                        return Err(violation("a union needs at least one member type"));
                    }
                    member_types
                        .iter()
                        .try_for_each(|m| self.visit_type_ref(m, Expect::Simple))
                }
            },
            TypeDefinition::Complex(ct) => {
                match &ct.content {
                    ComplexContent::Empty => {}
                    ComplexContent::ElementOnly(particle) => self.visit_particle(particle, true)?,
                    ComplexContent::SimpleContent { base, .. } => {
                        self.visit_type_ref(base, Expect::Any)?;
                        if !self.index.has_simple_content(base) {
                            return Err(violation(
                                "the base of simple content must be a simple type or have simple content",
                            ));
                        }
                    }
                    ComplexContent::ComplexContent { base, particle, .. } => {
                        self.visit_type_ref(base, Expect::Complex)?;
                        if let Some(p) = particle {
                            self.visit_particle(p, true)?;
                        }
                    }
                }
                for use_ in &ct.attributes {
                    self.visit_attribute_use(use_)?;
                }
                for group in &ct.attribute_groups {
                    self.resolve_attribute_group(group)?;
                }
                Ok(())
            }
        }
    }

    fn visit_group(&mut self, group: &ModelGroup) -> Result<()> {
        if group.kind == ModelType::All {
            for child in &group.particles {
                let single = matches!(child.occurs.max, MaxOccurs::Bounded(n) if n <= 1);
                if !matches!(child.term, Term::Element(_)) || !single {
                    return Err(violation(
                        "an all group may only contain elements with maxOccurs 0 or 1",
                    ));
                }
            }
        }
        group
            .particles
            .iter()
            .try_for_each(|p| self.visit_particle(p, false))
    }

    fn visit_particle(&mut self, particle: &Particle, top: bool) -> Result<()> {
        if let MaxOccurs::Bounded(max) = particle.occurs.max {
            if max < particle.occurs.min {
                return Err(violation(format!(
                    "minOccurs {} is greater than maxOccurs {}",
                    particle.occurs.min, max
                )));
            }
        }
        match &particle.term {
            Term::Element(ElementUse::Local(decl)) => self.visit_element(decl),
            Term::Element(ElementUse::Ref(name)) => self.resolve_element_name(name),
            Term::Wildcard(_) => Ok(()),
            Term::Group(group) => {
                if group.kind == ModelType::All {
                    self.check_all_placement(particle, top)?;
                }
                self.visit_group(group)
            }
            Term::GroupRef(name) => {
                self.resolve_group_name(name)?;
                let is_all = self
                    .index
                    .groups
                    .get(name)
                    .map_or(false, |def| def.group.kind == ModelType::All);
                if is_all {
                    self.check_all_placement(particle, top)?;
                }
                Ok(())
            }
        }
    }

    fn check_all_placement(&self, particle: &Particle, top: bool) -> Result<()> {
        if !top {
            return Err(violation("an all group must be the whole content model"));
        }
        if matches!(particle.occurs.max, MaxOccurs::Bounded(n) if n > 1)
            || particle.occurs.max == MaxOccurs::Unbounded
        {
            return Err(violation("an all group may occur at most once"));
        }
        Ok(())
    }

    fn visit_element(&mut self, decl: &ElementDecl) -> Result<()> {
        if decl.default.is_some() && decl.fixed.is_some() {
            return Err(violation(format!(
                "element '{}' has both default and fixed",
                decl.name
            )));
        }
        if let Some(type_ref) = &decl.type_ref {
            self.visit_type_ref(type_ref, Expect::Any)?;
        }
        if let Some(head) = &decl.substitution_group {
            self.resolve_element_name(head)?;
        }
        for constraint in &decl.identity_constraints {
            if let IdentityConstraintKind::KeyRef(refer) = &constraint.kind {
                if !self.index.identity_constraints.contains(refer) {
                    return Err(unresolved("identity constraint", refer));
                }
            }
        }
        Ok(())
    }

    fn visit_attribute_decl(&mut self, decl: &AttributeDecl) -> Result<()> {
        if decl.default.is_some() && decl.fixed.is_some() {
            return Err(violation(format!(
                "attribute '{}' has both default and fixed",
                decl.name
            )));
        }
        match &decl.type_ref {
            Some(type_ref) => self.visit_type_ref(type_ref, Expect::Simple),
            None => Ok(()),
        }
    }

    fn visit_attribute_use(&mut self, use_: &AttributeUseDecl) -> Result<()> {
        if use_.use_mode == AttributeUseMode::Required && use_.default.is_some() {
            return Err(violation("a required attribute cannot have a default"));
        }
        match &use_.attribute {
            AttributeRef::Local(decl) => {
                if use_.use_mode == AttributeUseMode::Required && decl.default.is_some() {
                    return Err(violation("a required attribute cannot have a default"));
                }
                self.visit_attribute_decl(decl)
            }
            AttributeRef::Ref(name) => {
                if self.index.attributes.contains_key(name) {
                    Ok(())
                } else {
                    Err(unresolved("attribute", name))
                }
            }
        }
    }
}
