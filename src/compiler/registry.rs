//! Stable integer IDs for types, elements and attributes
//!
//! Order: built-ins, then globals in source order (types, elements,
//! attributes), then nested declarations and anonymous types in pre-order
//! over the same globals followed by named groups and attribute groups.
//! Anonymous components are keyed by the address of the borrowed input
//! node, so the same schema value always yields the same numbering.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, instrument};

use super::resolver::SchemaIndex;
use crate::compiled::{AttrId, ElemId, TypeId, ANY_SIMPLE_TYPE, ANY_TYPE};
use crate::components::builtins::{TypeCategory, BUILTIN_TYPES};
use crate::components::{
    AttributeDecl, AttributeRef, AttributeUseDecl, BuiltinType, ComplexContent, ComplexTypeDef,
    DerivationMethod, DerivationSet, ElementDecl, ElementUse, Form, Particle, SimpleDerivation,
    SimpleTypeDef, Term, TypeDefinition, TypeRef,
};
use crate::namespaces::QName;

fn addr<T>(value: &T) -> usize {
    value as *const T as usize
}

/// What a TypeId stands for
#[derive(Debug, Clone, Copy)]
pub(crate) enum TypeSlot<'s> {
    Builtin(&'static BuiltinType),
    Simple(&'s SimpleTypeDef),
    Complex(&'s ComplexTypeDef),
    /// Anonymous text type of a simple-content restriction
    SimpleContent(&'s ComplexTypeDef),
}

#[derive(Debug, Clone)]
pub(crate) struct TypeInfo<'s> {
    pub slot: TypeSlot<'s>,
    pub name: Option<QName>,
}

impl TypeInfo<'_> {
    pub fn is_complex(&self) -> bool {
        match self.slot {
            TypeSlot::Builtin(b) => b.is_complex(),
            TypeSlot::Complex(_) => true,
            TypeSlot::Simple(_) | TypeSlot::SimpleContent(_) => false,
        }
    }

    pub fn display_name(&self) -> String {
        self.name
            .as_ref()
            .map_or_else(|| "anonymous".to_string(), QName::to_string)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ElementInfo<'s> {
    pub decl: &'s ElementDecl,
    pub name: QName,
    pub global: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct AttributeInfo<'s> {
    pub decl: &'s AttributeDecl,
    pub name: QName,
    pub global: bool,
}

#[derive(Debug)]
pub(crate) struct Registry<'s> {
    pub types: Vec<TypeInfo<'s>>,
    pub elements: Vec<ElementInfo<'s>>,
    pub attributes: Vec<AttributeInfo<'s>>,
    pub global_types: BTreeMap<QName, TypeId>,
    pub global_elements: BTreeMap<QName, ElemId>,
    pub global_attributes: BTreeMap<QName, AttrId>,
    /// Owner complex type to its synthesized text type
    pub simple_content: BTreeMap<TypeId, TypeId>,
    /// Declared (or inherited) type of every element
    pub element_types: Vec<TypeId>,
    type_ids: HashMap<usize, TypeId>,
    element_ids: HashMap<usize, ElemId>,
    attribute_ids: HashMap<usize, AttrId>,
    schema_block: DerivationSet,
    schema_final: DerivationSet,
}

impl<'s> Registry<'s> {
    /// Assign IDs to everything reachable from the index
    #[instrument(skip_all)]
    pub fn build(index: &SchemaIndex<'s>) -> Self {
        let schema = index.schema;
        let mut registry = Registry {
            types: Vec::new(),
            elements: Vec::new(),
            attributes: Vec::new(),
            global_types: BTreeMap::new(),
            global_elements: BTreeMap::new(),
            global_attributes: BTreeMap::new(),
            simple_content: BTreeMap::new(),
            element_types: Vec::new(),
            type_ids: HashMap::new(),
            element_ids: HashMap::new(),
            attribute_ids: HashMap::new(),
            schema_block: schema.block_default,
            schema_final: schema.final_default,
        };

        for builtin in BUILTIN_TYPES.iter() {
            let name = QName::xsd(builtin.name);
            let id = registry.push_type(TypeSlot::Builtin(builtin), Some(name.clone()));
            registry.global_types.insert(name, id);
        }

        for def in &schema.types {
            let name = def.name().map(|local| schema.qname(local));
            let id = registry.push_type(slot_of(def), name.clone());
            registry.type_ids.insert(addr(def), id);
            if let Some(name) = name {
                registry.global_types.insert(name, id);
            }
        }
        for decl in &schema.elements {
            let name = schema.qname(&decl.name);
            let id = registry.push_element(decl, name.clone(), true);
            registry.global_elements.insert(name, id);
        }
        for decl in &schema.attributes {
            let name = schema.qname(&decl.name);
            let id = registry.push_attribute(decl, name.clone(), true);
            registry.global_attributes.insert(name, id);
        }

        let mut walker = Walker {
            registry: &mut registry,
            target_namespace: schema.target_namespace.as_deref(),
            element_form: schema.element_form_default,
            attribute_form: schema.attribute_form_default,
        };
        for def in &schema.types {
            if let Some(&owner) = walker.registry.type_ids.get(&addr(def)) {
                walker.walk_type(def, owner);
            }
        }
        for decl in &schema.elements {
            walker.walk_element(decl);
        }
        for decl in &schema.attributes {
            walker.walk_attribute(decl);
        }
        for def in &schema.groups {
            for particle in &def.group.particles {
                walker.walk_particle(particle);
            }
        }
        for def in &schema.attribute_groups {
            for use_ in &def.attributes {
                walker.walk_attribute_use(use_);
            }
        }

        debug!(
            types = registry.types.len(),
            elements = registry.elements.len(),
            attributes = registry.attributes.len(),
            "components registered"
        );
        registry
    }

    fn push_type(&mut self, slot: TypeSlot<'s>, name: Option<QName>) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeInfo { slot, name });
        id
    }

    fn push_element(&mut self, decl: &'s ElementDecl, name: QName, global: bool) -> ElemId {
        let id = ElemId(self.elements.len() as u32);
        self.elements.push(ElementInfo { decl, name, global });
        self.element_ids.insert(addr(decl), id);
        id
    }

    fn push_attribute(&mut self, decl: &'s AttributeDecl, name: QName, global: bool) -> AttrId {
        let id = AttrId(self.attributes.len() as u32);
        self.attributes.push(AttributeInfo { decl, name, global });
        self.attribute_ids.insert(addr(decl), id);
        id
    }

    pub fn type_info(&self, id: TypeId) -> &TypeInfo<'s> {
        &self.types[id.index()]
    }

    /// TypeId a reference points at
    pub fn type_of_ref(&self, type_ref: &TypeRef) -> Option<TypeId> {
        match type_ref {
            TypeRef::Named(name) => self.global_types.get(name).copied(),
            TypeRef::Inline(def) => self.type_ids.get(&addr(&**def)).copied(),
            TypeRef::Placeholder(_) => None,
        }
    }

    /// ElemId of a local or global declaration
    pub fn element_id(&self, decl: &ElementDecl) -> Option<ElemId> {
        self.element_ids.get(&addr(decl)).copied()
    }

    /// ElemId an element use points at
    pub fn element_of_use(&self, use_: &ElementUse) -> Option<ElemId> {
        match use_ {
            ElementUse::Local(decl) => self.element_id(decl),
            ElementUse::Ref(name) => self.global_elements.get(name).copied(),
        }
    }

    /// AttrId of a local or global declaration
    pub fn attribute_id(&self, decl: &AttributeDecl) -> Option<AttrId> {
        self.attribute_ids.get(&addr(decl)).copied()
    }

    /// AttrId an attribute use points at
    pub fn attribute_of_use(&self, use_: &AttributeUseDecl) -> Option<AttrId> {
        match &use_.attribute {
            AttributeRef::Local(decl) => self.attribute_id(decl),
            AttributeRef::Ref(name) => self.global_attributes.get(name).copied(),
        }
    }

    /// Base type and derivation step of a type
    pub fn base_of(&self, id: TypeId) -> Option<(TypeId, DerivationMethod)> {
        match self.type_info(id).slot {
            TypeSlot::Builtin(builtin) => {
                let base = builtin.base_type?;
                let base_id = self.global_types.get(&QName::xsd(base)).copied()?;
                let method = if builtin.category == TypeCategory::List {
                    DerivationMethod::List
                } else {
                    DerivationMethod::Restriction
                };
                Some((base_id, method))
            }
            TypeSlot::Simple(def) => match &def.derivation {
                SimpleDerivation::Restriction { base, .. } => {
                    Some((self.type_of_ref(base)?, DerivationMethod::Restriction))
                }
                SimpleDerivation::List { .. } => Some((ANY_SIMPLE_TYPE, DerivationMethod::List)),
                SimpleDerivation::Union { .. } => Some((ANY_SIMPLE_TYPE, DerivationMethod::Union)),
            },
            TypeSlot::Complex(def) => match def.base() {
                Some(base) => Some((self.type_of_ref(base)?, def.derivation())),
                None => Some((ANY_TYPE, DerivationMethod::Restriction)),
            },
            TypeSlot::SimpleContent(def) => def
                .base()
                .and_then(|base| self.type_of_ref(base))
                .map(|base| (base, DerivationMethod::Restriction)),
        }
    }

    /// Effective `block` of a complex type
    pub fn type_block(&self, def: &ComplexTypeDef) -> DerivationSet {
        def.block.unwrap_or(self.schema_block)
    }

    /// Effective `final` of a user-defined type
    pub fn type_final(&self, id: TypeId) -> DerivationSet {
        match self.type_info(id).slot {
            TypeSlot::Builtin(_) | TypeSlot::SimpleContent(_) => DerivationSet::empty(),
            TypeSlot::Simple(def) => def.final_set.unwrap_or(self.schema_final),
            TypeSlot::Complex(def) => def.final_set.unwrap_or(self.schema_final),
        }
    }

    /// Effective `block` of an element
    pub fn element_block(&self, decl: &ElementDecl) -> DerivationSet {
        decl.block.unwrap_or(self.schema_block)
    }

    /// Effective `final` of an element
    pub fn element_final(&self, decl: &ElementDecl) -> DerivationSet {
        decl.final_set.unwrap_or(self.schema_final)
    }

    /// Fill `element_types`; the substitution graph must already be acyclic
    pub fn assign_element_types(&mut self) {
        let mut types: Vec<Option<TypeId>> = vec![None; self.elements.len()];
        for i in 0..self.elements.len() {
            self.element_type_of(ElemId(i as u32), &mut types);
        }
        self.element_types = types.into_iter().map(|t| t.unwrap_or(ANY_TYPE)).collect();
    }

    fn element_type_of(&self, id: ElemId, memo: &mut Vec<Option<TypeId>>) -> TypeId {
        if let Some(known) = memo[id.index()] {
            return known;
        }
        let decl = self.elements[id.index()].decl;
        let resolved = match &decl.type_ref {
            Some(type_ref) => self.type_of_ref(type_ref).unwrap_or(ANY_TYPE),
            None => match decl
                .substitution_group
                .as_ref()
                .and_then(|head| self.global_elements.get(head).copied())
            {
                Some(head) if head != id => self.element_type_of(head, memo),
                _ => ANY_TYPE,
            },
        };
        memo[id.index()] = Some(resolved);
        resolved
    }

    /// Declared type of an element
    pub fn element_type(&self, id: ElemId) -> TypeId {
        self.element_types.get(id.index()).copied().unwrap_or(ANY_TYPE)
    }
}

fn slot_of(def: &TypeDefinition) -> TypeSlot<'_> {
    match def {
        TypeDefinition::Simple(st) => TypeSlot::Simple(st),
        TypeDefinition::Complex(ct) => TypeSlot::Complex(ct),
    }
}

struct Walker<'r, 's> {
    registry: &'r mut Registry<'s>,
    target_namespace: Option<&'s str>,
    element_form: Form,
    attribute_form: Form,
}

impl<'r, 's> Walker<'r, 's> {
    fn local_name(&self, name: &str, form: Option<Form>, default: Form) -> QName {
        match form.unwrap_or(default) {
            Form::Qualified => QName::new(self.target_namespace, name),
            Form::Unqualified => QName::local(name),
        }
    }

    fn walk_type_ref(&mut self, type_ref: &'s TypeRef) {
        if let TypeRef::Inline(def) = type_ref {
            let def: &'s TypeDefinition = def;
            let id = self.registry.push_type(slot_of(def), None);
            self.registry.type_ids.insert(addr(def), id);
            self.walk_type(def, id);
        }
    }

    fn walk_type(&mut self, def: &'s TypeDefinition, owner: TypeId) {
        match def {
            TypeDefinition::Simple(st) => match &st.derivation {
                SimpleDerivation::Restriction { base, .. } => self.walk_type_ref(base),
                SimpleDerivation::List { item_type } => self.walk_type_ref(item_type),
                SimpleDerivation::Union { member_types } => {
                    for member in member_types {
                        self.walk_type_ref(member);
                    }
                }
            },
            TypeDefinition::Complex(ct) => {
                match &ct.content {
                    ComplexContent::Empty => {}
                    ComplexContent::ElementOnly(particle) => self.walk_particle(particle),
                    ComplexContent::SimpleContent {
                        base, derivation, ..
                    } => {
                        self.walk_type_ref(base);
                        if *derivation == DerivationMethod::Restriction {
                            let id = self.registry.push_type(TypeSlot::SimpleContent(ct), None);
                            self.registry.simple_content.insert(owner, id);
                        }
                    }
                    ComplexContent::ComplexContent { base, particle, .. } => {
                        self.walk_type_ref(base);
                        if let Some(p) = particle {
                            self.walk_particle(p);
                        }
                    }
                }
                for use_ in &ct.attributes {
                    self.walk_attribute_use(use_);
                }
            }
        }
    }

    fn walk_particle(&mut self, particle: &'s Particle) {
        match &particle.term {
            Term::Element(ElementUse::Local(decl)) => {
                let decl: &'s ElementDecl = decl;
                let name = self.local_name(&decl.name, decl.form, self.element_form);
                self.registry.push_element(decl, name, false);
                self.walk_element(decl);
            }
            Term::Group(group) => {
                for child in &group.particles {
                    self.walk_particle(child);
                }
            }
            Term::Element(ElementUse::Ref(_)) | Term::Wildcard(_) | Term::GroupRef(_) => {}
        }
    }

    fn walk_element(&mut self, decl: &'s ElementDecl) {
        if let Some(type_ref) = &decl.type_ref {
            self.walk_type_ref(type_ref);
        }
    }

    fn walk_attribute_use(&mut self, use_: &'s AttributeUseDecl) {
        if let AttributeRef::Local(decl) = &use_.attribute {
            let name = self.local_name(&decl.name, decl.form, self.attribute_form);
            self.registry.push_attribute(decl, name, false);
            self.walk_attribute(decl);
        }
    }

    fn walk_attribute(&mut self, decl: &'s AttributeDecl) {
        if let Some(type_ref) = &decl.type_ref {
            self.walk_type_ref(type_ref);
        }
    }
}
