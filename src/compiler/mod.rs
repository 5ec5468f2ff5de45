//! The compile pipeline
//!
//! `resolve -> register -> simple types -> complex types -> entries`. Each
//! stage reads the borrowed schema and the tables of the stages before it;
//! nothing is shared with the input after [`compile`] returns.

mod attribute_uses;
mod automaton;
mod content;
mod cycles;
pub mod digest;
mod glushkov;
mod particles;
mod registry;
mod resolver;
mod simple_types;
mod substitutions;

use std::collections::BTreeMap;

use tracing::{debug, instrument, warn};

use self::attribute_uses::{attribute_type, value_constraint, AttributeResolver};
use self::content::ContentCompiler;
use self::registry::{Registry, TypeSlot};
use self::resolver::SchemaIndex;
use self::simple_types::{compile_simple_types, text_type, SimpleTypes};
use crate::compiled::{
    AttributeEntry, CompiledSchema, ComplexTypeEntry, ContentModel, ElemId, ElementEntry,
    IdentityConstraintEntry, IdentityKind, SimpleTypeEntry, TypeEntry, TypeId, ValidatorId,
    ValidatorKind, ANY_TYPE,
};
use crate::components::{DerivationMethod, DerivationSet, IdentityConstraintKind, Variety};
use crate::error::{CompileError, CompileErrorKind, Result};
use crate::limits::Limits;
use crate::namespaces::QName;

/// Compile a schema into its immutable validation artifact
///
/// The schema is only borrowed; compiling the same schema twice gives
/// artifacts with the same [`CompiledSchema::digest`].
#[instrument(skip_all, fields(target_namespace = ?schema.target_namespace))]
pub fn compile(schema: &crate::components::XsdSchema, limits: &Limits) -> Result<CompiledSchema> {
    match compile_inner(schema, limits) {
        Ok(compiled) => Ok(compiled),
        Err(e) => {
            warn!(kind = %e.kind, component = ?e.component, "{}", e.message);
            Err(e.into())
        }
    }
}

fn compile_inner(
    schema: &crate::components::XsdSchema,
    limits: &Limits,
) -> std::result::Result<CompiledSchema, CompileError> {
    let index = resolver::resolve(schema)?;
    let mut registry = Registry::build(&index);
    cycles::check_cycles(&index, &registry)?;
    registry.assign_element_types();
    let substitution_groups = substitutions::substitution_groups(&registry)?;
    let mut simple = compile_simple_types(&registry, limits)?;

    let types = type_entries(&index, &registry, &substitution_groups, &mut simple, limits)?;
    let elements = element_entries(&index, &registry, &types, &mut simple)?;
    let attributes = attribute_entries(&registry, &mut simple)?;

    let elements_with_constraints: Vec<ElemId> = elements
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.constraints.is_empty())
        .map(|(i, _)| ElemId(i as u32))
        .collect();
    let states: usize = types
        .iter()
        .filter_map(TypeEntry::as_complex)
        .filter_map(|ct| ct.content.dfa())
        .map(|dfa| dfa.state_count())
        .sum();
    debug!(
        types = types.len(),
        elements = elements.len(),
        attributes = attributes.len(),
        states,
        values = simple.tables.values.len(),
        "schema compiled"
    );

    Ok(CompiledSchema {
        target_namespace: schema.target_namespace.clone(),
        types,
        elements,
        attributes,
        tables: simple.tables,
        global_types: registry.global_types.clone(),
        global_elements: registry.global_elements.clone(),
        global_attributes: registry.global_attributes.clone(),
        substitution_groups,
        elements_with_constraints,
        type_validators: simple.validators,
        limits: limits.clone(),
    })
}

fn variety(simple: &SimpleTypes, validator: ValidatorId) -> Variety {
    match simple.tables.validator(validator).map(|v| &v.kind) {
        Some(ValidatorKind::List { .. }) => Variety::List,
        Some(ValidatorKind::Union { .. }) => Variety::Union,
        _ => Variety::Atomic,
    }
}

fn type_entries(
    index: &SchemaIndex<'_>,
    registry: &Registry<'_>,
    substitutions: &BTreeMap<ElemId, Vec<ElemId>>,
    simple: &mut SimpleTypes,
    limits: &Limits,
) -> std::result::Result<Vec<TypeEntry>, CompileError> {
    let contents = ContentCompiler::new(registry, index, limits, substitutions);
    let mut resolver = AttributeResolver::new(registry, index);
    let mut entries = Vec::with_capacity(registry.types.len());

    for i in 0..registry.types.len() {
        let id = TypeId(i as u32);
        let info = registry.type_info(id);
        let base = registry.base_of(id);

        if !info.is_complex() {
            let validator = simple.validator(id).ok_or_else(|| {
                CompileError::new(
                    CompileErrorKind::StructureViolation,
                    format!("simple type {} has no validator", info.display_name()),
                )
            })?;
            entries.push(TypeEntry::Simple(SimpleTypeEntry {
                name: info.name.clone(),
                base: base.map(|(b, _)| b),
                derivation: base.map_or(DerivationMethod::Restriction, |(_, m)| m),
                variety: variety(simple, validator),
                final_set: registry.type_final(id),
                validator,
                builtin: matches!(info.slot, TypeSlot::Builtin(_)),
            }));
            continue;
        }

        let component = info.display_name();
        let (is_abstract, mixed, block) = match info.slot {
            TypeSlot::Complex(def) => {
                if let Some((base_id, method)) = base {
                    if registry.type_final(base_id).contains(method) {
                        return Err(CompileError::new(
                            CompileErrorKind::StructureViolation,
                            format!(
                                "{} cannot be derived by {} from {}: final",
                                component,
                                method,
                                registry.type_info(base_id).display_name()
                            ),
                        )
                        .with_component(component));
                    }
                }
                (def.is_abstract, def.mixed, registry.type_block(def))
            }
            _ => (false, true, DerivationSet::empty()),
        };
        let attributes = resolver
            .resolve(id, simple)
            .map_err(|e| e.with_component(component.clone()))?;
        let content = contents
            .compile(id, simple)
            .map_err(|e| e.with_component(component.clone()))?;

        entries.push(TypeEntry::Complex(ComplexTypeEntry {
            name: info.name.clone(),
            base: if id == ANY_TYPE { None } else { base.map(|(b, _)| b) },
            derivation: base.map_or(DerivationMethod::Restriction, |(_, m)| m),
            is_abstract,
            mixed,
            block,
            final_set: registry.type_final(id),
            attributes: attributes.uses,
            any_attribute: attributes.wildcard,
            content,
        }));
    }
    Ok(entries)
}

/// Validator for an element's text, falling back to `xs:string` for mixed
/// content so value constraints can still be checked
fn element_text_validator(
    registry: &Registry<'_>,
    types: &[TypeEntry],
    simple: &SimpleTypes,
    type_id: TypeId,
) -> (Option<ValidatorId>, bool) {
    if let Some(validator) = text_type(registry, type_id).and_then(|t| simple.validator(t)) {
        return (Some(validator), true);
    }
    let mixed = types
        .get(type_id.index())
        .and_then(TypeEntry::as_complex)
        .map_or(false, |ct| matches!(ct.content, ContentModel::Elements { mixed: true, .. }));
    let string = registry
        .global_types
        .get(&QName::xsd(crate::components::builtins::XSD_STRING))
        .and_then(|id| simple.validator(*id));
    (string.filter(|_| mixed), false)
}

fn element_entries(
    index: &SchemaIndex<'_>,
    registry: &Registry<'_>,
    types: &[TypeEntry],
    simple: &mut SimpleTypes,
) -> std::result::Result<Vec<ElementEntry>, CompileError> {
    let mut entries = Vec::with_capacity(registry.elements.len());
    for (i, info) in registry.elements.iter().enumerate() {
        let decl = info.decl;
        let type_id = registry.element_type(ElemId(i as u32));
        let (text, is_text) = element_text_validator(registry, types, simple, type_id);

        let mut constrained = |vc: Option<&crate::components::ValueConstraint>| match vc {
            None => Ok(None),
            Some(vc) => match text {
                Some(validator) => value_constraint(simple, validator, vc, &info.name).map(Some),
                None => Err(CompileError::new(
                    CompileErrorKind::InvalidValueConstraint,
                    format!("{} has element-only content and cannot carry a value constraint", info.name),
                )),
            },
        };
        let default = constrained(decl.default.as_ref())?;
        let fixed = constrained(decl.fixed.as_ref())?;

        let constraints = decl
            .identity_constraints
            .iter()
            .map(|c| IdentityConstraintEntry {
                name: index.qname(&c.name),
                kind: match &c.kind {
                    IdentityConstraintKind::Unique => IdentityKind::Unique,
                    IdentityConstraintKind::Key => IdentityKind::Key,
                    IdentityConstraintKind::KeyRef(refer) => IdentityKind::KeyRef(refer.clone()),
                },
                selector: c.selector.clone(),
                fields: c.fields.clone(),
                namespaces: c.namespaces.clone(),
            })
            .collect();

        entries.push(ElementEntry {
            name: info.name.clone(),
            type_id,
            validator: text.filter(|_| is_text),
            nillable: decl.nillable,
            is_abstract: decl.is_abstract,
            default,
            fixed,
            block: registry.element_block(decl),
            final_set: registry.element_final(decl),
            substitution_head: decl
                .substitution_group
                .as_ref()
                .and_then(|head| registry.global_elements.get(head).copied()),
            constraints,
            global: info.global,
        });
    }
    Ok(entries)
}

fn attribute_entries(
    registry: &Registry<'_>,
    simple: &mut SimpleTypes,
) -> std::result::Result<Vec<AttributeEntry>, CompileError> {
    let mut entries = Vec::with_capacity(registry.attributes.len());
    for (i, info) in registry.attributes.iter().enumerate() {
        let type_id = attribute_type(registry, crate::compiled::AttrId(i as u32));
        let validator = simple.validator(type_id).ok_or_else(|| {
            CompileError::new(
                CompileErrorKind::StructureViolation,
                format!("attribute {} does not have a simple type", info.name),
            )
        })?;
        let default = info
            .decl
            .default
            .as_ref()
            .map(|vc| value_constraint(simple, validator, vc, &info.name))
            .transpose()?;
        let fixed = info
            .decl
            .fixed
            .as_ref()
            .map(|vc| value_constraint(simple, validator, vc, &info.name))
            .transpose()?;
        entries.push(AttributeEntry {
            name: info.name.clone(),
            type_id,
            validator,
            default,
            fixed,
            global: info.global,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{
        AttributeDecl, ComplexTypeDef, ElementDecl, Particle, SimpleTypeDef, TypeRef,
        ValueConstraint, XsdSchema,
    };

    #[test]
    fn test_registries_cover_every_declaration() {
        let mut schema = XsdSchema::new(Some("urn:t"));
        schema
            .add_simple_type(SimpleTypeDef::list(Some("ints"), TypeRef::xsd("int")))
            .add_attribute(AttributeDecl::new("lang").with_default(ValueConstraint::new("en")))
            .add_element(ElementDecl::new("root").with_type(TypeRef::complex(
                ComplexTypeDef::element_only(
                    None,
                    Particle::sequence(vec![Particle::element(
                        ElementDecl::new("n").with_type(TypeRef::named(QName::new(Some("urn:t"), "ints"))),
                    )]),
                ),
            )));
        let compiled = compile(&schema, &Limits::default()).unwrap();
        assert_eq!(compiled.elements.len(), 2);
        assert_eq!(compiled.attributes.len(), 1);
        assert!(compiled.attributes[0].default.is_some());
        let root = compiled.element_by_name(&QName::new(Some("urn:t"), "root")).unwrap();
        assert!(compiled.content_model(compiled.elements[root.index()].type_id).is_some());
        let ints = compiled.type_by_name(&QName::new(Some("urn:t"), "ints")).unwrap();
        let TypeEntry::Simple(entry) = &compiled.types[ints.index()] else {
            panic!("ints is simple");
        };
        assert_eq!(entry.variety, Variety::List);
        assert!(compiled.types[ANY_TYPE.index()].as_complex().is_some());
    }

    #[test]
    fn test_value_constraint_on_element_only_content() {
        let mut schema = XsdSchema::new(None);
        schema.add_element(
            ElementDecl::new("root")
                .with_type(TypeRef::complex(ComplexTypeDef::element_only(
                    None,
                    Particle::sequence(vec![Particle::element(ElementDecl::new("x"))]),
                )))
                .with_default(ValueConstraint::new("text")),
        );
        let err = compile(&schema, &Limits::default()).unwrap_err();
        assert_eq!(err.compile_kind(), Some(CompileErrorKind::InvalidValueConstraint));
    }

    #[test]
    fn test_complex_final_blocks_extension() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_complex_type(
                ComplexTypeDef::element_only(
                    Some("B"),
                    Particle::sequence(vec![Particle::element(ElementDecl::new("a"))]),
                )
                .with_final(DerivationSet::of(&[DerivationMethod::Extension])),
            )
            .add_complex_type(ComplexTypeDef::derived(
                Some("D"),
                TypeRef::named(QName::local("B")),
                DerivationMethod::Extension,
                None,
            ));
        let err = compile(&schema, &Limits::default()).unwrap_err();
        assert_eq!(err.compile_kind(), Some(CompileErrorKind::StructureViolation));
    }

    #[test]
    fn test_builtin_categories_register_as_simple() {
        let compiled = compile(&XsdSchema::new(None), &Limits::default()).unwrap();
        let idrefs = compiled.type_by_name(&QName::xsd("IDREFS")).unwrap();
        assert!(matches!(
            &compiled.types[idrefs.index()],
            TypeEntry::Simple(SimpleTypeEntry { variety: Variety::List, builtin: true, .. })
        ));
    }
}
