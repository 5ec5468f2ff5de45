//! Attribute uses and attribute wildcards along derivation chains

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use super::registry::{Registry, TypeSlot};
use super::resolver::SchemaIndex;
use super::simple_types::SimpleTypes;
use crate::compiled::{
    AttrId, AttributeUse, TypeId, ValidatorId, ValueConstraintRef, ANY_SIMPLE_TYPE, ANY_TYPE,
};
use crate::components::{
    AttributeRef, AttributeUseDecl, AttributeUseMode, ComplexTypeDef, DerivationMethod,
    ProcessContents, ValueConstraint, Wildcard,
};
use crate::error::{CompileError, CompileErrorKind};
use crate::namespaces::QName;

type Result<T> = std::result::Result<T, CompileError>;

/// Effective attribute uses (sorted by name) and wildcard of a complex type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AttributeSet {
    pub uses: Vec<AttributeUse>,
    pub wildcard: Option<Wildcard>,
}

/// Declared type of an attribute; untyped attributes are anySimpleType
pub(crate) fn attribute_type(registry: &Registry<'_>, attr: AttrId) -> TypeId {
    registry.attributes[attr.index()]
        .decl
        .type_ref
        .as_ref()
        .and_then(|type_ref| registry.type_of_ref(type_ref))
        .unwrap_or(ANY_SIMPLE_TYPE)
}

/// Canonicalize a default or fixed value with `validator` and intern it
pub(crate) fn value_constraint(
    types: &mut SimpleTypes,
    validator: ValidatorId,
    constraint: &ValueConstraint,
    owner: &QName,
) -> Result<ValueConstraintRef> {
    let value = crate::validators::simple_types::validate(
        &types.tables,
        validator,
        &constraint.lexical,
        &constraint.namespaces,
    )
    .map_err(|e| {
        CompileError::new(
            CompileErrorKind::InvalidValueConstraint,
            format!(
                "value '{}' of {} is invalid: {}",
                constraint.lexical, owner, e.message
            ),
        )
    })?;
    Ok(ValueConstraintRef {
        lexical: constraint.lexical.clone(),
        value: types.tables.values.intern(&value.key),
    })
}

fn not_expressible(owner: &str) -> CompileError {
    CompileError::new(
        CompileErrorKind::AttributeWildcardNotExpressible,
        format!("attribute wildcard of {} is not expressible", owner),
    )
}

/// Memoized per-type resolution
pub(crate) struct AttributeResolver<'a, 's> {
    registry: &'a Registry<'s>,
    index: &'a SchemaIndex<'s>,
    memo: BTreeMap<TypeId, AttributeSet>,
}

impl<'a, 's> AttributeResolver<'a, 's> {
    pub fn new(registry: &'a Registry<'s>, index: &'a SchemaIndex<'s>) -> Self {
        Self {
            registry,
            index,
            memo: BTreeMap::new(),
        }
    }

    /// Attribute set of `id`, computing its base chain first
    pub fn resolve(&mut self, id: TypeId, types: &mut SimpleTypes) -> Result<AttributeSet> {
        if let Some(done) = self.memo.get(&id) {
            return Ok(done.clone());
        }
        let set = match self.registry.type_info(id).slot {
            TypeSlot::Builtin(b) if b.is_complex() => AttributeSet {
                uses: Vec::new(),
                wildcard: Some(Wildcard::any(ProcessContents::Lax)),
            },
            TypeSlot::Complex(def) => self.complex(id, def, types)?,
            _ => AttributeSet::default(),
        };
        self.memo.insert(id, set.clone());
        Ok(set)
    }

    fn complex(&mut self, id: TypeId, def: &'s ComplexTypeDef, types: &mut SimpleTypes) -> Result<AttributeSet> {
        let owner = self.registry.type_info(id).display_name();
        let (base_id, method) = self
            .registry
            .base_of(id)
            .unwrap_or((ANY_TYPE, DerivationMethod::Restriction));
        let base = if base_id == id {
            AttributeSet::default()
        } else {
            self.resolve(base_id, types)?
        };

        let mut local: Vec<(QName, AttributeUse)> = Vec::new();
        let mut visited = BTreeSet::new();
        let mut wildcard = def.any_attribute.clone();
        self.collect(&def.attributes, types, &mut local)?;
        for group in &def.attribute_groups {
            let group_wildcard = self.collect_group(group, types, &mut local, &mut visited)?;
            wildcard = intersect_local(wildcard, group_wildcard, &owner)?;
        }

        let mut uses: BTreeMap<QName, AttributeUse> = base
            .uses
            .into_iter()
            .map(|u| (u.name.clone(), u))
            .collect();
        for (name, use_) in local {
            if use_.prohibited && use_.fixed.is_none() {
                trace!(attribute = %name, owner = %owner, "prohibited use removed");
                uses.remove(&name);
            } else {
                uses.insert(name, use_);
            }
        }

        let wildcard = match method {
            DerivationMethod::Extension => match (wildcard, base.wildcard) {
                (Some(local), Some(inherited)) => {
                    let constraint = local
                        .constraint
                        .union(&inherited.constraint)
                        .ok_or_else(|| not_expressible(&owner))?;
                    Some(Wildcard::new(constraint, local.process_contents))
                }
                (local, inherited) => local.or(inherited),
            },
            _ => match (wildcard, base.wildcard) {
                (None, _) => None,
                (Some(_), None) => {
                    return Err(CompileError::new(
                        CompileErrorKind::AttributeWildcardIntersectionEmpty,
                        format!(
                            "{} restricts a base without an attribute wildcard",
                            owner
                        ),
                    ))
                }
                (Some(local), Some(inherited)) => {
                    let constraint = local
                        .constraint
                        .intersection(&inherited.constraint)
                        .ok_or_else(|| not_expressible(&owner))?;
                    if constraint.is_empty() {
                        return Err(CompileError::new(
                            CompileErrorKind::AttributeWildcardIntersectionEmpty,
                            format!(
                                "attribute wildcard of {} does not intersect its base's",
                                owner
                            ),
                        ));
                    }
                    Some(Wildcard::new(constraint, local.process_contents))
                }
            },
        };

        Ok(AttributeSet {
            uses: uses.into_values().collect(),
            wildcard,
        })
    }

    fn collect_group(
        &self,
        name: &QName,
        types: &mut SimpleTypes,
        out: &mut Vec<(QName, AttributeUse)>,
        visited: &mut BTreeSet<QName>,
    ) -> Result<Option<Wildcard>> {
        if !visited.insert(name.clone()) {
            return Ok(None);
        }
        let group = self.index.attribute_groups.get(name).copied().ok_or_else(|| {
            CompileError::new(
                CompileErrorKind::UnresolvedReference,
                format!("attribute group {} not found", name),
            )
        })?;
        let mut wildcard = group.any_attribute.clone();
        self.collect(&group.attributes, types, out)?;
        for nested in &group.attribute_groups {
            let nested_wildcard = self.collect_group(nested, types, out, visited)?;
            wildcard = intersect_local(wildcard, nested_wildcard, &name.to_string())?;
        }
        Ok(wildcard)
    }

    fn collect(
        &self,
        decls: &[AttributeUseDecl],
        types: &mut SimpleTypes,
        out: &mut Vec<(QName, AttributeUse)>,
    ) -> Result<()> {
        for decl in decls {
            let attr = self.registry.attribute_of_use(decl).ok_or_else(|| {
                CompileError::new(
                    CompileErrorKind::UnresolvedReference,
                    "attribute use does not resolve to a declaration",
                )
            })?;
            let info = &self.registry.attributes[attr.index()];
            let validator = types
                .validator(attribute_type(self.registry, attr))
                .or_else(|| types.validator(ANY_SIMPLE_TYPE))
                .ok_or_else(|| {
                    CompileError::new(
                        CompileErrorKind::StructureViolation,
                        format!("attribute {} has no simple type", info.name),
                    )
                })?;
            let declared = info.decl;
            let default = decl.default.as_ref().or(match &decl.attribute {
                AttributeRef::Local(local) => local.default.as_ref(),
                AttributeRef::Ref(_) => declared.default.as_ref(),
            });
            let fixed = decl.effective_fixed().or(declared.fixed.as_ref());
            let default = default
                .map(|v| value_constraint(types, validator, v, &info.name))
                .transpose()?;
            let fixed = fixed
                .map(|v| value_constraint(types, validator, v, &info.name))
                .transpose()?;
            let use_ = AttributeUse {
                name: info.name.clone(),
                attr,
                required: decl.use_mode == AttributeUseMode::Required,
                prohibited: decl.use_mode == AttributeUseMode::Prohibited,
                default,
                fixed,
                validator,
            };
            // later uses of the same name override earlier ones
            out.retain(|(name, _)| *name != use_.name);
            out.push((use_.name.clone(), use_));
        }
        Ok(())
    }
}

fn intersect_local(current: Option<Wildcard>, other: Option<Wildcard>, owner: &str) -> Result<Option<Wildcard>> {
    Ok(match (current, other) {
        (Some(a), Some(b)) => {
            let constraint = a
                .constraint
                .intersection(&b.constraint)
                .ok_or_else(|| not_expressible(owner))?;
            Some(Wildcard::new(constraint, a.process_contents))
        }
        (a, b) => a.or(b),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::cycles::check_cycles;
    use crate::compiler::resolver::resolve;
    use crate::compiler::simple_types::compile_simple_types;
    use crate::components::{
        AttributeDecl, AttributeGroupDef, ComplexTypeDef, NamespaceConstraint, TypeRef, XsdSchema,
    };
    use crate::limits::Limits;

    fn attributes_of(schema: &XsdSchema, ty: &str) -> Result<AttributeSet> {
        let index = resolve(schema)?;
        let mut registry = Registry::build(&index);
        check_cycles(&index, &registry)?;
        registry.assign_element_types();
        let mut types = compile_simple_types(&registry, &Limits::default())?;
        let id = registry.global_types[&QName::local(ty)];
        AttributeResolver::new(&registry, &index).resolve(id, &mut types)
    }

    fn derived(name: &str, base: &str, method: DerivationMethod) -> ComplexTypeDef {
        ComplexTypeDef::derived(Some(name), TypeRef::named(QName::local(base)), method, None)
    }

    #[test]
    fn test_wildcard_restriction_intersects() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_complex_type(
                ComplexTypeDef::new(Some("B"), crate::components::ComplexContent::Empty).with_any_attribute(
                    Wildcard::new(
                        NamespaceConstraint::set([Some("urn:a"), Some("urn:b")]),
                        ProcessContents::Strict,
                    ),
                ),
            )
            .add_complex_type(derived("D", "B", DerivationMethod::Restriction).with_any_attribute(
                Wildcard::new(NamespaceConstraint::set([Some("urn:a")]), ProcessContents::Strict),
            ));
        let set = attributes_of(&schema, "D").unwrap();
        let wildcard = set.wildcard.unwrap();
        assert!(wildcard.allows(Some("urn:a")));
        assert!(!wildcard.allows(Some("urn:b")));
    }

    #[test]
    fn test_wildcard_restriction_empty() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_complex_type(
                ComplexTypeDef::new(Some("B"), crate::components::ComplexContent::Empty).with_any_attribute(
                    Wildcard::new(NamespaceConstraint::set([Some("urn:a")]), ProcessContents::Strict),
                ),
            )
            .add_complex_type(derived("D", "B", DerivationMethod::Restriction).with_any_attribute(
                Wildcard::new(NamespaceConstraint::set([Some("urn:c")]), ProcessContents::Strict),
            ));
        assert_eq!(
            attributes_of(&schema, "D").unwrap_err().kind,
            CompileErrorKind::AttributeWildcardIntersectionEmpty
        );
    }

    #[test]
    fn test_extension_unions_wildcards_and_merges_uses() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_complex_type(
                ComplexTypeDef::new(Some("B"), crate::components::ComplexContent::Empty)
                    .with_attribute(AttributeUseDecl::local(AttributeDecl::new("z")).required())
                    .with_any_attribute(Wildcard::new(
                        NamespaceConstraint::set([Some("urn:a")]),
                        ProcessContents::Lax,
                    )),
            )
            .add_complex_type(
                derived("D", "B", DerivationMethod::Extension)
                    .with_attribute(AttributeUseDecl::local(AttributeDecl::new("a")))
                    .with_any_attribute(Wildcard::new(
                        NamespaceConstraint::set([Some("urn:b")]),
                        ProcessContents::Lax,
                    )),
            );
        let set = attributes_of(&schema, "D").unwrap();
        let names: Vec<String> = set.uses.iter().map(|u| u.name.to_string()).collect();
        assert_eq!(names, vec!["a", "z"]);
        assert!(set.uses[1].required);
        let wildcard = set.wildcard.unwrap();
        assert!(wildcard.allows(Some("urn:a")) && wildcard.allows(Some("urn:b")));
    }

    #[test]
    fn test_prohibited_uses() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_complex_type(
                ComplexTypeDef::new(Some("B"), crate::components::ComplexContent::Empty)
                    .with_attribute(AttributeUseDecl::local(AttributeDecl::new("x")))
                    .with_attribute(AttributeUseDecl::local(AttributeDecl::new("y"))),
            )
            .add_complex_type(
                derived("D", "B", DerivationMethod::Restriction)
                    .with_attribute(AttributeUseDecl::local(AttributeDecl::new("x")).prohibited())
                    .with_attribute(
                        AttributeUseDecl::local(AttributeDecl::new("y"))
                            .prohibited()
                            .with_fixed(ValueConstraint::new("v")),
                    ),
            );
        let set = attributes_of(&schema, "D").unwrap();
        assert_eq!(set.uses.len(), 1);
        assert_eq!(set.uses[0].name, QName::local("y"));
        assert!(set.uses[0].prohibited);
    }

    #[test]
    fn test_attribute_groups_expand_and_intersect() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_attribute_group(
                AttributeGroupDef::new("g")
                    .with_attribute(AttributeUseDecl::local(AttributeDecl::new("lang")))
                    .with_any_attribute(Wildcard::new(
                        NamespaceConstraint::set([Some("urn:a"), Some("urn:b")]),
                        ProcessContents::Skip,
                    )),
            )
            .add_complex_type(
                ComplexTypeDef::new(Some("T"), crate::components::ComplexContent::Empty)
                    .with_attribute_group(QName::local("g"))
                    .with_any_attribute(Wildcard::new(
                        NamespaceConstraint::set([Some("urn:b")]),
                        ProcessContents::Skip,
                    )),
            );
        let set = attributes_of(&schema, "T").unwrap();
        assert_eq!(set.uses.len(), 1);
        let wildcard = set.wildcard.unwrap();
        assert!(!wildcard.allows(Some("urn:a")));
        assert!(wildcard.allows(Some("urn:b")));
    }

    #[test]
    fn test_invalid_default() {
        let mut schema = XsdSchema::new(None);
        schema.add_complex_type(
            ComplexTypeDef::new(Some("T"), crate::components::ComplexContent::Empty).with_attribute(
                AttributeUseDecl::local(AttributeDecl::new("n").with_type(TypeRef::xsd("int")))
                    .with_default(ValueConstraint::new("ten")),
            ),
        );
        assert_eq!(
            attributes_of(&schema, "T").unwrap_err().kind,
            CompileErrorKind::InvalidValueConstraint
        );
    }
}
