//! Transitive substitution-group closure with `block` filtering

use std::collections::BTreeMap;

use tracing::{instrument, trace};

use super::registry::{Registry, TypeSlot};
use crate::compiled::{derivation_path, ElemId, TypeId};
use crate::components::{DerivationMethod, DerivationSet};
use crate::error::{CompileError, CompileErrorKind};

fn type_block(registry: &Registry<'_>, id: TypeId) -> DerivationSet {
    match registry.type_info(id).slot {
        TypeSlot::Complex(def) => registry.type_block(def),
        _ => DerivationSet::empty(),
    }
}

/// Head to members, each list sorted by ElemId
///
/// A member appears under every head on its `substitutionGroup` chain
/// unless that head blocks substitution outright or blocks a method used
/// on the derivation path from the member's type to the head's type.
#[instrument(skip_all)]
pub(crate) fn substitution_groups(
    registry: &Registry<'_>,
) -> Result<BTreeMap<ElemId, Vec<ElemId>>, CompileError> {
    let head_of = |id: ElemId| {
        registry.elements[id.index()]
            .decl
            .substitution_group
            .as_ref()
            .and_then(|head| registry.global_elements.get(head).copied())
    };
    let base_of = |id: TypeId| registry.base_of(id);

    let mut groups: BTreeMap<ElemId, Vec<ElemId>> = BTreeMap::new();
    for (i, info) in registry.elements.iter().enumerate() {
        let member = ElemId(i as u32);
        let Some(direct) = head_of(member) else {
            continue;
        };
        let member_type = registry.element_type(member);

        let direct_info = &registry.elements[direct.index()];
        let direct_type = registry.element_type(direct);
        let methods = derivation_path(base_of, member_type, direct_type).ok_or_else(|| {
            CompileError::new(
                CompileErrorKind::StructureViolation,
                format!(
                    "type of '{}' does not derive from the type of its head '{}'",
                    info.name, direct_info.name
                ),
            )
        })?;
        let head_final = registry.element_final(direct_info.decl);
        if let Some(method) = methods.iter().find(|m| head_final.contains(*m)) {
            return Err(CompileError::new(
                CompileErrorKind::StructureViolation,
                format!(
                    "'{}' cannot substitute for '{}': final forbids {}",
                    info.name, direct_info.name, method
                ),
            ));
        }

        let mut head = Some(direct);
        let mut hops = 0;
        while let Some(h) = head {
            if h == member || hops > registry.elements.len() {
                break;
            }
            hops += 1;
            let head_info = &registry.elements[h.index()];
            let head_type = registry.element_type(h);
            let block = registry
                .element_block(head_info.decl)
                .union(type_block(registry, head_type));
            let allowed = !block.contains(DerivationMethod::Substitution)
                && derivation_path(base_of, member_type, head_type)
                    .map_or(false, |methods| !methods.iter().any(|m| block.contains(m)));
            if allowed {
                groups.entry(h).or_default().push(member);
            } else {
                trace!(member = %info.name, head = %head_info.name, "substitution blocked");
            }
            head = head_of(h);
        }
    }
    for members in groups.values_mut() {
        members.sort();
        members.dedup();
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::cycles::check_cycles;
    use crate::compiler::resolver::resolve;
    use crate::components::{ComplexTypeDef, ElementDecl, Particle, TypeRef, XsdSchema};
    use crate::namespaces::QName;

    fn closure(schema: &XsdSchema) -> Result<BTreeMap<ElemId, Vec<ElemId>>, CompileError> {
        let index = resolve(schema)?;
        let mut registry = Registry::build(&index);
        check_cycles(&index, &registry)?;
        registry.assign_element_types();
        substitution_groups(&registry)
    }

    fn comment_schema(block: Option<DerivationSet>) -> XsdSchema {
        let mut schema = XsdSchema::new(None);
        let comment_type = TypeRef::named(QName::local("CommentType"));
        let mut head = ElementDecl::new("comment").with_type(comment_type.clone());
        if let Some(block) = block {
            head = head.with_block(block);
        }
        schema
            .add_complex_type(ComplexTypeDef::element_only(
                Some("CommentType"),
                Particle::sequence(vec![Particle::element(ElementDecl::new("text")).optional()]),
            ))
            .add_complex_type(ComplexTypeDef::derived(
                Some("ShipCommentType"),
                comment_type.clone(),
                DerivationMethod::Extension,
                Some(Particle::sequence(vec![Particle::element(ElementDecl::new("ship"))])),
            ))
            .add_complex_type(ComplexTypeDef::derived(
                Some("CustomerCommentType"),
                comment_type,
                DerivationMethod::Restriction,
                Some(Particle::sequence(vec![Particle::element(ElementDecl::new("text"))])),
            ))
            .add_element(head)
            .add_element(
                ElementDecl::new("shipComment")
                    .substitutes(QName::local("comment"))
                    .with_type(TypeRef::named(QName::local("ShipCommentType"))),
            )
            .add_element(
                ElementDecl::new("customerComment")
                    .substitutes(QName::local("comment"))
                    .with_type(TypeRef::named(QName::local("CustomerCommentType"))),
            );
        schema
    }

    #[test]
    fn test_block_restriction_filters_member() {
        let groups = closure(&comment_schema(Some(DerivationSet::of(&[
            DerivationMethod::Restriction,
        ]))))
        .unwrap();
        assert_eq!(groups.get(&ElemId(0)), Some(&vec![ElemId(1)]));
    }

    #[test]
    fn test_unblocked_head_keeps_both() {
        let groups = closure(&comment_schema(None)).unwrap();
        assert_eq!(groups.get(&ElemId(0)), Some(&vec![ElemId(1), ElemId(2)]));
    }

    #[test]
    fn test_transitive_membership() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_element(ElementDecl::new("c"))
            .add_element(ElementDecl::new("b").substitutes(QName::local("c")))
            .add_element(ElementDecl::new("a").substitutes(QName::local("b")));
        let groups = closure(&schema).unwrap();
        assert_eq!(groups[&ElemId(0)], vec![ElemId(1), ElemId(2)]);
        assert_eq!(groups[&ElemId(1)], vec![ElemId(2)]);
    }

    #[test]
    fn test_block_substitution() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_element(
                ElementDecl::new("head")
                    .with_block(DerivationSet::of(&[DerivationMethod::Substitution])),
            )
            .add_element(ElementDecl::new("m").substitutes(QName::local("head")));
        assert!(closure(&schema).unwrap().get(&ElemId(0)).is_none());
    }

    #[test]
    fn test_member_type_must_derive() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_element(ElementDecl::new("head").with_type(TypeRef::xsd("int")))
            .add_element(
                ElementDecl::new("m")
                    .substitutes(QName::local("head"))
                    .with_type(TypeRef::xsd("string")),
            );
        assert_eq!(closure(&schema).unwrap_err().kind, CompileErrorKind::StructureViolation);
    }
}
