//! Cycle detection over the derivation, group, attribute-group and
//! substitution graphs
//!
//! Nodes are visited in registration order so the reported cycle is the
//! same on every run.

use std::collections::BTreeMap;

use tracing::{instrument, trace};

use super::registry::{Registry, TypeSlot};
use super::resolver::SchemaIndex;
use crate::compiled::TypeId;
use crate::components::{ModelGroup, SimpleDerivation, Term};
use crate::error::{CompileError, CompileErrorKind};
use crate::namespaces::QName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

/// First cycle found by an iterative three-color DFS, as a node path
/// starting and ending at the same node
pub(crate) fn find_cycle(edges: &[Vec<usize>]) -> Option<Vec<usize>> {
    let mut color = vec![Color::White; edges.len()];
    for root in 0..edges.len() {
        if color[root] != Color::White {
            continue;
        }
        // (node, next edge to try)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        color[root] = Color::Grey;
        while let Some(&mut (node, ref mut next)) = stack.last_mut() {
            match edges[node].get(*next) {
                Some(&target) => {
                    *next += 1;
                    match color[target] {
                        Color::White => {
                            color[target] = Color::Grey;
                            stack.push((target, 0));
                        }
                        Color::Grey => {
                            let start = stack.iter().position(|(n, _)| *n == target)?;
                            let mut cycle: Vec<usize> =
                                stack[start..].iter().map(|(n, _)| *n).collect();
                            cycle.push(target);
                            return Some(cycle);
                        }
                        Color::Black => {}
                    }
                }
                None => {
                    color[node] = Color::Black;
                    stack.pop();
                }
            }
        }
    }
    None
}

fn describe(cycle: &[usize], name: impl Fn(usize) -> String) -> String {
    cycle.iter().map(|&n| name(n)).collect::<Vec<_>>().join(" -> ")
}

fn group_refs(group: &ModelGroup, out: &mut Vec<QName>) {
    for particle in &group.particles {
        match &particle.term {
            Term::GroupRef(name) => out.push(name.clone()),
            Term::Group(inner) => group_refs(inner, out),
            Term::Element(_) | Term::Wildcard(_) => {}
        }
    }
}

/// Check all four graphs, in the order derivation, group, attribute group,
/// substitution
#[instrument(skip_all)]
pub(crate) fn check_cycles(index: &SchemaIndex<'_>, registry: &Registry<'_>) -> Result<(), CompileError> {
    check_types(registry)?;
    check_groups(index)?;
    check_attribute_groups(index)?;
    check_substitutions(registry)?;
    trace!("no cycles");
    Ok(())
}

fn check_types(registry: &Registry<'_>) -> Result<(), CompileError> {
    let edges: Vec<Vec<usize>> = (0..registry.types.len())
        .map(|i| {
            let id = TypeId(i as u32);
            let mut out = Vec::new();
            if let Some((base, _)) = registry.base_of(id) {
                out.push(base.index());
            }
            if let TypeSlot::Simple(def) = registry.type_info(id).slot {
                match &def.derivation {
                    SimpleDerivation::List { item_type } => {
                        out.extend(registry.type_of_ref(item_type).map(|t| t.index()));
                    }
                    SimpleDerivation::Union { member_types } => {
                        out.extend(
                            member_types
                                .iter()
                                .filter_map(|m| registry.type_of_ref(m))
                                .map(|t| t.index()),
                        );
                    }
                    SimpleDerivation::Restriction { .. } => {}
                }
            }
            out
        })
        .collect();
    match find_cycle(&edges) {
        Some(cycle) => Err(CompileError::new(
            CompileErrorKind::TypeDerivationCycle,
            format!(
                "type derivation cycle: {}",
                describe(&cycle, |n| registry.types[n].display_name())
            ),
        )),
        None => Ok(()),
    }
}

fn check_named<T>(
    defs: &BTreeMap<QName, T>,
    refs: impl Fn(&T) -> Vec<QName>,
    kind: CompileErrorKind,
    label: &str,
) -> Result<(), CompileError> {
    let names: Vec<&QName> = defs.keys().collect();
    let position: BTreeMap<&QName, usize> = names.iter().enumerate().map(|(i, n)| (*n, i)).collect();
    let edges: Vec<Vec<usize>> = defs
        .values()
        .map(|def| {
            refs(def)
                .iter()
                .filter_map(|target| position.get(target).copied())
                .collect()
        })
        .collect();
    match find_cycle(&edges) {
        Some(cycle) => Err(CompileError::new(
            kind,
            format!("{} cycle: {}", label, describe(&cycle, |n| names[n].to_string())),
        )),
        None => Ok(()),
    }
}

fn check_groups(index: &SchemaIndex<'_>) -> Result<(), CompileError> {
    check_named(
        &index.groups,
        |def| {
            let mut out = Vec::new();
            group_refs(&def.group, &mut out);
            out
        },
        CompileErrorKind::GroupCycle,
        "model group",
    )
}

fn check_attribute_groups(index: &SchemaIndex<'_>) -> Result<(), CompileError> {
    check_named(
        &index.attribute_groups,
        |def| def.attribute_groups.clone(),
        CompileErrorKind::AttributeGroupCycle,
        "attribute group",
    )
}

fn check_substitutions(registry: &Registry<'_>) -> Result<(), CompileError> {
    let edges: Vec<Vec<usize>> = registry
        .elements
        .iter()
        .map(|info| {
            info.decl
                .substitution_group
                .as_ref()
                .and_then(|head| registry.global_elements.get(head))
                .map(|head| vec![head.index()])
                .unwrap_or_default()
        })
        .collect();
    match find_cycle(&edges) {
        Some(cycle) => Err(CompileError::new(
            CompileErrorKind::SubstitutionGroupCycle,
            format!(
                "substitution group cycle: {}",
                describe(&cycle, |n| registry.elements[n].name.to_string())
            ),
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::resolver::resolve;
    use crate::components::{
        AttributeGroupDef, ComplexTypeDef, ElementDecl, ModelGroupDef, ModelType, Particle,
        SimpleTypeDef, TypeRef, XsdSchema,
    };
    use crate::components::DerivationMethod;

    fn check(schema: &XsdSchema) -> Result<(), CompileError> {
        let index = resolve(schema)?;
        let registry = Registry::build(&index);
        check_cycles(&index, &registry)
    }

    #[test]
    fn test_find_cycle() {
        assert_eq!(find_cycle(&[vec![1], vec![2], vec![]]), None);
        assert_eq!(find_cycle(&[vec![1], vec![2], vec![0]]), Some(vec![0, 1, 2, 0]));
        assert_eq!(find_cycle(&[vec![], vec![1]]), Some(vec![1, 1]));
        // diamond without a cycle
        assert_eq!(find_cycle(&[vec![1, 2], vec![3], vec![3], vec![]]), None);
    }

    #[test]
    fn test_type_derivation_cycle() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_simple_type(SimpleTypeDef::restriction(Some("A"), TypeRef::named(QName::local("B"))))
            .add_simple_type(SimpleTypeDef::restriction(Some("B"), TypeRef::named(QName::local("A"))));
        let err = check(&schema).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::TypeDerivationCycle);
        assert!(err.message.contains("A -> B -> A"));
    }

    #[test]
    fn test_complex_derivation_cycle() {
        let mut schema = XsdSchema::new(None);
        schema.add_complex_type(ComplexTypeDef::derived(
            Some("Self"),
            TypeRef::named(QName::local("Self")),
            DerivationMethod::Extension,
            None,
        ));
        assert_eq!(check(&schema).unwrap_err().kind, CompileErrorKind::TypeDerivationCycle);
    }

    #[test]
    fn test_group_cycle() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_group(ModelGroupDef::new(
                "g1",
                ModelType::Sequence,
                vec![Particle::choice(vec![Particle::group_ref(QName::local("g2"))])],
            ))
            .add_group(ModelGroupDef::new(
                "g2",
                ModelType::Sequence,
                vec![Particle::group_ref(QName::local("g1"))],
            ));
        assert_eq!(check(&schema).unwrap_err().kind, CompileErrorKind::GroupCycle);
    }

    #[test]
    fn test_attribute_group_cycle() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_attribute_group(AttributeGroupDef::new("a").with_attribute_group(QName::local("b")))
            .add_attribute_group(AttributeGroupDef::new("b").with_attribute_group(QName::local("a")));
        assert_eq!(check(&schema).unwrap_err().kind, CompileErrorKind::AttributeGroupCycle);
    }

    #[test]
    fn test_substitution_cycle() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_element(ElementDecl::new("x").substitutes(QName::local("y")))
            .add_element(ElementDecl::new("y").substitutes(QName::local("x")));
        assert_eq!(check(&schema).unwrap_err().kind, CompileErrorKind::SubstitutionGroupCycle);
    }

    #[test]
    fn test_recursive_content_is_not_a_cycle() {
        let mut schema = XsdSchema::new(None);
        schema.add_complex_type(ComplexTypeDef::element_only(
            Some("Node"),
            Particle::sequence(vec![Particle::element(
                ElementDecl::new("node").with_type(TypeRef::named(QName::local("Node"))),
            )
            .optional()]),
        ));
        assert!(check(&schema).is_ok());
    }
}
