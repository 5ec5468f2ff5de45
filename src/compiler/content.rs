//! Content models of complex types
//!
//! Picks the terminal form for each complex type: empty, simple text, an
//! all-group table or a DFA built from the flattened particle.

use std::collections::BTreeMap;

use tracing::{instrument, trace};

use super::automaton::{build_dfa, SymbolOverlap};
use super::glushkov::Glushkov;
use super::particles::{check_consistent_declarations, FlatParticle, FlatTerm, Flattener};
use super::registry::{Registry, TypeSlot};
use super::resolver::SchemaIndex;
use super::simple_types::{text_type, SimpleTypes};
use crate::compiled::{
    AllEntry, AllGroup, ContentModel, ElemId, ElementModel, Symbol, SymbolKind, TypeId,
};
use crate::components::{ComplexContent, MaxOccurs, Occurs, ProcessContents, Wildcard};
use crate::error::{CompileError, CompileErrorKind};
use crate::limits::Limits;
use crate::namespaces::QName;

type Result<T> = std::result::Result<T, CompileError>;

/// Element-name overlap through substitution groups and wildcards
pub(crate) struct SchemaOverlap<'a, 's> {
    registry: &'a Registry<'s>,
    substitutions: &'a BTreeMap<ElemId, Vec<ElemId>>,
}

impl<'a, 's> SchemaOverlap<'a, 's> {
    pub fn new(
        registry: &'a Registry<'s>,
        substitutions: &'a BTreeMap<ElemId, Vec<ElemId>>,
    ) -> Self {
        Self {
            registry,
            substitutions,
        }
    }

    fn names(&self, symbol: &Symbol) -> Vec<QName> {
        match &symbol.kind {
            SymbolKind::Element {
                name,
                elem,
                substitutable,
            } => {
                let mut names = vec![name.clone()];
                if *substitutable {
                    names.extend(self.member_names(*elem));
                }
                names
            }
            SymbolKind::Wildcard { .. } => Vec::new(),
        }
    }
}

impl SymbolOverlap for SchemaOverlap<'_, '_> {
    fn overlaps(&self, a: &Symbol, b: &Symbol) -> bool {
        match (&a.kind, &b.kind) {
            (SymbolKind::Element { .. }, SymbolKind::Element { .. }) => {
                let theirs = self.names(b);
                self.names(a).iter().any(|name| theirs.contains(name))
            }
            (SymbolKind::Element { .. }, SymbolKind::Wildcard { constraint, .. }) => self
                .names(a)
                .iter()
                .any(|name| constraint.allows(name.namespace())),
            (SymbolKind::Wildcard { constraint, .. }, SymbolKind::Element { .. }) => self
                .names(b)
                .iter()
                .any(|name| constraint.allows(name.namespace())),
            (
                SymbolKind::Wildcard { constraint: x, .. },
                SymbolKind::Wildcard { constraint: y, .. },
            ) => x.overlaps(y),
        }
    }

    fn member_names(&self, head: ElemId) -> Vec<QName> {
        self.substitutions
            .get(&head)
            .map(|members| {
                members
                    .iter()
                    .map(|m| self.registry.elements[m.index()].name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Compiles the content model of every complex type
pub(crate) struct ContentCompiler<'a, 's> {
    registry: &'a Registry<'s>,
    index: &'a SchemaIndex<'s>,
    limits: &'a Limits,
    substitutions: &'a BTreeMap<ElemId, Vec<ElemId>>,
}

impl<'a, 's> ContentCompiler<'a, 's> {
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
        }
    }

    /// Content model of a complex type
    #[instrument(level = "trace", skip(self, types))]
    pub fn compile(&self, id: TypeId, types: &SimpleTypes) -> Result<ContentModel> {
        let info = self.registry.type_info(id);
        let def = match info.slot {
            TypeSlot::Complex(def) => def,
            // anyType: any sequence of elements, processed laxly, and text
            _ => {
                let any = FlatParticle {
                    occurs: Occurs::zero_or_more(),
                    term: FlatTerm::Wildcard(Wildcard::any(ProcessContents::Lax)),
                };
                return Ok(ContentModel::Elements {
                    model: self.element_model(&any)?,
                    mixed: true,
                });
            }
        };

        if let ComplexContent::SimpleContent { .. } = def.content {
            let validator = text_type(self.registry, id)
                .and_then(|text| types.validator(text))
                .ok_or_else(|| {
                    CompileError::new(
                        CompileErrorKind::StructureViolation,
                        format!("{} has simple content without a simple base", info.display_name()),
                    )
                })?;
            return Ok(ContentModel::Simple { validator });
        }

        let mut flattener = Flattener::new(self.registry, self.index, self.limits, self.substitutions);
        let content = flattener.content_of(id)?;
        let model = match content {
            None if def.mixed => self.element_model_empty()?,
            None => {
                trace!("empty content");
                return Ok(ContentModel::Empty);
            }
            Some(particle) => {
                check_consistent_declarations(self.registry, id, &particle)?;
                self.element_model(&particle)?
            }
        };
        Ok(ContentModel::Elements {
            model,
            mixed: def.mixed,
        })
    }

    fn element_model_empty(&self) -> Result<ElementModel> {
        let dfa = build_dfa(Glushkov::build(None)?, None, &self.overlap(), self.limits)?;
        Ok(ElementModel::Dfa(dfa))
    }

    fn element_model(&self, particle: &FlatParticle) -> Result<ElementModel> {
        if particle.is_all() {
            return all_group(particle).map(ElementModel::All);
        }
        let glushkov = Glushkov::build(Some(particle))?;
        let dfa = build_dfa(glushkov, Some(particle), &self.overlap(), self.limits)?;
        trace!(states = dfa.state_count(), counters = dfa.counters.len(), "content DFA");
        Ok(ElementModel::Dfa(dfa))
    }

    fn overlap(&self) -> SchemaOverlap<'a, 's> {
        SchemaOverlap::new(self.registry, self.substitutions)
    }
}

fn all_group(particle: &FlatParticle) -> Result<AllGroup> {
    let FlatTerm::Group { children, .. } = &particle.term else {
        return Err(CompileError::new(
            CompileErrorKind::StructureViolation,
            "all content is not a group",
        ));
    };
    let mut entries = Vec::with_capacity(children.len());
    for child in children {
        let FlatTerm::Element {
            elem,
            name,
            substitutable,
        } = &child.term
        else {
            return Err(CompileError::new(
                CompileErrorKind::StructureViolation,
                "an all group may only contain element particles",
            ));
        };
        if child.occurs.max != MaxOccurs::Bounded(1) {
            return Err(CompileError::new(
                CompileErrorKind::StructureViolation,
                format!("{} may occur at most once in an all group", name),
            ));
        }
        entries.push(AllEntry {
            name: name.clone(),
            elem: *elem,
            optional: child.occurs.min == 0,
            allow_substitution: *substitutable,
        });
    }
    Ok(AllGroup {
        required: entries.iter().filter(|e| !e.optional).count() as u32,
        entries,
        optional: particle.occurs.min == 0,
    })
}
