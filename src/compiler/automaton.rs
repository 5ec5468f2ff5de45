//! Subset construction over Glushkov positions
//!
//! States are follow sets numbered in discovery order. Positions of one state
//! that carry the same symbol move together to the union of their follow
//! sets. Two distinct live symbols that overlap break Unique Particle
//! Attribution and fail the compile.

use std::collections::{BTreeMap, HashMap, VecDeque};

use tracing::trace;

use super::glushkov::{Glushkov, PositionSet};
use super::particles::{FlatParticle, FlatTerm};
use crate::compiled::{Dfa, ElemId, SequenceItem, SimpleSequence, Symbol, SymbolKind};
use crate::compiled::models::{AMBIGUOUS_POSITION, NO_POSITION};
use crate::components::ModelType;
use crate::error::{CompileError, CompileErrorKind};
use crate::limits::Limits;
use crate::namespaces::QName;

/// Whether two symbols can match the same element
pub(crate) trait SymbolOverlap {
    fn overlaps(&self, a: &Symbol, b: &Symbol) -> bool;

    /// Names of substitution-group members of `head`
    fn member_names(&self, head: ElemId) -> Vec<QName>;
}

/// Run subset construction and attach the lookup tables
pub(crate) fn build_dfa(
    glushkov: Glushkov,
    root: Option<&FlatParticle>,
    overlap: &dyn SymbolOverlap,
    limits: &Limits,
) -> Result<Dfa, CompileError> {
    let Glushkov {
        symbols,
        positions,
        end,
        first,
        follow,
        counters,
        steps,
    } = glushkov;
    let alphabet = symbols.len();

    let mut states: Vec<PositionSet> = vec![first.clone()];
    let mut numbering: HashMap<PositionSet, u32> = HashMap::new();
    numbering.insert(first.clone(), 0);
    limits.check_dfa_states(states.len())?;

    let mut transitions: Vec<i32> = Vec::new();
    let mut state_symbol_pos: Vec<i32> = Vec::new();
    let mut accepting = Vec::new();
    let mut state_counter = Vec::new();

    let mut queue = VecDeque::from([0usize]);
    while let Some(current) = queue.pop_front() {
        let state = states[current].clone();
        let mut matched: Vec<Vec<u32>> = vec![Vec::new(); alphabet];
        for p in state.iter().filter(|p| *p != end) {
            matched[positions[p as usize].symbol as usize].push(p);
        }

        let live: Vec<usize> = (0..alphabet).filter(|s| !matched[*s].is_empty()).collect();
        for (i, &a) in live.iter().enumerate() {
            for &b in &live[i + 1..] {
                if overlap.overlaps(&symbols[a], &symbols[b]) {
                    return Err(CompileError::new(
                        CompileErrorKind::ContentModelNotDeterministic,
                        format!(
                            "{} and {} compete for the same element",
                            symbols[a].describe(),
                            symbols[b].describe()
                        ),
                    ));
                }
            }
        }

        for carriers in &matched {
            let Some(&p) = carriers.first() else {
                transitions.push(NO_POSITION);
                state_symbol_pos.push(NO_POSITION);
                continue;
            };
            let mut next = follow[p as usize].clone();
            for q in &carriers[1..] {
                next.union_with(&follow[*q as usize]);
            }
            let target = match numbering.get(&next) {
                Some(&id) => id,
                None => {
                    limits.check_dfa_states(states.len() + 1)?;
                    let id = states.len() as u32;
                    numbering.insert(next.clone(), id);
                    states.push(next);
                    queue.push_back(id as usize);
                    id
                }
            };
            transitions.push(target as i32);
            state_symbol_pos.push(if carriers.len() == 1 {
                p as i32
            } else {
                AMBIGUOUS_POSITION
            });
        }

        accepting.push(state.contains(end));
        state_counter.push(
            state
                .iter()
                .filter(|p| *p != end)
                .find_map(|p| positions[p as usize].counters.last().copied()),
        );
    }
    trace!(states = states.len(), symbols = alphabet, "subset construction done");

    let element_index = element_index(&symbols, overlap);
    let simple_sequence = root.and_then(|root| simple_sequence(root, &symbols));

    Ok(Dfa {
        symbols,
        positions,
        first: first.iter().collect(),
        follow: follow
            .iter()
            .take(end as usize)
            .map(|set| set.iter().collect())
            .collect(),
        steps,
        transitions,
        accepting,
        state_counter,
        state_symbol_pos,
        counters,
        element_index,
        simple_sequence,
    })
}

/// Element symbols by name: exact names first, then substitution members
fn element_index(symbols: &[Symbol], overlap: &dyn SymbolOverlap) -> BTreeMap<QName, Vec<u32>> {
    let mut index: BTreeMap<QName, Vec<u32>> = BTreeMap::new();
    for (i, symbol) in symbols.iter().enumerate() {
        if let SymbolKind::Element { name, .. } = &symbol.kind {
            index.entry(name.clone()).or_default().push(i as u32);
        }
    }
    for (i, symbol) in symbols.iter().enumerate() {
        if let SymbolKind::Element {
            elem,
            substitutable: true,
            ..
        } = &symbol.kind
        {
            for member in overlap.member_names(*elem) {
                let entry = index.entry(member).or_default();
                if !entry.contains(&(i as u32)) {
                    entry.push(i as u32);
                }
            }
        }
    }
    index
}

/// Positional fast path for a flat sequence of distinct, non-substitutable
/// elements
fn simple_sequence(root: &FlatParticle, symbols: &[Symbol]) -> Option<SimpleSequence> {
    let items: Vec<&FlatParticle> = match &root.term {
        FlatTerm::Element { .. } => vec![root],
        FlatTerm::Group {
            kind: ModelType::Sequence,
            children,
        } if root.occurs.is_once() => children.iter().collect(),
        _ => return None,
    };
    let items = items
        .into_iter()
        .map(|particle| match &particle.term {
            FlatTerm::Element {
                elem,
                name,
                substitutable: false,
            } => {
                let symbol = symbols.iter().position(|s| {
                    matches!(&s.kind, SymbolKind::Element { name: n, substitutable: false, .. } if n == name)
                })?;
                Some(SequenceItem {
                    symbol: symbol as u32,
                    elem: *elem,
                    min: particle.occurs.min,
                    max: particle.occurs.max,
                })
            }
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    let mut seen: Vec<u32> = items.iter().map(|item| item.symbol).collect();
    seen.sort_unstable();
    seen.dedup();
    if seen.len() != items.len() {
        return None;
    }
    Some(SimpleSequence { items })
}
