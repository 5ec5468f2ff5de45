//! Glushkov position automaton
//!
//! Every element or wildcard leaf of a flattened content model becomes a
//! position; one more position marks the end of the content. Bounded
//! repetitions are rendered as `plus` loops and every counted particle,
//! nested ones included, gets a [`GroupCounter`] holding its exact bounds.
//! Each follow edge records which counters it leaves, restarts and enters.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::particles::{FlatParticle, FlatTerm};
use crate::compiled::{CounterStep, ElemId, GroupCounter, PositionInfo, Symbol, SymbolKind};
use crate::components::{MaxOccurs, ModelType, NamespaceConstraint, ProcessContents};
use crate::error::{CompileError, CompileErrorKind};
use crate::namespaces::QName;

/// Fixed-width bitset over the positions of one automaton
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PositionSet {
    words: Vec<u64>,
}

impl PositionSet {
    pub fn new(width: usize) -> Self {
        Self {
            words: vec![0; (width + 63) / 64],
        }
    }

    pub fn insert(&mut self, position: u32) {
        let (word, bit) = (position as usize / 64, position % 64);
        if let Some(w) = self.words.get_mut(word) {
            *w |= 1 << bit;
        }
    }

    pub fn contains(&self, position: u32) -> bool {
        let (word, bit) = (position as usize / 64, position % 64);
        self.words.get(word).map_or(false, |w| w & (1 << bit) != 0)
    }

    pub fn union_with(&mut self, other: &PositionSet) {
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w |= o;
        }
    }

    /// Positions in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            (0..64u32)
                .filter(move |bit| word & (1 << bit) != 0)
                .map(move |bit| i as u32 * 64 + bit)
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum NodeKind {
    Seq(usize, usize),
    Alt(usize, usize),
    Star(usize),
    Plus(usize),
    Opt(usize),
}

#[derive(Debug)]
struct Node {
    /// Smallest node id in the subtree; subtrees are contiguous id ranges
    lo: usize,
    nullable: bool,
    first: PositionSet,
    last: PositionSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SymbolKey {
    Element(QName, bool),
    Wildcard(NamespaceConstraint, ProcessContents),
}

#[derive(Debug)]
struct CounterDraft {
    min: u32,
    max: MaxOccurs,
    /// The `plus` node realizing the repetition
    node: usize,
    body: usize,
}

/// Positions, follow sets and counters of one content model
#[derive(Debug)]
pub(crate) struct Glushkov {
    pub symbols: Vec<Symbol>,
    /// Content positions; the end marker is `end` and is not listed
    pub positions: Vec<PositionInfo>,
    pub end: u32,
    /// Positions that may start the content
    pub first: PositionSet,
    /// Follow set per position, end marker included
    pub follow: Vec<PositionSet>,
    pub counters: Vec<GroupCounter>,
    /// Counter updates of the follow edges that touch a counter
    pub steps: BTreeMap<(u32, u32), Vec<CounterStep>>,
}

impl Glushkov {
    /// Build the automaton for a content particle (`None` is empty content)
    pub fn build(root: Option<&FlatParticle>) -> Result<Self, CompileError> {
        let leaves = root.map_or(0, count_leaves);
        let mut builder = Builder {
            width: leaves + 1,
            nodes: Vec::new(),
            edges: Vec::new(),
            positions: Vec::with_capacity(leaves),
            symbols: Vec::new(),
            symbol_keys: HashMap::new(),
            counters: Vec::new(),
        };

        let content = root
            .map(|particle| builder.particle(particle, &[]))
            .transpose()?;
        let end = builder.positions.len() as u32;
        let end_leaf = builder.leaf(end);
        let top = match content {
            Some(content) => builder.push(NodeKind::Seq(content, end_leaf)),
            None => end_leaf,
        };

        if let Some(root) = root {
            for (symbol, (min, max)) in builder.totals(root) {
                let symbol = &mut builder.symbols[symbol as usize];
                symbol.min_total = min;
                symbol.max_total = max;
            }
        }

        let mut follow = vec![PositionSet::new(builder.width); builder.width];
        for &(p, q, _) in &builder.edges {
            follow[p as usize].insert(q);
        }
        let steps = builder.edge_steps();
        let counters = builder
            .counters
            .iter()
            .map(|draft| GroupCounter {
                min: draft.min,
                max: draft.max,
                nullable: builder.nodes[draft.body].nullable,
            })
            .collect();

        Ok(Glushkov {
            symbols: builder.symbols,
            positions: builder.positions,
            end,
            first: builder.nodes[top].first.clone(),
            follow,
            counters,
            steps,
        })
    }
}

fn count_leaves(particle: &FlatParticle) -> usize {
    match &particle.term {
        FlatTerm::Element { .. } | FlatTerm::Wildcard(_) => 1,
        FlatTerm::Group { children, .. } => children.iter().map(count_leaves).sum(),
    }
}

struct Builder {
    width: usize,
    nodes: Vec<Node>,
    /// `(from, to, node that introduced the edge)`
    edges: Vec<(u32, u32, usize)>,
    positions: Vec<PositionInfo>,
    symbols: Vec<Symbol>,
    symbol_keys: HashMap<SymbolKey, u32>,
    counters: Vec<CounterDraft>,
}

impl Builder {
    fn leaf(&mut self, position: u32) -> usize {
        let mut set = PositionSet::new(self.width);
        set.insert(position);
        let id = self.nodes.len();
        self.nodes.push(Node {
            lo: id,
            nullable: false,
            first: set.clone(),
            last: set,
        });
        id
    }

    fn push(&mut self, kind: NodeKind) -> usize {
        let id = self.nodes.len();
        let node = match kind {
            NodeKind::Seq(l, r) => {
                let (left, right) = (&self.nodes[l], &self.nodes[r]);
                for p in left.last.iter() {
                    for q in right.first.iter() {
                        self.edges.push((p, q, id));
                    }
                }
                let mut first = left.first.clone();
                if left.nullable {
                    first.union_with(&right.first);
                }
                let mut last = right.last.clone();
                if right.nullable {
                    last.union_with(&left.last);
                }
                Node {
                    lo: left.lo.min(right.lo),
                    nullable: left.nullable && right.nullable,
                    first,
                    last,
                }
            }
            NodeKind::Alt(l, r) => {
                let (left, right) = (&self.nodes[l], &self.nodes[r]);
                let mut first = left.first.clone();
                first.union_with(&right.first);
                let mut last = left.last.clone();
                last.union_with(&right.last);
                Node {
                    lo: left.lo.min(right.lo),
                    nullable: left.nullable || right.nullable,
                    first,
                    last,
                }
            }
            NodeKind::Star(c) | NodeKind::Plus(c) => {
                let child = &self.nodes[c];
                for p in child.last.iter() {
                    for q in child.first.iter() {
                        self.edges.push((p, q, id));
                    }
                }
                Node {
                    lo: child.lo,
                    nullable: matches!(kind, NodeKind::Star(_)) || child.nullable,
                    first: child.first.clone(),
                    last: child.last.clone(),
                }
            }
            NodeKind::Opt(c) => {
                let child = &self.nodes[c];
                Node {
                    lo: child.lo,
                    nullable: true,
                    first: child.first.clone(),
                    last: child.last.clone(),
                }
            }
        };
        self.nodes.push(node);
        id
    }

    fn particle(&mut self, particle: &FlatParticle, path: &[u32]) -> Result<usize, CompileError> {
        let occurs = particle.occurs;
        let counter = occurs.needs_counter().then(|| {
            self.counters.push(CounterDraft {
                min: occurs.min,
                max: occurs.max,
                node: 0,
                body: 0,
            });
            self.counters.len() - 1
        });
        let body = match counter {
            Some(c) => {
                let mut inner = path.to_vec();
                inner.push(c as u32);
                self.term(&particle.term, &inner)?
            }
            None => self.term(&particle.term, path)?,
        };

        let node = match (occurs.min, occurs.max) {
            (1, MaxOccurs::Bounded(1)) => body,
            (0, MaxOccurs::Bounded(1)) => self.push(NodeKind::Opt(body)),
            (0, MaxOccurs::Unbounded) => self.push(NodeKind::Star(body)),
            (1, MaxOccurs::Unbounded) => self.push(NodeKind::Plus(body)),
            (min, _) => {
                let plus = self.push(NodeKind::Plus(body));
                if let Some(draft) = counter.and_then(|c| self.counters.get_mut(c)) {
                    draft.node = plus;
                    draft.body = body;
                }
                if min == 0 {
                    self.push(NodeKind::Opt(plus))
                } else {
                    plus
                }
            }
        };
        Ok(node)
    }

    fn term(&mut self, term: &FlatTerm, path: &[u32]) -> Result<usize, CompileError> {
        match term {
            FlatTerm::Element {
                elem,
                name,
                substitutable,
            } => {
                let key = SymbolKey::Element(name.clone(), *substitutable);
                let kind = SymbolKind::Element {
                    name: name.clone(),
                    elem: *elem,
                    substitutable: *substitutable,
                };
                Ok(self.position(key, kind, Some(*elem), path))
            }
            FlatTerm::Wildcard(wildcard) => {
                let key =
                    SymbolKey::Wildcard(wildcard.constraint.clone(), wildcard.process_contents);
                let kind = SymbolKind::Wildcard {
                    constraint: wildcard.constraint.clone(),
                    process_contents: wildcard.process_contents,
                };
                Ok(self.position(key, kind, None, path))
            }
            FlatTerm::Group {
                kind: ModelType::All,
                ..
            } => Err(CompileError::new(
                CompileErrorKind::StructureViolation,
                "an all group must be the whole content model",
            )),
            FlatTerm::Group { kind, children } => {
                let mut node: Option<usize> = None;
                for child in children {
                    let next = self.particle(child, path)?;
                    node = Some(match node {
                        None => next,
                        Some(prev) if *kind == ModelType::Sequence => {
                            self.push(NodeKind::Seq(prev, next))
                        }
                        Some(prev) => self.push(NodeKind::Alt(prev, next)),
                    });
                }
                node.ok_or_else(|| {
                    CompileError::new(CompileErrorKind::StructureViolation, "empty model group")
                })
            }
        }
    }

    fn position(
        &mut self,
        key: SymbolKey,
        kind: SymbolKind,
        element: Option<ElemId>,
        path: &[u32],
    ) -> usize {
        let next_symbol = self.symbols.len() as u32;
        let symbol = *self.symbol_keys.entry(key).or_insert(next_symbol);
        if symbol == next_symbol {
            self.symbols.push(Symbol {
                kind,
                min_total: 0,
                max_total: MaxOccurs::Bounded(0),
            });
        }
        let position = self.positions.len() as u32;
        self.positions.push(PositionInfo {
            symbol,
            element,
            counters: path.to_vec(),
        });
        self.leaf(position)
    }

    /// Per-symbol occurrence totals over the particle tree
    fn totals(&self, particle: &FlatParticle) -> BTreeMap<u32, (u32, MaxOccurs)> {
        let mut totals = BTreeMap::new();
        match &particle.term {
            FlatTerm::Element { name, substitutable, .. } => {
                if let Some(&s) = self
                    .symbol_keys
                    .get(&SymbolKey::Element(name.clone(), *substitutable))
                {
                    totals.insert(s, (1, MaxOccurs::Bounded(1)));
                }
            }
            FlatTerm::Wildcard(wildcard) => {
                let key =
                    SymbolKey::Wildcard(wildcard.constraint.clone(), wildcard.process_contents);
                if let Some(&s) = self.symbol_keys.get(&key) {
                    totals.insert(s, (1, MaxOccurs::Bounded(1)));
                }
            }
            FlatTerm::Group { kind, children } => {
                let parts: Vec<_> = children.iter().map(|c| self.totals(c)).collect();
                let mut symbols: Vec<u32> = parts.iter().flat_map(|p| p.keys().copied()).collect();
                symbols.sort_unstable();
                symbols.dedup();
                for s in symbols {
                    let entries = parts
                        .iter()
                        .map(|p| p.get(&s).copied().unwrap_or((0, MaxOccurs::Bounded(0))));
                    let total = if *kind == ModelType::Choice {
                        entries.fold((u32::MAX, MaxOccurs::Bounded(0)), |(min, max), (a, b)| {
                            (min.min(a), max.max(b))
                        })
                    } else {
                        entries.fold((0u32, MaxOccurs::Bounded(0)), |(min, max), (a, b)| {
                            (min.saturating_add(a), max.add(b))
                        })
                    };
                    totals.insert(s, total);
                }
            }
        }
        let occurs = particle.occurs;
        for (min, max) in totals.values_mut() {
            *min = min.saturating_mul(occurs.min);
            *max = max.mul(occurs.max);
        }
        totals
    }

    /// Whether the `plus` node of `counter` lies strictly inside the subtree of `origin`
    fn crosses(&self, counter: u32, origin: usize) -> bool {
        let plus = self.counters[counter as usize].node;
        plus >= self.nodes[origin].lo && plus < origin
    }

    fn path(&self, position: u32) -> &[u32] {
        self.positions
            .get(position as usize)
            .map_or(&[][..], |info| info.counters.as_slice())
    }

    /// Counter updates per edge; an edge introduced by several nodes keeps
    /// one alternative per node
    fn edge_steps(&self) -> BTreeMap<(u32, u32), Vec<CounterStep>> {
        let mut alternatives: BTreeMap<(u32, u32), BTreeSet<CounterStep>> = BTreeMap::new();
        for &(p, q, origin) in &self.edges {
            let step = CounterStep {
                exit: self
                    .path(p)
                    .iter()
                    .rev()
                    .copied()
                    .filter(|c| self.crosses(*c, origin))
                    .collect(),
                bump: self
                    .path(p)
                    .iter()
                    .copied()
                    .find(|c| self.counters[*c as usize].node == origin),
                enter: self
                    .path(q)
                    .iter()
                    .copied()
                    .filter(|c| self.crosses(*c, origin))
                    .collect(),
            };
            alternatives.entry((p, q)).or_default().insert(step);
        }
        alternatives
            .into_iter()
            .filter(|(_, steps)| steps.iter().any(|step| !step.is_noop()))
            .map(|(edge, steps)| (edge, steps.into_iter().collect()))
            .collect()
    }
}
