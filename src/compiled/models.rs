//! Compiled content models
//!
//! A complex type's element content compiles to either a [`Dfa`] (Glushkov
//! position automaton plus occurrence counters) or an [`AllGroup`]. Both
//! are plain data; the executors live in [`crate::validators`].

use std::collections::BTreeMap;

use super::{ElemId, ValidatorId};
use crate::components::{MaxOccurs, NamespaceConstraint, ProcessContents};
use crate::namespaces::QName;

/// `state_symbol_pos` entry when no position of the state uses the symbol
pub const NO_POSITION: i32 = -1;

/// `state_symbol_pos` entry when several positions of the state share the symbol
pub const AMBIGUOUS_POSITION: i32 = -2;

/// What a DFA symbol matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    /// A declared element
    Element {
        /// Effective name
        name: QName,
        /// Representative declaration (the first position using the symbol)
        elem: ElemId,
        /// Whether members of the element's substitution group match too
        substitutable: bool,
    },
    /// `xs:any`
    Wildcard {
        /// Allowed namespaces
        constraint: NamespaceConstraint,
        /// How matched children are processed
        process_contents: ProcessContents,
    },
}

/// An alphabet entry with its occurrence totals over the whole model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// What the symbol matches
    pub kind: SymbolKind,
    /// Minimum number of occurrences in any accepted sequence
    pub min_total: u32,
    /// Maximum number of occurrences in any accepted sequence
    pub max_total: MaxOccurs,
}

impl Symbol {
    /// Element name, for element symbols
    pub fn element_name(&self) -> Option<&QName> {
        match &self.kind {
            SymbolKind::Element { name, .. } => Some(name),
            SymbolKind::Wildcard { .. } => None,
        }
    }

    /// Human readable rendering for error messages
    pub fn describe(&self) -> String {
        match &self.kind {
            SymbolKind::Element { name, .. } => name.to_string(),
            SymbolKind::Wildcard { constraint, .. } => format!("any({})", constraint),
        }
    }
}

/// A Glushkov position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionInfo {
    /// Symbol index
    pub symbol: u32,
    /// Element declaration of this leaf (`None` for wildcards)
    pub element: Option<ElemId>,
    /// Counters of the enclosing counted particles, outermost first
    pub counters: Vec<u32>,
}

/// Exact `{min,max}` bounds of one counted particle
///
/// The automaton only knows the particle loops; the counter says how many
/// iterations have been started since the particle was entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCounter {
    /// Minimum iterations
    pub min: u32,
    /// Maximum iterations
    pub max: MaxOccurs,
    /// Body accepts the empty sequence, so missing iterations may be empty
    pub nullable: bool,
}

/// Counter updates carried by one follow edge
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CounterStep {
    /// Counters left by the edge, innermost first; each must have reached its minimum
    pub exit: Vec<u32>,
    /// Counter whose particle starts another iteration
    pub bump: Option<u32>,
    /// Counters entered by the edge, outermost first; each starts at one
    pub enter: Vec<u32>,
}

impl CounterStep {
    /// Edge that touches no counter
    pub fn is_noop(&self) -> bool {
        self.exit.is_empty() && self.bump.is_none() && self.enter.is_empty()
    }
}

static NO_STEP: CounterStep = CounterStep {
    exit: Vec::new(),
    bump: None,
    enter: Vec::new(),
};

/// One item of a positional element sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceItem {
    /// Symbol index in the owning DFA
    pub symbol: u32,
    /// Element declaration
    pub elem: ElemId,
    /// minOccurs
    pub min: u32,
    /// maxOccurs
    pub max: MaxOccurs,
}

/// Fast path for a flat sequence of element particles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleSequence {
    /// Items in order
    pub items: Vec<SequenceItem>,
}

/// Deterministic content-model automaton
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dfa {
    /// Alphabet
    pub symbols: Vec<Symbol>,
    /// Glushkov positions (the end marker is not listed)
    pub positions: Vec<PositionInfo>,
    /// Positions that may start the content, end marker included
    pub first: Vec<u32>,
    /// Sorted follow set per position; the end marker is `positions.len()`
    pub follow: Vec<Vec<u32>>,
    /// Counter updates per follow edge; edges that never touch a counter are absent
    pub steps: BTreeMap<(u32, u32), Vec<CounterStep>>,
    /// `transitions[state * symbols.len() + symbol]`, `-1` when absent
    pub transitions: Vec<i32>,
    /// Accepting flag per state
    pub accepting: Vec<bool>,
    /// Innermost counter of the first counted position in each state
    pub state_counter: Vec<Option<u32>>,
    /// Matched position per state and symbol, same layout as `transitions`
    pub state_symbol_pos: Vec<i32>,
    /// Group counters
    pub counters: Vec<GroupCounter>,
    /// Element symbols by name
    pub element_index: BTreeMap<QName, Vec<u32>>,
    /// Positional fast path, when the model is a flat element sequence
    pub simple_sequence: Option<SimpleSequence>,
}

impl Dfa {
    /// Number of states
    pub fn state_count(&self) -> usize {
        self.accepting.len()
    }

    fn cell(&self, state: u32, symbol: u32) -> usize {
        state as usize * self.symbols.len() + symbol as usize
    }

    /// Next state, if the transition exists
    pub fn next(&self, state: u32, symbol: u32) -> Option<u32> {
        match self.transitions.get(self.cell(state, symbol)) {
            Some(&next) if next >= 0 => Some(next as u32),
            _ => None,
        }
    }

    /// Position matched by `symbol` in `state`, unless several share it
    pub fn matched_position(&self, state: u32, symbol: u32) -> Option<u32> {
        match self.state_symbol_pos.get(self.cell(state, symbol)) {
            Some(&pos) if pos >= 0 => Some(pos as u32),
            _ => None,
        }
    }

    /// Whether several positions of `state` carry `symbol`
    pub fn is_ambiguous(&self, state: u32, symbol: u32) -> bool {
        self.state_symbol_pos.get(self.cell(state, symbol)) == Some(&AMBIGUOUS_POSITION)
    }

    /// The end marker position
    pub fn end(&self) -> u32 {
        self.positions.len() as u32
    }

    /// Positions reachable from `from`, or from the start when `None`
    pub fn successors(&self, from: Option<u32>) -> &[u32] {
        match from {
            None => &self.first,
            Some(p) => self.follow.get(p as usize).map_or(&[][..], Vec::as_slice),
        }
    }

    /// Alternative counter updates of the edge `from -> to`
    pub fn steps(&self, from: u32, to: u32) -> &[CounterStep] {
        match self.steps.get(&(from, to)) {
            Some(steps) => steps,
            None => std::slice::from_ref(&NO_STEP),
        }
    }

    /// Whether `state` accepts
    pub fn is_accepting(&self, state: u32) -> bool {
        self.accepting.get(state as usize).copied().unwrap_or(false)
    }

    /// Symbols with a transition out of `state`
    pub fn expected(&self, state: u32) -> Vec<&Symbol> {
        (0..self.symbols.len() as u32)
            .filter(|s| self.next(state, *s).is_some())
            .map(|s| &self.symbols[s as usize])
            .collect()
    }
}

/// One element of an all group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllEntry {
    /// Effective element name
    pub name: QName,
    /// Declaration
    pub elem: ElemId,
    /// `minOccurs="0"`
    pub optional: bool,
    /// Substitution-group members match too
    pub allow_substitution: bool,
}

/// Order-insensitive `xs:all` model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllGroup {
    /// Entries in declaration order
    pub entries: Vec<AllEntry>,
    /// Number of required entries
    pub required: u32,
    /// The group itself has `minOccurs="0"`
    pub optional: bool,
}

/// Element content: automaton or all group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementModel {
    /// Sequence/choice content
    Dfa(Dfa),
    /// `xs:all` content
    All(AllGroup),
}

/// Compiled content of a complex type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentModel {
    /// No children and no character data
    Empty,
    /// Character data only
    Simple {
        /// Text validator
        validator: ValidatorId,
    },
    /// Element children
    Elements {
        /// The model
        model: ElementModel,
        /// Character data allowed between children
        mixed: bool,
    },
}

impl ContentModel {
    /// Whether non-whitespace text is allowed
    pub fn allows_text(&self) -> bool {
        match self {
            ContentModel::Empty => false,
            ContentModel::Simple { .. } => true,
            ContentModel::Elements { mixed, .. } => *mixed,
        }
    }

    /// The automaton, if any
    pub fn dfa(&self) -> Option<&Dfa> {
        match self {
            ContentModel::Elements {
                model: ElementModel::Dfa(dfa),
                ..
            } => Some(dfa),
            _ => None,
        }
    }
}
