//! Content-model executors
//!
//! [`ContentValidator`] consumes child element names in document order and
//! dispatches to the DFA executor, the positional sequence fast path or the
//! all-group validator depending on the compiled [`ContentModel`].

use std::collections::BTreeSet;

use crate::compiled::{
    ContentModel, CounterStep, Dfa, ElemId, ElementModel, GroupCounter, SimpleSequence,
    SubstitutionPolicy, SymbolKind,
};
use crate::components::{MaxOccurs, ProcessContents};
use crate::error::{ValidationError, ValidationErrorKind, ValidationResult};
use crate::namespaces::QName;

use super::all_group::AllGroupValidator;

/// Outcome of feeding one child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    /// Declaration governing the child, when known
    pub matched_elem: Option<ElemId>,
    /// Matched through `xs:any`
    pub is_wildcard: bool,
    /// Processing mode for wildcard matches
    pub process_contents: Option<ProcessContents>,
}

impl MatchResult {
    fn element(elem: ElemId) -> Self {
        Self {
            matched_elem: Some(elem),
            is_wildcard: false,
            process_contents: None,
        }
    }
}

fn unexpected(name: &QName, detail: &str) -> ValidationError {
    ValidationError::new(
        ValidationErrorKind::UnexpectedElement,
        format!("element {} not expected{}", name, detail),
    )
}

fn describe_expected(dfa: &Dfa, state: u32) -> String {
    let expected: Vec<String> = dfa.expected(state).iter().map(|s| s.describe()).collect();
    if expected.is_empty() {
        String::new()
    } else {
        format!("; expected {}", expected.join(" | "))
    }
}

/// One way the children seen so far can be matched: the position of the
/// last child and the iteration count of every counted particle
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Configuration {
    position: u32,
    counts: Vec<u32>,
}

/// Counter bound a follow edge would break
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CounterFault {
    Min(u32),
    Max(u32),
}

/// Keep the first maximum violation, else the first minimum one
fn worse(current: Option<CounterFault>, next: CounterFault) -> Option<CounterFault> {
    match (current, next) {
        (None, next) | (Some(CounterFault::Min(_)), next @ CounterFault::Max(_)) => Some(next),
        (current, _) => current,
    }
}

/// Counts after taking an edge carrying `step`
fn apply(
    counters: &[GroupCounter],
    counts: &[u32],
    step: &CounterStep,
) -> Result<Vec<u32>, CounterFault> {
    let mut counts = counts.to_vec();
    for &c in &step.exit {
        let counter = &counters[c as usize];
        if counts[c as usize] < counter.min && !counter.nullable {
            return Err(CounterFault::Min(c));
        }
        counts[c as usize] = 0;
    }
    if let Some(c) = step.bump {
        let counter = &counters[c as usize];
        let next = counts[c as usize].saturating_add(1);
        if counter.max.is_exceeded(next) {
            return Err(CounterFault::Max(c));
        }
        // past the minimum an unbounded counter needs no exact value
        counts[c as usize] = match counter.max {
            MaxOccurs::Unbounded => next.min(counter.min.max(1)),
            MaxOccurs::Bounded(_) => next,
        };
    }
    for &c in &step.enter {
        counts[c as usize] = 1;
    }
    Ok(counts)
}

fn fault_error(dfa: &Dfa, fault: CounterFault) -> ValidationError {
    match fault {
        CounterFault::Min(c) => ValidationError::new(
            ValidationErrorKind::MinOccursUnsatisfied,
            format!(
                "repeated particle ended before its minimum of {} iterations",
                dfa.counters[c as usize].min
            ),
        ),
        CounterFault::Max(c) => ValidationError::new(
            ValidationErrorKind::MaxOccursExceeded,
            format!(
                "repeated particle exceeds its maximum of {} iterations",
                dfa.counters[c as usize].max
            ),
        ),
    }
}

/// Executes a content DFA with exact occurrence accounting
///
/// The DFA state decides which symbols may come next. When the model has
/// counted particles the validator also keeps every [`Configuration`] the
/// input can be in; a child is accepted only if some configuration takes it
/// without breaking a counter bound.
#[derive(Clone)]
pub struct DfaValidator<'a> {
    dfa: &'a Dfa,
    policy: &'a dyn SubstitutionPolicy,
    state: u32,
    started: bool,
    counts: Vec<u32>,
    configurations: BTreeSet<Configuration>,
    child_index: usize,
}

impl<'a> DfaValidator<'a> {
    /// Validator positioned at the start state
    pub fn new(dfa: &'a Dfa, policy: &'a dyn SubstitutionPolicy) -> Self {
        Self {
            dfa,
            policy,
            state: 0,
            started: false,
            counts: vec![0; dfa.symbols.len()],
            configurations: BTreeSet::new(),
            child_index: 0,
        }
    }

    /// Back to the start state, keeping the allocations
    pub fn reset(&mut self) {
        self.state = 0;
        self.started = false;
        self.counts.iter_mut().for_each(|c| *c = 0);
        self.configurations.clear();
        self.child_index = 0;
    }

    /// Current DFA state
    pub fn state(&self) -> u32 {
        self.state
    }

    fn tracks_counters(&self) -> bool {
        !self.dfa.counters.is_empty()
    }

    /// Candidate symbols for `name`, in preference order
    fn candidates(&self, name: &QName) -> Vec<(u32, Option<ElemId>)> {
        let mut candidates = Vec::new();
        let actual = self.policy.global_element(name);

        if let Some(symbols) = self.dfa.element_index.get(name) {
            for &s in symbols {
                let exact = self.dfa.symbols[s as usize].element_name() == Some(name);
                candidates.push((s, if exact { None } else { actual }));
            }
        }
        if let Some(actual) = actual {
            for (s, symbol) in self.dfa.symbols.iter().enumerate() {
                if let SymbolKind::Element {
                    elem,
                    substitutable: true,
                    ..
                } = &symbol.kind
                {
                    let s = s as u32;
                    if !candidates.iter().any(|(c, _)| *c == s)
                        && *elem != actual
                        && self.policy.is_substitutable(actual, *elem)
                    {
                        candidates.push((s, Some(actual)));
                    }
                }
            }
        }
        for (s, symbol) in self.dfa.symbols.iter().enumerate() {
            if let SymbolKind::Wildcard { constraint, .. } = &symbol.kind {
                if constraint.allows(name.namespace()) {
                    candidates.push((s as u32, None));
                }
            }
        }
        candidates
    }

    /// Pick the candidate that can move from the current state
    fn find_best_match(&self, name: &QName) -> Option<(u32, Option<ElemId>)> {
        let candidates = self.candidates(name);
        candidates
            .iter()
            .copied()
            .find(|(s, _)| self.dfa.next(self.state, *s).is_some())
            .or_else(|| candidates.first().copied())
    }

    /// Configurations after consuming `symbol`, with the bound that
    /// eliminated the others
    fn advance(&self, symbol: u32) -> (BTreeSet<Configuration>, Option<CounterFault>) {
        let mut next = BTreeSet::new();
        let mut fault = None;
        if !self.started {
            let start = vec![0; self.dfa.counters.len()];
            self.extend(None, &start, symbol, &mut next, &mut fault);
        }
        for config in &self.configurations {
            self.extend(Some(config.position), &config.counts, symbol, &mut next, &mut fault);
        }
        (next, fault)
    }

    fn extend(
        &self,
        from: Option<u32>,
        counts: &[u32],
        symbol: u32,
        next: &mut BTreeSet<Configuration>,
        fault: &mut Option<CounterFault>,
    ) {
        for &q in self.dfa.successors(from) {
            let Some(info) = self.dfa.positions.get(q as usize) else {
                continue;
            };
            if info.symbol != symbol {
                continue;
            }
            let Some(p) = from else {
                let mut counts = counts.to_vec();
                for &c in &info.counters {
                    counts[c as usize] = 1;
                }
                next.insert(Configuration { position: q, counts });
                continue;
            };
            for step in self.dfa.steps(p, q) {
                match apply(&self.dfa.counters, counts, step) {
                    Ok(counts) => {
                        next.insert(Configuration { position: q, counts });
                    }
                    Err(f) => *fault = worse(*fault, f),
                }
            }
        }
    }

    /// Consume one child element
    pub fn feed(&mut self, name: &QName) -> ValidationResult<MatchResult> {
        let index = self.child_index;
        self.child_index += 1;
        self.step(name).map_err(|e| e.with_child_index(index))
    }

    fn step(&mut self, name: &QName) -> ValidationResult<MatchResult> {
        let Some((symbol, substitute)) = self.find_best_match(name) else {
            return Err(unexpected(name, &describe_expected(self.dfa, self.state)));
        };
        let Some(next) = self.dfa.next(self.state, symbol) else {
            let detail = describe_expected(self.dfa, self.state);
            return Err(if self.dfa.is_accepting(self.state) {
                unexpected(name, &detail)
            } else {
                ValidationError::new(
                    ValidationErrorKind::RequiredElementMissing,
                    format!("required element missing before {}{}", name, detail),
                )
            });
        };

        let configurations = if self.tracks_counters() {
            let (configurations, fault) = self.advance(symbol);
            if configurations.is_empty() {
                return Err(match fault {
                    Some(fault) => fault_error(self.dfa, fault),
                    None => unexpected(name, &describe_expected(self.dfa, self.state)),
                });
            }
            Some(configurations)
        } else {
            None
        };

        let symbol_info = &self.dfa.symbols[symbol as usize];
        let count = self.counts[symbol as usize] + 1;
        if symbol_info.max_total.is_exceeded(count) {
            return Err(ValidationError::new(
                ValidationErrorKind::MaxOccursExceeded,
                format!(
                    "{} occurs more than {} times",
                    symbol_info.describe(),
                    symbol_info.max_total
                ),
            ));
        }

        let position = self.dfa.matched_position(self.state, symbol);
        self.counts[symbol as usize] = count;
        self.state = next;
        self.started = true;
        if let Some(configurations) = configurations {
            self.configurations = configurations;
        }

        let mut result = match &symbol_info.kind {
            SymbolKind::Element { elem, .. } => {
                let declared = position
                    .and_then(|p| self.dfa.positions[p as usize].element)
                    .unwrap_or(*elem);
                MatchResult {
                    matched_elem: substitute.or(Some(declared)),
                    is_wildcard: false,
                    process_contents: None,
                }
            }
            SymbolKind::Wildcard {
                process_contents, ..
            } => MatchResult {
                matched_elem: None,
                is_wildcard: true,
                process_contents: Some(*process_contents),
            },
        };
        if result.is_wildcard && result.process_contents != Some(ProcessContents::Skip) {
            result.matched_elem = self.policy.global_element(name);
        }
        Ok(result)
    }

    /// Whether some configuration can end the content here
    fn can_finish(&self) -> Result<(), Option<CounterFault>> {
        let end = self.dfa.end();
        let mut fault = None;
        for config in &self.configurations {
            if self.dfa.successors(Some(config.position)).binary_search(&end).is_err() {
                continue;
            }
            for step in self.dfa.steps(config.position, end) {
                match apply(&self.dfa.counters, &config.counts, step) {
                    Ok(_) => return Ok(()),
                    Err(f) => fault = worse(fault, f),
                }
            }
        }
        Err(fault)
    }

    /// Check the end of content; every finding is reported
    pub fn close(&mut self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if !self.dfa.is_accepting(self.state) {
            errors.push(ValidationError::new(
                ValidationErrorKind::RequiredElementMissing,
                format!(
                    "content ended early{}",
                    describe_expected(self.dfa, self.state)
                ),
            ));
        } else if self.tracks_counters() && self.started {
            if let Err(fault) = self.can_finish() {
                errors.push(match fault {
                    Some(fault) => fault_error(self.dfa, fault),
                    None => ValidationError::new(
                        ValidationErrorKind::MinOccursUnsatisfied,
                        "content ended inside a repeated particle",
                    ),
                });
            }
        }
        if !errors.is_empty() {
            return errors;
        }
        for (symbol, count) in self.dfa.symbols.iter().zip(&self.counts) {
            if *count < symbol.min_total {
                errors.push(ValidationError::new(
                    ValidationErrorKind::MinOccursUnsatisfied,
                    format!(
                        "{} occurs {} times, at least {} required",
                        symbol.describe(),
                        count,
                        symbol.min_total
                    ),
                ));
            }
        }
        errors
    }
}

/// Positional executor for a flat element sequence
#[derive(Debug, Clone)]
pub struct SimpleSequenceValidator<'a> {
    dfa: &'a Dfa,
    sequence: &'a SimpleSequence,
    item: usize,
    count: u32,
    child_index: usize,
}

impl<'a> SimpleSequenceValidator<'a> {
    /// Validator at the first item
    pub fn new(dfa: &'a Dfa, sequence: &'a SimpleSequence) -> Self {
        Self {
            dfa,
            sequence,
            item: 0,
            count: 0,
            child_index: 0,
        }
    }

    /// Back to the first item
    pub fn reset(&mut self) {
        self.item = 0;
        self.count = 0;
        self.child_index = 0;
    }

    fn item_name(&self, item: usize) -> Option<&'a QName> {
        let symbol = self.sequence.items.get(item)?.symbol;
        self.dfa.symbols.get(symbol as usize)?.element_name()
    }

    /// Consume one child element
    pub fn feed(&mut self, name: &QName) -> ValidationResult<MatchResult> {
        let index = self.child_index;
        self.child_index += 1;
        self.step(name).map_err(|e| e.with_child_index(index))
    }

    fn step(&mut self, name: &QName) -> ValidationResult<MatchResult> {
        let known = self.dfa.element_index.contains_key(name);
        while let Some(item) = self.sequence.items.get(self.item) {
            if self.item_name(self.item) == Some(name) && !item.max.is_exceeded(self.count + 1) {
                self.count += 1;
                return Ok(MatchResult::element(item.elem));
            }
            if self.count < item.min {
                let expected = self.item_name(self.item).map(ToString::to_string);
                return Err(if known {
                    ValidationError::new(
                        ValidationErrorKind::RequiredElementMissing,
                        format!(
                            "required element {} missing before {}",
                            expected.unwrap_or_default(),
                            name
                        ),
                    )
                } else {
                    unexpected(name, "")
                });
            }
            self.item += 1;
            self.count = 0;
        }
        Err(unexpected(name, ""))
    }

    /// Check that every remaining item is satisfied
    pub fn close(&mut self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for (i, item) in self.sequence.items.iter().enumerate().skip(self.item) {
            let seen = if i == self.item { self.count } else { 0 };
            if seen < item.min {
                errors.push(ValidationError::new(
                    ValidationErrorKind::RequiredElementMissing,
                    format!(
                        "required element {} missing",
                        self.item_name(i).map(ToString::to_string).unwrap_or_default()
                    ),
                ));
            }
        }
        errors
    }
}

#[derive(Clone)]
enum Engine<'a> {
    NoChildren,
    Dfa(DfaValidator<'a>),
    Sequence(SimpleSequenceValidator<'a>),
    All(AllGroupValidator<'a>),
}

/// Runs the content model of one complex type
///
/// Cheap to create; carries only per-element scratch so it can be pooled
/// with [`ContentValidator::reset`].
#[derive(Clone)]
pub struct ContentValidator<'a> {
    content: &'a ContentModel,
    engine: Engine<'a>,
    child_index: usize,
}

impl<'a> ContentValidator<'a> {
    /// Validator for `content`, resolving substitutions through `policy`
    pub fn new(content: &'a ContentModel, policy: &'a dyn SubstitutionPolicy) -> Self {
        let engine = match content {
            ContentModel::Empty | ContentModel::Simple { .. } => Engine::NoChildren,
            ContentModel::Elements {
                model: ElementModel::Dfa(dfa),
                ..
            } => match &dfa.simple_sequence {
                Some(sequence) => Engine::Sequence(SimpleSequenceValidator::new(dfa, sequence)),
                None => Engine::Dfa(DfaValidator::new(dfa, policy)),
            },
            ContentModel::Elements {
                model: ElementModel::All(all),
                ..
            } => Engine::All(AllGroupValidator::new(all, policy)),
        };
        Self {
            content,
            engine,
            child_index: 0,
        }
    }

    /// The model being validated
    pub fn content(&self) -> &'a ContentModel {
        self.content
    }

    /// Whether character data may appear
    pub fn allows_text(&self) -> bool {
        self.content.allows_text()
    }

    /// Consume one child element name
    pub fn feed(&mut self, name: &QName) -> ValidationResult<MatchResult> {
        let index = self.child_index;
        self.child_index += 1;
        match &mut self.engine {
            Engine::NoChildren => Err(unexpected(name, "; the content model has no elements")
                .with_child_index(index)),
            Engine::Dfa(v) => v.feed(name),
            Engine::Sequence(v) => v.feed(name),
            Engine::All(v) => v.feed(name),
        }
    }

    /// End of content
    pub fn close(&mut self) -> Vec<ValidationError> {
        match &mut self.engine {
            Engine::NoChildren => Vec::new(),
            Engine::Dfa(v) => v.close(),
            Engine::Sequence(v) => v.close(),
            Engine::All(v) => v.close(),
        }
    }

    /// Ready for the next element of the same type
    pub fn reset(&mut self) {
        self.child_index = 0;
        match &mut self.engine {
            Engine::NoChildren => {}
            Engine::Dfa(v) => v.reset(),
            Engine::Sequence(v) => v.reset(),
            Engine::All(v) => v.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiled::CompiledSchema;
    use crate::components::{
        ComplexTypeDef, ElementDecl, NamespaceConstraint, Occurs, Particle, Wildcard, XsdSchema,
    };
    use crate::limits::Limits;

    fn e(name: &str) -> Particle {
        Particle::element(ElementDecl::new(name))
    }

    fn seq(particles: Vec<Particle>) -> Particle {
        Particle::sequence(particles)
    }

    fn unbounded(particle: Particle, min: u32) -> Particle {
        particle.with_occurs(Occurs::new(min, MaxOccurs::Unbounded))
    }

    fn compiled(content: Particle) -> CompiledSchema {
        let mut schema = XsdSchema::new(None);
        schema.add_complex_type(ComplexTypeDef::element_only(Some("T"), content));
        crate::compile(&schema, &Limits::default()).unwrap()
    }

    fn validator(schema: &CompiledSchema) -> ContentValidator<'_> {
        let id = schema.type_by_name(&QName::local("T")).unwrap();
        schema.content_validator(id).unwrap()
    }

    fn run(schema: &CompiledSchema, word: &[&str]) -> Vec<ValidationError> {
        let mut validator = validator(schema);
        let mut errors = Vec::new();
        for name in word {
            if let Err(e) = validator.feed(&QName::local(name)) {
                errors.push(e);
            }
        }
        errors.extend(validator.close());
        errors
    }

    fn accepts(schema: &CompiledSchema, word: &[&str]) -> bool {
        run(schema, word).is_empty()
    }

    /// `(a{1,2}, b?){2}`
    fn repeating_sequence() -> CompiledSchema {
        compiled(seq(vec![e("a").occurs(1, 2), e("b").optional()]).occurs(2, 2))
    }

    #[test]
    fn test_repeating_sequence_acceptance() {
        let schema = repeating_sequence();
        for word in [
            &["a", "a"][..],
            &["a", "a", "b"],
            &["a", "b", "a"],
            &["a", "b", "a", "b"],
            &["a", "a", "a"],
            &["a", "a", "a", "a"],
        ] {
            assert!(accepts(&schema, word), "{:?} should be accepted", word);
        }
    }

    #[test]
    fn test_repeating_sequence_rejection() {
        let schema = repeating_sequence();
        let short = run(&schema, &["a"]);
        assert_eq!(short[0].kind, ValidationErrorKind::MinOccursUnsatisfied);
        let long = run(&schema, &["a", "a", "a", "a", "a"]);
        assert_eq!(long[0].kind, ValidationErrorKind::MaxOccursExceeded);
        assert_eq!(long[0].child_index, Some(4));
        let thrice = run(&schema, &["a", "b", "a", "b", "a"]);
        assert_eq!(thrice[0].kind, ValidationErrorKind::MaxOccursExceeded);
    }

    #[test]
    fn test_error_codes_distinguish_missing_from_unexpected() {
        let schema = repeating_sequence();
        let mut validator = validator(&schema);
        let missing = validator.feed(&QName::local("b")).unwrap_err();
        assert_eq!(missing.code(), "b");
        let unknown = validator.feed(&QName::local("zzz")).unwrap_err();
        assert_eq!(unknown.code(), "d");
        assert_eq!(unknown.child_index, Some(1));
    }

    #[test]
    fn test_counter_restarts_through_enclosing_loop() {
        // (a{2}, b?)*
        let schema = compiled(unbounded(seq(vec![e("a").occurs(2, 2), e("b").optional()]), 0));
        assert!(accepts(&schema, &[]));
        assert!(accepts(&schema, &["a", "a", "a", "a"]));
        assert!(accepts(&schema, &["a", "a", "b", "a", "a"]));
        assert_eq!(
            run(&schema, &["a", "a", "a"])[0].kind,
            ValidationErrorKind::MinOccursUnsatisfied
        );
        assert_eq!(
            run(&schema, &["a", "b"])[0].kind,
            ValidationErrorKind::MinOccursUnsatisfied
        );
    }

    #[test]
    fn test_inner_counter_bounds_every_iteration() {
        // (a, c{0,2}){2,4}
        let schema = compiled(seq(vec![e("a"), e("c").occurs(0, 2)]).occurs(2, 4));
        assert!(accepts(&schema, &["a", "c", "c", "a", "c", "c"]));
        assert!(accepts(&schema, &["a", "a", "a", "a"]));
        let errors = run(&schema, &["a", "a", "c", "c", "c"]);
        assert_eq!(errors[0].kind, ValidationErrorKind::MaxOccursExceeded);
        assert_eq!(errors[0].child_index, Some(4));
    }

    #[test]
    fn test_inner_minimum_checked_when_iteration_moves_on() {
        // (b{2}, a{0,3}){1,4}
        let schema = compiled(seq(vec![e("b").occurs(2, 2), e("a").occurs(0, 3)]).occurs(1, 4));
        assert!(accepts(&schema, &["b", "b", "a", "b", "b"]));
        let errors = run(&schema, &["b", "a", "b"]);
        assert_eq!(errors[0].kind, ValidationErrorKind::MinOccursUnsatisfied);
        assert_eq!(errors[0].child_index, Some(1));
    }

    #[test]
    fn test_inner_remainder_checked_at_end() {
        // (a{2}, b?){2,3}
        let schema = compiled(seq(vec![e("a").occurs(2, 2), e("b").optional()]).occurs(2, 3));
        let a = |n: usize| vec!["a"; n];
        assert!(accepts(&schema, &a(4)));
        assert!(accepts(&schema, &a(6)));
        assert_eq!(
            run(&schema, &a(5))[0].kind,
            ValidationErrorKind::MinOccursUnsatisfied
        );
        assert_eq!(
            run(&schema, &a(7))[0].kind,
            ValidationErrorKind::MaxOccursExceeded
        );
    }

    #[test]
    fn test_unbounded_inner_counter_below_minimum() {
        // (c{2,}, a?){0,4}
        let schema = compiled(seq(vec![unbounded(e("c"), 2), e("a").optional()]).occurs(0, 4));
        assert!(accepts(&schema, &[]));
        assert!(accepts(&schema, &["c", "c"]));
        assert!(accepts(&schema, &["c", "c", "c", "a", "c", "c"]));
        assert_eq!(
            run(&schema, &["c"])[0].kind,
            ValidationErrorKind::MinOccursUnsatisfied
        );
    }

    #[test]
    fn test_counted_element_then_optional_same_element() {
        // (a{2}, a?)
        let schema = compiled(seq(vec![e("a").occurs(2, 2), e("a").optional()]));
        assert!(accepts(&schema, &["a", "a"]));
        assert!(accepts(&schema, &["a", "a", "a"]));
        assert_eq!(
            run(&schema, &["a"])[0].kind,
            ValidationErrorKind::MinOccursUnsatisfied
        );
        let four = run(&schema, &["a", "a", "a", "a"]);
        assert_eq!(four[0].code(), "d");
        assert_eq!(four[0].child_index, Some(3));
    }

    #[test]
    fn test_wildcard_match_result() {
        let schema = compiled(
            Particle::wildcard(Wildcard::new(
                NamespaceConstraint::set([Some("urn:x")]),
                ProcessContents::Lax,
            ))
            .with_occurs(Occurs::zero_or_more()),
        );
        let mut validator = validator(&schema);
        let matched = validator.feed(&QName::namespaced("urn:x", "any")).unwrap();
        assert!(matched.is_wildcard);
        assert_eq!(matched.process_contents, Some(ProcessContents::Lax));
        assert_eq!(matched.matched_elem, None);
        assert_eq!(
            validator.feed(&QName::local("other")).unwrap_err().kind,
            ValidationErrorKind::UnexpectedElement
        );
        assert!(validator.close().is_empty());
    }

    #[test]
    fn test_simple_sequence_fast_path() {
        let schema = compiled(seq(vec![e("a"), unbounded(e("b"), 0)]));
        let id = schema.type_by_name(&QName::local("T")).unwrap();
        let dfa = schema.content_model(id).and_then(ContentModel::dfa).unwrap();
        assert!(dfa.simple_sequence.is_some());

        let mut validator = validator(&schema);
        assert!(validator.feed(&QName::local("a")).unwrap().matched_elem.is_some());
        validator.feed(&QName::local("b")).unwrap();
        validator.feed(&QName::local("b")).unwrap();
        assert_eq!(validator.feed(&QName::local("a")).unwrap_err().code(), "d");
        assert!(validator.close().is_empty());

        validator.reset();
        let missing = validator.feed(&QName::local("b")).unwrap_err();
        assert_eq!(missing.code(), "b");
        assert_eq!(validator.close().len(), 1);
    }

    #[test]
    fn test_empty_content_rejects_children() {
        struct NoSubstitution;

        impl SubstitutionPolicy for NoSubstitution {
            fn global_element(&self, _name: &QName) -> Option<ElemId> {
                None
            }

            fn is_substitutable(&self, actual: ElemId, declared: ElemId) -> bool {
                actual == declared
            }
        }

        let content = ContentModel::Empty;
        let mut validator = ContentValidator::new(&content, &NoSubstitution);
        assert_eq!(
            validator.feed(&QName::local("x")).unwrap_err().kind,
            ValidationErrorKind::UnexpectedElement
        );
        assert!(validator.close().is_empty());
    }
}
