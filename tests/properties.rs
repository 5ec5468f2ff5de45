//! Whole-pipeline properties: determinism, purity, coverage, UPA,
//! canonical round-trips and content models against a regex oracle

use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use regex::Regex;

use xmlschema_compiler::compiled::SymbolKind;
use xmlschema_compiler::components::{
    AttributeDecl, AttributeUseDecl, ComplexTypeDef, DerivationMethod, ElementDecl, Facet,
    MaxOccurs, ModelGroupDef, ModelType, Occurs, Particle, Primitive, SimpleTypeDef, TypeRef,
    ValueConstraint, XsdSchema,
};
use xmlschema_compiler::error::CompileErrorKind;
use xmlschema_compiler::limits::Limits;
use xmlschema_compiler::namespaces::{NoNamespaces, QName};
use xmlschema_compiler::values::{canonicalize, parse_atomic};
use xmlschema_compiler::compile;

const NS: &str = "urn:orders";

fn q(local: &str) -> QName {
    QName::namespaced(NS, local)
}

fn orders_schema() -> XsdSchema {
    let mut schema = XsdSchema::new(Some(NS));
    schema
        .add_simple_type(
            SimpleTypeDef::restriction(Some("Sku"), TypeRef::xsd("token"))
                .with_facet(Facet::pattern("[A-Z]{3}-[0-9]{4}")),
        )
        .add_simple_type(
            SimpleTypeDef::restriction(Some("Status"), TypeRef::xsd("string"))
                .with_facet(Facet::enumeration("open"))
                .with_facet(Facet::enumeration("shipped"))
                .with_facet(Facet::enumeration("closed")),
        )
        .add_group(ModelGroupDef::new(
            "lineItems",
            ModelType::Sequence,
            vec![Particle::element(
                ElementDecl::new("line").with_type(TypeRef::named(q("Line"))),
            )
            .occurs(1, 50)],
        ))
        .add_complex_type(
            ComplexTypeDef::element_only(
                Some("Line"),
                Particle::sequence(vec![
                    Particle::element(ElementDecl::new("sku").with_type(TypeRef::named(q("Sku")))),
                    Particle::element(
                        ElementDecl::new("qty").with_type(TypeRef::xsd("positiveInteger")),
                    ),
                ]),
            )
            .with_attribute(AttributeUseDecl::local(
                AttributeDecl::new("status")
                    .with_type(TypeRef::named(q("Status")))
                    .with_default(ValueConstraint::new("open")),
            )),
        )
        .add_complex_type(ComplexTypeDef::element_only(
            Some("Order"),
            Particle::sequence(vec![
                Particle::element(ElementDecl::new("placed").with_type(TypeRef::xsd("dateTime"))),
                Particle::group_ref(q("lineItems")),
                Particle::choice(vec![
                    Particle::element(ElementDecl::new("pickup")),
                    Particle::element(ElementDecl::new("ship").with_type(TypeRef::xsd("string"))),
                ])
                .optional(),
            ]),
        ))
        .add_complex_type(ComplexTypeDef::derived(
            Some("RushOrder"),
            TypeRef::named(q("Order")),
            DerivationMethod::Extension,
            Some(Particle::sequence(vec![Particle::element(
                ElementDecl::new("deadline").with_type(TypeRef::xsd("date")),
            )])),
        ))
        .add_element(ElementDecl::new("order").with_type(TypeRef::named(q("Order"))))
        .add_element(
            ElementDecl::new("rushOrder")
                .with_type(TypeRef::named(q("RushOrder")))
                .substitutes(q("order")),
        );
    schema
}

#[test]
fn test_compile_is_deterministic() {
    let schema = orders_schema();
    let first = compile(&schema, &Limits::default()).unwrap();
    let second = compile(&schema, &Limits::default()).unwrap();
    assert_eq!(first.digest(), second.digest());
    assert_eq!(first.digest().len(), 64);
}

#[test]
fn test_compile_leaves_input_untouched() {
    let schema = orders_schema();
    let before = schema.clone();
    compile(&schema, &Limits::default()).unwrap();
    assert_eq!(schema, before);
}

#[test]
fn test_clone_compiles_to_same_digest() {
    let schema = orders_schema();
    let cloned = schema.clone();
    assert_eq!(
        compile(&schema, &Limits::default()).unwrap().digest(),
        compile(&cloned, &Limits::default()).unwrap().digest()
    );
}

#[test]
fn test_different_schemas_differ() {
    let mut other = orders_schema();
    other.add_element(ElementDecl::new("extra"));
    assert_ne!(
        compile(&orders_schema(), &Limits::default()).unwrap().digest(),
        compile(&other, &Limits::default()).unwrap().digest()
    );
}

#[test]
fn test_registry_coverage() {
    let schema = orders_schema();
    let compiled = compile(&schema, &Limits::default()).unwrap();

    for decl in &schema.elements {
        assert!(compiled.element_by_name(&q(&decl.name)).is_some(), "{}", decl.name);
    }
    for local in ["line", "sku", "qty", "placed", "pickup", "ship", "deadline"] {
        assert!(
            compiled.elements.iter().any(|e| e.name == QName::local(local)),
            "{} not registered",
            local
        );
    }
    for element in &compiled.elements {
        assert!(element.type_id.index() < compiled.types.len());
        if let Some(validator) = element.validator {
            assert!(compiled.tables.validator(validator).is_some());
        }
    }
    for attribute in &compiled.attributes {
        assert!(compiled.tables.validator(attribute.validator).is_some());
    }
    for (type_id, validator) in &compiled.type_validators {
        assert!(type_id.index() < compiled.types.len());
        assert!(compiled.tables.validator(*validator).is_some());
    }
}

#[test]
fn test_every_dfa_state_is_unambiguous() {
    let compiled = compile(&orders_schema(), &Limits::default()).unwrap();
    for (_, content) in compiled.content_models() {
        let Some(dfa) = content.dfa() else { continue };
        for state in 0..dfa.state_count() as u32 {
            let mut names = BTreeSet::new();
            for symbol in dfa.expected(state) {
                if let SymbolKind::Element { name, .. } = &symbol.kind {
                    assert!(names.insert(name.clone()), "{} twice in state {}", name, state);
                }
            }
        }
    }
}

#[test]
fn test_dfa_state_limit_is_enforced() {
    let limits = Limits {
        max_dfa_states: 2,
        ..Limits::default()
    };
    let err = compile(&orders_schema(), &limits).unwrap_err();
    assert_eq!(err.compile_kind(), Some(CompileErrorKind::DFAStateLimitExceeded));
}

#[test]
fn test_strict_limits_from_json() {
    let limits = Limits::from_json(r#"{"maxDFAStates": 64, "maxOccursLimit": 10}"#).unwrap();
    assert_eq!(limits.max_dfa_states, 64);
    assert!(compile(&orders_schema(), &limits).is_ok());
}

proptest! {
    #[test]
    fn prop_decimal_canonical_is_stable(lexical in "[+-]?[0-9]{1,12}(\\.[0-9]{0,6})?") {
        let key = canonicalize(Primitive::Decimal, &lexical, &NoNamespaces).unwrap();
        let canonical = parse_atomic(Primitive::Decimal, None, None, &lexical, &NoNamespaces)
            .unwrap()
            .canonical();
        let again = canonicalize(Primitive::Decimal, &canonical, &NoNamespaces).unwrap();
        prop_assert_eq!(key, again);
    }

    #[test]
    fn prop_double_canonical_is_stable(value in -1.0e12f64..1.0e12f64) {
        let lexical = value.to_string();
        let canonical = parse_atomic(Primitive::Double, None, None, &lexical, &NoNamespaces)
            .unwrap()
            .canonical();
        let twice = parse_atomic(Primitive::Double, None, None, &canonical, &NoNamespaces)
            .unwrap()
            .canonical();
        prop_assert_eq!(canonical, twice);
    }

    #[test]
    fn prop_boolean_and_duration_canonical_is_stable(
        flag in prop_oneof!["true", "false", "1", "0"],
        years in 0u32..100,
        days in 0u32..400,
    ) {
        for (primitive, lexical) in [
            (Primitive::Boolean, flag.clone()),
            (Primitive::Duration, format!("P{}Y{}D", years, days)),
        ] {
            let canonical = parse_atomic(primitive, None, None, &lexical, &NoNamespaces)
                .unwrap()
                .canonical();
            let first = canonicalize(primitive, &lexical, &NoNamespaces).unwrap();
            let second = canonicalize(primitive, &canonical, &NoNamespaces).unwrap();
            prop_assert_eq!(first, second);
        }
    }

    #[test]
    fn prop_compile_digest_is_reproducible(extra in proptest::collection::vec("[a-z]{1,8}", 0..6)) {
        let mut schema = orders_schema();
        for name in &extra {
            schema.add_element(ElementDecl::new(&format!("x{}", name)).with_type(TypeRef::xsd("int")));
        }
        // duplicate global names are a separate concern
        let unique: BTreeSet<_> = extra.iter().collect();
        prop_assume!(unique.len() == extra.len());
        let a = compile(&schema, &Limits::default()).unwrap().digest();
        let b = compile(&schema.clone(), &Limits::default()).unwrap().digest();
        prop_assert_eq!(a, b);
    }
}

// ============================================================================
// Content models against a regex oracle
// ============================================================================

type Bounds = (u32, Option<u32>);

/// A particle tree over the element names a, b and c
#[derive(Debug, Clone)]
enum Model {
    Leaf(char, Bounds),
    Seq(Vec<Model>, Bounds),
    Choice(Vec<Model>, Bounds),
}

impl Model {
    fn particle(&self) -> Particle {
        let (particle, bounds) = match self {
            Model::Leaf(name, bounds) => {
                (Particle::element(ElementDecl::new(&name.to_string())), bounds)
            }
            Model::Seq(children, bounds) => {
                (Particle::sequence(children.iter().map(Model::particle).collect()), bounds)
            }
            Model::Choice(children, bounds) => {
                (Particle::choice(children.iter().map(Model::particle).collect()), bounds)
            }
        };
        let (min, max) = *bounds;
        let max = max.map_or(MaxOccurs::Unbounded, MaxOccurs::Bounded);
        particle.with_occurs(Occurs::new(min, max))
    }

    fn regex(&self) -> String {
        let (body, (min, max)) = match self {
            Model::Leaf(name, bounds) => (name.to_string(), bounds),
            Model::Seq(children, bounds) => {
                (children.iter().map(Model::regex).collect::<String>(), bounds)
            }
            Model::Choice(children, bounds) => (
                children.iter().map(Model::regex).collect::<Vec<_>>().join("|"),
                bounds,
            ),
        };
        match max {
            Some(max) => format!("(?:{}){{{},{}}}", body, min, max),
            None => format!("(?:{}){{{},}}", body, min),
        }
    }
}

fn bounds() -> impl Strategy<Value = Bounds> {
    prop_oneof![
        2 => Just((1, Some(1))),
        3 => (1u32..=3).prop_flat_map(|max| (0..=max).prop_map(move |min| (min, Some(max)))),
        1 => (0u32..=2).prop_map(|min| (min, None)),
    ]
}

fn model() -> impl Strategy<Value = Model> {
    let leaf = (prop_oneof![Just('a'), Just('b'), Just('c')], bounds())
        .prop_map(|(name, bounds)| Model::Leaf(name, bounds));
    leaf.prop_recursive(3, 12, 3, |inner| {
        prop_oneof![
            (proptest::collection::vec(inner.clone(), 1..=3), bounds())
                .prop_map(|(children, bounds)| Model::Seq(children, bounds)),
            (proptest::collection::vec(inner, 1..=3), bounds())
                .prop_map(|(children, bounds)| Model::Choice(children, bounds)),
        ]
    })
}

/// Every word over {a, b, c} of length at most five
fn short_words() -> Vec<String> {
    let mut words = vec![String::new()];
    let mut frontier = vec![String::new()];
    for _ in 0..5 {
        frontier = frontier
            .iter()
            .flat_map(|word| ['a', 'b', 'c'].into_iter().map(move |c| format!("{}{}", word, c)))
            .collect();
        words.extend(frontier.iter().cloned());
    }
    words
}

#[test]
fn test_nested_counters_match_oracle() {
    // (a, c{0,2}){2,4} | (b{2}, a{0,3}){1,4} | (a{2}, b?){2,3} | (c{2,}, a?){0,4}
    let leaf = |name, min, max| Model::Leaf(name, (min, max));
    let cases = [
        Model::Seq(vec![leaf('a', 1, Some(1)), leaf('c', 0, Some(2))], (2, Some(4))),
        Model::Seq(vec![leaf('b', 2, Some(2)), leaf('a', 0, Some(3))], (1, Some(4))),
        Model::Seq(vec![leaf('a', 2, Some(2)), leaf('b', 0, Some(1))], (2, Some(3))),
        Model::Seq(vec![leaf('c', 2, None), leaf('a', 0, Some(1))], (0, Some(4))),
        Model::Seq(vec![leaf('a', 2, Some(2)), leaf('a', 0, Some(1))], (1, Some(1))),
    ];
    for model in &cases {
        let mismatches = oracle_mismatches(model).expect("model compiles");
        assert!(mismatches.is_empty(), "{}: {:?}", model.regex(), mismatches);
    }
}

/// Words on which the content validator and the regex disagree; `None`
/// when the model exceeds the automaton state limit
fn oracle_mismatches(model: &Model) -> Option<Vec<String>> {
    let mut schema = XsdSchema::new(None);
    schema.add_complex_type(ComplexTypeDef::element_only(
        Some("T"),
        Particle::sequence(vec![model.particle()]),
    ));
    let compiled = match compile(&schema, &Limits::default()) {
        Ok(compiled) => compiled,
        Err(e) => {
            assert_eq!(e.compile_kind(), Some(CompileErrorKind::DFAStateLimitExceeded));
            return None;
        }
    };
    let id = compiled.type_by_name(&QName::local("T")).unwrap();
    let mut validator = compiled.content_validator(id).unwrap();
    let oracle = Regex::new(&format!("^(?:{})$", model.regex())).unwrap();

    let mut mismatches = Vec::new();
    for word in short_words() {
        validator.reset();
        let mut accepted = true;
        for name in word.chars() {
            accepted &= validator.feed(&QName::local(&name.to_string())).is_ok();
        }
        accepted &= validator.close().is_empty();
        if accepted != oracle.is_match(&word) {
            mismatches.push(word);
        }
    }
    Some(mismatches)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn prop_content_validator_agrees_with_regex(model in model()) {
        if let Some(mismatches) = oracle_mismatches(&model) {
            prop_assert!(mismatches.is_empty(), "{}: {:?}", model.regex(), mismatches);
        }
    }
}
