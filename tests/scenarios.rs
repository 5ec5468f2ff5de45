//! End-to-end compile and validate scenarios
//!
//! Each test builds a schema through the component builders, compiles it
//! and drives the runtime validators through the public API only.

use pretty_assertions::assert_eq;

use xmlschema_compiler::components::{
    ComplexContent, ComplexTypeDef, DerivationMethod, DerivationSet, ElementDecl, Facet,
    NamespaceConstraint, Particle, ProcessContents, SimpleTypeDef, TypeRef, Wildcard, XsdSchema,
};
use xmlschema_compiler::compiled::FacetOp;
use xmlschema_compiler::error::{ValidationError, ValidationErrorKind};
use xmlschema_compiler::limits::Limits;
use xmlschema_compiler::namespaces::{NoNamespaces, QName};
use xmlschema_compiler::validators::{DocumentValidator, Event};
use xmlschema_compiler::{compile, CompiledSchema};

fn compiled(schema: &XsdSchema) -> CompiledSchema {
    compile(schema, &Limits::default()).expect("schema compiles")
}

fn feed_all(schema: &CompiledSchema, type_name: &str, children: &[&str]) -> Vec<ValidationError> {
    let id = schema.type_by_name(&QName::local(type_name)).expect("type exists");
    let mut validator = schema.content_validator(id).expect("complex type");
    let mut errors = Vec::new();
    for child in children {
        if let Err(e) = validator.feed(&QName::local(child)) {
            errors.push(e);
        }
    }
    errors.extend(validator.close());
    errors
}

// ============================================================================
// Repeating sequence with optional tail
// ============================================================================

#[test]
fn test_repeating_sequence_with_optional_tail() {
    let mut schema = XsdSchema::new(None);
    schema.add_complex_type(ComplexTypeDef::element_only(
        Some("R"),
        Particle::sequence(vec![
            Particle::element(ElementDecl::new("a")).occurs(1, 2),
            Particle::element(ElementDecl::new("b")).optional(),
        ])
        .occurs(2, 2),
    ));
    let compiled = compiled(&schema);

    for word in [
        &["a", "a"][..],
        &["a", "a", "b"],
        &["a", "b", "a"],
        &["a", "b", "a", "b"],
        &["a", "a", "a"],
        &["a", "a", "a", "a"],
    ] {
        let errors = feed_all(&compiled, "R", word);
        assert!(errors.is_empty(), "{:?} rejected: {:?}", word, errors);
    }
    for word in [&["a"][..], &["a", "a", "a", "a", "a"]] {
        assert!(
            !feed_all(&compiled, "R", word).is_empty(),
            "{:?} accepted",
            word
        );
    }
}

// ============================================================================
// Attribute wildcard restriction
// ============================================================================

#[test]
fn test_attribute_wildcard_restriction() {
    let mut schema = XsdSchema::new(None);
    schema
        .add_complex_type(
            ComplexTypeDef::new(Some("B"), ComplexContent::Empty).with_any_attribute(Wildcard::new(
                NamespaceConstraint::set([Some("urn:a"), Some("urn:b")]),
                ProcessContents::Lax,
            )),
        )
        .add_complex_type(
            ComplexTypeDef::derived(
                Some("D"),
                TypeRef::named(QName::local("B")),
                DerivationMethod::Restriction,
                None,
            )
            .with_any_attribute(Wildcard::new(
                NamespaceConstraint::set([Some("urn:a")]),
                ProcessContents::Lax,
            )),
        );
    let compiled = compiled(&schema);
    let d = compiled.type_by_name(&QName::local("D")).unwrap();
    let wildcard = compiled
        .type_entry(d)
        .and_then(|t| t.as_complex())
        .and_then(|ct| ct.any_attribute.as_ref())
        .expect("D keeps a wildcard");
    assert!(wildcard.allows(QName::namespaced("urn:a", "x").namespace()));
    assert!(!wildcard.allows(QName::namespaced("urn:b", "x").namespace()));
}

// ============================================================================
// Substitution group with blocked restriction
// ============================================================================

#[test]
fn test_substitution_group_with_blocked_restriction() {
    let text = || Particle::sequence(vec![Particle::element(ElementDecl::new("text"))]);
    let mut schema = XsdSchema::new(None);
    schema
        .add_complex_type(ComplexTypeDef::element_only(Some("CommentType"), text()))
        .add_complex_type(ComplexTypeDef::derived(
            Some("ShipCommentType"),
            TypeRef::named(QName::local("CommentType")),
            DerivationMethod::Extension,
            Some(Particle::sequence(vec![Particle::element(ElementDecl::new("ship"))])),
        ))
        .add_complex_type(ComplexTypeDef::derived(
            Some("CustomerCommentType"),
            TypeRef::named(QName::local("CommentType")),
            DerivationMethod::Restriction,
            Some(text()),
        ))
        .add_element(
            ElementDecl::new("comment")
                .with_type(TypeRef::named(QName::local("CommentType")))
                .with_block(DerivationSet::of(&[DerivationMethod::Restriction])),
        )
        .add_element(
            ElementDecl::new("shipComment")
                .with_type(TypeRef::named(QName::local("ShipCommentType")))
                .substitutes(QName::local("comment")),
        )
        .add_element(
            ElementDecl::new("customerComment")
                .with_type(TypeRef::named(QName::local("CustomerCommentType")))
                .substitutes(QName::local("comment")),
        );
    let compiled = compiled(&schema);
    let comment = compiled.element_by_name(&QName::local("comment")).unwrap();
    let ship = compiled.element_by_name(&QName::local("shipComment")).unwrap();
    assert_eq!(compiled.substitutes(comment), &[ship][..]);
}

// ============================================================================
// Decimal facet chain
// ============================================================================

#[test]
fn test_decimal_facet_chain() {
    let mut schema = XsdSchema::new(None);
    schema.add_simple_type(
        SimpleTypeDef::restriction(Some("Money"), TypeRef::xsd("decimal"))
            .with_facet(Facet::fraction_digits(2))
            .with_facet(Facet::total_digits(12)),
    );
    let compiled = compiled(&schema);
    let money = compiled.type_by_name(&QName::local("Money")).unwrap();
    let validator = compiled.simple_validator(money).unwrap();

    assert!(validator.validate("1.5", &NoNamespaces).is_ok());
    assert!(validator.validate("1234567890.12", &NoNamespaces).is_ok());
    assert_eq!(
        validator.validate("1.555", &NoNamespaces).unwrap_err().kind,
        ValidationErrorKind::FacetViolation(FacetOp::FractionDigits)
    );
    assert_eq!(
        validator.validate("12345678901.12", &NoNamespaces).unwrap_err().kind,
        ValidationErrorKind::FacetViolation(FacetOp::TotalDigits)
    );
}

// ============================================================================
// List of IDs with length
// ============================================================================

#[test]
fn test_list_of_ids_with_length() {
    let mut schema = XsdSchema::new(None);
    schema
        .add_simple_type(SimpleTypeDef::list(Some("idItems"), TypeRef::xsd("ID")))
        .add_simple_type(
            SimpleTypeDef::restriction(Some("idList"), TypeRef::named(QName::local("idItems")))
                .with_facet(Facet::min_length(1)),
        )
        .add_element(ElementDecl::new("ids").with_type(TypeRef::named(QName::local("idList"))));
    let compiled = compiled(&schema);
    let ids = compiled.type_by_name(&QName::local("idList")).unwrap();
    let validator = compiled.simple_validator(ids).unwrap();

    let value = validator.validate("a b c", &NoNamespaces).unwrap();
    assert_eq!(value.items.len(), 3);
    assert_eq!(
        validator.validate("", &NoNamespaces).unwrap_err().kind,
        ValidationErrorKind::FacetViolation(FacetOp::MinLength)
    );
    // the value itself is fine; uniqueness is a document-level check
    assert!(validator.validate("a a", &NoNamespaces).is_ok());
    let errors = DocumentValidator::validate_events(
        &compiled,
        vec![
            Event::start(QName::local("ids")),
            Event::chars("a a"),
            Event::End,
        ],
    );
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ValidationErrorKind::DuplicateId);
}

// ============================================================================
// All group with optional entry and substitution
// ============================================================================

fn all_group_schema() -> CompiledSchema {
    let mut schema = XsdSchema::new(None);
    schema
        .add_element(ElementDecl::new("head"))
        .add_element(ElementDecl::new("sub").substitutes(QName::local("head")))
        .add_element(ElementDecl::new("root").with_type(TypeRef::complex(
            ComplexTypeDef::element_only(
                None,
                Particle::all(vec![
                    Particle::element(ElementDecl::new("a")),
                    Particle::element(ElementDecl::new("b")).optional(),
                    Particle::element_ref(QName::local("head")),
                ]),
            ),
        )));
    compiled(&schema)
}

fn document(children: &[&str]) -> Vec<Event> {
    let mut events = vec![Event::start(QName::local("root"))];
    for child in children {
        events.push(Event::start(QName::local(child)));
        events.push(Event::End);
    }
    events.push(Event::End);
    events
}

#[test]
fn test_all_group_with_optional_and_substitution() {
    let compiled = all_group_schema();

    let accepted = DocumentValidator::validate_events(&compiled, document(&["a", "sub"]));
    assert!(accepted.is_empty(), "{:?}", accepted);

    let duplicate = DocumentValidator::validate_events(&compiled, document(&["a", "a"]));
    assert!(duplicate
        .iter()
        .any(|e| e.message.contains("duplicate in all group")));

    let missing = DocumentValidator::validate_events(&compiled, document(&["a"]));
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].kind, ValidationErrorKind::RequiredElementMissing);
    assert!(missing[0].message.contains("required element `head` missing"));
}
