//! Event-stream document validation
//!
//! Drives the element protocol over a `{Start, End, Chars}` stream: the root
//! is looked up among the global elements, children are matched by their
//! parent's content model, and wildcard matches are handled according to
//! their `processContents`. Every fault is collected; validation never stops
//! early.

use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::compiled::{CompiledSchema, ElemId, IdentityRole};
use crate::components::ProcessContents;
use crate::error::{ValidationError, ValidationErrorKind};
use crate::namespaces::{resolve_qname, NamespaceContext, QName};
use crate::XSI_NAMESPACE;

use super::elements::ElementValidator;
use super::simple_types::SimpleValue;

/// One parsing event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Start tag
    Start {
        /// Element name
        name: QName,
        /// Attributes in document order
        attributes: Vec<(QName, String)>,
        /// Namespace bindings in scope at this element
        namespaces: NamespaceContext,
    },
    /// End tag
    End,
    /// Character data
    Chars(String),
}

impl Event {
    /// Start tag without attributes or bindings
    pub fn start(name: QName) -> Self {
        Event::Start {
            name,
            attributes: Vec::new(),
            namespaces: NamespaceContext::new(),
        }
    }

    /// Character data
    pub fn chars(text: impl Into<String>) -> Self {
        Event::Chars(text.into())
    }

    /// Add an attribute to a start tag; other events are returned unchanged
    pub fn with_attribute(mut self, name: QName, value: impl Into<String>) -> Self {
        if let Event::Start { attributes, .. } = &mut self {
            attributes.push((name, value.into()));
        }
        self
    }

    /// Bind a prefix on a start tag; other events are returned unchanged
    pub fn with_namespace(mut self, prefix: &str, uri: &str) -> Self {
        if let Event::Start { namespaces, .. } = &mut self {
            namespaces.add_prefix(prefix, uri);
        }
        self
    }
}

enum Frame<'a> {
    Element {
        validator: ElementValidator<'a>,
        namespaces: NamespaceContext,
    },
    /// Matched by a lax wildcard without a declaration
    Lax,
    /// Not validated
    Skip,
}

/// Validates one document from its event stream
pub struct DocumentValidator<'a> {
    schema: &'a CompiledSchema,
    stack: Vec<Frame<'a>>,
    path: Vec<String>,
    errors: Vec<ValidationError>,
    ids: BTreeSet<String>,
    idrefs: Vec<(String, String)>,
    seen_root: bool,
}

impl<'a> DocumentValidator<'a> {
    /// Validator for a fresh document
    pub fn new(schema: &'a CompiledSchema) -> Self {
        Self {
            schema,
            stack: Vec::new(),
            path: Vec::new(),
            errors: Vec::new(),
            ids: BTreeSet::new(),
            idrefs: Vec::new(),
            seen_root: false,
        }
    }

    /// Validate a complete event stream
    pub fn validate_events(
        schema: &CompiledSchema,
        events: impl IntoIterator<Item = Event>,
    ) -> Vec<ValidationError> {
        let mut validator = DocumentValidator::new(schema);
        for event in events {
            validator.handle(event);
        }
        validator.finish()
    }

    fn current_path(&self) -> String {
        format!("/{}", self.path.join("/"))
    }

    fn report(&mut self, error: ValidationError) {
        let error = match error.path {
            Some(_) => error,
            None => error.with_path(self.current_path()),
        };
        trace!(code = error.code(), "{}", error.message);
        self.errors.push(error);
    }

    fn record_identity(&mut self, value: &SimpleValue) {
        for (role, token) in value.identity_tokens() {
            match role {
                IdentityRole::Id => {
                    if !self.ids.insert(token.to_string()) {
                        self.report(ValidationError::new(
                            ValidationErrorKind::DuplicateId,
                            format!("ID '{}' is not unique", token),
                        ));
                    }
                }
                IdentityRole::IdRef => {
                    let path = self.current_path();
                    self.idrefs.push((token.to_string(), path));
                }
            }
        }
    }

    /// Process one event
    pub fn handle(&mut self, event: Event) {
        match event {
            Event::Start {
                name,
                attributes,
                namespaces,
            } => self.start(name, attributes, namespaces),
            Event::End => self.end(),
            Event::Chars(text) => {
                if let Some(Frame::Element { validator, .. }) = self.stack.last_mut() {
                    if let Err(e) = validator.bind_text(&text) {
                        self.report(e);
                    }
                }
            }
        }
    }

    /// Declaration to open for a child named `name`, or the frame to push
    fn child_declaration(&mut self, name: &QName) -> Result<ElemId, Frame<'a>> {
        let parent = match self.stack.last_mut() {
            None => {
                if self.seen_root {
                    self.report(ValidationError::new(
                        ValidationErrorKind::UnexpectedElement,
                        format!("second root element {}", name),
                    ));
                    return Err(Frame::Skip);
                }
                self.seen_root = true;
                return self.schema.element_by_name(name).ok_or_else(|| {
                    self.report(ValidationError::new(
                        ValidationErrorKind::UnexpectedElement,
                        format!("no global declaration for root element {}", name),
                    ));
                    Frame::Skip
                });
            }
            Some(frame) => frame,
        };
        let matched = match parent {
            Frame::Skip => return Err(Frame::Skip),
            Frame::Lax => return self.schema.element_by_name(name).ok_or(Frame::Lax),
            Frame::Element { validator, .. } => validator.feed_child(name),
        };
        let matched = match matched {
            Ok(matched) => matched,
            Err(e) => {
                self.report(e);
                return Err(Frame::Skip);
            }
        };
        if let Some(elem) = matched.matched_elem {
            return Ok(elem);
        }
        match matched.process_contents {
            Some(ProcessContents::Lax) => Err(Frame::Lax),
            Some(ProcessContents::Strict) => {
                self.report(ValidationError::new(
                    ValidationErrorKind::UnexpectedElement,
                    format!("no declaration for {} matched by a strict wildcard", name),
                ));
                Err(Frame::Skip)
            }
            _ => Err(Frame::Skip),
        }
    }

    fn start(&mut self, name: QName, attributes: Vec<(QName, String)>, namespaces: NamespaceContext) {
        let elem = self.child_declaration(&name);
        self.path.push(name.to_string());
        let elem = match elem {
            Ok(elem) => elem,
            Err(frame) => {
                self.stack.push(frame);
                return;
            }
        };

        let mut xsi_type = None;
        let mut nil = false;
        for (attr, value) in &attributes {
            if attr.namespace() != Some(XSI_NAMESPACE) {
                continue;
            }
            match attr.local_name() {
                "type" => match resolve_qname(value.trim(), &namespaces)
                    .and_then(|t| self.schema.type_by_name(&t))
                {
                    Some(t) => xsi_type = Some(t),
                    None => self.report(ValidationError::new(
                        ValidationErrorKind::InvalidQName,
                        format!("xsi:type '{}' names no known type", value),
                    )),
                },
                "nil" => nil = matches!(value.trim(), "true" | "1"),
                _ => {}
            }
        }

        let mut validator = match ElementValidator::open_element(self.schema, elem, xsi_type) {
            Ok(validator) => validator,
            Err(e) => {
                self.report(e);
                self.stack.push(Frame::Skip);
                return;
            }
        };
        if nil {
            if let Err(e) = validator.set_nil(true) {
                self.report(e);
            }
        }
        for (attr, value) in &attributes {
            if attr.namespace() == Some(XSI_NAMESPACE) {
                continue;
            }
            match validator.bind_attribute(attr, value, &namespaces) {
                Ok(Some(value)) => self.record_identity(&value),
                Ok(None) => {}
                Err(e) => self.report(e.with_sub_code(attr.to_string())),
            }
        }
        self.stack.push(Frame::Element {
            validator,
            namespaces,
        });
    }

    fn end(&mut self) {
        let Some(frame) = self.stack.pop() else {
            debug!("end event without a matching start");
            return;
        };
        if let Frame::Element {
            validator,
            namespaces,
        } = frame
        {
            let outcome = validator.close(&namespaces);
            for error in outcome.errors {
                self.report(error);
            }
            if let Some(value) = &outcome.value {
                self.record_identity(value);
            }
        }
        self.path.pop();
    }

    /// Close anything left open and check IDREFs; returns every fault
    pub fn finish(mut self) -> Vec<ValidationError> {
        while !self.stack.is_empty() {
            self.report(ValidationError::new(
                ValidationErrorKind::RequiredElementMissing,
                "document ended inside an open element",
            ));
            self.end();
        }
        let idrefs = std::mem::take(&mut self.idrefs);
        for (token, path) in idrefs {
            if !self.ids.contains(&token) {
                self.errors.push(
                    ValidationError::new(
                        ValidationErrorKind::UnknownIdRef,
                        format!("IDREF '{}' has no matching ID", token),
                    )
                    .with_path(path),
                );
            }
        }
        debug!(errors = self.errors.len(), "document validated");
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{
        AttributeDecl, AttributeUseDecl, ComplexContent, ComplexTypeDef, ElementDecl,
        NamespaceConstraint, Occurs, Particle, TypeRef, Wildcard, XsdSchema,
    };
    use crate::limits::Limits;

    fn schema() -> CompiledSchema {
        let mut schema = XsdSchema::new(None);
        schema.add_element(ElementDecl::new("doc").with_type(TypeRef::complex(
            ComplexTypeDef::element_only(
                None,
                Particle::sequence(vec![
                    Particle::element(
                        ElementDecl::new("node")
                            .with_type(TypeRef::complex(
                                ComplexTypeDef::new(None, ComplexContent::Empty)
                                    .with_attribute(
                                        AttributeUseDecl::local(
                                            AttributeDecl::new("id").with_type(TypeRef::xsd("ID")),
                                        )
                                        .required(),
                                    )
                                    .with_attribute(AttributeUseDecl::local(
                                        AttributeDecl::new("ref").with_type(TypeRef::xsd("IDREFS")),
                                    )),
                            )),
                    )
                    .with_occurs(Occurs::zero_or_more()),
                    Particle::wildcard(Wildcard::new(
                        NamespaceConstraint::set([Some("urn:ext")]),
                        ProcessContents::Skip,
                    ))
                    .optional(),
                ]),
            ),
        )));
        crate::compiler::compile(&schema, &Limits::default()).unwrap()
    }

    fn node(id: &str) -> Event {
        Event::start(QName::local("node")).with_attribute(QName::local("id"), id)
    }

    #[test]
    fn test_ids_and_idrefs() {
        let compiled = schema();
        let errors = DocumentValidator::validate_events(
            &compiled,
            vec![
                Event::start(QName::local("doc")),
                node("a"),
                Event::End,
                node("b").with_attribute(QName::local("ref"), "a c"),
                Event::End,
                node("a"),
                Event::End,
                Event::End,
            ],
        );
        let kinds: Vec<_> = errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![ValidationErrorKind::DuplicateId, ValidationErrorKind::UnknownIdRef]
        );
        assert_eq!(errors[1].path.as_deref(), Some("/doc/node"));
    }

    #[test]
    fn test_skip_wildcard_and_unknown_root() {
        let compiled = schema();
        let errors = DocumentValidator::validate_events(
            &compiled,
            vec![
                Event::start(QName::local("doc")),
                Event::start(QName::namespaced("urn:ext", "blob")),
                Event::start(QName::local("anything")),
                Event::chars("free text"),
                Event::End,
                Event::End,
                Event::End,
            ],
        );
        assert!(errors.is_empty(), "{:?}", errors);

        let errors = DocumentValidator::validate_events(
            &compiled,
            vec![Event::start(QName::local("nope")), Event::End],
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "d");
    }

    #[test]
    fn test_unclosed_document() {
        let compiled = schema();
        let errors = DocumentValidator::validate_events(
            &compiled,
            vec![Event::start(QName::local("doc")), node("x")],
        );
        assert!(errors
            .iter()
            .any(|e| e.message.contains("document ended inside an open element")));
    }
}
