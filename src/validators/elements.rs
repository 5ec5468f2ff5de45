//! The element event protocol
//!
//! One [`ElementValidator`] is opened per element instance. The caller binds
//! attributes, feeds child names, collects text and closes it:
//!
//! ```text
//! open -> bind_attribute* -> (feed_child | bind_text)* -> close
//! ```
//!
//! Each step reports its own [`ValidationError`]; the element stays usable
//! after an error so every fault of a document can be collected.

use crate::compiled::{
    AttributeUse, CompiledSchema, ComplexTypeEntry, ContentModel, ElemId, ElementEntry, TypeEntry,
    TypeId, ValidatorId, ValueConstraintRef,
};
use crate::components::{DerivationSet, ProcessContents};
use crate::error::{ValidationError, ValidationErrorKind, ValidationResult};
use crate::namespaces::{NamespaceResolver, QName};

use super::models::{ContentValidator, MatchResult};
use super::simple_types::{SimpleTypeValidator, SimpleValue};

/// What [`ElementValidator::close`] found
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementOutcome {
    /// Every fault reported at close
    pub errors: Vec<ValidationError>,
    /// Validated text value, for simple and simple-content types
    pub value: Option<SimpleValue>,
    /// Defaults supplied for absent optional attributes, by name
    pub default_attributes: Vec<(QName, String)>,
    /// Element default supplied for empty text
    pub default_text: Option<String>,
}

fn fixed_mismatch(what: &str, fixed: &ValueConstraintRef, actual: &str) -> ValidationError {
    ValidationError::new(
        ValidationErrorKind::FixedMismatch,
        format!("{} is fixed to '{}', found '{}'", what, fixed.lexical, actual),
    )
}

/// Validation state of one element instance
pub struct ElementValidator<'a> {
    schema: &'a CompiledSchema,
    elem: Option<&'a ElementEntry>,
    type_id: TypeId,
    complex: Option<&'a ComplexTypeEntry>,
    content: Option<ContentValidator<'a>>,
    text_validator: Option<ValidatorId>,
    seen: Vec<bool>,
    text: String,
    has_children: bool,
    nil: bool,
}

impl<'a> ElementValidator<'a> {
    /// Open an element governed by type `type_id` alone
    pub fn open(schema: &'a CompiledSchema, type_id: TypeId) -> ValidationResult<Self> {
        let entry = schema.type_entry(type_id).ok_or_else(|| {
            ValidationError::new(
                ValidationErrorKind::UnexpectedElement,
                format!("unknown type {}", type_id.0),
            )
        })?;
        let complex = entry.as_complex();
        if complex.map_or(false, |ct| ct.is_abstract) {
            return Err(ValidationError::new(
                ValidationErrorKind::AbstractType,
                format!("type {} is abstract", entry.display_name()),
            ));
        }
        let text_validator = match entry {
            TypeEntry::Simple(st) => Some(st.validator),
            TypeEntry::Complex(ct) => match ct.content {
                ContentModel::Simple { validator } => Some(validator),
                _ => None,
            },
        };
        Ok(Self {
            schema,
            elem: None,
            type_id,
            complex,
            content: complex.map(|ct| ContentValidator::new(&ct.content, schema)),
            text_validator,
            seen: vec![false; complex.map_or(0, |ct| ct.attributes.len())],
            text: String::new(),
            has_children: false,
            nil: false,
        })
    }

    /// Open an instance of element `elem`, optionally retyped by `xsi:type`
    pub fn open_element(
        schema: &'a CompiledSchema,
        elem: ElemId,
        xsi_type: Option<TypeId>,
    ) -> ValidationResult<Self> {
        let decl = schema.element(elem).ok_or_else(|| {
            ValidationError::new(
                ValidationErrorKind::UnexpectedElement,
                format!("unknown element {}", elem.0),
            )
        })?;
        if decl.is_abstract {
            return Err(ValidationError::new(
                ValidationErrorKind::AbstractType,
                format!("element {} is abstract", decl.name),
            ));
        }
        let type_id = match xsi_type {
            Some(actual) if actual != decl.type_id => {
                let blocked: DerivationSet = decl.block.union(
                    schema
                        .type_entry(decl.type_id)
                        .map_or(DerivationSet::empty(), TypeEntry::block),
                );
                if !schema.is_derived_from(actual, decl.type_id, blocked) {
                    return Err(ValidationError::new(
                        ValidationErrorKind::UnexpectedElement,
                        format!(
                            "xsi:type of {} does not validly derive from its declared type",
                            decl.name
                        ),
                    ));
                }
                actual
            }
            _ => decl.type_id,
        };
        let mut validator = Self::open(schema, type_id)?;
        validator.elem = Some(decl);
        Ok(validator)
    }

    /// Governing type
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Apply `xsi:nil`
    pub fn set_nil(&mut self, nil: bool) -> ValidationResult<()> {
        if nil && !self.elem.map_or(false, |e| e.nillable) {
            return Err(ValidationError::new(
                ValidationErrorKind::NilContent,
                "xsi:nil on an element that is not nillable",
            ));
        }
        self.nil = nil;
        Ok(())
    }

    /// Validate one attribute of the instance
    ///
    /// Returns the validated value, or `None` when a skip wildcard let the
    /// attribute through unchecked.
    pub fn bind_attribute(
        &mut self,
        name: &QName,
        lexical: &str,
        resolver: &dyn NamespaceResolver,
    ) -> ValidationResult<Option<SimpleValue>> {
        let Some(complex) = self.complex else {
            return Err(ValidationError::new(
                ValidationErrorKind::UnexpectedAttribute,
                format!("attribute {} on an element of simple type", name),
            ));
        };
        if let Ok(i) = complex.attributes.binary_search_by(|u| u.name.cmp(name)) {
            let attribute_use = &complex.attributes[i];
            self.seen[i] = true;
            if attribute_use.prohibited {
                return Err(ValidationError::new(
                    ValidationErrorKind::AttributeProhibited,
                    format!("attribute {} is prohibited", name),
                ));
            }
            return self.check_use(attribute_use, lexical, resolver).map(Some);
        }

        let wildcard = complex.any_attribute.as_ref().filter(|w| w.allows(name.namespace()));
        let Some(wildcard) = wildcard else {
            return Err(ValidationError::new(
                ValidationErrorKind::UnexpectedAttribute,
                format!("attribute {} is not allowed here", name),
            ));
        };
        if wildcard.process_contents == ProcessContents::Skip {
            return Ok(None);
        }
        match self
            .schema
            .attribute_by_name(name)
            .and_then(|id| self.schema.attribute(id))
        {
            Some(decl) => {
                let value = SimpleTypeValidator::new(&self.schema.tables, decl.validator)
                    .validate(lexical, resolver)?;
                if let Some(fixed) = &decl.fixed {
                    self.check_fixed(&format!("attribute {}", name), fixed, &value, lexical)?;
                }
                Ok(Some(value))
            }
            None if wildcard.process_contents == ProcessContents::Strict => {
                Err(ValidationError::new(
                    ValidationErrorKind::UnexpectedAttribute,
                    format!("no declaration for attribute {} matched by a strict wildcard", name),
                ))
            }
            None => Ok(None),
        }
    }

    fn check_use(
        &self,
        attribute_use: &AttributeUse,
        lexical: &str,
        resolver: &dyn NamespaceResolver,
    ) -> ValidationResult<SimpleValue> {
        let value = SimpleTypeValidator::new(&self.schema.tables, attribute_use.validator)
            .validate(lexical, resolver)?;
        if let Some(fixed) = &attribute_use.fixed {
            self.check_fixed(
                &format!("attribute {}", attribute_use.name),
                fixed,
                &value,
                lexical,
            )?;
        }
        Ok(value)
    }

    fn check_fixed(
        &self,
        what: &str,
        fixed: &ValueConstraintRef,
        value: &SimpleValue,
        lexical: &str,
    ) -> ValidationResult<()> {
        if self.schema.tables.values.matches(fixed.value, &value.key) {
            Ok(())
        } else {
            Err(fixed_mismatch(what, fixed, lexical))
        }
    }

    /// Consume one child element
    pub fn feed_child(&mut self, name: &QName) -> ValidationResult<MatchResult> {
        self.has_children = true;
        if self.nil {
            return Err(ValidationError::new(
                ValidationErrorKind::NilContent,
                format!("child {} of a nilled element", name),
            ));
        }
        match &mut self.content {
            Some(content) => content.feed(name),
            None => Err(ValidationError::new(
                ValidationErrorKind::UnexpectedElement,
                format!("element {} inside an element of simple type", name),
            )),
        }
    }

    /// Collect character data
    pub fn bind_text(&mut self, text: &str) -> ValidationResult<()> {
        let significant = !text.trim().is_empty();
        let allowed = self.text_validator.is_some()
            || self.content.as_ref().map_or(false, |c| c.allows_text());
        self.text.push_str(text);
        if significant && self.nil {
            return Err(ValidationError::new(
                ValidationErrorKind::NilContent,
                "character data in a nilled element",
            ));
        }
        if significant && !allowed {
            return Err(ValidationError::new(
                ValidationErrorKind::TextNotAllowed,
                format!("character data '{}' not allowed here", text.trim()),
            ));
        }
        Ok(())
    }

    /// Finish the element
    pub fn close(mut self, resolver: &dyn NamespaceResolver) -> ElementOutcome {
        let mut outcome = ElementOutcome::default();

        if let Some(complex) = self.complex {
            for (attribute_use, seen) in complex.attributes.iter().zip(&self.seen) {
                if *seen || attribute_use.prohibited {
                    continue;
                }
                if attribute_use.required {
                    outcome.errors.push(ValidationError::new(
                        ValidationErrorKind::AttributeRequired,
                        format!("attribute {} is required", attribute_use.name),
                    ));
                } else if let Some(default) = &attribute_use.default {
                    outcome
                        .default_attributes
                        .push((attribute_use.name.clone(), default.lexical.clone()));
                }
            }
        }

        if let Some(content) = &mut self.content {
            if !self.nil {
                outcome.errors.extend(content.close());
            }
        }
        if self.nil {
            return outcome;
        }

        let default = self.elem.and_then(|e| e.default.as_ref());
        let fixed = self.elem.and_then(|e| e.fixed.as_ref());
        let empty = self.text.is_empty() && !self.has_children;
        let text = match default.or(fixed) {
            Some(constraint) if empty => {
                outcome.default_text = Some(constraint.lexical.clone());
                constraint.lexical.clone()
            }
            _ => std::mem::take(&mut self.text),
        };

        match self.text_validator {
            Some(validator) => {
                match SimpleTypeValidator::new(&self.schema.tables, validator)
                    .validate(&text, resolver)
                {
                    Ok(value) => {
                        if let Some(fixed) = fixed {
                            if let Err(e) = self.check_fixed("element", fixed, &value, &text) {
                                outcome.errors.push(e);
                            }
                        }
                        outcome.value = Some(value);
                    }
                    Err(e) => outcome.errors.push(e),
                }
            }
            None => {
                // mixed content compares the fixed value lexically
                if let Some(fixed) = fixed {
                    if !self.has_children && text != fixed.lexical {
                        outcome.errors.push(fixed_mismatch("element", fixed, &text));
                    }
                }
            }
        }
        outcome
    }
}
