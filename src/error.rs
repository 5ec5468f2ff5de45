//! Error types for xmlschema-compiler
//!
//! Compile-time failures are fatal and reported once through [`CompileError`].
//! Validation failures are reported per fault through [`ValidationError`],
//! which carries the structured fields an outer validator needs to
//! accumulate findings (`child_index`, `message`, `sub_code`).

use std::fmt;
use thiserror::Error;

use crate::compiled::FacetOp;

/// Result type alias using the crate [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for the runtime validators
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Main error type for xmlschema-compiler operations
#[derive(Error, Debug)]
pub enum Error {
    /// Schema compilation error
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    /// Instance validation error
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Invalid configuration document
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),
}

impl Error {
    /// The compile-time error kind, if this is a compile error
    pub fn compile_kind(&self) -> Option<CompileErrorKind> {
        match self {
            Error::Compile(e) => Some(e.kind),
            _ => None,
        }
    }
}

/// Compile-time error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileErrorKind {
    /// A QName reference names nothing in the schema
    UnresolvedReference,
    /// A loader placeholder survived resolution
    UnresolvedPlaceholder,
    /// A type derives from itself
    TypeDerivationCycle,
    /// A model group references itself
    GroupCycle,
    /// An attribute group references itself
    AttributeGroupCycle,
    /// An element is (transitively) its own substitution-group head
    SubstitutionGroupCycle,
    /// Restricting an attribute wildcard left no namespaces
    AttributeWildcardIntersectionEmpty,
    /// Combining attribute wildcards has no single-wildcard result
    AttributeWildcardNotExpressible,
    /// Unique Particle Attribution violation
    ContentModelNotDeterministic,
    /// Facets contradict each other or are not admitted by the type
    FacetInconsistent,
    /// A pattern facet is not a valid XSD regular expression
    InvalidPattern,
    /// An enumeration literal is not valid against the base type
    InvalidEnumerationValue,
    /// Subset construction produced too many states
    DFAStateLimitExceeded,
    /// A structural rule of XSD 1.0 is broken (e.g. list of lists)
    StructureViolation,
    /// A default or fixed value is not valid against its type
    InvalidValueConstraint,
}

impl CompileErrorKind {
    /// Stable code used when stringifying the error
    pub fn code(&self) -> &'static str {
        match self {
            CompileErrorKind::UnresolvedReference => "UnresolvedReference",
            CompileErrorKind::UnresolvedPlaceholder => "UnresolvedPlaceholder",
            CompileErrorKind::TypeDerivationCycle => "TypeDerivationCycle",
            CompileErrorKind::GroupCycle => "GroupCycle",
            CompileErrorKind::AttributeGroupCycle => "AttributeGroupCycle",
            CompileErrorKind::SubstitutionGroupCycle => "SubstitutionGroupCycle",
            CompileErrorKind::AttributeWildcardIntersectionEmpty => {
                "AttributeWildcardIntersectionEmpty"
            }
            CompileErrorKind::AttributeWildcardNotExpressible => "AttributeWildcardNotExpressible",
            CompileErrorKind::ContentModelNotDeterministic => "ContentModelNotDeterministic",
            CompileErrorKind::FacetInconsistent => "FacetInconsistent",
            CompileErrorKind::InvalidPattern => "InvalidPattern",
            CompileErrorKind::InvalidEnumerationValue => "InvalidEnumerationValue",
            CompileErrorKind::DFAStateLimitExceeded => "DFAStateLimitExceeded",
            CompileErrorKind::StructureViolation => "StructureViolation",
            CompileErrorKind::InvalidValueConstraint => "InvalidValueConstraint",
        }
    }
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Fatal schema compilation error
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    /// Error code
    pub kind: CompileErrorKind,
    /// Error message
    pub message: String,
    /// Schema component that caused the error
    pub component: Option<String>,
}

impl CompileError {
    /// Create a new compile error
    pub fn new(kind: CompileErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            component: None,
        }
    }

    /// Set the schema component
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;

        if let Some(ref component) = self.component {
            write!(f, " (in {})", component)?;
        }

        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// Validation-time error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// Element not expected at this position
    UnexpectedElement,
    /// Required element missing
    RequiredElementMissing,
    /// A counted group ended before its minimum
    MinOccursUnsatisfied,
    /// A particle or group repeated past its maximum
    MaxOccursExceeded,
    /// A facet instruction rejected the value
    FacetViolation(FacetOp),
    /// Not a valid decimal
    InvalidDecimal,
    /// Not a valid integer or out of the integer type's range
    InvalidInteger,
    /// Not a valid boolean
    InvalidBoolean,
    /// Not a valid float or double
    InvalidFloat,
    /// Not a valid date/time value
    InvalidDateTime,
    /// Not a valid duration
    InvalidDuration,
    /// Not valid base64
    InvalidBase64,
    /// Not valid hex
    InvalidHex,
    /// Not a valid or resolvable QName
    InvalidQName,
    /// Not a valid URI reference
    InvalidURI,
    /// Not a valid XML name token for the string kind
    InvalidName,
    /// Value is not in the enumeration
    EnumNotMember,
    /// Value differs from the declared fixed value
    FixedMismatch,
    /// A required attribute is absent
    AttributeRequired,
    /// A prohibited attribute is present
    AttributeProhibited,
    /// Attribute is neither declared nor matched by a wildcard
    UnexpectedAttribute,
    /// No union member accepted the value
    UnionNoMatch,
    /// A list item failed its item type
    ListItemInvalid,
    /// Abstract type or element used directly
    AbstractType,
    /// Content present on a nilled element, or nil on a non-nillable one
    NilContent,
    /// Character data where the content model forbids it
    TextNotAllowed,
    /// An ID value occurs twice in one document
    DuplicateId,
    /// An IDREF names no ID in the document
    UnknownIdRef,
}

impl ValidationErrorKind {
    /// Code the caller stringifies
    pub fn code(&self) -> &'static str {
        match self {
            ValidationErrorKind::UnexpectedElement => "d",
            ValidationErrorKind::RequiredElementMissing => "b",
            ValidationErrorKind::MinOccursUnsatisfied => "MinOccursUnsatisfied",
            ValidationErrorKind::MaxOccursExceeded => "MaxOccursExceeded",
            ValidationErrorKind::FacetViolation(_) => "FacetViolation",
            ValidationErrorKind::InvalidDecimal => "InvalidDecimal",
            ValidationErrorKind::InvalidInteger => "InvalidInteger",
            ValidationErrorKind::InvalidBoolean => "InvalidBoolean",
            ValidationErrorKind::InvalidFloat => "InvalidFloat",
            ValidationErrorKind::InvalidDateTime => "InvalidDateTime",
            ValidationErrorKind::InvalidDuration => "InvalidDuration",
            ValidationErrorKind::InvalidBase64 => "InvalidBase64",
            ValidationErrorKind::InvalidHex => "InvalidHex",
            ValidationErrorKind::InvalidQName => "InvalidQName",
            ValidationErrorKind::InvalidURI => "InvalidURI",
            ValidationErrorKind::InvalidName => "InvalidName",
            ValidationErrorKind::EnumNotMember => "EnumNotMember",
            ValidationErrorKind::FixedMismatch => "FixedMismatch",
            ValidationErrorKind::AttributeRequired => "AttributeRequired",
            ValidationErrorKind::AttributeProhibited => "AttributeProhibited",
            ValidationErrorKind::UnexpectedAttribute => "UnexpectedAttribute",
            ValidationErrorKind::UnionNoMatch => "UnionNoMatch",
            ValidationErrorKind::ListItemInvalid => "ListItemInvalid",
            ValidationErrorKind::AbstractType => "AbstractType",
            ValidationErrorKind::NilContent => "NilContent",
            ValidationErrorKind::TextNotAllowed => "TextNotAllowed",
            ValidationErrorKind::DuplicateId => "DuplicateId",
            ValidationErrorKind::UnknownIdRef => "UnknownIdRef",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationErrorKind::FacetViolation(op) => write!(f, "FacetViolation({})", op.name()),
            other => f.write_str(other.code()),
        }
    }
}

/// Instance validation error with structured context
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error code
    pub kind: ValidationErrorKind,
    /// Error message
    pub message: String,
    /// Index of the offending child among its siblings
    pub child_index: Option<usize>,
    /// Finer-grained code (facet name, list item position, ...)
    pub sub_code: Option<String>,
    /// Path to the element that failed validation
    pub path: Option<String>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        let sub_code = match kind {
            ValidationErrorKind::FacetViolation(op) => Some(op.name().to_string()),
            _ => None,
        };
        Self {
            kind,
            message: message.into(),
            child_index: None,
            sub_code,
            path: None,
        }
    }

    /// Set the child index
    pub fn with_child_index(mut self, index: usize) -> Self {
        self.child_index = Some(index);
        self
    }

    /// Set the sub-code
    pub fn with_sub_code(mut self, sub_code: impl Into<String>) -> Self {
        self.sub_code = Some(sub_code.into());
        self
    }

    /// Set the path where validation failed
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Code the caller stringifies
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;

        if let Some(index) = self.child_index {
            write!(f, " (child {})", index)?;
        }

        if let Some(ref path) = self.path {
            write!(f, "\n\nPath: {}", path)?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error() {
        let err = CompileError::new(CompileErrorKind::GroupCycle, "cycle detected: g1 -> g2 -> g1")
            .with_component("group g1");
        assert_eq!(err.kind, CompileErrorKind::GroupCycle);
        let text = err.to_string();
        assert!(text.contains("[GroupCycle]"));
        assert!(text.contains("in group g1"));
    }

    #[test]
    fn test_validation_error_codes() {
        let err = ValidationError::new(ValidationErrorKind::UnexpectedElement, "unexpected");
        assert_eq!(err.code(), "d");
        let err = ValidationError::new(ValidationErrorKind::RequiredElementMissing, "missing");
        assert_eq!(err.code(), "b");
    }

    #[test]
    fn test_validation_error_builder() {
        let err = ValidationError::new(
            ValidationErrorKind::FacetViolation(FacetOp::MaxLength),
            "too long",
        )
        .with_child_index(3)
        .with_path("/root/item");

        assert_eq!(err.child_index, Some(3));
        assert_eq!(err.sub_code.as_deref(), Some("maxLength"));
        assert!(err.to_string().contains("FacetViolation(maxLength)"));
        assert!(err.to_string().contains("Path: /root/item"));
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = CompileError::new(CompileErrorKind::InvalidPattern, "bad").into();
        assert_eq!(err.compile_kind(), Some(CompileErrorKind::InvalidPattern));
        assert!(err.to_string().starts_with("compile error"));

        let err: Error = ValidationError::new(ValidationErrorKind::EnumNotMember, "no").into();
        assert_eq!(err.compile_kind(), None);
    }
}
