//! Atomic value spaces and canonicalization
//!
//! Every enumeration literal, fixed value and range bound is stored in its
//! canonical form so equality is a byte comparison. Range comparisons decode
//! the canonical bytes back into an [`AtomicValue`].

pub mod decimal;
pub mod patterns;
pub mod temporal;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

use crate::components::{IntegerKind, Primitive, StringKind};
use crate::error::{ValidationError, ValidationErrorKind, ValidationResult};
use crate::names;
use crate::namespaces::{resolve_qname, NamespaceResolver, QName};

pub use decimal::DecimalValue;
pub use temporal::{Duration, Temporal};

static FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?|-?INF|NaN)$")
        .expect("static regex")
});

static URI_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("static regex"));

/// Kind tag stored next to every canonical value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ValueKind {
    /// anySimpleType
    AnySimple = 0,
    /// string family
    String = 1,
    /// boolean
    Boolean = 2,
    /// decimal and the integer family
    Decimal = 3,
    /// float
    Float = 4,
    /// double
    Double = 5,
    /// duration
    Duration = 6,
    /// dateTime
    DateTime = 7,
    /// time
    Time = 8,
    /// date
    Date = 9,
    /// gYearMonth
    GYearMonth = 10,
    /// gYear
    GYear = 11,
    /// gMonthDay
    GMonthDay = 12,
    /// gDay
    GDay = 13,
    /// gMonth
    GMonth = 14,
    /// hexBinary
    HexBinary = 15,
    /// base64Binary
    Base64Binary = 16,
    /// anyURI
    AnyUri = 17,
    /// QName
    QName = 18,
    /// NOTATION
    Notation = 19,
    /// A whole list value
    List = 20,
}

impl ValueKind {
    /// Kind for a primitive
    pub fn of(primitive: Primitive) -> Self {
        match primitive {
            Primitive::AnySimpleType => ValueKind::AnySimple,
            Primitive::String => ValueKind::String,
            Primitive::Boolean => ValueKind::Boolean,
            Primitive::Decimal => ValueKind::Decimal,
            Primitive::Float => ValueKind::Float,
            Primitive::Double => ValueKind::Double,
            Primitive::Duration => ValueKind::Duration,
            Primitive::DateTime => ValueKind::DateTime,
            Primitive::Time => ValueKind::Time,
            Primitive::Date => ValueKind::Date,
            Primitive::GYearMonth => ValueKind::GYearMonth,
            Primitive::GYear => ValueKind::GYear,
            Primitive::GMonthDay => ValueKind::GMonthDay,
            Primitive::GDay => ValueKind::GDay,
            Primitive::GMonth => ValueKind::GMonth,
            Primitive::HexBinary => ValueKind::HexBinary,
            Primitive::Base64Binary => ValueKind::Base64Binary,
            Primitive::AnyUri => ValueKind::AnyUri,
            Primitive::QName => ValueKind::QName,
            Primitive::Notation => ValueKind::Notation,
        }
    }

    /// Primitive for an atomic kind; `None` for lists
    pub fn primitive(&self) -> Option<Primitive> {
        Some(match self {
            ValueKind::AnySimple => Primitive::AnySimpleType,
            ValueKind::String => Primitive::String,
            ValueKind::Boolean => Primitive::Boolean,
            ValueKind::Decimal => Primitive::Decimal,
            ValueKind::Float => Primitive::Float,
            ValueKind::Double => Primitive::Double,
            ValueKind::Duration => Primitive::Duration,
            ValueKind::DateTime => Primitive::DateTime,
            ValueKind::Time => Primitive::Time,
            ValueKind::Date => Primitive::Date,
            ValueKind::GYearMonth => Primitive::GYearMonth,
            ValueKind::GYear => Primitive::GYear,
            ValueKind::GMonthDay => Primitive::GMonthDay,
            ValueKind::GDay => Primitive::GDay,
            ValueKind::GMonth => Primitive::GMonth,
            ValueKind::HexBinary => Primitive::HexBinary,
            ValueKind::Base64Binary => Primitive::Base64Binary,
            ValueKind::AnyUri => Primitive::AnyUri,
            ValueKind::QName => Primitive::QName,
            ValueKind::Notation => Primitive::Notation,
            ValueKind::List => return None,
        })
    }

    /// Tag byte
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// A canonical value: kind tag plus canonical bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey {
    /// Kind tag
    pub kind: ValueKind,
    /// Canonical bytes (UTF-8 canonical lexical, or encoded list items)
    pub bytes: Vec<u8>,
}

impl CanonicalKey {
    /// Create a key
    pub fn new(kind: ValueKind, bytes: Vec<u8>) -> Self {
        Self { kind, bytes }
    }

    /// Key of a whole list: each item as kind byte, u32 LE length, bytes
    pub fn list(items: &[CanonicalKey]) -> Self {
        let mut bytes = Vec::new();
        for item in items {
            bytes.push(item.kind.as_u8());
            bytes.extend_from_slice(&(item.bytes.len() as u32).to_le_bytes());
            bytes.extend_from_slice(&item.bytes);
        }
        Self::new(ValueKind::List, bytes)
    }

    /// Canonical bytes as text, lossy for list keys
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// A parsed atomic value
#[derive(Debug, Clone, PartialEq)]
pub enum AtomicValue {
    /// anySimpleType
    AnySimple(String),
    /// string family
    String(String),
    /// boolean
    Boolean(bool),
    /// decimal and integers
    Decimal(DecimalValue),
    /// float
    Float(f32),
    /// double
    Double(f64),
    /// duration
    Duration(Duration),
    /// one of the eight date/time primitives
    Temporal(Temporal),
    /// hexBinary octets
    HexBinary(Vec<u8>),
    /// base64Binary octets
    Base64Binary(Vec<u8>),
    /// anyURI
    AnyUri(String),
    /// resolved QName
    QName(QName),
    /// resolved NOTATION name
    Notation(QName),
}

fn format_float(value: f64, rendered: String) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    match rendered.split_once('E') {
        Some((mantissa, exponent)) if !mantissa.contains('.') => {
            format!("{}.0E{}", mantissa, exponent)
        }
        _ => rendered,
    }
}

impl AtomicValue {
    /// Kind tag
    pub fn kind(&self) -> ValueKind {
        match self {
            AtomicValue::AnySimple(_) => ValueKind::AnySimple,
            AtomicValue::String(_) => ValueKind::String,
            AtomicValue::Boolean(_) => ValueKind::Boolean,
            AtomicValue::Decimal(_) => ValueKind::Decimal,
            AtomicValue::Float(_) => ValueKind::Float,
            AtomicValue::Double(_) => ValueKind::Double,
            AtomicValue::Duration(_) => ValueKind::Duration,
            AtomicValue::Temporal(t) => ValueKind::of(t.primitive),
            AtomicValue::HexBinary(_) => ValueKind::HexBinary,
            AtomicValue::Base64Binary(_) => ValueKind::Base64Binary,
            AtomicValue::AnyUri(_) => ValueKind::AnyUri,
            AtomicValue::QName(_) => ValueKind::QName,
            AtomicValue::Notation(_) => ValueKind::Notation,
        }
    }

    /// Canonical lexical form
    pub fn canonical(&self) -> String {
        match self {
            AtomicValue::AnySimple(s) | AtomicValue::String(s) | AtomicValue::AnyUri(s) => s.clone(),
            AtomicValue::Boolean(b) => b.to_string(),
            AtomicValue::Decimal(d) => decimal::canonical_decimal(d),
            AtomicValue::Float(f) => format_float(f64::from(*f), format!("{:E}", f)),
            AtomicValue::Double(d) => format_float(*d, format!("{:E}", d)),
            AtomicValue::Duration(d) => d.canonical(),
            AtomicValue::Temporal(t) => t.canonical(),
            AtomicValue::HexBinary(bytes) => bytes.iter().map(|b| format!("{:02X}", b)).collect(),
            AtomicValue::Base64Binary(bytes) => STANDARD.encode(bytes),
            AtomicValue::QName(q) | AtomicValue::Notation(q) => q.to_canonical(),
        }
    }

    /// Canonical key used for enumeration and fixed-value equality
    pub fn key(&self) -> CanonicalKey {
        CanonicalKey::new(self.kind(), self.canonical().into_bytes())
    }

    /// Length for the length facets; `None` where they do not apply
    pub fn length(&self) -> Option<usize> {
        match self {
            AtomicValue::AnySimple(s) | AtomicValue::String(s) | AtomicValue::AnyUri(s) => {
                Some(s.chars().count())
            }
            AtomicValue::HexBinary(bytes) | AtomicValue::Base64Binary(bytes) => Some(bytes.len()),
            _ => None,
        }
    }

    /// Decimal value, for the digit facets
    pub fn as_decimal(&self) -> Option<&DecimalValue> {
        match self {
            AtomicValue::Decimal(d) => Some(d),
            _ => None,
        }
    }

    /// Decode a canonical key of an ordered kind
    ///
    /// Only kinds that carry range facets are decodable; QName canonical
    /// forms have lost their prefixes and are compared as bytes instead.
    pub fn from_key(key: &CanonicalKey) -> Option<AtomicValue> {
        let primitive = key.kind.primitive()?;
        if !primitive.numeric() && primitive != Primitive::Duration && !primitive.is_temporal() {
            return None;
        }
        let text = std::str::from_utf8(&key.bytes).ok()?;
        parse_atomic(primitive, None, None, text, &crate::namespaces::NoNamespaces).ok()
    }

    /// Order two values of the same primitive; `None` when incomparable
    pub fn compare(&self, other: &AtomicValue) -> Option<Ordering> {
        match (self, other) {
            (AtomicValue::Decimal(a), AtomicValue::Decimal(b)) => Some(a.cmp(b)),
            (AtomicValue::Float(a), AtomicValue::Float(b)) => a.partial_cmp(b),
            (AtomicValue::Double(a), AtomicValue::Double(b)) => a.partial_cmp(b),
            (AtomicValue::Duration(a), AtomicValue::Duration(b)) => temporal::compare_duration(a, b),
            (AtomicValue::Temporal(a), AtomicValue::Temporal(b)) => temporal::compare_temporal(a, b),
            _ => None,
        }
    }
}

fn check_string_kind(kind: StringKind, value: &str) -> ValidationResult<()> {
    let valid = match kind {
        StringKind::Token => names::is_valid_token(value),
        StringKind::Language => names::is_valid_language(value),
        StringKind::NmToken => names::is_valid_nmtoken(value),
        StringKind::Name => names::is_valid_name(value),
        StringKind::NcName => names::is_valid_ncname(value),
    };
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new(
            ValidationErrorKind::InvalidName,
            format!("'{}' is not a valid {:?}", value, kind),
        ))
    }
}

fn parse_boolean(value: &str) -> ValidationResult<bool> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ValidationError::new(
            ValidationErrorKind::InvalidBoolean,
            format!("'{}' is not a valid boolean", value),
        )),
    }
}

fn invalid_float(value: &str) -> ValidationError {
    ValidationError::new(
        ValidationErrorKind::InvalidFloat,
        format!("'{}' is not a valid floating point number", value),
    )
}

fn parse_double(value: &str) -> ValidationResult<f64> {
    if !FLOAT.is_match(value) {
        return Err(invalid_float(value));
    }
    match value {
        "INF" => Ok(f64::INFINITY),
        "-INF" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        _ => value.parse().map_err(|_| invalid_float(value)),
    }
}

fn parse_float(value: &str) -> ValidationResult<f32> {
    if !FLOAT.is_match(value) {
        return Err(invalid_float(value));
    }
    match value {
        "INF" => Ok(f32::INFINITY),
        "-INF" => Ok(f32::NEG_INFINITY),
        "NaN" => Ok(f32::NAN),
        _ => value.parse().map_err(|_| invalid_float(value)),
    }
}

fn parse_hex(value: &str) -> ValidationResult<Vec<u8>> {
    let invalid = || {
        ValidationError::new(
            ValidationErrorKind::InvalidHex,
            format!("'{}' is not valid hexBinary", value),
        )
    };
    if value.len() % 2 != 0 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    (0..value.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&value[i..i + 2], 16).map_err(|_| invalid()))
        .collect()
}

fn parse_base64(value: &str) -> ValidationResult<Vec<u8>> {
    let compact: String = value.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact.as_bytes()).map_err(|e| {
        ValidationError::new(
            ValidationErrorKind::InvalidBase64,
            format!("'{}' is not valid base64Binary: {}", value, e),
        )
    })
}

fn check_any_uri(value: &str) -> ValidationResult<()> {
    let invalid = |reason: &str| {
        ValidationError::new(
            ValidationErrorKind::InvalidURI,
            format!("'{}' is not a valid anyURI: {}", value, reason),
        )
    };
    let bytes = value.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'%'
            && !(i + 2 < bytes.len()
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit())
        {
            return Err(invalid("malformed percent escape"));
        }
    }
    if URI_SCHEME.is_match(value) {
        url::Url::parse(value).map_err(|e| invalid(&e.to_string()))?;
    }
    Ok(())
}

/// Parse a whitespace-normalized lexical into its primitive value space
///
/// `string_kind` and `integer_kind` add the lexical refinements of the
/// derived built-ins. QName and NOTATION lexicals are resolved against
/// `resolver`.
pub fn parse_atomic(
    primitive: Primitive,
    string_kind: Option<StringKind>,
    integer_kind: Option<IntegerKind>,
    value: &str,
    resolver: &dyn NamespaceResolver,
) -> ValidationResult<AtomicValue> {
    Ok(match primitive {
        Primitive::AnySimpleType => AtomicValue::AnySimple(value.to_string()),
        Primitive::String => {
            if let Some(kind) = string_kind {
                check_string_kind(kind, value)?;
            }
            AtomicValue::String(value.to_string())
        }
        Primitive::Boolean => AtomicValue::Boolean(parse_boolean(value)?),
        Primitive::Decimal => AtomicValue::Decimal(match integer_kind {
            Some(kind) => decimal::parse_integer(value, kind)?,
            None => decimal::parse_decimal(value)?,
        }),
        Primitive::Float => AtomicValue::Float(parse_float(value)?),
        Primitive::Double => AtomicValue::Double(parse_double(value)?),
        Primitive::Duration => AtomicValue::Duration(temporal::parse_duration(value)?),
        p if p.is_temporal() => AtomicValue::Temporal(temporal::parse_temporal(p, value)?),
        Primitive::HexBinary => AtomicValue::HexBinary(parse_hex(value)?),
        Primitive::Base64Binary => AtomicValue::Base64Binary(parse_base64(value)?),
        Primitive::AnyUri => {
            check_any_uri(value)?;
            AtomicValue::AnyUri(value.to_string())
        }
        Primitive::QName | Primitive::Notation => {
            let qname = resolve_qname(value, resolver).ok_or_else(|| {
                ValidationError::new(
                    ValidationErrorKind::InvalidQName,
                    format!("'{}' is not a valid QName or its prefix is unbound", value),
                )
            })?;
            if primitive == Primitive::QName {
                AtomicValue::QName(qname)
            } else {
                AtomicValue::Notation(qname)
            }
        }
        _ => AtomicValue::AnySimple(value.to_string()),
    })
}

/// Canonical key of a lexical in a primitive value space
///
/// Applies the primitive's whitespace mode first, so canonicalizing an
/// already canonical form returns the same bytes.
pub fn canonicalize(
    primitive: Primitive,
    lexical: &str,
    resolver: &dyn NamespaceResolver,
) -> ValidationResult<CanonicalKey> {
    let white_space = match primitive {
        Primitive::String | Primitive::AnySimpleType => crate::components::WhiteSpace::Preserve,
        _ => crate::components::WhiteSpace::Collapse,
    };
    let normalized = white_space.normalize(lexical);
    parse_atomic(primitive, None, None, &normalized, resolver).map(|value| value.key())
}
