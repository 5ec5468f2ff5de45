//! xs:decimal and the integer family
//!
//! A value is kept as sign, significant digits and scale, so any lexical
//! the grammar admits is represented exactly whatever its length.

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

use crate::components::IntegerKind;
use crate::error::{ValidationError, ValidationErrorKind, ValidationResult};

static DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([+-])?(\d*)(?:\.(\d*))?$").expect("static regex"));

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").expect("static regex"));

/// An exact decimal of unlimited precision
///
/// The value is `digits * 10^-scale`. `digits` has no leading zero and,
/// when `scale > 0`, no trailing zero; zero is the empty digit string with
/// scale 0 and no sign. Equal values therefore have equal fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecimalValue {
    negative: bool,
    digits: String,
    scale: u32,
}

impl DecimalValue {
    fn zero() -> Self {
        Self {
            negative: false,
            digits: String::new(),
            scale: 0,
        }
    }

    /// Build from an integer and fraction digit string, normalizing both
    fn from_parts(negative: bool, int_part: &str, frac_part: &str) -> Self {
        let frac = frac_part.trim_end_matches('0');
        let mut digits = String::with_capacity(int_part.len() + frac.len());
        digits.push_str(int_part);
        digits.push_str(frac);
        let digits = digits.trim_start_matches('0').to_string();
        if digits.is_empty() {
            return Self::zero();
        }
        Self {
            negative,
            digits,
            scale: frac.len() as u32,
        }
    }

    /// Whether the value is zero
    pub fn is_zero(&self) -> bool {
        self.digits.is_empty()
    }

    /// Position of the most significant digit relative to the decimal point
    fn magnitude(&self) -> i64 {
        self.digits.len() as i64 - i64::from(self.scale)
    }

    fn cmp_abs(&self, other: &Self) -> Ordering {
        match (self.is_zero(), other.is_zero()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            // leading digits are non-zero, so equal magnitudes compare digitwise
            (false, false) => self
                .magnitude()
                .cmp(&other.magnitude())
                .then_with(|| self.digits.as_bytes().cmp(other.digits.as_bytes())),
        }
    }
}

impl Ord for DecimalValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.cmp_abs(other),
            (true, true) => other.cmp_abs(self),
        }
    }
}

impl PartialOrd for DecimalValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<i128> for DecimalValue {
    fn from(value: i128) -> Self {
        let magnitude = value.unsigned_abs().to_string();
        Self::from_parts(value < 0, &magnitude, "")
    }
}

impl fmt::Display for DecimalValue {
    /// Canonical XML rendering: no leading zeros, minimal fraction, sign only if negative
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }
        if self.negative {
            f.write_str("-")?;
        }
        let point = self.magnitude();
        if point <= 0 {
            f.write_str("0.")?;
            for _ in 0..-point {
                f.write_str("0")?;
            }
            f.write_str(&self.digits)
        } else {
            let (int_part, frac_part) = self.digits.split_at(point as usize);
            f.write_str(int_part)?;
            if !frac_part.is_empty() {
                write!(f, ".{}", frac_part)?;
            }
            Ok(())
        }
    }
}

fn invalid_decimal(lexical: &str, reason: &str) -> ValidationError {
    ValidationError::new(
        ValidationErrorKind::InvalidDecimal,
        format!("'{}' is not a valid decimal: {}", lexical, reason),
    )
}

/// Parse a decimal lexical exactly
pub fn parse_decimal(lexical: &str) -> ValidationResult<DecimalValue> {
    let caps = DECIMAL
        .captures(lexical)
        .ok_or_else(|| invalid_decimal(lexical, "bad lexical form"))?;
    let negative = caps.get(1).map_or(false, |m| m.as_str() == "-");
    let int_part = caps.get(2).map_or("", |m| m.as_str());
    let frac_part = caps.get(3).map_or("", |m| m.as_str());
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid_decimal(lexical, "no digits"));
    }
    Ok(DecimalValue::from_parts(negative, int_part, frac_part))
}

/// Parse an integer lexical and check the integer kind's bounds
pub fn parse_integer(lexical: &str, kind: IntegerKind) -> ValidationResult<DecimalValue> {
    if !INTEGER.is_match(lexical) {
        return Err(ValidationError::new(
            ValidationErrorKind::InvalidInteger,
            format!("'{}' is not a valid integer", lexical),
        ));
    }
    let value = parse_decimal(lexical).map_err(|e| ValidationError {
        kind: ValidationErrorKind::InvalidInteger,
        ..e
    })?;
    check_integer_bounds(&value, kind)?;
    Ok(value)
}

/// Range-check a value against an integer kind
pub fn check_integer_bounds(value: &DecimalValue, kind: IntegerKind) -> ValidationResult<()> {
    let (min, max) = kind.bounds();
    let below = min.map_or(false, |m| *value < DecimalValue::from(m));
    let above = max.map_or(false, |m| *value > DecimalValue::from(m));
    if below || above {
        return Err(ValidationError::new(
            ValidationErrorKind::InvalidInteger,
            format!("{} is out of range for {:?}", value, kind),
        ));
    }
    Ok(())
}

/// Canonical XML rendering
pub fn canonical_decimal(value: &DecimalValue) -> String {
    value.to_string()
}

/// Number of significant digits (`totalDigits`)
pub fn total_digits(value: &DecimalValue) -> u32 {
    if value.is_zero() {
        1
    } else {
        (value.digits.len() as u32).max(value.scale)
    }
}

/// Number of fraction digits (`fractionDigits`)
pub fn fraction_digits(value: &DecimalValue) -> u32 {
    value.scale
}
