//! Simple-type program executor
//!
//! Runs a compiled [`SimpleValidator`]: whitespace normalization, pattern
//! instructions on the normalized lexical, canonicalization into the
//! primitive value space, then the remaining facet instructions in program
//! order. The first failing instruction is reported.

use std::cmp::Ordering;

use crate::compiled::{
    FacetInstr, FacetOp, IdentityRole, SimpleTables, TypeId, ValidatorId, ValidatorKind, ValueRef,
};
use crate::error::{ValidationError, ValidationErrorKind, ValidationResult};
use crate::namespaces::NamespaceResolver;
use crate::values::decimal::{fraction_digits, total_digits};
use crate::values::{parse_atomic, AtomicValue, CanonicalKey};

/// Outcome of validating one lexical value
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleValue {
    /// Lexical after whitespace normalization
    pub normalized: String,
    /// Canonical key (list keys encode every item)
    pub key: CanonicalKey,
    /// Parsed atomic value (atomic types, or the winning union member)
    pub value: Option<AtomicValue>,
    /// Winning member type of a union
    pub member_type: Option<TypeId>,
    /// ID/IDREF role of the type that produced the value
    pub role: Option<IdentityRole>,
    /// Items of a list value
    pub items: Vec<SimpleValue>,
}

impl SimpleValue {
    /// Tokens that take part in ID/IDREF checking, with their role
    pub fn identity_tokens(&self) -> Vec<(IdentityRole, &str)> {
        let mut out = Vec::new();
        self.collect_tokens(&mut out);
        out
    }

    fn collect_tokens<'a>(&'a self, out: &mut Vec<(IdentityRole, &'a str)>) {
        if self.items.is_empty() {
            if let Some(role) = self.role {
                out.push((role, self.normalized.as_str()));
            }
        } else {
            for item in &self.items {
                item.collect_tokens(out);
            }
        }
    }
}

/// Cheap handle validating values against one simple type
#[derive(Debug, Clone, Copy)]
pub struct SimpleTypeValidator<'a> {
    tables: &'a SimpleTables,
    id: ValidatorId,
}

impl<'a> SimpleTypeValidator<'a> {
    /// Create a handle
    pub fn new(tables: &'a SimpleTables, id: ValidatorId) -> Self {
        Self { tables, id }
    }

    /// The validator this handle runs
    pub fn id(&self) -> ValidatorId {
        self.id
    }

    /// Validate and canonicalize a lexical value
    pub fn validate(&self, lexical: &str, resolver: &dyn NamespaceResolver) -> ValidationResult<SimpleValue> {
        validate(self.tables, self.id, lexical, resolver)
    }
}

/// Validate `lexical` against validator `id`
pub fn validate(
    tables: &SimpleTables,
    id: ValidatorId,
    lexical: &str,
    resolver: &dyn NamespaceResolver,
) -> ValidationResult<SimpleValue> {
    let validator = tables.validator(id).ok_or_else(|| {
        ValidationError::new(
            ValidationErrorKind::UnionNoMatch,
            format!("unknown simple type validator {}", id.0),
        )
    })?;
    let normalized = validator.kind.white_space().normalize(lexical);
    let program = tables.program(validator.kind.program());
    check_patterns(tables, program, &normalized)?;

    let mut result = match &validator.kind {
        ValidatorKind::Atomic { kind, .. } => {
            let value = parse_atomic(
                kind.primitive,
                kind.string_kind,
                kind.integer_kind,
                &normalized,
                resolver,
            )?;
            check_atomic(tables, program, &value)?;
            SimpleValue {
                key: value.key(),
                normalized,
                value: Some(value),
                member_type: None,
                role: validator.role,
                items: Vec::new(),
            }
        }
        ValidatorKind::List { item, .. } => {
            let mut items = Vec::new();
            for (i, token) in normalized.split_whitespace().enumerate() {
                let item_value = validate(tables, *item, token, resolver).map_err(|e| {
                    let code = e.sub_code.clone().unwrap_or_else(|| e.code().to_string());
                    ValidationError::new(
                        ValidationErrorKind::ListItemInvalid,
                        format!("list item {} '{}': {}", i, token, e.message),
                    )
                    .with_sub_code(code)
                })?;
                items.push(item_value);
            }
            let keys: Vec<CanonicalKey> = items.iter().map(|v| v.key.clone()).collect();
            let key = CanonicalKey::list(&keys);
            check_list(tables, program, items.len(), &key)?;
            SimpleValue {
                normalized,
                key,
                value: None,
                member_type: None,
                role: validator.role,
                items,
            }
        }
        ValidatorKind::Union {
            members,
            member_types,
            type_name,
            ..
        } => {
            let chosen = members
                .iter()
                .zip(member_types)
                .find_map(|(member, member_type)| {
                    validate(tables, *member, &normalized, resolver)
                        .ok()
                        .map(|value| (value, *member_type))
                });
            let (mut value, member_type) = chosen.ok_or_else(|| {
                let name = type_name
                    .as_ref()
                    .map_or_else(|| "anonymous union".to_string(), |n| n.to_string());
                ValidationError::new(
                    ValidationErrorKind::UnionNoMatch,
                    format!("'{}' matches no member of {}", normalized, name),
                )
            })?;
            check_enumerations(tables, program, &value.key)?;
            value.member_type = Some(member_type);
            value
        }
    };
    if result.role.is_none() {
        result.role = validator.role;
    }
    Ok(result)
}

fn violation(instr: &FacetInstr, message: String) -> ValidationError {
    ValidationError::new(ValidationErrorKind::FacetViolation(instr.op), message)
}

fn check_patterns(tables: &SimpleTables, program: &[FacetInstr], normalized: &str) -> ValidationResult<()> {
    for instr in program.iter().filter(|i| i.op == FacetOp::Pattern) {
        if let Some(pattern) = tables.patterns.get(instr.arg0 as usize) {
            if !pattern.regex.is_match(normalized) {
                return Err(violation(
                    instr,
                    format!(
                        "'{}' does not match pattern '{}'",
                        normalized,
                        pattern.sources.join("|")
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn check_enumerations(tables: &SimpleTables, program: &[FacetInstr], key: &CanonicalKey) -> ValidationResult<()> {
    for instr in program.iter().filter(|i| i.op == FacetOp::Enumeration) {
        if !tables
            .enums
            .contains(&tables.values, crate::compiled::EnumId(instr.arg0), key)
        {
            return Err(ValidationError::new(
                ValidationErrorKind::EnumNotMember,
                format!("'{}' is not one of the enumerated values", key.text()),
            )
            .with_sub_code(FacetOp::Enumeration.name()));
        }
    }
    Ok(())
}

fn check_length(instr: &FacetInstr, length: usize) -> ValidationResult<()> {
    let bound = instr.arg0 as usize;
    let ok = match instr.op {
        FacetOp::Length => length == bound,
        FacetOp::MinLength => length >= bound,
        FacetOp::MaxLength => length <= bound,
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(violation(
            instr,
            format!("length {} violates {} {}", length, instr.op, bound),
        ))
    }
}

fn bound_value(tables: &SimpleTables, instr: &FacetInstr) -> Option<AtomicValue> {
    tables
        .values
        .key(ValueRef(instr.arg0))
        .and_then(|key| AtomicValue::from_key(&key))
}

fn check_atomic(tables: &SimpleTables, program: &[FacetInstr], value: &AtomicValue) -> ValidationResult<()> {
    let key = value.key();
    check_enumerations(tables, program, &key)?;
    for instr in program {
        match instr.op {
            FacetOp::Pattern | FacetOp::Enumeration => {}
            FacetOp::Length | FacetOp::MinLength | FacetOp::MaxLength => {
                if let Some(length) = value.length() {
                    check_length(instr, length)?;
                }
            }
            FacetOp::TotalDigits => {
                if let Some(d) = value.as_decimal() {
                    if total_digits(d) > instr.arg0 {
                        return Err(violation(
                            instr,
                            format!("'{}' has more than {} digits", value.canonical(), instr.arg0),
                        ));
                    }
                }
            }
            FacetOp::FractionDigits => {
                if let Some(d) = value.as_decimal() {
                    if fraction_digits(d) > instr.arg0 {
                        return Err(violation(
                            instr,
                            format!(
                                "'{}' has more than {} fraction digits",
                                value.canonical(),
                                instr.arg0
                            ),
                        ));
                    }
                }
            }
            FacetOp::MinInclusive | FacetOp::MinExclusive | FacetOp::MaxInclusive | FacetOp::MaxExclusive => {
                let Some(bound) = bound_value(tables, instr) else {
                    continue;
                };
                // incomparable values (partial orders) are not violations
                let Some(ordering) = value.compare(&bound) else {
                    continue;
                };
                let ok = match instr.op {
                    FacetOp::MinInclusive => ordering != Ordering::Less,
                    FacetOp::MinExclusive => ordering == Ordering::Greater,
                    FacetOp::MaxInclusive => ordering != Ordering::Greater,
                    _ => ordering == Ordering::Less,
                };
                if !ok {
                    return Err(violation(
                        instr,
                        format!(
                            "'{}' violates {} {}",
                            value.canonical(),
                            instr.op,
                            bound.canonical()
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn check_list(tables: &SimpleTables, program: &[FacetInstr], count: usize, key: &CanonicalKey) -> ValidationResult<()> {
    for instr in program {
        if matches!(instr.op, FacetOp::Length | FacetOp::MinLength | FacetOp::MaxLength) {
            check_length(instr, count)?;
        }
    }
    check_enumerations(tables, program, key)
}
