//! Simple-type validator programs
//!
//! Every simple type compiles to a [`SimpleValidator`]: a dispatch kind
//! (atomic, list or union), a whitespace mode and a contiguous slice of
//! [`FacetInstr`] in [`SimpleTables::instructions`].

use regex::Regex;
use std::fmt;

use super::values::{EnumTable, ValueBlob};
use super::TypeId;
use crate::components::{IntegerKind, Primitive, StringKind, WhiteSpace};
use crate::namespaces::QName;

/// Index of a compiled simple-type validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValidatorId(pub u32);

impl ValidatorId {
    /// Index into the validator table
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Facet instruction opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FacetOp {
    /// `arg0` is a pattern id
    Pattern,
    /// `arg0` is an enumeration id
    Enumeration,
    /// `arg0` is the exact length
    Length,
    /// `arg0` is the minimum length
    MinLength,
    /// `arg0` is the maximum length
    MaxLength,
    /// `arg0` is the maximum number of digits
    TotalDigits,
    /// `arg0` is the maximum number of fraction digits
    FractionDigits,
    /// `arg0` is an interned bound
    MinInclusive,
    /// `arg0` is an interned bound
    MinExclusive,
    /// `arg0` is an interned bound
    MaxInclusive,
    /// `arg0` is an interned bound
    MaxExclusive,
}

impl FacetOp {
    /// XSD facet name
    pub fn name(&self) -> &'static str {
        match self {
            FacetOp::Pattern => "pattern",
            FacetOp::Enumeration => "enumeration",
            FacetOp::Length => "length",
            FacetOp::MinLength => "minLength",
            FacetOp::MaxLength => "maxLength",
            FacetOp::TotalDigits => "totalDigits",
            FacetOp::FractionDigits => "fractionDigits",
            FacetOp::MinInclusive => "minInclusive",
            FacetOp::MinExclusive => "minExclusive",
            FacetOp::MaxInclusive => "maxInclusive",
            FacetOp::MaxExclusive => "maxExclusive",
        }
    }

    /// Opcode byte, for the digest
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for FacetOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One facet instruction
///
/// `arg1` is the type whose restriction step contributed the facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacetInstr {
    /// Opcode
    pub op: FacetOp,
    /// Operand (see [`FacetOp`])
    pub arg0: u32,
    /// Contributing type id
    pub arg1: u32,
}

impl FacetInstr {
    /// Create an instruction
    pub fn new(op: FacetOp, arg0: u32, origin: TypeId) -> Self {
        Self {
            op,
            arg0,
            arg1: origin.0,
        }
    }
}

/// A slice of the instruction table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgramRef {
    /// First instruction
    pub start: u32,
    /// Number of instructions
    pub len: u32,
}

impl ProgramRef {
    /// True for a program with no instructions
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Primitive plus the lexical refinements of derived built-ins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomicKind {
    /// Value space
    pub primitive: Primitive,
    /// Name-like refinement (`token`, `NCName`, ...)
    pub string_kind: Option<StringKind>,
    /// Fixed-width integer refinement
    pub integer_kind: Option<IntegerKind>,
}

impl AtomicKind {
    /// Plain primitive with no refinement
    pub fn primitive(primitive: Primitive) -> Self {
        Self {
            primitive,
            string_kind: None,
            integer_kind: None,
        }
    }
}

/// Role of a value in ID/IDREF checking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityRole {
    /// xs:ID or a restriction of it
    Id,
    /// xs:IDREF, or a list of them
    IdRef,
}

/// Run-time dispatch of a simple-type validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatorKind {
    /// Atomic value
    Atomic {
        /// Value space and refinements
        kind: AtomicKind,
        /// Whitespace mode
        white_space: WhiteSpace,
        /// Facet program
        program: ProgramRef,
    },
    /// Whitespace-separated list
    List {
        /// Whitespace mode (always collapse)
        white_space: WhiteSpace,
        /// List-level facet program
        program: ProgramRef,
        /// Validator for each item
        item: ValidatorId,
    },
    /// First matching member wins
    Union {
        /// Whitespace mode of the union itself
        white_space: WhiteSpace,
        /// Union-level facet program
        program: ProgramRef,
        /// Member validators in declaration order
        members: Vec<ValidatorId>,
        /// Member types, parallel to `members`
        member_types: Vec<TypeId>,
        /// The union's own name, if global
        type_name: Option<QName>,
    },
}

impl ValidatorKind {
    /// Whitespace mode applied before anything else
    pub fn white_space(&self) -> WhiteSpace {
        match self {
            ValidatorKind::Atomic { white_space, .. }
            | ValidatorKind::List { white_space, .. }
            | ValidatorKind::Union { white_space, .. } => *white_space,
        }
    }

    /// The facet program
    pub fn program(&self) -> ProgramRef {
        match self {
            ValidatorKind::Atomic { program, .. }
            | ValidatorKind::List { program, .. }
            | ValidatorKind::Union { program, .. } => *program,
        }
    }
}

/// A compiled simple-type validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleValidator {
    /// The type this validator belongs to
    pub type_id: TypeId,
    /// Dispatch
    pub kind: ValidatorKind,
    /// ID/IDREF role, if the type derives from one
    pub role: Option<IdentityRole>,
}

/// A compiled pattern group (the OR of one restriction step's patterns)
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    /// XSD sources in declaration order
    pub sources: Vec<String>,
    /// Anchored translation
    pub regex: Regex,
}

impl PartialEq for CompiledPattern {
    fn eq(&self, other: &Self) -> bool {
        self.sources == other.sources
    }
}

/// Everything the simple-type executor reads
#[derive(Debug, Clone, Default)]
pub struct SimpleTables {
    /// Validators by [`ValidatorId`]
    pub validators: Vec<SimpleValidator>,
    /// Facet instructions; programs are slices of this
    pub instructions: Vec<FacetInstr>,
    /// Compiled pattern groups by id
    pub patterns: Vec<CompiledPattern>,
    /// Interned canonical values
    pub values: ValueBlob,
    /// Enumeration sets
    pub enums: EnumTable,
}

impl SimpleTables {
    /// A validator by id
    pub fn validator(&self, id: ValidatorId) -> Option<&SimpleValidator> {
        self.validators.get(id.index())
    }

    /// Instructions of a program
    pub fn program(&self, program: ProgramRef) -> &[FacetInstr] {
        let start = program.start as usize;
        let end = start + program.len as usize;
        self.instructions.get(start..end).unwrap_or(&[])
    }

    /// Append a program and return its slice
    pub fn push_program(&mut self, instructions: &[FacetInstr]) -> ProgramRef {
        let start = self.instructions.len() as u32;
        self.instructions.extend_from_slice(instructions);
        ProgramRef {
            start,
            len: instructions.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facet_op_names() {
        assert_eq!(FacetOp::MaxLength.name(), "maxLength");
        assert_eq!(FacetOp::FractionDigits.to_string(), "fractionDigits");
        assert_ne!(FacetOp::MinInclusive.code(), FacetOp::MinExclusive.code());
    }

    #[test]
    fn test_program_slices() {
        let mut tables = SimpleTables::default();
        let first = tables.push_program(&[FacetInstr::new(FacetOp::Length, 3, TypeId(40))]);
        let second = tables.push_program(&[
            FacetInstr::new(FacetOp::MinLength, 1, TypeId(41)),
            FacetInstr::new(FacetOp::MaxLength, 9, TypeId(41)),
        ]);
        assert_eq!(tables.program(first).len(), 1);
        assert_eq!(tables.program(second)[1].op, FacetOp::MaxLength);
        assert_eq!(tables.program(second)[1].arg1, 41);
        assert!(tables.program(ProgramRef::default()).is_empty());
    }
}
