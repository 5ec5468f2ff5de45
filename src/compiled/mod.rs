//! The compiled schema artifact
//!
//! Everything here is produced once by [`crate::compiler::compile`] and never
//! mutated afterwards. Cross references are integer IDs into the tables of
//! [`CompiledSchema`], so recursive types need no shared ownership.

pub mod models;
pub mod programs;
pub mod values;

use std::collections::BTreeMap;

pub use models::{
    AllEntry, AllGroup, ContentModel, CounterStep, Dfa, ElementModel, GroupCounter,
    PositionInfo, SequenceItem, SimpleSequence, Symbol, SymbolKind,
};
pub use programs::{
    AtomicKind, CompiledPattern, FacetInstr, FacetOp, IdentityRole, ProgramRef, SimpleTables,
    SimpleValidator, ValidatorId, ValidatorKind,
};
pub use values::{EnumId, EnumSet, EnumTable, ValueBlob, ValueRef};

use crate::components::{DerivationMethod, DerivationSet, Variety, Wildcard};
use crate::limits::Limits;
use crate::namespaces::{NamespaceContext, QName};
use crate::validators::{ContentValidator, SimpleTypeValidator};

/// Type definition ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// Element declaration ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElemId(pub u32);

/// Attribute declaration ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttrId(pub u32);

macro_rules! impl_index {
    ($($id:ty),*) => {
        $(impl $id {
            /// Index into the owning table
            pub fn index(&self) -> usize {
                self.0 as usize
            }
        })*
    };
}

impl_index!(TypeId, ElemId, AttrId);

/// TypeId of `xs:anyType`
pub const ANY_TYPE: TypeId = TypeId(0);

/// TypeId of `xs:anySimpleType`
pub const ANY_SIMPLE_TYPE: TypeId = TypeId(1);

/// A `default` or `fixed` value: the lexical and its interned canonical form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueConstraintRef {
    /// Lexical as written in the schema
    pub lexical: String,
    /// Canonical value in the blob
    pub value: ValueRef,
}

/// Simple type entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleTypeEntry {
    /// Name, for global and built-in types
    pub name: Option<QName>,
    /// Base type (`None` only for anySimpleType's parent chain end)
    pub base: Option<TypeId>,
    /// How the type derives from `base`
    pub derivation: DerivationMethod,
    /// Variety
    pub variety: Variety,
    /// Effective `final`
    pub final_set: DerivationSet,
    /// Compiled validator
    pub validator: ValidatorId,
    /// Built-in type
    pub builtin: bool,
}

/// Complex type entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexTypeEntry {
    /// Name, for global types and anyType
    pub name: Option<QName>,
    /// Base type (`None` for anyType)
    pub base: Option<TypeId>,
    /// How the type derives from `base`
    pub derivation: DerivationMethod,
    /// `abstract`
    pub is_abstract: bool,
    /// `mixed`
    pub mixed: bool,
    /// Effective `block`
    pub block: DerivationSet,
    /// Effective `final`
    pub final_set: DerivationSet,
    /// Merged attribute uses sorted by name
    pub attributes: Vec<AttributeUse>,
    /// Merged attribute wildcard
    pub any_attribute: Option<Wildcard>,
    /// Content model
    pub content: ContentModel,
}

impl ComplexTypeEntry {
    /// Attribute use by name
    pub fn attribute_use(&self, name: &QName) -> Option<&AttributeUse> {
        self.attributes
            .binary_search_by(|u| u.name.cmp(name))
            .ok()
            .map(|i| &self.attributes[i])
    }
}

/// A type definition of any kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeEntry {
    /// Simple type
    Simple(SimpleTypeEntry),
    /// Complex type
    Complex(ComplexTypeEntry),
}

impl TypeEntry {
    /// Type name, if any
    pub fn name(&self) -> Option<&QName> {
        match self {
            TypeEntry::Simple(st) => st.name.as_ref(),
            TypeEntry::Complex(ct) => ct.name.as_ref(),
        }
    }

    /// Base type and derivation method
    pub fn base(&self) -> Option<(TypeId, DerivationMethod)> {
        match self {
            TypeEntry::Simple(st) => st.base.map(|b| (b, st.derivation)),
            TypeEntry::Complex(ct) => ct.base.map(|b| (b, ct.derivation)),
        }
    }

    /// Effective `block` (simple types block nothing)
    pub fn block(&self) -> DerivationSet {
        match self {
            TypeEntry::Simple(_) => DerivationSet::empty(),
            TypeEntry::Complex(ct) => ct.block,
        }
    }

    /// The complex entry, if complex
    pub fn as_complex(&self) -> Option<&ComplexTypeEntry> {
        match self {
            TypeEntry::Complex(ct) => Some(ct),
            TypeEntry::Simple(_) => None,
        }
    }

    /// Name for messages, `anonymous` otherwise
    pub fn display_name(&self) -> String {
        self.name()
            .map_or_else(|| "anonymous".to_string(), |n| n.to_string())
    }
}

/// A merged attribute use of a complex type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeUse {
    /// Effective name
    pub name: QName,
    /// Declaration
    pub attr: AttrId,
    /// `use="required"`
    pub required: bool,
    /// `use="prohibited"` retained because it carries a fixed value
    pub prohibited: bool,
    /// Effective default
    pub default: Option<ValueConstraintRef>,
    /// Effective fixed value
    pub fixed: Option<ValueConstraintRef>,
    /// Value validator
    pub validator: ValidatorId,
}

/// Identity constraint category
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityKind {
    /// `xs:unique`
    Unique,
    /// `xs:key`
    Key,
    /// `xs:keyref` with the referenced key
    KeyRef(QName),
}

/// An identity constraint recorded on an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConstraintEntry {
    /// Qualified constraint name
    pub name: QName,
    /// Category
    pub kind: IdentityKind,
    /// Selector XPath
    pub selector: String,
    /// Field XPaths
    pub fields: Vec<String>,
    /// Prefix bindings for the XPaths
    pub namespaces: NamespaceContext,
}

/// Element registry entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementEntry {
    /// Effective name
    pub name: QName,
    /// Declared type
    pub type_id: TypeId,
    /// Text validator for simple and simple-content types
    pub validator: Option<ValidatorId>,
    /// `nillable`
    pub nillable: bool,
    /// `abstract`
    pub is_abstract: bool,
    /// `default`
    pub default: Option<ValueConstraintRef>,
    /// `fixed`
    pub fixed: Option<ValueConstraintRef>,
    /// Effective `block`
    pub block: DerivationSet,
    /// Effective `final`
    pub final_set: DerivationSet,
    /// Substitution-group head
    pub substitution_head: Option<ElemId>,
    /// Identity constraints
    pub constraints: Vec<IdentityConstraintEntry>,
    /// Global declaration
    pub global: bool,
}

/// Attribute registry entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeEntry {
    /// Effective name
    pub name: QName,
    /// Declared simple type
    pub type_id: TypeId,
    /// Value validator
    pub validator: ValidatorId,
    /// Declaration `default`
    pub default: Option<ValueConstraintRef>,
    /// Declaration `fixed`
    pub fixed: Option<ValueConstraintRef>,
    /// Global declaration
    pub global: bool,
}

/// Narrow capability the content validators call back into
pub trait SubstitutionPolicy {
    /// Global element declared with this name
    fn global_element(&self, name: &QName) -> Option<ElemId>;

    /// Whether `actual` may appear where `declared` is expected
    fn is_substitutable(&self, actual: ElemId, declared: ElemId) -> bool;
}

/// Set of derivation methods on the chain from `derived` up to `base`
///
/// `base_of` maps a type to its base and derivation step. Returns `None`
/// when `base` is not an ancestor.
pub fn derivation_path(
    base_of: impl Fn(TypeId) -> Option<(TypeId, DerivationMethod)>,
    derived: TypeId,
    base: TypeId,
) -> Option<DerivationSet> {
    let mut methods = DerivationSet::empty();
    let mut current = derived;
    // chains are acyclic after registration; the bound only guards bad input
    for _ in 0..=u16::MAX {
        if current == base {
            return Some(methods);
        }
        let (next, method) = base_of(current)?;
        methods.insert(method);
        current = next;
    }
    None
}

/// The immutable compiled schema
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    /// Target namespace
    pub target_namespace: Option<String>,
    /// Types by [`TypeId`]
    pub types: Vec<TypeEntry>,
    /// Elements by [`ElemId`]
    pub elements: Vec<ElementEntry>,
    /// Attributes by [`AttrId`]
    pub attributes: Vec<AttributeEntry>,
    /// Simple-type programs, patterns and interned values
    pub tables: SimpleTables,
    /// Named types, built-ins included
    pub global_types: BTreeMap<QName, TypeId>,
    /// Global elements
    pub global_elements: BTreeMap<QName, ElemId>,
    /// Global attributes
    pub global_attributes: BTreeMap<QName, AttrId>,
    /// Head to transitive members, blocked members removed
    pub substitution_groups: BTreeMap<ElemId, Vec<ElemId>>,
    /// Elements carrying identity constraints
    pub elements_with_constraints: Vec<ElemId>,
    /// Simple types to their validators
    pub type_validators: BTreeMap<TypeId, ValidatorId>,
    /// Limits the schema was compiled with
    pub limits: Limits,
}

impl CompiledSchema {
    /// A type by id
    pub fn type_entry(&self, id: TypeId) -> Option<&TypeEntry> {
        self.types.get(id.index())
    }

    /// An element by id
    pub fn element(&self, id: ElemId) -> Option<&ElementEntry> {
        self.elements.get(id.index())
    }

    /// An attribute by id
    pub fn attribute(&self, id: AttrId) -> Option<&AttributeEntry> {
        self.attributes.get(id.index())
    }

    /// Named type lookup
    pub fn type_by_name(&self, name: &QName) -> Option<TypeId> {
        self.global_types.get(name).copied()
    }

    /// Global element lookup
    pub fn element_by_name(&self, name: &QName) -> Option<ElemId> {
        self.global_elements.get(name).copied()
    }

    /// Global attribute lookup
    pub fn attribute_by_name(&self, name: &QName) -> Option<AttrId> {
        self.global_attributes.get(name).copied()
    }

    /// Content model of a complex type
    pub fn content_model(&self, id: TypeId) -> Option<&ContentModel> {
        self.type_entry(id)
            .and_then(TypeEntry::as_complex)
            .map(|ct| &ct.content)
    }

    /// Content models of every complex type, in TypeId order
    pub fn content_models(&self) -> impl Iterator<Item = (TypeId, &ContentModel)> + '_ {
        self.types.iter().enumerate().filter_map(|(i, entry)| {
            entry
                .as_complex()
                .map(|ct| (TypeId(i as u32), &ct.content))
        })
    }

    /// Members of a substitution group
    pub fn substitutes(&self, head: ElemId) -> &[ElemId] {
        self.substitution_groups
            .get(&head)
            .map_or(&[], |members| members.as_slice())
    }

    /// Derivation methods from `derived` up to `base`, `None` if unrelated
    pub fn derivation_methods(&self, derived: TypeId, base: TypeId) -> Option<DerivationSet> {
        derivation_path(
            |id| self.type_entry(id).and_then(TypeEntry::base),
            derived,
            base,
        )
    }

    /// Whether `derived` derives from `base` without using a `blocked` method
    pub fn is_derived_from(&self, derived: TypeId, base: TypeId, blocked: DerivationSet) -> bool {
        self.derivation_methods(derived, base)
            .map_or(false, |methods| !methods.iter().any(|m| blocked.contains(m)))
    }

    /// Validator of a simple type
    pub fn validator_for(&self, id: TypeId) -> Option<ValidatorId> {
        self.type_validators.get(&id).copied()
    }

    /// Reusable content validator for a complex type
    pub fn content_validator(&self, id: TypeId) -> Option<ContentValidator<'_>> {
        self.content_model(id)
            .map(|content| ContentValidator::new(content, self))
    }

    /// Reusable value validator for a simple type
    pub fn simple_validator(&self, id: TypeId) -> Option<SimpleTypeValidator<'_>> {
        self.validator_for(id)
            .map(|validator| SimpleTypeValidator::new(&self.tables, validator))
    }

    /// SHA-256 over the interned representation, hex encoded
    pub fn digest(&self) -> String {
        crate::compiler::digest::digest(self)
    }
}

impl SubstitutionPolicy for CompiledSchema {
    fn global_element(&self, name: &QName) -> Option<ElemId> {
        self.element_by_name(name)
    }

    fn is_substitutable(&self, actual: ElemId, declared: ElemId) -> bool {
        actual == declared || self.substitutes(declared).binary_search(&actual).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_path() {
        // 3 -> 2 (extension) -> 0 (restriction)
        let bases = |id: TypeId| match id.0 {
            3 => Some((TypeId(2), DerivationMethod::Extension)),
            2 => Some((TypeId(0), DerivationMethod::Restriction)),
            _ => None,
        };
        let path = derivation_path(bases, TypeId(3), TypeId(0)).unwrap();
        assert!(path.contains(DerivationMethod::Extension));
        assert!(path.contains(DerivationMethod::Restriction));
        assert_eq!(derivation_path(bases, TypeId(3), TypeId(3)), Some(DerivationSet::empty()));
        assert_eq!(derivation_path(bases, TypeId(0), TypeId(3)), None);
    }

    #[test]
    fn test_id_index() {
        assert_eq!(TypeId(4).index(), 4);
        assert_eq!(ElemId(0).index(), 0);
        assert_eq!(AttrId(9).index(), 9);
    }
}
