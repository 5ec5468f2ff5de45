//! Simple types to facet programs
//!
//! Types compile bases first and are memoized by TypeId. Facet state is
//! inherited from the base and refined per restriction step; the program
//! emitted for a type is its complete effective facet set, so the executor
//! never walks the derivation chain.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, instrument, trace};

use super::registry::{Registry, TypeSlot};
use crate::compiled::{
    AtomicKind, CompiledPattern, EnumId, FacetInstr, FacetOp, IdentityRole, SimpleTables,
    SimpleValidator, TypeId, ValidatorId, ValidatorKind, ValueRef, ANY_SIMPLE_TYPE,
};
use crate::components::builtins::{TypeCategory, LIST_FACETS, UNION_FACETS};
use crate::components::{
    BuiltinType, ComplexContent, DerivationMethod, Facet, FacetKind, SimpleDerivation, WhiteSpace,
};
use crate::error::{CompileError, CompileErrorKind};
use crate::limits::Limits;
use crate::values::patterns::compile_pattern_group;
use crate::values::{AtomicValue, CanonicalKey};

/// Output of the simple-type stage
#[derive(Debug)]
pub(crate) struct SimpleTypes {
    pub tables: SimpleTables,
    /// Validator of every simple type, built-ins and synthesized text types included
    pub validators: BTreeMap<TypeId, ValidatorId>,
}

impl SimpleTypes {
    pub fn validator(&self, id: TypeId) -> Option<ValidatorId> {
        self.validators.get(&id).copied()
    }
}

#[derive(Debug, Clone, Copy)]
struct Bound {
    value: u64,
    fixed: bool,
    origin: TypeId,
}

#[derive(Debug, Clone)]
struct RangeBound {
    value: AtomicValue,
    key: ValueRef,
    fixed: bool,
    origin: TypeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum RangeKind {
    MinInclusive,
    MinExclusive,
    MaxInclusive,
    MaxExclusive,
}

impl RangeKind {
    fn of(kind: FacetKind) -> Option<Self> {
        match kind {
            FacetKind::MinInclusive => Some(RangeKind::MinInclusive),
            FacetKind::MinExclusive => Some(RangeKind::MinExclusive),
            FacetKind::MaxInclusive => Some(RangeKind::MaxInclusive),
            FacetKind::MaxExclusive => Some(RangeKind::MaxExclusive),
            _ => None,
        }
    }

    fn is_min(&self) -> bool {
        matches!(self, RangeKind::MinInclusive | RangeKind::MinExclusive)
    }

    fn op(&self) -> FacetOp {
        match self {
            RangeKind::MinInclusive => FacetOp::MinInclusive,
            RangeKind::MinExclusive => FacetOp::MinExclusive,
            RangeKind::MaxInclusive => FacetOp::MaxInclusive,
            RangeKind::MaxExclusive => FacetOp::MaxExclusive,
        }
    }

    /// Whether a new bound `self = v` stays inside an inherited bound
    /// `base = b`, given `v.compare(b)`
    fn within(&self, base: RangeKind, ord: Ordering) -> bool {
        use RangeKind::*;
        match (self, base) {
            (MinInclusive, MinExclusive) | (MaxInclusive, MinExclusive) => ord == Ordering::Greater,
            (MinInclusive, MaxExclusive) | (MaxInclusive, MaxExclusive) => ord == Ordering::Less,
            (MinExclusive, MaxInclusive) | (MinExclusive, MaxExclusive) => ord == Ordering::Less,
            (MaxExclusive, MinInclusive) | (MaxExclusive, MinExclusive) => ord == Ordering::Greater,
            (_, MinInclusive) | (_, MinExclusive) => ord != Ordering::Less,
            (_, MaxInclusive) | (_, MaxExclusive) => ord != Ordering::Greater,
        }
    }
}

/// Effective facets of a type, inherited step by step
#[derive(Debug, Clone, Default)]
struct FacetState {
    patterns: Vec<(u32, TypeId)>,
    enums: Vec<(EnumId, TypeId)>,
    length: Option<Bound>,
    min_length: Option<Bound>,
    max_length: Option<Bound>,
    total_digits: Option<Bound>,
    fraction_digits: Option<Bound>,
    ranges: BTreeMap<RangeKind, RangeBound>,
}

impl FacetState {
    fn emit(&self) -> Vec<FacetInstr> {
        let mut program = Vec::new();
        for (pattern, origin) in &self.patterns {
            program.push(FacetInstr::new(FacetOp::Pattern, *pattern, *origin));
        }
        for (set, origin) in &self.enums {
            program.push(FacetInstr::new(FacetOp::Enumeration, set.0, *origin));
        }
        let counted = [
            (FacetOp::Length, self.length),
            (FacetOp::MinLength, self.min_length),
            (FacetOp::MaxLength, self.max_length),
            (FacetOp::TotalDigits, self.total_digits),
            (FacetOp::FractionDigits, self.fraction_digits),
        ];
        for (op, bound) in counted {
            if let Some(bound) = bound {
                let value = u32::try_from(bound.value).unwrap_or(u32::MAX);
                program.push(FacetInstr::new(op, value, bound.origin));
            }
        }
        for (kind, bound) in &self.ranges {
            program.push(FacetInstr::new(kind.op(), bound.key.0, bound.origin));
        }
        program
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Atomic(AtomicKind),
    List,
    Union,
}

#[derive(Debug, Clone)]
struct CompiledType {
    validator: ValidatorId,
    shape: Shape,
    white_space: WhiteSpace,
    role: Option<IdentityRole>,
    facets: FacetState,
}

struct Compiler<'r, 's> {
    registry: &'r Registry<'s>,
    limits: &'r Limits,
    tables: SimpleTables,
    done: BTreeMap<TypeId, CompiledType>,
    in_progress: BTreeSet<TypeId>,
}

/// Compile every simple type in registration order
#[instrument(skip_all)]
pub(crate) fn compile_simple_types(
    registry: &Registry<'_>,
    limits: &Limits,
) -> Result<SimpleTypes, CompileError> {
    let mut compiler = Compiler {
        registry,
        limits,
        tables: SimpleTables::default(),
        done: BTreeMap::new(),
        in_progress: BTreeSet::new(),
    };
    for i in 0..registry.types.len() {
        let id = TypeId(i as u32);
        if !registry.type_info(id).is_complex() {
            compiler.compile(id)?;
        }
    }
    let validators: BTreeMap<TypeId, ValidatorId> = compiler
        .done
        .iter()
        .map(|(id, compiled)| (*id, compiled.validator))
        .collect();
    debug!(
        validators = compiler.tables.validators.len(),
        instructions = compiler.tables.instructions.len(),
        patterns = compiler.tables.patterns.len(),
        enums = compiler.tables.enums.len(),
        "simple types compiled"
    );
    Ok(SimpleTypes {
        tables: compiler.tables,
        validators,
    })
}

/// Type whose validator checks the text of `id`, if it has simple text
///
/// Simple types are their own text type; a simple-content restriction uses
/// its synthesized type; a simple-content extension inherits its base's.
pub(crate) fn text_type(registry: &Registry<'_>, id: TypeId) -> Option<TypeId> {
    let mut current = id;
    for _ in 0..=registry.types.len() {
        match registry.type_info(current).slot {
            TypeSlot::Builtin(b) if b.is_complex() => return None,
            TypeSlot::Builtin(_) | TypeSlot::Simple(_) | TypeSlot::SimpleContent(_) => {
                return Some(current)
            }
            TypeSlot::Complex(def) => match &def.content {
                ComplexContent::SimpleContent { derivation, .. } => {
                    if *derivation == DerivationMethod::Restriction {
                        return registry.simple_content.get(&current).copied();
                    }
                    current = def.base().and_then(|base| registry.type_of_ref(base))?;
                }
                _ => return None,
            },
        }
    }
    None
}

fn inconsistent(message: String) -> CompileError {
    CompileError::new(CompileErrorKind::FacetInconsistent, message)
}

impl<'r, 's> Compiler<'r, 's> {
    fn compile(&mut self, id: TypeId) -> Result<CompiledType, CompileError> {
        if let Some(done) = self.done.get(&id) {
            return Ok(done.clone());
        }
        if !self.in_progress.insert(id) {
            return Err(CompileError::new(
                CompileErrorKind::TypeDerivationCycle,
                format!("simple type {} derives from itself", self.name(id)),
            ));
        }
        let compiled = match self.registry.type_info(id).slot {
            TypeSlot::Builtin(builtin) => self.builtin(id, builtin),
            TypeSlot::Simple(def) => match &def.derivation {
                SimpleDerivation::Restriction { base, facets } => {
                    let base_id = self.registry.type_of_ref(base).ok_or_else(|| {
                        CompileError::new(
                            CompileErrorKind::UnresolvedReference,
                            format!("base of simple type {} is unresolved", self.name(id)),
                        )
                    })?;
                    self.check_final(base_id, DerivationMethod::Restriction, id)?;
                    self.restriction(id, base_id, facets)
                }
                SimpleDerivation::List { item_type } => self.list(id, item_type),
                SimpleDerivation::Union { member_types } => self.union(id, member_types),
            },
            TypeSlot::SimpleContent(def) => {
                let base_id = def
                    .base()
                    .and_then(|base| self.registry.type_of_ref(base))
                    .and_then(|base| text_type(self.registry, base))
                    .unwrap_or(ANY_SIMPLE_TYPE);
                let facets: &[Facet] = match &def.content {
                    ComplexContent::SimpleContent { facets, .. } => facets,
                    _ => &[],
                };
                self.restriction(id, base_id, facets)
            }
            TypeSlot::Complex(_) => Err(CompileError::new(
                CompileErrorKind::StructureViolation,
                format!("{} is not a simple type", self.name(id)),
            )),
        }
        .map_err(|e| match e.component {
            Some(_) => e,
            None => {
                let name = self.name(id);
                e.with_component(name)
            }
        })?;
        self.in_progress.remove(&id);
        trace!(type_id = id.0, validator = compiled.validator.0, "simple type compiled");
        self.done.insert(id, compiled.clone());
        Ok(compiled)
    }

    fn name(&self, id: TypeId) -> String {
        self.registry.type_info(id).display_name()
    }

    fn check_final(&self, base: TypeId, method: DerivationMethod, derived: TypeId) -> Result<(), CompileError> {
        if self.registry.type_final(base).contains(method) {
            return Err(CompileError::new(
                CompileErrorKind::StructureViolation,
                format!(
                    "{} cannot be derived by {} from {}: final",
                    self.name(derived),
                    method,
                    self.name(base)
                ),
            ));
        }
        Ok(())
    }

    fn push(&mut self, id: TypeId, kind: ValidatorKind, role: Option<IdentityRole>) -> ValidatorId {
        let validator = ValidatorId(self.tables.validators.len() as u32);
        self.tables.validators.push(SimpleValidator {
            type_id: id,
            kind,
            role,
        });
        validator
    }

    fn builtin(&mut self, id: TypeId, builtin: &'static BuiltinType) -> Result<CompiledType, CompileError> {
        let role = match builtin.name {
            "ID" => Some(IdentityRole::Id),
            "IDREF" => Some(IdentityRole::IdRef),
            _ => None,
        };
        if builtin.category == TypeCategory::List {
            let item_id = builtin
                .list_item
                .and_then(|item| self.registry.global_types.get(&crate::namespaces::QName::xsd(item)))
                .copied()
                .unwrap_or(ANY_SIMPLE_TYPE);
            let item = self.compile(item_id)?;
            let facets = FacetState {
                min_length: Some(Bound {
                    value: 1,
                    fixed: false,
                    origin: id,
                }),
                ..FacetState::default()
            };
            let program = self.tables.push_program(&facets.emit());
            let validator = self.push(
                id,
                ValidatorKind::List {
                    white_space: WhiteSpace::Collapse,
                    program,
                    item: item.validator,
                },
                item.role,
            );
            return Ok(CompiledType {
                validator,
                shape: Shape::List,
                white_space: WhiteSpace::Collapse,
                role: item.role,
                facets,
            });
        }
        let kind = AtomicKind {
            primitive: builtin.primitive,
            string_kind: builtin.string_kind,
            integer_kind: builtin.integer_kind,
        };
        let program = self.tables.push_program(&[]);
        let validator = self.push(
            id,
            ValidatorKind::Atomic {
                kind,
                white_space: builtin.white_space,
                program,
            },
            role,
        );
        Ok(CompiledType {
            validator,
            shape: Shape::Atomic(kind),
            white_space: builtin.white_space,
            role,
            facets: FacetState::default(),
        })
    }

    fn list(&mut self, id: TypeId, item_type: &crate::components::TypeRef) -> Result<CompiledType, CompileError> {
        let item_id = self.registry.type_of_ref(item_type).ok_or_else(|| {
            CompileError::new(
                CompileErrorKind::UnresolvedReference,
                format!("item type of {} is unresolved", self.name(id)),
            )
        })?;
        self.check_final(item_id, DerivationMethod::List, id)?;
        let item = self.compile(item_id)?;
        if item.shape == Shape::List {
            return Err(CompileError::new(
                CompileErrorKind::StructureViolation,
                format!("item type {} of a list is itself a list", self.name(item_id)),
            ));
        }
        let program = self.tables.push_program(&[]);
        let validator = self.push(
            id,
            ValidatorKind::List {
                white_space: WhiteSpace::Collapse,
                program,
                item: item.validator,
            },
            item.role,
        );
        Ok(CompiledType {
            validator,
            shape: Shape::List,
            white_space: WhiteSpace::Collapse,
            role: item.role,
            facets: FacetState::default(),
        })
    }

    fn union(&mut self, id: TypeId, member_types: &[crate::components::TypeRef]) -> Result<CompiledType, CompileError> {
        let mut members = Vec::with_capacity(member_types.len());
        let mut ids = Vec::with_capacity(member_types.len());
        for member in member_types {
            let member_id = self.registry.type_of_ref(member).ok_or_else(|| {
                CompileError::new(
                    CompileErrorKind::UnresolvedReference,
                    format!("member type of {} is unresolved", self.name(id)),
                )
            })?;
            self.check_final(member_id, DerivationMethod::Union, id)?;
            members.push(self.compile(member_id)?.validator);
            ids.push(member_id);
        }
        let program = self.tables.push_program(&[]);
        let validator = self.push(
            id,
            ValidatorKind::Union {
                white_space: WhiteSpace::Preserve,
                program,
                members,
                member_types: ids,
                type_name: self.registry.type_info(id).name.clone(),
            },
            None,
        );
        Ok(CompiledType {
            validator,
            shape: Shape::Union,
            white_space: WhiteSpace::Preserve,
            role: None,
            facets: FacetState::default(),
        })
    }

    fn admits(shape: Shape, facet: FacetKind) -> bool {
        match shape {
            Shape::Atomic(kind) => kind.primitive.admits(facet),
            Shape::List => LIST_FACETS.contains(&facet),
            Shape::Union => UNION_FACETS.contains(&facet),
        }
    }

    fn restriction(&mut self, id: TypeId, base_id: TypeId, facets: &[Facet]) -> Result<CompiledType, CompileError> {
        let base = self.compile(base_id)?;
        let mut state = base.facets.clone();
        let mut white_space = base.white_space;
        let mut patterns: Vec<String> = Vec::new();
        let mut enum_keys: Vec<CanonicalKey> = Vec::new();
        let mut has_enum = false;
        let mut step_ranges: BTreeSet<RangeKind> = BTreeSet::new();

        for facet in facets {
            if !Self::admits(base.shape, facet.kind) {
                return Err(inconsistent(format!(
                    "facet {} is not applicable to the base type {}",
                    facet.kind,
                    self.name(base_id)
                )));
            }
            match facet.kind {
                FacetKind::Pattern => patterns.push(facet.value.clone()),
                FacetKind::Enumeration => {
                    has_enum = true;
                    let value = crate::validators::simple_types::validate(
                        &self.tables,
                        base.validator,
                        &facet.value,
                        &facet.namespaces,
                    )
                    .map_err(|e| {
                        CompileError::new(
                            CompileErrorKind::InvalidEnumerationValue,
                            format!(
                                "enumeration value '{}' is not valid for the base type: {}",
                                facet.value, e.message
                            ),
                        )
                    })?;
                    enum_keys.push(value.key);
                }
                FacetKind::WhiteSpace => {
                    let mode = WhiteSpace::from_str(facet.value.trim()).ok_or_else(|| {
                        inconsistent(format!("invalid whiteSpace value '{}'", facet.value))
                    })?;
                    if mode < base.white_space {
                        return Err(inconsistent(format!(
                            "whiteSpace {} is looser than the base's {}",
                            mode, base.white_space
                        )));
                    }
                    white_space = mode;
                }
                kind if kind.is_integer_valued() => self.integer_facet(id, &base.facets, &mut state, facet)?,
                kind => {
                    if let Some(range) = RangeKind::of(kind) {
                        if !step_ranges.insert(range) {
                            return Err(inconsistent(format!("{} given twice in one step", kind)));
                        }
                        self.range_facet(id, &base, &mut state, range, facet)?;
                    }
                }
            }
        }

        if !patterns.is_empty() {
            let regex = compile_pattern_group(&patterns)?;
            let pattern = self.tables.patterns.len() as u32;
            self.tables.patterns.push(CompiledPattern {
                sources: patterns,
                regex,
            });
            state.patterns.push((pattern, id));
        }
        if has_enum {
            let set = self.tables.enums.add(&mut self.tables.values, &enum_keys);
            state.enums.push((set, id));
        }
        if step_ranges.contains(&RangeKind::MinInclusive) && step_ranges.contains(&RangeKind::MinExclusive)
            || step_ranges.contains(&RangeKind::MaxInclusive) && step_ranges.contains(&RangeKind::MaxExclusive)
        {
            return Err(inconsistent(
                "inclusive and exclusive bounds on the same side".to_string(),
            ));
        }
        check_consistency(&state)?;

        let program = self.tables.push_program(&state.emit());
        let role = base.role;
        let kind = match base.shape {
            Shape::Atomic(kind) => ValidatorKind::Atomic {
                kind,
                white_space,
                program,
            },
            Shape::List => {
                let item = match self.tables.validator(base.validator).map(|v| &v.kind) {
                    Some(ValidatorKind::List { item, .. }) => *item,
                    _ => base.validator,
                };
                ValidatorKind::List {
                    white_space,
                    program,
                    item,
                }
            }
            Shape::Union => {
                let (members, member_types) = match self.tables.validator(base.validator).map(|v| &v.kind) {
                    Some(ValidatorKind::Union {
                        members,
                        member_types,
                        ..
                    }) => (members.clone(), member_types.clone()),
                    _ => (vec![base.validator], vec![base_id]),
                };
                ValidatorKind::Union {
                    white_space,
                    program,
                    members,
                    member_types,
                    type_name: self.registry.type_info(id).name.clone(),
                }
            }
        };
        let validator = self.push(id, kind, role);
        Ok(CompiledType {
            validator,
            shape: base.shape,
            white_space,
            role,
            facets: state,
        })
    }

    fn integer_facet(
        &self,
        id: TypeId,
        inherited: &FacetState,
        state: &mut FacetState,
        facet: &Facet,
    ) -> Result<(), CompileError> {
        let value: u64 = facet.value.trim().parse().map_err(|_| {
            inconsistent(format!(
                "{} value '{}' is not a non-negative integer",
                facet.kind, facet.value
            ))
        })?;
        self.limits.check_facet_bound(facet.kind.name(), value)?;
        let (slot, base) = match facet.kind {
            FacetKind::Length => (&mut state.length, inherited.length),
            FacetKind::MinLength => (&mut state.min_length, inherited.min_length),
            FacetKind::MaxLength => (&mut state.max_length, inherited.max_length),
            FacetKind::TotalDigits => (&mut state.total_digits, inherited.total_digits),
            _ => (&mut state.fraction_digits, inherited.fraction_digits),
        };
        if let Some(base) = base {
            if base.fixed && base.value != value {
                return Err(inconsistent(format!(
                    "{} is fixed to {} in the base type",
                    facet.kind, base.value
                )));
            }
            let loosens = match facet.kind {
                FacetKind::Length => value != base.value,
                FacetKind::MinLength => value < base.value,
                _ => value > base.value,
            };
            if loosens {
                return Err(inconsistent(format!(
                    "{} {} loosens the base's {}",
                    facet.kind, value, base.value
                )));
            }
        }
        *slot = Some(Bound {
            value,
            fixed: facet.fixed,
            origin: id,
        });
        Ok(())
    }

    fn range_facet(
        &mut self,
        id: TypeId,
        base: &CompiledType,
        state: &mut FacetState,
        kind: RangeKind,
        facet: &Facet,
    ) -> Result<(), CompileError> {
        let value = crate::validators::simple_types::validate(
            &self.tables,
            base.validator,
            &facet.value,
            &facet.namespaces,
        )
        .map_err(|e| {
            inconsistent(format!(
                "{} value '{}' is not valid for the base type: {}",
                facet.kind, facet.value, e.message
            ))
        })?
        .value
        .ok_or_else(|| inconsistent(format!("{} needs an atomic base type", facet.kind)))?;

        for (base_kind, bound) in &base.facets.ranges {
            if *base_kind == kind && bound.fixed && bound.value != value {
                return Err(inconsistent(format!(
                    "{} is fixed to {} in the base type",
                    facet.kind,
                    bound.value.canonical()
                )));
            }
            // incomparable values cannot be checked
            if let Some(ord) = value.compare(&bound.value) {
                if !kind.within(*base_kind, ord) {
                    return Err(inconsistent(format!(
                        "{} {} is outside the base's {} {}",
                        facet.kind,
                        value.canonical(),
                        base_kind.op(),
                        bound.value.canonical()
                    )));
                }
            }
        }

        // a new bound replaces the inherited one of the other kind on the same side
        state.ranges.retain(|k, bound| k.is_min() != kind.is_min() || bound.origin == id);
        let key = self.tables.values.intern(&value.key());
        state.ranges.insert(
            kind,
            RangeBound {
                value,
                key,
                fixed: facet.fixed,
                origin: id,
            },
        );
        Ok(())
    }
}

fn check_consistency(state: &FacetState) -> Result<(), CompileError> {
    if let (Some(min), Some(max)) = (state.min_length, state.max_length) {
        if min.value > max.value {
            return Err(inconsistent(format!(
                "minLength {} exceeds maxLength {}",
                min.value, max.value
            )));
        }
    }
    if let Some(length) = state.length {
        let below = state.min_length.map_or(false, |min| length.value < min.value);
        let above = state.max_length.map_or(false, |max| length.value > max.value);
        if below || above {
            return Err(inconsistent(format!(
                "length {} conflicts with minLength/maxLength",
                length.value
            )));
        }
    }
    if let (Some(fraction), Some(total)) = (state.fraction_digits, state.total_digits) {
        if fraction.value > total.value {
            return Err(inconsistent(format!(
                "fractionDigits {} exceeds totalDigits {}",
                fraction.value, total.value
            )));
        }
    }
    for (min_kind, min) in state.ranges.iter().filter(|(k, _)| k.is_min()) {
        for (max_kind, max) in state.ranges.iter().filter(|(k, _)| !k.is_min()) {
            let Some(ord) = min.value.compare(&max.value) else {
                continue;
            };
            let ok = match (min_kind, max_kind) {
                (RangeKind::MinInclusive, RangeKind::MaxInclusive) => ord != Ordering::Greater,
                _ => ord == Ordering::Less,
            };
            if !ok {
                return Err(inconsistent(format!(
                    "{} {} is not below {} {}",
                    min_kind.op(),
                    min.value.canonical(),
                    max_kind.op(),
                    max.value.canonical()
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::cycles::check_cycles;
    use crate::compiler::resolver::resolve;
    use crate::components::{SimpleTypeDef, TypeRef, XsdSchema};
    use crate::error::ValidationErrorKind;
    use crate::namespaces::{NoNamespaces, QName};
    use crate::validators::simple_types::validate;

    fn compile(schema: &XsdSchema) -> Result<(SimpleTypes, BTreeMap<QName, TypeId>), CompileError> {
        let index = resolve(schema)?;
        let mut registry = Registry::build(&index);
        check_cycles(&index, &registry)?;
        registry.assign_element_types();
        let types = compile_simple_types(&registry, &Limits::default())?;
        Ok((types, registry.global_types.clone()))
    }

    fn check(schema: &XsdSchema, ty: &str, lexical: &str) -> Result<(), ValidationErrorKind> {
        let (types, globals) = compile(schema).unwrap();
        let validator = types.validator(globals[&QName::local(ty)]).unwrap();
        validate(&types.tables, validator, lexical, &NoNamespaces)
            .map(|_| ())
            .map_err(|e| e.kind)
    }

    fn schema_with(def: SimpleTypeDef) -> XsdSchema {
        let mut schema = XsdSchema::new(None);
        schema.add_simple_type(def);
        schema
    }

    #[test]
    fn test_money_facet_chain() {
        let schema = schema_with(
            SimpleTypeDef::restriction(Some("Money"), TypeRef::xsd("decimal"))
                .with_facet(Facet::fraction_digits(2))
                .with_facet(Facet::total_digits(12)),
        );
        assert!(check(&schema, "Money", "1.5").is_ok());
        assert!(check(&schema, "Money", "1234567890.12").is_ok());
        assert_eq!(
            check(&schema, "Money", "1.555"),
            Err(ValidationErrorKind::FacetViolation(FacetOp::FractionDigits))
        );
        assert_eq!(
            check(&schema, "Money", "12345678901.12"),
            Err(ValidationErrorKind::FacetViolation(FacetOp::TotalDigits))
        );
    }

    #[test]
    fn test_id_list_with_min_length() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_simple_type(SimpleTypeDef::list(Some("ids"), TypeRef::xsd("ID")))
            .add_simple_type(
                SimpleTypeDef::restriction(Some("idList"), TypeRef::named(QName::local("ids")))
                    .with_facet(Facet::min_length(1)),
            );
        assert!(check(&schema, "idList", "a b c").is_ok());
        assert!(check(&schema, "idList", "a a").is_ok());
        assert_eq!(
            check(&schema, "idList", ""),
            Err(ValidationErrorKind::FacetViolation(FacetOp::MinLength))
        );
    }

    #[test]
    fn test_patterns_and_across_steps() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_simple_type(
                SimpleTypeDef::restriction(Some("Code"), TypeRef::xsd("string"))
                    .with_facet(Facet::pattern("[A-Z]+"))
                    .with_facet(Facet::pattern("[0-9]+")),
            )
            .add_simple_type(
                SimpleTypeDef::restriction(Some("Short"), TypeRef::named(QName::local("Code")))
                    .with_facet(Facet::pattern(".{2}")),
            );
        assert!(check(&schema, "Code", "ABC").is_ok());
        assert!(check(&schema, "Code", "123").is_ok());
        assert!(check(&schema, "Code", "A1").is_err());
        assert!(check(&schema, "Short", "AB").is_ok());
        assert!(check(&schema, "Short", "ABC").is_err());
    }

    #[test]
    fn test_enumeration_literals_are_typed() {
        let schema = schema_with(
            SimpleTypeDef::restriction(Some("Small"), TypeRef::xsd("integer"))
                .with_facet(Facet::enumeration("01"))
                .with_facet(Facet::enumeration("2")),
        );
        assert!(check(&schema, "Small", "1").is_ok());
        assert!(check(&schema, "Small", "+002").is_ok());
        assert_eq!(check(&schema, "Small", "3"), Err(ValidationErrorKind::EnumNotMember));

        let bad = schema_with(
            SimpleTypeDef::restriction(Some("Bad"), TypeRef::xsd("integer"))
                .with_facet(Facet::enumeration("x")),
        );
        assert_eq!(
            compile(&bad).unwrap_err().kind,
            CompileErrorKind::InvalidEnumerationValue
        );
    }

    #[test]
    fn test_range_inheritance() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_simple_type(
                SimpleTypeDef::restriction(Some("Percent"), TypeRef::xsd("decimal"))
                    .with_facet(Facet::new(FacetKind::MinInclusive, "0"))
                    .with_facet(Facet::new(FacetKind::MaxInclusive, "100")),
            )
            .add_simple_type(
                SimpleTypeDef::restriction(Some("Positive"), TypeRef::named(QName::local("Percent")))
                    .with_facet(Facet::new(FacetKind::MinExclusive, "0")),
            );
        assert!(check(&schema, "Percent", "0").is_ok());
        assert!(check(&schema, "Positive", "100").is_ok());
        assert_eq!(
            check(&schema, "Positive", "0"),
            Err(ValidationErrorKind::FacetViolation(FacetOp::MinExclusive))
        );
        assert_eq!(
            check(&schema, "Positive", "101"),
            Err(ValidationErrorKind::FacetViolation(FacetOp::MaxInclusive))
        );
    }

    #[test]
    fn test_inconsistent_facets() {
        let loosened = schema_with(
            SimpleTypeDef::restriction(Some("T"), TypeRef::xsd("byte"))
                .with_facet(Facet::new(FacetKind::MaxInclusive, "1000")),
        );
        assert_eq!(compile(&loosened).unwrap_err().kind, CompileErrorKind::FacetInconsistent);

        let crossed = schema_with(
            SimpleTypeDef::restriction(Some("T"), TypeRef::xsd("string"))
                .with_facet(Facet::min_length(5))
                .with_facet(Facet::max_length(2)),
        );
        assert_eq!(compile(&crossed).unwrap_err().kind, CompileErrorKind::FacetInconsistent);

        let inapplicable = schema_with(
            SimpleTypeDef::restriction(Some("T"), TypeRef::xsd("boolean")).with_facet(Facet::length(1)),
        );
        assert_eq!(
            compile(&inapplicable).unwrap_err().kind,
            CompileErrorKind::FacetInconsistent
        );

        let whitespace = schema_with(
            SimpleTypeDef::restriction(Some("T"), TypeRef::xsd("token"))
                .with_facet(Facet::white_space(WhiteSpace::Preserve)),
        );
        assert_eq!(compile(&whitespace).unwrap_err().kind, CompileErrorKind::FacetInconsistent);
    }

    #[test]
    fn test_fixed_facet_cannot_change() {
        let mut schema = XsdSchema::new(None);
        schema
            .add_simple_type(
                SimpleTypeDef::restriction(Some("A"), TypeRef::xsd("string"))
                    .with_facet(Facet::max_length(10).fixed()),
            )
            .add_simple_type(
                SimpleTypeDef::restriction(Some("B"), TypeRef::named(QName::local("A")))
                    .with_facet(Facet::max_length(5)),
            );
        assert_eq!(compile(&schema).unwrap_err().kind, CompileErrorKind::FacetInconsistent);
    }

    #[test]
    fn test_list_of_list_rejected() {
        let mut schema = XsdSchema::new(None);
        schema.add_simple_type(SimpleTypeDef::list(Some("L"), TypeRef::xsd("IDREFS")));
        assert_eq!(compile(&schema).unwrap_err().kind, CompileErrorKind::StructureViolation);
    }

    #[test]
    fn test_union_first_member_wins() {
        let mut schema = XsdSchema::new(None);
        schema.add_simple_type(SimpleTypeDef::union(
            Some("U"),
            vec![TypeRef::xsd("int"), TypeRef::xsd("date")],
        ));
        assert!(check(&schema, "U", "12").is_ok());
        assert!(check(&schema, "U", "2024-01-31").is_ok());
        assert_eq!(check(&schema, "U", "nope"), Err(ValidationErrorKind::UnionNoMatch));
    }

    #[test]
    fn test_builtin_lists_need_one_item() {
        let (types, globals) = compile(&XsdSchema::new(None)).unwrap();
        let idrefs = types.validator(globals[&QName::xsd("IDREFS")]).unwrap();
        assert!(validate(&types.tables, idrefs, "a b", &NoNamespaces).is_ok());
        assert!(validate(&types.tables, idrefs, " ", &NoNamespaces).is_err());
    }
}
