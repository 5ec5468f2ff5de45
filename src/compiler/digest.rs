//! Canonical SHA-256 digest of a compiled schema
//!
//! Every table is fed in index order and every map in key order, each
//! field length-prefixed, so equal artifacts hash equally across runs.

use sha2::{Digest, Sha256};

use crate::compiled::{
    AttributeUse, CompiledSchema, ContentModel, Dfa, ElementModel, IdentityKind, SymbolKind,
    TypeEntry, ValidatorKind, ValueConstraintRef,
};
use crate::components::{DerivationSet, MaxOccurs, NamespaceConstraint, Wildcard};
use crate::namespaces::QName;

struct Writer {
    hasher: Sha256,
}

impl Writer {
    fn u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    fn u32s(&mut self, values: &[u32]) {
        self.usize(values.len());
        values.iter().for_each(|v| self.u32(*v));
    }

    fn usize(&mut self, value: usize) {
        self.u32(value as u32);
    }

    fn i32(&mut self, value: i32) {
        self.hasher.update(value.to_le_bytes());
    }

    fn flag(&mut self, value: bool) {
        self.hasher.update([value as u8]);
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.usize(bytes.len());
        self.hasher.update(bytes);
    }

    fn str(&mut self, s: &str) {
        self.bytes(s.as_bytes());
    }

    fn opt_str(&mut self, s: Option<&str>) {
        match s {
            Some(s) => {
                self.flag(true);
                self.str(s);
            }
            None => self.flag(false),
        }
    }

    fn qname(&mut self, name: &QName) {
        self.opt_str(name.namespace());
        self.str(name.local_name());
    }

    fn opt_qname(&mut self, name: Option<&QName>) {
        self.flag(name.is_some());
        if let Some(name) = name {
            self.qname(name);
        }
    }

    fn opt_u32(&mut self, value: Option<u32>) {
        self.flag(value.is_some());
        if let Some(value) = value {
            self.u32(value);
        }
    }

    fn max(&mut self, max: MaxOccurs) {
        self.opt_u32(max.bound());
    }

    fn set(&mut self, set: DerivationSet) {
        self.hasher.update([set.bits()]);
    }

    fn constraint(&mut self, constraint: &NamespaceConstraint) {
        match constraint {
            NamespaceConstraint::Any => self.u32(0),
            NamespaceConstraint::Not(ns) => {
                self.u32(1);
                self.opt_str(ns.as_deref());
            }
            NamespaceConstraint::Set(namespaces) => {
                self.u32(2);
                self.usize(namespaces.len());
                for ns in namespaces {
                    self.opt_str(ns.as_deref());
                }
            }
        }
    }

    fn wildcard(&mut self, wildcard: Option<&Wildcard>) {
        self.flag(wildcard.is_some());
        if let Some(w) = wildcard {
            self.constraint(&w.constraint);
            self.str(w.process_contents.as_str());
        }
    }

    fn value(&mut self, value: Option<&ValueConstraintRef>) {
        self.flag(value.is_some());
        if let Some(v) = value {
            self.str(&v.lexical);
            self.u32(v.value.0);
        }
    }

    fn attribute_use(&mut self, u: &AttributeUse) {
        self.qname(&u.name);
        self.u32(u.attr.0);
        self.flag(u.required);
        self.flag(u.prohibited);
        self.value(u.default.as_ref());
        self.value(u.fixed.as_ref());
        self.u32(u.validator.0);
    }

    fn dfa(&mut self, dfa: &Dfa) {
        self.usize(dfa.symbols.len());
        for symbol in &dfa.symbols {
            match &symbol.kind {
                SymbolKind::Element {
                    name,
                    elem,
                    substitutable,
                } => {
                    self.u32(0);
                    self.qname(name);
                    self.u32(elem.0);
                    self.flag(*substitutable);
                }
                SymbolKind::Wildcard {
                    constraint,
                    process_contents,
                } => {
                    self.u32(1);
                    self.constraint(constraint);
                    self.str(process_contents.as_str());
                }
            }
            self.u32(symbol.min_total);
            self.max(symbol.max_total);
        }
        self.usize(dfa.positions.len());
        for p in &dfa.positions {
            self.u32(p.symbol);
            self.opt_u32(p.element.map(|e| e.0));
            self.u32s(&p.counters);
        }
        self.u32s(&dfa.first);
        for targets in &dfa.follow {
            self.u32s(targets);
        }
        self.usize(dfa.steps.len());
        for (&(from, to), steps) in &dfa.steps {
            self.u32(from);
            self.u32(to);
            self.usize(steps.len());
            for step in steps {
                self.u32s(&step.exit);
                self.opt_u32(step.bump);
                self.u32s(&step.enter);
            }
        }
        self.usize(dfa.transitions.len());
        for (t, pos) in dfa.transitions.iter().zip(&dfa.state_symbol_pos) {
            self.i32(*t);
            self.i32(*pos);
        }
        for (accepting, counter) in dfa.accepting.iter().zip(&dfa.state_counter) {
            self.flag(*accepting);
            self.opt_u32(*counter);
        }
        self.usize(dfa.counters.len());
        for c in &dfa.counters {
            self.u32(c.min);
            self.max(c.max);
            self.flag(c.nullable);
        }
        self.usize(dfa.element_index.len());
        for (name, symbols) in &dfa.element_index {
            self.qname(name);
            self.usize(symbols.len());
            symbols.iter().for_each(|s| self.u32(*s));
        }
        self.flag(dfa.simple_sequence.is_some());
        if let Some(seq) = &dfa.simple_sequence {
            self.usize(seq.items.len());
            for item in &seq.items {
                self.u32(item.symbol);
                self.u32(item.elem.0);
                self.u32(item.min);
                self.max(item.max);
            }
        }
    }

    fn content(&mut self, content: &ContentModel) {
        match content {
            ContentModel::Empty => self.u32(0),
            ContentModel::Simple { validator } => {
                self.u32(1);
                self.u32(validator.0);
            }
            ContentModel::Elements { model, mixed } => {
                self.u32(2);
                self.flag(*mixed);
                match model {
                    ElementModel::Dfa(dfa) => {
                        self.u32(0);
                        self.dfa(dfa);
                    }
                    ElementModel::All(all) => {
                        self.u32(1);
                        self.usize(all.entries.len());
                        for e in &all.entries {
                            self.qname(&e.name);
                            self.u32(e.elem.0);
                            self.flag(e.optional);
                            self.flag(e.allow_substitution);
                        }
                        self.u32(all.required);
                        self.flag(all.optional);
                    }
                }
            }
        }
    }
}

/// Hex SHA-256 over the compiled representation
pub fn digest(schema: &CompiledSchema) -> String {
    let mut w = Writer {
        hasher: Sha256::new(),
    };
    w.opt_str(schema.target_namespace.as_deref());

    w.usize(schema.types.len());
    for entry in &schema.types {
        match entry {
            TypeEntry::Simple(st) => {
                w.u32(0);
                w.opt_qname(st.name.as_ref());
                w.opt_u32(st.base.map(|b| b.0));
                w.str(st.derivation.as_str());
                w.str(&format!("{:?}", st.variety));
                w.set(st.final_set);
                w.u32(st.validator.0);
                w.flag(st.builtin);
            }
            TypeEntry::Complex(ct) => {
                w.u32(1);
                w.opt_qname(ct.name.as_ref());
                w.opt_u32(ct.base.map(|b| b.0));
                w.str(ct.derivation.as_str());
                w.flag(ct.is_abstract);
                w.flag(ct.mixed);
                w.set(ct.block);
                w.set(ct.final_set);
                w.usize(ct.attributes.len());
                ct.attributes.iter().for_each(|u| w.attribute_use(u));
                w.wildcard(ct.any_attribute.as_ref());
                w.content(&ct.content);
            }
        }
    }

    w.usize(schema.elements.len());
    for e in &schema.elements {
        w.qname(&e.name);
        w.u32(e.type_id.0);
        w.opt_u32(e.validator.map(|v| v.0));
        w.flag(e.nillable);
        w.flag(e.is_abstract);
        w.value(e.default.as_ref());
        w.value(e.fixed.as_ref());
        w.set(e.block);
        w.set(e.final_set);
        w.opt_u32(e.substitution_head.map(|h| h.0));
        w.usize(e.constraints.len());
        for c in &e.constraints {
            w.qname(&c.name);
            match &c.kind {
                IdentityKind::Unique => w.u32(0),
                IdentityKind::Key => w.u32(1),
                IdentityKind::KeyRef(refer) => {
                    w.u32(2);
                    w.qname(refer);
                }
            }
            w.str(&c.selector);
            w.usize(c.fields.len());
            c.fields.iter().for_each(|f| w.str(f));
        }
        w.flag(e.global);
    }

    w.usize(schema.attributes.len());
    for a in &schema.attributes {
        w.qname(&a.name);
        w.u32(a.type_id.0);
        w.u32(a.validator.0);
        w.value(a.default.as_ref());
        w.value(a.fixed.as_ref());
        w.flag(a.global);
    }

    let tables = &schema.tables;
    w.usize(tables.validators.len());
    for v in &tables.validators {
        w.u32(v.type_id.0);
        w.str(&format!("{:?}", v.role));
        w.str(v.kind.white_space().as_str());
        let program = v.kind.program();
        w.u32(program.start);
        w.u32(program.len);
        match &v.kind {
            ValidatorKind::Atomic { kind, .. } => {
                w.u32(0);
                w.str(kind.primitive.name());
                w.str(&format!("{:?}/{:?}", kind.string_kind, kind.integer_kind));
            }
            ValidatorKind::List { item, .. } => {
                w.u32(1);
                w.u32(item.0);
            }
            ValidatorKind::Union {
                members,
                member_types,
                type_name,
                ..
            } => {
                w.u32(2);
                w.usize(members.len());
                for (m, t) in members.iter().zip(member_types) {
                    w.u32(m.0);
                    w.u32(t.0);
                }
                w.opt_qname(type_name.as_ref());
            }
        }
    }
    w.usize(tables.instructions.len());
    for instr in &tables.instructions {
        w.hasher.update([instr.op.code()]);
        w.u32(instr.arg0);
        w.u32(instr.arg1);
    }
    w.usize(tables.patterns.len());
    for pattern in &tables.patterns {
        w.usize(pattern.sources.len());
        pattern.sources.iter().for_each(|s| w.str(s));
    }
    w.bytes(tables.values.as_bytes());
    w.usize(tables.enums.len());
    for set in tables.enums.iter() {
        w.usize(set.values.len());
        set.values.iter().for_each(|v| w.u32(v.0));
        w.usize(set.slots().len());
        set.slots().iter().for_each(|s| w.u32(*s));
    }

    for (name, id) in &schema.global_types {
        w.qname(name);
        w.u32(id.0);
    }
    for (name, id) in &schema.global_elements {
        w.qname(name);
        w.u32(id.0);
    }
    for (name, id) in &schema.global_attributes {
        w.qname(name);
        w.u32(id.0);
    }
    for (head, members) in &schema.substitution_groups {
        w.u32(head.0);
        w.usize(members.len());
        members.iter().for_each(|m| w.u32(m.0));
    }
    w.usize(schema.elements_with_constraints.len());
    schema.elements_with_constraints.iter().for_each(|e| w.u32(e.0));

    format!("{:x}", w.hasher.finalize())
}
