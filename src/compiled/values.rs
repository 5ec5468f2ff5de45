//! Interned canonical values and enumeration hash tables

use std::collections::HashMap;

use crate::values::{CanonicalKey, ValueKind};

/// Index of an interned value in the [`ValueBlob`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueRef(pub u32);

impl ValueRef {
    /// Index into the blob's entry list
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    kind: ValueKind,
    offset: u32,
    len: u32,
}

/// Append-only byte blob holding every canonical value the compiler interned
///
/// Entries are deduplicated on `(kind, bytes)` and numbered in insertion
/// order.
#[derive(Debug, Clone, Default)]
pub struct ValueBlob {
    bytes: Vec<u8>,
    spans: Vec<Span>,
    lookup: HashMap<CanonicalKey, ValueRef>,
}

impl ValueBlob {
    /// Create an empty blob
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a canonical value, returning the existing entry when present
    pub fn intern(&mut self, key: &CanonicalKey) -> ValueRef {
        if let Some(existing) = self.lookup.get(key) {
            return *existing;
        }
        let value = ValueRef(self.spans.len() as u32);
        self.spans.push(Span {
            kind: key.kind,
            offset: self.bytes.len() as u32,
            len: key.bytes.len() as u32,
        });
        self.bytes.extend_from_slice(&key.bytes);
        self.lookup.insert(key.clone(), value);
        value
    }

    /// Kind and bytes of an entry
    pub fn get(&self, value: ValueRef) -> Option<(ValueKind, &[u8])> {
        let span = self.spans.get(value.index())?;
        let start = span.offset as usize;
        let end = start + span.len as usize;
        Some((span.kind, &self.bytes[start..end]))
    }

    /// Entry as an owned key
    pub fn key(&self, value: ValueRef) -> Option<CanonicalKey> {
        self.get(value)
            .map(|(kind, bytes)| CanonicalKey::new(kind, bytes.to_vec()))
    }

    /// Entry rendered as text
    pub fn text(&self, value: ValueRef) -> Option<String> {
        self.key(value).map(|key| key.text())
    }

    /// Whether an entry equals `key`
    pub fn matches(&self, value: ValueRef, key: &CanonicalKey) -> bool {
        self.get(value)
            .map_or(false, |(kind, bytes)| kind == key.kind && bytes == key.bytes.as_slice())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// True if nothing was interned
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// The raw blob
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Entries in insertion order as `(kind, bytes)`
    pub fn iter(&self) -> impl Iterator<Item = (ValueKind, &[u8])> + '_ {
        (0..self.spans.len()).filter_map(move |i| self.get(ValueRef(i as u32)))
    }
}

/// Hash slot of a canonical value
pub fn value_hash(kind: ValueKind, bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[kind.as_u8()]);
    hasher.update(bytes);
    hasher.finalize()
}

/// Identifier of one enumeration set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(pub u32);

const EMPTY_SLOT: u32 = u32::MAX;

/// One enumeration: its values plus an open-addressed index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumSet {
    /// Permitted values in declaration order
    pub values: Vec<ValueRef>,
    /// Linear-probing slots holding indices into `values`
    slots: Vec<u32>,
}

impl EnumSet {
    fn build(blob: &ValueBlob, values: Vec<ValueRef>) -> Self {
        let capacity = (values.len() * 2).max(2).next_power_of_two();
        let mask = capacity - 1;
        let mut slots = vec![EMPTY_SLOT; capacity];
        for (i, value) in values.iter().enumerate() {
            if let Some((kind, bytes)) = blob.get(*value) {
                let mut slot = value_hash(kind, bytes) as usize & mask;
                while slots[slot] != EMPTY_SLOT {
                    slot = (slot + 1) & mask;
                }
                slots[slot] = i as u32;
            }
        }
        Self { values, slots }
    }

    /// Membership test
    pub fn contains(&self, blob: &ValueBlob, key: &CanonicalKey) -> bool {
        let mask = self.slots.len() - 1;
        let mut slot = value_hash(key.kind, &key.bytes) as usize & mask;
        for _ in 0..self.slots.len() {
            match self.slots[slot] {
                EMPTY_SLOT => return false,
                i => {
                    if blob.matches(self.values[i as usize], key) {
                        return true;
                    }
                }
            }
            slot = (slot + 1) & mask;
        }
        false
    }

    /// Slot layout, for the digest
    pub fn slots(&self) -> &[u32] {
        &self.slots
    }
}

/// All enumeration sets of a compiled schema
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumTable {
    sets: Vec<EnumSet>,
}

impl EnumTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern the keys and add a new set
    pub fn add(&mut self, blob: &mut ValueBlob, keys: &[CanonicalKey]) -> EnumId {
        let mut values: Vec<ValueRef> = Vec::with_capacity(keys.len());
        for key in keys {
            let value = blob.intern(key);
            if !values.contains(&value) {
                values.push(value);
            }
        }
        let id = EnumId(self.sets.len() as u32);
        self.sets.push(EnumSet::build(blob, values));
        id
    }

    /// A set by id
    pub fn get(&self, id: EnumId) -> Option<&EnumSet> {
        self.sets.get(id.0 as usize)
    }

    /// Membership test; unknown ids contain nothing
    pub fn contains(&self, blob: &ValueBlob, id: EnumId, key: &CanonicalKey) -> bool {
        self.get(id).map_or(false, |set| set.contains(blob, key))
    }

    /// All sets in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &EnumSet> {
        self.sets.iter()
    }

    /// Number of sets
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// True when no set was added
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(kind: ValueKind, s: &str) -> CanonicalKey {
        CanonicalKey::new(kind, s.as_bytes().to_vec())
    }

    #[test]
    fn test_blob_interning() {
        let mut blob = ValueBlob::new();
        let a = blob.intern(&key(ValueKind::String, "red"));
        let b = blob.intern(&key(ValueKind::String, "green"));
        let again = blob.intern(&key(ValueKind::String, "red"));
        let other_kind = blob.intern(&key(ValueKind::AnyUri, "red"));

        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_ne!(a, other_kind);
        assert_eq!(blob.len(), 3);
        assert_eq!(blob.as_bytes(), b"redgreenred");
        assert_eq!(blob.text(b).as_deref(), Some("green"));
    }

    #[test]
    fn test_enum_membership() {
        let mut blob = ValueBlob::new();
        let mut table = EnumTable::new();
        let keys: Vec<_> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|s| key(ValueKind::String, s))
            .collect();
        let id = table.add(&mut blob, &keys);

        for k in &keys {
            assert!(table.contains(&blob, id, k));
        }
        assert!(!table.contains(&blob, id, &key(ValueKind::String, "f")));
        assert!(!table.contains(&blob, id, &key(ValueKind::AnyUri, "a")));
        assert!(!table.contains(&blob, EnumId(7), &keys[0]));
    }

    #[test]
    fn test_enum_dedups_values() {
        let mut blob = ValueBlob::new();
        let mut table = EnumTable::new();
        let k = key(ValueKind::Decimal, "1");
        let id = table.add(&mut blob, &[k.clone(), k.clone()]);
        assert_eq!(table.get(id).unwrap().values.len(), 1);
    }
}
