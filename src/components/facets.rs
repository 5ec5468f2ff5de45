//! XSD constraining facets as written in a restriction step
//!
//! Facets here are raw: the value is the lexical form from the schema. The
//! simple-type compiler types them against the resolved base and lowers
//! them into facet instructions.

use std::fmt;

use crate::namespaces::NamespaceContext;

/// White space handling modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WhiteSpace {
    /// Preserve all white space
    Preserve,
    /// Replace tabs and newlines with spaces
    Replace,
    /// Replace and collapse multiple spaces
    Collapse,
}

impl WhiteSpace {
    /// Parse from string value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "preserve" => Some(WhiteSpace::Preserve),
            "replace" => Some(WhiteSpace::Replace),
            "collapse" => Some(WhiteSpace::Collapse),
            _ => None,
        }
    }

    /// Attribute spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            WhiteSpace::Preserve => "preserve",
            WhiteSpace::Replace => "replace",
            WhiteSpace::Collapse => "collapse",
        }
    }

    /// Normalize a string according to this white space mode
    pub fn normalize(&self, s: &str) -> String {
        match self {
            WhiteSpace::Preserve => s.to_string(),
            WhiteSpace::Replace => s.replace(['\t', '\n', '\r'], " "),
            WhiteSpace::Collapse => {
                let mut result = String::with_capacity(s.len());
                for word in s.split([' ', '\t', '\n', '\r']).filter(|w| !w.is_empty()) {
                    if !result.is_empty() {
                        result.push(' ');
                    }
                    result.push_str(word);
                }
                result
            }
        }
    }
}

impl fmt::Display for WhiteSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facet kinds of XSD 1.0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FacetKind {
    /// xs:length
    Length,
    /// xs:minLength
    MinLength,
    /// xs:maxLength
    MaxLength,
    /// xs:pattern
    Pattern,
    /// xs:enumeration
    Enumeration,
    /// xs:whiteSpace
    WhiteSpace,
    /// xs:maxInclusive
    MaxInclusive,
    /// xs:maxExclusive
    MaxExclusive,
    /// xs:minInclusive
    MinInclusive,
    /// xs:minExclusive
    MinExclusive,
    /// xs:totalDigits
    TotalDigits,
    /// xs:fractionDigits
    FractionDigits,
}

impl FacetKind {
    /// Element local name of the facet
    pub fn name(&self) -> &'static str {
        match self {
            FacetKind::Length => "length",
            FacetKind::MinLength => "minLength",
            FacetKind::MaxLength => "maxLength",
            FacetKind::Pattern => "pattern",
            FacetKind::Enumeration => "enumeration",
            FacetKind::WhiteSpace => "whiteSpace",
            FacetKind::MaxInclusive => "maxInclusive",
            FacetKind::MaxExclusive => "maxExclusive",
            FacetKind::MinInclusive => "minInclusive",
            FacetKind::MinExclusive => "minExclusive",
            FacetKind::TotalDigits => "totalDigits",
            FacetKind::FractionDigits => "fractionDigits",
        }
    }

    /// Parse from the facet element's local name
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "length" => FacetKind::Length,
            "minLength" => FacetKind::MinLength,
            "maxLength" => FacetKind::MaxLength,
            "pattern" => FacetKind::Pattern,
            "enumeration" => FacetKind::Enumeration,
            "whiteSpace" => FacetKind::WhiteSpace,
            "maxInclusive" => FacetKind::MaxInclusive,
            "maxExclusive" => FacetKind::MaxExclusive,
            "minInclusive" => FacetKind::MinInclusive,
            "minExclusive" => FacetKind::MinExclusive,
            "totalDigits" => FacetKind::TotalDigits,
            "fractionDigits" => FacetKind::FractionDigits,
            _ => return None,
        })
    }

    /// Facets whose value is a value of the base type
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            FacetKind::MaxInclusive
                | FacetKind::MaxExclusive
                | FacetKind::MinInclusive
                | FacetKind::MinExclusive
        )
    }

    /// Facets whose value is a non-negative integer
    pub fn is_integer_valued(&self) -> bool {
        matches!(
            self,
            FacetKind::Length
                | FacetKind::MinLength
                | FacetKind::MaxLength
                | FacetKind::TotalDigits
                | FacetKind::FractionDigits
        )
    }
}

impl fmt::Display for FacetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A facet as it appears in one restriction step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facet {
    /// Which facet
    pub kind: FacetKind,
    /// Lexical value from the schema
    pub value: String,
    /// `fixed="true"`
    pub fixed: bool,
    /// Namespace declarations in scope at the facet (QName enumerations)
    pub namespaces: NamespaceContext,
}

impl Facet {
    /// Create a facet
    pub fn new(kind: FacetKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            fixed: false,
            namespaces: NamespaceContext::new(),
        }
    }

    /// Mark the facet fixed
    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    /// Attach the namespace context
    pub fn with_namespaces(mut self, namespaces: NamespaceContext) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// xs:enumeration
    pub fn enumeration(value: impl Into<String>) -> Self {
        Self::new(FacetKind::Enumeration, value)
    }

    /// xs:pattern
    pub fn pattern(value: impl Into<String>) -> Self {
        Self::new(FacetKind::Pattern, value)
    }

    /// xs:length
    pub fn length(n: u64) -> Self {
        Self::new(FacetKind::Length, n.to_string())
    }

    /// xs:minLength
    pub fn min_length(n: u64) -> Self {
        Self::new(FacetKind::MinLength, n.to_string())
    }

    /// xs:maxLength
    pub fn max_length(n: u64) -> Self {
        Self::new(FacetKind::MaxLength, n.to_string())
    }

    /// xs:totalDigits
    pub fn total_digits(n: u64) -> Self {
        Self::new(FacetKind::TotalDigits, n.to_string())
    }

    /// xs:fractionDigits
    pub fn fraction_digits(n: u64) -> Self {
        Self::new(FacetKind::FractionDigits, n.to_string())
    }

    /// xs:whiteSpace
    pub fn white_space(mode: WhiteSpace) -> Self {
        Self::new(FacetKind::WhiteSpace, mode.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_normalize() {
        assert_eq!(WhiteSpace::Preserve.normalize(" a\tb "), " a\tb ");
        assert_eq!(WhiteSpace::Replace.normalize(" a\tb\n"), " a b ");
        assert_eq!(WhiteSpace::Collapse.normalize("  a \t\n b  "), "a b");
        assert_eq!(WhiteSpace::Collapse.normalize("   "), "");
    }

    #[test]
    fn test_whitespace_parse() {
        assert_eq!(WhiteSpace::from_str("collapse"), Some(WhiteSpace::Collapse));
        assert_eq!(WhiteSpace::from_str("trim"), None);
    }

    #[test]
    fn test_facet_kind_names() {
        for kind in [
            FacetKind::Length,
            FacetKind::Pattern,
            FacetKind::MaxExclusive,
            FacetKind::FractionDigits,
        ] {
            assert_eq!(FacetKind::from_name(kind.name()), Some(kind));
        }
        assert!(FacetKind::MinInclusive.is_range());
        assert!(!FacetKind::Pattern.is_range());
        assert!(FacetKind::TotalDigits.is_integer_valued());
    }

    #[test]
    fn test_facet_builders() {
        let f = Facet::max_length(5).fixed();
        assert_eq!(f.kind, FacetKind::MaxLength);
        assert_eq!(f.value, "5");
        assert!(f.fixed);
    }
}
