//! XSD built-in types
//!
//! The built-in table is the only process-wide data: it is built once on
//! first use and read-only thereafter. Its order is the registration order
//! of the built-in type IDs.

use std::collections::HashSet;
use std::fmt;

use super::facets::{FacetKind, WhiteSpace};

// Type names - String types
/// XSD string type name
pub const XSD_STRING: &str = "string";
/// XSD normalizedString type name
pub const XSD_NORMALIZED_STRING: &str = "normalizedString";
/// XSD token type name
pub const XSD_TOKEN: &str = "token";
/// XSD language type name
pub const XSD_LANGUAGE: &str = "language";
/// XSD Name type name
pub const XSD_NAME: &str = "Name";
/// XSD NCName type name
pub const XSD_NCNAME: &str = "NCName";
/// XSD ID type name
pub const XSD_ID: &str = "ID";
/// XSD IDREF type name
pub const XSD_IDREF: &str = "IDREF";
/// XSD IDREFS type name
pub const XSD_IDREFS: &str = "IDREFS";
/// XSD ENTITY type name
pub const XSD_ENTITY: &str = "ENTITY";
/// XSD ENTITIES type name
pub const XSD_ENTITIES: &str = "ENTITIES";
/// XSD NMTOKEN type name
pub const XSD_NMTOKEN: &str = "NMTOKEN";
/// XSD NMTOKENS type name
pub const XSD_NMTOKENS: &str = "NMTOKENS";

/// XSD boolean type name
pub const XSD_BOOLEAN: &str = "boolean";

// Numeric types
/// XSD decimal type name
pub const XSD_DECIMAL: &str = "decimal";
/// XSD integer type name
pub const XSD_INTEGER: &str = "integer";
/// XSD long type name
pub const XSD_LONG: &str = "long";
/// XSD int type name
pub const XSD_INT: &str = "int";
/// XSD short type name
pub const XSD_SHORT: &str = "short";
/// XSD byte type name
pub const XSD_BYTE: &str = "byte";
/// XSD nonNegativeInteger type name
pub const XSD_NON_NEGATIVE_INTEGER: &str = "nonNegativeInteger";
/// XSD positiveInteger type name
pub const XSD_POSITIVE_INTEGER: &str = "positiveInteger";
/// XSD unsignedLong type name
pub const XSD_UNSIGNED_LONG: &str = "unsignedLong";
/// XSD unsignedInt type name
pub const XSD_UNSIGNED_INT: &str = "unsignedInt";
/// XSD unsignedShort type name
pub const XSD_UNSIGNED_SHORT: &str = "unsignedShort";
/// XSD unsignedByte type name
pub const XSD_UNSIGNED_BYTE: &str = "unsignedByte";
/// XSD nonPositiveInteger type name
pub const XSD_NON_POSITIVE_INTEGER: &str = "nonPositiveInteger";
/// XSD negativeInteger type name
pub const XSD_NEGATIVE_INTEGER: &str = "negativeInteger";

/// XSD float type name
pub const XSD_FLOAT: &str = "float";
/// XSD double type name
pub const XSD_DOUBLE: &str = "double";

// Date/time types
/// XSD duration type name
pub const XSD_DURATION: &str = "duration";
/// XSD dateTime type name
pub const XSD_DATETIME: &str = "dateTime";
/// XSD time type name
pub const XSD_TIME: &str = "time";
/// XSD date type name
pub const XSD_DATE: &str = "date";
/// XSD gYearMonth type name
pub const XSD_GYEAR_MONTH: &str = "gYearMonth";
/// XSD gYear type name
pub const XSD_GYEAR: &str = "gYear";
/// XSD gMonthDay type name
pub const XSD_GMONTH_DAY: &str = "gMonthDay";
/// XSD gDay type name
pub const XSD_GDAY: &str = "gDay";
/// XSD gMonth type name
pub const XSD_GMONTH: &str = "gMonth";

// Binary types
/// XSD hexBinary type name
pub const XSD_HEX_BINARY: &str = "hexBinary";
/// XSD base64Binary type name
pub const XSD_BASE64_BINARY: &str = "base64Binary";

// Other types
/// XSD anyURI type name
pub const XSD_ANY_URI: &str = "anyURI";
/// XSD QName type name
pub const XSD_QNAME: &str = "QName";
/// XSD NOTATION type name
pub const XSD_NOTATION: &str = "NOTATION";

// Special types
/// XSD anyType type name
pub const XSD_ANY_TYPE: &str = "anyType";
/// XSD anySimpleType type name
pub const XSD_ANY_SIMPLE_TYPE: &str = "anySimpleType";

/// Primitive value spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    /// anySimpleType: any string, compared as a string
    AnySimpleType,
    /// xs:string
    String,
    /// xs:boolean
    Boolean,
    /// xs:decimal (and the integer family)
    Decimal,
    /// xs:float
    Float,
    /// xs:double
    Double,
    /// xs:duration
    Duration,
    /// xs:dateTime
    DateTime,
    /// xs:time
    Time,
    /// xs:date
    Date,
    /// xs:gYearMonth
    GYearMonth,
    /// xs:gYear
    GYear,
    /// xs:gMonthDay
    GMonthDay,
    /// xs:gDay
    GDay,
    /// xs:gMonth
    GMonth,
    /// xs:hexBinary
    HexBinary,
    /// xs:base64Binary
    Base64Binary,
    /// xs:anyURI
    AnyUri,
    /// xs:QName
    QName,
    /// xs:NOTATION
    Notation,
}

impl Primitive {
    /// XSD name of the primitive
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::AnySimpleType => XSD_ANY_SIMPLE_TYPE,
            Primitive::String => XSD_STRING,
            Primitive::Boolean => XSD_BOOLEAN,
            Primitive::Decimal => XSD_DECIMAL,
            Primitive::Float => XSD_FLOAT,
            Primitive::Double => XSD_DOUBLE,
            Primitive::Duration => XSD_DURATION,
            Primitive::DateTime => XSD_DATETIME,
            Primitive::Time => XSD_TIME,
            Primitive::Date => XSD_DATE,
            Primitive::GYearMonth => XSD_GYEAR_MONTH,
            Primitive::GYear => XSD_GYEAR,
            Primitive::GMonthDay => XSD_GMONTH_DAY,
            Primitive::GDay => XSD_GDAY,
            Primitive::GMonth => XSD_GMONTH,
            Primitive::HexBinary => XSD_HEX_BINARY,
            Primitive::Base64Binary => XSD_BASE64_BINARY,
            Primitive::AnyUri => XSD_ANY_URI,
            Primitive::QName => XSD_QNAME,
            Primitive::Notation => XSD_NOTATION,
        }
    }

    /// The date/time family
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            Primitive::DateTime
                | Primitive::Time
                | Primitive::Date
                | Primitive::GYearMonth
                | Primitive::GYear
                | Primitive::GMonthDay
                | Primitive::GDay
                | Primitive::GMonth
        )
    }

    /// Check whether a facet may be applied to this primitive
    pub fn admits(&self, facet: FacetKind) -> bool {
        let admitted: &HashSet<FacetKind> = match self {
            Primitive::AnySimpleType
            | Primitive::String
            | Primitive::HexBinary
            | Primitive::Base64Binary
            | Primitive::AnyUri
            | Primitive::QName
            | Primitive::Notation => &STRING_FACETS,
            Primitive::Boolean => &BOOLEAN_FACETS,
            Primitive::Decimal => &DECIMAL_FACETS,
            Primitive::Float | Primitive::Double => &FLOAT_FACETS,
            _ => &DATETIME_FACETS,
        };
        admitted.contains(&facet)
    }

    /// Fundamental facet `ordered`
    pub fn ordered(&self) -> Ordered {
        match self {
            Primitive::Decimal
            | Primitive::Float
            | Primitive::Double => Ordered::Total,
            Primitive::Duration => Ordered::Partial,
            p if p.is_temporal() => Ordered::Partial,
            _ => Ordered::None,
        }
    }

    /// Fundamental facet `numeric`
    pub fn numeric(&self) -> bool {
        matches!(self, Primitive::Decimal | Primitive::Float | Primitive::Double)
    }

    /// Fundamental facet `bounded`
    pub fn bounded(&self) -> bool {
        matches!(self, Primitive::Float | Primitive::Double)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fundamental facet `ordered`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ordered {
    /// No order relation
    None,
    /// Partial order (date/time, duration)
    Partial,
    /// Total order
    Total,
}

/// Lexical refinement of the string primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StringKind {
    /// xs:token
    Token,
    /// xs:language
    Language,
    /// xs:NMTOKEN
    NmToken,
    /// xs:Name
    Name,
    /// xs:NCName (also ID, IDREF, ENTITY)
    NcName,
}

/// Fixed-width integer built-ins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntegerKind {
    /// xs:integer
    Integer,
    /// xs:nonPositiveInteger
    NonPositiveInteger,
    /// xs:negativeInteger
    NegativeInteger,
    /// xs:long
    Long,
    /// xs:int
    Int,
    /// xs:short
    Short,
    /// xs:byte
    Byte,
    /// xs:nonNegativeInteger
    NonNegativeInteger,
    /// xs:unsignedLong
    UnsignedLong,
    /// xs:unsignedInt
    UnsignedInt,
    /// xs:unsignedShort
    UnsignedShort,
    /// xs:unsignedByte
    UnsignedByte,
    /// xs:positiveInteger
    PositiveInteger,
}

impl IntegerKind {
    /// Inclusive value bounds; `None` is unbounded on that side
    pub fn bounds(&self) -> (Option<i128>, Option<i128>) {
        match self {
            IntegerKind::Integer => (None, None),
            IntegerKind::NonPositiveInteger => (None, Some(0)),
            IntegerKind::NegativeInteger => (None, Some(-1)),
            IntegerKind::Long => (Some(i64::MIN as i128), Some(i64::MAX as i128)),
            IntegerKind::Int => (Some(i32::MIN as i128), Some(i32::MAX as i128)),
            IntegerKind::Short => (Some(i16::MIN as i128), Some(i16::MAX as i128)),
            IntegerKind::Byte => (Some(i8::MIN as i128), Some(i8::MAX as i128)),
            IntegerKind::NonNegativeInteger => (Some(0), None),
            IntegerKind::UnsignedLong => (Some(0), Some(u64::MAX as i128)),
            IntegerKind::UnsignedInt => (Some(0), Some(u32::MAX as i128)),
            IntegerKind::UnsignedShort => (Some(0), Some(u16::MAX as i128)),
            IntegerKind::UnsignedByte => (Some(0), Some(u8::MAX as i128)),
            IntegerKind::PositiveInteger => (Some(1), None),
        }
    }
}

/// Category of a built-in type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    /// anyType and anySimpleType
    Special,
    /// Primitive types
    Primitive,
    /// Derived atomic types
    Derived,
    /// Built-in list types
    List,
}

/// A built-in type entry
#[derive(Debug, Clone)]
pub struct BuiltinType {
    /// Local name in the XSD namespace
    pub name: &'static str,
    /// Category
    pub category: TypeCategory,
    /// Base type name
    pub base_type: Option<&'static str>,
    /// Primitive value space
    pub primitive: Primitive,
    /// Fixed white space mode
    pub white_space: WhiteSpace,
    /// String refinement, if any
    pub string_kind: Option<StringKind>,
    /// Integer refinement, if any
    pub integer_kind: Option<IntegerKind>,
    /// Item type of a built-in list
    pub list_item: Option<&'static str>,
}

impl BuiltinType {
    /// True for xs:anyType, the only complex built-in
    pub fn is_complex(&self) -> bool {
        self.name == XSD_ANY_TYPE
    }
}

lazy_static::lazy_static! {
    /// Facets admitted for string-like types
    pub static ref STRING_FACETS: HashSet<FacetKind> = [
        FacetKind::Length,
        FacetKind::MinLength,
        FacetKind::MaxLength,
        FacetKind::Pattern,
        FacetKind::Enumeration,
        FacetKind::WhiteSpace,
    ].into_iter().collect();

    /// Facets admitted for boolean type
    pub static ref BOOLEAN_FACETS: HashSet<FacetKind> = [
        FacetKind::Pattern,
        FacetKind::WhiteSpace,
    ].into_iter().collect();

    /// Facets admitted for float/double types
    pub static ref FLOAT_FACETS: HashSet<FacetKind> = [
        FacetKind::Pattern,
        FacetKind::Enumeration,
        FacetKind::WhiteSpace,
        FacetKind::MaxInclusive,
        FacetKind::MaxExclusive,
        FacetKind::MinInclusive,
        FacetKind::MinExclusive,
    ].into_iter().collect();

    /// Facets admitted for decimal types
    pub static ref DECIMAL_FACETS: HashSet<FacetKind> = [
        FacetKind::TotalDigits,
        FacetKind::FractionDigits,
        FacetKind::Pattern,
        FacetKind::Enumeration,
        FacetKind::WhiteSpace,
        FacetKind::MaxInclusive,
        FacetKind::MaxExclusive,
        FacetKind::MinInclusive,
        FacetKind::MinExclusive,
    ].into_iter().collect();

    /// Facets admitted for date/time and duration types
    pub static ref DATETIME_FACETS: HashSet<FacetKind> = [
        FacetKind::Pattern,
        FacetKind::Enumeration,
        FacetKind::WhiteSpace,
        FacetKind::MaxInclusive,
        FacetKind::MaxExclusive,
        FacetKind::MinInclusive,
        FacetKind::MinExclusive,
    ].into_iter().collect();

    /// Facets admitted for list types
    pub static ref LIST_FACETS: HashSet<FacetKind> = [
        FacetKind::Length,
        FacetKind::MinLength,
        FacetKind::MaxLength,
        FacetKind::Pattern,
        FacetKind::Enumeration,
        FacetKind::WhiteSpace,
    ].into_iter().collect();

    /// Facets admitted for union types
    pub static ref UNION_FACETS: HashSet<FacetKind> = [
        FacetKind::Pattern,
        FacetKind::Enumeration,
    ].into_iter().collect();

    /// Registry of all built-in XSD types, in registration order
    pub static ref BUILTIN_TYPES: Vec<BuiltinType> = {
        use Primitive as P;
        use WhiteSpace::{Collapse, Preserve, Replace};

        let special = |name, base, ws| BuiltinType {
            name,
            category: TypeCategory::Special,
            base_type: base,
            primitive: P::AnySimpleType,
            white_space: ws,
            string_kind: None,
            integer_kind: None,
            list_item: None,
        };
        let primitive = |name, primitive, ws| BuiltinType {
            name,
            category: TypeCategory::Primitive,
            base_type: Some(XSD_ANY_SIMPLE_TYPE),
            primitive,
            white_space: ws,
            string_kind: None,
            integer_kind: None,
            list_item: None,
        };
        let string = |name, base, ws, kind| BuiltinType {
            name,
            category: TypeCategory::Derived,
            base_type: Some(base),
            primitive: P::String,
            white_space: ws,
            string_kind: kind,
            integer_kind: None,
            list_item: None,
        };
        let integer = |name, base, kind| BuiltinType {
            name,
            category: TypeCategory::Derived,
            base_type: Some(base),
            primitive: P::Decimal,
            white_space: Collapse,
            string_kind: None,
            integer_kind: Some(kind),
            list_item: None,
        };
        let list = |name, item| BuiltinType {
            name,
            category: TypeCategory::List,
            base_type: Some(XSD_ANY_SIMPLE_TYPE),
            primitive: P::String,
            white_space: Collapse,
            string_kind: None,
            integer_kind: None,
            list_item: Some(item),
        };

        vec![
            special(XSD_ANY_TYPE, None, Preserve),
            special(XSD_ANY_SIMPLE_TYPE, Some(XSD_ANY_TYPE), Preserve),

            primitive(XSD_STRING, P::String, Preserve),
            primitive(XSD_BOOLEAN, P::Boolean, Collapse),
            primitive(XSD_DECIMAL, P::Decimal, Collapse),
            primitive(XSD_FLOAT, P::Float, Collapse),
            primitive(XSD_DOUBLE, P::Double, Collapse),
            primitive(XSD_DURATION, P::Duration, Collapse),
            primitive(XSD_DATETIME, P::DateTime, Collapse),
            primitive(XSD_TIME, P::Time, Collapse),
            primitive(XSD_DATE, P::Date, Collapse),
            primitive(XSD_GYEAR_MONTH, P::GYearMonth, Collapse),
            primitive(XSD_GYEAR, P::GYear, Collapse),
            primitive(XSD_GMONTH_DAY, P::GMonthDay, Collapse),
            primitive(XSD_GDAY, P::GDay, Collapse),
            primitive(XSD_GMONTH, P::GMonth, Collapse),
            primitive(XSD_HEX_BINARY, P::HexBinary, Collapse),
            primitive(XSD_BASE64_BINARY, P::Base64Binary, Collapse),
            primitive(XSD_ANY_URI, P::AnyUri, Collapse),
            primitive(XSD_QNAME, P::QName, Collapse),
            primitive(XSD_NOTATION, P::Notation, Collapse),

            string(XSD_NORMALIZED_STRING, XSD_STRING, Replace, None),
            string(XSD_TOKEN, XSD_NORMALIZED_STRING, Collapse, Some(StringKind::Token)),
            string(XSD_LANGUAGE, XSD_TOKEN, Collapse, Some(StringKind::Language)),
            string(XSD_NMTOKEN, XSD_TOKEN, Collapse, Some(StringKind::NmToken)),
            string(XSD_NAME, XSD_TOKEN, Collapse, Some(StringKind::Name)),
            string(XSD_NCNAME, XSD_NAME, Collapse, Some(StringKind::NcName)),
            string(XSD_ID, XSD_NCNAME, Collapse, Some(StringKind::NcName)),
            string(XSD_IDREF, XSD_NCNAME, Collapse, Some(StringKind::NcName)),
            string(XSD_ENTITY, XSD_NCNAME, Collapse, Some(StringKind::NcName)),

            integer(XSD_INTEGER, XSD_DECIMAL, IntegerKind::Integer),
            integer(XSD_NON_POSITIVE_INTEGER, XSD_INTEGER, IntegerKind::NonPositiveInteger),
            integer(XSD_NEGATIVE_INTEGER, XSD_NON_POSITIVE_INTEGER, IntegerKind::NegativeInteger),
            integer(XSD_LONG, XSD_INTEGER, IntegerKind::Long),
            integer(XSD_INT, XSD_LONG, IntegerKind::Int),
            integer(XSD_SHORT, XSD_INT, IntegerKind::Short),
            integer(XSD_BYTE, XSD_SHORT, IntegerKind::Byte),
            integer(XSD_NON_NEGATIVE_INTEGER, XSD_INTEGER, IntegerKind::NonNegativeInteger),
            integer(XSD_UNSIGNED_LONG, XSD_NON_NEGATIVE_INTEGER, IntegerKind::UnsignedLong),
            integer(XSD_UNSIGNED_INT, XSD_UNSIGNED_LONG, IntegerKind::UnsignedInt),
            integer(XSD_UNSIGNED_SHORT, XSD_UNSIGNED_INT, IntegerKind::UnsignedShort),
            integer(XSD_UNSIGNED_BYTE, XSD_UNSIGNED_SHORT, IntegerKind::UnsignedByte),
            integer(XSD_POSITIVE_INTEGER, XSD_NON_NEGATIVE_INTEGER, IntegerKind::PositiveInteger),

            list(XSD_NMTOKENS, XSD_NMTOKEN),
            list(XSD_IDREFS, XSD_IDREF),
            list(XSD_ENTITIES, XSD_ENTITY),
        ]
    };
}

/// Look up a built-in by local name
pub fn get_builtin_type(name: &str) -> Option<&'static BuiltinType> {
    BUILTIN_TYPES.iter().find(|t| t.name == name)
}

/// Position of a built-in in the registration order
pub fn builtin_index(name: &str) -> Option<usize> {
    BUILTIN_TYPES.iter().position(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let int = get_builtin_type(XSD_INT).unwrap();
        assert_eq!(int.primitive, Primitive::Decimal);
        assert_eq!(int.integer_kind, Some(IntegerKind::Int));
        assert_eq!(int.base_type, Some(XSD_LONG));
        assert!(get_builtin_type("notAType").is_none());
    }

    #[test]
    fn test_builtin_order_is_stable() {
        assert_eq!(builtin_index(XSD_ANY_TYPE), Some(0));
        assert_eq!(builtin_index(XSD_ANY_SIMPLE_TYPE), Some(1));
        assert_eq!(builtin_index(XSD_STRING), Some(2));
        let names: HashSet<&str> = BUILTIN_TYPES.iter().map(|t| t.name).collect();
        assert_eq!(names.len(), BUILTIN_TYPES.len());
    }

    #[test]
    fn test_builtin_bases_exist() {
        for builtin in BUILTIN_TYPES.iter() {
            if let Some(base) = builtin.base_type {
                assert!(get_builtin_type(base).is_some(), "{} base {}", builtin.name, base);
            }
            if let Some(item) = builtin.list_item {
                assert!(get_builtin_type(item).is_some());
            }
        }
    }

    #[test]
    fn test_whitespace_modes() {
        assert_eq!(get_builtin_type(XSD_STRING).unwrap().white_space, WhiteSpace::Preserve);
        assert_eq!(
            get_builtin_type(XSD_NORMALIZED_STRING).unwrap().white_space,
            WhiteSpace::Replace
        );
        assert_eq!(get_builtin_type(XSD_DATE).unwrap().white_space, WhiteSpace::Collapse);
    }

    #[test]
    fn test_admitted_facets() {
        assert!(Primitive::Decimal.admits(FacetKind::TotalDigits));
        assert!(!Primitive::String.admits(FacetKind::TotalDigits));
        assert!(!Primitive::Boolean.admits(FacetKind::Enumeration));
        assert!(Primitive::HexBinary.admits(FacetKind::Length));
    }

    #[test]
    fn test_integer_bounds() {
        assert_eq!(
            IntegerKind::Int.bounds(),
            (Some(-2_147_483_648), Some(2_147_483_647))
        );
        assert_eq!(IntegerKind::PositiveInteger.bounds(), (Some(1), None));
        assert_eq!(IntegerKind::Integer.bounds(), (None, None));
    }
}
