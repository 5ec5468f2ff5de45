//! XML name validation and utilities
//!
//! Lexical checks for the string-derived built-ins (`Name`, `NCName`,
//! `NMTOKEN`, `language`, `token`) following the XML 1.0 (fifth edition)
//! `NameStartChar` and `NameChar` productions.

use once_cell::sync::Lazy;
use regex::Regex;

static LANGUAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$").expect("static regex"));

/// XML 1.0 `NameStartChar`
pub fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

/// XML 1.0 `NameChar`
pub fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}'
            | '\u{300}'..='\u{36F}'
            | '\u{203F}'..='\u{2040}')
}

/// Check if a string is a valid XML Name
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_name_start_char(first) => chars.all(is_name_char),
        _ => false,
    }
}

/// Check if a string is a valid NCName (non-colonized name)
pub fn is_valid_ncname(name: &str) -> bool {
    !name.contains(':') && is_valid_name(name)
}

/// Check if a string is a valid QName (qualified name)
pub fn is_valid_qname(name: &str) -> bool {
    match name.split_once(':') {
        Some((prefix, local)) => is_valid_ncname(prefix) && is_valid_ncname(local),
        None => is_valid_ncname(name),
    }
}

/// Check if a string is a valid NMTOKEN
pub fn is_valid_nmtoken(token: &str) -> bool {
    !token.is_empty() && token.chars().all(is_name_char)
}

/// Check if a string is a valid `xs:language` tag
pub fn is_valid_language(tag: &str) -> bool {
    LANGUAGE.is_match(tag)
}

/// Check if a string is a valid `xs:token`
///
/// No line feeds, carriage returns or tabs, no leading or trailing space
/// and no internal runs of two or more spaces.
pub fn is_valid_token(value: &str) -> bool {
    !value.contains(['\n', '\r', '\t'])
        && !value.starts_with(' ')
        && !value.ends_with(' ')
        && !value.contains("  ")
}

/// Split a QName into prefix and local name
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    if let Some((prefix, local)) = qname.split_once(':') {
        (Some(prefix), local)
    } else {
        (None, qname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("element"));
        assert!(is_valid_name("my-element"));
        assert!(is_valid_name("my_element"));
        assert!(is_valid_name("element123"));
        assert!(is_valid_name("_element"));
        assert!(is_valid_name("a:b"));
        assert!(is_valid_name("\u{00E9}l\u{00E9}ment"));

        assert!(!is_valid_name(""));
        assert!(!is_valid_name("123element"));
        assert!(!is_valid_name("-element"));
        assert!(!is_valid_name("a b"));
    }

    #[test]
    fn test_is_valid_ncname() {
        assert!(is_valid_ncname("element"));
        assert!(is_valid_ncname("my-element"));

        assert!(!is_valid_ncname(""));
        assert!(!is_valid_ncname("prefix:element"));
    }

    #[test]
    fn test_is_valid_qname() {
        assert!(is_valid_qname("element"));
        assert!(is_valid_qname("prefix:element"));
        assert!(is_valid_qname("xs:schema"));

        assert!(!is_valid_qname(""));
        assert!(!is_valid_qname(":element"));
        assert!(!is_valid_qname("element:"));
        assert!(!is_valid_qname("a:b:c"));
    }

    #[test]
    fn test_nmtoken_and_language() {
        assert!(is_valid_nmtoken("123-abc"));
        assert!(is_valid_nmtoken(".x"));
        assert!(!is_valid_nmtoken(""));
        assert!(!is_valid_nmtoken("a b"));

        assert!(is_valid_language("en"));
        assert!(is_valid_language("en-US"));
        assert!(is_valid_language("i-klingon"));
        assert!(!is_valid_language("toolonglanguage"));
        assert!(!is_valid_language("en_US"));
    }

    #[test]
    fn test_token() {
        assert!(is_valid_token("a b c"));
        assert!(is_valid_token(""));
        assert!(!is_valid_token(" a"));
        assert!(!is_valid_token("a  b"));
        assert!(!is_valid_token("a\tb"));
    }

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("element"), (None, "element"));
        assert_eq!(split_qname("xs:element"), (Some("xs"), "element"));
    }
}
