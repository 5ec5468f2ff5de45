//! Translation of XSD regular expressions to the `regex` crate syntax
//!
//! XSD patterns are implicitly anchored, treat `^` and `$` as literals,
//! support character class subtraction (`[a-z-[aeiou]]`) and the XML name
//! escapes `\i` and `\c`. Everything else maps onto `regex` directly.

use regex::{Regex, RegexBuilder};

use crate::error::{CompileError, CompileErrorKind};

const NAME_START: &str = "A-Z_a-z:\\x{C0}-\\x{D6}\\x{D8}-\\x{F6}\\x{F8}-\\x{2FF}\\x{370}-\\x{37D}\\x{37F}-\\x{1FFF}\\x{200C}-\\x{200D}\\x{2070}-\\x{218F}\\x{2C00}-\\x{2FEF}\\x{3001}-\\x{D7FF}\\x{F900}-\\x{FDCF}\\x{FDF0}-\\x{FFFD}\\x{10000}-\\x{EFFFF}";
const NAME_EXTRA: &str = "\\-.0-9\\x{B7}\\x{300}-\\x{36F}\\x{203F}-\\x{2040}";
const SPACE: &str = " \\t\\n\\r";
const NOT_WORD: &str = "\\p{P}\\p{Z}\\p{C}";

const CATEGORIES: &[&str] = &[
    "L", "Lu", "Ll", "Lt", "Lm", "Lo", "M", "Mn", "Mc", "Me", "N", "Nd", "Nl", "No", "P", "Pc",
    "Pd", "Ps", "Pe", "Pi", "Pf", "Po", "Z", "Zs", "Zl", "Zp", "S", "Sm", "Sc", "Sk", "So", "C",
    "Cc", "Cf", "Co", "Cn",
];

const BLOCKS: &[(&str, &str)] = &[
    ("BasicLatin", "\\x{0}-\\x{7F}"),
    ("Latin-1Supplement", "\\x{80}-\\x{FF}"),
    ("LatinExtended-A", "\\x{100}-\\x{17F}"),
    ("LatinExtended-B", "\\x{180}-\\x{24F}"),
    ("IPAExtensions", "\\x{250}-\\x{2AF}"),
    ("CombiningDiacriticalMarks", "\\x{300}-\\x{36F}"),
    ("Greek", "\\x{370}-\\x{3FF}"),
    ("Cyrillic", "\\x{400}-\\x{4FF}"),
    ("Hebrew", "\\x{590}-\\x{5FF}"),
    ("Arabic", "\\x{600}-\\x{6FF}"),
    ("Devanagari", "\\x{900}-\\x{97F}"),
    ("Thai", "\\x{E00}-\\x{E7F}"),
    ("GeneralPunctuation", "\\x{2000}-\\x{206F}"),
    ("CurrencySymbols", "\\x{20A0}-\\x{20CF}"),
    ("Hiragana", "\\x{3040}-\\x{309F}"),
    ("Katakana", "\\x{30A0}-\\x{30FF}"),
    ("CJKUnifiedIdeographs", "\\x{4E00}-\\x{9FFF}"),
    ("HangulSyllables", "\\x{AC00}-\\x{D7AF}"),
];

fn invalid(pattern: &str, reason: impl Into<String>) -> CompileError {
    CompileError::new(
        CompileErrorKind::InvalidPattern,
        format!("invalid pattern '{}': {}", pattern, reason.into()),
    )
}

/// Class body (no brackets) for a `\p{..}` / `\P{..}` escape
enum Property {
    /// `\p{Lu}` style, usable anywhere
    Category(String),
    /// Block ranges, must sit inside brackets
    Ranges(&'static str),
}

struct Translator<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Translator<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn error(&self, reason: impl Into<String>) -> CompileError {
        invalid(self.source, reason)
    }

    fn translate(mut self) -> Result<String, CompileError> {
        let mut out = String::with_capacity(self.chars.len() * 2);
        while let Some(c) = self.next() {
            match c {
                '\\' => self.escape(&mut out)?,
                '.' => out.push_str("[^\\n\\r]"),
                '^' => out.push_str("\\^"),
                '$' => out.push_str("\\$"),
                '[' => {
                    let class = self.class()?;
                    out.push_str(&class);
                }
                ']' => return Err(self.error("unbalanced ']'")),
                '(' if self.peek() == Some('?') => {
                    return Err(self.error("'(?' is not XSD syntax"));
                }
                _ => out.push(c),
            }
        }
        Ok(out)
    }

    fn property(&mut self) -> Result<Property, CompileError> {
        if self.next() != Some('{') {
            return Err(self.error("expected '{' after \\p"));
        }
        let mut name = String::new();
        loop {
            match self.next() {
                Some('}') => break,
                Some(c) => name.push(c),
                None => return Err(self.error("unterminated \\p{")),
            }
        }
        if let Some(block) = name.strip_prefix("Is") {
            let block = if block == "GreekandCoptic" { "Greek" } else { block };
            return BLOCKS
                .iter()
                .find(|(n, _)| *n == block)
                .map(|(_, ranges)| Property::Ranges(ranges))
                .ok_or_else(|| self.error(format!("unsupported block '{}'", name)));
        }
        if CATEGORIES.contains(&name.as_str()) {
            Ok(Property::Category(name))
        } else {
            Err(self.error(format!("unknown property '{}'", name)))
        }
    }

    /// Escape outside a character class
    fn escape(&mut self, out: &mut String) -> Result<(), CompileError> {
        let c = self.next().ok_or_else(|| self.error("trailing backslash"))?;
        match c {
            'n' => out.push_str("\\n"),
            'r' => out.push_str("\\r"),
            't' => out.push_str("\\t"),
            '\\' | '|' | '.' | '^' | '?' | '*' | '+' | '{' | '}' | '(' | ')' | '[' | ']' => {
                out.push('\\');
                out.push(c);
            }
            '-' => out.push('-'),
            's' => out.push_str(&format!("[{}]", SPACE)),
            'S' => out.push_str(&format!("[^{}]", SPACE)),
            'd' => out.push_str("\\p{Nd}"),
            'D' => out.push_str("\\P{Nd}"),
            'w' => out.push_str(&format!("[^{}]", NOT_WORD)),
            'W' => out.push_str(&format!("[{}]", NOT_WORD)),
            'i' => out.push_str(&format!("[{}]", NAME_START)),
            'I' => out.push_str(&format!("[^{}]", NAME_START)),
            'c' => out.push_str(&format!("[{}{}]", NAME_START, NAME_EXTRA)),
            'C' => out.push_str(&format!("[^{}{}]", NAME_START, NAME_EXTRA)),
            'p' | 'P' => {
                let negated = c == 'P';
                match (self.property()?, negated) {
                    (Property::Category(name), false) => out.push_str(&format!("\\p{{{}}}", name)),
                    (Property::Category(name), true) => out.push_str(&format!("\\P{{{}}}", name)),
                    (Property::Ranges(r), false) => out.push_str(&format!("[{}]", r)),
                    (Property::Ranges(r), true) => out.push_str(&format!("[^{}]", r)),
                }
            }
            other => return Err(self.error(format!("unknown escape '\\{}'", other))),
        }
        Ok(())
    }

    /// Escape inside a character class, emitted as class items
    fn class_escape(&mut self, out: &mut String) -> Result<(), CompileError> {
        let c = self.next().ok_or_else(|| self.error("trailing backslash"))?;
        match c {
            'n' => out.push_str("\\n"),
            'r' => out.push_str("\\r"),
            't' => out.push_str("\\t"),
            '\\' | '|' | '.' | '-' | '^' | '?' | '*' | '+' | '{' | '}' | '(' | ')' | '[' | ']' => {
                out.push('\\');
                out.push(c);
            }
            's' => out.push_str(SPACE),
            'S' => out.push_str(&format!("[^{}]", SPACE)),
            'd' => out.push_str("\\p{Nd}"),
            'D' => out.push_str("\\P{Nd}"),
            'w' => out.push_str(&format!("[^{}]", NOT_WORD)),
            'W' => out.push_str(NOT_WORD),
            'i' => out.push_str(NAME_START),
            'I' => out.push_str(&format!("[^{}]", NAME_START)),
            'c' => {
                out.push_str(NAME_START);
                out.push_str(NAME_EXTRA);
            }
            'C' => out.push_str(&format!("[^{}{}]", NAME_START, NAME_EXTRA)),
            'p' | 'P' => {
                let negated = c == 'P';
                match (self.property()?, negated) {
                    (Property::Category(name), false) => out.push_str(&format!("\\p{{{}}}", name)),
                    (Property::Category(name), true) => out.push_str(&format!("\\P{{{}}}", name)),
                    (Property::Ranges(r), false) => out.push_str(r),
                    (Property::Ranges(r), true) => out.push_str(&format!("[^{}]", r)),
                }
            }
            other => return Err(self.error(format!("unknown escape '\\{}'", other))),
        }
        Ok(())
    }

    /// Character class after its opening `[`
    fn class(&mut self) -> Result<String, CompileError> {
        let negated = if self.peek() == Some('^') {
            self.pos += 1;
            true
        } else {
            false
        };
        let mut body = String::new();
        let mut subtracted = None;
        let mut first = true;
        loop {
            let c = self.next().ok_or_else(|| self.error("unterminated character class"))?;
            match c {
                ']' if !first => break,
                ']' => body.push_str("\\]"),
                '-' if self.peek() == Some('[') => {
                    self.pos += 1;
                    subtracted = Some(self.class()?);
                    if self.next() != Some(']') {
                        return Err(self.error("subtraction must end the character class"));
                    }
                    break;
                }
                '-' if first || self.peek() == Some(']') => body.push_str("\\-"),
                '-' => body.push('-'),
                '\\' => self.class_escape(&mut body)?,
                '[' => return Err(self.error("unescaped '[' in character class")),
                ':' if first => body.push_str("\\:"),
                '&' | '~' | '^' => {
                    body.push('\\');
                    body.push(c);
                }
                _ => body.push(c),
            }
            first = false;
        }
        if body.is_empty() {
            return Err(self.error("empty character class"));
        }
        Ok(match (negated, subtracted) {
            (false, None) => format!("[{}]", body),
            (true, None) => format!("[^{}]", body),
            (false, Some(sub)) => format!("[{}--{}]", body, sub),
            (true, Some(sub)) => format!("[[^{}]--{}]", body, sub),
        })
    }
}

/// Translate one XSD pattern into an unanchored `regex` expression
pub fn translate_pattern(pattern: &str) -> Result<String, CompileError> {
    Translator::new(pattern).translate()
}

/// Compile the patterns of one derivation step into a single anchored regex
///
/// Patterns on the same step are alternatives; patterns on different steps
/// are separate instructions and must all match.
pub fn compile_pattern_group(patterns: &[String]) -> Result<Regex, CompileError> {
    let mut alternatives = Vec::with_capacity(patterns.len());
    for pattern in patterns {
        alternatives.push(format!("(?:{})", translate_pattern(pattern)?));
    }
    let source = format!("^(?:{})$", alternatives.join("|"));
    RegexBuilder::new(&source)
        .size_limit(1 << 24)
        .build()
        .map_err(|e| invalid(&patterns.join("|"), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, input: &str) -> bool {
        compile_pattern_group(&[pattern.to_string()]).unwrap().is_match(input)
    }

    #[test]
    fn test_implicit_anchoring() {
        assert!(matches("[A-Z]{3}", "ABC"));
        assert!(!matches("[A-Z]{3}", "ABCD"));
        assert!(!matches("[A-Z]{3}", "xABC"));
    }

    #[test]
    fn test_caret_and_dollar_are_literal() {
        assert!(matches("a^b", "a^b"));
        assert!(matches("$[0-9]+", "$10"));
        assert!(matches("$x", "$x"));
    }

    #[test]
    fn test_subtraction() {
        assert!(matches("[a-z-[aeiou]]+", "bcd"));
        assert!(!matches("[a-z-[aeiou]]+", "bad"));
        assert!(matches("[^a-z-[x]]", "1"));
        assert!(!matches("[^a-z-[x]]", "x"));
    }

    #[test]
    fn test_name_escapes() {
        assert!(matches("\\i\\c*", "_foo-1.x"));
        assert!(!matches("\\i\\c*", "1foo"));
        assert!(matches("[\\i-[:]][\\c-[:]]*", "ncname"));
        assert!(!matches("[\\i-[:]][\\c-[:]]*", "a:b"));
    }

    #[test]
    fn test_properties_and_blocks() {
        assert!(matches("\\p{Lu}+", "ABC"));
        assert!(!matches("\\p{Lu}+", "AbC"));
        assert!(matches("\\p{IsBasicLatin}+", "plain"));
        assert!(!matches("\\p{IsBasicLatin}+", "caf\u{e9}"));
        assert!(matches("\\d{3}-\\d{4}", "555-1234"));
    }

    #[test]
    fn test_dot_excludes_newlines() {
        assert!(matches("a.c", "abc"));
        assert!(!matches("a.c", "a\nc"));
    }

    #[test]
    fn test_alternatives_on_one_step() {
        let re = compile_pattern_group(&["[0-9]+".to_string(), "[a-z]+".to_string()]).unwrap();
        assert!(re.is_match("123"));
        assert!(re.is_match("abc"));
        assert!(!re.is_match("a1"));
    }

    #[test]
    fn test_invalid_patterns() {
        for bad in ["[a-z", "(?i)abc", "\\q", "\\p{IsKlingon}", "a]"] {
            let err = translate_pattern(bad)
                .and_then(|_| compile_pattern_group(&[bad.to_string()]).map(|_| String::new()))
                .unwrap_err();
            assert_eq!(err.kind, CompileErrorKind::InvalidPattern, "{}", bad);
        }
    }
}
