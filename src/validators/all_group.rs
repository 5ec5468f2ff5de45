//! Order-insensitive `xs:all` validation

use crate::compiled::{AllGroup, SubstitutionPolicy};
use crate::error::{ValidationError, ValidationErrorKind, ValidationResult};
use crate::namespaces::QName;

use super::models::MatchResult;

/// Tracks which entries of an all group have been seen
#[derive(Clone)]
pub struct AllGroupValidator<'a> {
    group: &'a AllGroup,
    policy: &'a dyn SubstitutionPolicy,
    seen: Vec<bool>,
    required_seen: u32,
    child_index: usize,
}

impl<'a> AllGroupValidator<'a> {
    /// Validator with nothing seen
    pub fn new(group: &'a AllGroup, policy: &'a dyn SubstitutionPolicy) -> Self {
        Self {
            group,
            policy,
            seen: vec![false; group.entries.len()],
            required_seen: 0,
            child_index: 0,
        }
    }

    /// Forget every child seen so far
    pub fn reset(&mut self) {
        self.seen.iter_mut().for_each(|s| *s = false);
        self.required_seen = 0;
        self.child_index = 0;
    }

    fn find(&self, name: &QName) -> Option<(usize, crate::compiled::ElemId)> {
        if let Some(i) = self.group.entries.iter().position(|e| &e.name == name) {
            return Some((i, self.group.entries[i].elem));
        }
        let actual = self.policy.global_element(name)?;
        self.group
            .entries
            .iter()
            .position(|e| e.allow_substitution && self.policy.is_substitutable(actual, e.elem))
            .map(|i| (i, actual))
    }

    /// Consume one child element
    pub fn feed(&mut self, name: &QName) -> ValidationResult<MatchResult> {
        let index = self.child_index;
        self.child_index += 1;
        let Some((entry, elem)) = self.find(name) else {
            return Err(ValidationError::new(
                ValidationErrorKind::UnexpectedElement,
                format!("element {} not expected in all group", name),
            )
            .with_child_index(index));
        };
        if self.seen[entry] {
            return Err(ValidationError::new(
                ValidationErrorKind::UnexpectedElement,
                format!("{}: duplicate in all group", name),
            )
            .with_child_index(index));
        }
        self.seen[entry] = true;
        if !self.group.entries[entry].optional {
            self.required_seen += 1;
        }
        Ok(MatchResult {
            matched_elem: Some(elem),
            is_wildcard: false,
            process_contents: None,
        })
    }

    /// Report every required entry that never appeared
    pub fn close(&mut self) -> Vec<ValidationError> {
        if self.required_seen == self.group.required {
            return Vec::new();
        }
        if self.group.optional && !self.seen.iter().any(|s| *s) {
            return Vec::new();
        }
        self.group
            .entries
            .iter()
            .zip(&self.seen)
            .filter(|(entry, seen)| !entry.optional && !**seen)
            .map(|(entry, _)| {
                ValidationError::new(
                    ValidationErrorKind::RequiredElementMissing,
                    format!("required element `{}` missing", entry.name),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiled::{AllEntry, ElemId};

    /// `head` (2) has `sub` (3) as its only member
    struct Members;

    impl SubstitutionPolicy for Members {
        fn global_element(&self, name: &QName) -> Option<ElemId> {
            match name.local_name() {
                "head" => Some(ElemId(2)),
                "sub" => Some(ElemId(3)),
                _ => None,
            }
        }

        fn is_substitutable(&self, actual: ElemId, declared: ElemId) -> bool {
            actual == declared || (declared == ElemId(2) && actual == ElemId(3))
        }
    }

    fn group(optional: bool) -> AllGroup {
        let entry = |name: &str, elem: u32, optional: bool, allow_substitution: bool| AllEntry {
            name: QName::local(name),
            elem: ElemId(elem),
            optional,
            allow_substitution,
        };
        AllGroup {
            entries: vec![
                entry("a", 0, false, false),
                entry("b", 1, true, false),
                entry("head", 2, false, true),
            ],
            required: 2,
            optional,
        }
    }

    #[test]
    fn test_any_order_with_substitution() {
        let group = group(false);
        let mut validator = AllGroupValidator::new(&group, &Members);
        let sub = validator.feed(&QName::local("sub")).unwrap();
        assert_eq!(sub.matched_elem, Some(ElemId(3)));
        validator.feed(&QName::local("a")).unwrap();
        assert!(validator.close().is_empty());
    }

    #[test]
    fn test_duplicate_and_missing() {
        let group = group(false);
        let mut validator = AllGroupValidator::new(&group, &Members);
        validator.feed(&QName::local("a")).unwrap();
        let duplicate = validator.feed(&QName::local("a")).unwrap_err();
        assert_eq!(duplicate.kind, ValidationErrorKind::UnexpectedElement);
        assert!(duplicate.message.contains("duplicate in all group"));
        assert_eq!(duplicate.child_index, Some(1));

        let missing = validator.close();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].kind, ValidationErrorKind::RequiredElementMissing);
        assert!(missing[0].message.contains("required element `head` missing"));
    }

    #[test]
    fn test_optional_group_may_be_absent() {
        let optional = group(true);
        let mut validator = AllGroupValidator::new(&optional, &Members);
        assert!(validator.close().is_empty());
        assert_eq!(
            validator.feed(&QName::local("zzz")).unwrap_err().code(),
            "d"
        );
        validator.reset();
        validator.feed(&QName::local("b")).unwrap();
        assert_eq!(validator.close().len(), 2);
    }
}
