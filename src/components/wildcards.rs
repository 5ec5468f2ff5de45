//! XSD wildcards (`xs:any`, `xs:anyAttribute`)
//!
//! Namespace constraints follow the XSD 1.0 model: `any`, a negation of a
//! single namespace name or of absence, or a finite set of namespace names
//! (possibly containing absence). Union and intersection implement
//! XSD 1.0 §3.10.6.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{CompileError, CompileErrorKind};

/// A namespace name or absence (`None`, written `##local`)
pub type NamespaceName = Option<Arc<str>>;

/// Process contents mode for wildcards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessContents {
    /// Validate strictly - element/attribute must be declared
    #[default]
    Strict,
    /// Validate if declaration found, otherwise accept
    Lax,
    /// Skip validation entirely
    Skip,
}

impl ProcessContents {
    /// Parse from string value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "strict" => Some(Self::Strict),
            "lax" => Some(Self::Lax),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }

    /// Attribute spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lax => "lax",
            Self::Skip => "skip",
        }
    }
}

impl fmt::Display for ProcessContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespace constraint for wildcards
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NamespaceConstraint {
    /// Any namespace is allowed (##any)
    Any,
    /// Not this namespace and not absent (`##other` is `Not(tns)`)
    Not(NamespaceName),
    /// Specific set of allowed namespaces
    Set(BTreeSet<NamespaceName>),
}

impl Default for NamespaceConstraint {
    fn default() -> Self {
        Self::Any
    }
}

fn ns(value: Option<&str>) -> NamespaceName {
    value.filter(|v| !v.is_empty()).map(Arc::from)
}

impl NamespaceConstraint {
    /// Create from namespace attribute value
    pub fn from_namespace_attr(
        value: &str,
        target_namespace: Option<&str>,
    ) -> Result<Self, CompileError> {
        match value.trim() {
            "##any" => Ok(Self::Any),
            "##other" => Ok(Self::Not(ns(target_namespace))),
            value => {
                let mut namespaces = BTreeSet::new();
                for token in value.split_whitespace() {
                    match token {
                        "##local" => {
                            namespaces.insert(None);
                        }
                        "##targetNamespace" => {
                            namespaces.insert(ns(target_namespace));
                        }
                        s if s.starts_with("##") => {
                            return Err(CompileError::new(
                                CompileErrorKind::StructureViolation,
                                format!("wrong value '{}' in 'namespace' attribute", s),
                            ));
                        }
                        uri => {
                            namespaces.insert(ns(Some(uri)));
                        }
                    }
                }
                Ok(Self::Set(namespaces))
            }
        }
    }

    /// Set constraint from explicit namespace names
    pub fn set<'a>(namespaces: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        Self::Set(namespaces.into_iter().map(ns).collect())
    }

    /// Negation of a namespace name (or of absence when `None`)
    pub fn not(namespace: Option<&str>) -> Self {
        Self::Not(ns(namespace))
    }

    /// Check if a namespace is allowed by this constraint
    pub fn allows(&self, namespace: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Not(excluded) => namespace.is_some() && namespace != excluded.as_deref(),
            Self::Set(set) => set.contains(&ns(namespace)),
        }
    }

    /// True for the empty set
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Set(set) if set.is_empty())
    }

    /// Union per XSD 1.0 §3.10.6; `None` when not expressible
    pub fn union(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (a, b) if a == b => Some(a.clone()),
            (Self::Any, _) | (_, Self::Any) => Some(Self::Any),
            (Self::Set(a), Self::Set(b)) => Some(Self::Set(a.union(b).cloned().collect())),
            (Self::Not(_), Self::Not(_)) => Some(Self::Not(None)),
            (Self::Not(negated), Self::Set(set)) | (Self::Set(set), Self::Not(negated)) => {
                let has_absent = set.contains(&None);
                match negated {
                    Some(_) => {
                        let has_negated = set.contains(negated);
                        match (has_negated, has_absent) {
                            (true, true) => Some(Self::Any),
                            (true, false) => Some(Self::Not(None)),
                            (false, true) => None,
                            (false, false) => Some(Self::Not(negated.clone())),
                        }
                    }
                    None if has_absent => Some(Self::Any),
                    None => Some(Self::Not(None)),
                }
            }
        }
    }

    /// Intersection per XSD 1.0 §3.10.6; `None` when not expressible
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (a, b) if a == b => Some(a.clone()),
            (Self::Any, x) | (x, Self::Any) => Some(x.clone()),
            (Self::Set(a), Self::Set(b)) => Some(Self::Set(a.intersection(b).cloned().collect())),
            (Self::Not(negated), Self::Set(set)) | (Self::Set(set), Self::Not(negated)) => Some(
                Self::Set(
                    set.iter()
                        .filter(|n| n.is_some() && *n != negated)
                        .cloned()
                        .collect(),
                ),
            ),
            (Self::Not(a), Self::Not(b)) => match (a, b) {
                (None, _) => Some(Self::Not(b.clone())),
                (_, None) => Some(Self::Not(a.clone())),
                _ => None,
            },
        }
    }

    /// True if some namespace is allowed by both constraints
    pub fn overlaps(&self, other: &Self) -> bool {
        match self.intersection(other) {
            Some(common) => !common.is_empty(),
            None => true,
        }
    }

    /// True if every namespace allowed by `self` is allowed by `other`
    pub fn is_subset_of(&self, other: &Self) -> bool {
        match (self, other) {
            (_, Self::Any) => true,
            (Self::Any, _) => false,
            (Self::Set(set), _) => set.iter().all(|n| other.allows(n.as_deref())),
            (Self::Not(a), Self::Not(b)) => a == b || b.is_none(),
            (Self::Not(_), Self::Set(_)) => false,
        }
    }
}

impl fmt::Display for NamespaceConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("##any"),
            Self::Not(None) => f.write_str("not(##local)"),
            Self::Not(Some(uri)) => write!(f, "not({})", uri),
            Self::Set(set) => {
                let parts: Vec<&str> = set
                    .iter()
                    .map(|n| n.as_deref().unwrap_or("##local"))
                    .collect();
                write!(f, "[{}]", parts.join(" "))
            }
        }
    }
}

/// Wildcard component shared by `xs:any` and `xs:anyAttribute`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Wildcard {
    /// Namespace constraint
    pub constraint: NamespaceConstraint,
    /// Process contents mode
    pub process_contents: ProcessContents,
}

impl Wildcard {
    /// Create a wildcard
    pub fn new(constraint: NamespaceConstraint, process_contents: ProcessContents) -> Self {
        Self {
            constraint,
            process_contents,
        }
    }

    /// `##any` with the given processing mode
    pub fn any(process_contents: ProcessContents) -> Self {
        Self::new(NamespaceConstraint::Any, process_contents)
    }

    /// Check if a namespace is allowed
    pub fn allows(&self, namespace: Option<&str>) -> bool {
        self.constraint.allows(namespace)
    }
}

impl fmt::Display for Wildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "any({}, {})", self.constraint, self.process_contents)
    }
}
