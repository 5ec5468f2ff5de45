//! XML namespace handling
//!
//! Qualified names and the prefix-to-URI resolvers captured wherever a
//! lexical QName appears (defaults, fixed values, enumeration literals,
//! instance attributes).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::names::{is_valid_ncname, split_qname};

/// Qualified name - a namespace URI and local name pair
///
/// Both parts are shared strings so clones are cheap. `None` is the empty
/// namespace; `Some("")` is normalized to `None` on construction.
/// Ordering is by `(namespace, local_name)` with the empty namespace first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    /// Namespace URI (None for no namespace)
    pub namespace: Option<Arc<str>>,
    /// Local name
    pub local_name: Arc<str>,
}

impl QName {
    /// Create a new QName
    pub fn new(namespace: Option<&str>, local_name: &str) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(Arc::from),
            local_name: Arc::from(local_name),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: &str) -> Self {
        Self::new(None, local_name)
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: &str, local_name: &str) -> Self {
        Self::new(Some(namespace), local_name)
    }

    /// Create a QName in the XSD namespace
    pub fn xsd(local_name: &str) -> Self {
        Self::namespaced(crate::XSD_NAMESPACE, local_name)
    }

    /// Namespace as a string slice
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Local name as a string slice
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Canonical `{ns-uri}local` rendering used for QName values
    pub fn to_canonical(&self) -> String {
        format!("{{{}}}{}", self.namespace().unwrap_or(""), self.local_name)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => f.write_str(&self.local_name),
        }
    }
}

/// Capability interface for resolving namespace prefixes
///
/// Supplied by the caller wherever a QName-valued lexical has to be
/// resolved. The empty prefix denotes the default namespace.
pub trait NamespaceResolver {
    /// Namespace URI bound to `prefix`, if any
    fn namespace_for(&self, prefix: &str) -> Option<&str>;
}

/// Namespace context for resolving prefixes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceContext {
    /// Mapping from prefix to namespace URI ("" is the default namespace)
    prefixes: BTreeMap<String, String>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace prefix mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Builder form of [`NamespaceContext::add_prefix`]
    pub fn with_prefix(mut self, prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.add_prefix(prefix, namespace);
        self
    }

    /// Set the default namespace
    pub fn set_default_namespace(&mut self, namespace: impl Into<String>) {
        self.prefixes.insert(String::new(), namespace.into());
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// Get the default namespace
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.get_namespace("")
    }

    /// Number of bindings in scope
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    /// True if no prefixes are bound
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

impl NamespaceResolver for NamespaceContext {
    fn namespace_for(&self, prefix: &str) -> Option<&str> {
        self.get_namespace(prefix)
    }
}

/// Resolver with no bindings at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNamespaces;

impl NamespaceResolver for NoNamespaces {
    fn namespace_for(&self, _prefix: &str) -> Option<&str> {
        None
    }
}

/// Resolve a lexical `prefix:local` against a resolver
///
/// Unprefixed names take the default namespace. Returns `None` when the
/// lexical is not a QName or the prefix is unbound.
pub fn resolve_qname(lexical: &str, resolver: &dyn NamespaceResolver) -> Option<QName> {
    let (prefix, local) = split_qname(lexical);
    if !is_valid_ncname(local) {
        return None;
    }
    match prefix {
        Some(prefix) => {
            if !is_valid_ncname(prefix) {
                return None;
            }
            if prefix == "xml" {
                return Some(QName::namespaced(crate::XML_NAMESPACE, local));
            }
            resolver
                .namespace_for(prefix)
                .map(|ns| QName::namespaced(ns, local))
        }
        None => Some(QName::new(resolver.namespace_for(""), local)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_creation() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.namespace(), Some("http://example.com"));
        assert_eq!(qname.local_name(), "element");
        assert_eq!(QName::new(Some(""), "a"), QName::local("a"));
    }

    #[test]
    fn test_qname_display() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.to_string(), "{http://example.com}element");
        assert_eq!(QName::local("element").to_string(), "element");
        assert_eq!(QName::local("element").to_canonical(), "{}element");
    }

    #[test]
    fn test_qname_ordering() {
        let mut names = vec![
            QName::namespaced("urn:b", "a"),
            QName::local("z"),
            QName::namespaced("urn:a", "b"),
            QName::namespaced("urn:a", "a"),
        ];
        names.sort();
        let rendered: Vec<String> = names.iter().map(|q| q.to_string()).collect();
        assert_eq!(rendered, vec!["z", "{urn:a}a", "{urn:a}b", "{urn:b}a"]);
    }

    #[test]
    fn test_namespace_context() {
        let mut ctx = NamespaceContext::new();
        ctx.add_prefix("xs", "http://www.w3.org/2001/XMLSchema");
        ctx.set_default_namespace("http://example.com");

        assert_eq!(
            ctx.get_namespace("xs"),
            Some("http://www.w3.org/2001/XMLSchema")
        );
        assert_eq!(ctx.get_default_namespace(), Some("http://example.com"));
    }

    #[test]
    fn test_resolve_qname() {
        let ctx = NamespaceContext::new().with_prefix("p", "urn:p");

        let qname = resolve_qname("p:item", &ctx).unwrap();
        assert_eq!(qname, QName::namespaced("urn:p", "item"));
        assert_eq!(resolve_qname("item", &ctx), Some(QName::local("item")));
        assert_eq!(resolve_qname("q:item", &ctx), None);
        assert_eq!(resolve_qname("p:", &ctx), None);
        assert_eq!(
            resolve_qname("xml:lang", &NoNamespaces),
            Some(QName::namespaced(crate::XML_NAMESPACE, "lang"))
        );
    }
}
