//! The parsed schema graph handed to the compiler
//!
//! References between components are still QNames here; the resolver
//! dereferences them. The graph is never mutated by compilation.

use super::attributes::{AttributeDecl, AttributeGroupDef};
use super::complex_types::{ComplexTypeDef, DerivationSet};
use super::elements::{ElementDecl, Form};
use super::groups::ModelGroupDef;
use super::particles::MaxOccurs;
use super::simple_types::SimpleTypeDef;
use crate::namespaces::QName;

/// A simple or complex type definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDefinition {
    /// Simple type
    Simple(SimpleTypeDef),
    /// Complex type
    Complex(ComplexTypeDef),
}

impl TypeDefinition {
    /// Local name, `None` for anonymous types
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeDefinition::Simple(st) => st.name.as_deref(),
            TypeDefinition::Complex(ct) => ct.name.as_deref(),
        }
    }
}

/// Cap placed on an element particle's maxOccurs inside a restricted type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticleCap {
    /// The restricting complex type
    pub type_name: QName,
    /// The element whose particle is capped
    pub element: QName,
    /// The capped maxOccurs
    pub max: MaxOccurs,
}

/// A parsed XML schema (one target namespace, includes/imports already fused)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XsdSchema {
    /// Target namespace
    pub target_namespace: Option<String>,
    /// `elementFormDefault`
    pub element_form_default: Form,
    /// `attributeFormDefault`
    pub attribute_form_default: Form,
    /// `blockDefault`
    pub block_default: DerivationSet,
    /// `finalDefault`
    pub final_default: DerivationSet,
    /// Global type definitions in source order
    pub types: Vec<TypeDefinition>,
    /// Global element declarations in source order
    pub elements: Vec<ElementDecl>,
    /// Global attribute declarations in source order
    pub attributes: Vec<AttributeDecl>,
    /// Named model groups in source order
    pub groups: Vec<ModelGroupDef>,
    /// Named attribute groups in source order
    pub attribute_groups: Vec<AttributeGroupDef>,
    /// maxOccurs caps applied by restricting types
    pub particle_restriction_caps: Vec<ParticleCap>,
}

impl XsdSchema {
    /// Create an empty schema
    pub fn new(target_namespace: Option<&str>) -> Self {
        Self {
            target_namespace: target_namespace.map(String::from),
            ..Default::default()
        }
    }

    /// QName of a global component
    pub fn qname(&self, local_name: &str) -> QName {
        QName::new(self.target_namespace.as_deref(), local_name)
    }

    /// Set `elementFormDefault`
    pub fn with_element_form_default(mut self, form: Form) -> Self {
        self.element_form_default = form;
        self
    }

    /// Set `attributeFormDefault`
    pub fn with_attribute_form_default(mut self, form: Form) -> Self {
        self.attribute_form_default = form;
        self
    }

    /// Set `blockDefault`
    pub fn with_block_default(mut self, block: DerivationSet) -> Self {
        self.block_default = block;
        self
    }

    /// Add a global simple type
    pub fn add_simple_type(&mut self, def: SimpleTypeDef) -> &mut Self {
        self.types.push(TypeDefinition::Simple(def));
        self
    }

    /// Add a global complex type
    pub fn add_complex_type(&mut self, def: ComplexTypeDef) -> &mut Self {
        self.types.push(TypeDefinition::Complex(def));
        self
    }

    /// Add a global element
    pub fn add_element(&mut self, decl: ElementDecl) -> &mut Self {
        self.elements.push(decl);
        self
    }

    /// Add a global attribute
    pub fn add_attribute(&mut self, decl: AttributeDecl) -> &mut Self {
        self.attributes.push(decl);
        self
    }

    /// Add a named model group
    pub fn add_group(&mut self, def: ModelGroupDef) -> &mut Self {
        self.groups.push(def);
        self
    }

    /// Add a named attribute group
    pub fn add_attribute_group(&mut self, def: AttributeGroupDef) -> &mut Self {
        self.attribute_groups.push(def);
        self
    }

    /// Add a particle restriction cap
    pub fn add_particle_cap(&mut self, type_name: QName, element: QName, max: MaxOccurs) -> &mut Self {
        self.particle_restriction_caps.push(ParticleCap {
            type_name,
            element,
            max,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::simple_types::TypeRef;

    #[test]
    fn test_schema_builder() {
        let mut schema = XsdSchema::new(Some("urn:test"));
        schema
            .add_simple_type(SimpleTypeDef::restriction(Some("Code"), TypeRef::xsd("string")))
            .add_element(ElementDecl::new("root"));

        assert_eq!(schema.types.len(), 1);
        assert_eq!(schema.types[0].name(), Some("Code"));
        assert_eq!(schema.qname("root"), QName::namespaced("urn:test", "root"));
    }

    #[test]
    fn test_schema_clone_is_equal() {
        let mut schema = XsdSchema::new(None);
        schema.add_element(ElementDecl::new("a").with_type(TypeRef::xsd("int")));
        assert_eq!(schema.clone(), schema);
    }
}
