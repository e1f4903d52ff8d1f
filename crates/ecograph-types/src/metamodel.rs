//! Schema descriptors.
//!
//! These are the consumed view of a metamodel: classes with ordered
//! attribute and reference lists, grouped into packages identified by a
//! namespace URI. Descriptors are immutable once built and shared behind
//! `Arc`. Equality and hashing are by id.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::identity::{EntityId, FeatureId};

/// Primitive attribute types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    String,
    Int,
    Bool,
    Double,
    Float,
    Date,
}

impl DataType {
    /// The Ecore data type name (`EString`, `EInt`, ...).
    pub fn ecore_name(self) -> &'static str {
        match self {
            DataType::String => "EString",
            DataType::Int => "EInt",
            DataType::Bool => "EBoolean",
            DataType::Double => "EDouble",
            DataType::Float => "EFloat",
            DataType::Date => "EDate",
        }
    }

    /// Map an Ecore data type name onto the closest primitive type.
    pub fn from_ecore_name(name: &str) -> Option<Self> {
        let dt = match name {
            "EString" | "EChar" | "ECharacterObject" => DataType::String,
            "EInt" | "EIntegerObject" | "ELong" | "ELongObject" | "EShort"
            | "EShortObject" | "EByte" | "EByteObject" | "EBigInteger" => DataType::Int,
            "EBoolean" | "EBooleanObject" => DataType::Bool,
            "EDouble" | "EDoubleObject" | "EBigDecimal" => DataType::Double,
            "EFloat" | "EFloatObject" => DataType::Float,
            "EDate" => DataType::Date,
            _ => return None,
        };
        Some(dt)
    }

    /// All primitive types, in declaration order.
    pub const ALL: [DataType; 6] = [
        DataType::String,
        DataType::Int,
        DataType::Bool,
        DataType::Double,
        DataType::Float,
        DataType::Date,
    ];
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ecore_name())
    }
}

/// A primitive-valued feature.
#[derive(Clone, Debug)]
pub struct EAttribute {
    pub id: FeatureId,
    pub name: String,
    pub data_type: DataType,
    pub many: bool,
}

impl EAttribute {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id: FeatureId::new(),
            name: name.into(),
            data_type,
            many: false,
        }
    }

    pub fn many(mut self) -> Self {
        self.many = true;
        self
    }
}

/// A reference-valued feature.
#[derive(Clone, Debug)]
pub struct EReference {
    pub id: FeatureId,
    pub name: String,
    /// Name of the target class.
    pub target_type: String,
    pub containment: bool,
    pub many: bool,
    /// The paired reference on the target class, if bidirectional.
    pub opposite: Option<FeatureId>,
}

impl EReference {
    pub fn new(name: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            id: FeatureId::new(),
            name: name.into(),
            target_type: target_type.into(),
            containment: false,
            many: false,
            opposite: None,
        }
    }

    /// Use a pre-allocated id, so that opposites can refer to each other.
    pub fn with_id(mut self, id: FeatureId) -> Self {
        self.id = id;
        self
    }

    pub fn containment(mut self) -> Self {
        self.containment = true;
        self
    }

    pub fn many(mut self) -> Self {
        self.many = true;
        self
    }

    pub fn with_opposite(mut self, opposite: FeatureId) -> Self {
        self.opposite = Some(opposite);
        self
    }
}

/// A borrowed view of either kind of structural feature.
#[derive(Clone, Copy, Debug)]
pub enum Feature<'a> {
    Attribute(&'a EAttribute),
    Reference(&'a EReference),
}

impl<'a> Feature<'a> {
    pub fn id(&self) -> FeatureId {
        match self {
            Feature::Attribute(a) => a.id,
            Feature::Reference(r) => r.id,
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            Feature::Attribute(a) => &a.name,
            Feature::Reference(r) => &r.name,
        }
    }

    pub fn is_many(&self) -> bool {
        match self {
            Feature::Attribute(a) => a.many,
            Feature::Reference(r) => r.many,
        }
    }

    pub fn as_reference(&self) -> Option<&'a EReference> {
        match self {
            Feature::Reference(r) => Some(r),
            Feature::Attribute(_) => None,
        }
    }
}

/// A class descriptor.
#[derive(Clone, Debug)]
pub struct EClass {
    pub id: EntityId,
    pub name: String,
    /// Namespace URI of the owning package, when known.
    pub ns_uri: Option<String>,
    /// Namespace prefix of the owning package, when known.
    pub ns_prefix: Option<String>,
    pub is_abstract: bool,
    /// Names of direct supertypes; their features are already flattened in.
    pub super_types: Vec<String>,
    attributes: Vec<EAttribute>,
    references: Vec<EReference>,
}

impl EClass {
    pub fn builder(name: impl Into<String>) -> EClassBuilder {
        EClassBuilder::new(name)
    }

    pub fn attributes(&self) -> &[EAttribute] {
        &self.attributes
    }

    pub fn references(&self) -> &[EReference] {
        &self.references
    }

    pub fn attribute(&self, name: &str) -> Option<&EAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn reference(&self, name: &str) -> Option<&EReference> {
        self.references.iter().find(|r| r.name == name)
    }

    pub fn reference_by_id(&self, id: FeatureId) -> Option<&EReference> {
        self.references.iter().find(|r| r.id == id)
    }

    /// Look up a feature by name. Attributes shadow references.
    pub fn feature(&self, name: &str) -> Option<Feature<'_>> {
        self.attribute(name)
            .map(Feature::Attribute)
            .or_else(|| self.reference(name).map(Feature::Reference))
    }

    /// All features: attributes first, then references.
    pub fn features(&self) -> impl Iterator<Item = Feature<'_>> {
        self.attributes
            .iter()
            .map(Feature::Attribute)
            .chain(self.references.iter().map(Feature::Reference))
    }

    /// Containment references only.
    pub fn containments(&self) -> impl Iterator<Item = &EReference> {
        self.references.iter().filter(|r| r.containment)
    }

    /// Returns `true` if this class is `name` or lists it as a supertype.
    pub fn conforms_to(&self, name: &str) -> bool {
        self.name == name || self.super_types.iter().any(|s| s == name)
    }
}

impl PartialEq for EClass {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EClass {}

impl Hash for EClass {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Incremental construction of an [`EClass`].
#[derive(Clone, Debug)]
pub struct EClassBuilder {
    class: EClass,
}

impl EClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            class: EClass {
                id: EntityId::new(),
                name: name.into(),
                ns_uri: None,
                ns_prefix: None,
                is_abstract: false,
                super_types: Vec::new(),
                attributes: Vec::new(),
                references: Vec::new(),
            },
        }
    }

    /// Start from an existing class, keeping its id and supertypes.
    pub fn from_class(class: EClass) -> Self {
        Self { class }
    }

    pub fn namespace(mut self, ns_uri: impl Into<String>, ns_prefix: impl Into<String>) -> Self {
        self.class.ns_uri = Some(ns_uri.into());
        self.class.ns_prefix = Some(ns_prefix.into());
        self
    }

    pub fn is_abstract(mut self, is_abstract: bool) -> Self {
        self.class.is_abstract = is_abstract;
        self
    }

    /// Add an attribute. A later attribute with the same name replaces it.
    pub fn attribute(mut self, attribute: EAttribute) -> Self {
        self.class.attributes.retain(|a| a.name != attribute.name);
        self.class.attributes.push(attribute);
        self
    }

    /// Add a reference. A later reference with the same name replaces it.
    pub fn reference(mut self, reference: EReference) -> Self {
        self.class.references.retain(|r| r.name != reference.name);
        self.class.references.push(reference);
        self
    }

    /// Copy the features of a supertype into this class.
    pub fn inherit(mut self, parent: &EClass) -> Self {
        self.class.super_types.push(parent.name.clone());
        for s in &parent.super_types {
            if !self.class.super_types.contains(s) {
                self.class.super_types.push(s.clone());
            }
        }
        for a in &parent.attributes {
            if self.class.attribute(&a.name).is_none() {
                self.class.attributes.push(a.clone());
            }
        }
        for r in &parent.references {
            if self.class.reference(&r.name).is_none() {
                self.class.references.push(r.clone());
            }
        }
        self
    }

    pub fn has_feature(&self, name: &str) -> bool {
        self.class.feature(name).is_some()
    }

    pub fn build(self) -> EClass {
        self.class
    }
}

/// An enumeration data type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EEnum {
    pub name: String,
    pub literals: Vec<String>,
}

/// A package of classifiers sharing one namespace.
#[derive(Clone, Debug)]
pub struct EPackage {
    pub id: EntityId,
    pub name: String,
    pub ns_uri: String,
    pub ns_prefix: String,
    classes: Vec<Arc<EClass>>,
    enums: Vec<EEnum>,
}

impl EPackage {
    pub fn new(
        name: impl Into<String>,
        ns_uri: impl Into<String>,
        ns_prefix: impl Into<String>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            ns_uri: ns_uri.into(),
            ns_prefix: ns_prefix.into(),
            classes: Vec::new(),
            enums: Vec::new(),
        }
    }

    /// Finish a class in this package's namespace and add it.
    pub fn add_class(&mut self, builder: EClassBuilder) -> Arc<EClass> {
        let class = Arc::new(
            builder
                .namespace(self.ns_uri.clone(), self.ns_prefix.clone())
                .build(),
        );
        self.classes.retain(|c| c.name != class.name);
        self.classes.push(Arc::clone(&class));
        class
    }

    pub fn add_enum(&mut self, e: EEnum) {
        self.enums.push(e);
    }

    pub fn class(&self, name: &str) -> Option<&Arc<EClass>> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn classes(&self) -> &[Arc<EClass>] {
        &self.classes
    }

    pub fn enums(&self) -> &[EEnum] {
        &self.enums
    }
}

impl PartialEq for EPackage {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EPackage {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecore_names_roundtrip() {
        for dt in DataType::ALL {
            assert_eq!(DataType::from_ecore_name(dt.ecore_name()), Some(dt));
        }
        assert_eq!(DataType::from_ecore_name("ELong"), Some(DataType::Int));
        assert_eq!(DataType::from_ecore_name("EWhatever"), None);
    }

    #[test]
    fn feature_lookup_by_name() {
        let class = EClass::builder("Person")
            .attribute(EAttribute::new("name", DataType::String))
            .reference(EReference::new("friends", "Person").many())
            .build();
        assert!(matches!(class.feature("name"), Some(Feature::Attribute(_))));
        let friends = class.feature("friends").unwrap();
        assert!(friends.is_many());
        assert!(class.feature("age").is_none());
        assert_eq!(class.features().count(), 2);
    }

    #[test]
    fn builder_replaces_same_named_feature() {
        let class = EClass::builder("A")
            .attribute(EAttribute::new("x", DataType::Int))
            .attribute(EAttribute::new("x", DataType::String))
            .build();
        assert_eq!(class.attributes().len(), 1);
        assert_eq!(class.attribute("x").unwrap().data_type, DataType::String);
    }

    #[test]
    fn inherit_flattens_features() {
        let base = EClass::builder("Named")
            .attribute(EAttribute::new("name", DataType::String))
            .build();
        let class = EClass::builder("Person").inherit(&base).build();
        assert!(class.attribute("name").is_some());
        assert!(class.conforms_to("Named"));
        assert!(class.conforms_to("Person"));
    }

    #[test]
    fn package_stamps_namespace_on_classes() {
        let mut pkg = EPackage::new("org", "http://example.org/org", "org");
        let team = pkg.add_class(EClass::builder("Team"));
        assert_eq!(team.ns_uri.as_deref(), Some("http://example.org/org"));
        assert_eq!(team.ns_prefix.as_deref(), Some("org"));
        assert!(pkg.class("Team").is_some());
    }

    #[test]
    fn equality_is_by_identity() {
        let a = EClass::builder("Same").build();
        let b = EClass::builder("Same").build();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
