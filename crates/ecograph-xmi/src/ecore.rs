//! The Ecore meta-model.
//!
//! Schema documents (`.ecore`) are parsed into ordinary dynamic objects whose
//! classes are the meta-classes defined here. [`packages_from`] turns such a
//! graph back into [`EPackage`] descriptors for the metamodel registry.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use ecograph_store::{Resource, ResourceSet, ResourceSnapshot};
use ecograph_types::{
    DataType, DynamicObject, EAttribute, EClass, EClassBuilder, EEnum, EPackage, EReference,
    EntityId, Value,
};
use tracing::debug;

pub const ECORE_NS_URI: &str = "http://www.eclipse.org/emf/2002/Ecore";
pub const ECORE_PREFIX: &str = "ecore";

/// Data types published by the built-in types resource.
const BUILTIN_TYPES: &[(&str, &str)] = &[
    ("EString", "java.lang.String"),
    ("EInt", "int"),
    ("EIntegerObject", "java.lang.Integer"),
    ("ELong", "long"),
    ("EShort", "short"),
    ("EByte", "byte"),
    ("EBoolean", "boolean"),
    ("EBooleanObject", "java.lang.Boolean"),
    ("EDouble", "double"),
    ("EDoubleObject", "java.lang.Double"),
    ("EFloat", "float"),
    ("EChar", "char"),
    ("EBigDecimal", "java.math.BigDecimal"),
    ("EBigInteger", "java.math.BigInteger"),
    ("EDate", "java.util.Date"),
    ("EJavaObject", "java.lang.Object"),
];

/// The Ecore meta-classes as a package.
pub fn package() -> &'static EPackage {
    static ECORE: OnceLock<EPackage> = OnceLock::new();
    ECORE.get_or_init(build_package)
}

pub fn meta_class(name: &str) -> Option<&'static Arc<EClass>> {
    package().class(name)
}

/// Returns `true` for classes of the Ecore meta-model.
pub fn is_meta(class: &EClass) -> bool {
    class.ns_uri.as_deref() == Some(ECORE_NS_URI)
}

fn build_package() -> EPackage {
    let mut pkg = EPackage::new("ecore", ECORE_NS_URI, ECORE_PREFIX);
    let name = || EAttribute::new("name", DataType::String);
    let annotations = || EReference::new("eAnnotations", "EAnnotation").containment().many();
    let bounds = |b: EClassBuilder| {
        b.attribute(EAttribute::new("lowerBound", DataType::Int))
            .attribute(EAttribute::new("upperBound", DataType::Int))
            .attribute(EAttribute::new("transient", DataType::Bool))
            .attribute(EAttribute::new("changeable", DataType::Bool))
            .attribute(EAttribute::new("defaultValueLiteral", DataType::String))
            .reference(EReference::new("eType", "EClassifier"))
            .reference(annotations())
    };

    pkg.add_class(
        EClass::builder("EStringToStringMapEntry")
            .attribute(EAttribute::new("key", DataType::String))
            .attribute(EAttribute::new("value", DataType::String)),
    );
    pkg.add_class(
        EClass::builder("EAnnotation")
            .attribute(EAttribute::new("source", DataType::String))
            .reference(
                EReference::new("details", "EStringToStringMapEntry")
                    .containment()
                    .many(),
            ),
    );
    pkg.add_class(
        EClass::builder("EPackage")
            .attribute(name())
            .attribute(EAttribute::new("nsURI", DataType::String))
            .attribute(EAttribute::new("nsPrefix", DataType::String))
            .reference(EReference::new("eClassifiers", "EClassifier").containment().many())
            .reference(EReference::new("eSubpackages", "EPackage").containment().many())
            .reference(annotations()),
    );
    let classifier_builder = || {
        EClass::builder("EClassifier")
            .is_abstract(true)
            .attribute(name())
            .attribute(EAttribute::new("instanceClassName", DataType::String))
            .reference(annotations())
    };
    let classifier = classifier_builder().build();
    pkg.add_class(
        EClass::builder("EClass")
            .inherit(&classifier)
            .attribute(EAttribute::new("abstract", DataType::Bool))
            .attribute(EAttribute::new("interface", DataType::Bool))
            .reference(EReference::new("eSuperTypes", "EClass").many())
            .reference(
                EReference::new("eStructuralFeatures", "EStructuralFeature")
                    .containment()
                    .many(),
            ),
    );
    pkg.add_class(
        EClass::builder("EDataType")
            .inherit(&classifier)
            .attribute(EAttribute::new("serializable", DataType::Bool)),
    );
    pkg.add_class(
        EClass::builder("EEnum")
            .inherit(&classifier)
            .attribute(EAttribute::new("serializable", DataType::Bool))
            .reference(EReference::new("eLiterals", "EEnumLiteral").containment().many()),
    );
    pkg.add_class(
        EClass::builder("EEnumLiteral")
            .attribute(name())
            .attribute(EAttribute::new("value", DataType::Int))
            .attribute(EAttribute::new("literal", DataType::String))
            .reference(annotations()),
    );
    pkg.add_class(classifier_builder());
    pkg.add_class(
        bounds(EClass::builder("EStructuralFeature").attribute(name())).is_abstract(true),
    );
    pkg.add_class(
        bounds(EClass::builder("EAttribute").attribute(name()))
            .attribute(EAttribute::new("iD", DataType::Bool)),
    );
    pkg.add_class(
        bounds(EClass::builder("EReference").attribute(name()))
            .attribute(EAttribute::new("containment", DataType::Bool))
            .attribute(EAttribute::new("resolveProxies", DataType::Bool))
            .reference(EReference::new("eOpposite", "EReference")),
    );
    pkg
}

/// Objects of the built-in data-type document: one `ecore` package with an
/// `EDataType` per primitive and the `EObject` root class.
pub fn builtin_objects() -> Vec<DynamicObject> {
    let mut objects = Vec::new();
    let mut classifiers = Vec::new();
    if let Some(data_type) = meta_class("EDataType") {
        for (name, instance_class) in BUILTIN_TYPES {
            let mut object = DynamicObject::new(Arc::clone(data_type));
            object.set("name", *name);
            object.set("instanceClassName", *instance_class);
            classifiers.push(object.id());
            objects.push(object);
        }
    }
    if let Some(class) = meta_class("EClass") {
        let mut object = DynamicObject::new(Arc::clone(class));
        object.set("name", "EObject");
        classifiers.push(object.id());
        objects.push(object);
    }
    if let Some(pkg) = meta_class("EPackage") {
        let mut object = DynamicObject::new(Arc::clone(pkg));
        object.set("name", "ecore");
        object.set("nsURI", ECORE_NS_URI);
        object.set("nsPrefix", ECORE_PREFIX);
        object.set("eClassifiers", classifiers);
        objects.push(object);
    }
    objects
}

/// Make sure `set` holds the built-in data-type document at [`ECORE_NS_URI`].
pub async fn ensure_builtin_types(set: &ResourceSet) {
    let resource = set.create_resource(ECORE_NS_URI).await;
    if resource.count().await == 0 {
        let added = resource.add_all(builtin_objects()).await;
        debug!(added, "registered built-in Ecore data types");
    }
}

/// Build descriptors for every root `EPackage` in a schema document,
/// including nested subpackages.
///
/// Feature descriptors take the ids of the objects they were built from, so
/// `eOpposite` links survive as [`EReference::opposite`]. Attribute types
/// map through their Ecore names; enums and unknown data types become
/// strings. Supertype features are flattened into subclasses.
pub fn packages_from(schema: &ResourceSnapshot) -> Vec<EPackage> {
    build_packages(schema, HashMap::new())
}

/// Like [`packages_from`], but `eType` targets in other documents of the
/// owning set (typically the built-in data types) are looked up by name.
pub async fn packages_of(resource: &Resource) -> Vec<EPackage> {
    let schema = resource.snapshot().await;
    let mut external = HashMap::new();
    if let Some(set) = resource.resource_set() {
        let targets: HashSet<EntityId> = schema
            .objects()
            .filter_map(|o| o.get("eType").and_then(Value::as_reference))
            .filter(|id| !schema.contains(*id))
            .collect();
        for id in targets {
            if let Some((object, _)) = set.resolve(id).await {
                if let Some(name) = object.name() {
                    external.insert(id, name.to_string());
                }
            }
        }
    }
    build_packages(&schema, external)
}

fn build_packages(schema: &ResourceSnapshot, external: HashMap<EntityId, String>) -> Vec<EPackage> {
    let mut builder = PackageBuilder {
        schema,
        external,
        built: HashMap::new(),
        visiting: HashSet::new(),
    };
    let mut packages = Vec::new();
    let roots: Vec<EntityId> = schema
        .roots()
        .filter(|o| o.class().name == "EPackage")
        .map(DynamicObject::id)
        .collect();
    for root in roots {
        builder.package(root, &mut packages);
    }
    packages
}

struct PackageBuilder<'a> {
    schema: &'a ResourceSnapshot,
    /// Names of `eType` targets outside the schema document.
    external: HashMap<EntityId, String>,
    built: HashMap<EntityId, Arc<EClass>>,
    visiting: HashSet<EntityId>,
}

impl PackageBuilder<'_> {
    fn package(&mut self, id: EntityId, out: &mut Vec<EPackage>) {
        let schema = self.schema;
        let Some(object) = schema.get(id) else {
            return;
        };
        let text = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let mut pkg = EPackage::new(text("name"), text("nsURI"), text("nsPrefix"));
        for classifier in self.ids(object, "eClassifiers") {
            let Some(item) = schema.get(classifier) else {
                continue;
            };
            match item.class().name.as_str() {
                "EClass" => {
                    if let Some(class) = self.class(classifier, &pkg) {
                        pkg.add_class(EClassBuilder::from_class((*class).clone()));
                    }
                }
                "EEnum" => {
                    let literals = self
                        .ids(item, "eLiterals")
                        .into_iter()
                        .filter_map(|l| schema.get(l))
                        .filter_map(|l| l.name().map(str::to_string))
                        .collect();
                    pkg.add_enum(EEnum {
                        name: item.name().unwrap_or_default().to_string(),
                        literals,
                    });
                }
                _ => {}
            }
        }
        let subpackages = self.ids(object, "eSubpackages");
        out.push(pkg);
        for sub in subpackages {
            self.package(sub, out);
        }
    }

    fn ids(&self, object: &DynamicObject, feature: &str) -> Vec<EntityId> {
        object.get(feature).map(Value::references).unwrap_or_default()
    }

    fn class(&mut self, id: EntityId, pkg: &EPackage) -> Option<Arc<EClass>> {
        if let Some(done) = self.built.get(&id) {
            return Some(Arc::clone(done));
        }
        if !self.visiting.insert(id) {
            debug!(%id, "cyclic supertype chain");
            return None;
        }
        let schema = self.schema;
        let object = schema.get(id)?;
        let mut builder = EClass::builder(object.name().unwrap_or_default())
            .is_abstract(object.get("abstract").and_then(Value::as_bool).unwrap_or(false))
            .namespace(pkg.ns_uri.clone(), pkg.ns_prefix.clone());
        for feature in self.ids(object, "eStructuralFeatures") {
            let Some(feature) = schema.get(feature) else {
                continue;
            };
            builder = match feature.class().name.as_str() {
                "EAttribute" => builder.attribute(self.attribute(feature)),
                "EReference" => builder.reference(self.reference(feature)),
                _ => builder,
            };
        }
        for parent in self.ids(object, "eSuperTypes") {
            if let Some(parent) = self.class(parent, pkg) {
                builder = builder.inherit(&parent);
            }
        }
        let class = Arc::new(builder.build());
        self.visiting.remove(&id);
        self.built.insert(id, Arc::clone(&class));
        Some(class)
    }

    fn type_name(&self, feature: &DynamicObject) -> Option<&str> {
        let target = feature.get("eType")?.as_reference()?;
        match self.schema.get(target) {
            Some(object) => object.name(),
            None => self.external.get(&target).map(String::as_str),
        }
    }

    fn attribute(&self, feature: &DynamicObject) -> EAttribute {
        let data_type = self
            .type_name(feature)
            .and_then(DataType::from_ecore_name)
            .unwrap_or(DataType::String);
        let mut attribute =
            EAttribute::new(feature.name().unwrap_or_default(), data_type);
        attribute.id = feature.id();
        if is_many(feature) {
            attribute = attribute.many();
        }
        attribute
    }

    fn reference(&self, feature: &DynamicObject) -> EReference {
        let mut reference = EReference::new(
            feature.name().unwrap_or_default(),
            self.type_name(feature).unwrap_or("EObject"),
        )
        .with_id(feature.id());
        if feature.get("containment").and_then(Value::as_bool) == Some(true) {
            reference = reference.containment();
        }
        if is_many(feature) {
            reference = reference.many();
        }
        if let Some(opposite) = feature.get("eOpposite").and_then(Value::as_reference) {
            reference = reference.with_opposite(opposite);
        }
        reference
    }
}

fn is_many(feature: &DynamicObject) -> bool {
    feature
        .get("upperBound")
        .and_then(Value::as_int)
        .is_some_and(|upper| upper == -1 || upper > 1)
}
