//! XMI to object graph.
//!
//! The parser moves through [`ParseState`] once: `Init` reads the XML,
//! checks the version, collects namespaces and infers classes for elements
//! no registered metamodel describes; `ParsingElements` builds objects
//! children-first and defers every reference; `ResolvingReferences` settles
//! the deferred ones against the document, then against other documents
//! through [`ResourceProxy`]. Objects are committed to the resource only
//! once all of that succeeded, so a fatal error leaves it untouched.
//!
//! A reference into another document whose feature has an opposite is
//! forwarded to that document after the commit. A document loaded while this
//! one was still being parsed could not see its back-references here, so the
//! forward restores them.

use std::collections::HashMap;
use std::sync::Arc;

use ecograph_store::fragment::{self, ObjectGraph};
use ecograph_store::{uri, Resource, ResourceProxy, ResourceSet};
use ecograph_types::{
    DataType, DynamicObject, EAttribute, EClass, EPackage, EReference, EntityId, Feature,
    FeatureId, Value,
};
use indexmap::IndexMap;
use tracing::{debug, trace, Instrument};

use crate::ecore::{self, ECORE_NS_URI};
use crate::error::{XmiError, XmiResult};
use crate::xml::{self, split_qname, Element};
use crate::{XMI_NS_URI, XSI_NS_URI};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseState {
    Init,
    ParsingElements,
    ResolvingReferences,
    Done,
}

/// What a successful parse produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub objects: usize,
    pub roots: usize,
    pub resolved: usize,
    /// References dropped because nothing matched them.
    pub unresolved: usize,
}

/// Parse raw bytes into `resource`. Bytes must be UTF-8; a BOM is accepted.
pub async fn parse_bytes(resource: &Resource, bytes: &[u8]) -> XmiResult<ParseReport> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = std::str::from_utf8(bytes).map_err(|e| XmiError::Encoding(e.to_string()))?;
    parse_str(resource, text).await
}

/// Parse a document into `resource`, appending to what it already holds.
pub async fn parse_str(resource: &Resource, text: &str) -> XmiResult<ParseReport> {
    let span = tracing::debug_span!("xmi_parse", uri = %resource.uri());
    let mut parser = XmiParser::new(resource);
    parser.run(text).instrument(span).await
}

/// An opposite side to set in another document once this one is committed.
struct Backlink {
    target: EntityId,
    opposite: FeatureId,
    source: EntityId,
}

pub struct XmiParser<'r> {
    resource: &'r Resource,
    set: Option<Arc<ResourceSet>>,
    state: ParseState,
    /// prefix -> namespace URI; the default namespace is under `""`.
    namespaces: HashMap<String, String>,
    packages: HashMap<String, Arc<EPackage>>,
    inferred: HashMap<String, Arc<EClass>>,
    arena: Arena,
    /// Name paths of schema elements, e.g. `//Person/name`.
    fragments: HashMap<String, EntityId>,
    deferred: Vec<Deferred>,
}

struct Deferred {
    owner: EntityId,
    feature: FeatureId,
    opposite: Option<FeatureId>,
    many: bool,
    targets: Vec<String>,
}

/// Objects built so far, addressable like a resource.
#[derive(Default)]
struct Arena {
    objects: IndexMap<EntityId, DynamicObject>,
    roots: Vec<EntityId>,
    xmi_ids: IndexMap<String, EntityId>,
}

impl ObjectGraph for Arena {
    fn object(&self, id: EntityId) -> Option<&DynamicObject> {
        self.objects.get(&id)
    }

    fn root_ids(&self) -> &[EntityId] {
        &self.roots
    }

    fn lookup_id(&self, text: &str) -> Option<EntityId> {
        if let Some(id) = self.xmi_ids.get(text) {
            return Some(*id);
        }
        let id = EntityId::parse(text).ok()?;
        self.objects.contains_key(&id).then_some(id)
    }
}

/// Where an element sits relative to its parent.
#[derive(Clone, Copy)]
enum Slot<'a> {
    /// A document root: the tag names the class.
    Root,
    /// A child in a feature of a metamodel class.
    Feature(&'a EReference),
    /// A child of an inferred class: the tag names the class.
    Inferred,
}

enum ClassRef {
    Known(Arc<EClass>),
    Inferred { name: String, ns_uri: Option<String> },
}

impl ClassRef {
    fn name(&self) -> &str {
        match self {
            ClassRef::Known(class) => &class.name,
            ClassRef::Inferred { name, .. } => name,
        }
    }

    fn ns_uri(&self) -> Option<&str> {
        match self {
            ClassRef::Known(class) => class.ns_uri.as_deref(),
            ClassRef::Inferred { ns_uri, .. } => ns_uri.as_deref(),
        }
    }
}

#[derive(Default)]
struct Shape {
    ns_uri: Option<String>,
    attributes: IndexMap<String, DataType>,
    references: IndexMap<String, ShapeRef>,
}

struct ShapeRef {
    target: String,
    containment: bool,
    many: bool,
}

impl<'r> XmiParser<'r> {
    pub fn new(resource: &'r Resource) -> Self {
        Self {
            resource,
            set: resource.resource_set(),
            state: ParseState::Init,
            namespaces: HashMap::new(),
            packages: HashMap::new(),
            inferred: HashMap::new(),
            arena: Arena::default(),
            fragments: HashMap::new(),
            deferred: Vec::new(),
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    fn advance(&mut self, next: ParseState) {
        trace!(from = ?self.state, to = ?next, "parser state");
        self.state = next;
    }

    /// Parse `text` into the resource. The parser ends in `Done` on success
    /// and back in `Init` on error, and may be run again.
    pub async fn run(&mut self, text: &str) -> XmiResult<ParseReport> {
        *self = Self::new(self.resource);
        let result = self.passes(text).await;
        if result.is_err() {
            self.advance(ParseState::Init);
        }
        result
    }

    async fn passes(&mut self, text: &str) -> XmiResult<ParseReport> {
        let root = xml::parse(text)?.ok_or(XmiError::MissingRoot)?;
        check_version(&root)?;
        collect_namespaces(&root, &mut self.namespaces);
        let tops: Vec<&Element> = if is_xmi_wrapper(&root) {
            root.children.iter().collect()
        } else {
            vec![&root]
        };
        self.fetch_packages().await;
        self.infer_classes(&tops);

        self.advance(ParseState::ParsingElements);
        for (index, element) in tops.iter().enumerate() {
            let path = if index == 0 {
                "/".to_string()
            } else {
                format!("/{index}")
            };
            let id = self.element(element, Slot::Root, None, &path)?;
            self.arena.roots.push(id);
        }

        self.advance(ParseState::ResolvingReferences);
        let (resolved, unresolved, backlinks) = self.resolve_references().await;

        let report = ParseReport {
            objects: self.arena.objects.len(),
            roots: self.arena.roots.len(),
            resolved,
            unresolved,
        };
        let Arena {
            objects, xmi_ids, ..
        } = std::mem::take(&mut self.arena);
        self.resource.add_all(objects.into_values().collect()).await;
        for (xmi_id, id) in xmi_ids {
            self.resource.set_xmi_id(id, xmi_id).await;
        }
        self.forward_backlinks(backlinks).await;
        self.advance(ParseState::Done);
        debug!(
            objects = report.objects,
            roots = report.roots,
            resolved,
            unresolved,
            "parsed XMI"
        );
        Ok(report)
    }

    async fn fetch_packages(&mut self) {
        let Some(set) = self.set.clone() else {
            return;
        };
        let uris: Vec<String> = self
            .namespaces
            .values()
            .filter(|ns| !matches!(ns.as_str(), XMI_NS_URI | XSI_NS_URI | ECORE_NS_URI))
            .cloned()
            .collect();
        for ns_uri in uris {
            if let Some(package) = set.get_metamodel(&ns_uri).await {
                self.packages.insert(ns_uri, package);
            }
        }
    }

    // ---- Class selection ----

    fn namespace_of(&self, prefix: Option<&str>) -> Option<&str> {
        self.namespaces
            .get(prefix.unwrap_or_default())
            .map(String::as_str)
    }

    fn known(&self, ns_uri: Option<&str>, name: &str) -> Option<Arc<EClass>> {
        match ns_uri? {
            ECORE_NS_URI => ecore::meta_class(name).cloned(),
            ns_uri => self.packages.get(ns_uri)?.class(name).cloned(),
        }
    }

    fn lookup(&self, ns_uri: Option<&str>, name: &str) -> ClassRef {
        match self.known(ns_uri, name) {
            Some(class) => ClassRef::Known(class),
            None => ClassRef::Inferred {
                name: name.to_string(),
                ns_uri: ns_uri.map(str::to_string),
            },
        }
    }

    /// The class of an element: `xsi:type` first, then the root tag, then the
    /// declared target of the feature holding it.
    fn choose_class(
        &self,
        element: &Element,
        slot: Slot<'_>,
        parent_ns: Option<&str>,
    ) -> ClassRef {
        if let Some(declared) = element.attr("xsi:type").or_else(|| element.attr("xmi:type")) {
            let (prefix, local) = split_qname(declared);
            let ns_uri = match prefix {
                Some(prefix) => self.namespace_of(Some(prefix)),
                None => parent_ns.or_else(|| self.namespace_of(None)),
            };
            return self.lookup(ns_uri, local);
        }
        match slot {
            Slot::Root => {
                let (prefix, local) = split_qname(&element.name);
                self.lookup(self.namespace_of(prefix), local)
            }
            Slot::Feature(reference) => self.lookup(parent_ns, &reference.target_type),
            Slot::Inferred => ClassRef::Inferred {
                name: element.local_name().to_string(),
                ns_uri: parent_ns.map(str::to_string),
            },
        }
    }

    // ---- Shape inference ----

    fn infer_classes(&mut self, tops: &[&Element]) {
        let mut shapes: IndexMap<String, Shape> = IndexMap::new();
        for element in tops {
            self.scan(element, Slot::Root, None, &mut shapes);
        }
        for (name, shape) in shapes {
            let mut builder = EClass::builder(name.clone());
            if let Some(ns_uri) = &shape.ns_uri {
                let prefix = self
                    .namespaces
                    .iter()
                    .filter(|(prefix, uri)| *uri == ns_uri && !prefix.is_empty())
                    .map(|(prefix, _)| prefix.clone())
                    .min()
                    .unwrap_or_else(|| name.to_lowercase());
                builder = builder.namespace(ns_uri.clone(), prefix);
            }
            for (attribute, data_type) in shape.attributes {
                builder = builder.attribute(EAttribute::new(attribute, data_type));
            }
            for (feature, shape_ref) in shape.references {
                if builder.has_feature(&feature) {
                    continue;
                }
                let mut reference = EReference::new(feature, shape_ref.target);
                if shape_ref.containment {
                    reference = reference.containment();
                }
                if shape_ref.many {
                    reference = reference.many();
                }
                builder = builder.reference(reference);
            }
            trace!(class = %name, "inferred class");
            self.inferred.insert(name, Arc::new(builder.build()));
        }
    }

    fn scan(
        &self,
        element: &Element,
        slot: Slot<'_>,
        parent_ns: Option<&str>,
        shapes: &mut IndexMap<String, Shape>,
    ) {
        let class = self.choose_class(element, slot, parent_ns);
        let ns_uri = class.ns_uri().map(str::to_string);

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for child in &element.children {
            *counts.entry(child.local_name()).or_default() += 1;
        }

        if let ClassRef::Inferred { name, .. } = &class {
            let shape = shapes.entry(name.clone()).or_insert_with(|| Shape {
                ns_uri: ns_uri.clone(),
                ..Shape::default()
            });
            for (key, raw) in feature_attributes(element) {
                let found = Value::infer(raw).data_type().unwrap_or(DataType::String);
                shape
                    .attributes
                    .entry(key.to_string())
                    .and_modify(|current| *current = widen(*current, found))
                    .or_insert(found);
            }
        }

        for child in &element.children {
            let feature = child.local_name();
            let (child_slot, known_parent) = match &class {
                ClassRef::Known(parent) => match parent.reference(feature) {
                    Some(reference) => (Slot::Feature(reference), true),
                    None => continue,
                },
                ClassRef::Inferred { .. } => (Slot::Inferred, false),
            };

            let href = child.attr("href").is_some();
            if !known_parent {
                let shape_ref = if href {
                    let target = child
                        .attr("xsi:type")
                        .map(|t| split_qname(t).1.to_string())
                        .unwrap_or_else(|| "EObject".to_string());
                    ShapeRef {
                        target,
                        containment: false,
                        many: counts[feature] > 1,
                    }
                } else {
                    let target = self.choose_class(child, child_slot, ns_uri.as_deref());
                    ShapeRef {
                        target: target.name().to_string(),
                        containment: true,
                        many: true,
                    }
                };
                let (many, containment) = (shape_ref.many, shape_ref.containment);
                if let Some(shape) = shapes.get_mut(class.name()) {
                    shape
                        .references
                        .entry(feature.to_string())
                        .and_modify(|seen| {
                            seen.many |= many;
                            seen.containment |= containment;
                        })
                        .or_insert(shape_ref);
                }
            }
            if !href {
                self.scan(child, child_slot, ns_uri.as_deref(), shapes);
            }
        }
    }

    // ---- Pass 1 ----

    fn class_for(
        &self,
        element: &Element,
        slot: Slot<'_>,
        parent_ns: Option<&str>,
    ) -> (Arc<EClass>, bool) {
        match self.choose_class(element, slot, parent_ns) {
            ClassRef::Known(class) => (class, false),
            ClassRef::Inferred { name, ns_uri } => {
                let class = self.inferred.get(&name).cloned().unwrap_or_else(|| {
                    let builder = EClass::builder(name.clone());
                    Arc::new(match ns_uri {
                        Some(ns_uri) => builder.namespace(ns_uri, name.to_lowercase()),
                        None => builder,
                    }
                    .build())
                });
                (class, true)
            }
        }
    }

    fn element(
        &mut self,
        element: &Element,
        slot: Slot<'_>,
        parent_ns: Option<&str>,
        path: &str,
    ) -> XmiResult<EntityId> {
        let (class, inferred) = self.class_for(element, slot, parent_ns);
        let meta = ecore::is_meta(&class);
        if meta {
            check_required(element, &class)?;
        }

        let id = EntityId::new();
        if meta {
            self.fragments.insert(path.to_string(), id);
        }
        if let Some(xmi_id) = element.attr("xmi:id") {
            self.arena.xmi_ids.insert(xmi_id.to_string(), id);
        }
        let mut object = DynamicObject::with_id(id, Arc::clone(&class));

        for (key, raw) in feature_attributes(element) {
            match class.feature(key) {
                Some(Feature::Attribute(attribute)) => {
                    match Value::parse_as(attribute.data_type, raw) {
                        Ok(value) => {
                            object.storage_mut().set(attribute.id, value);
                        }
                        Err(e) => {
                            debug!(class = %class.name, key, error = %e, "skipping attribute");
                        }
                    }
                }
                Some(Feature::Reference(reference)) => {
                    self.defer(id, reference, reference_tokens(raw));
                }
                None => trace!(class = %class.name, key, "unknown attribute"),
            }
        }

        let mut contained: IndexMap<FeatureId, Vec<EntityId>> = IndexMap::new();
        for child in &element.children {
            let feature = child.local_name();
            let Some(reference) = class.reference(feature) else {
                trace!(class = %class.name, feature, "unknown child element");
                continue;
            };
            if let Some(href) = child.attr("href") {
                self.defer(id, reference, reference_tokens(href));
                continue;
            }
            if !reference.containment {
                trace!(class = %class.name, feature, "non-containment child without href");
                continue;
            }
            let index = contained.get(&reference.id).map_or(0, Vec::len);
            let child_path = match child.attr("name") {
                Some(name) => format!("{path}/{name}"),
                None => format!("{path}/@{feature}.{index}"),
            };
            let child_slot = if inferred {
                Slot::Inferred
            } else {
                Slot::Feature(reference)
            };
            let child_id = self.element(child, child_slot, class.ns_uri.as_deref(), &child_path)?;
            contained.entry(reference.id).or_default().push(child_id);
            if let Some(opposite) = reference.opposite {
                self.point_to_container(child_id, opposite, id);
            }
        }
        for (feature, ids) in contained {
            let many = class.reference_by_id(feature).is_some_and(|r| r.many);
            let value = if !many && ids.len() == 1 {
                Value::Reference(ids[0])
            } else {
                Value::ReferenceList(ids)
            };
            object.storage_mut().set(feature, value);
        }

        self.arena.objects.insert(id, object);
        Ok(id)
    }

    /// Set the container side of a containment with an opposite.
    fn point_to_container(&mut self, child: EntityId, opposite: FeatureId, container: EntityId) {
        let Some(object) = self.arena.objects.get_mut(&child) else {
            return;
        };
        let class = Arc::clone(object.class());
        if let Some(reference) = class.reference_by_id(opposite) {
            let value = if reference.many {
                Value::ReferenceList(vec![container])
            } else {
                Value::Reference(container)
            };
            object.storage_mut().set(reference.id, value);
        }
    }

    fn defer(&mut self, owner: EntityId, reference: &EReference, targets: Vec<String>) {
        if targets.is_empty() {
            return;
        }
        self.deferred.push(Deferred {
            owner,
            feature: reference.id,
            opposite: reference.opposite,
            many: reference.many,
            targets,
        });
    }

    // ---- Pass 2 ----

    async fn resolve_references(&mut self) -> (usize, usize, Vec<Backlink>) {
        let mut groups: IndexMap<(EntityId, FeatureId), (bool, Vec<EntityId>)> = IndexMap::new();
        let mut backlinks = Vec::new();
        let mut resolved = 0;
        let mut unresolved = 0;
        for deferred in std::mem::take(&mut self.deferred) {
            let group = groups
                .entry((deferred.owner, deferred.feature))
                .or_insert_with(|| (deferred.many, Vec::new()));
            for target in &deferred.targets {
                match self.resolve_target(target).await {
                    Some(id) => {
                        group.1.push(id);
                        resolved += 1;
                        if let Some(opposite) = deferred.opposite {
                            if !self.arena.objects.contains_key(&id) {
                                backlinks.push(Backlink {
                                    target: id,
                                    opposite,
                                    source: deferred.owner,
                                });
                            }
                        }
                    }
                    None => {
                        trace!(owner = %deferred.owner, target, "dropping unresolved reference");
                        unresolved += 1;
                    }
                }
            }
        }
        for ((owner, feature), (many, ids)) in groups {
            let Some(object) = self.arena.objects.get_mut(&owner) else {
                continue;
            };
            if ids.is_empty() {
                continue;
            }
            let value = if many {
                Value::ReferenceList(ids)
            } else {
                Value::Reference(ids[0])
            };
            object.storage_mut().set(feature, value);
        }
        (resolved, unresolved, backlinks)
    }

    async fn forward_backlinks(&self, backlinks: Vec<Backlink>) {
        let Some(set) = self.set.as_ref() else {
            return;
        };
        if backlinks.is_empty() {
            return;
        }
        debug!(count = backlinks.len(), "forwarding opposites to other documents");
        for link in backlinks {
            set.update_opposite(link.target, link.opposite, link.source, true)
                .await;
        }
    }

    async fn resolve_target(&self, target: &str) -> Option<EntityId> {
        if let Some(fragment) = target.strip_prefix('#') {
            return self.resolve_local(fragment);
        }
        if target.starts_with('/') && !target.contains('#') {
            return self.resolve_local(target);
        }
        if let Some((document, fragment)) = target.split_once('#') {
            let document = uri::resolve_against(self.resource.uri(), document);
            if document == uri::normalise_path(self.resource.uri()) {
                return self.resolve_local(fragment);
            }
            return self.resolve_external(&document, fragment).await;
        }
        if let Some(id) = self.arena.lookup_id(target) {
            return Some(id);
        }
        let id = EntityId::parse(target).ok()?;
        let (object, _) = self.set.as_ref()?.resolve(id).await?;
        Some(object.id())
    }

    fn resolve_local(&self, fragment: &str) -> Option<EntityId> {
        if let Some(id) = self.fragments.get(fragment) {
            return Some(*id);
        }
        if let Some(id) = self.arena.xmi_ids.get(fragment) {
            return Some(*id);
        }
        fragment::resolve_path(&self.arena, fragment)
    }

    async fn resolve_external(&self, document: &str, fragment: &str) -> Option<EntityId> {
        let set = self.set.as_ref()?;
        if document == ECORE_NS_URI {
            ecore::ensure_builtin_types(set).await;
        }
        ResourceProxy::new(document, fragment).resolve(set).await
    }
}

fn check_version(root: &Element) -> XmiResult<()> {
    let Some(version) = root.attr("xmi:version").or_else(|| root.attr("xmi.version")) else {
        return Ok(());
    };
    let major = version
        .split('.')
        .next()
        .and_then(|major| major.trim().parse::<u32>().ok());
    match major {
        Some(major) if major >= 2 => Ok(()),
        _ => Err(XmiError::UnsupportedVersion(version.to_string())),
    }
}

fn is_xmi_wrapper(root: &Element) -> bool {
    root.local_name() == "XMI" && root.prefix() == Some("xmi")
}

fn collect_namespaces(element: &Element, namespaces: &mut HashMap<String, String>) {
    for (key, value) in &element.attributes {
        if key == "xmlns" {
            namespaces.insert(String::new(), value.clone());
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            namespaces.insert(prefix.to_string(), value.clone());
        }
    }
    for child in &element.children {
        collect_namespaces(child, namespaces);
    }
}

/// Attributes that carry feature values, skipping namespace and XMI control
/// attributes.
fn feature_attributes(element: &Element) -> impl Iterator<Item = (&str, &str)> {
    element
        .attributes
        .iter()
        .filter(|(key, _)| {
            !(key == "xmlns"
                || key == "href"
                || key.starts_with("xmlns:")
                || key.starts_with("xmi:")
                || key.starts_with("xsi:"))
        })
        .map(|(k, v)| (k.as_str(), v.as_str()))
}

/// Split an attribute-form reference list. A `prefix:Type` token written
/// before a cross-document URI only qualifies it and is dropped.
fn reference_tokens(raw: &str) -> Vec<String> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    tokens
        .iter()
        .enumerate()
        .filter(|(i, token)| {
            let qualifier = !token.contains('#')
                && token.contains(':')
                && tokens.get(i + 1).is_some_and(|next| next.contains('#'));
            !qualifier
        })
        .map(|(_, token)| token.to_string())
        .collect()
}

fn widen(current: DataType, found: DataType) -> DataType {
    match (current, found) {
        (a, b) if a == b => a,
        (DataType::Int, DataType::Double) | (DataType::Double, DataType::Int) => DataType::Double,
        _ => DataType::String,
    }
}

fn check_required(element: &Element, class: &EClass) -> XmiResult<()> {
    let required: &[&str] = match class.name.as_str() {
        "EPackage" => &["name", "nsURI", "nsPrefix"],
        "EClass" | "EDataType" | "EEnum" | "EAttribute" | "EReference" | "EEnumLiteral" => {
            &["name"]
        }
        _ => &[],
    };
    for attribute in required {
        if element.attr(attribute).is_none() {
            return Err(XmiError::MissingAttribute {
                element: element.name.clone(),
                attribute: (*attribute).to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn parse(text: &str) -> (Arc<Resource>, XmiResult<ParseReport>) {
        let resource = Resource::new("file:///models/test.xmi");
        let report = parse_str(&resource, text).await;
        (resource, report)
    }

    #[test]
    fn widening_rules() {
        assert_eq!(widen(DataType::Int, DataType::Int), DataType::Int);
        assert_eq!(widen(DataType::Int, DataType::Double), DataType::Double);
        assert_eq!(widen(DataType::Bool, DataType::Int), DataType::String);
    }

    #[test]
    fn qualifier_tokens_are_dropped() {
        assert_eq!(
            reference_tokens("ecore:EDataType http://www.eclipse.org/emf/2002/Ecore#//EString"),
            vec!["http://www.eclipse.org/emf/2002/Ecore#//EString".to_string()]
        );
        assert_eq!(reference_tokens("#//A #//B"), vec!["#//A", "#//B"]);
        assert_eq!(reference_tokens("_id1 _id2"), vec!["_id1", "_id2"]);
    }

    #[tokio::test]
    async fn attribute_types_are_inferred() {
        let (resource, report) = parse(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <lib:Shelf xmlns:lib="http://example.org/lib" label="A" count="42" weight="2.5" open="TRUE"/>"#,
        )
        .await;
        assert_eq!(report.unwrap().objects, 1);
        let shelf = &resource.get_roots().await[0];
        assert_eq!(shelf.class().name, "Shelf");
        assert_eq!(shelf.class().ns_uri.as_deref(), Some("http://example.org/lib"));
        assert_eq!(shelf.get("label"), Some(&Value::String("A".into())));
        assert_eq!(shelf.get("count"), Some(&Value::Int(42)));
        assert_eq!(shelf.get("weight"), Some(&Value::Double(2.5)));
        assert_eq!(shelf.get("open"), Some(&Value::Bool(true)));
    }

    #[tokio::test]
    async fn mixed_numbers_widen_to_double() {
        let (resource, report) = parse(
            r#"<xmi:XMI xmi:version="2.0" xmlns:xmi="http://www.omg.org/XMI" xmlns:m="urn:m">
              <m:Point x="1"/>
              <m:Point x="2.5"/>
            </xmi:XMI>"#,
        )
        .await;
        assert_eq!(report.unwrap().roots, 2);
        let roots = resource.get_roots().await;
        assert_eq!(roots[0].get("x"), Some(&Value::Double(1.0)));
        assert_eq!(roots[1].get("x"), Some(&Value::Double(2.5)));
    }

    #[tokio::test]
    async fn children_are_contained_and_hrefs_resolved() {
        let (resource, report) = parse(
            r##"<t:Team xmlns:t="urn:t" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" name="core">
              <members xsi:type="t:Member" name="ann"/>
              <members xsi:type="t:Member" name="bob"/>
              <leader href="#//@members.1"/>
              <ghost href="#//@members.9"/>
            </t:Team>"##,
        )
        .await;
        let report = report.unwrap();
        assert_eq!(report.objects, 3);
        assert_eq!(report.roots, 1);
        assert_eq!(report.resolved, 1);
        assert_eq!(report.unresolved, 1);

        let roots = resource.get_roots().await;
        assert_eq!(roots.len(), 1);
        let team = &roots[0];
        let members = team.get("members").unwrap().references();
        assert_eq!(members.len(), 2);
        let bob = resource.resolve(members[1]).await.unwrap();
        assert_eq!(bob.class().name, "Member");
        assert_eq!(team.get("leader"), Some(&Value::Reference(members[1])));
        assert!(!team.is_set("ghost"));
    }

    #[tokio::test]
    async fn xmi_ids_are_recorded_and_resolvable() {
        let (resource, report) = parse(
            r##"<xmi:XMI xmi:version="2.0" xmlns:xmi="http://www.omg.org/XMI" xmlns:p="urn:p">
              <p:Person xmi:id="_a" name="a"><friend href="_b"/></p:Person>
              <p:Person xmi:id="_b" name="b"><friend href="#_a"/></p:Person>
            </xmi:XMI>"##,
        )
        .await;
        report.unwrap();
        let a = resource.id_for_xmi_id("_a").await.unwrap();
        let b = resource.id_for_xmi_id("_b").await.unwrap();
        assert_eq!(resource.get_feature(a, "friend").await, Some(Value::Reference(b)));
        assert_eq!(resource.get_feature(b, "friend").await, Some(Value::Reference(a)));
    }

    #[tokio::test]
    async fn fatal_errors() {
        assert!(matches!(parse("").await.1, Err(XmiError::MissingRoot)));
        assert!(matches!(
            parse(r#"<xmi:XMI xmi:version="1.1" xmlns:xmi="http://www.omg.org/XMI"/>"#)
                .await
                .1,
            Err(XmiError::UnsupportedVersion(v)) if v == "1.1"
        ));
        assert!(matches!(
            parse(r#"<ecore:EPackage xmlns:ecore="http://www.eclipse.org/emf/2002/Ecore" name="p" nsURI="urn:p"/>"#)
                .await
                .1,
            Err(XmiError::MissingAttribute { attribute, .. }) if attribute == "nsPrefix"
        ));
        let resource = Resource::new("mem://bytes");
        assert!(matches!(
            parse_bytes(&resource, &[0x3c, 0xff, 0xfe, 0x3e]).await,
            Err(XmiError::Encoding(_))
        ));
    }

    #[tokio::test]
    async fn fatal_error_leaves_resource_untouched() {
        let (resource, result) = parse(
            r#"<ecore:EPackage xmlns:ecore="http://www.eclipse.org/emf/2002/Ecore" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                 name="p" nsURI="urn:p" nsPrefix="p">
              <eClassifiers xsi:type="ecore:EClass"/>
            </ecore:EPackage>"#,
        )
        .await;
        assert!(matches!(result, Err(XmiError::MissingAttribute { .. })));
        assert_eq!(resource.count().await, 0);
    }

    #[tokio::test]
    async fn bom_is_accepted() {
        let resource = Resource::new("mem://bom");
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend_from_slice(br#"<a:Thing xmlns:a="urn:a" n="1"/>"#);
        assert_eq!(parse_bytes(&resource, &bytes).await.unwrap().objects, 1);
    }

    #[tokio::test]
    async fn schema_elements_use_ecore_classes_and_name_fragments() {
        let (resource, report) = parse(
            r##"<?xml version="1.0" encoding="UTF-8"?>
            <ecore:EPackage xmi:version="2.0" xmlns:xmi="http://www.omg.org/XMI"
                xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                xmlns:ecore="http://www.eclipse.org/emf/2002/Ecore"
                name="people" nsURI="http://example.org/people" nsPrefix="people">
              <eClassifiers xsi:type="ecore:EClass" name="Named" abstract="true">
                <eStructuralFeatures xsi:type="ecore:EAttribute" name="name"/>
              </eClassifiers>
              <eClassifiers xsi:type="ecore:EClass" name="Person" eSuperTypes="#//Named">
                <eStructuralFeatures xsi:type="ecore:EReference" name="friends" upperBound="-1"
                    eType="#//Person" eOpposite="#//Person/friends"/>
              </eClassifiers>
              <eClassifiers xsi:type="ecore:EEnum" name="Kind">
                <eLiterals name="A"/>
                <eLiterals name="B" value="1"/>
              </eClassifiers>
            </ecore:EPackage>"##,
        )
        .await;
        let report = report.unwrap();
        assert_eq!(report.unresolved, 0);
        let package = &resource.get_roots().await[0];
        assert_eq!(package.class().name, "EPackage");
        let classifiers = package.get("eClassifiers").unwrap().references();
        assert_eq!(classifiers.len(), 3);

        let named = classifiers[0];
        let person = resource.resolve(classifiers[1]).await.unwrap();
        assert_eq!(person.get("eSuperTypes"), Some(&Value::ReferenceList(vec![named])));
        let friends = person.get("eStructuralFeatures").unwrap().references()[0];
        assert_eq!(
            resource.get_feature(friends, "eType").await,
            Some(Value::Reference(person.id()))
        );
        assert_eq!(
            resource.get_feature(friends, "eOpposite").await,
            Some(Value::Reference(friends))
        );
        assert_eq!(
            resource.get_feature(friends, "upperBound").await,
            Some(Value::Int(-1))
        );
        let kind = resource.resolve(classifiers[2]).await.unwrap();
        assert_eq!(kind.class().name, "EEnum");
        assert_eq!(kind.get("eLiterals").unwrap().references().len(), 2);
    }

    #[tokio::test]
    async fn states_advance_to_done() {
        let resource = Resource::new("mem://s");
        let mut parser = XmiParser::new(&resource);
        assert_eq!(parser.state(), ParseState::Init);
        parser.run(r#"<a:T xmlns:a="urn:a"/>"#).await.unwrap();
        assert_eq!(parser.state(), ParseState::Done);

        let again = parser.run(r#"<a:T xmlns:a="urn:a"/>"#).await.unwrap();
        assert_eq!(again.objects, 1);
        assert_eq!(parser.state(), ParseState::Done);
        assert_eq!(resource.count().await, 2);
    }

    #[tokio::test]
    async fn failed_run_returns_to_init() {
        let resource = Resource::new("mem://s");
        let mut parser = XmiParser::new(&resource);
        let failing = r#"<ecore:EPackage xmlns:ecore="http://www.eclipse.org/emf/2002/Ecore" name="p"/>"#;
        assert!(parser.run(failing).await.is_err());
        assert_eq!(parser.state(), ParseState::Init);
        assert_eq!(resource.count().await, 0);
    }
}
