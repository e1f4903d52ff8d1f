//! Object graph to XMI.

use std::collections::{BTreeMap, HashMap};

use ecograph_store::{ObjectGraph, Resource, ResourceSnapshot};
use ecograph_types::{DynamicObject, EClass, EReference, EntityId, Feature};
use tracing::debug;

use crate::config::XmiConfig;
use crate::ecore;
use crate::error::XmiResult;
use crate::xml::{self, Element};
use crate::{XMI_NS_URI, XSI_NS_URI};

/// A reference target living in another document.
struct External {
    /// `document#fragment`.
    uri: String,
    /// `prefix:Class` of the target, used to qualify attribute-form links.
    qualified_class: String,
}

/// Serialise `resource` to an XMI document.
///
/// One root is written as the document element; zero or several are
/// wrapped in `xmi:XMI`. Targets in other resources of the owning set are
/// written as `document#fragment`.
pub async fn serialize(resource: &Resource, config: &XmiConfig) -> XmiResult<String> {
    let snapshot = resource.snapshot().await;
    let external = external_targets(resource, &snapshot).await;
    let document = XmiWriter::new(&snapshot, &external, config).document();
    let text = xml::write(&document, config.indent)?;
    debug!(
        uri = %resource.uri(),
        objects = snapshot.len(),
        external = external.len(),
        "serialised resource"
    );
    Ok(text)
}

async fn external_targets(
    resource: &Resource,
    snapshot: &ResourceSnapshot,
) -> HashMap<EntityId, External> {
    let mut external = HashMap::new();
    let Some(set) = resource.resource_set() else {
        return external;
    };
    let mut wanted = Vec::new();
    for object in snapshot.objects() {
        for reference in object.class().references() {
            if reference.containment {
                continue;
            }
            if let Some(value) = object.storage().get(reference.id) {
                wanted.extend(
                    value
                        .references()
                        .into_iter()
                        .filter(|id| !snapshot.contains(*id)),
                );
            }
        }
    }
    let mut owners: HashMap<String, (ResourceSnapshot, HashMap<EntityId, EntityId>)> =
        HashMap::new();
    for id in wanted {
        if external.contains_key(&id) {
            continue;
        }
        let Some((object, owner)) = set.resolve(id).await else {
            continue;
        };
        if !owners.contains_key(owner.uri()) {
            let snapshot = owner.snapshot().await;
            let containers = containers_of(&snapshot);
            owners.insert(owner.uri().to_string(), (snapshot, containers));
        }
        let Some((snapshot, containers)) = owners.get(owner.uri()) else {
            continue;
        };
        let fragment = if ecore::is_meta(object.class()) {
            name_path(snapshot, containers, id)
        } else {
            None
        };
        let Some(fragment) = fragment.or_else(|| snapshot.fragment_of(id)) else {
            continue;
        };
        let uri = format!("{}#{fragment}", owner.uri());
        let qualified_class = format!(
            "{}:{}",
            object
                .class()
                .ns_prefix
                .clone()
                .unwrap_or_else(|| object.class().name.to_lowercase()),
            object.class().name
        );
        external.insert(
            id,
            External {
                uri,
                qualified_class,
            },
        );
    }
    external
}

struct XmiWriter<'a> {
    snapshot: &'a ResourceSnapshot,
    external: &'a HashMap<EntityId, External>,
    config: &'a XmiConfig,
    containers: HashMap<EntityId, EntityId>,
    /// prefix -> namespace URI, for the declarations on the document element.
    namespaces: BTreeMap<String, String>,
    uses_xsi: bool,
}

impl<'a> XmiWriter<'a> {
    fn new(
        snapshot: &'a ResourceSnapshot,
        external: &'a HashMap<EntityId, External>,
        config: &'a XmiConfig,
    ) -> Self {
        Self {
            snapshot,
            external,
            config,
            containers: containers_of(snapshot),
            namespaces: BTreeMap::new(),
            uses_xsi: false,
        }
    }

    fn document(mut self) -> Element {
        let snapshot = self.snapshot;
        let mut elements: Vec<Element> = snapshot
            .roots()
            .map(|root| {
                let tag = self.qualified(root.class());
                self.object_element(root, tag, None)
            })
            .collect();

        let mut declarations = vec![
            ("xmi:version".to_string(), self.config.xmi_version.clone()),
            ("xmlns:xmi".to_string(), XMI_NS_URI.to_string()),
        ];
        if self.uses_xsi {
            declarations.push(("xmlns:xsi".to_string(), XSI_NS_URI.to_string()));
        }
        for (prefix, ns_uri) in &self.namespaces {
            declarations.push((format!("xmlns:{prefix}"), ns_uri.clone()));
        }

        let mut root = match elements.len() {
            1 => elements.remove(0),
            _ => {
                let mut wrapper = Element::new("xmi:XMI");
                wrapper.children = elements;
                wrapper
            }
        };
        declarations.append(&mut root.attributes);
        root.attributes = declarations;
        root
    }

    /// `prefix:Class`, declaring the namespace on first use. Classes without
    /// a namespace get one derived from their lower-cased name.
    fn qualified(&mut self, class: &EClass) -> String {
        let fallback = class.name.to_lowercase();
        let ns_uri = class
            .ns_uri
            .clone()
            .unwrap_or_else(|| format!("http://www.example.org/{fallback}"));
        let wanted = class.ns_prefix.clone().unwrap_or(fallback);

        let existing = self
            .namespaces
            .iter()
            .find(|(_, uri)| **uri == ns_uri)
            .map(|(prefix, _)| prefix.clone());
        let prefix = match existing {
            Some(prefix) => prefix,
            None => {
                let mut prefix = wanted.clone();
                let mut n = 1;
                while self.namespaces.contains_key(&prefix) {
                    prefix = format!("{wanted}{n}");
                    n += 1;
                }
                self.namespaces.insert(prefix.clone(), ns_uri);
                prefix
            }
        };
        format!("{prefix}:{}", class.name)
    }

    fn object_element(
        &mut self,
        object: &DynamicObject,
        tag: String,
        slot: Option<&EReference>,
    ) -> Element {
        let snapshot = self.snapshot;
        let class = object.class();
        let meta = ecore::is_meta(class);
        let mut element = Element::new(tag);

        if let Some(slot) = slot {
            if !(meta && class.name == slot.target_type) {
                let declared = self.qualified(class);
                element.set_attr("xsi:type", declared);
                self.uses_xsi = true;
            }
        }
        if self.config.emit_xmi_ids {
            if let Some(xmi_id) = snapshot.xmi_id(object.id()) {
                element.set_attr("xmi:id", xmi_id);
            }
        }

        let mut attributes = Vec::new();
        for feature in class.features() {
            let Some(value) = object.storage().get(feature.id()) else {
                continue;
            };
            match feature {
                Feature::Attribute(attribute) => {
                    attributes.push((attribute.name.clone(), value.to_lexical()));
                }
                Feature::Reference(reference) if reference.containment => {
                    for child in value.references() {
                        if let Some(child) = snapshot.get(child) {
                            let child = self.object_element(child, reference.name.clone(), Some(reference));
                            element.push(child);
                        }
                    }
                }
                Feature::Reference(reference) => {
                    let targets: Vec<EntityId> = value
                        .references()
                        .into_iter()
                        .filter(|target| !self.held_by_container(reference, *target))
                        .collect();
                    if targets.is_empty() {
                        continue;
                    }
                    if meta {
                        let links: Vec<String> =
                            targets.iter().map(|t| self.attribute_link(*t)).collect();
                        attributes.push((reference.name.clone(), links.join(" ")));
                    } else {
                        for target in targets {
                            element.push(
                                Element::new(reference.name.clone())
                                    .with_attr("href", self.href(target)),
                            );
                        }
                    }
                }
            }
        }
        attributes.sort_by(|a, b| a.0.cmp(&b.0));
        element.attributes.extend(attributes);
        element
    }

    /// The container side of a containment pair is implied by nesting.
    fn held_by_container(&self, reference: &EReference, target: EntityId) -> bool {
        let Some(opposite) = reference.opposite else {
            return false;
        };
        self.snapshot
            .get(target)
            .and_then(|t| t.class().reference_by_id(opposite))
            .is_some_and(|r| r.containment)
    }

    fn href(&self, target: EntityId) -> String {
        if let Some(fragment) = self.snapshot.fragment_of(target) {
            return format!("#{fragment}");
        }
        match self.external.get(&target) {
            Some(external) => external.uri.clone(),
            None => target.to_string(),
        }
    }

    /// Ecore style: name paths within the document, `prefix:Class uri`
    /// across documents.
    fn attribute_link(&self, target: EntityId) -> String {
        if self.snapshot.contains(target) {
            return match name_path(self.snapshot, &self.containers, target) {
                Some(path) => format!("#{path}"),
                None => self.href(target),
            };
        }
        match self.external.get(&target) {
            Some(external) => format!("{} {}", external.qualified_class, external.uri),
            None => target.to_string(),
        }
    }
}

/// child -> container for every containment in `snapshot`.
fn containers_of(snapshot: &ResourceSnapshot) -> HashMap<EntityId, EntityId> {
    let mut containers = HashMap::new();
    for object in snapshot.objects() {
        for child in object.contained_ids() {
            containers.insert(child, object.id());
        }
    }
    containers
}

/// `//A/b` from the names along the containment chain, if all are named.
fn name_path(
    snapshot: &ResourceSnapshot,
    containers: &HashMap<EntityId, EntityId>,
    target: EntityId,
) -> Option<String> {
    let mut names = Vec::new();
    let mut current = target;
    while let Some(parent) = containers.get(&current) {
        names.push(snapshot.get(current)?.name()?.to_string());
        current = *parent;
    }
    if names.is_empty() {
        return None;
    }
    let index = snapshot.root_ids().iter().position(|r| *r == current)?;
    names.reverse();
    let base = if index == 0 {
        "/".to_string()
    } else {
        format!("/{index}")
    };
    Some(format!("{base}/{}", names.join("/")))
}
