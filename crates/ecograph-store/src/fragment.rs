//! Fragment paths: addressing an object inside one document.
//!
//! Grammar, after an optional leading `#`:
//!
//! - `""` or `"/"`: the first root
//! - `"/<n>"`: root `n`
//! - `"/<n>/<hop>/<hop>..."` with `<n>` empty meaning root 0 (so `//@a.0/@b.1`)
//! - a hop is `@feature.index` or `feature.index`; a single-valued reference
//!   may omit `.index`; a bare word that is not a reference of the current
//!   object is matched against the `name` attribute of its contained objects
//! - anything not starting with `/` is a bare identifier
//!
//! Every miss resolves to `None`.

use std::collections::HashSet;

use ecograph_types::{DynamicObject, EntityId, Value};

/// A read-only view of one document's objects.
pub trait ObjectGraph {
    fn object(&self, id: EntityId) -> Option<&DynamicObject>;

    fn root_ids(&self) -> &[EntityId];

    /// Resolve a bare identifier. The default accepts the entity id form.
    fn lookup_id(&self, text: &str) -> Option<EntityId> {
        let id = EntityId::parse(text).ok()?;
        self.object(id).map(|_| id)
    }
}

/// Resolve a fragment path to an object id present in `graph`.
pub fn resolve_path<G: ObjectGraph + ?Sized>(graph: &G, path: &str) -> Option<EntityId> {
    let path = path.strip_prefix('#').unwrap_or(path);
    if path.is_empty() || path == "/" {
        return graph.root_ids().first().copied();
    }
    let Some(rest) = path.strip_prefix('/') else {
        return graph.lookup_id(path);
    };

    let mut segments = rest.split('/');
    let first = segments.next().unwrap_or_default();
    let mut current = if first.is_empty() {
        *graph.root_ids().first()?
    } else if let Ok(index) = first.parse::<usize>() {
        *graph.root_ids().get(index)?
    } else {
        graph
            .root_ids()
            .iter()
            .copied()
            .find(|id| graph.object(*id).and_then(DynamicObject::name) == Some(first))?
    };

    for segment in segments.filter(|s| !s.is_empty()) {
        let object = graph.object(current)?;
        current = hop(graph, object, segment)?;
    }
    graph.object(current).map(|_| current)
}

fn hop<G: ObjectGraph + ?Sized>(graph: &G, object: &DynamicObject, segment: &str) -> Option<EntityId> {
    let explicit = segment.starts_with('@');
    let segment = segment.trim_start_matches('@');

    if let Some((feature, index)) = segment.rsplit_once('.') {
        if let Ok(index) = index.parse::<usize>() {
            return match object.get(feature)? {
                Value::ReferenceList(ids) => ids.get(index).copied(),
                Value::Reference(id) if index == 0 => Some(*id),
                _ => None,
            };
        }
    }

    if let Some(value) = object.get(segment) {
        return value.as_reference();
    }
    if explicit || object.feature(segment).is_some() {
        return None;
    }
    object
        .contained_ids()
        .into_iter()
        .find(|id| graph.object(*id).and_then(DynamicObject::name) == Some(segment))
}

/// Compute the fragment path of `target` by depth-first search from every
/// root, following containment references in declaration order.
///
/// Root 0 is `/`, root `n` is `/n`; hops are `@feature.index`, or `@feature`
/// for a single-valued containment.
pub fn path_to<G: ObjectGraph + ?Sized>(graph: &G, target: EntityId) -> Option<String> {
    let mut visited = HashSet::new();
    for (index, root) in graph.root_ids().iter().enumerate() {
        let prefix = if index == 0 {
            "/".to_string()
        } else {
            format!("/{index}")
        };
        if *root == target {
            return Some(prefix);
        }
        let mut hops = Vec::new();
        if search(graph, *root, target, &mut hops, &mut visited) {
            return Some(format!("{prefix}/{}", hops.join("/")));
        }
    }
    None
}

fn search<G: ObjectGraph + ?Sized>(
    graph: &G,
    current: EntityId,
    target: EntityId,
    hops: &mut Vec<String>,
    visited: &mut HashSet<EntityId>,
) -> bool {
    if !visited.insert(current) {
        return false;
    }
    let Some(object) = graph.object(current) else {
        return false;
    };
    for reference in object.class().containments() {
        let Some(value) = object.storage().get(reference.id) else {
            continue;
        };
        let children: Vec<(String, EntityId)> = match value {
            Value::Reference(id) => vec![(format!("@{}", reference.name), *id)],
            Value::ReferenceList(ids) => ids
                .iter()
                .enumerate()
                .map(|(i, id)| (format!("@{}.{i}", reference.name), *id))
                .collect(),
            _ => continue,
        };
        for (segment, child) in children {
            hops.push(segment);
            if child == target || search(graph, child, target, hops, visited) {
                return true;
            }
            hops.pop();
        }
    }
    false
}
