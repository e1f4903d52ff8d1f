//! One document's object graph.
//!
//! A [`Resource`] owns its objects by identity and keeps three invariants as
//! features change:
//!
//! 1. **Roots**: the root list is exactly the objects not held by a
//!    containment reference of another object in this resource, in
//!    first-added order.
//! 2. **Single container**: an object sits in at most one containment slot.
//!    Containing it somewhere else detaches it from the old slot.
//! 3. **Opposites**: setting one side of a bidirectional reference updates
//!    the other side. Targets living in another resource are updated through
//!    the owning [`ResourceSet`], after this resource's lock is released.
//!    Feature changes made through one resource are forwarded in the order
//!    they were applied.
//!
//! All operations are async and serialised per resource by a
//! `tokio::sync::Mutex`. Queries return clones.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use ecograph_types::{DynamicObject, EntityId, Feature, FeatureId, Value};
use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::fragment::{self, ObjectGraph};
use crate::resource_set::ResourceSet;

/// An opposite-side change still to be applied to `target`.
///
/// `feature` is the opposite reference on the target's class; `source` is
/// the id to add to or remove from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OppositeUpdate {
    pub target: EntityId,
    pub feature: FeatureId,
    pub source: EntityId,
    pub add: bool,
}

/// Identity-addressed storage for one document.
pub struct Resource {
    uri: String,
    resource_set: Weak<ResourceSet>,
    state: Mutex<ResourceState>,
    /// Held from a feature change until its foreign opposite updates are
    /// delivered. Never taken by [`apply_opposite`](Self::apply_opposite).
    forwarding: Mutex<()>,
}

impl Resource {
    /// Create a standalone resource that belongs to no resource set.
    pub fn new(uri: impl Into<String>) -> Arc<Self> {
        Self::owned(uri.into(), Weak::new())
    }

    pub(crate) fn owned(uri: String, resource_set: Weak<ResourceSet>) -> Arc<Self> {
        Arc::new(Self {
            uri,
            resource_set,
            state: Mutex::new(ResourceState::default()),
            forwarding: Mutex::new(()),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The owning resource set, if any and still alive.
    pub fn resource_set(&self) -> Option<Arc<ResourceSet>> {
        self.resource_set.upgrade()
    }

    // ---- Membership ----

    /// Insert an object. Returns `true` if its id was new.
    ///
    /// Re-adding a known id replaces its stored values and recomputes
    /// containment and root membership from the new values.
    pub async fn add(&self, object: DynamicObject) -> bool {
        self.state.lock().await.add(object)
    }

    /// Insert many objects under one lock. Returns how many ids were new.
    pub async fn add_all(&self, objects: Vec<DynamicObject>) -> usize {
        let mut state = self.state.lock().await;
        let mut added = 0;
        for object in objects {
            if state.objects.insert(object.id(), object).is_none() {
                added += 1;
            }
        }
        state.rebuild_containment();
        added
    }

    /// Remove one object. Contained descendants are not removed: they stay
    /// addressable by id and become roots.
    pub async fn remove(&self, id: EntityId) -> bool {
        self.state.lock().await.remove(id)
    }

    /// Remove an object with all of its containment descendants. Returns the
    /// number of objects removed.
    pub async fn remove_tree(&self, id: EntityId) -> usize {
        self.state.lock().await.remove_tree(id)
    }

    /// Drop every object and `xmi:id`.
    pub async fn clear(&self) {
        *self.state.lock().await = ResourceState::default();
    }

    // ---- Queries ----

    /// A copy of the object with `id`.
    pub async fn resolve(&self, id: EntityId) -> Option<DynamicObject> {
        self.state.lock().await.objects.get(&id).cloned()
    }

    /// Copies of all objects, in insertion order.
    pub async fn get_all(&self) -> Vec<DynamicObject> {
        self.state.lock().await.objects.values().cloned().collect()
    }

    /// Copies of the root objects, in first-added order.
    pub async fn get_roots(&self) -> Vec<DynamicObject> {
        let state = self.state.lock().await;
        state
            .roots
            .iter()
            .filter_map(|id| state.objects.get(id).cloned())
            .collect()
    }

    /// Ids of the root objects.
    pub async fn root_ids(&self) -> Vec<EntityId> {
        self.state.lock().await.roots.clone()
    }

    /// Number of objects held.
    pub async fn count(&self) -> usize {
        self.state.lock().await.objects.len()
    }

    /// Whether `id` is held here.
    pub async fn contains(&self, id: EntityId) -> bool {
        self.state.lock().await.objects.contains_key(&id)
    }

    /// The object whose containment reference holds `id`, if it is in this resource.
    pub async fn container_of(&self, id: EntityId) -> Option<EntityId> {
        let state = self.state.lock().await;
        state
            .containers
            .get(&id)
            .copied()
            .filter(|c| state.objects.contains_key(c))
    }

    // ---- Features ----

    /// Assign a feature by name, maintaining containment and opposites.
    ///
    /// Returns `false` if the object or the feature does not exist.
    pub async fn set_feature(&self, id: EntityId, feature: &str, value: Value) -> bool {
        self.change_feature(id, feature, Some(value)).await
    }

    /// Unset a feature by name. Opposite sides are cleaned up and formerly
    /// contained objects become roots.
    pub async fn unset_feature(&self, id: EntityId, feature: &str) -> bool {
        self.change_feature(id, feature, None).await
    }

    /// The value of a feature by name, if the object exists and it is set.
    pub async fn get_feature(&self, id: EntityId, feature: &str) -> Option<Value> {
        self.state.lock().await.objects.get(&id)?.get(feature).cloned()
    }

    pub async fn is_set(&self, id: EntityId, feature: &str) -> bool {
        self.state
            .lock()
            .await
            .objects
            .get(&id)
            .is_some_and(|o| o.is_set(feature))
    }

    async fn change_feature(&self, id: EntityId, feature: &str, value: Option<Value>) -> bool {
        let _order = self.forwarding.lock().await;
        let remote = {
            let mut state = self.state.lock().await;
            match state.change_feature(id, feature, value) {
                Some(remote) => remote,
                None => return false,
            }
        };
        if !remote.is_empty() {
            self.forward(remote).await;
        }
        true
    }

    /// Hand opposite updates for non-local targets to the resource set.
    /// Called with this resource's lock released.
    async fn forward(&self, updates: Vec<OppositeUpdate>) {
        let Some(set) = self.resource_set() else {
            debug!(
                uri = %self.uri,
                count = updates.len(),
                "standalone resource: dropping opposite updates for foreign targets"
            );
            return;
        };
        for update in updates {
            set.update_opposite(update.target, update.feature, update.source, update.add)
                .await;
        }
    }

    /// Apply an update whose target lives here. Returns follow-up updates
    /// for targets that do not.
    pub(crate) async fn apply_opposite(&self, update: OppositeUpdate) -> Vec<OppositeUpdate> {
        self.state.lock().await.apply_local_or_defer(update)
    }

    // ---- Paths and ids ----

    /// A copy of the object at a fragment path such as `/0/@members.1`.
    pub async fn resolve_by_path(&self, path: &str) -> Option<DynamicObject> {
        let state = self.state.lock().await;
        let id = fragment::resolve_path(&*state, path)?;
        state.objects.get(&id).cloned()
    }

    pub async fn resolve_id_by_path(&self, path: &str) -> Option<EntityId> {
        fragment::resolve_path(&*self.state.lock().await, path)
    }

    /// The fragment path of an object, by containment from the roots.
    pub async fn fragment_of(&self, id: EntityId) -> Option<String> {
        fragment::path_to(&*self.state.lock().await, id)
    }

    /// Record the document-level `xmi:id` of an object.
    pub async fn set_xmi_id(&self, id: EntityId, xmi_id: String) {
        let mut state = self.state.lock().await;
        if let Some(old) = state.xmi_ids.insert(id, xmi_id.clone()) {
            state.by_xmi_id.remove(&old);
        }
        state.by_xmi_id.insert(xmi_id, id);
    }

    pub async fn xmi_id(&self, id: EntityId) -> Option<String> {
        self.state.lock().await.xmi_ids.get(&id).cloned()
    }

    /// The object recorded under a document-level `xmi:id`.
    pub async fn id_for_xmi_id(&self, xmi_id: &str) -> Option<EntityId> {
        self.state.lock().await.by_xmi_id.get(xmi_id).copied()
    }

    /// A consistent copy of the whole document.
    pub async fn snapshot(&self) -> ResourceSnapshot {
        let state = self.state.lock().await;
        ResourceSnapshot {
            uri: self.uri.clone(),
            objects: state.objects.clone(),
            roots: state.roots.clone(),
            xmi_ids: state.xmi_ids.clone(),
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("uri", &self.uri)
            .finish_non_exhaustive()
    }
}

/// A point-in-time copy of a resource, for serialisers and read-only walks.
#[derive(Clone, Debug)]
pub struct ResourceSnapshot {
    uri: String,
    objects: IndexMap<EntityId, DynamicObject>,
    roots: Vec<EntityId>,
    xmi_ids: HashMap<EntityId, String>,
}

impl ResourceSnapshot {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn get(&self, id: EntityId) -> Option<&DynamicObject> {
        self.objects.get(&id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &DynamicObject> {
        self.objects.values()
    }

    pub fn roots(&self) -> impl Iterator<Item = &DynamicObject> {
        self.roots.iter().filter_map(|id| self.objects.get(id))
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn xmi_id(&self, id: EntityId) -> Option<&str> {
        self.xmi_ids.get(&id).map(String::as_str)
    }

    pub fn fragment_of(&self, id: EntityId) -> Option<String> {
        fragment::path_to(self, id)
    }
}

impl ObjectGraph for ResourceSnapshot {
    fn object(&self, id: EntityId) -> Option<&DynamicObject> {
        self.objects.get(&id)
    }

    fn root_ids(&self) -> &[EntityId] {
        &self.roots
    }
}

#[derive(Default)]
struct ResourceState {
    objects: IndexMap<EntityId, DynamicObject>,
    /// child -> container, for every containment slot held by an object here.
    containers: HashMap<EntityId, EntityId>,
    roots: Vec<EntityId>,
    xmi_ids: HashMap<EntityId, String>,
    by_xmi_id: HashMap<String, EntityId>,
}

impl ObjectGraph for ResourceState {
    fn object(&self, id: EntityId) -> Option<&DynamicObject> {
        self.objects.get(&id)
    }

    fn root_ids(&self) -> &[EntityId] {
        &self.roots
    }

    fn lookup_id(&self, text: &str) -> Option<EntityId> {
        if let Some(id) = self.by_xmi_id.get(text) {
            return Some(*id);
        }
        let id = EntityId::parse(text).ok()?;
        self.objects.contains_key(&id).then_some(id)
    }
}

impl ResourceState {
    fn add(&mut self, object: DynamicObject) -> bool {
        let is_new = self.objects.insert(object.id(), object).is_none();
        self.rebuild_containment();
        is_new
    }

    fn remove(&mut self, id: EntityId) -> bool {
        if self.objects.shift_remove(&id).is_none() {
            return false;
        }
        if let Some(xmi_id) = self.xmi_ids.remove(&id) {
            self.by_xmi_id.remove(&xmi_id);
        }
        self.rebuild_containment();
        true
    }

    fn remove_tree(&mut self, id: EntityId) -> usize {
        if !self.objects.contains_key(&id) {
            return 0;
        }
        let mut doomed = vec![id];
        let mut cursor = 0;
        while cursor < doomed.len() {
            if let Some(object) = self.objects.get(&doomed[cursor]) {
                for child in object.contained_ids() {
                    if self.objects.contains_key(&child) && !doomed.contains(&child) {
                        doomed.push(child);
                    }
                }
            }
            cursor += 1;
        }
        for victim in &doomed {
            self.objects.shift_remove(victim);
            if let Some(xmi_id) = self.xmi_ids.remove(victim) {
                self.by_xmi_id.remove(&xmi_id);
            }
        }
        self.rebuild_containment();
        doomed.len()
    }

    fn rebuild_containment(&mut self) {
        self.containers.clear();
        for (id, object) in &self.objects {
            for child in object.contained_ids() {
                self.containers.insert(child, *id);
            }
        }
        self.refresh_roots();
    }

    fn refresh_roots(&mut self) {
        let objects = &self.objects;
        let containers = &self.containers;
        self.roots = objects
            .keys()
            .filter(|id| {
                !containers
                    .get(id)
                    .is_some_and(|c| objects.contains_key(c))
            })
            .copied()
            .collect();
    }

    /// Set (`Some`) or unset (`None`) a feature. Returns the opposite updates
    /// that target objects outside this resource, or `None` on a miss.
    fn change_feature(
        &mut self,
        id: EntityId,
        name: &str,
        value: Option<Value>,
    ) -> Option<Vec<OppositeUpdate>> {
        let object = self.objects.get(&id)?;
        let class = Arc::clone(object.class());
        let reference = match class.feature(name)? {
            Feature::Attribute(attr) => {
                let storage = self.objects.get_mut(&id)?.storage_mut();
                match value {
                    Some(value) => storage.set(attr.id, value),
                    None => storage.unset(attr.id),
                };
                return Some(Vec::new());
            }
            Feature::Reference(reference) => reference,
        };

        let old_ids = object
            .storage()
            .get(reference.id)
            .map(Value::references)
            .unwrap_or_default();
        let new_ids = value.as_ref().map(Value::references).unwrap_or_default();
        let removed: Vec<EntityId> = old_ids
            .iter()
            .filter(|o| !new_ids.contains(o))
            .copied()
            .collect();
        let mut added: Vec<EntityId> = Vec::new();
        for n in &new_ids {
            if !old_ids.contains(n) && !added.contains(n) {
                added.push(*n);
            }
        }

        if reference.containment {
            for child in &added {
                if let Some(&previous) = self.containers.get(child) {
                    self.detach(previous, *child);
                }
            }
        }

        {
            let storage = self.objects.get_mut(&id)?.storage_mut();
            match value {
                Some(value) => storage.set(reference.id, value),
                None => storage.unset(reference.id),
            };
        }

        if reference.containment {
            for child in &removed {
                if self.containers.get(child) == Some(&id) {
                    self.containers.remove(child);
                }
            }
            for child in &added {
                self.containers.insert(*child, id);
            }
        }

        let mut remote = Vec::new();
        if let Some(opposite) = reference.opposite {
            let updates = removed
                .iter()
                .map(|t| (*t, false))
                .chain(added.iter().map(|t| (*t, true)));
            for (target, add) in updates {
                remote.extend(self.apply_local_or_defer(OppositeUpdate {
                    target,
                    feature: opposite,
                    source: id,
                    add,
                }));
            }
        }

        self.refresh_roots();
        Some(remote)
    }

    /// Apply an update and its follow-ups for every target present here.
    /// Returns the ones whose targets are elsewhere.
    fn apply_local_or_defer(&mut self, update: OppositeUpdate) -> Vec<OppositeUpdate> {
        let mut queue = vec![update];
        let mut remote = Vec::new();
        while let Some(next) = queue.pop() {
            if self.objects.contains_key(&next.target) {
                queue.extend(self.apply_opposite(next));
            } else {
                remote.push(next);
            }
        }
        self.refresh_roots();
        remote
    }

    /// Add `source` to, or remove it from, the `feature` slot of a local
    /// target. Replacing a single-valued opposite yields a follow-up that
    /// removes the target from the previous holder's forward reference.
    fn apply_opposite(&mut self, update: OppositeUpdate) -> Vec<OppositeUpdate> {
        let Some(target) = self.objects.get_mut(&update.target) else {
            return Vec::new();
        };
        let class = Arc::clone(target.class());
        let Some(reference) = class.reference_by_id(update.feature) else {
            debug!(
                class = %class.name,
                feature = %update.feature,
                "opposite feature not declared on target class"
            );
            return Vec::new();
        };
        let storage = target.storage_mut();
        let mut follow_up = Vec::new();

        if reference.many {
            let mut ids = storage
                .get(reference.id)
                .map(Value::references)
                .unwrap_or_default();
            if update.add {
                if !ids.contains(&update.source) {
                    ids.push(update.source);
                }
            } else {
                ids.retain(|id| *id != update.source);
            }
            storage.set(reference.id, Value::ReferenceList(ids));
        } else if update.add {
            let previous = storage
                .set(reference.id, Value::Reference(update.source))
                .and_then(|v| v.as_reference());
            if let (Some(previous), Some(back)) = (previous, reference.opposite) {
                if previous != update.source {
                    follow_up.push(OppositeUpdate {
                        target: previous,
                        feature: back,
                        source: update.target,
                        add: false,
                    });
                }
            }
        } else if storage.get(reference.id).and_then(Value::as_reference) == Some(update.source) {
            storage.unset(reference.id);
        }

        if reference.containment {
            if update.add {
                if let Some(&previous) = self.containers.get(&update.source) {
                    if previous != update.target {
                        self.detach(previous, update.source);
                    }
                }
                self.containers.insert(update.source, update.target);
            } else if self.containers.get(&update.source) == Some(&update.target) {
                self.containers.remove(&update.source);
            }
        }
        follow_up
    }

    /// Take `child` out of whichever containment slot of `container` holds it.
    fn detach(&mut self, container: EntityId, child: EntityId) {
        if let Some(object) = self.objects.get_mut(&container) {
            let class = Arc::clone(object.class());
            let storage = object.storage_mut();
            for reference in class.containments() {
                let holds_single = matches!(
                    storage.get(reference.id),
                    Some(Value::Reference(id)) if *id == child
                );
                if holds_single {
                    storage.unset(reference.id);
                } else if let Some(Value::ReferenceList(ids)) = storage.get_mut(reference.id) {
                    ids.retain(|id| *id != child);
                }
            }
        }
        if self.containers.get(&child) == Some(&container) {
            self.containers.remove(&child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecograph_types::{DataType, EAttribute, EClass, EReference};

    struct Schema {
        team: Arc<EClass>,
        member: Arc<EClass>,
        person: Arc<EClass>,
    }

    /// Team.members <-> Member.team (containment, many / single)
    /// Person.spouse <-> Person.spouse (single / single)
    /// Person.friends <-> Person.friendOf (many / many)
    fn schema() -> Schema {
        let members = FeatureId::new();
        let team_ref = FeatureId::new();
        let team = Arc::new(
            EClass::builder("Team")
                .attribute(EAttribute::new("name", DataType::String))
                .reference(
                    EReference::new("members", "Member")
                        .with_id(members)
                        .containment()
                        .many()
                        .with_opposite(team_ref),
                )
                .reference(EReference::new("bench", "Member").containment().many())
                .reference(EReference::new("leader", "Member"))
                .build(),
        );
        let member = Arc::new(
            EClass::builder("Member")
                .attribute(EAttribute::new("name", DataType::String))
                .reference(EReference::new("team", "Team").with_id(team_ref).with_opposite(members))
                .build(),
        );
        let spouse = FeatureId::new();
        let friends = FeatureId::new();
        let friend_of = FeatureId::new();
        let person = Arc::new(
            EClass::builder("Person")
                .attribute(EAttribute::new("name", DataType::String))
                .reference(EReference::new("spouse", "Person").with_id(spouse).with_opposite(spouse))
                .reference(
                    EReference::new("friends", "Person")
                        .with_id(friends)
                        .many()
                        .with_opposite(friend_of),
                )
                .reference(
                    EReference::new("friendOf", "Person")
                        .with_id(friend_of)
                        .many()
                        .with_opposite(friends),
                )
                .build(),
        );
        Schema {
            team,
            member,
            person,
        }
    }

    fn named(class: &Arc<EClass>, name: &str) -> DynamicObject {
        let mut o = DynamicObject::new(Arc::clone(class));
        o.set("name", name);
        o
    }

    #[tokio::test]
    async fn add_and_resolve() {
        let s = schema();
        let r = Resource::new("mem://a");
        let t = named(&s.team, "core");
        let id = t.id();
        assert!(r.add(t).await);
        assert_eq!(r.count().await, 1);
        assert!(r.contains(id).await);
        assert_eq!(r.resolve(id).await.unwrap().id(), id);
        assert_eq!(r.root_ids().await, vec![id]);
    }

    #[tokio::test]
    async fn re_add_returns_false_and_overwrites() {
        let s = schema();
        let r = Resource::new("mem://a");
        let mut t = named(&s.team, "core");
        let id = t.id();
        r.add(t.clone()).await;
        t.set("name", "renamed");
        assert!(!r.add(t).await);
        assert_eq!(r.count().await, 1);
        assert_eq!(
            r.get_feature(id, "name").await,
            Some(Value::String("renamed".into()))
        );
    }

    #[tokio::test]
    async fn re_add_recomputes_root_membership() {
        let s = schema();
        let r = Resource::new("mem://a");
        let m = named(&s.member, "ann");
        let mut t = named(&s.team, "core");
        r.add(m.clone()).await;
        r.add(t.clone()).await;
        assert_eq!(r.root_ids().await.len(), 2);

        t.set("members", vec![m.id()]);
        r.add(t.clone()).await;
        assert_eq!(r.root_ids().await, vec![t.id()]);
    }

    #[tokio::test]
    async fn children_added_before_parent_are_not_roots() {
        let s = schema();
        let r = Resource::new("mem://a");
        let m1 = named(&s.member, "ann");
        let m2 = named(&s.member, "bob");
        let mut t = named(&s.team, "core");
        t.set("members", vec![m1.id(), m2.id()]);
        r.add_all(vec![m1, m2, t.clone()]).await;
        assert_eq!(r.root_ids().await, vec![t.id()]);
    }

    #[tokio::test]
    async fn containment_set_removes_from_roots_and_sets_opposite() {
        let s = schema();
        let r = Resource::new("mem://a");
        let t = named(&s.team, "core");
        let m = named(&s.member, "ann");
        let (tid, mid) = (t.id(), m.id());
        r.add(t).await;
        r.add(m).await;
        assert!(r.set_feature(tid, "members", Value::ReferenceList(vec![mid])).await);
        assert_eq!(r.root_ids().await, vec![tid]);
        assert_eq!(r.get_feature(mid, "team").await, Some(Value::Reference(tid)));
        assert_eq!(r.container_of(mid).await, Some(tid));
    }

    #[tokio::test]
    async fn setting_container_side_updates_containment_list() {
        let s = schema();
        let r = Resource::new("mem://a");
        let t = named(&s.team, "core");
        let m = named(&s.member, "ann");
        let (tid, mid) = (t.id(), m.id());
        r.add(t).await;
        r.add(m).await;
        assert!(r.set_feature(mid, "team", Value::Reference(tid)).await);
        assert_eq!(
            r.get_feature(tid, "members").await,
            Some(Value::ReferenceList(vec![mid]))
        );
        assert_eq!(r.root_ids().await, vec![tid]);
    }

    #[tokio::test]
    async fn unset_containment_restores_root() {
        let s = schema();
        let r = Resource::new("mem://a");
        let t = named(&s.team, "core");
        let m = named(&s.member, "ann");
        let (tid, mid) = (t.id(), m.id());
        r.add(t).await;
        r.add(m).await;
        r.set_feature(tid, "members", Value::ReferenceList(vec![mid])).await;
        assert!(r.unset_feature(tid, "members").await);
        assert_eq!(r.root_ids().await, vec![tid, mid]);
        assert_eq!(r.get_feature(mid, "team").await, None);
    }

    #[tokio::test]
    async fn moving_child_detaches_from_old_slot() {
        let s = schema();
        let r = Resource::new("mem://a");
        let t = named(&s.team, "core");
        let m = named(&s.member, "ann");
        let (tid, mid) = (t.id(), m.id());
        r.add(t).await;
        r.add(m).await;
        r.set_feature(tid, "members", Value::ReferenceList(vec![mid])).await;
        r.set_feature(tid, "bench", Value::ReferenceList(vec![mid])).await;
        assert_eq!(
            r.get_feature(tid, "members").await,
            Some(Value::ReferenceList(vec![]))
        );
        assert_eq!(
            r.get_feature(tid, "bench").await,
            Some(Value::ReferenceList(vec![mid]))
        );
        assert_eq!(r.container_of(mid).await, Some(tid));
    }

    #[tokio::test]
    async fn single_opposite_symmetry() {
        let s = schema();
        let r = Resource::new("mem://a");
        let a = named(&s.person, "a");
        let b = named(&s.person, "b");
        let (aid, bid) = (a.id(), b.id());
        r.add(a).await;
        r.add(b).await;
        r.set_feature(aid, "spouse", Value::Reference(bid)).await;
        assert_eq!(r.get_feature(bid, "spouse").await, Some(Value::Reference(aid)));
        r.unset_feature(aid, "spouse").await;
        assert_eq!(r.get_feature(bid, "spouse").await, None);
    }

    #[tokio::test]
    async fn replacing_single_opposite_releases_previous_partner() {
        let s = schema();
        let r = Resource::new("mem://a");
        let a = named(&s.person, "a");
        let b = named(&s.person, "b");
        let c = named(&s.person, "c");
        let (aid, bid, cid) = (a.id(), b.id(), c.id());
        r.add_all(vec![a, b, c]).await;
        r.set_feature(aid, "spouse", Value::Reference(bid)).await;
        r.set_feature(cid, "spouse", Value::Reference(bid)).await;
        assert_eq!(r.get_feature(bid, "spouse").await, Some(Value::Reference(cid)));
        assert_eq!(r.get_feature(aid, "spouse").await, None);
    }

    #[tokio::test]
    async fn many_to_many_opposites() {
        let s = schema();
        let r = Resource::new("mem://a");
        let a = named(&s.person, "a");
        let b = named(&s.person, "b");
        let c = named(&s.person, "c");
        let (aid, bid, cid) = (a.id(), b.id(), c.id());
        r.add_all(vec![a, b, c]).await;
        r.set_feature(aid, "friends", Value::ReferenceList(vec![bid, cid])).await;
        assert_eq!(r.get_feature(bid, "friendOf").await, Some(Value::ReferenceList(vec![aid])));
        assert_eq!(r.get_feature(cid, "friendOf").await, Some(Value::ReferenceList(vec![aid])));

        r.set_feature(aid, "friends", Value::ReferenceList(vec![cid])).await;
        assert_eq!(r.get_feature(bid, "friendOf").await, Some(Value::ReferenceList(vec![])));
        assert_eq!(r.get_feature(cid, "friendOf").await, Some(Value::ReferenceList(vec![aid])));
    }

    #[tokio::test]
    async fn misses_return_false_or_none() {
        let s = schema();
        let r = Resource::new("mem://a");
        let t = named(&s.team, "core");
        let tid = t.id();
        r.add(t).await;
        assert!(!r.set_feature(EntityId::new(), "name", Value::from("x")).await);
        assert!(!r.set_feature(tid, "nope", Value::from("x")).await);
        assert_eq!(r.get_feature(tid, "nope").await, None);
        assert_eq!(r.get_feature(EntityId::new(), "name").await, None);
        assert!(r.resolve(EntityId::new()).await.is_none());
        assert!(!r.remove(EntityId::new()).await);
    }

    #[tokio::test]
    async fn remove_does_not_cascade_and_promotes_orphans() {
        let s = schema();
        let r = Resource::new("mem://a");
        let t = named(&s.team, "core");
        let m = named(&s.member, "ann");
        let (tid, mid) = (t.id(), m.id());
        r.add(t).await;
        r.add(m).await;
        r.set_feature(tid, "members", Value::ReferenceList(vec![mid])).await;
        assert!(r.remove(tid).await);
        assert!(r.contains(mid).await);
        assert_eq!(r.root_ids().await, vec![mid]);
        assert_eq!(r.container_of(mid).await, None);
    }

    #[tokio::test]
    async fn remove_tree_cascades() {
        let s = schema();
        let r = Resource::new("mem://a");
        let m1 = named(&s.member, "ann");
        let m2 = named(&s.member, "bob");
        let other = named(&s.team, "other");
        let mut t = named(&s.team, "core");
        t.set("members", vec![m1.id(), m2.id()]);
        let (tid, oid) = (t.id(), other.id());
        r.add_all(vec![m1, m2, t, other]).await;
        assert_eq!(r.remove_tree(tid).await, 3);
        assert_eq!(r.count().await, 1);
        assert_eq!(r.root_ids().await, vec![oid]);
    }

    #[tokio::test]
    async fn resolve_by_path_walks_containment() {
        let s = schema();
        let r = Resource::new("mem://a");
        let m1 = named(&s.member, "ann");
        let m2 = named(&s.member, "bob");
        let mut t = named(&s.team, "core");
        t.set("members", vec![m1.id(), m2.id()]);
        let (tid, m2id) = (t.id(), m2.id());
        r.add_all(vec![m1, m2, t]).await;
        assert_eq!(r.resolve_by_path("").await.unwrap().id(), tid);
        assert_eq!(r.resolve_by_path("/0/members.1").await.unwrap().id(), m2id);
        assert_eq!(r.fragment_of(m2id).await.as_deref(), Some("//@members.1"));
        assert!(r.resolve_by_path("/0/members.7").await.is_none());
        assert!(r.resolve_by_path("/0/name.0").await.is_none());
        assert_eq!(r.resolve_by_path(&tid.to_string()).await.unwrap().id(), tid);
    }

    #[tokio::test]
    async fn xmi_ids_resolve_as_bare_identifiers() {
        let s = schema();
        let r = Resource::new("mem://a");
        let t = named(&s.team, "core");
        let tid = t.id();
        r.add(t).await;
        r.set_xmi_id(tid, "_team1".into()).await;
        assert_eq!(r.xmi_id(tid).await.as_deref(), Some("_team1"));
        assert_eq!(r.id_for_xmi_id("_team1").await, Some(tid));
        assert_eq!(r.resolve_id_by_path("_team1").await, Some(tid));
        r.remove(tid).await;
        assert_eq!(r.id_for_xmi_id("_team1").await, None);
    }

    #[tokio::test]
    async fn snapshot_is_consistent_copy() {
        let s = schema();
        let r = Resource::new("mem://a");
        let t = named(&s.team, "core");
        let tid = t.id();
        r.add(t).await;
        let snap = r.snapshot().await;
        r.clear().await;
        assert_eq!(r.count().await, 0);
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.roots().next().unwrap().id(), tid);
        assert_eq!(snap.fragment_of(tid).as_deref(), Some("/"));
    }
}
