use std::sync::Arc;

use crate::identity::EntityId;
use crate::metamodel::{EClass, Feature};
use crate::storage::FeatureStorage;
use crate::value::Value;

/// A schema instance: a class descriptor paired with its feature storage.
///
/// This is the only object kind; there are no generated per-class types.
/// Name-based accessors resolve the feature id through the class once, at
/// the call boundary. Accessors here touch only this object's storage; the
/// containment and opposite invariants are maintained by the owning
/// resource.
#[derive(Clone, Debug)]
pub struct DynamicObject {
    id: EntityId,
    class: Arc<EClass>,
    storage: FeatureStorage,
}

impl DynamicObject {
    /// Create a fresh instance with a new identity.
    pub fn new(class: Arc<EClass>) -> Self {
        Self::with_id(EntityId::new(), class)
    }

    pub fn with_id(id: EntityId, class: Arc<EClass>) -> Self {
        Self {
            id,
            class,
            storage: FeatureStorage::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn class(&self) -> &Arc<EClass> {
        &self.class
    }

    pub fn storage(&self) -> &FeatureStorage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut FeatureStorage {
        &mut self.storage
    }

    pub fn feature(&self, name: &str) -> Option<Feature<'_>> {
        self.class.feature(name)
    }

    /// Value of a feature by name. `None` if unknown or unset.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let feature = self.class.feature(name)?;
        self.storage.get(feature.id())
    }

    /// Assign a feature by name. Returns `false` if the class has no such feature.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> bool {
        match self.class.feature(name) {
            Some(feature) => {
                self.storage.set(feature.id(), value.into());
                true
            }
            None => false,
        }
    }

    /// Unset a feature by name. Returns the removed value.
    pub fn unset(&mut self, name: &str) -> Option<Value> {
        let feature = self.class.feature(name)?;
        self.storage.unset(feature.id())
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.class
            .feature(name)
            .is_some_and(|f| self.storage.is_set(f.id()))
    }

    /// Convenience accessor for the conventional `name` attribute.
    pub fn name(&self) -> Option<&str> {
        self.get("name").and_then(Value::as_str)
    }

    /// Ids held by all containment references of this object.
    pub fn contained_ids(&self) -> Vec<EntityId> {
        self.class
            .containments()
            .filter_map(|r| self.storage.get(r.id))
            .flat_map(Value::references)
            .collect()
    }
}

impl PartialEq for DynamicObject {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DynamicObject {}
