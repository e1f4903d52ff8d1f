use indexmap::{IndexMap, IndexSet};

use crate::identity::FeatureId;
use crate::value::Value;

/// Per-instance feature values with explicit "is set" tracking.
///
/// A feature present in the value map is always in the set-marker set and
/// vice versa; `unset` removes from both. This distinguishes "never
/// assigned" from "assigned a default-looking value" such as `0` or `""`.
/// Iteration follows first-set order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureStorage {
    values: IndexMap<FeatureId, Value>,
    set: IndexSet<FeatureId>,
}

impl FeatureStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a value and mark the feature set. Returns the previous value.
    pub fn set(&mut self, feature: FeatureId, value: Value) -> Option<Value> {
        self.set.insert(feature);
        let previous = self.values.insert(feature, value);
        debug_assert_eq!(self.values.len(), self.set.len());
        previous
    }

    pub fn get(&self, feature: FeatureId) -> Option<&Value> {
        self.values.get(&feature)
    }

    pub fn get_mut(&mut self, feature: FeatureId) -> Option<&mut Value> {
        self.values.get_mut(&feature)
    }

    /// Remove a value and its set marker. Returns the removed value.
    pub fn unset(&mut self, feature: FeatureId) -> Option<Value> {
        self.set.shift_remove(&feature);
        let removed = self.values.shift_remove(&feature);
        debug_assert_eq!(self.values.len(), self.set.len());
        removed
    }

    pub fn is_set(&self, feature: FeatureId) -> bool {
        self.set.contains(&feature)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, &Value)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_marks_feature() {
        let mut storage = FeatureStorage::new();
        let f = FeatureId::new();
        assert!(!storage.is_set(f));
        storage.set(f, Value::Int(0));
        assert!(storage.is_set(f));
        assert_eq!(storage.get(f), Some(&Value::Int(0)));
    }

    #[test]
    fn falsy_values_are_still_set() {
        let mut storage = FeatureStorage::new();
        let f = FeatureId::new();
        storage.set(f, Value::Bool(false));
        storage.set(FeatureId::new(), Value::String(String::new()));
        assert!(storage.is_set(f));
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn unset_removes_value_and_marker() {
        let mut storage = FeatureStorage::new();
        let f = FeatureId::new();
        storage.set(f, Value::Int(3));
        assert_eq!(storage.unset(f), Some(Value::Int(3)));
        assert!(!storage.is_set(f));
        assert!(storage.get(f).is_none());
        assert!(storage.is_empty());
        assert_eq!(storage.unset(f), None);
    }

    #[test]
    fn iteration_follows_first_set_order() {
        let mut storage = FeatureStorage::new();
        let (a, b) = (FeatureId::new(), FeatureId::new());
        storage.set(b, Value::Int(2));
        storage.set(a, Value::Int(1));
        storage.set(b, Value::Int(3));
        let order: Vec<_> = storage.iter().map(|(k, _)| k).collect();
        assert_eq!(order, vec![b, a]);
    }
}
