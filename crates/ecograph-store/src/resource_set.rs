use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Weak};

use ecograph_types::{DynamicObject, EPackage, EntityId, FeatureId};
use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::ResourceSetConfig;
use crate::error::{StoreError, StoreResult};
use crate::loader::{LoaderEntry, ResourceLoader};
use crate::resource::{OppositeUpdate, Resource};
use crate::uri;

/// Coordinates a family of resources.
///
/// Owns resources by URI, the metamodel registry, the URI rewrite table and
/// the loaders. Cross-resource opposite updates are routed through
/// [`update_opposite`](Self::update_opposite).
///
/// The set's own lock only guards its tables. Every operation that touches a
/// resource first copies what it needs and releases the lock.
pub struct ResourceSet {
    config: ResourceSetConfig,
    this: Weak<ResourceSet>,
    state: Mutex<SetState>,
}

#[derive(Default)]
struct SetState {
    resources: IndexMap<String, Arc<Resource>>,
    metamodels: HashMap<String, Arc<EPackage>>,
    rewrites: BTreeMap<String, String>,
    loaders: Vec<LoaderEntry>,
    default_loader: Option<Arc<dyn ResourceLoader>>,
}

impl ResourceSet {
    pub fn new() -> Arc<Self> {
        Self::with_config(ResourceSetConfig::default())
    }

    pub fn with_config(config: ResourceSetConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            config,
            this: this.clone(),
            state: Mutex::new(SetState::default()),
        })
    }

    pub fn config(&self) -> &ResourceSetConfig {
        &self.config
    }

    // ---- Resources ----

    /// Get or create the resource for `uri`. Idempotent by URI.
    pub async fn create_resource(&self, uri: &str) -> Arc<Resource> {
        self.create_or_get(uri).await.0
    }

    async fn create_or_get(&self, uri: &str) -> (Arc<Resource>, bool) {
        let key = uri::normalise_path(uri);
        let mut state = self.state.lock().await;
        if let Some(existing) = state.resources.get(&key) {
            return (Arc::clone(existing), false);
        }
        let resource = Resource::owned(key.clone(), self.this.clone());
        state.resources.insert(key, Arc::clone(&resource));
        debug!(uri = %resource.uri(), "created resource");
        (resource, true)
    }

    /// The cached resource for `uri`, or one freshly loaded through a
    /// loader. Load failures are logged and reported as a miss.
    pub async fn get_resource(&self, uri: &str) -> Option<Arc<Resource>> {
        match self.load_resource(uri).await {
            Ok(resource) => Some(resource),
            Err(StoreError::NoLoader(uri)) => {
                debug!(%uri, "no loader for resource");
                None
            }
            Err(e) => {
                warn!(uri, error = %e, "resource load failed");
                None
            }
        }
    }

    /// Like [`get_resource`](Self::get_resource) but surfaces load errors.
    ///
    /// The loader is selected by the physical URI: the first registered
    /// pattern that matches wins, then the default loader. A resource whose
    /// load fails is removed again.
    pub async fn load_resource(&self, uri: &str) -> StoreResult<Arc<Resource>> {
        let key = uri::normalise_path(uri);
        let (cached, rewrites) = {
            let state = self.state.lock().await;
            (state.resources.get(&key).cloned(), state.rewrites.clone())
        };
        if let Some(resource) = cached {
            return Ok(resource);
        }
        let physical = uri::normalise_path(&uri::convert_uri(
            &key,
            &rewrites,
            self.config.max_uri_rewrites,
        ));
        let loader = self
            .loader_for(&physical)
            .await
            .ok_or_else(|| StoreError::NoLoader(physical.clone()))?;

        let (resource, created) = self.create_or_get(&key).await;
        if !created {
            return Ok(resource);
        }
        debug!(uri = %key, %physical, "loading resource");
        if let Err(e) = loader.load(&physical, Arc::clone(&resource)).await {
            self.state.lock().await.resources.shift_remove(&key);
            return Err(e);
        }
        let objects = resource.count().await;
        debug!(uri = %key, objects, "loaded resource");
        Ok(resource)
    }

    async fn loader_for(&self, physical: &str) -> Option<Arc<dyn ResourceLoader>> {
        let state = self.state.lock().await;
        state
            .loaders
            .iter()
            .find(|entry| entry.matches(physical))
            .map(|entry| Arc::clone(&entry.loader))
            .or_else(|| state.default_loader.clone())
    }

    /// Drop the resource for `uri` from the set, returning it.
    pub async fn remove_resource(&self, uri: &str) -> Option<Arc<Resource>> {
        let key = uri::normalise_path(uri);
        self.state.lock().await.resources.shift_remove(&key)
    }

    /// All resources in creation order.
    pub async fn resources(&self) -> Vec<Arc<Resource>> {
        self.state.lock().await.resources.values().cloned().collect()
    }

    /// Normalised URIs of all resources, in creation order.
    pub async fn resource_uris(&self) -> Vec<String> {
        self.state.lock().await.resources.keys().cloned().collect()
    }

    // ---- Loaders ----

    /// Register a loader for physical URIs matching the regex `pattern`.
    pub async fn register_loader(
        &self,
        pattern: &str,
        loader: Arc<dyn ResourceLoader>,
    ) -> StoreResult<()> {
        let entry = LoaderEntry::new(pattern, loader)?;
        self.state.lock().await.loaders.push(entry);
        Ok(())
    }

    /// The loader used when no registered pattern matches.
    pub async fn set_default_loader(&self, loader: Arc<dyn ResourceLoader>) {
        self.state.lock().await.default_loader = Some(loader);
    }

    // ---- Metamodels ----

    /// Register `package` under `ns_uri`, replacing any earlier one.
    pub async fn register_metamodel(&self, package: Arc<EPackage>, ns_uri: &str) {
        debug!(ns_uri, package = %package.name, "registered metamodel");
        self.state
            .lock()
            .await
            .metamodels
            .insert(ns_uri.to_string(), package);
    }

    /// The package registered under `ns_uri`.
    pub async fn get_metamodel(&self, ns_uri: &str) -> Option<Arc<EPackage>> {
        self.state.lock().await.metamodels.get(ns_uri).cloned()
    }

    /// Every registered package.
    pub async fn metamodels(&self) -> Vec<Arc<EPackage>> {
        self.state.lock().await.metamodels.values().cloned().collect()
    }

    // ---- URIs ----

    /// Add a logical to physical rewrite rule.
    pub async fn map_uri(&self, logical: &str, physical: &str) {
        self.state
            .lock()
            .await
            .rewrites
            .insert(logical.to_string(), physical.to_string());
    }

    /// Apply the rewrite table to `uri` until no rule matches.
    pub async fn convert_uri(&self, uri: &str) -> String {
        let rewrites = self.state.lock().await.rewrites.clone();
        uri::convert_uri(uri, &rewrites, self.config.max_uri_rewrites)
    }

    /// [`convert_uri`](Self::convert_uri) followed by path normalisation.
    pub async fn normalise_uri(&self, uri: &str) -> String {
        uri::normalise_path(&self.convert_uri(uri).await)
    }

    // ---- Cross-resource queries ----

    /// Find an object in any resource. Linear over resources.
    pub async fn resolve(&self, id: EntityId) -> Option<(DynamicObject, Arc<Resource>)> {
        for resource in self.resources().await {
            if let Some(object) = resource.resolve(id).await {
                return Some((object, resource));
            }
        }
        None
    }

    /// The resource holding `id`.
    pub async fn resource_of(&self, id: EntityId) -> Option<Arc<Resource>> {
        for resource in self.resources().await {
            if resource.contains(id).await {
                return Some(resource);
            }
        }
        None
    }

    /// Resolve `"doc#fragment"`, loading the document if needed.
    pub async fn resolve_by_uri(&self, uri: &str) -> Option<DynamicObject> {
        let (document, fragment) = uri.split_once('#').unwrap_or((uri, ""));
        let resource = self.get_resource(document).await?;
        resource.resolve_by_path(fragment).await
    }

    /// Add `source` to, or remove it from, the `feature` slot of `target`
    /// in whichever resource holds it.
    ///
    /// Follow-up updates produced by replacing a single-valued opposite are
    /// routed the same way. Returns `false` if `target` is in no resource.
    pub async fn update_opposite(
        &self,
        target: EntityId,
        feature: FeatureId,
        source: EntityId,
        add: bool,
    ) -> bool {
        let mut queue = VecDeque::from([OppositeUpdate {
            target,
            feature,
            source,
            add,
        }]);
        let mut found = false;
        while let Some(update) = queue.pop_front() {
            let Some(resource) = self.resource_of(update.target).await else {
                debug!(target = %update.target, "opposite target not in any resource");
                continue;
            };
            if update.target == target {
                found = true;
            }
            debug!(
                uri = %resource.uri(),
                target = %update.target,
                add = update.add,
                "cross-resource opposite update"
            );
            queue.extend(resource.apply_opposite(update).await);
        }
        found
    }
}

impl fmt::Debug for ResourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceSet")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
