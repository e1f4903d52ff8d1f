use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::error::{StoreError, StoreResult};
use crate::resource::Resource;

/// Populates a freshly created resource from its physical URI.
///
/// Loaders are registered on a [`ResourceSet`](crate::ResourceSet) against a
/// URI pattern. The resource handed in is already owned by the set, so a
/// loader may resolve references back into it.
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    async fn load(&self, physical_uri: &str, resource: Arc<Resource>) -> StoreResult<()>;
}

/// A loader paired with the pattern selecting the URIs it handles.
#[derive(Clone)]
pub(crate) struct LoaderEntry {
    pub(crate) pattern: Regex,
    pub(crate) loader: Arc<dyn ResourceLoader>,
}

impl LoaderEntry {
    pub(crate) fn new(pattern: &str, loader: Arc<dyn ResourceLoader>) -> StoreResult<Self> {
        let pattern = Regex::new(pattern).map_err(|e| StoreError::InvalidLoaderPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { pattern, loader })
    }

    pub(crate) fn matches(&self, uri: &str) -> bool {
        self.pattern.is_match(uri)
    }
}
