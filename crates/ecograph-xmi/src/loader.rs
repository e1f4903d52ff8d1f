use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use ecograph_store::{Resource, ResourceLoader, ResourceSet, StoreError, StoreResult};
use tracing::debug;

use crate::parser::parse_bytes;

/// Loads XMI documents from the local filesystem.
///
/// Accepts `file:` URIs and plain paths. Other schemes are refused with a
/// load error, so register a dedicated loader for them ahead of this one.
#[derive(Clone, Copy, Debug, Default)]
pub struct XmiLoader;

#[async_trait]
impl ResourceLoader for XmiLoader {
    async fn load(&self, physical_uri: &str, resource: Arc<Resource>) -> StoreResult<()> {
        let path = file_path(physical_uri).ok_or_else(|| StoreError::Load {
            uri: physical_uri.to_string(),
            reason: "not a file URI".to_string(),
        })?;
        let bytes = tokio::fs::read(&path).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "read XMI document");
        parse_bytes(&resource, &bytes)
            .await
            .map_err(|e| StoreError::Load {
                uri: physical_uri.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

/// Make [`XmiLoader`] the default loader of `set`.
pub async fn install(set: &ResourceSet) {
    set.set_default_loader(Arc::new(XmiLoader)).await;
}

/// The filesystem path behind a `file:` URI or plain path.
pub fn file_path(uri: &str) -> Option<PathBuf> {
    if let Some(rest) = uri.strip_prefix("file://") {
        return Some(PathBuf::from(rest));
    }
    if let Some(rest) = uri.strip_prefix("file:") {
        return Some(PathBuf::from(rest));
    }
    match uri.split_once(':') {
        // A single letter before the colon is a Windows drive.
        Some((scheme, _)) if scheme.len() > 1 => None,
        _ => Some(PathBuf::from(uri)),
    }
}
