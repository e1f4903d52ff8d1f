use std::path::Path;
use std::sync::Arc;

use ecograph_store::{Resource, ResourceSet, ResourceSetConfig};
use ecograph_types::EPackage;
use ecograph_xmi::{ecore, XmiConfig};
use tracing::{debug, info};

use crate::error::{SdkError, SdkResult};

/// A resource set wired for XMI files.
///
/// Every resource loaded or created through a workspace shares one
/// [`ResourceSet`], so references between documents resolve and opposite
/// updates reach across them.
pub struct Workspace {
    set: Arc<ResourceSet>,
    xmi: XmiConfig,
}

impl Workspace {
    pub async fn new() -> Self {
        Self::with_config(ResourceSetConfig::default(), XmiConfig::default()).await
    }

    pub async fn with_config(store: ResourceSetConfig, xmi: XmiConfig) -> Self {
        let set = ResourceSet::with_config(store);
        ecograph_xmi::install(&set).await;
        Self { set, xmi }
    }

    pub fn resource_set(&self) -> &Arc<ResourceSet> {
        &self.set
    }

    pub fn xmi_config(&self) -> &XmiConfig {
        &self.xmi
    }

    /// Load a document from a path or URI, or return it if already loaded.
    pub async fn load(&self, path_or_uri: &str) -> SdkResult<Arc<Resource>> {
        let uri = to_uri(path_or_uri)?;
        Ok(self.set.load_resource(&uri).await?)
    }

    /// Replace the contents of the resource at `uri` with a parsed document.
    pub async fn parse_str(&self, uri: &str, text: &str) -> SdkResult<Arc<Resource>> {
        let resource = self.set.create_resource(uri).await;
        resource.clear().await;
        let report = ecograph_xmi::parse_str(&resource, text).await?;
        debug!(uri = %resource.uri(), objects = report.objects, "parsed document");
        Ok(resource)
    }

    /// Serialise a resource with this workspace's settings.
    pub async fn to_string(&self, resource: &Resource) -> SdkResult<String> {
        Ok(ecograph_xmi::serialize(resource, &self.xmi).await?)
    }

    /// Write a resource to `path` as XMI.
    pub async fn save(&self, resource: &Resource, path: impl AsRef<Path>) -> SdkResult<()> {
        let path = path.as_ref();
        let text = self.to_string(resource).await?;
        tokio::fs::write(path, text.as_bytes()).await?;
        info!(uri = %resource.uri(), path = %path.display(), bytes = text.len(), "saved resource");
        Ok(())
    }

    /// Load a `.ecore` document and register every package in it by its
    /// namespace URI.
    pub async fn load_metamodel(&self, path_or_uri: &str) -> SdkResult<Vec<Arc<EPackage>>> {
        let resource = self.load(path_or_uri).await?;
        let packages: Vec<Arc<EPackage>> = ecore::packages_of(&resource)
            .await
            .into_iter()
            .map(Arc::new)
            .collect();
        if packages.is_empty() {
            return Err(SdkError::NoPackages(resource.uri().to_string()));
        }
        for package in &packages {
            self.set
                .register_metamodel(Arc::clone(package), &package.ns_uri)
                .await;
        }
        info!(uri = %resource.uri(), packages = packages.len(), "registered metamodel");
        Ok(packages)
    }
}

/// A URI for `path_or_uri`: URIs pass through, paths become absolute
/// `file://` URIs.
pub fn to_uri(path_or_uri: &str) -> SdkResult<String> {
    if let Some((scheme, _)) = path_or_uri.split_once(':') {
        if scheme.len() > 1 && !scheme.contains('/') {
            return Ok(path_or_uri.to_string());
        }
    }
    let absolute = std::path::absolute(path_or_uri)?;
    Ok(format!("file://{}", absolute.display()))
}
