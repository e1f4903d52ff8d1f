use std::fmt;

use ecograph_types::{DynamicObject, EntityId};

use crate::resource_set::ResourceSet;

/// A reference to an object in another document, by URI and fragment path.
///
/// Resolution is on demand and not cached: each call re-walks the target
/// document, loading it through the resource set first if needed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceProxy {
    document_uri: String,
    fragment: String,
}

impl ResourceProxy {
    pub fn new(document_uri: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            document_uri: document_uri.into(),
            fragment: fragment.into(),
        }
    }

    /// Split `"doc#fragment"` at the first `#`. No `#` means the first root.
    pub fn parse(uri: &str) -> Self {
        match uri.split_once('#') {
            Some((document, fragment)) => Self::new(document, fragment),
            None => Self::new(uri, ""),
        }
    }

    pub fn document_uri(&self) -> &str {
        &self.document_uri
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    pub async fn resolve(&self, set: &ResourceSet) -> Option<EntityId> {
        let resource = set.get_resource(&self.document_uri).await?;
        resource.resolve_id_by_path(&self.fragment).await
    }

    pub async fn resolve_object(&self, set: &ResourceSet) -> Option<DynamicObject> {
        let resource = set.get_resource(&self.document_uri).await?;
        resource.resolve_by_path(&self.fragment).await
    }
}

impl fmt::Display for ResourceProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document_uri, self.fragment)
    }
}
