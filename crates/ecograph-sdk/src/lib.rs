//! High-level SDK for ecograph.
//!
//! [`Workspace`] bundles a `ResourceSet` with the XMI file loader, so that
//! documents and the documents they reference load on demand, and adds
//! helpers for saving resources and registering `.ecore` metamodels.

pub mod error;
pub mod workspace;

pub use error::{SdkError, SdkResult};
pub use workspace::{to_uri, Workspace};

// Re-export key types
pub use ecograph_store::{Resource, ResourceProxy, ResourceSet, ResourceSetConfig};
pub use ecograph_types::{DynamicObject, EClass, EPackage, EntityId, Value};
pub use ecograph_xmi::XmiConfig;
