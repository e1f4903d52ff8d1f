//! # ecograph-store
//!
//! In-memory resources for ecograph object graphs.
//!
//! A [`Resource`] holds one document's objects by identity and maintains
//! containment and opposite-reference invariants as features change. A
//! [`ResourceSet`] coordinates resources: it owns them by URI, rewrites and
//! normalises URIs, selects loaders, keeps the metamodel registry, and
//! routes opposite updates whose target lives in another resource.
//!
//! Both are async actors guarded by a `tokio::sync::Mutex`. No lock is held
//! across a call into another actor.
//!
//! ```ignore
//! let set = ResourceSet::new();
//! let doc = set.create_resource("mem://team").await;
//! doc.add(team).await;
//! doc.set_feature(team_id, "members", Value::ReferenceList(ids)).await;
//! assert_eq!(doc.root_ids().await, vec![team_id]);
//! ```

pub mod config;
pub mod error;
pub mod fragment;
pub mod loader;
pub mod proxy;
pub mod resource;
pub mod resource_set;
pub mod uri;

pub use config::ResourceSetConfig;
pub use error::{StoreError, StoreResult};
pub use fragment::ObjectGraph;
pub use loader::ResourceLoader;
pub use proxy::ResourceProxy;
pub use resource::{OppositeUpdate, Resource, ResourceSnapshot};
pub use resource_set::ResourceSet;
