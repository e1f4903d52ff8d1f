//! # ecograph-xmi
//!
//! XMI reading and writing for ecograph resources.
//!
//! [`parse_str`] and [`parse_bytes`] populate a [`Resource`](ecograph_store::Resource)
//! from an XMI document, resolving references within the document and, when
//! the resource belongs to a set, across documents. [`serialize`] writes one
//! back. Schema documents (`.ecore`) parse against the built-in [`ecore`]
//! meta-classes; [`ecore::packages_from`] turns them into descriptors for
//! the metamodel registry.
//!
//! [`XmiLoader`] plugs the parser into a `ResourceSet` as its file loader.

pub mod config;
pub mod ecore;
pub mod error;
pub mod loader;
pub mod parser;
pub mod serializer;
pub mod xml;

pub use config::XmiConfig;
pub use error::{XmiError, XmiResult};
pub use loader::{install, XmiLoader};
pub use parser::{parse_bytes, parse_str, ParseReport, ParseState, XmiParser};
pub use serializer::serialize;

/// Namespace of the `xmi:` control attributes.
pub const XMI_NS_URI: &str = "http://www.omg.org/XMI";
/// Namespace of `xsi:type`.
pub const XSI_NS_URI: &str = "http://www.w3.org/2001/XMLSchema-instance";
