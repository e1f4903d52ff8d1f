//! Foundation types for ecograph.
//!
//! This crate provides the identity, value, and descriptor types shared by
//! every other ecograph crate. Instances are always [`DynamicObject`]s: a
//! class descriptor paired with a [`FeatureStorage`]. There are no generated
//! per-class Rust types.
//!
//! # Key Types
//!
//! - [`EntityId`]: UUID v7 identity for instances, classes, and features
//! - [`Value`]: closed sum of storable primitive and reference values
//! - [`EClass`], [`EAttribute`], [`EReference`], [`EPackage`]: schema descriptors
//! - [`FeatureStorage`]: per-instance feature map with explicit "is set" tracking
//! - [`DynamicObject`]: a class descriptor plus its feature storage
//!
//! The [`json`] module encodes a single object as a JSON document and decodes
//! it back against a caller-supplied class descriptor.

pub mod error;
pub mod identity;
pub mod json;
pub mod metamodel;
pub mod object;
pub mod storage;
pub mod temporal;
pub mod value;

pub use error::{CodecError, TypeError};
pub use identity::{EntityId, FeatureId};
pub use metamodel::{
    DataType, EAttribute, EClass, EClassBuilder, EEnum, EPackage, EReference, Feature,
};
pub use object::DynamicObject;
pub use storage::FeatureStorage;
pub use temporal::{format_date, parse_date};
pub use value::Value;
