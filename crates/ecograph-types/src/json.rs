//! JSON encoding of a single dynamic object.
//!
//! An object encodes as `{"eClass": "<nsURI>#//<Name>" | "<Name>", <feature>: <value>, ...}`.
//! Unset features are omitted. References encode as id strings.
//!
//! Decoding needs the target class supplied by the caller. Attribute values
//! are coerced to the declared type: strings accept ints, doubles, and
//! booleans through their string form; ints, doubles, floats, and dates
//! reject strings that do not parse.

use std::sync::Arc;

use serde_json::{Map, Value as Json};

use crate::error::CodecError;
use crate::identity::EntityId;
use crate::metamodel::{DataType, EAttribute, EClass, EReference, Feature};
use crate::object::DynamicObject;
use crate::temporal::{format_date, parse_date};
use crate::value::Value;

/// Key carrying the class name.
pub const ECLASS_KEY: &str = "eClass";

/// The `eClass` designator for a class: namespace-qualified when known.
pub fn class_designator(class: &EClass) -> String {
    match &class.ns_uri {
        Some(uri) => format!("{uri}#//{}", class.name),
        None => class.name.clone(),
    }
}

/// Encode an object. Features appear in class declaration order.
pub fn encode(object: &DynamicObject) -> Json {
    let mut map = Map::new();
    map.insert(
        ECLASS_KEY.to_string(),
        Json::String(class_designator(object.class())),
    );
    for feature in object.class().features() {
        if let Some(value) = object.storage().get(feature.id()) {
            map.insert(feature.name().to_string(), encode_value(value));
        }
    }
    Json::Object(map)
}

fn encode_value(value: &Value) -> Json {
    match value {
        Value::String(s) => Json::String(s.clone()),
        Value::Int(i) => Json::from(*i),
        Value::Bool(b) => Json::Bool(*b),
        Value::Double(d) => Json::from(*d),
        Value::Float(f) => Json::from(f64::from(*f)),
        Value::Date(d) => Json::String(format_date(d)),
        Value::Reference(id) => Json::String(id.to_string()),
        Value::ReferenceList(ids) => {
            Json::Array(ids.iter().map(|id| Json::String(id.to_string())).collect())
        }
    }
}

/// Decode an object against the supplied class descriptor.
///
/// A fresh identity is assigned. Keys that name no feature of the class are
/// skipped, as are `null` values.
pub fn decode(json: &Json, class: &Arc<EClass>) -> Result<DynamicObject, CodecError> {
    let map = json
        .as_object()
        .ok_or_else(|| CodecError::NotAnObject(json_kind(json).to_string()))?;

    if let Some(declared) = map.get(ECLASS_KEY) {
        let declared = declared.as_str().unwrap_or_default();
        if !designates(declared, class) {
            return Err(CodecError::ClassMismatch {
                expected: class.name.clone(),
                found: declared.to_string(),
            });
        }
    }

    let mut object = DynamicObject::new(Arc::clone(class));
    for (key, raw) in map {
        if key == ECLASS_KEY || raw.is_null() {
            continue;
        }
        let Some(feature) = class.feature(key) else {
            continue;
        };
        let value = match feature {
            Feature::Attribute(attr) => decode_attribute(key, attr, raw)?,
            Feature::Reference(reference) => decode_reference(key, reference, raw)?,
        };
        object.storage_mut().set(feature.id(), value);
    }
    Ok(object)
}

fn designates(declared: &str, class: &EClass) -> bool {
    declared == class.name
        || declared
            .rsplit_once("#//")
            .is_some_and(|(_, name)| name == class.name)
}

fn decode_attribute(key: &str, attr: &EAttribute, raw: &Json) -> Result<Value, CodecError> {
    let mismatch = || CodecError::TypeMismatch {
        key: key.to_string(),
        expected: attr.data_type.ecore_name().to_string(),
        found: json_kind(raw).to_string(),
    };
    match attr.data_type {
        DataType::String => match raw {
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Number(n) => Ok(Value::String(n.to_string())),
            Json::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(mismatch()),
        },
        DataType::Int => match raw {
            Json::Number(n) => n.as_i64().map(Value::Int).ok_or_else(mismatch),
            Json::String(s) => s.trim().parse().map(Value::Int).map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        DataType::Double => match raw {
            Json::Number(n) => n.as_f64().map(Value::Double).ok_or_else(mismatch),
            Json::String(s) => s.trim().parse().map(Value::Double).map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        DataType::Float => match raw {
            Json::Number(n) => n
                .as_f64()
                .map(|d| Value::Float(d as f32))
                .ok_or_else(mismatch),
            Json::String(s) => s.trim().parse().map(Value::Float).map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        DataType::Bool => match raw {
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Json::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            _ => Err(mismatch()),
        },
        DataType::Date => match raw {
            Json::String(s) => parse_date(s).map(Value::Date).map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
    }
}

fn decode_reference(key: &str, reference: &EReference, raw: &Json) -> Result<Value, CodecError> {
    let parse_id = |item: &Json| -> Result<EntityId, CodecError> {
        item.as_str()
            .and_then(|s| EntityId::parse(s).ok())
            .ok_or_else(|| CodecError::TypeMismatch {
                key: key.to_string(),
                expected: format!("reference to {}", reference.target_type),
                found: json_kind(item).to_string(),
            })
    };
    match raw {
        Json::Array(items) => items
            .iter()
            .map(parse_id)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::ReferenceList),
        single if reference.many => parse_id(single).map(|id| Value::ReferenceList(vec![id])),
        single => parse_id(single).map(Value::Reference),
    }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
