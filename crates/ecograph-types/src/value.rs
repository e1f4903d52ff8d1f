use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identity::EntityId;
use crate::metamodel::DataType;
use crate::temporal::{format_date, parse_date};

/// A storable feature value.
///
/// References never embed the referenced instance: they carry its
/// [`EntityId`] and are resolved by lookup through a resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    Double(f64),
    Float(f32),
    Date(DateTime<Utc>),
    Reference(EntityId),
    ReferenceList(Vec<EntityId>),
}

impl Value {
    /// Infer a value from lexical text.
    ///
    /// Integer is tried first, then floating point, then a case-insensitive
    /// boolean; anything else stays a string. `"42"` is therefore never a
    /// double and `"3.14"` never an integer.
    pub fn infer(text: &str) -> Self {
        if let Ok(i) = text.parse::<i64>() {
            return Value::Int(i);
        }
        // `f64::from_str` also accepts "inf" and "NaN"; require a digit.
        if text.bytes().any(|b| b.is_ascii_digit()) {
            if let Ok(d) = text.parse::<f64>() {
                return Value::Double(d);
            }
        }
        if text.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if text.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
        Value::String(text.to_string())
    }

    /// Parse lexical text as the given data type.
    pub fn parse_as(data_type: DataType, text: &str) -> Result<Self, TypeError> {
        let invalid = || TypeError::InvalidValue {
            value: text.to_string(),
            expected: data_type.ecore_name().to_string(),
        };
        match data_type {
            DataType::String => Ok(Value::String(text.to_string())),
            DataType::Int => text.trim().parse().map(Value::Int).map_err(|_| invalid()),
            DataType::Double => text.trim().parse().map(Value::Double).map_err(|_| invalid()),
            DataType::Float => text.trim().parse().map(Value::Float).map_err(|_| invalid()),
            DataType::Bool => {
                let t = text.trim();
                if t.eq_ignore_ascii_case("true") {
                    Ok(Value::Bool(true))
                } else if t.eq_ignore_ascii_case("false") {
                    Ok(Value::Bool(false))
                } else {
                    Err(invalid())
                }
            }
            DataType::Date => parse_date(text).map(Value::Date),
        }
    }

    /// The lexical form used for XML attributes.
    ///
    /// Floating point values always carry a decimal point or exponent so
    /// that [`Value::infer`] reads them back as floating point.
    pub fn to_lexical(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Double(d) => format!("{d:?}"),
            Value::Float(f) => format!("{f:?}"),
            Value::Date(d) => format_date(d),
            Value::Reference(id) => id.to_string(),
            Value::ReferenceList(ids) => ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// The primitive data type of this value, `None` for references.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::String(_) => Some(DataType::String),
            Value::Int(_) => Some(DataType::Int),
            Value::Bool(_) => Some(DataType::Bool),
            Value::Double(_) => Some(DataType::Double),
            Value::Float(_) => Some(DataType::Float),
            Value::Date(_) => Some(DataType::Date),
            Value::Reference(_) | Value::ReferenceList(_) => None,
        }
    }

    /// Short name of the variant, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Double(_) => "double",
            Value::Float(_) => "float",
            Value::Date(_) => "date",
            Value::Reference(_) => "reference",
            Value::ReferenceList(_) => "reference list",
        }
    }

    /// Returns `true` for single or multi-valued references.
    pub fn is_reference(&self) -> bool {
        matches!(self, Value::Reference(_) | Value::ReferenceList(_))
    }

    /// The single referenced id, if this is a single-valued reference.
    pub fn as_reference(&self) -> Option<EntityId> {
        match self {
            Value::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// All referenced ids, in order. Empty for primitive values.
    pub fn references(&self) -> Vec<EntityId> {
        match self {
            Value::Reference(id) => vec![*id],
            Value::ReferenceList(ids) => ids.clone(),
            _ => Vec::new(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Float(f) => Some(f64::from(*f)),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<EntityId> for Value {
    fn from(id: EntityId) -> Self {
        Value::Reference(id)
    }
}

impl From<Vec<EntityId>> for Value {
    fn from(ids: Vec<EntityId>) -> Self {
        Value::ReferenceList(ids)
    }
}
