//! Attribute values - typed payload for format-specific extras
//!
//! Every IR entity carries an [`Attributes`] bag for markup the model does not
//! otherwise capture (variant readings, witness lists, raw payloads). Values are
//! a closed enum so consumers match exhaustively instead of probing types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// String-keyed attribute bag. Ordered, so serialization is deterministic.
pub type Attributes = BTreeMap<String, Value>;

/// A dynamically-shaped attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    /// Finite only: JSON has no NaN or infinity, so those fail to serialize
    #[serde(serialize_with = "serialize_finite")]
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Borrow the string payload, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Short name of the variant, used in loss reports
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

fn serialize_finite<S>(n: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    if !n.is_finite() {
        return Err(serde::ser::Error::custom(format!("float {} has no JSON form", n)));
    }
    serializer.serialize_f64(*n)
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
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_json_shape() {
        let mut witnesses = BTreeMap::new();
        witnesses.insert("reading".to_string(), Value::from("en archē"));
        witnesses.insert("witnesses".to_string(), Value::from(vec!["P66", "P75"]));
        let value = Value::Map(witnesses);

        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"reading":"en archē","witnesses":["P66","P75"]}"#);

        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_numbers_keep_their_variant() {
        let ints: Value = serde_json::from_str("42").unwrap();
        assert_eq!(ints, Value::Integer(42));
        let floats: Value = serde_json::from_str("0.5").unwrap();
        assert_eq!(floats, Value::Float(0.5));
        assert_eq!(ints.as_f64(), Some(42.0));
    }

    #[test]
    fn test_non_finite_floats_do_not_serialize() {
        assert!(serde_json::to_string(&Value::Float(f64::NAN)).is_err());
        assert!(serde_json::to_string(&Value::from(f64::INFINITY)).is_err());
        let nested = Value::from(vec![Value::Float(1.5), Value::Float(f64::NEG_INFINITY)]);
        assert!(serde_json::to_string(&nested).is_err());
        assert_eq!(serde_json::to_string(&Value::Float(1.5)).unwrap(), "1.5");
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert!(Value::from("x").as_list().is_none());
        assert_eq!(Value::from(3i64).type_name(), "integer");
    }
}
