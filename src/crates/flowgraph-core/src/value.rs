//! Port value-type tags
//!
//! A finite enumeration checked on every port write. The check is a soft
//! contract: a non-conforming value produces a diagnostic but is stored
//! anyway, so partially typed graphs keep running.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type tag a port advertises for the values it carries.
///
/// `Any` matches everything. `Int` accepts integers only; `Float` accepts
/// any numeric (integer promotion allowed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    #[default]
    Any,
    Int,
    Float,
    String,
    Bool,
    Dict,
    Array,
    Object,
    Vector,
    Matrix,
    Color,
    Binary,
}

impl ValueType {
    /// Whether `value` conforms to this tag.
    pub fn conforms(&self, value: &Value) -> bool {
        match self {
            ValueType::Any => true,
            ValueType::Int => value.is_i64() || value.is_u64(),
            ValueType::Float => value.is_number(),
            ValueType::String => value.is_string(),
            ValueType::Bool => value.is_boolean(),
            ValueType::Dict | ValueType::Object => value.is_object(),
            ValueType::Array | ValueType::Vector | ValueType::Matrix => value.is_array(),
            // Colors travel as "#rrggbb" strings or channel arrays.
            ValueType::Color => value.is_string() || value.is_array(),
            // Binary travels base64-encoded or as a byte array.
            ValueType::Binary => value.is_string() || value.is_array(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_any_matches_everything() {
        for value in [json!(null), json!(1), json!("x"), json!([1]), json!({"a": 1})] {
            assert!(ValueType::Any.conforms(&value));
        }
    }

    #[test]
    fn test_int_rejects_floats() {
        assert!(ValueType::Int.conforms(&json!(3)));
        assert!(ValueType::Int.conforms(&json!(-7)));
        assert!(!ValueType::Int.conforms(&json!(3.5)));
        assert!(!ValueType::Int.conforms(&json!("3")));
    }

    #[test]
    fn test_float_promotes_integers() {
        assert!(ValueType::Float.conforms(&json!(3)));
        assert!(ValueType::Float.conforms(&json!(3.5)));
        assert!(!ValueType::Float.conforms(&json!(true)));
    }

    #[test]
    fn test_container_tags() {
        assert!(ValueType::Dict.conforms(&json!({"k": "v"})));
        assert!(ValueType::Array.conforms(&json!([1, 2])));
        assert!(ValueType::Vector.conforms(&json!([1.0, 2.0, 3.0])));
        assert!(!ValueType::Array.conforms(&json!({"k": "v"})));
    }

    #[test]
    fn test_serialized_tags_are_screaming() {
        assert_eq!(serde_json::to_string(&ValueType::Int).unwrap(), "\"INT\"");
        assert_eq!(serde_json::to_string(&ValueType::Any).unwrap(), "\"ANY\"");
        let tag: ValueType = serde_json::from_str("\"FLOAT\"").unwrap();
        assert_eq!(tag, ValueType::Float);
    }
}
