//! Value normalization operations.
//!
//! Applied by the mapping layer to one side of a field mapping before the
//! comparator runs, to bring coded values to a common representation
//! (e.g. a gender code `1` on the relational side vs `"Male"` in the document).

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

/// All available normalization operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Remove leading and trailing whitespace
    Trim,

    /// Convert to uppercase
    Uppercase,

    /// Convert to lowercase
    Lowercase,

    /// Replace using regex pattern
    Replace {
        pattern: String,
        #[serde(default)]
        value: String,
    },

    /// Map values using a lookup table
    Map {
        mapping: BTreeMap<String, String>,
        #[serde(default)]
        case_insensitive: bool,
        /// Value to use when no mapping matches (none = keep the value)
        #[serde(default)]
        default_unmapped: Option<String>,
    },

    /// Convert to boolean
    ToBoolean {
        #[serde(default = "default_true_values")]
        true_values: Vec<String>,
    },

    /// Convert to number
    ToNumber,

    /// Convert to string
    ToString,
}

fn default_true_values() -> Vec<String> {
    vec![
        "true".to_string(),
        "1".to_string(),
        "yes".to_string(),
        "y".to_string(),
    ]
}

impl Operation {
    /// Convenience constructor for a case-sensitive lookup table.
    pub fn map<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Operation::Map {
            mapping: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            case_insensitive: false,
            default_unmapped: None,
        }
    }

    /// `to_boolean` with the default truthy values.
    pub fn to_boolean() -> Self {
        Operation::ToBoolean {
            true_values: default_true_values(),
        }
    }

    /// Apply this operation to a value
    pub fn apply(&self, value: &Value) -> Value {
        match self {
            Operation::Trim => self.apply_trim(value),
            Operation::Uppercase => self.apply_uppercase(value),
            Operation::Lowercase => self.apply_lowercase(value),
            Operation::Replace { pattern, value: replacement } => {
                self.apply_replace(value, pattern, replacement)
            }
            Operation::Map { mapping, case_insensitive, default_unmapped } => {
                self.apply_map(value, mapping, *case_insensitive, default_unmapped.as_deref())
            }
            Operation::ToBoolean { true_values } => self.apply_to_boolean(value, true_values),
            Operation::ToNumber => self.apply_to_number(value),
            Operation::ToString => self.apply_to_string(value),
        }
    }

    /// Regex pattern carried by this operation, if any.
    pub fn pattern(&self) -> Option<&str> {
        match self {
            Operation::Replace { pattern, .. } => Some(pattern),
            _ => None,
        }
    }

    fn as_string(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn apply_trim(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(s.trim().to_string()),
            _ => value.clone(),
        }
    }

    fn apply_uppercase(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(s.to_uppercase()),
            _ => value.clone(),
        }
    }

    fn apply_lowercase(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(s.to_lowercase()),
            _ => value.clone(),
        }
    }

    fn apply_replace(&self, value: &Value, pattern: &str, replacement: &str) -> Value {
        Self::as_string(value)
            .and_then(|s| {
                regex::Regex::new(pattern)
                    .ok()
                    .map(|re| Value::String(re.replace_all(&s, replacement).to_string()))
            })
            .unwrap_or(value.clone())
    }

    fn apply_map(
        &self,
        value: &Value,
        mapping: &BTreeMap<String, String>,
        case_insensitive: bool,
        default_unmapped: Option<&str>,
    ) -> Value {
        let Some(s) = Self::as_string(value) else {
            return value.clone();
        };
        let key = s.trim();

        let found = if case_insensitive {
            let lower = key.to_lowercase();
            mapping.iter().find(|(k, _)| k.to_lowercase() == lower).map(|(_, v)| v)
        } else {
            mapping.get(key)
        };

        match (found, default_unmapped) {
            (Some(v), _) => Value::String(v.clone()),
            (None, Some(d)) => Value::String(d.to_string()),
            (None, None) => value.clone(),
        }
    }

    fn apply_to_boolean(&self, value: &Value, true_values: &[String]) -> Value {
        match value {
            Value::Bool(b) => Value::Bool(*b),
            Value::Number(n) => Value::Bool(n.as_f64().is_some_and(|f| f != 0.0)),
            Value::Null => Value::Null,
            _ => Self::as_string(value)
                .map(|s| {
                    let lower = s.trim().to_lowercase();
                    Value::Bool(true_values.iter().any(|tv| tv.to_lowercase() == lower))
                })
                .unwrap_or(Value::Bool(false)),
        }
    }

    fn apply_to_number(&self, value: &Value) -> Value {
        match value {
            Value::Number(_) => value.clone(),
            Value::Bool(b) => Value::Number(i64::from(*b).into()),
            Value::String(s) => {
                let t = s.trim();
                if let Ok(i) = t.parse::<i64>() {
                    Value::Number(i.into())
                } else {
                    t.parse::<f64>()
                        .ok()
                        .and_then(Number::from_f64)
                        .map(Value::Number)
                        .unwrap_or(value.clone())
                }
            }
            _ => value.clone(),
        }
    }

    fn apply_to_string(&self, value: &Value) -> Value {
        Self::as_string(value).map(Value::String).unwrap_or(value.clone())
    }
}

/// Get a description of all available operations
pub fn operations_description() -> String {
    r#"Available normalization operations (field mapping "source_ops" / "target_ops"):

| Operation | Description | Parameters |
|-----------|-------------|------------|
| trim | Remove leading/trailing whitespace | - |
| uppercase | Convert to uppercase | - |
| lowercase | Convert to lowercase | - |
| replace | Regex pattern replacement | pattern: regex, value: replacement |
| map | Map values using lookup table | mapping: {source: target}, case_insensitive: bool, default_unmapped: string |
| to_boolean | Convert to boolean | true_values: list of truthy strings |
| to_number | Convert numeric strings to numbers | - |
| to_string | Convert numbers/booleans to strings | - |

Example operations in JSON:
[
  {"type": "trim"},
  {"type": "map", "mapping": {"1": "Male", "M": "Male", "F": "Female"}},
  {"type": "to_boolean"}
]"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trim() {
        let op = Operation::Trim;
        assert_eq!(op.apply(&json!("  FW  ")), json!("FW"));
        assert_eq!(op.apply(&json!(7)), json!(7));
    }

    #[test]
    fn test_map() {
        let op = Operation::map([("1", "Male"), ("M", "Male"), ("F", "Female")]);
        assert_eq!(op.apply(&json!("M")), json!("Male"));
        assert_eq!(op.apply(&json!(1)), json!("Male"));

        // unmapped values are kept as they are
        assert_eq!(op.apply(&json!("X")), json!("X"));

        let op_with_default = Operation::Map {
            mapping: BTreeMap::from([("m".to_string(), "Male".to_string())]),
            case_insensitive: true,
            default_unmapped: Some("Female".to_string()),
        };
        assert_eq!(op_with_default.apply(&json!("M")), json!("Male"));
        assert_eq!(op_with_default.apply(&json!("W")), json!("Female"));
    }

    #[test]
    fn test_to_boolean() {
        let op = Operation::to_boolean();
        assert_eq!(op.apply(&json!(1)), json!(true));
        assert_eq!(op.apply(&json!(0)), json!(false));
        assert_eq!(op.apply(&json!("True")), json!(true));
        assert_eq!(op.apply(&json!("0")), json!(false));
        assert_eq!(op.apply(&json!(true)), json!(true));
        assert_eq!(op.apply(&Value::Null), Value::Null);
    }

    #[test]
    fn test_to_number() {
        let op = Operation::ToNumber;
        assert_eq!(op.apply(&json!("90")), json!(90));
        assert_eq!(op.apply(&json!(" 7.5 ")), json!(7.5));
        assert_eq!(op.apply(&json!("FW")), json!("FW"));
    }

    #[test]
    fn test_replace_and_case() {
        let op = Operation::Replace { pattern: r"\s+".into(), value: " ".into() };
        assert_eq!(op.apply(&json!("Manchester   United")), json!("Manchester United"));
        assert_eq!(Operation::Uppercase.apply(&json!("fw")), json!("FW"));
        assert_eq!(Operation::ToString.apply(&json!(6698)), json!("6698"));
    }

    #[test]
    fn test_operation_json_shape() {
        let ops: Vec<Operation> = serde_json::from_value(json!([
            {"type": "trim"},
            {"type": "map", "mapping": {"1": "Male"}},
            {"type": "to_boolean"}
        ]))
        .unwrap();
        assert_eq!(ops[0], Operation::Trim);
        assert_eq!(ops[2], Operation::to_boolean());
    }
}
