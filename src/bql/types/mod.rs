use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Field types a table schema may declare
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataType {
    Number,
    Text,
}

impl DataType {
    /// Reports whether a value may be stored in a field of this type.
    /// `none` fits any declared type; booleans are never storable.
    pub fn matches(&self, value: &Value) -> bool {
        match value {
            Value::None => true,
            Value::Boolean(_) => false,
            Value::Integer(_) | Value::Float(_) => *self == DataType::Number,
            Value::Text(_) => *self == DataType::Text,
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Number => write!(f, "number"),
            DataType::Text => write!(f, "text"),
        }
    }
}

/// Runtime value type for expressions. Booleans only arise while
/// evaluating comparisons and logic; they never reach storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    None,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Name of the value's type as written in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) | Self::Float(_) => "number",
            Self::Text(_) => "text",
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::None => write!(f, "{}", "none"),
            Value::Boolean(b) if *b => write!(f, "{}", "true"),
            Value::Boolean(_) => write!(f, "{}", "false"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
        }
    }
}

/// A row is a vector of values in schema order
pub type Row = Vec<Value>;

#[cfg(test)]
mod tests {
    use super::{DataType, Value};

    #[test]
    fn test_datatype_matches() {
        let number = DataType::Number;
        let text = DataType::Text;

        assert!(number.matches(&Value::Integer(1)));
        assert!(number.matches(&Value::Float(1.5)));
        assert!(!number.matches(&Value::Text("a".to_string())));
        assert!(text.matches(&Value::Text("a".to_string())));
        assert!(!text.matches(&Value::Integer(1)));
        // none fits either type, booleans fit neither
        assert!(number.matches(&Value::None));
        assert!(text.matches(&Value::None));
        assert!(!number.matches(&Value::Boolean(true)));
        assert!(!text.matches(&Value::Boolean(true)));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::None.to_string(), "none");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(Value::Boolean(false).to_string(), "false");
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(Value::Text("james".to_string()).to_string(), "james");
    }

    #[test]
    fn test_value_type_name() {
        assert_eq!(Value::Integer(1).type_name(), "number");
        assert_eq!(Value::Float(1.0).type_name(), "number");
        assert_eq!(Value::Text("x".to_string()).type_name(), "text");
        assert_eq!(Value::Boolean(false).type_name(), "boolean");
        assert_eq!(Value::None.type_name(), "none");
    }
}
