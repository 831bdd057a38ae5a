//! Native property values and their wire representation.
//!
//! On the wire every property value is a string. Conversion is driven by the
//! property's [`DataType`].

use crate::error::{DeltaError, Result};
use crate::language::{DataType, MetaPointer};
use std::fmt;

/// A property value in its native form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyValue {
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Text value
    String(String),
    /// Key of an enumeration literal
    Enumeration(String),
}

impl PropertyValue {
    /// Convert a wire value to the native representation for `data_type`.
    ///
    /// # Errors
    ///
    /// Returns [`DeltaError::InvalidValue`] if the wire value does not match
    /// the data type.
    pub fn from_wire(feature: &MetaPointer, data_type: &DataType, raw: &str) -> Result<Self> {
        let invalid = |expected: String| DeltaError::InvalidValue {
            feature: feature.clone(),
            value: raw.to_string(),
            expected,
        };

        match data_type {
            DataType::Boolean => match raw {
                "true" => Ok(Self::Boolean(true)),
                "false" => Ok(Self::Boolean(false)),
                _ => Err(invalid("\"true\" or \"false\"".to_string())),
            },
            DataType::Integer => raw
                .parse()
                .map(Self::Integer)
                .map_err(|_| invalid("a decimal integer".to_string())),
            DataType::String => Ok(Self::String(raw.to_string())),
            DataType::Enumeration { literals } => {
                if literals.iter().any(|literal| literal == raw) {
                    Ok(Self::Enumeration(raw.to_string()))
                } else {
                    Err(invalid(format!("one of {literals:?}")))
                }
            }
        }
    }

    /// Wire representation.
    #[must_use]
    pub fn to_wire(&self) -> String {
        self.to_string()
    }

    /// Whether the value can be stored in a property of `data_type`.
    #[must_use]
    pub fn conforms_to(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Self::Boolean(_), DataType::Boolean)
            | (Self::Integer(_), DataType::Integer)
            | (Self::String(_), DataType::String) => true,
            (Self::Enumeration(key), DataType::Enumeration { literals }) => {
                literals.contains(key)
            }
            _ => false,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::String(value) | Self::Enumeration(value) => f.write_str(value),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pointer() -> MetaPointer {
        MetaPointer::new("lang", "1", "prop")
    }

    #[test]
    fn converts_wire_values() {
        assert_eq!(
            PropertyValue::from_wire(&pointer(), &DataType::Boolean, "true").unwrap(),
            PropertyValue::Boolean(true)
        );
        assert_eq!(
            PropertyValue::from_wire(&pointer(), &DataType::Integer, "-42").unwrap(),
            PropertyValue::Integer(-42)
        );
        assert_eq!(
            PropertyValue::from_wire(&pointer(), &DataType::String, "").unwrap(),
            PropertyValue::String(String::new())
        );
    }

    #[test]
    fn rejects_shape_mismatch() {
        let err = PropertyValue::from_wire(&pointer(), &DataType::Integer, "4.5").unwrap_err();
        assert!(matches!(err, DeltaError::InvalidValue { ref value, .. } if value == "4.5"));

        let colors = DataType::Enumeration {
            literals: vec!["red".to_string(), "green".to_string()],
        };
        assert!(PropertyValue::from_wire(&pointer(), &colors, "blue").is_err());
        assert!(PropertyValue::from_wire(&pointer(), &DataType::Boolean, "TRUE").is_err());
    }

    #[test]
    fn wire_form_matches_parse() {
        let value = PropertyValue::Integer(1_234);
        let parsed =
            PropertyValue::from_wire(&pointer(), &DataType::Integer, &value.to_wire()).unwrap();
        assert_eq!(parsed, value);
        assert!(value.conforms_to(&DataType::Integer));
        assert!(!value.conforms_to(&DataType::String));
    }
}
