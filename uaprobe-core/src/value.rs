//! Typed property values.
//!
//! Values are stored as strings in the data file and converted once, at load
//! time, according to the property's declared [`PropertyType`].

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueParseError {
    #[error("unknown property type tag {0}")]
    UnknownType(u8),
    #[error("'{raw}' is not a valid {expected:?} value")]
    Invalid { raw: String, expected: PropertyType },
}

/// Declared type of a property in the data file schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PropertyType {
    Bool = 0,
    Integer = 1,
    Double = 2,
    String = 3,
    /// Multi-valued string property.
    List = 4,
}

impl TryFrom<u8> for PropertyType {
    type Error = ValueParseError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Self::Bool),
            1 => Ok(Self::Integer),
            2 => Ok(Self::Double),
            3 => Ok(Self::String),
            4 => Ok(Self::List),
            other => Err(ValueParseError::UnknownType(other)),
        }
    }
}

impl PropertyType {
    /// Converts a raw scalar value into its typed form.
    ///
    /// `List` properties are assembled by the loader from several entries, so a
    /// single raw string parses to a one-element list here.
    pub fn parse(self, raw: &str) -> Result<Value, ValueParseError> {
        let invalid = || ValueParseError::Invalid {
            raw: raw.to_string(),
            expected: self,
        };
        match self {
            Self::Bool => parse_bool(raw).map(Value::Bool).ok_or_else(invalid),
            Self::Integer => raw.trim().parse().map(Value::Integer).map_err(|_| invalid()),
            Self::Double => raw.trim().parse().map(Value::Double).map_err(|_| invalid()),
            Self::String => Ok(Value::String(Arc::from(raw))),
            Self::List => Ok(Value::List(Arc::from(vec![Arc::<str>::from(raw)]))),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// A typed property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(Arc<str>),
    List(Arc<[Arc<str>]>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Arc<str>]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::Bool(_) => PropertyType::Bool,
            Self::Integer(_) => PropertyType::Integer,
            Self::Double(_) => PropertyType::Double,
            Self::String(_) => PropertyType::String,
            Self::List(_) => PropertyType::List,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Data files spell booleans this way.
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::String(s) => f.write_str(s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    f.write_str(item)?;
                }
                Ok(())
            }
        }
    }
}
