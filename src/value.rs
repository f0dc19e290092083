use std::fmt;

use serde::{Deserialize, Serialize};

/// Text shown or exported for a result that was never assigned.
pub const UNSET: &str = "None";

/// Longest text value shown in the live table before truncation.
const DISPLAY_TEXT_LIMIT: usize = 50;

/// A measurement recorded by a step.
///
/// # Examples
///
/// ```rust
/// use autotest::value::Value;
/// let v = Value::from(3.703);
/// assert_eq!(v.type_name(), "Float");
/// assert_eq!(v.to_string(), "3.703");
/// let s = Value::from("SN-004411");
/// assert_eq!(s.as_text(), Some("SN-004411"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Bool",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Text(_) => "Text",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of integers and floats.
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

    /// Compact form for the live status table.
    ///
    /// Floats: `0` stays `0`, values `>= 0.001` get three decimals and smaller
    /// ones scientific notation. Long text is cut at 50 characters.
    ///
    /// ```rust
    /// use autotest::value::Value;
    /// assert_eq!(Value::from(0.0).display_text(), "0");
    /// assert_eq!(Value::from(721.18).display_text(), "721.180");
    /// assert_eq!(Value::from(0.000012).display_text(), "1.200E-5");
    /// ```
    pub fn display_text(&self) -> String {
        match self {
            Value::Float(n) if *n == 0.0 => "0".to_string(),
            Value::Float(n) if *n >= 0.001 => format!("{:.3}", n),
            Value::Float(n) => format!("{:.3E}", n),
            Value::Text(s) if s.chars().count() > DISPLAY_TEXT_LIMIT => {
                let head: String = s.chars().take(DISPLAY_TEXT_LIMIT).collect();
                format!("{}...", head)
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Export text of an optional value: the value itself or [`UNSET`].
pub fn export_text(value: Option<&Value>) -> String {
    value.map_or_else(|| UNSET.to_string(), Value::to_string)
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}
