//! Attribute values carried by field nodes (defaults, lengths, discriminants, conditions).
//!
//! Schemas that went through a string-typed transport come back with numbers as
//! strings, so every loosely-typed attribute is a [`Scalar`] and the coercion
//! helpers below repair them where a number is expected.

use serde_json::Value as Json;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Arrays/objects kept verbatim (e.g. a structured `valid_when.value`).
    Raw(Json),
}

impl Scalar {
    /// Convert a JSON value; `null` is treated as absent.
    pub fn from_json(v: &Json) -> Option<Scalar> {
        match v {
            Json::Null => None,
            Json::Bool(b) => Some(Scalar::Bool(*b)),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Scalar::Int(i))
                } else {
                    n.as_f64().map(Scalar::Float)
                }
            }
            Json::String(s) => Some(Scalar::Text(s.clone())),
            other => Some(Scalar::Raw(other.clone())),
        }
    }

    /// JSON form. Non-finite floats have no JSON representation and become `null`.
    pub fn to_json(&self) -> Json {
        match self {
            Scalar::Bool(b) => Json::Bool(*b),
            Scalar::Int(i) => Json::from(*i),
            Scalar::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Scalar::Text(s) => Json::String(s.clone()),
            Scalar::Raw(v) => v.clone(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Scalar::Int(_) | Scalar::Float(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Scalar::Text(_))
    }

    /// Empty string, or NaN.
    pub fn is_blank(&self) -> bool {
        match self {
            Scalar::Text(s) => s.trim().is_empty(),
            Scalar::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            Scalar::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Parse a numeric-looking string as an integer. Anything else is returned unchanged.
    pub fn coerce_int(self) -> Scalar {
        match self {
            Scalar::Text(s) => match s.trim().parse::<i64>() {
                Ok(i) => Scalar::Int(i),
                Err(_) => Scalar::Text(s),
            },
            other => other,
        }
    }

    /// Parse a numeric-looking string as an integer, falling back to a float.
    pub fn coerce_number(self) -> Scalar {
        match self {
            Scalar::Text(s) => {
                let t = s.trim();
                if let Ok(i) = t.parse::<i64>() {
                    Scalar::Int(i)
                } else {
                    match t.parse::<f64>() {
                        Ok(f) if f.is_finite() => Scalar::Float(f),
                        _ => Scalar::Text(s),
                    }
                }
            }
            other => other,
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => write!(f, "{}", s),
            Scalar::Raw(v) => write!(f, "{}", v),
        }
    }
}
