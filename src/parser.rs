//! Parse discriminant literals and field references using PEST.

use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct SchemaParser;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid discriminant `{0}`: expected a decimal or 0x-prefixed hex literal")]
    InvalidDiscriminant(String),
    #[error("discriminant `{0}` is out of range")]
    DiscriminantOutOfRange(String),
    #[error("invalid field reference `{0}`")]
    InvalidReference(String),
}

/// Numeric value of a command branch key. `"0x01"` and `"1"` are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Discriminant(pub i128);

/// One path segment: `items[2]` → name `items`, indices `[2]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSegment {
    pub name: String,
    pub indices: Vec<u64>,
}

/// Reference to another field by (dotted) path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub segments: Vec<RefSegment>,
}

impl FieldRef {
    /// Name of the referenced field (the last segment); names are tree-unique.
    pub fn target_name(&self) -> &str {
        self.segments.last().map(|s| s.name.as_str()).unwrap_or("")
    }
}

/// Parse a branch key such as `0x1F`, `31` or `-2`.
pub fn parse_discriminant(source: &str) -> Result<Discriminant, ParseError> {
    let text = source.trim();
    let pairs = SchemaParser::parse(Rule::discriminant, text)
        .map_err(|_| ParseError::InvalidDiscriminant(source.to_string()))?;
    let pair = pairs
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::InvalidDiscriminant(source.to_string()))?;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::hex_literal => {
                let digits = &inner.as_str()[2..];
                return u64::from_str_radix(digits, 16)
                    .map(|v| Discriminant(v as i128))
                    .map_err(|_| ParseError::DiscriminantOutOfRange(source.to_string()));
            }
            Rule::dec_literal => {
                return inner
                    .as_str()
                    .parse::<i64>()
                    .map(|v| Discriminant(v as i128))
                    .map_err(|_| ParseError::DiscriminantOutOfRange(source.to_string()));
            }
            _ => {}
        }
    }
    Err(ParseError::InvalidDiscriminant(source.to_string()))
}

/// Parse a field reference such as `header.length` or `items[0].count`.
pub fn parse_field_ref(source: &str) -> Result<FieldRef, ParseError> {
    let pairs = SchemaParser::parse(Rule::field_ref, source.trim())
        .map_err(|_| ParseError::InvalidReference(source.to_string()))?;
    let pair = pairs
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::InvalidReference(source.to_string()))?;
    let mut segments = Vec::new();
    for seg in pair.into_inner() {
        if seg.as_rule() != Rule::segment {
            continue;
        }
        let mut name = String::new();
        let mut indices = Vec::new();
        for part in seg.into_inner() {
            match part.as_rule() {
                Rule::ident => name = part.as_str().to_string(),
                Rule::index => {
                    let i = part
                        .as_str()
                        .parse::<u64>()
                        .map_err(|_| ParseError::InvalidReference(source.to_string()))?;
                    indices.push(i);
                }
                _ => {}
            }
        }
        segments.push(RefSegment { name, indices });
    }
    if segments.is_empty() {
        return Err(ParseError::InvalidReference(source.to_string()));
    }
    Ok(FieldRef { segments })
}
