//! Field schema model: the recursive field node and its per-type payloads.
//!
//! A [`FieldNode`] is the editing-tree representation: it carries the typed,
//! per-tag attribute payload ([`FieldKind`]) plus transient editor state
//! (`expanded`, `level`, `parent_id`). Children are owned only through the
//! container payloads: `Struct::fields`, `Array::element` and `Command::cases`.
//! `parent_id` is a back-reference for lookup and is never used for mutation.

use crate::checksum;
use crate::value::Scalar;
use serde_json::{Map, Value as Json};
use std::fmt;
use std::str::FromStr;

/// Closed, ordered set of field tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldType {
    SignedInt,
    UnsignedInt,
    Float,
    String,
    Bcd,
    Timestamp,
    Bitfield,
    Encode,
    Array,
    Struct,
    MessageId,
    Command,
    Checksum,
    Padding,
    Reserved,
}

impl FieldType {
    pub const ALL: [FieldType; 15] = [
        FieldType::SignedInt,
        FieldType::UnsignedInt,
        FieldType::Float,
        FieldType::String,
        FieldType::Bcd,
        FieldType::Timestamp,
        FieldType::Bitfield,
        FieldType::Encode,
        FieldType::Array,
        FieldType::Struct,
        FieldType::MessageId,
        FieldType::Command,
        FieldType::Checksum,
        FieldType::Padding,
        FieldType::Reserved,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::SignedInt => "SignedInt",
            FieldType::UnsignedInt => "UnsignedInt",
            FieldType::Float => "Float",
            FieldType::String => "String",
            FieldType::Bcd => "Bcd",
            FieldType::Timestamp => "Timestamp",
            FieldType::Bitfield => "Bitfield",
            FieldType::Encode => "Encode",
            FieldType::Array => "Array",
            FieldType::Struct => "Struct",
            FieldType::MessageId => "MessageId",
            FieldType::Command => "Command",
            FieldType::Checksum => "Checksum",
            FieldType::Padding => "Padding",
            FieldType::Reserved => "Reserved",
        }
    }

    /// Base of generated names (`unsignedInt` → `unsignedInt1`, `unsignedInt2`, ...).
    pub fn base_name(self) -> &'static str {
        match self {
            FieldType::SignedInt => "signedInt",
            FieldType::UnsignedInt => "unsignedInt",
            FieldType::Float => "float",
            FieldType::String => "string",
            FieldType::Bcd => "bcd",
            FieldType::Timestamp => "timestamp",
            FieldType::Bitfield => "bitfield",
            FieldType::Encode => "encode",
            FieldType::Array => "array",
            FieldType::Struct => "struct",
            FieldType::MessageId => "messageId",
            FieldType::Command => "command",
            FieldType::Checksum => "checksum",
            FieldType::Padding => "padding",
            FieldType::Reserved => "reserved",
        }
    }

    pub fn is_container(self) -> bool {
        matches!(self, FieldType::Struct | FieldType::Array | FieldType::Command)
    }

    /// Types that accept `value_range` (and the legacy `min_value`/`max_value`).
    pub fn has_value_range(self) -> bool {
        matches!(
            self,
            FieldType::SignedInt | FieldType::UnsignedInt | FieldType::Float | FieldType::Bcd
        )
    }

    pub fn requires_name(self) -> bool {
        !matches!(self, FieldType::Padding | FieldType::Reserved)
    }

    /// Whether `valid_when` is part of the canonical attributes for this type.
    pub fn allows_valid_when(self) -> bool {
        !matches!(
            self,
            FieldType::MessageId
                | FieldType::Timestamp
                | FieldType::Checksum
                | FieldType::Padding
                | FieldType::Reserved
        )
    }

    /// Selectable byte lengths; `None` means unrestricted.
    pub fn byte_length_options(self) -> Option<&'static [u32]> {
        match self {
            FieldType::SignedInt
            | FieldType::UnsignedInt
            | FieldType::MessageId
            | FieldType::Bcd
            | FieldType::Encode
            | FieldType::Command => Some(&[1, 2, 4, 8]),
            FieldType::Timestamp => Some(&[4, 8]),
            FieldType::Bitfield | FieldType::Checksum | FieldType::Padding | FieldType::Reserved => None,
            _ => Some(&[]),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown field type: {}", s))
    }
}

/// Capability predicate: `Struct`, `Array` and `Command` hold children.
pub fn is_container(ty: FieldType) -> bool {
    ty.is_container()
}

/// Opaque node identifier, stable across edits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(String);

impl FieldId {
    pub fn generate() -> Self {
        FieldId(format!("field_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FieldId {
    fn from(s: &str) -> Self {
        FieldId(s.to_string())
    }
}

impl From<String> for FieldId {
    fn from(s: String) -> Self {
        FieldId(s)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Conditional presence: the field is meaningful only when `field` equals `value`.
/// Both halves are optional so a one-sided rule can be represented and reported.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidWhen {
    pub field: Option<String>,
    pub value: Option<Scalar>,
}

impl ValidWhen {
    pub fn has_field(&self) -> bool {
        self.field.as_deref().map_or(false, |f| !f.trim().is_empty())
    }

    pub fn has_value(&self) -> bool {
        self.value.as_ref().map_or(false, |v| !v.is_blank())
    }

    pub fn is_empty(&self) -> bool {
        !self.has_field() && !self.has_value()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueRange {
    pub min: Option<Scalar>,
    pub max: Option<Scalar>,
}

/// One `value → meaning` row of an `Encode` table (or a bit-field sub-field table).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EncodeMap {
    pub value: Option<Scalar>,
    pub meaning: Option<String>,
    pub extras: Map<String, Json>,
}

/// Bit range inside a `Bitfield`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubField {
    pub name: Option<String>,
    pub start_bit: Option<Scalar>,
    pub end_bit: Option<Scalar>,
    pub description: Option<String>,
    pub maps: Vec<EncodeMap>,
    pub extras: Map<String, Json>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntegerAttrs {
    pub byte_length: Option<Scalar>,
    pub default_value: Option<Scalar>,
    pub value_range: Option<Vec<ValueRange>>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageIdAttrs {
    pub byte_length: Option<Scalar>,
    pub value_type: Option<String>,
    pub message_id_value: Option<Scalar>,
    pub value_range: Option<Vec<ValueRange>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FloatAttrs {
    pub precision: Option<String>,
    pub default_value: Option<Scalar>,
    pub value_range: Option<Vec<ValueRange>>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BcdAttrs {
    pub byte_length: Option<Scalar>,
    pub default_value: Option<Scalar>,
    pub value_range: Option<Vec<ValueRange>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimestampAttrs {
    pub byte_length: Option<Scalar>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StringAttrs {
    pub length: Option<Scalar>,
    pub encoding: Option<String>,
    pub default_value: Option<Scalar>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BitfieldAttrs {
    pub byte_length: Option<Scalar>,
    pub sub_fields: Vec<SubField>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EncodeAttrs {
    pub base_type: Option<String>,
    pub byte_length: Option<Scalar>,
    pub maps: Vec<EncodeMap>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructAttrs {
    pub fields: Vec<FieldNode>,
}

/// Array: one element plus exactly one of the three length modes (checked by validation).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArrayAttrs {
    pub count: Option<Scalar>,
    pub count_from_field: Option<String>,
    pub bytes_in_trailer: Option<Scalar>,
    pub element: Option<Box<FieldNode>>,
}

impl ArrayAttrs {
    /// Number of length modes set.
    pub fn length_modes(&self) -> usize {
        let has_count = self.count.is_some();
        let has_from_field = self
            .count_from_field
            .as_deref()
            .map_or(false, |s| !s.is_empty());
        let has_trailer = self.bytes_in_trailer.is_some();
        [has_count, has_from_field, has_trailer]
            .iter()
            .filter(|b| **b)
            .count()
    }
}

/// One dispatch branch: discriminant literal → payload node.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandCase {
    pub key: String,
    pub field: FieldNode,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandAttrs {
    pub base_type: Option<String>,
    pub byte_length: Option<Scalar>,
    /// Insertion-ordered dispatch table; keys are unique.
    pub cases: Vec<CommandCase>,
}

impl CommandAttrs {
    /// True when `key` is already used, textually or as the same numeric literal.
    pub fn has_key(&self, key: &str) -> bool {
        let wanted = crate::parser::parse_discriminant(key).ok();
        self.cases.iter().any(|c| {
            c.key == key
                || match (wanted, crate::parser::parse_discriminant(&c.key).ok()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
        })
    }

    pub fn key_of(&self, id: &FieldId) -> Option<&str> {
        self.cases
            .iter()
            .find(|c| &c.field.id == id)
            .map(|c| c.key.as_str())
    }
}

/// `Padding` / `Reserved`: at least one of the two lengths must be set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PadAttrs {
    pub byte_length: Option<Scalar>,
    pub bit_length: Option<Scalar>,
    pub fill_value: Option<Scalar>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChecksumAttrs {
    pub algorithm: Option<String>,
    pub byte_length: Option<Scalar>,
    pub range_start_ref: Option<String>,
    pub range_end_ref: Option<String>,
    pub parameters: Option<Map<String, Json>>,
}

/// Per-tag payload. The set of attributes each variant holds is the
/// canonical whitelist for that tag.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    SignedInt(IntegerAttrs),
    UnsignedInt(IntegerAttrs),
    Float(FloatAttrs),
    String(StringAttrs),
    Bcd(BcdAttrs),
    Timestamp(TimestampAttrs),
    Bitfield(BitfieldAttrs),
    Encode(EncodeAttrs),
    Array(ArrayAttrs),
    Struct(StructAttrs),
    MessageId(MessageIdAttrs),
    Command(CommandAttrs),
    Checksum(ChecksumAttrs),
    Padding(PadAttrs),
    Reserved(PadAttrs),
}

impl FieldKind {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldKind::SignedInt(_) => FieldType::SignedInt,
            FieldKind::UnsignedInt(_) => FieldType::UnsignedInt,
            FieldKind::Float(_) => FieldType::Float,
            FieldKind::String(_) => FieldType::String,
            FieldKind::Bcd(_) => FieldType::Bcd,
            FieldKind::Timestamp(_) => FieldType::Timestamp,
            FieldKind::Bitfield(_) => FieldType::Bitfield,
            FieldKind::Encode(_) => FieldType::Encode,
            FieldKind::Array(_) => FieldType::Array,
            FieldKind::Struct(_) => FieldType::Struct,
            FieldKind::MessageId(_) => FieldType::MessageId,
            FieldKind::Command(_) => FieldType::Command,
            FieldKind::Checksum(_) => FieldType::Checksum,
            FieldKind::Padding(_) => FieldType::Padding,
            FieldKind::Reserved(_) => FieldType::Reserved,
        }
    }

    /// Empty payload for `ty` (no defaults).
    pub fn empty(ty: FieldType) -> FieldKind {
        match ty {
            FieldType::SignedInt => FieldKind::SignedInt(IntegerAttrs::default()),
            FieldType::UnsignedInt => FieldKind::UnsignedInt(IntegerAttrs::default()),
            FieldType::Float => FieldKind::Float(FloatAttrs::default()),
            FieldType::String => FieldKind::String(StringAttrs::default()),
            FieldType::Bcd => FieldKind::Bcd(BcdAttrs::default()),
            FieldType::Timestamp => FieldKind::Timestamp(TimestampAttrs::default()),
            FieldType::Bitfield => FieldKind::Bitfield(BitfieldAttrs::default()),
            FieldType::Encode => FieldKind::Encode(EncodeAttrs::default()),
            FieldType::Array => FieldKind::Array(ArrayAttrs::default()),
            FieldType::Struct => FieldKind::Struct(StructAttrs::default()),
            FieldType::MessageId => FieldKind::MessageId(MessageIdAttrs::default()),
            FieldType::Command => FieldKind::Command(CommandAttrs::default()),
            FieldType::Checksum => FieldKind::Checksum(ChecksumAttrs::default()),
            FieldType::Padding => FieldKind::Padding(PadAttrs::default()),
            FieldType::Reserved => FieldKind::Reserved(PadAttrs::default()),
        }
    }

    /// Payload of a freshly created field of type `ty`, seeded with defaults.
    pub fn with_defaults(ty: FieldType) -> FieldKind {
        let int = |n: i64| Some(Scalar::Int(n));
        let text = |s: &str| Some(s.to_string());
        match ty {
            FieldType::SignedInt => FieldKind::SignedInt(IntegerAttrs {
                byte_length: int(4),
                ..Default::default()
            }),
            FieldType::UnsignedInt => FieldKind::UnsignedInt(IntegerAttrs {
                byte_length: int(4),
                ..Default::default()
            }),
            FieldType::Float => FieldKind::Float(FloatAttrs {
                precision: text("float"),
                ..Default::default()
            }),
            FieldType::String => FieldKind::String(StringAttrs {
                length: int(0),
                encoding: text("utf8"),
                default_value: Some(Scalar::Text(String::new())),
            }),
            FieldType::Bcd => FieldKind::Bcd(BcdAttrs {
                byte_length: int(4),
                default_value: Some(Scalar::Text(String::new())),
                value_range: None,
            }),
            FieldType::Timestamp => FieldKind::Timestamp(TimestampAttrs {
                byte_length: int(4),
                unit: text("day-milliseconds"),
            }),
            FieldType::Bitfield => FieldKind::Bitfield(BitfieldAttrs {
                byte_length: int(1),
                sub_fields: Vec::new(),
            }),
            FieldType::Encode => FieldKind::Encode(EncodeAttrs {
                base_type: text("UnsignedInt"),
                byte_length: int(1),
                maps: Vec::new(),
            }),
            FieldType::Array => FieldKind::Array(ArrayAttrs::default()),
            FieldType::Struct => FieldKind::Struct(StructAttrs::default()),
            FieldType::MessageId => FieldKind::MessageId(MessageIdAttrs {
                byte_length: int(2),
                value_type: text("UnsignedInt"),
                ..Default::default()
            }),
            FieldType::Command => FieldKind::Command(CommandAttrs {
                base_type: text("unsigned"),
                byte_length: int(1),
                cases: Vec::new(),
            }),
            FieldType::Checksum => FieldKind::Checksum(checksum_attrs(checksum::DEFAULT_ALGORITHM)),
            FieldType::Padding => FieldKind::Padding(PadAttrs {
                byte_length: int(1),
                ..Default::default()
            }),
            FieldType::Reserved => FieldKind::Reserved(PadAttrs {
                byte_length: int(1),
                ..Default::default()
            }),
        }
    }
}

/// Checksum payload for `algorithm` with its default parameters.
pub fn checksum_attrs(algorithm: &str) -> ChecksumAttrs {
    ChecksumAttrs {
        algorithm: Some(algorithm.to_string()),
        byte_length: Some(Scalar::Int(2)),
        range_start_ref: None,
        range_end_ref: None,
        parameters: Some(checksum::default_parameters(algorithm)),
    }
}

/// A node of the editing tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub id: FieldId,
    /// Empty when unnamed (only legal for `Padding`/`Reserved`).
    pub name: String,
    pub description: Option<String>,
    pub valid_when: Option<ValidWhen>,
    pub kind: FieldKind,
    /// Editor display state for containers.
    pub expanded: bool,
    /// Derived display depth; not authoritative.
    pub level: Option<usize>,
    /// Non-owning back-reference.
    pub parent_id: Option<FieldId>,
    /// Attributes outside the type's whitelist (legacy or editor-only); dropped on normalization.
    pub extras: Map<String, Json>,
}

/// Typed constructor: a fresh node of type `ty` with type-appropriate defaults.
/// The name is left empty; [`FieldTree::create_field`](crate::tree::FieldTree::create_field)
/// assigns a unique one.
pub fn new_field(ty: FieldType) -> FieldNode {
    FieldNode {
        id: FieldId::generate(),
        name: String::new(),
        description: None,
        valid_when: None,
        kind: FieldKind::with_defaults(ty),
        expanded: ty.is_container(),
        level: None,
        parent_id: None,
        extras: Map::new(),
    }
}

impl FieldNode {
    /// Builder-style rename, handy when assembling trees by hand.
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn field_type(&self) -> FieldType {
        self.kind.field_type()
    }

    pub fn is_container(&self) -> bool {
        self.field_type().is_container()
    }

    /// Display name, or `fallback` when unnamed.
    pub fn display_name<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.name.is_empty() {
            fallback
        } else {
            &self.name
        }
    }

    /// Editing-list view of the children: struct fields in order, the array
    /// element as a one-entry list, command branches in insertion order.
    pub fn children(&self) -> Vec<&FieldNode> {
        match &self.kind {
            FieldKind::Struct(s) => s.fields.iter().collect(),
            FieldKind::Array(a) => a.element.iter().map(|e| e.as_ref()).collect(),
            FieldKind::Command(c) => c.cases.iter().map(|c| &c.field).collect(),
            _ => Vec::new(),
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut FieldNode> {
        match &mut self.kind {
            FieldKind::Struct(s) => s.fields.iter_mut().collect(),
            FieldKind::Array(a) => a.element.iter_mut().map(|e| e.as_mut()).collect(),
            FieldKind::Command(c) => c.cases.iter_mut().map(|c| &mut c.field).collect(),
            _ => Vec::new(),
        }
    }

    pub fn has_children(&self) -> bool {
        match &self.kind {
            FieldKind::Struct(s) => !s.fields.is_empty(),
            FieldKind::Array(a) => a.element.is_some(),
            FieldKind::Command(c) => !c.cases.is_empty(),
            _ => false,
        }
    }

    /// Drop every child (the container payload's other attributes are kept).
    pub fn clear_children(&mut self) {
        match &mut self.kind {
            FieldKind::Struct(s) => s.fields.clear(),
            FieldKind::Array(a) => a.element = None,
            FieldKind::Command(c) => c.cases.clear(),
            _ => {}
        }
    }

    /// Discriminant of the branch holding `child`, when this node is a command.
    pub fn case_key_of(&self, child: &FieldId) -> Option<&str> {
        match &self.kind {
            FieldKind::Command(c) => c.key_of(child),
            _ => None,
        }
    }

    /// Pre-order visit of this node and every descendant.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a FieldNode)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Depth-first search by id.
    pub fn find(&self, id: &FieldId) -> Option<&FieldNode> {
        if &self.id == id {
            return Some(self);
        }
        self.children().into_iter().find_map(|c| c.find(id))
    }

    pub fn find_mut(&mut self, id: &FieldId) -> Option<&mut FieldNode> {
        if &self.id == id {
            return Some(self);
        }
        self.children_mut().into_iter().find_map(|c| c.find_mut(id))
    }

    /// Detach the first descendant with `id` (depth-first), with its subtree.
    pub fn remove_descendant(&mut self, id: &FieldId) -> Option<FieldNode> {
        match &mut self.kind {
            FieldKind::Struct(s) => remove_from_list(&mut s.fields, id),
            FieldKind::Array(a) => {
                if a.element.as_ref().map_or(false, |e| &e.id == id) {
                    return a.element.take().map(|e| *e);
                }
                a.element.as_mut().and_then(|e| e.remove_descendant(id))
            }
            FieldKind::Command(c) => {
                if let Some(pos) = c.cases.iter().position(|cs| &cs.field.id == id) {
                    return Some(c.cases.remove(pos).field);
                }
                c.cases
                    .iter_mut()
                    .find_map(|cs| cs.field.remove_descendant(id))
            }
            _ => None,
        }
    }

    /// Give this node and every descendant a fresh id (and relink back-references).
    pub fn assign_fresh_ids(&mut self) {
        self.id = FieldId::generate();
        let parent = self.id.clone();
        for child in self.children_mut() {
            child.assign_fresh_ids();
            child.parent_id = Some(parent.clone());
        }
    }

    /// Recompute `level` and `parent_id` for this subtree.
    pub fn relink(&mut self, level: usize, parent: Option<&FieldId>) {
        self.level = Some(level);
        self.parent_id = parent.cloned();
        let id = self.id.clone();
        for child in self.children_mut() {
            child.relink(level + 1, Some(&id));
        }
    }
}

/// Depth-first search-and-splice over a child list: first match wins.
pub fn remove_from_list(list: &mut Vec<FieldNode>, id: &FieldId) -> Option<FieldNode> {
    if let Some(pos) = list.iter().position(|f| &f.id == id) {
        return Some(list.remove(pos));
    }
    list.iter_mut().find_map(|f| f.remove_descendant(id))
}

/// Every non-empty name reachable from `roots`, in pre-order (duplicates kept).
pub fn collect_names(roots: &[FieldNode]) -> Vec<String> {
    let mut out = Vec::new();
    for root in roots {
        root.walk(&mut |n| {
            if !n.name.is_empty() {
                out.push(n.name.clone());
            }
        });
    }
    out
}
