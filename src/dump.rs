//! Format the editing tree for display (tree view rows, byte-length column).

use crate::field::{FieldKind, FieldNode};
use crate::tree::{FieldTree, FlatEntry};
use crate::value::Scalar;

fn scalar_or_dash(v: &Option<Scalar>) -> String {
    match v {
        Some(s) if !s.is_blank() => s.to_string(),
        _ => "-".to_string(),
    }
}

/// Byte-length column: the configured length, `variable` for unsized strings
/// and arrays, `-` where the type has no single length.
pub fn display_byte_length(node: &FieldNode) -> String {
    match &node.kind {
        FieldKind::SignedInt(a) | FieldKind::UnsignedInt(a) => scalar_or_dash(&a.byte_length),
        FieldKind::MessageId(a) => scalar_or_dash(&a.byte_length),
        FieldKind::Bcd(a) => scalar_or_dash(&a.byte_length),
        FieldKind::Timestamp(a) => scalar_or_dash(&a.byte_length),
        FieldKind::Bitfield(a) => scalar_or_dash(&a.byte_length),
        FieldKind::Encode(a) => scalar_or_dash(&a.byte_length),
        FieldKind::Checksum(a) => scalar_or_dash(&a.byte_length),
        FieldKind::Float(a) => match a.precision.as_deref() {
            Some("double") => "8".to_string(),
            Some(_) => "4".to_string(),
            None => "-".to_string(),
        },
        FieldKind::String(a) => match a.length.as_ref().and_then(Scalar::as_i64) {
            Some(n) if n > 0 => n.to_string(),
            _ => "variable".to_string(),
        },
        FieldKind::Padding(a) | FieldKind::Reserved(a) => match (&a.byte_length, &a.bit_length) {
            (Some(b), _) if !b.is_blank() => b.to_string(),
            (_, Some(bits)) if !bits.is_blank() => format!("{} bits", bits),
            _ => "-".to_string(),
        },
        FieldKind::Array(_) => "variable".to_string(),
        FieldKind::Struct(_) | FieldKind::Command(_) => "-".to_string(),
    }
}

/// One line per row of the flat view, indented two spaces per level.
/// Containers show `▾` (expanded) or `▸`; command branches carry their key.
pub fn render_tree(tree: &FieldTree, show_placeholders: bool) -> String {
    let mut lines = Vec::new();
    for entry in tree.flatten() {
        let pad = "  ".repeat(entry.level());
        match entry {
            FlatEntry::Placeholder { .. } => {
                if show_placeholders {
                    lines.push(format!("{}  ...", pad));
                }
            }
            FlatEntry::Field(row) => {
                let marker = if !row.field_type.is_container() {
                    "-"
                } else if row.expanded {
                    "▾"
                } else {
                    "▸"
                };
                let name = if row.name.is_empty() {
                    "<unnamed>"
                } else {
                    row.name.as_str()
                };
                let bytes = tree
                    .find(&row.id)
                    .map(display_byte_length)
                    .unwrap_or_else(|| "-".to_string());
                let key = row
                    .case_key
                    .as_deref()
                    .map(|k| format!(" [case {}]", k))
                    .unwrap_or_default();
                lines.push(format!(
                    "{}{} {}: {} ({}){}",
                    pad, marker, name, row.field_type, bytes, key
                ));
            }
        }
    }
    lines.join("\n")
}
