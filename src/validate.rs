//! Structural validation of field schemas.
//!
//! ## Rules
//!
//! - **Name**: every field except `Padding`/`Reserved` needs a non-empty name.
//! - **Required attributes**: per type (byte lengths, units, precision, tables...).
//! - **Array length**: exactly one of `count`, `count_from_field`, `bytes_in_trailer`.
//! - **Conditional presence**: `valid_when.field` and `valid_when.value` go together.
//! - **Bit-field sub-fields**: each needs `name`, `start_bit`, `end_bit`.
//!
//! [`validate_schema`] adds the tree-wide rules: unique names, well-formed and
//! distinct command discriminants, and references that resolve to a field.
//!
//! Violations are data, never errors. Validation does not stop at the first
//! problem and never mutates the tree.

use crate::config::EngineConfig;
use crate::field::*;
use crate::parser::{parse_discriminant, parse_field_ref};
use crate::value::Scalar;
use std::collections::HashSet;
use std::fmt;

/// What is wrong with one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    /// A required attribute is absent or blank.
    Missing(&'static str),
    /// Array without any length mode.
    LengthDefinitionMissing,
    /// Array with more than one length mode.
    LengthDefinitionConflict,
    DefaultNotNumeric,
    DefaultNotString,
    /// `valid_when.field` set without a value.
    ValidWhenValueMissing,
    /// `valid_when.value` set without a field.
    ValidWhenFieldMissing,
    DuplicateName,
    InvalidDiscriminant(String),
    DuplicateDiscriminant(String),
    InvalidReference { attr: &'static str, text: String },
    DanglingReference { attr: &'static str, target: String },
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::Missing(attr) => f.write_str(attr),
            Problem::LengthDefinitionMissing => f.write_str("length definition missing"),
            Problem::LengthDefinitionConflict => f.write_str("length definition conflict"),
            Problem::DefaultNotNumeric => f.write_str("default_value must be numeric"),
            Problem::DefaultNotString => f.write_str("default_value must be a string"),
            Problem::ValidWhenValueMissing => f.write_str("valid_when.value"),
            Problem::ValidWhenFieldMissing => f.write_str("valid_when.field"),
            Problem::DuplicateName => f.write_str("duplicate name"),
            Problem::InvalidDiscriminant(k) => write!(f, "invalid discriminant `{}`", k),
            Problem::DuplicateDiscriminant(k) => write!(f, "duplicate discriminant `{}`", k),
            Problem::InvalidReference { attr, text } => {
                write!(f, "{}: invalid reference `{}`", attr, text)
            }
            Problem::DanglingReference { attr, target } => {
                write!(f, "{}: unknown field `{}`", attr, target)
            }
        }
    }
}

/// All problems found on one field (or bit-field sub-field).
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Field name, or its path when unnamed.
    pub name: String,
    /// `UnsignedInt`, `Array`, ... or `Bitfield.subField`.
    pub field_type: String,
    pub problems: Vec<Problem>,
    /// Ancestry trail: `header.items.element`, `cmd.cases[0x01]`, `[2]`.
    pub path: String,
}

impl Violation {
    pub fn labels(&self) -> Vec<String> {
        self.problems.iter().map(|p| p.to_string()).collect()
    }

    pub fn has(&self, problem: &Problem) -> bool {
        self.problems.contains(problem)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "• {} ({}): {}",
            self.path,
            self.field_type,
            self.labels().join(", ")
        )
    }
}

/// Path of a child at `index` in a struct's field list (or the root list when
/// `parent` is empty). Unnamed fields fall back to their position.
pub fn child_path(parent: &str, node: &FieldNode, index: usize) -> String {
    match (parent.is_empty(), node.name.is_empty()) {
        (true, false) => node.name.clone(),
        (true, true) => format!("[{}]", index),
        (false, false) => format!("{}.{}", parent, node.name),
        (false, true) => format!("{}[{}]", parent, index),
    }
}

/// Pre-order visit with the path of every node.
pub fn walk_with_paths<'a>(node: &'a FieldNode, path: &str, f: &mut dyn FnMut(&'a FieldNode, &str)) {
    f(node, path);
    match &node.kind {
        FieldKind::Struct(s) => {
            for (i, child) in s.fields.iter().enumerate() {
                walk_with_paths(child, &child_path(path, child, i), f);
            }
        }
        FieldKind::Array(a) => {
            if let Some(element) = &a.element {
                walk_with_paths(element, &format!("{}.element", path), f);
            }
        }
        FieldKind::Command(c) => {
            for case in &c.cases {
                walk_with_paths(&case.field, &format!("{}.cases[{}]", path, case.key), f);
            }
        }
        _ => {}
    }
}

/// Validate `node` and its whole subtree.
pub fn validate(node: &FieldNode, path: &str) -> Vec<Violation> {
    let mut out = Vec::new();
    walk_with_paths(node, path, &mut |n, p| check_node(n, p, &mut out));
    out
}

/// Validate a list of sibling fields (e.g. the root list) under `parent_path`.
pub fn validate_fields(fields: &[FieldNode], parent_path: &str) -> Vec<Violation> {
    fields
        .iter()
        .enumerate()
        .flat_map(|(i, f)| validate(f, &child_path(parent_path, f, i)))
        .collect()
}

fn blank_scalar(v: &Option<Scalar>) -> bool {
    v.as_ref().map_or(true, |s| s.is_blank())
}

fn blank_str(v: &Option<String>) -> bool {
    v.as_deref().map_or(true, |s| s.trim().is_empty())
}

fn check_node(node: &FieldNode, path: &str, out: &mut Vec<Violation>) {
    let ty = node.field_type();
    let mut problems = Vec::new();

    if ty.requires_name() && node.name.trim().is_empty() {
        problems.push(Problem::Missing("name"));
    }

    let require = |missing: bool, attr: &'static str, problems: &mut Vec<Problem>| {
        if missing {
            problems.push(Problem::Missing(attr));
        }
    };

    match &node.kind {
        FieldKind::SignedInt(a) | FieldKind::UnsignedInt(a) => {
            require(blank_scalar(&a.byte_length), "byte_length", &mut problems);
            if let Some(d) = a.default_value.as_ref().filter(|d| !d.is_blank()) {
                if !d.is_numeric() {
                    problems.push(Problem::DefaultNotNumeric);
                }
            }
        }
        FieldKind::MessageId(a) => {
            require(blank_scalar(&a.byte_length), "byte_length", &mut problems);
            require(blank_str(&a.value_type), "value_type", &mut problems);
            require(blank_scalar(&a.message_id_value), "message_id_value", &mut problems);
        }
        FieldKind::Float(a) => {
            require(blank_str(&a.precision), "precision", &mut problems);
            if let Some(d) = a.default_value.as_ref().filter(|d| !d.is_blank()) {
                if !d.is_numeric() {
                    problems.push(Problem::DefaultNotNumeric);
                }
            }
        }
        FieldKind::Bcd(a) => {
            require(blank_scalar(&a.byte_length), "byte_length", &mut problems);
            if let Some(d) = &a.default_value {
                if !d.is_text() {
                    problems.push(Problem::DefaultNotString);
                }
            }
        }
        FieldKind::Timestamp(a) => {
            require(blank_scalar(&a.byte_length), "byte_length", &mut problems);
            require(blank_str(&a.unit), "unit", &mut problems);
        }
        FieldKind::String(a) => {
            require(blank_scalar(&a.length), "length", &mut problems);
        }
        FieldKind::Bitfield(a) => {
            require(blank_scalar(&a.byte_length), "byte_length", &mut problems);
            require(a.sub_fields.is_empty(), "sub_fields", &mut problems);
        }
        FieldKind::Encode(a) => {
            require(blank_str(&a.base_type), "base_type", &mut problems);
            require(blank_scalar(&a.byte_length), "byte_length", &mut problems);
            require(a.maps.is_empty(), "maps", &mut problems);
        }
        FieldKind::Struct(s) => {
            require(s.fields.is_empty(), "fields", &mut problems);
        }
        FieldKind::Array(a) => {
            match a.length_modes() {
                0 => problems.push(Problem::LengthDefinitionMissing),
                1 => {}
                _ => problems.push(Problem::LengthDefinitionConflict),
            }
            require(a.element.is_none(), "element", &mut problems);
        }
        FieldKind::Command(c) => {
            require(blank_str(&c.base_type), "base_type", &mut problems);
            require(blank_scalar(&c.byte_length), "byte_length", &mut problems);
            require(c.cases.is_empty(), "cases", &mut problems);
        }
        FieldKind::Padding(a) | FieldKind::Reserved(a) => {
            require(
                blank_scalar(&a.byte_length) && blank_scalar(&a.bit_length),
                "byte_length or bit_length",
                &mut problems,
            );
        }
        FieldKind::Checksum(a) => {
            require(blank_str(&a.algorithm), "algorithm", &mut problems);
            require(blank_scalar(&a.byte_length), "byte_length", &mut problems);
        }
    }

    if let Some(vw) = &node.valid_when {
        match (vw.has_field(), vw.has_value()) {
            (true, false) => problems.push(Problem::ValidWhenValueMissing),
            (false, true) => problems.push(Problem::ValidWhenFieldMissing),
            _ => {}
        }
    }

    if !problems.is_empty() {
        out.push(Violation {
            name: node.display_name(path).to_string(),
            field_type: ty.to_string(),
            problems,
            path: path.to_string(),
        });
    }

    if let FieldKind::Bitfield(a) = &node.kind {
        for (i, sub) in a.sub_fields.iter().enumerate() {
            let sub_path = format!("{}.sub_fields[{}]", path, i);
            let mut problems = Vec::new();
            if blank_str(&sub.name) {
                problems.push(Problem::Missing("name"));
            }
            if blank_scalar(&sub.start_bit) {
                problems.push(Problem::Missing("start_bit"));
            }
            if blank_scalar(&sub.end_bit) {
                problems.push(Problem::Missing("end_bit"));
            }
            if !problems.is_empty() {
                out.push(Violation {
                    name: sub.name.clone().unwrap_or_else(|| sub_path.clone()),
                    field_type: "Bitfield.subField".to_string(),
                    problems,
                    path: sub_path,
                });
            }
        }
    }
}

/// Validate a whole schema: every root plus the tree-wide rules.
pub fn validate_schema(roots: &[FieldNode], config: &EngineConfig) -> Vec<Violation> {
    let mut out = validate_fields(roots, "");
    let names: HashSet<String> = collect_names(roots).into_iter().collect();
    let mut seen: HashSet<&str> = HashSet::new();

    for (i, root) in roots.iter().enumerate() {
        walk_with_paths(root, &child_path("", root, i), &mut |node, path| {
            let mut problems = Vec::new();

            if !node.name.is_empty() && !seen.insert(node.name.as_str()) {
                problems.push(Problem::DuplicateName);
            }

            if let FieldKind::Command(c) = &node.kind {
                let mut keys = HashSet::new();
                for case in &c.cases {
                    match parse_discriminant(&case.key) {
                        Ok(d) => {
                            if !keys.insert(d) {
                                problems.push(Problem::DuplicateDiscriminant(case.key.clone()));
                            }
                        }
                        Err(_) => problems.push(Problem::InvalidDiscriminant(case.key.clone())),
                    }
                }
            }

            if config.check_references {
                for (attr, text) in references(node) {
                    match parse_field_ref(text) {
                        Ok(r) if names.contains(r.target_name()) => {}
                        Ok(r) => problems.push(Problem::DanglingReference {
                            attr,
                            target: r.target_name().to_string(),
                        }),
                        Err(_) => problems.push(Problem::InvalidReference {
                            attr,
                            text: text.to_string(),
                        }),
                    }
                }
            }

            if !problems.is_empty() {
                out.push(Violation {
                    name: node.display_name(path).to_string(),
                    field_type: node.field_type().to_string(),
                    problems,
                    path: path.to_string(),
                });
            }
        });
    }
    out
}

/// Attributes of `node` that name another field.
fn references(node: &FieldNode) -> Vec<(&'static str, &str)> {
    let mut refs = Vec::new();
    if let Some(vw) = node.valid_when.as_ref().filter(|vw| vw.has_field()) {
        if let Some(f) = vw.field.as_deref() {
            refs.push(("valid_when.field", f));
        }
    }
    fn non_empty(s: &Option<String>) -> Option<&str> {
        s.as_deref().filter(|s| !s.trim().is_empty())
    }
    match &node.kind {
        FieldKind::Array(a) => {
            if let Some(src) = non_empty(&a.count_from_field) {
                refs.push(("count_from_field", src));
            }
        }
        FieldKind::Checksum(c) => {
            if let Some(start) = non_empty(&c.range_start_ref) {
                refs.push(("range_start_ref", start));
            }
            if let Some(end) = non_empty(&c.range_end_ref) {
                refs.push(("range_end_ref", end));
            }
        }
        _ => {}
    }
    refs
}

/// One line per violation: `• <path> (<type>): <labels>`.
pub fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array_with(count: Option<i64>, from_field: Option<&str>, trailer: Option<i64>) -> FieldNode {
        let mut arr = new_field(FieldType::Array).named("arr");
        if let FieldKind::Array(a) = &mut arr.kind {
            a.count = count.map(Scalar::Int);
            a.count_from_field = from_field.map(str::to_string);
            a.bytes_in_trailer = trailer.map(Scalar::Int);
            a.element = Some(Box::new(new_field(FieldType::UnsignedInt).named("item")));
        }
        arr
    }

    #[test]
    fn array_length_modes() {
        let v = validate(&array_with(None, None, None), "arr");
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].problems, vec![Problem::LengthDefinitionMissing]);

        assert!(validate(&array_with(Some(3), None, None), "arr").is_empty());
        assert!(validate(&array_with(None, Some("n"), None), "arr").is_empty());
        assert!(validate(&array_with(None, None, Some(2)), "arr").is_empty());

        let v = validate(&array_with(Some(3), None, Some(2)), "arr");
        assert_eq!(v[0].problems, vec![Problem::LengthDefinitionConflict]);
    }

    #[test]
    fn collects_every_problem_without_stopping() {
        let mut s = new_field(FieldType::Struct).named("outer");
        let mut bad = new_field(FieldType::Timestamp);
        if let FieldKind::Timestamp(t) = &mut bad.kind {
            t.unit = None;
        }
        let mut bits = new_field(FieldType::Bitfield).named("flags");
        if let FieldKind::Bitfield(b) = &mut bits.kind {
            b.sub_fields.push(SubField {
                name: Some("ready".into()),
                start_bit: Some(Scalar::Int(0)),
                ..Default::default()
            });
        }
        if let FieldKind::Struct(st) = &mut s.kind {
            st.fields.push(bad);
            st.fields.push(bits);
        }
        let v = validate(&s, "outer");
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].path, "outer[0]");
        assert_eq!(v[0].problems, vec![Problem::Missing("name"), Problem::Missing("unit")]);
        assert_eq!(v[1].field_type, "Bitfield.subField");
        assert_eq!(v[1].path, "outer.flags.sub_fields[0]");
        assert_eq!(v[1].problems, vec![Problem::Missing("end_bit")]);
    }

    #[test]
    fn one_sided_valid_when() {
        let mut f = new_field(FieldType::UnsignedInt).named("opt");
        f.valid_when = Some(ValidWhen {
            field: Some("kind".into()),
            value: None,
        });
        let v = validate(&f, "opt");
        assert_eq!(v[0].problems, vec![Problem::ValidWhenValueMissing]);

        f.valid_when = Some(ValidWhen {
            field: None,
            value: Some(Scalar::Int(2)),
        });
        let v = validate(&f, "opt");
        assert_eq!(v[0].problems, vec![Problem::ValidWhenFieldMissing]);
    }

    #[test]
    fn padding_needs_a_length_but_no_name() {
        let mut p = new_field(FieldType::Padding);
        assert!(validate(&p, "[0]").is_empty());
        if let FieldKind::Padding(a) = &mut p.kind {
            a.byte_length = None;
        }
        let v = validate(&p, "[0]");
        assert_eq!(v[0].problems, vec![Problem::Missing("byte_length or bit_length")]);
    }

    #[test]
    fn schema_rules() {
        let mut cmd = new_field(FieldType::Command).named("cmd");
        if let FieldKind::Command(c) = &mut cmd.kind {
            c.cases.push(CommandCase {
                key: "0x01".into(),
                field: new_field(FieldType::UnsignedInt).named("a"),
            });
            c.cases.push(CommandCase {
                key: "1".into(),
                field: new_field(FieldType::UnsignedInt).named("len"),
            });
            c.cases.push(CommandCase {
                key: "zz".into(),
                field: new_field(FieldType::UnsignedInt).named("b"),
            });
        }
        let dup = new_field(FieldType::UnsignedInt).named("len");
        let arr = array_with(None, Some("missing"), None);
        let roots = vec![cmd, dup, arr];

        let v = validate_schema(&roots, &EngineConfig::default());
        let cmd_v = v.iter().find(|v| v.path == "cmd").expect("cmd violation");
        assert!(cmd_v.has(&Problem::DuplicateDiscriminant("1".into())));
        assert!(cmd_v.has(&Problem::InvalidDiscriminant("zz".into())));
        assert!(v.iter().any(|v| v.path == "len" && v.has(&Problem::DuplicateName)));
        assert!(v.iter().any(|v| v.path == "arr"
            && v.has(&Problem::DanglingReference {
                attr: "count_from_field",
                target: "missing".into()
            })));

        let lenient = EngineConfig {
            check_references: false,
            ..EngineConfig::default()
        };
        assert!(!validate_schema(&roots, &lenient)
            .iter()
            .any(|v| v.path == "arr"));
    }

    /// Fresh field of type `ty` with its required attributes cleared.
    fn stripped(ty: FieldType) -> FieldNode {
        let mut f = new_field(ty).named("f");
        match &mut f.kind {
            FieldKind::MessageId(a) => a.value_type = None,
            FieldKind::Encode(a) => a.base_type = Some("  ".into()),
            FieldKind::Command(a) => a.base_type = None,
            FieldKind::Checksum(a) => a.algorithm = None,
            FieldKind::String(a) => a.length = None,
            FieldKind::Float(a) => a.precision = None,
            FieldKind::SignedInt(a) | FieldKind::UnsignedInt(a) => a.byte_length = None,
            FieldKind::Timestamp(a) => a.unit = None,
            _ => {}
        }
        f
    }

    #[test]
    fn required_attributes_per_type() {
        let table = [
            (
                FieldType::MessageId,
                vec![Problem::Missing("value_type"), Problem::Missing("message_id_value")],
            ),
            (
                FieldType::Encode,
                vec![Problem::Missing("base_type"), Problem::Missing("maps")],
            ),
            (
                FieldType::Command,
                vec![Problem::Missing("base_type"), Problem::Missing("cases")],
            ),
            (FieldType::Checksum, vec![Problem::Missing("algorithm")]),
            (FieldType::String, vec![Problem::Missing("length")]),
            (FieldType::Float, vec![Problem::Missing("precision")]),
            (FieldType::SignedInt, vec![Problem::Missing("byte_length")]),
            (FieldType::UnsignedInt, vec![Problem::Missing("byte_length")]),
            (FieldType::Timestamp, vec![Problem::Missing("unit")]),
        ];
        for (ty, expected) in table {
            let v = validate(&stripped(ty), "f");
            assert_eq!(v.len(), 1, "{}", ty);
            assert_eq!(v[0].problems, expected, "{}", ty);
        }
        let v = validate(&stripped(FieldType::Checksum), "f");
        assert_eq!(format_violations(&v), "• f (Checksum): algorithm");
    }

    #[test]
    fn default_value_types() {
        let mut bcd = new_field(FieldType::Bcd).named("bcd");
        if let FieldKind::Bcd(a) = &mut bcd.kind {
            a.default_value = Some(Scalar::Int(12));
        }
        let v = validate(&bcd, "bcd");
        assert_eq!(v[0].problems, vec![Problem::DefaultNotString]);
        assert_eq!(v[0].labels(), vec!["default_value must be a string"]);

        for ty in [FieldType::SignedInt, FieldType::UnsignedInt] {
            let mut f = new_field(ty).named("n");
            if let FieldKind::SignedInt(a) | FieldKind::UnsignedInt(a) = &mut f.kind {
                a.default_value = Some(Scalar::Text("abc".into()));
            }
            let v = validate(&f, "n");
            assert_eq!(v[0].problems, vec![Problem::DefaultNotNumeric], "{}", ty);

            if let FieldKind::SignedInt(a) | FieldKind::UnsignedInt(a) = &mut f.kind {
                a.default_value = Some(Scalar::Text(String::new()));
            }
            assert!(validate(&f, "n").is_empty(), "{}", ty);
        }

        let mut fl = new_field(FieldType::Float).named("x");
        if let FieldKind::Float(a) = &mut fl.kind {
            a.default_value = Some(Scalar::Text("fast".into()));
        }
        assert_eq!(validate(&fl, "x")[0].labels(), vec!["default_value must be numeric"]);

        if let FieldKind::Float(a) = &mut fl.kind {
            a.default_value = Some(Scalar::Float(1.5));
        }
        assert!(validate(&fl, "x").is_empty());
    }

    #[test]
    fn references_skip_blank_attributes() {
        let arr = array_with(None, Some(" "), Some(4));
        assert!(references(&arr).is_empty());
        let arr = array_with(None, Some("n"), None);
        assert_eq!(references(&arr), vec![("count_from_field", "n")]);
    }

    #[test]
    fn formatting() {
        let v = validate(&array_with(Some(1), Some("n"), None), "pkt.arr");
        assert_eq!(
            format_violations(&v),
            "• pkt.arr (Array): length definition conflict"
        );
    }
}
