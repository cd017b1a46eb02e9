//! Transform between the editing tree and the canonical schema.
//!
//! - [`to_canonical`]: editing node → minimal JSON object holding only the
//!   attributes whitelisted for the node's type (the payload of its
//!   [`FieldKind`] variant) plus `type`, `id`, `level` and `parent_id`.
//!   Legacy `min_value`/`max_value` are upgraded to `value_range`.
//! - [`to_editing`]: canonical JSON → editing node. Numeric-looking strings are
//!   coerced back to numbers; values that do not parse are kept as they are and
//!   left for validation to report. Nodes without an `id` get a fresh one.
//!
//! Both directions are pure and recursive over the whole subtree.

use crate::field::*;
use crate::value::Scalar;
use serde_json::{Map, Value as Json};
use std::collections::HashSet;
use std::str::FromStr;
use tracing::debug;

/// Canonical form of one node: a JSON object with snake_case keys.
pub type CanonicalNode = Map<String, Json>;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("field at {0} is not a JSON object")]
    NotAnObject(String),
    #[error("field at {0} has no type")]
    MissingType(String),
    #[error("field at {path} has unknown type `{ty}`")]
    UnknownType { path: String, ty: String },
    #[error("schema document must be an array of fields or an object with a `fields` array")]
    Document,
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ==================== editing → canonical ====================

/// Normalize an editing node (and its subtree) into canonical form.
pub fn to_canonical(node: &FieldNode) -> CanonicalNode {
    let ty = node.field_type();
    let mut out = Map::new();
    out.insert("type".into(), Json::String(ty.as_str().to_string()));
    out.insert("id".into(), Json::String(node.id.as_str().to_string()));
    if let Some(level) = node.level {
        out.insert("level".into(), Json::from(level as u64));
    }
    if let Some(parent) = &node.parent_id {
        out.insert("parent_id".into(), Json::String(parent.as_str().to_string()));
    }
    if !node.name.is_empty() {
        out.insert("field_name".into(), Json::String(node.name.clone()));
    }
    put_str(&mut out, "description", &node.description);
    if ty.allows_valid_when() {
        if let Some(vw) = node.valid_when.as_ref().filter(|vw| !vw.is_empty()) {
            out.insert("valid_when".into(), valid_when_json(vw));
        }
    }

    match &node.kind {
        FieldKind::SignedInt(a) | FieldKind::UnsignedInt(a) => {
            put_scalar(&mut out, "byte_length", &a.byte_length);
            put_scalar(&mut out, "default_value", &a.default_value);
            put_value_range(&mut out, ty, &a.value_range, &node.extras);
            put_str(&mut out, "unit", &a.unit);
        }
        FieldKind::MessageId(a) => {
            put_scalar(&mut out, "byte_length", &a.byte_length);
            put_str(&mut out, "value_type", &a.value_type);
            put_scalar(&mut out, "message_id_value", &a.message_id_value);
            if let Some(ranges) = &a.value_range {
                out.insert("value_range".into(), ranges_json(ranges));
            }
        }
        FieldKind::Float(a) => {
            put_str(&mut out, "precision", &a.precision);
            put_scalar(&mut out, "default_value", &a.default_value);
            put_value_range(&mut out, ty, &a.value_range, &node.extras);
            put_str(&mut out, "unit", &a.unit);
        }
        FieldKind::Bcd(a) => {
            put_scalar(&mut out, "byte_length", &a.byte_length);
            put_scalar(&mut out, "default_value", &a.default_value);
            put_value_range(&mut out, ty, &a.value_range, &node.extras);
        }
        FieldKind::Timestamp(a) => {
            put_scalar(&mut out, "byte_length", &a.byte_length);
            put_str(&mut out, "unit", &a.unit);
        }
        FieldKind::String(a) => {
            put_scalar(&mut out, "length", &a.length);
            put_str(&mut out, "encoding", &a.encoding);
            put_scalar(&mut out, "default_value", &a.default_value);
        }
        FieldKind::Bitfield(a) => {
            put_scalar(&mut out, "byte_length", &a.byte_length);
            if !a.sub_fields.is_empty() {
                let subs = a.sub_fields.iter().map(sub_field_json).collect();
                out.insert("sub_fields".into(), Json::Array(subs));
            }
        }
        FieldKind::Encode(a) => {
            put_str(&mut out, "base_type", &a.base_type);
            put_scalar(&mut out, "byte_length", &a.byte_length);
            if !a.maps.is_empty() {
                out.insert("maps".into(), maps_json(&a.maps));
            }
        }
        FieldKind::Struct(s) => {
            let fields = s.fields.iter().map(|f| Json::Object(to_canonical(f))).collect();
            out.insert("fields".into(), Json::Array(fields));
        }
        FieldKind::Array(a) => {
            put_scalar(&mut out, "count", &a.count);
            if let Some(src) = a.count_from_field.as_ref().filter(|s| !s.is_empty()) {
                out.insert("count_from_field".into(), Json::String(src.clone()));
            }
            put_scalar(&mut out, "bytes_in_trailer", &a.bytes_in_trailer);
            if let Some(element) = &a.element {
                out.insert("element".into(), Json::Object(to_canonical(element)));
            }
        }
        FieldKind::Command(c) => {
            put_str(&mut out, "base_type", &c.base_type);
            put_scalar(&mut out, "byte_length", &c.byte_length);
            let mut cases = Map::new();
            for case in &c.cases {
                cases.insert(case.key.clone(), Json::Object(to_canonical(&case.field)));
            }
            out.insert("cases".into(), Json::Object(cases));
        }
        FieldKind::Padding(a) | FieldKind::Reserved(a) => {
            put_scalar(&mut out, "byte_length", &a.byte_length);
            put_scalar(&mut out, "bit_length", &a.bit_length);
            put_scalar(&mut out, "fill_value", &a.fill_value);
        }
        FieldKind::Checksum(a) => {
            put_str(&mut out, "algorithm", &a.algorithm);
            put_scalar(&mut out, "byte_length", &a.byte_length);
            put_str(&mut out, "range_start_ref", &a.range_start_ref);
            put_str(&mut out, "range_end_ref", &a.range_end_ref);
            if let Some(params) = &a.parameters {
                out.insert("parameters".into(), Json::Object(params.clone()));
            }
        }
    }
    out
}

/// Canonical form of a whole field list.
pub fn to_canonical_schema(roots: &[FieldNode]) -> Vec<CanonicalNode> {
    roots.iter().map(to_canonical).collect()
}

/// Canonical field list as a JSON array, ready to persist.
pub fn canonical_json(roots: &[FieldNode]) -> Json {
    Json::Array(
        to_canonical_schema(roots)
            .into_iter()
            .map(Json::Object)
            .collect(),
    )
}

fn put_str(out: &mut CanonicalNode, key: &str, v: &Option<String>) {
    if let Some(s) = v {
        out.insert(key.to_string(), Json::String(s.clone()));
    }
}

fn put_scalar(out: &mut CanonicalNode, key: &str, v: &Option<Scalar>) {
    if let Some(s) = v {
        out.insert(key.to_string(), s.to_json());
    }
}

fn valid_when_json(vw: &ValidWhen) -> Json {
    let mut m = Map::new();
    m.insert(
        "field".into(),
        vw.field.clone().map(Json::String).unwrap_or(Json::Null),
    );
    m.insert(
        "value".into(),
        vw.value.as_ref().map(Scalar::to_json).unwrap_or(Json::Null),
    );
    Json::Object(m)
}

fn opt_json(v: &Option<Scalar>) -> Json {
    v.as_ref().map(Scalar::to_json).unwrap_or(Json::Null)
}

fn ranges_json(ranges: &[ValueRange]) -> Json {
    Json::Array(
        ranges
            .iter()
            .map(|r| {
                let mut m = Map::new();
                m.insert("min".into(), opt_json(&r.min));
                m.insert("max".into(), opt_json(&r.max));
                Json::Object(m)
            })
            .collect(),
    )
}

/// Emit `value_range`, synthesizing it from legacy `min_value`/`max_value`
/// when the node has none. An existing `value_range` always wins.
fn put_value_range(
    out: &mut CanonicalNode,
    ty: FieldType,
    ranges: &Option<Vec<ValueRange>>,
    extras: &Map<String, Json>,
) {
    if let Some(r) = ranges {
        out.insert("value_range".into(), ranges_json(r));
        return;
    }
    let legacy = |key: &str| {
        extras
            .get(key)
            .and_then(Scalar::from_json)
            .filter(|s| !s.is_blank())
            .map(Scalar::coerce_number)
    };
    let (min, max) = (legacy("min_value"), legacy("max_value"));
    if min.is_none() && max.is_none() {
        return;
    }
    let (lo, hi) = natural_bounds(ty);
    let range = ValueRange {
        min: Some(min.unwrap_or(lo)),
        max: Some(max.unwrap_or(hi)),
    };
    out.insert("value_range".into(), ranges_json(&[range]));
}

/// Extremes used for a missing legacy bound.
fn natural_bounds(ty: FieldType) -> (Scalar, Scalar) {
    if ty == FieldType::Float {
        (Scalar::Float(f64::NEG_INFINITY), Scalar::Float(f64::INFINITY))
    } else {
        (Scalar::Int(i64::MIN), Scalar::Int(i64::MAX))
    }
}

fn maps_json(maps: &[EncodeMap]) -> Json {
    Json::Array(
        maps.iter()
            .map(|m| {
                let mut o = m.extras.clone();
                o.insert("value".into(), opt_json(&m.value));
                if let Some(meaning) = &m.meaning {
                    o.insert("meaning".into(), Json::String(meaning.clone()));
                }
                Json::Object(o)
            })
            .collect(),
    )
}

fn sub_field_json(sf: &SubField) -> Json {
    let mut o = sf.extras.clone();
    if let Some(name) = &sf.name {
        o.insert("name".into(), Json::String(name.clone()));
    }
    if let Some(v) = &sf.start_bit {
        o.insert("start_bit".into(), v.to_json());
    }
    if let Some(v) = &sf.end_bit {
        o.insert("end_bit".into(), v.to_json());
    }
    if let Some(d) = &sf.description {
        o.insert("description".into(), Json::String(d.clone()));
    }
    if !sf.maps.is_empty() {
        o.insert("maps".into(), maps_json(&sf.maps));
    }
    Json::Object(o)
}

// ==================== canonical → editing ====================

/// Build an editing node (and its subtree) from canonical JSON.
pub fn to_editing(value: &Json) -> Result<FieldNode, SchemaError> {
    let mut node = editing_node(value, "$")?;
    name_unnamed_branches(std::slice::from_mut(&mut node));
    Ok(node)
}

/// Accepts either a JSON array of root fields or an object with a `fields` array.
pub fn to_editing_schema(doc: &Json) -> Result<Vec<FieldNode>, SchemaError> {
    let list = match doc {
        Json::Array(items) => items,
        Json::Object(o) => match o.get("fields") {
            Some(Json::Array(items)) => items,
            _ => return Err(SchemaError::Document),
        },
        _ => return Err(SchemaError::Document),
    };
    let mut roots = list
        .iter()
        .enumerate()
        .map(|(i, f)| editing_node(f, &format!("$[{}]", i)))
        .collect::<Result<Vec<_>, _>>()?;
    name_unnamed_branches(&mut roots);
    Ok(roots)
}

/// Parse JSON text and build the editing tree.
pub fn parse_schema(source: &str) -> Result<Vec<FieldNode>, SchemaError> {
    let doc: Json = serde_json::from_str(source)?;
    to_editing_schema(&doc)
}

fn editing_node(value: &Json, path: &str) -> Result<FieldNode, SchemaError> {
    let obj = value
        .as_object()
        .ok_or_else(|| SchemaError::NotAnObject(path.to_string()))?;
    let ty_name = obj
        .get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| SchemaError::MissingType(path.to_string()))?;
    let ty = FieldType::from_str(ty_name).map_err(|_| SchemaError::UnknownType {
        path: path.to_string(),
        ty: ty_name.to_string(),
    })?;

    let mut rest = obj.clone();
    rest.remove("type");
    let id = match rest.remove("id") {
        Some(Json::String(s)) if !s.is_empty() => FieldId::from(s),
        Some(Json::Number(n)) => FieldId::from(n.to_string()),
        _ => {
            let id = FieldId::generate();
            debug!(path, %id, "field has no id, assigned a fresh one");
            id
        }
    };
    let name = take_string(&mut rest, "field_name").unwrap_or_default();
    let description = take_string(&mut rest, "description");
    let valid_when = take_valid_when(&mut rest, path);
    let level = rest
        .remove("level")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize);
    let parent_id = take_string(&mut rest, "parent_id").map(FieldId::from);
    let expanded = rest
        .remove("expanded")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let kind = match ty {
        FieldType::SignedInt | FieldType::UnsignedInt => {
            let attrs = IntegerAttrs {
                byte_length: take_int(&mut rest, "byte_length", path),
                default_value: take_scalar(&mut rest, "default_value"),
                value_range: take_value_range(&mut rest, true),
                unit: take_string(&mut rest, "unit"),
            };
            if ty == FieldType::SignedInt {
                FieldKind::SignedInt(attrs)
            } else {
                FieldKind::UnsignedInt(attrs)
            }
        }
        FieldType::MessageId => FieldKind::MessageId(MessageIdAttrs {
            byte_length: take_int(&mut rest, "byte_length", path),
            value_type: take_string(&mut rest, "value_type"),
            message_id_value: take_int(&mut rest, "message_id_value", path),
            value_range: take_value_range(&mut rest, false),
        }),
        FieldType::Float => FieldKind::Float(FloatAttrs {
            precision: take_string(&mut rest, "precision"),
            default_value: take_scalar(&mut rest, "default_value"),
            value_range: take_value_range(&mut rest, true),
            unit: take_string(&mut rest, "unit"),
        }),
        FieldType::Bcd => FieldKind::Bcd(BcdAttrs {
            byte_length: take_int(&mut rest, "byte_length", path),
            default_value: take_scalar(&mut rest, "default_value"),
            value_range: take_value_range(&mut rest, false),
        }),
        FieldType::Timestamp => FieldKind::Timestamp(TimestampAttrs {
            byte_length: take_int(&mut rest, "byte_length", path),
            unit: take_string(&mut rest, "unit"),
        }),
        FieldType::String => FieldKind::String(StringAttrs {
            length: take_int(&mut rest, "length", path),
            encoding: take_string(&mut rest, "encoding"),
            default_value: take_scalar(&mut rest, "default_value"),
        }),
        FieldType::Bitfield => FieldKind::Bitfield(BitfieldAttrs {
            byte_length: take_int(&mut rest, "byte_length", path),
            sub_fields: take_sub_fields(&mut rest, path),
        }),
        FieldType::Encode => FieldKind::Encode(EncodeAttrs {
            base_type: take_string(&mut rest, "base_type"),
            byte_length: take_int(&mut rest, "byte_length", path),
            maps: take_maps(rest.remove("maps"), path),
        }),
        FieldType::Struct => {
            let mut fields = Vec::new();
            if let Some(Json::Array(items)) = rest.remove("fields") {
                for (i, item) in items.iter().enumerate() {
                    fields.push(editing_node(item, &format!("{}.fields[{}]", path, i))?);
                }
            }
            FieldKind::Struct(StructAttrs { fields })
        }
        FieldType::Array => {
            let count = take_length_mode(&mut rest, "count", path);
            let count_from_field =
                take_string(&mut rest, "count_from_field").filter(|s| !s.is_empty());
            let bytes_in_trailer = take_length_mode(&mut rest, "bytes_in_trailer", path);
            // the editing list view is only a fallback when `element` is absent
            let list_view = rest.remove("fields");
            let element = match rest.remove("element") {
                Some(e) if !e.is_null() => Some(editing_node(&e, &format!("{}.element", path))?),
                _ => match list_view {
                    Some(Json::Array(items)) if !items.is_empty() => {
                        Some(editing_node(&items[0], &format!("{}.element", path))?)
                    }
                    _ => None,
                },
            };
            FieldKind::Array(ArrayAttrs {
                count,
                count_from_field,
                bytes_in_trailer,
                element: element.map(Box::new),
            })
        }
        FieldType::Command => {
            rest.remove("fields");
            let mut cases = Vec::new();
            if let Some(Json::Object(map)) = rest.remove("cases") {
                for (key, v) in map.iter() {
                    let field = editing_node(v, &format!("{}.cases[{}]", path, key))?;
                    cases.push(CommandCase {
                        key: key.clone(),
                        field,
                    });
                }
            }
            FieldKind::Command(CommandAttrs {
                base_type: take_string(&mut rest, "base_type"),
                byte_length: take_int(&mut rest, "byte_length", path),
                cases,
            })
        }
        FieldType::Padding | FieldType::Reserved => {
            let attrs = PadAttrs {
                byte_length: take_int(&mut rest, "byte_length", path),
                bit_length: take_int(&mut rest, "bit_length", path),
                fill_value: take_scalar(&mut rest, "fill_value"),
            };
            if ty == FieldType::Padding {
                FieldKind::Padding(attrs)
            } else {
                FieldKind::Reserved(attrs)
            }
        }
        FieldType::Checksum => FieldKind::Checksum(ChecksumAttrs {
            algorithm: take_string(&mut rest, "algorithm"),
            byte_length: take_int(&mut rest, "byte_length", path),
            range_start_ref: take_string(&mut rest, "range_start_ref"),
            range_end_ref: take_string(&mut rest, "range_end_ref"),
            parameters: match rest.remove("parameters") {
                Some(Json::Object(p)) => Some(p),
                _ => None,
            },
        }),
    };

    Ok(FieldNode {
        id,
        name,
        description,
        valid_when,
        kind,
        expanded,
        level,
        parent_id,
        extras: rest,
    })
}

/// Name for a command branch loaded without one: `0x01` → `case_0x01`.
pub fn fallback_case_name(key: &str) -> String {
    let cleaned: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("case_{}", cleaned)
}

/// Give every unnamed command branch a `case_<key>` name that no other field
/// in `roots` uses, appending `_2`, `_3`, ... on a clash.
fn name_unnamed_branches(roots: &mut [FieldNode]) {
    let mut taken: HashSet<String> = collect_names(roots).into_iter().collect();
    for root in roots.iter_mut() {
        name_branches_in(root, &mut taken);
    }
}

fn name_branches_in(node: &mut FieldNode, taken: &mut HashSet<String>) {
    if let FieldKind::Command(c) = &mut node.kind {
        for case in c.cases.iter_mut().filter(|case| case.field.name.is_empty()) {
            let base = fallback_case_name(&case.key);
            let mut name = base.clone();
            let mut n = 2;
            while taken.contains(&name) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            debug!(key = %case.key, %name, "unnamed command branch named");
            taken.insert(name.clone());
            case.field.name = name;
        }
    }
    for child in node.children_mut() {
        name_branches_in(child, taken);
    }
}

fn take_string(rest: &mut Map<String, Json>, key: &str) -> Option<String> {
    match rest.remove(key)? {
        Json::String(s) => Some(s),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn take_scalar(rest: &mut Map<String, Json>, key: &str) -> Option<Scalar> {
    rest.remove(key).as_ref().and_then(Scalar::from_json)
}

fn coerce_int_logged(v: Scalar, attr: &str, path: &str) -> Scalar {
    let out = v.coerce_int();
    if let Scalar::Text(s) = &out {
        debug!(path, attr, value = %s, "value is not numeric, kept as is");
    }
    out
}

fn take_int(rest: &mut Map<String, Json>, key: &str, path: &str) -> Option<Scalar> {
    take_scalar(rest, key).map(|v| coerce_int_logged(v, key, path))
}

/// Array length modes: an empty string means "not selected".
fn take_length_mode(rest: &mut Map<String, Json>, key: &str, path: &str) -> Option<Scalar> {
    take_scalar(rest, key)
        .filter(|v| !(v.is_text() && v.is_blank()))
        .map(|v| coerce_int_logged(v, key, path))
}

fn take_valid_when(rest: &mut Map<String, Json>, path: &str) -> Option<ValidWhen> {
    let obj = match rest.remove("valid_when")? {
        Json::Object(o) => o,
        _ => return None,
    };
    let field = match obj.get("field") {
        Some(Json::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    };
    let value = obj
        .get("value")
        .and_then(Scalar::from_json)
        .filter(|v| !(v.is_text() && v.is_blank()))
        .map(|v| coerce_int_logged(v, "valid_when.value", path));
    let vw = ValidWhen { field, value };
    if vw.field.is_none() && vw.value.is_none() {
        None
    } else {
        Some(vw)
    }
}

/// `numeric`: coerce bounds of integer/float ranges; BCD ranges are kept textual.
fn take_value_range(rest: &mut Map<String, Json>, numeric: bool) -> Option<Vec<ValueRange>> {
    let items = match rest.remove("value_range")? {
        Json::Array(items) => items,
        _ => return None,
    };
    let bound = |o: &Map<String, Json>, key: &str| {
        o.get(key).and_then(Scalar::from_json).map(|v| {
            if numeric {
                v.coerce_number()
            } else {
                v
            }
        })
    };
    Some(
        items
            .iter()
            .filter_map(Json::as_object)
            .map(|o| ValueRange {
                min: bound(o, "min"),
                max: bound(o, "max"),
            })
            .collect(),
    )
}

fn take_maps(value: Option<Json>, path: &str) -> Vec<EncodeMap> {
    let items = match value {
        Some(Json::Array(items)) => items,
        _ => return Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| match item {
            Json::Object(mut o) => {
                let value = o
                    .remove("value")
                    .as_ref()
                    .and_then(Scalar::from_json)
                    .map(|v| coerce_int_logged(v, "maps.value", path));
                let meaning = take_string(&mut o, "meaning");
                Some(EncodeMap {
                    value,
                    meaning,
                    extras: o,
                })
            }
            _ => None,
        })
        .collect()
}

fn take_sub_fields(rest: &mut Map<String, Json>, path: &str) -> Vec<SubField> {
    let items = match rest.remove("sub_fields") {
        Some(Json::Array(items)) => items,
        _ => return Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| match item {
            Json::Object(mut o) => Some(SubField {
                name: take_string(&mut o, "name").filter(|s| !s.is_empty()),
                start_bit: take_int(&mut o, "start_bit", path),
                end_bit: take_int(&mut o, "end_bit", path),
                description: take_string(&mut o, "description"),
                maps: take_maps(o.remove("maps"), path),
                extras: o,
            }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expanded_is_dropped_and_whitelist_applied() {
        let mut node = new_field(FieldType::Timestamp).named("ts");
        node.expanded = true;
        node.valid_when = Some(ValidWhen {
            field: Some("kind".into()),
            value: Some(Scalar::Int(1)),
        });
        node.extras.insert("display_format".into(), json!("hex"));
        let c = to_canonical(&node);
        assert!(!c.contains_key("expanded"));
        assert!(!c.contains_key("display_format"));
        // Timestamp does not carry valid_when canonically
        assert!(!c.contains_key("valid_when"));
        assert_eq!(c.get("unit"), Some(&json!("day-milliseconds")));
    }

    #[test]
    fn legacy_range_uses_natural_bounds() {
        let mut node = new_field(FieldType::UnsignedInt).named("u");
        node.extras.insert("max_value".into(), json!("250"));
        let c = to_canonical(&node);
        assert_eq!(
            c.get("value_range"),
            Some(&json!([{ "min": i64::MIN, "max": 250 }]))
        );

        let mut f = new_field(FieldType::Float).named("f");
        f.extras.insert("min_value".into(), json!(1.5));
        let c = to_canonical(&f);
        assert_eq!(c.get("value_range"), Some(&json!([{ "min": 1.5, "max": null }])));
    }

    #[test]
    fn existing_range_blocks_migration() {
        let mut node = new_field(FieldType::SignedInt).named("s");
        if let FieldKind::SignedInt(a) = &mut node.kind {
            a.value_range = Some(vec![ValueRange {
                min: Some(Scalar::Int(-5)),
                max: Some(Scalar::Int(5)),
            }]);
        }
        node.extras.insert("min_value".into(), json!(0));
        node.extras.insert("max_value".into(), json!(100));
        let c = to_canonical(&node);
        assert_eq!(c.get("value_range"), Some(&json!([{ "min": -5, "max": 5 }])));
    }

    #[test]
    fn string_numbers_are_coerced() {
        let node = to_editing(&json!({
            "type": "Array",
            "field_name": "arr",
            "count": "3",
            "bytes_in_trailer": "",
            "element": { "type": "String", "field_name": "s", "length": "16" }
        }))
        .expect("to_editing");
        match &node.kind {
            FieldKind::Array(a) => {
                assert_eq!(a.count, Some(Scalar::Int(3)));
                assert_eq!(a.bytes_in_trailer, None);
                match &a.element.as_ref().expect("element").kind {
                    FieldKind::String(s) => assert_eq!(s.length, Some(Scalar::Int(16))),
                    other => panic!("unexpected element {:?}", other),
                }
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn uncoercible_value_is_preserved() {
        let node = to_editing(&json!({ "type": "UnsignedInt", "field_name": "u", "byte_length": "four" }))
            .expect("to_editing");
        match &node.kind {
            FieldKind::UnsignedInt(a) => assert_eq!(a.byte_length, Some(Scalar::Text("four".into()))),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn command_branch_gets_fallback_name_and_ids() {
        let node = to_editing(&json!({
            "type": "Command",
            "field_name": "cmd",
            "base_type": "unsigned",
            "byte_length": 1,
            "cases": { "0x01": { "type": "Struct", "fields": [] } }
        }))
        .expect("to_editing");
        let children = node.children();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "case_0x01");
        assert!(children[0].id.as_str().starts_with("field_"));
        assert_eq!(node.case_key_of(&children[0].id), Some("0x01"));
    }

    #[test]
    fn fallback_branch_name_avoids_existing_names() {
        let roots = to_editing_schema(&json!([
            { "type": "UnsignedInt", "field_name": "case_0x01", "byte_length": 1 },
            { "type": "UnsignedInt", "field_name": "case_0x01_2", "byte_length": 1 },
            {
                "type": "Command",
                "field_name": "cmd",
                "base_type": "unsigned",
                "byte_length": 1,
                "cases": {
                    "0x01": { "type": "Struct", "fields": [] },
                    "0x02": { "type": "Struct", "fields": [] }
                }
            }
        ]))
        .expect("to_editing_schema");
        let branches: Vec<&str> = roots[2].children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(branches, vec!["case_0x01_3", "case_0x02"]);
    }

    #[test]
    fn unknown_type_is_an_error() {
        let err = to_editing(&json!({ "type": "Blob" })).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType { .. }));
        assert!(matches!(to_editing(&json!(3)), Err(SchemaError::NotAnObject(_))));
        assert!(matches!(to_editing_schema(&json!("x")), Err(SchemaError::Document)));
    }
}
