//! Integration tests: load canonical schemas, edit the tree, validate, and write back.

use packet_schema::field::{CommandCase, FieldKind};
use packet_schema::{
    new_field, parse_schema, to_canonical, to_editing, validate, validate_schema, EditError,
    EngineConfig, FieldTree, FieldType, FlatEntry, Problem, Scalar,
};
use serde_json::json;

const TELEMETRY: &str = r#"
{
  "fields": [
    { "type": "MessageId", "id": "f_msg", "field_name": "msg_id", "byte_length": 2,
      "value_type": "UnsignedInt", "message_id_value": "0x10" },
    { "type": "UnsignedInt", "id": "f_n", "field_name": "n", "byte_length": "1" },
    { "type": "Array", "id": "f_items", "field_name": "items", "count_from_field": "n",
      "element": { "type": "SignedInt", "id": "f_item", "field_name": "item", "byte_length": 2 } },
    { "type": "Command", "id": "f_cmd", "field_name": "cmd", "base_type": "unsigned", "byte_length": 1,
      "cases": {
        "0x01": { "type": "Struct", "id": "f_ping", "field_name": "ping",
                  "fields": [ { "type": "Timestamp", "id": "f_ts", "field_name": "sent_at",
                                "byte_length": 4, "unit": "day-milliseconds" } ] },
        "0x02": { "type": "Padding", "id": "f_pad", "byte_length": 3 }
      } },
    { "type": "Checksum", "id": "f_crc", "field_name": "crc", "algorithm": "crc16-modbus",
      "byte_length": 2, "range_start_ref": "msg_id", "range_end_ref": "cmd" }
  ]
}
"#;

#[test]
fn test_load_and_validate_clean_schema() {
    let roots = parse_schema(TELEMETRY).expect("parse");
    assert_eq!(roots.len(), 5);
    let violations = validate_schema(&roots, &EngineConfig::default());
    assert!(violations.is_empty(), "{:?}", violations);
}

#[test]
fn test_unnamed_command_branch_gets_case_name() {
    let tree = FieldTree::new(parse_schema(TELEMETRY).expect("parse"));
    let pad = tree.find(&"f_pad".into()).expect("padding branch");
    assert_eq!(pad.name, "case_0x02");
    assert_eq!(pad.level, Some(1));
    assert_eq!(pad.parent_id.as_ref().map(|p| p.as_str()), Some("f_cmd"));
}

// Scenario 1: an empty packet (its root field list is the empty struct body).
#[test]
fn test_insert_into_empty_struct_at_index_zero() {
    let mut tree = FieldTree::default();
    let field = tree.create_field(FieldType::UnsignedInt);
    tree.insert_at_flat_index(0, field, None).expect("insert");
    let canonical = tree.to_canonical();
    let fields = canonical.as_array().expect("array");
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0]["field_name"], json!("unsignedInt1"));
    assert_eq!(fields[0]["byte_length"], json!(4));
}

#[test]
fn test_insert_into_nested_empty_struct_via_placeholder() {
    let s = new_field(FieldType::Struct).named("body");
    let sid = s.id.clone();
    let mut tree = FieldTree::new(vec![s]);
    // rows: [body, placeholder(body)]
    assert!(tree.flatten()[1].is_placeholder());
    let field = tree.create_field(FieldType::UnsignedInt);
    tree.insert_at_flat_index(1, field, None).expect("insert");

    let body = to_canonical(tree.find(&sid).expect("body"));
    let fields = body["fields"].as_array().expect("fields");
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0]["field_name"], json!("unsignedInt1"));
    assert_eq!(fields[0]["byte_length"], json!(4));
}

// Scenario 2
#[test]
fn test_array_length_conflict_is_single_violation() {
    let mut arr = new_field(FieldType::Array).named("samples");
    if let FieldKind::Array(a) = &mut arr.kind {
        a.count = Some(Scalar::Int(3));
        a.count_from_field = Some("n".into());
        a.element = Some(Box::new(new_field(FieldType::Float).named("sample")));
    }
    let violations = validate(&arr, "samples");
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].path, "samples");
    assert!(violations[0].has(&Problem::LengthDefinitionConflict));
    assert!(violations[0]
        .labels()
        .contains(&"length definition conflict".to_string()));
}

// Scenario 3
#[test]
fn test_duplicate_command_key_is_rejected() {
    let cmd = new_field(FieldType::Command).named("cmd");
    let cid = cmd.id.clone();
    let mut tree = FieldTree::new(vec![cmd]);
    let a = tree.create_field(FieldType::Struct);
    tree.add_to_container(&cid, a, Some("0x01")).expect("first branch");
    let b = tree.create_field(FieldType::Struct);
    let err = tree.add_to_container(&cid, b, Some("0x01")).unwrap_err();
    assert!(matches!(err, EditError::DuplicateDiscriminant(ref k) if k == "0x01"));
    match &tree.find(&cid).expect("cmd").kind {
        FieldKind::Command(c) => assert_eq!(c.cases.len(), 1),
        other => panic!("unexpected kind {:?}", other),
    }
}

// Scenario 4
#[test]
fn test_legacy_min_max_becomes_value_range() {
    let legacy = json!({
        "type": "SignedInt",
        "field_name": "temperature",
        "byte_length": 2,
        "min_value": 0,
        "max_value": 100
    });
    let canonical = to_canonical(&to_editing(&legacy).expect("to_editing"));
    assert_eq!(canonical["value_range"], json!([{ "min": 0, "max": 100 }]));
    assert!(!canonical.contains_key("min_value"));
    assert!(!canonical.contains_key("max_value"));
}

// Scenario 5
#[test]
fn test_rename_to_name_of_array_element_is_rejected() {
    let mut arr = new_field(FieldType::Array).named("list");
    if let FieldKind::Array(a) = &mut arr.kind {
        a.count = Some(Scalar::Int(2));
        a.element = Some(Box::new(new_field(FieldType::UnsignedInt).named("entry")));
    }
    let deep = new_field(FieldType::UnsignedInt).named("deep");
    let deep_id = deep.id.clone();
    let mut level3 = new_field(FieldType::Struct).named("level3");
    let mut level2 = new_field(FieldType::Struct).named("level2");
    let mut level1 = new_field(FieldType::Struct).named("level1");
    if let FieldKind::Struct(s) = &mut level3.kind {
        s.fields.push(deep);
    }
    if let FieldKind::Struct(s) = &mut level2.kind {
        s.fields.push(level3);
    }
    if let FieldKind::Struct(s) = &mut level1.kind {
        s.fields.push(level2);
    }
    let mut tree = FieldTree::new(vec![arr, level1]);
    assert_eq!(tree.find(&deep_id).and_then(|n| n.level), Some(3));

    let err = tree.rename(&deep_id, "entry").unwrap_err();
    assert!(err.to_string().contains("name already exists"));
    assert_eq!(tree.find(&deep_id).map(|n| n.name.as_str()), Some("deep"));
}

#[test]
fn test_fix_writes_canonical_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("packet.json");
    std::fs::write(&path, TELEMETRY).expect("write");

    let src = std::fs::read_to_string(&path).expect("read");
    let tree = FieldTree::new(parse_schema(&src).expect("parse"));
    let out = serde_json::to_string_pretty(&tree.to_canonical()).expect("json");
    std::fs::write(&path, &out).expect("write back");

    let reloaded = parse_schema(&std::fs::read_to_string(&path).expect("read")).expect("reparse");
    let again = FieldTree::new(reloaded);
    assert_eq!(again.to_canonical(), tree.to_canonical());
    // string-typed numbers were repaired on the way in
    assert_eq!(again.to_canonical()[1]["byte_length"], json!(1));
}

#[test]
fn test_command_drop_on_branch_row_routes_to_command() {
    let mut cmd = new_field(FieldType::Command).named("cmd");
    if let FieldKind::Command(c) = &mut cmd.kind {
        c.cases.push(CommandCase {
            key: "1".into(),
            field: new_field(FieldType::UnsignedInt).named("one"),
        });
    }
    let cid = cmd.id.clone();
    let mut tree = FieldTree::new(vec![cmd]);
    // row 1 is the existing branch
    let row = tree.flatten()[1].clone();
    assert!(matches!(row, FlatEntry::Field(ref f) if f.case_key.as_deref() == Some("1")));

    let two = tree.create_field(FieldType::Float);
    assert!(matches!(
        tree.insert_at_flat_index(1, two.clone(), None),
        Err(EditError::MissingDiscriminant)
    ));
    assert!(matches!(
        tree.insert_at_flat_index(1, two.clone(), Some("0x1")),
        Err(EditError::DuplicateDiscriminant(_))
    ));
    tree.insert_at_flat_index(1, two, Some("0x02")).expect("insert");
    assert_eq!(tree.find(&cid).map(|c| c.children().len()), Some(2));
}

#[test]
fn test_check_schema_fix_from_stdin_still_reports() {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let mut child = Command::new(env!("CARGO_BIN_EXE_check_schema"))
        .arg("--fix")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn check_schema");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(
            br#"[{ "type": "Array", "field_name": "arr", "count": 2, "bytes_in_trailer": 4,
                   "element": { "type": "UnsignedInt", "field_name": "x", "byte_length": 1 } }]"#,
        )
        .expect("write stdin");
    let out = child.wait_with_output().expect("wait");

    assert_eq!(out.status.code(), Some(1));
    let fixed: serde_json::Value = serde_json::from_slice(&out.stdout).expect("stdout is the fixed JSON");
    assert_eq!(fixed[0]["field_name"], "arr");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("length definition conflict"), "{}", stderr);
}
