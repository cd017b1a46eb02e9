//! Schema fuzz target: feed arbitrary bytes as a JSON schema document.
//! Loading, validation, flattening and the canonical transform must not panic.
//! Build with: cargo fuzz run schema_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let doc: serde_json::Value = match serde_json::from_slice(data) {
        Ok(v) => v,
        Err(_) => return,
    };
    let config = packet_schema::EngineConfig::default();
    if let Ok(tree) = packet_schema::FieldTree::from_canonical(&doc, config) {
        let _ = tree.validate();
        let flat = tree.flatten();
        let mut copy = tree.clone();
        let _ = copy.reorder(&flat);
        let _ = tree.to_canonical();
    }
    let _ = packet_schema::parse_discriminant(&String::from_utf8_lossy(data));
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run schema_fuzz");
}
