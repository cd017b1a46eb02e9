//! Benchmark: flatten, canonical transform, validation and reorder over a large
//! generated packet (nested structs, arrays and command branches).

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use packet_schema::field::{CommandCase, FieldKind};
use packet_schema::{
    canonical_json, new_field, to_editing_schema, validate_schema, EngineConfig, FieldNode,
    FieldTree, FieldType, Scalar,
};

/// One struct per block, each holding scalars, a counted array and a command.
fn build_packet(blocks: usize) -> Vec<FieldNode> {
    let mut roots = Vec::with_capacity(blocks);
    for b in 0..blocks {
        let mut block = new_field(FieldType::Struct).named(&format!("block{}", b));
        let mut children = Vec::new();
        for i in 0..8 {
            children.push(new_field(FieldType::UnsignedInt).named(&format!("b{}_u{}", b, i)));
        }
        let mut arr = new_field(FieldType::Array).named(&format!("b{}_items", b));
        if let FieldKind::Array(a) = &mut arr.kind {
            a.count_from_field = Some(format!("b{}_u0", b));
            a.element = Some(Box::new(
                new_field(FieldType::SignedInt).named(&format!("b{}_item", b)),
            ));
        }
        children.push(arr);
        let mut cmd = new_field(FieldType::Command).named(&format!("b{}_cmd", b));
        if let FieldKind::Command(c) = &mut cmd.kind {
            for k in 0..4 {
                let mut branch = new_field(FieldType::String).named(&format!("b{}_case{}", b, k));
                if let FieldKind::String(s) = &mut branch.kind {
                    s.length = Some(Scalar::Int(8));
                }
                c.cases.push(CommandCase {
                    key: format!("0x{:02X}", k),
                    field: branch,
                });
            }
        }
        children.push(cmd);
        if let FieldKind::Struct(s) = &mut block.kind {
            s.fields = children;
        }
        roots.push(block);
    }
    roots
}

fn bench_schema_ops(c: &mut Criterion) {
    let roots = build_packet(200);
    let tree = FieldTree::new(roots.clone());
    let config = EngineConfig::default();
    let canonical = canonical_json(&roots);

    c.bench_function("flatten_200_blocks", |b| {
        b.iter(|| black_box(tree.flatten().len()))
    });

    c.bench_function("to_canonical_200_blocks", |b| {
        b.iter(|| black_box(canonical_json(black_box(&roots))))
    });

    c.bench_function("to_editing_200_blocks", |b| {
        b.iter(|| black_box(to_editing_schema(black_box(&canonical)).map(|r| r.len())))
    });

    c.bench_function("validate_schema_200_blocks", |b| {
        b.iter(|| black_box(validate_schema(black_box(&roots), &config).len()))
    });

    c.bench_function("reorder_identity_200_blocks", |b| {
        let flat = tree.flatten();
        b.iter(|| {
            let mut t = tree.clone();
            black_box(t.reorder(&flat).is_ok())
        })
    });

    c.bench_function("unique_name_200_blocks", |b| {
        b.iter(|| black_box(tree.unique_name(FieldType::UnsignedInt)))
    });
}

criterion_group!(benches, bench_schema_ops);
criterion_main!(benches);
