use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde::{Deserialize, Serialize};

use confnode::{ConfigNode, FieldConstraint, FieldDefinition, NodePath, Schema, ValueType};

#[derive(Serialize, Deserialize)]
struct Section {
    name: String,
    port: u16,
    ratio: f64,
    enabled: bool,
    tags: Vec<String>,
}

// 10 sections of mixed scalar types, each with a small list
fn create_test_tree() -> ConfigNode {
    let mut root = ConfigNode::root();
    for section_idx in 0..10 {
        let section = root.node_mut([format!("section{}", section_idx)]);
        for key_idx in 0..10 {
            let node = section.node_mut([format!("key{}", key_idx)]);
            match key_idx % 4 {
                0 => node.set_value(format!("string value {}", key_idx)),
                1 => node.set_value(key_idx as i64 * 100),
                2 => node.set_value(key_idx as f64 + 0.5),
                _ => node.set_value(key_idx % 2 == 0),
            };
        }
        section.node_mut(["list"]).set(vec!["a", "b", "c"]).expect("set list");
    }
    root
}

fn bench_build_tree(c: &mut Criterion) {
    c.bench_function("build_tree", |b| {
        b.iter(|| black_box(create_test_tree()));
    });
}

fn bench_navigation(c: &mut Criterion) {
    let root = create_test_tree();
    let paths: Vec<NodePath> = ["section1.key2", "section5.key9", "section8.list[2]", "section9.missing"]
        .iter()
        .map(|p| p.parse().expect("valid path"))
        .collect();

    c.bench_function("node_lookup", |b| {
        b.iter(|| {
            for path in &paths {
                black_box(root.node(path));
            }
        });
    });

    c.bench_function("path_parse", |b| {
        b.iter(|| black_box("server.listeners[12].\"dotted.key\"".parse::<NodePath>()));
    });
}

fn bench_typed_access(c: &mut Criterion) {
    let section = Section {
        name: "bench".to_string(),
        port: 8080,
        ratio: 0.25,
        enabled: true,
        tags: vec!["x".to_string(), "y".to_string()],
    };
    let mut root = ConfigNode::root();
    root.node_mut(["section"]).set(&section).expect("set section");

    c.bench_function("typed_get", |b| {
        b.iter(|| {
            let node = root.node(["section"]).expect("section");
            black_box(node.get::<Section>().expect("get section"));
        });
    });

    c.bench_function("typed_set", |b| {
        b.iter(|| {
            let mut target = ConfigNode::root();
            target.set(&section).expect("set section");
            black_box(target);
        });
    });
}

fn bench_schema_validation(c: &mut Criterion) {
    let root = create_test_tree();
    let mut schema = Schema::new();
    for section_idx in 0..10 {
        schema
            .field_at(
                &format!("section{}.key0", section_idx),
                FieldDefinition::new(ValueType::String)
                    .required()
                    .constraint(FieldConstraint::string().min_length(1)),
            )
            .expect("valid path");
        schema
            .field_at(
                &format!("section{}.key1", section_idx),
                FieldDefinition::new(ValueType::Integer).constraint(FieldConstraint::integer().min_int(0)),
            )
            .expect("valid path");
    }

    c.bench_function("schema_validate", |b| {
        b.iter(|| black_box(schema.validate(&root).is_ok()));
    });
}

criterion_group!(
    benches,
    bench_build_tree,
    bench_navigation,
    bench_typed_access,
    bench_schema_validation
);
criterion_main!(benches);
