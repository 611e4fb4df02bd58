//! Tests for the node tree: paths, navigation, typed access and merging.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use confnode::{ConfigError, ConfigNode, ConfigOptions, Key, NodePath, NodeValue, Scalar};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Database {
    url: String,
    pool_size: u32,
    #[serde(default)]
    replicas: Vec<String>,
}

fn path(s: &str) -> NodePath {
    s.parse().expect("valid path")
}

#[test]
fn test_path_parsing_and_display() {
    let parsed = path("server.listeners[0].port");
    assert_eq!(
        parsed.keys(),
        &[
            Key::Name("server".to_string()),
            Key::Name("listeners".to_string()),
            Key::Index(0),
            Key::Name("port".to_string()),
        ]
    );
    assert_eq!(parsed.to_string(), "server.listeners[0].port");
    assert_eq!(parsed.parent().to_string(), "server.listeners[0]");
    assert_eq!(parsed.last(), Some(&Key::Name("port".to_string())));

    let quoted = path(r#""dotted.key".inner"#);
    assert_eq!(quoted.keys()[0], Key::Name("dotted.key".to_string()));
    assert_eq!(quoted.to_string(), r#""dotted.key".inner"#);

    assert!(path("").is_root());
    assert_eq!(NodePath::root().child("a").child(2usize).to_string(), "a[2]");
}

#[test]
fn test_invalid_paths_are_rejected() {
    for bad in ["a..b", "a.", ".a", "a[x]", "a[1", "a\"b\"", "\"open"] {
        let result = bad.parse::<NodePath>();
        assert!(
            matches!(result, Err(ConfigError::InvalidPath { .. })),
            "{:?} should not parse, got {:?}",
            bad,
            result
        );
    }
}

#[test]
fn test_node_mut_creates_missing_nodes() {
    let mut root = ConfigNode::root();
    root.node_mut(["server", "http", "port"]).set_value(8080);

    assert!(root.is_map());
    assert!(root.node(["server", "http"]).expect("intermediate node").is_map());
    assert_eq!(root.node(["server", "http", "port"]).and_then(|n| n.as_integer()), Some(8080));
    assert!(root.node(["server", "https"]).is_none());
    assert!(root.node(["server", "http", "port", "deeper"]).is_none());
}

#[test]
fn test_lists_are_padded_and_converted() {
    let mut root = ConfigNode::root();
    root.node_mut(&path("items[2]")).set_value("third");

    let items = root.node(["items"]).and_then(|n| n.children_list()).expect("list");
    assert_eq!(items.len(), 3);
    assert!(items[0].is_null() && items[1].is_null());
    assert_eq!(items[2].as_str(), Some("third"));

    // Addressing a list by name turns it into a map keyed by index.
    root.node_mut(["items", "extra"]).set_value(true);
    let items = root.node(["items"]).expect("items");
    assert!(items.is_map());
    assert_eq!(items.node(["2"]).and_then(|n| n.as_str()), Some("third"));
    assert_eq!(items.node([2usize]).and_then(|n| n.as_str()), Some("third"));
    assert_eq!(items.node(["extra"]).and_then(|n| n.as_boolean()), Some(true));
}

#[test]
fn test_append_and_remove_children() {
    let mut root = ConfigNode::root();
    let list = root.node_mut(["list"]);
    list.append_list_child().set_value("a");
    list.append_list_child().set_value("b");
    assert_eq!(list.children_list().map(<[ConfigNode]>::len), Some(2));

    let removed = list.remove_child(0usize).expect("removed item");
    assert_eq!(removed.as_str(), Some("a"));
    assert_eq!(list.node([0usize]).and_then(|n| n.as_str()), Some("b"));

    assert!(root.remove_child("list").is_some());
    assert!(root.remove_child("list").is_none());
    assert!(root.is_empty());
}

#[test]
fn test_typed_get_and_set() {
    let mut root = ConfigNode::root();
    let db = Database {
        url: "postgres://localhost/app".to_string(),
        pool_size: 8,
        replicas: vec!["r1".to_string()],
    };
    root.node_mut(["database"]).set(&db).expect("set struct");

    assert_eq!(root.node(["database", "pool_size"]).and_then(|n| n.as_integer()), Some(8));
    let back: Database = root.node(["database"]).expect("database").get().expect("get struct");
    assert_eq!(back, db);

    // Struct fields keep their declaration order.
    let keys: Vec<&str> = root
        .node(["database"])
        .and_then(|n| n.children_map())
        .expect("map")
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys, vec!["url", "pool_size", "replicas"]);

    let wrong: Result<u32, _> = root.node(["database", "url"]).expect("url").get();
    assert!(matches!(wrong, Err(ConfigError::Serialization(_))));
}

#[test]
fn test_set_keeps_metadata() {
    let mut root = ConfigNode::root();
    let node = root.node_mut(["port"]);
    node.set_comment(Some("Listening port"))
        .set_attribute("unit", "tcp")
        .set_tag_name(Some("port"));
    node.set(9000).expect("set");

    assert_eq!(node.comment(), Some("Listening port"));
    assert_eq!(node.attribute("unit"), Some("tcp"));
    assert_eq!(node.tag_name(), Some("port"));
    assert_eq!(node.as_integer(), Some(9000));

    node.set(None::<i32>).expect("set none");
    assert!(node.is_null());
    assert_eq!(node.remove_attribute("unit"), Some("tcp".to_string()));
    assert!(node.attributes().is_empty());
}

#[test]
fn test_null_nodes_initialize_collections() {
    let root = ConfigNode::root();

    let list: Vec<String> = root.get().expect("implicit empty list");
    assert!(list.is_empty());
    let map: HashMap<String, i64> = root.get().expect("implicit empty map");
    assert!(map.is_empty());
    let missing: Option<String> = root.get().expect("null as none");
    assert_eq!(missing, None);

    let strict = ConfigNode::root_with(ConfigOptions::defaults().with_implicit_initialization(false));
    let result: Result<Vec<String>, _> = strict.get();
    assert!(result.is_err());
    let scalar: Result<i64, _> = root.get();
    assert!(scalar.is_err());
}

#[test]
fn test_get_or_and_get_or_set() {
    let mut root = ConfigNode::root();

    assert_eq!(root.node_mut(["retries"]).get_or(3).expect("default"), 3);
    assert!(root.node(["retries"]).expect("created by node_mut").is_null());

    assert_eq!(root.node_mut(["retries"]).get_or_set(3).expect("default"), 3);
    assert_eq!(root.node(["retries"]).and_then(|n| n.as_integer()), Some(3));
    assert_eq!(root.node_mut(["retries"]).get_or_set(5).expect("existing"), 3);

    let mut no_copy = ConfigNode::root_with(ConfigOptions::defaults().with_should_copy_defaults(false));
    assert_eq!(no_copy.node_mut(["retries"]).get_or_set(3).expect("default"), 3);
    assert!(no_copy.node(["retries"]).expect("node").is_null());
}

#[test]
fn test_options_are_shared_with_children() {
    let options = ConfigOptions::defaults().with_header(Some("Header"));
    let mut root = ConfigNode::root_with(options.clone());
    root.node_mut(["a", "b"]).set_value(1);
    assert_eq!(root.node(["a", "b"]).map(|n| n.options()), Some(&options));

    let replaced = options.with_should_copy_defaults(false);
    root.set_options(replaced.clone());
    assert_eq!(root.node(["a", "b"]).map(|n| n.options()), Some(&replaced));
    assert_eq!(root.node(["a"]).expect("a").create_detached().options(), &replaced);
}

#[test]
fn test_merge_fills_gaps_only() {
    let mut target = ConfigNode::root();
    target.node_mut(["server", "port"]).set_value(9000);
    target.node_mut(["name"]).set_value("mine");

    let mut defaults = ConfigNode::root();
    defaults.node_mut(["server", "port"]).set_value(80).set_comment(Some("Port"));
    defaults.node_mut(["server", "host"]).set_value("0.0.0.0");
    defaults.node_mut(["name"]).set_value("theirs");
    defaults.node_mut(["features"]).set(vec!["a", "b"]).expect("set list");

    target.merge_from(&defaults);

    assert_eq!(target.node(["server", "port"]).and_then(|n| n.as_integer()), Some(9000));
    assert_eq!(target.node(["server", "port"]).and_then(|n| n.comment()), Some("Port"));
    assert_eq!(target.node(["server", "host"]).and_then(|n| n.as_str()), Some("0.0.0.0"));
    assert_eq!(target.node(["name"]).and_then(|n| n.as_str()), Some("mine"));
    let features: Vec<String> = target.node(["features"]).expect("features").get().expect("list");
    assert_eq!(features, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_walk_visits_parents_first() {
    let mut root = ConfigNode::root();
    root.node_mut(["a", "b"]).set_value(1);
    root.node_mut(["list"]).set(vec!["x"]).expect("set list");

    let mut visited = Vec::new();
    root.walk(|path, _| visited.push(path.to_string()));

    assert_eq!(visited, vec!["", "a", "a.b", "list", "list[0]"]);
}

#[test]
fn test_serde_representation() {
    let mut root = ConfigNode::root();
    root.node_mut(["name"]).set_value("demo");
    root.node_mut(["ratio"]).set_value(0.5);
    root.node_mut(["tags"]).set(vec!["x", "y"]).expect("set list");
    root.node_mut(["nothing"]);

    let json = serde_json::to_string(&root).expect("serialize");
    assert_eq!(json, r#"{"name":"demo","ratio":0.5,"tags":["x","y"],"nothing":null}"#);

    let parsed: ConfigNode = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(parsed.node(["ratio"]).and_then(|n| n.as_scalar()), Some(&Scalar::Float(0.5)));
    assert_eq!(parsed.node(["tags"]).map(|n| n.to_string()), Some("[x, y]".to_string()));
    assert!(parsed.node(["nothing"]).expect("null entry").is_null());
}

#[test]
fn test_scalar_accessors() {
    let node = ConfigNode::from_value(42);
    assert_eq!(node.as_integer(), Some(42));
    assert_eq!(node.as_float(), Some(42.0));
    assert_eq!(node.as_str(), None);
    assert_eq!(node.to_string(), "42");

    let mut map = ConfigNode::from_value(NodeValue::empty_map());
    assert!(map.is_map() && map.is_empty());
    map.take_value();
    assert!(map.is_null());
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
enum Mode {
    Off,
    Fixed(u32),
    Range { low: f64, high: f64 },
}

#[test]
fn test_non_finite_floats_keep_their_value() {
    let mut root = ConfigNode::root();
    root.node_mut(["nan"]).set(f64::NAN).expect("set NaN");
    root.node_mut(["limits"]).set(vec![f64::INFINITY, f64::NEG_INFINITY]).expect("set infinities");

    let nan = root.node(["nan"]).expect("nan");
    assert!(matches!(nan.value(), NodeValue::Scalar(Scalar::Float(f)) if f.is_nan()));
    let back: f64 = nan.get().expect("get NaN");
    assert!(back.is_nan());

    let limits: Vec<f64> = root.node(["limits"]).expect("limits").get().expect("get infinities");
    assert_eq!(limits, vec![f64::INFINITY, f64::NEG_INFINITY]);
}

#[test]
fn test_enums_map_to_names_and_tagged_maps() {
    let mut root = ConfigNode::root();
    root.node_mut(["off"]).set(Mode::Off).expect("set unit variant");
    root.node_mut(["fixed"]).set(Mode::Fixed(3)).expect("set newtype variant");
    root.node_mut(["range"]).set(Mode::Range { low: 0.5, high: 2.0 }).expect("set struct variant");

    assert_eq!(root.node(["off"]).and_then(|n| n.as_str()), Some("Off"));
    assert_eq!(root.node(["fixed", "Fixed"]).and_then(|n| n.as_integer()), Some(3));
    assert_eq!(root.node(["range", "Range", "high"]).and_then(|n| n.as_float()), Some(2.0));

    for (key, expected) in [
        ("off", Mode::Off),
        ("fixed", Mode::Fixed(3)),
        ("range", Mode::Range { low: 0.5, high: 2.0 }),
    ] {
        let mode: Mode = root.node([key]).expect("mode").get().expect("get enum");
        assert_eq!(mode, expected);
    }
}

#[test]
fn test_quoted_keys_with_escapes_round_trip() {
    for name in ["line\nbreak.key", "back\\slash.key", "say \"hi\"", "tab\there[0]"] {
        let original = NodePath::root().child(name).child(2usize);
        let text = original.to_string();
        assert_eq!(path(&text), original, "{}", text);
    }
}
