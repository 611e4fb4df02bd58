//! Tests for loaders, header handling and configuration references.
//!
//! A minimal `key = value` format stands in for a real adapter so the loader
//! behaviour can be checked on its own.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::tempdir;

use confnode::{
    CommentHandler, ConfigError, ConfigFormat, ConfigNode, ConfigOptions, ConfigurationLoader, HeaderMode, Loader,
    NodeValue,
};

/// Flat `key = value` lines; `#` starts a comment.
#[derive(Debug, Clone, Default)]
struct LineFormat;

impl ConfigFormat for LineFormat {
    fn name(&self) -> &str {
        "lines"
    }

    fn comment_handler(&self) -> CommentHandler {
        CommentHandler::Hash
    }

    fn read(&self, input: &str, _origin: Option<&Path>) -> confnode::Result<ConfigNode> {
        let mut root = ConfigNode::root();
        root.set_value(NodeValue::empty_map());
        for (number, line) in input.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| ConfigError::parse_at(number + 1, 1, "expected 'key = value'"))?;
            root.node_mut([key.trim()]).set_value(value.trim());
        }
        Ok(root)
    }

    fn write(&self, node: &ConfigNode, header: Option<&str>, out: &mut String) -> confnode::Result<()> {
        if let Some(header) = header {
            out.push_str(&CommentHandler::Hash.to_comment(header));
            out.push_str("\n\n");
        }
        if let Some(children) = node.children_map() {
            for (key, child) in children {
                let scalar = child
                    .as_scalar()
                    .ok_or_else(|| ConfigError::Serialization(format!("'{}' is not a scalar", key)))?;
                out.push_str(&format!("{} = {}\n", key, scalar));
            }
        }
        Ok(())
    }
}

fn text_loader(text: &str) -> Loader<LineFormat> {
    Loader::builder(LineFormat).source_text(text).build()
}

#[test]
fn test_load_from_text() {
    let root = text_loader("name = demo\nport = 80\n").load().expect("load");
    assert_eq!(root.node(["name"]).and_then(|n| n.as_str()), Some("demo"));
    assert_eq!(root.node(["port"]).and_then(|n| n.as_str()), Some("80"));
}

#[test]
fn test_whitespace_document_is_empty_root() {
    let loader = Loader::builder(LineFormat)
        .source_text("  \n\t\n")
        .default_options(ConfigOptions::defaults().with_should_copy_defaults(false))
        .build();
    let root = loader.load().expect("load");
    assert!(root.is_null());
    assert!(!root.options().should_copy_defaults());
}

#[test]
fn test_byte_order_mark_is_ignored() {
    let root = text_loader("\u{feff}# Header\n\nkey = value\n").load().expect("load");
    assert_eq!(root.options().header(), Some("Header"));
    assert_eq!(root.node(["key"]).and_then(|n| n.as_str()), Some("value"));
}

#[test]
fn test_header_modes() {
    let text = "# From file\n\nkey = value\n";
    let preset = ConfigOptions::defaults().with_header(Some("Preset header"));

    let preserve = Loader::builder(LineFormat)
        .source_text(text)
        .default_options(preset.clone())
        .build();
    let root = preserve.load().expect("load");
    assert_eq!(root.options().header(), Some("From file"));
    assert!(preserve.save_to_string(&root).expect("render").starts_with("# From file\n\n"));

    let keep_preset = Loader::builder(LineFormat)
        .source_text(text)
        .header_mode(HeaderMode::Preset)
        .default_options(preset.clone())
        .build();
    let root = keep_preset.load().expect("load");
    assert_eq!(root.options().header(), Some("Preset header"));
    assert!(keep_preset.save_to_string(&root).expect("render").starts_with("# Preset header\n\n"));

    let none = Loader::builder(LineFormat)
        .source_text(text)
        .header_mode(HeaderMode::None)
        .default_options(preset)
        .build();
    let root = none.load().expect("load");
    assert_eq!(root.options().header(), None);
    assert_eq!(none.save_to_string(&root).expect("render"), "key = value\n");
}

#[test]
fn test_comment_attached_to_first_entry_is_not_a_header() {
    let root = text_loader("# Describes key\nkey = value\n").load().expect("load");
    assert_eq!(root.options().header(), None);
}

#[test]
fn test_load_with_explicit_options() {
    let loader = text_loader("key = value\n");
    let options = ConfigOptions::defaults().with_implicit_initialization(false);
    let root = loader.load_with(options.clone()).expect("load");
    assert_eq!(root.options(), &options);
    assert_eq!(root.node(["key"]).map(|n| n.options()), Some(&options));
}

#[test]
fn test_missing_file_loads_empty_node() {
    let dir = tempdir().expect("Unable to create temporary directory");
    let loader = Loader::builder(LineFormat).path(dir.path().join("absent.conf")).build();

    assert!(loader.can_load());
    assert!(loader.can_save());
    let root = loader.load().expect("load");
    assert!(root.is_null());
    assert_eq!(loader.create_empty_node().options(), &loader.default_options());
}

#[test]
fn test_loader_without_source_or_sink() {
    let loader = Loader::builder(LineFormat).build();
    assert!(!loader.can_load());
    assert!(!loader.can_save());
    assert!(matches!(loader.load(), Err(ConfigError::Unsupported(_))));
    assert!(matches!(loader.save(&ConfigNode::root()), Err(ConfigError::Unsupported(_))));

    let text_only = text_loader("a = 1");
    assert!(text_only.can_load());
    assert!(!text_only.can_save());
}

#[test]
fn test_parse_error_reports_file_and_position() {
    let dir = tempdir().expect("Unable to create temporary directory");
    let path = dir.path().join("broken.conf");
    fs::write(&path, "good = 1\nbroken line\n").expect("write fixture");

    let err = Loader::builder(LineFormat).path(&path).build().load().expect_err("parse error");
    let message = err.to_string();
    match err {
        ConfigError::Parse { origin, position, .. } => {
            assert_eq!(origin.as_deref(), Some(path.as_path()));
            assert_eq!(position.map(|p| (p.line, p.column)), Some((2, 1)));
        }
        other => panic!("expected a parse error, got {:?}", other),
    }
    assert!(message.contains("broken.conf at 2:1"), "{}", message);
}

#[test]
fn test_save_writes_atomically_into_new_directories() {
    let dir = tempdir().expect("Unable to create temporary directory");
    let target = dir.path().join("a").join("b").join("app.conf");
    let loader = Loader::builder(LineFormat).path(&target).build();

    let mut root = loader.load().expect("load");
    root.node_mut(["key"]).set_value("value");
    loader.save(&root).expect("save");
    root.node_mut(["key"]).set_value("updated");
    loader.save(&root).expect("save again");

    assert_eq!(fs::read_to_string(&target).expect("read"), "key = updated\n");
    let leftovers: Vec<_> = fs::read_dir(target.parent().expect("parent"))
        .expect("list dir")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name())
        .collect();
    assert_eq!(leftovers.len(), 1, "temporary files left behind: {:?}", leftovers);
}

#[test]
fn test_failed_render_leaves_file_untouched() {
    let dir = tempdir().expect("Unable to create temporary directory");
    let target = dir.path().join("app.conf");
    fs::write(&target, "key = original\n").expect("write fixture");
    let loader = Loader::builder(LineFormat).path(&target).build();

    let mut root = ConfigNode::root();
    root.node_mut(["nested", "key"]).set_value(1);
    assert!(matches!(loader.save(&root), Err(ConfigError::Serialization(_))));
    assert_eq!(fs::read_to_string(&target).expect("read"), "key = original\n");
}

#[test]
fn test_separate_source_and_sink() {
    let dir = tempdir().expect("Unable to create temporary directory");
    let source = dir.path().join("defaults.conf");
    let sink = dir.path().join("out.conf");
    fs::write(&source, "key = value\n").expect("write fixture");

    let loader = Loader::builder(LineFormat).source_path(&source).sink_path(&sink).build();
    assert_eq!(loader.source_path(), Some(source.as_path()));
    assert_eq!(loader.sink_path(), Some(sink.as_path()));

    let root = loader.load().expect("load");
    loader.save(&root).expect("save");
    assert_eq!(fs::read_to_string(&sink).expect("read"), "key = value\n");
}

#[test]
fn test_home_directory_is_expanded() {
    let loader = Loader::builder(LineFormat).path("~/configs/../app.conf").build();
    if let Some(home) = home::home_dir() {
        assert_eq!(loader.sink_path(), Some(home.join("app.conf").as_path()));
    }
}

#[test]
fn test_comment_handlers_extract_headers() {
    assert_eq!(
        CommentHandler::Hash.extract_header("# First\n#\n# Third\n\nkey = 1"),
        Some("First\n\nThird".to_string())
    );
    assert_eq!(CommentHandler::Hash.extract_header("# Only comment"), Some("Only comment".to_string()));
    assert_eq!(CommentHandler::Hash.extract_header("key = 1"), None);
    assert_eq!(
        CommentHandler::DoubleSlash.extract_header("// Slashes\n\n{}"),
        Some("Slashes".to_string())
    );
    assert_eq!(
        CommentHandler::SlashBlock.extract_header("/*\n * Block\n * header\n */\n\n{}"),
        Some("Block\nheader".to_string())
    );
    assert_eq!(CommentHandler::SlashBlock.extract_header("/* attached */\n{}"), None);
    assert_eq!(
        CommentHandler::Xml.extract_header("<?xml version=\"1.0\"?>\n<!-- Xml header -->\n\n<root/>"),
        Some("Xml header".to_string())
    );
}

#[test]
fn test_comment_handlers_render_comments() {
    assert_eq!(CommentHandler::Hash.to_comment("a\n\nb"), "# a\n#\n# b");
    assert_eq!(CommentHandler::DoubleSlash.to_comment("a"), "// a");
    assert_eq!(CommentHandler::SlashBlock.to_comment("a\nb"), "/*\n * a\n * b\n */");
    assert_eq!(CommentHandler::Xml.to_comment("a -- b"), "<!-- a - - b -->");
    assert_eq!(CommentHandler::Xml.to_comment("a\nb"), "<!--\na\nb\n-->");
}

#[test]
fn test_reference_get_set_and_save() {
    let dir = tempdir().expect("Unable to create temporary directory");
    let path = dir.path().join("app.conf");
    fs::write(&path, "name = demo\n").expect("write fixture");

    let reference = Loader::builder(LineFormat).path(&path).build().load_to_reference().expect("reference");
    assert_eq!(reference.get::<String, _>(["name"]).expect("name"), "demo");
    assert_eq!(reference.get::<Option<String>, _>(["missing"]).expect("missing"), None);
    assert!(reference.get::<Vec<String>, _>(["missing"]).expect("missing list").is_empty());

    reference.set(["mode"], "fast").expect("set");
    reference.update(|root| {
        root.node_mut(["level"]).set_value("3");
    });
    reference.save().expect("save");

    assert_eq!(
        fs::read_to_string(&path).expect("read"),
        "name = demo\nmode = fast\nlevel = 3\n"
    );
    assert_eq!(reference.loader().sink_path(), Some(path.as_path()));
}

#[test]
fn test_reference_reload_notifies_subscribers() {
    let dir = tempdir().expect("Unable to create temporary directory");
    let path = dir.path().join("app.conf");
    fs::write(&path, "name = first\n").expect("write fixture");

    let reference = Loader::builder(LineFormat).path(&path).build().load_to_reference().expect("reference");
    let notifications = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&notifications);
    reference.subscribe(move |root| {
        assert!(root.node(["name"]).is_some());
        seen.fetch_add(1, Ordering::SeqCst);
    });

    fs::write(&path, "name = second\n").expect("rewrite fixture");
    reference.reload().expect("reload");
    assert_eq!(reference.get::<String, _>(["name"]).expect("name"), "second");
    assert_eq!(notifications.load(Ordering::SeqCst), 1);

    let mut replacement = reference.node();
    replacement.node_mut(["name"]).set_value("third");
    reference.save_node(replacement).expect("save node");
    assert_eq!(notifications.load(Ordering::SeqCst), 2);
    assert_eq!(reference.node().node(["name"]).and_then(|n| n.as_str()), Some("third"));
    assert_eq!(fs::read_to_string(&path).expect("read"), "name = third\n");
}

#[test]
fn test_reference_keeps_node_when_save_fails() {
    let reference = text_loader("name = kept\n").load_to_reference().expect("reference");
    let replacement = ConfigNode::root();
    assert!(reference.save_node(replacement).is_err());
    assert_eq!(reference.node().node(["name"]).and_then(|n| n.as_str()), Some("kept"));
}

#[test]
fn test_reference_saves_from_many_threads() {
    let dir = tempdir().expect("Unable to create temporary directory");
    let path = dir.path().join("app.conf");
    fs::write(&path, "name = shared\n").expect("write fixture");

    let reference = Loader::builder(LineFormat).path(&path).build().load_to_reference().expect("reference");
    std::thread::scope(|scope| {
        for worker in 0..8 {
            let reference = &reference;
            scope.spawn(move || {
                for round in 0..25 {
                    reference.set(["counter"], format!("{}-{}", worker, round)).expect("set");
                    reference.save().expect("concurrent save");
                }
            });
        }
    });

    let written = fs::read_to_string(&path).expect("read");
    assert!(written.starts_with("name = shared\ncounter = "), "{}", written);
    let leftovers = fs::read_dir(dir.path()).expect("list dir").count();
    assert_eq!(leftovers, 1, "temporary files left behind");
}

#[test]
fn test_subscriber_may_subscribe_during_notification() {
    let reference = Arc::new(text_loader("name = demo\n").load_to_reference().expect("reference"));
    let notifications = Arc::new(AtomicUsize::new(0));

    let inner_reference = Arc::clone(&reference);
    let seen = Arc::clone(&notifications);
    reference.subscribe(move |_| {
        let seen = Arc::clone(&seen);
        inner_reference.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
    });

    reference.reload().expect("first reload");
    assert_eq!(notifications.load(Ordering::SeqCst), 0);
    reference.reload().expect("second reload");
    assert_eq!(notifications.load(Ordering::SeqCst), 1);
}
