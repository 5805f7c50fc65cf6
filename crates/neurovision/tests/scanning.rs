//! Integration tests for full scans: extraction across languages, warnings,
//! error paths and cancellation.

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use neurovision::{
    Config, EdgeKind, Error, GraphState, NeuroVision, NodeKind, ParseWarningKind, ScanError,
};
use tokio_util::sync::CancellationToken;

/// Create a temporary project with the given files.
fn project_with_files(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().expect("should create temp dir");
    for (path, content) in files {
        let full_path = dir.path().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("should create parent dirs");
        }
        fs::write(&full_path, content).expect("should write file");
    }
    dir
}

fn id(engine: &NeuroVision, relative: &str) -> String {
    engine.root().join(relative).to_string_lossy().into_owned()
}

fn has_edge(engine: &NeuroVision, from: &str, to: &str, kind: EdgeKind) -> bool {
    engine
        .snapshot()
        .edges()
        .any(|(s, t, e)| s.as_str() == from && t.as_str() == to && e.kind == kind)
}

// === Extraction across languages ===

#[test]
fn scan_builds_edges_for_every_language() {
    let dir = project_with_files(&[
        ("app/main.py", "import app.util\nimport requests\n"),
        ("app/util.py", "import os\n"),
        ("web/index.ts", "import { api } from './api';\nconst fs = require('fs');\n"),
        ("web/api.ts", "export const api = 1;\n"),
        ("src/lib.rs", "mod parser;\nuse crate::parser::parse;\n"),
        ("src/parser.rs", "pub fn parse() {}\n"),
        ("native/main.c", "#include \"util.h\"\n#include <stdio.h>\n"),
        ("native/util.h", "int util(void);\n"),
    ]);
    let engine = NeuroVision::open(dir.path(), Config::default()).expect("open project");

    let summary = engine.scan(&CancellationToken::new()).expect("scan should succeed");

    assert_eq!(summary.files_scanned, 8);
    assert!(summary.warnings.is_empty(), "unexpected warnings: {:?}", summary.warnings);
    assert_eq!(engine.state(), GraphState::Ready);

    assert!(has_edge(&engine, &id(&engine, "app/main.py"), &id(&engine, "app/util.py"), EdgeKind::Import));
    assert!(has_edge(&engine, &id(&engine, "app/main.py"), "external:requests", EdgeKind::Import));
    assert!(has_edge(&engine, &id(&engine, "web/index.ts"), &id(&engine, "web/api.ts"), EdgeKind::Import));
    assert!(has_edge(&engine, &id(&engine, "web/index.ts"), "external:fs", EdgeKind::Require));
    assert!(has_edge(&engine, &id(&engine, "src/lib.rs"), &id(&engine, "src/parser.rs"), EdgeKind::Module));
    assert!(has_edge(&engine, &id(&engine, "native/main.c"), &id(&engine, "native/util.h"), EdgeKind::Include));
    assert!(has_edge(&engine, &id(&engine, "native/main.c"), "external:stdio.h", EdgeKind::Include));
}

#[test]
fn missing_module_becomes_one_external_edge() {
    let dir = project_with_files(&[("a.py", "import not_a_real_module\n")]);
    let engine = NeuroVision::open(dir.path(), Config::default()).expect("open project");

    let summary = engine.scan(&CancellationToken::new()).expect("scan should succeed");

    assert!(summary.warnings.is_empty());
    assert_eq!(summary.edges, 1);
    assert_eq!(summary.unresolved, 1);
    let snapshot = engine.snapshot();
    let external = snapshot
        .node("external:not_a_real_module")
        .expect("external node should exist");
    assert_eq!(external.kind, NodeKind::External);
}

#[test]
fn hidden_excluded_and_ignored_paths_are_skipped() {
    let dir = project_with_files(&[
        ("main.py", ""),
        (".venv/lib.py", ""),
        ("node_modules/pkg/index.js", ""),
        ("generated/schema.py", ""),
    ]);
    let mut config = Config::default();
    config.scan.ignore = vec!["generated/**".to_string()];
    let engine = NeuroVision::open(dir.path(), config).expect("open project");

    let summary = engine.scan(&CancellationToken::new()).expect("scan should succeed");

    assert_eq!(summary.files_scanned, 1);
    assert_eq!(engine.stats().nodes, 1);
}

// === Warnings ===

#[test]
fn unreadable_files_become_warnings() {
    let dir = project_with_files(&[
        ("good.py", "import big\n"),
    ]);
    fs::write(dir.path().join("binary.py"), [0xff_u8, 0xfe, 0x00, 0x01]).expect("write binary");
    fs::write(dir.path().join("big.py"), "#".repeat(200)).expect("write big file");
    let mut config = Config::default();
    config.scan.max_file_size = 100;
    let engine = NeuroVision::open(dir.path(), config).expect("open project");

    let summary = engine.scan(&CancellationToken::new()).expect("scan should succeed");

    assert_eq!(summary.files_scanned, 1);
    assert_eq!(summary.files_skipped, 2);
    let mut kinds: Vec<_> = summary.warnings.iter().map(|w| w.kind).collect();
    kinds.sort_by_key(|k| k.to_string());
    assert_eq!(kinds, vec![ParseWarningKind::EncodingError, ParseWarningKind::TooLarge]);
}

// === Error paths ===

#[test]
fn missing_root_fails_to_open() {
    let dir = tempfile::tempdir().expect("should create temp dir");

    let err = NeuroVision::open(&dir.path().join("absent"), Config::default())
        .expect_err("missing root should fail");

    assert!(matches!(err, Error::Scan(ScanError::RootNotFound { .. })));
}

#[test]
fn file_root_fails_to_open() {
    let dir = project_with_files(&[("a.py", "")]);

    let err = NeuroVision::open(&dir.path().join("a.py"), Config::default())
        .expect_err("file root should fail");

    assert!(matches!(err, Error::Scan(ScanError::NotADirectory { .. })));
}

#[test]
fn vanished_root_fails_the_scan_but_not_the_engine() {
    let dir = project_with_files(&[("a.py", "")]);
    let root = dir.path().join("project");
    fs::create_dir(&root).expect("create project dir");
    fs::write(root.join("a.py"), "").expect("write file");
    let engine = NeuroVision::open(&root, Config::default()).expect("open project");
    engine.scan(&CancellationToken::new()).expect("first scan");

    fs::remove_dir_all(&root).expect("remove project");
    let err = engine
        .scan(&CancellationToken::new())
        .expect_err("scan of vanished root should fail");

    assert!(matches!(err, Error::Scan(ScanError::RootNotFound { .. })));
    assert_eq!(engine.state(), GraphState::Ready);
    assert_eq!(engine.stats().nodes, 1, "graph keeps its last consistent state");
}

#[test]
fn invalid_ignore_pattern_fails_to_open() {
    let dir = project_with_files(&[]);
    let mut config = Config::default();
    config.scan.ignore = vec!["[unclosed".to_string()];

    let err = NeuroVision::open(dir.path(), config).expect_err("bad glob should fail");

    assert!(matches!(err, Error::Scan(ScanError::InvalidIgnore { .. })));
}

// === Cancellation ===

#[test]
fn cancelled_first_scan_leaves_graph_empty() {
    let dir = project_with_files(&[("a.py", "import b\n"), ("b.py", "")]);
    let engine = NeuroVision::open(dir.path(), Config::default()).expect("open project");
    let token = CancellationToken::new();
    token.cancel();

    let err = engine.scan(&token).expect_err("cancelled scan should fail");

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(engine.state(), GraphState::Empty);
    assert_eq!(engine.stats().nodes, 0);
}

#[test]
fn cancelled_rescan_leaves_graph_exactly_as_before() {
    let dir = project_with_files(&[("a.py", "import b\n"), ("b.py", "")]);
    let engine = NeuroVision::open(dir.path(), Config::default()).expect("open project");
    engine.scan(&CancellationToken::new()).expect("first scan");
    let before = engine.snapshot();

    fs::write(dir.path().join("a.py"), "import os\n").expect("rewrite a.py");
    fs::write(dir.path().join("c.py"), "import a\n").expect("add c.py");
    let token = CancellationToken::new();
    token.cancel();
    let err = engine.scan(&token).expect_err("cancelled scan should fail");

    assert!(matches!(err, Error::Cancelled));
    let after = engine.snapshot();
    assert_eq!(after.generation(), before.generation());
    assert_eq!(after.node_count(), before.node_count());
    let mut before_edges: Vec<_> = before.edges().map(|(s, t, e)| (s.clone(), t.clone(), e)).collect();
    let mut after_edges: Vec<_> = after.edges().map(|(s, t, e)| (s.clone(), t.clone(), e)).collect();
    before_edges.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
    after_edges.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
    assert_eq!(before_edges, after_edges);
    assert_eq!(engine.state(), GraphState::Ready);
}

// === Configuration discovery ===

#[test]
fn project_config_file_is_picked_up() {
    let dir = project_with_files(&[
        (".neurovision.yaml", "scan:\n  ignore: [\"legacy/**\"]\ntelemetry:\n  annotation_capacity: 7\n"),
        ("main.py", ""),
        ("legacy/old.py", ""),
    ]);

    let engine = NeuroVision::discover(dir.path(), None).expect("open project");
    engine.scan(&CancellationToken::new()).expect("scan");

    assert_eq!(engine.config().telemetry.annotation_capacity, 7);
    assert_eq!(engine.stats().nodes, 1);
}

#[test]
fn malformed_config_file_is_a_config_error() {
    let dir = project_with_files(&[(".neurovision.yaml", "scan:\n  bogus_key: 1\n")]);

    let err = NeuroVision::discover(dir.path(), None).expect_err("bad config should fail");

    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn explicit_config_path_overrides_project_file() {
    let dir = project_with_files(&[
        (".neurovision.yaml", "telemetry:\n  annotation_capacity: 7\n"),
        ("custom.yaml", "telemetry:\n  annotation_capacity: 3\n"),
    ]);

    let engine = NeuroVision::discover(dir.path(), Some(&dir.path().join("custom.yaml")))
        .expect("open project");

    assert_eq!(engine.config().telemetry.annotation_capacity, 3);
    assert!(Path::new(engine.root()).is_absolute());
}
