//! Integration tests for impact analysis over scanned projects.

use std::fs;
use tempfile::TempDir;

use neurovision::{
    Config, ImpactOptions, ImpactOutcome, ImpactResult, NeuroVision, RescanOutcome,
};
use rstest::rstest;
use tokio_util::sync::CancellationToken;

fn scanned_project(files: &[(&str, &str)]) -> (TempDir, NeuroVision) {
    let dir = tempfile::tempdir().expect("should create temp dir");
    for (path, content) in files {
        let full_path = dir.path().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("should create parent dirs");
        }
        fs::write(&full_path, content).expect("should write file");
    }
    let engine = NeuroVision::open(dir.path(), Config::default()).expect("open project");
    engine.scan(&CancellationToken::new()).expect("scan should succeed");
    (dir, engine)
}

fn found(engine: &NeuroVision, target: &str, options: &ImpactOptions) -> ImpactResult {
    match engine.analyze_impact(target, options).expect("valid query") {
        ImpactOutcome::Found(result) => result,
        ImpactOutcome::NotFound { target } => panic!("{target} not found"),
    }
}

/// (relative path, distance) pairs in result order.
fn ripple(engine: &NeuroVision, result: &ImpactResult) -> Vec<(String, u32)> {
    result
        .impacted
        .iter()
        .map(|n| {
            let rel = std::path::Path::new(n.node.as_str())
                .strip_prefix(engine.root())
                .map_or_else(|_| n.node.to_string(), |p| p.display().to_string());
            (rel, n.distance)
        })
        .collect()
}

#[test]
fn chain_is_reported_nearest_first() {
    let (_dir, engine) = scanned_project(&[
        ("a.py", "import b\n"),
        ("b.py", "import c\n"),
        ("c.py", ""),
    ]);

    let result = found(&engine, "c.py", &ImpactOptions::default());

    assert_eq!(
        ripple(&engine, &result),
        vec![("b.py".to_string(), 1), ("a.py".to_string(), 2)]
    );
    assert_eq!(result.direct_count, 1);
    assert_eq!(result.transitive_count, 1);
    assert_eq!(result.risk_score, 12);
}

#[test]
fn shortcut_wins_over_longer_path() {
    let (_dir, engine) = scanned_project(&[
        ("app.py", "import service\nimport db\n"),
        ("service.py", "import db\n"),
        ("db.py", ""),
    ]);

    let result = found(&engine, "db.py", &ImpactOptions::default());

    assert_eq!(
        ripple(&engine, &result),
        vec![("app.py".to_string(), 1), ("service.py".to_string(), 1)]
    );
}

#[test]
fn cycle_terminates_and_reaches_root_only_through_the_cycle() {
    let (_dir, engine) = scanned_project(&[
        ("a.py", "import b\n"),
        ("b.py", "import c\n"),
        ("c.py", "import a\n"),
    ]);

    let result = found(&engine, "a.py", &ImpactOptions::default());
    let ripple = ripple(&engine, &result);

    assert_eq!(
        ripple,
        vec![
            ("c.py".to_string(), 1),
            ("b.py".to_string(), 2),
            ("a.py".to_string(), 3),
        ]
    );
    assert_eq!(result.risk_score, 12, "the target itself does not add risk");
}

#[rstest]
#[case::unbounded(None, 3, false)]
#[case::one_hop(Some(1), 1, true)]
#[case::two_hops(Some(2), 2, true)]
fn max_hops_limits_the_ripple(
    #[case] max_hops: Option<u32>,
    #[case] expected: usize,
    #[case] truncated: bool,
) {
    let (_dir, engine) = scanned_project(&[
        ("d.py", "import c\n"),
        ("c.py", "import b\n"),
        ("b.py", "import a\n"),
        ("a.py", ""),
    ]);
    let options = ImpactOptions {
        max_hops,
        ..ImpactOptions::default()
    };

    let result = found(&engine, "a.py", &options);

    assert_eq!(result.impacted.len(), expected);
    assert_eq!(result.truncated, truncated);
}

#[test]
fn unresolved_dependents_score_lower() {
    let (_dir, engine) = scanned_project(&[
        ("a.py", "import requests\n"),
        ("b.py", "import a\n"),
    ]);

    let result = found(&engine, "external:requests", &ImpactOptions::default());

    assert_eq!(result.impacted.len(), 2);
    let direct = &result.impacted[0];
    assert!(direct.confidence < 1.0);
    assert!(result.impacted[1].confidence <= direct.confidence);
}

#[rstest]
#[case::relative("pkg/mod.py")]
#[case::suffix("mod.py")]
#[case::dotted_relative("./pkg/mod.py")]
fn targets_resolve_by_path(#[case] target: &str) {
    let (_dir, engine) = scanned_project(&[
        ("pkg/__init__.py", ""),
        ("pkg/mod.py", ""),
        ("main.py", "import pkg.mod\n"),
    ]);

    let result = found(&engine, target, &ImpactOptions::default());

    assert!(result.root.as_str().ends_with("pkg/mod.py"));
    assert_eq!(result.impacted.len(), 1);
}

#[test]
fn absent_target_is_not_found_rather_than_an_error() {
    let (_dir, engine) = scanned_project(&[("a.py", "")]);

    let outcome = engine
        .analyze_impact("nowhere.py", &ImpactOptions::default())
        .expect("query should succeed");

    assert_eq!(
        outcome,
        ImpactOutcome::NotFound {
            target: "nowhere.py".to_string()
        }
    );
    let json = serde_json::to_value(&outcome).expect("serialize");
    assert_eq!(json["status"], "not_found");
}

#[test]
fn rescan_updates_the_ripple() {
    let (dir, engine) = scanned_project(&[
        ("a.py", "import c\n"),
        ("b.py", ""),
        ("c.py", ""),
    ]);
    assert_eq!(found(&engine, "c.py", &ImpactOptions::default()).impacted.len(), 1);

    fs::write(dir.path().join("b.py"), "import c\n").expect("rewrite b.py");
    let outcome = engine
        .rescan_file(&engine.root().join("b.py"))
        .expect("rescan should succeed");

    assert!(matches!(outcome, RescanOutcome::Updated { edges: 1, .. }));
    assert_eq!(found(&engine, "c.py", &ImpactOptions::default()).impacted.len(), 2);
}

#[test]
fn deleting_a_dependency_keeps_importers_in_its_ripple() {
    let (dir, engine) = scanned_project(&[
        ("a.py", "import b\n"),
        ("b.py", ""),
        ("c.py", "import a\n"),
    ]);
    fs::remove_file(dir.path().join("b.py")).expect("should delete file");

    let outcome = engine
        .rescan_file(std::path::Path::new("b.py"))
        .expect("rescan should succeed");

    assert!(matches!(outcome, RescanOutcome::Removed { dependents: 1, .. }));
    let snapshot = engine.snapshot();
    assert!(!snapshot.contains(&engine.root().join("b.py").to_string_lossy()));
    let result = found(&engine, "external:b", &ImpactOptions::default());
    assert_eq!(
        ripple(&engine, &result),
        vec![("a.py".to_string(), 1), ("c.py".to_string(), 2)]
    );
}

#[test]
fn package_member_import_depends_on_init() {
    let (_dir, engine) = scanned_project(&[
        ("pkg/__init__.py", "def helper():\n    pass\n"),
        ("pkg/user.py", "from . import helper\n"),
    ]);

    let result = found(&engine, "pkg/__init__.py", &ImpactOptions::default());

    assert_eq!(
        ripple(&engine, &result),
        vec![(format!("pkg{}user.py", std::path::MAIN_SEPARATOR), 1)]
    );
}

#[test]
fn missing_relative_modules_stay_separate() {
    let (_dir, engine) = scanned_project(&[
        ("left/main.py", "from . import gone\n"),
        ("right/main.py", "from .gone import thing\n"),
    ]);

    for (external, importer) in [("external:left/gone", "left"), ("external:right/gone", "right")] {
        let result = found(&engine, external, &ImpactOptions::default());
        assert_eq!(
            ripple(&engine, &result),
            vec![(format!("{importer}{}main.py", std::path::MAIN_SEPARATOR), 1)]
        );
    }
}
