//! End-to-end scenarios across the service, store, graph, formula, and
//! doctor layers.

use std::collections::HashMap;
use std::sync::Arc;

use braid_core::cancel::CancelToken;
use braid_core::enums::{DependencyType, Status};
use braid_core::filter::IssueFilter;
use braid_core::idgen;
use braid_core::issue::IssueBuilder;
use braid_engine::pour::{PourOptions, pour};
use braid_engine::service::IssueService;
use braid_engine::{doctor, gc_ephemeral};
use braid_graph::{
    classify_steps, closed_set, find_next_step, ready, topological_order, topological_waves,
};
use braid_storage::layout::{CLOSED_DIR, OPEN_DIR};

fn token() -> CancelToken {
    CancelToken::new()
}

/// A service over a fresh `.beads/` tree, with the given formulas
/// installed under `formulas/`.
fn fixture(formulas: &[(&str, &str)]) -> (tempfile::TempDir, IssueService) {
    let dir = tempfile::tempdir().unwrap();
    let beads_dir = dir.path().join(".beads");
    let formulas_dir = beads_dir.join("formulas");
    std::fs::create_dir_all(&formulas_dir).unwrap();
    for (name, body) in formulas {
        std::fs::write(formulas_dir.join(format!("{name}.formula.json")), body).unwrap();
    }
    std::fs::write(beads_dir.join("config.yaml"), "issue-prefix: bd\n").unwrap();

    let service = IssueService::open(&beads_dir).unwrap();
    (dir, service)
}

#[test]
fn create_close_reopen_moves_the_file() {
    let (_dir, service) = fixture(&[]);

    let id = service
        .create(IssueBuilder::new("T").priority(2).build(), &token())
        .unwrap();

    let issue = service.get(&id, &token()).unwrap();
    assert_eq!(issue.status, Status::Open);
    assert!(service.local().path_in(OPEN_DIR, &id).exists());

    service
        .modify(&id, &token(), |issue| {
            issue.status = Status::Closed;
            issue.closed_at = Some(chrono::Utc::now());
            Ok(())
        })
        .unwrap();
    assert!(service.local().path_in(CLOSED_DIR, &id).exists());
    assert!(!service.local().path_in(OPEN_DIR, &id).exists());
    assert!(service.get(&id, &token()).unwrap().closed_at.is_some());

    service.reopen(&id, &token()).unwrap();
    assert!(service.local().path_in(OPEN_DIR, &id).exists());
    assert_eq!(service.get(&id, &token()).unwrap().closed_at, None);
}

#[test]
fn readiness_tracks_blocks_edges_only() {
    let (_dir, service) = fixture(&[]);

    let a = service
        .create(IssueBuilder::new("A").id("bd-a").build(), &token())
        .unwrap();
    let b = service
        .create(IssueBuilder::new("B").id("bd-b").build(), &token())
        .unwrap();
    service
        .add_dependency(&b, &a, DependencyType::Blocks, &token())
        .unwrap();

    let closed = closed_set(service.local(), &token()).unwrap();
    assert!(!ready(&service.get(&b, &token()).unwrap(), &closed));

    service.close(&a, "done", &token()).unwrap();
    let closed = closed_set(service.local(), &token()).unwrap();
    assert!(ready(&service.get(&b, &token()).unwrap(), &closed));

    // relates-to never gates readiness.
    let c = service
        .create(IssueBuilder::new("C").id("bd-c").build(), &token())
        .unwrap();
    service
        .add_dependency(&c, &b, DependencyType::RelatesTo, &token())
        .unwrap();
    let closed = closed_set(service.local(), &token()).unwrap();
    assert!(ready(&service.get(&c, &token()).unwrap(), &closed));
}

const WORKFLOW: &str = r#"{
    "formula": "workflow",
    "description": "build-test-ship",
    "steps": [
        {"id": "build", "title": "build"},
        {"id": "test", "title": "test", "depends_on": ["build"]},
        {"id": "ship", "title": "ship", "depends_on": ["test"]}
    ]
}"#;

#[test]
fn poured_molecule_walks_in_waves() {
    let (_dir, service) = fixture(&[("workflow", WORKFLOW)]);

    let outcome = pour(
        &service,
        &PourOptions {
            formula: "workflow".into(),
            ..Default::default()
        },
        &token(),
    )
    .unwrap();
    assert_eq!(outcome.created_count, 4);
    assert!(outcome.errors.is_empty());

    let children = service
        .local()
        .children_of(&outcome.root_id, &token())
        .unwrap();
    assert_eq!(children.len(), 3);

    // Three singleton waves: the dependencies form a linear chain.
    let waves = topological_waves(&children).unwrap();
    let titles: Vec<Vec<&str>> = waves
        .iter()
        .map(|w| w.iter().map(|i| i.title.as_str()).collect())
        .collect();
    assert_eq!(titles, vec![vec!["build"], vec!["test"], vec!["ship"]]);

    // Work through the chain: next step is always the newly-unblocked one.
    let ordered = topological_order(&children).unwrap();
    let mut closed = closed_set(service.local(), &token()).unwrap();

    let first = find_next_step(&ordered, None, &closed).unwrap();
    assert_eq!(first.title, "build");
    service.close(&first.id, "done", &token()).unwrap();

    closed = closed_set(service.local(), &token()).unwrap();
    let children = service
        .local()
        .children_of(&outcome.root_id, &token())
        .unwrap();
    let buckets = classify_steps(&children, &closed);
    assert_eq!(buckets.done.len(), 1);
    assert_eq!(buckets.ready.len(), 1);
    assert_eq!(buckets.blocked.len(), 1);
    assert_eq!(buckets.ready[0].title, "test");
}

#[test]
fn hash_ids_are_deterministic_across_runs() {
    let t = chrono::DateTime::from_timestamp_nanos(1_700_000_000_000_000_000);
    let first = idgen::hash_id("bd-", "hello", "", "alice", t, 0, 4);
    let second = idgen::hash_id("bd-", "hello", "", "alice", t, 0, 4);

    assert_eq!(first, second);
    assert_eq!(first.len(), "bd-".len() + 4);
    assert!(first[3..]
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));

    // Any input change produces a different id.
    assert_ne!(first, idgen::hash_id("bd-", "hello", "", "alice", t, 1, 4));
    assert_ne!(first, idgen::hash_id("bd-", "hello!", "", "alice", t, 0, 4));
}

#[test]
fn doctor_repairs_misplaced_file_then_reports_clean() {
    let (_dir, service) = fixture(&[]);
    let store = service.local();

    let planted = IssueBuilder::new("misplaced")
        .id("bd-wrong")
        .status(Status::Open)
        .build();
    let path = store.path_in(CLOSED_DIR, "bd-wrong");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, serde_json::to_vec_pretty(&planted).unwrap()).unwrap();

    let findings = doctor(store, true, &token()).unwrap();
    assert_eq!(findings.len(), 1);
    assert!(findings[0].fixed);
    assert!(store.path_in(OPEN_DIR, "bd-wrong").exists());

    assert!(doctor(store, false, &token()).unwrap().is_empty());
}

#[test]
fn concurrent_modify_serialises_and_never_tears() {
    let (_dir, service) = fixture(&[]);
    let id = service
        .create(IssueBuilder::new("shared").build(), &token())
        .unwrap();

    let service = Arc::new(service);
    let handles: Vec<_> = (0..6)
        .map(|n| {
            let service = Arc::clone(&service);
            let id = id.clone();
            std::thread::spawn(move || {
                service
                    .modify(&id, &CancelToken::new(), |issue| {
                        issue.add_label(format!("writer-{n}"));
                        Ok(())
                    })
                    .unwrap();
                // Concurrent readers always observe a decodable document.
                let issue = service.get(&id, &CancelToken::new()).unwrap();
                assert_eq!(issue.id, id);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let issue = service.get(&id, &token()).unwrap();
    assert_eq!(issue.labels.len(), 6);
}

#[test]
fn ephemeral_pour_is_collectable() {
    let (_dir, service) = fixture(&[("workflow", WORKFLOW)]);

    let outcome = pour(
        &service,
        &PourOptions {
            formula: "workflow".into(),
            ephemeral: true,
            ..Default::default()
        },
        &token(),
    )
    .unwrap();

    // Too fresh: nothing removed.
    let report = gc_ephemeral(service.local(), chrono::Duration::days(1), &token()).unwrap();
    assert!(report.removed.is_empty());

    // Age the root by rewriting its created_at, then collect.
    for issue in service.list(&IssueFilter::default(), &token()).unwrap() {
        service
            .modify(&issue.id, &token(), |i| {
                i.created_at = chrono::Utc::now() - chrono::Duration::days(7);
                Ok(())
            })
            .unwrap();
    }
    let report = gc_ephemeral(service.local(), chrono::Duration::days(1), &token()).unwrap();
    assert_eq!(report.removed.len(), 4);
    assert!(!service.local().exists(&outcome.root_id));
    assert!(service.list(&IssueFilter::default(), &token()).unwrap().is_empty());
}

#[test]
fn child_ids_allocate_under_the_parent() {
    let (_dir, service) = fixture(&[]);
    let parent = service
        .create(IssueBuilder::new("parent").id("bd-par").build(), &token())
        .unwrap();

    let first = service.next_child_id(&parent, &token()).unwrap();
    assert_eq!(first, "bd-par.1");
    service
        .create(IssueBuilder::new("c1").id(first.clone()).build(), &token())
        .unwrap();
    service.set_parent(&first, &parent, &token()).unwrap();

    let second = service.next_child_id(&parent, &token()).unwrap();
    assert_eq!(second, "bd-par.2");
}
