//! Pour: transactional instantiation of a cooked formula.
//!
//! A pour creates the epic root, one child per step, parent edges, and
//! `blocks` edges translating step dependencies. Any failure after the
//! first create deletes everything already created, in reverse order, so
//! observable state is an empty-handed rollback.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tracing::{debug, warn};

use braid_core::cancel::CancelToken;
use braid_core::enums::{DependencyType, IssueType, MolType};
use braid_core::issue::IssueBuilder;
use braid_formula::cook;

use crate::error::Result;
use crate::service::IssueService;

/// Options for one pour.
#[derive(Debug, Clone, Default)]
pub struct PourOptions {
    /// Formula name to resolve and cook.
    pub formula: String,
    /// Variable values for cooking.
    pub vars: HashMap<String, String>,
    /// Formula search path; empty uses the service default.
    pub search_path: Vec<PathBuf>,
    /// Mark every created issue ephemeral (GC-eligible).
    pub ephemeral: bool,
    /// Molecule type stamped on the root.
    pub mol_type: MolType,
}

/// Result of a successful pour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PourOutcome {
    /// Id of the epic root.
    pub root_id: String,
    /// Total issues created, root included.
    pub created_count: usize,
    /// Non-fatal per-step diagnostics (skipped self-referential or
    /// duplicate dependency edges). Fatal failures roll the pour back and
    /// surface as an error instead; on a clean pour this is empty.
    pub errors: Vec<String>,
}

/// Cooks `opts.formula` and pours it into the store as a molecule.
pub fn pour(service: &IssueService, opts: &PourOptions, token: &CancelToken) -> Result<PourOutcome> {
    let search_path = if opts.search_path.is_empty() {
        service.formula_search_path()
    } else {
        opts.search_path.clone()
    };
    let cooked = cook(&opts.formula, &opts.vars, &search_path)?;

    let mut created: Vec<String> = Vec::with_capacity(cooked.steps.len() + 1);
    match pour_cooked(service, opts, &cooked, &mut created, token) {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            // Reverse creation order: children before the root.
            for id in created.iter().rev() {
                if let Err(cleanup) = service.delete(id, token) {
                    warn!(id = %id, error = %cleanup, "pour rollback: delete failed");
                }
            }
            Err(e)
        }
    }
}

fn pour_cooked(
    service: &IssueService,
    opts: &PourOptions,
    cooked: &braid_formula::CookedMolecule,
    created: &mut Vec<String>,
    token: &CancelToken,
) -> Result<PourOutcome> {
    let root_id = service.create(
        IssueBuilder::new(cooked.root.title.clone())
            .description(cooked.root.description.clone())
            .issue_type(IssueType::from(cooked.root.issue_type.as_str()))
            .mol_type(opts.mol_type.clone())
            .ephemeral(opts.ephemeral)
            .build(),
        token,
    )?;
    created.push(root_id.clone());
    debug!(root = %root_id, formula = %opts.formula, "poured molecule root");

    // Step-id -> created issue id, for dependency translation.
    let mut step_ids: HashMap<&str, String> = HashMap::new();
    for step in &cooked.steps {
        let id = service.create(
            IssueBuilder::new(step.title.clone())
                .description(step.description.clone())
                .issue_type(IssueType::from(step.issue_type.as_str()))
                .ephemeral(opts.ephemeral)
                .build(),
            token,
        )?;
        created.push(id.clone());
        step_ids.insert(step.step_id.as_str(), id);
    }

    let mut errors = Vec::new();
    for step in &cooked.steps {
        let child_id = &step_ids[step.step_id.as_str()];
        service.set_parent(child_id, &root_id, token)?;

        let mut wired: HashSet<&str> = HashSet::new();
        for target in &step.depends_on {
            if *target == step.step_id {
                errors.push(format!(
                    "step {} depends on itself; edge skipped",
                    step.step_id
                ));
                continue;
            }
            if !wired.insert(target.as_str()) {
                errors.push(format!(
                    "step {} lists {target} twice; duplicate edge skipped",
                    step.step_id
                ));
                continue;
            }
            let target_id = &step_ids[target.as_str()];
            service.add_dependency(child_id, target_id, DependencyType::Blocks, token)?;
        }
    }

    Ok(PourOutcome {
        root_id,
        created_count: created.len(),
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_core::filter::IssueFilter;
    use braid_storage::{FsStore, StoreOptions};
    use pretty_assertions::assert_eq;

    fn service_with_formulas(formulas: &[(&str, &str)]) -> (tempfile::TempDir, IssueService) {
        let dir = tempfile::tempdir().unwrap();
        let beads_dir = dir.path().join(".beads");
        let formulas_dir = beads_dir.join("formulas");
        std::fs::create_dir_all(&formulas_dir).unwrap();
        for (name, body) in formulas {
            std::fs::write(formulas_dir.join(format!("{name}.formula.json")), body).unwrap();
        }

        let local = FsStore::new(beads_dir.join("issues"), StoreOptions::default());
        local.init().unwrap();
        let service = IssueService::new(local, beads_dir, Vec::new(), "pourer");
        (dir, service)
    }

    const PIPELINE: &str = r#"{
        "formula": "pipeline",
        "description": "Linear build pipeline",
        "steps": [
            {"id": "build", "title": "Build"},
            {"id": "test", "title": "Test", "depends_on": ["build"]},
            {"id": "ship", "title": "Ship", "depends_on": ["test"]}
        ]
    }"#;

    #[test]
    fn pour_creates_root_and_linear_chain() {
        let (_dir, service) = service_with_formulas(&[("pipeline", PIPELINE)]);
        let token = CancelToken::new();

        let outcome = pour(
            &service,
            &PourOptions {
                formula: "pipeline".into(),
                ..Default::default()
            },
            &token,
        )
        .unwrap();

        assert_eq!(outcome.created_count, 4);
        assert!(outcome.errors.is_empty());

        let root = service.get(&outcome.root_id, &token).unwrap();
        assert_eq!(root.issue_type, IssueType::Epic);
        assert_eq!(root.title, "pipeline");

        let children = service.local().children_of(&outcome.root_id, &token).unwrap();
        assert_eq!(children.len(), 3);

        // blocks edges form the linear chain.
        let by_title = |t: &str| children.iter().find(|i| i.title == t).unwrap();
        let build = by_title("Build");
        let test = by_title("Test");
        let ship = by_title("Ship");
        assert!(build.dependencies.is_empty());
        assert_eq!(test.blocking_targets().collect::<Vec<_>>(), vec![build.id.as_str()]);
        assert_eq!(ship.blocking_targets().collect::<Vec<_>>(), vec![test.id.as_str()]);
    }

    #[test]
    fn pour_with_vars_substitutes_titles() {
        let formula = r#"{
            "formula": "feature",
            "vars": {"name": {"required": true}},
            "steps": [{"id": "design", "title": "Design {{name}}"}]
        }"#;
        let (_dir, service) = service_with_formulas(&[("feature", formula)]);
        let token = CancelToken::new();

        let outcome = pour(
            &service,
            &PourOptions {
                formula: "feature".into(),
                vars: HashMap::from([("name".to_string(), "auth".to_string())]),
                ..Default::default()
            },
            &token,
        )
        .unwrap();

        let children = service.local().children_of(&outcome.root_id, &token).unwrap();
        assert_eq!(children[0].title, "Design auth");
    }

    #[test]
    fn pour_failure_rolls_back_all_created_issues() {
        // Second step has an empty title: its create fails validation
        // after the root and first child were already created.
        let broken = r#"{
            "formula": "broken",
            "steps": [
                {"id": "ok", "title": "Fine"},
                {"id": "bad", "title": ""}
            ]
        }"#;
        let (_dir, service) = service_with_formulas(&[("broken", broken)]);
        let token = CancelToken::new();

        let result = pour(
            &service,
            &PourOptions {
                formula: "broken".into(),
                ..Default::default()
            },
            &token,
        );
        assert!(result.is_err());

        let listed = service.list(&IssueFilter::default(), &token).unwrap();
        assert!(listed.is_empty(), "rollback must leave an empty store");
    }

    #[test]
    fn pour_marks_ephemeral_when_requested() {
        let (_dir, service) = service_with_formulas(&[("pipeline", PIPELINE)]);
        let token = CancelToken::new();

        let outcome = pour(
            &service,
            &PourOptions {
                formula: "pipeline".into(),
                ephemeral: true,
                mol_type: MolType::Work,
                ..Default::default()
            },
            &token,
        )
        .unwrap();

        let root = service.get(&outcome.root_id, &token).unwrap();
        assert!(root.ephemeral);
        assert_eq!(root.mol_type, MolType::Work);
        for child in service.local().children_of(&outcome.root_id, &token).unwrap() {
            assert!(child.ephemeral);
        }
    }

    #[test]
    fn degenerate_edges_are_skipped_with_diagnostics() {
        // One self-referential dependency and one listed twice: neither
        // is worth failing the whole pour over.
        let odd = r#"{
            "formula": "odd",
            "steps": [
                {"id": "build", "title": "Build"},
                {"id": "test", "title": "Test", "depends_on": ["test", "build", "build"]}
            ]
        }"#;
        let (_dir, service) = service_with_formulas(&[("odd", odd)]);
        let token = CancelToken::new();

        let outcome = pour(
            &service,
            &PourOptions {
                formula: "odd".into(),
                ..Default::default()
            },
            &token,
        )
        .unwrap();

        assert_eq!(outcome.created_count, 3);
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.errors[0].contains("depends on itself"));
        assert!(outcome.errors[1].contains("twice"));

        // The one real edge survives.
        let children = service.local().children_of(&outcome.root_id, &token).unwrap();
        let test_step = children.iter().find(|i| i.title == "Test").unwrap();
        let build_step = children.iter().find(|i| i.title == "Build").unwrap();
        assert_eq!(
            test_step.blocking_targets().collect::<Vec<_>>(),
            vec![build_step.id.as_str()]
        );
    }

    #[test]
    fn pour_missing_required_var_fails_before_creating() {
        let formula = r#"{
            "formula": "feature",
            "vars": {"name": {"required": true}},
            "steps": [{"id": "design", "title": "Design {{name}}"}]
        }"#;
        let (_dir, service) = service_with_formulas(&[("feature", formula)]);
        let token = CancelToken::new();

        let result = pour(
            &service,
            &PourOptions {
                formula: "feature".into(),
                ..Default::default()
            },
            &token,
        );
        assert!(result.is_err());
        assert!(service.list(&IssueFilter::default(), &token).unwrap().is_empty());
    }
}
