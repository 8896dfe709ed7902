//! Inheritance resolution for `extends` chains.
//!
//! Resolution is an explicit recursive merge: each parent is resolved in
//! turn (depth-first), the parents are folded together left to right, and
//! the child is merged over the result. Child fields win at the leaf;
//! steps concatenate, except a child step reusing an id replaces the
//! parent's step in place.

use std::path::PathBuf;

use crate::parser::{find_formula, load_formula};
use crate::types::{Formula, FormulaError, Result};

/// Resolve `name` along the search path, transitively merging its
/// `extends` ancestors. Cyclic chains fail with
/// [`FormulaError::FormulaCycle`].
pub fn resolve(name: &str, search_path: &[PathBuf]) -> Result<Formula> {
    let mut visiting = Vec::new();
    resolve_inner(name, search_path, &mut visiting)
}

fn resolve_inner(
    name: &str,
    search_path: &[PathBuf],
    visiting: &mut Vec<String>,
) -> Result<Formula> {
    if visiting.iter().any(|n| n == name) {
        return Err(FormulaError::FormulaCycle(name.to_string()));
    }
    visiting.push(name.to_string());

    let path = find_formula(name, search_path)?;
    let child = load_formula(&path)?;

    let mut base: Option<Formula> = None;
    for parent_name in &child.extends {
        let parent = resolve_inner(parent_name, search_path, visiting)?;
        base = Some(match base {
            Some(acc) => merge(acc, parent),
            None => parent,
        });
    }

    visiting.pop();

    Ok(match base {
        Some(acc) => merge(acc, child),
        None => child,
    })
}

/// Merge `child` over `parent`: child leaf fields override, vars union
/// child-over-parent, steps concatenate with by-id replacement.
fn merge(parent: Formula, mut child: Formula) -> Formula {
    if child.description.is_empty() {
        child.description = parent.description;
    }
    if child.kind.is_none() {
        child.kind = parent.kind;
    }
    if child.version == 0 {
        child.version = parent.version;
    }
    if child.phase.is_none() {
        child.phase = parent.phase;
    }
    if child.compose.is_none() {
        child.compose = parent.compose;
    }
    if child.advice.is_none() {
        child.advice = parent.advice;
    }

    // Vars: parent entries that the child does not redeclare.
    for (name, def) in parent.vars {
        child.vars.entry(name).or_insert(def);
    }

    // Steps: parent order first, child steps replacing same-id parents in
    // place and otherwise appending.
    let mut steps = parent.steps;
    for step in std::mem::take(&mut child.steps) {
        match steps.iter_mut().find(|s| s.id == step.id) {
            Some(existing) => *existing = step,
            None => steps.push(step),
        }
    }
    child.steps = steps;

    // The resolved formula keeps the child's identity and origin.
    child.extends = Vec::new();
    child
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_formula(dir: &std::path::Path, name: &str, body: &str) {
        std::fs::write(dir.join(format!("{name}.formula.json")), body).unwrap();
    }

    fn formulas_dir() -> (tempfile::TempDir, Vec<PathBuf>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        (dir, vec![path])
    }

    #[test]
    fn resolve_without_extends_is_identity() {
        let (_dir, path) = formulas_dir();
        write_formula(
            &path[0],
            "simple",
            r#"{"formula": "simple", "steps": [{"id": "a", "title": "A"}]}"#,
        );

        let f = resolve("simple", &path).unwrap();
        assert_eq!(f.formula, "simple");
        assert_eq!(f.steps.len(), 1);
    }

    #[test]
    fn child_inherits_and_appends_steps() {
        let (_dir, path) = formulas_dir();
        write_formula(
            &path[0],
            "base",
            r#"{
                "formula": "base",
                "description": "base description",
                "type": "workflow",
                "vars": {"name": {"required": true}},
                "steps": [
                    {"id": "build", "title": "Build {{name}}"},
                    {"id": "test", "title": "Test {{name}}", "depends_on": ["build"]}
                ]
            }"#,
        );
        write_formula(
            &path[0],
            "release",
            r#"{
                "formula": "release",
                "extends": ["base"],
                "steps": [
                    {"id": "ship", "title": "Ship {{name}}", "depends_on": ["test"]}
                ]
            }"#,
        );

        let f = resolve("release", &path).unwrap();
        assert_eq!(f.formula, "release");
        assert_eq!(f.description, "base description");
        assert_eq!(f.effective_kind(), "workflow");
        assert!(f.vars.contains_key("name"));

        let ids: Vec<&str> = f.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["build", "test", "ship"]);
        assert!(f.extends.is_empty());
    }

    #[test]
    fn child_step_replaces_parent_step_in_place() {
        let (_dir, path) = formulas_dir();
        write_formula(
            &path[0],
            "base",
            r#"{
                "formula": "base",
                "steps": [
                    {"id": "build", "title": "Build"},
                    {"id": "test", "title": "Test", "depends_on": ["build"]}
                ]
            }"#,
        );
        write_formula(
            &path[0],
            "fast",
            r#"{
                "formula": "fast",
                "extends": ["base"],
                "steps": [{"id": "test", "title": "Smoke test only", "depends_on": ["build"]}]
            }"#,
        );

        let f = resolve("fast", &path).unwrap();
        let ids: Vec<&str> = f.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["build", "test"]);
        assert_eq!(f.steps[1].title, "Smoke test only");
    }

    #[test]
    fn child_var_overrides_parent_var() {
        let (_dir, path) = formulas_dir();
        write_formula(
            &path[0],
            "base",
            r#"{"formula": "base", "vars": {"env": {"default": "staging"}}}"#,
        );
        write_formula(
            &path[0],
            "prod",
            r#"{"formula": "prod", "extends": ["base"], "vars": {"env": {"default": "prod"}}}"#,
        );

        let f = resolve("prod", &path).unwrap();
        assert_eq!(f.vars["env"].default.as_deref(), Some("prod"));
    }

    #[test]
    fn diamond_extends_resolves() {
        let (_dir, path) = formulas_dir();
        write_formula(
            &path[0],
            "root",
            r#"{"formula": "root", "steps": [{"id": "a", "title": "A"}]}"#,
        );
        write_formula(
            &path[0],
            "left",
            r#"{"formula": "left", "extends": ["root"], "steps": [{"id": "l", "title": "L"}]}"#,
        );
        write_formula(
            &path[0],
            "right",
            r#"{"formula": "right", "extends": ["root"], "steps": [{"id": "r", "title": "R"}]}"#,
        );
        write_formula(
            &path[0],
            "merged",
            r#"{"formula": "merged", "extends": ["left", "right"]}"#,
        );

        let f = resolve("merged", &path).unwrap();
        let ids: Vec<&str> = f.steps.iter().map(|s| s.id.as_str()).collect();
        // "a" arrives via left; right's copy replaces it in place.
        assert_eq!(ids, vec!["a", "l", "r"]);
    }

    #[test]
    fn extends_cycle_fails() {
        let (_dir, path) = formulas_dir();
        write_formula(&path[0], "a", r#"{"formula": "a", "extends": ["b"]}"#);
        write_formula(&path[0], "b", r#"{"formula": "b", "extends": ["a"]}"#);

        assert!(matches!(
            resolve("a", &path),
            Err(FormulaError::FormulaCycle(_))
        ));
    }

    #[test]
    fn missing_parent_fails() {
        let (_dir, path) = formulas_dir();
        write_formula(&path[0], "a", r#"{"formula": "a", "extends": ["ghost"]}"#);

        assert!(matches!(
            resolve("a", &path),
            Err(FormulaError::NotFound(_))
        ));
    }
}
