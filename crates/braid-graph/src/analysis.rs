//! Readiness, cycle detection, and topological analysis.
//!
//! All functions here are read-only and lock-free: they operate on issue
//! snapshots the caller obtained from the store and may race with writers.

use std::collections::{BTreeSet, HashMap, HashSet};

use braid_core::cancel::CancelToken;
use braid_core::enums::DependencyType;
use braid_core::issue::Issue;
use braid_storage::FsStore;

use crate::error::{GraphError, Result};

/// Single pass over `closed/`, returning the set of closed ids.
pub fn closed_set(store: &FsStore, token: &CancelToken) -> Result<HashSet<String>> {
    Ok(store.closed_ids(token)?)
}

/// An issue is ready iff every `blocks`-type dependency target is closed.
/// Non-`blocks` edges never gate readiness.
pub fn ready(issue: &Issue, closed: &HashSet<String>) -> bool {
    issue.blocking_targets().all(|t| closed.contains(t))
}

/// Classic DFS colour-marking cycle detection over edges of `kind` within
/// the given set. Edges leaving the set are ignored.
pub fn is_cycle(children: &[Issue], kind: &DependencyType) -> bool {
    let index: HashMap<&str, usize> = children
        .iter()
        .enumerate()
        .map(|(i, issue)| (issue.id.as_str(), i))
        .collect();

    #[derive(Clone, Copy, PartialEq)]
    enum Colour {
        White,
        Grey,
        Black,
    }
    let mut colours = vec![Colour::White; children.len()];

    fn visit(
        node: usize,
        children: &[Issue],
        index: &HashMap<&str, usize>,
        kind: &DependencyType,
        colours: &mut [Colour],
    ) -> bool {
        colours[node] = Colour::Grey;
        for dep in &children[node].dependencies {
            if dep.dep_type != *kind {
                continue;
            }
            let Some(&next) = index.get(dep.target_id.as_str()) else {
                continue;
            };
            match colours[next] {
                Colour::Grey => return true,
                Colour::White => {
                    if visit(next, children, index, kind, colours) {
                        return true;
                    }
                }
                Colour::Black => {}
            }
        }
        colours[node] = Colour::Black;
        false
    }

    for start in 0..children.len() {
        if colours[start] == Colour::White
            && visit(start, children, &index, kind, &mut colours)
        {
            return true;
        }
    }
    false
}

/// In-set `blocks` in-degrees and dependents adjacency for Kahn's algorithm.
fn blocks_graph(children: &[Issue]) -> (Vec<usize>, Vec<Vec<usize>>, HashMap<&str, usize>) {
    let index: HashMap<&str, usize> = children
        .iter()
        .enumerate()
        .map(|(i, issue)| (issue.id.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; children.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); children.len()];

    for (i, issue) in children.iter().enumerate() {
        for target in issue.blocking_targets() {
            if let Some(&t) = index.get(target) {
                // `i` depends on `t`: `t` must come first.
                in_degree[i] += 1;
                dependents[t].push(i);
            }
        }
    }
    (in_degree, dependents, index)
}

/// Kahn's algorithm over the subgraph induced by `blocks` edges within the
/// set. Ties are broken by `(priority ascending, id ascending)` so the
/// order is deterministic. A cycle yields [`GraphError::Cycle`].
pub fn topological_order(children: &[Issue]) -> Result<Vec<Issue>> {
    let (mut in_degree, dependents, _) = blocks_graph(children);

    // Frontier keyed for deterministic pops.
    let mut frontier: BTreeSet<(i32, String, usize)> = BTreeSet::new();
    for (i, &deg) in in_degree.iter().enumerate() {
        if deg == 0 {
            frontier.insert((children[i].priority, children[i].id.clone(), i));
        }
    }

    let mut ordered = Vec::with_capacity(children.len());
    while let Some(entry) = frontier.iter().next().cloned() {
        frontier.remove(&entry);
        let (_, _, i) = entry;
        ordered.push(children[i].clone());
        for &next in &dependents[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                frontier.insert((children[next].priority, children[next].id.clone(), next));
            }
        }
    }

    if ordered.len() != children.len() {
        return Err(GraphError::Cycle);
    }
    Ok(ordered)
}

/// Peels the set into waves: each wave is the set of nodes whose unmet
/// in-set `blocks` in-edges are zero, sorted `(priority, id)`. A residue
/// that can never be peeled is a cycle.
pub fn topological_waves(children: &[Issue]) -> Result<Vec<Vec<Issue>>> {
    let (mut in_degree, dependents, _) = blocks_graph(children);
    let mut remaining: HashSet<usize> = (0..children.len()).collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
        let mut wave: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|&i| in_degree[i] == 0)
            .collect();
        if wave.is_empty() {
            return Err(GraphError::Cycle);
        }
        wave.sort_by(|&a, &b| {
            children[a]
                .priority
                .cmp(&children[b].priority)
                .then(children[a].id.cmp(&children[b].id))
        });

        for &i in &wave {
            remaining.remove(&i);
            for &next in &dependents[i] {
                in_degree[next] = in_degree[next].saturating_sub(1);
            }
        }
        waves.push(wave.into_iter().map(|i| children[i].clone()).collect());
    }

    Ok(waves)
}
