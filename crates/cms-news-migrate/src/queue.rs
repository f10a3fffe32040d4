//! Processing queue construction.
//!
//! Turns the operator's selection into a dependency-respecting order.
//! Dependencies the operator did not select are omitted rather than pulled
//! in; their dependents then see absent foreign keys.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use tracing::{debug, warn};

use crate::category::DataCategory;
use crate::error::{MigrateError, Result};
use crate::profile::SourceProfile;

/// Build the processing queue for a selection.
///
/// Selected categories the profile cannot export are dropped with a warning.
/// Implied categories (comment responses for comments) are added.
pub fn build_queue(selected: &[DataCategory], profile: SourceProfile) -> Result<Vec<DataCategory>> {
    let mut chosen: BTreeSet<DataCategory> = BTreeSet::new();

    for &category in selected {
        if !profile.supports(category) {
            warn!(
                "{} does not export {}; skipping",
                profile.product_name(),
                category
            );
            continue;
        }
        chosen.insert(category);
        for &implied in category.implied() {
            if profile.supports(implied) {
                chosen.insert(implied);
            }
        }
    }

    let nodes: Vec<DataCategory> = DataCategory::ALL
        .into_iter()
        .filter(|c| chosen.contains(c))
        .collect();

    let queue = topological_order(&nodes, |c| c.dependencies().to_vec())?;
    debug!(
        "Processing queue: {}",
        queue
            .iter()
            .map(|c| c.alias())
            .collect::<Vec<_>>()
            .join(" -> ")
    );
    Ok(queue)
}

/// Order `nodes` so every node follows its dependencies among `nodes`.
///
/// Dependencies outside `nodes` are ignored. Ties resolve by position in
/// `nodes`, so the output is deterministic. Fails on a cycle.
pub fn topological_order<T, F>(nodes: &[T], deps: F) -> Result<Vec<T>>
where
    T: Copy + Eq + Hash + std::fmt::Debug,
    F: Fn(T) -> Vec<T>,
{
    let position: HashMap<T, usize> = nodes.iter().enumerate().map(|(i, n)| (*n, i)).collect();

    let mut in_degree = vec![0usize; nodes.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, node) in nodes.iter().enumerate() {
        for dep in deps(*node) {
            if let Some(&j) = position.get(&dep) {
                in_degree[i] += 1;
                dependents[j].push(i);
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(i) = ready.pop_first() {
        order.push(nodes[i]);
        for &k in &dependents[i] {
            in_degree[k] -= 1;
            if in_degree[k] == 0 {
                ready.insert(k);
            }
        }
    }

    if order.len() != nodes.len() {
        let stuck: Vec<String> = (0..nodes.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| format!("{:?}", nodes[i]))
            .collect();
        return Err(MigrateError::Config(format!(
            "dependency cycle between {}",
            stuck.join(", ")
        )));
    }

    Ok(order)
}
