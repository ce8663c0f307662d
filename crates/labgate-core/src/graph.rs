//! Stage graph checks: unknown prerequisites, cycles, and a stable
//! topological order.
use crate::error::{GateError, Result};
use crate::stage::Stage;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Index stages by ID, rejecting duplicates.
pub fn index_stages(stages: &[Stage]) -> Result<HashMap<&str, usize>> {
    let mut index = HashMap::with_capacity(stages.len());
    for (i, stage) in stages.iter().enumerate() {
        if index.insert(stage.id.as_str(), i).is_some() {
            return Err(GateError::Config(format!("duplicate stage id '{}'", stage.id)));
        }
    }
    Ok(index)
}

/// Finds one dependency cycle, returned as the stage IDs along it.
pub fn detect_cycle(stages: &[Stage]) -> Option<Vec<String>> {
    let needs: HashMap<&str, &[String]> = stages
        .iter()
        .map(|s| (s.id.as_str(), s.needs.as_slice()))
        .collect();
    let mut visited = HashSet::new();
    let mut on_path = HashSet::new();
    let mut path = Vec::new();

    for stage in stages {
        if !visited.contains(stage.id.as_str()) {
            if let Some(cycle) = cycle_dfs(&stage.id, &needs, &mut visited, &mut on_path, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

fn cycle_dfs<'a>(
    node: &'a str,
    needs: &HashMap<&'a str, &'a [String]>,
    visited: &mut HashSet<&'a str>,
    on_path: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    on_path.insert(node);
    path.push(node);

    for dep in needs.get(node).copied().unwrap_or_default() {
        let dep = dep.as_str();
        if on_path.contains(dep) {
            let start = path.iter().position(|id| *id == dep).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
            cycle.push(dep.to_string());
            return Some(cycle);
        }
        if !visited.contains(dep) && needs.contains_key(dep) {
            if let Some(cycle) = cycle_dfs(dep, needs, visited, on_path, path) {
                return Some(cycle);
            }
        }
    }

    on_path.remove(node);
    path.pop();
    None
}

/// Validates the graph and returns stage indices in execution order.
///
/// Prerequisites always come before dependents; among stages that are ready
/// at the same time, the one registered first goes first.
pub fn topological_order(stages: &[Stage]) -> Result<Vec<usize>> {
    let index = index_stages(stages)?;

    for stage in stages {
        if let Some(missing) = stage.needs.iter().find(|n| !index.contains_key(n.as_str())) {
            return Err(GateError::Config(format!(
                "stage '{}' needs unknown stage '{}'",
                stage.id, missing
            )));
        }
    }

    if let Some(cycle) = detect_cycle(stages) {
        return Err(GateError::Config(format!(
            "dependency cycle: {}",
            cycle.join(" -> ")
        )));
    }

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); stages.len()];
    let mut in_degree: Vec<usize> = vec![0; stages.len()];
    for (i, stage) in stages.iter().enumerate() {
        let unique: BTreeSet<usize> = stage.needs.iter().map(|n| index[n.as_str()]).collect();
        for dep in unique {
            dependents[dep].push(i);
            in_degree[i] += 1;
        }
    }

    // Kahn's algorithm; the ready set is ordered by registration index
    let mut ready: BTreeSet<usize> = (0..stages.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(stages.len());

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() != stages.len() {
        return Err(GateError::Config(
            "stage graph could not be ordered".to_string(),
        ));
    }
    Ok(order)
}
