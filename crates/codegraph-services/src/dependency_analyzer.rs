//! Module-level dependency aggregation, cycle detection and modularity
//! scoring. Pure aggregation logic lives in [`aggregate`] so it can be
//! exercised without a live graph store; [`DependencyAnalyzer::analyze_project`]
//! is the thin async wrapper the orchestrator calls, which reads file
//! dependencies from the graph store and writes the aggregated module
//! edges back.

use std::collections::{HashMap, HashSet};

use codegraph_core::{
    FileDependency, GraphStore, ModuleDependency, ProjectDependencies, ProjectId, Result,
};
use codegraph_graph::module_name_for_path;

pub struct DependencyAnalyzer;

impl DependencyAnalyzer {
    /// Reads the project's file dependencies from `store`, aggregates
    /// them into module dependencies, persists the result, and returns
    /// the full `ProjectDependencies`.
    pub async fn analyze_project(
        store: &dyn GraphStore,
        project_id: &ProjectId,
    ) -> Result<ProjectDependencies> {
        let file_dependencies = store.file_dependencies(project_id).await?;
        let project_dependencies = Self::aggregate(file_dependencies);
        store
            .store_module_dependencies(project_id, &project_dependencies.module_dependencies)
            .await?;
        Ok(project_dependencies)
    }

    /// Pure aggregation: file dependencies in, full `ProjectDependencies`
    /// out. Self-module edges are discarded per invariant 4.
    pub fn aggregate(file_dependencies: Vec<FileDependency>) -> ProjectDependencies {
        let module_dependencies = aggregate_module_dependencies(&file_dependencies);
        let cycles = detect_cycles(&module_dependencies);
        let circular_node_sets: Vec<HashSet<&str>> = cycles
            .iter()
            .map(|cycle| cycle.iter().map(|s| s.as_str()).collect())
            .collect();

        let module_dependencies: Vec<ModuleDependency> = module_dependencies
            .into_iter()
            .map(|mut dep| {
                dep.is_circular = circular_node_sets.iter().any(|nodes| {
                    nodes.contains(dep.source_module.as_str())
                        && nodes.contains(dep.target_module.as_str())
                });
                dep
            })
            .collect();

        let modularity_score = compute_modularity_score(&module_dependencies);

        ProjectDependencies {
            file_dependencies,
            module_dependencies,
            circular_dependencies: cycles,
            modularity_score,
        }
    }
}

/// Aggregates `(source_module, target_module)` pairs from file
/// dependencies: `file_count` is the number of distinct file pairs
/// contributing; `strength = min(1, file_count / |source_module_files|)`
/// where `source_module_files` is the set of distinct files observed
/// as a dependency source under that module in this batch — not every
/// `.c` file physically present under the module directory, since this
/// function only sees the already-extracted dependency edges and has
/// no project-root handle to glob against. Accepted deviation from the
/// original tool's denominator; see DESIGN.md's C2 entry.
fn aggregate_module_dependencies(file_dependencies: &[FileDependency]) -> Vec<ModuleDependency> {
    let mut module_files: HashMap<String, HashSet<&str>> = HashMap::new();
    let mut pair_files: HashMap<(String, String), HashSet<(&str, &str)>> = HashMap::new();

    for dep in file_dependencies {
        let source_module = module_name_for_path(&dep.source_file);
        let target_module = module_name_for_path(&dep.target_path);

        module_files
            .entry(source_module.clone())
            .or_default()
            .insert(dep.source_file.as_str());

        if source_module == target_module {
            continue;
        }

        pair_files
            .entry((source_module, target_module))
            .or_default()
            .insert((dep.source_file.as_str(), dep.target_path.as_str()));
    }

    pair_files
        .into_iter()
        .map(|((source_module, target_module), pairs)| {
            let file_count = pairs.len() as u32;
            let module_file_count = module_files
                .get(&source_module)
                .map(|files| files.len())
                .unwrap_or(0)
                .max(1) as f32;
            let strength = (file_count as f32 / module_file_count).min(1.0);
            ModuleDependency {
                source_module,
                target_module,
                file_count,
                strength,
                is_circular: false,
            }
        })
        .collect()
}

/// Depth-first cycle detection over the module dependency graph,
/// carrying the current path and recording a slice whenever a node
/// already on the path is revisited. Deduplicates cycles by rotating
/// each to start at its lexicographically smallest module name.
fn detect_cycles(module_dependencies: &[ModuleDependency]) -> Vec<Vec<String>> {
    let mut graph: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut nodes: HashSet<&str> = HashSet::new();
    for dep in module_dependencies {
        graph
            .entry(dep.source_module.as_str())
            .or_default()
            .push(dep.target_module.as_str());
        nodes.insert(dep.source_module.as_str());
        nodes.insert(dep.target_module.as_str());
    }

    let mut sorted_nodes: Vec<&str> = nodes.into_iter().collect();
    sorted_nodes.sort_unstable();

    let mut visited: HashSet<&str> = HashSet::new();
    let mut cycles: Vec<Vec<String>> = Vec::new();

    for node in &sorted_nodes {
        if !visited.contains(node) {
            let mut path: Vec<&str> = Vec::new();
            let mut on_path: HashSet<&str> = HashSet::new();
            dfs_cycles(node, &graph, &mut visited, &mut path, &mut on_path, &mut cycles);
        }
    }

    dedupe_cycles(cycles)
}

fn dfs_cycles<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
    on_path: &mut HashSet<&'a str>,
    cycles: &mut Vec<Vec<String>>,
) {
    visited.insert(node);
    path.push(node);
    on_path.insert(node);

    if let Some(neighbors) = graph.get(node) {
        for &next in neighbors {
            if on_path.contains(next) {
                if let Some(pos) = path.iter().position(|n| *n == next) {
                    cycles.push(path[pos..].iter().map(|s| s.to_string()).collect());
                }
            } else if !visited.contains(next) {
                dfs_cycles(next, graph, visited, path, on_path, cycles);
            }
        }
    }

    path.pop();
    on_path.remove(node);
}

fn canonical_cycle(cycle: &[String]) -> Vec<String> {
    let len = cycle.len();
    if len == 0 {
        return Vec::new();
    }
    let min_idx = (0..len).min_by_key(|&i| &cycle[i]).unwrap_or(0);
    (0..len).map(|i| cycle[(min_idx + i) % len].clone()).collect()
}

fn dedupe_cycles(cycles: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for cycle in cycles {
        let canon = canonical_cycle(&cycle);
        if seen.insert(canon.clone()) {
            result.push(canon);
        }
    }
    result
}

/// `1 - (0.4*density + 0.3*avg_strength + 0.3*circular_ratio)`,
/// clamped to `[0,1]`; `1.0` when there are no module dependencies.
fn compute_modularity_score(module_dependencies: &[ModuleDependency]) -> f32 {
    if module_dependencies.is_empty() {
        return 1.0;
    }

    let mut modules: HashSet<&str> = HashSet::new();
    for dep in module_dependencies {
        modules.insert(dep.source_module.as_str());
        modules.insert(dep.target_module.as_str());
    }
    let module_count = modules.len() as f32;
    let max_possible = module_count * (module_count - 1.0);
    let density = if max_possible > 0.0 {
        module_dependencies.len() as f32 / max_possible
    } else {
        0.0
    };

    let avg_strength =
        module_dependencies.iter().map(|d| d.strength).sum::<f32>() / module_dependencies.len() as f32;

    let circular_edges = module_dependencies.iter().filter(|d| d.is_circular).count() as f32;
    let circular_ratio = circular_edges / module_dependencies.len() as f32;

    let score = 1.0 - (0.4 * density + 0.3 * avg_strength + 0.3 * circular_ratio);
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(source: &str, target: &str, is_system: bool) -> FileDependency {
        FileDependency {
            source_file: source.to_string(),
            target_path: target.to_string(),
            is_system,
            line_number: 1,
        }
    }

    #[test]
    fn no_dependencies_yields_perfect_score() {
        let result = DependencyAnalyzer::aggregate(Vec::new());
        assert_eq!(result.modularity_score, 1.0);
        assert!(result.module_dependencies.is_empty());
        assert!(result.circular_dependencies.is_empty());
    }

    #[test]
    fn self_module_edges_are_discarded() {
        // Both files are under the root module ("main.c", "util.c").
        let deps = vec![dep("main.c", "util.c", false)];
        let result = DependencyAnalyzer::aggregate(deps);
        assert!(result.module_dependencies.is_empty());
    }

    #[test]
    fn cross_module_edge_is_aggregated_with_strength() {
        let deps = vec![
            dep("net/socket.c", "lib/util.c", false),
            dep("net/server.c", "lib/util.c", false),
        ];
        let result = DependencyAnalyzer::aggregate(deps);
        assert_eq!(result.module_dependencies.len(), 1);
        let edge = &result.module_dependencies[0];
        assert_eq!(edge.source_module, "net");
        assert_eq!(edge.target_module, "lib");
        assert_eq!(edge.file_count, 2);
        assert!(edge.strength <= 1.0);
        assert!(!edge.is_circular);
    }

    #[test]
    fn two_module_cycle_is_detected_and_marked_circular() {
        let deps = vec![
            dep("net/socket.c", "lib/util.h", false),
            dep("lib/util.c", "net/socket.h", false),
        ];
        let result = DependencyAnalyzer::aggregate(deps);
        assert_eq!(result.circular_dependencies.len(), 1);
        assert_eq!(result.circular_dependencies[0].len(), 2);
        assert!(result.module_dependencies.iter().all(|d| d.is_circular));
    }

    #[test]
    fn modularity_score_is_in_unit_range() {
        let deps = vec![
            dep("a/x.c", "b/y.h", false),
            dep("b/y.c", "c/z.h", false),
            dep("c/z.c", "a/x.h", false),
        ];
        let result = DependencyAnalyzer::aggregate(deps);
        assert!((0.0..=1.0).contains(&result.modularity_score));
    }
}
