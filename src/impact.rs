//! Dependency graph over systems and the downstream impact analysis

use crate::error::{Result, TrackerError};
use crate::models::{SystemCategory, SystemStatus};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// System attributes carried on each graph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemNode {
    pub id: i64,
    pub name: String,
    pub category: SystemCategory,
    pub status: SystemStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedSystem {
    pub system_id: i64,
    pub name: String,
    pub category: SystemCategory,
    pub status: SystemStatus,
    pub impact_level: usize,
    /// Source first, this system last
    pub path: Vec<PathStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub source: SystemNode,
    pub affected: Vec<AffectedSystem>,
    pub by_level: BTreeMap<usize, usize>,
    pub max_depth: usize,
    pub has_cycles: bool,
}

impl ImpactReport {
    pub fn total_affected(&self) -> usize {
        self.affected.len()
    }
}

/// `depends_on` graph. An edge source -> target means target depends on
/// source, so walking outgoing edges finds everything downstream.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<SystemNode, ()>,
    system_indices: HashMap<i64, NodeIndex>,
}

impl DependencyGraph {
    /// Build from all systems and `(source, target)` pairs. Pairs naming an
    /// unknown system are skipped.
    pub fn build(systems: Vec<SystemNode>, depends_on: &[(i64, i64)]) -> Self {
        let mut graph = DiGraph::with_capacity(systems.len(), depends_on.len());
        let mut system_indices = HashMap::with_capacity(systems.len());

        for system in systems {
            let id = system.id;
            let index = graph.add_node(system);
            system_indices.insert(id, index);
        }

        for (source, target) in depends_on {
            if let (Some(&from), Some(&to)) =
                (system_indices.get(source), system_indices.get(target))
            {
                graph.update_edge(from, to, ());
            }
        }

        Self {
            graph,
            system_indices,
        }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Whether any cycle lies within `reachable`. A strongly connected
    /// component is either wholly reachable or not at all, so one member is
    /// enough to decide.
    fn has_cycle_within(&self, reachable: &HashSet<NodeIndex>) -> bool {
        tarjan_scc(&self.graph).iter().any(|component| {
            reachable.contains(&component[0])
                && (component.len() > 1 || self.graph.contains_edge(component[0], component[0]))
        })
    }

    /// Systems that depend directly on `system_id`
    pub fn dependents(&self, system_id: i64) -> Vec<&SystemNode> {
        self.neighbors(system_id, Direction::Outgoing)
    }

    /// Systems `system_id` depends on directly
    pub fn dependencies(&self, system_id: i64) -> Vec<&SystemNode> {
        self.neighbors(system_id, Direction::Incoming)
    }

    fn neighbors(&self, system_id: i64, direction: Direction) -> Vec<&SystemNode> {
        match self.system_indices.get(&system_id) {
            Some(&index) => {
                let mut nodes: Vec<&SystemNode> = self
                    .graph
                    .neighbors_directed(index, direction)
                    .map(|idx| &self.graph[idx])
                    .collect();
                nodes.sort_by(|a, b| a.name.cmp(&b.name));
                nodes
            }
            None => Vec::new(),
        }
    }

    /// Every system transitively downstream of `source_id`, tagged with the
    /// shortest level found by the walk and the path that reached it.
    pub fn analyze(&self, source_id: i64) -> Result<ImpactReport> {
        let &source = self
            .system_indices
            .get(&source_id)
            .ok_or_else(|| TrackerError::not_found("system", source_id))?;

        let mut found: HashMap<NodeIndex, (usize, Vec<NodeIndex>)> = HashMap::new();
        let mut path = vec![source];
        self.walk(source, source, 0, &mut path, &mut found);

        let mut reachable: HashSet<NodeIndex> = found.keys().copied().collect();
        reachable.insert(source);
        let has_cycles = self.has_cycle_within(&reachable);

        let mut affected: Vec<AffectedSystem> = found
            .into_iter()
            .map(|(index, (level, path))| {
                let node = &self.graph[index];
                AffectedSystem {
                    system_id: node.id,
                    name: node.name.clone(),
                    category: node.category,
                    status: node.status,
                    impact_level: level,
                    path: path
                        .iter()
                        .map(|&idx| PathStep {
                            id: self.graph[idx].id,
                            name: self.graph[idx].name.clone(),
                        })
                        .collect(),
                }
            })
            .collect();
        affected.sort_by(|a, b| {
            a.impact_level
                .cmp(&b.impact_level)
                .then_with(|| a.name.cmp(&b.name))
        });

        let mut by_level = BTreeMap::new();
        for system in &affected {
            *by_level.entry(system.impact_level).or_insert(0) += 1;
        }
        let max_depth = affected.iter().map(|a| a.impact_level).max().unwrap_or(0);

        Ok(ImpactReport {
            source: self.graph[source].clone(),
            affected,
            by_level,
            max_depth,
            has_cycles,
        })
    }

    fn walk(
        &self,
        node: NodeIndex,
        source: NodeIndex,
        depth: usize,
        path: &mut Vec<NodeIndex>,
        found: &mut HashMap<NodeIndex, (usize, Vec<NodeIndex>)>,
    ) {
        let level = depth + 1;
        for next in self.graph.neighbors(node) {
            // Cycle guard
            if next == source || path.contains(&next) {
                continue;
            }
            if matches!(found.get(&next), Some((known, _)) if *known <= level) {
                continue;
            }

            path.push(next);
            found.insert(next, (level, path.clone()));
            self.walk(next, source, level, path, found);
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: i64, name: &str) -> SystemNode {
        SystemNode {
            id,
            name: name.to_string(),
            category: SystemCategory::Core,
            status: SystemStatus::Active,
        }
    }

    fn graph(edges: &[(i64, i64)]) -> DependencyGraph {
        let systems = vec![
            node(1, "A"),
            node(2, "B"),
            node(3, "C"),
            node(4, "D"),
            node(5, "E"),
        ];
        DependencyGraph::build(systems, edges)
    }

    fn levels(report: &ImpactReport) -> Vec<(i64, usize)> {
        report
            .affected
            .iter()
            .map(|a| (a.system_id, a.impact_level))
            .collect()
    }

    #[test]
    fn test_chain() {
        let report = graph(&[(1, 2), (2, 3)]).analyze(1).unwrap();
        assert_eq!(levels(&report), vec![(2, 1), (3, 2)]);
        let names: Vec<&str> = report.affected[1].path.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(report.max_depth, 2);
        assert!(!report.has_cycles);
    }

    #[test]
    fn test_diamond_keeps_shortest_level() {
        // A -> B -> D, A -> C -> D, A -> D
        let report = graph(&[(1, 2), (2, 4), (1, 3), (3, 4), (1, 4)])
            .analyze(1)
            .unwrap();
        let d = report.affected.iter().find(|a| a.system_id == 4).unwrap();
        assert_eq!(d.impact_level, 1);
        assert_eq!(d.path.len(), 2);
        assert_eq!(report.total_affected(), 3);
        assert_eq!(report.by_level.get(&1), Some(&3));
    }

    #[test]
    fn test_longer_path_found_first_is_replaced() {
        // First neighbour order must not matter: E is reachable at 1 and 3.
        let report = graph(&[(1, 2), (2, 3), (3, 5), (1, 5)]).analyze(1).unwrap();
        let e = report.affected.iter().find(|a| a.system_id == 5).unwrap();
        assert_eq!(e.impact_level, 1);
    }

    #[test]
    fn test_cycle_terminates_and_excludes_source() {
        let report = graph(&[(1, 2), (2, 3), (3, 1)]).analyze(1).unwrap();
        assert_eq!(levels(&report), vec![(2, 1), (3, 2)]);
        assert!(report.has_cycles);
    }

    #[test]
    fn test_unrelated_cycle_not_reported() {
        // D <-> E loop sits outside what A reaches
        let g = graph(&[(1, 2), (2, 3), (4, 5), (5, 4)]);
        let report = g.analyze(1).unwrap();
        assert_eq!(report.total_affected(), 2);
        assert!(!report.has_cycles);

        // Downstream cycle that does not pass through the source
        let report = graph(&[(1, 2), (2, 3), (3, 2)]).analyze(1).unwrap();
        assert!(report.has_cycles);

        assert!(g.analyze(4).unwrap().has_cycles);
    }

    #[test]
    fn test_upstream_not_included() {
        let report = graph(&[(1, 2), (2, 3)]).analyze(2).unwrap();
        assert_eq!(levels(&report), vec![(3, 1)]);
    }

    #[test]
    fn test_isolated_system() {
        let report = graph(&[]).analyze(5).unwrap();
        assert!(report.affected.is_empty());
        assert_eq!(report.max_depth, 0);
        assert!(report.by_level.is_empty());
    }

    #[test]
    fn test_unknown_source() {
        let err = graph(&[]).analyze(99).unwrap_err();
        assert!(matches!(err, TrackerError::NotFound { id: 99, .. }));
    }

    #[test]
    fn test_direct_neighbours() {
        let g = graph(&[(1, 3), (2, 3), (3, 4), (9, 3)]);
        let deps: Vec<i64> = g.dependencies(3).iter().map(|s| s.id).collect();
        assert_eq!(deps, vec![1, 2]);
        let dependents: Vec<i64> = g.dependents(3).iter().map(|s| s.id).collect();
        assert_eq!(dependents, vec![4]);
    }
}
