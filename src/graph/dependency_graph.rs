//! Name-keyed dependency tracking between calculations and the values they
//! read.
//!
//! Edges point from a precedent (the name being read) to its dependents (the
//! calculations that read it). Cycle detection happens at edge insertion, not
//! at evaluation time, so a rejected edge leaves the graph exactly as it was.

use std::fmt::Write as _;

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::error::{CalcError, CalcResult};

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// target -> names whose calculations read that target.
    dependents: IndexMap<String, Vec<String>, ahash::RandomState>,
    /// dependent -> number of distinct precedents feeding it.
    precedent_counts: AHashMap<String, usize>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` as a trackable target. Idempotent.
    pub fn add_target(&mut self, name: &str) {
        self.dependents.entry(name.to_string()).or_default();
    }

    pub fn is_target(&self, name: &str) -> bool {
        self.dependents.contains_key(name)
    }

    /// Records that `dependent` reads `target`.
    ///
    /// Self-edges and duplicate edges are ignored. If `target` is already
    /// reachable from `dependent` the edge would close a cycle; the edge is
    /// rejected and the graph is left unchanged.
    pub fn add_dependency(&mut self, target: &str, dependent: &str) -> CalcResult<()> {
        if target == dependent {
            return Ok(());
        }
        self.add_target(target);
        if self.dependents[target].iter().any(|d| d == dependent) {
            return Ok(());
        }
        if self.all_dependents(dependent).iter().any(|d| d == target) {
            return Err(CalcError::CircularReference {
                target: target.to_string(),
                dependent: dependent.to_string(),
            });
        }
        self.dependents
            .get_mut(target)
            .map(|deps| deps.push(dependent.to_string()));
        *self
            .precedent_counts
            .entry(dependent.to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    pub fn direct_dependents(&self, name: &str) -> Vec<String> {
        self.dependents.get(name).cloned().unwrap_or_default()
    }

    /// Transitive closure of dependents, `name` itself included.
    pub fn all_dependents(&self, name: &str) -> Vec<String> {
        let mut closure: Vec<String> = Vec::new();
        let mut stack = vec![name.to_string()];
        while let Some(current) = stack.pop() {
            if closure.iter().any(|c| c == &current) {
                continue;
            }
            if let Some(deps) = self.dependents.get(&current) {
                stack.extend(deps.iter().cloned());
            }
            closure.push(current);
        }
        closure
    }

    pub fn precedent_count(&self, name: &str) -> usize {
        self.precedent_counts.get(name).copied().unwrap_or(0)
    }

    pub fn target_count(&self) -> usize {
        self.dependents.len()
    }

    pub fn edge_count(&self) -> usize {
        self.dependents.values().map(Vec::len).sum()
    }

    /// Drops `name` as a target and removes every edge touching it.
    pub fn remove(&mut self, name: &str) {
        if let Some(deps) = self.dependents.swap_remove(name) {
            for dep in deps {
                if let Some(count) = self.precedent_counts.get_mut(&dep) {
                    *count = count.saturating_sub(1);
                }
            }
        }
        let mut removed = 0usize;
        for deps in self.dependents.values_mut() {
            let before = deps.len();
            deps.retain(|d| d != name);
            removed += before - deps.len();
        }
        if removed > 0 {
            self.precedent_counts.remove(name);
        }
    }

    pub fn clear(&mut self) {
        self.dependents.clear();
        self.precedent_counts.clear();
    }

    /// Extracts the subgraph reachable from `roots`.
    pub fn clone_dependents(&self, roots: &[String]) -> DependencyGraph {
        let mut sub = DependencyGraph::new();
        for root in roots {
            for name in self.all_dependents(root) {
                sub.add_target(&name);
                for dep in self.direct_dependents(&name) {
                    // Edges inside the closure cannot form a new cycle.
                    let _ = sub.add_dependency(&name, &dep);
                }
            }
        }
        sub
    }

    /// Human-readable dump of the whole graph, for diagnostics.
    pub fn dependency_report(&self) -> String {
        let mut out = String::new();
        for (target, deps) in &self.dependents {
            let _ = writeln!(
                out,
                "{} <- [{}] (precedents: {})",
                target,
                deps.join(", "),
                self.precedent_count(target)
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_includes_the_target() {
        let mut g = DependencyGraph::new();
        g.add_dependency("a", "b").unwrap();
        g.add_dependency("b", "c").unwrap();
        let all = g.all_dependents("a");
        assert!(all.contains(&"a".to_string()));
        assert!(all.contains(&"b".to_string()));
        assert!(all.contains(&"c".to_string()));
    }

    #[test]
    fn cycle_is_rejected_and_graph_unchanged() {
        let mut g = DependencyGraph::new();
        g.add_dependency("a", "b").unwrap();
        g.add_dependency("b", "c").unwrap();
        let edges = g.edge_count();
        let err = g.add_dependency("c", "a").unwrap_err();
        assert!(matches!(err, CalcError::CircularReference { .. }));
        assert_eq!(g.edge_count(), edges);
        assert_eq!(g.precedent_count("a"), 0);
    }

    #[test]
    fn duplicate_and_self_edges_are_ignored() {
        let mut g = DependencyGraph::new();
        g.add_dependency("a", "b").unwrap();
        g.add_dependency("a", "b").unwrap();
        g.add_dependency("a", "a").unwrap();
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.precedent_count("b"), 1);
    }

    #[test]
    fn remove_detaches_all_edges() {
        let mut g = DependencyGraph::new();
        g.add_dependency("a", "b").unwrap();
        g.add_dependency("b", "c").unwrap();
        g.remove("b");
        assert!(!g.is_target("b"));
        assert_eq!(g.direct_dependents("a"), Vec::<String>::new());
    }

    #[test]
    fn clone_dependents_extracts_reachable_subgraph() {
        let mut g = DependencyGraph::new();
        g.add_dependency("a", "b").unwrap();
        g.add_dependency("b", "c").unwrap();
        g.add_dependency("x", "y").unwrap();
        let sub = g.clone_dependents(&["a".to_string()]);
        assert!(sub.is_target("c"));
        assert!(!sub.is_target("x"));
    }
}
