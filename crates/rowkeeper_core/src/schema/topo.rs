//! Dependency ordering of table creation.
//!
//! # Invariants
//! - A table is listed after every table it references.
//! - Self-references (tree parent columns) are not dependencies.
//! - Cycles never abort ordering: each is recorded once and every table
//!   still appears exactly once in the result.

use crate::registry::EntityRegistry;
use log::warn;
use std::collections::HashMap;

/// Table dependency graph keyed by logical table name.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    tables: Vec<String>,
    edges: HashMap<String, Vec<String>>,
}

/// Result of a topological sort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreationOrder {
    /// Logical table names, dependencies first.
    pub tables: Vec<String>,
    /// Each detected cycle as a path that starts and ends on the same table.
    pub cycles: Vec<Vec<String>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph over every registered table, from its foreign keys.
    pub fn from_registry(registry: &EntityRegistry) -> Self {
        let mut graph = Self::new();
        for descriptor in registry.descriptors() {
            graph.add_table(descriptor.table_name());
            for foreign_key in descriptor.foreign_keys() {
                graph.add_edge(descriptor.table_name(), &foreign_key.ref_table);
            }
        }
        graph
    }

    pub fn add_table(&mut self, table: &str) {
        if !self.edges.contains_key(table) {
            self.tables.push(table.to_string());
            self.edges.insert(table.to_string(), Vec::new());
        }
    }

    /// Records that `from` references `to`. Self edges are dropped.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.add_table(from);
        if from == to {
            return;
        }
        if let Some(targets) = self.edges.get_mut(from) {
            if !targets.iter().any(|target| target == to) {
                targets.push(to.to_string());
            }
        }
    }

    /// Depth-first topological sort in table insertion order.
    pub fn creation_order(&self) -> CreationOrder {
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut path: Vec<&str> = Vec::new();
        let mut order = CreationOrder::default();
        for table in &self.tables {
            self.visit(table, &mut marks, &mut path, &mut order);
        }
        order
    }

    fn visit<'g>(
        &'g self,
        table: &'g str,
        marks: &mut HashMap<&'g str, Mark>,
        path: &mut Vec<&'g str>,
        order: &mut CreationOrder,
    ) {
        match marks.get(table) {
            Some(Mark::Done) => return,
            Some(Mark::Visiting) => {
                let start = path.iter().position(|entry| *entry == table).unwrap_or(0);
                let mut cycle: Vec<String> =
                    path[start..].iter().map(|entry| entry.to_string()).collect();
                cycle.push(table.to_string());
                warn!(
                    "event=schema_cycle module=schema status=warn cycle={}",
                    cycle.join("->")
                );
                order.cycles.push(cycle);
                return;
            }
            None => {}
        }

        marks.insert(table, Mark::Visiting);
        path.push(table);
        // Edges to tables outside the graph are not ours to create.
        if let Some(targets) = self.edges.get(table) {
            for target in targets {
                if self.edges.contains_key(target.as_str()) {
                    self.visit(target, marks, path, order);
                }
            }
        }
        path.pop();
        marks.insert(table, Mark::Done);
        order.tables.push(table.to_string());
    }
}

/// Creation order of every registered table.
pub fn creation_order(registry: &EntityRegistry) -> CreationOrder {
    DependencyGraph::from_registry(registry).creation_order()
}

#[cfg(test)]
mod tests {
    use super::DependencyGraph;

    #[test]
    fn dependencies_come_first() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");
        graph.add_edge("a", "a");
        graph.add_table("c");

        let order = graph.creation_order();
        assert_eq!(order.tables, vec!["c", "b", "a"]);
        assert!(order.cycles.is_empty());
    }

    #[test]
    fn cycles_are_reported_and_ordering_continues() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("b", "a");
        graph.add_edge("c", "a");

        let order = graph.creation_order();
        assert_eq!(order.tables, vec!["b", "a", "c"]);
        assert_eq!(order.cycles, vec![vec!["a", "b", "a"]]);
    }

    #[test]
    fn unknown_targets_are_ignored() {
        let mut graph = DependencyGraph::new();
        graph.add_table("a");
        graph.add_edge("a", "elsewhere");
        assert_eq!(graph.creation_order().tables, vec!["a"]);
    }
}
