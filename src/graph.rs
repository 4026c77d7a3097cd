//! Dependency Graph - model → referenced-model edges
//!
//! Built from the foreign-key side of relation fields only, so a regular
//! bidirectional relation contributes a single edge instead of a cycle.

use crate::schema::ParsedSchema;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Directed graph where an edge `A → B` means model `A` references model `B`
/// and must be migrated after it.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Model names in declaration order
    nodes: Vec<String>,
    /// Outgoing edges (what a model depends on)
    edges_from: BTreeMap<String, BTreeSet<String>>,
    /// Incoming edges (who depends on a model)
    edges_to: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for every model in a parsed schema.
    ///
    /// Self-references and relations to names that are not models are skipped.
    pub fn build(schema: &ParsedSchema) -> Self {
        let mut graph = Self::new();

        for model in schema.models() {
            graph.add_node(&model.name);
        }

        for model in schema.models() {
            for target in model.relation_targets() {
                if target == model.name || !schema.is_model(target) {
                    continue;
                }
                graph.add_edge(&model.name, target);
            }
        }

        graph
    }

    /// Add a node; adding an existing node is a no-op
    pub fn add_node(&mut self, name: &str) {
        if !self.edges_from.contains_key(name) {
            self.nodes.push(name.to_string());
            self.edges_from.insert(name.to_string(), BTreeSet::new());
            self.edges_to.insert(name.to_string(), BTreeSet::new());
        }
    }

    /// Record that `from` depends on `to`. Both nodes are created if missing.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.add_node(from);
        self.add_node(to);
        if let Some(deps) = self.edges_from.get_mut(from) {
            deps.insert(to.to_string());
        }
        if let Some(users) = self.edges_to.get_mut(to) {
            users.insert(from.to_string());
        }
        tracing::debug!("edge {} -> {}", from, to);
    }

    /// Nodes in insertion (declaration) order
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Models that `name` references
    pub fn dependencies(&self, name: &str) -> impl Iterator<Item = &str> {
        self.edges_from
            .get(name)
            .into_iter()
            .flat_map(|deps| deps.iter().map(String::as_str))
    }

    /// Models that reference `name`
    pub fn dependents(&self, name: &str) -> impl Iterator<Item = &str> {
        self.edges_to
            .get(name)
            .into_iter()
            .flat_map(|users| users.iter().map(String::as_str))
    }

    /// All edges as `(from, to)` pairs
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges_from
            .iter()
            .flat_map(|(from, deps)| deps.iter().map(move |to| (from.as_str(), to.as_str())))
    }

    pub fn edge_count(&self) -> usize {
        self.edges_from.values().map(|deps| deps.len()).sum()
    }

    /// Order nodes so every dependency comes before its dependents.
    ///
    /// Depth-first with three colors. Roots are taken in declaration order and
    /// dependencies in name order. A back edge into an in-progress node is
    /// treated as satisfied and reported as a [`CycleWarning`]; the sort
    /// itself never fails.
    pub fn topological_order(&self) -> SortOutcome {
        let mut walk = Walk {
            graph: self,
            marks: HashMap::new(),
            outcome: SortOutcome::default(),
        };

        for node in &self.nodes {
            walk.visit(node, None);
        }

        walk.outcome
    }

    /// Get statistics about the graph
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            models: self.nodes.len(),
            edges: self.edge_count(),
            independent: self
                .nodes
                .iter()
                .filter(|n| self.dependencies(n).next().is_none())
                .count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

struct Walk<'g> {
    graph: &'g DependencyGraph,
    marks: HashMap<&'g str, Mark>,
    outcome: SortOutcome,
}

impl<'g> Walk<'g> {
    fn visit(&mut self, node: &'g str, from: Option<&'g str>) {
        match self.marks.get(node) {
            Some(Mark::Done) => return,
            Some(Mark::InProgress) => {
                let warning = CycleWarning {
                    node: node.to_string(),
                    from: from.unwrap_or(node).to_string(),
                };
                tracing::warn!("{}", warning);
                self.outcome.warnings.push(warning);
                return;
            }
            None => {}
        }

        self.marks.insert(node, Mark::InProgress);
        let graph = self.graph;
        for dep in graph.dependencies(node) {
            self.visit(dep, Some(node));
        }
        self.marks.insert(node, Mark::Done);
        self.outcome.order.push(node.to_string());
    }
}

/// A back edge ignored while sorting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleWarning {
    /// The in-progress node that was reached again
    pub node: String,
    /// The node whose edge closed the cycle
    pub from: String,
}

impl fmt::Display for CycleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cycle detected at {}: edge {} -> {} ignored",
            self.node, self.from, self.node
        )
    }
}

/// Result of [`DependencyGraph::topological_order`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SortOutcome {
    /// Every node exactly once, dependencies first
    pub order: Vec<String>,
    pub warnings: Vec<CycleWarning>,
}

impl SortOutcome {
    pub fn is_acyclic(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Position of a node in the order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }
}

/// Statistics about a dependency graph
#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub models: usize,
    pub edges: usize,
    /// Models with no outgoing edge
    pub independent: usize,
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dependency Graph Statistics:")?;
        writeln!(f, "  Models: {}", self.models)?;
        writeln!(f, "  Edges: {}", self.edges)?;
        write!(f, "  Independent: {}", self.independent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_of(schema: &str) -> DependencyGraph {
        DependencyGraph::build(&ParsedSchema::parse(schema).unwrap())
    }

    fn assert_respects_edges(graph: &DependencyGraph, outcome: &SortOutcome) {
        for (from, to) in graph.edges() {
            let a = outcome.position(from).unwrap();
            let b = outcome.position(to).unwrap();
            assert!(b < a, "{to} must come before {from}: {:?}", outcome.order);
        }
    }

    #[test]
    fn test_linear_chain() {
        let graph = graph_of(
            "model C {\n  bId Int\n  b B @relation(fields: [bId], references: [id])\n}\n\
             model A {\n  id Int @id\n}\n\
             model B {\n  aId Int\n  a A @relation(fields: [aId], references: [id])\n}\n",
        );
        let outcome = graph.topological_order();

        assert_eq!(outcome.order, vec!["A", "B", "C"]);
        assert!(outcome.is_acyclic());
        assert_respects_edges(&graph, &outcome);
    }

    #[test]
    fn test_inverse_relation_adds_no_edge() {
        let graph = graph_of(
            "model Order {\n  id Int @id\n  items OrderItem[]\n}\n\
             model OrderItem {\n  id Int @id\n  orderId Int\n  order Order @relation(fields: [orderId], references: [id])\n}\n",
        );

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edges().collect::<Vec<_>>(), vec![("OrderItem", "Order")]);
        assert_eq!(graph.dependents("Order").collect::<Vec<_>>(), vec!["OrderItem"]);

        let outcome = graph.topological_order();
        assert!(outcome.is_acyclic());
        assert_eq!(outcome.order, vec!["Order", "OrderItem"]);
    }

    #[test]
    fn test_self_reference_and_unknown_targets_skipped() {
        let graph = graph_of(
            "enum Kind {\n  A\n}\n\
             model Category {\n  id Int @id\n  parentId Int?\n  parent Category? @relation(\"tree\", fields: [parentId], references: [id])\n  children Category[] @relation(\"tree\")\n}\n\
             model Odd {\n  k Kind @relation(fields: [x], references: [y])\n  g Ghost @relation(fields: [z], references: [id])\n}\n",
        );

        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.nodes(), ["Category", "Odd"]);
    }

    #[test]
    fn test_cycle_is_broken_with_warning() {
        let graph = graph_of(
            "model X {\n  yId Int\n  y Y @relation(fields: [yId], references: [id])\n}\n\
             model Y {\n  xId Int\n  x X @relation(fields: [xId], references: [id])\n}\n",
        );
        let outcome = graph.topological_order();

        assert_eq!(outcome.order.len(), 2);
        assert!(outcome.order.contains(&"X".to_string()));
        assert!(outcome.order.contains(&"Y".to_string()));
        assert_eq!(
            outcome.warnings,
            vec![CycleWarning { node: "X".into(), from: "Y".into() }]
        );
        assert_eq!(outcome.order, vec!["Y", "X"]);
    }

    #[test]
    fn test_every_node_once_in_larger_graph() {
        let mut graph = DependencyGraph::new();
        for (from, to) in [
            ("OrderItem", "Order"),
            ("OrderItem", "Product"),
            ("Order", "Customer"),
            ("Review", "Product"),
            ("Review", "Customer"),
            ("Product", "Category"),
            ("Coupon", "Customer"),
        ] {
            graph.add_edge(from, to);
        }
        graph.add_node("Setting");

        let outcome = graph.topological_order();
        assert_eq!(outcome.order.len(), graph.nodes().len());
        let unique: BTreeSet<_> = outcome.order.iter().collect();
        assert_eq!(unique.len(), outcome.order.len());
        assert_respects_edges(&graph, &outcome);

        let stats = graph.stats();
        assert_eq!(stats.models, 8);
        assert_eq!(stats.edges, 7);
        assert_eq!(stats.independent, 3);
    }

    #[test]
    fn test_three_node_cycle_completes() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("A", "B");
        graph.add_edge("B", "C");
        graph.add_edge("C", "A");
        graph.add_edge("D", "A");

        let outcome = graph.topological_order();
        assert_eq!(outcome.order, vec!["C", "B", "A", "D"]);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].node, "A");
        assert_eq!(outcome.warnings[0].from, "C");
    }
}
