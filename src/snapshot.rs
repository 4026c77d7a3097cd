//! Cumulative snapshots
//!
//! Snapshot *i* holds the header, every enum, and the first *i* models of the
//! dependency order. Field lines whose type names a model outside the active
//! set are dropped, so each snapshot validates on its own.

use crate::graph::{CycleWarning, DependencyGraph, SortOutcome};
use crate::schema::{Block, LineKind, ParsedSchema, base_type, classify};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::HashSet;

/// Render a schema containing all enums plus the `active` models, in the given order.
///
/// Fails with [`Error::UnknownModel`] if an active name is not a model.
pub fn cumulative_schema<S: AsRef<str>>(schema: &ParsedSchema, active: &[S]) -> Result<String> {
    let mut models = Vec::with_capacity(active.len());
    for name in active {
        let name = name.as_ref();
        let model = schema
            .model(name)
            .ok_or_else(|| Error::UnknownModel(name.to_string()))?;
        models.push(model);
    }
    Ok(render(schema, &models))
}

fn render(schema: &ParsedSchema, models: &[&Block]) -> String {
    let active: HashSet<&str> = models.iter().map(|m| m.name.as_str()).collect();
    let mut out = String::new();

    let header = schema.header();
    let header = header.trim_end();
    if !header.is_empty() {
        out.push_str(header);
        out.push('\n');
    }

    let mut emit = |block: &Block, filter: bool| {
        if !out.is_empty() {
            out.push('\n');
        }
        for line in &block.lines {
            if filter && !keeps_line(schema, &active, line) {
                tracing::debug!("{}: dropped forward field {}", block.name, line.trim());
                continue;
            }
            out.push_str(line);
            if !line.ends_with('\n') {
                out.push('\n');
            }
        }
    };

    for block in schema.enums() {
        emit(block, false);
    }
    for block in models {
        emit(block, true);
    }

    out
}

/// A field line survives unless its type names a model that is not active yet.
fn keeps_line(schema: &ParsedSchema, active: &HashSet<&str>, line: &str) -> bool {
    match classify(line) {
        LineKind::Field { type_token, .. } => {
            let target = base_type(type_token);
            !schema.is_model(target) || active.contains(target)
        }
        _ => true,
    }
}

/// Migration step name: `003_order_item`
pub fn migration_name(step: usize, model: &str) -> String {
    format!("{:03}_{}", step, snake_case(model))
}

fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }

    out
}

/// One migration step's worth of schema.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// 1-indexed step number
    pub step: usize,
    /// The model this step introduces
    pub model: String,
    /// Migration name, see [`migration_name`]
    pub name: String,
    /// Models present in this snapshot, in order
    pub active: Vec<String>,
    /// Full schema text
    #[serde(skip)]
    pub schema: String,
}

impl Snapshot {
    /// Short blake3 digest of the schema text
    pub fn fingerprint(&self) -> String {
        let hash = blake3::hash(self.schema.as_bytes()).to_hex();
        hash.as_str()[..12].to_string()
    }
}

/// Parsed schema plus its dependency order; yields one [`Snapshot`] per model.
#[derive(Debug, Clone)]
pub struct SnapshotPlan {
    schema: ParsedSchema,
    graph: DependencyGraph,
    outcome: SortOutcome,
}

impl SnapshotPlan {
    pub fn new(schema: ParsedSchema) -> Self {
        let graph = DependencyGraph::build(&schema);
        let outcome = graph.topological_order();
        tracing::info!(
            "Planned {} step(s) from {} edge(s), {} cycle warning(s)",
            outcome.order.len(),
            graph.edge_count(),
            outcome.warnings.len()
        );
        Self { schema, graph, outcome }
    }

    /// Parse and plan in one go
    pub fn from_source(text: &str) -> Result<Self> {
        Ok(Self::new(ParsedSchema::parse(text)?))
    }

    pub fn schema(&self) -> &ParsedSchema {
        &self.schema
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Model names, dependencies first
    pub fn order(&self) -> &[String] {
        &self.outcome.order
    }

    pub fn warnings(&self) -> &[CycleWarning] {
        &self.outcome.warnings
    }

    /// Number of steps (one per model)
    pub fn len(&self) -> usize {
        self.outcome.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcome.order.is_empty()
    }

    /// Snapshot for 0-indexed position `index` in the order
    pub fn snapshot(&self, index: usize) -> Option<Snapshot> {
        let model = self.outcome.order.get(index)?;
        let active = &self.outcome.order[..=index];
        let blocks: Vec<&Block> = active
            .iter()
            .filter_map(|name| self.schema.model(name))
            .collect();

        Some(Snapshot {
            step: index + 1,
            model: model.clone(),
            name: migration_name(index + 1, model),
            active: active.to_vec(),
            schema: render(&self.schema, &blocks),
        })
    }

    /// All snapshots in order, rendered lazily
    pub fn snapshots(&self) -> impl Iterator<Item = Snapshot> + '_ {
        (0..self.len()).filter_map(move |i| self.snapshot(i))
    }

    /// The untouched input schema
    pub fn full_source(&self) -> String {
        self.schema.to_source()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN: &str = r#"datasource db {
  provider = "sqlite"
}

model C {
  id  Int @id
  bId Int
  b   B   @relation(fields: [bId], references: [id])
}

model B {
  id  Int @id
  aId Int
  a   A   @relation(fields: [aId], references: [id])
  cs  C[]
}

enum Status {
  OPEN
  CLOSED
}

model A {
  id     Int    @id
  status Status
  bs     B[]
  @@map("a_table")
}
"#;

    fn field_types(snapshot: &str) -> Vec<String> {
        snapshot
            .lines()
            .filter_map(|l| match classify(l) {
                LineKind::Field { type_token, .. } => Some(base_type(type_token).to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_linear_chain_snapshots() {
        let plan = SnapshotPlan::from_source(CHAIN).unwrap();
        assert_eq!(plan.order(), ["A", "B", "C"]);

        let snapshots: Vec<Snapshot> = plan.snapshots().collect();
        assert_eq!(snapshots.len(), 3);

        let first = &snapshots[0].schema;
        assert!(first.contains("model A {"));
        assert!(!first.contains("model B {"));
        assert!(!first.contains("bs     B[]"));
        assert!(first.contains("status Status"));
        assert!(first.contains("@@map(\"a_table\")"));
        assert!(first.contains("enum Status {"));

        let second = &snapshots[1].schema;
        assert!(second.contains("a   A   @relation(fields: [aId], references: [id])"));
        assert!(second.contains("bs     B[]"));
        assert!(!second.contains("cs  C[]"));

        let third = &snapshots[2].schema;
        assert!(third.contains("b   B   @relation(fields: [bId], references: [id])"));
        assert!(third.contains("cs  C[]"));

        assert_eq!(snapshots[2].name, "003_c");
        assert_eq!(snapshots[1].active, vec!["A", "B"]);
    }

    #[test]
    fn test_snapshot_layout() {
        let plan = SnapshotPlan::from_source(CHAIN).unwrap();
        let first = plan.snapshot(0).unwrap().schema;
        let expected = r#"datasource db {
  provider = "sqlite"
}

enum Status {
  OPEN
  CLOSED
}

model A {
  id     Int    @id
  status Status
  @@map("a_table")
}
"#;
        assert_eq!(first, expected);
    }

    #[test]
    fn test_every_field_targets_active_or_non_model() {
        let plan = SnapshotPlan::from_source(CHAIN).unwrap();
        for snapshot in plan.snapshots() {
            for ty in field_types(&snapshot.schema) {
                if plan.schema().is_model(&ty) {
                    assert!(snapshot.active.contains(&ty), "{ty} leaked into step {}", snapshot.step);
                }
            }
        }
    }

    #[test]
    fn test_self_relation_kept() {
        let schema = ParsedSchema::parse(
            "model Node {\n  id Int @id\n  parentId Int?\n  parent Node? @relation(\"t\", fields: [parentId], references: [id])\n  kids Node[] @relation(\"t\")\n}\n",
        )
        .unwrap();
        let text = cumulative_schema(&schema, &["Node"]).unwrap();
        assert!(text.contains("parent Node?"));
        assert!(text.contains("kids Node[]"));
    }

    #[test]
    fn test_keyword_named_fields_filtered_by_type() {
        let plan = SnapshotPlan::from_source(
            "model Vehicle {\n  id        Int @id\n  catalogId Int\n  model     Catalog @relation(fields: [catalogId], references: [id])\n  enum      Kind\n}\n\n\
             model Catalog {\n  id    Int @id\n  model Vehicle[]\n}\n\n\
             enum Kind {\n  CAR\n}\n",
        )
        .unwrap();
        assert_eq!(plan.order(), ["Catalog", "Vehicle"]);

        let first = plan.snapshot(0).unwrap().schema;
        assert!(first.contains("model Catalog {"));
        assert!(!first.contains("model Vehicle[]"));

        let second = plan.snapshot(1).unwrap().schema;
        assert!(second.contains("model Vehicle[]"));
        assert!(second.contains("model     Catalog @relation(fields: [catalogId], references: [id])"));
        assert!(second.contains("enum      Kind"));
    }

    #[test]
    fn test_unknown_active_model() {
        let schema = ParsedSchema::parse(CHAIN).unwrap();
        let err = cumulative_schema(&schema, &["Status"]).unwrap_err();
        assert!(matches!(err, Error::UnknownModel(ref n) if n == "Status"));
    }

    #[test]
    fn test_empty_active_set_keeps_enums() {
        let schema = ParsedSchema::parse(CHAIN).unwrap();
        let text = cumulative_schema::<&str>(&schema, &[]).unwrap();
        assert!(text.contains("enum Status"));
        assert!(!text.contains("model "));
    }

    #[test]
    fn test_migration_name() {
        assert_eq!(migration_name(1, "User"), "001_user");
        assert_eq!(migration_name(12, "OrderItem"), "012_order_item");
        assert_eq!(migration_name(3, "HTTPLog"), "003_http_log");
        assert_eq!(migration_name(4, "Address2Fa"), "004_address2_fa");
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let plan = SnapshotPlan::from_source(CHAIN).unwrap();
        let a = plan.snapshot(0).unwrap();
        let b = plan.snapshot(1).unwrap();
        assert_eq!(a.fingerprint().len(), 12);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert!(plan.snapshot(3).is_none());
    }
}
