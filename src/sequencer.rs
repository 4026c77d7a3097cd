//! Driving loop - one apply call per snapshot, in dependency order
//!
//! Fail-fast: the first failing step stops the run. Steps that already
//! succeeded stay applied; there is no rollback.

use crate::apply::SnapshotApplier;
use crate::graph::CycleWarning;
use crate::snapshot::{Snapshot, SnapshotPlan};
use crate::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Progress notifications emitted while running
#[derive(Debug)]
pub enum StepEvent<'a> {
    Started(&'a Snapshot),
    Applied(&'a AppliedStep),
    Failed { snapshot: &'a Snapshot, reason: &'a str },
}

/// A step that was applied successfully
#[derive(Debug, Clone, Serialize)]
pub struct AppliedStep {
    pub step: usize,
    pub model: String,
    pub name: String,
    pub fingerprint: String,
    pub elapsed_ms: u128,
}

impl AppliedStep {
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms as u64)
    }
}

/// Outcome of a complete run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub steps: Vec<AppliedStep>,
    pub warnings: Vec<CycleWarning>,
    /// Where the full schema was written back, if anywhere
    pub restored: Option<PathBuf>,
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Sequence Summary:")?;
        writeln!(f, "  Steps applied: {}", self.steps.len())?;
        write!(f, "  Cycle warnings: {}", self.warnings.len())
    }
}

/// Runs a [`SnapshotPlan`] against a [`SnapshotApplier`].
#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    restore_to: Option<PathBuf>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the complete original schema to `path` once the run ends, whether or not it succeeded
    pub fn restore_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.restore_to = Some(path.into());
        self
    }

    pub fn run<A>(&self, plan: &SnapshotPlan, applier: &mut A) -> Result<RunReport>
    where
        A: SnapshotApplier + ?Sized,
    {
        self.run_with(plan, applier, |_| {})
    }

    /// Same as [`Sequencer::run`], reporting every step to `on_event`.
    pub fn run_with<A, F>(&self, plan: &SnapshotPlan, applier: &mut A, mut on_event: F) -> Result<RunReport>
    where
        A: SnapshotApplier + ?Sized,
        F: FnMut(StepEvent<'_>),
    {
        let mut report = RunReport {
            warnings: plan.warnings().to_vec(),
            ..RunReport::default()
        };

        for warning in &report.warnings {
            tracing::warn!("{}", warning);
        }

        for snapshot in plan.snapshots() {
            tracing::info!("Step {}/{}: {}", snapshot.step, plan.len(), snapshot.model);
            on_event(StepEvent::Started(&snapshot));

            let start = Instant::now();
            if let Err(err) = applier.apply(&snapshot) {
                let mut reason = format!("{:#}", err);
                tracing::error!("Step {} ({}) failed: {}", snapshot.step, snapshot.model, reason);
                on_event(StepEvent::Failed {
                    snapshot: &snapshot,
                    reason: &reason,
                });
                if let Some(path) = &self.restore_to {
                    if let Err(restore_err) = restore(path, &plan.full_source()) {
                        tracing::error!("Could not restore {}: {}", path.display(), restore_err);
                        reason = format!(
                            "{}; restoring {} also failed: {}",
                            reason,
                            path.display(),
                            restore_err
                        );
                    }
                }
                return Err(Error::StepFailed {
                    step: snapshot.step,
                    model: snapshot.model.clone(),
                    applied: report.steps.len(),
                    reason,
                });
            }

            let applied = AppliedStep {
                step: snapshot.step,
                model: snapshot.model.clone(),
                name: snapshot.name.clone(),
                fingerprint: snapshot.fingerprint(),
                elapsed_ms: start.elapsed().as_millis(),
            };
            on_event(StepEvent::Applied(&applied));
            report.steps.push(applied);
        }

        if let Some(path) = &self.restore_to {
            restore(path, &plan.full_source())?;
            report.restored = Some(path.clone());
        }

        Ok(report)
    }
}

fn restore(path: &Path, source: &str) -> Result<()> {
    tracing::info!("Restoring full schema to {}", path.display());
    std::fs::write(path, source)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOP: &str = r#"enum OrderStatus {
  PENDING
  PAID
}

model OrderItem {
  id        Int     @id
  orderId   Int
  productId Int
  order     Order   @relation(fields: [orderId], references: [id])
  product   Product @relation(fields: [productId], references: [id])
}

model Order {
  id     Int         @id
  status OrderStatus
  items  OrderItem[]
}

model Product {
  id    Int         @id
  items OrderItem[]
}
"#;

    #[test]
    fn test_run_applies_in_dependency_order() {
        let plan = SnapshotPlan::from_source(SHOP).unwrap();
        let mut seen: Vec<(String, String)> = Vec::new();
        let mut applier = |s: &Snapshot| -> anyhow::Result<()> {
            seen.push((s.model.clone(), s.schema.clone()));
            Ok(())
        };

        let report = Sequencer::new().run(&plan, &mut applier).unwrap();

        assert_eq!(report.steps.len(), 3);
        let models: Vec<&str> = seen.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(models, vec!["Order", "Product", "OrderItem"]);
        assert!(!seen[0].1.contains("items  OrderItem[]"));
        assert!(seen[2].1.contains("items  OrderItem[]"));
        assert_eq!(report.steps[2].name, "003_order_item");
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_run_stops_on_first_failure() {
        let plan = SnapshotPlan::from_source(SHOP).unwrap();
        let mut calls = 0;
        let mut applier = |s: &Snapshot| -> anyhow::Result<()> {
            calls += 1;
            if s.step == 2 {
                anyhow::bail!("database unreachable");
            }
            Ok(())
        };

        let mut events = Vec::new();
        let err = Sequencer::new()
            .run_with(&plan, &mut applier, |event| {
                events.push(match event {
                    StepEvent::Started(s) => format!("start {}", s.step),
                    StepEvent::Applied(a) => format!("ok {}", a.step),
                    StepEvent::Failed { snapshot, .. } => format!("fail {}", snapshot.step),
                })
            })
            .unwrap_err();

        assert_eq!(calls, 2);
        assert_eq!(events, vec!["start 1", "ok 1", "start 2", "fail 2"]);
        match err {
            Error::StepFailed { step, model, applied, reason } => {
                assert_eq!(step, 2);
                assert_eq!(model, "Product");
                assert_eq!(applied, 1);
                assert!(reason.contains("database unreachable"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cycle_warnings_reported() {
        let plan = SnapshotPlan::from_source(
            "model X {\n  yId Int\n  y Y @relation(fields: [yId], references: [id])\n}\n\
             model Y {\n  xId Int\n  x X @relation(fields: [xId], references: [id])\n}\n",
        )
        .unwrap();
        let mut applier = |_: &Snapshot| -> anyhow::Result<()> { Ok(()) };

        let report = Sequencer::new().run(&plan, &mut applier).unwrap();
        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_restore_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("schema.txt");
        let plan = SnapshotPlan::from_source(SHOP).unwrap();
        let mut applier = |s: &Snapshot| -> anyhow::Result<()> {
            std::fs::write(&target, &s.schema)?;
            anyhow::bail!("rejected")
        };

        let result = Sequencer::new().restore_to(&target).run(&plan, &mut applier);
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), SHOP);
    }

    #[test]
    fn test_restore_writes_full_schema() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("schema.txt");
        let plan = SnapshotPlan::from_source(SHOP).unwrap();
        let mut applier = |_: &Snapshot| -> anyhow::Result<()> { Ok(()) };

        let report = Sequencer::new()
            .restore_to(&target)
            .run(&plan, &mut applier)
            .unwrap();

        assert_eq!(report.restored.as_deref(), Some(target.as_path()));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), SHOP);
    }

    #[test]
    fn test_failed_restore_reported_in_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("schema.txt");
        let plan = SnapshotPlan::from_source(SHOP).unwrap();
        let mut applier = |_: &Snapshot| -> anyhow::Result<()> { anyhow::bail!("rejected") };

        let err = Sequencer::new()
            .restore_to(&target)
            .run(&plan, &mut applier)
            .unwrap_err();

        match err {
            Error::StepFailed { step, reason, .. } => {
                assert_eq!(step, 1);
                assert!(reason.starts_with("rejected"));
                assert!(reason.contains("also failed"), "{reason}");
                assert!(reason.contains("schema.txt"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
