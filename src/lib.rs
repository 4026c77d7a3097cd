//! # Schemaseq - Schema Migration Sequencer
//!
//! Replays a declarative, block-structured schema one model at a time so that
//! every generated migration only references models that already exist.
//!
//! Schemaseq provides:
//! - A lossless line-oriented parser for `model` / `enum` blocks
//! - A dependency graph built from foreign-key bearing relation fields
//! - A best-effort topological order that breaks cycles with a warning
//! - Cumulative schema snapshots, one per model, in dependency order
//! - A fail-fast driving loop that hands each snapshot to an external apply step

pub mod schema;
pub mod graph;
pub mod snapshot;
pub mod apply;
pub mod sequencer;
pub mod backup;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use schema::{Block, BlockKind, ParsedSchema};
pub use graph::{CycleWarning, DependencyGraph, SortOutcome};
pub use snapshot::{Snapshot, SnapshotPlan};
pub use apply::{CommandApplier, DirectoryWriter, SnapshotApplier};
pub use sequencer::{RunReport, Sequencer};

/// Result type alias for Schemaseq operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Schemaseq operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{kind} {name} opened on line {line} is never closed")]
    UnterminatedBlock {
        kind: BlockKind,
        name: String,
        line: usize,
    },

    #[error("{name} opened on line {line} inside another block (blocks cannot nest)")]
    NestedBlock { name: String, line: usize },

    #[error("{name} declared twice (lines {first_line} and {line})")]
    DuplicateBlock {
        name: String,
        first_line: usize,
        line: usize,
    },

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Step {step} ({model}) failed after {applied} applied step(s): {reason}")]
    StepFailed {
        step: usize,
        model: String,
        applied: usize,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backup error: {0}")]
    Backup(#[from] walkdir::Error),
}
