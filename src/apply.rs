//! Apply step - the external collaborator each snapshot is handed to
//!
//! The driving loop only needs `apply(snapshot) -> success | failure`.
//! Two implementations ship with the crate:
//! - [`CommandApplier`]: write the snapshot to a working schema file and run a command
//! - [`DirectoryWriter`]: write every snapshot to its own file (dry runs)
//!
//! Any `FnMut(&Snapshot) -> anyhow::Result<()>` closure works as well.

use crate::snapshot::Snapshot;
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Applies one snapshot, blocking until it has durably succeeded or failed.
pub trait SnapshotApplier {
    fn apply(&mut self, snapshot: &Snapshot) -> anyhow::Result<()>;
}

impl<F> SnapshotApplier for F
where
    F: FnMut(&Snapshot) -> anyhow::Result<()>,
{
    fn apply(&mut self, snapshot: &Snapshot) -> anyhow::Result<()> {
        self(snapshot)
    }
}

fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}

/// Writes the snapshot over `work_schema`, then runs `command`.
///
/// Placeholders in command arguments: `{schema}`, `{name}`, `{step}`, `{model}`.
#[derive(Debug, Clone)]
pub struct CommandApplier {
    command: Vec<String>,
    work_schema: PathBuf,
    cwd: Option<PathBuf>,
}

impl CommandApplier {
    pub fn new(command: Vec<String>, work_schema: impl Into<PathBuf>) -> anyhow::Result<Self> {
        if command.is_empty() {
            anyhow::bail!("apply command is empty (set [apply] command in the config)");
        }
        Ok(Self {
            command,
            work_schema: work_schema.into(),
            cwd: None,
        })
    }

    /// Run the command from a specific directory
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn work_schema(&self) -> &Path {
        &self.work_schema
    }

    /// Command line for a snapshot with placeholders filled in
    pub fn expand(&self, snapshot: &Snapshot) -> Vec<String> {
        let schema = self.work_schema.display().to_string();
        let step = snapshot.step.to_string();
        self.command
            .iter()
            .map(|arg| {
                arg.replace("{schema}", &schema)
                    .replace("{name}", &snapshot.name)
                    .replace("{step}", &step)
                    .replace("{model}", &snapshot.model)
            })
            .collect()
    }
}

impl SnapshotApplier for CommandApplier {
    fn apply(&mut self, snapshot: &Snapshot) -> anyhow::Result<()> {
        write_file(&self.work_schema, &snapshot.schema)?;

        let argv = self.expand(snapshot);
        let (program, args) = argv
            .split_first()
            .context("apply command is empty")?;

        tracing::debug!("Running {:?}", argv);
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        let output = cmd
            .output()
            .with_context(|| format!("failed to start `{}`", program))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            tracing::debug!("[{}] {}", snapshot.name, line);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            let tail: Vec<&str> = tail.into_iter().rev().collect();
            anyhow::bail!(
                "`{}` exited with {}{}",
                argv.join(" "),
                output.status,
                if tail.is_empty() {
                    String::new()
                } else {
                    format!(": {}", tail.join(" | "))
                }
            );
        }

        Ok(())
    }
}

/// Writes each snapshot to `<dir>/<name>.<extension>` instead of applying it.
#[derive(Debug, Clone)]
pub struct DirectoryWriter {
    dir: PathBuf,
    extension: String,
    written: Vec<PathBuf>,
}

impl DirectoryWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: "schema".to_string(),
            written: Vec::new(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Files written so far, in order
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn path_for(&self, snapshot: &Snapshot) -> PathBuf {
        self.dir
            .join(format!("{}.{}", snapshot.name, self.extension))
    }
}

impl SnapshotApplier for DirectoryWriter {
    fn apply(&mut self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let path = self.path_for(snapshot);
        write_file(&path, &snapshot.schema)?;
        self.written.push(path);
        Ok(())
    }
}
