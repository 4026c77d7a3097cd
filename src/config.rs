use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ApplyConfig {
    /// Command run once per snapshot; supports `{schema}`, `{name}`, `{step}`, `{model}`
    #[serde(default)]
    pub command: Vec<String>,
    /// Working directory for the command
    pub cwd: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SchemaseqConfig {
    /// Full schema to sequence
    pub schema: Option<String>,
    /// File each snapshot is written to before applying (defaults to the schema being sequenced)
    pub work_schema: Option<String>,
    pub migrations_dir: Option<String>,
    /// Copy the migrations directory aside before a run
    #[serde(default)]
    pub backup: bool,
    /// Empty the migrations directory before a run
    #[serde(default)]
    pub clean: bool,
    /// Put the full schema back in place once the run ends
    #[serde(default)]
    pub restore: bool,
    #[serde(default)]
    pub apply: ApplyConfig,
}

impl SchemaseqConfig {
    /// Starting point written by `schemaseq init`
    pub fn example() -> Self {
        Self {
            schema: Some("schema/schema.model".to_string()),
            work_schema: None,
            migrations_dir: Some("schema/migrations".to_string()),
            backup: true,
            clean: true,
            restore: true,
            apply: ApplyConfig {
                command: vec![
                    "migrate-tool".to_string(),
                    "dev".to_string(),
                    "--schema".to_string(),
                    "{schema}".to_string(),
                    "--name".to_string(),
                    "{name}".to_string(),
                ],
                cwd: None,
            },
        }
    }

    pub fn schema_path(&self) -> Option<PathBuf> {
        self.schema.as_deref().map(PathBuf::from)
    }

    /// Explicit `work_schema` from the file, without falling back to `schema`
    pub fn work_schema_path(&self) -> Option<PathBuf> {
        self.work_schema.as_deref().map(PathBuf::from)
    }

    /// Where snapshots are written: `--work-schema`, then `work_schema`, then
    /// the schema actually being sequenced (which may come from `--schema`).
    pub fn resolve_work_schema(&self, cli: Option<PathBuf>, schema: &Path) -> PathBuf {
        cli.or_else(|| self.work_schema_path())
            .unwrap_or_else(|| schema.to_path_buf())
    }

    /// `--no-backup` beats everything; `--backup` turns it on without a config
    pub fn backup_enabled(&self, backup_flag: bool, no_backup_flag: bool) -> bool {
        !no_backup_flag && (backup_flag || self.backup)
    }

    pub fn clean_enabled(&self, clean_flag: bool) -> bool {
        clean_flag || self.clean
    }

    pub fn migrations_path(&self) -> Option<PathBuf> {
        self.migrations_dir.as_deref().map(PathBuf::from)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("schemaseq.toml")
}

/// Whether two paths name the same file. Existing files are compared by
/// canonical path; otherwise `.` components are ignored.
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => lexical(a) == lexical(b),
    }
}

fn lexical(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<SchemaseqConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: SchemaseqConfig = toml::from_str(&contents)?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &SchemaseqConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}
