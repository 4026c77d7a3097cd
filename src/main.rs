//! Schemaseq CLI - sequence schema migrations one model at a time

mod commands;

use clap::{Parser, Subcommand};
use schemaseq::config;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "schemaseq")]
#[command(version)]
#[command(about = "Schema migration sequencer - replay a schema one model at a time in dependency order")]
#[command(long_about = r#"
Schemaseq splits a declarative schema into cumulative snapshots:
  • Models are ordered so referenced models always come first
  • Snapshot N holds every enum plus the first N models
  • Relation fields pointing at models not yet present are held back
  • Each snapshot is handed to your migration tool as one step

Example usage:
  schemaseq plan --schema db/schema.model
  schemaseq snapshots --schema db/schema.model --out snapshots/
  schemaseq run -- migrate-tool dev --schema {schema} --name {name}
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Hide per-step lines and spinners
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit machine-readable JSON instead of human output
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a schema
    Check {
        /// Path to the schema file
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },

    /// Show the model dependency graph
    Graph {
        /// Path to the schema file
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },

    /// Show the migration order
    Plan {
        /// Path to the schema file
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },

    /// Write every cumulative snapshot to a directory
    Snapshots {
        /// Path to the schema file
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = "snapshots")]
        out: PathBuf,

        /// File extension for written snapshots
        #[arg(short, long, default_value = "schema")]
        extension: String,
    },

    /// Apply each snapshot in order with an external command
    Run {
        /// Path to the schema file
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// File each snapshot is written to before the command runs
        #[arg(short, long)]
        work_schema: Option<PathBuf>,

        /// Migrations directory handled by --backup / --clean (or the config)
        #[arg(short, long)]
        migrations_dir: Option<PathBuf>,

        /// Copy the migrations directory aside before running
        #[arg(long, conflicts_with = "no_backup")]
        backup: bool,

        /// Skip the migrations directory backup, even if the config enables it
        #[arg(long)]
        no_backup: bool,

        /// Empty the migrations directory before running
        #[arg(long)]
        clean: bool,

        /// Print the commands without running them
        #[arg(long)]
        dry_run: bool,

        /// Apply command; overrides [apply] command from the config
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Write a starter config file
    Init {
        /// Where to write the config
        #[arg(short, long, default_value = "schemaseq.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(self) -> bool {
        self == OutputMode::Human
    }
}

/// Print the standard JSON envelope for a successful command
pub fn emit_success(mode: OutputMode, command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        let envelope = serde_json::json!({
            "ok": true,
            "command": command,
            "data": data,
        });
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    schemaseq::ui::set_quiet(cli.quiet);
    let output_mode = if cli.json { OutputMode::Json } else { OutputMode::Human };

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();

    if let Err(err) = run(cli, output_mode) {
        if output_mode.is_human() {
            schemaseq::ui::error(&format!("{:#}", err));
        } else {
            let envelope = serde_json::json!({ "ok": false, "error": format!("{:#}", err) });
            println!("{}", envelope);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli, output_mode: OutputMode) -> anyhow::Result<()> {
    let settings = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    match cli.command {
        Commands::Check { schema } => commands::run_check(&settings, schema, output_mode),
        Commands::Graph { schema } => commands::run_graph(&settings, schema, output_mode),
        Commands::Plan { schema } => commands::run_plan(&settings, schema, output_mode),
        Commands::Snapshots { schema, out, extension } => {
            commands::run_snapshots(&settings, schema, &out, &extension, output_mode)
        }
        Commands::Run {
            schema,
            work_schema,
            migrations_dir,
            backup,
            no_backup,
            clean,
            dry_run,
            command,
        } => commands::run_sequence(
            &settings,
            commands::RunArgs {
                schema,
                work_schema,
                migrations_dir,
                backup,
                no_backup,
                clean,
                dry_run,
                command,
            },
            output_mode,
        ),
        Commands::Init { path, force } => commands::run_init(&path, force, output_mode),
        Commands::Version => commands::run_version(output_mode),
    }
}
