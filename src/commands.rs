use crate::{OutputMode, emit_success};
use anyhow::Context;
use owo_colors::OwoColorize;
use schemaseq::apply::{CommandApplier, DirectoryWriter, SnapshotApplier};
use schemaseq::config::{self, SchemaseqConfig};
use schemaseq::sequencer::{Sequencer, StepEvent};
use schemaseq::ui::{self, EdgeRow, Icons, Spinner, StepRow, name_list, render_table, theme};
use schemaseq::{backup, SnapshotPlan};
use std::path::{Path, PathBuf};
use std::time::Instant;

fn resolve_schema(settings: &SchemaseqConfig, schema: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    schema
        .or_else(|| settings.schema_path())
        .context("no schema given (use --schema or set `schema` in schemaseq.toml)")
}

fn load_plan(path: &Path) -> anyhow::Result<SnapshotPlan> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let plan = SnapshotPlan::from_source(&source)
        .with_context(|| format!("invalid schema {}", path.display()))?;
    Ok(plan)
}

fn warn(human: bool, message: &str) {
    if human {
        ui::warn(message);
    } else {
        tracing::warn!("{}", message);
    }
}

fn print_warnings(plan: &SnapshotPlan) {
    for warning in plan.warnings() {
        ui::warn(&format!("{} {}", Icons::CYCLE, warning));
    }
}

pub fn run_check(settings: &SchemaseqConfig, schema: Option<PathBuf>, output_mode: OutputMode) -> anyhow::Result<()> {
    let path = resolve_schema(settings, schema)?;
    let plan = load_plan(&path)?;
    let stats = plan.graph().stats();

    if output_mode.is_human() {
        ui::header(&format!("Checked {}", path.display()));
        ui::summary_row("Models:", &plan.schema().model_count().to_string());
        ui::summary_row("Enums:", &plan.schema().enum_count().to_string());
        ui::summary_row("Relations:", &stats.edges.to_string());
        ui::summary_row("Cycle warnings:", &plan.warnings().len().to_string());
        print_warnings(&plan);
        ui::success("Schema is valid");
    } else {
        let data = serde_json::json!({
            "schema": path.display().to_string(),
            "models": plan.schema().model_count(),
            "enums": plan.schema().enum_count(),
            "graph": stats,
            "warnings": plan.warnings(),
        });
        emit_success(output_mode, "check", data)?;
    }
    Ok(())
}

pub fn run_graph(settings: &SchemaseqConfig, schema: Option<PathBuf>, output_mode: OutputMode) -> anyhow::Result<()> {
    let path = resolve_schema(settings, schema)?;
    let plan = load_plan(&path)?;
    let graph = plan.graph();

    if output_mode.is_human() {
        let rows: Vec<EdgeRow> = graph
            .nodes()
            .iter()
            .map(|name| EdgeRow {
                model: name.clone(),
                references: name_list(graph.dependencies(name)),
                referenced_by: name_list(graph.dependents(name)),
            })
            .collect();

        ui::header(&format!("Dependency graph for {}", path.display()));
        println!("{}", render_table(&rows));
        println!("{}", graph.stats());
    } else {
        let edges: Vec<serde_json::Value> = graph
            .edges()
            .map(|(from, to)| serde_json::json!({ "from": from, "to": to }))
            .collect();
        let data = serde_json::json!({
            "models": graph.nodes(),
            "edges": edges,
        });
        emit_success(output_mode, "graph", data)?;
    }
    Ok(())
}

pub fn run_plan(settings: &SchemaseqConfig, schema: Option<PathBuf>, output_mode: OutputMode) -> anyhow::Result<()> {
    let path = resolve_schema(settings, schema)?;
    let plan = load_plan(&path)?;

    if output_mode.is_human() {
        let rows: Vec<StepRow> = plan
            .order()
            .iter()
            .enumerate()
            .map(|(i, model)| StepRow {
                step: i + 1,
                model: model.clone(),
                depends_on: name_list(plan.graph().dependencies(model)),
                migration: schemaseq::snapshot::migration_name(i + 1, model),
            })
            .collect();

        ui::header(&format!("Migration plan for {}", path.display()));
        if rows.is_empty() {
            ui::info("Models", "none, nothing to sequence");
        } else {
            println!("{}", render_table(&rows));
        }
        print_warnings(&plan);
    } else {
        let steps: Vec<serde_json::Value> = plan
            .order()
            .iter()
            .enumerate()
            .map(|(i, model)| {
                serde_json::json!({
                    "step": i + 1,
                    "model": model,
                    "migration": schemaseq::snapshot::migration_name(i + 1, model),
                    "depends_on": plan.graph().dependencies(model).collect::<Vec<_>>(),
                })
            })
            .collect();
        let data = serde_json::json!({
            "steps": steps,
            "warnings": plan.warnings(),
        });
        emit_success(output_mode, "plan", data)?;
    }
    Ok(())
}

pub fn run_snapshots(
    settings: &SchemaseqConfig,
    schema: Option<PathBuf>,
    out: &Path,
    extension: &str,
    output_mode: OutputMode,
) -> anyhow::Result<()> {
    let path = resolve_schema(settings, schema)?;
    let plan = load_plan(&path)?;
    let mut writer = DirectoryWriter::new(out).with_extension(extension);

    if output_mode.is_human() {
        ui::header(&format!("Writing {} snapshot(s) to {}", plan.len(), out.display()));
        print_warnings(&plan);
    }

    for snapshot in plan.snapshots() {
        writer.apply(&snapshot)?;
        if output_mode.is_human() {
            ui::step(snapshot.step, plan.len(), &snapshot.name, &snapshot.model, &snapshot.fingerprint());
        }
    }

    if output_mode.is_human() {
        ui::success(&format!("Wrote {} file(s)", writer.written().len()));
    } else {
        let files: Vec<String> = writer
            .written()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        let data = serde_json::json!({
            "files": files,
            "warnings": plan.warnings(),
        });
        emit_success(output_mode, "snapshots", data)?;
    }
    Ok(())
}

pub struct RunArgs {
    pub schema: Option<PathBuf>,
    pub work_schema: Option<PathBuf>,
    pub migrations_dir: Option<PathBuf>,
    pub backup: bool,
    pub no_backup: bool,
    pub clean: bool,
    pub dry_run: bool,
    pub command: Vec<String>,
}

pub fn run_sequence(settings: &SchemaseqConfig, args: RunArgs, output_mode: OutputMode) -> anyhow::Result<()> {
    let path = resolve_schema(settings, args.schema)?;
    let plan = load_plan(&path)?;
    let work_schema = settings.resolve_work_schema(args.work_schema, &path);
    let command = if args.command.is_empty() {
        settings.apply.command.clone()
    } else {
        args.command
    };

    let mut applier = CommandApplier::new(command, &work_schema)?;
    if let Some(cwd) = &settings.apply.cwd {
        applier = applier.with_cwd(cwd);
    }

    if args.dry_run {
        return dry_run(&plan, &applier, output_mode);
    }

    let human = output_mode.is_human();
    if human {
        ui::header(&format!("Sequencing {} model(s) from {}", plan.len(), path.display()));
    }

    let migrations_dir = args.migrations_dir.or_else(|| settings.migrations_path());
    let do_backup = settings.backup_enabled(args.backup, args.no_backup);
    let do_clean = settings.clean_enabled(args.clean);
    let mut backup_path = None;
    match &migrations_dir {
        Some(dir) => {
            if !do_backup && !do_clean {
                let message = format!(
                    "{} is neither backed up nor cleaned (pass --backup and/or --clean)",
                    dir.display()
                );
                warn(human, &message);
            }
            if do_backup {
                backup_path = backup::backup_dir(dir)?;
                if let Some(target) = backup_path.as_ref().filter(|_| human) {
                    ui::info(&format!("{} Backup", Icons::BACKUP), &target.display().to_string());
                }
            }
            if do_clean {
                let removed = backup::clear_dir(dir)?;
                tracing::info!("Removed {} entr(ies) from {}", removed, dir.display());
            }
        }
        None if args.backup || args.clean => {
            warn(human, "--backup/--clean need a migrations directory (--migrations-dir or `migrations_dir`)");
        }
        None => {}
    }

    // The source schema doubles as the working file unless told otherwise; put it back afterwards.
    let mut sequencer = Sequencer::new();
    if settings.restore || config::same_file(&work_schema, &path) {
        sequencer = sequencer.restore_to(&work_schema);
    }

    if human {
        ui::phase("Applying snapshots");
    }

    let start = Instant::now();
    let total = plan.len();
    let mut spinner: Option<Spinner> = None;

    let report = sequencer.run_with(&plan, &mut applier, |event| {
        if !human {
            return;
        }
        match event {
            StepEvent::Started(snapshot) => {
                spinner = Some(Spinner::new(&format!(
                    "[{}/{}] {}",
                    snapshot.step, total, snapshot.name
                )));
            }
            StepEvent::Applied(step) => {
                if let Some(s) = spinner.take() {
                    s.clear();
                }
                ui::step(step.step, total, &step.name, &step.model, &step.fingerprint);
            }
            StepEvent::Failed { snapshot, .. } => {
                if let Some(s) = spinner.take() {
                    s.finish_with_message(&format!(
                        "{} {}",
                        Icons::CROSS,
                        snapshot.name.style(theme().error.clone())
                    ));
                }
            }
        }
    })?;

    if human {
        for warning in &report.warnings {
            ui::warn(&format!("{} {}", Icons::CYCLE, warning));
        }
        if let Some(restored) = &report.restored {
            ui::info("Restored full schema", &restored.display().to_string());
        }
        ui::finish_with_summary(start.elapsed(), report.steps.len(), report.warnings.len());
    } else {
        let data = serde_json::json!({
            "report": report,
            "backup": backup_path.map(|p| p.display().to_string()),
        });
        emit_success(output_mode, "run", data)?;
    }
    Ok(())
}

fn dry_run(plan: &SnapshotPlan, applier: &CommandApplier, output_mode: OutputMode) -> anyhow::Result<()> {
    let commands: Vec<String> = plan
        .snapshots()
        .map(|snapshot| applier.expand(&snapshot).join(" "))
        .collect();

    if output_mode.is_human() {
        ui::header(&format!("Dry run: {} step(s)", commands.len()));
        for (i, cmd) in commands.iter().enumerate() {
            println!("  {} {}", ui::dim(&format!("{:>3}.", i + 1)), cmd);
        }
        print_warnings(plan);
    } else {
        let data = serde_json::json!({
            "work_schema": applier.work_schema().display().to_string(),
            "commands": commands,
            "warnings": plan.warnings(),
        });
        emit_success(output_mode, "run", data)?;
    }
    Ok(())
}

pub fn run_init(path: &Path, force: bool, output_mode: OutputMode) -> anyhow::Result<()> {
    let config = SchemaseqConfig::example();
    config::write_config(path, &config, force)?;

    if output_mode.is_human() {
        ui::success(&format!("Wrote {}", path.display()));
        ui::info("Next", "edit `schema` and `[apply] command`, then run `schemaseq plan`");
    } else {
        emit_success(output_mode, "init", serde_json::json!({ "path": path.display().to_string() }))?;
    }
    Ok(())
}

pub fn run_version(output_mode: OutputMode) -> anyhow::Result<()> {
    if output_mode.is_human() {
        println!(
            "{} {}",
            "Schemaseq".bold().style(theme().info.clone()),
            format!("Version {}", env!("CARGO_PKG_VERSION")).bold()
        );
    } else {
        let data = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
        });
        emit_success(output_mode, "version", data)?;
    }
    Ok(())
}
