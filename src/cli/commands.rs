use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::io::Write;
use std::path::PathBuf;

use crate::cli::error::parse_field_arg;
use crate::cli::{export, output};
use crate::db::DbConnection;
use crate::engine::{self, Outcome, ScanContext};
use crate::models::{StageConfig, FIELD_SLOTS};
use crate::repo::{LedgerRepo, ScanRepo, StageRepo, StationRepo};

#[derive(Parser)]
#[command(name = "prostation")]
#[command(about = "Factory scan-station ledger - validate and record unit scans per stage")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a unit code at the active stage
    Scan {
        /// Unit code (IMEI or similar)
        code: String,
        /// Measurement value, when the stage requires one
        #[arg(short = 'm', long = "measure")]
        measure: Option<String>,
        /// Auxiliary field value as SLOT=VALUE (1-based slot), repeatable
        #[arg(short = 'f', long = "field")]
        fields: Vec<String>,
    },
    /// Stage configuration and selection
    Stage {
        #[command(subcommand)]
        subcommand: StageCommands,
    },
    /// Show or set the employee bound to the active stage
    Employee {
        /// Employee id to bind; omit to show the current binding
        employee_id: Option<String>,
    },
    /// Model/lot selection
    Model {
        #[command(subcommand)]
        subcommand: ModelCommands,
    },
    /// Show scan history, newest first
    History {
        /// Only show scans recorded at this stage
        #[arg(long)]
        stage: Option<u32>,
        /// Maximum number of records
        #[arg(long)]
        limit: Option<usize>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Show unit progress (highest completed stage per code)
    Progress {
        /// Unit code; omit to list every tracked unit
        code: Option<String>,
    },
    /// Show per-stage counters
    Stats {
        /// Stage id; defaults to the active stage
        #[arg(long)]
        stage: Option<u32>,
    },
    /// Export the scan history as a CSV report
    Export {
        /// Output file for the detail report
        file: PathBuf,
        /// Also write a per-model inventory summary
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Clear scan history and progress (configuration is kept)
    Reset {
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum StageCommands {
    /// List all stages
    List,
    /// Switch the active stage
    Use { id: u32 },
    /// Show one stage's configuration (defaults to the active stage)
    Show { id: Option<u32> },
    /// Modify a stage
    Set {
        id: u32,
        #[arg(long)]
        name: Option<String>,
        /// Require a measurement at this stage
        #[arg(long, conflicts_with = "disable_measure")]
        enable_measure: bool,
        #[arg(long)]
        disable_measure: bool,
        #[arg(long)]
        measure_label: Option<String>,
        /// Standard value: numeric = strict upper bound, otherwise exact match
        #[arg(long)]
        standard: Option<String>,
        #[arg(long)]
        label_valid: Option<String>,
        #[arg(long)]
        label_defect: Option<String>,
        #[arg(long)]
        label_error: Option<String>,
    },
    /// Add a new stage with the next free id
    Add { name: String },
    /// Configure one auxiliary field slot (1-based)
    Field {
        id: u32,
        slot: usize,
        /// Field label; an empty label disables the slot
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        default: Option<String>,
        /// Space-separated list of allowed values
        #[arg(long)]
        whitelist: Option<String>,
        #[arg(long)]
        min: Option<String>,
        #[arg(long)]
        max: Option<String>,
        /// Reset the slot to disabled
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand)]
pub enum ModelCommands {
    /// List available models
    List,
    /// Select the model for subsequent scans
    Use { name: String },
    /// Add a model to the available list
    Add { name: String },
    /// Remove a model from the available list
    Remove { name: String },
}

/// Entry point: parse arguments, open the database, dispatch.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let conn = DbConnection::connect()?;

    match cli.command {
        Commands::Scan {
            code,
            measure,
            fields,
        } => handle_scan(&conn, &code, measure.as_deref(), &fields),
        Commands::Stage { subcommand } => handle_stage(&conn, subcommand),
        Commands::Employee { employee_id } => handle_employee(&conn, employee_id.as_deref()),
        Commands::Model { subcommand } => handle_model(&conn, subcommand),
        Commands::History { stage, limit, json } => handle_history(&conn, stage, limit, json),
        Commands::Progress { code } => handle_progress(&conn, code.as_deref()),
        Commands::Stats { stage } => handle_stats(&conn, stage),
        Commands::Export { file, summary } => handle_export(&conn, &file, summary.as_deref()),
        Commands::Reset { yes } => handle_reset(&conn, yes),
    }
}

fn require_stage(conn: &Connection, id: u32) -> Result<StageConfig> {
    StageRepo::get(conn, id)?.with_context(|| format!("Stage {} not found", id))
}

/// Evaluate one attempt against the active stage and commit the outcome.
///
/// A rejection is a recorded business outcome, not a command failure:
/// the record is appended either way and the command exits 0.
fn handle_scan(
    conn: &Connection,
    code: &str,
    measure: Option<&str>,
    field_args: &[String],
) -> Result<()> {
    if code.trim().is_empty() {
        bail!("Scan code cannot be empty");
    }

    let mut overrides = Vec::new();
    for raw in field_args {
        let (slot, value) = parse_field_arg(raw).map_err(|e| anyhow::anyhow!("{}", e))?;
        overrides.push((slot, value));
    }

    let state = StationRepo::load_state(conn)?;
    let stages = StageRepo::list_all(conn)?;
    let stage = stages
        .iter()
        .find(|s| s.id == state.active_stage)
        .with_context(|| format!("Active stage {} is not configured", state.active_stage))?;
    let prior_stage_name = stage
        .id
        .checked_sub(1)
        .and_then(|prior| stages.iter().find(|s| s.id == prior))
        .map(|s| s.name.as_str());

    let attempt =
        engine::attempt_with_defaults(code, measure.unwrap_or(""), stage, &overrides);
    let ledger = LedgerRepo::load(conn)?;
    let ctx = ScanContext {
        stage,
        prior_stage_name,
        model_name: &state.current_model,
        employee_id: state.employee_for(stage.id),
        ledger: &ledger,
    };

    let outcome = engine::evaluate(&attempt, &ctx);
    let history_len = ScanRepo::count(conn)? as usize;
    let applied = engine::apply(&attempt, &ctx, &outcome, history_len);

    // History append and ledger update commit or roll back together
    let tx = conn.unchecked_transaction()?;
    ScanRepo::append(&tx, &applied.record)?;
    if let Some((code, new_stage)) = &applied.ledger_update {
        LedgerRepo::record(&tx, code, *new_stage)?;
    }
    tx.commit()?;

    match &outcome {
        Outcome::Accepted { .. } => {
            println!(
                "{}  {}  (stage {}: {}, seq {})",
                stage.status_labels.valid, applied.record.code, stage.id, stage.name,
                applied.record.seq
            );
        }
        Outcome::Rejected { kind, reason } => {
            println!(
                "{} [{}]: {}",
                stage.status_label(applied.record.status),
                kind.as_str(),
                reason
            );
            println!("Recorded as seq {}.", applied.record.seq);
        }
    }
    Ok(())
}

fn handle_stage(conn: &Connection, command: StageCommands) -> Result<()> {
    match command {
        StageCommands::List => {
            let state = StationRepo::load_state(conn)?;
            let stages = StageRepo::list_all(conn)?;
            for stage in &stages {
                let marker = if stage.id == state.active_stage {
                    " (active)"
                } else {
                    ""
                };
                let measure = if stage.measurement.enabled {
                    format!(", measures {}", stage.measurement.label.trim())
                } else {
                    String::new()
                };
                println!("{}. {}{}{}", stage.id, stage.name, measure, marker);
            }
            Ok(())
        }
        StageCommands::Use { id } => {
            require_stage(conn, id)?;
            StationRepo::set_active_stage(conn, id)?;
            println!("Active stage is now {}.", id);
            Ok(())
        }
        StageCommands::Show { id } => {
            let state = StationRepo::load_state(conn)?;
            let id = id.unwrap_or(state.active_stage);
            let stage = require_stage(conn, id)?;
            output::print_stage(&stage, id == state.active_stage);
            Ok(())
        }
        StageCommands::Set {
            id,
            name,
            enable_measure,
            disable_measure,
            measure_label,
            standard,
            label_valid,
            label_defect,
            label_error,
        } => {
            let mut stage = require_stage(conn, id)?;
            if let Some(name) = name {
                stage.name = name;
            }
            if enable_measure {
                stage.measurement.enabled = true;
            }
            if disable_measure {
                stage.measurement.enabled = false;
            }
            if let Some(label) = measure_label {
                stage.measurement.label = label;
            }
            if let Some(standard) = standard {
                stage.measurement.standard = standard;
            }
            if let Some(label) = label_valid {
                stage.status_labels.valid = label;
            }
            if let Some(label) = label_defect {
                stage.status_labels.defect = label;
            }
            if let Some(label) = label_error {
                stage.status_labels.error = label;
            }
            StageRepo::save(conn, &stage)?;
            println!("Stage {} updated.", id);
            Ok(())
        }
        StageCommands::Add { name } => {
            let id = StageRepo::next_id(conn)?;
            let stage = StageConfig::new(id, name);
            StageRepo::save(conn, &stage)?;
            println!("Added stage {}: {}.", id, stage.name);
            Ok(())
        }
        StageCommands::Field {
            id,
            slot,
            label,
            default,
            whitelist,
            min,
            max,
            clear,
        } => {
            if slot < 1 || slot > FIELD_SLOTS {
                bail!("Field slot must be between 1 and {}", FIELD_SLOTS);
            }
            let mut stage = require_stage(conn, id)?;
            let rule = &mut stage.fields[slot - 1];
            if clear {
                *rule = Default::default();
            }
            if let Some(label) = label {
                rule.label = label;
            }
            if let Some(default) = default {
                rule.default = default;
            }
            if let Some(whitelist) = whitelist {
                rule.whitelist = whitelist;
            }
            if let Some(min) = min {
                rule.min = min;
            }
            if let Some(max) = max {
                rule.max = max;
            }
            StageRepo::save(conn, &stage)?;
            if stage.fields[slot - 1].is_active() {
                println!("Stage {} field {} updated.", id, slot);
            } else {
                println!("Stage {} field {} is disabled.", id, slot);
            }
            Ok(())
        }
    }
}

fn handle_employee(conn: &Connection, employee_id: Option<&str>) -> Result<()> {
    let state = StationRepo::load_state(conn)?;
    let stage = state.active_stage;

    match employee_id {
        Some(id) => {
            let id = id.trim();
            if id.is_empty() {
                bail!("Employee id cannot be empty");
            }
            StationRepo::bind_employee(conn, stage, id)?;
            println!("Stage {} is now operated by {}.", stage, id);
        }
        None => match state.employee_for(stage) {
            Some(id) => println!("Stage {} is operated by {}.", stage, id),
            None => println!(
                "No employee bound to stage {}. Bind one with: prostation employee <ID>",
                stage
            ),
        },
    }
    Ok(())
}

fn handle_model(conn: &Connection, command: ModelCommands) -> Result<()> {
    match command {
        ModelCommands::List => {
            let state = StationRepo::load_state(conn)?;
            let models = StationRepo::list_models(conn)?;
            if models.is_empty() {
                println!("No models configured. Add one with: prostation model add <NAME>");
                return Ok(());
            }
            for model in &models {
                let marker = if *model == state.current_model {
                    " (selected)"
                } else {
                    ""
                };
                println!("{}{}", model, marker);
            }
            Ok(())
        }
        ModelCommands::Use { name } => {
            let models = StationRepo::list_models(conn)?;
            if !models.contains(&name) {
                bail!(
                    "Model '{}' is not in the list. Add it with: prostation model add",
                    name
                );
            }
            StationRepo::set_current_model(conn, &name)?;
            println!("Selected model {}.", name);
            Ok(())
        }
        ModelCommands::Add { name } => {
            let name = name.trim().to_string();
            if name.is_empty() {
                bail!("Model name cannot be empty");
            }
            StationRepo::add_model(conn, &name)?;
            println!("Added model {}.", name);
            Ok(())
        }
        ModelCommands::Remove { name } => {
            if StationRepo::remove_model(conn, &name)? {
                println!("Removed model {}.", name);
            } else {
                bail!("Model '{}' not found", name);
            }
            Ok(())
        }
    }
}

fn handle_history(
    conn: &Connection,
    stage: Option<u32>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let records = ScanRepo::list(conn, stage, limit)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    let stages = StageRepo::list_all(conn)?;
    output::print_history(&records, &stages);
    Ok(())
}

fn handle_progress(conn: &Connection, code: Option<&str>) -> Result<()> {
    let ledger = LedgerRepo::load(conn)?;
    match code {
        Some(code) => {
            let stage = ledger.highest_stage(code);
            if stage == 0 {
                println!("{}: not started", code);
            } else {
                println!("{}: completed stage {}", code, stage);
            }
        }
        None => {
            if ledger.is_empty() {
                println!("No units tracked.");
                return Ok(());
            }
            let mut entries: Vec<(&String, &u32)> = ledger.iter().collect();
            entries.sort();
            for (code, stage) in entries {
                println!("{}: completed stage {}", code, stage);
            }
        }
    }
    Ok(())
}

fn handle_stats(conn: &Connection, stage_id: Option<u32>) -> Result<()> {
    let state = StationRepo::load_state(conn)?;
    let id = stage_id.unwrap_or(state.active_stage);
    let stage = require_stage(conn, id)?;
    let counts = ScanRepo::counts_for_stage(conn, id)?;
    let pending = if id > 1 {
        Some(LedgerRepo::load(conn)?.pending_for(id))
    } else {
        None
    };
    output::print_stats(&stage, counts, pending);
    Ok(())
}

fn handle_export(
    conn: &Connection,
    file: &std::path::Path,
    summary: Option<&std::path::Path>,
) -> Result<()> {
    let records = ScanRepo::list_for_export(conn)?;
    let stages = StageRepo::list_all(conn)?;
    export::write_detail_csv(file, &records, &stages)?;
    println!("Wrote {} records to {}.", records.len(), file.display());
    if let Some(summary) = summary {
        export::write_summary_csv(summary, &records)?;
        println!("Wrote summary to {}.", summary.display());
    }
    Ok(())
}

fn handle_reset(conn: &Connection, yes: bool) -> Result<()> {
    if !yes {
        print!(
            "Clear scan history and unit progress? Stage configuration and \
             employee bindings are kept. [y/N] "
        );
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        let answer = answer.trim().to_lowercase();
        if answer != "y" && answer != "yes" {
            println!("Aborted.");
            return Ok(());
        }
    }
    LedgerRepo::reset_session(conn)?;
    println!("Session data cleared. Configuration kept.");
    Ok(())
}
