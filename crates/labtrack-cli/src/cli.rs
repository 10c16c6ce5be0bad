//! CLI argument definitions for the lab tracker.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use labtrack_core::ControlPlacement;
use labtrack_model::{
    BatchKind, BatchNumber, CaseNumber, CaseStatus, ClientCategory, ControlType, LabNumber,
    Relation, WellPosition, WorkflowState,
};

#[derive(Parser)]
#[command(
    name = "labtrack",
    version,
    about = "DNA lab tracker - cases, samples, plates and batches",
    long_about = "Track DNA-testing cases and samples through PCR and electrophoresis.\n\n\
                  Registers families, allocates 96-well plates with controls, commits\n\
                  batches and moves samples through the workflow."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (default: ./labtrack.toml when present).
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Store file; overrides `[store] path` from the config.
    #[arg(long = "store", value_name = "PATH", global = true)]
    pub store: Option<PathBuf>,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Include donor names in log output.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Register, inspect and update cases.
    #[command(subcommand)]
    Case(CaseCommand),

    /// Add, list and move samples.
    #[command(subcommand)]
    Sample(SampleCommand),

    /// Show sample counts per workflow stage.
    Queue(QueueArgs),

    /// Allocate plates.
    #[command(subcommand)]
    Plate(PlateCommand),

    /// Inspect and complete batches.
    #[command(subcommand)]
    Batch(BatchCommand),
}

#[derive(Subcommand)]
pub enum CaseCommand {
    /// Create a case, optionally registering its family members.
    Create(CaseCreateArgs),
    /// Show a case and its samples.
    Show {
        #[arg(value_name = "CASE_NUMBER")]
        case_number: CaseNumber,
    },
    /// Change a case's status or comment.
    Update(CaseUpdateArgs),
}

#[derive(Args)]
pub struct CaseCreateArgs {
    /// Client category (paternity, legal, urgent, peace_of_mind).
    #[arg(long = "category")]
    pub category: ClientCategory,

    /// Submission date (YYYY-MM-DD); defaults to today.
    #[arg(long = "submitted")]
    pub submitted_on: Option<NaiveDate>,

    /// The mother is not taking part.
    #[arg(long = "no-mother")]
    pub no_mother: bool,

    #[arg(long = "comment")]
    pub comment: Option<String>,

    /// Family member to register, e.g. `child` or `"alleged father"`.
    /// Repeatable; lab numbers are assigned in family order.
    #[arg(long = "member", value_name = "RELATION")]
    pub members: Vec<Relation>,
}

#[derive(Args)]
pub struct CaseUpdateArgs {
    #[arg(value_name = "CASE_NUMBER")]
    pub case_number: CaseNumber,

    /// New status (active, on_hold, completed, cancelled); unchanged when omitted.
    #[arg(long = "status")]
    pub status: Option<CaseStatus>,

    /// New comment; an empty string clears it.
    #[arg(long = "comment")]
    pub comment: Option<String>,
}

#[derive(Subcommand)]
pub enum SampleCommand {
    /// Add one sample to an existing case.
    Add(SampleAddArgs),
    /// List samples of a case or in a workflow stage.
    List(SampleListArgs),
    /// Move samples to a workflow stage.
    Transition(TransitionArgs),
    /// Cancel a sample, keeping its record.
    Cancel {
        #[arg(value_name = "LAB_NUMBER")]
        lab_number: LabNumber,
        #[arg(long = "reason")]
        reason: Option<String>,
    },
    /// Show the transition history of a sample.
    History {
        #[arg(value_name = "LAB_NUMBER")]
        lab_number: LabNumber,
    },
}

#[derive(Args)]
pub struct SampleAddArgs {
    #[arg(long = "case", value_name = "CASE_NUMBER")]
    pub case_number: CaseNumber,

    #[arg(long = "relation")]
    pub relation: Relation,

    /// Lab number obtained beforehand; allocated when omitted.
    #[arg(long = "lab-number")]
    pub lab_number: Option<LabNumber>,

    /// Donor name (personal data).
    #[arg(long = "donor")]
    pub donor_name: Option<String>,

    #[arg(long = "collected")]
    pub collected_on: Option<NaiveDate>,
}

#[derive(Args)]
pub struct SampleListArgs {
    #[arg(long = "case", value_name = "CASE_NUMBER", conflicts_with = "state")]
    pub case_number: Option<CaseNumber>,

    #[arg(long = "state", required_unless_present = "case_number")]
    pub state: Option<WorkflowState>,
}

#[derive(Args)]
pub struct TransitionArgs {
    /// Target stage, e.g. `pcr_ready`.
    #[arg(value_name = "STATE")]
    pub state: WorkflowState,

    #[arg(value_name = "LAB_NUMBER", required = true)]
    pub lab_numbers: Vec<LabNumber>,
}

#[derive(Args)]
pub struct QueueArgs {
    /// Also list the samples waiting in this stage.
    #[arg(long = "state")]
    pub state: Option<WorkflowState>,
}

#[derive(Subcommand)]
pub enum PlateCommand {
    /// Lay out samples on a plate, optionally committing it as a batch.
    Allocate(PlateAllocateArgs),
}

#[derive(Args)]
pub struct PlateAllocateArgs {
    /// Samples to auto-fill, in order.
    #[arg(value_name = "LAB_NUMBER")]
    pub lab_numbers: Vec<LabNumber>,

    /// Samples placed contiguously from `--anchor`.
    #[arg(long = "group", value_name = "LAB_NUMBER", value_delimiter = ',', requires = "anchor")]
    pub group: Vec<LabNumber>,

    /// First well of the family group.
    #[arg(long = "anchor", value_name = "WELL")]
    pub anchor: Option<WellPosition>,

    /// Control placement `TYPE=WELL` (e.g. `ladder=A01`); replaces the
    /// configured template when given. Repeatable.
    #[arg(long = "control", value_name = "TYPE=WELL", value_parser = parse_control)]
    pub controls: Vec<ControlPlacement>,

    /// Reserve no control wells.
    #[arg(long = "no-controls", conflicts_with = "controls")]
    pub no_controls: bool,

    /// Also fill this column, top to bottom, with `--column-samples`.
    #[arg(long = "fill-column", value_name = "COLUMN", requires = "column_samples")]
    pub fill_column: Option<u8>,

    #[arg(long = "column-samples", value_name = "LAB_NUMBER", value_delimiter = ',')]
    pub column_samples: Vec<LabNumber>,

    /// Write the well map as JSON.
    #[arg(long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Print the layout as plain text instead of a table.
    #[arg(long = "plain")]
    pub plain: bool,

    #[command(flatten)]
    pub commit: CommitArgs,
}

#[derive(Args)]
pub struct CommitArgs {
    /// Persist the plate as a batch and move its samples.
    #[arg(long = "commit", requires_all = ["batch_number", "operator"])]
    pub commit: bool,

    #[arg(long = "batch-number")]
    pub batch_number: Option<BatchNumber>,

    #[arg(long = "kind", value_enum, default_value = "pcr")]
    pub kind: BatchKindArg,

    #[arg(long = "operator")]
    pub operator: Option<String>,

    #[arg(long = "pcr-date")]
    pub pcr_date: Option<NaiveDate>,

    #[arg(long = "electro-date")]
    pub electro_date: Option<NaiveDate>,

    /// Free-form instrument settings.
    #[arg(long = "settings", default_value = "")]
    pub settings: String,
}

#[derive(Subcommand)]
pub enum BatchCommand {
    /// Show a batch and its plate layout.
    Show {
        #[arg(value_name = "BATCH_NUMBER")]
        batch_number: BatchNumber,
        #[arg(long = "plain")]
        plain: bool,
    },
    /// List all batches.
    List,
    /// Mark a batch completed and advance its samples.
    Complete {
        #[arg(value_name = "BATCH_NUMBER")]
        batch_number: BatchNumber,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum BatchKindArg {
    Pcr,
    Electrophoresis,
    Rerun,
}

impl From<BatchKindArg> for BatchKind {
    fn from(value: BatchKindArg) -> Self {
        match value {
            BatchKindArg::Pcr => BatchKind::Pcr,
            BatchKindArg::Electrophoresis => BatchKind::Electrophoresis,
            BatchKindArg::Rerun => BatchKind::Rerun,
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

fn parse_control(value: &str) -> Result<ControlPlacement, String> {
    let (control, position) = value
        .split_once('=')
        .ok_or_else(|| format!("expected TYPE=WELL, got `{value}`"))?;
    let control: ControlType = control.parse().map_err(|e| format!("{e}"))?;
    let position = WellPosition::parse(position).map_err(|e| format!("{e}"))?;
    Ok(ControlPlacement::new(control, position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_control_pairs() {
        let placement = parse_control("ladder=A01").unwrap();
        assert_eq!(placement.control, ControlType::AllelicLadder);
        assert_eq!(placement.position.to_string(), "A01");
        assert!(parse_control("ladder").is_err());
        assert!(parse_control("ladder=A00").is_err());
    }

    #[test]
    fn commit_requires_batch_details() {
        let parsed = Cli::try_parse_from(["labtrack", "plate", "allocate", "25_1", "--commit"]);
        assert!(parsed.is_err());
        let parsed = Cli::try_parse_from([
            "labtrack",
            "plate",
            "allocate",
            "25_1",
            "25_2",
            "--commit",
            "--batch-number",
            "PCR_0101",
            "--operator",
            "JS",
        ]);
        assert!(parsed.is_ok());
    }
}
