// Command-line definitions for the `gestaudit` binary

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use gestaudit::{
    AuditStageStatus, AuditStatus, AuditType, FindingStatus, ImpactLevel, InstitutionType, Priority,
    ProbabilityLevel, RecommendationStatus,
};

/// Top-level CLI parser.
#[derive(Debug, Parser)]
#[command(name = "gestaudit", version, about = "GestAudit - municipal audit management")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database file (overrides database.path from the config)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file (defaults to ./gestaudit.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the database and its tables.
    Init,
    /// Load the demo dataset into an empty database.
    Seed,
    #[command(subcommand)]
    Institution(InstitutionCommands),
    #[command(subcommand)]
    Audit(AuditCommands),
    #[command(subcommand)]
    Finding(FindingCommands),
    #[command(subcommand)]
    Recommendation(RecommendationCommands),
    /// Work-plan stages of an audit.
    #[command(subcommand)]
    Stage(StageCommands),
    #[command(subcommand)]
    Risk(RiskCommands),
    /// User-authored report sections.
    #[command(subcommand)]
    Section(SectionCommands),
    #[command(subcommand)]
    Profile(ProfileCommands),
    Report(ReportArgs),
    /// Dashboard statistics.
    Dashboard(DashboardArgs),
    #[command(subcommand)]
    Export(ExportCommands),
    /// Replace all data with a JSON backup.
    Import(ImportArgs),
    /// Interactive terminal UI.
    Ui,
}

/// Target of a delete; dependent records are only removed with --yes.
#[derive(Clone, Debug, Args)]
pub struct DeleteArgs {
    pub id: String,
    /// Confirm deleting dependent records as well
    #[arg(short, long)]
    pub yes: bool,
}

// ============================================================================
// INSTITUTIONS
// ============================================================================

#[derive(Debug, Subcommand)]
pub enum InstitutionCommands {
    Add(InstitutionAddArgs),
    List,
    Delete(DeleteArgs),
}

#[derive(Clone, Debug, Args)]
pub struct InstitutionAddArgs {
    /// Municipality name
    #[arg(long)]
    pub name: String,
    /// Prefeitura / city-hall or Câmara Municipal / city-council
    #[arg(long = "type")]
    pub institution_type: InstitutionType,
    #[arg(long, default_value = "")]
    pub cnpj: String,
}

// ============================================================================
// AUDITS
// ============================================================================

#[derive(Debug, Subcommand)]
pub enum AuditCommands {
    Add(AuditAddArgs),
    Update(AuditUpdateArgs),
    List(AuditListArgs),
    Show { id: String },
    Delete(DeleteArgs),
}

#[derive(Clone, Debug, Args)]
pub struct AuditAddArgs {
    #[arg(long)]
    pub institution: String,
    #[arg(long)]
    pub year: i32,
    #[arg(long)]
    pub number: String,
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub sector: String,
    #[arg(long)]
    pub responsible: String,
    #[arg(long = "type")]
    pub audit_type: AuditType,
    /// YYYY-MM-DD
    #[arg(long)]
    pub start: NaiveDate,
    /// YYYY-MM-DD
    #[arg(long)]
    pub end: NaiveDate,
    #[arg(long, default_value = "Média")]
    pub priority: Priority,
    #[command(flatten)]
    pub text: AuditTextArgs,
}

/// Optional narrative fields of an audit.
#[derive(Clone, Debug, Default, Args)]
pub struct AuditTextArgs {
    #[arg(long)]
    pub objective: Option<String>,
    #[arg(long)]
    pub scope: Option<String>,
    #[arg(long)]
    pub criteria: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct AuditUpdateArgs {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub sector: Option<String>,
    #[arg(long)]
    pub responsible: Option<String>,
    #[arg(long = "type")]
    pub audit_type: Option<AuditType>,
    #[arg(long)]
    pub status: Option<AuditStatus>,
    #[arg(long)]
    pub priority: Option<Priority>,
    #[arg(long)]
    pub start: Option<NaiveDate>,
    #[arg(long)]
    pub end: Option<NaiveDate>,
    #[arg(long)]
    pub actual_start: Option<NaiveDate>,
    #[arg(long)]
    pub actual_end: Option<NaiveDate>,
    #[command(flatten)]
    pub text: AuditTextArgs,
}

#[derive(Clone, Debug, Args)]
pub struct AuditListArgs {
    #[arg(long)]
    pub institution: Option<String>,
    #[arg(long)]
    pub year: Option<i32>,
}

// ============================================================================
// FINDINGS
// ============================================================================

#[derive(Debug, Subcommand)]
pub enum FindingCommands {
    Add(FindingAddArgs),
    Update(FindingUpdateArgs),
    List {
        #[arg(long)]
        audit: String,
    },
    Delete(DeleteArgs),
    /// Attach a file to a finding.
    Attach {
        finding: String,
        file: PathBuf,
    },
    /// Remove an attachment from a finding.
    Detach {
        finding: String,
        attachment: String,
    },
    /// Write an attachment back to disk.
    Extract {
        finding: String,
        attachment: String,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Clone, Debug, Default, Args)]
pub struct FindingTextArgs {
    #[arg(long)]
    pub evidence: Option<String>,
    #[arg(long)]
    pub criteria: Option<String>,
    #[arg(long)]
    pub cause: Option<String>,
    #[arg(long)]
    pub effect: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct FindingAddArgs {
    #[arg(long)]
    pub audit: String,
    #[arg(long)]
    pub code: String,
    #[arg(long)]
    pub summary: String,
    #[arg(long, default_value = "Média")]
    pub classification: Priority,
    #[command(flatten)]
    pub text: FindingTextArgs,
}

#[derive(Clone, Debug, Args)]
pub struct FindingUpdateArgs {
    pub id: String,
    #[arg(long)]
    pub code: Option<String>,
    #[arg(long)]
    pub summary: Option<String>,
    #[arg(long)]
    pub classification: Option<Priority>,
    #[arg(long)]
    pub status: Option<FindingStatus>,
    #[command(flatten)]
    pub text: FindingTextArgs,
}

// ============================================================================
// RECOMMENDATIONS
// ============================================================================

#[derive(Debug, Subcommand)]
pub enum RecommendationCommands {
    Add(RecommendationAddArgs),
    Update(RecommendationUpdateArgs),
    /// List by finding, or every recommendation of an audit.
    List {
        #[arg(long, conflicts_with = "audit", required_unless_present = "audit")]
        finding: Option<String>,
        #[arg(long)]
        audit: Option<String>,
    },
    Delete(DeleteArgs),
}

#[derive(Clone, Debug, Args)]
pub struct RecommendationAddArgs {
    #[arg(long)]
    pub finding: String,
    #[arg(long)]
    pub code: String,
    #[arg(long)]
    pub description: String,
    #[arg(long)]
    pub responsible: String,
    #[arg(long)]
    pub deadline: NaiveDate,
}

#[derive(Clone, Debug, Args)]
pub struct RecommendationUpdateArgs {
    pub id: String,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub responsible: Option<String>,
    #[arg(long)]
    pub deadline: Option<NaiveDate>,
    #[arg(long)]
    pub status: Option<RecommendationStatus>,
    #[arg(long)]
    pub verified_on: Option<NaiveDate>,
}

// ============================================================================
// STAGES
// ============================================================================

#[derive(Debug, Subcommand)]
pub enum StageCommands {
    Add(StageAddArgs),
    Update(StageUpdateArgs),
    List {
        #[arg(long)]
        audit: String,
    },
    Delete(DeleteArgs),
}

#[derive(Clone, Debug, Args)]
pub struct StageAddArgs {
    #[arg(long)]
    pub audit: String,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub start: NaiveDate,
    #[arg(long)]
    pub end: NaiveDate,
    #[arg(long)]
    pub responsible: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct StageUpdateArgs {
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub status: Option<AuditStageStatus>,
    #[arg(long)]
    pub start: Option<NaiveDate>,
    #[arg(long)]
    pub end: Option<NaiveDate>,
    #[arg(long)]
    pub actual_start: Option<NaiveDate>,
    #[arg(long)]
    pub actual_end: Option<NaiveDate>,
    #[arg(long)]
    pub responsible: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
}

// ============================================================================
// RISKS
// ============================================================================

#[derive(Debug, Subcommand)]
pub enum RiskCommands {
    Add(RiskAddArgs),
    Update(RiskUpdateArgs),
    List {
        #[arg(long)]
        audit: String,
    },
    Delete(DeleteArgs),
    /// Print the 5x5 matrix of an audit.
    Matrix { audit: String },
}

#[derive(Clone, Debug, Args)]
pub struct RiskAddArgs {
    #[arg(long)]
    pub audit: String,
    #[arg(long)]
    pub description: String,
    #[arg(long)]
    pub impact: ImpactLevel,
    #[arg(long)]
    pub probability: ProbabilityLevel,
    #[arg(long, default_value = "")]
    pub controls: String,
}

#[derive(Clone, Debug, Args)]
pub struct RiskUpdateArgs {
    pub id: String,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub impact: Option<ImpactLevel>,
    #[arg(long)]
    pub probability: Option<ProbabilityLevel>,
    #[arg(long)]
    pub controls: Option<String>,
}

// ============================================================================
// REPORT SECTIONS
// ============================================================================

#[derive(Debug, Subcommand)]
pub enum SectionCommands {
    Add(SectionAddArgs),
    Update(SectionUpdateArgs),
    List {
        #[arg(long)]
        audit: String,
    },
    Delete(DeleteArgs),
}

#[derive(Clone, Debug, Args)]
pub struct SectionAddArgs {
    #[arg(long)]
    pub audit: String,
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub content: String,
    /// Defaults to one past the highest sequence of the audit
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
    pub sequence: Option<i64>,
}

#[derive(Clone, Debug, Args)]
pub struct SectionUpdateArgs {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub content: Option<String>,
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
    pub sequence: Option<i64>,
}

// ============================================================================
// PROFILE, REPORTS, DASHBOARD, EXPORT
// ============================================================================

#[derive(Debug, Subcommand)]
pub enum ProfileCommands {
    Show,
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        signature: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(subcommand)]
    pub kind: ReportKind,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum ReportKind {
    /// Full report of one audit.
    Audit {
        id: String,
        /// Include the risk-matrix section
        #[arg(long)]
        risk_matrix: bool,
    },
    /// Annual activity report.
    Annual { year: i32 },
    /// Annual audit plan.
    Plan { year: i32 },
    /// Yearly risk summary.
    Risks { year: i32 },
}

#[derive(Debug, Args)]
pub struct DashboardArgs {
    /// Restrict to one institution
    #[arg(long)]
    pub institution: Option<String>,
    /// Reference date (defaults to today)
    #[arg(long)]
    pub today: Option<NaiveDate>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum ExportCommands {
    /// Full JSON backup.
    Json {
        /// Output file
        #[arg(long, default_value = gestaudit::BACKUP_FILE_NAME)]
        out: PathBuf,
    },
    #[command(subcommand)]
    Csv(CsvCommands),
}

#[derive(Debug, Subcommand)]
pub enum CsvCommands {
    Audit {
        id: String,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    Annual {
        year: i32,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    Risks {
        year: i32,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    pub file: PathBuf,
    /// Confirm replacing every record in the database
    #[arg(short, long)]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn enum_arguments_accept_codes_and_labels() {
        let cli = Cli::try_parse_from([
            "gestaudit",
            "risk",
            "add",
            "--audit",
            "1",
            "--description",
            "Late payments",
            "--impact",
            "Catastrófico",
            "--probability",
            "almost-certain",
        ])
        .expect("cli should parse");

        match cli.command {
            Commands::Risk(RiskCommands::Add(args)) => {
                assert_eq!(args.impact, ImpactLevel::Catastrophic);
                assert_eq!(args.probability, ProbabilityLevel::AlmostCertain);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["gestaudit", "dashboard", "--db", "x.db", "-v"]).expect("cli should parse");
        assert_eq!(cli.db, Some(PathBuf::from("x.db")));
        assert!(cli.verbose);
    }

    #[test]
    fn section_sequence_must_be_positive() {
        let parse = |seq: &str| {
            Cli::try_parse_from([
                "gestaudit", "section", "add", "--audit", "1", "--title", "Annex", "--content", "x", "--sequence", seq,
            ])
        };
        assert!(parse("0").is_err());
        assert!(parse("-5").is_err());
        assert!(parse("1").is_ok());

        let update = Cli::try_parse_from(["gestaudit", "section", "update", "crs-1", "--sequence", "0"]);
        assert!(update.is_err());
    }

    #[test]
    fn invalid_dates_are_rejected() {
        let result = Cli::try_parse_from([
            "gestaudit", "stage", "add", "--audit", "1", "--name", "Fieldwork", "--start", "31/01/2024", "--end",
            "2024-02-10",
        ]);
        assert!(result.is_err());
    }
}
