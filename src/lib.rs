// GestAudit - Municipal Audit Management - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod entities;       // Entity Models - one per table
pub mod data;           // AppData snapshot + foreign-key scopes
pub mod db;             // SQLite persistence
pub mod store;          // Connection + snapshot + selection
pub mod report;         // Report section assembly
pub mod summary;        // Dashboard, annual report, plan, risk summary
pub mod export;         // JSON backup, CSV exports
pub mod seed;           // Demo dataset
pub mod config;         // figment configuration

// Re-export commonly used types
pub use error::AuditError;
pub use entities::*;
pub use data::{AppData, CascadeImpact, RecordRef};
pub use db::{
    setup_database, load_all, replace_all, delete_record, count_rows,
    save_institution, save_audit, save_finding, save_recommendation,
    save_stage, save_risk, save_section, save_profile, get_profile,
};
pub use store::{AuditStore, Selection};
pub use report::{
    assemble_sections, AuditReport, Section, SectionContent, SectionKind,
    RiskMatrixView, MatrixCell, FindingBlock, format_date, format_opt_date,
};
pub use summary::{AnnualPlan, AnnualSummary, DashboardStats, PlanEntry, RiskRow, RiskSummary, StatusCount};
pub use export::{
    export_json, parse_backup, read_backup, audit_csv, annual_csv, risks_csv,
    CsvExport, BACKUP_FILE_NAME,
};
pub use config::{AppConfig, ConfigError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
