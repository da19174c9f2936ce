// 📤 Export / Import - JSON backup and CSV projections
//
// CSV files open directly in spreadsheet software: UTF-8 BOM, CRLF rows,
// dd/mm/yyyy dates. Enum columns carry the stored codes.

use anyhow::{Context, Result};
use std::path::Path;

use crate::data::AppData;
use crate::error::AuditError;
use crate::report::format_date;
use crate::summary::{risks_of_year, AnnualPlan};

pub const BACKUP_FILE_NAME: &str = "gestaudit_backup.json";

const BOM: &str = "\u{feff}";

/// A generated CSV document with its suggested file name.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvExport {
    pub file_name: String,
    pub content: String,
}

impl CsvExport {
    pub fn write_to(&self, dir: &Path) -> Result<std::path::PathBuf> {
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

// ============================================================================
// JSON BACKUP
// ============================================================================

pub fn export_json(data: &AppData) -> Result<String> {
    serde_json::to_string_pretty(data).context("Failed to serialize backup")
}

/// Parse a backup document. Missing collections default to empty.
pub fn parse_backup(json: &str) -> Result<AppData> {
    serde_json::from_str(json).context("Invalid backup file")
}

pub fn read_backup(path: &Path) -> Result<AppData> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read backup {}", path.display()))?;
    parse_backup(&json)
}

// ============================================================================
// CSV
// ============================================================================

fn build_csv(headers: &[&str], rows: Vec<Vec<String>>) -> Result<String> {
    let mut buf = Vec::new();
    buf.extend_from_slice(BOM.as_bytes());

    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(buf);

    wtr.write_record(headers)?;
    for row in rows {
        wtr.write_record(&row)?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e))?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

/// One row per recommendation of each finding of the audit; a finding
/// without recommendations gets one row with blank recommendation columns.
pub fn audit_csv(data: &AppData, audit_id: &str) -> Result<CsvExport> {
    let audit = data.audit(audit_id).ok_or_else(|| AuditError::NotFound {
        entity: "audit",
        id: audit_id.to_string(),
    })?;

    let mut rows = Vec::new();
    for finding in data.findings_of(audit_id) {
        let recs = data.recommendations_of(&finding.id);
        let base = vec![
            audit.audit_number.clone(),
            audit.title.clone(),
            finding.finding_code.clone(),
            finding.summary.clone(),
        ];

        if recs.is_empty() {
            let mut row = base;
            row.extend(std::iter::repeat(String::new()).take(5));
            rows.push(row);
            continue;
        }

        for rec in recs {
            let mut row = base.clone();
            row.extend([
                rec.recommendation_code.clone(),
                rec.description.clone(),
                rec.status.as_str().to_string(),
                format_date(rec.deadline),
                rec.implementation_responsible.clone(),
            ]);
            rows.push(row);
        }
    }

    Ok(CsvExport {
        file_name: format!("relatorio_auditoria_{}.csv", audit.audit_number),
        content: build_csv(
            &[
                "AuditNumber",
                "AuditTitle",
                "FindingCode",
                "FindingSummary",
                "RecommendationCode",
                "RecommendationDescription",
                "Status",
                "Deadline",
                "Responsible",
            ],
            rows,
        )?,
    })
}

/// Annual report and annual plan share this export.
pub fn annual_csv(data: &AppData, year: i32) -> Result<CsvExport> {
    let rows = AnnualPlan::compute(data, year)
        .entries
        .into_iter()
        .map(|e| {
            vec![
                e.year.to_string(),
                e.audit_number,
                e.title,
                e.audit_type.as_str().to_string(),
                e.status.as_str().to_string(),
                e.priority.as_str().to_string(),
                format_date(e.planned_start_date),
                format_date(e.planned_end_date),
                e.total_findings.to_string(),
                e.total_recommendations.to_string(),
            ]
        })
        .collect();

    Ok(CsvExport {
        file_name: format!("relatorio_anual_{}.csv", year),
        content: build_csv(
            &[
                "Year",
                "AuditNumber",
                "Title",
                "Type",
                "Status",
                "Priority",
                "PlannedStart",
                "PlannedEnd",
                "TotalFindings",
                "TotalRecommendations",
            ],
            rows,
        )?,
    })
}

/// One row per risk of an audit in `year`.
pub fn risks_csv(data: &AppData, year: i32) -> Result<CsvExport> {
    let rows = risks_of_year(data, year)
        .into_iter()
        .map(|row| {
            vec![
                row.audit_number.unwrap_or_else(|| "N/A".to_string()),
                row.risk.description,
                row.risk.impact.as_str().to_string(),
                row.risk.probability.as_str().to_string(),
                row.risk.risk_level.as_str().to_string(),
                row.risk.controls,
            ]
        })
        .collect();

    Ok(CsvExport {
        file_name: format!("resumo_riscos_{}.csv", year),
        content: build_csv(
            &[
                "AuditNumber",
                "RiskDescription",
                "Impact",
                "Probability",
                "RiskLevel",
                "ExistingControls",
            ],
            rows,
        )?,
    })
}
