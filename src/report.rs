// 📄 Audit Report - section assembly and plain-text rendering
//
// A report is an ordered list of sections keyed by sequence:
//   100 Objective, 200 Scope, 300 Criteria   (from the audit, read-only)
//   500 Risk Matrix                          (optional, read-only)
//   999 Findings and Recommendations         (read-only, see assemble_sections)
//   anything else                            (user-authored, editable)

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;

use crate::data::AppData;
use crate::entities::*;
use crate::error::AuditError;

pub const OBJECTIVE_ID: &str = "audit-objective";
pub const SCOPE_ID: &str = "audit-scope";
pub const CRITERIA_ID: &str = "audit-criteria";
pub const RISK_MATRIX_ID: &str = "risk-matrix";
pub const FINDINGS_ID: &str = "findings-recs";

pub const OBJECTIVE_SEQUENCE: i64 = 100;
pub const SCOPE_SEQUENCE: i64 = 200;
pub const CRITERIA_SEQUENCE: i64 = 300;
pub const RISK_MATRIX_SEQUENCE: i64 = 500;
pub const FINDINGS_SEQUENCE: i64 = 999;

const NOT_SPECIFIED: &str = "Not specified.";

/// dd/mm/yyyy, the format used in every report and export.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

pub fn format_opt_date(date: Option<NaiveDate>) -> String {
    date.map(format_date).unwrap_or_else(|| "N/A".to_string())
}

// ============================================================================
// SECTION MODEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKind {
    Objective,
    Scope,
    Criteria,
    RiskMatrix,
    Findings,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixCell {
    pub impact: ImpactLevel,
    pub probability: ProbabilityLevel,
    pub level: RiskLevel,
    pub count: usize,
}

/// 5x5 grid, rows from Catastrophic down to Insignificant, columns
/// from Rare to Almost Certain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMatrixView {
    pub rows: Vec<Vec<MatrixCell>>,
    /// High and Extreme risks, Extreme first
    pub high_priority: Vec<Risk>,
}

impl RiskMatrixView {
    pub fn build(risks: &[&Risk]) -> Self {
        let rows = ImpactLevel::ALL
            .iter()
            .rev()
            .map(|&impact| {
                ProbabilityLevel::ALL
                    .iter()
                    .map(|&probability| MatrixCell {
                        impact,
                        probability,
                        level: score_risk(impact, probability),
                        count: risks
                            .iter()
                            .filter(|r| r.impact == impact && r.probability == probability)
                            .count(),
                    })
                    .collect()
            })
            .collect();

        // Levels come from impact/probability, never from the stored field
        let mut high_priority: Vec<Risk> = risks
            .iter()
            .map(|r| {
                let mut risk = (*r).clone();
                risk.rescore();
                risk
            })
            .filter(|r| r.risk_level.is_high_priority())
            .collect();
        // sort_by_key is stable: equal levels keep input order
        high_priority.sort_by_key(|r| r.risk_level.severity_rank());

        RiskMatrixView { rows, high_priority }
    }

    pub fn total(&self) -> usize {
        self.rows.iter().flatten().map(|c| c.count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingBlock {
    pub finding: Finding,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum SectionContent {
    Text(String),
    RiskMatrix(RiskMatrixView),
    Findings(Vec<FindingBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub kind: SectionKind,
    pub title: String,
    pub sequence: i64,
    pub content: SectionContent,
}

impl Section {
    /// Generated sections cannot be edited or deleted.
    pub fn is_read_only(&self) -> bool {
        self.kind != SectionKind::Custom
    }

    fn fixed(id: &str, kind: SectionKind, title: &str, sequence: i64, text: Option<&str>) -> Self {
        let text = text.filter(|t| !t.is_empty()).unwrap_or(NOT_SPECIFIED);
        Section {
            id: id.to_string(),
            kind,
            title: title.to_string(),
            sequence,
            content: SectionContent::Text(text.to_string()),
        }
    }
}

// ============================================================================
// ASSEMBLY
// ============================================================================

/// Build the ordered section list for one audit.
///
/// The inputs may hold records of other audits; only the audit's own are
/// used. The findings section is added when the audit has findings, or when
/// nothing besides the three fixed sections was added (so an empty report
/// still says "no findings"). With a risk matrix or custom sections and no
/// findings it is left out.
pub fn assemble_sections(
    audit: &Audit,
    custom_sections: &[CustomReportSection],
    findings: &[Finding],
    recommendations: &[Recommendation],
    risks: &[Risk],
    include_risk_matrix: bool,
) -> Vec<Section> {
    let mut sections = vec![
        Section::fixed(
            OBJECTIVE_ID,
            SectionKind::Objective,
            "Audit Objective",
            OBJECTIVE_SEQUENCE,
            audit.objective.as_deref(),
        ),
        Section::fixed(
            SCOPE_ID,
            SectionKind::Scope,
            "Audit Scope",
            SCOPE_SEQUENCE,
            audit.scope.as_deref(),
        ),
        Section::fixed(
            CRITERIA_ID,
            SectionKind::Criteria,
            "Audit Criteria",
            CRITERIA_SEQUENCE,
            audit.criteria.as_deref(),
        ),
    ];

    sections.extend(
        custom_sections
            .iter()
            .filter(|s| s.audit_id == audit.id)
            .map(|s| Section {
                id: s.id.clone(),
                kind: SectionKind::Custom,
                title: s.title.clone(),
                sequence: s.sequence,
                content: SectionContent::Text(s.content.clone()),
            }),
    );

    if include_risk_matrix {
        let audit_risks: Vec<&Risk> = risks.iter().filter(|r| r.audit_id == audit.id).collect();
        sections.push(Section {
            id: RISK_MATRIX_ID.to_string(),
            kind: SectionKind::RiskMatrix,
            title: "Risk Matrix".to_string(),
            sequence: RISK_MATRIX_SEQUENCE,
            content: SectionContent::RiskMatrix(RiskMatrixView::build(&audit_risks)),
        });
    }

    let audit_findings: Vec<&Finding> = findings.iter().filter(|f| f.audit_id == audit.id).collect();
    if !audit_findings.is_empty() || sections.len() == 3 {
        let finding_ids: HashSet<&str> = audit_findings.iter().map(|f| f.id.as_str()).collect();
        let blocks = audit_findings
            .iter()
            .map(|f| FindingBlock {
                finding: (*f).clone(),
                recommendations: recommendations
                    .iter()
                    .filter(|r| r.finding_id == f.id && finding_ids.contains(r.finding_id.as_str()))
                    .cloned()
                    .collect(),
            })
            .collect();

        sections.push(Section {
            id: FINDINGS_ID.to_string(),
            kind: SectionKind::Findings,
            title: "Findings and Recommendations".to_string(),
            sequence: FINDINGS_SEQUENCE,
            content: SectionContent::Findings(blocks),
        });
    }

    sections.sort_by_key(|s| s.sequence);
    sections
}

// ============================================================================
// FULL REPORT
// ============================================================================

/// An assembled report with the header data it is rendered with.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub audit: Audit,
    pub institution: Option<Institution>,
    pub sections: Vec<Section>,
    pub profile: AuditorProfile,
}

impl AuditReport {
    pub fn build(data: &AppData, audit_id: &str, include_risk_matrix: bool) -> Result<Self> {
        let audit = data.audit(audit_id).ok_or_else(|| AuditError::NotFound {
            entity: "audit",
            id: audit_id.to_string(),
        })?;

        let sections = assemble_sections(
            audit,
            &data.custom_report_sections,
            &data.findings,
            &data.recommendations,
            &data.risks,
            include_risk_matrix,
        );

        Ok(AuditReport {
            audit: audit.clone(),
            institution: data.institution(&audit.institution_id).cloned(),
            sections,
            profile: data.profile.clone(),
        })
    }

    /// Plain-text rendering with numbered section headings.
    pub fn render_text(&self) -> String {
        let a = &self.audit;
        let mut out = String::new();

        out.push_str("AUDIT REPORT\n");
        out.push_str("============\n");
        if let Some(inst) = &self.institution {
            out.push_str(&format!("Institution:    {}\n", inst.display_name()));
        }
        out.push_str(&format!("Audit:          {} - {}\n", a.audit_number, a.title));
        out.push_str(&format!(
            "Sector:         {} (responsible: {})\n",
            a.audited_sector, a.sector_responsible
        ));
        out.push_str(&format!("Type:           {}\n", a.audit_type));
        out.push_str(&format!("Status:         {}\n", a.status));
        out.push_str(&format!("Priority:       {}\n", a.priority));
        out.push_str(&format!(
            "Planned period: {} to {}\n",
            format_date(a.planned_start_date),
            format_date(a.planned_end_date)
        ));

        for (n, section) in self.sections.iter().enumerate() {
            let heading = format!("{}. {}", n + 1, section.title);
            out.push('\n');
            out.push_str(&heading);
            out.push('\n');
            out.push_str(&"-".repeat(heading.chars().count()));
            out.push('\n');

            match &section.content {
                SectionContent::Text(text) => {
                    out.push_str(text);
                    out.push('\n');
                }
                SectionContent::RiskMatrix(matrix) => render_matrix(&mut out, matrix),
                SectionContent::Findings(blocks) => render_findings(&mut out, blocks),
            }
        }

        if let Some(signature) = self.profile.signature_block() {
            out.push_str("\n\n");
            out.push_str(&signature);
            out.push('\n');
        }

        out
    }
}

impl RiskMatrixView {
    /// The matrix table on its own, as printed inside a report.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        render_matrix(&mut out, self);
        out
    }
}

fn render_matrix(out: &mut String, matrix: &RiskMatrixView) {
    out.push_str(&format!("{:<14}", "Impact"));
    for p in ProbabilityLevel::ALL {
        out.push_str(&format!("{:<16}", p.label()));
    }
    out.push('\n');

    for row in &matrix.rows {
        if let Some(first) = row.first() {
            out.push_str(&format!("{:<14}", first.impact.label()));
        }
        for cell in row {
            out.push_str(&format!("{:<16}", format!("{} ({})", cell.level, cell.count)));
        }
        out.push('\n');
    }

    out.push_str(&format!("\nRisks assessed: {}\n", matrix.total()));
    if matrix.high_priority.is_empty() {
        out.push_str("No high or extreme risks.\n");
    } else {
        out.push_str("High and extreme risks:\n");
        for risk in &matrix.high_priority {
            out.push_str(&format!("  [{}] {}\n", risk.risk_level, risk.description));
            if !risk.controls.is_empty() {
                out.push_str(&format!("      Controls: {}\n", risk.controls));
            }
        }
    }
}

fn render_findings(out: &mut String, blocks: &[FindingBlock]) {
    if blocks.is_empty() {
        out.push_str("No findings recorded for this audit.\n");
        return;
    }

    for block in blocks {
        let f = &block.finding;
        out.push_str(&format!(
            "\n{} - {} [{}, {}]\n",
            f.finding_code, f.summary, f.classification, f.status
        ));
        for (label, value) in [
            ("Evidence", &f.evidence),
            ("Violated criteria", &f.violated_criteria),
            ("Cause", &f.cause),
            ("Effect", &f.effect),
        ] {
            if !value.is_empty() {
                out.push_str(&format!("  {}: {}\n", label, value));
            }
        }
        if !f.attachments.is_empty() {
            let names: Vec<&str> = f.attachments.iter().map(|a| a.name.as_str()).collect();
            out.push_str(&format!("  Attachments: {}\n", names.join(", ")));
        }

        if block.recommendations.is_empty() {
            out.push_str("  No recommendations.\n");
        } else {
            out.push_str("  Recommendations:\n");
            for r in &block.recommendations {
                out.push_str(&format!(
                    "    {} - {} (responsible: {}, deadline: {}, status: {})\n",
                    r.recommendation_code,
                    r.description,
                    r.implementation_responsible,
                    format_date(r.deadline),
                    r.status
                ));
            }
        }
    }
}
