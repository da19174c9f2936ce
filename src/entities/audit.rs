// 📋 Audit - one engagement against an institution
//
// Planning text (objective/scope/criteria) feeds the fixed report sections.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::coded_enum;

coded_enum! {
    pub enum AuditType {
        Financial => ("Financeira", "Financial"),
        Compliance => ("Conformidade", "Compliance"),
        Operational => ("Operacional", "Operational"),
        InformationTechnology => ("Tecnologia da Informação", "Information Technology"),
        Systems => ("Sistemas", "Systems"),
        Quality => ("Qualidade", "Quality"),
    }
}

coded_enum! {
    pub enum AuditStatus {
        Planned => ("Planejada", "Planned"),
        InProgress => ("Em Andamento", "In Progress"),
        InAnalysis => ("Em Análise", "In Analysis"),
        ReportIssued => ("Relatório Emitido", "Report Issued"),
        Completed => ("Concluída", "Completed"),
        Postponed => ("Adiada", "Postponed"),
        Canceled => ("Cancelada", "Canceled"),
        Closed => ("Encerrada", "Closed"),
    }
}

coded_enum! {
    /// Shared by audit priority and finding classification
    pub enum Priority {
        High => ("Alta", "High"),
        Medium => ("Média", "Medium"),
        Low => ("Baixa", "Low"),
    }
}

impl AuditStatus {
    /// Statuses charted on the dashboard.
    pub const DASHBOARD: &'static [AuditStatus] = &[
        AuditStatus::Planned,
        AuditStatus::InProgress,
        AuditStatus::Completed,
        AuditStatus::Postponed,
    ];

    pub fn is_finished(&self) -> bool {
        match self {
            AuditStatus::ReportIssued | AuditStatus::Completed | AuditStatus::Closed => true,
            AuditStatus::Planned
            | AuditStatus::InProgress
            | AuditStatus::InAnalysis
            | AuditStatus::Postponed
            | AuditStatus::Canceled => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    #[serde(default)]
    pub id: String,

    pub institution_id: String,
    pub year: i32,
    pub audit_number: String,
    pub title: String,
    pub audited_sector: String,
    pub sector_responsible: String,

    #[serde(rename = "type")]
    pub audit_type: AuditType,

    pub planned_start_date: NaiveDate,
    pub planned_end_date: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_start_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_end_date: Option<NaiveDate>,

    pub status: AuditStatus,
    pub priority: Priority,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auditor_notes: Option<String>,
}

impl Audit {
    /// New audit with the required fields; status starts as Planned.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        institution_id: &str,
        year: i32,
        audit_number: &str,
        title: &str,
        audited_sector: &str,
        sector_responsible: &str,
        audit_type: AuditType,
        planned_start_date: NaiveDate,
        planned_end_date: NaiveDate,
        priority: Priority,
    ) -> Self {
        Audit {
            id: String::new(),
            institution_id: institution_id.to_string(),
            year,
            audit_number: audit_number.to_string(),
            title: title.to_string(),
            audited_sector: audited_sector.to_string(),
            sector_responsible: sector_responsible.to_string(),
            audit_type,
            planned_start_date,
            planned_end_date,
            actual_start_date: None,
            actual_end_date: None,
            status: AuditStatus::Planned,
            priority,
            objective: None,
            scope: None,
            criteria: None,
            auditor_notes: None,
        }
    }
}
