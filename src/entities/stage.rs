// 🗓️ Audit Stage - one row of an audit's work plan
//
// Purely descriptive: dates and status are recorded, never scheduled.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::coded_enum;

coded_enum! {
    pub enum AuditStageStatus {
        NotStarted => ("Não Iniciada", "Not Started"),
        InProgress => ("Em Andamento", "In Progress"),
        Completed => ("Concluída", "Completed"),
        Delayed => ("Atrasada", "Delayed"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStage {
    #[serde(default)]
    pub id: String,

    pub audit_id: String,
    pub name: String,
    pub planned_start_date: NaiveDate,
    pub planned_end_date: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_start_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_end_date: Option<NaiveDate>,

    pub status: AuditStageStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsible: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AuditStage {
    pub fn new(audit_id: &str, name: &str, planned_start_date: NaiveDate, planned_end_date: NaiveDate) -> Self {
        AuditStage {
            id: String::new(),
            audit_id: audit_id.to_string(),
            name: name.to_string(),
            planned_start_date,
            planned_end_date,
            actual_start_date: None,
            actual_end_date: None,
            status: AuditStageStatus::NotStarted,
            responsible: None,
            notes: None,
        }
    }

    /// Planned duration in days, inclusive of both ends.
    pub fn planned_days(&self) -> i64 {
        (self.planned_end_date - self.planned_start_date).num_days() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planned_days_inclusive() {
        let stage = AuditStage::new(
            "aud-1",
            "Fieldwork",
            NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 8, 10).unwrap(),
        );
        assert_eq!(stage.planned_days(), 10);
        assert_eq!(stage.status, AuditStageStatus::NotStarted);
    }
}
