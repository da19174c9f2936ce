// ✅ Recommendation - corrective action attached to a finding

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::coded_enum;

coded_enum! {
    pub enum RecommendationStatus {
        Pending => ("Pendente", "Pending"),
        InProgress => ("Em Andamento", "In Progress"),
        Implemented => ("Implementada", "Implemented"),
        Verified => ("Verificada", "Verified"),
        NotApplicable => ("Não Aplicável", "Not Applicable"),
    }
}

impl RecommendationStatus {
    /// Implemented or verified - no longer tracked against its deadline.
    pub fn is_done(&self) -> bool {
        match self {
            RecommendationStatus::Implemented | RecommendationStatus::Verified => true,
            RecommendationStatus::Pending
            | RecommendationStatus::InProgress
            | RecommendationStatus::NotApplicable => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(default)]
    pub id: String,

    pub finding_id: String,
    pub recommendation_code: String,
    pub description: String,
    pub implementation_responsible: String,
    pub deadline: NaiveDate,
    pub status: RecommendationStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_date: Option<NaiveDate>,
}

impl Recommendation {
    pub fn new(
        finding_id: &str,
        recommendation_code: &str,
        description: &str,
        implementation_responsible: &str,
        deadline: NaiveDate,
    ) -> Self {
        Recommendation {
            id: String::new(),
            finding_id: finding_id.to_string(),
            recommendation_code: recommendation_code.to_string(),
            description: description.to_string(),
            implementation_responsible: implementation_responsible.to_string(),
            deadline,
            status: RecommendationStatus::Pending,
            verification_date: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_done_statuses() {
        assert!(RecommendationStatus::Implemented.is_done());
        assert!(RecommendationStatus::Verified.is_done());
        assert!(!RecommendationStatus::Pending.is_done());
        assert!(!RecommendationStatus::NotApplicable.is_done());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(
            "not-applicable".parse::<RecommendationStatus>().unwrap(),
            RecommendationStatus::NotApplicable
        );
        assert_eq!(
            "Implementada".parse::<RecommendationStatus>().unwrap(),
            RecommendationStatus::Implemented
        );
    }
}
