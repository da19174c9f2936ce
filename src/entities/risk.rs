// ⚠️ Risk - impact x probability scoring
//
// risk_level is derived, never edited: every save runs it through
// score_risk, so stored levels always match (impact, probability).

use serde::{Deserialize, Serialize};

use super::coded_enum;

coded_enum! {
    /// Ordinal impact, Insignificant (1) to Catastrophic (5)
    pub enum ImpactLevel {
        Insignificant => ("Insignificante", "Insignificant"),
        Minor => ("Menor", "Minor"),
        Moderate => ("Moderado", "Moderate"),
        Severe => ("Grave", "Severe"),
        Catastrophic => ("Catastrófico", "Catastrophic"),
    }
}

coded_enum! {
    /// Ordinal probability, Rare (1) to Almost Certain (5)
    pub enum ProbabilityLevel {
        Rare => ("Raro", "Rare"),
        Unlikely => ("Improvável", "Unlikely"),
        Possible => ("Possível", "Possible"),
        Probable => ("Provável", "Probable"),
        AlmostCertain => ("Quase Certo", "Almost Certain"),
    }
}

coded_enum! {
    pub enum RiskLevel {
        Low => ("Baixo", "Low"),
        Moderate => ("Moderado", "Moderate"),
        High => ("Alto", "High"),
        Extreme => ("Extremo", "Extreme"),
    }
}

impl ImpactLevel {
    pub fn weight(&self) -> u8 {
        match self {
            ImpactLevel::Insignificant => 1,
            ImpactLevel::Minor => 2,
            ImpactLevel::Moderate => 3,
            ImpactLevel::Severe => 4,
            ImpactLevel::Catastrophic => 5,
        }
    }
}

impl ProbabilityLevel {
    pub fn weight(&self) -> u8 {
        match self {
            ProbabilityLevel::Rare => 1,
            ProbabilityLevel::Unlikely => 2,
            ProbabilityLevel::Possible => 3,
            ProbabilityLevel::Probable => 4,
            ProbabilityLevel::AlmostCertain => 5,
        }
    }
}

impl RiskLevel {
    /// Sort rank for "most severe first" listings (Extreme = 0).
    pub fn severity_rank(&self) -> u8 {
        match self {
            RiskLevel::Extreme => 0,
            RiskLevel::High => 1,
            RiskLevel::Moderate => 2,
            RiskLevel::Low => 3,
        }
    }

    /// High and Extreme risks are listed separately in reports.
    pub fn is_high_priority(&self) -> bool {
        match self {
            RiskLevel::Extreme | RiskLevel::High => true,
            RiskLevel::Moderate | RiskLevel::Low => false,
        }
    }
}

/// Score = impact weight x probability weight (1..=25).
pub fn risk_score(impact: ImpactLevel, probability: ProbabilityLevel) -> u8 {
    impact.weight() * probability.weight()
}

/// Map (impact, probability) to its risk bucket.
///
/// Thresholds are checked high to low: >= 15 Extreme, >= 8 High,
/// >= 4 Moderate, otherwise Low.
pub fn score_risk(impact: ImpactLevel, probability: ProbabilityLevel) -> RiskLevel {
    let score = risk_score(impact, probability);

    if score >= 15 {
        RiskLevel::Extreme
    } else if score >= 8 {
        RiskLevel::High
    } else if score >= 4 {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Risk {
    #[serde(default)]
    pub id: String,

    pub audit_id: String,
    pub description: String,
    pub impact: ImpactLevel,
    pub probability: ProbabilityLevel,

    /// Derived from impact/probability; whatever a client sends is replaced.
    #[serde(default = "default_level")]
    pub risk_level: RiskLevel,

    /// Existing controls
    pub controls: String,
}

fn default_level() -> RiskLevel {
    RiskLevel::Low
}

impl Risk {
    pub fn new(
        audit_id: &str,
        description: &str,
        impact: ImpactLevel,
        probability: ProbabilityLevel,
        controls: &str,
    ) -> Self {
        Risk {
            id: String::new(),
            audit_id: audit_id.to_string(),
            description: description.to_string(),
            impact,
            probability,
            risk_level: score_risk(impact, probability),
            controls: controls.to_string(),
        }
    }

    /// Recompute risk_level from the current impact/probability.
    pub fn rescore(&mut self) {
        self.risk_level = score_risk(self.impact, self.probability);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ImpactLevel as I;
    use ProbabilityLevel as P;
    use RiskLevel::*;

    #[test]
    fn test_score_all_25_pairs() {
        // Rows: impact Insignificant..Catastrophic, columns: Rare..AlmostCertain
        let expected = [
            [Low, Low, Low, Moderate, Moderate],
            [Low, Moderate, Moderate, High, High],
            [Low, Moderate, High, High, Extreme],
            [Moderate, High, High, Extreme, Extreme],
            [Moderate, High, Extreme, Extreme, Extreme],
        ];

        for (row, impact) in I::ALL.iter().enumerate() {
            for (col, probability) in P::ALL.iter().enumerate() {
                assert_eq!(
                    score_risk(*impact, *probability),
                    expected[row][col],
                    "{:?} x {:?}",
                    impact,
                    probability
                );
            }
        }
    }

    #[test]
    fn test_documented_examples() {
        assert_eq!(risk_score(I::Catastrophic, P::AlmostCertain), 25);
        assert_eq!(score_risk(I::Catastrophic, P::AlmostCertain), Extreme);

        assert_eq!(risk_score(I::Insignificant, P::Rare), 1);
        assert_eq!(score_risk(I::Insignificant, P::Rare), Low);

        assert_eq!(risk_score(I::Moderate, P::Possible), 9);
        assert_eq!(score_risk(I::Moderate, P::Possible), High);
    }

    #[test]
    fn test_threshold_boundaries() {
        // 4 -> Moderate, 3 -> Low
        assert_eq!(score_risk(I::Minor, P::Unlikely), Moderate);
        assert_eq!(score_risk(I::Moderate, P::Rare), Low);
        // 8 -> High, 6 -> Moderate
        assert_eq!(score_risk(I::Severe, P::Unlikely), High);
        assert_eq!(score_risk(I::Minor, P::Possible), Moderate);
        // 15 -> Extreme, 12 -> High
        assert_eq!(score_risk(I::Catastrophic, P::Possible), Extreme);
        assert_eq!(score_risk(I::Severe, P::Possible), High);
    }

    #[test]
    fn test_client_supplied_level_is_replaced() {
        let json = r#"{
            "id": "r1", "auditId": "1", "description": "Unauthorized payments",
            "impact": "Catastrófico", "probability": "Provável",
            "riskLevel": "Baixo", "controls": "Dual approval"
        }"#;
        let mut risk: Risk = serde_json::from_str(json).unwrap();
        assert_eq!(risk.risk_level, Low);

        risk.rescore();
        assert_eq!(risk.risk_level, Extreme);
    }

    #[test]
    fn test_severity_rank_orders_extreme_first() {
        let mut levels = vec![Low, High, Extreme, Moderate];
        levels.sort_by_key(|l| l.severity_rank());
        assert_eq!(levels, vec![Extreme, High, Moderate, Low]);
        assert!(High.is_high_priority());
        assert!(!Moderate.is_high_priority());
    }
}
