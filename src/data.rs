// 📦 AppData - the full in-memory snapshot of every collection
//
// Loaded in one go after each write (read-your-writes by full refetch).
// Joins between collections are plain filters over these vectors.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::entities::{
    Audit, AuditStage, AuditorProfile, CustomReportSection, Finding, Institution, Recommendation, Risk,
};

/// Every collection, field names matching the backup document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    #[serde(default)]
    pub institutions: Vec<Institution>,
    #[serde(default)]
    pub audits: Vec<Audit>,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub audit_stages: Vec<AuditStage>,
    #[serde(default)]
    pub risks: Vec<Risk>,
    #[serde(default)]
    pub profile: AuditorProfile,
    #[serde(default)]
    pub custom_report_sections: Vec<CustomReportSection>,
}

/// Reference to one stored record, used for deletes and confirmations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRef {
    Institution(String),
    Audit(String),
    Finding(String),
    Recommendation(String),
    Stage(String),
    Risk(String),
    Section(String),
}

impl RecordRef {
    pub fn entity_name(&self) -> &'static str {
        match self {
            RecordRef::Institution(_) => "institution",
            RecordRef::Audit(_) => "audit",
            RecordRef::Finding(_) => "finding",
            RecordRef::Recommendation(_) => "recommendation",
            RecordRef::Stage(_) => "audit stage",
            RecordRef::Risk(_) => "risk",
            RecordRef::Section(_) => "report section",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            RecordRef::Institution(id)
            | RecordRef::Audit(id)
            | RecordRef::Finding(id)
            | RecordRef::Recommendation(id)
            | RecordRef::Stage(id)
            | RecordRef::Risk(id)
            | RecordRef::Section(id) => id,
        }
    }
}

/// Records a delete would remove besides its target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CascadeImpact {
    pub audits: usize,
    pub findings: usize,
    pub recommendations: usize,
    pub stages: usize,
    pub risks: usize,
    pub sections: usize,
}

impl CascadeImpact {
    pub fn total(&self) -> usize {
        self.audits + self.findings + self.recommendations + self.stages + self.risks + self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// "will also delete 1 audit(s), 2 finding(s)" - or an empty string.
    pub fn describe(&self) -> String {
        let parts: Vec<String> = [
            (self.audits, "audit(s)"),
            (self.findings, "finding(s)"),
            (self.recommendations, "recommendation(s)"),
            (self.stages, "work-plan stage(s)"),
            (self.risks, "risk(s)"),
            (self.sections, "report section(s)"),
        ]
        .iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, what)| format!("{} {}", count, what))
        .collect();

        if parts.is_empty() {
            String::new()
        } else {
            format!("will also delete {}", parts.join(", "))
        }
    }
}

impl AppData {
    // ========================================================================
    // LOOKUPS
    // ========================================================================

    pub fn institution(&self, id: &str) -> Option<&Institution> {
        self.institutions.iter().find(|i| i.id == id)
    }

    pub fn audit(&self, id: &str) -> Option<&Audit> {
        self.audits.iter().find(|a| a.id == id)
    }

    pub fn finding(&self, id: &str) -> Option<&Finding> {
        self.findings.iter().find(|f| f.id == id)
    }

    pub fn recommendation(&self, id: &str) -> Option<&Recommendation> {
        self.recommendations.iter().find(|r| r.id == id)
    }

    pub fn stage(&self, id: &str) -> Option<&AuditStage> {
        self.audit_stages.iter().find(|s| s.id == id)
    }

    pub fn risk(&self, id: &str) -> Option<&Risk> {
        self.risks.iter().find(|r| r.id == id)
    }

    pub fn section(&self, id: &str) -> Option<&CustomReportSection> {
        self.custom_report_sections.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, target: &RecordRef) -> bool {
        match target {
            RecordRef::Institution(id) => self.institution(id).is_some(),
            RecordRef::Audit(id) => self.audit(id).is_some(),
            RecordRef::Finding(id) => self.finding(id).is_some(),
            RecordRef::Recommendation(id) => self.recommendation(id).is_some(),
            RecordRef::Stage(id) => self.stage(id).is_some(),
            RecordRef::Risk(id) => self.risk(id).is_some(),
            RecordRef::Section(id) => self.section(id).is_some(),
        }
    }

    // ========================================================================
    // FOREIGN-KEY SCOPES (input order preserved)
    // ========================================================================

    pub fn audits_of(&self, institution_id: &str) -> Vec<&Audit> {
        self.audits.iter().filter(|a| a.institution_id == institution_id).collect()
    }

    pub fn findings_of(&self, audit_id: &str) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.audit_id == audit_id).collect()
    }

    pub fn recommendations_of(&self, finding_id: &str) -> Vec<&Recommendation> {
        self.recommendations.iter().filter(|r| r.finding_id == finding_id).collect()
    }

    /// Recommendations of every finding of an audit.
    pub fn recommendations_for_audit(&self, audit_id: &str) -> Vec<&Recommendation> {
        let finding_ids: HashSet<&str> = self.findings_of(audit_id).iter().map(|f| f.id.as_str()).collect();
        self.recommendations
            .iter()
            .filter(|r| finding_ids.contains(r.finding_id.as_str()))
            .collect()
    }

    pub fn stages_of(&self, audit_id: &str) -> Vec<&AuditStage> {
        self.audit_stages.iter().filter(|s| s.audit_id == audit_id).collect()
    }

    pub fn risks_of(&self, audit_id: &str) -> Vec<&Risk> {
        self.risks.iter().filter(|r| r.audit_id == audit_id).collect()
    }

    pub fn sections_of(&self, audit_id: &str) -> Vec<&CustomReportSection> {
        self.custom_report_sections
            .iter()
            .filter(|s| s.audit_id == audit_id)
            .collect()
    }

    /// Distinct audit years, newest first.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.audits.iter().map(|a| a.year).collect();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();
        years
    }

    /// Copy of the snapshot restricted to one institution's records.
    ///
    /// Institutions other than the given one are dropped; the profile is kept.
    pub fn scoped_to_institution(&self, institution_id: &str) -> AppData {
        let audit_ids: HashSet<&str> = self.audits_of(institution_id).iter().map(|a| a.id.as_str()).collect();
        let finding_ids: HashSet<&str> = self
            .findings
            .iter()
            .filter(|f| audit_ids.contains(f.audit_id.as_str()))
            .map(|f| f.id.as_str())
            .collect();

        AppData {
            institutions: self.institutions.iter().filter(|i| i.id == institution_id).cloned().collect(),
            audits: self.audits.iter().filter(|a| a.institution_id == institution_id).cloned().collect(),
            findings: self
                .findings
                .iter()
                .filter(|f| audit_ids.contains(f.audit_id.as_str()))
                .cloned()
                .collect(),
            recommendations: self
                .recommendations
                .iter()
                .filter(|r| finding_ids.contains(r.finding_id.as_str()))
                .cloned()
                .collect(),
            audit_stages: self
                .audit_stages
                .iter()
                .filter(|s| audit_ids.contains(s.audit_id.as_str()))
                .cloned()
                .collect(),
            risks: self
                .risks
                .iter()
                .filter(|r| audit_ids.contains(r.audit_id.as_str()))
                .cloned()
                .collect(),
            profile: self.profile.clone(),
            custom_report_sections: self
                .custom_report_sections
                .iter()
                .filter(|s| audit_ids.contains(s.audit_id.as_str()))
                .cloned()
                .collect(),
        }
    }

    // ========================================================================
    // CASCADE PREVIEW
    // ========================================================================

    /// Count what deleting `target` would take with it.
    ///
    /// Mirrors the ON DELETE CASCADE chain of the schema, so the numbers
    /// shown in a confirmation prompt match what the database removes.
    pub fn cascade_impact(&self, target: &RecordRef) -> CascadeImpact {
        let audit_ids: Vec<&str> = match target {
            RecordRef::Institution(id) => self.audits_of(id).iter().map(|a| a.id.as_str()).collect(),
            RecordRef::Audit(id) => vec![id.as_str()],
            RecordRef::Finding(id) => {
                return CascadeImpact {
                    recommendations: self.recommendations_of(id).len(),
                    ..CascadeImpact::default()
                };
            }
            RecordRef::Recommendation(_) | RecordRef::Stage(_) | RecordRef::Risk(_) | RecordRef::Section(_) => {
                return CascadeImpact::default();
            }
        };

        let mut impact = CascadeImpact {
            audits: match target {
                RecordRef::Institution(_) => audit_ids.len(),
                _ => 0,
            },
            ..CascadeImpact::default()
        };

        for audit_id in audit_ids {
            let findings = self.findings_of(audit_id);
            impact.findings += findings.len();
            impact.recommendations += findings.iter().map(|f| self.recommendations_of(&f.id).len()).sum::<usize>();
            impact.stages += self.stages_of(audit_id).len();
            impact.risks += self.risks_of(audit_id).len();
            impact.sections += self.sections_of(audit_id).len();
        }

        impact
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::demo_data;

    #[test]
    fn test_scopes_follow_foreign_keys() {
        let data = demo_data();

        assert_eq!(data.audits_of("inst-1").len(), 2);
        assert_eq!(data.findings_of("1").len(), 2);
        assert_eq!(data.recommendations_of("f1").len(), 2);
        assert_eq!(data.recommendations_for_audit("1").len(), 3);
        assert!(data.findings_of("missing").is_empty());
    }

    #[test]
    fn test_years_are_distinct_and_descending() {
        let mut data = demo_data();
        let mut older = data.audits[0].clone();
        older.id = "old".to_string();
        older.year = 2022;
        data.audits.push(older);

        assert_eq!(data.years(), vec![2024, 2023, 2022]);
    }

    #[test]
    fn test_cascade_impact_for_institution() {
        let data = demo_data();
        let impact = data.cascade_impact(&RecordRef::Institution("inst-1".to_string()));

        let audit_ids: Vec<&str> = data.audits_of("inst-1").iter().map(|a| a.id.as_str()).collect();
        let expected_findings: usize = audit_ids.iter().map(|id| data.findings_of(id).len()).sum();
        let expected_risks: usize = audit_ids.iter().map(|id| data.risks_of(id).len()).sum();

        assert_eq!(impact.audits, 2);
        assert_eq!(impact.findings, expected_findings);
        assert_eq!(impact.risks, expected_risks);
        assert!(impact.describe().starts_with("will also delete 2 audit(s)"));
    }

    #[test]
    fn test_cascade_impact_for_leaf_records() {
        let data = demo_data();

        let impact = data.cascade_impact(&RecordRef::Finding("f1".to_string()));
        assert_eq!(impact.recommendations, 2);
        assert_eq!(impact.total(), 2);

        let impact = data.cascade_impact(&RecordRef::Risk("risk-1".to_string()));
        assert!(impact.is_empty());
        assert_eq!(impact.describe(), "");
    }

    #[test]
    fn test_scoped_to_institution() {
        let data = demo_data();
        let scoped = data.scoped_to_institution("inst-2");

        assert_eq!(scoped.institutions.len(), 1);
        assert!(scoped.audits.iter().all(|a| a.institution_id == "inst-2"));
        assert!(scoped
            .findings
            .iter()
            .all(|f| scoped.audits.iter().any(|a| a.id == f.audit_id)));
        assert_eq!(scoped.profile, data.profile);
    }

    #[test]
    fn test_backup_field_names() {
        let json = serde_json::to_value(AppData::default()).unwrap();
        for key in [
            "institutions",
            "audits",
            "findings",
            "recommendations",
            "auditStages",
            "risks",
            "profile",
            "customReportSections",
        ] {
            assert!(json.get(key).is_some(), "missing key {}", key);
        }
    }
}
