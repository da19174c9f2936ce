// 🗄️ AuditStore - owns the connection, the loaded snapshot and the selection
//
// Every write goes straight to SQLite and is followed by a full reload, so
// `data()` always reflects what is stored.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::data::{AppData, CascadeImpact, RecordRef};
use crate::db;
use crate::entities::*;
use crate::error::AuditError;

/// Currently selected institution and audit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub institution_id: Option<String>,
    pub audit_id: Option<String>,
}

pub struct AuditStore {
    conn: Connection,
    data: AppData,
    selection: Selection,
}

impl AuditStore {
    /// Open (or create) the database at `path` and load everything.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        info!(path = %path.display(), "database opened");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        db::setup_database(&conn).context("Failed to initialize schema")?;
        let data = db::load_all(&conn).context("Failed to load data")?;

        Ok(AuditStore {
            conn,
            data,
            selection: Selection::default(),
        })
    }

    pub fn data(&self) -> &AppData {
        &self.data
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Refetch every collection and drop selections whose record vanished.
    pub fn reload(&mut self) -> Result<()> {
        self.data = db::load_all(&self.conn).context("Failed to reload data")?;
        debug!(
            institutions = self.data.institutions.len(),
            audits = self.data.audits.len(),
            findings = self.data.findings.len(),
            "data reloaded"
        );

        if let Some(id) = &self.selection.institution_id {
            if self.data.institution(id).is_none() {
                self.selection = Selection::default();
            }
        }
        if let Some(id) = &self.selection.audit_id {
            let still_there = self
                .data
                .audit(id)
                .map(|a| self.selection.institution_id.as_deref().map_or(true, |i| i == a.institution_id))
                .unwrap_or(false);
            if !still_there {
                self.selection.audit_id = None;
            }
        }

        Ok(())
    }

    /// Log the outcome of a write, then reload.
    fn after_write<T>(&mut self, entity: &str, result: Result<T>) -> Result<T> {
        match result {
            Ok(saved) => {
                self.reload()?;
                Ok(saved)
            }
            Err(e) => {
                warn!(entity, error = %e, "write rejected");
                Err(e)
            }
        }
    }

    // ========================================================================
    // SAVES (empty id inserts, otherwise replaces)
    // ========================================================================

    pub fn save_institution(&mut self, institution: Institution) -> Result<Institution> {
        let result = db::save_institution(&self.conn, institution);
        let saved = self.after_write("institution", result)?;
        info!(id = %saved.id, "institution saved");
        Ok(saved)
    }

    pub fn save_audit(&mut self, audit: Audit) -> Result<Audit> {
        let result = db::save_audit(&self.conn, audit);
        let saved = self.after_write("audit", result)?;
        info!(id = %saved.id, number = %saved.audit_number, "audit saved");
        Ok(saved)
    }

    pub fn save_finding(&mut self, finding: Finding) -> Result<Finding> {
        let result = db::save_finding(&self.conn, finding);
        let saved = self.after_write("finding", result)?;
        info!(id = %saved.id, code = %saved.finding_code, "finding saved");
        Ok(saved)
    }

    pub fn save_recommendation(&mut self, rec: Recommendation) -> Result<Recommendation> {
        let result = db::save_recommendation(&self.conn, rec);
        let saved = self.after_write("recommendation", result)?;
        info!(id = %saved.id, code = %saved.recommendation_code, "recommendation saved");
        Ok(saved)
    }

    pub fn save_stage(&mut self, stage: AuditStage) -> Result<AuditStage> {
        let result = db::save_stage(&self.conn, stage);
        let saved = self.after_write("audit stage", result)?;
        info!(id = %saved.id, "audit stage saved");
        Ok(saved)
    }

    pub fn save_risk(&mut self, risk: Risk) -> Result<Risk> {
        let result = db::save_risk(&self.conn, risk);
        let saved = self.after_write("risk", result)?;
        info!(id = %saved.id, level = saved.risk_level.as_str(), "risk saved");
        Ok(saved)
    }

    pub fn save_section(&mut self, section: CustomReportSection) -> Result<CustomReportSection> {
        let result = db::save_section(&self.conn, section);
        let saved = self.after_write("report section", result)?;
        info!(id = %saved.id, sequence = saved.sequence, "report section saved");
        Ok(saved)
    }

    pub fn save_profile(&mut self, profile: &AuditorProfile) -> Result<()> {
        let result = db::save_profile(&self.conn, profile);
        self.after_write("profile", result)?;
        info!("auditor profile saved");
        Ok(())
    }

    // ========================================================================
    // DELETES
    // ========================================================================

    /// What deleting `target` would remove besides itself.
    pub fn delete_impact(&self, target: &RecordRef) -> CascadeImpact {
        self.data.cascade_impact(target)
    }

    /// Delete a record and everything below it.
    ///
    /// When the delete reaches dependent records and `confirmed` is false,
    /// nothing is deleted and `AuditError::NotConfirmed` names the consequence.
    pub fn delete(&mut self, target: &RecordRef, confirmed: bool) -> Result<CascadeImpact> {
        if !self.data.contains(target) {
            return Err(AuditError::NotFound {
                entity: target.entity_name(),
                id: target.id().to_string(),
            }
            .into());
        }

        let impact = self.delete_impact(target);
        if !impact.is_empty() && !confirmed {
            return Err(AuditError::NotConfirmed {
                consequence: format!(
                    "deleting {} {} {}",
                    target.entity_name(),
                    target.id(),
                    impact.describe()
                ),
            }
            .into());
        }

        let result = db::delete_record(&self.conn, target);
        self.after_write(target.entity_name(), result)?;
        info!(
            entity = target.entity_name(),
            id = target.id(),
            cascaded = impact.total(),
            "record deleted"
        );
        Ok(impact)
    }

    // ========================================================================
    // SELECTION
    // ========================================================================

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Select an institution; clears the audit selection when it changes.
    pub fn select_institution(&mut self, institution_id: &str) -> Result<()> {
        if self.data.institution(institution_id).is_none() {
            return Err(AuditError::NotFound {
                entity: "institution",
                id: institution_id.to_string(),
            }
            .into());
        }

        if self.selection.institution_id.as_deref() != Some(institution_id) {
            self.selection.audit_id = None;
        }
        self.selection.institution_id = Some(institution_id.to_string());
        Ok(())
    }

    /// Select an audit (and its institution).
    pub fn select_audit(&mut self, audit_id: &str) -> Result<()> {
        let institution_id = self
            .data
            .audit(audit_id)
            .map(|a| a.institution_id.clone())
            .ok_or_else(|| AuditError::NotFound {
                entity: "audit",
                id: audit_id.to_string(),
            })?;

        self.selection.institution_id = Some(institution_id);
        self.selection.audit_id = Some(audit_id.to_string());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection = Selection::default();
    }

    pub fn selected_institution(&self) -> Option<&Institution> {
        self.selection.institution_id.as_deref().and_then(|id| self.data.institution(id))
    }

    pub fn selected_audit(&self) -> Option<&Audit> {
        self.selection.audit_id.as_deref().and_then(|id| self.data.audit(id))
    }

    // ========================================================================
    // BULK
    // ========================================================================

    /// True when no institution and no auditor profile are stored.
    pub fn is_empty(&self) -> bool {
        self.data.institutions.is_empty() && self.data.profile.is_empty()
    }

    /// Replace everything with `data` (JSON restore).
    ///
    /// Over a non-empty database this needs `confirmed`, otherwise
    /// `AuditError::NotConfirmed` is returned and nothing changes.
    pub fn import(&mut self, data: &AppData, confirmed: bool) -> Result<()> {
        if !self.is_empty() && !confirmed {
            let mut lost = Vec::new();
            if !self.data.institutions.is_empty() {
                lost.push(format!("{} institution(s) and their records", self.data.institutions.len()));
            }
            if !self.data.profile.is_empty() {
                lost.push("the auditor profile".to_string());
            }
            return Err(AuditError::NotConfirmed {
                consequence: format!("importing replaces {}", lost.join(" and ")),
            }
            .into());
        }

        let result = db::replace_all(&self.conn, data);
        self.after_write("backup", result)?;
        self.selection = Selection::default();
        info!(
            institutions = self.data.institutions.len(),
            audits = self.data.audits.len(),
            "backup imported"
        );
        Ok(())
    }

    /// Load the demo dataset into an empty database.
    pub fn seed_if_empty(&mut self) -> Result<bool> {
        let seeded = crate::seed::seed_if_empty(&self.conn)?;
        if seeded {
            self.reload()?;
        }
        Ok(seeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn seeded_store() -> AuditStore {
        let mut store = AuditStore::open_in_memory().unwrap();
        assert!(store.seed_if_empty().unwrap());
        store
    }

    #[test]
    fn test_writes_are_visible_immediately() {
        let mut store = seeded_store();
        let before = store.data().findings_of("1").len();

        let saved = store
            .save_finding(Finding::new("1", "F-09", "Unsigned contracts", Priority::Low))
            .unwrap();

        assert!(saved.id.starts_with("fin-"));
        assert_eq!(store.data().findings_of("1").len(), before + 1);
        assert_eq!(store.data().finding(&saved.id), Some(&saved));
    }

    #[test]
    fn test_delete_requires_confirmation_when_cascading() {
        let mut store = seeded_store();
        let target = RecordRef::Audit("1".to_string());

        let err = store.delete(&target, false).unwrap_err();
        match err.downcast_ref::<AuditError>() {
            Some(AuditError::NotConfirmed { consequence }) => {
                assert!(consequence.contains("finding(s)"), "{}", consequence);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(store.data().audit("1").is_some());

        let impact = store.delete(&target, true).unwrap();
        assert_eq!(impact.findings, 2);
        assert!(store.data().audit("1").is_none());
        assert!(store.data().findings_of("1").is_empty());
        assert!(store.data().stages_of("1").is_empty());

        println!("✅ Confirmation-gated delete test PASSED");
    }

    #[test]
    fn test_leaf_delete_needs_no_confirmation() {
        let mut store = seeded_store();
        store.delete(&RecordRef::Risk("risk-1".to_string()), false).unwrap();
        assert!(store.data().risk("risk-1").is_none());
    }

    #[test]
    fn test_selection_cleared_when_record_vanishes() {
        let mut store = seeded_store();
        store.select_audit("1").unwrap();
        assert_eq!(store.selection().institution_id.as_deref(), Some("inst-1"));

        store.select_institution("inst-2").unwrap();
        assert_eq!(store.selection().audit_id, None);

        store.select_audit("3").unwrap();
        store
            .delete(&RecordRef::Institution("inst-2".to_string()), true)
            .unwrap();
        assert_eq!(store.selection(), &Selection::default());
        assert!(store.selected_audit().is_none());
    }

    #[test]
    fn test_rejected_write_leaves_data_unchanged() {
        let mut store = seeded_store();
        let before = store.data().clone();

        let orphan = Recommendation::new(
            "fin-missing",
            "R-99",
            "Nothing",
            "Nobody",
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        );
        assert!(store.save_recommendation(orphan).is_err());
        assert_eq!(store.data(), &before);
    }

    #[test]
    fn test_import_over_profile_needs_confirmation() {
        let mut store = AuditStore::open_in_memory().unwrap();
        assert!(store.is_empty());

        let profile = AuditorProfile {
            name: "Ana Costa".to_string(),
            ..AuditorProfile::default()
        };
        store.save_profile(&profile).unwrap();
        assert!(!store.is_empty());

        let err = store.import(&crate::seed::demo_data(), false).unwrap_err();
        match err.downcast_ref::<AuditError>() {
            Some(AuditError::NotConfirmed { consequence }) => assert!(consequence.contains("auditor profile")),
            other => panic!("expected NotConfirmed, got {:?}", other),
        }
        assert_eq!(store.data().profile.name, "Ana Costa");
        assert!(store.data().institutions.is_empty());

        store.import(&crate::seed::demo_data(), true).unwrap();
        assert_eq!(store.data().institutions.len(), 2);
        assert_eq!(store.data().profile.name, "Control Auditor");
        println!("✅ Import confirmation test PASSED");
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.db");

        {
            let mut store = AuditStore::open(&path).unwrap();
            store.seed_if_empty().unwrap();
            store
                .save_profile(&AuditorProfile {
                    name: "Reopened".to_string(),
                    ..AuditorProfile::default()
                })
                .unwrap();
        }

        let store = AuditStore::open(&path).unwrap();
        assert_eq!(store.data().profile.name, "Reopened");
        assert_eq!(store.data().audits.len(), crate::seed::demo_data().audits.len());
    }
}
