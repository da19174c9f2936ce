//! End-to-end flows through AuditStore against an on-disk database.

use chrono::NaiveDate;
use gestaudit::*;
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn open(dir: &TempDir) -> AuditStore {
    AuditStore::open(&dir.path().join("gestaudit.db")).unwrap()
}

#[test]
fn audit_lifecycle_survives_reopen() {
    let dir = TempDir::new().unwrap();

    let (audit_id, finding_id) = {
        let mut store = open(&dir);
        let inst = store
            .save_institution(Institution::new("Riverton", InstitutionType::CityHall, "12.345.678/0001-90"))
            .unwrap();
        let audit = store
            .save_audit(Audit::new(
                &inst.id,
                2025,
                "AUD-2025-01",
                "Payroll",
                "Human Resources",
                "J. Silva",
                AuditType::Compliance,
                date(2025, 3, 1),
                date(2025, 3, 31),
                Priority::High,
            ))
            .unwrap();
        let finding = store
            .save_finding(Finding::new(&audit.id, "F-01", "Overtime paid without approval.", Priority::High))
            .unwrap();
        store
            .save_recommendation(Recommendation::new(
                &finding.id,
                "R-01",
                "Require approval before payment.",
                "HR Director",
                date(2025, 5, 30),
            ))
            .unwrap();
        store
            .save_risk(Risk::new(&audit.id, "Ghost employees", ImpactLevel::Severe, ProbabilityLevel::Probable, ""))
            .unwrap();
        (audit.id, finding.id)
    };

    let store = open(&dir);
    let data = store.data();
    assert_eq!(data.institutions.len(), 1);
    assert_eq!(data.findings_of(&audit_id).len(), 1);
    assert_eq!(data.recommendations_of(&finding_id).len(), 1);
    assert_eq!(data.risks_of(&audit_id)[0].risk_level, RiskLevel::High);

    let report = AuditReport::build(data, &audit_id, true).unwrap();
    let text = report.render_text();
    assert!(text.contains("Overtime paid without approval."));
    assert!(text.contains("Require approval before payment."));
}

#[test]
fn confirmed_cascade_removes_whole_subtree() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    assert!(store.seed_if_empty().unwrap());

    let target = RecordRef::Institution("inst-1".to_string());
    let impact = store.delete_impact(&target);
    assert_eq!(impact.audits, 2);
    assert_eq!(impact.findings, 3);
    assert_eq!(impact.sections, 1);

    let err = store.delete(&target, false).unwrap_err();
    assert!(matches!(err.downcast_ref::<AuditError>(), Some(AuditError::NotConfirmed { .. })));
    assert_eq!(store.data().institutions.len(), 2);

    store.delete(&target, true).unwrap();
    drop(store);

    let store = open(&dir);
    let data = store.data();
    assert_eq!(data.institutions.len(), 1);
    assert!(data.audits.iter().all(|a| a.institution_id == "inst-2"));
    assert!(data.findings.is_empty());
    assert!(data.recommendations.is_empty());
    assert!(data.audit_stages.is_empty());
    assert!(data.custom_report_sections.is_empty());
    assert_eq!(data.risks.len(), 1);
}

#[test]
fn backup_file_restores_into_fresh_database() {
    let source_dir = TempDir::new().unwrap();
    let mut source = open(&source_dir);
    source.seed_if_empty().unwrap();

    let backup_path = source_dir.path().join(BACKUP_FILE_NAME);
    std::fs::write(&backup_path, export_json(source.data()).unwrap()).unwrap();

    let target_dir = TempDir::new().unwrap();
    let mut target = open(&target_dir);
    assert!(target.is_empty());
    target.import(&read_backup(&backup_path).unwrap(), false).unwrap();

    assert_eq!(target.data(), source.data());
    assert_eq!(
        AnnualSummary::compute(target.data(), 2024),
        AnnualSummary::compute(source.data(), 2024)
    );
}

#[test]
fn csv_exports_land_on_disk() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    store.seed_if_empty().unwrap();

    for export in [
        audit_csv(store.data(), "1").unwrap(),
        annual_csv(store.data(), 2024).unwrap(),
        risks_csv(store.data(), 2024).unwrap(),
    ] {
        let path = export.write_to(dir.path()).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, export.content);
        assert!(path.extension().is_some_and(|ext| ext == "csv"));
    }
}
