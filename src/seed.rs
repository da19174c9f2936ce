// 🌱 Demo dataset - loaded by `gestaudit seed` into an empty database
//
// Fixed IDs so docs, tests and screenshots can refer to the same records.

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::info;

use crate::data::AppData;
use crate::db::{count_rows, replace_all};
use crate::entities::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

/// The demo records: two institutions, four audits, findings,
/// recommendations, a work plan, risks and one custom report section.
pub fn demo_data() -> AppData {
    let institutions = vec![
        Institution {
            id: "inst-1".to_string(),
            ..Institution::new("Audiville", InstitutionType::CityHall, "12.345.678/0001-99")
        },
        Institution {
            id: "inst-2".to_string(),
            ..Institution::new("Audiville", InstitutionType::CityCouncil, "98.765.432/0001-11")
        },
    ];

    let mut payables = Audit::new(
        "inst-1",
        2024,
        "AUD-2024-01",
        "Internal Financial Controls",
        "Finance",
        "João da Silva",
        AuditType::Financial,
        date(2024, 8, 15),
        date(2024, 9, 15),
        Priority::High,
    );
    payables.id = "1".to_string();
    payables.status = AuditStatus::InProgress;
    payables.objective = Some("Assess the effectiveness of internal controls over financial reporting.".to_string());
    payables.scope = Some("Accounts payable, accounts receivable and bank reconciliation.".to_string());
    payables.criteria = Some("COSO framework; municipal financial control policy.".to_string());

    let mut privacy = Audit::new(
        "inst-1",
        2024,
        "AUD-2024-02",
        "Data Protection Compliance",
        "IT and Legal",
        "Maria Oliveira",
        AuditType::Compliance,
        date(2024, 7, 20),
        date(2024, 8, 10),
        Priority::High,
    );
    privacy.id = "2".to_string();
    privacy.status = AuditStatus::Completed;
    privacy.actual_start_date = Some(date(2024, 7, 22));
    privacy.actual_end_date = Some(date(2024, 8, 9));

    let mut logistics = Audit::new(
        "inst-2",
        2024,
        "AUD-2024-03",
        "Logistics Operational Efficiency",
        "Logistics",
        "Carlos Pereira",
        AuditType::Operational,
        date(2024, 10, 1),
        date(2024, 10, 30),
        Priority::Medium,
    );
    logistics.id = "3".to_string();

    let mut security = Audit::new(
        "inst-2",
        2023,
        "AUD-2023-05",
        "Information Security",
        "Information Technology",
        "Ana Souza",
        AuditType::InformationTechnology,
        date(2023, 11, 5),
        date(2023, 12, 5),
        Priority::High,
    );
    security.id = "4".to_string();
    security.status = AuditStatus::Completed;

    let mut segregation = Finding::new(
        "1",
        "F-01",
        "No segregation of duties in accounts payable.",
        Priority::High,
    );
    segregation.id = "f1".to_string();
    segregation.evidence = "The same clerk can register a supplier and approve its payment.".to_string();
    segregation.violated_criteria = "Financial control policy, section 3.2.".to_string();
    segregation.cause = "ERP permissions were never configured per role.".to_string();
    segregation.effect = "Fraudulent or improper payments may go undetected.".to_string();

    let mut reconciliation = Finding::new("1", "F-02", "Bank reconciliations are months late.", Priority::Medium);
    reconciliation.id = "f2".to_string();
    reconciliation.status = FindingStatus::InAnalysis;

    let mut policy = Finding::new("2", "F-03", "Privacy notice is out of date.", Priority::Medium);
    policy.id = "f3".to_string();
    policy.status = FindingStatus::Resolved;

    let rec = |id: &str, finding: &str, code: &str, text: &str, who: &str, deadline: NaiveDate, status| {
        let mut r = Recommendation::new(finding, code, text, who, deadline);
        r.id = id.to_string();
        r.status = status;
        r
    };
    let recommendations = vec![
        rec(
            "r1",
            "f1",
            "R-01",
            "Restrict ERP roles so supplier registration and payment approval are held by different staff.",
            "IT Manager",
            date(2024, 9, 30),
            RecommendationStatus::InProgress,
        ),
        rec(
            "r2",
            "f1",
            "R-02",
            "Review every payment approved by the clerk in the last six months.",
            "Finance Manager",
            date(2024, 8, 30),
            RecommendationStatus::Pending,
        ),
        rec(
            "r3",
            "f2",
            "R-03",
            "Reconcile all bank accounts monthly and file the sign-off.",
            "Treasury",
            date(2024, 10, 31),
            RecommendationStatus::Pending,
        ),
        {
            let mut r = rec(
                "r4",
                "f3",
                "R-04",
                "Publish an updated privacy notice approved by the legal department.",
                "Data Protection Officer",
                date(2024, 7, 15),
                RecommendationStatus::Verified,
            );
            r.verification_date = Some(date(2024, 7, 20));
            r
        },
    ];

    let stage = |id: &str, name: &str, start: NaiveDate, end: NaiveDate, status| {
        let mut s = AuditStage::new("1", name, start, end);
        s.id = id.to_string();
        s.status = status;
        s.responsible = Some("Control Auditor".to_string());
        s
    };
    let audit_stages = vec![
        {
            let mut s = stage("stg-1", "Planning", date(2024, 8, 15), date(2024, 8, 20), AuditStageStatus::InProgress);
            s.actual_start_date = Some(date(2024, 8, 15));
            s.notes = Some("Kick-off meeting held, scope agreed.".to_string());
            s
        },
        stage("stg-2", "Fieldwork", date(2024, 8, 21), date(2024, 9, 10), AuditStageStatus::NotStarted),
        stage("stg-3", "Reporting", date(2024, 9, 11), date(2024, 9, 15), AuditStageStatus::NotStarted),
    ];

    let risk = |id: &str, audit: &str, text: &str, impact, probability, controls: &str| {
        let mut r = Risk::new(audit, text, impact, probability, controls);
        r.id = id.to_string();
        r
    };
    let risks = vec![
        risk(
            "risk-1",
            "1",
            "Fraudulent payments through missing segregation of duties.",
            ImpactLevel::Severe,
            ProbabilityLevel::Possible,
            "Monthly sample review of payments.",
        ),
        risk(
            "risk-2",
            "1",
            "Unreconciled balances hide cash shortfalls.",
            ImpactLevel::Catastrophic,
            ProbabilityLevel::Probable,
            "None.",
        ),
        risk(
            "risk-3",
            "2",
            "Regulatory sanctions for data protection breaches.",
            ImpactLevel::Moderate,
            ProbabilityLevel::Probable,
            "External legal counsel reviews policies.",
        ),
        risk(
            "risk-4",
            "3",
            "Delivery delays from inefficient routing.",
            ImpactLevel::Minor,
            ProbabilityLevel::Possible,
            "Route optimisation software in place.",
        ),
    ];

    let custom_report_sections = vec![CustomReportSection {
        id: "crs-1".to_string(),
        ..CustomReportSection::new(
            "1",
            "Methodology",
            "Walkthroughs, sample testing of 60 payments and interviews with finance staff.",
            150,
        )
    }];

    AppData {
        institutions,
        audits: vec![payables, privacy, logistics, security],
        findings: vec![segregation, reconciliation, policy],
        recommendations,
        audit_stages,
        risks,
        profile: AuditorProfile {
            name: "Control Auditor".to_string(),
            role: "Senior Internal Auditor".to_string(),
            email: "auditor@example.com".to_string(),
            signature: "Control Auditor".to_string(),
        },
        custom_report_sections,
    }
}

/// Load the demo dataset if the database holds no institutions yet.
///
/// Returns whether anything was written.
pub fn seed_if_empty(conn: &Connection) -> Result<bool> {
    if count_rows(conn, "institutions")? > 0 {
        info!("database already populated, skipping seed");
        return Ok(false);
    }

    replace_all(conn, &demo_data())?;
    info!("demo dataset loaded");
    Ok(true)
}
