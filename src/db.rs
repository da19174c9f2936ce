use anyhow::{bail, Context, Result};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::data::{AppData, RecordRef};
use crate::entities::*;
use crate::error::AuditError;

// ============================================================================
// ENUM <-> TEXT COLUMN MAPPING
// ============================================================================

/// Store coded enums as their persisted code; read back through `FromStr`.
macro_rules! sql_text_enum {
    ($($name:ty),+ $(,)?) => {
        $(
            impl ToSql for $name {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $name {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value
                        .as_str()?
                        .parse()
                        .map_err(|e| FromSqlError::Other(Box::new(e)))
                }
            }
        )+
    };
}

sql_text_enum!(
    InstitutionType,
    AuditType,
    AuditStatus,
    Priority,
    FindingStatus,
    RecommendationStatus,
    AuditStageStatus,
    ImpactLevel,
    ProbabilityLevel,
    RiskLevel,
);

/// Every table, parents before children.
pub const TABLES: &[&str] = &[
    "institutions",
    "audits",
    "findings",
    "recommendations",
    "audit_stages",
    "risks",
    "custom_report_sections",
    "profile",
];

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    // Cascades and parent checks depend on this (off by default in SQLite)
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Institutions
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS institutions (
            id TEXT PRIMARY KEY,
            municipality_name TEXT NOT NULL,
            institution_type TEXT NOT NULL,
            cnpj TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Audits
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS audits (
            id TEXT PRIMARY KEY,
            institution_id TEXT NOT NULL REFERENCES institutions(id) ON DELETE CASCADE,
            year INTEGER NOT NULL,
            audit_number TEXT NOT NULL,
            title TEXT NOT NULL,
            audited_sector TEXT NOT NULL,
            sector_responsible TEXT NOT NULL,
            audit_type TEXT NOT NULL,
            planned_start_date TEXT NOT NULL,
            planned_end_date TEXT NOT NULL,
            actual_start_date TEXT,
            actual_end_date TEXT,
            status TEXT NOT NULL,
            priority TEXT NOT NULL,
            objective TEXT,
            scope TEXT,
            criteria TEXT,
            auditor_notes TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Findings (attachments kept inline as a JSON array)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS findings (
            id TEXT PRIMARY KEY,
            audit_id TEXT NOT NULL REFERENCES audits(id) ON DELETE CASCADE,
            finding_code TEXT NOT NULL,
            summary TEXT NOT NULL,
            evidence TEXT NOT NULL,
            violated_criteria TEXT NOT NULL,
            cause TEXT NOT NULL,
            effect TEXT NOT NULL,
            classification TEXT NOT NULL,
            status TEXT NOT NULL,
            attachments TEXT NOT NULL DEFAULT '[]'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS recommendations (
            id TEXT PRIMARY KEY,
            finding_id TEXT NOT NULL REFERENCES findings(id) ON DELETE CASCADE,
            recommendation_code TEXT NOT NULL,
            description TEXT NOT NULL,
            implementation_responsible TEXT NOT NULL,
            deadline TEXT NOT NULL,
            status TEXT NOT NULL,
            verification_date TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS audit_stages (
            id TEXT PRIMARY KEY,
            audit_id TEXT NOT NULL REFERENCES audits(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            planned_start_date TEXT NOT NULL,
            planned_end_date TEXT NOT NULL,
            actual_start_date TEXT,
            actual_end_date TEXT,
            status TEXT NOT NULL,
            responsible TEXT,
            notes TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS risks (
            id TEXT PRIMARY KEY,
            audit_id TEXT NOT NULL REFERENCES audits(id) ON DELETE CASCADE,
            description TEXT NOT NULL,
            impact TEXT NOT NULL,
            probability TEXT NOT NULL,
            risk_level TEXT NOT NULL,
            controls TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS custom_report_sections (
            id TEXT PRIMARY KEY,
            audit_id TEXT NOT NULL REFERENCES audits(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            sequence INTEGER NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Auditor profile (singleton row)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS profile (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            name TEXT NOT NULL DEFAULT '',
            role TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            signature TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_audits_institution ON audits(institution_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_audits_year ON audits(year)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_findings_audit ON findings(audit_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_recommendations_finding ON recommendations(finding_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_stages_audit ON audit_stages(audit_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_risks_audit ON risks(audit_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sections_audit ON custom_report_sections(audit_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// WRITE HELPERS
// ============================================================================

/// Whether a save creates a row or overwrites an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Insert,
    Update,
}

impl WriteMode {
    fn pick(self, insert: &'static str, update: &'static str) -> &'static str {
        match self {
            WriteMode::Insert => insert,
            WriteMode::Update => update,
        }
    }
}

/// Empty id means "new record": assign one and insert.
fn assign_id(id: &mut String, prefix: &str) -> WriteMode {
    if id.is_empty() {
        *id = new_id(prefix);
        WriteMode::Insert
    } else {
        WriteMode::Update
    }
}

/// Turn the outcome of an INSERT/UPDATE into the domain error vocabulary.
fn finish(result: rusqlite::Result<usize>, entity: &'static str, id: &str) -> Result<()> {
    match result {
        Ok(0) => Err(AuditError::NotFound {
            entity,
            id: id.to_string(),
        }
        .into()),
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            Err(AuditError::ParentNotFound { entity }.into())
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to save {} {}", entity, id))),
    }
}

fn to_json_column<T: serde::Serialize>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn from_json_column<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let json: String = row.get(idx)?;
    serde_json::from_str(&json).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ============================================================================
// INSTITUTIONS
// ============================================================================

fn write_institution(conn: &Connection, write: WriteMode, i: &Institution) -> rusqlite::Result<usize> {
    conn.execute(
        write.pick(
            "INSERT INTO institutions (id, municipality_name, institution_type, cnpj)
             VALUES (?1, ?2, ?3, ?4)",
            "UPDATE institutions SET municipality_name = ?2, institution_type = ?3, cnpj = ?4
             WHERE id = ?1",
        ),
        params![i.id, i.municipality_name, i.institution_type, i.cnpj],
    )
}

pub fn save_institution(conn: &Connection, mut institution: Institution) -> Result<Institution> {
    let write = assign_id(&mut institution.id, "inst");
    finish(write_institution(conn, write, &institution), "institution", &institution.id)?;
    Ok(institution)
}

pub fn get_institutions(conn: &Connection) -> Result<Vec<Institution>> {
    let mut stmt = conn.prepare(
        "SELECT id, municipality_name, institution_type, cnpj
         FROM institutions
         ORDER BY rowid",
    )?;

    let institutions = stmt
        .query_map([], |row| {
            Ok(Institution {
                id: row.get(0)?,
                municipality_name: row.get(1)?,
                institution_type: row.get(2)?,
                cnpj: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(institutions)
}

// ============================================================================
// AUDITS
// ============================================================================

fn write_audit(conn: &Connection, write: WriteMode, a: &Audit) -> rusqlite::Result<usize> {
    conn.execute(
        write.pick(
            "INSERT INTO audits (
                id, institution_id, year, audit_number, title, audited_sector,
                sector_responsible, audit_type, planned_start_date, planned_end_date,
                actual_start_date, actual_end_date, status, priority,
                objective, scope, criteria, auditor_notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            "UPDATE audits SET
                institution_id = ?2, year = ?3, audit_number = ?4, title = ?5,
                audited_sector = ?6, sector_responsible = ?7, audit_type = ?8,
                planned_start_date = ?9, planned_end_date = ?10,
                actual_start_date = ?11, actual_end_date = ?12, status = ?13, priority = ?14,
                objective = ?15, scope = ?16, criteria = ?17, auditor_notes = ?18
             WHERE id = ?1",
        ),
        params![
            a.id,
            a.institution_id,
            a.year,
            a.audit_number,
            a.title,
            a.audited_sector,
            a.sector_responsible,
            a.audit_type,
            a.planned_start_date,
            a.planned_end_date,
            a.actual_start_date,
            a.actual_end_date,
            a.status,
            a.priority,
            a.objective,
            a.scope,
            a.criteria,
            a.auditor_notes,
        ],
    )
}

pub fn save_audit(conn: &Connection, mut audit: Audit) -> Result<Audit> {
    let write = assign_id(&mut audit.id, "aud");
    finish(write_audit(conn, write, &audit), "audit", &audit.id)?;
    Ok(audit)
}

pub fn get_audits(conn: &Connection) -> Result<Vec<Audit>> {
    let mut stmt = conn.prepare(
        "SELECT id, institution_id, year, audit_number, title, audited_sector,
                sector_responsible, audit_type, planned_start_date, planned_end_date,
                actual_start_date, actual_end_date, status, priority,
                objective, scope, criteria, auditor_notes
         FROM audits
         ORDER BY rowid",
    )?;

    let audits = stmt
        .query_map([], |row| {
            Ok(Audit {
                id: row.get(0)?,
                institution_id: row.get(1)?,
                year: row.get(2)?,
                audit_number: row.get(3)?,
                title: row.get(4)?,
                audited_sector: row.get(5)?,
                sector_responsible: row.get(6)?,
                audit_type: row.get(7)?,
                planned_start_date: row.get(8)?,
                planned_end_date: row.get(9)?,
                actual_start_date: row.get(10)?,
                actual_end_date: row.get(11)?,
                status: row.get(12)?,
                priority: row.get(13)?,
                objective: row.get(14)?,
                scope: row.get(15)?,
                criteria: row.get(16)?,
                auditor_notes: row.get(17)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(audits)
}

// ============================================================================
// FINDINGS
// ============================================================================

fn write_finding(conn: &Connection, write: WriteMode, f: &Finding) -> rusqlite::Result<usize> {
    let attachments = to_json_column(&f.attachments)?;

    conn.execute(
        write.pick(
            "INSERT INTO findings (
                id, audit_id, finding_code, summary, evidence, violated_criteria,
                cause, effect, classification, status, attachments
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            "UPDATE findings SET
                audit_id = ?2, finding_code = ?3, summary = ?4, evidence = ?5,
                violated_criteria = ?6, cause = ?7, effect = ?8, classification = ?9,
                status = ?10, attachments = ?11
             WHERE id = ?1",
        ),
        params![
            f.id,
            f.audit_id,
            f.finding_code,
            f.summary,
            f.evidence,
            f.violated_criteria,
            f.cause,
            f.effect,
            f.classification,
            f.status,
            attachments,
        ],
    )
}

pub fn save_finding(conn: &Connection, mut finding: Finding) -> Result<Finding> {
    let write = assign_id(&mut finding.id, "fin");
    finish(write_finding(conn, write, &finding), "finding", &finding.id)?;
    Ok(finding)
}

pub fn get_findings(conn: &Connection) -> Result<Vec<Finding>> {
    let mut stmt = conn.prepare(
        "SELECT id, audit_id, finding_code, summary, evidence, violated_criteria,
                cause, effect, classification, status, attachments
         FROM findings
         ORDER BY rowid",
    )?;

    let findings = stmt
        .query_map([], |row| {
            Ok(Finding {
                id: row.get(0)?,
                audit_id: row.get(1)?,
                finding_code: row.get(2)?,
                summary: row.get(3)?,
                evidence: row.get(4)?,
                violated_criteria: row.get(5)?,
                cause: row.get(6)?,
                effect: row.get(7)?,
                classification: row.get(8)?,
                status: row.get(9)?,
                attachments: from_json_column(row, 10)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(findings)
}

// ============================================================================
// RECOMMENDATIONS
// ============================================================================

fn write_recommendation(conn: &Connection, write: WriteMode, r: &Recommendation) -> rusqlite::Result<usize> {
    conn.execute(
        write.pick(
            "INSERT INTO recommendations (
                id, finding_id, recommendation_code, description,
                implementation_responsible, deadline, status, verification_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            "UPDATE recommendations SET
                finding_id = ?2, recommendation_code = ?3, description = ?4,
                implementation_responsible = ?5, deadline = ?6, status = ?7,
                verification_date = ?8
             WHERE id = ?1",
        ),
        params![
            r.id,
            r.finding_id,
            r.recommendation_code,
            r.description,
            r.implementation_responsible,
            r.deadline,
            r.status,
            r.verification_date,
        ],
    )
}

pub fn save_recommendation(conn: &Connection, mut rec: Recommendation) -> Result<Recommendation> {
    let write = assign_id(&mut rec.id, "rec");
    finish(write_recommendation(conn, write, &rec), "recommendation", &rec.id)?;
    Ok(rec)
}

pub fn get_recommendations(conn: &Connection) -> Result<Vec<Recommendation>> {
    let mut stmt = conn.prepare(
        "SELECT id, finding_id, recommendation_code, description,
                implementation_responsible, deadline, status, verification_date
         FROM recommendations
         ORDER BY rowid",
    )?;

    let recs = stmt
        .query_map([], |row| {
            Ok(Recommendation {
                id: row.get(0)?,
                finding_id: row.get(1)?,
                recommendation_code: row.get(2)?,
                description: row.get(3)?,
                implementation_responsible: row.get(4)?,
                deadline: row.get(5)?,
                status: row.get(6)?,
                verification_date: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(recs)
}

// ============================================================================
// AUDIT STAGES (work plan)
// ============================================================================

fn write_stage(conn: &Connection, write: WriteMode, s: &AuditStage) -> rusqlite::Result<usize> {
    conn.execute(
        write.pick(
            "INSERT INTO audit_stages (
                id, audit_id, name, planned_start_date, planned_end_date,
                actual_start_date, actual_end_date, status, responsible, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            "UPDATE audit_stages SET
                audit_id = ?2, name = ?3, planned_start_date = ?4, planned_end_date = ?5,
                actual_start_date = ?6, actual_end_date = ?7, status = ?8,
                responsible = ?9, notes = ?10
             WHERE id = ?1",
        ),
        params![
            s.id,
            s.audit_id,
            s.name,
            s.planned_start_date,
            s.planned_end_date,
            s.actual_start_date,
            s.actual_end_date,
            s.status,
            s.responsible,
            s.notes,
        ],
    )
}

pub fn save_stage(conn: &Connection, mut stage: AuditStage) -> Result<AuditStage> {
    let write = assign_id(&mut stage.id, "stg");
    finish(write_stage(conn, write, &stage), "audit stage", &stage.id)?;
    Ok(stage)
}

pub fn get_stages(conn: &Connection) -> Result<Vec<AuditStage>> {
    let mut stmt = conn.prepare(
        "SELECT id, audit_id, name, planned_start_date, planned_end_date,
                actual_start_date, actual_end_date, status, responsible, notes
         FROM audit_stages
         ORDER BY rowid",
    )?;

    let stages = stmt
        .query_map([], |row| {
            Ok(AuditStage {
                id: row.get(0)?,
                audit_id: row.get(1)?,
                name: row.get(2)?,
                planned_start_date: row.get(3)?,
                planned_end_date: row.get(4)?,
                actual_start_date: row.get(5)?,
                actual_end_date: row.get(6)?,
                status: row.get(7)?,
                responsible: row.get(8)?,
                notes: row.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(stages)
}

// ============================================================================
// RISKS
// ============================================================================

fn write_risk(conn: &Connection, write: WriteMode, r: &Risk) -> rusqlite::Result<usize> {
    conn.execute(
        write.pick(
            "INSERT INTO risks (id, audit_id, description, impact, probability, risk_level, controls)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            "UPDATE risks SET
                audit_id = ?2, description = ?3, impact = ?4, probability = ?5,
                risk_level = ?6, controls = ?7
             WHERE id = ?1",
        ),
        params![r.id, r.audit_id, r.description, r.impact, r.probability, r.risk_level, r.controls],
    )
}

/// Save a risk; the stored level is always recomputed from impact x probability.
pub fn save_risk(conn: &Connection, mut risk: Risk) -> Result<Risk> {
    risk.rescore();
    let write = assign_id(&mut risk.id, "risk");
    finish(write_risk(conn, write, &risk), "risk", &risk.id)?;
    Ok(risk)
}

pub fn get_risks(conn: &Connection) -> Result<Vec<Risk>> {
    let mut stmt = conn.prepare(
        "SELECT id, audit_id, description, impact, probability, risk_level, controls
         FROM risks
         ORDER BY rowid",
    )?;

    let risks = stmt
        .query_map([], |row| {
            Ok(Risk {
                id: row.get(0)?,
                audit_id: row.get(1)?,
                description: row.get(2)?,
                impact: row.get(3)?,
                probability: row.get(4)?,
                risk_level: row.get(5)?,
                controls: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(risks)
}

// ============================================================================
// CUSTOM REPORT SECTIONS
// ============================================================================

fn write_section(conn: &Connection, write: WriteMode, s: &CustomReportSection) -> rusqlite::Result<usize> {
    conn.execute(
        write.pick(
            "INSERT INTO custom_report_sections (id, audit_id, title, content, sequence)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            "UPDATE custom_report_sections SET audit_id = ?2, title = ?3, content = ?4, sequence = ?5
             WHERE id = ?1",
        ),
        params![s.id, s.audit_id, s.title, s.content, s.sequence],
    )
}

pub fn save_section(conn: &Connection, mut section: CustomReportSection) -> Result<CustomReportSection> {
    let write = assign_id(&mut section.id, "crs");
    finish(write_section(conn, write, &section), "report section", &section.id)?;
    Ok(section)
}

pub fn get_sections(conn: &Connection) -> Result<Vec<CustomReportSection>> {
    let mut stmt = conn.prepare(
        "SELECT id, audit_id, title, content, sequence
         FROM custom_report_sections
         ORDER BY rowid",
    )?;

    let sections = stmt
        .query_map([], |row| {
            Ok(CustomReportSection {
                id: row.get(0)?,
                audit_id: row.get(1)?,
                title: row.get(2)?,
                content: row.get(3)?,
                sequence: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(sections)
}

// ============================================================================
// PROFILE
// ============================================================================

pub fn save_profile(conn: &Connection, profile: &AuditorProfile) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO profile (id, name, role, email, signature)
         VALUES (1, ?1, ?2, ?3, ?4)",
        params![profile.name, profile.role, profile.email, profile.signature],
    )
    .context("Failed to save auditor profile")?;

    Ok(())
}

/// The stored profile, or an empty one if none was ever saved.
pub fn get_profile(conn: &Connection) -> Result<AuditorProfile> {
    let profile = conn
        .query_row(
            "SELECT name, role, email, signature FROM profile WHERE id = 1",
            [],
            |row| {
                Ok(AuditorProfile {
                    name: row.get(0)?,
                    role: row.get(1)?,
                    email: row.get(2)?,
                    signature: row.get(3)?,
                })
            },
        )
        .optional()?;

    Ok(profile.unwrap_or_default())
}

// ============================================================================
// DELETES, SNAPSHOTS, IMPORT
// ============================================================================

fn table_for(target: &RecordRef) -> &'static str {
    match target {
        RecordRef::Institution(_) => "institutions",
        RecordRef::Audit(_) => "audits",
        RecordRef::Finding(_) => "findings",
        RecordRef::Recommendation(_) => "recommendations",
        RecordRef::Stage(_) => "audit_stages",
        RecordRef::Risk(_) => "risks",
        RecordRef::Section(_) => "custom_report_sections",
    }
}

/// Delete one record; descendants go with it through ON DELETE CASCADE.
pub fn delete_record(conn: &Connection, target: &RecordRef) -> Result<()> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", table_for(target));
    let deleted = conn
        .execute(&sql, params![target.id()])
        .with_context(|| format!("Failed to delete {} {}", target.entity_name(), target.id()))?;

    if deleted == 0 {
        return Err(AuditError::NotFound {
            entity: target.entity_name(),
            id: target.id().to_string(),
        }
        .into());
    }

    Ok(())
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    if !TABLES.contains(&table) {
        bail!("Unknown table: {}", table);
    }

    let sql = format!("SELECT COUNT(*) FROM {}", table);
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;

    Ok(count)
}

/// Every collection in one snapshot.
pub fn load_all(conn: &Connection) -> Result<AppData> {
    Ok(AppData {
        institutions: get_institutions(conn)?,
        audits: get_audits(conn)?,
        findings: get_findings(conn)?,
        recommendations: get_recommendations(conn)?,
        audit_stages: get_stages(conn)?,
        risks: get_risks(conn)?,
        profile: get_profile(conn)?,
        custom_report_sections: get_sections(conn)?,
    })
}

/// Replace the whole database with `data` in one transaction.
///
/// Records with an empty id get a fresh one; risk levels are recomputed.
/// A record whose parent is missing aborts the import and nothing changes.
pub fn replace_all(conn: &Connection, data: &AppData) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    for table in TABLES.iter().rev() {
        tx.execute(&format!("DELETE FROM {}", table), [])?;
    }

    for institution in &data.institutions {
        let mut institution = institution.clone();
        assign_id(&mut institution.id, "inst");
        finish(write_institution(&tx, WriteMode::Insert, &institution), "institution", &institution.id)?;
    }
    for audit in &data.audits {
        let mut audit = audit.clone();
        assign_id(&mut audit.id, "aud");
        finish(write_audit(&tx, WriteMode::Insert, &audit), "audit", &audit.id)?;
    }
    for finding in &data.findings {
        let mut finding = finding.clone();
        assign_id(&mut finding.id, "fin");
        finish(write_finding(&tx, WriteMode::Insert, &finding), "finding", &finding.id)?;
    }
    for rec in &data.recommendations {
        let mut rec = rec.clone();
        assign_id(&mut rec.id, "rec");
        finish(write_recommendation(&tx, WriteMode::Insert, &rec), "recommendation", &rec.id)?;
    }
    for stage in &data.audit_stages {
        let mut stage = stage.clone();
        assign_id(&mut stage.id, "stg");
        finish(write_stage(&tx, WriteMode::Insert, &stage), "audit stage", &stage.id)?;
    }
    for risk in &data.risks {
        let mut risk = risk.clone();
        risk.rescore();
        assign_id(&mut risk.id, "risk");
        finish(write_risk(&tx, WriteMode::Insert, &risk), "risk", &risk.id)?;
    }
    for section in &data.custom_report_sections {
        let mut section = section.clone();
        assign_id(&mut section.id, "crs");
        finish(write_section(&tx, WriteMode::Insert, &section), "report section", &section.id)?;
    }
    save_profile(&tx, &data.profile)?;

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::demo_data;
    use chrono::NaiveDate;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Institution + one audit, returns (institution_id, audit_id)
    fn create_parents(conn: &Connection) -> (String, String) {
        let inst = save_institution(
            conn,
            Institution::new("Testville", InstitutionType::CityHall, "00.000.000/0001-00"),
        )
        .unwrap();
        let audit = save_audit(
            conn,
            Audit::new(
                &inst.id,
                2024,
                "AUD-2024-01",
                "Payroll",
                "HR",
                "Head of HR",
                AuditType::Compliance,
                date(2024, 3, 1),
                date(2024, 3, 31),
                Priority::Medium,
            ),
        )
        .unwrap();
        (inst.id, audit.id)
    }

    #[test]
    fn test_insert_assigns_prefixed_id() {
        let conn = test_db();
        let (inst_id, audit_id) = create_parents(&conn);

        assert!(inst_id.starts_with("inst-"));
        assert!(audit_id.starts_with("aud-"));
        assert_eq!(count_rows(&conn, "audits").unwrap(), 1);

        println!("✅ Id assignment test PASSED");
    }

    #[test]
    fn test_update_existing_and_missing() {
        let conn = test_db();
        let (_, audit_id) = create_parents(&conn);

        let mut audit = get_audits(&conn).unwrap().remove(0);
        audit.status = AuditStatus::InProgress;
        audit.actual_start_date = Some(date(2024, 3, 4));
        save_audit(&conn, audit).unwrap();

        let reloaded = get_audits(&conn).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].id, audit_id);
        assert_eq!(reloaded[0].status, AuditStatus::InProgress);
        assert_eq!(reloaded[0].actual_start_date, Some(date(2024, 3, 4)));

        let mut ghost = reloaded[0].clone();
        ghost.id = "aud-missing".to_string();
        let err = save_audit(&conn, ghost).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AuditError>(),
            Some(AuditError::NotFound { entity: "audit", .. })
        ));

        println!("✅ Update test PASSED");
    }

    #[test]
    fn test_missing_parent_is_rejected() {
        let conn = test_db();

        let err = save_finding(&conn, Finding::new("aud-nope", "F-01", "Orphan", Priority::Low)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AuditError>(),
            Some(AuditError::ParentNotFound { entity: "finding" })
        ));
        assert_eq!(count_rows(&conn, "findings").unwrap(), 0);

        println!("✅ Parent check test PASSED");
    }

    #[test]
    fn test_cascade_delete_institution() {
        let conn = test_db();
        replace_all(&conn, &demo_data()).unwrap();

        let before = load_all(&conn).unwrap();
        let impact = before.cascade_impact(&RecordRef::Institution("inst-1".to_string()));

        delete_record(&conn, &RecordRef::Institution("inst-1".to_string())).unwrap();
        let after = load_all(&conn).unwrap();

        assert!(after.institution("inst-1").is_none());
        assert!(after.audits.iter().all(|a| a.institution_id != "inst-1"));
        assert_eq!(before.audits.len() - after.audits.len(), impact.audits);
        assert_eq!(before.findings.len() - after.findings.len(), impact.findings);
        assert_eq!(
            before.recommendations.len() - after.recommendations.len(),
            impact.recommendations
        );
        assert_eq!(before.risks.len() - after.risks.len(), impact.risks);
        assert_eq!(before.audit_stages.len() - after.audit_stages.len(), impact.stages);
        assert_eq!(
            before.custom_report_sections.len() - after.custom_report_sections.len(),
            impact.sections
        );
        assert_eq!(impact.sections, 1);
        assert!(after.section("crs-1").is_none());

        // No orphans anywhere
        for finding in &after.findings {
            assert!(after.audit(&finding.audit_id).is_some());
        }
        for rec in &after.recommendations {
            assert!(after.finding(&rec.finding_id).is_some());
        }

        println!("✅ Cascade delete test PASSED");
    }

    #[test]
    fn test_delete_missing_record() {
        let conn = test_db();
        let err = delete_record(&conn, &RecordRef::Risk("risk-404".to_string())).unwrap_err();
        assert!(matches!(err.downcast_ref::<AuditError>(), Some(AuditError::NotFound { .. })));
    }

    #[test]
    fn test_risk_level_always_derived() {
        let conn = test_db();
        let (_, audit_id) = create_parents(&conn);

        let mut risk = Risk::new(&audit_id, "Ghost employees", ImpactLevel::Severe, ProbabilityLevel::Probable, "");
        risk.risk_level = RiskLevel::Low;
        let saved = save_risk(&conn, risk).unwrap();
        assert_eq!(saved.risk_level, RiskLevel::Extreme);

        // Saving an unchanged record is a no-op
        let first = get_risks(&conn).unwrap();
        save_risk(&conn, first[0].clone()).unwrap();
        let second = get_risks(&conn).unwrap();
        assert_eq!(first, second);

        println!("✅ Risk scoring on save test PASSED");
    }

    #[test]
    fn test_attachments_round_trip() {
        let conn = test_db();
        let (_, audit_id) = create_parents(&conn);

        let mut finding = Finding::new(&audit_id, "F-01", "Missing contracts", Priority::High);
        finding
            .attachments
            .push(Attachment::from_bytes("memo.txt", "text/plain", b"signed memo"));
        let saved = save_finding(&conn, finding).unwrap();

        let loaded = get_findings(&conn).unwrap();
        assert_eq!(loaded, vec![saved]);
        assert_eq!(loaded[0].attachments[0].decode().unwrap(), b"signed memo");
    }

    #[test]
    fn test_profile_singleton() {
        let conn = test_db();
        assert_eq!(get_profile(&conn).unwrap(), AuditorProfile::default());

        let mut profile = AuditorProfile {
            name: "Ana".to_string(),
            ..AuditorProfile::default()
        };
        save_profile(&conn, &profile).unwrap();
        profile.role = "Controller".to_string();
        save_profile(&conn, &profile).unwrap();

        assert_eq!(get_profile(&conn).unwrap(), profile);
        assert_eq!(count_rows(&conn, "profile").unwrap(), 1);
    }

    #[test]
    fn test_replace_all_is_atomic() {
        let conn = test_db();
        replace_all(&conn, &demo_data()).unwrap();

        let mut broken = demo_data();
        broken.institutions.clear();
        broken.institutions.push(Institution::new("Elsewhere", InstitutionType::CityHall, ""));

        let err = replace_all(&conn, &broken).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AuditError>(),
            Some(AuditError::ParentNotFound { entity: "audit" })
        ));

        // Previous contents survive the failed import
        assert_eq!(load_all(&conn).unwrap(), demo_data());

        println!("✅ Atomic import test PASSED");
    }

    #[test]
    fn test_replace_all_rescores_risks() {
        let conn = test_db();
        let mut data = demo_data();
        data.risks[0].risk_level = RiskLevel::Low;

        replace_all(&conn, &data).unwrap();

        for risk in get_risks(&conn).unwrap() {
            assert_eq!(risk.risk_level, score_risk(risk.impact, risk.probability));
        }
    }

    #[test]
    fn test_count_rows_rejects_unknown_table() {
        let conn = test_db();
        assert!(count_rows(&conn, "sqlite_master; DROP TABLE audits").is_err());
    }
}
