// 🔎 Finding - an audit observation with its evidence trail
//
// Attachments travel inline as data URLs ("data:<mime>;base64,<payload>"),
// the same way the records have always been backed up.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::AuditError;

use super::{coded_enum, new_id, Priority};

coded_enum! {
    pub enum FindingStatus {
        Open => ("Aberta", "Open"),
        InAnalysis => ("Em Análise", "In Analysis"),
        Resolved => ("Resolvida", "Resolved"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub name: String,

    /// MIME type
    #[serde(rename = "type")]
    pub mime_type: String,

    /// Data URL with base64 payload
    pub data: String,
}

impl Attachment {
    /// Encode raw file bytes as an attachment.
    pub fn from_bytes(name: &str, mime_type: &str, bytes: &[u8]) -> Self {
        Attachment {
            id: new_id("att"),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            data: format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes)),
        }
    }

    /// Decode the payload back to raw bytes.
    ///
    /// Accepts a bare base64 string as well as a data URL.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let payload = match self.data.strip_prefix("data:") {
            Some(rest) => rest
                .split_once(";base64,")
                .map(|(_, payload)| payload)
                .ok_or_else(|| anyhow!("attachment '{}' is not a base64 data URL", self.name))?,
            None => self.data.as_str(),
        };

        STANDARD
            .decode(payload.trim())
            .with_context(|| format!("Failed to decode attachment '{}'", self.name))
    }

    /// Final path component of the stored name, used when writing the
    /// attachment to disk. `None` when the name has no file component
    /// (empty, `..`, a bare root).
    pub fn file_name(&self) -> Option<&str> {
        Path::new(&self.name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
    }

    /// Decode into `dir`, keeping only the final component of the name so a
    /// stored name can never point outside `dir`.
    pub fn extract_to(&self, dir: &Path) -> Result<PathBuf> {
        let file_name = self.file_name().ok_or_else(|| AuditError::InvalidValue {
            field: "attachment name".to_string(),
            value: self.name.clone(),
        })?;
        let path = dir.join(file_name);
        std::fs::write(&path, self.decode()?).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Guess a MIME type from the file extension.
    pub fn guess_mime(file_name: &str) -> &'static str {
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => "application/pdf",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "txt" => "text/plain",
            "csv" => "text/csv",
            "doc" => "application/msword",
            "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "xls" => "application/vnd.ms-excel",
            "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            _ => "application/octet-stream",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    #[serde(default)]
    pub id: String,

    pub audit_id: String,
    pub finding_code: String,
    pub summary: String,
    pub evidence: String,
    pub violated_criteria: String,
    pub cause: String,
    pub effect: String,
    pub classification: Priority,
    pub status: FindingStatus,

    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Finding {
    /// New open finding; evidence/criteria/cause/effect start empty.
    pub fn new(audit_id: &str, finding_code: &str, summary: &str, classification: Priority) -> Self {
        Finding {
            id: String::new(),
            audit_id: audit_id.to_string(),
            finding_code: finding_code.to_string(),
            summary: summary.to_string(),
            evidence: String::new(),
            violated_criteria: String::new(),
            cause: String::new(),
            effect: String::new(),
            classification,
            status: FindingStatus::Open,
            attachments: Vec::new(),
        }
    }

    pub fn attachment(&self, attachment_id: &str) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.id == attachment_id)
    }

    /// Remove an attachment, returning whether one was removed.
    pub fn remove_attachment(&mut self, attachment_id: &str) -> bool {
        let before = self.attachments.len();
        self.attachments.retain(|a| a.id != attachment_id);
        self.attachments.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_encode_decode() {
        let att = Attachment::from_bytes("evidence.txt", "text/plain", b"signed ledger page");

        assert!(att.data.starts_with("data:text/plain;base64,"));
        assert_eq!(att.decode().unwrap(), b"signed ledger page");
    }

    #[test]
    fn test_attachment_decode_bare_base64() {
        let att = Attachment {
            id: "a1".to_string(),
            name: "raw.bin".to_string(),
            mime_type: "application/octet-stream".to_string(),
            data: "aGVsbG8=".to_string(),
        };
        assert_eq!(att.decode().unwrap(), b"hello");
    }

    #[test]
    fn test_attachment_rejects_non_base64_data_url() {
        let att = Attachment {
            id: "a1".to_string(),
            name: "x.txt".to_string(),
            mime_type: "text/plain".to_string(),
            data: "data:text/plain,hello".to_string(),
        };
        assert!(att.decode().is_err());
    }

    #[test]
    fn test_file_name_strips_directories() {
        let named = |name: &str| Attachment::from_bytes(name, "text/plain", b"x");

        assert_eq!(named("evidence.txt").file_name(), Some("evidence.txt"));
        assert_eq!(named("/x").file_name(), Some("x"));
        assert_eq!(named("../x").file_name(), Some("x"));
        assert_eq!(named("/tmp/../../etc/passwd").file_name(), Some("passwd"));
        assert_eq!(named("..").file_name(), None);
        assert_eq!(named("/").file_name(), None);
        assert_eq!(named("").file_name(), None);
    }

    #[test]
    fn test_extract_stays_inside_directory() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("out");
        std::fs::create_dir(&out).unwrap();

        for name in ["/x", "../x"] {
            let att = Attachment::from_bytes(name, "text/plain", b"evidence");
            let path = att.extract_to(&out).unwrap();
            assert_eq!(path, out.join("x"));
            assert_eq!(std::fs::read(&path).unwrap(), b"evidence");
        }
        assert!(!root.path().join("x").exists());

        let err = Attachment::from_bytes("..", "text/plain", b"x").extract_to(&out).unwrap_err();
        assert!(matches!(err.downcast_ref::<AuditError>(), Some(AuditError::InvalidValue { .. })));
        println!("✅ Attachment extraction test PASSED");
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(Attachment::guess_mime("Report.PDF"), "application/pdf");
        assert_eq!(Attachment::guess_mime("photo.jpeg"), "image/jpeg");
        assert_eq!(Attachment::guess_mime("noext"), "application/octet-stream");
    }

    #[test]
    fn test_remove_attachment() {
        let mut finding = Finding::new("aud-1", "A-01", "Missing reconciliations", Priority::High);
        let att = Attachment::from_bytes("a.txt", "text/plain", b"x");
        let att_id = att.id.clone();
        finding.attachments.push(att);

        assert!(finding.attachment(&att_id).is_some());
        assert!(finding.remove_attachment(&att_id));
        assert!(!finding.remove_attachment(&att_id));
    }

    #[test]
    fn test_missing_attachments_default_to_empty() {
        let json = r#"{
            "id": "f1", "auditId": "1", "findingCode": "A-01", "summary": "s",
            "evidence": "e", "violatedCriteria": "v", "cause": "c", "effect": "x",
            "classification": "Média", "status": "Aberta"
        }"#;
        let finding: Finding = serde_json::from_str(json).unwrap();
        assert!(finding.attachments.is_empty());
        assert_eq!(finding.classification, Priority::Medium);
    }
}
