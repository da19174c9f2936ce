// 📝 Custom Report Section - user-authored block inside an audit report

use serde::{Deserialize, Serialize};

/// Sequences at or above this value mark attachment-like sections
/// (annexes) rather than body sections.
pub const ATTACHMENT_SEQUENCE_START: i64 = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomReportSection {
    #[serde(default)]
    pub id: String,

    pub audit_id: String,
    pub title: String,
    pub content: String,

    /// Display order; not unique, not contiguous
    pub sequence: i64,
}

impl CustomReportSection {
    pub fn new(audit_id: &str, title: &str, content: &str, sequence: i64) -> Self {
        CustomReportSection {
            id: String::new(),
            audit_id: audit_id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            sequence,
        }
    }

    pub fn is_attachment(&self) -> bool {
        self.sequence >= ATTACHMENT_SEQUENCE_START
    }

    /// Default sequence for a new section: one past the highest existing.
    pub fn next_sequence(existing: &[CustomReportSection]) -> i64 {
        existing.iter().map(|s| s.sequence).max().unwrap_or(0).saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_sequence() {
        assert_eq!(CustomReportSection::next_sequence(&[]), 1);

        let sections = vec![
            CustomReportSection::new("a", "Intro", "...", 150),
            CustomReportSection::new("a", "Annex I", "...", 2001),
            CustomReportSection::new("a", "Method", "...", 250),
        ];
        assert_eq!(CustomReportSection::next_sequence(&sections), 2002);
    }

    #[test]
    fn test_next_sequence_saturates() {
        let sections = vec![CustomReportSection::new("a", "Last", "...", i64::MAX)];
        assert_eq!(CustomReportSection::next_sequence(&sections), i64::MAX);
    }

    #[test]
    fn test_attachment_convention() {
        assert!(!CustomReportSection::new("a", "Body", "", 1999).is_attachment());
        assert!(CustomReportSection::new("a", "Annex", "", 2000).is_attachment());
    }
}
