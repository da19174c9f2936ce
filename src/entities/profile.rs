// 👤 Auditor Profile - process-wide singleton (one row, id = 1)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditorProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub signature: String,
}

impl AuditorProfile {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.role.is_empty() && self.email.is_empty() && self.signature.is_empty()
    }

    /// Signature block appended to rendered reports.
    pub fn signature_block(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let mut lines = Vec::new();
        if !self.signature.is_empty() {
            lines.push(self.signature.clone());
        }
        if !self.name.is_empty() {
            lines.push(self.name.clone());
        }
        if !self.role.is_empty() {
            lines.push(self.role.clone());
        }
        if !self.email.is_empty() {
            lines.push(self.email.clone());
        }
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_block() {
        assert_eq!(AuditorProfile::default().signature_block(), None);

        let profile = AuditorProfile {
            name: "Ana Souza".to_string(),
            role: "Controller".to_string(),
            email: String::new(),
            signature: String::new(),
        };
        assert_eq!(profile.signature_block().unwrap(), "Ana Souza\nController");
    }
}
