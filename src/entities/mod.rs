// Entity Models - flat records mirrored 1:1 by the SQLite tables
//
// Ownership tree (every arrow is ON DELETE CASCADE):
//   Institution -> Audit -> Finding -> Recommendation
//                        -> AuditStage
//                        -> Risk
//                        -> CustomReportSection
//
// AuditorProfile is a singleton with no parent.

/// Generate a fresh opaque identifier with an entity prefix (`aud-…`, `fin-…`).
pub(crate) fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

/// Closed enumeration with a stored code and an English display label.
///
/// The stored code is what goes into SQLite, JSON backups and CSV exports;
/// it keeps the values the application has always persisted. `FromStr`
/// accepts the code, the label, or the variant name in any case.
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $variant:ident => ($code:literal, $label:literal) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $code)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Persisted code.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            /// Human-facing label.
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::error::AuditError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = crate::entities::normalize_token(s);
                $(
                    if wanted == crate::entities::normalize_token($code)
                        || wanted == crate::entities::normalize_token($label)
                        || wanted == crate::entities::normalize_token(stringify!($variant))
                    {
                        return Ok($name::$variant);
                    }
                )+
                Err(crate::error::AuditError::InvalidValue {
                    field: stringify!($name).to_string(),
                    value: s.to_string(),
                })
            }
        }
    };
}

pub(crate) use coded_enum;

pub mod institution;
pub mod audit;
pub mod finding;
pub mod recommendation;
pub mod stage;
pub mod risk;
pub mod section;
pub mod profile;

pub use institution::{Institution, InstitutionType};
pub use audit::{Audit, AuditStatus, AuditType, Priority};
pub use finding::{Attachment, Finding, FindingStatus};
pub use recommendation::{Recommendation, RecommendationStatus};
pub use stage::{AuditStage, AuditStageStatus};
pub use risk::{score_risk, ImpactLevel, ProbabilityLevel, Risk, RiskLevel};
pub use section::{CustomReportSection, ATTACHMENT_SEQUENCE_START};
pub use profile::AuditorProfile;

/// Lowercase and drop separators so "almost-certain", "Almost Certain" and
/// "AlmostCertain" compare equal.
pub(crate) fn normalize_token(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}
