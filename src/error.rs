//! Domain error types.
//!
//! Everything above the database layer returns `anyhow::Result`; these are
//! the failures worth matching on (the REST layer and the CLI only print
//! them, tests assert on them).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    /// A save or delete targeted a record that does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A child record references a parent that does not exist.
    #[error("cannot save {entity}: parent record does not exist")]
    ParentNotFound { entity: &'static str },

    /// A value could not be parsed into one of the closed enumerations.
    #[error("invalid value for {field}: '{value}'")]
    InvalidValue { field: String, value: String },

    /// A destructive change (cascading delete or import) was requested without confirmation.
    #[error("not confirmed: {consequence}")]
    NotConfirmed { consequence: String },
}
