use tracing::debug;

use crate::error::SchemaError;
use crate::models::{RecordSet, Role, STUDENT_ID};

/// Checks that a source carries the identifier column. Values pass through
/// untouched; optional columns are back-filled later, at merge time.
pub fn normalize_and_validate(records: RecordSet, role: Role) -> Result<RecordSet, SchemaError> {
    if !records.has_column(STUDENT_ID) {
        return Err(SchemaError::MissingIdentifier {
            role,
            column: STUDENT_ID,
        });
    }
    if records.is_empty() {
        debug!(%role, "source has no rows");
    }
    Ok(records)
}
