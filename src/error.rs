use std::fmt;

use crate::models::Role;

/// A required identifier column is missing from one of the inputs.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("'{role}' records must contain column '{column}'")]
    MissingIdentifier { role: Role, column: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Numeric,
    Text,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeyKind::Numeric => "numeric",
            KeyKind::Text => "text",
        })
    }
}

/// The outer join cannot proceed.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("cannot merge on '{column}': column missing from {source_name} records")]
    MissingKey {
        source_name: String,
        column: &'static str,
    },

    #[error("cannot merge on '{column}': {left} keys are {left_kind} but {right} keys are {right_kind}")]
    IncompatibleKeys {
        column: &'static str,
        left: String,
        left_kind: KeyKind,
        right: String,
        right_kind: KeyKind,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no analysis result available; run the analysis first")]
    NoAnalysis,
}
