//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::{ApiError, SchemaError};

/// Map domain/service errors to a single line for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::Schema(SchemaError::Violations(violations)) => {
            format!("error: invalid experiment config: {}", violations.join("; "))
        }
        other => {
            let text = other.to_string();
            let line: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
            format!("error: {}", line.join(" "))
        }
    }
}
