//! Input validation
//!
//! Keeps path-supplied identifiers inside a safe charset before they reach
//! the storage layer as key material.

use anyhow::{anyhow, Result};

/// Maximum length for external identifiers
pub const MAX_ID_LENGTH: usize = 128;

/// Validate a student id supplied by the caller
pub fn validate_student_id(student_id: &str) -> Result<()> {
    if student_id.trim().is_empty() {
        return Err(anyhow!("student_id cannot be empty"));
    }

    if student_id.len() > MAX_ID_LENGTH {
        return Err(anyhow!(
            "student_id too long: {} chars (max: {})",
            student_id.len(),
            MAX_ID_LENGTH
        ));
    }

    // Only allow alphanumeric, dash, underscore
    if !student_id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(anyhow!(
            "student_id contains invalid characters (allowed: alphanumeric, -, _)"
        ));
    }

    Ok(())
}
