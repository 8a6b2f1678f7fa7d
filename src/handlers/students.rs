//! Student directory ingest handlers
//!
//! The relational student schema lives with the upstream school system;
//! this surface is the seam through which records arrive here.

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Serialize;
use tracing::info;

use super::router::AppState;
use crate::auth::Educator;
use crate::errors::{AppError, ValidationErrorExt};
use crate::records::{authorize_scope, StudentRecord};
use crate::validation;

/// Response for PUT /api/students/{student_id}
#[derive(Debug, Serialize)]
pub struct UpsertStudentResponse {
    pub message: String,
    pub student_id: String,
}

/// PUT /api/students/{student_id} - insert or replace a full student record
#[tracing::instrument(skip(state, educator, record), fields(educator_id = %educator.id, student_id = %student_id))]
pub async fn upsert_student(
    State(state): State<AppState>,
    educator: Educator,
    Path(student_id): Path<String>,
    Json(record): Json<StudentRecord>,
) -> Result<Json<UpsertStudentResponse>, AppError> {
    validation::validate_student_id(&student_id).map_validation_err("student_id")?;

    if record.student.id != student_id {
        return Err(AppError::invalid_input(
            "student.id",
            "body student id must match the path",
        ));
    }

    // Same scope rule as generation: educators may only write students of
    // their own school unless they are administrators.
    authorize_scope(&educator, &record.student)?;

    state
        .directory
        .upsert_student(record)
        .await
        .map_err(AppError::storage)?;

    info!("student record upserted");

    Ok(Json(UpsertStudentResponse {
        message: "Student record stored".to_string(),
        student_id,
    }))
}
