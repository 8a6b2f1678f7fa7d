//! Insight pipeline handlers
//!
//! Straight-line pipelines with early-exit failure at each stage:
//!
//! - list:     auth -> id check -> list -> respond
//! - generate: auth -> load + authorize + flatten -> prompt ->
//!             generate (bounded retry) -> persist -> respond
//!
//! The list path deliberately authorizes by token validity only; the
//! school-scope check runs on the generate path. No InsightRecord is ever
//! written when any generation stage fails.

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Serialize;
use tracing::{info, warn};

use super::router::AppState;
use crate::auth::Educator;
use crate::errors::{AppError, ValidationErrorExt};
use crate::generation::build_prompt;
use crate::records::{authorize_scope, flatten_record};
use crate::storage::InsightRecord;
use crate::validation;

/// Response for GET /api/insights/{student_id}
#[derive(Debug, Serialize)]
pub struct ListInsightsResponse {
    pub insights: Vec<InsightRecord>,
    pub total: usize,
}

/// Response for POST /api/insights/{student_id}
#[derive(Debug, Serialize)]
pub struct GenerateInsightResponse {
    pub message: String,
    pub insight: InsightRecord,
}

/// GET /api/insights/{student_id} - list prior insights, newest first
#[tracing::instrument(skip(state, educator), fields(educator_id = %educator.id, student_id = %student_id))]
pub async fn list_insights(
    State(state): State<AppState>,
    educator: Educator,
    Path(student_id): Path<String>,
) -> Result<Json<ListInsightsResponse>, AppError> {
    validation::validate_student_id(&student_id).map_validation_err("student_id")?;

    let insights = state
        .insights
        .list_by_student(&student_id)
        .await
        .map_err(AppError::storage)?;

    Ok(Json(ListInsightsResponse {
        total: insights.len(),
        insights,
    }))
}

/// POST /api/insights/{student_id} - generate and persist a new insight
#[tracing::instrument(skip(state, educator), fields(educator_id = %educator.id, student_id = %student_id))]
pub async fn generate_insight(
    State(state): State<AppState>,
    educator: Educator,
    Path(student_id): Path<String>,
) -> Result<Json<GenerateInsightResponse>, AppError> {
    validation::validate_student_id(&student_id).map_validation_err("student_id")?;

    // Load the student and related sub-records in one logical read
    let record = state
        .directory
        .load_student(&student_id)
        .await
        .map_err(AppError::storage)?
        .ok_or_else(|| AppError::StudentNotFound(student_id.clone()))?;

    authorize_scope(&educator, &record.student)?;

    let payload = flatten_record(&record);
    let prompt = build_prompt(&payload).map_err(AppError::Internal)?;

    let text = state.generation.generate(&prompt).await?;

    // Persistence failure after a successful generation is surfaced, not
    // masked; the generated text is dropped. Log enough to diagnose the
    // loss.
    let school_id = record.student.school_id.clone();
    let insight = state
        .insights
        .create(&student_id, &school_id, payload, text)
        .await
        .map_err(|e| {
            warn!(
                student_id = %student_id,
                cause = %e,
                "generated text lost: persistence failed after successful generation"
            );
            AppError::storage(e)
        })?;

    info!(insight_id = %insight.id, "insight generated and persisted");

    Ok(Json(GenerateInsightResponse {
        message: "Insight generated successfully".to_string(),
        insight,
    }))
}
