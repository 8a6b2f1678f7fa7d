//! Student records and payload assembly
//!
//! Loads a student with its related sub-records through the
//! [`StudentDirectory`] collaborator, enforces school-scope authorization,
//! and flattens everything into the payload sent to the generation service.
//! Flattening is a pure projection: the same record always produces the
//! same structure.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::auth::Educator;
use crate::errors::AppError;

/// Core student entity, owned by the storage collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// School-assigned roll/admission number
    pub student_number: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub school_id: String,
}

/// Period-scored result, tagged with its subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeResult {
    pub subject: String,
    pub period: String,
    pub score: f32,
    pub max_score: f32,
}

/// Evaluation of one activity, tagged with metadata and the evaluator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvaluation {
    pub activity_name: String,
    pub activity_kind: String,
    pub evaluator_name: String,
    pub rating: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

/// Free-text observation recorded by an educator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub text: String,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

/// Student plus all related sub-records, read in one logical snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRecord {
    pub student: Student,
    #[serde(default)]
    pub grades: Vec<GradeResult>,
    #[serde(default)]
    pub evaluations: Vec<ActivityEvaluation>,
    #[serde(default)]
    pub observations: Vec<Observation>,
}

/// Read-side collaborator for student data.
///
/// The relational schema behind this trait is not owned by this service;
/// the service only reads through it.
#[async_trait]
pub trait StudentDirectory: Send + Sync {
    /// Load a student and all related sub-records, or None if no such
    /// student exists.
    async fn load_student(&self, student_id: &str) -> anyhow::Result<Option<StudentRecord>>;

    /// Insert or replace a full student record (ingest seam)
    async fn upsert_student(&self, record: StudentRecord) -> anyhow::Result<()>;
}

// ============================================================================
// Generation payload
// ============================================================================

/// Structured payload handed to the generation service and persisted
/// verbatim alongside the generated text for audit/reproducibility.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsightPayload {
    pub student: PayloadStudent,
    pub grades: Vec<PayloadGrade>,
    pub activity_evaluations: Vec<PayloadEvaluation>,
    /// Observation texts in stored order
    pub observations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayloadStudent {
    pub full_name: String,
    pub student_number: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayloadGrade {
    pub subject: String,
    pub period: String,
    pub score: f32,
    pub max_score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayloadEvaluation {
    pub activity: String,
    pub kind: String,
    pub evaluator: String,
    pub rating: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

/// Authorize the caller against a student's school scope.
///
/// Administrators bypass the school match; everyone else must belong to the
/// student's school.
pub fn authorize_scope(educator: &Educator, student: &Student) -> Result<(), AppError> {
    if educator.is_administrator() || educator.school_id == student.school_id {
        return Ok(());
    }

    Err(AppError::Forbidden(format!(
        "educator {} is not scoped to the student's school",
        educator.id
    )))
}

/// Flatten a loaded record into the generation payload.
///
/// Deterministic: field presence and nesting depend only on the record
/// contents. Grades and evaluations keep their stored collection order,
/// observations collapse to an ordered sequence of text.
pub fn flatten_record(record: &StudentRecord) -> InsightPayload {
    let student = &record.student;

    InsightPayload {
        student: PayloadStudent {
            full_name: format!("{} {}", student.first_name, student.last_name),
            student_number: student.student_number.clone(),
            date_of_birth: student.date_of_birth,
            gender: student.gender.clone(),
        },
        grades: record
            .grades
            .iter()
            .map(|g| PayloadGrade {
                subject: g.subject.clone(),
                period: g.period.clone(),
                score: g.score,
                max_score: g.max_score,
            })
            .collect(),
        activity_evaluations: record
            .evaluations
            .iter()
            .map(|e| PayloadEvaluation {
                activity: e.activity_name.clone(),
                kind: e.activity_kind.clone(),
                evaluator: e.evaluator_name.clone(),
                rating: e.rating.clone(),
                remarks: e.remarks.clone(),
            })
            .collect(),
        observations: record.observations.iter().map(|o| o.text.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn educator(school_id: &str, role: &str) -> Educator {
        Educator {
            id: "ed-1".into(),
            name: "A. Osei".into(),
            role: role.into(),
            school_id: school_id.into(),
        }
    }

    fn sample_record(school_id: &str) -> StudentRecord {
        StudentRecord {
            student: Student {
                id: "stu-1".into(),
                first_name: "Mira".into(),
                last_name: "Khatri".into(),
                student_number: "R-042".into(),
                date_of_birth: NaiveDate::from_ymd_opt(2012, 4, 17).unwrap(),
                gender: "F".into(),
                school_id: school_id.into(),
            },
            grades: vec![GradeResult {
                subject: "Mathematics".into(),
                period: "Term 1".into(),
                score: 82.0,
                max_score: 100.0,
            }],
            evaluations: vec![ActivityEvaluation {
                activity_name: "Chess Club".into(),
                activity_kind: "club".into(),
                evaluator_name: "T. Brandt".into(),
                rating: "Excellent".into(),
                remarks: None,
            }],
            observations: vec![
                Observation {
                    text: "Helps peers during group work".into(),
                    recorded_at: chrono::Utc::now(),
                },
                Observation {
                    text: "Struggles with deadlines".into(),
                    recorded_at: chrono::Utc::now(),
                },
            ],
        }
    }

    #[test]
    fn same_school_is_authorized() {
        let record = sample_record("school-1");
        assert!(authorize_scope(&educator("school-1", "Teacher"), &record.student).is_ok());
    }

    #[test]
    fn different_school_is_forbidden() {
        let record = sample_record("school-1");
        let err = authorize_scope(&educator("school-2", "Teacher"), &record.student).unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[test]
    fn administrator_bypasses_school_scope() {
        let record = sample_record("school-1");
        assert!(authorize_scope(
            &educator("school-2", crate::auth::ADMINISTRATOR_ROLE),
            &record.student
        )
        .is_ok());
    }

    #[test]
    fn flatten_is_deterministic() {
        let record = sample_record("school-1");
        let a = flatten_record(&record);
        let b = flatten_record(&record);
        assert_eq!(a, b);
    }

    #[test]
    fn flatten_preserves_observation_order() {
        let record = sample_record("school-1");
        let payload = flatten_record(&record);
        assert_eq!(
            payload.observations,
            vec![
                "Helps peers during group work".to_string(),
                "Struggles with deadlines".to_string()
            ]
        );
    }

    #[test]
    fn flatten_projects_student_fields() {
        let payload = flatten_record(&sample_record("school-1"));
        assert_eq!(payload.student.full_name, "Mira Khatri");
        assert_eq!(payload.student.student_number, "R-042");
        assert_eq!(payload.grades.len(), 1);
        assert_eq!(payload.activity_evaluations[0].evaluator, "T. Brandt");
    }

    #[test]
    fn empty_relations_flatten_to_empty_collections() {
        let mut record = sample_record("school-1");
        record.grades.clear();
        record.evaluations.clear();
        record.observations.clear();

        let payload = flatten_record(&record);
        assert!(payload.grades.is_empty());
        assert!(payload.activity_evaluations.is_empty());
        assert!(payload.observations.is_empty());
    }
}
