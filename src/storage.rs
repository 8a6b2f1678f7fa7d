//! RocksDB-backed persistence for insights and student records
//!
//! Key layout:
//! - `student/{student_id}` -> StudentRecord (JSON)
//! - `insight/{student_id}/{inverted_nanos}/{uuid}` -> InsightRecord (JSON)
//!
//! Insight keys embed the creation timestamp inverted, so a prefix scan
//! yields newest-first without a separate index. All RocksDB calls run on
//! the blocking pool; request tasks never touch the DB directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::records::{InsightPayload, StudentRecord};

/// Persisted generation result, created exactly once per successful
/// generation and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightRecord {
    pub id: Uuid,
    pub student_id: String,
    /// Always equals the student's school at creation time; the scope check
    /// runs before any write.
    pub school_id: String,
    /// Verbatim copy of the generation input, kept for audit and
    /// reproducibility.
    pub payload: InsightPayload,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Write/list collaborator for insight records
#[async_trait]
pub trait InsightRepository: Send + Sync {
    /// Persist a new record with a fresh id and current timestamp.
    /// No automatic retry: a failed write is surfaced, not masked.
    async fn create(
        &self,
        student_id: &str,
        school_id: &str,
        payload: InsightPayload,
        text: String,
    ) -> anyhow::Result<InsightRecord>;

    /// All insights for one student, newest first. Empty vec when none.
    async fn list_by_student(&self, student_id: &str) -> anyhow::Result<Vec<InsightRecord>>;
}

// ============================================================================
// RocksDB store
// ============================================================================

const STUDENT_PREFIX: &str = "student/";
const INSIGHT_PREFIX: &str = "insight/";

/// Single embedded RocksDB holding both students and insights
pub struct RocksStore {
    db: Arc<rocksdb::DB>,
}

impl RocksStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let mut opts = rocksdb::Options::default();
        opts.create_if_missing(true);

        let db = rocksdb::DB::open(&opts, path)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Flush memtables to disk; called during graceful shutdown
    pub fn flush(&self) -> anyhow::Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn student_key(student_id: &str) -> String {
        format!("{STUDENT_PREFIX}{student_id}")
    }

    /// Timestamp is stored inverted and zero-padded so lexicographic key
    /// order is newest-first within a student's prefix.
    fn insight_key(student_id: &str, created_at: &DateTime<Utc>, id: &Uuid) -> String {
        let nanos = created_at.timestamp_nanos_opt().unwrap_or(0).max(0) as u64;
        let inverted = u64::MAX - nanos;
        format!("{INSIGHT_PREFIX}{student_id}/{inverted:020}/{id}")
    }

    fn insight_scan_prefix(student_id: &str) -> String {
        format!("{INSIGHT_PREFIX}{student_id}/")
    }
}

#[async_trait]
impl crate::records::StudentDirectory for RocksStore {
    async fn load_student(&self, student_id: &str) -> anyhow::Result<Option<StudentRecord>> {
        let db = Arc::clone(&self.db);
        let key = Self::student_key(student_id);

        tokio::task::spawn_blocking(move || -> anyhow::Result<Option<StudentRecord>> {
            let Some(bytes) = db.get(key.as_bytes())? else {
                return Ok(None);
            };
            let record: StudentRecord = serde_json::from_slice(&bytes)?;
            Ok(Some(record))
        })
        .await
        .map_err(|e| anyhow::anyhow!("blocking task panicked: {e}"))?
    }

    async fn upsert_student(&self, record: StudentRecord) -> anyhow::Result<()> {
        let db = Arc::clone(&self.db);
        let key = Self::student_key(&record.student.id);

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let bytes = serde_json::to_vec(&record)?;
            db.put(key.as_bytes(), bytes)?;
            Ok(())
        })
        .await
        .map_err(|e| anyhow::anyhow!("blocking task panicked: {e}"))?
    }
}

#[async_trait]
impl InsightRepository for RocksStore {
    async fn create(
        &self,
        student_id: &str,
        school_id: &str,
        payload: InsightPayload,
        text: String,
    ) -> anyhow::Result<InsightRecord> {
        let record = InsightRecord {
            id: Uuid::new_v4(),
            student_id: student_id.to_string(),
            school_id: school_id.to_string(),
            payload,
            text,
            created_at: Utc::now(),
        };

        let db = Arc::clone(&self.db);
        let key = Self::insight_key(student_id, &record.created_at, &record.id);
        let stored = record.clone();

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let bytes = serde_json::to_vec(&stored)?;
            db.put(key.as_bytes(), bytes)?;
            Ok(())
        })
        .await
        .map_err(|e| anyhow::anyhow!("blocking task panicked: {e}"))??;

        crate::metrics::INSIGHTS_CREATED_TOTAL.inc();
        Ok(record)
    }

    async fn list_by_student(&self, student_id: &str) -> anyhow::Result<Vec<InsightRecord>> {
        let db = Arc::clone(&self.db);
        let prefix = Self::insight_scan_prefix(student_id);

        tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<InsightRecord>> {
            let mut records: Vec<InsightRecord> = Vec::new();

            let iter = db.prefix_iterator(prefix.as_bytes());
            for item in iter {
                let (key, value) = item?;
                let Ok(key_str) = std::str::from_utf8(&key) else {
                    continue;
                };
                if !key_str.starts_with(&prefix) {
                    break;
                }

                let record: InsightRecord = serde_json::from_slice(&value)?;
                records.push(record);
            }

            // Key order is already newest-first; keep the explicit sort as
            // the ordering contract rather than an artifact of the key
            // layout.
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(records)
        })
        .await
        .map_err(|e| anyhow::anyhow!("blocking task panicked: {e}"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{
        InsightPayload, PayloadStudent, Student, StudentDirectory, StudentRecord,
    };
    use tempfile::TempDir;

    fn payload(name: &str) -> InsightPayload {
        InsightPayload {
            student: PayloadStudent {
                full_name: name.into(),
                student_number: "R-1".into(),
                date_of_birth: chrono::NaiveDate::from_ymd_opt(2011, 1, 2).unwrap(),
                gender: "M".into(),
            },
            grades: vec![],
            activity_evaluations: vec![],
            observations: vec![],
        }
    }

    fn student(id: &str, school_id: &str) -> StudentRecord {
        StudentRecord {
            student: Student {
                id: id.into(),
                first_name: "Jon".into(),
                last_name: "Park".into(),
                student_number: "R-1".into(),
                date_of_birth: chrono::NaiveDate::from_ymd_opt(2011, 1, 2).unwrap(),
                gender: "M".into(),
                school_id: school_id.into(),
            },
            grades: vec![],
            evaluations: vec![],
            observations: vec![],
        }
    }

    #[tokio::test]
    async fn student_roundtrip_and_missing() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();

        assert!(store.load_student("stu-1").await.unwrap().is_none());

        store.upsert_student(student("stu-1", "school-1")).await.unwrap();

        let loaded = store.load_student("stu-1").await.unwrap().unwrap();
        assert_eq!(loaded.student.school_id, "school-1");
    }

    #[tokio::test]
    async fn list_is_empty_for_unknown_student() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();

        let insights = store.list_by_student("nobody").await.unwrap();
        assert!(insights.is_empty());
    }

    #[tokio::test]
    async fn create_then_list_orders_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();

        let first = store
            .create("stu-1", "school-1", payload("a"), "first report".into())
            .await
            .unwrap();
        // Distinct timestamps so the ordering assertion is meaningful
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store
            .create("stu-1", "school-1", payload("b"), "second report".into())
            .await
            .unwrap();

        let insights = store.list_by_student("stu-1").await.unwrap();
        assert_eq!(insights.len(), 2);
        assert_eq!(insights[0].id, second.id);
        assert_eq!(insights[1].id, first.id);
        assert!(insights[0].created_at >= insights[1].created_at);
    }

    #[tokio::test]
    async fn list_is_scoped_per_student() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();

        store
            .create("stu-1", "school-1", payload("a"), "one".into())
            .await
            .unwrap();
        store
            .create("stu-2", "school-1", payload("b"), "two".into())
            .await
            .unwrap();

        let insights = store.list_by_student("stu-1").await.unwrap();
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].student_id, "stu-1");
    }

    #[tokio::test]
    async fn created_record_carries_payload_verbatim() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();

        let input = payload("Mira Khatri");
        let record = store
            .create("stu-1", "school-1", input.clone(), "report".into())
            .await
            .unwrap();

        assert_eq!(record.payload, input);
        assert_eq!(record.school_id, "school-1");

        let listed = store.list_by_student("stu-1").await.unwrap();
        assert_eq!(listed[0].payload, input);
    }
}
