//! Recording repository — CRUD operations for the `recordings` table.

use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use super::{Database, DatabaseError};

/// A raw recording row from the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingRow {
    pub id: String,
    pub project_id: String,
    pub filename: String,
    /// Object-store key of the raw audio. Immutable once set.
    pub storage_path: String,
    pub duration_seconds: Option<f64>,
    pub sample_rate: Option<u32>,
    pub created_at: String,
}

impl RecordingRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            filename: row.get("filename")?,
            storage_path: row.get("storage_path")?,
            duration_seconds: row.get("duration_seconds")?,
            sample_rate: row.get("sample_rate")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Sort field for recording listings. Whitelisted so user input never
/// reaches the ORDER BY clause directly.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedAt,
    Filename,
    Duration,
}

impl SortField {
    fn column(self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::Filename => "filename",
            SortField::Duration => "duration_seconds",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Query filter parameters for recording listings.
#[derive(Debug, Default, Clone)]
pub struct RecordingFilter {
    /// Substring match on the original filename.
    pub search: Option<String>,
    pub min_duration: Option<f64>,
    pub max_duration: Option<f64>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new recording row.
pub fn insert(db: &Database, recording: &RecordingRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO recordings (id, project_id, filename, storage_path,
             duration_seconds, sample_rate, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                recording.id,
                recording.project_id,
                recording.filename,
                recording.storage_path,
                recording.duration_seconds,
                recording.sample_rate,
                recording.created_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a recording by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<RecordingRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM recordings WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], RecordingRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Deletes a recording. The spectrogram job row cascades (foreign key).
/// Returns true when a row was removed.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM recordings WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}

/// Back-fills duration and sample rate discovered by the decode step.
pub fn update_audio_metadata(
    db: &Database,
    id: &str,
    duration_seconds: f64,
    sample_rate: u32,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE recordings SET duration_seconds = ?2, sample_rate = ?3 WHERE id = ?1",
            params![id, duration_seconds, sample_rate],
        )?;
        Ok(())
    })
}

/// Lists recordings for a project with filters, returning (rows, total_count).
pub fn list(
    db: &Database,
    project_id: &str,
    filter: &RecordingFilter,
) -> Result<(Vec<RecordingRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = vec!["project_id = ?1".to_string()];
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(project_id.to_string())];

        if let Some(ref search) = filter.search {
            conditions.push(format!("filename LIKE ?{}", param_values.len() + 1));
            param_values.push(Box::new(format!("%{}%", search)));
        }
        if let Some(min) = filter.min_duration {
            conditions.push(format!("duration_seconds >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(min));
        }
        if let Some(max) = filter.max_duration {
            conditions.push(format!("duration_seconds <= ?{}", param_values.len() + 1));
            param_values.push(Box::new(max));
        }

        let where_clause = format!("WHERE {}", conditions.join(" AND "));

        // Count total matching rows.
        let count_sql = format!("SELECT COUNT(*) FROM recordings {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        // Fetch paginated results.
        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM recordings {} ORDER BY {} {} LIMIT ?{} OFFSET ?{}",
            where_clause,
            filter.sort_by.column(),
            filter.sort_order.keyword(),
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<RecordingRow> = stmt
            .query_map(params_ref.as_slice(), RecordingRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// IDs of recordings with no completed spectrogram job — the candidates
/// for bulk regeneration.
pub fn ids_without_completed_job(db: &Database) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT r.id FROM recordings r
             LEFT JOIN spectrogram_jobs j ON j.recording_id = r.id
             WHERE j.recording_id IS NULL OR j.status != 'completed'
             ORDER BY r.created_at",
        )?;
        let ids: Vec<String> = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_recording(id: &str, project_id: &str) -> RecordingRow {
        RecordingRow {
            id: id.to_string(),
            project_id: project_id.to_string(),
            filename: format!("{id}.wav"),
            storage_path: format!("recordings/{project_id}/{id}/{id}.wav"),
            duration_seconds: None,
            sample_rate: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        insert(&db, &sample_recording("r1", "p1")).unwrap();

        let found = find_by_id(&db, "r1").unwrap().unwrap();
        assert_eq!(found.project_id, "p1");
        assert_eq!(found.filename, "r1.wav");
        assert!(found.duration_seconds.is_none());
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, "missing").unwrap().is_none());
    }

    #[test]
    fn test_update_audio_metadata() {
        let db = test_db();
        insert(&db, &sample_recording("r1", "p1")).unwrap();

        update_audio_metadata(&db, "r1", 2.5, 44100).unwrap();

        let found = find_by_id(&db, "r1").unwrap().unwrap();
        assert_eq!(found.duration_seconds, Some(2.5));
        assert_eq!(found.sample_rate, Some(44100));
    }

    #[test]
    fn test_delete() {
        let db = test_db();
        insert(&db, &sample_recording("r1", "p1")).unwrap();

        assert!(delete(&db, "r1").unwrap());
        assert!(!delete(&db, "r1").unwrap());
        assert!(find_by_id(&db, "r1").unwrap().is_none());
    }

    #[test]
    fn test_list_scoped_to_project() {
        let db = test_db();
        insert(&db, &sample_recording("a", "p1")).unwrap();
        insert(&db, &sample_recording("b", "p1")).unwrap();
        insert(&db, &sample_recording("c", "p2")).unwrap();

        let (rows, total) = list(&db, "p1", &RecordingFilter::default()).unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.project_id == "p1"));
    }

    #[test]
    fn test_list_search_filter() {
        let db = test_db();
        let mut rec = sample_recording("a", "p1");
        rec.filename = "morning_chorus.wav".to_string();
        insert(&db, &rec).unwrap();
        insert(&db, &sample_recording("b", "p1")).unwrap();

        let (rows, total) = list(
            &db,
            "p1",
            &RecordingFilter {
                search: Some("chorus".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, "a");
    }

    #[test]
    fn test_list_duration_filters() {
        let db = test_db();
        for (id, dur) in [("short", 1.0), ("mid", 10.0), ("long", 100.0)] {
            let mut rec = sample_recording(id, "p1");
            rec.duration_seconds = Some(dur);
            insert(&db, &rec).unwrap();
        }

        let (rows, _) = list(
            &db,
            "p1",
            &RecordingFilter {
                min_duration: Some(5.0),
                max_duration: Some(50.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "mid");
    }

    #[test]
    fn test_list_pagination_and_sort() {
        let db = test_db();
        for i in 0..10 {
            let mut rec = sample_recording(&format!("r{i}"), "p1");
            rec.created_at = format!("2026-01-{:02}T00:00:00Z", i + 1);
            insert(&db, &rec).unwrap();
        }

        let (rows, total) = list(
            &db,
            "p1",
            &RecordingFilter {
                sort_by: SortField::CreatedAt,
                sort_order: SortOrder::Desc,
                limit: Some(3),
                offset: Some(0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 10);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].id, "r9");
    }

    #[test]
    fn test_ids_without_completed_job() {
        let db = test_db();
        insert(&db, &sample_recording("no_job", "p1")).unwrap();
        insert(&db, &sample_recording("failed_job", "p1")).unwrap();
        insert(&db, &sample_recording("done", "p1")).unwrap();

        crate::db::job_repo::ensure_pending(&db, "failed_job").unwrap();
        assert!(crate::db::job_repo::claim(&db, "failed_job").unwrap());
        crate::db::job_repo::mark_failed(&db, "failed_job", "decode error", Some(0.1)).unwrap();

        crate::db::job_repo::ensure_pending(&db, "done").unwrap();
        assert!(crate::db::job_repo::claim(&db, "done").unwrap());
        crate::db::job_repo::mark_completed(
            &db,
            "done",
            "spectrograms/done/spectrogram.png",
            800,
            400,
            1.0,
            "{}",
        )
        .unwrap();

        let ids = ids_without_completed_job(&db).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"no_job".to_string()));
        assert!(ids.contains(&"failed_job".to_string()));
    }

    #[test]
    fn test_delete_cascades_to_job() {
        let db = test_db();
        insert(&db, &sample_recording("r1", "p1")).unwrap();
        crate::db::job_repo::ensure_pending(&db, "r1").unwrap();

        delete(&db, "r1").unwrap();

        assert!(crate::db::job_repo::find_by_recording(&db, "r1")
            .unwrap()
            .is_none());
    }
}
