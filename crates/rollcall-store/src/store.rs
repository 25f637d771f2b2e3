use crate::schema;
use chrono::{Local, NaiveDate, NaiveDateTime};
use rollcall_core::Enrollment;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cannot create data directory {0}: {1}")]
    DataDir(String, std::io::Error),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Attendance status values carried by the ledger. The engine only ever
/// writes `Present`; the other values exist for external reporting tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Late => "late",
            Self::Absent => "absent",
            Self::Excused => "excused",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "present" => Some(Self::Present),
            "late" => Some(Self::Late),
            "absent" => Some(Self::Absent),
            "excused" => Some(Self::Excused),
            _ => None,
        }
    }
}

impl ToSql for AttendanceStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AttendanceStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Self::parse(s).ok_or(FromSqlError::InvalidType)
    }
}

/// One stored attendance event, joined with the roster display name.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceRecord {
    pub identity_id: String,
    pub class_date: NaiveDate,
    pub check_in_time: NaiveDateTime,
    pub status: AttendanceStatus,
    pub confidence: Option<f64>,
    /// Roster display name; `None` when the identity is not in the roster.
    pub display_name: Option<String>,
}

/// Outcome of an attendance recording attempt.
///
/// A rejected write surfaces as the `Err` arm of the surrounding `Result`;
/// duplicates are a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    AlreadyRecorded,
}

/// Handle to the attendance database.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::DataDir(parent.display().to_string(), e))?;
            }
        }

        let conn = Connection::open(path)?;
        schema::init(&conn)?;
        tracing::info!(path = %path.display(), "attendance store opened");
        Ok(Self { conn })
    }

    /// In-memory store, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::init(&conn)?;
        Ok(Self { conn })
    }

    /// Active roster identities that have an enrollment photo on file,
    /// in roster insertion order.
    pub fn active_enrollments(&self) -> Result<Vec<Enrollment>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT student_id, display_name, photo_path
             FROM students
             WHERE active = 1 AND photo_path IS NOT NULL
             ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Enrollment {
                identity_id: row.get(0)?,
                display_name: row.get(1)?,
                photo_path: PathBuf::from(row.get::<_, String>(2)?),
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Record a `present` attendance event for today, unless one already
    /// exists for this identity today.
    pub fn record_if_absent(
        &self,
        identity_id: &str,
        confidence: f32,
    ) -> Result<RecordOutcome, StoreError> {
        let now = Local::now();
        self.record_if_absent_on(identity_id, now.date_naive(), now.naive_local(), confidence)
    }

    /// Same as [`record_if_absent`](Self::record_if_absent) with an explicit
    /// date and timestamp.
    ///
    /// The uniqueness check and the insert are one statement: the UNIQUE
    /// constraint plus `INSERT OR IGNORE` keeps them atomic under any
    /// concurrent deployment. Roster membership is not validated here.
    pub fn record_if_absent_on(
        &self,
        identity_id: &str,
        class_date: NaiveDate,
        check_in_time: NaiveDateTime,
        confidence: f32,
    ) -> Result<RecordOutcome, StoreError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO attendance
                 (student_id, class_date, check_in_time, status, confidence)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                identity_id,
                class_date,
                check_in_time,
                AttendanceStatus::Present,
                f64::from(confidence)
            ],
        )?;

        Ok(if inserted > 0 {
            RecordOutcome::Recorded
        } else {
            RecordOutcome::AlreadyRecorded
        })
    }

    /// Whether an attendance event exists for (identity, date).
    pub fn exists(&self, identity_id: &str, class_date: NaiveDate) -> Result<bool, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM attendance WHERE student_id = ?1 AND class_date = ?2")?;
        Ok(stmt.exists(params![identity_id, class_date])?)
    }

    /// All attendance events for a calendar day, joined with roster names,
    /// ordered by check-in time.
    pub fn recorded_on(&self, class_date: NaiveDate) -> Result<Vec<AttendanceRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT a.student_id, a.class_date, a.check_in_time, a.status, a.confidence,
                    s.display_name
             FROM attendance a
             LEFT JOIN students s ON s.student_id = a.student_id
             WHERE a.class_date = ?1
             ORDER BY a.check_in_time",
        )?;

        let rows = stmt.query_map(params![class_date], |row| {
            Ok(AttendanceRecord {
                identity_id: row.get(0)?,
                class_date: row.get(1)?,
                check_in_time: row.get(2)?,
                status: row.get(3)?,
                confidence: row.get(4)?,
                display_name: row.get(5)?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_student(store: &Store, id: &str, name: &str, photo: Option<&str>) {
        store
            .conn
            .execute(
                "INSERT INTO students (student_id, display_name, photo_path) VALUES (?1, ?2, ?3)",
                params![id, name, photo],
            )
            .unwrap();
    }

    fn attendance_count(store: &Store, id: &str) -> i64 {
        store
            .conn
            .query_row(
                "SELECT COUNT(*) FROM attendance WHERE student_id = ?1",
                params![id],
                |row| row.get(0),
            )
            .unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_record_then_duplicate_same_day() {
        let store = Store::open_in_memory().unwrap();
        seed_student(&store, "s1", "Ada Lovelace", Some("/photos/s1.png"));

        let date = day(2026, 3, 9);
        let ts = date.and_hms_opt(9, 30, 0).unwrap();

        let first = store.record_if_absent_on("s1", date, ts, 0.91).unwrap();
        assert_eq!(first, RecordOutcome::Recorded);

        let second = store
            .record_if_absent_on("s1", date, date.and_hms_opt(9, 45, 0).unwrap(), 0.88)
            .unwrap();
        assert_eq!(second, RecordOutcome::AlreadyRecorded);

        assert_eq!(attendance_count(&store, "s1"), 1);
    }

    #[test]
    fn test_record_distinct_days() {
        let store = Store::open_in_memory().unwrap();
        seed_student(&store, "s1", "Ada Lovelace", None);

        let monday = day(2026, 3, 9);
        let tuesday = day(2026, 3, 10);

        let a = store
            .record_if_absent_on("s1", monday, monday.and_hms_opt(9, 0, 0).unwrap(), 0.8)
            .unwrap();
        let b = store
            .record_if_absent_on("s1", tuesday, tuesday.and_hms_opt(9, 0, 0).unwrap(), 0.8)
            .unwrap();

        assert_eq!(a, RecordOutcome::Recorded);
        assert_eq!(b, RecordOutcome::Recorded);
        assert_eq!(attendance_count(&store, "s1"), 2);
    }

    #[test]
    fn test_record_unknown_identity_is_best_effort() {
        // Recording is decoupled from roster membership.
        let store = Store::open_in_memory().unwrap();
        let date = day(2026, 3, 9);

        let outcome = store
            .record_if_absent_on("ghost", date, date.and_hms_opt(10, 0, 0).unwrap(), 0.7)
            .unwrap();
        assert_eq!(outcome, RecordOutcome::Recorded);
    }

    #[test]
    fn test_exists() {
        let store = Store::open_in_memory().unwrap();
        let date = day(2026, 3, 9);

        assert!(!store.exists("s1", date).unwrap());
        store
            .record_if_absent_on("s1", date, date.and_hms_opt(9, 0, 0).unwrap(), 0.9)
            .unwrap();
        assert!(store.exists("s1", date).unwrap());
        assert!(!store.exists("s1", day(2026, 3, 10)).unwrap());
    }

    #[test]
    fn test_active_enrollments_filters_and_order() {
        let store = Store::open_in_memory().unwrap();
        seed_student(&store, "s1", "Ada Lovelace", Some("/photos/s1.png"));
        seed_student(&store, "s2", "Grace Hopper", None); // no photo
        seed_student(&store, "s3", "Alan Turing", Some("/photos/s3.png"));
        store
            .conn
            .execute("UPDATE students SET active = 0 WHERE student_id = 's3'", [])
            .unwrap();
        seed_student(&store, "s4", "Katherine Johnson", Some("/photos/s4.png"));

        let enrollments = store.active_enrollments().unwrap();
        let ids: Vec<&str> = enrollments.iter().map(|e| e.identity_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s4"]);
        assert_eq!(enrollments[0].display_name, "Ada Lovelace");
    }

    #[test]
    fn test_recorded_on_joins_display_names() {
        let store = Store::open_in_memory().unwrap();
        seed_student(&store, "s1", "Ada Lovelace", Some("/photos/s1.png"));

        let date = day(2026, 3, 9);
        store
            .record_if_absent_on("s1", date, date.and_hms_opt(9, 12, 0).unwrap(), 0.93)
            .unwrap();
        store
            .record_if_absent_on("ghost", date, date.and_hms_opt(9, 20, 0).unwrap(), 0.71)
            .unwrap();

        let records = store.recorded_on(date).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].identity_id, "s1");
        assert_eq!(records[0].display_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(records[0].status, AttendanceStatus::Present);
        assert!((records[0].confidence.unwrap() - 0.93).abs() < 1e-6);

        assert_eq!(records[1].identity_id, "ghost");
        assert!(records[1].display_name.is_none());

        // Other days stay empty.
        assert!(store.recorded_on(day(2026, 3, 10)).unwrap().is_empty());
    }
}
