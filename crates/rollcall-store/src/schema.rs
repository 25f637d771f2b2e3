//! Schema bootstrap, run on every open.
//!
//! The roster (`students`) is written by external tooling; the engine only
//! reads it. The `UNIQUE (student_id, class_date)` constraint is what makes
//! the ledger's insert-if-absent atomic, also across processes.

use rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id TEXT UNIQUE NOT NULL,
    display_name TEXT NOT NULL,
    photo_path TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS attendance (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id TEXT NOT NULL REFERENCES students (student_id),
    class_date TEXT NOT NULL,
    check_in_time TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'present',
    confidence REAL,
    UNIQUE (student_id, class_date)
);

CREATE INDEX IF NOT EXISTS idx_attendance_class_date ON attendance (class_date);
";

pub(crate) fn init(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)
}
