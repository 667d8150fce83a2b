use crate::partition::SectionScope;
use crate::roster::RosterRow;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

pub const DB_FILE: &str = "timetable.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    // Another sidecar on the same workspace holds the write lock for the
    // length of one save; wait for it instead of failing the request.
    conn.busy_timeout(Duration::from_secs(5))?;
    init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS lecturers(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            subject_name TEXT NOT NULL,
            subject_code TEXT NOT NULL,
            room_no TEXT NOT NULL DEFAULT '',
            branch TEXT NOT NULL,
            semester INTEGER NOT NULL,
            section TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lecturers_scope ON lecturers(branch, semester, section)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable_entries(
            partition TEXT NOT NULL,
            branch TEXT NOT NULL,
            semester INTEGER NOT NULL,
            section TEXT NOT NULL,
            day TEXT NOT NULL,
            time_slot TEXT NOT NULL,
            subject_name TEXT NOT NULL,
            subject_code TEXT NOT NULL,
            lecturer_name TEXT NOT NULL,
            room_no TEXT NOT NULL DEFAULT '',
            is_lab INTEGER NOT NULL DEFAULT 0,
            lab_duration INTEGER NOT NULL DEFAULT 1,
            updated_at TEXT,
            PRIMARY KEY(partition, day, time_slot)
        )",
        [],
    )?;

    // One owner per (lecturer, day, slot) across every partition.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS lecturer_assignments(
            lecturer_name TEXT NOT NULL,
            day TEXT NOT NULL,
            time_slot TEXT NOT NULL,
            branch TEXT NOT NULL,
            semester INTEGER NOT NULL,
            section TEXT NOT NULL,
            updated_at TEXT,
            PRIMARY KEY(lecturer_name, day, time_slot)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lecturer_assignments_owner
         ON lecturer_assignments(branch, semester, section)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableEntry {
    pub branch: String,
    pub semester: i64,
    pub section: String,
    pub day: String,
    pub time_slot: String,
    pub subject_name: String,
    pub subject_code: String,
    pub lecturer_name: String,
    pub room_no: String,
    pub is_lab: bool,
    pub lab_duration: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRow {
    pub lecturer_name: String,
    pub day: String,
    pub time_slot: String,
    pub branch: String,
    pub semester: i64,
    pub section: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LecturerProfile {
    pub id: String,
    pub name: String,
    pub subject_name: String,
    pub subject_code: String,
    pub room_no: String,
    pub branch: String,
    pub semester: i64,
    pub section: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionSummary {
    pub partition: String,
    pub branch: String,
    pub semester: i64,
    pub section: String,
    pub entry_count: i64,
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn upsert_timetable_entry(
    conn: &Connection,
    partition: &str,
    entry: &TimetableEntry,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO timetable_entries(
           partition, branch, semester, section, day, time_slot,
           subject_name, subject_code, lecturer_name, room_no, is_lab, lab_duration, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(partition, day, time_slot) DO UPDATE SET
           subject_name = excluded.subject_name,
           subject_code = excluded.subject_code,
           lecturer_name = excluded.lecturer_name,
           room_no = excluded.room_no,
           is_lab = excluded.is_lab,
           lab_duration = excluded.lab_duration,
           updated_at = excluded.updated_at",
        rusqlite::params![
            partition,
            entry.branch,
            entry.semester,
            entry.section,
            entry.day,
            entry.time_slot,
            entry.subject_name,
            entry.subject_code,
            entry.lecturer_name,
            entry.room_no,
            entry.is_lab,
            entry.lab_duration,
            now_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Lecturer currently occupying a cell of a partition, if any.
pub fn entry_lecturer_at(
    conn: &Connection,
    partition: &str,
    day: &str,
    time_slot: &str,
) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT lecturer_name FROM timetable_entries
         WHERE partition = ? AND day = ? AND time_slot = ?",
        (partition, day, time_slot),
        |r| r.get(0),
    )
    .optional()
}

pub fn list_entries(conn: &Connection, partition: &str) -> rusqlite::Result<Vec<TimetableEntry>> {
    let mut stmt = conn.prepare(
        "SELECT branch, semester, section, day, time_slot, subject_name, subject_code,
                lecturer_name, room_no, is_lab, lab_duration
         FROM timetable_entries
         WHERE partition = ?
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([partition], |r| {
            Ok(TimetableEntry {
                branch: r.get(0)?,
                semester: r.get(1)?,
                section: r.get(2)?,
                day: r.get(3)?,
                time_slot: r.get(4)?,
                subject_name: r.get(5)?,
                subject_code: r.get(6)?,
                lecturer_name: r.get(7)?,
                room_no: r.get(8)?,
                is_lab: r.get(9)?,
                lab_duration: r.get(10)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_partitions(conn: &Connection) -> rusqlite::Result<Vec<PartitionSummary>> {
    let mut stmt = conn.prepare(
        "SELECT partition, MIN(branch), MIN(semester), MIN(section), COUNT(*)
         FROM timetable_entries
         GROUP BY partition
         ORDER BY partition",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(PartitionSummary {
                partition: r.get(0)?,
                branch: r.get(1)?,
                semester: r.get(2)?,
                section: r.get(3)?,
                entry_count: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Institution-wide: any partition's booking of this lecturer counts.
pub fn query_conflict(
    conn: &Connection,
    lecturer_name: &str,
    day: &str,
    time_slot: &str,
) -> rusqlite::Result<Option<LedgerRow>> {
    conn.query_row(
        "SELECT lecturer_name, day, time_slot, branch, semester, section
         FROM lecturer_assignments
         WHERE lecturer_name = ? AND day = ? AND time_slot = ?",
        (lecturer_name, day, time_slot),
        |r| {
            Ok(LedgerRow {
                lecturer_name: r.get(0)?,
                day: r.get(1)?,
                time_slot: r.get(2)?,
                branch: r.get(3)?,
                semester: r.get(4)?,
                section: r.get(5)?,
            })
        },
    )
    .optional()
}

pub fn upsert_ledger_row(
    conn: &Connection,
    lecturer_name: &str,
    day: &str,
    time_slot: &str,
    scope: &SectionScope,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO lecturer_assignments(
           lecturer_name, day, time_slot, branch, semester, section, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(lecturer_name, day, time_slot) DO UPDATE SET
           branch = excluded.branch,
           semester = excluded.semester,
           section = excluded.section,
           updated_at = excluded.updated_at",
        rusqlite::params![
            lecturer_name,
            day,
            time_slot,
            scope.branch,
            scope.semester,
            scope.section,
            now_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Drops a ledger row, but only when `scope` owns it.
pub fn release_ledger_row(
    conn: &Connection,
    lecturer_name: &str,
    day: &str,
    time_slot: &str,
    scope: &SectionScope,
) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM lecturer_assignments
         WHERE lecturer_name = ? AND day = ? AND time_slot = ?
           AND branch = ? AND semester = ? AND lower(section) = lower(?)",
        rusqlite::params![
            lecturer_name,
            day,
            time_slot,
            scope.branch,
            scope.semester,
            scope.section,
        ],
    )
}

pub fn list_lecturers(
    conn: &Connection,
    scope: &SectionScope,
) -> rusqlite::Result<Vec<LecturerProfile>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, subject_name, subject_code, room_no, branch, semester, section
         FROM lecturers
         WHERE branch = ? AND semester = ? AND lower(section) = lower(?)
         ORDER BY sort_order, rowid",
    )?;
    let rows = stmt
        .query_map((&scope.branch, scope.semester, &scope.section), |r| {
            Ok(LecturerProfile {
                id: r.get(0)?,
                name: r.get(1)?,
                subject_name: r.get(2)?,
                subject_code: r.get(3)?,
                room_no: r.get(4)?,
                branch: r.get(5)?,
                semester: r.get(6)?,
                section: r.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Appends roster rows to a scope in one transaction. Returns the new ids in
/// input order.
pub fn bulk_insert_lecturers(
    conn: &Connection,
    scope: &SectionScope,
    rows: &[RosterRow],
) -> anyhow::Result<Vec<String>> {
    let tx = conn.unchecked_transaction()?;
    let base: i64 = tx.query_row(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM lecturers
         WHERE branch = ? AND semester = ? AND lower(section) = lower(?)",
        (&scope.branch, scope.semester, &scope.section),
        |r| r.get(0),
    )?;
    let created_at = now_rfc3339();
    let mut ids = Vec::with_capacity(rows.len());
    {
        let mut stmt = tx.prepare(
            "INSERT INTO lecturers(
               id, name, subject_name, subject_code, room_no,
               branch, semester, section, sort_order, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for (i, row) in rows.iter().enumerate() {
            let id = Uuid::new_v4().to_string();
            stmt.execute(rusqlite::params![
                id,
                row.name,
                row.subject_name,
                row.subject_code,
                row.room_no,
                scope.branch,
                scope.semester,
                scope.section,
                base + i as i64,
                created_at,
            ])?;
            ids.push(id);
        }
    }
    tx.commit()?;
    Ok(ids)
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(day: &str, slot: &str, lecturer: &str) -> TimetableEntry {
        TimetableEntry {
            branch: "CSE".into(),
            semester: 5,
            section: "A".into(),
            day: day.into(),
            time_slot: slot.into(),
            subject_name: "Compilers".into(),
            subject_code: "CS501".into(),
            lecturer_name: lecturer.into(),
            room_no: "204".into(),
            is_lab: false,
            lab_duration: 1,
        }
    }

    #[test]
    fn upsert_overwrites_same_cell() {
        let conn = open_in_memory().expect("db");
        let p = "CSE_5th_sem_a_section";
        upsert_timetable_entry(&conn, p, &entry("Monday", "9:30-10:30", "Dr. A")).expect("first");
        upsert_timetable_entry(&conn, p, &entry("Monday", "9:30-10:30", "Dr. B")).expect("second");

        let rows = list_entries(&conn, p).expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].lecturer_name, "Dr. B");
        assert_eq!(
            entry_lecturer_at(&conn, p, "Monday", "9:30-10:30").expect("lookup"),
            Some("Dr. B".to_string())
        );
    }

    #[test]
    fn release_only_touches_owned_rows() {
        let conn = open_in_memory().expect("db");
        let owner = SectionScope::new("CSE", 5, "A");
        let other = SectionScope::new("ECE", 3, "B");
        upsert_ledger_row(&conn, "Dr. A", "Monday", "9:30-10:30", &owner).expect("ledger");

        let removed = release_ledger_row(&conn, "Dr. A", "Monday", "9:30-10:30", &other)
            .expect("release other");
        assert_eq!(removed, 0);
        let removed = release_ledger_row(&conn, "Dr. A", "Monday", "9:30-10:30", &owner)
            .expect("release owner");
        assert_eq!(removed, 1);
        assert!(query_conflict(&conn, "Dr. A", "Monday", "9:30-10:30")
            .expect("query")
            .is_none());
    }

    #[test]
    fn roster_lookup_ignores_section_case() {
        let conn = open_in_memory().expect("db");
        let upper = SectionScope::new("CSE", 5, "A");
        let lower = SectionScope::new("CSE", 5, "a");
        let row = |name: &str| RosterRow {
            name: name.into(),
            subject_name: "Compilers".into(),
            subject_code: "CS501".into(),
            room_no: "204".into(),
        };
        bulk_insert_lecturers(&conn, &upper, &[row("Dr. L")]).expect("upper batch");
        bulk_insert_lecturers(&conn, &lower, &[row("Dr. M")]).expect("lower batch");

        let names: Vec<_> = list_lecturers(&conn, &lower)
            .expect("list")
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, vec!["Dr. L".to_string(), "Dr. M".to_string()]);
        assert_eq!(list_lecturers(&conn, &upper).expect("list").len(), 2);
        assert!(list_lecturers(&conn, &SectionScope::new("CSE", 5, "B"))
            .expect("list")
            .is_empty());
    }

    #[test]
    fn bulk_insert_keeps_input_order_across_batches() {
        let conn = open_in_memory().expect("db");
        let scope = SectionScope::new("CSE", 5, "A");
        let row = |name: &str| RosterRow {
            name: name.into(),
            subject_name: "Networks".into(),
            subject_code: "CS502".into(),
            room_no: String::new(),
        };
        bulk_insert_lecturers(&conn, &scope, &[row("Dr. B"), row("Dr. A")]).expect("first batch");
        bulk_insert_lecturers(&conn, &scope, &[row("Dr. C")]).expect("second batch");

        let names: Vec<_> = list_lecturers(&conn, &scope)
            .expect("list")
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, vec!["Dr. B", "Dr. A", "Dr. C"]);
    }
}
