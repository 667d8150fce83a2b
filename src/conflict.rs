use crate::db::{self, LedgerRow};
use crate::grid::Day;
use crate::partition::SectionScope;
use rusqlite::Connection;
use serde::Serialize;

/// Another section already holds this lecturer at this (day, slot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub lecturer_name: String,
    pub day: String,
    pub time_slot: String,
    pub branch: String,
    pub semester: i64,
    pub section: String,
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} is already assigned to {} {}-{} at this time",
            self.lecturer_name, self.branch, self.semester, self.section
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictResult {
    Clear,
    Conflict(Conflict),
}

impl ConflictResult {
    pub fn is_clear(&self) -> bool {
        matches!(self, ConflictResult::Clear)
    }
}

/// A ledger row owned by the caller's own section is a re-save, not a clash.
pub fn evaluate(existing: Option<&LedgerRow>, scope: &SectionScope) -> ConflictResult {
    match existing {
        None => ConflictResult::Clear,
        Some(row) if scope.same_section(&row.branch, row.semester, &row.section) => {
            ConflictResult::Clear
        }
        Some(row) => ConflictResult::Conflict(Conflict {
            lecturer_name: row.lecturer_name.clone(),
            day: row.day.clone(),
            time_slot: row.time_slot.clone(),
            branch: row.branch.clone(),
            semester: row.semester,
            section: row.section.clone(),
        }),
    }
}

pub fn check_conflict(
    conn: &Connection,
    lecturer_name: &str,
    day: Day,
    time_slot: &str,
    scope: &SectionScope,
) -> rusqlite::Result<ConflictResult> {
    let existing = db::query_conflict(conn, lecturer_name, day.as_str(), time_slot)?;
    Ok(evaluate(existing.as_ref(), scope))
}
