//! One logical save: a lecturer placed on `span` consecutive slots of a day.
//!
//! The conflict check and every write of the save run inside a single
//! `BEGIN IMMEDIATE` transaction. Two sidecars on the same workspace therefore
//! serialize on the database write lock, and the check is always made against
//! committed state. On the first conflict or store failure the transaction is
//! dropped, so no slot of the save survives.

use crate::conflict::{self, Conflict, ConflictResult};
use crate::db::{self, TimetableEntry};
use crate::grid::{self, Day};
use crate::labs::{self, SpanError};
use crate::partition::SectionScope;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde_json::json;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct AssignRequest {
    pub scope: SectionScope,
    pub day: Day,
    pub start_slot: String,
    pub lecturer_name: String,
    pub subject_name: String,
    pub subject_code: String,
    pub room_no: String,
    pub is_lab: bool,
    pub span: usize,
}

#[derive(Debug, Clone)]
pub struct AssignOutcome {
    pub partition: String,
    pub day: Day,
    pub slots: Vec<&'static str>,
    /// Lecturers displaced from a cell by this save, with the slot each one
    /// was released from.
    pub released: Vec<(String, &'static str)>,
}

#[derive(Debug, thiserror::Error)]
pub enum AssignError {
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("{slot} on {day} is a break and cannot be assigned")]
    BreakSlot { day: Day, slot: String },
    #[error("cannot combine hours across breaks or end of day")]
    SpanOverrun {
        start: String,
        span: usize,
        position: usize,
    },
    #[error("{conflict}")]
    Conflict {
        conflict: Conflict,
        rolled_back: Vec<&'static str>,
    },
    #[error("timetable store unavailable: {source}")]
    Store {
        slot: Option<&'static str>,
        rolled_back: Vec<&'static str>,
        source: rusqlite::Error,
    },
}

impl AssignError {
    pub fn code(&self) -> &'static str {
        match self {
            AssignError::Validation { .. } => "bad_params",
            AssignError::BreakSlot { .. } => "break_slot",
            AssignError::SpanOverrun { .. } => "span_overrun",
            AssignError::Conflict { .. } => "lecturer_conflict",
            AssignError::Store { .. } => "store_unavailable",
        }
    }

    pub fn details(&self) -> serde_json::Value {
        match self {
            AssignError::Validation { field, .. } => json!({ "field": field }),
            AssignError::BreakSlot { day, slot } => json!({
                "day": day.as_str(),
                "slot": slot,
            }),
            AssignError::SpanOverrun {
                start,
                span,
                position,
            } => json!({
                "startSlot": start,
                "spanCount": span,
                "position": position,
                "committedSlots": [],
            }),
            AssignError::Conflict {
                conflict,
                rolled_back,
            } => json!({
                "lecturerName": conflict.lecturer_name,
                "day": conflict.day,
                "slot": conflict.time_slot,
                "branch": conflict.branch,
                "semester": conflict.semester,
                "section": conflict.section,
                "committedSlots": [],
                "rolledBackSlots": rolled_back,
            }),
            AssignError::Store {
                slot, rolled_back, ..
            } => json!({
                "slot": slot,
                "committedSlots": [],
                "rolledBackSlots": rolled_back,
            }),
        }
    }
}

fn validate(req: &AssignRequest) -> Result<(), AssignError> {
    if req.lecturer_name.trim().is_empty() {
        return Err(AssignError::Validation {
            field: "lecturerName",
            message: "lecturerName must not be empty".into(),
        });
    }
    if grid::index_of(&req.start_slot).is_none() {
        return Err(AssignError::Validation {
            field: "timeSlot",
            message: format!("unknown time slot: {}", req.start_slot),
        });
    }
    // Breaks are refused before the ledger is consulted.
    if grid::is_break(&req.start_slot) {
        return Err(AssignError::BreakSlot {
            day: req.day,
            slot: req.start_slot.clone(),
        });
    }
    Ok(())
}

fn expand(req: &AssignRequest, max_span: usize) -> Result<Vec<&'static str>, AssignError> {
    labs::expand_span(&req.start_slot, req.span, max_span).map_err(|e| match e {
        SpanError::Overrun {
            start,
            span,
            position,
        } => AssignError::SpanOverrun {
            start: start.to_string(),
            span,
            position,
        },
        SpanError::OutOfRange { .. } => AssignError::Validation {
            field: "spanCount",
            message: e.to_string(),
        },
        SpanError::UnknownSlot(_) => AssignError::Validation {
            field: "timeSlot",
            message: e.to_string(),
        },
    })
}

fn entry_for(req: &AssignRequest, slot: &str) -> TimetableEntry {
    TimetableEntry {
        branch: req.scope.branch.clone(),
        semester: req.scope.semester,
        section: req.scope.section.clone(),
        day: req.day.as_str().to_string(),
        time_slot: slot.to_string(),
        subject_name: req.subject_name.clone(),
        subject_code: req.subject_code.clone(),
        lecturer_name: req.lecturer_name.clone(),
        room_no: req.room_no.clone(),
        is_lab: req.is_lab,
        lab_duration: if req.is_lab { req.span as i64 } else { 1 },
    }
}

/// Checks a single cell without writing anything.
pub fn dry_run(
    conn: &Connection,
    scope: &SectionScope,
    lecturer_name: &str,
    day: Day,
    slot: &str,
) -> Result<ConflictResult, AssignError> {
    if grid::is_break(slot) {
        return Err(AssignError::BreakSlot {
            day,
            slot: slot.to_string(),
        });
    }
    conflict::check_conflict(conn, lecturer_name, day, slot, scope).map_err(|source| {
        AssignError::Store {
            slot: grid::canonical_slot(slot),
            rolled_back: Vec::new(),
            source,
        }
    })
}

pub fn assign(
    conn: &Connection,
    req: &AssignRequest,
    max_span: usize,
) -> Result<AssignOutcome, AssignError> {
    validate(req)?;
    let slots = expand(req, max_span)?;
    let partition = req.scope.partition_name();
    let day = req.day.as_str();
    let lecturer = req.lecturer_name.as_str();

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate).map_err(|source| {
        error!(%partition, error = %source, "could not open save transaction");
        AssignError::Store {
            slot: None,
            rolled_back: Vec::new(),
            source,
        }
    })?;

    let mut written: Vec<&'static str> = Vec::with_capacity(slots.len());
    let mut released = Vec::new();
    for &slot in &slots {
        let store_err = |written: &Vec<&'static str>, source: rusqlite::Error| {
            error!(%partition, day, slot, error = %source, "save failed; rolling back");
            AssignError::Store {
                slot: Some(slot),
                rolled_back: written.clone(),
                source,
            }
        };

        match conflict::check_conflict(&tx, lecturer, req.day, slot, &req.scope) {
            Ok(ConflictResult::Clear) => {}
            Ok(ConflictResult::Conflict(conflict)) => {
                warn!(
                    %partition,
                    lecturer,
                    day,
                    slot,
                    owner = %format!("{} {}-{}", conflict.branch, conflict.semester, conflict.section),
                    "lecturer conflict; rolling back"
                );
                return Err(AssignError::Conflict {
                    conflict,
                    rolled_back: written,
                });
            }
            Err(e) => return Err(store_err(&written, e)),
        }

        let previous = db::entry_lecturer_at(&tx, &partition, day, slot)
            .map_err(|e| store_err(&written, e))?;
        if let Some(prev) = previous.filter(|p| p != lecturer) {
            db::release_ledger_row(&tx, &prev, day, slot, &req.scope)
                .map_err(|e| store_err(&written, e))?;
            released.push((prev, slot));
        }

        db::upsert_timetable_entry(&tx, &partition, &entry_for(req, slot))
            .map_err(|e| store_err(&written, e))?;
        db::upsert_ledger_row(&tx, lecturer, day, slot, &req.scope)
            .map_err(|e| store_err(&written, e))?;
        written.push(slot);
    }

    if let Err(source) = tx.commit() {
        error!(%partition, error = %source, "save commit failed");
        return Err(AssignError::Store {
            slot: None,
            rolled_back: written,
            source,
        });
    }

    info!(
        %partition,
        lecturer,
        day,
        start = slots[0],
        span = slots.len(),
        lab = req.is_lab,
        "timetable entry saved"
    );
    Ok(AssignOutcome {
        partition,
        day: req.day,
        slots,
        released,
    })
}
