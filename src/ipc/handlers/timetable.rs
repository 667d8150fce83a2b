use crate::assign::{self, AssignError, AssignRequest};
use crate::conflict::ConflictResult;
use crate::db::{self, LecturerProfile, TimetableEntry};
use crate::grid::{self, Day};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{self, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::labs;
use crate::partition::SectionScope;
use crate::settings;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};

fn assign_err(id: &str, e: AssignError) -> serde_json::Value {
    err(id, e.code(), e.to_string(), Some(e.details()))
}

fn handle_partition(req: &Request) -> serde_json::Value {
    match helpers::scope(req) {
        Ok(scope) => ok(&req.id, json!({ "partition": scope.partition_name() })),
        Err(e) => e.response(&req.id),
    }
}

fn handle_check_conflict(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let parsed = (|| -> Result<_, HandlerErr> {
        Ok((
            helpers::scope(req)?,
            helpers::required_str(req, "lecturerName")?,
            helpers::day(req)?,
            helpers::time_slot(req)?,
        ))
    })();
    let (scope, lecturer, day, slot) = match parsed {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    match assign::dry_run(conn, &scope, &lecturer, day, slot) {
        Ok(result) => {
            let clear = result.is_clear();
            let conflict = match result {
                ConflictResult::Clear => None,
                ConflictResult::Conflict(c) => Some(c),
            };
            ok(
                &req.id,
                json!({
                    "clear": clear,
                    "message": conflict.as_ref().map(|c| c.to_string()),
                    "conflict": conflict,
                }),
            )
        }
        Err(e) => assign_err(&req.id, e),
    }
}

/// Roster row for `lecturer` in this section; `subject_code` picks between
/// rows when the lecturer teaches more than one subject here.
fn roster_lecturer(
    conn: &Connection,
    scope: &SectionScope,
    lecturer: &str,
    subject_code: Option<&str>,
) -> Result<Option<LecturerProfile>, HandlerErr> {
    let rows = db::list_lecturers(conn, scope).map_err(HandlerErr::db_query)?;
    Ok(rows
        .into_iter()
        .filter(|l| l.name == lecturer)
        .find(|l| subject_code.map_or(true, |c| l.subject_code == c)))
}

fn parse_assign(conn: &Connection, req: &Request) -> Result<AssignRequest, HandlerErr> {
    let scope = helpers::scope(req)?;
    let day = helpers::day(req)?;
    let start_slot = helpers::time_slot(req)?;
    if grid::is_break(start_slot) {
        let e = AssignError::BreakSlot {
            day,
            slot: start_slot.to_string(),
        };
        return Err(HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details: Some(e.details()),
        });
    }
    let lecturer_name = helpers::required_str(req, "lecturerName")?;
    let is_lab = match req.params.get("isLab") {
        None | Some(serde_json::Value::Null) => false,
        Some(v) => v
            .as_bool()
            .ok_or_else(|| HandlerErr::bad_params("isLab must be boolean"))?,
    };
    let span = match req.params.get("spanCount") {
        None | Some(serde_json::Value::Null) => 1,
        Some(v) => v
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| HandlerErr::bad_params("spanCount must be a positive integer"))?,
    };

    let subject_code_param = helpers::str_param(req, "subjectCode")
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let profile = roster_lecturer(conn, &scope, &lecturer_name, subject_code_param)?;
    let Some(profile) = profile else {
        return Err(HandlerErr {
            code: "bad_params",
            message: format!("{} is not on the roster for {}", lecturer_name, scope.label()),
            details: Some(json!({
                "field": "lecturerName",
                "lecturerName": lecturer_name,
            })),
        });
    };
    let room_no = helpers::str_param(req, "roomNo")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| profile.room_no.clone());

    Ok(AssignRequest {
        scope,
        day,
        start_slot: start_slot.to_string(),
        lecturer_name: profile.name,
        subject_name: profile.subject_name,
        subject_code: profile.subject_code,
        room_no,
        is_lab,
        span,
    })
}

fn handle_assign(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let assign_req = match parse_assign(conn, req) {
        Ok(r) => r,
        Err(e) => return e.response(&req.id),
    };
    let max_span = match settings::timetable_settings(conn) {
        Ok(s) => s.max_span,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    match assign::assign(conn, &assign_req, max_span) {
        Ok(outcome) => {
            let released: Vec<_> = outcome
                .released
                .iter()
                .map(|(lecturer, slot)| json!({ "lecturerName": lecturer, "timeSlot": slot }))
                .collect();
            ok(
                &req.id,
                json!({
                    "partition": outcome.partition,
                    "day": outcome.day.as_str(),
                    "committedSlots": outcome.slots,
                    "released": released,
                }),
            )
        }
        Err(e) => assign_err(&req.id, e),
    }
}

fn load_entries(
    state: &AppState,
    req: &Request,
) -> Result<(SectionScope, Vec<TimetableEntry>), HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".into(),
            details: None,
        });
    };
    let scope = helpers::scope(req)?;
    let entries = db::list_entries(conn, &scope.partition_name()).map_err(HandlerErr::db_query)?;
    Ok((scope, entries))
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    match load_entries(state, req) {
        Ok((scope, entries)) => ok(
            &req.id,
            json!({
                "partition": scope.partition_name(),
                "entries": entries,
            }),
        ),
        Err(e) => e.response(&req.id),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubjectDetail {
    subject_name: String,
    subject_code: String,
    lecturer_name: Option<String>,
}

/// Roster subjects split into theory subjects and labs, each with the first
/// lecturer listed for it.
fn subject_details(lecturers: &[LecturerProfile]) -> (Vec<SubjectDetail>, Vec<SubjectDetail>) {
    let mut subjects = Vec::new();
    let mut labs = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for l in lecturers {
        if !seen.insert((l.subject_name.as_str(), l.subject_code.as_str())) {
            continue;
        }
        let detail = SubjectDetail {
            subject_name: l.subject_name.clone(),
            subject_code: l.subject_code.clone(),
            lecturer_name: lecturers
                .iter()
                .find(|o| o.subject_name == l.subject_name && o.subject_code == l.subject_code)
                .map(|o| o.name.clone()),
        };
        if l.subject_name.to_lowercase().contains("lab") {
            labs.push(detail);
        } else {
            subjects.push(detail);
        }
    }
    (subjects, labs)
}

fn handle_view(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (scope, entries) = match load_entries(state, req) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let lecturers = match db::list_lecturers(conn, &scope) {
        Ok(l) => l,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let header = match settings::timetable_settings(conn) {
        Ok(s) => s.college_header,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let days: Vec<_> = Day::ALL
        .iter()
        .map(|&day| {
            json!({
                "day": day.as_str(),
                "cells": labs::merge_day(&entries, day),
                "hiddenSlots": labs::hidden_slots(&entries, day),
                "labBlocks": labs::lab_blocks(&entries, day),
            })
        })
        .collect();
    let (subjects, lab_subjects) = subject_details(&lecturers);

    ok(
        &req.id,
        json!({
            "partition": scope.partition_name(),
            "collegeHeader": header,
            "branch": scope.branch,
            "semester": scope.semester,
            "section": scope.section,
            "roomNo": lecturers
                .first()
                .map(|l| l.room_no.as_str())
                .filter(|r| !r.is_empty())
                .unwrap_or("N/A"),
            "slots": grid::slots(),
            "days": days,
            "subjects": subjects,
            "labs": lab_subjects,
        }),
    )
}

fn handle_partitions(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "partitions": [] }));
    };
    match db::list_partitions(conn) {
        Ok(p) => ok(&req.id, json!({ "partitions": p })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Day")]
    day: &'a str,
    #[serde(rename = "Time Slot")]
    time_slot: &'a str,
    #[serde(rename = "Subject Name")]
    subject_name: &'a str,
    #[serde(rename = "Subject Code")]
    subject_code: &'a str,
    #[serde(rename = "Lecturer Name")]
    lecturer_name: &'a str,
    #[serde(rename = "Room No")]
    room_no: &'a str,
    #[serde(rename = "Lab")]
    is_lab: bool,
    #[serde(rename = "Lab Duration")]
    lab_duration: i64,
}

fn write_export(path: &Path, entries: &[TimetableEntry]) -> anyhow::Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut sorted: Vec<&TimetableEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| (Day::parse(&e.day), grid::index_of(&e.time_slot)));

    let mut w = csv::Writer::from_path(path)?;
    for e in &sorted {
        w.serialize(ExportRow {
            day: &e.day,
            time_slot: &e.time_slot,
            subject_name: &e.subject_name,
            subject_code: &e.subject_code,
            lecturer_name: &e.lecturer_name,
            room_no: &e.room_no,
            is_lab: e.is_lab,
            lab_duration: e.lab_duration,
        })?;
    }
    w.flush()?;
    Ok(sorted.len())
}

fn handle_export_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match helpers::required_str(req, "outPath") {
        Ok(p) => PathBuf::from(p),
        Err(e) => return e.response(&req.id),
    };
    let (scope, entries) = match load_entries(state, req) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match write_export(&out_path, &entries) {
        Ok(rows) => ok(
            &req.id,
            json!({
                "partition": scope.partition_name(),
                "path": out_path.to_string_lossy(),
                "rowsExported": rows,
            }),
        ),
        Err(e) => err(
            &req.id,
            "io_failed",
            e.to_string(),
            Some(json!({ "path": out_path.to_string_lossy() })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "timetable.partition" => Some(handle_partition(req)),
        "timetable.checkConflict" => Some(handle_check_conflict(state, req)),
        "timetable.assign" => Some(handle_assign(state, req)),
        "timetable.get" => Some(handle_get(state, req)),
        "timetable.view" => Some(handle_view(state, req)),
        "timetable.partitions" => Some(handle_partitions(state, req)),
        "timetable.exportCsv" => Some(handle_export_csv(state, req)),
        _ => None,
    }
}
