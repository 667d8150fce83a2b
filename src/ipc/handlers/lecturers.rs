use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{self, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, RosterError, RosterImport, RosterRow};
use crate::settings;
use rusqlite::Connection;
use serde_json::json;
use std::fs::File;

const BULK_INSERT_MAX_ROWS: usize = 2000;

fn handle_lecturers_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "lecturers": [] }));
    };
    let scope = match helpers::scope(req) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    match db::list_lecturers(conn, &scope) {
        Ok(lecturers) => ok(&req.id, json!({ "lecturers": lecturers })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn insert_rows(
    conn: &Connection,
    req: &Request,
    rows: &[RosterRow],
) -> Result<Vec<String>, HandlerErr> {
    if rows.len() > BULK_INSERT_MAX_ROWS {
        return Err(HandlerErr {
            code: "bad_params",
            message: format!("at most {} rows per request", BULK_INSERT_MAX_ROWS),
            details: Some(json!({ "rowCount": rows.len() })),
        });
    }
    let scope = helpers::scope(req)?;
    let ids = db::bulk_insert_lecturers(conn, &scope, rows).map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "lecturers" })),
    })?;
    tracing::info!(
        partition = %scope.partition_name(),
        inserted = ids.len(),
        "roster rows inserted"
    );
    Ok(ids)
}

fn handle_lecturers_bulk_insert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(raw_rows) = req.params.get("rows") else {
        return err(&req.id, "bad_params", "missing rows", None);
    };
    let rows = match roster::rows_from_json(raw_rows) {
        Ok(r) => r,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match insert_rows(conn, req, &rows) {
        Ok(ids) => ok(&req.id, json!({ "inserted": ids.len(), "ids": ids })),
        Err(e) => e.response(&req.id),
    }
}

fn roster_err(e: RosterError) -> HandlerErr {
    match e {
        RosterError::MissingColumn(col) => HandlerErr {
            code: "bad_params",
            message: e.to_string(),
            details: Some(json!({ "column": col })),
        },
        RosterError::Csv(_) | RosterError::Workbook(_) | RosterError::NoWorksheet => HandlerErr {
            code: "bad_params",
            message: e.to_string(),
            details: None,
        },
    }
}

fn open_roster_file(req: &Request, path: &str) -> Result<File, serde_json::Value> {
    File::open(path).map_err(|e| {
        err(
            &req.id,
            "io_failed",
            e.to_string(),
            Some(json!({ "path": path })),
        )
    })
}

fn import_parsed(
    conn: &Connection,
    req: &Request,
    parsed: Result<RosterImport, RosterError>,
) -> serde_json::Value {
    let parsed = match parsed {
        Ok(p) => p,
        Err(e) => return roster_err(e).response(&req.id),
    };

    match insert_rows(conn, req, &parsed.rows) {
        Ok(ids) => ok(
            &req.id,
            json!({
                "inserted": ids.len(),
                "ids": ids,
                "skipped": parsed.skipped,
            }),
        ),
        Err(e) => e.response(&req.id),
    }
}

fn handle_lecturers_import_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    // Validate the scope before reading anything.
    if let Err(e) = helpers::scope(req) {
        return e.response(&req.id);
    }
    let opts = match settings::roster_options(conn) {
        Ok(o) => o,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let parsed = if let Some(text) = helpers::str_param(req, "csvText") {
        roster::parse_roster_csv(text.as_bytes(), &opts)
    } else if let Some(path) = helpers::str_param(req, "path") {
        match open_roster_file(req, path) {
            Ok(file) => roster::parse_roster_csv(file, &opts),
            Err(resp) => return resp,
        }
    } else {
        return err(&req.id, "bad_params", "missing csvText or path", None);
    };
    import_parsed(conn, req, parsed)
}

fn handle_lecturers_import_xlsx(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = helpers::scope(req) {
        return e.response(&req.id);
    }
    let Some(path) = helpers::str_param(req, "path") else {
        return err(&req.id, "bad_params", "missing path", None);
    };
    let opts = match settings::roster_options(conn) {
        Ok(o) => o,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let file = match open_roster_file(req, path) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let parsed = roster::parse_roster_xlsx(std::io::BufReader::new(file), &opts);
    import_parsed(conn, req, parsed)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "lecturers.list" => Some(handle_lecturers_list(state, req)),
        "lecturers.bulkInsert" => Some(handle_lecturers_bulk_insert(state, req)),
        "lecturers.importCsv" => Some(handle_lecturers_import_csv(state, req)),
        "lecturers.importXlsx" => Some(handle_lecturers_import_xlsx(state, req)),
        _ => None,
    }
}
