use crate::catalog::{self, Programme};
use crate::grid::{self, Day};
use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_grid_slots(req: &Request) -> serde_json::Value {
    let slots: Vec<_> = grid::slots()
        .iter()
        .enumerate()
        .map(|(i, s)| {
            json!({
                "index": i,
                "label": s.label,
                "kind": s.kind,
            })
        })
        .collect();
    let days: Vec<_> = Day::ALL.iter().map(|d| d.as_str()).collect();
    let assignable: Vec<_> = grid::assignable_slots().collect();
    ok(
        &req.id,
        json!({ "days": days, "slots": slots, "assignable": assignable }),
    )
}

fn handle_branches(req: &Request) -> serde_json::Value {
    let undergraduate: Vec<_> = catalog::branches_in(Programme::Undergraduate).collect();
    let postgraduate: Vec<_> = catalog::branches_in(Programme::Postgraduate).collect();
    ok(
        &req.id,
        json!({
            "undergraduate": undergraduate,
            "postgraduate": postgraduate,
        }),
    )
}

fn handle_semesters(req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "odd": catalog::ODD_SEMESTERS,
            "even": catalog::EVEN_SEMESTERS,
        }),
    )
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grid.slots" => Some(handle_grid_slots(req)),
        "catalog.branches" => Some(handle_branches(req)),
        "catalog.semesters" => Some(handle_semesters(req)),
        _ => None,
    }
}
