use crate::flow::{CellEvent, CellState, InvalidTransition, WizardEvent, WizardStep};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde::de::DeserializeOwned;
use serde_json::json;

fn parse_param<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, serde_json::Value> {
    let Some(raw) = req.params.get(key) else {
        return Err(err(&req.id, "bad_params", format!("missing {}", key), None));
    };
    serde_json::from_value(raw.clone()).map_err(|e| {
        err(
            &req.id,
            "bad_params",
            format!("invalid {}: {}", key, e),
            Some(json!({ "field": key })),
        )
    })
}

fn transition_err(id: &str, e: InvalidTransition) -> serde_json::Value {
    err(
        id,
        "invalid_transition",
        e.to_string(),
        Some(json!({
            "state": e.state,
            "event": e.event,
            "reason": e.reason,
        })),
    )
}

fn handle_cell(req: &Request) -> serde_json::Value {
    let state: CellState = match parse_param(req, "state") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let event: CellEvent = match parse_param(req, "event") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state.on(event) {
        Ok(next) => ok(&req.id, json!({ "state": next })),
        Err(e) => transition_err(&req.id, e),
    }
}

fn handle_wizard(req: &Request) -> serde_json::Value {
    let step: WizardStep = match req.params.get("step") {
        None | Some(serde_json::Value::Null) => WizardStep::Welcome,
        Some(_) => match parse_param(req, "step") {
            Ok(v) => v,
            Err(resp) => return resp,
        },
    };
    let event: WizardEvent = match parse_param(req, "event") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match step.on(event) {
        Ok(next) => ok(&req.id, json!({ "step": next })),
        Err(e) => transition_err(&req.id, e),
    }
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "flow.cell" => Some(handle_cell(req)),
        "flow.wizard" => Some(handle_wizard(req)),
        _ => None,
    }
}
