use crate::grid::{self, Day};
use crate::ipc::error::err;
use crate::ipc::types::Request;
use crate::partition::{self, SectionScope};
use serde_json::json;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn db_query(e: impl std::fmt::Display) -> Self {
        Self {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn str_param<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params.get(key).and_then(|v| v.as_str())
}

pub fn required_str(req: &Request, key: &str) -> Result<String, HandlerErr> {
    match str_param(req, key).map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must not be empty", key))),
        None => Err(HandlerErr::bad_params(format!("missing {}", key))),
    }
}

pub fn scope(req: &Request) -> Result<SectionScope, HandlerErr> {
    partition::scope_from_params(&req.params).map_err(HandlerErr::bad_params)
}

pub fn day(req: &Request) -> Result<Day, HandlerErr> {
    let raw = required_str(req, "day")?;
    Day::parse(&raw).ok_or_else(|| HandlerErr {
        code: "bad_params",
        message: format!("unknown day: {}", raw),
        details: Some(json!({ "day": raw })),
    })
}

/// Any slot label of the grid, breaks included; callers decide what a break means.
pub fn time_slot(req: &Request) -> Result<&'static str, HandlerErr> {
    let raw = required_str(req, "timeSlot")?;
    grid::canonical_slot(&raw).ok_or_else(|| HandlerErr {
        code: "bad_params",
        message: format!("unknown time slot: {}", raw),
        details: Some(json!({ "timeSlot": raw })),
    })
}
