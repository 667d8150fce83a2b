use crate::db;
use crate::labs::MAX_BLOCK_SPAN;
use crate::roster::RosterOptions;
use serde_json::{json, Map, Value};

pub const DEFAULT_MAX_SPAN: usize = 3;
pub const DEFAULT_COLLEGE_HEADER: &str = "PROUDHADEVARAYA INSTITUTE OF TECHNOLOGY";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupSection {
    Timetable,
    Roster,
}

impl SetupSection {
    pub const ALL: [SetupSection; 2] = [SetupSection::Timetable, SetupSection::Roster];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "timetable" => Some(Self::Timetable),
            "roster" => Some(Self::Roster),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Timetable => "timetable",
            Self::Roster => "roster",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Timetable => "setup.timetable",
            Self::Roster => "setup.roster",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Timetable => json!({
            "collegeHeader": DEFAULT_COLLEGE_HEADER,
            "maxSpan": DEFAULT_MAX_SPAN,
        }),
        SetupSection::Roster => json!({
            "defaultRoomNo": "",
            "skipBlankRows": true,
        }),
    }
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool()
        .ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

pub fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Timetable => match k.as_str() {
                "collegeHeader" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 120)?));
                }
                "maxSpan" => {
                    let n = parse_i64_range(v, k, 1, MAX_BLOCK_SPAN as i64)?;
                    obj.insert(k.clone(), Value::from(n));
                }
                _ => return Err(format!("unknown timetable field: {}", k)),
            },
            SetupSection::Roster => match k.as_str() {
                "defaultRoomNo" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 32)?));
                }
                "skipBlankRows" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown roster field: {}", k)),
            },
        }
    }
    Ok(())
}

pub fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values fall back to defaults field by field.
            for (k, v) in saved_obj {
                let mut one = Map::new();
                one.insert(k.clone(), v.clone());
                if merge_section_patch(section, &mut current, &one).is_err() {
                    tracing::warn!(section = section.name(), field = %k, "ignoring invalid saved setting");
                }
            }
        }
    }
    Ok(current)
}

/// Validates `patch` against the stored section and persists the result.
pub fn update_section(
    conn: &rusqlite::Connection,
    section: SetupSection,
    patch: &Map<String, Value>,
) -> Result<Value, UpdateError> {
    let mut current = load_section(conn, section).map_err(UpdateError::Store)?;
    merge_section_patch(section, &mut current, patch).map_err(UpdateError::Invalid)?;
    db::settings_set_json(conn, section.key(), &current).map_err(UpdateError::Store)?;
    Ok(current)
}

#[derive(Debug)]
pub enum UpdateError {
    Invalid(String),
    Store(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimetableSettings {
    pub college_header: String,
    pub max_span: usize,
}

pub fn timetable_settings(conn: &rusqlite::Connection) -> anyhow::Result<TimetableSettings> {
    let v = load_section(conn, SetupSection::Timetable)?;
    Ok(TimetableSettings {
        college_header: v
            .get("collegeHeader")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_COLLEGE_HEADER)
            .to_string(),
        max_span: v
            .get("maxSpan")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_SPAN),
    })
}

pub fn roster_options(conn: &rusqlite::Connection) -> anyhow::Result<RosterOptions> {
    let v = load_section(conn, SetupSection::Roster)?;
    let defaults = RosterOptions::default();
    Ok(RosterOptions {
        default_room_no: v
            .get("defaultRoomNo")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or(defaults.default_room_no),
        skip_blank_rows: v
            .get("skipBlankRows")
            .and_then(|v| v.as_bool())
            .unwrap_or(defaults.skip_blank_rows),
    })
}
