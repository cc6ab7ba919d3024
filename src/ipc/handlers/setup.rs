use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::seating::layouts;
use crate::seating::student::PoolSort;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Seating,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "seating" => Some(Self::Seating),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Seating => "setup.seating",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Seating => json!({
            "defaultLayoutId": layouts::DEFAULT_LAYOUT_ID,
            "unassignedSortBy": PoolSort::default().as_str(),
            "defaultAttendanceRate": 95
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
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

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Seating => match k.as_str() {
                "defaultLayoutId" => {
                    let id = parse_string_max(v, k, 64)?;
                    if layouts::find(&id).is_none() {
                        return Err(format!("unknown layout: {}", id));
                    }
                    obj.insert(k.clone(), Value::String(id));
                }
                "unassignedSortBy" => {
                    let s = parse_string_max(v, k, 16)?;
                    let Some(sort) = PoolSort::parse(&s) else {
                        return Err(format!(
                            "{} must be one of name, xp, attendance, behavior",
                            k
                        ));
                    };
                    obj.insert(k.clone(), Value::String(sort.as_str().to_string()));
                }
                "defaultAttendanceRate" => {
                    obj.insert(k.clone(), json!(parse_i64_range(v, k, 0, 100)?));
                }
                _ => return Err(format!("unknown seating field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(
    conn: &rusqlite::Connection,
    section: SetupSection,
) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Best-effort: a bad stored field leaves the rest applied.
            for (k, v) in saved_obj {
                let mut one = Map::new();
                one.insert(k.clone(), v.clone());
                if let Err(msg) = merge_section_patch(section, &mut current, &one) {
                    log::warn!("ignoring stored {} value: {}", section.key(), msg);
                }
            }
        }
    }
    Ok(current)
}

/// Workspace-level seating preferences, with defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct SeatingSettings {
    pub default_layout_id: String,
    pub unassigned_sort_by: PoolSort,
    pub default_attendance_rate: f64,
}

pub fn load_seating_settings(conn: &rusqlite::Connection) -> anyhow::Result<SeatingSettings> {
    let section = load_section(conn, SetupSection::Seating)?;
    Ok(SeatingSettings {
        default_layout_id: section["defaultLayoutId"]
            .as_str()
            .unwrap_or(layouts::DEFAULT_LAYOUT_ID)
            .to_string(),
        unassigned_sort_by: section["unassignedSortBy"]
            .as_str()
            .and_then(PoolSort::parse)
            .unwrap_or_default(),
        default_attendance_rate: section["defaultAttendanceRate"].as_f64().unwrap_or(95.0),
    })
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let seating = match load_section(conn, SetupSection::Seating) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(&req.id, json!({ "seating": seating }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
