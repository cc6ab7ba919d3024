use crate::ipc::error::ok;
use crate::ipc::helpers::{class_exists, db_query_err, get_required_str, load_roster, HandlerErr};
use crate::ipc::types::{AppState, Request};
use log::info;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

const MAX_XP: i64 = 1_000_000;

fn require_class(conn: &Connection, class_id: &str) -> Result<(), HandlerErr> {
    if class_exists(conn, class_id)? {
        Ok(())
    } else {
        Err(HandlerErr::new("not_found", "class not found"))
    }
}

fn name_field(v: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let s = v
        .as_str()
        .ok_or_else(|| HandlerErr::new("bad_params", format!("{} must be a string", key)))?
        .trim()
        .to_string();
    if s.is_empty() {
        return Err(HandlerErr::new("bad_params", format!("{} must not be empty", key)));
    }
    Ok(s)
}

fn xp_field(v: &serde_json::Value) -> Result<i64, HandlerErr> {
    match v.as_i64() {
        Some(n) if (0..=MAX_XP).contains(&n) => Ok(n),
        _ => Err(HandlerErr::new(
            "bad_params",
            format!("xp must be an integer in 0..={}", MAX_XP),
        )),
    }
}

/// `null` clears the rate.
fn attendance_field(v: &serde_json::Value) -> Result<Option<f64>, HandlerErr> {
    if v.is_null() {
        return Ok(None);
    }
    match v.as_f64() {
        Some(n) if (0.0..=100.0).contains(&n) => Ok(Some(n)),
        _ => Err(HandlerErr::new(
            "bad_params",
            "attendanceRate must be a number in 0..=100",
        )),
    }
}

fn grade_field(v: &serde_json::Value) -> Result<Option<String>, HandlerErr> {
    if v.is_null() {
        return Ok(None);
    }
    let s = v
        .as_str()
        .ok_or_else(|| HandlerErr::new("bad_params", "gradeLevel must be a string"))?
        .trim();
    Ok(if s.is_empty() { None } else { Some(s.to_string()) })
}

fn students_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;
    let roster = load_roster(conn, &class_id, None)?;
    Ok(json!({ "students": roster }))
}

fn students_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let first_name = name_field(&params["firstName"], "firstName")?;
    let last_name = name_field(&params["lastName"], "lastName")?;
    let xp = match params.get("xp") {
        Some(v) => xp_field(v)?,
        None => 0,
    };
    let attendance = match params.get("attendanceRate") {
        Some(v) => attendance_field(v)?,
        None => None,
    };
    let grade_level = match params.get("gradeLevel") {
        Some(v) => grade_field(v)?,
        None => None,
    };
    require_class(conn, &class_id)?;

    let sort_order: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM students WHERE class_id = ?",
            [&class_id],
            |r| r.get(0),
        )
        .map_err(db_query_err)?;

    let student_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(
           id, class_id, first_name, last_name, xp, attendance_rate, grade_level, sort_order)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            student_id,
            class_id,
            first_name,
            last_name,
            xp,
            attendance,
            grade_level,
            sort_order
        ],
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "students" })),
    })?;

    Ok(json!({ "studentId": student_id, "sortOrder": sort_order }))
}

fn students_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let student_id = get_required_str(params, "studentId")?;
    let Some(patch) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::new("bad_params", "missing/invalid patch"));
    };

    let mut set_parts: Vec<&str> = Vec::new();
    let mut bind_values: Vec<Value> = Vec::new();
    for (key, v) in patch {
        match key.as_str() {
            "firstName" => {
                set_parts.push("first_name = ?");
                bind_values.push(Value::Text(name_field(v, "firstName")?));
            }
            "lastName" => {
                set_parts.push("last_name = ?");
                bind_values.push(Value::Text(name_field(v, "lastName")?));
            }
            "xp" => {
                set_parts.push("xp = ?");
                bind_values.push(Value::Integer(xp_field(v)?));
            }
            "attendanceRate" => {
                set_parts.push("attendance_rate = ?");
                bind_values.push(attendance_field(v)?.map(Value::Real).unwrap_or(Value::Null));
            }
            "gradeLevel" => {
                set_parts.push("grade_level = ?");
                bind_values.push(grade_field(v)?.map(Value::Text).unwrap_or(Value::Null));
            }
            other => {
                return Err(HandlerErr::new(
                    "bad_params",
                    format!("unknown student field: {}", other),
                ))
            }
        }
    }
    if set_parts.is_empty() {
        return Err(HandlerErr::new("bad_params", "patch must not be empty"));
    }

    let sql = format!(
        "UPDATE students SET {} WHERE id = ? AND class_id = ?",
        set_parts.join(", ")
    );
    bind_values.push(Value::Text(student_id));
    bind_values.push(Value::Text(class_id));
    let changed = conn
        .execute(&sql, params_from_iter(bind_values))
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    if changed == 0 {
        return Err(HandlerErr::new("not_found", "student not found"));
    }
    Ok(json!({ "ok": true }))
}

fn students_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let student_id = get_required_str(params, "studentId")?;

    let exists = conn
        .query_row(
            "SELECT 1 FROM students WHERE id = ? AND class_id = ?",
            (&student_id, &class_id),
            |r| r.get::<_, i64>(0),
        )
        .optional()
        .map_err(db_query_err)?;
    if exists.is_none() {
        return Err(HandlerErr::new("not_found", "student not found"));
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    for (table, sql) in [
        ("seat_assignments", "DELETE FROM seat_assignments WHERE student_id = ?"),
        ("students", "DELETE FROM students WHERE id = ?"),
    ] {
        tx.execute(sql, [&student_id]).map_err(|e| HandlerErr {
            code: "db_delete_failed",
            message: e.to_string(),
            details: Some(json!({ "table": table })),
        })?;
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    Ok(json!({ "ok": true }))
}

fn handle_students(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return HandlerErr::new("no_workspace", "select a workspace first").response(&req.id);
    };
    let result = match req.method.as_str() {
        "students.list" => students_list(conn, &req.params),
        "students.create" => students_create(conn, &req.params),
        "students.update" => students_update(conn, &req.params),
        _ => students_delete(conn, &req.params),
    };
    match result {
        Ok(v) => {
            // Open seating sessions hold a roster snapshot; reopen on next use.
            if req.method != "students.list" {
                if let Some(class_id) = req.params.get("classId").and_then(|v| v.as_str()) {
                    if state.sessions.remove(class_id).is_some() {
                        info!("roster of class {} changed; closed its seating session", class_id);
                    }
                }
            }
            ok(&req.id, v)
        }
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" | "students.create" | "students.update" | "students.delete" => {
            Some(handle_students(state, req))
        }
        _ => None,
    }
}
