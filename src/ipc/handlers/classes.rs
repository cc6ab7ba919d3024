use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use log::info;
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };

    // Correlated subqueries so the counts don't multiply each other.
    let mut stmt = match conn.prepare(
        "SELECT
           c.id,
           c.name,
           c.grade_level,
           c.primary_teacher_id,
           (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id) AS student_count,
           (SELECT COUNT(*)
              FROM seat_assignments sa
              JOIN seating_charts sc ON sc.id = sa.chart_id
             WHERE sc.class_id = c.id) AS seated_count,
           EXISTS(SELECT 1 FROM seating_charts sc WHERE sc.class_id = c.id) AS has_chart
         FROM classes c
         ORDER BY c.name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let grade_level: Option<String> = row.get(2)?;
            let primary_teacher_id: Option<String> = row.get(3)?;
            let student_count: i64 = row.get(4)?;
            let seated_count: i64 = row.get(5)?;
            let has_chart: i64 = row.get(6)?;
            Ok(json!({
                "id": id,
                "name": name,
                "gradeLevel": grade_level,
                "primaryTeacherId": primary_teacher_id,
                "studentCount": student_count,
                "seatedCount": seated_count,
                "hasSeatingChart": has_chart != 0
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(classes) => ok(&req.id, json!({ "classes": classes })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn optional_trimmed(req: &Request, key: &str) -> Result<Option<String>, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => match v.as_str() {
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => Ok(Some(s.trim().to_string())),
            None => Err(err(&req.id, "bad_params", format!("{} must be string", key), None)),
        },
    }
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing name", None),
    };
    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }
    let grade_level = match optional_trimmed(req, "gradeLevel") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let primary_teacher_id = match optional_trimmed(req, "primaryTeacherId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let class_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO classes(id, name, grade_level, primary_teacher_id) VALUES(?, ?, ?, ?)",
        (&class_id, &name, &grade_level, &primary_teacher_id),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "classes" })),
        );
    }

    info!("created class {} ({})", class_id, name);
    ok(&req.id, json!({ "classId": class_id, "name": name }))
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let class_id = match req.params.get("classId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing classId", None),
    };

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [&class_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    if exists.is_none() {
        return err(&req.id, "not_found", "class not found", None);
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    // Dependency order; there is no ON DELETE CASCADE.
    let steps: [(&str, &str); 4] = [
        (
            "seat_assignments",
            "DELETE FROM seat_assignments
             WHERE chart_id IN (SELECT id FROM seating_charts WHERE class_id = ?)",
        ),
        ("seating_charts", "DELETE FROM seating_charts WHERE class_id = ?"),
        ("students", "DELETE FROM students WHERE class_id = ?"),
        ("classes", "DELETE FROM classes WHERE id = ?"),
    ];
    for (table, sql) in steps {
        if let Err(e) = tx.execute(sql, [&class_id]) {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": table })),
            );
        }
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    state.sessions.remove(&class_id);
    info!("deleted class {}", class_id);
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.delete" => Some(handle_classes_delete(state, req)),
        _ => None,
    }
}
