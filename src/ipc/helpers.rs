use crate::error::SeatingError;
use crate::ipc::error::err;
use crate::seating::student::Student;
use rusqlite::{Connection, OptionalExtension};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<SeatingError> for HandlerErr {
    fn from(e: SeatingError) -> Self {
        HandlerErr::new(e.code(), e.to_string())
    }
}

pub fn db_query_err(e: rusqlite::Error) -> HandlerErr {
    HandlerErr::new("db_query_failed", e.to_string())
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| HandlerErr::new("bad_params", format!("{} must be string", key))),
    }
}

pub fn class_exists(conn: &Connection, class_id: &str) -> Result<bool, HandlerErr> {
    conn.query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
    .map_err(db_query_err)
}

/// Roster in sort order. Missing attendance rates are filled with
/// `default_attendance` when one is given.
pub fn load_roster(
    conn: &Connection,
    class_id: &str,
    default_attendance: Option<f64>,
) -> Result<Vec<Student>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, first_name, last_name, xp, attendance_rate, grade_level
             FROM students
             WHERE class_id = ?
             ORDER BY sort_order",
        )
        .map_err(db_query_err)?;
    stmt.query_map([class_id], |r| {
        let id: String = r.get(0)?;
        let first: String = r.get(1)?;
        let last: String = r.get(2)?;
        let xp: i64 = r.get(3)?;
        let attendance: Option<f64> = r.get(4)?;
        Ok(Student::new(&id, &first, &last, xp.clamp(0, u32::MAX as i64) as u32)
            .with_attendance(attendance.or(default_attendance))
            .with_grade_level(r.get(5)?))
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(db_query_err)
}
