use crate::error::SeatingError;
use crate::ipc::error::ok;
use crate::ipc::handlers::setup::{load_seating_settings, SeatingSettings};
use crate::ipc::helpers::{
    class_exists, db_query_err, get_optional_str, get_required_str, load_roster, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::seating::drag::DropOutcome;
use crate::seating::gateway::{
    AssignmentMethod, NewChart, SeatAssignment, SeatingGateway, SqliteGateway,
};
use crate::seating::layouts::{self, Cell};
use crate::seating::seat_id::SeatId;
use crate::seating::session::SeatingSession;
use crate::seating::student::{filter_and_sort, PoolSort, Student};
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension};
use serde_json::{json, Value};
use std::collections::HashMap;

type Sessions = HashMap<String, SeatingSession>;

const CLIENT_METHODS: &[&str] = &[
    "seating.view",
    "seating.unassigned",
    "seating.setLayout",
    "seating.pickUp",
    "seating.drop",
    "seating.cancelDrag",
    "seating.assign",
    "seating.unassign",
];

const DB_METHODS: &[&str] = &[
    "seating.get",
    "seating.create",
    "seating.saveAssignments",
    "seating.open",
    "seating.save",
    "seating.reset",
    "seating.autoArrange",
    "seating.studentView",
];

fn settings(conn: &Connection) -> Result<SeatingSettings, HandlerErr> {
    load_seating_settings(conn).map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))
}

fn parse_seat(params: &Value, key: &str) -> Result<SeatId, HandlerErr> {
    let raw = get_required_str(params, key)?;
    Ok(raw.parse::<SeatId>()?)
}

fn session_mut<'a>(sessions: &'a mut Sessions, params: &Value) -> Result<&'a mut SeatingSession, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    sessions.get_mut(&class_id).ok_or_else(|| {
        HandlerErr::new(
            "no_session",
            format!("seating is not open for class {}", class_id),
        )
    })
}

fn seating_layouts() -> Value {
    let layouts: Vec<Value> = layouts::catalog()
        .iter()
        .map(|t| {
            json!({
                "id": t.id,
                "name": t.name,
                "country": t.country,
                "description": t.description,
                "rows": t.rows,
                "cols": t.cols,
                "totalSeats": t.total_seats(),
                "seatPattern": t.seat_pattern
            })
        })
        .collect();
    json!({ "defaultLayoutId": layouts::DEFAULT_LAYOUT_ID, "layouts": layouts })
}

// --- gateway contract -------------------------------------------------------

fn seating_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let snapshot = SqliteGateway::new(conn).fetch_chart(&class_id)?;
    Ok(json!({
        "seatingChart": snapshot.seating_chart,
        "assignments": snapshot.assignments
    }))
}

fn seating_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let new: NewChart = serde_json::from_value(params.clone())
        .map_err(|e| HandlerErr::new("bad_params", e.to_string()))?;
    let seats = new.seat_pattern.iter().filter(|c| **c == Cell::Seat).count();
    if let Some(total) = new.total_seats {
        if total != seats {
            return Err(HandlerErr {
                code: "bad_params",
                message: "totalSeats does not match seatPattern".into(),
                details: Some(json!({ "totalSeats": total, "seatCells": seats })),
            });
        }
    }
    let chart = SqliteGateway::new(conn).create_chart(&new)?;
    Ok(json!({ "seatingChart": chart }))
}

fn seating_save_assignments(
    conn: &Connection,
    sessions: &mut Sessions,
    params: &Value,
) -> Result<Value, HandlerErr> {
    let chart_id = get_required_str(params, "seatingChartId")?;
    let rows: Vec<SeatAssignment> = serde_json::from_value(params["assignments"].clone())
        .map_err(|e| HandlerErr::new("bad_params", format!("invalid assignments: {}", e)))?;
    let method = match params.get("assignmentMethod") {
        None | Some(Value::Null) => AssignmentMethod::Manual,
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| HandlerErr::new("bad_params", format!("invalid assignmentMethod: {}", e)))?,
    };

    let saved = SqliteGateway::new(conn)
        .replace_assignments(&chart_id, &rows, method)
        .map_err(|e| match e {
            SeatingError::Db(_) => HandlerErr::new("db_update_failed", e.to_string()),
            other => other.into(),
        })?;

    // Another writer replaced the set; any open controller is now stale.
    let class_id: Option<String> = conn
        .query_row(
            "SELECT class_id FROM seating_charts WHERE id = ?",
            [&chart_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(db_query_err)?;
    if let Some(class_id) = class_id {
        if sessions.remove(&class_id).is_some() {
            debug!("closed seating session for class {} after external save", class_id);
        }
    }
    Ok(json!({ "savedCount": saved }))
}

// --- controller sessions ----------------------------------------------------

fn primary_class_for(conn: &Connection, teacher_id: &str) -> Result<String, HandlerErr> {
    let class_id: Option<String> = conn
        .query_row(
            "SELECT id FROM classes WHERE primary_teacher_id = ? ORDER BY name, id LIMIT 1",
            [teacher_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(db_query_err)?;
    class_id.ok_or_else(|| SeatingError::NoPrimaryClass(teacher_id.to_string()).into())
}

fn seating_open(conn: &Connection, sessions: &mut Sessions, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = match get_optional_str(params, "classId")? {
        Some(id) => {
            if !class_exists(conn, &id)? {
                return Err(SeatingError::ClassNotFound(id).into());
            }
            id
        }
        None => {
            let Some(teacher_id) = get_optional_str(params, "teacherId")? else {
                return Err(HandlerErr::new("bad_params", "missing classId or teacherId"));
            };
            primary_class_for(conn, &teacher_id)?
        }
    };

    let settings = settings(conn)?;
    let roster = load_roster(conn, &class_id, Some(settings.default_attendance_rate))?;
    let default_layout =
        layouts::find(&settings.default_layout_id).unwrap_or_else(layouts::default_layout);
    let gateway = SqliteGateway::new(conn);
    let (session, report) = SeatingSession::open(&class_id, roster, default_layout, &gateway)?;
    let view = session.view();
    sessions.insert(class_id.clone(), session);
    info!("seating session open for class {}", class_id);

    Ok(json!({ "classId": class_id, "report": report, "view": view }))
}

fn save_failed(e: SeatingError) -> HandlerErr {
    HandlerErr {
        code: "save_failed",
        message: e.to_string(),
        details: Some(json!({ "cause": e.code() })),
    }
}

fn seating_save(conn: &Connection, sessions: &mut Sessions, params: &Value) -> Result<Value, HandlerErr> {
    let session = session_mut(sessions, params)?;
    let saved = session
        .save(&SqliteGateway::new(conn), AssignmentMethod::Manual)
        .map_err(save_failed)?;
    Ok(json!({
        "savedCount": saved,
        "chartId": session.chart_id(),
        "view": session.view()
    }))
}

fn seating_reset(conn: &Connection, sessions: &mut Sessions, params: &Value) -> Result<Value, HandlerErr> {
    let session = session_mut(sessions, params)?;
    let outcome = session.reset(&SqliteGateway::new(conn));
    Ok(json!({ "outcome": outcome, "view": session.view() }))
}

fn seating_auto_arrange(
    conn: &Connection,
    sessions: &mut Sessions,
    params: &Value,
) -> Result<Value, HandlerErr> {
    let session = session_mut(sessions, params)?;
    let outcome = session.auto_arrange(&SqliteGateway::new(conn));
    Ok(json!({ "outcome": outcome, "view": session.view() }))
}

fn seating_student_view(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let found: Option<(String, String)> = conn
        .query_row(
            "SELECT s.class_id, c.name
             FROM students s
             JOIN classes c ON c.id = s.class_id
             WHERE s.id = ?",
            [&student_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
        .map_err(db_query_err)?;
    let Some((class_id, class_name)) = found else {
        return Err(HandlerErr::new("not_found", "student not found"));
    };

    let snapshot = SqliteGateway::new(conn).fetch_chart(&class_id)?;
    let Some(chart) = snapshot.seating_chart else {
        return Ok(json!({
            "hasSeating": false,
            "classId": class_id,
            "className": class_name
        }));
    };
    let layout = chart.layout()?;

    let roster = load_roster(conn, &class_id, None)?;
    let by_id: HashMap<&str, &Student> = roster.iter().map(|s| (s.id.as_str(), s)).collect();
    let assignments: Vec<Value> = snapshot
        .assignments
        .iter()
        .filter_map(|a| {
            let s = by_id.get(a.student_id.as_str())?;
            Some(json!({
                "seatId": a.seat_id,
                "rowIndex": a.row_index,
                "colIndex": a.col_index,
                "studentId": s.id,
                "firstName": s.first_name,
                "lastName": s.last_name,
                "initials": s.initials(),
                "isMe": s.id == student_id
            }))
        })
        .collect();
    let my_seat = snapshot
        .assignments
        .iter()
        .find(|a| a.student_id == student_id)
        .map(|a| a.seat_id.clone());

    Ok(json!({
        "hasSeating": true,
        "classId": class_id,
        "className": class_name,
        "mySeat": my_seat,
        "chart": {
            "id": chart.id,
            "name": chart.name,
            "layoutTemplateId": chart.layout_template_id,
            "layoutName": chart.layout_name,
            "rows": layout.rows,
            "cols": layout.cols,
            "totalSeats": layout.total_seats(),
            "seatPattern": layout.pattern_grid()
        },
        "assignments": assignments
    }))
}

// --- client-side mutations --------------------------------------------------

fn drop_json(outcome: DropOutcome) -> Value {
    match outcome {
        DropOutcome::Placed { seat, bumped } => json!({
            "placed": true,
            "seatId": seat,
            "bumpedStudentId": bumped
        }),
        DropOutcome::NotASeat => json!({ "placed": false, "reason": "not_a_seat" }),
        DropOutcome::NothingPicked => json!({ "placed": false, "reason": "nothing_picked" }),
    }
}

fn client_side(
    conn: Option<&Connection>,
    sessions: &mut Sessions,
    method: &str,
    params: &Value,
) -> Result<Value, HandlerErr> {
    let session = session_mut(sessions, params)?;
    let mut result = match method {
        "seating.view" => json!({}),
        "seating.unassigned" => {
            let sort = match get_optional_str(params, "sortBy")? {
                Some(raw) => PoolSort::parse(&raw).ok_or_else(|| {
                    HandlerErr::new("bad_params", "sortBy must be one of name, xp, attendance, behavior")
                })?,
                None => match conn {
                    Some(conn) => settings(conn)?.unassigned_sort_by,
                    None => PoolSort::default(),
                },
            };
            let search = get_optional_str(params, "search")?.unwrap_or_default();
            let pool = session.store().unassigned();
            let students = filter_and_sort(&pool, &search, sort);
            // The pool listing is the whole answer; skip the view.
            return Ok(json!({
                "sortBy": sort.as_str(),
                "total": pool.len(),
                "students": students
            }));
        }
        "seating.setLayout" => {
            let layout_id = get_required_str(params, "layoutId")?;
            let layout = layouts::get(&layout_id)?.clone();
            let off = session.set_layout(layout);
            json!({ "offLayoutSeats": off })
        }
        "seating.pickUp" => {
            let student_id = get_required_str(params, "studentId")?;
            let from_seat = match get_optional_str(params, "fromSeat")? {
                Some(raw) => Some(raw.parse::<SeatId>()?),
                None => None,
            };
            session.pick_up(&student_id, from_seat)?;
            json!({ "pickedUp": student_id })
        }
        "seating.drop" => {
            let seat = parse_seat(params, "seatId")?;
            drop_json(session.drop_on(seat)?)
        }
        "seating.cancelDrag" => {
            json!({ "cancelled": session.cancel_drag().map(|p| p.student_id) })
        }
        "seating.assign" => {
            let seat = parse_seat(params, "seatId")?;
            let student_id = get_required_str(params, "studentId")?;
            json!({ "bumpedStudentId": session.assign(seat, &student_id)? })
        }
        _ => {
            let seat = parse_seat(params, "seatId")?;
            json!({ "studentId": session.unassign(&seat) })
        }
    };
    result["view"] = json!(session.view());
    Ok(result)
}

fn handle_seating(state: &mut AppState, req: &Request) -> Value {
    let method = req.method.as_str();
    let params = &req.params;
    let result = if method == "seating.layouts" {
        Ok(seating_layouts())
    } else if CLIENT_METHODS.contains(&method) {
        client_side(state.db.as_ref(), &mut state.sessions, method, params)
    } else {
        match state.db.as_ref() {
            None => Err(HandlerErr::new("no_workspace", "select a workspace first")),
            Some(conn) => {
                let sessions = &mut state.sessions;
                match method {
                    "seating.get" => seating_get(conn, params),
                    "seating.create" => seating_create(conn, params),
                    "seating.saveAssignments" => seating_save_assignments(conn, sessions, params),
                    "seating.open" => seating_open(conn, sessions, params),
                    "seating.save" => seating_save(conn, sessions, params),
                    "seating.reset" => seating_reset(conn, sessions, params),
                    "seating.autoArrange" => seating_auto_arrange(conn, sessions, params),
                    _ => seating_student_view(conn, params),
                }
            }
        }
    };
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let method = req.method.as_str();
    if method == "seating.layouts" || CLIENT_METHODS.contains(&method) || DB_METHODS.contains(&method) {
        Some(handle_seating(state, req))
    } else {
        None
    }
}
