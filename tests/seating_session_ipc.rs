use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

fn spawn_sidecar() -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_seatingd");
    let mut child = Command::new(exe)
        .env_remove("SEATINGD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn seatingd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
        next_id: 0,
    }
}

impl Sidecar {
    fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");

        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read response line");
        assert!(!line.trim().is_empty(), "empty response for {}", method);
        let value: serde_json::Value =
            serde_json::from_str(line.trim()).expect("parse response json");
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    fn request_ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    fn request_err(&mut self, method: &str, params: serde_json::Value) -> String {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value["error"]["code"].as_str().unwrap_or("").to_string()
    }

    fn select_workspace(&mut self, path: &Path) {
        self.request_ok("workspace.select", json!({ "path": path.to_string_lossy() }));
    }

    fn create_class(&mut self, name: &str) -> String {
        let res = self.request_ok("classes.create", json!({ "name": name }));
        res["classId"].as_str().expect("classId").to_string()
    }

    fn create_student(&mut self, class_id: &str, first: &str, last: &str, xp: u32) -> String {
        let res = self.request_ok(
            "students.create",
            json!({ "classId": class_id, "firstName": first, "lastName": last, "xp": xp }),
        );
        res["studentId"].as_str().expect("studentId").to_string()
    }

    fn shutdown(mut self) {
        drop(self.stdin);
        let _ = self.child.wait();
    }
}

fn seat_map(view: &serde_json::Value) -> Vec<(String, String)> {
    view["seats"]
        .as_array()
        .expect("seats")
        .iter()
        .map(|s| {
            (
                s["seatId"].as_str().unwrap_or("").to_string(),
                s["student"]["id"].as_str().unwrap_or("").to_string(),
            )
        })
        .collect()
}

#[test]
fn drag_save_and_reopen_in_a_new_process() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let mut sc = spawn_sidecar();
    sc.select_workspace(workspace.path());
    let class_id = sc.create_class("7B");
    let ava = sc.create_student(&class_id, "Ava", "Chen", 2600);
    let mia = sc.create_student(&class_id, "Mia", "Lopez", 900);
    let zoe = sc.create_student(&class_id, "Zoe", "Park", 1700);

    let opened = sc.request_ok("seating.open", json!({ "classId": class_id }));
    assert_eq!(opened["report"]["chartFound"], false);
    assert_eq!(opened["view"]["unassigned"].as_array().map(|a| a.len()), Some(3));

    // Pool -> seat, then seat -> occupied seat (bump).
    sc.request_ok("seating.pickUp", json!({ "classId": class_id, "studentId": ava }));
    let placed = sc.request_ok("seating.drop", json!({ "classId": class_id, "seatId": "B2" }));
    assert_eq!(placed["placed"], true);
    sc.request_ok(
        "seating.assign",
        json!({ "classId": class_id, "seatId": "A1", "studentId": mia }),
    );
    sc.request_ok(
        "seating.pickUp",
        json!({ "classId": class_id, "studentId": ava, "fromSeat": "B2" }),
    );
    let bumped = sc.request_ok("seating.drop", json!({ "classId": class_id, "seatId": "A1" }));
    assert_eq!(bumped["bumpedStudentId"], json!(mia));
    assert_eq!(seat_map(&bumped["view"]), vec![("A1".to_string(), ava.clone())]);
    assert_eq!(bumped["view"]["unassigned"].as_array().map(|a| a.len()), Some(2));

    // Nothing persisted until save.
    let snap = sc.request_ok("seating.get", json!({ "classId": class_id }));
    assert!(snap["seatingChart"].is_null());

    sc.request_ok(
        "seating.assign",
        json!({ "classId": class_id, "seatId": "C3", "studentId": zoe }),
    );
    let saved = sc.request_ok("seating.save", json!({ "classId": class_id }));
    assert_eq!(saved["savedCount"], 2);
    assert!(saved["chartId"].is_string());
    sc.shutdown();

    let mut sc = spawn_sidecar();
    sc.select_workspace(workspace.path());
    let reopened = sc.request_ok("seating.open", json!({ "classId": class_id }));
    assert_eq!(reopened["report"]["chartFound"], true);
    assert_eq!(reopened["report"]["loadedAssignments"], 2);
    assert_eq!(
        seat_map(&reopened["view"]),
        vec![("A1".to_string(), ava), ("C3".to_string(), zoe)]
    );
    let snap = sc.request_ok("seating.get", json!({ "classId": class_id }));
    assert_eq!(snap["assignments"][0]["assignmentMethod"], "manual");
    assert_eq!(snap["assignments"][1]["rowIndex"], 2);
    sc.shutdown();
}

#[test]
fn stale_assignment_rows_are_skipped_on_open() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let mut sc = spawn_sidecar();
    sc.select_workspace(workspace.path());
    let class_id = sc.create_class("9C");
    let keep = sc.create_student(&class_id, "Ava", "Chen", 1800);
    let gone = sc.create_student(&class_id, "Ben", "Ode", 1800);
    sc.request_ok("seating.open", json!({ "classId": class_id }));
    sc.request_ok("seating.assign", json!({ "classId": class_id, "seatId": "A1", "studentId": keep }));
    sc.request_ok("seating.assign", json!({ "classId": class_id, "seatId": "A2", "studentId": gone }));
    sc.request_ok("seating.save", json!({ "classId": class_id }));
    sc.shutdown();

    // Simulate another client removing the student without touching the chart.
    {
        let conn = rusqlite::Connection::open(workspace.path().join("seating.sqlite3")).expect("open db");
        conn.execute("DELETE FROM students WHERE id = ?", [&gone]).expect("delete student");
    }

    let mut sc = spawn_sidecar();
    sc.select_workspace(workspace.path());
    let opened = sc.request_ok("seating.open", json!({ "classId": class_id }));
    assert_eq!(opened["report"]["loadedAssignments"], 1);
    assert_eq!(opened["report"]["skippedAssignments"], 1);
    assert_eq!(seat_map(&opened["view"]), vec![("A1".to_string(), keep)]);
    assert_eq!(opened["view"]["rosterSize"], 1);
    sc.shutdown();
}

#[test]
fn drops_on_aisles_and_bad_seat_ids_are_rejected() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let mut sc = spawn_sidecar();
    sc.select_workspace(workspace.path());
    let class_id = sc.create_class("6D");
    let ava = sc.create_student(&class_id, "Ava", "Chen", 1800);
    sc.request_ok("seating.open", json!({ "classId": class_id }));
    sc.request_ok(
        "seating.setLayout",
        json!({ "classId": class_id, "layoutId": "netherlands-circle" }),
    );

    let nothing = sc.request_ok("seating.drop", json!({ "classId": class_id, "seatId": "A2" }));
    assert_eq!(nothing["reason"], "nothing_picked");

    sc.request_ok("seating.pickUp", json!({ "classId": class_id, "studentId": ava }));
    let aisle = sc.request_ok("seating.drop", json!({ "classId": class_id, "seatId": "A1" }));
    assert_eq!(aisle["placed"], false);
    assert_eq!(aisle["reason"], "not_a_seat");
    assert_eq!(aisle["view"]["pending"]["studentId"], json!(ava));

    assert_eq!(
        sc.request_err("seating.drop", json!({ "classId": class_id, "seatId": "a1" })),
        "invalid_seat"
    );
    let cancelled = sc.request_ok("seating.cancelDrag", json!({ "classId": class_id }));
    assert_eq!(cancelled["cancelled"], json!(ava));
    assert!(cancelled["view"]["pending"].is_null());

    assert_eq!(
        sc.request_err(
            "seating.pickUp",
            json!({ "classId": class_id, "studentId": ava, "fromSeat": "A2" })
        ),
        "bad_drag"
    );
    assert_eq!(
        sc.request_err(
            "seating.assign",
            json!({ "classId": class_id, "seatId": "C3", "studentId": ava })
        ),
        "invalid_seat"
    );
    assert_eq!(
        sc.request_err(
            "seating.setLayout",
            json!({ "classId": class_id, "layoutId": "moon-base" })
        ),
        "bad_layout"
    );
    sc.shutdown();
}

#[test]
fn layout_switch_keeps_assignments_and_persists_on_save() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let mut sc = spawn_sidecar();
    sc.select_workspace(workspace.path());
    let class_id = sc.create_class("5E");
    let ava = sc.create_student(&class_id, "Ava", "Chen", 1800);
    let ben = sc.create_student(&class_id, "Ben", "Ode", 1800);
    sc.request_ok("seating.open", json!({ "classId": class_id }));
    sc.request_ok("seating.assign", json!({ "classId": class_id, "seatId": "A1", "studentId": ava }));
    sc.request_ok("seating.assign", json!({ "classId": class_id, "seatId": "A2", "studentId": ben }));
    sc.request_ok("seating.save", json!({ "classId": class_id }));

    let switched = sc.request_ok(
        "seating.setLayout",
        json!({ "classId": class_id, "layoutId": "netherlands-circle" }),
    );
    assert_eq!(switched["offLayoutSeats"], json!(["A1"]));
    assert_eq!(seat_map(&switched["view"]).len(), 2);

    sc.request_ok("seating.save", json!({ "classId": class_id }));
    let snap = sc.request_ok("seating.get", json!({ "classId": class_id }));
    assert_eq!(snap["seatingChart"]["layoutTemplateId"], "netherlands-circle");
    assert_eq!(snap["seatingChart"]["totalSeats"], 12);
    assert_eq!(snap["assignments"].as_array().map(|a| a.len()), Some(2));

    let reset = sc.request_ok("seating.reset", json!({ "classId": class_id }));
    assert_eq!(reset["outcome"]["persisted"], true);
    let snap = sc.request_ok("seating.get", json!({ "classId": class_id }));
    assert_eq!(snap["assignments"], json!([]));
    sc.shutdown();
}

#[test]
fn failed_save_reports_the_cause_and_keeps_the_arrangement() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let mut sc = spawn_sidecar();
    sc.select_workspace(workspace.path());
    let class_id = sc.create_class("10A");
    let ava = sc.create_student(&class_id, "Ava", "Chen", 1800);
    let ben = sc.create_student(&class_id, "Ben", "Ode", 1500);
    sc.request_ok("seating.open", json!({ "classId": class_id }));
    sc.request_ok("seating.assign", json!({ "classId": class_id, "seatId": "A1", "studentId": ava }));
    sc.request_ok("seating.save", json!({ "classId": class_id }));
    sc.request_ok("seating.assign", json!({ "classId": class_id, "seatId": "B2", "studentId": ben }));

    // Another client drops the chart while this session still holds its id.
    {
        let conn = rusqlite::Connection::open(workspace.path().join("seating.sqlite3")).expect("open db");
        conn.execute("DELETE FROM seat_assignments", []).expect("delete assignments");
        conn.execute("DELETE FROM seating_charts WHERE class_id = ?", [&class_id])
            .expect("delete chart");
    }

    let failed = sc.request("seating.save", json!({ "classId": class_id }));
    assert_eq!(failed["ok"], false);
    assert_eq!(failed["error"]["code"], "save_failed");
    assert_eq!(failed["error"]["details"]["cause"], "not_found");

    let view = sc.request_ok("seating.view", json!({ "classId": class_id }));
    assert_eq!(
        seat_map(&view["view"]),
        vec![("A1".to_string(), ava), ("B2".to_string(), ben)]
    );
    assert!(view["view"]["error"]
        .as_str()
        .unwrap_or("")
        .starts_with("Failed to save seating arrangement"));
    sc.shutdown();
}
