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
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = tempfile::Builder::new()
        .prefix("seating-router-smoke")
        .tempdir()
        .expect("temp dir");
    let mut sc = spawn_sidecar();

    let health = sc.request_ok("health", json!({}));
    assert!(health["workspacePath"].is_null());
    assert_eq!(sc.request_err("classes.create", json!({ "name": "7B" })), "no_workspace");
    assert_eq!(sc.request_err("seating.open", json!({ "classId": "x" })), "no_workspace");

    sc.select_workspace(workspace.path());
    assert!(workspace.path().join("seating.sqlite3").is_file());
    let class_id = sc.create_class("7B");
    sc.create_student(&class_id, "Ava", "Chen", 2600);

    let classes = sc.request_ok("classes.list", json!({}));
    assert_eq!(classes["classes"][0]["studentCount"], 1);
    assert_eq!(classes["classes"][0]["hasSeatingChart"], false);

    let students = sc.request_ok("students.list", json!({ "classId": class_id }));
    assert_eq!(students["students"][0]["behaviorTag"], "top_performer");

    let setup = sc.request_ok("setup.get", json!({}));
    assert_eq!(setup["seating"]["defaultLayoutId"], "usa-traditional");

    let layouts = sc.request_ok("seating.layouts", json!({}));
    assert_eq!(layouts["layouts"].as_array().map(|a| a.len()), Some(38));

    let opened = sc.request_ok("seating.open", json!({ "classId": class_id }));
    assert_eq!(opened["view"]["layout"]["id"], "usa-traditional");
    sc.request_ok("seating.view", json!({ "classId": class_id }));
    sc.request_ok("seating.get", json!({ "classId": class_id }));

    assert_eq!(sc.request_err("seating.view", json!({ "classId": "nope" })), "no_session");
    assert_eq!(sc.request_err("seating.teleport", json!({})), "not_implemented");

    // Garbage on the wire gets an id-less error line and the loop keeps going.
    writeln!(sc.stdin, "{{not json").expect("write garbage");
    sc.stdin.flush().expect("flush");
    let mut line = String::new();
    sc.reader.read_line(&mut line).expect("read bad_json line");
    let v: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(v["error"]["code"], "bad_json");
    sc.request_ok("health", json!({}));

    sc.shutdown();
}

#[test]
fn deleting_a_class_removes_its_chart() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let mut sc = spawn_sidecar();
    sc.select_workspace(workspace.path());
    let class_id = sc.create_class("8A");
    let s1 = sc.create_student(&class_id, "Ava", "Chen", 1800);
    sc.request_ok("seating.open", json!({ "classId": class_id }));
    sc.request_ok(
        "seating.assign",
        json!({ "classId": class_id, "seatId": "A1", "studentId": s1 }),
    );
    sc.request_ok("seating.save", json!({ "classId": class_id }));

    sc.request_ok("classes.delete", json!({ "classId": class_id }));
    assert_eq!(sc.request_err("seating.view", json!({ "classId": class_id })), "no_session");
    let snap = sc.request_ok("seating.get", json!({ "classId": class_id }));
    assert!(snap["seatingChart"].is_null());
    assert_eq!(sc.request_err("classes.delete", json!({ "classId": class_id })), "not_found");
    sc.shutdown();
}
