use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_timetabled");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn timetabled");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value.pointer("/error/code").and_then(|v| v.as_str())
}

#[test]
fn setup_sections_have_defaults_and_validate_patches() {
    let workspace = temp_dir("timetabled-setup");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let initial = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(
        initial.pointer("/timetable/maxSpan").and_then(|v| v.as_i64()),
        Some(3)
    );
    assert_eq!(
        initial
            .pointer("/roster/skipBlankRows")
            .and_then(|v| v.as_bool()),
        Some(true)
    );

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "timetable", "patch": { "collegeHeader": "  City College  ", "maxSpan": 2 } }),
    );
    assert_eq!(
        updated
            .pointer("/value/collegeHeader")
            .and_then(|v| v.as_str()),
        Some("City College")
    );

    for (id, params) in [
        ("4", json!({ "section": "timetable", "patch": { "maxSpan": 5 } })),
        ("5", json!({ "section": "timetable", "patch": { "theme": "dark" } })),
        ("6", json!({ "section": "printer", "patch": {} })),
        ("7", json!({ "section": "roster", "patch": "nope" })),
    ] {
        let resp = request(&mut stdin, &mut reader, id, "setup.update", params);
        assert_eq!(error_code(&resp), Some("bad_params"), "{}", resp);
    }

    let after = request_ok(&mut stdin, &mut reader, "8", "setup.get", json!({}));
    assert_eq!(
        after.pointer("/timetable/maxSpan").and_then(|v| v.as_i64()),
        Some(2)
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn flow_transitions_round_trip_through_ipc() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let selected = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "flow.cell",
        json!({
            "state": { "state": "empty" },
            "event": { "event": "select", "day": "Monday", "timeSlot": "9:30-10:30" }
        }),
    );
    assert_eq!(
        selected.pointer("/state/state").and_then(|v| v.as_str()),
        Some("selected")
    );
    let saving = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "flow.cell",
        json!({ "state": selected.get("state"), "event": { "event": "save" } }),
    );
    let rejected = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "flow.cell",
        json!({
            "state": saving.get("state"),
            "event": { "event": "failed", "error": "Dr. Rao is already assigned to CSE 5-A at this time" }
        }),
    );
    let back = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "flow.cell",
        json!({ "state": rejected.get("state"), "event": { "event": "acknowledge" } }),
    );
    assert_eq!(
        back.pointer("/state/state").and_then(|v| v.as_str()),
        Some("selected")
    );
    assert!(back
        .pointer("/state/error")
        .and_then(|v| v.as_str())
        .is_some_and(|e| e.contains("Dr. Rao")));

    let on_break = request(
        &mut stdin,
        &mut reader,
        "5",
        "flow.cell",
        json!({
            "state": { "state": "empty" },
            "event": { "event": "select", "day": "Monday", "timeSlot": "Lunch Break" }
        }),
    );
    assert_eq!(error_code(&on_break), Some("invalid_transition"));

    let malformed = request(
        &mut stdin,
        &mut reader,
        "6",
        "flow.cell",
        json!({ "state": { "state": "dancing" }, "event": { "event": "save" } }),
    );
    assert_eq!(error_code(&malformed), Some("bad_params"));

    let branch = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "flow.wizard",
        json!({ "event": { "event": "start" } }),
    );
    assert_eq!(
        branch.pointer("/step/step").and_then(|v| v.as_str()),
        Some("branch")
    );
    let semester = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "flow.wizard",
        json!({ "step": branch.get("step"), "event": { "event": "selectBranch", "branch": "CSE" } }),
    );
    let upload = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "flow.wizard",
        json!({
            "step": semester.get("step"),
            "event": { "event": "selectSemester", "semester": 5, "section": "A" }
        }),
    );
    assert_eq!(
        upload.pointer("/step/section").and_then(|v| v.as_str()),
        Some("A")
    );
    let skipped = request(
        &mut stdin,
        &mut reader,
        "10",
        "flow.wizard",
        json!({ "step": { "step": "welcome" }, "event": { "event": "uploadComplete" } }),
    );
    assert_eq!(error_code(&skipped), Some("invalid_transition"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn workspace_bundle_restores_saved_timetable() {
    let workspace = temp_dir("timetabled-bundle");
    let bundle = workspace.join("backups").join("workspace.ttbackup.zip");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "lecturers.bulkInsert",
        json!({
            "branch": "ME",
            "semester": 3,
            "section": "C",
            "rows": [
                { "name": "Dr. Nair", "subjectName": "Thermodynamics", "subjectCode": "ME301" }
            ]
        }),
    );
    let scope = json!({ "branch": "ME", "semester": 3, "section": "C" });
    let slot = |s: &str| {
        json!({
            "branch": "ME",
            "semester": 3,
            "section": "C",
            "day": "Thursday",
            "timeSlot": s,
            "lecturerName": "Dr. Nair"
        })
    };
    let _ = request_ok(&mut stdin, &mut reader, "3", "timetable.assign", slot("9:30-10:30"));

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(
        exported.get("bundleFormat").and_then(|v| v.as_str()),
        Some("timetable-workspace-v1")
    );
    assert!(bundle.is_file());

    let _ = request_ok(&mut stdin, &mut reader, "5", "timetable.assign", slot("10:30-11:20"));
    let before = request_ok(&mut stdin, &mut reader, "6", "timetable.get", scope.clone());
    assert_eq!(
        before.get("entries").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(2)
    );

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(imported.get("dbSha256"), exported.get("dbSha256"));

    let after = request_ok(&mut stdin, &mut reader, "8", "timetable.get", scope);
    assert_eq!(
        after.get("entries").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );

    let missing = request(
        &mut stdin,
        &mut reader,
        "9",
        "backup.importWorkspaceBundle",
        json!({ "inPath": workspace.join("nope.zip").to_string_lossy() }),
    );
    assert_eq!(error_code(&missing), Some("not_found"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
