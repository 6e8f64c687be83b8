use serde_json::{json, Value};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn colh_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_colh"))
}

fn setup_test_env(extra_config: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(files_dir.join("apple.md"), "apple pie recipe").unwrap();
    fs::write(files_dir.join("banana.txt"), "banana bread recipe").unwrap();
    fs::write(files_dir.join("car.html"), "car maintenance guide").unwrap();
    fs::write(files_dir.join("ignored.pdf"), "recipe recipe recipe").unwrap();

    let config_content = format!(
        r#"[store]
path = "{}/data/collections.sqlite"

[query]
collection = "TestCollection"

[server]
bind = "127.0.0.1:7331"
{}
"#,
        root.display(),
        extra_config
    );

    let config_path = config_dir.join("colh.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn files_dir(config_path: &Path) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("files")
        .display()
        .to_string()
}

fn run_colh(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = colh_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run colh binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn ingest(config_path: &Path) -> String {
    let files = files_dir(config_path);
    let (stdout, stderr, success) = run_colh(
        config_path,
        &["ingest", "--name", "TestCollection", "--files", &files],
    );
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    stdout
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_colh(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/collections.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env("");

    let (_, _, first) = run_colh(&config_path, &["init"]);
    assert!(first, "First init failed");
    let (_, _, second) = run_colh(&config_path, &["init"]);
    assert!(second, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_then_query() {
    let (_tmp, config_path) = setup_test_env("");

    let stdout = ingest(&config_path);
    assert!(stdout.contains("files found: 3"), "{}", stdout);
    assert!(stdout.contains("documents added: 3"), "{}", stdout);

    let (stdout, stderr, success) = run_colh(&config_path, &["query", "recipe"]);
    assert!(success, "query failed: {}", stderr);
    assert!(stdout.contains("apple pie recipe"));
    assert!(stdout.contains("banana bread recipe"));
    assert!(!stdout.contains("car maintenance guide"));
}

#[test]
fn test_query_with_exact_filter() {
    let (_tmp, config_path) = setup_test_env("");
    ingest(&config_path);

    let (stdout, stderr, success) =
        run_colh(&config_path, &["query", "recipe", "--exact", "banana"]);
    assert!(success, "query failed: {}", stderr);
    assert_eq!(stdout.trim(), "banana bread recipe");
}

#[test]
fn test_query_missing_collection_fails() {
    let (_tmp, config_path) = setup_test_env("");
    run_colh(&config_path, &["init"]);

    let (_, stderr, success) = run_colh(&config_path, &["query", "recipe"]);
    assert!(!success);
    assert!(stderr.contains("not found"), "stderr={}", stderr);
}

#[test]
fn test_reingest_fresh_duplicates() {
    let (_tmp, config_path) = setup_test_env("");
    ingest(&config_path);
    ingest(&config_path);

    let (stdout, _, success) = run_colh(&config_path, &["collections"]);
    assert!(success);
    let row = stdout
        .lines()
        .find(|l| l.starts_with("TestCollection"))
        .unwrap();
    assert!(row.split_whitespace().any(|w| w == "6"), "row={}", row);
}

#[test]
fn test_reingest_content_is_idempotent() {
    let (_tmp, config_path) = setup_test_env("\n[ingest]\nid_strategy = \"content\"\n");
    ingest(&config_path);
    let stdout = ingest(&config_path);
    assert!(stdout.contains("documents added: 0"), "{}", stdout);
    assert!(stdout.contains("already present: 3"), "{}", stdout);
}

#[test]
fn test_ingest_dry_run_does_not_touch_store() {
    let (tmp, config_path) = setup_test_env("");
    let files = files_dir(&config_path);

    let (stdout, _, success) = run_colh(
        &config_path,
        &["ingest", "--name", "TestCollection", "--files", &files, "--dry-run"],
    );
    assert!(success);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("apple.md"));
    assert!(!stdout.contains("ignored.pdf"));
    assert!(!tmp.path().join("data/collections.sqlite").exists());
}

#[test]
fn test_ingest_missing_dir_fails() {
    let (tmp, config_path) = setup_test_env("");
    let missing = tmp.path().join("nope").display().to_string();

    let (_, stderr, success) = run_colh(
        &config_path,
        &["ingest", "--name", "TestCollection", "--files", &missing],
    );
    assert!(!success);
    assert!(stderr.contains("not found"), "stderr={}", stderr);
}

#[test]
fn test_ingest_rejects_bad_collection_name() {
    let (_tmp, config_path) = setup_test_env("");
    let files = files_dir(&config_path);

    let (_, _, success) = run_colh(&config_path, &["ingest", "--name", "x", "--files", &files]);
    assert!(!success);
}

#[test]
fn test_ping_store_prints_integer() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_colh(&config_path, &["ping-store"]);
    assert!(success, "ping-store failed: {}", stderr);
    assert!(stdout.trim().parse::<i64>().unwrap() > 0);
}

#[test]
fn test_collections_empty() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, _, success) = run_colh(&config_path, &["collections"]);
    assert!(success);
    assert!(stdout.contains("No collections"));
}

#[test]
fn test_invalid_config_fails() {
    let (_tmp, config_path) =
        setup_test_env("\n[embedding]\nprovider = \"word2vec\"\n");

    let (_, stderr, success) = run_colh(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("Unknown embedding provider"), "{}", stderr);
}

/// Run one MCP stdio session: handshake, then each `tools/call` in order.
/// Returns the `result` object of every call.
fn mcp_tool_calls(config_path: &Path, calls: &[(&str, Value)]) -> Vec<Value> {
    let mut child = Command::new(colh_binary())
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("serve")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let mut stdin = child.stdin.take().unwrap();
    let mut stdout = BufReader::new(child.stdout.take().unwrap());

    let mut send = |msg: Value| {
        writeln!(stdin, "{}", msg).unwrap();
        stdin.flush().unwrap();
    };
    let mut read_response = |id: i64| -> Value {
        let mut line = String::new();
        loop {
            line.clear();
            let n = stdout.read_line(&mut line).unwrap();
            assert!(n > 0, "server closed stdout before answering request {}", id);
            let msg: Value = serde_json::from_str(line.trim()).unwrap();
            if msg["id"] == json!(id) {
                return msg;
            }
        }
    };

    send(json!({
        "jsonrpc": "2.0",
        "id": 0,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": { "name": "integration-test", "version": "0.0.0" }
        }
    }));
    let init = read_response(0);
    assert_eq!(init["result"]["serverInfo"]["name"], "collection-harness");
    send(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }));

    let mut results = Vec::new();
    for (i, (name, arguments)) in calls.iter().enumerate() {
        let id = i as i64 + 1;
        send(json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        }));
        results.push(read_response(id)["result"].clone());
    }

    child.kill().ok();
    child.wait().ok();
    results
}

fn tool_text(result: &Value) -> &str {
    result["content"][0]["text"].as_str().unwrap()
}

#[test]
fn test_mcp_stdio_tools() {
    let (_tmp, config_path) = setup_test_env("");
    ingest(&config_path);

    let results = mcp_tool_calls(
        &config_path,
        &[
            ("ping", json!({})),
            ("ping_store", json!({})),
            ("query", json!({ "query_text": "recipe", "exact_filter": "banana" })),
            ("query", json!({ "query_text": "recipe" })),
        ],
    );

    assert_eq!(tool_text(&results[0]), "pong");
    assert!(tool_text(&results[1]).parse::<i64>().unwrap() > 0);
    assert_eq!(tool_text(&results[2]), "banana bread recipe");
    let both = tool_text(&results[3]);
    assert!(both.contains("apple pie recipe") && both.contains("banana bread recipe"));
    assert!(!both.starts_with('"'));
    for result in &results {
        assert_ne!(result["isError"], json!(true));
    }
}

#[test]
fn test_mcp_stdio_missing_collection_is_tool_error() {
    let (_tmp, config_path) = setup_test_env("");
    run_colh(&config_path, &["init"]);

    let results = mcp_tool_calls(&config_path, &[("query", json!({ "query_text": "recipe" }))]);
    assert_eq!(results[0]["isError"], json!(true));
    assert!(tool_text(&results[0]).contains("not found"));
}
