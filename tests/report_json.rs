use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

fn esdiag_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_esdiag"));
    cmd.env("HOME", home);
    cmd.env_remove("RUST_LOG");
    cmd.env_remove("ESDIAG_CONFIG");
    cmd.env_remove("ESDIAG_MAX_TOTAL_SHARDS");
    cmd.env_remove("ESDIAG_MAX_SHARDS_PER_NODE");
    cmd.env_remove("ESDIAG_SHARD_IMBALANCE_TOLERANCE");
    cmd.env_remove("ESDIAG_IGNORE_INDICES");
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    esdiag_cmd(home).args(args).output().expect("run esdiag")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home = std::env::temp_dir().join(format!("esdiag-json-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn parse(out: &Output) -> serde_json::Value {
    serde_json::from_slice(&out.stdout).expect("parse json")
}

fn section<'a>(v: &'a serde_json::Value, id: &str) -> &'a serde_json::Value {
    v["sections"]
        .as_array()
        .expect("sections")
        .iter()
        .find(|s| s["id"] == id)
        .unwrap_or_else(|| panic!("section {id}"))
}

#[test]
fn missing_documents_make_sections_unavailable_but_run_completes() {
    let home = make_temp_home();
    let dump = home.join("dump");
    std::fs::create_dir_all(&dump).expect("mkdir");
    std::fs::write(dump.join("cluster_health.json"), br#"{"status": "green"}"#).expect("write");

    let out = run(&home, &["--json", dump.to_str().expect("utf-8 path")]);
    assert_eq!(out.status.code(), Some(0));
    let v = parse(&out);

    assert_eq!(v["schema_version"], "1.0");
    assert_eq!(v["sections"].as_array().map(Vec::len), Some(11));
    assert_eq!(section(&v, "cluster-health")["findings"][0]["severity"], "good");

    let oops = section(&v, "compressed-oops");
    assert_eq!(oops["findings"].as_array().map(Vec::len), Some(1));
    assert_eq!(oops["findings"][0]["severity"], "unavailable");
    assert!(
        oops["findings"][0]["message"]
            .as_str()
            .is_some_and(|m| m.starts_with("data unavailable") && m.contains("nodes.json"))
    );

    assert_eq!(v["summary"]["good"], 1);
    assert_eq!(v["summary"]["unavailable"], 10);
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("document missing from dump"), "stderr={stderr}");

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn invalid_json_document_is_reported_and_skipped() {
    let home = make_temp_home();
    let dump = home.join("dump");
    std::fs::create_dir_all(&dump).expect("mkdir");
    std::fs::write(dump.join("cluster_health.json"), br#"{"status": "red"}"#).expect("write");
    std::fs::write(dump.join("nodes.json"), b"{\"nodes\": ").expect("write");

    let out = run(&home, &["--json", dump.to_str().expect("utf-8 path")]);
    assert_eq!(out.status.code(), Some(0));
    let v = parse(&out);

    let nodes = v["dump"]["documents"]
        .as_array()
        .expect("documents")
        .iter()
        .find(|d| d["file"] == "nodes.json")
        .expect("nodes.json status");
    assert_eq!(nodes["state"], "invalid");
    assert!(nodes["error"].as_str().is_some_and(|e| e.contains("invalid JSON")));
    assert_eq!(section(&v, "cluster-health")["findings"][0]["severity"], "warning");

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn imbalanced_nodes_are_flagged_in_json() {
    let home = make_temp_home();
    let dump = home.join("dump");
    std::fs::create_dir_all(&dump).expect("mkdir");

    let mut rows = Vec::new();
    for (node, n) in [("n1", 10), ("n2", 10), ("n3", 50)] {
        for i in 0..n {
            rows.push(serde_json::json!({
                "index": format!("idx-{node}"),
                "shard": i.to_string(),
                "prirep": "p",
                "docs": "100",
                "store": "1048576",
                "node": node,
            }));
        }
    }
    std::fs::write(
        dump.join("shards.json"),
        serde_json::to_vec(&rows).expect("serialize"),
    )
    .expect("write");

    let out = run(&home, &["--json", dump.to_str().expect("utf-8 path")]);
    assert_eq!(out.status.code(), Some(0));
    let v = parse(&out);

    let per_node = section(&v, "shards-per-node");
    let finding = per_node["findings"]
        .as_array()
        .expect("findings")
        .iter()
        .find(|f| f["code"] == "SHARD_ALLOCATION")
        .expect("allocation finding");
    assert_eq!(finding["severity"], "warning");
    assert_eq!(finding["value"], 40.0);

    let sizes = section(&v, "shard-size");
    let hist = sizes["charts"]
        .as_array()
        .expect("charts")
        .iter()
        .find(|c| c["kind"] == "histogram")
        .expect("histogram");
    let total: u64 = hist["buckets"]
        .as_array()
        .expect("buckets")
        .iter()
        .map(|b| b["count"].as_u64().unwrap_or(0))
        .sum();
    assert_eq!(total, 70);

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn report_contains_no_timestamps() {
    let home = make_temp_home();
    let dump = home.join("dump");
    std::fs::create_dir_all(&dump).expect("mkdir");
    std::fs::write(dump.join("cluster_health.json"), br#"{"status": "green"}"#).expect("write");

    let out = run(&home, &["--json", dump.to_str().expect("utf-8 path")]);
    let v = parse(&out);
    let obj = v.as_object().expect("object");
    let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
    keys.sort();
    assert_eq!(
        keys,
        vec!["dump", "schema_version", "sections", "summary", "tool_version"]
    );

    let _ = std::fs::remove_dir_all(&home);
}
