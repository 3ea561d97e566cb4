use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

fn esdiag_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_esdiag"));
    cmd.env("HOME", home);
    cmd.env_remove("RUST_LOG");
    cmd.env_remove("ESDIAG_CONFIG");
    cmd.env_remove("ESDIAG_IGNORE_INDICES");
    cmd.env_remove("ESDIAG_FIELDDATA_FIELD_MB");
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    esdiag_cmd(home).args(args).output().expect("run esdiag")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home =
        std::env::temp_dir().join(format!("esdiag-markdown-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdirs");
    }
    std::fs::write(path, bytes).expect("write");
}

#[test]
fn markdown_lists_sections_and_tables() {
    let home = make_temp_home();
    let dump = home.join("dump");
    write_file(
        &dump.join("settings.json"),
        br#"{
            "hot": {"settings": {"index": {"refresh_interval": "200ms"}}},
            "warm": {"settings": {"index": {"refresh_interval": "30s"}}}
        }"#,
    );
    write_file(
        &dump.join("fielddata_stats.json"),
        br#"{"nodes": {"x": {"indices": {"fielddata": {"fields": {"session.id": {"memory_size_in_bytes": 4096}}}}}}}"#,
    );

    let out = run(&home, &["--markdown", dump.to_str().expect("utf-8 path")]);
    assert_eq!(out.status.code(), Some(0));
    let md = String::from_utf8(out.stdout).expect("utf-8");

    assert!(md.starts_with("# esdiag report"), "{md}");
    assert_eq!(md.matches("\n## ").count(), 11, "{md}");
    assert!(md.contains("## 6. refresh_interval"));
    assert!(md.contains("- **WARN** refresh_interval is at or below 1s for 1 of 2 indices (50.0%)"));
    assert!(md.contains("| Index | refresh_interval |"));
    assert!(md.contains("| hot | 200ms |"));
    assert!(md.contains("### Top 10 largest fields"));
    assert!(md.contains("| session.id | 4.0 KiB |"));
    assert!(md.contains("- Note: nodes.json not found in the dump"));

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn markdown_and_json_are_exclusive() {
    let home = make_temp_home();
    let out = run(&home, &["--markdown", "--json", "/tmp"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}
