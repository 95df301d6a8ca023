use std::fs;
use std::process::Command;

fn geotag() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_geotag"));
    command
        .env_remove("GEOTAG_MAPS_API_KEY")
        .env_remove("GEOTAG_COMPLETION_API_KEY")
        .env("RUST_LOG", "warn");
    command
}

#[test]
fn config_stub_prints_default_config() {
    let output = geotag().arg("config-stub").output().expect("run geotag");
    assert!(output.status.success());
    let config: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("parse config stub");
    assert_eq!(config["checkpoint_interval"], 50);
    assert_eq!(config["geocode_failure"], "skip_candidate");
    assert_eq!(config["completion"]["model"], "deepseek-chat");
}

#[test]
fn missing_input_runs_to_an_empty_final_snapshot() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let output = geotag()
        .args(["run", "--input"])
        .arg(dir.path().join("search_contents.json"))
        .args(["--lm-command", "cat", "--json"])
        .env("GEOTAG_MAPS_API_KEY", "test-key")
        .output()
        .expect("run geotag");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("parse summary");
    assert_eq!(summary["processed"], 0);
    assert_eq!(summary["retained"], 0);

    let final_path = dir.path().join("processed_search_contents_final.json");
    let text = fs::read_to_string(final_path).expect("read final snapshot");
    let snapshot: serde_json::Value = serde_json::from_str(&text).expect("parse final snapshot");
    assert_eq!(snapshot, serde_json::json!([]));
}

#[test]
fn http_backend_without_completion_key_fails_fast() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let output = geotag()
        .args(["run", "--input"])
        .arg(dir.path().join("posts.json"))
        .args(["--maps-key", "test-key"])
        .output()
        .expect("run geotag");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("completion API key"));
}

#[test]
fn zero_checkpoint_interval_is_rejected() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let output = geotag()
        .args(["run", "--input"])
        .arg(dir.path().join("posts.json"))
        .args(["--maps-key", "k", "--lm-command", "cat", "--checkpoint-interval", "0"])
        .output()
        .expect("run geotag");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("checkpoint_interval"));
}
