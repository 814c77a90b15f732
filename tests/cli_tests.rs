/*!
 * End-to-end tests for the tether binary
 */

use std::process::Command;
use tempfile::tempdir;

use tether::config::TetherConfig;
use tether::monitor::{AttemptRecord, AttemptStore, SqliteAttemptStore};

fn tether() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tether"))
}

#[test]
fn test_init_writes_loadable_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tether.toml");

    let status = tether()
        .args(["init", "--path"])
        .arg(&path)
        .status()
        .unwrap();
    assert!(status.success());

    let config = TetherConfig::from_file(&path).unwrap();
    assert_eq!(config, TetherConfig::default());

    // Refuses to overwrite without --force
    let again = tether().args(["init", "--path"]).arg(&path).output().unwrap();
    assert_eq!(again.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&again.stderr).contains("already exists"));

    let forced = tether()
        .args(["init", "--force", "--path"])
        .arg(&path)
        .status()
        .unwrap();
    assert!(forced.success());
}

#[test]
fn test_status_json_from_sqlite_log() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("attempts.db");

    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let store = SqliteAttemptStore::open(db.to_str().unwrap()).await.unwrap();
        store
            .append_batch(&[
                AttemptRecord::success("canvas"),
                AttemptRecord::success("canvas"),
                AttemptRecord::success("canvas"),
                AttemptRecord::failure("canvas", "HTTP 503"),
            ])
            .await
            .unwrap();
        store.pool().close().await;
    });

    let output = tether()
        .args(["status", "canvas", "--json", "--db"])
        .arg(&db)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"]["total_attempts"], 4);
    assert_eq!(json["status"]["success_rate"], 75.0);
    assert_eq!(json["circuit"]["state"], "CLOSED");
}

#[test]
fn test_health_exit_code_reflects_classification() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("attempts.db");

    let output = tether()
        .args(["health", "never-called", "--json", "--db"])
        .arg(&db)
        .output()
        .unwrap();

    // No attempts in the window classifies as unhealthy
    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["health"], "unhealthy");
    assert_eq!(json["recommendations"][0], "investigate_errors");
}

#[test]
fn test_bad_config_is_fatal() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tether.toml");
    std::fs::write(&path, "[retry]\nmax_attempts = 0\n").unwrap();

    let output = tether()
        .args(["monitor", "--json", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));

    let json: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(json["category"], "configuration");
    assert_eq!(json["exit_code"], 2);
    assert!(json["error"].as_str().unwrap().contains("max_attempts"));
}
