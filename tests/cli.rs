use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn sidx_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_sidx"))
}

/// Config with a SQLite store and embeddings disabled.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    let config_path = root.join("sidx.toml");
    fs::write(
        &config_path,
        format!(
            "[store]\nbackend = \"sqlite\"\npath = \"{}/data/vectors.db\"\n",
            root.display()
        ),
    )
    .unwrap();
    (tmp, config_path)
}

fn run(config: &Path, args: &[&str]) -> Output {
    Command::new(sidx_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run sidx")
}

#[test]
fn test_init_creates_database() {
    let (tmp, config) = setup_test_env();
    let output = run(&config, &["init"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Vector store ready"));
    assert!(tmp.path().join("data/vectors.db").exists());
}

#[test]
fn test_index_lock_file_is_skipped() {
    let (tmp, config) = setup_test_env();
    let lock = tmp.path().join("package-lock.json");
    fs::write(&lock, "{ \"lockfileVersion\": 3 }").unwrap();

    let output = run(
        &config,
        &["index", lock.to_str().unwrap(), "--session", "chat-1", "--as", "package-lock.json"],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Skipped package-lock.json"));
}

#[test]
fn test_index_without_embeddings_fails() {
    let (tmp, config) = setup_test_env();
    let file = tmp.path().join("app.ts");
    fs::write(&file, "export const x = 1;\n").unwrap();

    let output = run(&config, &["index", file.to_str().unwrap(), "--session", "chat-1"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("embedding provider is disabled"));
}

#[test]
fn test_blank_query_prints_no_results() {
    let (_tmp, config) = setup_test_env();
    let output = run(&config, &["search", "   ", "--session", "chat-1"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No results."));
}

#[test]
fn test_missing_config_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let output = run(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read config file"));
}
