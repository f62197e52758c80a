use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn rfp_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("rfp");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[product]
name = "ION"

[paths]
manual_cache = "{root}/ION-manual/manual.json"
requirements_cache = "{root}/Airtable_data/airtable.json"
index_dir = "{root}/chroma_persist"
responses_dir = "{root}/responses"

[sources.manual]
base_url = "http://127.0.0.1:9/"

[sources.requirements]
endpoint = "http://127.0.0.1:9/v0/app/Requirements"
token_env = "RFP_TEST_TOKEN_UNSET"

[embedding]
provider = "ollama"
model = "nomic-embed-text"
dims = 768
url = "http://127.0.0.1:9"

[llm]
provider = "ollama"
model = "llama3"
url = "http://127.0.0.1:9"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("rfp.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_rfp(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = rfp_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run rfp binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_verdict_command() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_rfp(&config_path, &["verdict", "No."]);
    assert!(success);
    assert_eq!(stdout.trim(), "No");

    let (stdout, _, _) = run_rfp(&config_path, &["verdict", "Yes."]);
    assert_eq!(stdout.trim(), "Yes");

    let (stdout, _, _) = run_rfp(&config_path, &["verdict", "I don't know."]);
    assert_eq!(stdout.trim(), "N/A");
}

#[test]
fn test_phrase_command() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rfp(
        &config_path,
        &["phrase", "Export audit trail to CSV", "--opt-in"],
    );
    assert!(success, "phrase failed: {}", stderr);
    assert_eq!(stdout.trim(), "ION does Export audit trail to CSV");

    let (stdout, _, _) = run_rfp(&config_path, &["phrase", "Electronic signatures"]);
    assert_eq!(stdout.trim(), "ION does not have Electronic signatures");
}

#[test]
fn test_status_on_fresh_workspace() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rfp(&config_path, &["status"]);
    assert!(success, "status failed: {}", stderr);
    assert!(stdout.contains("INPUT"));
    assert!(stdout.contains("manual"));
    assert!(stdout.contains("requirements"));
    assert!(stdout.contains("fetch and normalize"));
    assert!(stdout.contains("rebuild"));
    assert!(!stdout.contains("ready"));
}

#[test]
fn test_stats_on_empty_storage_creates_nothing() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rfp(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("empty"));
    assert!(!tmp.path().join("chroma_persist").exists());
}

#[test]
fn test_history_show_and_clear() {
    let (tmp, config_path) = setup_test_env();
    let responses = tmp.path().join("responses");
    fs::create_dir_all(&responses).unwrap();
    fs::write(
        responses.join("history.csv"),
        "prompt,response,sources\nDoes ION fly?,\"No, it cannot.\",\n",
    )
    .unwrap();

    let (stdout, _, success) = run_rfp(&config_path, &["history", "show"]);
    assert!(success);
    assert!(stdout.contains("Does ION fly?"));

    let (_, _, success) = run_rfp(&config_path, &["history", "clear"]);
    assert!(success);
    assert_eq!(fs::read_to_string(responses.join("history.csv")).unwrap(), "");

    let (stdout, _, _) = run_rfp(&config_path, &["history", "show"]);
    assert!(stdout.contains("History is empty"));
}

#[test]
fn test_responses_prune_keeps_history() {
    let (tmp, config_path) = setup_test_env();
    let responses = tmp.path().join("responses");
    fs::create_dir_all(&responses).unwrap();
    fs::write(responses.join("history.csv"), "x").unwrap();
    fs::write(responses.join("2024-01-01_10-00-00.csv"), "x").unwrap();
    fs::write(responses.join("2024-02-01_10-00-00.csv"), "x").unwrap();

    let (stdout, _, success) = run_rfp(
        &config_path,
        &["responses", "prune", "--keep", "2024-02-01_10-00-00.csv"],
    );
    assert!(success);
    assert!(stdout.contains("Removed 1"));
    assert!(responses.join("history.csv").exists());
    assert!(responses.join("2024-02-01_10-00-00.csv").exists());
    assert!(!responses.join("2024-01-01_10-00-00.csv").exists());
}

#[test]
fn test_ingest_fails_when_source_unreachable() {
    let (tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_rfp(&config_path, &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("manual source failed"), "stderr: {}", stderr);
    assert!(!tmp.path().join("ION-manual/manual.json").exists());
    assert!(!tmp.path().join("chroma_persist").exists());
}

#[test]
fn test_invalid_config_rejected() {
    let (_tmp, config_path) = setup_test_env();
    fs::write(&config_path, "[chunking]\nchunk_size = 10\nchunk_overlap = 20\n").unwrap();

    let (_, stderr, success) = run_rfp(&config_path, &["status"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"));
}
