use pagetrack_core::{Database, Event, PageContext};
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(xdg_config.join("pagetrack")).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("pagetrack/events.db")
    }

    fn write_config(&self, content: &str) {
        fs::write(self.xdg_config.join("pagetrack/config.toml"), content)
            .expect("failed to write config");
    }

    fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.home.join(name);
        fs::write(&path, content).expect("failed to write file");
        path
    }
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("pagetrack"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute pagetrack: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    assert!(
        output.status.success(),
        "command failed: pagetrack {}\nstdout:\n{}\nstderr:\n{}",
        args.join(" "),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Config pointing the agent at a port nothing listens on
const UNREACHABLE: &str = r#"
[tracker]
endpoint = "http://127.0.0.1:9/track"
timeout_secs = 2
"#;

#[test]
fn status_reports_defaults_without_database() {
    let env = CliTestEnv::new();
    let args = ["status"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("http://localhost:8888/track"));
    assert!(stdout.contains("Batch size:      3"));
    assert!(stdout.contains("(no database yet)"));
}

#[test]
fn status_counts_stored_events() {
    let env = CliTestEnv::new();
    let db = Database::open(&env.db_path()).expect("open db");
    db.migrate().expect("migrate");
    let page = PageContext::new("http://localhost:8080/1.html", "One");
    db.insert_events(&[
        Event::new("a", vec![], &page),
        Event::new("b", vec![], &page),
    ])
    .expect("insert");
    drop(db);

    let args = ["status"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Stored events:   2"), "stdout: {stdout}");
}

#[test]
fn track_survives_unreachable_endpoint() {
    let env = CliTestEnv::new();
    env.write_config(UNREACHABLE);

    let args = ["track", "click", "nav", "--linger-ms", "500"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Tracked 1 event(s)"), "stdout: {stdout}");
    assert!(stdout.contains("1 failed"), "stdout: {stdout}");
    // The failed event is handed to the exit beacon instead of being dropped
    assert!(stdout.contains("exit beacon: 1 event(s)"), "stdout: {stdout}");
}

#[test]
fn replay_rejects_malformed_queue() {
    let env = CliTestEnv::new();
    env.write_config(UNREACHABLE);
    let queue = env.write_file("queue.json", r#"[["click"], []]"#);

    let queue_arg = queue.to_string_lossy().to_string();
    let output = run_bin(&env, &["replay", &queue_arg]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid queue file"), "stderr: {stderr}");
}

#[test]
fn replay_rejects_missing_file() {
    let env = CliTestEnv::new();
    let output = run_bin(&env, &["replay", "/nonexistent/queue.json"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read queue file"), "stderr: {stderr}");
}

#[test]
fn invalid_config_is_reported() {
    let env = CliTestEnv::new();
    env.write_config("[tracker]\nbatch_size = 0\n");

    let output = run_bin(&env, &["status"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load configuration"), "stderr: {stderr}");
}
