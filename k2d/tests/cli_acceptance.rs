use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
    project: PathBuf,
    transcripts: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");
        let project = base.join("project");
        let transcripts = base.join("transcripts");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(xdg_config.join("k2d")).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");
        fs::create_dir_all(project.join("src")).expect("failed to create project");
        fs::create_dir_all(&transcripts).expect("failed to create transcript dir");

        fs::write(project.join("src/main.rs"), "fn main() {}\n").expect("failed to seed project");
        fs::write(
            xdg_config.join("k2d/config.toml"),
            "[tracking]\nmode = \"snapshot\"\n",
        )
        .expect("failed to write config");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
            project,
            transcripts,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.project.join("meta/k2d.db")
    }

    fn seed_transcript(&self, name: &str, fixture: &str) -> PathBuf {
        let source = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../k2d-core/tests/fixtures/transcripts")
            .join(fixture);
        let target = self.transcripts.join(name);
        fs::copy(source, &target).expect("failed to copy transcript fixture");
        target
    }
}

fn command(env: &CliTestEnv, bin_name: &str) -> Command {
    let bin_path = match bin_name {
        "k2d" => PathBuf::from(assert_cmd::cargo::cargo_bin!("k2d")),
        "k2d-hook" => PathBuf::from(assert_cmd::cargo::cargo_bin!("k2d-hook")),
        _ => panic!("unsupported binary in test harness: {bin_name}"),
    };

    let mut command = Command::new(bin_path);
    command
        .current_dir(&env.project)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state);
    command
}

fn run_bin(env: &CliTestEnv, bin_name: &str, args: &[&str]) -> Output {
    command(env, bin_name)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute {bin_name}: {e}"))
}

fn run_hook(env: &CliTestEnv, payload: &str) -> serde_json::Value {
    let mut child = command(env, "k2d-hook")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn k2d-hook");
    child
        .stdin
        .take()
        .expect("missing stdin")
        .write_all(payload.as_bytes())
        .expect("failed to write payload");
    let output = child.wait_with_output().expect("failed to wait for k2d-hook");

    assert_success("k2d-hook", &[], &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("hook output is not JSON ({e}):\n{stdout}"))
}

fn payload(transcript: &Path, project: &Path, stop_hook_active: bool) -> String {
    serde_json::json!({
        "session_id": "ignored",
        "transcript_path": transcript,
        "cwd": project,
        "stop_hook_active": stop_hook_active,
    })
    .to_string()
}

fn assert_success(bin_name: &str, args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "{bin_name} {} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        args.join(" "),
        output.status,
        stdout,
        stderr
    );
}

#[test]
fn hook_records_turn_and_imports_history() {
    let env = CliTestEnv::new();
    env.seed_transcript("earlier.jsonl", "single-turn.jsonl");
    let transcript = env.seed_transcript("live.jsonl", "two-turns.jsonl");

    let output = run_hook(&env, &payload(&transcript, &env.project, false));

    assert_eq!(output["skipped"], serde_json::json!(false));
    assert!(output["turnId"].as_i64().is_some(), "missing turnId: {output}");
    // live.jsonl contributes its first turn, earlier.jsonl its only one
    assert_eq!(output["imported"], serde_json::json!(2));
    assert_eq!(output["importedSessions"], serde_json::json!(2));
    assert!(env.db_path().exists(), "database should exist");
    assert!(env.project.join("meta/snapshots").is_dir());

    let stats = run_bin(&env, "k2d", &["stats"]);
    assert_success("k2d", &["stats"], &stats);
    let stdout = String::from_utf8_lossy(&stats.stdout);
    assert!(stdout.contains("Tracking mode: snapshot"), "got:\n{stdout}");
    assert!(stdout.contains("Total turns:   3"), "got:\n{stdout}");
    assert!(stdout.contains("live"), "got:\n{stdout}");
    assert!(stdout.contains("dev-deployment-v1"), "got:\n{stdout}");
    assert!(stdout.contains("*deployment"), "got:\n{stdout}");
}

#[test]
fn hook_guard_skips_without_writing() {
    let env = CliTestEnv::new();
    let transcript = env.seed_transcript("live.jsonl", "two-turns.jsonl");

    let output = run_hook(&env, &payload(&transcript, &env.project, true));

    assert_eq!(
        output,
        serde_json::json!({"skipped": true, "reason": "stop_hook_active"})
    );
    assert!(!env.project.join("meta").exists());
}

#[test]
fn hook_reports_bad_payload_as_skip() {
    let env = CliTestEnv::new();

    let output = run_hook(&env, "this is not json");

    assert_eq!(output["skipped"], serde_json::json!(true));
    assert!(output["reason"]
        .as_str()
        .is_some_and(|r| r.contains("invalid hook input")));
}

#[test]
fn init_is_idempotent() {
    let env = CliTestEnv::new();

    let first = run_bin(&env, "k2d", &["init"]);
    assert_success("k2d", &["init"], &first);
    let stdout = String::from_utf8_lossy(&first.stdout);
    assert!(stdout.contains("Initialized k2d in"), "got:\n{stdout}");
    assert!(stdout.contains("Tracking mode: snapshot"), "got:\n{stdout}");
    assert!(env.db_path().exists());
    assert!(env.project.join("meta/patterns/workflows").is_dir());

    let second = run_bin(&env, "k2d", &["init"]);
    assert_success("k2d", &["init"], &second);
    assert!(String::from_utf8_lossy(&second.stdout).contains("Already initialized"));
}

#[test]
fn backfill_imports_every_session() {
    let env = CliTestEnv::new();
    env.seed_transcript("a.jsonl", "single-turn.jsonl");
    let transcript = env.seed_transcript("b.jsonl", "two-turns.jsonl");
    let transcript_arg = transcript.to_string_lossy().into_owned();
    let args = ["backfill", "--transcript", transcript_arg.as_str()];

    let output = run_bin(&env, "k2d", &args);
    assert_success("k2d", &args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Sessions imported: 2"), "got:\n{stdout}");
    assert!(stdout.contains("Turns imported:    3"), "got:\n{stdout}");

    // Already-known sessions are not imported twice
    let again = run_bin(&env, "k2d", &args);
    assert_success("k2d", &args, &again);
    assert!(String::from_utf8_lossy(&again.stdout).contains("Sessions imported: 0"));
}

#[test]
fn backfill_requires_existing_transcript() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, "k2d", &["backfill", "--transcript", "nowhere.jsonl"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Transcript not found"));
}

#[test]
fn infer_reports_phase_transition_and_skills() {
    let env = CliTestEnv::new();
    let args = ["infer", "--text", "deploy the release to production"];

    let output = run_bin(&env, "k2d", &args);
    assert_success("k2d", &args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Phase: deployment"), "got:\n{stdout}");
    assert!(
        stdout.contains("Transition: development -> deployment"),
        "got:\n{stdout}"
    );
    assert!(stdout.contains("dev-deployment-v1 (high)"), "got:\n{stdout}");

    let quiet = run_bin(
        &env,
        "k2d",
        &["infer", "--text", "hello", "--current", "testing"],
    );
    assert_success("k2d", &["infer"], &quiet);
    let stdout = String::from_utf8_lossy(&quiet.stdout);
    assert!(stdout.contains("Phase: development"), "got:\n{stdout}");
    assert!(stdout.contains("Transition: none"), "got:\n{stdout}");
    assert!(stdout.contains("Recommended skills: none"), "got:\n{stdout}");
}

#[test]
fn infer_rejects_unknown_phase() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, "k2d", &["infer", "--text", "x", "--current", "nope"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown phase"));
}
