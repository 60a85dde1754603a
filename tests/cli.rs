use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement};
use serde_json::{json, Value};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_goalpilot"))
}

fn run_cmd(home: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::new(bin_path());
    cmd.arg("--home").arg(home);
    cmd.args(args);
    cmd.env_remove("GOALPILOT_HOME")
        .env_remove("GOALPILOT_LOG")
        .env_remove("HTTP_PROXY")
        .env_remove("http_proxy")
        .env_remove("ALL_PROXY")
        .env_remove("all_proxy")
        .env("NO_PROXY", "127.0.0.1,localhost");
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.output().expect("run command")
}

/// Runs the binary off the async runtime so a mock server can answer it.
async fn run_cmd_async(home: &Path, args: &[&str]) -> Output {
    let home = home.to_path_buf();
    let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
    tokio::task::spawn_blocking(move || {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_cmd(&home, &args)
    })
    .await
    .expect("join command")
}

fn output_stdout(output: Output) -> String {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("stdout utf8")
}

fn output_failure(output: Output) -> String {
    assert_eq!(
        output.status.code(),
        Some(1),
        "stdout: {}",
        String::from_utf8_lossy(&output.stdout)
    );
    String::from_utf8(output.stderr).expect("stderr utf8")
}

fn parse_created_id(stdout: &str, kind: &str) -> String {
    let prefix = format!("Created {kind} ID: ");
    let line = stdout
        .lines()
        .find(|line| line.starts_with(&prefix))
        .expect("created line");
    let rest = line.strip_prefix(&prefix).expect("created output");
    rest.split(':').next().expect("id").trim().to_string()
}

fn add_goal(home: &Path, title: &str) -> String {
    let stdout = output_stdout(run_cmd(
        home,
        &["goal", "add", title, "--month", "10", "--year", "2026"],
    ));
    parse_created_id(&stdout, "goal")
}

fn set_api(home: &Path, provider: &str, base_url: &str) {
    output_stdout(run_cmd(
        home,
        &[
            "settings",
            "set-api",
            "--provider",
            provider,
            "--api-key",
            "test-key-1234",
            "--base-url",
            base_url,
        ],
    ));
}

fn openai_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"content": content}}]
    }))
}

async fn connect(home: &Path) -> DatabaseConnection {
    let mut url = Url::from_file_path(home.join("goalpilot.db")).expect("db url");
    url.set_query(Some("mode=rwc"));
    let sqlite_url = url.as_str().replacen("file://", "sqlite://", 1);
    Database::connect(&sqlite_url).await.expect("connect db")
}

async fn stored_value(home: &Path, key: &str) -> Option<String> {
    let db = connect(home).await;
    let row = db
        .query_one(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "SELECT value FROM kv_entries WHERE key = ?",
            [key.into()],
        ))
        .await
        .expect("query");
    row.map(|row| row.try_get::<String>("", "value").expect("value"))
}

async fn put_value(home: &Path, key: &str, value: &str) {
    let db = connect(home).await;
    db.execute(Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        "INSERT OR REPLACE INTO kv_entries (key, value, updated_at) VALUES (?, ?, ?)",
        [
            key.into(),
            value.into(),
            "2026-01-01T00:00:00+00:00".into(),
        ],
    ))
    .await
    .expect("insert");
}

#[test]
fn goal_add_without_api_key_uses_fallback_roadmap() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(
        dir.path(),
        &["goal", "add", "Learn Spanish", "--month", "10", "--year", "2026"],
    ));
    assert!(stdout.contains("Roadmap: 3 steps (fallback)"), "{stdout}");
    assert!(stdout.contains("Define success criteria"));
    assert!(stdout.contains("'Learn Spanish'"));

    let list = output_stdout(run_cmd(dir.path(), &["goal", "list"]));
    assert!(list.contains("Learn Spanish"));
    assert!(list.contains("2026-10"));
    assert!(list.contains("0/3"));
}

#[test]
fn toggling_steps_updates_progress() {
    let dir = TempDir::new().expect("temp dir");
    let goal_id = add_goal(dir.path(), "Run a marathon");

    let stdout = output_stdout(run_cmd(dir.path(), &["step", "toggle", &goal_id, "1"]));
    assert!(stdout.contains("Step 1 marked done"));
    assert!(stdout.contains("Progress: 33% (1/3 steps)"));

    let stdout = output_stdout(run_cmd(dir.path(), &["step", "toggle", &goal_id, "2"]));
    assert!(stdout.contains("Progress: 67% (2/3 steps)"));

    let show = output_stdout(run_cmd(dir.path(), &["goal", "show", &goal_id[..8]]));
    assert!(show.contains("Progress: 67%"));
    assert!(show.contains("1. [x] Define success criteria"));
    assert!(show.contains("3. [ ] Start and iterate"));
}

#[test]
fn step_editing_keeps_positions_contiguous() {
    let dir = TempDir::new().expect("temp dir");
    let goal_id = add_goal(dir.path(), "Read more");

    let stdout = output_stdout(run_cmd(
        dir.path(),
        &["step", "add", &goal_id, "Join a book club", "--at", "1"],
    ));
    assert!(stdout.contains("Added step 1"));
    assert!(stdout.contains("Progress: 0% (0/4 steps)"));

    let stdout = output_stdout(run_cmd(
        dir.path(),
        &["step", "move", &goal_id, "1", "--to", "4"],
    ));
    assert!(stdout.contains("4. [ ] Join a book club"));

    output_stdout(run_cmd(
        dir.path(),
        &["step", "update", &goal_id, "4", "--completed", "true", "--notes", "Tuesdays"],
    ));
    let stdout = output_stdout(run_cmd(dir.path(), &["step", "remove", &goal_id, "1", "2"]));
    assert!(stdout.contains("Removed 2 steps."));
    assert!(stdout.contains("Progress: 50% (1/2 steps)"));

    let show = output_stdout(run_cmd(dir.path(), &["goal", "show", &goal_id]));
    assert!(show.contains("2. [x] Join a book club"));
    assert!(show.contains("Notes: Tuesdays"));
}

#[test]
fn unknown_goal_id_is_reported() {
    let dir = TempDir::new().expect("temp dir");
    add_goal(dir.path(), "Goal");
    let stderr = output_failure(run_cmd(dir.path(), &["goal", "show", "zzzz"]));
    assert!(stderr.contains("Not found: goal id zzzz"));
}

#[test]
fn task_generate_without_api_key_fails_with_hint() {
    let dir = TempDir::new().expect("temp dir");
    add_goal(dir.path(), "Learn Spanish");
    let stderr = output_failure(run_cmd(dir.path(), &["task", "generate"]));
    assert!(stderr.contains("no API key configured"), "{stderr}");
    assert!(stderr.contains("goalpilot settings show"));

    let stdout = output_stdout(run_cmd(dir.path(), &["task", "list"]));
    assert!(stdout.contains("No tasks for today."));
}

#[test]
fn task_generate_without_goals_is_invalid_input() {
    let dir = TempDir::new().expect("temp dir");
    let stderr = output_failure(run_cmd(dir.path(), &["task", "generate"]));
    assert!(stderr.contains("Invalid input"));
}

#[tokio::test(flavor = "multi_thread")]
async fn goal_add_uses_mocked_openai_roadmap() {
    let server = MockServer::start().await;
    let content = json!({
        "roadmap": [{"step": "Pick app", "description": "Choose a language app"}]
    })
    .to_string();
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key-1234"))
        .respond_with(openai_reply(&content))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("temp dir");
    set_api(dir.path(), "openai", &server.uri());

    let stdout = output_stdout(
        run_cmd_async(dir.path(), &["goal", "add", "Learn Spanish"]).await,
    );
    assert!(stdout.contains("Roadmap: 1 steps (ai)"), "{stdout}");
    assert!(stdout.contains("1. [ ] Pick app"));

    let requests = server.received_requests().await.expect("requests");
    let body: Value = serde_json::from_slice(&requests[0].body).expect("request body");
    assert_eq!(body["model"], "gpt-3.5-turbo");
    assert!(body["messages"][0]["content"]
        .as_str()
        .expect("prompt")
        .contains("Title: Learn Spanish"));
}

#[tokio::test(flavor = "multi_thread")]
async fn provider_error_falls_back_without_failing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("temp dir");
    set_api(dir.path(), "openai", &server.uri());

    let stdout = output_stdout(
        run_cmd_async(dir.path(), &["goal", "add", "Learn Spanish"]).await,
    );
    assert!(stdout.contains("Roadmap: 3 steps (fallback)"));
    assert!(stdout.contains("Define success criteria"));
}

#[tokio::test(flavor = "multi_thread")]
async fn task_generate_stores_mocked_tasks() {
    let server = MockServer::start().await;
    let tasks = json!([{
        "title": "Practice verbs",
        "description": "Ten minutes of drills",
        "goalTitle": "learn spanish",
        "priority": "high",
        "category": "review",
        "estimatedTime": 15
    }])
    .to_string();
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(openai_reply(&format!("```json\n{tasks}\n```")))
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("temp dir");
    let goal_id = add_goal(dir.path(), "Learn Spanish");
    set_api(dir.path(), "openai", &server.uri());

    let stdout = output_stdout(run_cmd_async(dir.path(), &["task", "generate"]).await);
    assert!(stdout.contains("Generated 1 tasks:"));
    assert!(stdout.contains("Practice verbs"));

    let list = output_stdout(run_cmd(dir.path(), &["task", "list"]));
    assert!(list.contains("Today (0/1 done):"));
    assert!(list.contains("high"));
    assert!(list.contains(" 15m Practice verbs"));

    let raw = stored_value(dir.path(), "daily-tasks").await.expect("tasks");
    let stored: Value = serde_json::from_str(&raw).expect("tasks json");
    assert_eq!(stored[0]["goalId"], goal_id.as_str());
    let task_id = stored[0]["id"].as_str().expect("task id").to_string();

    let stdout = output_stdout(run_cmd(dir.path(), &["task", "toggle", &task_id[..8]]));
    assert!(stdout.contains("marked done"));
    let list = output_stdout(run_cmd(dir.path(), &["task", "list"]));
    assert!(list.contains("Today (1/1 done):"));
}

#[tokio::test(flavor = "multi_thread")]
async fn goal_chat_uses_anthropic_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "test-key-1234"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "Practice ten minutes every day."}]
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("temp dir");
    let goal_id = add_goal(dir.path(), "Learn Spanish");
    set_api(dir.path(), "anthropic", &server.uri());

    let stdout = output_stdout(
        run_cmd_async(dir.path(), &["goal", "chat", &goal_id, "How", "do", "I", "start?"]).await,
    );
    assert_eq!(stdout.trim(), "Practice ten minutes every day.");

    let requests = server.received_requests().await.expect("requests");
    let body: Value = serde_json::from_slice(&requests[0].body).expect("request body");
    assert_eq!(body["messages"][0]["content"], "How do I start?");
    assert!(body["system"]
        .as_str()
        .expect("system")
        .contains("\"Learn Spanish\""));
}

#[tokio::test(flavor = "multi_thread")]
async fn note_summary_and_insights_are_stored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(openai_reply("[\"Buy eggs first\", \"Check the pantry\"]"))
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("temp dir");
    set_api(dir.path(), "openai", &server.uri());
    let stdout = output_stdout(run_cmd(
        dir.path(),
        &["note", "add", "Groceries", "--content", "eggs, milk", "--tag", "home"],
    ));
    let note_id = parse_created_id(&stdout, "note");

    let stdout = output_stdout(run_cmd_async(dir.path(), &["note", "insights", &note_id]).await);
    assert!(stdout.contains("- Buy eggs first"));
    assert!(stdout.contains("- Check the pantry"));

    let show = output_stdout(run_cmd(dir.path(), &["note", "show", &note_id]));
    assert!(show.contains("Insights:"));
    assert!(show.contains("Tags: home"));
}

#[test]
fn notes_list_pinned_first_and_filter() {
    let dir = TempDir::new().expect("temp dir");
    let first = parse_created_id(
        &output_stdout(run_cmd(
            dir.path(),
            &["note", "add", "Groceries", "--content", "eggs", "--tag", "home"],
        )),
        "note",
    );
    output_stdout(run_cmd(
        dir.path(),
        &["note", "add", "Standup", "--content", "discuss roadmap", "--tag", "work"],
    ));
    output_stdout(run_cmd(dir.path(), &["note", "pin", &first]));

    let list = output_stdout(run_cmd(dir.path(), &["note", "list"]));
    let groceries = list.find("Groceries").expect("groceries");
    let standup = list.find("Standup").expect("standup");
    assert!(groceries < standup, "{list}");

    let work = output_stdout(run_cmd(dir.path(), &["note", "list", "--tag", "work"]));
    assert!(work.contains("Standup"));
    assert!(!work.contains("Groceries"));

    let search = output_stdout(run_cmd(dir.path(), &["note", "list", "--search", "ROADMAP"]));
    assert!(search.contains("Standup"));
    assert!(!search.contains("Groceries"));

    output_stdout(run_cmd(dir.path(), &["note", "remove", &first]));
    let list = output_stdout(run_cmd(dir.path(), &["note", "list"]));
    assert!(!list.contains("Groceries"));
}

#[tokio::test]
async fn api_settings_are_written_under_both_keys() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(
        dir.path(),
        &["settings", "set-api", "--provider", "gemini", "--api-key", "secret-9876"],
    ));
    assert!(stdout.contains("provider gemini (key ****9876)"));

    let current = stored_value(dir.path(), "api-settings").await.expect("current");
    let legacy = stored_value(dir.path(), "apiSettings").await.expect("legacy");
    assert_eq!(current, legacy);
    let parsed: Value = serde_json::from_str(&current).expect("settings json");
    assert_eq!(parsed["provider"], "gemini");
    assert_eq!(parsed["apiKey"], "secret-9876");

    let show = output_stdout(run_cmd(dir.path(), &["settings", "show"]));
    assert!(show.contains("API provider: gemini"));
    assert!(show.contains("Model: gemini-3-flash-preview (default)"));
    assert!(!show.contains("secret-9876"));

    output_stdout(run_cmd(dir.path(), &["settings", "clear-api"]));
    let show = output_stdout(run_cmd(dir.path(), &["settings", "show"]));
    assert!(show.contains("API: not configured"));
}

#[tokio::test]
async fn legacy_gemini_key_is_read() {
    let dir = TempDir::new().expect("temp dir");
    output_stdout(run_cmd(dir.path(), &["settings", "show"]));
    put_value(dir.path(), "apiSettings", r#"{"geminiKey":"legacy-key-5555"}"#).await;

    let show = output_stdout(run_cmd(dir.path(), &["settings", "show"]));
    assert!(show.contains("API provider: gemini"), "{show}");
    assert!(show.contains("****5555"));
}

#[tokio::test]
async fn corrupt_store_entry_is_an_error() {
    let dir = TempDir::new().expect("temp dir");
    add_goal(dir.path(), "Goal");
    put_value(dir.path(), "daily-goals", "[{broken").await;

    let stderr = output_failure(run_cmd(dir.path(), &["goal", "list"]));
    assert!(stderr.contains("daily-goals"), "{stderr}");
}

#[test]
fn reminder_plan_honors_frequency_and_quiet_hours() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(dir.path(), &["remind", "plan", "--at", "06:00"]));
    assert!(stdout.contains("Notifications are disabled."));

    output_stdout(run_cmd(
        dir.path(),
        &[
            "settings",
            "set-notify",
            "--enable",
            "--frequency",
            "high",
            "--quiet-start",
            "12:00",
            "--quiet-end",
            "14:00",
        ],
    ));
    let stdout = output_stdout(run_cmd(dir.path(), &["remind", "plan", "--at", "06:00"]));
    assert!(stdout.contains("08:30"));
    assert!(stdout.contains("Good Morning!"));
    assert!(stdout.contains("Daily Tasks Ready"));
    assert!(!stdout.contains("Midday Check-in"));
    assert!(stdout.contains("Afternoon Boost"));
    assert!(stdout.contains("Daily Review"));

    let stdout = output_stdout(run_cmd(dir.path(), &["remind", "plan", "--at", "19:00"]));
    assert!(stdout.contains("No reminders left for today."));

    let stderr = output_failure(run_cmd(
        dir.path(),
        &["settings", "set-notify", "--quiet-start", "7pm"],
    ));
    assert!(stderr.contains("quiet hours must be HH:MM"));
}
