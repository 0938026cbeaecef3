use std::fs;
use std::path::Path;

use anyhow::Result;
use assert_cmd::Command;
use predicates::boolean::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_string_contains;
use wiremock::matchers::method;
use wiremock::matchers::path;

const GENERATE_PATH: &str = "/models/gemini-1.5-flash:generateContent";

/// Command isolated from the caller's home directory and environment.
fn cloudcrafters(home: &Path) -> Result<Command> {
    let mut cmd = Command::cargo_bin("cloudcrafters")?;
    cmd.env("HOME", home)
        .env_remove("GEMINI_API_KEY")
        .env_remove("GEMINI_BASE_URL")
        .env_remove("CLOUDCRAFTERS_MODEL")
        .env_remove("CLOUDCRAFTERS_SUBJECT")
        .env_remove("RUST_LOG");
    Ok(cmd)
}

fn reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    }))
}

fn write_config(dir: &Path, base_url: &str) -> Result<std::path::PathBuf> {
    let path = dir.join("config.yaml");
    fs::write(
        &path,
        format!("model:\n  base_url: {base_url}\nsearch:\n  enabled: false\n"),
    )?;
    Ok(path)
}

#[test]
fn run_without_api_key_fails_before_any_stage() -> Result<()> {
    let home = TempDir::new()?;
    cloudcrafters(home.path())?
        .arg("run")
        .assert()
        .failure()
        .stderr(contains("GEMINI_API_KEY"))
        .stdout(contains("Design Output").not());
    Ok(())
}

#[test]
fn run_with_invalid_config_fails_before_any_request() -> Result<()> {
    let home = TempDir::new()?;
    let config = home.path().join("config.yaml");
    fs::write(
        &config,
        "model:\n  base_url: http://127.0.0.1:9\n  timeout_secs: 0\nsearch:\n  enabled: false\n",
    )?;
    cloudcrafters(home.path())?
        .env("GEMINI_API_KEY", "test-key")
        .arg("--config")
        .arg(&config)
        .arg("run")
        .assert()
        .failure()
        .stderr(contains("invalid configuration"))
        .stderr(contains("model.timeout_secs must be greater than zero"))
        .stdout(contains("Design Output").not());
    Ok(())
}

#[test]
fn list_shows_builtin_stages() -> Result<()> {
    let home = TempDir::new()?;
    cloudcrafters(home.path())?
        .arg("list")
        .assert()
        .success()
        .stdout(contains("cloud-architect"))
        .stdout(contains("\"Developer Output\""))
        .stdout(contains("{terraform_code}"));
    Ok(())
}

#[test]
fn list_json_describes_pipeline_file() -> Result<()> {
    let home = TempDir::new()?;
    let pipeline = home.path().join("pipeline.yaml");
    fs::write(
        &pipeline,
        "name: solo\nagents:\n  - name: writer\n    role: Writer\n    goal: Write about {subject}\nstages:\n  - name: draft\n    agent: writer\n    description: Draft {subject}\n    expected_output: A draft\n",
    )?;
    let output = cloudcrafters(home.path())?
        .args(["list", "--format", "json", "--pipeline"])
        .arg(&pipeline)
        .output()?;
    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["name"], "solo");
    assert_eq!(value["required_inputs"], json!(["subject"]));
    assert_eq!(value["stages"][0]["label"], "draft");
    Ok(())
}

#[test]
fn status_reports_missing_key() -> Result<()> {
    let home = TempDir::new()?;
    cloudcrafters(home.path())?
        .arg("status")
        .assert()
        .success()
        .stdout(contains("API key: not configured"))
        .stdout(contains("Issues found:"));
    Ok(())
}

#[test]
fn invalid_pipeline_file_is_reported() -> Result<()> {
    let home = TempDir::new()?;
    let pipeline = home.path().join("broken.yaml");
    fs::write(&pipeline, "name: broken\nagents: []\nstages: []\n")?;
    cloudcrafters(home.path())?
        .args(["list", "--pipeline"])
        .arg(&pipeline)
        .assert()
        .failure()
        .stderr(contains("failed to load pipeline"));
    Ok(())
}

#[test]
fn run_prints_each_stage_and_threads_outputs() -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let server = runtime.block_on(MockServer::start());
    runtime.block_on(async {
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(body_string_contains("You are Cloud Architect."))
            .and(body_string_contains("A static website"))
            .respond_with(reply("DESIGN-DOC: S3 and CloudFront"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(body_string_contains("You are Platform Engineer."))
            .and(body_string_contains("DESIGN-DOC: S3 and CloudFront"))
            .respond_with(reply("resource \"aws_s3_bucket\" \"site\" {}"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(body_string_contains("You are Security Analyst."))
            .and(body_string_contains("aws_s3_bucket"))
            .respond_with(reply("REVIEWED"))
            .expect(1)
            .mount(&server)
            .await;
    });

    let home = TempDir::new()?;
    let config = write_config(home.path(), &server.uri())?;
    cloudcrafters(home.path())?
        .env("GEMINI_API_KEY", "test-key")
        .arg("--config")
        .arg(&config)
        .args(["run", "--subject", "A static website"])
        .assert()
        .success()
        .stdout(contains("Design Output: DESIGN-DOC: S3 and CloudFront"))
        .stdout(contains("Developer Output: resource \"aws_s3_bucket\" \"site\" {}"))
        .stdout(contains("Review Output: REVIEWED"));

    runtime.block_on(server.verify());
    Ok(())
}

#[test]
fn run_json_emits_report_and_stops_on_failure() -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let server = runtime.block_on(MockServer::start());
    runtime.block_on(async {
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(body_string_contains("You are Cloud Architect."))
            .respond_with(reply("design"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(body_string_contains("You are Platform Engineer."))
            .respond_with(reply("terraform"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(body_string_contains("You are Security Analyst."))
            .respond_with(reply("review"))
            .mount(&server)
            .await;
    });

    let home = TempDir::new()?;
    let config = write_config(home.path(), &server.uri())?;
    let output = cloudcrafters(home.path())?
        .env("GEMINI_API_KEY", "test-key")
        .arg("--config")
        .arg(&config)
        .args(["run", "--format", "json"])
        .output()?;
    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["pipeline"], "cloudcrafters");
    assert_eq!(
        report["inputs"]["topic"],
        "Set up an EC2 instance to host a SharePoint form, including a backend database."
    );
    let texts: Vec<_> = report["stages"]
        .as_array()
        .map(|stages| stages.iter().map(|s| s["text"].clone()).collect())
        .unwrap_or_default();
    assert_eq!(texts, vec![json!("design"), json!("terraform"), json!("review")]);

    // A failing second stage leaves the third untouched.
    let failing = runtime.block_on(MockServer::start());
    runtime.block_on(async {
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(body_string_contains("You are Cloud Architect."))
            .respond_with(reply("design"))
            .mount(&failing)
            .await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(body_string_contains("You are Platform Engineer."))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend down"))
            .mount(&failing)
            .await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(body_string_contains("You are Security Analyst."))
            .respond_with(reply("review"))
            .expect(0)
            .mount(&failing)
            .await;
    });
    let config = write_config(home.path(), &failing.uri())?;
    cloudcrafters(home.path())?
        .env("GEMINI_API_KEY", "test-key")
        .arg("--config")
        .arg(&config)
        .arg("run")
        .assert()
        .failure()
        .stdout(contains("Design Output: design"))
        .stdout(contains("Review Output").not())
        .stderr(contains("backend down"));
    runtime.block_on(failing.verify());
    Ok(())
}
