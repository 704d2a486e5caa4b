use super::*;
use clap::error::ErrorKind;
use httpmock::prelude::*;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

const PROFILE: &str = "Golden Crust is a family bakery in Lisbon.";

fn cli_in(dir: &Path, premise: &str, backend: BackendArg) -> Cli {
    Cli {
        premise: premise.to_string(),
        backend: Some(backend),
        model: None,
        delay_secs: Some(0),
        about: Some(dir.join("about.md")),
        posts_dir: Some(dir.join("posts")),
        no_stream: true,
        verbose: false,
    }
}

fn write_profile(dir: &Path) {
    fs::write(dir.join("about.md"), PROFILE).expect("write about.md");
}

fn set_env(key: &str, value: &OsStr) {
    // SAFETY: keys and values are ASCII literals without interior null bytes,
    // and each test uses its own variable name.
    unsafe { std::env::set_var(key, value) };
}

#[test]
fn cli_parses_premise_and_overrides() {
    let cli = Cli::try_parse_from([
        "postforge",
        "Weekend sourdough special",
        "--backend",
        "ollama",
        "--model",
        "llama3.2",
        "--delay-secs",
        "5",
        "--no-stream",
    ])
    .expect("parse arguments");

    assert_eq!(cli.premise, "Weekend sourdough special");
    assert_eq!(cli.backend, Some(BackendArg::Ollama));
    assert_eq!(cli.model.as_deref(), Some("llama3.2"));
    assert_eq!(cli.delay_secs, Some(5));
    assert!(cli.no_stream);
}

#[test]
fn cli_requires_premise() {
    let error = Cli::try_parse_from(["postforge"]).expect_err("premise is required");
    assert_eq!(error.kind(), ErrorKind::MissingRequiredArgument);
}

#[test]
fn settings_prefer_command_line_over_config() {
    let mut config = Config::default();
    config.backend = BackendKind::Gemini;
    config.pipeline.step_delay_secs = 7;

    let defaults = Cli::try_parse_from(["postforge", "idea"]).expect("parse");
    let settings = RunSettings::resolve(&defaults, &config);
    assert_eq!(settings.backend, BackendKind::Gemini);
    assert_eq!(settings.step_delay, Duration::from_secs(7));
    assert_eq!(settings.profile_path, PathBuf::from("about.md"));
    assert_eq!(settings.posts_dir, PathBuf::from("posts"));
    assert!(settings.backend_options.stream);

    let overridden = Cli::try_parse_from([
        "postforge",
        "idea",
        "--backend",
        "openai",
        "--delay-secs",
        "0",
        "--about",
        "profile.txt",
        "--posts-dir",
        "out",
    ])
    .expect("parse");
    let settings = RunSettings::resolve(&overridden, &config);
    assert_eq!(settings.backend, BackendKind::OpenAi);
    assert!(settings.step_delay.is_zero());
    assert_eq!(settings.profile_path, PathBuf::from("profile.txt"));
    assert_eq!(settings.posts_dir, PathBuf::from("out"));
}

#[test]
fn ensure_premise_rejects_whitespace() {
    let error = ensure_premise(" \t\n").expect_err("blank premise");
    assert!(error.to_string().contains("must not be empty"));
    assert!(ensure_premise("Summer sale").is_ok());
}

#[test]
fn run_leaves_blank_premise_to_pipeline() {
    let temp = TempDir::new().expect("create temp dir");
    write_profile(temp.path());
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/api/chat");
        then.status(500);
    });

    let mut config = Config::default();
    config.ollama.host = server.base_url();

    let error = run(cli_in(temp.path(), "   ", BackendArg::Ollama), config)
        .expect_err("blank premise");
    assert!(format!("{error:#}").contains("premise is empty"));
    mock.assert_hits(0);
    assert!(!temp.path().join("posts").exists());
}

#[test]
fn run_fails_without_credential_before_creating_output() {
    let temp = TempDir::new().expect("create temp dir");
    write_profile(temp.path());

    let mut config = Config::default();
    config.openai.api_key_env_var = "POSTFORGE_CLI_TEST_UNSET_OPENAI_KEY".to_string();

    let error = run(cli_in(temp.path(), "Summer sale", BackendArg::Openai), config)
        .expect_err("missing credential");
    assert!(format!("{error:#}").contains("POSTFORGE_CLI_TEST_UNSET_OPENAI_KEY"));
    assert!(!temp.path().join("posts").exists());
}

#[test]
fn run_fails_without_profile_before_any_request() {
    let temp = TempDir::new().expect("create temp dir");
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/api/chat");
        then.status(500);
    });

    let mut config = Config::default();
    config.ollama.host = server.base_url();

    let error = run(cli_in(temp.path(), "Summer sale", BackendArg::Ollama), config)
        .expect_err("missing about.md");
    let message = format!("{error:#}");
    assert!(message.contains("load business profile"));
    assert!(message.contains("about.md"));
    mock.assert_hits(0);
    assert!(!temp.path().join("posts").exists());
}

#[test]
fn run_with_local_backend_writes_numbered_post() {
    let temp = TempDir::new().expect("create temp dir");
    write_profile(temp.path());

    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/chat")
            .json_body_partial(r#"{"think": false}"#);
        then.status(200).body(concat!(
            r#"{"message":{"role":"assistant","content":" Golden "},"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":"Crust "},"done":true}"#,
            "\n"
        ));
    });

    let mut config = Config::default();
    config.ollama.host = server.base_url();

    let saved = run(cli_in(temp.path(), "Summer sale", BackendArg::Ollama), config)
        .expect("pipeline succeeds");

    mock.assert_hits(5);
    assert_eq!(saved.sequence, 1);
    assert_eq!(
        saved.dir,
        temp.path().join("posts").join("Golden Crust").join("0001")
    );
    let post = fs::read_to_string(saved.post_path()).expect("read post.md");
    assert_eq!(post, "# Golden Crust\n\nGolden Crust");
    let image_prompt = fs::read_to_string(saved.image_prompt_path()).expect("read prompt");
    assert_eq!(image_prompt, "Golden Crust");
}

#[test]
fn run_with_cloud_backend_uses_credential_from_environment() {
    let temp = TempDir::new().expect("create temp dir");
    write_profile(temp.path());
    fs::create_dir_all(temp.path().join("posts").join("Golden Crust").join("0007"))
        .expect("create earlier post");

    let key_var = "POSTFORGE_CLI_TEST_OPENAI_KEY";
    set_env(key_var, OsStr::new("sk-test"));

    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .header("authorization", "Bearer sk-test");
        then.status(200).json_body(serde_json_reply("Golden Crust"));
    });

    let mut config = Config::default();
    config.openai.api_key_env_var = key_var.to_string();
    config.openai.base_url = server.base_url();

    let saved = run(cli_in(temp.path(), "Summer sale", BackendArg::Openai), config)
        .expect("pipeline succeeds");

    mock.assert_hits(5);
    assert_eq!(saved.sequence, 8);
    assert!(saved.dir.ends_with("0008"));
}

fn serde_json_reply(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    })
}
