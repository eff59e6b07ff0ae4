//! Runs the replay binary end to end against scripts on disk.

use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use callstream_replay::Cli;
use clap::Parser;

fn bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_callstream-replay"));
    for var in [
        "CALLSTREAM_LIVEKIT_SERVICE_URL",
        "CALLSTREAM_E2EE",
        "CALLSTREAM_ANALYTICS",
        "CALLSTREAM_LOG",
        "CALLSTREAM_LOG_JSON",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn guest_script() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scripts/guest_call.json")
}

fn screens(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each stdout line is JSON"))
        .collect()
}

#[test]
fn cli_parses_flags() {
    let cli = Cli::try_parse_from([
        "callstream-replay",
        "--embedded",
        "--passwordless",
        "--config",
        "conf.json",
        "script.json",
    ])
    .unwrap();
    let options = cli.options();
    assert!(options.is_embedded);
    assert!(options.is_passwordless_user);
    assert!(!options.preload);
    assert_eq!(cli.config, Some(PathBuf::from("conf.json")));
    assert_eq!(cli.script, PathBuf::from("script.json"));
}

#[test]
fn cli_requires_script() {
    assert!(Cli::try_parse_from(["callstream-replay"]).is_err());
}

#[test]
fn guest_script_prints_transitions() {
    let output = bin()
        .env("CALLSTREAM_LIVEKIT_SERVICE_URL", "https://sfu.example.org")
        .arg("--passwordless")
        .arg(guest_script())
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let screens = screens(&output.stdout);
    let kinds: Vec<&str> = screens
        .iter()
        .map(|s| s["screen"].as_str().unwrap())
        .collect();
    assert_eq!(
        kinds,
        vec!["lobby", "lobby", "active", "call_ended", "lobby", "active"]
    );
    assert_eq!(screens[2]["participating_members"].as_array().unwrap().len(), 3);
    assert_eq!(screens[3]["is_passwordless_user"], true);
}

#[test]
fn config_file_supplies_service_url() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    write!(
        config,
        r#"{{ "livekit": {{ "livekit_service_url": "https://from-file.example.org" }} }}"#
    )
    .unwrap();

    let output = bin()
        .arg("--config")
        .arg(config.path())
        .arg(guest_script())
        .output()
        .unwrap();
    assert!(output.status.success());
    let screens = screens(&output.stdout);
    assert_eq!(
        screens[2]["livekit_service_url"],
        "https://from-file.example.org"
    );
}

#[test]
fn missing_service_url_yields_error_screen() {
    let output = bin().arg(guest_script()).output().unwrap();
    assert!(output.status.success());
    let screens = screens(&output.stdout);
    assert_eq!(screens.len(), 1);
    assert_eq!(screens[0]["message"], "No livekit_service_url defined");
}

#[test]
fn invalid_env_flag_exits_with_config_code() {
    let output = bin()
        .env("CALLSTREAM_E2EE", "sometimes")
        .arg(guest_script())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("CALLSTREAM_E2EE"));
}

#[test]
fn empty_script_exits_with_script_code() {
    let mut script = tempfile::NamedTempFile::new().unwrap();
    write!(script, "[]").unwrap();
    let output = bin()
        .env("CALLSTREAM_LIVEKIT_SERVICE_URL", "https://sfu.example.org")
        .arg(script.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
}
