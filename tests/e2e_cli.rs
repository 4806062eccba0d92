//! CLI end-to-end tests
//!
//! Tests for the clipgif command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the clipgif binary
#[allow(deprecated)]
fn clipgif_cmd() -> Command {
    Command::cargo_bin("clipgif").unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = clipgif_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = clipgif_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("clipgif"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = clipgif_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_convert_help() {
    let mut cmd = clipgif_cmd();
    cmd.args(["convert", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--fps"))
        .stdout(predicate::str::contains("--preset"));
}

#[test]
fn test_cli_check_tools_command() {
    let mut cmd = clipgif_cmd();
    cmd.arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("ffmpeg"));
}

#[test]
fn test_cli_validate_defaults() {
    let mut cmd = clipgif_cmd();
    cmd.arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("10 fps, 320 px wide, small (5s)"));
}

#[test]
fn test_cli_validate_reports_warnings() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.json");
    fs::write(&config_file, r#"{ "defaults": { "fps": 60 } }"#).unwrap();

    let mut cmd = clipgif_cmd();
    cmd.args(["validate", config_file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("warning"));
}

#[test]
fn test_cli_validate_rejects_malformed_config() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.json");
    fs::write(&config_file, "{ not json").unwrap();

    let mut cmd = clipgif_cmd();
    cmd.args(["validate", config_file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config"));
}

#[test]
fn test_cli_convert_nonexistent_file() {
    let mut cmd = clipgif_cmd();
    cmd.args(["convert", "/nonexistent/path/clip.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("exist"));
}

#[test]
fn test_cli_convert_rejects_out_of_range_fps() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("clip.mp4");
    fs::write(&input, b"video").unwrap();

    let mut cmd = clipgif_cmd();
    cmd.args(["convert", "--fps", "0", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Validation"));
}

#[test]
fn test_cli_convert_rejects_unknown_preset() {
    let mut cmd = clipgif_cmd();
    cmd.args(["convert", "--preset", "huge", "clip.mp4"])
        .assert()
        .failure();
}

#[cfg(unix)]
#[test]
fn test_cli_convert_with_stub_ffmpeg() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempdir().unwrap();
    let ffmpeg = temp.path().join("ffmpeg");
    fs::write(
        &ffmpeg,
        "#!/bin/sh\n\
         if [ \"$1\" = \"-version\" ]; then echo 'ffmpeg version stub'; exit 0; fi\n\
         for last; do :; done\n\
         echo '  Duration: 00:00:04.00, start: 0.000000' 1>&2\n\
         echo 'out_time_us=2000000' 1>&2\n\
         echo 'progress=end' 1>&2\n\
         printf 'GIF89a' > \"$last\"\n",
    )
    .unwrap();
    fs::set_permissions(&ffmpeg, fs::Permissions::from_mode(0o755)).unwrap();

    let config_file = temp.path().join("config.json");
    fs::write(
        &config_file,
        format!(
            r#"{{ "engine": {{ "ffmpeg_path": "{}", "timeout_secs": 30 }} }}"#,
            ffmpeg.display()
        ),
    )
    .unwrap();

    let input = temp.path().join("clip.mp4");
    fs::write(&input, b"video").unwrap();
    let out_dir = temp.path().join("out");
    fs::create_dir(&out_dir).unwrap();

    let mut cmd = clipgif_cmd();
    cmd.args([
        "--config",
        config_file.to_str().unwrap(),
        "convert",
        "--preset",
        "short",
        "--output",
        out_dir.to_str().unwrap(),
        input.to_str().unwrap(),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("output.gif"));

    assert_eq!(fs::read(out_dir.join("output.gif")).unwrap(), b"GIF89a");
}
