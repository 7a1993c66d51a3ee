mod common;

use anyhow::Result;
use common::TestEnvironment;

const SERVICE_ENV: &[(&str, &str)] = &[("PROJECT_ID", "test-project"), ("SHAYARI_ACCESS_TOKEN", "t")];

#[test]
fn missing_input_file_fails() -> Result<()> {
    let env = TestEnvironment::new()?;
    let output = env.run(&["run", "nope.json"], &[])?;
    assert_eq!(output.exit_code, 1, "stdout: {}", output.stdout);
    assert!(output.stderr.contains("nope.json"), "stderr: {}", output.stderr);
    Ok(())
}

#[test]
fn duplicate_ids_reject_the_whole_file() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write(
        "verses.json",
        r#"[{"id": "a", "shayari": "पहला"}, {"id": "a", "shayari": "दूसरा"}]"#,
    )?;
    env.write("inputs/audio_library/rain.mp3", "id3")?;

    let output = env.run(&["run", "verses.json"], SERVICE_ENV)?;
    assert_eq!(output.exit_code, 1);
    assert!(output.stderr.contains("duplicate"), "stderr: {}", output.stderr);
    assert!(!env.path().join("outputs").exists());
    Ok(())
}

#[test]
fn out_of_range_index_fails_without_generating() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write("verses.json", r#"[{"shayari": "पहला"}]"#)?;

    let output = env.run(&["run", "verses.json", "--index", "4"], SERVICE_ENV)?;
    assert_eq!(output.exit_code, 1);
    assert!(output.stderr.contains("out of range"), "stderr: {}", output.stderr);
    assert!(!env.path().join("outputs").exists());
    Ok(())
}

#[test]
fn init_config_writes_once() -> Result<()> {
    let env = TestEnvironment::new()?;
    let first = env.run(&["init-config"], &[])?;
    assert_eq!(first.exit_code, 0, "stderr: {}", first.stderr);
    let written = std::fs::read_to_string(env.config_path())?;
    assert!(written.contains("veo-3.1-fast-generate-preview"));

    let second = env.run(&["init-config"], &[])?;
    assert_eq!(second.exit_code, 1);
    Ok(())
}

#[test]
fn check_reports_an_empty_library_as_json() -> Result<()> {
    let env = TestEnvironment::new()?;
    let output = env.run(&["check", "--output", "json"], SERVICE_ENV)?;
    assert_eq!(output.exit_code, 1);
    let library = output
        .stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .find(|event| event["data"]["check"] == "audio library")
        .expect("audio library check event");
    assert_eq!(library["data"]["status"], "fail");
    Ok(())
}
