use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

fn command() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_linkcheck"));
    command.env_remove("LINKCHECK_CONFIG").env("RUST_LOG", "warn");
    command
}

fn linkcheck(args: &[&str]) -> Output {
    command()
        .args(args)
        .output()
        .expect("failed to run linkcheck")
}

#[test]
fn builtin_pair_links() {
    let output = linkcheck(&[]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("linked program"), "stdout was: {stdout}");
    assert!(stdout.contains("built-in + built-in"));
}

#[test]
fn broken_vertex_file_fails_with_diagnostic_on_stderr() {
    let dir = TempDir::new().unwrap();
    let vertex = dir.path().join("broken.vert");
    fs::write(
        &vertex,
        "#version 330 core\nlayout(location = 0) in vec4 position;\nvoid main()\n{\n    gl_Position = position;\n",
    )
    .unwrap();

    let output = linkcheck(&["--vertex", vertex.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to compile vertex shader"),
        "stderr was: {stderr}"
    );
    assert!(stderr.contains("broken.vert"));
}

#[test]
fn config_file_supplies_shader_paths() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("quad.frag"),
        "#version 450\nlayout(location = 0) out vec4 color;\nvoid main()\n{\n    color = vec4(0.0, 1.0, 0.0, 1.0);\n}\n",
    )
    .unwrap();
    let config = dir.path().join("linkcheck.toml");
    fs::write(
        &config,
        "version = 1\nvalidation = \"enforce\"\n\n[shaders]\nfragment = \"quad.frag\"\n",
    )
    .unwrap();

    let output = linkcheck(&["--config", config.to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("quad.frag"), "stdout was: {stdout}");
}

#[test]
fn config_path_can_come_from_environment() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("broken.frag"),
        "#version 450\nlayout(location = 0) out vec4 color;\nvoid main()\n{\n    color = missing;\n}\n",
    )
    .unwrap();
    let config = dir.path().join("linkcheck.toml");
    fs::write(&config, "[shaders]\nfragment = \"broken.frag\"\n").unwrap();

    let output = command()
        .env("LINKCHECK_CONFIG", &config)
        .output()
        .expect("failed to run linkcheck");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to compile fragment shader"),
        "stderr was: {stderr}"
    );
    assert!(stderr.contains("broken.frag"));
}

#[test]
fn invalid_config_aborts_before_compiling() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("linkcheck.toml");
    fs::write(&config, "glsl_version = 330\n").unwrap();

    let output = linkcheck(&["--config", config.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("glsl_version 330"), "stderr was: {stderr}");
}

#[test]
fn builtin_subcommand_prints_source() {
    let output = linkcheck(&["builtin", "fragment"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("color = vec4(1.0, 0.0, 0.0, 1.0);"));
}
