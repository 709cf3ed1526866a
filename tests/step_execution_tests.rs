//! Tests for step execution against real processes
//!
//! These tests verify:
//! - Exit codes and signals map to shell-style statuses
//! - Missing programs report 127 instead of aborting
//! - Environment and working directory reach the child
//! - A full run with stand-in interpreters executes every step in order
//! - An empty venv falls back to the `python` already on `PATH`

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use devboot::bootstrap::Bootstrapper;
use devboot::config::BootstrapConfig;
use devboot::step_runner::{run_step_safe, StepCommand, SystemExecutor, EXIT_NOT_FOUND};
use devboot::step_traits::StepArgs;
use devboot::types::{RuntimeMode, Step};
use devboot::venv::{Activation, VirtualEnv};

/// `sh -c <script>` posing as the migrate step
struct ShellArgs {
    script: String,
    terminal: bool,
}

impl ShellArgs {
    fn new(script: &str) -> Self {
        Self {
            script: script.to_string(),
            terminal: false,
        }
    }
}

impl StepArgs for ShellArgs {
    fn step(&self) -> Step {
        Step::ApplyMigrations
    }

    fn program(&self) -> PathBuf {
        PathBuf::from("/bin/sh")
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["-c".to_string(), self.script.clone()]
    }

    fn attaches_terminal(&self) -> bool {
        self.terminal
    }
}

fn command_in(dir: &Path, args: &ShellArgs, activation: &Activation) -> StepCommand {
    StepCommand::build(args, dir, activation, &BTreeMap::new())
}

// =============================================================================
// run_step_safe
// =============================================================================

#[test]
fn test_successful_step() {
    let dir = tempfile::tempdir().unwrap();
    let cmd = command_in(dir.path(), &ShellArgs::new("exit 0"), &Activation::default());
    let output = run_step_safe(&cmd).unwrap();

    assert!(output.success);
    assert_eq!(output.exit_code, Some(0));
    assert!(!output.dry_run);
}

#[test]
fn test_exit_code_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let cmd = command_in(dir.path(), &ShellArgs::new("exit 42"), &Activation::default());
    let output = run_step_safe(&cmd).unwrap();

    assert!(!output.success);
    assert_eq!(output.shell_status(), 42);
}

#[test]
fn test_terminal_step_exit_code_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let mut args = ShellArgs::new("exit 7");
    args.terminal = true;
    let cmd = command_in(dir.path(), &args, &Activation::default());
    assert_eq!(run_step_safe(&cmd).unwrap().shell_status(), 7);
}

#[test]
fn test_signal_termination_status() {
    let dir = tempfile::tempdir().unwrap();
    let cmd = command_in(dir.path(), &ShellArgs::new("kill -TERM $$"), &Activation::default());
    let output = run_step_safe(&cmd).unwrap();

    assert!(!output.success);
    assert!(output.exit_code.is_none());
    assert_eq!(output.signal, Some(15));
    assert_eq!(output.shell_status(), 143);
}

#[test]
fn test_missing_program_reports_127() {
    let dir = tempfile::tempdir().unwrap();
    let cmd = StepCommand {
        step: Step::InstallDependencies,
        program: dir.path().join("venv/bin/python"),
        args: vec![],
        env: vec![],
        env_remove: vec![],
        current_dir: dir.path().to_path_buf(),
        attaches_terminal: false,
    };
    let output = run_step_safe(&cmd).unwrap();
    assert_eq!(output.exit_code, Some(EXIT_NOT_FOUND));
    assert!(!output.success);
}

#[test]
fn test_child_sees_cwd_and_activation() {
    let dir = tempfile::tempdir().unwrap();
    let activation = VirtualEnv::new(dir.path().join("venv")).activate_with_path(None);
    let args = ShellArgs::new(
        r#"printf '%s\n%s\n%s\n' "$PWD" "$VIRTUAL_ENV" "${PYTHONHOME-unset}" > seen.txt"#,
    );
    // Activation puts only the venv bin on PATH; sh is spawned by absolute path
    let cmd = command_in(dir.path(), &args, &activation);
    assert_eq!(cmd.env_remove, vec!["PYTHONHOME".to_string()]);

    assert!(run_step_safe(&cmd).unwrap().success);

    let seen = fs::read_to_string(dir.path().join("seen.txt")).unwrap();
    let lines: Vec<&str> = seen.lines().collect();
    assert_eq!(Path::new(lines[0]), dir.path());
    assert_eq!(Path::new(lines[1]), dir.path().join("venv"));
    assert_eq!(lines[2], "unset");
}

// =============================================================================
// Full run with stand-in interpreters
// =============================================================================

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[test]
fn test_full_run_with_fake_python() {
    let project = tempfile::tempdir().unwrap();
    let tools = tempfile::tempdir().unwrap();
    let log = project.path().join("calls.log");

    // Venv interpreter: logs its arguments
    let venv_python = tools.path().join("venv-python");
    write_script(
        &venv_python,
        "#!/bin/sh\necho \"$*\" >> \"$DEVBOOT_TEST_LOG\"\n",
    );

    // System interpreter: `python3 -m venv <dir>` installs the fake venv python
    let system_python = tools.path().join("python3");
    write_script(
        &system_python,
        concat!(
            "#!/bin/sh\n",
            "mkdir -p \"$3/bin\"\n",
            "cp \"$FAKE_VENV_PYTHON\" \"$3/bin/python\"\n",
            "echo \"$*\" >> \"$DEVBOOT_TEST_LOG\"\n",
        ),
    );

    let mut config = BootstrapConfig::default();
    config.python = system_python.display().to_string();
    config.port = 8765;
    config
        .extra_env
        .insert("DEVBOOT_TEST_LOG".to_string(), log.display().to_string());
    config
        .extra_env
        .insert("FAKE_VENV_PYTHON".to_string(), venv_python.display().to_string());

    let boot = Bootstrapper::new(project.path(), config, RuntimeMode::Production);
    let report = boot.run(&mut SystemExecutor).unwrap();

    assert!(report.failed_steps().is_empty(), "{:?}", report);
    assert_eq!(report.exit_code(), 0);

    let venv = project.path().join("venv");
    let manage = project.path().join("manage.py");
    let requirements = project.path().join("requirements.txt");
    let calls = fs::read_to_string(&log).unwrap();
    let expected = format!(
        "-m venv {venv}\n\
         -m pip install -r {req}\n\
         {manage} migrate\n\
         {manage} collectstatic --noinput\n\
         {manage} runserver 0.0.0.0:8765\n",
        venv = venv.display(),
        req = requirements.display(),
        manage = manage.display(),
    );
    assert_eq!(calls, expected);

    // Second run: the venv exists, so the system interpreter is not called
    fs::remove_file(&log).unwrap();
    let report = boot.run(&mut SystemExecutor).unwrap();
    assert_eq!(report.executed_steps().len(), 4);
    let calls = fs::read_to_string(&log).unwrap();
    assert!(!calls.contains("-m venv"));
    assert_eq!(calls.lines().count(), 4);
}

#[test]
fn test_empty_venv_falls_back_to_python_on_path() {
    let project = tempfile::tempdir().unwrap();
    let tools = tempfile::tempdir().unwrap();
    let log = project.path().join("calls.log");

    // Present but unpopulated, e.g. a `python3 -m venv` that died halfway
    fs::create_dir(project.path().join("venv")).unwrap();
    write_script(
        &tools.path().join("python"),
        "#!/bin/sh\necho \"$*\" >> \"$DEVBOOT_TEST_LOG\"\n",
    );

    let mut config = BootstrapConfig::default();
    config.port = 8766;
    config
        .extra_env
        .insert("DEVBOOT_TEST_LOG".to_string(), log.display().to_string());

    let report = Bootstrapper::new(project.path(), config, RuntimeMode::Default)
        .with_search_path(tools.path())
        .run(&mut SystemExecutor)
        .unwrap();

    assert!(report.failed_steps().is_empty(), "{:?}", report);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(
        report.executed_steps(),
        vec![Step::InstallDependencies, Step::ApplyMigrations, Step::LaunchServer]
    );

    let calls = fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = calls.lines().collect();
    assert_eq!(lines.len(), 3, "{}", calls);
    assert!(lines[0].starts_with("-m pip install -r "));
    assert!(lines[1].ends_with(" migrate"));
    assert!(lines[2].ends_with(" runserver 0.0.0.0:8766"));
}
