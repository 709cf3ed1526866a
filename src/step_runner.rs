//! Step execution.
//!
//! [`run_step_safe`] is the only place devboot spawns a process. It applies
//! the death pact from [`crate::process_guard`], registers the child for
//! signal cleanup and waits for it. Output is inherited: whatever the tools
//! print goes straight to the user's terminal.
//!
//! The [`StepExecutor`] trait sits between sequencing and spawning so the
//! bootstrapper can be driven by the real system, by a dry run, or by a
//! recording executor in tests.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use tracing::{info, warn};

use crate::error::{DevbootError, Result};
use crate::process_guard::{ChildKind, ChildRegistry, CommandProcessGroup};
use crate::step_traits::StepArgs;
use crate::types::Step;
use crate::venv::Activation;

/// Shell status for "command not found"
pub const EXIT_NOT_FOUND: i32 = 127;
/// Shell status for "found but not executable"
pub const EXIT_NOT_EXECUTABLE: i32 = 126;

/// A fully resolved invocation of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCommand {
    pub step: Step,
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Variables set on the child, in application order
    pub env: Vec<(String, String)>,
    /// Variables removed from the child's environment
    pub env_remove: Vec<String>,
    pub current_dir: PathBuf,
    pub attaches_terminal: bool,
}

impl StepCommand {
    /// Resolve typed args into an invocation.
    ///
    /// Environment precedence, lowest first: activation, `extra_env`, the
    /// step's own variables.
    pub fn build(
        args: &dyn StepArgs,
        current_dir: &Path,
        activation: &Activation,
        extra_env: &BTreeMap<String, String>,
    ) -> Self {
        let mut env = Vec::new();
        let mut env_remove = Vec::new();

        if args.uses_activation() {
            env.extend(activation.vars().iter().cloned());
            env_remove.extend(activation.removed().iter().map(|k| k.to_string()));
        }
        env.extend(extra_env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env.extend(args.get_env_vars());

        Self {
            step: args.step(),
            program: args.program(),
            args: args.to_cli_args(),
            env,
            env_remove,
            current_dir: current_dir.to_path_buf(),
            attaches_terminal: args.attaches_terminal(),
        }
    }

    /// Final value of `key` as the child would see it
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Command line for logs and dry runs
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .map(|part| shell_quote(&part))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.current_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        for key in &self.env_remove {
            cmd.env_remove(key);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if self.attaches_terminal {
            cmd.with_parent_death_signal();
        } else {
            cmd.in_new_process_group();
        }
        cmd
    }
}

fn shell_quote(part: &str) -> String {
    let plain = !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if plain {
        part.to_string()
    } else {
        format!("'{}'", part.replace('\'', r"'\''"))
    }
}

/// Result of one executed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutput {
    /// Exit code (None if terminated by signal)
    pub exit_code: Option<i32>,
    /// Terminating signal, if any
    pub signal: Option<i32>,
    /// Whether the step exited with code 0
    pub success: bool,
    /// Whether the step was only printed
    pub dry_run: bool,
}

impl StepOutput {
    pub fn from_status(status: ExitStatus) -> Self {
        Self {
            exit_code: status.code(),
            signal: status.signal(),
            success: status.success(),
            dry_run: false,
        }
    }

    /// Output for a step that exited with `code`
    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            signal: None,
            success: code == 0,
            dry_run: false,
        }
    }

    /// Output for a step that was printed instead of run
    pub fn dry_run() -> Self {
        Self {
            exit_code: Some(0),
            signal: None,
            success: true,
            dry_run: true,
        }
    }

    /// Status as a shell would report it in `$?`
    pub fn shell_status(&self) -> i32 {
        match (self.exit_code, self.signal) {
            (Some(code), _) => code,
            (None, Some(sig)) => 128 + sig,
            (None, None) => 1,
        }
    }
}

/// Runs resolved step commands.
pub trait StepExecutor {
    fn execute(&mut self, command: &StepCommand) -> Result<StepOutput>;
}

/// Spawns real processes through [`run_step_safe`].
#[derive(Debug, Default)]
pub struct SystemExecutor;

impl StepExecutor for SystemExecutor {
    fn execute(&mut self, command: &StepCommand) -> Result<StepOutput> {
        run_step_safe(command)
    }
}

/// Prints each command instead of running it.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    printed: Vec<String>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Command lines printed so far
    pub fn printed(&self) -> &[String] {
        &self.printed
    }
}

impl StepExecutor for DryRunExecutor {
    fn execute(&mut self, command: &StepCommand) -> Result<StepOutput> {
        let line = command.display_line();
        info!("[DRY RUN] {}: {}", command.step, line);
        println!("[DRY RUN] {}", line);
        self.printed.push(line);
        Ok(StepOutput::dry_run())
    }
}

/// Spawn a step, register it for cleanup and wait for it.
///
/// A program that cannot be found or executed is not an error: it is
/// reported with the status a shell would give it (127 or 126) so the
/// sequence can carry on.
pub fn run_step_safe(command: &StepCommand) -> Result<StepOutput> {
    info!(
        "run_step_safe: {} cwd={:?} env={:?}",
        command.display_line(),
        command.current_dir,
        command.env
    );

    let mut child = match command.to_command().spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("{}: {} not found: {}", command.step, command.program.display(), e);
            return Ok(StepOutput::exited(EXIT_NOT_FOUND));
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            warn!(
                "{}: {} is not executable: {}",
                command.step,
                command.program.display(),
                e
            );
            return Ok(StepOutput::exited(EXIT_NOT_EXECUTABLE));
        }
        Err(e) => {
            return Err(DevbootError::step(format!(
                "failed to spawn {} ({}): {}",
                command.step,
                command.program.display(),
                e
            )));
        }
    };
    let pid = child.id();

    let kind = if command.attaches_terminal {
        ChildKind::Foreground
    } else {
        ChildKind::Background
    };
    ChildRegistry::global()
        .lock()
        .map_err(|_| DevbootError::state("ChildRegistry mutex poisoned"))?
        .register(pid, kind);

    let waited = child.wait();

    ChildRegistry::global()
        .lock()
        .map_err(|_| DevbootError::state("ChildRegistry mutex poisoned"))?
        .unregister(pid);

    let status = waited
        .map_err(|e| DevbootError::step(format!("failed waiting for {}: {}", command.step, e)))?;
    let output = StepOutput::from_status(status);

    if output.success {
        info!("Step {} completed successfully", command.step);
    } else {
        warn!(
            "Step {} failed with status {}, continuing",
            command.step,
            output.shell_status()
        );
    }
    Ok(output)
}
