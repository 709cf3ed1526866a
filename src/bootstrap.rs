//! Bootstrap sequencing.
//!
//! ```text
//! ensure-venv      (skipped when the venv directory exists)
//!     ↓
//! activate         (no process; environment for later children)
//!     ↓
//! install-deps
//!     ↓
//! migrate
//!     ↓
//! create-admin | collect-static   (only with --create-admin / --prod)
//!     ↓
//! run-server       (blocks until interrupted)
//! ```
//!
//! A step that exits non-zero is logged and the sequence continues. The
//! run's exit status is the status of the last command that actually ran.

use std::ffi::OsString;
use std::path::PathBuf;

use tracing::{info, info_span};

use crate::config::BootstrapConfig;
use crate::error::Result;
use crate::step_runner::{StepCommand, StepExecutor, StepOutput};
use crate::step_traits::StepArgs;
use crate::steps::{
    CollectStaticArgs, CreateSuperuserArgs, CreateVenvArgs, InstallDepsArgs, MigrateArgs,
    RunServerArgs,
};
use crate::types::{RuntimeMode, Step};
use crate::venv::{Activation, ProjectLayout};

/// What happened at one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing to do (venv already present)
    Skipped,
    /// Activation environment computed, no process spawned
    Activated,
    /// A process was run (or printed, in a dry run)
    Ran(StepOutput),
}

/// One entry of the report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRecord {
    pub step: Step,
    pub outcome: StepOutcome,
}

/// Everything a run went through, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub mode: RuntimeMode,
    pub records: Vec<StepRecord>,
}

impl BootstrapReport {
    /// Every stage visited, including skipped and in-process ones
    pub fn steps(&self) -> Vec<Step> {
        self.records.iter().map(|r| r.step).collect()
    }

    /// Stages that ran a command
    pub fn executed_steps(&self) -> Vec<Step> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, StepOutcome::Ran(_)))
            .map(|r| r.step)
            .collect()
    }

    /// Stages whose command failed
    pub fn failed_steps(&self) -> Vec<Step> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, StepOutcome::Ran(out) if !out.success))
            .map(|r| r.step)
            .collect()
    }

    /// Output of the last command that ran
    pub fn last_output(&self) -> Option<&StepOutput> {
        self.records.iter().rev().find_map(|r| match &r.outcome {
            StepOutcome::Ran(out) => Some(out),
            _ => None,
        })
    }

    /// Process exit status: the last command's, or 0 if nothing ran
    pub fn exit_code(&self) -> i32 {
        self.last_output().map_or(0, StepOutput::shell_status)
    }
}

/// Runs the bootstrap sequence for one project.
#[derive(Debug, Clone)]
pub struct Bootstrapper {
    config: BootstrapConfig,
    layout: ProjectLayout,
    mode: RuntimeMode,
    /// `PATH` activation builds on; this process's own when unset
    search_path: Option<OsString>,
}

impl Bootstrapper {
    pub fn new(
        project_dir: impl Into<PathBuf>,
        config: BootstrapConfig,
        mode: RuntimeMode,
    ) -> Self {
        let layout = ProjectLayout::new(project_dir, &config);
        Self {
            config,
            layout,
            mode,
            search_path: None,
        }
    }

    /// Build the activated `PATH` on `path` instead of this process's `PATH`
    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Stages this run will visit
    pub fn plan(&self) -> Vec<Step> {
        self.mode.plan()
    }

    /// Run every stage in order through `executor`.
    ///
    /// Only the bootstrapper's own failures (spawn machinery, registry
    /// state) return `Err`. Failing steps are recorded and skipped past.
    pub fn run<E>(&self, executor: &mut E) -> Result<BootstrapReport>
    where
        E: StepExecutor + ?Sized,
    {
        info!(
            "Bootstrapping {:?} in {} mode",
            self.layout.project_dir(),
            self.mode
        );

        let mut activation = Activation::default();
        let mut records = Vec::new();

        for step in self.plan() {
            let _span = info_span!("step", name = %step).entered();

            let outcome = match step {
                Step::EnsureVirtualEnv => {
                    if self.layout.venv().exists() {
                        info!(
                            "Virtual environment {:?} exists, skipping creation",
                            self.layout.venv().root()
                        );
                        StepOutcome::Skipped
                    } else {
                        info!("Creating virtual environment {:?}", self.layout.venv().root());
                        let args = CreateVenvArgs::from_layout(&self.layout, &self.config);
                        self.run_external(executor, &args, &activation)?
                    }
                }
                Step::Activate => {
                    let venv = self.layout.venv();
                    activation = match &self.search_path {
                        Some(path) => venv.activate_with_path(Some(path.as_os_str())),
                        None => venv.activate(),
                    };
                    info!("Activated {:?}", self.layout.venv().root());
                    StepOutcome::Activated
                }
                Step::InstallDependencies => {
                    let args = InstallDepsArgs::from_layout(&self.layout);
                    self.run_external(executor, &args, &activation)?
                }
                Step::ApplyMigrations => {
                    let args = MigrateArgs::from_layout(&self.layout);
                    self.run_external(executor, &args, &activation)?
                }
                Step::CreateAdmin => {
                    let args = CreateSuperuserArgs::from_layout(&self.layout);
                    self.run_external(executor, &args, &activation)?
                }
                Step::CollectStatic => {
                    let args = CollectStaticArgs::from_layout(&self.layout);
                    self.run_external(executor, &args, &activation)?
                }
                Step::LaunchServer => {
                    info!("Starting development server on {}", self.config.server_address());
                    let args = RunServerArgs::from_layout(&self.layout, &self.config);
                    self.run_external(executor, &args, &activation)?
                }
            };

            records.push(StepRecord { step, outcome });
        }

        let report = BootstrapReport {
            mode: self.mode,
            records,
        };
        info!(
            "Bootstrap finished with status {} ({} failed step(s))",
            report.exit_code(),
            report.failed_steps().len()
        );
        Ok(report)
    }

    fn run_external<E>(
        &self,
        executor: &mut E,
        args: &dyn StepArgs,
        activation: &Activation,
    ) -> Result<StepOutcome>
    where
        E: StepExecutor + ?Sized,
    {
        let command = StepCommand::build(
            args,
            self.layout.project_dir(),
            activation,
            &self.config.extra_env,
        );
        executor.execute(&command).map(StepOutcome::Ran)
    }
}
