//! Typed arguments for every external step of the bootstrap.
//!
//! | Step             | Command                                           |
//! |------------------|---------------------------------------------------|
//! | `ensure-venv`    | `<python> -m venv <venv_dir>`                     |
//! | `install-deps`   | `python -m pip install -r <requirements>`         |
//! | `migrate`        | `python <manage.py> migrate`                      |
//! | `create-admin`   | `python <manage.py> createsuperuser`              |
//! | `collect-static` | `python <manage.py> collectstatic --noinput`      |
//! | `run-server`     | `python <manage.py> runserver <addr:port>`        |
//!
//! Everything after venv creation runs a bare `python`, looked up on the
//! activated `PATH`. The venv's interpreter wins when it exists; otherwise
//! whatever `python` the user already had is used.

use std::path::PathBuf;

use crate::config::BootstrapConfig;
use crate::step_traits::StepArgs;
use crate::types::Step;
use crate::venv::{ProjectLayout, VENV_PYTHON};

fn path_arg(path: &std::path::Path) -> String {
    path.display().to_string()
}

// ============================================================================
// Create virtual environment
// ============================================================================

/// Creates the virtual environment with the system interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateVenvArgs {
    /// Interpreter name or path (e.g. `python3`)
    pub python: String,
    /// Directory to create the environment in
    pub venv_dir: PathBuf,
}

impl CreateVenvArgs {
    pub fn from_layout(layout: &ProjectLayout, config: &BootstrapConfig) -> Self {
        Self {
            python: config.python.clone(),
            venv_dir: layout.venv().root().to_path_buf(),
        }
    }
}

impl StepArgs for CreateVenvArgs {
    fn step(&self) -> Step {
        Step::EnsureVirtualEnv
    }

    fn program(&self) -> PathBuf {
        PathBuf::from(&self.python)
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["-m".to_string(), "venv".to_string(), path_arg(&self.venv_dir)]
    }

    /// The environment does not exist yet, so it cannot be active.
    fn uses_activation(&self) -> bool {
        false
    }
}

// ============================================================================
// Install dependencies
// ============================================================================

/// Installs (or upgrades to) the pinned packages in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallDepsArgs {
    pub requirements: PathBuf,
}

impl InstallDepsArgs {
    pub fn from_layout(layout: &ProjectLayout) -> Self {
        Self {
            requirements: layout.requirements().to_path_buf(),
        }
    }
}

impl StepArgs for InstallDepsArgs {
    fn step(&self) -> Step {
        Step::InstallDependencies
    }

    fn program(&self) -> PathBuf {
        PathBuf::from(VENV_PYTHON)
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-m".to_string(),
            "pip".to_string(),
            "install".to_string(),
            "-r".to_string(),
            path_arg(&self.requirements),
        ]
    }

    /// pip's self-update nag adds nothing to a bootstrap log.
    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![(
            "PIP_DISABLE_PIP_VERSION_CHECK".to_string(),
            "1".to_string(),
        )]
    }
}

// ============================================================================
// manage.py subcommands
// ============================================================================

/// Applies database migrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrateArgs {
    pub manage_py: PathBuf,
}

impl MigrateArgs {
    pub fn from_layout(layout: &ProjectLayout) -> Self {
        Self {
            manage_py: layout.manage_py().to_path_buf(),
        }
    }
}

impl StepArgs for MigrateArgs {
    fn step(&self) -> Step {
        Step::ApplyMigrations
    }

    fn program(&self) -> PathBuf {
        PathBuf::from(VENV_PYTHON)
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![path_arg(&self.manage_py), "migrate".to_string()]
    }
}

/// Interactive superuser prompt. Reads from the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSuperuserArgs {
    pub manage_py: PathBuf,
}

impl CreateSuperuserArgs {
    pub fn from_layout(layout: &ProjectLayout) -> Self {
        Self {
            manage_py: layout.manage_py().to_path_buf(),
        }
    }
}

impl StepArgs for CreateSuperuserArgs {
    fn step(&self) -> Step {
        Step::CreateAdmin
    }

    fn program(&self) -> PathBuf {
        PathBuf::from(VENV_PYTHON)
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![path_arg(&self.manage_py), "createsuperuser".to_string()]
    }
}

/// Copies static assets into `STATIC_ROOT` without prompting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectStaticArgs {
    pub manage_py: PathBuf,
}

impl CollectStaticArgs {
    pub fn from_layout(layout: &ProjectLayout) -> Self {
        Self {
            manage_py: layout.manage_py().to_path_buf(),
        }
    }
}

impl StepArgs for CollectStaticArgs {
    fn step(&self) -> Step {
        Step::CollectStatic
    }

    fn program(&self) -> PathBuf {
        PathBuf::from(VENV_PYTHON)
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            path_arg(&self.manage_py),
            "collectstatic".to_string(),
            "--noinput".to_string(),
        ]
    }
}

/// Development server. Blocks until interrupted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunServerArgs {
    pub manage_py: PathBuf,
    /// `addr:port`, e.g. `0.0.0.0:8000`
    pub address: String,
}

impl RunServerArgs {
    pub fn from_layout(layout: &ProjectLayout, config: &BootstrapConfig) -> Self {
        Self {
            manage_py: layout.manage_py().to_path_buf(),
            address: config.server_address(),
        }
    }
}

impl StepArgs for RunServerArgs {
    fn step(&self) -> Step {
        Step::LaunchServer
    }

    fn program(&self) -> PathBuf {
        PathBuf::from(VENV_PYTHON)
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            path_arg(&self.manage_py),
            "runserver".to_string(),
            self.address.clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> (ProjectLayout, BootstrapConfig) {
        let config = BootstrapConfig::default();
        (ProjectLayout::new("/srv/radio", &config), config)
    }

    #[test]
    fn test_create_venv_uses_system_python() {
        let (layout, config) = layout();
        let args = CreateVenvArgs::from_layout(&layout, &config);
        assert_eq!(args.program(), PathBuf::from("python3"));
        assert_eq!(args.to_cli_args(), vec!["-m", "venv", "/srv/radio/venv"]);
        assert!(!args.uses_activation());
        assert!(!args.attaches_terminal());
    }

    #[test]
    fn test_install_deps_args() {
        let (layout, _) = layout();
        let args = InstallDepsArgs::from_layout(&layout);
        assert_eq!(args.program(), PathBuf::from("python"));
        assert_eq!(
            args.to_cli_args(),
            vec!["-m", "pip", "install", "-r", "/srv/radio/requirements.txt"]
        );
        assert!(args.uses_activation());
        assert!(args
            .get_env_vars()
            .iter()
            .any(|(k, v)| k == "PIP_DISABLE_PIP_VERSION_CHECK" && v == "1"));
    }

    #[test]
    fn test_manage_py_subcommands() {
        let (layout, _) = layout();
        assert_eq!(
            CreateSuperuserArgs::from_layout(&layout).to_cli_args(),
            vec!["/srv/radio/manage.py", "createsuperuser"]
        );
        assert_eq!(
            CollectStaticArgs::from_layout(&layout).to_cli_args(),
            vec!["/srv/radio/manage.py", "collectstatic", "--noinput"]
        );
    }

    #[test]
    fn test_post_activation_steps_use_path_python() {
        let (layout, config) = layout();
        let programs = [
            InstallDepsArgs::from_layout(&layout).program(),
            MigrateArgs::from_layout(&layout).program(),
            CreateSuperuserArgs::from_layout(&layout).program(),
            CollectStaticArgs::from_layout(&layout).program(),
            RunServerArgs::from_layout(&layout, &config).program(),
        ];
        for program in programs {
            assert_eq!(program, PathBuf::from(VENV_PYTHON));
        }
    }

    #[test]
    fn test_terminal_attachment() {
        let (layout, config) = layout();
        assert!(CreateSuperuserArgs::from_layout(&layout).attaches_terminal());
        assert!(RunServerArgs::from_layout(&layout, &config).attaches_terminal());
        assert!(!MigrateArgs::from_layout(&layout).attaches_terminal());
        assert!(!CollectStaticArgs::from_layout(&layout).attaches_terminal());
    }

    #[test]
    fn test_run_server_binds_all_interfaces_by_default() {
        let (layout, config) = layout();
        let args = RunServerArgs::from_layout(&layout, &config);
        assert_eq!(
            args.to_cli_args(),
            vec!["/srv/radio/manage.py", "runserver", "0.0.0.0:8000"]
        );
    }
}
