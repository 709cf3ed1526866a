//! Pre-flight checks for the project directory
//!
//! Nothing here stops a run. Problems are logged as warnings before the
//! first step so the user knows why a later step is about to fail.

use std::env;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::BootstrapConfig;
use crate::venv::ProjectLayout;

/// Result of environment verification
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SanityCheckResult {
    /// Interpreter needed to create the venv but not found on PATH
    pub missing_interpreter: Option<String>,
    pub missing_requirements: Option<PathBuf>,
    pub missing_manage_py: Option<PathBuf>,
}

impl SanityCheckResult {
    /// Returns true if all checks passed
    pub fn is_ok(&self) -> bool {
        self.missing_interpreter.is_none()
            && self.missing_requirements.is_none()
            && self.missing_manage_py.is_none()
    }

    /// One line per problem found
    pub fn warnings(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(python) = &self.missing_interpreter {
            lines.push(format!(
                "Interpreter '{}' not found on PATH; the virtual environment cannot be created",
                python
            ));
        }
        if let Some(path) = &self.missing_requirements {
            lines.push(format!("Requirements manifest {:?} not found", path));
        }
        if let Some(path) = &self.missing_manage_py {
            lines.push(format!("Management script {:?} not found", path));
        }
        lines
    }
}

/// Find `name` the way a shell would: as-is when it contains a slash,
/// otherwise in each `PATH` entry.
fn binary_exists(name: &str, path_var: Option<&std::ffi::OsStr>) -> bool {
    if name.contains('/') {
        return Path::new(name).is_file();
    }
    path_var
        .map(|paths| env::split_paths(paths).any(|dir| is_executable(&dir.join(name))))
        .unwrap_or(false)
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Perform all checks against the given `PATH` value
pub fn verify_project_with_path(
    layout: &ProjectLayout,
    config: &BootstrapConfig,
    path_var: Option<&std::ffi::OsStr>,
) -> SanityCheckResult {
    let mut result = SanityCheckResult::default();

    // The system interpreter only matters while the venv is missing
    if layout.venv().exists() {
        debug!("Virtual environment present, interpreter check skipped");
    } else if !binary_exists(&config.python, path_var) {
        result.missing_interpreter = Some(config.python.clone());
    }

    if !layout.requirements().is_file() {
        result.missing_requirements = Some(layout.requirements().to_path_buf());
    }
    if !layout.manage_py().is_file() {
        result.missing_manage_py = Some(layout.manage_py().to_path_buf());
    }

    result
}

/// Perform all checks against this process's `PATH`
pub fn verify_project(layout: &ProjectLayout, config: &BootstrapConfig) -> SanityCheckResult {
    verify_project_with_path(layout, config, env::var_os("PATH").as_deref())
}

/// Run the checks and log each problem. Never fails.
pub fn run_preflight_checks(layout: &ProjectLayout, config: &BootstrapConfig) -> SanityCheckResult {
    let result = verify_project(layout, config);
    if result.is_ok() {
        debug!("Pre-flight checks passed");
    }
    for line in result.warnings() {
        warn!("{}", line);
    }
    result
}
