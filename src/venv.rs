//! Project and virtual-environment layout.
//!
//! Activation never touches this process's environment. It produces the
//! variables each child is started with, which is all `source bin/activate`
//! ever achieved for the commands that follow it.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::config::BootstrapConfig;

/// Interpreter name every post-activation step runs, resolved on the
/// activated `PATH` so `<venv>/bin` is preferred but not required
pub const VENV_PYTHON: &str = "python";

/// Variables removed from a child's environment on activation
pub const REMOVED_ON_ACTIVATE: &[&str] = &["PYTHONHOME"];

/// Resolved file locations for one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    project_dir: PathBuf,
    venv: VirtualEnv,
    requirements: PathBuf,
    manage_py: PathBuf,
}

impl ProjectLayout {
    /// Resolve the config's paths against `project_dir`.
    ///
    /// Absolute paths in the config are kept as they are.
    pub fn new(project_dir: impl Into<PathBuf>, config: &BootstrapConfig) -> Self {
        let project_dir = project_dir.into();
        Self {
            venv: VirtualEnv::new(project_dir.join(&config.venv_dir)),
            requirements: project_dir.join(&config.requirements),
            manage_py: project_dir.join(&config.manage_py),
            project_dir,
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn venv(&self) -> &VirtualEnv {
        &self.venv
    }

    pub fn requirements(&self) -> &Path {
        &self.requirements
    }

    pub fn manage_py(&self) -> &Path {
        &self.manage_py
    }
}

/// An isolated Python environment rooted at a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEnv {
    root: PathBuf,
}

impl VirtualEnv {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The environment counts as present when its directory exists.
    /// Contents are not inspected.
    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Directory holding the environment's executables
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    /// Activation using this process's current `PATH`
    pub fn activate(&self) -> Activation {
        self.activate_with_path(env::var_os("PATH").as_deref())
    }

    /// Activation prepending the environment's `bin` to `base_path`
    pub fn activate_with_path(&self, base_path: Option<&OsStr>) -> Activation {
        let mut entries = vec![self.bin_dir()];
        if let Some(base) = base_path {
            entries.extend(env::split_paths(base));
        }

        let path = match env::join_paths(&entries) {
            Ok(joined) => joined.to_string_lossy().into_owned(),
            Err(e) => {
                // A base PATH entry containing the separator cannot be rejoined
                tracing::warn!("Could not extend PATH ({}), using venv bin only", e);
                self.bin_dir().to_string_lossy().into_owned()
            }
        };

        Activation {
            vars: vec![
                (
                    "VIRTUAL_ENV".to_string(),
                    self.root.to_string_lossy().into_owned(),
                ),
                ("PATH".to_string(), path),
            ],
        }
    }
}

/// Environment changes applied to every child after activation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activation {
    vars: Vec<(String, String)>,
}

impl Activation {
    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    pub fn removed(&self) -> &'static [&'static str] {
        if self.vars.is_empty() {
            &[]
        } else {
            REMOVED_ON_ACTIVATE
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_active(&self) -> bool {
        !self.vars.is_empty()
    }
}
