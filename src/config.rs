//! Bootstrap configuration: defaults, JSON load/save, environment overrides.
//!
//! Every field has a default, so a config file only needs the keys it
//! changes. Relative paths are resolved against the project directory by
//! [`crate::venv::ProjectLayout`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Port the development server binds when nothing overrides it
pub const DEFAULT_PORT: u16 = 8000;
/// Bind address for the development server (all interfaces)
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Environment variable overriding `python`
pub const ENV_PYTHON: &str = "DEVBOOT_PYTHON";
/// Environment variable overriding `venv_dir`
pub const ENV_VENV_DIR: &str = "DEVBOOT_VENV_DIR";
/// Environment variable overriding `bind`
pub const ENV_BIND: &str = "DEVBOOT_BIND";
/// Environment variable overriding `port`
pub const ENV_PORT: &str = "DEVBOOT_PORT";

/// Settings for one bootstrap run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapConfig {
    /// Interpreter used to create the virtual environment
    pub python: String,
    /// Virtual environment directory
    pub venv_dir: PathBuf,
    /// Pinned dependency manifest
    pub requirements: PathBuf,
    /// Django management script
    pub manage_py: PathBuf,
    /// Dev server bind address
    pub bind: String,
    /// Dev server port
    pub port: u16,
    /// Extra variables passed to every child (e.g. DJANGO_SETTINGS_MODULE)
    pub extra_env: BTreeMap<String, String>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            venv_dir: PathBuf::from("venv"),
            requirements: PathBuf::from("requirements.txt"),
            manage_py: PathBuf::from("manage.py"),
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            extra_env: BTreeMap::new(),
        }
    }
}

impl BootstrapConfig {
    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Apply `DEVBOOT_*` overrides from the process environment
    pub fn apply_process_env(&mut self) -> Result<()> {
        self.apply_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(python) = lookup(ENV_PYTHON) {
            tracing::debug!("{} overrides python: {}", ENV_PYTHON, python);
            self.python = python;
        }
        if let Some(venv_dir) = lookup(ENV_VENV_DIR) {
            tracing::debug!("{} overrides venv_dir: {}", ENV_VENV_DIR, venv_dir);
            self.venv_dir = PathBuf::from(venv_dir);
        }
        if let Some(bind) = lookup(ENV_BIND) {
            tracing::debug!("{} overrides bind: {}", ENV_BIND, bind);
            self.bind = bind;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.port = port
                .trim()
                .parse()
                .with_context(|| format!("{} is not a valid port: {:?}", ENV_PORT, port))?;
            tracing::debug!("{} overrides port: {}", ENV_PORT, self.port);
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.python.trim().is_empty() {
            anyhow::bail!("Python interpreter must be specified");
        }
        if self.venv_dir.as_os_str().is_empty() {
            anyhow::bail!("Virtual environment directory must be specified");
        }
        if self.requirements.as_os_str().is_empty() {
            anyhow::bail!("Requirements manifest must be specified");
        }
        if self.manage_py.as_os_str().is_empty() {
            anyhow::bail!("Management script must be specified");
        }
        if self.port == 0 {
            anyhow::bail!("Port must be between 1 and 65535");
        }
        if self.bind != "localhost" && self.bind.parse::<IpAddr>().is_err() {
            anyhow::bail!("Bind address must be an IP address or 'localhost': {:?}", self.bind);
        }
        for key in self.extra_env.keys() {
            if key.is_empty() || key.contains('=') || key.contains('\0') {
                anyhow::bail!("Invalid environment variable name in extra_env: {:?}", key);
            }
        }
        Ok(())
    }

    /// `addr:port` argument for the dev server
    pub fn server_address(&self) -> String {
        match self.bind.parse::<IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, self.port).to_string(),
            Err(_) => format!("{}:{}", self.bind, self.port),
        }
    }
}
