use clap::Parser;
use std::path::PathBuf;

use crate::types::RuntimeMode;

/// devboot - set up a Django project locally and start its dev server
#[derive(Parser, Debug)]
#[command(name = "devboot")]
#[command(
    about = "Create the virtualenv, install dependencies, migrate, and run the Django dev server"
)]
#[command(version)]
pub struct Cli {
    /// Print each step's command instead of running it
    #[arg(long)]
    pub dry_run: bool,

    /// JSON configuration file (missing keys use defaults)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the effective configuration to FILE and exit
    #[arg(long, value_name = "FILE")]
    pub save_config: Option<PathBuf>,

    /// Project directory every step runs in
    #[arg(short = 'C', long, default_value = ".", value_name = "DIR")]
    pub project_dir: PathBuf,

    /// `--create-admin` prompts for a superuser, `--prod` collects static
    /// files. Any other value is accepted and ignored.
    #[arg(value_name = "MODE", allow_hyphen_values = true)]
    pub mode: Option<String>,

    /// Arguments after MODE, accepted and ignored
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    pub extra: Vec<String>,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Runtime mode selected by the positional argument
    pub fn runtime_mode(&self) -> RuntimeMode {
        RuntimeMode::from_arg(self.mode.as_deref())
    }
}
