//! devboot library
//!
//! Bootstraps a local Django development environment: virtualenv,
//! dependencies, migrations, optional admin/static steps, dev server.

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod process_guard;
pub mod sanity;
pub mod step_runner;
pub mod step_traits;
pub mod steps;
pub mod types;
pub mod venv;

// Re-export main types for convenience
pub use bootstrap::{BootstrapReport, Bootstrapper, StepOutcome, StepRecord};
pub use config::BootstrapConfig;
pub use error::{DevbootError, Result};
pub use process_guard::{ChildKind, ChildRegistry, CommandProcessGroup, ProcessGuard};
pub use step_runner::{
    run_step_safe, DryRunExecutor, StepCommand, StepExecutor, StepOutput, SystemExecutor,
};
pub use step_traits::StepArgs;
pub use types::{RuntimeMode, Step};
pub use venv::{Activation, ProjectLayout, VirtualEnv};
