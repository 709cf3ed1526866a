//! Type-safe step argument contracts.
//!
//! Each external step is a struct implementing [`StepArgs`]. The struct is
//! the single source of truth for the program, its argv and any variables
//! the step needs on top of the activation environment.

use std::path::PathBuf;

use crate::types::Step;

/// Trait for typed step arguments.
///
/// # Contract
///
/// - `program()`: absolute (or `PATH`-resolvable) program to spawn.
/// - `to_cli_args()`: argv after the program, exactly as the tool expects.
/// - `get_env_vars()`: step-specific variables, applied last.
/// - `uses_activation()`: whether the virtual environment must be active.
///   Only venv creation runs against the system interpreter.
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use devboot::step_traits::StepArgs;
/// use devboot::steps::MigrateArgs;
///
/// let args = MigrateArgs {
///     manage_py: PathBuf::from("/srv/radio/manage.py"),
/// };
///
/// assert_eq!(args.program(), PathBuf::from("python"));
/// assert_eq!(args.to_cli_args(), vec!["/srv/radio/manage.py", "migrate"]);
/// ```
pub trait StepArgs {
    /// Which stage of the sequence these args belong to.
    fn step(&self) -> Step;

    /// Program to spawn.
    fn program(&self) -> PathBuf;

    /// Arguments passed after the program.
    fn to_cli_args(&self) -> Vec<String>;

    /// Step-specific environment variables.
    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }

    /// Whether the child gets the activation environment.
    fn uses_activation(&self) -> bool {
        true
    }

    /// Whether the child needs the terminal's foreground process group.
    fn attaches_terminal(&self) -> bool {
        self.step().attaches_terminal()
    }
}
