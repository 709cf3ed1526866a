//! Core enums for the bootstrap sequence.
//!
//! `RuntimeMode` is derived from the single positional argument and decides
//! which optional step (if any) joins the fixed sequence. `Step` names each
//! stage of that sequence.

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Which optional step, if any, runs between migrations and server launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[derive(Display, EnumString, EnumIter, IntoStaticStr)]
pub enum RuntimeMode {
    /// Base sequence only
    #[default]
    #[strum(serialize = "default")]
    Default,
    /// Also prompt for an admin account
    #[strum(serialize = "create-admin")]
    CreateAdmin,
    /// Also collect static assets
    #[strum(serialize = "prod")]
    Production,
}

impl RuntimeMode {
    /// Argument that selects `CreateAdmin`.
    pub const CREATE_ADMIN_FLAG: &'static str = "--create-admin";
    /// Argument that selects `Production`.
    pub const PROD_FLAG: &'static str = "--prod";

    /// Derive the mode from the positional argument.
    ///
    /// Matching is exact. Anything that is not one of the two flags,
    /// including a missing argument, yields `Default`.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            Some(Self::CREATE_ADMIN_FLAG) => Self::CreateAdmin,
            Some(Self::PROD_FLAG) => Self::Production,
            _ => Self::Default,
        }
    }

    /// The argument that selects this mode, if any.
    pub const fn flag(self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::CreateAdmin => Some(Self::CREATE_ADMIN_FLAG),
            Self::Production => Some(Self::PROD_FLAG),
        }
    }

    /// The optional step this mode adds to the sequence.
    pub const fn optional_step(self) -> Option<Step> {
        match self {
            Self::Default => None,
            Self::CreateAdmin => Some(Step::CreateAdmin),
            Self::Production => Some(Step::CollectStatic),
        }
    }

    /// Ordered list of steps a run in this mode goes through.
    pub fn plan(self) -> Vec<Step> {
        let mut steps = vec![
            Step::EnsureVirtualEnv,
            Step::Activate,
            Step::InstallDependencies,
            Step::ApplyMigrations,
        ];
        steps.extend(self.optional_step());
        steps.push(Step::LaunchServer);
        steps
    }
}

/// A stage of the bootstrap sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Step {
    /// Create the virtual environment when its directory is missing
    #[strum(serialize = "ensure-venv")]
    EnsureVirtualEnv,
    /// Compute the activation environment for later children
    Activate,
    /// Install pinned packages from the requirements manifest
    #[strum(serialize = "install-deps")]
    InstallDependencies,
    /// Run the schema migration tool
    #[strum(serialize = "migrate")]
    ApplyMigrations,
    /// Interactive superuser prompt
    CreateAdmin,
    /// Copy static assets into the deployment directory
    CollectStatic,
    /// Start the development server and block
    #[strum(serialize = "run-server")]
    LaunchServer,
}

impl Step {
    /// Whether the step needs the terminal (stdin and the foreground
    /// process group).
    pub const fn attaches_terminal(self) -> bool {
        matches!(self, Self::CreateAdmin | Self::LaunchServer)
    }

    /// Whether the step is gated by the runtime mode.
    pub const fn is_optional(self) -> bool {
        matches!(self, Self::CreateAdmin | Self::CollectStatic)
    }
}
