use std::path::PathBuf;

use clap::Args;

/// Flags every step understands.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
#[command(next_help_heading = "Step")]
pub struct StepArgs {
    /// Run the step even if it is not needed
    #[arg(long)]
    pub force: bool,

    /// Only report whether the step is needed: exit 0 if needed, 1 if not
    #[arg(long)]
    pub check: bool,

    /// Show debug messages on the console
    #[arg(long)]
    pub debug: bool,

    /// Also write the log to this file
    #[arg(long, value_name = "PATH")]
    pub logfile: Option<PathBuf>,

    /// Do not set the terminal title
    #[arg(long)]
    pub notitle: bool,
}
