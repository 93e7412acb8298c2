//! Command dispatch: bridges CLI args -> manager calls -> output formatting.

pub mod config_cmd;
pub mod get;
pub mod lifecycle;
pub mod status;
pub mod watch;

use unitstate_core::{Manager, Mode};

use crate::cli::{Command, OutputFormat};
use crate::commands::lifecycle::Verb;
use crate::error::CliError;

/// Resolved presentation settings shared by every handler.
#[derive(Debug, Clone, Copy)]
pub struct Ctx {
    pub output: OutputFormat,
    pub color: bool,
    pub quiet: bool,
    /// Job mode when `--mode` is not given.
    pub mode: Mode,
}

/// Dispatch a bus-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, manager: &Manager, ctx: &Ctx) -> Result<(), CliError> {
    match cmd {
        Command::Status(args) => status::handle(manager, args, ctx).await,
        Command::Get(args) => get::handle(manager, args, ctx).await,
        Command::Watch(args) => watch::handle(manager, args, ctx).await,
        Command::Start(args) => lifecycle::handle(manager, Verb::Start, args, ctx).await,
        Command::Stop(args) => lifecycle::handle(manager, Verb::Stop, args, ctx).await,
        Command::Restart(args) => lifecycle::handle(manager, Verb::Restart, args, ctx).await,
        Command::Reload(args) => lifecycle::handle(manager, Verb::Reload, args, ctx).await,
        Command::TryRestart(args) => {
            lifecycle::handle(manager, Verb::TryRestart, args, ctx).await
        }
        Command::ReloadOrRestart(args) => {
            lifecycle::handle(manager, Verb::ReloadOrRestart, args, ctx).await
        }
        Command::ReloadOrTryRestart(args) => {
            lifecycle::handle(manager, Verb::ReloadOrTryRestart, args, ctx).await
        }
        Command::Kill(args) => lifecycle::kill(manager, args, ctx).await,
        Command::ResetFailed(args) => lifecycle::reset_failed(manager, args, ctx).await,
        // Handled before a connection is opened
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal {
            message: "command does not use the bus".into(),
        }),
    }
}
