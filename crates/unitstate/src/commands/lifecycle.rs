//! Lifecycle verbs: start, stop, restart, reload and friends, plus kill and
//! reset-failed.

use std::time::Duration;

use unitstate_core::{ActiveState, CoreError, Manager, Mode, StateFilter, StateTuple, Unit};

use crate::cli::{KillArgs, UnitsArgs, VerbArgs};
use crate::commands::Ctx;
use crate::commands::status::open_unit;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Start,
    Stop,
    Restart,
    Reload,
    TryRestart,
    ReloadOrRestart,
    ReloadOrTryRestart,
}

impl Verb {
    async fn issue(self, unit: &Unit, mode: Mode) -> Result<String, CoreError> {
        let job = match self {
            Self::Start => unit.start(mode).await?,
            Self::Stop => unit.stop(mode).await?,
            Self::Restart => unit.restart(mode).await?,
            Self::Reload => unit.reload(mode).await?,
            Self::TryRestart => unit.try_restart(mode).await?,
            Self::ReloadOrRestart => unit.reload_or_restart(mode).await?,
            Self::ReloadOrTryRestart => unit.reload_or_try_restart(mode).await?,
        };
        Ok(job.into_string())
    }

    /// Whether systemd completes the job without any state change, so
    /// there is nothing to wait for.
    fn is_noop(self, before: &StateTuple) -> bool {
        let active = before.active();
        match self {
            Self::Start => active == Some(ActiveState::Active),
            Self::Stop => matches!(active, Some(ActiveState::Inactive | ActiveState::Failed)),
            // Only act on units that are already running.
            Self::TryRestart | Self::ReloadOrTryRestart => active != Some(ActiveState::Active),
            Self::Restart | Self::Reload | Self::ReloadOrRestart => false,
        }
    }

    /// The state `--wait` waits for.
    fn target(self) -> StateFilter {
        match self {
            Self::Stop => StateFilter::Custom(Box::new(|s: &StateTuple| {
                matches!(s.active(), Some(ActiveState::Inactive | ActiveState::Failed))
            })),
            _ => StateFilter::Custom(Box::new(|s: &StateTuple| {
                matches!(s.active(), Some(ActiveState::Active | ActiveState::Failed))
            })),
        }
    }
}

pub async fn handle(
    manager: &Manager,
    verb: Verb,
    args: VerbArgs,
    ctx: &Ctx,
) -> Result<(), CliError> {
    let mode = args.mode.unwrap_or(ctx.mode);
    let wait_timeout = Duration::from_secs(args.wait_timeout);

    for name in &args.units {
        let unit = open_unit(manager, name).await?;
        let watch = if args.wait {
            unit.subscribe().await?;
            let stream = unit.subscribe_state();
            Some((stream, unit.state().await?))
        } else {
            None
        };

        let job = verb.issue(&unit, mode).await?;
        tracing::info!(unit = %unit, job = %job, ?verb, "job queued");
        output::print_output(&format!("{}: {job}", unit.name()), ctx.quiet);

        let Some((mut stream, before)) = watch else { continue };
        if verb.is_noop(&before) {
            output::print_output(&format!("{}: {before}", unit.name()), ctx.quiet);
            continue;
        }
        let target = verb.target();
        let state = match stream
            .wait_for_transition(&before, &target, wait_timeout)
            .await
        {
            Ok(state) => state,
            Err(CoreError::Timeout { .. }) => {
                return Err(CliError::Timeout {
                    seconds: args.wait_timeout,
                });
            }
            Err(e) => return Err(e.into()),
        };
        if state.active() == Some(ActiveState::Failed) {
            return Err(CliError::UnitFailed {
                unit: unit.name().to_owned(),
                state: state.to_string(),
            });
        }
        output::print_output(&format!("{}: {state}", unit.name()), ctx.quiet);
    }
    Ok(())
}

pub async fn kill(manager: &Manager, args: KillArgs, ctx: &Ctx) -> Result<(), CliError> {
    for name in &args.units {
        let unit = open_unit(manager, name).await?;
        unit.kill(args.who, args.signal).await?;
        output::print_output(
            &format!("{}: signal {} sent to {}", unit.name(), args.signal, args.who),
            ctx.quiet,
        );
    }
    Ok(())
}

pub async fn reset_failed(manager: &Manager, args: UnitsArgs, ctx: &Ctx) -> Result<(), CliError> {
    for name in &args.units {
        let unit = open_unit(manager, name).await?;
        unit.reset_failed().await?;
        output::print_output(&format!("{}: failed state cleared", unit.name()), ctx.quiet);
    }
    Ok(())
}
