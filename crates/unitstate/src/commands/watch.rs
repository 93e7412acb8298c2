//! `watch`: print lifecycle transitions as they arrive.

use chrono::{DateTime, Local, Utc};
use futures_util::StreamExt;
use futures_util::stream::select_all;
use serde::Serialize;

use unitstate_core::{Manager, StateChange, StateTuple};

use crate::cli::{OutputFormat, WatchArgs};
use crate::commands::Ctx;
use crate::commands::status::open_unit;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct WatchEvent<'a> {
    at: DateTime<Utc>,
    unit: &'a str,
    previous: Option<&'a StateTuple>,
    current: &'a StateTuple,
}

pub async fn handle(manager: &Manager, args: WatchArgs, ctx: &Ctx) -> Result<(), CliError> {
    let mut streams = Vec::with_capacity(args.units.len());
    for name in &args.units {
        let unit = open_unit(manager, name).await?;
        // Open the stream before subscribing so nothing slips past.
        streams.push(unit.subscribe_state().into_stream());
        unit.subscribe().await?;
        let state = unit.state().await?;
        print_event(ctx, unit.name(), None, &state)?;
    }

    let mut changes = select_all(streams);
    let mut seen = 0usize;
    loop {
        let change = tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break,
            change = changes.next() => change,
        };
        let Some(change) = change else { break };
        report(ctx, &change)?;

        seen += 1;
        if args.count.is_some_and(|limit| seen >= limit) {
            break;
        }
    }
    Ok(())
}

fn report(ctx: &Ctx, change: &StateChange) -> Result<(), CliError> {
    print_event(ctx, &change.unit, Some(&change.previous), &change.current)
}

fn print_event(
    ctx: &Ctx,
    unit: &str,
    previous: Option<&StateTuple>,
    current: &StateTuple,
) -> Result<(), CliError> {
    let now = Utc::now();
    let line = match ctx.output {
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(
            &WatchEvent {
                at: now,
                unit,
                previous,
                current,
            },
            true,
        )?,
        OutputFormat::Plain => format!(
            "{unit} {} {} {}",
            current.load_state(),
            current.active_state(),
            current.sub_state()
        ),
        OutputFormat::Table => {
            let stamp = now.with_timezone(&Local).format("%H:%M:%S");
            let active = output::paint_active(current.active_state(), ctx.color);
            let to = format!(
                "{} - {active} ({})",
                current.load_state(),
                current.sub_state()
            );
            match previous {
                Some(previous) => format!("{stamp} {unit}: {previous} -> {to}"),
                None => format!("{stamp} {unit}: {to}"),
            }
        }
    };
    output::print_output(&line, ctx.quiet);
    Ok(())
}
