//! `status`: one row per unit with its lifecycle tuple.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tabled::Tabled;

use unitstate_core::{Manager, Unit, UnitKind};

use crate::cli::UnitsArgs;
use crate::commands::Ctx;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
pub struct StatusEntry {
    pub unit: String,
    pub load: String,
    pub active: String,
    pub sub: String,
    pub description: String,
    pub since: Option<DateTime<Utc>>,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "UNIT")]
    unit: String,
    #[tabled(rename = "LOAD")]
    load: String,
    #[tabled(rename = "ACTIVE")]
    active: String,
    #[tabled(rename = "SUB")]
    sub: String,
    #[tabled(rename = "SINCE")]
    since: String,
    #[tabled(rename = "DESCRIPTION")]
    description: String,
}

/// Register `name` (bare names are services) and have systemd load it so
/// there is an object to read.
pub(crate) async fn open_unit(manager: &Manager, name: &str) -> Result<Arc<Unit>, CliError> {
    let unit = if UnitKind::from_name(name).is_some() {
        manager.unit(name).await?
    } else {
        manager.get_or_create(UnitKind::Service, name).await?
    };
    manager.load_unit(unit.name()).await?;
    Ok(unit)
}

pub async fn handle(manager: &Manager, args: UnitsArgs, ctx: &Ctx) -> Result<(), CliError> {
    let mut entries = Vec::with_capacity(args.units.len());
    for name in &args.units {
        let unit = open_unit(manager, name).await?;
        entries.push(entry(&unit).await?);
    }

    let color = ctx.color;
    let rendered = output::render_list(
        ctx.output,
        &entries,
        |e| StatusRow {
            unit: e.unit.clone(),
            load: e.load.clone(),
            active: output::paint_active(&e.active, color),
            sub: e.sub.clone(),
            since: e.since.map_or_else(
                || "-".into(),
                |t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
            description: e.description.clone(),
        },
        |e| format!("{} {} {} {}", e.unit, e.load, e.active, e.sub),
    )?;
    output::print_output(&rendered, ctx.quiet);
    Ok(())
}

async fn entry(unit: &Unit) -> Result<StatusEntry, CliError> {
    let state = unit.state().await?;
    Ok(StatusEntry {
        unit: unit.name().to_owned(),
        load: state.load_state().to_owned(),
        active: state.active_state().to_owned(),
        sub: state.sub_state().to_owned(),
        description: unit.description().await?,
        since: unit.state_change_timestamp().await?,
    })
}
