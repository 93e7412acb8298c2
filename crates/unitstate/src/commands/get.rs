//! `get`: read properties from a unit's cache.

use serde::Serialize;
use tabled::Tabled;

use unitstate_core::{Manager, PropertyValue};

use crate::cli::GetArgs;
use crate::commands::Ctx;
use crate::commands::status::open_unit;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct PropertyEntry {
    name: String,
    value: PropertyValue,
}

#[derive(Tabled)]
struct PropertyRow {
    #[tabled(rename = "PROPERTY")]
    name: String,
    #[tabled(rename = "VALUE")]
    value: String,
}

pub async fn handle(manager: &Manager, args: GetArgs, ctx: &Ctx) -> Result<(), CliError> {
    let unit = open_unit(manager, &args.unit).await?;
    unit.refresh_all().await?;

    let names = if args.properties.is_empty() {
        unit.cache().keys()
    } else {
        args.properties
    };

    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        let value = unit.get_value(&name).await?;
        entries.push(PropertyEntry { name, value });
    }

    let rendered = output::render_list(
        ctx.output,
        &entries,
        |e| PropertyRow {
            name: e.name.clone(),
            value: e.value.to_string(),
        },
        |e| format!("{}={}", e.name, e.value),
    )?;
    output::print_output(&rendered, ctx.quiet);
    Ok(())
}
