mod cli;
mod commands;
mod error;
mod output;

use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use unitstate_config::Config;
use unitstate_core::{BusAddress, Manager, ManagerConfig};

use crate::cli::{Cli, ColorMode, Command, GlobalOpts, OutputFormat};
use crate::commands::Ctx;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a bus connection
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "unitstate", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let cfg = unitstate_config::load_config()?;
            let manager_config = build_manager_config(&cli.global, &cfg)?;
            let bus = describe_bus(&manager_config.bus);
            let manager = Manager::connect(manager_config)
                .await
                .map_err(|source| CliError::ConnectionFailed { bus, source })?;

            let ctx = build_ctx(&cli.global, &cfg);
            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &manager, &ctx).await;
            manager.shutdown().await;
            result
        }
    }
}

/// Merge the config file with CLI overrides.
fn build_manager_config(global: &GlobalOpts, cfg: &Config) -> Result<ManagerConfig, CliError> {
    let mut manager = cfg.to_manager_config()?;
    // One-shot commands subscribe explicitly where they need signals.
    manager.auto_subscribe = false;

    if let Some(address) = &global.address {
        manager.bus = BusAddress::Address(address.clone());
    } else if global.user {
        manager.bus = BusAddress::Session;
    } else if global.system {
        manager.bus = BusAddress::System;
    }

    if let Some(secs) = global.timeout {
        if secs == 0 {
            return Err(CliError::Validation {
                field: "--timeout".into(),
                reason: "must be at least one second".into(),
            });
        }
        manager.call_timeout = Duration::from_secs(secs);
    }
    Ok(manager)
}

fn build_ctx(global: &GlobalOpts, cfg: &Config) -> Ctx {
    let format = global.output.unwrap_or_else(|| {
        OutputFormat::from_str(&cfg.defaults.output, true).unwrap_or(OutputFormat::Table)
    });
    let color = global.color.unwrap_or_else(|| {
        ColorMode::from_str(&cfg.defaults.color, true).unwrap_or(ColorMode::Auto)
    });
    Ctx {
        output: format,
        color: output::should_color(color),
        quiet: global.quiet,
        mode: cfg.defaults.mode,
    }
}

fn describe_bus(bus: &BusAddress) -> String {
    match bus {
        BusAddress::System => "system".into(),
        BusAddress::Session => "session".into(),
        BusAddress::Address(address) => address.clone(),
    }
}
