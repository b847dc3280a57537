// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sadhya - WhatsApp ordering bot for Onam sadhya.
//!
//! This is the binary entry point: the webhook server plus a handful of
//! operator commands for checking configuration, previewing the catalog and
//! looking up orders.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod catalog;
mod check;
mod offline;
mod order;
mod serve;
mod status;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use sadhya_config::SadhyaConfig;
use sadhya_core::SadhyaError;

/// Sadhya - WhatsApp ordering bot for Onam sadhya.
#[derive(Parser, Debug)]
#[command(name = "sadhya", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG search path.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the webhook server, outbox worker and session reaper.
    Serve {
        /// Keep sessions and orders in memory (nothing survives a restart).
        #[arg(long)]
        in_memory: bool,
    },
    /// Validate configuration and report what the server would run with.
    CheckConfig {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Inspect the menu and delivery locations.
    Catalog {
        #[command(subcommand)]
        action: CatalogCommand,
    },
    /// Show an order from the database.
    Order {
        /// Order id, e.g. EO260824K3P9QZ.
        id: String,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Ask a running server for its health.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// List every location and menu item, active or not.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the junction and menu prompts as customers will see them.
    Preview,
}

/// Load and validate configuration, exiting with rendered diagnostics on error.
fn load_config(path: Option<&Path>) -> SadhyaConfig {
    let loaded = match path {
        Some(path) => sadhya_config::load_and_validate_path(path),
        None => sadhya_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            sadhya_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.clone();
    let config = load_config(config_path.as_deref());

    let result: Result<(), SadhyaError> = match cli.command {
        Some(Commands::Serve { in_memory }) => {
            serve::run_serve(config, config_path, in_memory).await
        }
        Some(Commands::CheckConfig { plain }) => check::run_check(&config, plain).await,
        Some(Commands::Catalog { action }) => match action {
            CatalogCommand::List { json } => catalog::run_list(&config, json),
            CatalogCommand::Preview => catalog::run_preview(&config),
        },
        Some(Commands::Order { id, json }) => order::run_order(&config, &id, json).await,
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        None => {
            println!("sadhya: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
