// procflow: Async Process Orchestration
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Entry point.
//!
//! ```text
//! cli::parse() --> Config --> Logging + Defaults --> Command Dispatch
//!   Version | Options | Configs | Run | Pipe
//! ```

use std::process::ExitCode;

use procflow::cli::global::GlobalOptions;
use procflow::cli::{self, Command};
use procflow::cmd::config::{run_configs_command, run_options_command};
use procflow::cmd::run::{run_pipe_command, run_run_command};
use procflow::config::loader::ConfigLoader;
use procflow::config::{Config, DEFAULT_FILE, ENV_PREFIX};
use procflow::core::cancel::CancelToken;
use procflow::core::policy::set_defaults;
use procflow::logging::init_logging;

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::parse();

    if let Some(Command::Configs) = cli.command {
        return match build_config_loader(&cli.global) {
            Ok(loader) => {
                run_configs_command(&loader.format_loaded_files());
                ExitCode::SUCCESS
            }
            Err(e) => report(&e),
        };
    }

    let config = match load_config(&cli.global) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match init_logging(&config.log.log_config()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match config.policy() {
        Ok(defaults) => set_defaults(defaults),
        Err(e) => return report(&e.into()),
    }

    dispatch_command(&cli, &config).await
}

async fn dispatch_command(cli: &cli::Cli, config: &Config) -> ExitCode {
    let cancel = interrupt_token();
    let result = match &cli.command {
        Some(Command::Version) => {
            handle_version_command();
            Ok(0)
        }
        Some(Command::Options) => {
            run_options_command(config);
            Ok(0)
        }
        Some(Command::Configs) => Ok(0),
        Some(Command::Run(args)) => run_run_command(args, &cancel).await,
        Some(Command::Pipe(args)) => run_pipe_command(args, &cancel).await,
        None => {
            eprintln!("No command specified. Use --help for usage information.");
            Err(anyhow::anyhow!("No command specified"))
        }
    };

    match result {
        Ok(status) => ExitCode::from(status),
        Err(e) => report(&e),
    }
}

fn report(e: &anyhow::Error) -> ExitCode {
    eprintln!("Error: {e:#}");
    ExitCode::FAILURE
}

fn handle_version_command() {
    println!("{}", env!("CARGO_PKG_VERSION"));
}

/// A token cancelled on Ctrl+C. Children run in their own process group so
/// the terminal's SIGINT never reaches them directly.
fn interrupt_token() -> CancelToken {
    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel("interrupted");
        }
    });
    cancel
}

fn build_config_loader(global: &GlobalOptions) -> procflow::error::Result<ConfigLoader> {
    let mut loader = ConfigLoader::new();
    if !global.no_default_config {
        loader = loader.add_toml_file_optional(DEFAULT_FILE);
    }
    for path in &global.configs {
        loader = loader.add_toml_file(path);
    }
    loader = loader.with_env_prefix(ENV_PREFIX);
    for option in global.to_config_overrides() {
        loader = loader.set_str(&option)?;
    }
    Ok(loader)
}

fn load_config(global: &GlobalOptions) -> procflow::error::Result<Config> {
    build_config_loader(global)?.build()
}
