//! wgbridge CLI binary entrypoint.

use std::io;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use wgbridge::{FakeBackend, ManagerConfig};
use wgbridge_cli::cli::{BackendKind, Cli, Commands, UpArgs};
use wgbridge_cli::commands::{ConfigCommand, KeyCommand, UpCommand};
use wgbridge_cli::output::OutputFormat;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn read_config(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C, stopping now");
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Check { file } => {
            let text = read_config(&file).await?;
            ConfigCommand::check(&mut stdout, &format, &text)
                .with_context(|| format!("{} is not a valid configuration", file.display()))?;
        }
        Commands::Render { file } => {
            let text = read_config(&file).await?;
            ConfigCommand::render(&mut stdout, &format, &text)
                .with_context(|| format!("{} is not a valid configuration", file.display()))?;
        }
        Commands::Genkey => KeyCommand::genkey(&mut stdout, &format)?,
        Commands::Pubkey { private_key } => KeyCommand::pubkey(&mut stdout, &format, &private_key)?,
        Commands::Up(UpArgs { file, backend }) => {
            let text = read_config(&file).await?;
            let config = ManagerConfig::new(cli.tunnel_name).with_reconcile_status(!cli.no_reconcile);
            let cmd = UpCommand::new(config)?;

            match backend {
                BackendKind::Fake => {
                    cmd.execute(FakeBackend::new(), &mut stdout, &format, &text, ctrl_c())
                        .await?;
                }
                #[cfg(feature = "linux")]
                BackendKind::Linux => {
                    cmd.execute(wgbridge::backend::LinuxBackend::new(), &mut stdout, &format, &text, ctrl_c())
                        .await?;
                }
                #[cfg(not(feature = "linux"))]
                BackendKind::Linux => {
                    anyhow::bail!("the linux backend requires building with `--features linux`");
                }
            }
        }
    }

    Ok(())
}
