mod config;
mod reader;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use lottery_network::poll::{run_poll, PollOutcome};
use lottery_network::protocol::MAX_PREFIXED_LEN;
use lottery_network::sender::{run_submission, SenderOutcome};

use crate::config::Config;
use crate::reader::CsvBetReader;

#[derive(Parser)]
struct CliArgs {
    /// Path to the agency configuration file.
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().init();
    let args = CliArgs::parse();

    let config = match config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "could not load configuration");
            return ExitCode::FAILURE;
        }
    };

    let token = CancellationToken::new();
    let agency_id = config.agency_id.clone();
    spawn_termination_listener(token.clone(), agency_id.clone());

    match run(config, &token).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(%agency_id, error = %e, "client terminated with failure");
            ExitCode::FAILURE
        }
    }
}

/// The cancellation coordinator: waits for SIGTERM and cancels the shared
/// token. The protocol loops observe the token at their checkpoints and
/// inside every blocking I/O call; nothing else is touched from here.
fn spawn_termination_listener(token: CancellationToken, agency_id: String) {
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!(error = %e, "could not install the SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
        info!(%agency_id, "termination requested, closing in progress");
        token.cancel();
    });
}

async fn run(config: Config, token: &CancellationToken) -> Result<(), config::Error> {
    let batch_size = config.batch_size.min(MAX_PREFIXED_LEN);
    if batch_size != config.batch_size {
        warn!(
            configured = config.batch_size,
            capped = batch_size,
            "batch size exceeds the wire limit, capping it"
        );
    }

    let mut source = CsvBetReader::open(&config.data_file, batch_size)?;

    let outcome =
        run_submission(&config.agency_id, config.server_address, &mut source, token).await?;
    if outcome == SenderOutcome::Cancelled {
        info!(agency_id = %config.agency_id, "shut down before submission finished");
        return Ok(());
    }

    let interval = Duration::from_millis(config.poll_interval_ms);
    match run_poll(&config.agency_id, config.server_address, interval, token).await? {
        PollOutcome::Winners(winners) => {
            info!(
                agency_id = %config.agency_id,
                winners = winners.len(),
                "lottery results received"
            );
        }
        PollOutcome::Cancelled => {
            info!(agency_id = %config.agency_id, "shut down before the draw completed");
        }
    }
    Ok(())
}
