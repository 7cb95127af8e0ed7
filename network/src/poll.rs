//! Winners poll loop: query the server on a fresh connection until the
//! draw completes, sleeping the configured interval between attempts.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::protocol::{self, ProtocolError, WinnersStatus};
use crate::session::{Session, SessionError};

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Connect(SessionError),
    #[error(transparent)]
    Io(SessionError),
    #[error("undecodable winners response: {0}")]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Winners(Vec<String>),
    Cancelled,
}

/// Poll until the draw is ready. Unlike submission, every failure here is
/// fatal: a server that cannot answer a query will not answer the next
/// one either.
pub async fn run_poll(
    agency_id: &str,
    server: SocketAddr,
    interval: Duration,
    token: &CancellationToken,
) -> Result<PollOutcome, PollError> {
    let mut attempt = 0u32;
    loop {
        if token.is_cancelled() {
            info!(agency_id, "shutdown requested, stopping winners poll");
            return Ok(PollOutcome::Cancelled);
        }
        attempt += 1;

        let mut session = match Session::connect(server, token.clone()).await {
            Ok(session) => session,
            Err(SessionError::Cancelled) => return Ok(PollOutcome::Cancelled),
            Err(e) => return Err(PollError::Connect(e)),
        };

        let query = protocol::frame_winners_query(agency_id)?;
        match session.write_all(&query).await {
            Ok(()) => {}
            Err(SessionError::Cancelled) => return Ok(PollOutcome::Cancelled),
            Err(e) => return Err(PollError::Io(e)),
        }

        let response = match session.read_to_end().await {
            Ok(bytes) => bytes,
            Err(SessionError::Cancelled) => return Ok(PollOutcome::Cancelled),
            Err(e) => return Err(PollError::Io(e)),
        };

        match protocol::decode_winners(&response)? {
            WinnersStatus::Ready(winners) => {
                info!(agency_id, winners = winners.len(), "draw complete");
                session.shutdown().await;
                return Ok(PollOutcome::Winners(winners));
            }
            WinnersStatus::NotReady => {
                debug!(agency_id, attempt, "draw still in progress");
                session.shutdown().await;
            }
        }

        select! {
            _ = token.cancelled() => {
                info!(agency_id, "shutdown requested, stopping winners poll");
                return Ok(PollOutcome::Cancelled);
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
