//! Batch submission loop: fetch, connect, send, await acknowledgement,
//! repeat until the source is exhausted, then flush a zero-record
//! completion notice.

use std::io;
use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::protocol::{self, Ack, Bet};
use crate::session::{Session, SessionError};

/// Supplies ordered batches of records, at most the configured size each.
/// An empty batch means the source is exhausted; an error terminates the
/// whole run.
pub trait BetSource {
    fn next_batch(&mut self) -> io::Result<Vec<Bet>>;
}

#[derive(Debug, thiserror::Error)]
pub enum SenderError {
    #[error("bet source failed: {0}")]
    Source(#[source] io::Error),
    #[error(transparent)]
    Connect(SessionError),
}

#[derive(Debug, PartialEq, Eq)]
pub enum SenderOutcome {
    Completed,
    Cancelled,
}

/// Drive the submission state machine until the source is exhausted.
///
/// Each batch gets a fresh connection. Connect and source failures stop
/// the run; everything that only breaks a single batch's exchange is
/// logged and the loop moves on, since batches are independent.
pub async fn run_submission<S: BetSource>(
    agency_id: &str,
    server: SocketAddr,
    source: &mut S,
    token: &CancellationToken,
) -> Result<SenderOutcome, SenderError> {
    let mut batches = 0usize;
    loop {
        if token.is_cancelled() {
            info!(agency_id, "shutdown requested, stopping submission");
            return Ok(SenderOutcome::Cancelled);
        }

        let batch = source.next_batch().map_err(SenderError::Source)?;
        if batch.is_empty() {
            break;
        }

        let mut session = match Session::connect(server, token.clone()).await {
            Ok(session) => session,
            Err(SessionError::Cancelled) => return Ok(SenderOutcome::Cancelled),
            Err(e) => return Err(SenderError::Connect(e)),
        };

        let frame = match protocol::frame_submission(agency_id, &batch) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(agency_id, records = batch.len(), error = %e, "batch rejected, skipping it");
                session.shutdown().await;
                continue;
            }
        };

        if let Err(e) = session.write_all(&frame).await {
            if e.is_cancelled() {
                return Ok(SenderOutcome::Cancelled);
            }
            // this batch's exchange is lost, the next ones are not
            warn!(agency_id, error = %e, "sending batch failed, moving on");
            continue;
        }
        batches += 1;

        let mut ack = [0u8; protocol::ACK_LEN];
        match session.read_exact(&mut ack).await {
            Ok(()) => match protocol::decode_ack(&ack) {
                Ok(Ack::Ok) => {
                    info!(agency_id, records = batch.len(), "batch acknowledged");
                }
                Ok(verdict) => {
                    warn!(agency_id, ?verdict, "server rejected the batch");
                }
                Err(e) => {
                    warn!(agency_id, error = %e, "undecodable acknowledgement, skipping it");
                }
            },
            Err(e) if e.is_cancelled() => return Ok(SenderOutcome::Cancelled),
            Err(e) => {
                warn!(agency_id, error = %e, "acknowledgement read failed, skipping it");
            }
        }
        session.shutdown().await;
    }

    info!(agency_id, batches, "all batches submitted, notifying completion");
    Ok(flush_completion(agency_id, server, token).await)
}

/// Tell the server this agency is done by submitting an empty batch.
/// Any failure here is logged and swallowed; the draw query that follows
/// does not depend on it succeeding.
async fn flush_completion(
    agency_id: &str,
    server: SocketAddr,
    token: &CancellationToken,
) -> SenderOutcome {
    if token.is_cancelled() {
        return SenderOutcome::Cancelled;
    }

    let mut session = match Session::connect(server, token.clone()).await {
        Ok(session) => session,
        Err(SessionError::Cancelled) => return SenderOutcome::Cancelled,
        Err(e) => {
            warn!(agency_id, error = %e, "completion notice failed");
            return SenderOutcome::Completed;
        }
    };

    let frame = match protocol::frame_submission(agency_id, &[]) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(agency_id, error = %e, "completion notice failed");
            session.shutdown().await;
            return SenderOutcome::Completed;
        }
    };

    if let Err(e) = session.write_all(&frame).await {
        if e.is_cancelled() {
            return SenderOutcome::Cancelled;
        }
        warn!(agency_id, error = %e, "completion notice failed");
        return SenderOutcome::Completed;
    }

    let mut ack = [0u8; protocol::ACK_LEN];
    match session.read_exact(&mut ack).await {
        Ok(()) => match protocol::decode_ack(&ack) {
            Ok(verdict) => info!(agency_id, ?verdict, "completion acknowledged"),
            Err(e) => warn!(agency_id, error = %e, "undecodable completion acknowledgement"),
        },
        Err(e) if e.is_cancelled() => return SenderOutcome::Cancelled,
        Err(e) => warn!(agency_id, error = %e, "completion acknowledgement read failed"),
    }
    session.shutdown().await;
    SenderOutcome::Completed
}
