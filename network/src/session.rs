//! One TCP connection for one request/response exchange.
//!
//! Every blocking point runs under the shared [`CancellationToken`]; when
//! the coordinator cancels it, the in-flight I/O future is dropped (which
//! closes the socket) and the call site observes [`SessionError::Cancelled`]
//! instead of an operational failure.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
    #[error("cancelled by shutdown request")]
    Cancelled,
}

impl SessionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SessionError::Cancelled)
    }
}

#[derive(Debug)]
pub struct Session {
    stream: TcpStream,
    token: CancellationToken,
}

impl Session {
    /// Open a fresh connection for a single exchange. Failures are
    /// reported to the caller, never retried here.
    pub async fn connect(
        addr: SocketAddr,
        token: CancellationToken,
    ) -> Result<Self, SessionError> {
        let Some(connected) = token.run_until_cancelled(TcpStream::connect(addr)).await else {
            return Err(SessionError::Cancelled);
        };
        let stream = connected.map_err(|source| SessionError::Connect { addr, source })?;
        Ok(Self { stream, token })
    }

    /// Write the whole buffer, looping on partial writes.
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        let Self { stream, token } = self;
        let Some(result) = token.run_until_cancelled(stream.write_all(bytes)).await else {
            return Err(SessionError::Cancelled);
        };
        result.map_err(SessionError::Write)
    }

    /// Fill the buffer exactly, erroring if the peer closes early.
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), SessionError> {
        let Self { stream, token } = self;
        let Some(result) = token.run_until_cancelled(stream.read_exact(buf)).await else {
            return Err(SessionError::Cancelled);
        };
        result.map(drop).map_err(SessionError::Read)
    }

    /// Read everything until the peer closes the connection. Used for
    /// responses whose length is not known in advance.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, SessionError> {
        let Self { stream, token } = self;
        let mut buf = Vec::new();
        let Some(result) = token.run_until_cancelled(stream.read_to_end(&mut buf)).await else {
            return Err(SessionError::Cancelled);
        };
        result.map_err(SessionError::Read)?;
        Ok(buf)
    }

    /// Graceful close; a failed shutdown on an already dead peer is not
    /// worth reporting.
    pub async fn shutdown(mut self) {
        let _ = self.stream.shutdown().await;
    }
}
