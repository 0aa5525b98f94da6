//! Client side of the ECM socket.

use std::path::Path;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio_util::codec::Framed;

use super::error::{ProtocolError, ProtocolResult};
use super::framing::FrameCodec;
use super::messages::{EcmRequest, EcmResponse};

/// A connection to the ECM daemon.
#[derive(Debug)]
pub struct EcmClient {
    framed: Framed<UnixStream, FrameCodec>,
}

impl EcmClient {
    /// Connects to the daemon socket at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the socket cannot be reached.
    pub async fn connect(path: &Path) -> ProtocolResult<Self> {
        let stream = UnixStream::connect(path).await?;
        Ok(Self {
            framed: Framed::new(stream, FrameCodec::new()),
        })
    }

    /// Sends `request` and waits for its response.
    ///
    /// # Errors
    ///
    /// Transport, framing or serialization failures, or
    /// [`ProtocolError::ConnectionClosed`] if the daemon hangs up.
    pub async fn call(&mut self, request: &EcmRequest) -> ProtocolResult<EcmResponse> {
        self.framed
            .send(Bytes::from(serde_json::to_vec(request)?))
            .await?;
        let frame = self
            .framed
            .next()
            .await
            .ok_or(ProtocolError::ConnectionClosed)??;
        Ok(serde_json::from_slice(&frame)?)
    }

    /// Sends a raw payload. Used to exercise the daemon's handling of
    /// malformed requests.
    ///
    /// # Errors
    ///
    /// As [`Self::call`].
    pub async fn call_raw(&mut self, payload: Bytes) -> ProtocolResult<EcmResponse> {
        self.framed.send(payload).await?;
        let frame = self
            .framed
            .next()
            .await
            .ok_or(ProtocolError::ConnectionClosed)??;
        Ok(serde_json::from_slice(&frame)?)
    }
}
