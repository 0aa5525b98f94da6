//! Peer credentials of a socket connection.

use ecm_core::identity::Identity;
use ecm_core::platform::Uid;
use tokio::net::UnixStream;

use super::error::{ProtocolError, ProtocolResult};

/// Credentials of the process on the other end of a connection, read via
/// `SO_PEERCRED` at accept time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerCredentials {
    /// Effective uid.
    pub uid: u32,
    /// Effective gid.
    pub gid: u32,
    /// Process id, when the platform reports it.
    pub pid: Option<u32>,
}

impl PeerCredentials {
    /// Reads the peer credentials of `stream`.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::PeerCredentials`] if the kernel does not report
    /// them.
    pub fn of(stream: &UnixStream) -> ProtocolResult<Self> {
        let cred = stream.peer_cred().map_err(ProtocolError::PeerCredentials)?;
        Ok(Self {
            uid: cred.uid(),
            gid: cred.gid(),
            pid: cred.pid().and_then(|pid| u32::try_from(pid).ok()),
        })
    }

    /// Calling identity for requests on this connection.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::new(Uid(self.uid), self.pid.unwrap_or(0))
    }
}
