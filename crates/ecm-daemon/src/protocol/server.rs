//! Unix socket server.
//!
//! One tokio task per connection. Each connection is bound to the peer
//! credentials read at accept time; frames are answered in order.

use std::fs::Permissions;
use std::future::Future;
use std::io;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::{SinkExt, StreamExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Semaphore;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use super::credentials::PeerCredentials;
use super::dispatch::{ConnectionContext, RequestDispatcher};
use super::error::{ProtocolError, ProtocolResult};
use super::framing::FrameCodec;

/// Maximum concurrent connections.
const MAX_CONNECTIONS: usize = 64;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket path.
    pub socket_path: PathBuf,
    /// Permission bits applied to the socket after binding.
    pub socket_mode: u32,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl ServerConfig {
    /// Config for `socket_path` with the given mode.
    #[must_use]
    pub fn new(socket_path: impl Into<PathBuf>, socket_mode: u32) -> Self {
        Self {
            socket_path: socket_path.into(),
            socket_mode,
            max_connections: MAX_CONNECTIONS,
        }
    }
}

/// Listening ECM socket.
#[derive(Debug)]
pub struct ProtocolServer {
    listener: UnixListener,
    config: ServerConfig,
    connections: Arc<Semaphore>,
    next_connection_id: AtomicU64,
}

impl ProtocolServer {
    /// Binds the socket, replacing a stale socket file, and applies the
    /// configured mode.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory, the bind or the permission
    /// change fails, or if something other than a socket already exists at
    /// the socket path.
    pub fn bind(config: ServerConfig) -> ProtocolResult<Self> {
        if let Some(parent) = config.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        remove_stale_socket(&config.socket_path)?;
        let listener = UnixListener::bind(&config.socket_path)?;
        std::fs::set_permissions(
            &config.socket_path,
            Permissions::from_mode(config.socket_mode),
        )?;
        info!(
            path = %config.socket_path.display(),
            mode = %format!("{:o}", config.socket_mode),
            "listening"
        );
        Ok(Self {
            listener,
            connections: Arc::new(Semaphore::new(config.max_connections)),
            config,
            next_connection_id: AtomicU64::new(1),
        })
    }

    /// The bound socket path.
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Accepts connections until `shutdown` resolves, then removes the
    /// socket file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if accepting fails.
    pub async fn serve(
        self,
        dispatcher: RequestDispatcher,
        shutdown: impl Future<Output = ()>,
    ) -> ProtocolResult<()> {
        tokio::pin!(shutdown);
        let result = loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutting down listener");
                    break Ok(());
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, _)) => self.spawn_connection(stream, dispatcher.clone()),
                        Err(err) => break Err(err.into()),
                    }
                }
            }
        };
        if let Err(err) = std::fs::remove_file(&self.config.socket_path) {
            debug!(error = %err, "socket file already gone");
        }
        result
    }

    fn spawn_connection(&self, stream: UnixStream, dispatcher: RequestDispatcher) {
        let Ok(permit) = Arc::clone(&self.connections).try_acquire_owned() else {
            warn!("connection limit reached, dropping connection");
            return;
        };
        let credentials = match PeerCredentials::of(&stream) {
            Ok(credentials) => credentials,
            Err(err) => {
                warn!(error = %err, "rejecting connection");
                return;
            },
        };
        let ctx = ConnectionContext::new(
            credentials,
            self.next_connection_id.fetch_add(1, Ordering::Relaxed),
        );
        tokio::spawn(async move {
            let _permit = permit;
            debug!(
                connection_id = ctx.connection_id(),
                uid = credentials.uid,
                pid = ?credentials.pid,
                "connection accepted"
            );
            if let Err(err) = handle_connection(stream, &ctx, &dispatcher).await {
                warn!(connection_id = ctx.connection_id(), error = %err, "connection failed");
            }
        });
    }
}

/// Removes a leftover socket at `path`. Anything that is not a socket is
/// left in place and reported.
fn remove_stale_socket(path: &Path) -> ProtocolResult<()> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => {
            return Err(ProtocolError::Io(io::Error::new(
                err.kind(),
                format!("failed to stat {}: {err}", path.display()),
            )));
        },
    };
    if !metadata.file_type().is_socket() {
        return Err(ProtocolError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("path {} exists but is not a socket", path.display()),
        )));
    }
    std::fs::remove_file(path).map_err(|err| {
        ProtocolError::Io(io::Error::new(
            err.kind(),
            format!("failed to remove stale socket {}: {err}", path.display()),
        ))
    })?;
    debug!(path = %path.display(), "removed stale socket");
    Ok(())
}

async fn handle_connection(
    stream: UnixStream,
    ctx: &ConnectionContext,
    dispatcher: &RequestDispatcher,
) -> ProtocolResult<()> {
    let mut framed = Framed::new(stream, FrameCodec::new());
    while let Some(frame) = framed.next().await {
        let response = dispatcher.dispatch_frame(ctx, &frame?);
        framed.send(response).await?;
    }
    debug!(connection_id = ctx.connection_id(), "connection closed");
    Ok(())
}
