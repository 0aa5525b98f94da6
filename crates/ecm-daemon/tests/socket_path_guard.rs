//! Binding never clobbers a file that is not a socket.

use std::os::unix::fs::FileTypeExt;

use ecm_daemon::protocol::{ProtocolError, ProtocolServer, ServerConfig};
use tempfile::TempDir;

#[tokio::test]
async fn regular_file_at_socket_path_is_left_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("appops.db");
    std::fs::write(&path, b"precious data").unwrap();

    let err = ProtocolServer::bind(ServerConfig::new(&path, 0o600)).unwrap_err();
    match err {
        ProtocolError::Io(io) => assert_eq!(io.kind(), std::io::ErrorKind::AlreadyExists),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(std::fs::read(&path).unwrap(), b"precious data");
}

#[tokio::test]
async fn stale_socket_is_replaced() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ecm.sock");
    drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
    assert!(std::fs::symlink_metadata(&path).unwrap().file_type().is_socket());

    let server = ProtocolServer::bind(ServerConfig::new(&path, 0o600)).unwrap();
    assert_eq!(server.socket_path(), path.as_path());
}

#[tokio::test]
async fn symlink_at_socket_path_is_not_followed() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("target");
    std::fs::write(&target, b"keep").unwrap();
    let path = dir.path().join("ecm.sock");
    std::os::unix::fs::symlink(&target, &path).unwrap();

    assert!(ProtocolServer::bind(ServerConfig::new(&path, 0o600)).is_err());
    assert!(std::fs::symlink_metadata(&path).unwrap().file_type().is_symlink());
    assert_eq!(std::fs::read(&target).unwrap(), b"keep");
}
