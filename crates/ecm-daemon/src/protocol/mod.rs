//! Unix socket protocol.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        EcmRequest / EcmResponse          │  JSON (messages)
//! ├─────────────────────────────────────────┤
//! │   RequestDispatcher + CallingScope       │  peer uid/pid (dispatch)
//! ├─────────────────────────────────────────┤
//! │               Framing                    │  Length-prefixed
//! ├─────────────────────────────────────────┤
//! │            UDS Transport                 │  Unix socket
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Wire Format
//!
//! ```text
//! +----------------------------+------------------+
//! | Length (4 bytes, BE)       | JSON payload     |
//! +----------------------------+------------------+
//! ```
//!
//! - Maximum frame size: 64 KiB
//! - One response frame per request frame, in order
//!
//! # Security Considerations
//!
//! - Frame size validated before allocation
//! - Caller identity comes from `SO_PEERCRED`, never from the payload

pub mod client;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod framing;
pub mod messages;
pub mod server;

pub use client::EcmClient;
pub use credentials::PeerCredentials;
pub use dispatch::{ConnectionContext, RequestDispatcher};
pub use error::{MAX_FRAME_SIZE, ProtocolError, ProtocolResult};
pub use framing::FrameCodec;
pub use messages::{EcmRequest, EcmResponse, ErrorCode};
pub use server::{ProtocolServer, ServerConfig};
