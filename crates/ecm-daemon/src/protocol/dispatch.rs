//! Request dispatch.
//!
//! Turns one decoded frame into one encoded response frame. The service
//! call runs synchronously inside a [`CallingScope`] carrying the peer's
//! identity, so the scope never crosses an `.await`.

use std::sync::Arc;

use bytes::Bytes;
use ecm_core::identity::CallingScope;
use tracing::{debug, warn};

use super::credentials::PeerCredentials;
use super::messages::{EcmRequest, EcmResponse, ErrorCode};
use crate::service::EnhancedConfirmationService;

/// Per-connection state handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    peer_credentials: PeerCredentials,
    connection_id: u64,
}

impl ConnectionContext {
    /// Context for a connection from `peer_credentials`.
    #[must_use]
    pub const fn new(peer_credentials: PeerCredentials, connection_id: u64) -> Self {
        Self {
            peer_credentials,
            connection_id,
        }
    }

    /// Credentials of the peer.
    #[must_use]
    pub const fn peer_credentials(&self) -> &PeerCredentials {
        &self.peer_credentials
    }

    /// Server-assigned connection number.
    #[must_use]
    pub const fn connection_id(&self) -> u64 {
        self.connection_id
    }
}

/// Routes requests to the service.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    service: Arc<EnhancedConfirmationService>,
}

impl RequestDispatcher {
    /// Creates a dispatcher for `service`.
    #[must_use]
    pub const fn new(service: Arc<EnhancedConfirmationService>) -> Self {
        Self { service }
    }

    /// Decodes `frame`, runs the request as the peer and encodes the
    /// response.
    pub fn dispatch_frame(&self, ctx: &ConnectionContext, frame: &[u8]) -> Bytes {
        let response = match serde_json::from_slice::<EcmRequest>(frame) {
            Ok(request) => self.dispatch(ctx, &request),
            Err(err) => {
                warn!(
                    connection_id = ctx.connection_id,
                    error = %err,
                    "malformed request"
                );
                EcmResponse::error(ErrorCode::MalformedRequest, err.to_string())
            },
        };
        encode_response(&response)
    }

    /// Runs `request` with the peer as calling identity.
    pub fn dispatch(&self, ctx: &ConnectionContext, request: &EcmRequest) -> EcmResponse {
        let _scope = CallingScope::enter(ctx.peer_credentials.identity());
        debug!(
            connection_id = ctx.connection_id,
            uid = ctx.peer_credentials.uid,
            method = request.method(),
            "dispatching request"
        );
        let service = &self.service;
        let result = match request {
            EcmRequest::IsRestricted {
                package_name,
                setting,
                user_id,
            } => service
                .is_restricted(package_name, setting, *user_id)
                .map(EcmResponse::value),
            EcmRequest::ClearRestriction {
                package_name,
                user_id,
            } => service
                .clear_restriction(package_name, *user_id)
                .map(|()| EcmResponse::done()),
            EcmRequest::IsClearRestrictionAllowed {
                package_name,
                user_id,
            } => service
                .is_clear_restriction_allowed(package_name, *user_id)
                .map(EcmResponse::value),
            EcmRequest::SetClearRestrictionAllowed {
                package_name,
                user_id,
            } => service
                .set_clear_restriction_allowed(package_name, *user_id)
                .map(|()| EcmResponse::done()),
        };
        result.unwrap_or_else(|err| EcmResponse::from(&err))
    }
}

const ENCODING_FAILED: &[u8] =
    br#"{"status":"error","code":"internal","message":"encoding failed"}"#;

fn encode_response(response: &EcmResponse) -> Bytes {
    // Serializing these types cannot fail.
    serde_json::to_vec(response).map_or_else(|_| Bytes::from_static(ENCODING_FAILED), Bytes::from)
}
