//! Key agreement producing an established session, using Elliptic Curve
//! Diffie-Hellman (x25519-dalek) with nonce confirmation.
//!
//! The handshake state lives inside the [`SessionContext`] being negotiated,
//! so each connection carries its own state and a context is never
//! considered established while a step is pending.
//!
//! ```text
//! client                                   server
//!   client_start()  --- HandshakeInit --->    server_accept()
//!   client_finish() <-- HandshakeResponse --
//!                   --- HandshakeConfirm ->    server_finish()
//! ```
//!
//! Both ends finish with the same master key, derived message keys and
//! zeroed sequence counters.

use crate::error::{constants, Result, SessionError};
use crate::session::context::{MasterKey, SessionContext};
use crate::session::keys::{HkdfKeyDerivation, KeyDerivation};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};
use x25519_dalek::{EphemeralSecret, PublicKey, SharedSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// First message, client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeInit {
    pub session_id: u32,
    pub pub_key: [u8; 32],
    pub nonce: [u8; 16],
}

/// Server reply, proving receipt of the client nonce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    pub pub_key: [u8; 32],
    pub nonce: [u8; 16],
    pub nonce_verification: [u8; 32],
}

/// Final client message, proving receipt of the server nonce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeConfirm {
    pub nonce_verification: [u8; 32],
}

/// Ephemeral state of an unfinished handshake, zeroed on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PendingHandshake {
    secret: Option<EphemeralSecret>,
    peer_public: Option<[u8; 32]>,
    client_nonce: [u8; 16],
    server_nonce: Option<[u8; 16]>,
}

/// Generate a cryptographically secure random nonce
fn generate_nonce() -> [u8; 16] {
    let mut nonce = [0u8; 16];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Compute hash of a nonce for verification
fn hash_nonce(nonce: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.finalize().into()
}

/// Derive the session master key from the shared secret and both nonces
fn derive_master_key(
    shared_secret: &SharedSecret,
    client_nonce: &[u8],
    server_nonce: &[u8],
) -> MasterKey {
    let mut hasher = Sha256::new();

    hasher.update(shared_secret.as_bytes());

    // Order matters for domain separation
    hasher.update(b"client_nonce");
    hasher.update(client_nonce);
    hasher.update(b"server_nonce");
    hasher.update(server_nonce);

    MasterKey::new(hasher.finalize().into())
}

impl SessionContext {
    /// Begin a handshake as the client.
    ///
    /// The returned context is negotiating until [`client_finish`](Self::client_finish)
    /// succeeds.
    #[instrument]
    pub fn client_start(session_id: u32) -> (Self, HandshakeInit) {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        let nonce = generate_nonce();

        let session = Self::negotiating(
            session_id,
            true,
            PendingHandshake {
                secret: Some(secret),
                peer_public: None,
                client_nonce: nonce,
                server_nonce: None,
            },
        );

        debug!("Client initiating handshake");

        (
            session,
            HandshakeInit {
                session_id,
                pub_key: public.to_bytes(),
                nonce,
            },
        )
    }

    /// Answer a client's [`HandshakeInit`] as the server.
    ///
    /// The returned context is negotiating until [`server_finish`](Self::server_finish)
    /// succeeds.
    #[instrument(skip(init), fields(session_id = init.session_id))]
    pub fn server_accept(init: &HandshakeInit) -> (Self, HandshakeResponse) {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        let server_nonce = generate_nonce();

        let session = Self::negotiating(
            init.session_id,
            false,
            PendingHandshake {
                secret: Some(secret),
                peer_public: Some(init.pub_key),
                client_nonce: init.nonce,
                server_nonce: Some(server_nonce),
            },
        );

        debug!("Server responding to handshake initiation");

        (
            session,
            HandshakeResponse {
                pub_key: public.to_bytes(),
                nonce: server_nonce,
                nonce_verification: hash_nonce(&init.nonce),
            },
        )
    }

    /// Verify the server's response, establish the session and produce the
    /// confirmation for the server.
    ///
    /// # Errors
    /// Returns `SessionError::HandshakeError` if this is not a negotiating
    /// client or the server failed to prove receipt of the client nonce. The
    /// context stays negotiating on failure.
    #[instrument(skip_all, fields(session_id = self.session_id))]
    pub fn client_finish(&mut self, response: &HandshakeResponse) -> Result<HandshakeConfirm> {
        if !self.is_client {
            return Err(SessionError::HandshakeError(constants::ERR_WRONG_ROLE.into()));
        }
        let pending = self.handshake.as_ref().ok_or_else(|| {
            SessionError::HandshakeError(constants::ERR_NO_PENDING_HANDSHAKE.into())
        })?;

        if hash_nonce(&pending.client_nonce) != response.nonce_verification {
            warn!("Server nonce verification mismatch");
            return Err(SessionError::HandshakeError(
                constants::ERR_NONCE_VERIFICATION_FAILED.into(),
            ));
        }

        let mut pending = self.take_pending()?;
        let secret = pending.secret.take().ok_or_else(|| {
            SessionError::HandshakeError(constants::ERR_CLIENT_SECRET_NOT_FOUND.into())
        })?;

        let shared_secret = secret.diffie_hellman(&PublicKey::from(response.pub_key));
        let master_key = derive_master_key(&shared_secret, &pending.client_nonce, &response.nonce);
        self.establish(master_key)?;

        debug!("Client verified server response and established session");

        Ok(HandshakeConfirm {
            nonce_verification: hash_nonce(&response.nonce),
        })
    }

    /// Verify the client's confirmation and establish the session.
    ///
    /// # Errors
    /// Returns `SessionError::HandshakeError` if this is not a negotiating
    /// server or the client failed to prove receipt of the server nonce.
    #[instrument(skip_all, fields(session_id = self.session_id))]
    pub fn server_finish(&mut self, confirm: &HandshakeConfirm) -> Result<()> {
        if self.is_client {
            return Err(SessionError::HandshakeError(constants::ERR_WRONG_ROLE.into()));
        }
        let pending = self.handshake.as_ref().ok_or_else(|| {
            SessionError::HandshakeError(constants::ERR_NO_PENDING_HANDSHAKE.into())
        })?;
        let server_nonce = pending.server_nonce.ok_or_else(|| {
            SessionError::HandshakeError(constants::ERR_NO_PENDING_HANDSHAKE.into())
        })?;

        if hash_nonce(&server_nonce) != confirm.nonce_verification {
            warn!("Client nonce verification mismatch");
            return Err(SessionError::HandshakeError(
                constants::ERR_SERVER_VERIFICATION_FAILED.into(),
            ));
        }

        let mut pending = self.take_pending()?;
        let secret = pending.secret.take().ok_or_else(|| {
            SessionError::HandshakeError(constants::ERR_SERVER_SECRET_NOT_FOUND.into())
        })?;
        let client_public = pending.peer_public.ok_or_else(|| {
            SessionError::HandshakeError(constants::ERR_NO_PENDING_HANDSHAKE.into())
        })?;

        let shared_secret = secret.diffie_hellman(&PublicKey::from(client_public));
        let master_key = derive_master_key(&shared_secret, &pending.client_nonce, &server_nonce);
        self.establish(master_key)?;

        debug!("Server verified client confirmation and established session");
        Ok(())
    }

    fn take_pending(&mut self) -> Result<PendingHandshake> {
        self.handshake.take().ok_or_else(|| {
            SessionError::HandshakeError(constants::ERR_NO_PENDING_HANDSHAKE.into())
        })
    }

    /// Install the master key and derive message keys; counters start at zero
    fn establish(&mut self, master_key: MasterKey) -> Result<()> {
        self.set_master_key(master_key);
        HkdfKeyDerivation.derive_message_keys(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn run_handshake(session_id: u32) -> (SessionContext, SessionContext) {
        let (mut client, init) = SessionContext::client_start(session_id);
        let (mut server, response) = SessionContext::server_accept(&init);
        let confirm = client.client_finish(&response).unwrap();
        server.server_finish(&confirm).unwrap();
        (client, server)
    }

    #[test]
    fn test_handshake_agrees_on_master_key() {
        let (client, server) = run_handshake(77);
        assert_eq!(client.master_key(), server.master_key());
        assert_eq!(client.session_id, 77);
        assert_eq!(server.session_id, 77);
        assert!(client.is_client);
        assert!(!server.is_client);
    }

    #[test]
    fn test_handshake_establishes_both_ends() {
        let (client, server) = run_handshake(1);
        assert!(client.is_handshake_complete());
        assert!(server.is_handshake_complete());

        let client_keys = client.message_keys().unwrap();
        let server_keys = server.message_keys().unwrap();
        assert_eq!(client_keys.outgoing(), server_keys.incoming());
        assert_eq!(client_keys.incoming(), server_keys.outgoing());
        assert_eq!((client.out_seq, client.in_seq), (0, 0));
    }

    #[test]
    fn test_started_contexts_are_negotiating() {
        let (client, init) = SessionContext::client_start(12);
        assert_eq!(client.session_id, 12);
        assert!(client.is_client);
        assert!(client.message_keys().is_none());
        assert_eq!(client.master_key().as_bytes(), &[0u8; 32]);
        assert_eq!((client.out_seq, client.in_seq), (0, 0));

        let (server, _response) = SessionContext::server_accept(&init);
        assert_eq!(server.session_id, 12);
        assert!(!server.is_client);
        assert!(server.message_keys().is_none());
        assert!(!server.is_handshake_complete());
    }

    #[test]
    fn test_pending_until_finished() {
        let (mut client, init) = SessionContext::client_start(3);
        assert!(!client.is_handshake_complete());

        let (mut server, response) = SessionContext::server_accept(&init);
        assert!(!server.is_handshake_complete());

        let confirm = client.client_finish(&response).unwrap();
        assert!(client.is_handshake_complete());
        assert!(!server.is_handshake_complete());

        server.server_finish(&confirm).unwrap();
        assert!(server.is_handshake_complete());
    }

    #[test]
    fn test_separate_handshakes_produce_different_keys() {
        let (a, _) = run_handshake(1);
        let (b, _) = run_handshake(1);
        assert_ne!(a.master_key(), b.master_key());
    }

    #[test]
    fn test_bad_response_verification_keeps_client_pending() {
        let (mut client, init) = SessionContext::client_start(3);
        let (_server, mut response) = SessionContext::server_accept(&init);
        response.nonce_verification[0] ^= 0xFF;

        match client.client_finish(&response) {
            Err(SessionError::HandshakeError(msg)) => {
                assert_eq!(msg, constants::ERR_NONCE_VERIFICATION_FAILED)
            }
            other => panic!("Unexpected result: {other:?}"),
        }
        assert!(!client.is_handshake_complete());
    }

    #[test]
    fn test_bad_confirm_rejected() {
        let (mut client, init) = SessionContext::client_start(3);
        let (mut server, response) = SessionContext::server_accept(&init);
        let mut confirm = client.client_finish(&response).unwrap();
        confirm.nonce_verification[31] ^= 0x01;

        assert!(server.server_finish(&confirm).is_err());
        assert!(!server.is_handshake_complete());
    }

    #[test]
    fn test_wrong_role_rejected() {
        let (mut client, init) = SessionContext::client_start(3);
        let (mut server, response) = SessionContext::server_accept(&init);

        assert!(server.client_finish(&response).is_err());
        let confirm = client.client_finish(&response).unwrap();
        assert!(client.server_finish(&confirm).is_err());
    }

    #[test]
    fn test_finish_twice_rejected() {
        let (mut client, init) = SessionContext::client_start(3);
        let (_server, response) = SessionContext::server_accept(&init);
        client.client_finish(&response).unwrap();

        assert!(matches!(
            client.client_finish(&response),
            Err(SessionError::HandshakeError(_))
        ));
    }
}
