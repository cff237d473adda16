//! Session context: the live state of one secure channel.
//!
//! A context is created by the handshake, may be saved any number of times
//! once key agreement has completed, and can be rebuilt from a saved blob by
//! [`load`](crate::session::load). Secret material is zeroed whenever the
//! context is cleared or dropped.

use crate::core::layout::MASTER_KEY_LENGTH;
use crate::error::{constants, Result, SessionError};
use crate::session::handshake::PendingHandshake;
use crate::session::keys::MessageKeys;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Long-term shared secret negotiated during the handshake
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; MASTER_KEY_LENGTH]);

impl MasterKey {
    pub fn new(bytes: [u8; MASTER_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Copy a key from a slice of exactly [`MASTER_KEY_LENGTH`] bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != MASTER_KEY_LENGTH {
            return Err(SessionError::InvalidParameter(constants::ERR_FIELD_BOUNDS));
        }
        let mut key = Self::default();
        key.0.copy_from_slice(bytes);
        Ok(key)
    }

    pub fn as_bytes(&self) -> &[u8; MASTER_KEY_LENGTH] {
        &self.0
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// State of one secure channel
///
/// `session_id`, `is_client` and the two sequence counters are plain data.
/// The master key, derived message keys and any in-progress handshake are
/// reachable only through methods so they cannot be copied out by accident.
#[derive(Default)]
pub struct SessionContext {
    /// Identifier shared by both peers, opaque to persistence
    pub session_id: u32,
    /// Whether this end initiated the handshake
    pub is_client: bool,
    master_key: MasterKey,
    /// Next sequence number to send
    pub out_seq: u32,
    /// Next sequence number expected from the peer
    pub in_seq: u32,
    message_keys: Option<MessageKeys>,
    pub(crate) handshake: Option<PendingHandshake>,
}

impl SessionContext {
    /// Build a context for a session whose key agreement happened elsewhere.
    ///
    /// No message keys are installed; run a [`KeyDerivation`](crate::session::KeyDerivation)
    /// before using the context for messages.
    pub fn established(session_id: u32, is_client: bool, master_key: MasterKey) -> Self {
        Self {
            session_id,
            is_client,
            master_key,
            ..Self::default()
        }
    }

    /// Context for a session whose handshake step `pending` is still open
    pub(crate) fn negotiating(session_id: u32, is_client: bool, pending: PendingHandshake) -> Self {
        Self {
            session_id,
            is_client,
            handshake: Some(pending),
            ..Self::default()
        }
    }

    /// True iff no handshake step is pending
    pub fn is_handshake_complete(&self) -> bool {
        self.handshake.is_none()
    }

    pub fn master_key(&self) -> &MasterKey {
        &self.master_key
    }

    pub(crate) fn set_master_key(&mut self, key: MasterKey) {
        self.master_key = key;
    }

    /// Derived message keys, if derivation has run
    pub fn message_keys(&self) -> Option<&MessageKeys> {
        self.message_keys.as_ref()
    }

    /// Replace the derived message keys. Used by key derivation routines.
    pub fn install_message_keys(&mut self, keys: MessageKeys) {
        self.message_keys = Some(keys);
    }

    /// Reset every field to zero, dropping (and thereby zeroing) all secrets
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("session_id", &self.session_id)
            .field("is_client", &self.is_client)
            .field("master_key", &self.master_key)
            .field("out_seq", &self.out_seq)
            .field("in_seq", &self.in_seq)
            .field("has_message_keys", &self.message_keys.is_some())
            .field("handshake_complete", &self.is_handshake_complete())
            .finish()
    }
}
