//! Message key derivation
//!
//! Per-direction message keys are derived from the session master key and the
//! session identity with HKDF-SHA256. The client's outgoing key is the
//! server's incoming key and vice versa, so both ends of a channel derive a
//! matching pair from the same master key.
//!
//! [`KeyDerivation`] is the seam between session persistence and the
//! derivation routine. Its contract includes a side effect: deriving keys
//! resets the context's sequence counters to zero, since fresh message keys
//! start a fresh counter space.

use crate::error::{constants, Result, SessionError};
use crate::session::context::SessionContext;
use hkdf::Hkdf;
use sha2::Sha256;
use tracing::{debug, instrument};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Label mixed into every message key derivation
const MESSAGE_KEY_LABEL: &[u8] = b"SessionMessageKeyV1";

const CLIENT_TO_SERVER: &[u8] = b"client->server";
const SERVER_TO_CLIENT: &[u8] = b"server->client";

/// Length of a derived message key
pub const MESSAGE_KEY_LENGTH: usize = 32;

/// Derived per-direction keys, zeroed on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MessageKeys {
    outgoing: [u8; MESSAGE_KEY_LENGTH],
    incoming: [u8; MESSAGE_KEY_LENGTH],
}

impl MessageKeys {
    /// Derive the key pair for one end of a session.
    ///
    /// Pure: depends only on its inputs and touches no counters.
    pub fn derive(master_key: &[u8], session_id: u32, is_client: bool) -> Result<Self> {
        let hkdf = Hkdf::<Sha256>::new(None, master_key);

        let c2s = expand(&hkdf, session_id, CLIENT_TO_SERVER)?;
        let s2c = expand(&hkdf, session_id, SERVER_TO_CLIENT)?;

        let (outgoing, incoming) = if is_client { (c2s, s2c) } else { (s2c, c2s) };
        Ok(Self { outgoing, incoming })
    }

    pub fn outgoing(&self) -> &[u8; MESSAGE_KEY_LENGTH] {
        &self.outgoing
    }

    pub fn incoming(&self) -> &[u8; MESSAGE_KEY_LENGTH] {
        &self.incoming
    }
}

impl std::fmt::Debug for MessageKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MessageKeys([REDACTED])")
    }
}

/// Expand one directional key: label || session_id || direction
fn expand(
    hkdf: &Hkdf<Sha256>,
    session_id: u32,
    direction: &[u8],
) -> Result<[u8; MESSAGE_KEY_LENGTH]> {
    let mut info = Vec::with_capacity(MESSAGE_KEY_LABEL.len() + 4 + direction.len());
    info.extend_from_slice(MESSAGE_KEY_LABEL);
    info.extend_from_slice(&session_id.to_be_bytes());
    info.extend_from_slice(direction);

    let mut key = [0u8; MESSAGE_KEY_LENGTH];
    hkdf.expand(&info, &mut key)
        .map_err(|_| SessionError::KeyDerivationFailed(constants::ERR_HKDF_EXPAND.into()))?;
    Ok(key)
}

/// Installs message keys into a session context.
///
/// On success an implementation must leave the context with freshly derived
/// keys and must reset `out_seq` and `in_seq` to zero. Callers restoring a
/// saved session therefore write persisted counters only after derivation.
pub trait KeyDerivation {
    fn derive_message_keys(&self, session: &mut SessionContext) -> Result<()>;
}

/// HKDF-SHA256 derivation from the session master key
#[derive(Debug, Clone, Copy, Default)]
pub struct HkdfKeyDerivation;

impl KeyDerivation for HkdfKeyDerivation {
    #[instrument(skip_all, fields(session_id = session.session_id))]
    fn derive_message_keys(&self, session: &mut SessionContext) -> Result<()> {
        let keys = MessageKeys::derive(
            session.master_key().as_bytes(),
            session.session_id,
            session.is_client,
        )?;
        session.install_message_keys(keys);
        session.out_seq = 0;
        session.in_seq = 0;
        debug!("Message keys derived, sequence counters reset");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::context::MasterKey;

    #[test]
    fn test_derive_is_deterministic() {
        let master = [7u8; 32];
        let a = MessageKeys::derive(&master, 9, true).unwrap();
        let b = MessageKeys::derive(&master, 9, true).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_client_and_server_keys_mirror() {
        let master = [7u8; 32];
        let client = MessageKeys::derive(&master, 9, true).unwrap();
        let server = MessageKeys::derive(&master, 9, false).unwrap();
        assert_eq!(client.outgoing(), server.incoming());
        assert_eq!(client.incoming(), server.outgoing());
        assert_ne!(client.outgoing(), client.incoming());
    }

    #[test]
    fn test_session_id_separates_keys() {
        let master = [7u8; 32];
        let a = MessageKeys::derive(&master, 1, true).unwrap();
        let b = MessageKeys::derive(&master, 2, true).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_master_key_separates_keys() {
        let a = MessageKeys::derive(&[1u8; 32], 1, true).unwrap();
        let b = MessageKeys::derive(&[2u8; 32], 1, true).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_hkdf_derivation_resets_counters() {
        let mut session = SessionContext::established(5, true, MasterKey::new([3u8; 32]));
        session.out_seq = 11;
        session.in_seq = 12;

        HkdfKeyDerivation.derive_message_keys(&mut session).unwrap();

        assert_eq!(session.out_seq, 0);
        assert_eq!(session.in_seq, 0);
        assert!(session.message_keys().is_some());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let keys = MessageKeys::derive(&[1u8; 32], 1, true).unwrap();
        assert_eq!(format!("{keys:?}"), "MessageKeys([REDACTED])");
    }
}
