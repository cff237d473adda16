//! Per-message protection for an established session.
//!
//! Messages are encrypted with XChaCha20-Poly1305 under the direction's
//! derived key. The 24-byte nonce binds the session id, the direction and the
//! sequence number, so every (key, nonce) pair is used at most once as long
//! as the counters only move forward.
//!
//! ## Wire Format
//! ```text
//! [Seq(4, BE)] [Ciphertext + Tag(N + 16)]
//! ```
//!
//! Receivers accept strictly in order: a message is opened only if its
//! sequence number equals `in_seq`.

use crate::core::layout::{get_u32_be, put_u32_be};
use crate::error::{constants, Result, SessionError};
use crate::session::context::SessionContext;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use tracing::{instrument, trace, warn};

const SEQ_PREFIX_LENGTH: usize = 4;
const NONCE_LENGTH: usize = 24;

const DIRECTION_CLIENT_TO_SERVER: u8 = 0;
const DIRECTION_SERVER_TO_CLIENT: u8 = 1;

/// Build the nonce for one message: session_id || direction || zeros || seq
fn message_nonce(session_id: u32, direction: u8, seq: u32) -> [u8; NONCE_LENGTH] {
    let mut nonce = [0u8; NONCE_LENGTH];
    nonce[..4].copy_from_slice(&session_id.to_be_bytes());
    nonce[4] = direction;
    nonce[NONCE_LENGTH - 4..].copy_from_slice(&seq.to_be_bytes());
    nonce
}

impl SessionContext {
    fn outgoing_direction(&self) -> u8 {
        if self.is_client {
            DIRECTION_CLIENT_TO_SERVER
        } else {
            DIRECTION_SERVER_TO_CLIENT
        }
    }

    fn incoming_direction(&self) -> u8 {
        if self.is_client {
            DIRECTION_SERVER_TO_CLIENT
        } else {
            DIRECTION_CLIENT_TO_SERVER
        }
    }

    /// Encrypt `plaintext` as the next outgoing message and advance `out_seq`.
    ///
    /// # Errors
    /// - `InvalidParameter` if no message keys have been derived
    /// - `SequenceExhausted` if `out_seq` cannot advance without reuse
    #[instrument(skip_all, fields(session_id = self.session_id, seq = self.out_seq))]
    pub fn seal(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let keys = self
            .message_keys()
            .ok_or(SessionError::InvalidParameter(constants::ERR_NOT_ESTABLISHED))?;
        if self.out_seq == u32::MAX {
            return Err(SessionError::SequenceExhausted);
        }

        let seq = self.out_seq;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(keys.outgoing()));
        let nonce = message_nonce(self.session_id, self.outgoing_direction(), seq);
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|_| SessionError::EncryptionFailure)?;

        let mut message = vec![0u8; SEQ_PREFIX_LENGTH];
        put_u32_be(&mut message, seq)?;
        message.extend_from_slice(&ciphertext);

        self.out_seq += 1;
        trace!(len = message.len(), "Message sealed");
        Ok(message)
    }

    /// Decrypt the next incoming message and advance `in_seq`.
    ///
    /// # Errors
    /// - `InvalidParameter` if no message keys have been derived or the
    ///   message is too short to carry a sequence number
    /// - `SequenceMismatch` if the message is not the next one expected
    /// - `DecryptionFailure` if authentication fails
    #[instrument(skip_all, fields(session_id = self.session_id, seq = self.in_seq))]
    pub fn open(&mut self, message: &[u8]) -> Result<Vec<u8>> {
        let keys = self
            .message_keys()
            .ok_or(SessionError::InvalidParameter(constants::ERR_NOT_ESTABLISHED))?;
        if message.len() < SEQ_PREFIX_LENGTH {
            return Err(SessionError::InvalidParameter(
                constants::ERR_MESSAGE_TOO_SHORT,
            ));
        }
        if self.in_seq == u32::MAX {
            return Err(SessionError::SequenceExhausted);
        }

        let (prefix, ciphertext) = message.split_at(SEQ_PREFIX_LENGTH);
        let received = get_u32_be(prefix)?;
        if received != self.in_seq {
            warn!(expected = self.in_seq, received, "Out-of-order or replayed message");
            return Err(SessionError::SequenceMismatch {
                expected: self.in_seq,
                received,
            });
        }

        let cipher = XChaCha20Poly1305::new(Key::from_slice(keys.incoming()));
        let nonce = message_nonce(self.session_id, self.incoming_direction(), received);
        let plaintext = cipher
            .decrypt(XNonce::from_slice(&nonce), ciphertext)
            .map_err(|_| SessionError::DecryptionFailure)?;

        self.in_seq += 1;
        trace!(len = plaintext.len(), "Message opened");
        Ok(plaintext)
    }
}
