//! # Session State Serializer
//!
//! Saves an established [`SessionContext`] into a checksummed container and
//! restores it later without repeating key agreement.
//!
//! ## Save
//! Two-phase size protocol: call with no buffer (or a short one) to learn the
//! required size from `SessionError::BufferTooSmall { required }`, allocate,
//! then call again. Nothing is written unless the whole container is.
//!
//! ## Load
//! Order matters:
//! 1. Bound the input by the container header and declared size
//! 2. Verify the checksum before trusting any field
//! 3. Clear the destination
//! 4. Read identity and master key
//! 5. Derive message keys, which resets the sequence counters
//! 6. Write the persisted sequence counters last, so they win over step 5
//!
//! On any failure after step 3 the destination is cleared again.
//!
//! ## Usage
//! ```rust
//! use secure_session_state::error::SessionError;
//! use secure_session_state::session::{load, save, MasterKey, SessionContext};
//!
//! let mut session = SessionContext::established(42, true, MasterKey::new([0u8; 32]));
//! session.out_seq = 7;
//! session.in_seq = 3;
//!
//! let required = match save(&session, None) {
//!     Err(SessionError::BufferTooSmall { required }) => required,
//!     other => panic!("unexpected: {other:?}"),
//! };
//! let mut blob = vec![0u8; required];
//! save(&session, Some(&mut blob)).unwrap();
//!
//! let mut restored = SessionContext::default();
//! load(&mut restored, &blob).unwrap();
//! assert_eq!((restored.out_seq, restored.in_seq), (7, 3));
//! ```

use crate::config::PersistenceConfig;
use crate::core::container::{Container, ContainerMut, HEADER_SIZE, TAG_LENGTH};
use crate::core::layout::{Field, FieldReader, FieldWriter, PAYLOAD_SIZE};
use crate::error::{constants, Result, SessionError};
use crate::session::context::{MasterKey, SessionContext};
use crate::session::keys::{HkdfKeyDerivation, KeyDerivation};
use crate::utils::metrics::{global_metrics, Timer};
use tracing::{debug, instrument, trace};
use zeroize::Zeroizing;

/// Tag marking a container as saved session state
pub const SESSION_CONTEXT_TAG: [u8; TAG_LENGTH] = *b"TSSC";

/// Exact size of a saved session: container header plus fixed payload
pub const SERIALIZED_SIZE: usize = HEADER_SIZE + PAYLOAD_SIZE;

const ROLE_SERVER: u32 = 0;
const ROLE_CLIENT: u32 = 1;

/// Bytes needed to save any session
pub const fn serialized_size() -> usize {
    SERIALIZED_SIZE
}

fn decode_role(raw: u32) -> Result<bool> {
    match raw {
        ROLE_CLIENT => Ok(true),
        ROLE_SERVER => Ok(false),
        _ => Err(SessionError::InvalidParameter(constants::ERR_INVALID_ROLE)),
    }
}

/// Saves and loads session state with a chosen key derivation routine
#[derive(Debug, Clone)]
pub struct SessionSerializer<D: KeyDerivation = HkdfKeyDerivation> {
    derivation: D,
    config: PersistenceConfig,
}

impl Default for SessionSerializer<HkdfKeyDerivation> {
    fn default() -> Self {
        Self::new(HkdfKeyDerivation)
    }
}

impl<D: KeyDerivation> SessionSerializer<D> {
    /// Serializer with default persistence settings
    pub fn new(derivation: D) -> Self {
        Self {
            derivation,
            config: PersistenceConfig::default(),
        }
    }

    /// Serializer with explicit persistence settings
    ///
    /// # Errors
    /// Returns `SessionError::ConfigError` if `config` fails validation
    pub fn with_config(derivation: D, config: PersistenceConfig) -> Result<Self> {
        config.validate_strict()?;
        Ok(Self { derivation, config })
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    /// Duration timer for `operation`, only when metrics are enabled
    fn timer(&self, operation: &'static str) -> Option<Timer> {
        self.config.metrics_enabled.then(|| Timer::start(operation))
    }

    /// Save `session` into `out`, returning the exact number of bytes written.
    ///
    /// # Errors
    /// - `InvalidParameter` if the session is still negotiating
    /// - `BufferTooSmall { required }` if `out` is `None` or shorter than
    ///   [`SERIALIZED_SIZE`]; nothing is written
    #[instrument(skip_all, fields(session_id = session.session_id))]
    pub fn save(&self, session: &SessionContext, out: Option<&mut [u8]>) -> Result<usize> {
        let _timer = self.timer("session_save");
        if self.config.metrics_enabled {
            global_metrics().save_attempt();
        }

        let result = self.save_inner(session, out);
        if self.config.metrics_enabled {
            let metrics = global_metrics();
            match &result {
                Ok(_) => metrics.save_success(),
                Err(SessionError::BufferTooSmall { .. }) => metrics.size_query(),
                Err(err) => metrics.failure(err),
            }
        }
        result
    }

    fn save_inner(&self, session: &SessionContext, out: Option<&mut [u8]>) -> Result<usize> {
        if !session.is_handshake_complete() {
            return Err(SessionError::InvalidParameter(
                constants::ERR_HANDSHAKE_PENDING,
            ));
        }

        let out = match out {
            Some(buf) if buf.len() >= SERIALIZED_SIZE => buf,
            _ => {
                trace!(required = SERIALIZED_SIZE, "Save size query");
                return Err(SessionError::BufferTooSmall {
                    required: SERIALIZED_SIZE,
                });
            }
        };

        // Build off to the side so a failure leaves `out` untouched
        let mut staging = Zeroizing::new([0u8; SERIALIZED_SIZE]);
        let mut container = ContainerMut::new(&mut staging[..])?;
        container.write_tag(&SESSION_CONTEXT_TAG);
        container.set_payload_size(PAYLOAD_SIZE)?;

        let mut writer = FieldWriter::new(container.payload_mut()?);
        writer.put_u32(Field::SessionId, session.session_id)?;
        writer.put_u32(
            Field::IsClient,
            if session.is_client {
                ROLE_CLIENT
            } else {
                ROLE_SERVER
            },
        )?;
        writer.put_bytes(Field::MasterKey, session.master_key().as_bytes())?;
        writer.put_u32(Field::OutSeq, session.out_seq)?;
        writer.put_u32(Field::InSeq, session.in_seq)?;

        container.update_checksum()?;

        out[..SERIALIZED_SIZE].copy_from_slice(&staging[..]);

        debug!(bytes = SERIALIZED_SIZE, "Session state saved");
        Ok(SERIALIZED_SIZE)
    }

    /// Save `session` into a freshly allocated buffer that is zeroed on drop
    pub fn save_to_vec(&self, session: &SessionContext) -> Result<Zeroizing<Vec<u8>>> {
        let mut buf = Zeroizing::new(vec![0u8; SERIALIZED_SIZE]);
        let written = self.save(session, Some(&mut buf[..]))?;
        buf.truncate(written);
        Ok(buf)
    }

    /// Restore `dest` from a saved container.
    ///
    /// On success `dest` is established with derived message keys and the
    /// persisted sequence counters. On failure `dest` holds no secrets and
    /// must not be used; a fresh handshake is required.
    ///
    /// # Errors
    /// - `InvalidParameter` if the input is shorter than the header or the
    ///   declared container, exceeds the configured maximum, or (after a
    ///   valid checksum) is not a session container of the expected layout
    /// - `IntegrityCheckFailed` if the checksum does not match
    /// - any error returned by the key derivation routine
    #[instrument(skip_all, fields(input_len = input.len()))]
    pub fn load(&self, dest: &mut SessionContext, input: &[u8]) -> Result<()> {
        let _timer = self.timer("session_load");
        if self.config.metrics_enabled {
            global_metrics().load_attempt();
        }

        let result = self.load_inner(dest, input);
        if self.config.metrics_enabled {
            let metrics = global_metrics();
            match &result {
                Ok(()) => metrics.load_success(),
                Err(err) => metrics.failure(err),
            }
        }
        result
    }

    fn load_inner(&self, dest: &mut SessionContext, input: &[u8]) -> Result<()> {
        let container = Container::parse(input)?;
        if container.total_size() > self.config.max_blob_size {
            return Err(SessionError::InvalidParameter(
                constants::ERR_INPUT_TOO_LARGE,
            ));
        }

        container.verify_checksum()?;

        if container.tag() != SESSION_CONTEXT_TAG {
            return Err(SessionError::InvalidParameter(constants::ERR_UNKNOWN_TAG));
        }
        if container.declared_payload_size() != PAYLOAD_SIZE {
            return Err(SessionError::InvalidParameter(constants::ERR_PAYLOAD_SIZE));
        }

        dest.clear();
        if let Err(err) = self.restore(dest, container.payload()) {
            dest.clear();
            return Err(err);
        }

        debug!(session_id = dest.session_id, "Session state loaded");
        Ok(())
    }

    fn restore(&self, dest: &mut SessionContext, payload: &[u8]) -> Result<()> {
        let mut reader = FieldReader::new(payload);

        dest.session_id = reader.get_u32(Field::SessionId)?;
        dest.is_client = decode_role(reader.get_u32(Field::IsClient)?)?;
        dest.set_master_key(MasterKey::from_slice(reader.get_bytes(Field::MasterKey)?)?);

        // Derivation resets both counters, so the persisted values are read after it
        self.derivation.derive_message_keys(dest)?;

        dest.out_seq = reader.get_u32(Field::OutSeq)?;
        dest.in_seq = reader.get_u32(Field::InSeq)?;
        Ok(())
    }
}

/// Save `session` with default settings. See [`SessionSerializer::save`].
pub fn save(session: &SessionContext, out: Option<&mut [u8]>) -> Result<usize> {
    SessionSerializer::default().save(session, out)
}

/// Save `session` into a new buffer with default settings
pub fn save_to_vec(session: &SessionContext) -> Result<Zeroizing<Vec<u8>>> {
    SessionSerializer::default().save_to_vec(session)
}

/// Restore `dest` with default settings. See [`SessionSerializer::load`].
pub fn load(dest: &mut SessionContext, input: &[u8]) -> Result<()> {
    SessionSerializer::default().load(dest, input)
}
