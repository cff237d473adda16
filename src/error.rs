//! # Error Types
//!
//! Error handling for session state persistence and its collaborators.
//!
//! Every fallible operation in the crate returns [`Result`]. Failures are
//! reported to the immediate caller with no partial success: `save` either
//! writes a complete container or nothing, and `load` either restores the
//! whole session or leaves the destination cleared.
//!
//! ## Error Categories
//! - **Caller errors**: missing buffers, malformed input, saving a session
//!   that is still negotiating (`InvalidParameter`)
//! - **Size protocol**: the output buffer cannot hold the container
//!   (`BufferTooSmall`, always carrying the required size)
//! - **Integrity**: the container checksum does not match (`IntegrityCheckFailed`)
//! - **Collaborators**: key derivation, handshake and message protection failures
//!
//! ## Example Usage
//! ```rust
//! use secure_session_state::error::SessionError;
//! use secure_session_state::session::{save, SessionContext};
//!
//! // A client that has only sent its first handshake message is still negotiating
//! let (session, _init) = SessionContext::client_start(7);
//! match save(&session, None) {
//!     Err(SessionError::InvalidParameter(reason)) => println!("cannot save: {reason}"),
//!     other => println!("unexpected: {other:?}"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Static reason strings for error paths, so rejections never allocate.
pub mod constants {
    /// Save / load parameter validation
    pub const ERR_HANDSHAKE_PENDING: &str = "Key agreement is not complete";
    pub const ERR_INPUT_TOO_SHORT: &str = "Input shorter than container header";
    pub const ERR_INPUT_TRUNCATED: &str = "Input shorter than declared container size";
    pub const ERR_INPUT_TOO_LARGE: &str = "Declared container size exceeds configured maximum";
    pub const ERR_UNKNOWN_TAG: &str = "Container tag does not mark session state";
    pub const ERR_PAYLOAD_SIZE: &str = "Declared payload size does not match session layout";
    pub const ERR_INVALID_ROLE: &str = "Role field is neither client nor server";
    pub const ERR_CAPACITY: &str = "Buffer cannot hold header and payload";
    pub const ERR_FIELD_BOUNDS: &str = "Payload field exceeds payload bounds";
    pub const ERR_FIELD_ORDER: &str = "Payload field accessed out of layout order";

    /// Message channel errors
    pub const ERR_NOT_ESTABLISHED: &str = "Session has no derived message keys";
    pub const ERR_MESSAGE_TOO_SHORT: &str = "Sealed message shorter than sequence prefix";

    /// Handshake errors
    pub const ERR_WRONG_ROLE: &str = "Handshake step invoked for the wrong role";
    pub const ERR_NO_PENDING_HANDSHAKE: &str = "No handshake in progress";
    pub const ERR_CLIENT_SECRET_NOT_FOUND: &str = "Client secret not found";
    pub const ERR_SERVER_SECRET_NOT_FOUND: &str = "Server secret not found";
    pub const ERR_NONCE_VERIFICATION_FAILED: &str = "Server failed to verify client nonce";
    pub const ERR_SERVER_VERIFICATION_FAILED: &str = "Client failed to verify server nonce";

    /// Key derivation errors
    pub const ERR_HKDF_EXPAND: &str = "HKDF expand rejected output length";
}

// SessionError is the single error type for all session state operations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),

    #[error("Buffer too small: {required} bytes required")]
    BufferTooSmall { required: usize },

    #[error("Container integrity check failed")]
    IntegrityCheckFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Handshake failed: {0}")]
    HandshakeError(String),

    #[error("Sequence mismatch: expected {expected}, received {received}")]
    SequenceMismatch { expected: u32, received: u32 },

    #[error("Sequence counter exhausted")]
    SequenceExhausted,

    #[error("Encryption failed")]
    EncryptionFailure,

    #[error("Decryption failed")]
    DecryptionFailure,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Type alias for Results using SessionError
pub type Result<T> = std::result::Result<T, SessionError>;
