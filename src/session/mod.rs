//! # Sessions
//!
//! Live secure-channel state and everything that produces, consumes or
//! persists it.
//!
//! ## Components
//! - **Context**: identity, master key, sequence counters, derived keys
//! - **Handshake**: X25519 key agreement that establishes a context
//! - **Keys**: HKDF-SHA256 message key derivation behind the [`KeyDerivation`] seam
//! - **Channel**: XChaCha20-Poly1305 message protection driven by the counters
//! - **Serialize**: save / load of established contexts
//!
//! ## Lifecycle
//! ```text
//! Negotiating --finish--> Established --save--> blob
//!                              ^                  |
//!                              +------load--------+
//! ```
//!
//! A context must not be used by more than one thread at a time. In
//! particular, messages must not be sealed or opened on a context while it is
//! being saved or loaded; wrap it in a lock if it is shared.

pub mod channel;
pub mod context;
pub mod handshake;
pub mod keys;
pub mod serialize;

pub use context::{MasterKey, SessionContext};
pub use handshake::{HandshakeConfirm, HandshakeInit, HandshakeResponse};
pub use keys::{HkdfKeyDerivation, KeyDerivation, MessageKeys};
pub use serialize::{
    load, save, save_to_vec, serialized_size, SessionSerializer, SERIALIZED_SIZE,
    SESSION_CONTEXT_TAG,
};
