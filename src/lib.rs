//! # Secure Session State
//!
//! Suspend and resume an established secure channel without repeating key
//! agreement.
//!
//! A [`SessionContext`](session::SessionContext) that has finished its
//! handshake can be saved into a compact, checksummed, byte-order-stable
//! blob and later loaded into a fresh context. Loading re-derives the message
//! keys from the persisted master key and then restores the persisted
//! sequence counters, so the resumed channel continues exactly where the
//! saved one stopped.
//!
//! ## Modules
//! - [`core`]: container codec and payload layout
//! - [`session`]: session context, handshake, key derivation, message
//!   protection, save / load
//! - [`config`]: TOML / environment configuration
//! - [`utils`]: logging and metrics
//! - [`error`]: error type
//!
//! ## Example
//! ```rust
//! use secure_session_state::session::{load, save_to_vec, SessionContext};
//!
//! let (mut client, init) = SessionContext::client_start(1);
//! let (mut server, response) = SessionContext::server_accept(&init);
//! let confirm = client.client_finish(&response).unwrap();
//! server.server_finish(&confirm).unwrap();
//!
//! let sealed = client.seal(b"before suspend").unwrap();
//! server.open(&sealed).unwrap();
//!
//! // Suspend the client and resume it elsewhere
//! let blob = save_to_vec(&client).unwrap();
//! drop(client);
//! let mut resumed = SessionContext::default();
//! load(&mut resumed, &blob).unwrap();
//!
//! let sealed = resumed.seal(b"after resume").unwrap();
//! assert_eq!(server.open(&sealed).unwrap(), b"after resume");
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod session;
pub mod utils;

pub use error::{Result, SessionError};
