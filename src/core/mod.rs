//! # Core Wire Components
//!
//! Byte-level building blocks for persisted session state.
//!
//! ## Components
//! - **Container**: tagged, length-prefixed, checksummed envelope
//! - **Layout**: the ordered payload schema and big-endian field cursors
//!
//! ## Wire Format
//! ```text
//! [Tag(4)] [DataSize(4)] [Checksum(4)] [Payload(DataSize)]
//! ```
//!
//! ## Security
//! - The checksum is verified before any payload byte is interpreted
//! - Declared sizes are bounded by the input before any payload read
//! - Every field access is bounds-checked

pub mod container;
pub mod layout;
