//! # Container Codec
//!
//! Generic tagged, length-prefixed, checksummed envelope. The codec knows
//! nothing about what the payload means.
//!
//! ## Wire Format
//! ```text
//! [Tag(4)] [DataSize(4, BE)] [Checksum(4)] [Payload(DataSize)]
//! ```
//!
//! The checksum is the first four bytes of SHA-256 over the header, with the
//! checksum field taken as zero, followed by the payload. It must be verified
//! before any payload byte is trusted.

use crate::core::layout::{get_u32_be, put_u32_be};
use crate::error::{constants, Result, SessionError};
use sha2::{Digest, Sha256};
use tracing::warn;

/// Length of the identifying tag
pub const TAG_LENGTH: usize = 4;

/// Length of the integrity value
pub const CHECKSUM_LENGTH: usize = 4;

/// Total header length: tag, payload size, checksum
pub const HEADER_SIZE: usize = TAG_LENGTH + 4 + CHECKSUM_LENGTH;

const SIZE_OFFSET: usize = TAG_LENGTH;
const CHECKSUM_OFFSET: usize = SIZE_OFFSET + 4;

/// Compute the integrity value over `header` (checksum field zeroed) and `payload`
fn compute_checksum(header: &[u8], payload: &[u8]) -> [u8; CHECKSUM_LENGTH] {
    let mut hasher = Sha256::new();
    hasher.update(&header[..CHECKSUM_OFFSET]);
    hasher.update([0u8; CHECKSUM_LENGTH]);
    hasher.update(payload);
    let digest = hasher.finalize();

    let mut checksum = [0u8; CHECKSUM_LENGTH];
    checksum.copy_from_slice(&digest[..CHECKSUM_LENGTH]);
    checksum
}

/// Writable view of a container being built in a caller buffer
pub struct ContainerMut<'a> {
    buf: &'a mut [u8],
}

impl<'a> ContainerMut<'a> {
    /// Wrap `buf`, which must at least hold a header
    pub fn new(buf: &'a mut [u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(SessionError::InvalidParameter(constants::ERR_CAPACITY));
        }
        Ok(Self { buf })
    }

    /// Copy the identifying tag into the header. The content is not validated.
    pub fn write_tag(&mut self, tag: &[u8; TAG_LENGTH]) {
        self.buf[..TAG_LENGTH].copy_from_slice(tag);
    }

    /// Record the payload length. The buffer must hold header plus `size` bytes.
    pub fn set_payload_size(&mut self, size: usize) -> Result<()> {
        let declared = u32::try_from(size)
            .map_err(|_| SessionError::InvalidParameter(constants::ERR_CAPACITY))?;
        if HEADER_SIZE + size > self.buf.len() {
            return Err(SessionError::InvalidParameter(constants::ERR_CAPACITY));
        }
        put_u32_be(&mut self.buf[SIZE_OFFSET..CHECKSUM_OFFSET], declared)
    }

    pub fn declared_payload_size(&self) -> usize {
        declared_size(self.buf)
    }

    /// Mutable payload region, immediately following the header
    pub fn payload_mut(&mut self) -> Result<&mut [u8]> {
        let end = HEADER_SIZE + self.declared_payload_size();
        self.buf
            .get_mut(HEADER_SIZE..end)
            .ok_or(SessionError::InvalidParameter(constants::ERR_CAPACITY))
    }

    /// Compute and store the checksum. Call only once the payload is fully written.
    pub fn update_checksum(&mut self) -> Result<()> {
        let end = HEADER_SIZE + self.declared_payload_size();
        let (header, rest) = self.buf.split_at_mut(HEADER_SIZE);
        let payload = rest
            .get(..end - HEADER_SIZE)
            .ok_or(SessionError::InvalidParameter(constants::ERR_CAPACITY))?;
        let checksum = compute_checksum(header, payload);
        header[CHECKSUM_OFFSET..].copy_from_slice(&checksum);
        Ok(())
    }

    /// Bytes occupied by header and declared payload
    pub fn total_size(&self) -> usize {
        HEADER_SIZE + self.declared_payload_size()
    }
}

/// Read-only view of a container whose declared size fits the input
#[derive(Debug, Clone, Copy)]
pub struct Container<'a> {
    buf: &'a [u8],
}

impl<'a> Container<'a> {
    /// Bound `input` to the declared container.
    ///
    /// Fails with `InvalidParameter` if the input cannot hold the header, or
    /// cannot hold the header plus the declared payload. No payload byte is
    /// read here. Bytes past the declared container are ignored.
    pub fn parse(input: &'a [u8]) -> Result<Self> {
        if input.len() < HEADER_SIZE {
            return Err(SessionError::InvalidParameter(constants::ERR_INPUT_TOO_SHORT));
        }
        let total = HEADER_SIZE
            .checked_add(declared_size(input))
            .ok_or(SessionError::InvalidParameter(constants::ERR_INPUT_TRUNCATED))?;
        if input.len() < total {
            return Err(SessionError::InvalidParameter(constants::ERR_INPUT_TRUNCATED));
        }
        Ok(Self {
            buf: &input[..total],
        })
    }

    pub fn tag(&self) -> [u8; TAG_LENGTH] {
        let mut tag = [0u8; TAG_LENGTH];
        tag.copy_from_slice(&self.buf[..TAG_LENGTH]);
        tag
    }

    pub fn declared_payload_size(&self) -> usize {
        declared_size(self.buf)
    }

    /// Read-only payload region, immediately following the header
    pub fn payload(&self) -> &'a [u8] {
        &self.buf[HEADER_SIZE..]
    }

    pub fn total_size(&self) -> usize {
        self.buf.len()
    }

    /// Recompute the checksum and compare it with the stored one
    pub fn verify_checksum(&self) -> Result<()> {
        let (header, payload) = self.buf.split_at(HEADER_SIZE);
        let expected = compute_checksum(header, payload);
        if header[CHECKSUM_OFFSET..] != expected {
            warn!(
                payload_size = payload.len(),
                "Container checksum mismatch"
            );
            return Err(SessionError::IntegrityCheckFailed);
        }
        Ok(())
    }
}

/// Declared payload size from a buffer known to hold a header
fn declared_size(header: &[u8]) -> usize {
    // Callers guarantee HEADER_SIZE bytes, so the read cannot fail
    get_u32_be(&header[SIZE_OFFSET..CHECKSUM_OFFSET]).map_or(0, |size| size as usize)
}
