//! # Session Payload Layout
//!
//! The payload carried inside a session container is a fixed sequence of
//! named, fixed-width fields:
//!
//! ```text
//! [session_id(4)] [is_client(4)] [session_master_key(32)] [out_seq(4)] [in_seq(4)]
//! ```
//!
//! Integer fields are big-endian on the wire. The master key is opaque bytes
//! and is copied without any byte-order transform.
//!
//! Encoding and decoding walk [`Field::ORDER`] through a [`FieldWriter`] or
//! [`FieldReader`]. Both cursors check bounds on every step and refuse to
//! touch a field out of layout order, so a caller cannot skip or reorder
//! fields by accident.

use crate::error::{constants, Result, SessionError};
use std::ops::Range;
use tracing::trace;

/// Length of the session master key in bytes
pub const MASTER_KEY_LENGTH: usize = 32;

/// Width of every integer field on the wire
const U32_WIDTH: usize = 4;

/// How a field's bytes are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// 32-bit unsigned integer in network byte order
    BigEndianU32,
    /// Raw bytes, exempt from byte-order conversion
    Opaque,
}

/// A payload field, in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    SessionId,
    IsClient,
    MasterKey,
    OutSeq,
    InSeq,
}

impl Field {
    /// Wire order of all payload fields
    pub const ORDER: [Field; 5] = [
        Field::SessionId,
        Field::IsClient,
        Field::MasterKey,
        Field::OutSeq,
        Field::InSeq,
    ];

    /// Field name as used in logs
    pub const fn name(self) -> &'static str {
        match self {
            Field::SessionId => "session_id",
            Field::IsClient => "is_client",
            Field::MasterKey => "session_master_key",
            Field::OutSeq => "out_seq",
            Field::InSeq => "in_seq",
        }
    }

    /// Encoded width in bytes
    pub const fn width(self) -> usize {
        match self {
            Field::MasterKey => MASTER_KEY_LENGTH,
            _ => U32_WIDTH,
        }
    }

    pub const fn encoding(self) -> Encoding {
        match self {
            Field::MasterKey => Encoding::Opaque,
            _ => Encoding::BigEndianU32,
        }
    }

    /// Position of this field in [`Field::ORDER`]
    pub const fn index(self) -> usize {
        match self {
            Field::SessionId => 0,
            Field::IsClient => 1,
            Field::MasterKey => 2,
            Field::OutSeq => 3,
            Field::InSeq => 4,
        }
    }

    /// Byte offset of this field from the start of the payload
    pub const fn offset(self) -> usize {
        let mut offset = 0;
        let mut i = 0;
        while i < self.index() {
            offset += Field::ORDER[i].width();
            i += 1;
        }
        offset
    }
}

/// Exact payload length: the sum of all field widths, no padding
pub const PAYLOAD_SIZE: usize = {
    let mut size = 0;
    let mut i = 0;
    while i < Field::ORDER.len() {
        size += Field::ORDER[i].width();
        i += 1;
    }
    size
};

/// Write `value` in network byte order into the first four bytes of `dst`
pub fn put_u32_be(dst: &mut [u8], value: u32) -> Result<()> {
    let slot = dst
        .get_mut(..U32_WIDTH)
        .ok_or(SessionError::InvalidParameter(constants::ERR_FIELD_BOUNDS))?;
    slot.copy_from_slice(&value.to_be_bytes());
    Ok(())
}

/// Read a network byte order `u32` from the first four bytes of `src`
pub fn get_u32_be(src: &[u8]) -> Result<u32> {
    let bytes: [u8; U32_WIDTH] = src
        .get(..U32_WIDTH)
        .and_then(|slot| slot.try_into().ok())
        .ok_or(SessionError::InvalidParameter(constants::ERR_FIELD_BOUNDS))?;
    Ok(u32::from_be_bytes(bytes))
}

/// Byte range of `field` if it is the next one in layout order with the expected encoding
fn field_range(field: Field, encoding: Encoding, next: usize) -> Result<Range<usize>> {
    if field.index() != next || field.encoding() != encoding {
        trace!(field = field.name(), expected_index = next, "Field out of layout order");
        return Err(SessionError::InvalidParameter(constants::ERR_FIELD_ORDER));
    }
    let start = field.offset();
    Ok(start..start + field.width())
}

fn out_of_bounds(field: Field, payload_len: usize) -> SessionError {
    trace!(field = field.name(), payload_len, "Field past end of payload");
    SessionError::InvalidParameter(constants::ERR_FIELD_BOUNDS)
}

/// Sequential, bounds-checked writer over a payload region
pub struct FieldWriter<'a> {
    payload: &'a mut [u8],
    next: usize,
    pos: usize,
}

impl<'a> FieldWriter<'a> {
    pub fn new(payload: &'a mut [u8]) -> Self {
        Self {
            payload,
            next: 0,
            pos: 0,
        }
    }

    /// Reserve the slot for `field`, enforcing layout order and bounds
    fn slot(&mut self, field: Field, encoding: Encoding) -> Result<&mut [u8]> {
        let range = field_range(field, encoding, self.next)?;
        let end = range.end;
        let payload_len = self.payload.len();
        let slot = self
            .payload
            .get_mut(range)
            .ok_or_else(|| out_of_bounds(field, payload_len))?;
        self.next += 1;
        self.pos = end;
        Ok(slot)
    }

    /// Write an integer field in network byte order
    pub fn put_u32(&mut self, field: Field, value: u32) -> Result<()> {
        let slot = self.slot(field, Encoding::BigEndianU32)?;
        put_u32_be(slot, value)
    }

    /// Copy an opaque field verbatim. `bytes` must be exactly the field width.
    pub fn put_bytes(&mut self, field: Field, bytes: &[u8]) -> Result<()> {
        if bytes.len() != field.width() {
            return Err(SessionError::InvalidParameter(constants::ERR_FIELD_BOUNDS));
        }
        let slot = self.slot(field, Encoding::Opaque)?;
        slot.copy_from_slice(bytes);
        Ok(())
    }

    /// Number of bytes written so far
    pub fn written(&self) -> usize {
        self.pos
    }
}

/// Sequential, bounds-checked reader over a payload region
pub struct FieldReader<'a> {
    payload: &'a [u8],
    next: usize,
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            payload,
            next: 0,
            pos: 0,
        }
    }

    fn slot(&mut self, field: Field, encoding: Encoding) -> Result<&'a [u8]> {
        let range = field_range(field, encoding, self.next)?;
        let end = range.end;
        let slot = self
            .payload
            .get(range)
            .ok_or_else(|| out_of_bounds(field, self.payload.len()))?;
        self.next += 1;
        self.pos = end;
        Ok(slot)
    }

    /// Read an integer field, converting from network byte order
    pub fn get_u32(&mut self, field: Field) -> Result<u32> {
        let slot = self.slot(field, Encoding::BigEndianU32)?;
        get_u32_be(slot)
    }

    /// Borrow an opaque field's bytes
    pub fn get_bytes(&mut self, field: Field) -> Result<&'a [u8]> {
        self.slot(field, Encoding::Opaque)
    }

    /// Number of bytes consumed so far
    pub fn consumed(&self) -> usize {
        self.pos
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_size_is_sum_of_fields() {
        assert_eq!(PAYLOAD_SIZE, 16 + MASTER_KEY_LENGTH);
    }

    #[test]
    fn test_field_offsets_follow_wire_order() {
        assert_eq!(Field::SessionId.offset(), 0);
        assert_eq!(Field::IsClient.offset(), 4);
        assert_eq!(Field::MasterKey.offset(), 8);
        assert_eq!(Field::OutSeq.offset(), 8 + MASTER_KEY_LENGTH);
        assert_eq!(Field::InSeq.offset(), 12 + MASTER_KEY_LENGTH);
    }

    #[test]
    fn test_u32_is_big_endian() {
        let mut buf = [0u8; 4];
        put_u32_be(&mut buf, 0x0102_0304).unwrap();
        assert_eq!(buf, [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(get_u32_be(&buf).unwrap(), 0x0102_0304);
    }

    #[test]
    fn test_short_slot_is_rejected() {
        let mut buf = [0u8; 3];
        assert!(put_u32_be(&mut buf, 1).is_err());
        assert!(get_u32_be(&buf).is_err());
    }

    #[test]
    fn test_writer_rejects_out_of_order_field() {
        let mut payload = [0u8; PAYLOAD_SIZE];
        let mut writer = FieldWriter::new(&mut payload);
        let err = writer.put_u32(Field::OutSeq, 7).unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidParameter(constants::ERR_FIELD_ORDER)
        ));
    }

    #[test]
    fn test_writer_rejects_wrong_encoding() {
        let mut payload = [0u8; PAYLOAD_SIZE];
        let mut writer = FieldWriter::new(&mut payload);
        assert!(writer.put_bytes(Field::SessionId, &[0u8; 4]).is_err());
    }

    #[test]
    fn test_reader_stops_at_payload_end() {
        let payload = [0u8; 10];
        let mut reader = FieldReader::new(&payload);
        reader.get_u32(Field::SessionId).unwrap();
        reader.get_u32(Field::IsClient).unwrap();
        let err = reader.get_bytes(Field::MasterKey).unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidParameter(constants::ERR_FIELD_BOUNDS)
        ));
    }

    #[test]
    fn test_cursor_position_tracks_field_offsets() {
        let payload = [0u8; PAYLOAD_SIZE];
        let mut reader = FieldReader::new(&payload);
        for field in Field::ORDER {
            assert_eq!(reader.consumed(), field.offset(), "{}", field.name());
            match field.encoding() {
                Encoding::BigEndianU32 => {
                    reader.get_u32(field).unwrap();
                }
                Encoding::Opaque => {
                    reader.get_bytes(field).unwrap();
                }
            }
        }
        assert_eq!(reader.consumed(), PAYLOAD_SIZE);
    }

    #[test]
    fn test_reader_rejects_repeated_field() {
        let payload = [0u8; PAYLOAD_SIZE];
        let mut reader = FieldReader::new(&payload);
        reader.get_u32(Field::SessionId).unwrap();
        assert!(matches!(
            reader.get_u32(Field::SessionId),
            Err(SessionError::InvalidParameter(constants::ERR_FIELD_ORDER))
        ));
        assert_eq!(reader.consumed(), Field::IsClient.offset());
    }

    #[test]
    fn test_full_walk_covers_payload() {
        let key = [0xAB; MASTER_KEY_LENGTH];
        let mut payload = [0u8; PAYLOAD_SIZE];
        let mut writer = FieldWriter::new(&mut payload);
        writer.put_u32(Field::SessionId, 42).unwrap();
        writer.put_u32(Field::IsClient, 1).unwrap();
        writer.put_bytes(Field::MasterKey, &key).unwrap();
        writer.put_u32(Field::OutSeq, 7).unwrap();
        writer.put_u32(Field::InSeq, 3).unwrap();
        assert_eq!(writer.written(), PAYLOAD_SIZE);

        let mut reader = FieldReader::new(&payload);
        assert_eq!(reader.get_u32(Field::SessionId).unwrap(), 42);
        assert_eq!(reader.get_u32(Field::IsClient).unwrap(), 1);
        assert_eq!(reader.get_bytes(Field::MasterKey).unwrap(), &key);
        assert_eq!(reader.get_u32(Field::OutSeq).unwrap(), 7);
        assert_eq!(reader.get_u32(Field::InSeq).unwrap(), 3);
        assert_eq!(reader.consumed(), PAYLOAD_SIZE);
    }
}
