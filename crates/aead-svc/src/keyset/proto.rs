//! Minimal protobuf codec for the serialized key messages carried in
//! `keyData.value`.
//!
//! Only the subset needed for symmetric key messages is supported: varint,
//! fixed32/64, and length-delimited wire types. Unknown fields are skipped.

use thiserror::Error;

const WIRE_VARINT: u64 = 0;
const WIRE_FIXED64: u64 = 1;
const WIRE_LEN: u64 = 2;
const WIRE_FIXED32: u64 = 5;

/// Errors from the key message codec.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtoError {
    /// The buffer ended in the middle of a field.
    #[error("truncated key message")]
    Truncated,

    /// A varint ran past ten bytes.
    #[error("malformed varint in key message")]
    BadVarint,

    /// Groups and reserved wire types are not valid in key messages.
    #[error("unsupported wire type {0}")]
    UnsupportedWireType(u64),

    /// The message has no key bytes in the expected field.
    #[error("key message has no key_value field")]
    MissingKey,
}

/// Serialize a key message that holds only `key` in field `field`.
///
/// The version field is zero and therefore omitted, which matches what key
/// generators emit for fresh keys.
pub fn encode_key(field: u32, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + 4);
    put_varint(&mut out, (u64::from(field) << 3) | WIRE_LEN);
    put_varint(&mut out, key.len() as u64);
    out.extend_from_slice(key);
    out
}

/// Extract the bytes of length-delimited field `field` from a key message.
///
/// When the field repeats, the last occurrence wins.
pub fn decode_key(field: u32, mut buf: &[u8]) -> Result<&[u8], ProtoError> {
    let mut found = None;
    while !buf.is_empty() {
        let tag = take_varint(&mut buf)?;
        let number = tag >> 3;
        match tag & 0x7 {
            WIRE_VARINT => {
                take_varint(&mut buf)?;
            }
            WIRE_FIXED64 => skip(&mut buf, 8)?,
            WIRE_FIXED32 => skip(&mut buf, 4)?,
            WIRE_LEN => {
                let len = usize::try_from(take_varint(&mut buf)?).map_err(|_| ProtoError::Truncated)?;
                if buf.len() < len {
                    return Err(ProtoError::Truncated);
                }
                let (value, rest) = buf.split_at(len);
                if number == u64::from(field) {
                    found = Some(value);
                }
                buf = rest;
            }
            other => return Err(ProtoError::UnsupportedWireType(other)),
        }
    }
    found.ok_or(ProtoError::MissingKey)
}

fn put_varint(out: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        out.push((v as u8 & 0x7f) | 0x80);
        v >>= 7;
    }
    out.push(v as u8);
}

fn take_varint(buf: &mut &[u8]) -> Result<u64, ProtoError> {
    let mut value = 0u64;
    for i in 0..10 {
        let (&byte, rest) = buf.split_first().ok_or(ProtoError::Truncated)?;
        *buf = rest;
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(ProtoError::BadVarint)
}

fn skip(buf: &mut &[u8], n: usize) -> Result<(), ProtoError> {
    if buf.len() < n {
        return Err(ProtoError::Truncated);
    }
    *buf = &buf[n..];
    Ok(())
}
