//! A minimal protobuf-shaped writer/reader. Every field this protocol needs
//! is either a varint or a length-delimited blob, so this only implements
//! those two wire types.

use crate::error::Error;

const WIRE_VARINT: u32 = 0;
const WIRE_LENGTH_DELIMITED: u32 = 2;

pub fn write_varint_field(out: &mut Vec<u8>, field_no: u32, value: u64) {
    write_tag(out, field_no, WIRE_VARINT);
    let mut buf = unsigned_varint::encode::u64_buffer();
    out.extend_from_slice(unsigned_varint::encode::u64(value, &mut buf));
}

pub fn write_bytes_field(out: &mut Vec<u8>, field_no: u32, data: &[u8]) {
    write_tag(out, field_no, WIRE_LENGTH_DELIMITED);
    let mut buf = unsigned_varint::encode::u64_buffer();
    out.extend_from_slice(unsigned_varint::encode::u64(data.len() as u64, &mut buf));
    out.extend_from_slice(data);
}

fn write_tag(out: &mut Vec<u8>, field_no: u32, wire_type: u32) {
    let key = (field_no << 3) | wire_type;
    let mut buf = unsigned_varint::encode::u32_buffer();
    out.extend_from_slice(unsigned_varint::encode::u32(key, &mut buf));
}

#[derive(Debug)]
pub enum Field {
    Varint(u64),
    Bytes(Vec<u8>),
}

/// Parses a flat sequence of (field_no, value) pairs; nested submessages are
/// just `Bytes` values the caller recurses into.
pub fn read_fields(mut bytes: &[u8]) -> Result<Vec<(u32, Field)>, Error> {
    let mut fields = Vec::new();
    while !bytes.is_empty() {
        let (key, rest) = unsigned_varint::decode::u32(bytes).map_err(|_| Error::MalformedFrame)?;
        let field_no = key >> 3;
        let wire_type = key & 0x7;
        match wire_type {
            WIRE_VARINT => {
                let (value, rest) = unsigned_varint::decode::u64(rest).map_err(|_| Error::MalformedFrame)?;
                fields.push((field_no, Field::Varint(value)));
                bytes = rest;
            }
            WIRE_LENGTH_DELIMITED => {
                let (len, rest) = unsigned_varint::decode::u64(rest).map_err(|_| Error::MalformedFrame)?;
                let len = len as usize;
                if rest.len() < len {
                    return Err(Error::MalformedFrame);
                }
                fields.push((field_no, Field::Bytes(rest[..len].to_vec())));
                bytes = &rest[len..];
            }
            _ => return Err(Error::MalformedFrame),
        }
    }
    Ok(fields)
}

pub fn as_bytes(field: Field) -> Result<Vec<u8>, Error> {
    match field {
        Field::Bytes(b) => Ok(b),
        Field::Varint(_) => Err(Error::MalformedFrame),
    }
}

pub fn as_string(field: Field) -> Result<String, Error> {
    String::from_utf8(as_bytes(field)?).map_err(|_| Error::MalformedFrame)
}

pub fn as_varint(field: Field) -> Result<u64, Error> {
    match field {
        Field::Varint(v) => Ok(v),
        Field::Bytes(_) => Err(Error::MalformedFrame),
    }
}
