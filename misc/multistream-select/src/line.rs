use crate::error::Error;

/// Lines longer than this are rejected outright; guards against an
/// adversarial peer claiming an enormous length prefix.
const MAX_LINE_LEN: u64 = 64 * 1024;

/// Encodes one multistream-select line: `unsigned-varint(len) || utf8 || '\n'`,
/// where `len` counts the UTF-8 bytes plus the trailing newline.
pub fn encode_line(s: &str) -> Vec<u8> {
    let payload_len = (s.len() + 1) as u64;
    let mut len_buf = unsigned_varint::encode::u64_buffer();
    let len_bytes = unsigned_varint::encode::u64(payload_len, &mut len_buf);
    let mut out = Vec::with_capacity(len_bytes.len() + payload_len as usize);
    out.extend_from_slice(len_bytes);
    out.extend_from_slice(s.as_bytes());
    out.push(b'\n');
    out
}

/// Attempts to decode one line from the front of `buf`. Returns `Ok(None)`
/// if `buf` does not yet hold a complete line. On success, returns the
/// decoded string and the number of bytes consumed from `buf`.
pub fn try_decode_line(buf: &[u8]) -> Result<Option<(String, usize)>, Error> {
    let (len, rest) = match unsigned_varint::decode::u64(buf) {
        Ok(v) => v,
        Err(unsigned_varint::decode::Error::Insufficient) => return Ok(None),
        Err(_) => return Err(Error::BadNegotiation),
    };
    if len == 0 || len > MAX_LINE_LEN {
        return Err(Error::BadNegotiation);
    }
    let len = len as usize;
    if rest.len() < len {
        return Ok(None);
    }
    let prefix_len = buf.len() - rest.len();
    let body = &rest[..len];
    if body[len - 1] != b'\n' {
        return Err(Error::BadNegotiation);
    }
    let s = std::str::from_utf8(&body[..len - 1])
        .map_err(|_| Error::BadNegotiation)?
        .to_string();
    Ok(Some((s, prefix_len + len)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let encoded = encode_line("/foo/1.0.0");
        let (line, consumed) = try_decode_line(&encoded).unwrap().unwrap();
        assert_eq!(line, "/foo/1.0.0");
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn incomplete_returns_none() {
        let encoded = encode_line("/foo/1.0.0");
        assert_eq!(try_decode_line(&encoded[..2]).unwrap(), None);
    }

    #[test]
    fn bad_terminator_is_rejected() {
        let mut encoded = encode_line("/foo/1.0.0");
        let last = encoded.len() - 1;
        encoded[last] = b'x';
        assert!(try_decode_line(&encoded).is_err());
    }
}
