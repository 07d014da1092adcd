use crate::error::Error;

const FIELD_PUBLIC_KEY: u32 = 1;
const FIELD_LISTEN_ADDR: u32 = 2;
const FIELD_OBSERVED_ADDR: u32 = 3;
const FIELD_PROTOCOL: u32 = 4;
const FIELD_AGENT_VERSION: u32 = 5;

/// Metadata one peer tells another about itself, exchanged once per
/// newly-secured connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    pub public_key: [u8; 32],
    pub listen_addrs: Vec<String>,
    pub observed_addr: String,
    pub protocols: Vec<String>,
    pub agent_version: String,
}

impl Info {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_bytes_field(&mut out, FIELD_PUBLIC_KEY, &self.public_key);
        for addr in &self.listen_addrs {
            write_bytes_field(&mut out, FIELD_LISTEN_ADDR, addr.as_bytes());
        }
        write_bytes_field(&mut out, FIELD_OBSERVED_ADDR, self.observed_addr.as_bytes());
        for proto in &self.protocols {
            write_bytes_field(&mut out, FIELD_PROTOCOL, proto.as_bytes());
        }
        write_bytes_field(&mut out, FIELD_AGENT_VERSION, self.agent_version.as_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut public_key = None;
        let mut listen_addrs = Vec::new();
        let mut observed_addr = None;
        let mut protocols = Vec::new();
        let mut agent_version = None;

        for (field_no, value) in read_fields(bytes)? {
            match field_no {
                FIELD_PUBLIC_KEY => {
                    let arr: [u8; 32] = value.try_into().map_err(|_| Error::Malformed)?;
                    public_key = Some(arr);
                }
                FIELD_LISTEN_ADDR => {
                    listen_addrs.push(String::from_utf8(value).map_err(|_| Error::Malformed)?);
                }
                FIELD_OBSERVED_ADDR => {
                    observed_addr = Some(String::from_utf8(value).map_err(|_| Error::Malformed)?);
                }
                FIELD_PROTOCOL => {
                    protocols.push(String::from_utf8(value).map_err(|_| Error::Malformed)?);
                }
                FIELD_AGENT_VERSION => {
                    agent_version = Some(String::from_utf8(value).map_err(|_| Error::Malformed)?);
                }
                _ => {} // unknown field: forward-compatible, ignore
            }
        }

        Ok(Info {
            public_key: public_key.ok_or(Error::Malformed)?,
            listen_addrs,
            observed_addr: observed_addr.unwrap_or_default(),
            protocols,
            agent_version: agent_version.unwrap_or_default(),
        })
    }
}

fn write_tag(out: &mut Vec<u8>, field_no: u32, wire_type: u32) {
    let key = (field_no << 3) | wire_type;
    let mut buf = unsigned_varint::encode::u32_buffer();
    out.extend_from_slice(unsigned_varint::encode::u32(key, &mut buf));
}

fn write_bytes_field(out: &mut Vec<u8>, field_no: u32, data: &[u8]) {
    const WIRE_LENGTH_DELIMITED: u32 = 2;
    write_tag(out, field_no, WIRE_LENGTH_DELIMITED);
    let mut buf = unsigned_varint::encode::u64_buffer();
    out.extend_from_slice(unsigned_varint::encode::u64(data.len() as u64, &mut buf));
    out.extend_from_slice(data);
}

/// All of our fields are length-delimited (wire type 2), so this is the only
/// wire type this minimal reader needs to understand.
fn read_fields(mut bytes: &[u8]) -> Result<Vec<(u32, Vec<u8>)>, Error> {
    let mut fields = Vec::new();
    while !bytes.is_empty() {
        let (key, rest) = unsigned_varint::decode::u32(bytes).map_err(|_| Error::Malformed)?;
        let field_no = key >> 3;
        let wire_type = key & 0x7;
        if wire_type != 2 {
            return Err(Error::Malformed);
        }
        let (len, rest) = unsigned_varint::decode::u64(rest).map_err(|_| Error::Malformed)?;
        let len = len as usize;
        if rest.len() < len {
            return Err(Error::Malformed);
        }
        fields.push((field_no, rest[..len].to_vec()));
        bytes = &rest[len..];
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let info = Info {
            public_key: [7u8; 32],
            listen_addrs: vec!["/ip4/127.0.0.1/tcp/4001".into()],
            observed_addr: "/ip4/203.0.113.5/tcp/51000".into(),
            protocols: vec!["/bar/1".into(), "/gossipsub/1.1.0".into()],
            agent_version: "sansp2p/0.1.0".into(),
        };
        let encoded = info.encode();
        assert_eq!(Info::decode(&encoded).unwrap(), info);
    }

    #[test]
    fn decode_rejects_truncated_bytes() {
        let info = Info {
            public_key: [1u8; 32],
            listen_addrs: vec![],
            observed_addr: String::new(),
            protocols: vec![],
            agent_version: String::new(),
        };
        let encoded = info.encode();
        assert!(Info::decode(&encoded[..encoded.len() - 2]).is_err());
    }
}
