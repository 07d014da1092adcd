use crate::error::Error;
use crate::wire::{as_bytes, as_string, as_varint, read_fields, write_bytes_field, write_varint_field, Field};
use sansp2p_core::PeerId;
use sansp2p_identity::PublicKeyBytes;
use sha2::{Digest, Sha256};

pub type TopicId = String;

/// `H(source_peer || seqno)`, the default message-id function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub [u8; 32]);

impl MessageId {
    pub fn for_message(source: &PeerId, seqno: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update(seqno.to_be_bytes());
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        MessageId(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubOpt {
    pub topic: TopicId,
    pub subscribe: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub source: PeerId,
    pub seqno: u64,
    pub topic: TopicId,
    pub data: Vec<u8>,
}

impl Message {
    pub fn id(&self) -> MessageId {
        MessageId::for_message(&self.source, self.seqno)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Control {
    pub ihave: Vec<(TopicId, Vec<MessageId>)>,
    pub iwant: Vec<MessageId>,
    pub graft: Vec<TopicId>,
    pub prune: Vec<TopicId>,
}

impl Control {
    pub fn is_empty(&self) -> bool {
        self.ihave.is_empty() && self.iwant.is_empty() && self.graft.is_empty() && self.prune.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rpc {
    pub subscriptions: Vec<SubOpt>,
    pub messages: Vec<Message>,
    pub control: Control,
}

impl Rpc {
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty() && self.messages.is_empty() && self.control.is_empty()
    }

    /// Wire order is fixed: subscription deltas, then messages, then control.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for sub in &self.subscriptions {
            write_bytes_field(&mut out, 1, &encode_sub(sub));
        }
        for msg in &self.messages {
            write_bytes_field(&mut out, 2, &encode_message(msg));
        }
        if !self.control.is_empty() {
            write_bytes_field(&mut out, 3, &encode_control(&self.control));
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut rpc = Rpc::default();
        for (field_no, value) in read_fields(bytes)? {
            match field_no {
                1 => rpc.subscriptions.push(decode_sub(&as_bytes(value)?)?),
                2 => rpc.messages.push(decode_message(&as_bytes(value)?)?),
                3 => rpc.control = decode_control(&as_bytes(value)?)?,
                _ => {}
            }
        }
        Ok(rpc)
    }
}

fn encode_sub(sub: &SubOpt) -> Vec<u8> {
    let mut out = Vec::new();
    write_varint_field(&mut out, 1, sub.subscribe as u64);
    write_bytes_field(&mut out, 2, sub.topic.as_bytes());
    out
}

fn decode_sub(bytes: &[u8]) -> Result<SubOpt, Error> {
    let mut subscribe = None;
    let mut topic = None;
    for (field_no, value) in read_fields(bytes)? {
        match field_no {
            1 => subscribe = Some(as_varint(value)? != 0),
            2 => topic = Some(as_string(value)?),
            _ => {}
        }
    }
    Ok(SubOpt {
        subscribe: subscribe.ok_or(Error::MalformedFrame)?,
        topic: topic.ok_or(Error::MalformedFrame)?,
    })
}

fn encode_message(msg: &Message) -> Vec<u8> {
    let mut out = Vec::new();
    write_bytes_field(&mut out, 1, msg.source.as_bytes());
    write_varint_field(&mut out, 2, msg.seqno);
    write_bytes_field(&mut out, 3, msg.topic.as_bytes());
    write_bytes_field(&mut out, 4, &msg.data);
    out
}

fn decode_message(bytes: &[u8]) -> Result<Message, Error> {
    let mut source = None;
    let mut seqno = None;
    let mut topic = None;
    let mut data = None;
    for (field_no, value) in read_fields(bytes)? {
        match field_no {
            1 => {
                let raw = as_bytes(value)?;
                let key = PublicKeyBytes::from_bytes(raw).map_err(|_| Error::MalformedFrame)?;
                source = Some(PeerId::from_public_key(&key));
            }
            2 => seqno = Some(as_varint(value)?),
            3 => topic = Some(as_string(value)?),
            4 => data = Some(as_bytes(value)?),
            _ => {}
        }
    }
    Ok(Message {
        source: source.ok_or(Error::MalformedFrame)?,
        seqno: seqno.ok_or(Error::MalformedFrame)?,
        topic: topic.ok_or(Error::MalformedFrame)?,
        data: data.unwrap_or_default(),
    })
}

fn encode_control(control: &Control) -> Vec<u8> {
    let mut out = Vec::new();
    for (topic, ids) in &control.ihave {
        let mut sub = Vec::new();
        write_bytes_field(&mut sub, 1, topic.as_bytes());
        for id in ids {
            write_bytes_field(&mut sub, 2, &id.0);
        }
        write_bytes_field(&mut out, 1, &sub);
    }
    if !control.iwant.is_empty() {
        let mut sub = Vec::new();
        for id in &control.iwant {
            write_bytes_field(&mut sub, 1, &id.0);
        }
        write_bytes_field(&mut out, 2, &sub);
    }
    for topic in &control.graft {
        let mut sub = Vec::new();
        write_bytes_field(&mut sub, 1, topic.as_bytes());
        write_bytes_field(&mut out, 3, &sub);
    }
    for topic in &control.prune {
        let mut sub = Vec::new();
        write_bytes_field(&mut sub, 1, topic.as_bytes());
        write_bytes_field(&mut out, 4, &sub);
    }
    out
}

fn decode_control(bytes: &[u8]) -> Result<Control, Error> {
    let mut control = Control::default();
    for (field_no, value) in read_fields(bytes)? {
        let sub_bytes = as_bytes(value)?;
        match field_no {
            1 => {
                let mut topic = None;
                let mut ids = Vec::new();
                for (fno, v) in read_fields(&sub_bytes)? {
                    match fno {
                        1 => topic = Some(as_string(v)?),
                        2 => ids.push(message_id_from_field(v)?),
                        _ => {}
                    }
                }
                control.ihave.push((topic.ok_or(Error::MalformedFrame)?, ids));
            }
            2 => {
                for (fno, v) in read_fields(&sub_bytes)? {
                    if fno == 1 {
                        control.iwant.push(message_id_from_field(v)?);
                    }
                }
            }
            3 => {
                for (fno, v) in read_fields(&sub_bytes)? {
                    if fno == 1 {
                        control.graft.push(as_string(v)?);
                    }
                }
            }
            4 => {
                for (fno, v) in read_fields(&sub_bytes)? {
                    if fno == 1 {
                        control.prune.push(as_string(v)?);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(control)
}

fn message_id_from_field(field: Field) -> Result<MessageId, Error> {
    let raw = as_bytes(field)?;
    let arr: [u8; 32] = raw.try_into().map_err(|_| Error::MalformedFrame)?;
    Ok(MessageId(arr))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(byte: u8) -> PeerId {
        PeerId::from_public_key(&PublicKeyBytes::from_bytes(&[byte; 32]).unwrap())
    }

    #[test]
    fn rpc_roundtrip_with_all_sections() {
        let source = peer(1);
        let rpc = Rpc {
            subscriptions: vec![SubOpt { topic: "x".into(), subscribe: true }],
            messages: vec![Message { source, seqno: 7, topic: "x".into(), data: b"hi".to_vec() }],
            control: Control {
                ihave: vec![("x".into(), vec![MessageId([9u8; 32])])],
                iwant: vec![MessageId([3u8; 32])],
                graft: vec!["x".into()],
                prune: vec!["y".into()],
            },
        };
        let encoded = rpc.encode();
        assert_eq!(Rpc::decode(&encoded).unwrap(), rpc);
    }

    #[test]
    fn message_id_is_deterministic() {
        let source = peer(5);
        let a = MessageId::for_message(&source, 1);
        let b = MessageId::for_message(&source, 1);
        let c = MessageId::for_message(&source, 2);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
