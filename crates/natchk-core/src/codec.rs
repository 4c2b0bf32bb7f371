//! Wire framing for the reflector protocol.
//!
//! Every datagram begins with a one-byte [`MessageId`]. A subset of message
//! kinds carry a single [`Endpoint`] payload, encoded as a family tag byte
//! (`4` or `6`) followed by the raw address octets and a big-endian port.
//! This layout is private to this system; it is not wire-compatible with
//! STUN or any other NAT-probing protocol.

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    GetAddr = 1,
    Addr = 2,
    ChkFullCone = 3,
    SendFullCone = 4,
    FullCone = 5,
    ChkRestrictedCone = 6,
    RestrictedCone = 7,
}

impl MessageId {
    pub fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            1 => MessageId::GetAddr,
            2 => MessageId::Addr,
            3 => MessageId::ChkFullCone,
            4 => MessageId::SendFullCone,
            5 => MessageId::FullCone,
            6 => MessageId::ChkRestrictedCone,
            7 => MessageId::RestrictedCone,
            _ => return None,
        })
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

const FAMILY_V4: u8 = 4;
const FAMILY_V6: u8 = 6;

/// Encode a bare message id with no payload.
pub fn encode_empty(id: MessageId) -> Vec<u8> {
    vec![id.to_byte()]
}

/// Encode a message id followed by an endpoint payload.
pub fn encode_with_endpoint(id: MessageId, ep: Endpoint) -> Vec<u8> {
    let mut out = vec![id.to_byte()];
    encode_endpoint(ep, &mut out);
    out
}

fn encode_endpoint(ep: Endpoint, out: &mut Vec<u8>) {
    match ep.socket_addr() {
        SocketAddr::V4(a) => {
            out.push(FAMILY_V4);
            out.extend_from_slice(&a.ip().octets());
            out.extend_from_slice(&a.port().to_be_bytes());
        }
        SocketAddr::V6(a) => {
            out.push(FAMILY_V6);
            out.extend_from_slice(&a.ip().octets());
            out.extend_from_slice(&a.port().to_be_bytes());
        }
    }
}

fn decode_endpoint(buf: &[u8]) -> Result<Endpoint> {
    if buf.is_empty() {
        return Err(Error::protocol("empty endpoint payload"));
    }
    match buf[0] {
        FAMILY_V4 => {
            if buf.len() < 1 + 4 + 2 {
                return Err(Error::protocol("truncated ipv4 endpoint payload"));
            }
            let mut octets = [0u8; 4];
            octets.copy_from_slice(&buf[1..5]);
            let port = u16::from_be_bytes([buf[5], buf[6]]);
            Ok(Endpoint::new(SocketAddr::new(
                IpAddr::V4(Ipv4Addr::from(octets)),
                port,
            )))
        }
        FAMILY_V6 => {
            if buf.len() < 1 + 16 + 2 {
                return Err(Error::protocol("truncated ipv6 endpoint payload"));
            }
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&buf[1..17]);
            let port = u16::from_be_bytes([buf[17], buf[18]]);
            Ok(Endpoint::new(SocketAddr::new(
                IpAddr::V6(Ipv6Addr::from(octets)),
                port,
            )))
        }
        other => Err(Error::protocol(format!("unknown address family tag {other}"))),
    }
}

/// A decoded inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    GetAddr,
    Addr(Endpoint),
    ChkFullCone(Endpoint),
    SendFullCone(Endpoint),
    FullCone,
    ChkRestrictedCone,
    RestrictedCone,
}

impl Message {
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let (id_byte, rest) = buf
            .split_first()
            .ok_or_else(|| Error::protocol("empty datagram"))?;
        let id = MessageId::from_byte(*id_byte)
            .ok_or_else(|| Error::protocol(format!("unknown message id {id_byte}")))?;
        Ok(match id {
            MessageId::GetAddr => Message::GetAddr,
            MessageId::Addr => Message::Addr(decode_endpoint(rest)?),
            MessageId::ChkFullCone => Message::ChkFullCone(decode_endpoint(rest)?),
            MessageId::SendFullCone => Message::SendFullCone(decode_endpoint(rest)?),
            MessageId::FullCone => Message::FullCone,
            MessageId::ChkRestrictedCone => Message::ChkRestrictedCone,
            MessageId::RestrictedCone => Message::RestrictedCone,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Message::GetAddr => encode_empty(MessageId::GetAddr),
            Message::Addr(ep) => encode_with_endpoint(MessageId::Addr, *ep),
            Message::ChkFullCone(ep) => encode_with_endpoint(MessageId::ChkFullCone, *ep),
            Message::SendFullCone(ep) => encode_with_endpoint(MessageId::SendFullCone, *ep),
            Message::FullCone => encode_empty(MessageId::FullCone),
            Message::ChkRestrictedCone => encode_empty(MessageId::ChkRestrictedCone),
            Message::RestrictedCone => encode_empty(MessageId::RestrictedCone),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(s: &str) -> Endpoint {
        Endpoint::new(s.parse().unwrap())
    }

    #[test]
    fn round_trips_addr_v4() {
        let msg = Message::Addr(ep("203.0.113.7:51000"));
        let bytes = msg.encode();
        assert_eq!(bytes[0], MessageId::Addr.to_byte());
        assert_eq!(Message::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn round_trips_addr_v6() {
        let msg = Message::Addr(ep("[2001:db8::1]:5000"));
        let bytes = msg.encode();
        assert_eq!(Message::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn round_trips_empty_messages() {
        for msg in [
            Message::GetAddr,
            Message::FullCone,
            Message::ChkRestrictedCone,
            Message::RestrictedCone,
        ] {
            assert_eq!(Message::decode(&msg.encode()).unwrap(), msg);
        }
    }

    #[test]
    fn rejects_truncated_payload() {
        let bytes = vec![MessageId::Addr.to_byte(), FAMILY_V4, 1, 2];
        assert!(Message::decode(&bytes).is_err());
    }

    #[test]
    fn rejects_unknown_message_id() {
        assert!(Message::decode(&[200]).is_err());
    }

    #[test]
    fn rejects_empty_datagram() {
        assert!(Message::decode(&[]).is_err());
    }
}
