//! Datagram framing used by the reference UDP transport.
//!
//! Wire format:
//! ```text
//! [kind:1][body:N]
//! ```
//!
//! | kind | name            | body                               |
//! |------|-----------------|------------------------------------|
//! | 0x01 | Unconnected     | application payload                |
//! | 0x02 | Broadcast       | application payload                |
//! | 0x03 | ConnectRequest  | connect data (the admission key)   |
//! | 0x04 | ConnectAccept   | –                                  |
//! | 0x05 | ConnectReject   | –                                  |
//! | 0x06 | Data            | `[channel:1][delivery:1][payload]` |
//! | 0x07 | Disconnect      | –                                  |
//! | 0x08 | Ping            | –                                  |
//! | 0x09 | Pong            | –                                  |
//!
//! The broadcast/unconnected split lets the receiver classify an unconnected
//! datagram without looking at the destination address it was sent to.

use thiserror::Error;

use crate::domain::session::DeliveryMethod;

/// Errors that can occur while decoding a datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    /// The datagram was empty.
    #[error("empty datagram")]
    Empty,

    /// The kind byte is not a recognised value.
    #[error("unknown packet kind: 0x{0:02X}")]
    UnknownKind(u8),

    /// A data packet is shorter than its fixed header.
    #[error("truncated data packet: {0} byte(s)")]
    TruncatedData(usize),

    /// A data packet names a delivery method that does not exist.
    #[error("unknown delivery method: 0x{0:02X}")]
    UnknownDeliveryMethod(u8),
}

/// Packet kind codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    Unconnected = 0x01,
    Broadcast = 0x02,
    ConnectRequest = 0x03,
    ConnectAccept = 0x04,
    ConnectReject = 0x05,
    Data = 0x06,
    Disconnect = 0x07,
    Ping = 0x08,
    Pong = 0x09,
}

impl TryFrom<u8> for PacketKind {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, PacketError> {
        match value {
            0x01 => Ok(PacketKind::Unconnected),
            0x02 => Ok(PacketKind::Broadcast),
            0x03 => Ok(PacketKind::ConnectRequest),
            0x04 => Ok(PacketKind::ConnectAccept),
            0x05 => Ok(PacketKind::ConnectReject),
            0x06 => Ok(PacketKind::Data),
            0x07 => Ok(PacketKind::Disconnect),
            0x08 => Ok(PacketKind::Ping),
            0x09 => Ok(PacketKind::Pong),
            other => Err(PacketError::UnknownKind(other)),
        }
    }
}

/// A decoded datagram.  Bodies borrow from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet<'a> {
    Unconnected(&'a [u8]),
    Broadcast(&'a [u8]),
    ConnectRequest { connect_data: &'a [u8] },
    ConnectAccept,
    ConnectReject,
    Data {
        channel: u8,
        delivery: DeliveryMethod,
        payload: &'a [u8],
    },
    Disconnect,
    Ping,
    Pong,
}

impl Packet<'_> {
    /// Returns the kind byte for this packet.
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Unconnected(_) => PacketKind::Unconnected,
            Packet::Broadcast(_) => PacketKind::Broadcast,
            Packet::ConnectRequest { .. } => PacketKind::ConnectRequest,
            Packet::ConnectAccept => PacketKind::ConnectAccept,
            Packet::ConnectReject => PacketKind::ConnectReject,
            Packet::Data { .. } => PacketKind::Data,
            Packet::Disconnect => PacketKind::Disconnect,
            Packet::Ping => PacketKind::Ping,
            Packet::Pong => PacketKind::Pong,
        }
    }
}

/// Encodes a [`Packet`] into a datagram.
pub fn encode_packet(packet: &Packet<'_>) -> Vec<u8> {
    let mut buf = vec![packet.kind() as u8];
    match packet {
        Packet::Unconnected(body) | Packet::Broadcast(body) => buf.extend_from_slice(body),
        Packet::ConnectRequest { connect_data } => buf.extend_from_slice(connect_data),
        Packet::Data {
            channel,
            delivery,
            payload,
        } => {
            buf.push(*channel);
            buf.push(*delivery as u8);
            buf.extend_from_slice(payload);
        }
        Packet::ConnectAccept
        | Packet::ConnectReject
        | Packet::Disconnect
        | Packet::Ping
        | Packet::Pong => {}
    }
    buf
}

/// Decodes one datagram.
///
/// # Errors
///
/// Returns [`PacketError`] for empty, unknown or truncated datagrams.
pub fn decode_packet(bytes: &[u8]) -> Result<Packet<'_>, PacketError> {
    let (&kind_byte, body) = bytes.split_first().ok_or(PacketError::Empty)?;
    let packet = match PacketKind::try_from(kind_byte)? {
        PacketKind::Unconnected => Packet::Unconnected(body),
        PacketKind::Broadcast => Packet::Broadcast(body),
        PacketKind::ConnectRequest => Packet::ConnectRequest { connect_data: body },
        PacketKind::ConnectAccept => Packet::ConnectAccept,
        PacketKind::ConnectReject => Packet::ConnectReject,
        PacketKind::Data => {
            if body.len() < 2 {
                return Err(PacketError::TruncatedData(bytes.len()));
            }
            let delivery = DeliveryMethod::try_from(body[1])
                .map_err(|_| PacketError::UnknownDeliveryMethod(body[1]))?;
            Packet::Data {
                channel: body[0],
                delivery,
                payload: &body[2..],
            }
        }
        PacketKind::Disconnect => Packet::Disconnect,
        PacketKind::Ping => Packet::Ping,
        PacketKind::Pong => Packet::Pong,
    };
    Ok(packet)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
