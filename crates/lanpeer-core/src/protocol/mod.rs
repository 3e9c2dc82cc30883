//! Protocol module containing the discovery payloads and the datagram framing.

pub mod packet;
pub mod payload;

pub use packet::{decode_packet, encode_packet, Packet, PacketError, PacketKind};
pub use payload::{
    decode_discovery_reply, encode_discovery_probe, encode_discovery_reply, encode_string,
    is_discovery_probe, PayloadError, PayloadReader, DISCOVERY_PROBE, DISCOVERY_REPLY_VALUE,
};
