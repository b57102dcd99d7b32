//! Protocol module: packet envelope, JSON codec, id allocation, method
//! parameter shapes, and server event decoding.

pub mod codec;
pub mod events;
pub mod methods;
pub mod packet;
pub mod sequence;

pub use codec::{decode_packet, encode_method, encode_packet, encode_push, encode_reply, ProtocolError};
pub use events::ServerEvent;
pub use packet::*;
pub use sequence::PacketIdCounter;
