//! Wire codecs for the DTLS 1.0 / PSK client: record headers, handshake headers, and
//! every handshake message body this client speaks or parses.

pub mod constants;
mod cursor;
mod error;
pub mod handshake;
pub mod record;

pub use cursor::{ByteReader, ByteWriter};
pub use error::CodecError;
