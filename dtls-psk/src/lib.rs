//! Client-side DTLS 1.0 over UDP, authenticated with a pre-shared key: record layer,
//! handshake engine, session, and the single-socket multiplexer applications talk to.

mod endpoint;
mod error;
pub mod handshake;
pub mod record;
pub mod session;

pub use endpoint::{DatagramEvent, Endpoint, EndpointConfig};
pub use error::Error;
