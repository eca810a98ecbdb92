//! Client-side handshake state machine (spec §4.4): flights, transcript, key
//! derivation, and Finished verification. Pure protocol logic — the owning
//! [`crate::session::Session`] applies the effects this module returns (cipher state
//! swaps, epoch bumps, outbound bytes) rather than this module touching sockets itself.

use dtls_psk_crypto::hash;
use dtls_psk_crypto::keys::{self, BulkAlgo, MacAlgo, SessionKeys, MASTER_SECRET_LEN, RANDOM_LEN};
use dtls_psk_crypto::random;
use dtls_psk_crypto::Secret;
use dtls_psk_wire::constants::{cipher_suite, compression_method, handshake_type, DTLS_1_0_VERSION};
use dtls_psk_wire::handshake::{self as wire_hs, ChangeCipherSpec, ClientHello, Finished, HelloVerifyRequest, PskClientKeyExchange, ServerHello};

use crate::error::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HandshakeState {
    NotConnected,
    ClientHelloSent,
    FinishedSent,
    Connected,
    Failed,
}

/// MAC secret + bulk key for one direction, handed to the session to install.
pub struct DirectionKeyMaterial {
    pub mac_secret: Vec<u8>,
    pub key: Vec<u8>,
}

/// An effect the engine asks the owning session to apply, in order.
pub enum HandshakeEffect {
    /// Send this as a `Handshake`-content-type record under the current write state.
    EmitHandshake(Vec<u8>),
    /// Send a `ChangeCipherSpec` record under the current (pre-swap) write state, then
    /// atomically bump the write epoch, reset the write sequence number, and swap the
    /// write cipher state to the given algorithms and keys (spec §3/§4.4).
    EmitChangeCipherSpecAndSwapWrite { bulk_algo: BulkAlgo, mac_algo: MacAlgo, keys: DirectionKeyMaterial },
    /// Swap the read cipher state (inbound `ChangeCipherSpec`).
    SwapRead { bulk_algo: BulkAlgo, mac_algo: MacAlgo, keys: DirectionKeyMaterial },
    /// The handshake completed: transition to `Connected` and drain the queue.
    Connected,
    /// Abort the session silently — no alert is sent (spec §4.4 failure policy).
    Abort,
}

pub struct Handshake {
    pub state: HandshakeState,
    transcript: Vec<u8>,
    handshake_seq: u16,
    client_random: [u8; RANDOM_LEN],
    server_random: Option<[u8; RANDOM_LEN]>,
    psk_identity: Vec<u8>,
    psk: Vec<u8>,
    negotiated: Option<(BulkAlgo, MacAlgo)>,
    master_secret: Option<Secret<MASTER_SECRET_LEN>>,
    session_keys: Option<SessionKeys>,
}

impl Handshake {
    pub fn new(psk_identity: Vec<u8>, psk: Vec<u8>, now_unix_secs: u32) -> Result<Self, Error> {
        let client_random = keys::client_random(now_unix_secs)?;
        Ok(Self {
            state: HandshakeState::NotConnected,
            transcript: Vec::new(),
            handshake_seq: 0,
            client_random,
            server_random: None,
            psk_identity,
            psk,
            negotiated: None,
            master_secret: None,
            session_keys: None,
        })
    }

    fn emit_client_hello(&mut self, cookie: Vec<u8>) -> Result<HandshakeEffect, Error> {
        let suites = vec![cipher_suite::TLS_PSK_WITH_AES_256_CBC_SHA, cipher_suite::TLS_PSK_WITH_AES_128_CBC_SHA];
        let ch = ClientHello::create(DTLS_1_0_VERSION, self.client_random, Vec::new(), cookie, suites, vec![compression_method::NULL])?;
        let body = ch.to_bytes();
        let wrapped = wire_hs::wrap(handshake_type::CLIENT_HELLO, self.handshake_seq, &body)?;
        self.handshake_seq += 1;
        self.transcript.extend_from_slice(&wrapped);
        Ok(HandshakeEffect::EmitHandshake(wrapped))
    }

    /// Builds and emits the first `ClientHello` (empty cookie). Spec §4.4 Flight 1.
    pub fn start(&mut self) -> Result<Vec<HandshakeEffect>, Error> {
        let effect = self.emit_client_hello(Vec::new())?;
        self.state = HandshakeState::ClientHelloSent;
        log::debug!("handshake: flight 1, ClientHello sent, state -> {:?}", self.state);
        Ok(vec![effect])
    }

    fn map_cipher_suite(suite: u16) -> Option<(BulkAlgo, MacAlgo)> {
        match suite {
            cipher_suite::TLS_PSK_WITH_AES_128_CBC_SHA => Some((BulkAlgo::Aes128Cbc, MacAlgo::HmacSha1)),
            cipher_suite::TLS_PSK_WITH_AES_256_CBC_SHA => Some((BulkAlgo::Aes256Cbc, MacAlgo::HmacSha1)),
            _ => None,
        }
    }

    /// Handles one parsed handshake message (header already stripped, `body` is the
    /// message body only). `wrapped` is the exact header+body bytes as they appeared on
    /// the wire, for transcript appending.
    pub fn on_handshake_message(&mut self, msg_type: u8, body: &[u8], wrapped: &[u8]) -> Result<Vec<HandshakeEffect>, Error> {
        match (self.state, msg_type) {
            (HandshakeState::ClientHelloSent, handshake_type::HELLO_VERIFY_REQUEST) => {
                let (hvr, _) = HelloVerifyRequest::from_bytes(body)?;
                self.transcript.clear();
                self.handshake_seq = 0;
                let effect = self.emit_client_hello(hvr.cookie)?;
                log::debug!("handshake: HelloVerifyRequest received, ClientHello resent with cookie");
                Ok(vec![effect])
            }
            (HandshakeState::ClientHelloSent, handshake_type::SERVER_HELLO) => {
                let (sh, _) = ServerHello::from_bytes(body)?;
                if sh.compression_method != compression_method::NULL {
                    self.state = HandshakeState::Failed;
                    log::warn!("handshake: ServerHello requested non-NULL compression, aborting");
                    return Ok(vec![HandshakeEffect::Abort]);
                }
                let negotiated = match Self::map_cipher_suite(sh.cipher_suite) {
                    Some(n) => n,
                    None => {
                        self.state = HandshakeState::Failed;
                        log::warn!("handshake: ServerHello negotiated unsupported cipher suite {:#06x}, aborting", sh.cipher_suite);
                        return Ok(vec![HandshakeEffect::Abort]);
                    }
                };
                self.transcript.extend_from_slice(wrapped);
                self.server_random = Some(sh.random);
                self.negotiated = Some(negotiated);
                log::debug!("handshake: ServerHello received, cipher suite {:#06x} negotiated", sh.cipher_suite);
                Ok(vec![])
            }
            (HandshakeState::ClientHelloSent, handshake_type::SERVER_HELLO_DONE) => {
                self.transcript.extend_from_slice(wrapped);
                log::debug!("handshake: ServerHelloDone received, flight 3 (ClientKeyExchange/ChangeCipherSpec/Finished)");
                self.on_server_hello_done()
            }
            (HandshakeState::FinishedSent, handshake_type::FINISHED) => {
                let (finished, _) = Finished::from_bytes(body)?;
                let master = match &self.master_secret {
                    Some(m) => m,
                    None => {
                        self.state = HandshakeState::Failed;
                        log::warn!("handshake: server Finished received before a master secret was derived, aborting");
                        return Ok(vec![HandshakeEffect::Abort]);
                    }
                };
                // Transcript as it stood *before* this Finished arrives.
                let expected = keys::finished_verify_data(master, b"server finished", &self.transcript)?;
                if hash::constant_time_eq(&expected, &finished.verify_data) {
                    self.transcript.extend_from_slice(wrapped);
                    self.state = HandshakeState::Connected;
                    log::debug!("handshake: server Finished verified, state -> Connected");
                    Ok(vec![HandshakeEffect::Connected])
                } else {
                    self.state = HandshakeState::Failed;
                    log::warn!("handshake: server Finished verify-data mismatch, aborting");
                    Ok(vec![HandshakeEffect::Abort])
                }
            }
            _ => {
                log::warn!("handshake: unexpected message type {msg_type} in state {:?}, aborting", self.state);
                self.state = HandshakeState::Failed;
                Ok(vec![HandshakeEffect::Abort])
            }
        }
    }

    fn on_server_hello_done(&mut self) -> Result<Vec<HandshakeEffect>, Error> {
        let (bulk_algo, mac_algo) = match self.negotiated {
            Some(n) => n,
            None => {
                self.state = HandshakeState::Failed;
                return Ok(vec![HandshakeEffect::Abort]);
            }
        };
        let server_random = match self.server_random {
            Some(r) => r,
            None => {
                self.state = HandshakeState::Failed;
                return Ok(vec![HandshakeEffect::Abort]);
            }
        };

        let mut effects = Vec::with_capacity(3);

        // 1. ClientKeyExchange.
        let cke = PskClientKeyExchange::create(self.psk_identity.clone())?;
        let body = cke.to_bytes();
        let wrapped = wire_hs::wrap(handshake_type::CLIENT_KEY_EXCHANGE, self.handshake_seq, &body)?;
        self.handshake_seq += 1;
        self.transcript.extend_from_slice(&wrapped);
        effects.push(HandshakeEffect::EmitHandshake(wrapped));

        // 2. Derive master secret and key block.
        let master = keys::master_secret_from_psk(&self.psk, &self.client_random, &server_random)?;
        let session_keys = keys::key_block(&master, &self.client_random, &server_random, bulk_algo, mac_algo)?;

        // 3. ChangeCipherSpec, then swap the write state.
        effects.push(HandshakeEffect::EmitChangeCipherSpecAndSwapWrite {
            bulk_algo,
            mac_algo,
            keys: DirectionKeyMaterial { mac_secret: session_keys.client_write_mac.clone(), key: session_keys.client_write_key.clone() },
        });

        // 4. Client Finished, computed over the transcript *before* appending itself.
        let client_verify = keys::finished_verify_data(&master, b"client finished", &self.transcript)?;
        let finished = Finished::create(client_verify);
        let body = finished.to_bytes();
        let wrapped = wire_hs::wrap(handshake_type::FINISHED, self.handshake_seq, &body)?;
        self.handshake_seq += 1;
        self.transcript.extend_from_slice(&wrapped);
        effects.push(HandshakeEffect::EmitHandshake(wrapped));

        self.master_secret = Some(master);
        self.session_keys = Some(session_keys);
        self.state = HandshakeState::FinishedSent;
        log::debug!("handshake: flight 3 sent (ClientKeyExchange/ChangeCipherSpec/Finished), state -> {:?}", self.state);
        Ok(effects)
    }

    /// Handles an inbound `ChangeCipherSpec` record body (spec §4.4).
    pub fn on_change_cipher_spec(&mut self, value: u8) -> Result<HandshakeEffect, Error> {
        if ChangeCipherSpec::create(value).is_err() {
            log::warn!("handshake: ChangeCipherSpec with invalid value {value}, aborting");
            self.state = HandshakeState::Failed;
            return Ok(HandshakeEffect::Abort);
        }
        let (bulk_algo, mac_algo) = match self.negotiated {
            Some(n) => n,
            None => {
                log::warn!("handshake: ChangeCipherSpec received before a cipher suite was negotiated, aborting");
                self.state = HandshakeState::Failed;
                return Ok(HandshakeEffect::Abort);
            }
        };
        let session_keys = match &self.session_keys {
            Some(k) => k,
            None => {
                log::warn!("handshake: ChangeCipherSpec received before session keys were derived, aborting");
                self.state = HandshakeState::Failed;
                return Ok(HandshakeEffect::Abort);
            }
        };
        log::debug!("handshake: ChangeCipherSpec received, swapping read cipher state");
        Ok(HandshakeEffect::SwapRead {
            bulk_algo,
            mac_algo,
            keys: DirectionKeyMaterial { mac_secret: session_keys.server_write_mac.clone(), key: session_keys.server_write_key.clone() },
        })
    }

    pub fn abort(&mut self) {
        self.state = HandshakeState::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtls_psk_wire::constants::{handshake_type as ht, RANDOM_LEN as RLEN};
    use dtls_psk_wire::handshake::wrap;

    fn fresh() -> Handshake {
        Handshake::new(b"Client_identity".to_vec(), b"\x01\x02\x03\x04\x05\x06\x07\x08".to_vec(), 1_700_000_000).unwrap()
    }

    #[test]
    fn start_emits_client_hello_with_empty_cookie() {
        let mut hs = fresh();
        let effects = hs.start().unwrap();
        assert_eq!(effects.len(), 1);
        match &effects[0] {
            HandshakeEffect::EmitHandshake(bytes) => {
                let (header, consumed) = dtls_psk_wire::handshake::HandshakeHeader::from_bytes(bytes).unwrap();
                assert_eq!(header.msg_type, ht::CLIENT_HELLO);
                assert_eq!(header.message_seq, 0);
                let (ch, _) = ClientHello::from_bytes(&bytes[consumed..]).unwrap();
                assert!(ch.cookie.is_empty());
            }
            _ => panic!("expected EmitHandshake"),
        }
        assert_eq!(hs.state, HandshakeState::ClientHelloSent);
    }

    #[test]
    fn hello_verify_request_resets_transcript_and_reemits_with_cookie() {
        let mut hs = fresh();
        hs.start().unwrap();
        let transcript_before = hs.transcript.clone();
        assert!(!transcript_before.is_empty());

        let hvr = HelloVerifyRequest::create(DTLS_1_0_VERSION, vec![0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        let body = hvr.to_bytes();
        let wrapped = wrap(ht::HELLO_VERIFY_REQUEST, 0, &body).unwrap();
        let effects = hs.on_handshake_message(ht::HELLO_VERIFY_REQUEST, &body, &wrapped).unwrap();

        match &effects[0] {
            HandshakeEffect::EmitHandshake(bytes) => {
                let (header, consumed) = dtls_psk_wire::handshake::HandshakeHeader::from_bytes(bytes).unwrap();
                assert_eq!(header.message_seq, 0, "handshake_seq must reset to 0");
                let (ch, _) = ClientHello::from_bytes(&bytes[consumed..]).unwrap();
                assert_eq!(ch.cookie, vec![0xDE, 0xAD, 0xBE, 0xEF]);
            }
            _ => panic!("expected EmitHandshake"),
        }
        assert_eq!(hs.transcript.len(), transcript_before.len(), "new transcript should be the same shape (one ClientHello), not a continuation");
        assert_eq!(hs.state, HandshakeState::ClientHelloSent);
        let _ = RLEN;
    }

    #[test]
    fn unknown_cipher_suite_aborts() {
        let mut hs = fresh();
        hs.start().unwrap();
        let sh = ServerHello::create(DTLS_1_0_VERSION, [9u8; RLEN], vec![], 0xFFFF, compression_method::NULL).unwrap();
        let body = sh.to_bytes();
        let wrapped = wrap(ht::SERVER_HELLO, 1, &body).unwrap();
        let effects = hs.on_handshake_message(ht::SERVER_HELLO, &body, &wrapped).unwrap();
        assert!(matches!(effects[0], HandshakeEffect::Abort));
        assert_eq!(hs.state, HandshakeState::Failed);
    }

    #[test]
    fn full_flight_reaches_finished_sent_and_derives_keys() {
        let mut hs = fresh();
        hs.start().unwrap();

        let sh = ServerHello::create(DTLS_1_0_VERSION, [9u8; RLEN], vec![], cipher_suite::TLS_PSK_WITH_AES_128_CBC_SHA, compression_method::NULL).unwrap();
        let body = sh.to_bytes();
        let wrapped = wrap(ht::SERVER_HELLO, 1, &body).unwrap();
        hs.on_handshake_message(ht::SERVER_HELLO, &body, &wrapped).unwrap();

        let wrapped = wrap(ht::SERVER_HELLO_DONE, 2, &[]).unwrap();
        let effects = hs.on_handshake_message(ht::SERVER_HELLO_DONE, &[], &wrapped).unwrap();
        assert_eq!(effects.len(), 3);
        assert!(matches!(effects[0], HandshakeEffect::EmitHandshake(_)));
        assert!(matches!(effects[1], HandshakeEffect::EmitChangeCipherSpecAndSwapWrite { .. }));
        assert!(matches!(effects[2], HandshakeEffect::EmitHandshake(_)));
        assert_eq!(hs.state, HandshakeState::FinishedSent);
        assert!(hs.master_secret.is_some());
        assert!(hs.session_keys.is_some());
    }
}
