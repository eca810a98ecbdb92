//! Per-peer session state (spec §4.5): epochs, sequence numbers, cipher states, the
//! pre-connect application queue, and dispatch of inbound datagrams.

use std::collections::VecDeque;
use std::net::SocketAddr;

use dtls_psk_wire::constants::{alert_description, DTLS_1_0_VERSION};
use dtls_psk_wire::handshake::{Alert, ChangeCipherSpec, HandshakeHeader};
use dtls_psk_wire::record::{ContentType, MAX_SEQUENCE_NUMBER};

use crate::error::Error;
use crate::handshake::{Handshake, HandshakeEffect, HandshakeState};
use crate::record::{self, CipherState, DirectionKeys, PlaintextRecord};

/// Public state exposed to the endpoint, collapsing `HandshakeState` plus the
/// session-level outcomes the handshake engine doesn't itself model (spec §3).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    NotConnected,
    ClientHelloSent,
    FinishedSent,
    Connected,
    Failed,
    Closed,
}

impl From<HandshakeState> for SessionState {
    fn from(s: HandshakeState) -> Self {
        match s {
            HandshakeState::NotConnected => SessionState::NotConnected,
            HandshakeState::ClientHelloSent => SessionState::ClientHelloSent,
            HandshakeState::FinishedSent => SessionState::FinishedSent,
            HandshakeState::Connected => SessionState::Connected,
            HandshakeState::Failed => SessionState::Failed,
        }
    }
}

/// Everything that happened while processing one inbound datagram, for the endpoint to
/// turn into `DatagramEvent`s and outbound sends.
#[derive(Default)]
pub struct SessionOutput {
    pub outbound: Vec<Vec<u8>>,
    pub messages: Vec<Vec<u8>>,
    pub just_connected: bool,
    pub just_disconnected: bool,
}

pub struct Session {
    pub peer: SocketAddr,
    pub state: SessionState,
    handshake: Handshake,
    next_out_epoch: u16,
    next_out_seq: u64,
    write_state: CipherState,
    write_keys: Option<DirectionKeys>,
    read_state: CipherState,
    read_keys: Option<DirectionKeys>,
    app_queue: VecDeque<Vec<u8>>,
}

impl Session {
    pub fn new(peer: SocketAddr, psk_identity: Vec<u8>, psk: Vec<u8>, now_unix_secs: u32) -> Result<Self, Error> {
        Ok(Self {
            peer,
            state: SessionState::NotConnected,
            handshake: Handshake::new(psk_identity, psk, now_unix_secs)?,
            next_out_epoch: 0,
            next_out_seq: 0,
            write_state: CipherState::null(),
            write_keys: None,
            read_state: CipherState::null(),
            read_keys: None,
            app_queue: VecDeque::new(),
        })
    }

    /// Kicks off the handshake, returning the first `ClientHello` datagram to send.
    pub fn start(&mut self) -> Result<Vec<Vec<u8>>, Error> {
        let effects = self.handshake.start()?;
        self.state = self.handshake.state.into();
        self.apply_effects(effects)
    }

    /// Returns the header to stamp on the next outbound record, then advances the
    /// sequence counter. Errs rather than wrapping once the 48-bit sequence number
    /// space for the current epoch is exhausted (spec §3 invariant).
    fn next_out_header(&mut self) -> Result<(u16, u64), Error> {
        if self.next_out_seq > MAX_SEQUENCE_NUMBER {
            return Err(Error::CountersExhausted);
        }
        let v = (self.next_out_epoch, self.next_out_seq);
        self.next_out_seq += 1;
        Ok(v)
    }

    fn encode_record(&mut self, content_type: ContentType, fragment: Vec<u8>) -> Result<Vec<u8>, Error> {
        let (epoch, seq) = self.next_out_header()?;
        let record = PlaintextRecord { content_type, version: DTLS_1_0_VERSION, epoch, sequence_number: seq, fragment };
        record::encode(&record, &self.write_state, self.write_keys.as_ref())
    }

    fn apply_effects(&mut self, effects: Vec<HandshakeEffect>) -> Result<Vec<Vec<u8>>, Error> {
        let mut outbound = Vec::new();
        for effect in effects {
            match effect {
                HandshakeEffect::EmitHandshake(bytes) => {
                    outbound.push(self.encode_record(ContentType::Handshake, bytes)?);
                }
                HandshakeEffect::EmitChangeCipherSpecAndSwapWrite { bulk_algo, mac_algo, keys } => {
                    let ccs = ChangeCipherSpec::create(1)?;
                    outbound.push(self.encode_record(ContentType::ChangeCipherSpec, ccs.to_bytes())?);
                    if self.next_out_epoch == u16::MAX {
                        return Err(Error::CountersExhausted);
                    }
                    log::debug!("{}: write epoch {} -> {}", self.peer, self.next_out_epoch, self.next_out_epoch + 1);
                    self.next_out_epoch += 1;
                    self.next_out_seq = 0;
                    self.write_state = CipherState { bulk_algo, mac_algo };
                    self.write_keys = Some(DirectionKeys { mac_secret: keys.mac_secret, key: keys.key });
                }
                HandshakeEffect::SwapRead { bulk_algo, mac_algo, keys } => {
                    self.read_state = CipherState { bulk_algo, mac_algo };
                    self.read_keys = Some(DirectionKeys { mac_secret: keys.mac_secret, key: keys.key });
                }
                HandshakeEffect::Connected => {
                    self.state = SessionState::Connected;
                }
                HandshakeEffect::Abort => {
                    self.state = SessionState::Failed;
                }
            }
        }
        Ok(outbound)
    }

    /// Queues or immediately sends `data` as application data (spec §4.5).
    pub fn send_application(&mut self, data: Vec<u8>) -> Result<Option<Vec<u8>>, Error> {
        if self.state != SessionState::Connected {
            self.app_queue.push_back(data);
            return Ok(None);
        }
        Ok(Some(self.encode_record(ContentType::ApplicationData, data)?))
    }

    /// Drains the pre-connect queue in FIFO order (spec §4.4/§9), encrypting each entry.
    fn drain_queue(&mut self) -> Result<Vec<Vec<u8>>, Error> {
        let mut out = Vec::with_capacity(self.app_queue.len());
        while let Some(data) = self.app_queue.pop_front() {
            out.push(self.encode_record(ContentType::ApplicationData, data)?);
        }
        Ok(out)
    }

    /// Iteratively decodes and dispatches every record in `bytes`. Stops at the first
    /// `NeedMore` or `Malformed` record, discarding the remainder of the datagram (spec
    /// §4.5: "no partial processing").
    pub fn on_datagram(&mut self, bytes: &[u8]) -> SessionOutput {
        let mut out = SessionOutput::default();
        let mut offset = 0;
        while offset < bytes.len() {
            let decoded = record::decode(&bytes[offset..], &self.read_state, self.read_keys.as_ref());
            let (record, consumed) = match decoded {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("{}: dropping datagram, record decode failed: {e}", self.peer);
                    break;
                }
            };
            offset += consumed;

            match self.dispatch(record) {
                Ok(mut effect_out) => {
                    out.outbound.append(&mut effect_out.outbound);
                    out.messages.append(&mut effect_out.messages);
                    out.just_connected |= effect_out.just_connected;
                    out.just_disconnected |= effect_out.just_disconnected;
                }
                Err(e) => {
                    log::warn!("{}: dropping datagram, dispatch failed: {e}", self.peer);
                    break;
                }
            }
            if self.state == SessionState::Failed {
                break;
            }
        }
        out
    }

    fn dispatch(&mut self, record: PlaintextRecord) -> Result<SessionOutput, Error> {
        let mut out = SessionOutput::default();
        match record.content_type {
            ContentType::Handshake => {
                let (header, consumed) = HandshakeHeader::from_bytes(&record.fragment)?;
                let body_end = consumed + header.length as usize;
                if body_end > record.fragment.len() {
                    return Err(Error::Malformed);
                }
                let body = &record.fragment[consumed..body_end];
                let was_connected = self.state == SessionState::Connected;
                let effects = self.handshake.on_handshake_message(header.msg_type, body, &record.fragment)?;
                let mut outbound = self.apply_effects(effects)?;
                out.outbound.append(&mut outbound);
                if !was_connected && self.state == SessionState::Connected {
                    out.just_connected = true;
                    let mut drained = self.drain_queue()?;
                    out.outbound.append(&mut drained);
                }
            }
            ContentType::ChangeCipherSpec => {
                let (ccs, _) = ChangeCipherSpec::from_bytes(&record.fragment)?;
                let effect = self.handshake.on_change_cipher_spec(ccs.value)?;
                let mut outbound = self.apply_effects(vec![effect])?;
                out.outbound.append(&mut outbound);
            }
            ContentType::Alert => {
                let (alert, _) = Alert::from_bytes(&record.fragment)?;
                match alert.description {
                    alert_description::CLOSE_NOTIFY => {
                        self.state = SessionState::Closed;
                        out.just_disconnected = true;
                    }
                    alert_description::BAD_RECORD_MAC => {
                        self.state = SessionState::Failed;
                    }
                    _ => {}
                }
            }
            ContentType::ApplicationData => {
                if self.state == SessionState::Connected {
                    out.messages.push(record.fragment);
                }
            }
        }
        Ok(out)
    }
}
