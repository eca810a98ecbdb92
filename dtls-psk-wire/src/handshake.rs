use crate::constants::{handshake_type, HANDSHAKE_HEADER_LEN, MAX_COOKIE_LEN, MAX_PSK_IDENTITY_LEN, RANDOM_LEN, VERIFY_DATA_LEN};
use crate::cursor::{ByteReader, ByteWriter};
use crate::error::CodecError;

/// The 12-byte handshake header (spec §6). This client never fragments a handshake
/// message across multiple records (spec §1 non-goal), so `fragment_offset` is always
/// `0` and `fragment_length` always equals `length`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HandshakeHeader {
    pub msg_type: u8,
    pub length: u32,
    pub message_seq: u16,
    pub fragment_offset: u32,
    pub fragment_length: u32,
}

impl HandshakeHeader {
    pub fn create(msg_type: u8, length: u32, message_seq: u16, fragment_offset: u32, fragment_length: u32) -> Result<Self, CodecError> {
        if length > 0xFF_FFFF || fragment_offset > 0xFF_FFFF || fragment_length > 0xFF_FFFF {
            return Err(CodecError::OutOfRange("handshake length field exceeds 24 bits"));
        }
        Ok(Self { msg_type, length, message_seq, fragment_offset, fragment_length })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(HANDSHAKE_HEADER_LEN);
        w.put_u8(self.msg_type);
        w.put_u24(self.length);
        w.put_u16(self.message_seq);
        w.put_u24(self.fragment_offset);
        w.put_u24(self.fragment_length);
        w.into_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), CodecError> {
        if bytes.len() < HANDSHAKE_HEADER_LEN {
            return Err(CodecError::NeedMore);
        }
        let mut r = ByteReader::new(bytes);
        let msg_type = r.get_u8()?;
        let length = r.get_u24()?;
        let message_seq = r.get_u16()?;
        let fragment_offset = r.get_u24()?;
        let fragment_length = r.get_u24()?;
        Ok((Self { msg_type, length, message_seq, fragment_offset, fragment_length }, r.position()))
    }
}

/// Wraps a handshake message body with its header, producing the exact bytes that
/// belong in the running transcript (spec §3's transcript invariant).
pub fn wrap(msg_type: u8, message_seq: u16, body: &[u8]) -> Result<Vec<u8>, CodecError> {
    let header = HandshakeHeader::create(msg_type, body.len() as u32, message_seq, 0, body.len() as u32)?;
    let mut out = header.to_bytes();
    out.extend_from_slice(body);
    Ok(out)
}

/// `ClientHello` body (spec §6). `cookie` is empty on the first flight and carries the
/// server's cookie on the post-`HelloVerifyRequest` retry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientHello {
    pub version: u16,
    pub random: [u8; RANDOM_LEN],
    pub session_id: Vec<u8>,
    pub cookie: Vec<u8>,
    pub cipher_suites: Vec<u16>,
    pub compression_methods: Vec<u8>,
}

impl ClientHello {
    pub fn create(
        version: u16,
        random: [u8; RANDOM_LEN],
        session_id: Vec<u8>,
        cookie: Vec<u8>,
        cipher_suites: Vec<u16>,
        compression_methods: Vec<u8>,
    ) -> Result<Self, CodecError> {
        if session_id.len() > 0xFF {
            return Err(CodecError::OutOfRange("session_id exceeds 255 bytes"));
        }
        if cookie.len() > MAX_COOKIE_LEN {
            return Err(CodecError::OutOfRange("cookie exceeds 32 bytes"));
        }
        if cipher_suites.is_empty() {
            return Err(CodecError::InvalidArgument("cipher_suites must not be empty"));
        }
        if cipher_suites.len() > 0x7FFF {
            return Err(CodecError::OutOfRange("cipher_suites list too long"));
        }
        if compression_methods.is_empty() || compression_methods.len() > 0xFF {
            return Err(CodecError::InvalidArgument("compression_methods must have 1-255 entries"));
        }
        Ok(Self { version, random, session_id, cookie, cipher_suites, compression_methods })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.put_u16(self.version);
        w.put_bytes(&self.random);
        w.put_u8(self.session_id.len() as u8);
        w.put_bytes(&self.session_id);
        w.put_u8(self.cookie.len() as u8);
        w.put_bytes(&self.cookie);
        w.put_u16((self.cipher_suites.len() * 2) as u16);
        for cs in &self.cipher_suites {
            w.put_u16(*cs);
        }
        w.put_u8(self.compression_methods.len() as u8);
        w.put_bytes(&self.compression_methods);
        w.into_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), CodecError> {
        let mut r = ByteReader::new(bytes);
        let version = r.get_u16()?;
        let random = r.get_array::<RANDOM_LEN>()?;
        let sid_len = r.get_u8()? as usize;
        let session_id = r.get_bytes(sid_len)?.to_vec();
        let cookie_len = r.get_u8()? as usize;
        let cookie = r.get_bytes(cookie_len)?.to_vec();
        let suites_len = r.get_u16()? as usize;
        if suites_len % 2 != 0 {
            return Err(CodecError::InvalidArgument("suites_len must be even"));
        }
        let suites_bytes = r.get_bytes(suites_len)?;
        let mut cipher_suites = Vec::with_capacity(suites_len / 2);
        for chunk in suites_bytes.chunks_exact(2) {
            cipher_suites.push(u16::from_be_bytes([chunk[0], chunk[1]]));
        }
        let compr_len = r.get_u8()? as usize;
        let compression_methods = r.get_bytes(compr_len)?.to_vec();
        Ok((Self { version, random, session_id, cookie, cipher_suites, compression_methods }, r.position()))
    }
}

/// `ServerHello` body (spec §6).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerHello {
    pub version: u16,
    pub random: [u8; RANDOM_LEN],
    pub session_id: Vec<u8>,
    pub cipher_suite: u16,
    pub compression_method: u8,
}

impl ServerHello {
    pub fn create(version: u16, random: [u8; RANDOM_LEN], session_id: Vec<u8>, cipher_suite: u16, compression_method: u8) -> Result<Self, CodecError> {
        if session_id.len() > 0xFF {
            return Err(CodecError::OutOfRange("session_id exceeds 255 bytes"));
        }
        Ok(Self { version, random, session_id, cipher_suite, compression_method })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.put_u16(self.version);
        w.put_bytes(&self.random);
        w.put_u8(self.session_id.len() as u8);
        w.put_bytes(&self.session_id);
        w.put_u16(self.cipher_suite);
        w.put_u8(self.compression_method);
        w.into_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), CodecError> {
        let mut r = ByteReader::new(bytes);
        let version = r.get_u16()?;
        let random = r.get_array::<RANDOM_LEN>()?;
        let sid_len = r.get_u8()? as usize;
        let session_id = r.get_bytes(sid_len)?.to_vec();
        let cipher_suite = r.get_u16()?;
        let compression_method = r.get_u8()?;
        Ok((Self { version, random, session_id, cipher_suite, compression_method }, r.position()))
    }
}

/// `HelloVerifyRequest` body (spec §6).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelloVerifyRequest {
    pub version: u16,
    pub cookie: Vec<u8>,
}

impl HelloVerifyRequest {
    pub fn create(version: u16, cookie: Vec<u8>) -> Result<Self, CodecError> {
        if cookie.len() > MAX_COOKIE_LEN {
            return Err(CodecError::OutOfRange("cookie exceeds 32 bytes"));
        }
        Ok(Self { version, cookie })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.put_u16(self.version);
        w.put_u8(self.cookie.len() as u8);
        w.put_bytes(&self.cookie);
        w.into_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), CodecError> {
        let mut r = ByteReader::new(bytes);
        let version = r.get_u16()?;
        let cookie_len = r.get_u8()? as usize;
        let cookie = r.get_bytes(cookie_len)?.to_vec();
        Ok((Self { version, cookie }, r.position()))
    }
}

/// `PskClientKeyExchange` body (spec §6): just the PSK identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PskClientKeyExchange {
    pub identity: Vec<u8>,
}

impl PskClientKeyExchange {
    pub fn create(identity: Vec<u8>) -> Result<Self, CodecError> {
        if identity.len() > MAX_PSK_IDENTITY_LEN {
            return Err(CodecError::OutOfRange("psk identity exceeds u16 length"));
        }
        Ok(Self { identity })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.put_u16(self.identity.len() as u16);
        w.put_bytes(&self.identity);
        w.into_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), CodecError> {
        let mut r = ByteReader::new(bytes);
        let id_len = r.get_u16()? as usize;
        let identity = r.get_bytes(id_len)?.to_vec();
        Ok((Self { identity }, r.position()))
    }
}

/// `Finished` body (spec §6): a fixed 12-byte verify-data field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Finished {
    pub verify_data: [u8; VERIFY_DATA_LEN],
}

impl Finished {
    pub fn create(verify_data: [u8; VERIFY_DATA_LEN]) -> Self {
        Self { verify_data }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.verify_data.to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), CodecError> {
        let mut r = ByteReader::new(bytes);
        let verify_data = r.get_array::<VERIFY_DATA_LEN>()?;
        Ok((Self { verify_data }, r.position()))
    }
}

/// `ServerHelloDone` carries no body.
pub fn server_hello_done_to_bytes() -> Vec<u8> {
    Vec::new()
}

pub fn server_hello_done_from_bytes(bytes: &[u8]) -> Result<((), usize), CodecError> {
    let _ = bytes;
    Ok(((), 0))
}

/// `ChangeCipherSpec` record body (spec §6): a single byte that must equal `1`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChangeCipherSpec {
    pub value: u8,
}

impl ChangeCipherSpec {
    pub fn create(value: u8) -> Result<Self, CodecError> {
        if value != 1 {
            return Err(CodecError::InvalidArgument("change_cipher_spec value must be 1"));
        }
        Ok(Self { value })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        vec![self.value]
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), CodecError> {
        let mut r = ByteReader::new(bytes);
        let value = r.get_u8()?;
        Ok((Self { value }, r.position()))
    }
}

/// `Alert` record body (spec §6).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    pub level: u8,
    pub description: u8,
}

impl Alert {
    pub fn create(level: u8, description: u8) -> Self {
        Self { level, description }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        vec![self.level, self.description]
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), CodecError> {
        let mut r = ByteReader::new(bytes);
        let level = r.get_u8()?;
        let description = r.get_u8()?;
        Ok((Self { level, description }, r.position()))
    }
}
