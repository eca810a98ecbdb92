use crate::constants::{content_type, RECORD_HEADER_LEN};
use crate::cursor::{ByteReader, ByteWriter};
use crate::error::CodecError;

/// The four content types a DTLS 1.0 record may carry (spec §6).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
}

impl ContentType {
    #[inline]
    pub fn to_u8(self) -> u8 {
        match self {
            Self::ChangeCipherSpec => content_type::CHANGE_CIPHER_SPEC,
            Self::Alert => content_type::ALERT,
            Self::Handshake => content_type::HANDSHAKE,
            Self::ApplicationData => content_type::APPLICATION_DATA,
        }
    }

    #[inline]
    pub fn from_u8(v: u8) -> Result<Self, CodecError> {
        match v {
            content_type::CHANGE_CIPHER_SPEC => Ok(Self::ChangeCipherSpec),
            content_type::ALERT => Ok(Self::Alert),
            content_type::HANDSHAKE => Ok(Self::Handshake),
            content_type::APPLICATION_DATA => Ok(Self::ApplicationData),
            _ => Err(CodecError::InvalidArgument("unrecognized content type")),
        }
    }
}

/// The 13-byte record header (spec §3/§6). `sequence_number` is a 48-bit field
/// represented as `u64`; `create` rejects values that don't fit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub version: u16,
    pub epoch: u16,
    pub sequence_number: u64,
    pub length: u16,
}

/// Largest representable 48-bit sequence number.
pub const MAX_SEQUENCE_NUMBER: u64 = (1u64 << 48) - 1;

impl RecordHeader {
    pub fn create(content_type: ContentType, version: u16, epoch: u16, sequence_number: u64, length: u16) -> Result<Self, CodecError> {
        if sequence_number > MAX_SEQUENCE_NUMBER {
            return Err(CodecError::OutOfRange("sequence number exceeds 48 bits"));
        }
        Ok(Self { content_type, version, epoch, sequence_number, length })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(RECORD_HEADER_LEN);
        w.put_u8(self.content_type.to_u8());
        w.put_u16(self.version);
        w.put_u16(self.epoch);
        w.put_u48(self.sequence_number);
        w.put_u16(self.length);
        w.into_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), CodecError> {
        if bytes.len() < RECORD_HEADER_LEN {
            return Err(CodecError::NeedMore);
        }
        let mut r = ByteReader::new(bytes);
        let content_type = ContentType::from_u8(r.get_u8()?)?;
        let version = r.get_u16()?;
        let epoch = r.get_u16()?;
        let sequence_number = r.get_u48()?;
        let length = r.get_u16()?;
        Ok((Self { content_type, version, epoch, sequence_number, length }, r.position()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let h = RecordHeader::create(ContentType::Handshake, 0xFEFF, 1, 12345, 99).unwrap();
        let bytes = h.to_bytes();
        assert_eq!(bytes.len(), RECORD_HEADER_LEN);
        let (h2, consumed) = RecordHeader::from_bytes(&bytes).unwrap();
        assert_eq!(consumed, RECORD_HEADER_LEN);
        assert_eq!(h, h2);
    }

    #[test]
    fn rejects_oversized_sequence_number() {
        assert_eq!(
            RecordHeader::create(ContentType::Handshake, 0xFEFF, 0, 1 << 48, 0).unwrap_err(),
            CodecError::OutOfRange("sequence number exceeds 48 bits")
        );
    }

    #[test]
    fn short_buffer_needs_more() {
        let h = RecordHeader::create(ContentType::Handshake, 0xFEFF, 0, 0, 0).unwrap();
        let bytes = h.to_bytes();
        assert_eq!(RecordHeader::from_bytes(&bytes[..RECORD_HEADER_LEN - 1]).unwrap_err(), CodecError::NeedMore);
    }

    #[test]
    fn rejects_unknown_content_type() {
        assert_eq!(ContentType::from_u8(0xFF).unwrap_err(), CodecError::InvalidArgument("unrecognized content type"));
    }
}
