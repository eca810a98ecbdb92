use crate::error::CryptoError;
use crate::hash::{md5, sha1};
use crate::prf::prf;
use crate::random;
use crate::secret::Secret;

pub const MASTER_SECRET_LEN: usize = 48;
pub const RANDOM_LEN: usize = 32;
pub const VERIFY_DATA_LEN: usize = 12;

/// Bulk cipher algorithms this client negotiates (spec §3 `CipherState`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BulkAlgo {
    Null,
    Aes128Cbc,
    Aes256Cbc,
}

impl BulkAlgo {
    pub fn key_len(self) -> usize {
        match self {
            Self::Null => 0,
            Self::Aes128Cbc => 16,
            Self::Aes256Cbc => 32,
        }
    }
}

/// MAC algorithms this client negotiates (spec §3 `CipherState`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MacAlgo {
    Null,
    HmacSha1,
}

impl MacAlgo {
    pub fn mac_len(self) -> usize {
        match self {
            Self::Null => 0,
            Self::HmacSha1 => 20,
        }
    }
}

/// The four keys derived from a session's key block, in wire order (spec §3/§4.3).
pub struct SessionKeys {
    pub client_write_mac: Vec<u8>,
    pub server_write_mac: Vec<u8>,
    pub client_write_key: Vec<u8>,
    pub server_write_key: Vec<u8>,
}

/// Builds the PSK premaster secret per spec §4.3: `u16(|psk|) || 0^|psk| || u16(|psk|) || psk`.
fn premaster_from_psk(psk: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if psk.len() > u16::MAX as usize {
        return Err(CryptoError::InvalidArgument("psk too long to encode its own length"));
    }
    let len = psk.len() as u16;
    let mut out = Vec::with_capacity(4 + 2 * psk.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend(std::iter::repeat(0u8).take(psk.len()));
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(psk);
    Ok(out)
}

/// Derives the master secret from a PSK and the two handshake randoms, wiping the
/// premaster secret in place immediately after use (spec §4.3/§5/§9).
pub fn master_secret_from_psk(psk: &[u8], client_random: &[u8; RANDOM_LEN], server_random: &[u8; RANDOM_LEN]) -> Result<Secret<MASTER_SECRET_LEN>, CryptoError> {
    let mut premaster = premaster_from_psk(psk)?;
    let mut seed = Vec::with_capacity(2 * RANDOM_LEN);
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);
    let master = prf(&premaster, b"master secret", &seed, MASTER_SECRET_LEN)?;

    // Wipe the premaster now rather than waiting for it to go out of scope.
    use zeroize::Zeroize;
    premaster.zeroize();

    let mut out = [0u8; MASTER_SECRET_LEN];
    out.copy_from_slice(&master);
    Ok(Secret::new(out))
}

/// Derives and splits the key block (spec §4.3): `PRF(master, "key expansion",
/// server_random || client_random, 2*mac_len + 2*key_len)`.
pub fn key_block(
    master: &Secret<MASTER_SECRET_LEN>,
    client_random: &[u8; RANDOM_LEN],
    server_random: &[u8; RANDOM_LEN],
    bulk: BulkAlgo,
    mac: MacAlgo,
) -> Result<SessionKeys, CryptoError> {
    let mac_len = mac.mac_len();
    let key_len = bulk.key_len();
    let mut seed = Vec::with_capacity(2 * RANDOM_LEN);
    seed.extend_from_slice(server_random);
    seed.extend_from_slice(client_random);
    let block = prf(master.as_bytes(), b"key expansion", &seed, 2 * mac_len + 2 * key_len)?;

    let mut off = 0;
    let client_write_mac = block[off..off + mac_len].to_vec();
    off += mac_len;
    let server_write_mac = block[off..off + mac_len].to_vec();
    off += mac_len;
    let client_write_key = block[off..off + key_len].to_vec();
    off += key_len;
    let server_write_key = block[off..off + key_len].to_vec();

    Ok(SessionKeys { client_write_mac, server_write_mac, client_write_key, server_write_key })
}

/// `Finished.verify_data` per spec §4.3: `PRF(master, label, MD5(T) || SHA1(T), 12)`.
pub fn finished_verify_data(master: &Secret<MASTER_SECRET_LEN>, label: &[u8], transcript: &[u8]) -> Result<[u8; VERIFY_DATA_LEN], CryptoError> {
    let mut seed = Vec::with_capacity(md5_sha1_len());
    seed.extend_from_slice(&md5(transcript)?);
    seed.extend_from_slice(&sha1(transcript)?);
    let v = prf(master.as_bytes(), label, &seed, VERIFY_DATA_LEN)?;
    let mut out = [0u8; VERIFY_DATA_LEN];
    out.copy_from_slice(&v);
    Ok(out)
}

const fn md5_sha1_len() -> usize {
    16 + 20
}

/// Builds the client random field per spec §4.4: a 4-byte big-endian
/// `floor(now_seconds) + r` (`r` a signed 24-bit CSPRNG offset), followed by 28 CSPRNG
/// bytes.
pub fn client_random(now_unix_secs: u32) -> Result<[u8; RANDOM_LEN], CryptoError> {
    let offset = random::signed_i24()?;
    let perturbed = (now_unix_secs as i64 + offset as i64) as u32;
    let mut out = [0u8; RANDOM_LEN];
    out[..4].copy_from_slice(&perturbed.to_be_bytes());
    random::fill(&mut out[4..])?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premaster_has_expected_shape() {
        let psk = b"\x01\x02\x03\x04\x05\x06\x07\x08";
        let pm = premaster_from_psk(psk).unwrap();
        assert_eq!(pm.len(), 4 + 2 * psk.len());
        assert_eq!(&pm[..2], &(psk.len() as u16).to_be_bytes());
        assert!(pm[2..2 + psk.len()].iter().all(|&b| b == 0));
        assert_eq!(&pm[2 + psk.len()..4 + psk.len()], &(psk.len() as u16).to_be_bytes());
        assert_eq!(&pm[4 + psk.len()..], psk);
    }

    #[test]
    fn master_secret_is_deterministic_given_randoms() {
        let psk = b"shared-secret";
        let cr = [1u8; RANDOM_LEN];
        let sr = [2u8; RANDOM_LEN];
        let m1 = master_secret_from_psk(psk, &cr, &sr).unwrap();
        let m2 = master_secret_from_psk(psk, &cr, &sr).unwrap();
        assert_eq!(m1.as_bytes(), m2.as_bytes());
    }

    #[test]
    fn key_block_sizes_match_aes_256() {
        let psk = b"shared-secret";
        let cr = [1u8; RANDOM_LEN];
        let sr = [2u8; RANDOM_LEN];
        let master = master_secret_from_psk(psk, &cr, &sr).unwrap();
        let keys = key_block(&master, &cr, &sr, BulkAlgo::Aes256Cbc, MacAlgo::HmacSha1).unwrap();
        assert_eq!(keys.client_write_key.len(), 32);
        assert_eq!(keys.server_write_key.len(), 32);
        assert_eq!(keys.client_write_mac.len(), 20);
        assert_eq!(keys.server_write_mac.len(), 20);
    }

    #[test]
    fn key_block_sizes_match_aes_128() {
        let psk = b"shared-secret";
        let cr = [1u8; RANDOM_LEN];
        let sr = [2u8; RANDOM_LEN];
        let master = master_secret_from_psk(psk, &cr, &sr).unwrap();
        let keys = key_block(&master, &cr, &sr, BulkAlgo::Aes128Cbc, MacAlgo::HmacSha1).unwrap();
        assert_eq!(keys.client_write_key.len(), 16);
        assert_eq!(keys.server_write_key.len(), 16);
    }

    #[test]
    fn client_random_embeds_clock_field_near_now() {
        let now = 1_700_000_000u32;
        let r = client_random(now).unwrap();
        let embedded = u32::from_be_bytes([r[0], r[1], r[2], r[3]]);
        let delta = (embedded as i64 - now as i64).abs();
        assert!(delta <= (1 << 23), "embedded clock {embedded} too far from {now}");
    }
}
