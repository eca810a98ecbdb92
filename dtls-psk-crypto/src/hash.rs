use openssl::hash::{Hasher, MessageDigest};
use openssl::pkey::PKey;
use openssl::sign::Signer;

use crate::error::CryptoError;

pub const MD5_LEN: usize = 16;
pub const SHA1_LEN: usize = 20;

pub fn md5(data: &[u8]) -> Result<[u8; MD5_LEN], CryptoError> {
    let mut h = Hasher::new(MessageDigest::md5())?;
    h.update(data)?;
    let out = h.finish()?;
    let mut a = [0u8; MD5_LEN];
    a.copy_from_slice(&out);
    Ok(a)
}

pub fn sha1(data: &[u8]) -> Result<[u8; SHA1_LEN], CryptoError> {
    let mut h = Hasher::new(MessageDigest::sha1())?;
    h.update(data)?;
    let out = h.finish()?;
    let mut a = [0u8; SHA1_LEN];
    a.copy_from_slice(&out);
    Ok(a)
}

/// HMAC-SHA1, the only MAC algorithm this client speaks (spec §4.3).
pub fn hmac_sha1(key: &[u8], data: &[u8]) -> Result<[u8; SHA1_LEN], CryptoError> {
    let pkey = PKey::hmac(key)?;
    let mut signer = Signer::new(MessageDigest::sha1(), &pkey)?;
    signer.update(data)?;
    let out = signer.sign_to_vec()?;
    let mut a = [0u8; SHA1_LEN];
    a.copy_from_slice(&out);
    Ok(a)
}

/// HMAC-MD5, used only as the `H` parameter to `P_MD5` inside the TLS 1.0 PRF.
pub fn hmac_md5(key: &[u8], data: &[u8]) -> Result<[u8; MD5_LEN], CryptoError> {
    let pkey = PKey::hmac(key)?;
    let mut signer = Signer::new(MessageDigest::md5(), &pkey)?;
    signer.update(data)?;
    let out = signer.sign_to_vec()?;
    let mut a = [0u8; MD5_LEN];
    a.copy_from_slice(&out);
    Ok(a)
}

/// Constant-time byte comparison: accumulates a bitwise OR over every byte with no
/// early exit, as spec §4.2/§9 require for both record MACs and Finished verify-data
/// so that a mismatch at byte 0 takes the same time as one at the last byte.
#[inline]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for i in 0..a.len() {
        diff |= a[i] ^ b[i];
    }
    diff == 0
}
