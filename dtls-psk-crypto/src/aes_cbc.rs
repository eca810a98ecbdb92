use openssl::symm::{Cipher, Crypter, Mode};

use crate::error::CryptoError;

/// AES block size in bytes, used throughout the record layer's padding arithmetic.
pub const AES_BLOCK_SIZE: usize = 16;

pub const AES_128_KEY_LEN: usize = 16;
pub const AES_256_KEY_LEN: usize = 32;

fn cipher_for_key_len(key_len: usize) -> Result<Cipher, CryptoError> {
    match key_len {
        AES_128_KEY_LEN => Ok(Cipher::aes_128_cbc()),
        AES_256_KEY_LEN => Ok(Cipher::aes_256_cbc()),
        _ => Err(CryptoError::InvalidArgument("AES-CBC key must be 16 or 32 bytes")),
    }
}

/// Encrypts `plaintext` (which must already be a whole number of blocks — the caller
/// applies the explicit padding scheme from spec §4.2 before calling this) under `key`
/// and `iv`. OpenSSL's own padding is disabled since DTLS 1.0 uses its own padding
/// format, not PKCS#7 (grounded on the teacher's `aes-gmac-siv` use of
/// `openssl::symm::Crypter` directly rather than the one-shot `encrypt` helper, which
/// always pads).
pub fn encrypt(key: &[u8], iv: &[u8; AES_BLOCK_SIZE], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if plaintext.len() % AES_BLOCK_SIZE != 0 {
        return Err(CryptoError::InvalidArgument("CBC plaintext must be a whole number of blocks"));
    }
    let cipher = cipher_for_key_len(key.len())?;
    let mut crypter = Crypter::new(cipher, Mode::Encrypt, key, Some(iv))?;
    crypter.pad(false);
    let mut out = vec![0u8; plaintext.len() + AES_BLOCK_SIZE];
    let mut count = crypter.update(plaintext, &mut out)?;
    count += crypter.finalize(&mut out[count..])?;
    out.truncate(count);
    Ok(out)
}

/// Decrypts `ciphertext` under `key` and `iv`, with padding disabled (same rationale as
/// [`encrypt`]); the caller interprets the trailing padding bytes per spec §4.2.
pub fn decrypt(key: &[u8], iv: &[u8; AES_BLOCK_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() % AES_BLOCK_SIZE != 0 {
        return Err(CryptoError::InvalidArgument("CBC ciphertext must be a whole number of blocks"));
    }
    let cipher = cipher_for_key_len(key.len())?;
    let mut crypter = Crypter::new(cipher, Mode::Decrypt, key, Some(iv))?;
    crypter.pad(false);
    let mut out = vec![0u8; ciphertext.len() + AES_BLOCK_SIZE];
    let mut count = crypter.update(ciphertext, &mut out)?;
    count += crypter.finalize(&mut out[count..])?;
    out.truncate(count);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_aes_128() {
        let key = [0x42u8; AES_128_KEY_LEN];
        let iv = [0x24u8; AES_BLOCK_SIZE];
        let plaintext = [7u8; AES_BLOCK_SIZE * 3];
        let ct = encrypt(&key, &iv, &plaintext).unwrap();
        assert_eq!(ct.len(), plaintext.len());
        let pt = decrypt(&key, &iv, &ct).unwrap();
        assert_eq!(pt, plaintext);
    }

    #[test]
    fn round_trips_aes_256() {
        let key = [0x11u8; AES_256_KEY_LEN];
        let iv = [0x99u8; AES_BLOCK_SIZE];
        let plaintext = [3u8; AES_BLOCK_SIZE * 2];
        let ct = encrypt(&key, &iv, &plaintext).unwrap();
        let pt = decrypt(&key, &iv, &ct).unwrap();
        assert_eq!(pt, plaintext);
    }

    #[test]
    fn rejects_partial_block() {
        let key = [0u8; AES_128_KEY_LEN];
        let iv = [0u8; AES_BLOCK_SIZE];
        assert!(encrypt(&key, &iv, &[0u8; 5]).is_err());
    }
}
