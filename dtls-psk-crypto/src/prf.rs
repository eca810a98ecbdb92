use crate::error::CryptoError;
use crate::hash::{hmac_md5, hmac_sha1, MD5_LEN, SHA1_LEN};

/// `P_hash(secret, seed, n)` per RFC 2246 §5: `A(0) = seed`, `A(i) = HMAC(secret, A(i-1))`,
/// output block `i` is `HMAC(secret, A(i) || seed)`. Generic over the HMAC function and
/// its output width so the same loop serves both `P_MD5` and `P_SHA1`.
fn p_hash<const HLEN: usize>(
    secret: &[u8],
    seed: &[u8],
    n: usize,
    hmac: impl Fn(&[u8], &[u8]) -> Result<[u8; HLEN], CryptoError>,
) -> Result<Vec<u8>, CryptoError> {
    let mut out = Vec::with_capacity(n + HLEN);
    let mut a = hmac(secret, seed)?.to_vec();
    while out.len() < n {
        let mut input = a.clone();
        input.extend_from_slice(seed);
        let block = hmac(secret, &input)?;
        out.extend_from_slice(&block);
        a = hmac(secret, &a)?.to_vec();
    }
    out.truncate(n);
    Ok(out)
}

fn p_md5(secret: &[u8], seed: &[u8], n: usize) -> Result<Vec<u8>, CryptoError> {
    p_hash::<MD5_LEN>(secret, seed, n, hmac_md5)
}

fn p_sha1(secret: &[u8], seed: &[u8], n: usize) -> Result<Vec<u8>, CryptoError> {
    p_hash::<SHA1_LEN>(secret, seed, n, hmac_sha1)
}

/// Splits `secret` into the two (possibly overlapping) halves `S1`/`S2` the TLS 1.0 PRF
/// mixes into `P_MD5` and `P_SHA1` respectively (RFC 2246 §5): if `secret` has odd
/// length, both halves include the middle byte.
fn split_secret(secret: &[u8]) -> (&[u8], &[u8]) {
    let half = (secret.len() + 1) / 2;
    (&secret[..half], &secret[secret.len() - half..])
}

/// `PRF(secret, label, seed, n) = P_MD5(S1, label||seed) XOR P_SHA1(S2, label||seed)`,
/// truncated to `n` bytes (spec §4.3).
pub fn prf(secret: &[u8], label: &[u8], seed: &[u8], n: usize) -> Result<Vec<u8>, CryptoError> {
    let (s1, s2) = split_secret(secret);
    let mut label_seed = Vec::with_capacity(label.len() + seed.len());
    label_seed.extend_from_slice(label);
    label_seed.extend_from_slice(seed);

    let md5_stream = p_md5(s1, &label_seed, n)?;
    let sha1_stream = p_sha1(s2, &label_seed, n)?;

    let mut out = vec![0u8; n];
    for i in 0..n {
        out[i] = md5_stream[i] ^ sha1_stream[i];
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prf_output_is_a_prefix_of_a_longer_request() {
        let secret = b"test secret for the tls 1.0 prf";
        let seed = b"some seed bytes";
        let short = prf(secret, b"master secret", seed, 32).unwrap();
        let long = prf(secret, b"master secret", seed, 48).unwrap();
        assert_eq!(&long[..32], &short[..]);
    }

    #[test]
    fn prf_is_deterministic() {
        let secret = b"another secret value";
        let seed = b"seed";
        let a = prf(secret, b"client finished", seed, 12).unwrap();
        let b = prf(secret, b"client finished", seed, 12).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn prf_varies_with_label() {
        let secret = b"another secret value";
        let seed = b"seed";
        let a = prf(secret, b"client finished", seed, 12).unwrap();
        let b = prf(secret, b"server finished", seed, 12).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn split_secret_overlaps_on_odd_length() {
        let (s1, s2) = split_secret(b"abcde");
        assert_eq!(s1, b"abc");
        assert_eq!(s2, b"cde");
    }

    #[test]
    fn split_secret_even_length_no_overlap_beyond_half() {
        let (s1, s2) = split_secret(b"abcdef");
        assert_eq!(s1, b"abc");
        assert_eq!(s2, b"def");
    }
}
