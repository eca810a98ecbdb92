use zeroize::Zeroize;

/// A fixed-size secret byte buffer that overwrites itself on drop.
///
/// Grounded on the teacher's `zerotier_crypto::secret::Secret<N>`, used throughout
/// `zssp` to carry key material (`noise_ss`, `psk`, session keys) without leaving
/// copies behind in the process image once it goes out of scope.
#[derive(Clone)]
pub struct Secret<const N: usize>([u8; N]);

impl<const N: usize> Secret<N> {
    #[inline]
    pub fn new(b: [u8; N]) -> Self {
        Self(b)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> Drop for Secret<N> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// A heap-allocated secret of runtime-determined length, used for the premaster
/// secret and key block, whose sizes depend on the negotiated cipher suite and PSK
/// length and so cannot be fixed-size arrays.
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    #[inline]
    pub fn new(b: Vec<u8>) -> Self {
        Self(b)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}
