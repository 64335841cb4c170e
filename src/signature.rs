//! Fixed-offset byte signatures ("magic numbers" and byte-order marks).

use std::fmt;

/// An immutable byte pattern expected at a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    offset: usize,
    bytes: &'static [u8],
}

impl Signature {
    pub const fn new(bytes: &'static [u8]) -> Self {
        Self { offset: 0, bytes }
    }

    pub const fn at(offset: usize, bytes: &'static [u8]) -> Self {
        Self { offset, bytes }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn bytes(&self) -> &'static [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of leading bytes needed to test this signature.
    pub fn required_len(&self) -> usize {
        self.offset + self.bytes.len()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", hex::encode_upper(self.bytes), self.offset)
    }
}

/// Compare `signature` against `bytes` at the signature's offset.
///
/// A buffer too short to hold the signature does not match.
pub fn matches(bytes: &[u8], signature: &Signature) -> bool {
    bytes
        .get(signature.offset..signature.required_len())
        .is_some_and(|window| window == signature.bytes)
}

/// First signature in `signatures` that matches `bytes`.
pub fn match_any<'a>(bytes: &[u8], signatures: &'a [Signature]) -> Option<&'a Signature> {
    signatures.iter().find(|sig| matches(bytes, sig))
}

/// Signatures ordered longest-first, so a more specific signature wins over
/// any shorter one that is a prefix of it.
#[derive(Debug, Clone, Default)]
pub struct SignatureSet<T> {
    entries: Vec<(Signature, T)>,
}

impl<T> SignatureSet<T> {
    pub fn new(entries: impl IntoIterator<Item = (Signature, T)>) -> Self {
        let mut entries: Vec<_> = entries.into_iter().collect();
        // stable: equal lengths keep registration order
        entries.sort_by(|(a, _), (b, _)| b.required_len().cmp(&a.required_len()));
        Self { entries }
    }

    /// Bytes to read before calling [`SignatureSet::find`].
    pub fn required_len(&self) -> usize {
        self.entries
            .iter()
            .map(|(sig, _)| sig.required_len())
            .max()
            .unwrap_or(0)
    }

    pub fn find(&self, bytes: &[u8]) -> Option<(&Signature, &T)> {
        self.entries
            .iter()
            .find(|(sig, _)| matches(bytes, sig))
            .map(|(sig, value)| (sig, value))
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Signature, T)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
