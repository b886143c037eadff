// MIT License
//
// Copyright (c) 2026 Raja Lehtihet & Wael El Oraiby
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//
//! Deterministic 64-bit item fingerprints.
//!
//! Fingerprints are always treated as unsigned. Distributions that consume
//! them scale or reduce the full `u64` range, so the bit pattern must match
//! whatever the SQL engine computes for the same string.

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

/// Prefix shared by every salted fingerprint input.
pub const SALT_NAMESPACE: &str = "AnySketchFingerprint";

/// Maps an item to a deterministic, uniformly distributed 64-bit value.
pub trait Fingerprinter: fmt::Debug + Send + Sync {
    /// Returns the fingerprint of `item`.
    fn fingerprint(&self, item: &[u8]) -> u64;
}

/// Shared handle to a fingerprinter, as held by distributions.
pub type SharedFingerprinter = Arc<dyn Fingerprinter>;

/// FarmHash `Fingerprint64`, bit-compatible with BigQuery's `FARM_FINGERPRINT`.
///
/// # Example
/// ```rust
/// use anysketch::fingerprinters::{FarmFingerprinter, Fingerprinter};
///
/// let fingerprinter = FarmFingerprinter;
/// assert_eq!(fingerprinter.fingerprint(b"Foo"), fingerprinter.fingerprint(b"Foo"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FarmFingerprinter;

impl Fingerprinter for FarmFingerprinter {
    fn fingerprint(&self, item: &[u8]) -> u64 {
        farmhash::fingerprint64(item)
    }
}

/// Fingerprint made of the first eight bytes of SHA-256, read little-endian.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Fingerprinter;

impl Fingerprinter for Sha256Fingerprinter {
    fn fingerprint(&self, item: &[u8]) -> u64 {
        let digest = Sha256::digest(item);
        let mut prefix = [0_u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(prefix)
    }
}

/// Decorrelates fingerprints by mixing a per-distribution salt into the input.
///
/// The hashed input is `"AnySketchFingerprint:<item>:<salt>"`, so two
/// distributions with different salts see unrelated fingerprints for the
/// same item.
#[derive(Debug, Clone)]
pub struct SaltedFingerprinter {
    salt: String,
    base: SharedFingerprinter,
}

impl SaltedFingerprinter {
    /// Wraps `base`, salting every input with `salt`.
    pub fn new(salt: impl Into<String>, base: SharedFingerprinter) -> Self {
        Self {
            salt: salt.into(),
            base,
        }
    }

    /// Convenience constructor over [`FarmFingerprinter`].
    pub fn farm(salt: impl Into<String>) -> Self {
        Self::new(salt, Arc::new(FarmFingerprinter))
    }

    /// Returns the salt.
    pub fn salt(&self) -> &str {
        &self.salt
    }

    fn salted_input(&self, item: &[u8]) -> Vec<u8> {
        let mut input =
            Vec::with_capacity(SALT_NAMESPACE.len() + item.len() + self.salt.len() + 2);
        input.extend_from_slice(SALT_NAMESPACE.as_bytes());
        input.push(b':');
        input.extend_from_slice(item);
        input.push(b':');
        input.extend_from_slice(self.salt.as_bytes());
        input
    }
}

impl Fingerprinter for SaltedFingerprinter {
    fn fingerprint(&self, item: &[u8]) -> u64 {
        self.base.fingerprint(&self.salted_input(item))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::{FarmFingerprinter, Fingerprinter, SaltedFingerprinter, Sha256Fingerprinter};

    #[derive(Debug, Default)]
    struct RecordingFingerprinter {
        seen: Mutex<Vec<Vec<u8>>>,
    }

    impl Fingerprinter for RecordingFingerprinter {
        fn fingerprint(&self, item: &[u8]) -> u64 {
            self.seen.lock().unwrap().push(item.to_vec());
            item.len() as u64
        }
    }

    #[test]
    fn farm_fingerprint_of_empty_input_is_k2() {
        assert_eq!(FarmFingerprinter.fingerprint(b""), 0x9AE1_6A3B_2F90_404F);
    }

    #[test]
    fn same_strings_match() {
        assert_eq!(
            FarmFingerprinter.fingerprint(b"Foo"),
            FarmFingerprinter.fingerprint(b"Foo")
        );
        assert_eq!(
            Sha256Fingerprinter.fingerprint(b"Foo"),
            Sha256Fingerprinter.fingerprint(b"Foo")
        );
    }

    #[test]
    fn different_strings_differ() {
        assert_ne!(
            FarmFingerprinter.fingerprint(b"Foo"),
            FarmFingerprinter.fingerprint(b"Bar")
        );
        assert_ne!(
            Sha256Fingerprinter.fingerprint(b"Foo"),
            Sha256Fingerprinter.fingerprint(b"Bar")
        );
    }

    #[test]
    fn sha256_uses_little_endian_digest_prefix() {
        // SHA-256("abc") starts with ba 78 16 bf 8f 01 cf ea.
        assert_eq!(Sha256Fingerprinter.fingerprint(b"abc"), 0xEACF_018F_BF16_78BA);
    }

    #[test]
    fn salt_is_applied_in_canonical_form() {
        let base = Arc::new(RecordingFingerprinter::default());
        let salted = SaltedFingerprinter::new("Index", base.clone());

        assert_eq!(salted.fingerprint(b"42"), "AnySketchFingerprint:42:Index".len() as u64);
        assert_eq!(
            base.seen.lock().unwrap().as_slice(),
            &[b"AnySketchFingerprint:42:Index".to_vec()]
        );
    }

    #[test]
    fn different_salts_decorrelate() {
        let left = SaltedFingerprinter::farm("Index");
        let right = SaltedFingerprinter::farm("SamplingIndicator");
        assert_eq!(left.salt(), "Index");
        assert_ne!(left.fingerprint(b"item"), right.fingerprint(b"item"));
        assert_eq!(
            left.fingerprint(b"item"),
            FarmFingerprinter.fingerprint(b"AnySketchFingerprint:item:Index")
        );
    }
}
