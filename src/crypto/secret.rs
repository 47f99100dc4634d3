// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Printable secret generation for new keystore entries.
//!
//! The seed is stretched with a freshly randomised salt, so the same seed
//! never reproduces the same secret. This is a generator, not a KDF: callers
//! must persist the returned secret themselves.

use std::num::NonZeroU32;

use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use super::CryptoError;

/// PBKDF2-HMAC-SHA1 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 65_536;

/// Random salt length in bytes.
pub const SALT_LEN: usize = 20;

/// Generated secret length (256-bit key material, one char per byte).
pub const SECRET_LEN: usize = 32;

const ITERATIONS: NonZeroU32 = match NonZeroU32::new(PBKDF2_ITERATIONS) {
    Some(n) => n,
    None => panic!("iteration count must be non-zero"),
};

/// Printable band the raw bytes are folded into: `(` (40) through `]` (93).
const BAND_START: u8 = 40;
const BAND_WIDTH: u8 = 54;

/// Generate a printable AES-256 secret seeded by `seed`.
///
/// Each derived byte is folded into ASCII 40..=93, then `/`, `=` and `\` are
/// swapped for `!`, `z` and `#` so the result is safe unescaped in JSON
/// strings and query parameters.
pub fn derive_printable_secret(seed: &str) -> Result<String, CryptoError> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt).map_err(|_| CryptoError::Rng)?;

    let mut raw = [0u8; SECRET_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA1,
        ITERATIONS,
        &salt,
        seed.as_bytes(),
        &mut raw,
    );

    Ok(raw.iter().map(|&b| printable(b)).collect())
}

fn printable(byte: u8) -> char {
    // Fold the signed interpretation of the byte.
    let magnitude = (byte as i8).unsigned_abs();
    match magnitude % BAND_WIDTH + BAND_START {
        b'/' => '!',
        b'=' => 'z',
        b'\\' => '#',
        c => c as char,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_is_printable_and_sized() {
        let secret = derive_printable_secret("asldjfaphqjfnpq").unwrap();
        assert_eq!(secret.len(), SECRET_LEN);
        assert!(secret
            .chars()
            .all(|c| c.is_ascii_graphic() && !matches!(c, '/' | '=' | '\\')));
    }

    #[test]
    fn same_seed_yields_different_secrets() {
        let a = derive_printable_secret("service-a").unwrap();
        let b = derive_printable_secret("service-a").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn printable_mapping_matches_band() {
        assert_eq!(printable(0), '(');
        assert_eq!(printable(53), ']');
        assert_eq!(printable(54), '(');
        // 7 + 40 = '/'
        assert_eq!(printable(7), '!');
        // 21 + 40 = '='
        assert_eq!(printable(21), 'z');
        // 52 + 40 = '\'
        assert_eq!(printable(52), '#');
        // -128 folds to 128 % 54 = 20 -> '<'
        assert_eq!(printable(0x80), '<');
        // -1 folds to 1 -> ')'
        assert_eq!(printable(0xFF), ')');
    }

    #[test]
    fn secret_is_a_valid_aes_256_key() {
        let secret = derive_printable_secret("svc").unwrap();
        let encoded = crate::crypto::encrypt("payload", secret.as_bytes()).unwrap();
        assert_eq!(crate::crypto::decrypt(&encoded, secret.as_bytes()).unwrap(), "payload");
    }
}
