// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Crypto Engine
//!
//! Stateless symmetric primitives used by the token envelopes.
//!
//! ## Wire formats
//!
//! - **CBC** (primary): `Base64(IV[16] || AES-CBC-PKCS7(plaintext, key))`
//! - **ECB** (legacy): `Base64(AES-ECB-PKCS7(plaintext, key))`, deterministic
//!
//! Key length selects the AES variant: 16, 24 or 32 bytes.
//!
//! ## Security Note
//!
//! Ciphertext is not authenticated. A tampered envelope is rejected only when
//! its padding fails to validate; a flip that still yields valid padding
//! decrypts to garbage and is caught later by the JSON parse. This matches
//! what issuing clients produce and is kept for wire compatibility.

pub mod cipher;
pub mod secret;

pub use cipher::{decrypt, decrypt_ecb, encrypt, encrypt_ecb, IV_LEN};
pub use secret::{derive_printable_secret, PBKDF2_ITERATIONS, SALT_LEN, SECRET_LEN};

/// Errors raised by the crypto engine.
///
/// Variants carry no secret material so they are safe to log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// Key is not a valid AES-128/192/256 length
    #[error("invalid AES key length: {0} bytes")]
    InvalidKeyLength(usize),
    /// Input was not valid standard Base64
    #[error("invalid Base64 encoding")]
    Base64,
    /// Decoded data is too short or not block aligned
    #[error("ciphertext has invalid length: {0} bytes")]
    InvalidCiphertextLength(usize),
    /// PKCS#7 padding did not validate (wrong key or tampered ciphertext)
    #[error("bad padding: wrong key or tampered ciphertext")]
    BadPadding,
    /// Decrypted plaintext was not UTF-8
    #[error("decrypted plaintext is not valid UTF-8")]
    InvalidUtf8,
    /// System random number generator failed
    #[error("secure random generator unavailable")]
    Rng,
}
