// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! AES encrypt/decrypt in CBC (random IV) and legacy ECB modes.

use aes::{Aes128, Aes192, Aes256};
use base64ct::{Base64, Encoding};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit};
use ring::rand::{SecureRandom, SystemRandom};

use super::CryptoError;

/// Length of the CBC initialization vector prepended to the ciphertext.
pub const IV_LEN: usize = 16;

const BLOCK_LEN: usize = 16;

/// Encrypt `plaintext` under AES-CBC/PKCS#7 with a fresh random IV.
///
/// Returns `Base64(IV || ciphertext)`.
pub fn encrypt(plaintext: &str, key: &[u8]) -> Result<String, CryptoError> {
    let mut iv = [0u8; IV_LEN];
    SystemRandom::new()
        .fill(&mut iv)
        .map_err(|_| CryptoError::Rng)?;

    let ciphertext = cbc_encrypt(key, &iv, plaintext.as_bytes())?;

    let mut envelope = Vec::with_capacity(IV_LEN + ciphertext.len());
    envelope.extend_from_slice(&iv);
    envelope.extend_from_slice(&ciphertext);
    Ok(Base64::encode_string(&envelope))
}

/// Decrypt a `Base64(IV || ciphertext)` string produced by [`encrypt`].
pub fn decrypt(encoded: &str, key: &[u8]) -> Result<String, CryptoError> {
    let raw = decode_base64(encoded)?;
    if raw.len() < IV_LEN {
        return Err(CryptoError::InvalidCiphertextLength(raw.len()));
    }

    let (iv, ciphertext) = raw.split_at(IV_LEN);
    check_block_aligned(ciphertext)?;
    let plaintext = cbc_decrypt(key, iv, ciphertext)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
}

/// Encrypt `plaintext` under AES-ECB/PKCS#7. Deterministic: no IV.
pub fn encrypt_ecb(plaintext: &str, key: &[u8]) -> Result<String, CryptoError> {
    let ciphertext = ecb_encrypt(key, plaintext.as_bytes())?;
    Ok(Base64::encode_string(&ciphertext))
}

/// Decrypt a Base64 AES-ECB/PKCS#7 string produced by [`encrypt_ecb`].
pub fn decrypt_ecb(encoded: &str, key: &[u8]) -> Result<String, CryptoError> {
    let raw = decode_base64(encoded)?;
    check_block_aligned(&raw)?;
    let plaintext = ecb_decrypt(key, &raw)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
}

fn decode_base64(encoded: &str) -> Result<Vec<u8>, CryptoError> {
    Base64::decode_vec(encoded.trim()).map_err(|_| CryptoError::Base64)
}

fn check_block_aligned(ciphertext: &[u8]) -> Result<(), CryptoError> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(CryptoError::InvalidCiphertextLength(ciphertext.len()));
    }
    Ok(())
}

fn cbc_encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let bad_key = |_| CryptoError::InvalidKeyLength(key.len());
    let ciphertext = match key.len() {
        16 => cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(bad_key)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        24 => cbc::Encryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(bad_key)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        32 => cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(bad_key)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        other => return Err(CryptoError::InvalidKeyLength(other)),
    };
    Ok(ciphertext)
}

fn cbc_decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let bad_key = |_| CryptoError::InvalidKeyLength(key.len());
    let plaintext = match key.len() {
        16 => cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(bad_key)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        24 => cbc::Decryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(bad_key)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        32 => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(bad_key)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        other => return Err(CryptoError::InvalidKeyLength(other)),
    };
    plaintext.map_err(|_| CryptoError::BadPadding)
}

fn ecb_encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let bad_key = |_| CryptoError::InvalidKeyLength(key.len());
    let ciphertext = match key.len() {
        16 => ecb::Encryptor::<Aes128>::new_from_slice(key)
            .map_err(bad_key)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        24 => ecb::Encryptor::<Aes192>::new_from_slice(key)
            .map_err(bad_key)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        32 => ecb::Encryptor::<Aes256>::new_from_slice(key)
            .map_err(bad_key)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        other => return Err(CryptoError::InvalidKeyLength(other)),
    };
    Ok(ciphertext)
}

fn ecb_decrypt(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let bad_key = |_| CryptoError::InvalidKeyLength(key.len());
    let plaintext = match key.len() {
        16 => ecb::Decryptor::<Aes128>::new_from_slice(key)
            .map_err(bad_key)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        24 => ecb::Decryptor::<Aes192>::new_from_slice(key)
            .map_err(bad_key)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        32 => ecb::Decryptor::<Aes256>::new_from_slice(key)
            .map_err(bad_key)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        other => return Err(CryptoError::InvalidKeyLength(other)),
    };
    plaintext.map_err(|_| CryptoError::BadPadding)
}
