//! Encrypted frame envelope and the cipher / keyed-hash collaborators.
//!
//! Envelope value layout (each item prefixed by a BER length):
//!
//!   1. context id            16 B
//!   2. plaintext offset      u64 (always 0)
//!   3. source key            16 B
//!   4. source length         u64
//!   5. encrypted source      IV (16 B) || cipher(IV, CHECK_VALUE || plaintext)
//!   6. track file id         16 B
//!   7. sequence number       u64 (frame number + 1)
//!   8. MIC                   keyed hash over items 1–7 (HMAC files only)
//!
//! The core never implements a primitive; [`Aes256GcmCipher`] and
//! [`Blake3Mac`] are thin adapters over `aes-gcm` and `blake3`.

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit, OsRng as AeadOsRng};
use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use thiserror::Error;

use crate::error::{Error, Result};
use crate::klv;
use crate::label::{labels, Label};

pub const IV_LEN: usize = 16;
/// Byte length of the AES-GCM nonce taken from the front of the IV.
pub const NONCE_LEN: usize = 12;
/// Known plaintext prefixed to every frame before encryption.
pub const CHECK_VALUE: [u8; 16] = *b"CHUKCHUKCHUKCHUK";

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed: wrong key or corrupted data")]
    DecryptionFailed,
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("Check value mismatch after decryption")]
    CheckValueMismatch,
    #[error("MIC mismatch")]
    MicMismatch,
    #[error("Envelope {field} mismatch")]
    FieldMismatch { field: &'static str },
}

// ── Collaborator traits ──────────────────────────────────────────────────────

/// Opaque block cipher supplied by the caller.
pub trait FrameCipher: Send + Sync {
    /// Label recorded in the cryptographic context.
    fn algorithm(&self) -> Label;
    fn encrypt(&self, iv: &[u8; IV_LEN], plaintext: &[u8]) -> std::result::Result<Vec<u8>, CryptoError>;
    fn decrypt(&self, iv: &[u8; IV_LEN], ciphertext: &[u8]) -> std::result::Result<Vec<u8>, CryptoError>;
}

/// Keyed hash supplied by the caller. Each MIC computation starts a fresh
/// [`MacState`].
pub trait KeyedHash: Send + Sync {
    fn algorithm(&self) -> Label;
    fn begin(&self) -> Box<dyn MacState + '_>;
}

pub trait MacState {
    fn update(&mut self, bytes: &[u8]);
    fn finalize(self: Box<Self>) -> Vec<u8>;
}

/// Everything the writer needs to seal frames.
#[derive(Clone)]
pub struct EncryptionContext {
    pub cipher: Arc<dyn FrameCipher>,
    pub mac: Option<Arc<dyn KeyedHash>>,
}

impl EncryptionContext {
    pub fn new(cipher: Arc<dyn FrameCipher>) -> Self {
        Self { cipher, mac: None }
    }

    pub fn with_mac(mut self, mac: Arc<dyn KeyedHash>) -> Self {
        self.mac = Some(mac);
        self
    }
}

// ── Default primitives ───────────────────────────────────────────────────────

/// AES-256-GCM using the first 12 bytes of the IV as nonce.
pub struct Aes256GcmCipher {
    cipher: Aes256Gcm,
}

impl Aes256GcmCipher {
    pub fn new(key: &[u8; 32]) -> Self {
        Self { cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)) }
    }
}

impl FrameCipher for Aes256GcmCipher {
    fn algorithm(&self) -> Label {
        labels::CIPHER_AES256_GCM
    }

    fn encrypt(&self, iv: &[u8; IV_LEN], plaintext: &[u8]) -> std::result::Result<Vec<u8>, CryptoError> {
        self.cipher
            .encrypt(Nonce::from_slice(&iv[..NONCE_LEN]), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)
    }

    fn decrypt(&self, iv: &[u8; IV_LEN], ciphertext: &[u8]) -> std::result::Result<Vec<u8>, CryptoError> {
        self.cipher
            .decrypt(Nonce::from_slice(&iv[..NONCE_LEN]), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

/// BLAKE3 in keyed mode.
pub struct Blake3Mac {
    key: [u8; 32],
}

impl Blake3Mac {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// MIC key derived from the content key so one secret serves both.
    pub fn derived_from(content_key: &[u8; 32]) -> Self {
        Self { key: blake3::derive_key("trackfile 2024 frame MIC key", content_key) }
    }
}

struct Blake3State(blake3::Hasher);

impl MacState for Blake3State {
    fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().as_bytes().to_vec()
    }
}

impl KeyedHash for Blake3Mac {
    fn algorithm(&self) -> Label {
        labels::MIC_BLAKE3_KEYED
    }

    fn begin(&self) -> Box<dyn MacState + '_> {
        Box::new(Blake3State(blake3::Hasher::new_keyed(&self.key)))
    }
}

/// Derive a 256-bit content key from a passphrase using Argon2id.
///
/// `salt` is normally the 16-byte asset UUID so the same passphrase yields a
/// different key per track file.
pub fn derive_key(password: &str, salt: &[u8]) -> std::result::Result<[u8; 32], CryptoError> {
    let params = Params::new(64 * 1024, 3, 1, Some(32))
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

pub fn random_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    AeadOsRng.fill_bytes(&mut iv);
    iv
}

// ── Envelope ─────────────────────────────────────────────────────────────────

/// Per-file identifiers bound into every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeIds {
    pub context_id: [u8; 16],
    pub track_file_id: [u8; 16],
}

/// Build the envelope value for one frame with a fresh random IV.
pub fn seal(
    ids: &EnvelopeIds,
    source_key: &Label,
    plaintext: &[u8],
    sequence: u64,
    ctx: &EncryptionContext,
) -> Result<Vec<u8>> {
    seal_with_iv(ids, source_key, plaintext, sequence, ctx, &random_iv())
}

pub fn seal_with_iv(
    ids: &EnvelopeIds,
    source_key: &Label,
    plaintext: &[u8],
    sequence: u64,
    ctx: &EncryptionContext,
    iv: &[u8; IV_LEN],
) -> Result<Vec<u8>> {
    let mut block = Vec::with_capacity(CHECK_VALUE.len() + plaintext.len());
    block.extend_from_slice(&CHECK_VALUE);
    block.extend_from_slice(plaintext);
    let ciphertext = ctx.cipher.encrypt(iv, &block)?;

    let mut encrypted = Vec::with_capacity(IV_LEN + ciphertext.len());
    encrypted.extend_from_slice(iv);
    encrypted.extend_from_slice(&ciphertext);

    let mut out = Vec::with_capacity(encrypted.len() + 160);
    push_item(&mut out, &ids.context_id);
    push_item(&mut out, &0u64.to_be_bytes());
    push_item(&mut out, source_key.as_bytes());
    push_item(&mut out, &(plaintext.len() as u64).to_be_bytes());
    push_item(&mut out, &encrypted);
    push_item(&mut out, &ids.track_file_id);
    push_item(&mut out, &sequence.to_be_bytes());

    if let Some(mac) = &ctx.mac {
        let mic = compute_mic(mac.as_ref(), &out);
        push_item(&mut out, &mic);
    }
    Ok(out)
}

fn push_item(out: &mut Vec<u8>, item: &[u8]) {
    klv::put_ber(out, item.len() as u64);
    out.extend_from_slice(item);
}

fn compute_mic(mac: &dyn KeyedHash, covered: &[u8]) -> Vec<u8> {
    let mut state = mac.begin();
    state.update(covered);
    state.finalize()
}

/// A parsed envelope borrowing from the triplet value.
#[derive(Debug, Clone)]
pub struct Envelope<'a> {
    pub context_id: [u8; 16],
    pub plaintext_offset: u64,
    pub source_key: Label,
    pub source_length: u64,
    /// IV followed by ciphertext.
    pub encrypted_source: &'a [u8],
    pub track_file_id: [u8; 16],
    pub sequence: u64,
    pub mic: Option<&'a [u8]>,
    /// Bytes covered by the MIC (items 1–7 with their lengths).
    covered: &'a [u8],
}

impl<'a> Envelope<'a> {
    pub fn parse(value: &'a [u8]) -> Result<Self> {
        let mut pos = 0usize;
        let context_id = fixed16(next_item(value, &mut pos, "context id")?, "context id")?;
        let plaintext_offset = be_u64(next_item(value, &mut pos, "plaintext offset")?, "plaintext offset")?;
        let source_key = Label(fixed16(next_item(value, &mut pos, "source key")?, "source key")?);
        let source_length = be_u64(next_item(value, &mut pos, "source length")?, "source length")?;
        let encrypted_source = next_item(value, &mut pos, "encrypted source")?;
        let track_file_id = fixed16(next_item(value, &mut pos, "track file id")?, "track file id")?;
        let sequence = be_u64(next_item(value, &mut pos, "sequence number")?, "sequence number")?;
        let covered = &value[..pos];
        let mic = if pos < value.len() {
            Some(next_item(value, &mut pos, "MIC")?)
        } else {
            None
        };
        if pos != value.len() {
            return Err(Error::format("trailing bytes after envelope"));
        }
        if plaintext_offset != 0 {
            return Err(Error::format(format!(
                "unsupported plaintext offset {plaintext_offset}"
            )));
        }
        if encrypted_source.len() < IV_LEN + CHECK_VALUE.len() {
            return Err(Error::format("encrypted source shorter than IV and check value"));
        }
        Ok(Self {
            context_id,
            plaintext_offset,
            source_key,
            source_length,
            encrypted_source,
            track_file_id,
            sequence,
            mic,
            covered,
        })
    }

    /// Check the binding fields and, when `mac` is given, the MIC.
    pub fn verify(&self, expected_sequence: u64, expected_track_file: &[u8; 16], mac: Option<&dyn KeyedHash>) -> Result<()> {
        if self.sequence != expected_sequence {
            return Err(CryptoError::FieldMismatch { field: "sequence number" }.into());
        }
        if self.track_file_id != *expected_track_file {
            return Err(CryptoError::FieldMismatch { field: "track file id" }.into());
        }
        let Some(mac) = mac else {
            return Ok(());
        };
        let Some(stored) = self.mic else {
            return Err(Error::Integrity("MIC requested but envelope carries none".into()));
        };
        let computed = compute_mic(mac, self.covered);
        if !constant_time_eq(&computed, stored) {
            return Err(CryptoError::MicMismatch.into());
        }
        Ok(())
    }

    /// Decrypt, authenticate and strip the check value.
    pub fn decrypt(&self, cipher: &dyn FrameCipher) -> Result<Vec<u8>> {
        let (iv, ciphertext) = self.encrypted_source.split_at(IV_LEN);
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| Error::format("short IV"))?;
        let mut block = cipher.decrypt(&iv, ciphertext)?;
        if block.len() < CHECK_VALUE.len() || block[..CHECK_VALUE.len()] != CHECK_VALUE {
            return Err(CryptoError::CheckValueMismatch.into());
        }
        if (block.len() - CHECK_VALUE.len()) as u64 != self.source_length {
            return Err(CryptoError::FieldMismatch { field: "source length" }.into());
        }
        block.drain(..CHECK_VALUE.len());
        Ok(block)
    }
}

fn next_item<'a>(value: &'a [u8], pos: &mut usize, what: &str) -> Result<&'a [u8]> {
    let (len, ber) = klv::decode_ber(value, *pos)
        .map_err(|_| Error::format(format!("envelope {what}: bad length")))?;
    let start = *pos + ber;
    let end = start
        .checked_add(len as usize)
        .filter(|&end| end <= value.len())
        .ok_or_else(|| Error::format(format!("envelope {what} overruns the triplet")))?;
    *pos = end;
    Ok(&value[start..end])
}

fn fixed16(bytes: &[u8], what: &str) -> Result<[u8; 16]> {
    bytes
        .try_into()
        .map_err(|_| Error::format(format!("envelope {what} is {} bytes", bytes.len())))
}

fn be_u64(bytes: &[u8], what: &str) -> Result<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::format(format!("envelope {what} is {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(arr))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDS: EnvelopeIds = EnvelopeIds { context_id: [1; 16], track_file_id: [2; 16] };
    const KEY: [u8; 32] = [9; 32];

    fn ctx(with_mac: bool) -> EncryptionContext {
        let ctx = EncryptionContext::new(Arc::new(Aes256GcmCipher::new(&KEY)));
        if with_mac {
            ctx.with_mac(Arc::new(Blake3Mac::derived_from(&KEY)))
        } else {
            ctx
        }
    }

    fn sealed(with_mac: bool) -> Vec<u8> {
        seal_with_iv(&IDS, &labels::PRORES_PICTURE_ELEMENT, b"frame payload", 5, &ctx(with_mac), &[3; 16]).unwrap()
    }

    #[test]
    fn seal_then_open() {
        let value = sealed(true);
        let env = Envelope::parse(&value).unwrap();
        assert_eq!(env.source_key, labels::PRORES_PICTURE_ELEMENT);
        assert_eq!(env.source_length, 13);
        assert_eq!(&env.encrypted_source[..16], &[3; 16]);
        let c = ctx(true);
        env.verify(5, &IDS.track_file_id, c.mac.as_deref()).unwrap();
        assert_eq!(env.decrypt(c.cipher.as_ref()).unwrap(), b"frame payload");
    }

    #[test]
    fn mic_only_present_with_mac() {
        assert!(Envelope::parse(&sealed(false)).unwrap().mic.is_none());
        assert_eq!(Envelope::parse(&sealed(true)).unwrap().mic.map(|m| m.len()), Some(32));
    }

    #[test]
    fn flipped_ciphertext_fails_integrity() {
        let mut value = sealed(false);
        let env = Envelope::parse(&value).unwrap();
        let ct_end = env.encrypted_source.as_ptr() as usize - value.as_ptr() as usize + env.encrypted_source.len();
        value[ct_end - 1] ^= 0x01;
        let env = Envelope::parse(&value).unwrap();
        let err = env.decrypt(ctx(false).cipher.as_ref()).unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn flipped_mic_fails_integrity() {
        let mut value = sealed(true);
        let last = value.len() - 1;
        value[last] ^= 0x80;
        let env = Envelope::parse(&value).unwrap();
        let c = ctx(true);
        assert!(env.verify(5, &IDS.track_file_id, c.mac.as_deref()).unwrap_err().is_integrity());
    }

    #[test]
    fn wrong_sequence_or_track_file() {
        let value = sealed(false);
        let env = Envelope::parse(&value).unwrap();
        assert!(env.verify(6, &IDS.track_file_id, None).unwrap_err().is_integrity());
        assert!(env.verify(5, &[0; 16], None).unwrap_err().is_integrity());
    }

    #[test]
    fn wrong_key_fails() {
        let value = sealed(false);
        let env = Envelope::parse(&value).unwrap();
        let other = Aes256GcmCipher::new(&[0; 32]);
        assert!(env.decrypt(&other).unwrap_err().is_integrity());
    }

    #[test]
    fn truncated_envelope_is_format_error() {
        let value = sealed(false);
        assert!(Envelope::parse(&value[..40]).unwrap_err().is_format());
    }

    #[test]
    fn derive_key_is_salted() {
        let a = derive_key("secret", b"asset-uuid-00001").unwrap();
        let b = derive_key("secret", b"asset-uuid-00002").unwrap();
        assert_ne!(a, b);
    }
}
