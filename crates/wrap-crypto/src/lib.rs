//! Cryptographic primitives for the gift-wrap / seal / inner envelope protocol.
//!
//! Conversation keys are derived from ECDH shared secrets (symmetric in the
//! two parties' roles) and used to key an AEAD for the seal and wrap layers.
//! Signing uses BIP-340 Schnorr signatures over x-only public keys, the same
//! discipline Nostr relays use for event authentication.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use secp256k1::{Keypair, Message, PublicKey, Secp256k1, SecretKey, XOnlyPublicKey};
use sha2::{Digest, Sha256};
use std::fmt;

/// Ciphertexts (and therefore plaintexts) must fit in a single AEAD seal.
/// The scheme imposes this ceiling; callers chunk larger payloads upstream.
pub const MAX_PLAINTEXT_LEN: usize = 64 * 1024;

const NONCE_LEN: usize = 12;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum CryptoError {
    DecryptError(String),
    VerifyError(String),
    FormatError(String),
    PlaintextTooLarge(usize),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::DecryptError(s) => write!(f, "decrypt error: {}", s),
            CryptoError::VerifyError(s) => write!(f, "verify error: {}", s),
            CryptoError::FormatError(s) => write!(f, "format error: {}", s),
            CryptoError::PlaintextTooLarge(n) => {
                write!(f, "plaintext of {} bytes exceeds {} byte ceiling", n, MAX_PLAINTEXT_LEN)
            }
        }
    }
}

impl std::error::Error for CryptoError {}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// A 32-byte secp256k1 scalar, hex-encoded at the API boundary.
#[derive(Clone)]
pub struct SecretKeyHex(pub SecretKey);

/// An x-only secp256k1 public key (32 bytes), hex-encoded at the API boundary.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PublicKeyHex(pub XOnlyPublicKey);

impl SecretKeyHex {
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::FormatError(e.to_string()))?;
        let sk = SecretKey::from_slice(&bytes).map_err(|e| CryptoError::FormatError(e.to_string()))?;
        Ok(SecretKeyHex(sk))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.secret_bytes())
    }
}

impl PublicKeyHex {
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::FormatError(e.to_string()))?;
        let pk = XOnlyPublicKey::from_slice(&bytes).map_err(|e| CryptoError::FormatError(e.to_string()))?;
        Ok(PublicKeyHex(pk))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.serialize())
    }
}

/// Generate a fresh random secret key. Used for the proxy's long-lived
/// identity at init time and for a fresh ephemeral key per outgoing wrap.
pub fn random_secret() -> SecretKeyHex {
    let secp = Secp256k1::new();
    let mut rng = rand::rngs::OsRng;
    let (sk, _pk) = secp.generate_keypair(&mut rng);
    SecretKeyHex(sk)
}

/// Derive the x-only public key for a secret key.
pub fn public_of(secret: &SecretKeyHex) -> PublicKeyHex {
    let secp = Secp256k1::new();
    let keypair = Keypair::from_secret_key(&secp, &secret.0);
    let (xonly, _parity) = XOnlyPublicKey::from_keypair(&keypair);
    PublicKeyHex(xonly)
}

// ---------------------------------------------------------------------------
// Conversation keys
// ---------------------------------------------------------------------------

/// Derive the symmetric conversation key shared by `our_secret` and
/// `their_public`. Symmetric: `conversation_key(a, pub(b)) ==
/// conversation_key(b, pub(a))` because ECDH shared secrets commute.
pub fn conversation_key(our_secret: &SecretKeyHex, their_public: &PublicKeyHex) -> [u8; 32] {
    // secp256k1's x-only keys always use the even-parity full point for ECDH.
    let full_pub = PublicKey::from_x_only_public_key(their_public.0, secp256k1::Parity::Even);
    let shared = secp256k1::ecdh::SharedSecret::new(&full_pub, &our_secret.0);

    let hk = Hkdf::<Sha256>::new(Some(b"wrap-proxy-conversation-key"), shared.as_ref());
    let mut okm = [0u8; 32];
    hk.expand(b"conversation-key", &mut okm)
        .expect("32 bytes is a valid HKDF output length");
    okm
}

// ---------------------------------------------------------------------------
// Symmetric encrypt / decrypt
// ---------------------------------------------------------------------------

/// Encrypt `plaintext` with `conv_key`, returning a base64 ciphertext string
/// of the form `base64(nonce || aead_ciphertext)`.
pub fn encrypt(plaintext: &[u8], conv_key: &[u8; 32]) -> Result<String, CryptoError> {
    if plaintext.len() > MAX_PLAINTEXT_LEN {
        return Err(CryptoError::PlaintextTooLarge(plaintext.len()));
    }
    let cipher = ChaCha20Poly1305::new(Key::from_slice(conv_key));
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ct = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::FormatError(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ct.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ct);
    Ok(base64_encode(&out))
}

/// Decrypt a ciphertext string produced by [`encrypt`].
pub fn decrypt(ciphertext: &str, conv_key: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    let raw = base64_decode(ciphertext).map_err(|e| CryptoError::FormatError(e.to_string()))?;
    if raw.len() < NONCE_LEN {
        return Err(CryptoError::FormatError("ciphertext too short".into()));
    }
    let (nonce_bytes, ct) = raw.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(conv_key));
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, ct)
        .map_err(|e| CryptoError::DecryptError(e.to_string()))
}

fn base64_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.encode(data)
}

fn base64_decode(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.decode(data)
}

// ---------------------------------------------------------------------------
// Event hashing and signing
// ---------------------------------------------------------------------------

/// Compute the sha256 digest of the canonical serialization, hex-encoded.
/// `canonical_json` must already be the compact `[0, pubkey, created_at,
/// kind, tags, content]` array form; this function only hashes it.
pub fn event_id_from_canonical(canonical_json: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json);
    hex::encode(hasher.finalize())
}

/// Sign a 32-byte (hex-encoded) event id with `secret`, returning a 64-byte
/// hex-encoded BIP-340 Schnorr signature.
pub fn sign(secret: &SecretKeyHex, event_id_hex: &str) -> Result<String, CryptoError> {
    let id_bytes = hex::decode(event_id_hex).map_err(|e| CryptoError::FormatError(e.to_string()))?;
    if id_bytes.len() != 32 {
        return Err(CryptoError::FormatError("event id must be 32 bytes".into()));
    }
    let secp = Secp256k1::new();
    let keypair = Keypair::from_secret_key(&secp, &secret.0);
    let msg = Message::from_digest_slice(&id_bytes).map_err(|e| CryptoError::FormatError(e.to_string()))?;
    let mut rng = rand::rngs::OsRng;
    let sig = secp.sign_schnorr_with_rng(&msg, &keypair, &mut rng);
    Ok(hex::encode(sig.as_ref()))
}

/// Verify that `sig_hex` is a valid Schnorr signature by `pubkey` over
/// `event_id_hex`.
pub fn verify(pubkey: &PublicKeyHex, event_id_hex: &str, sig_hex: &str) -> bool {
    let Ok(id_bytes) = hex::decode(event_id_hex) else { return false };
    let Ok(msg) = Message::from_digest_slice(&id_bytes) else { return false };
    let Ok(sig_bytes) = hex::decode(sig_hex) else { return false };
    let Ok(sig) = secp256k1::schnorr::Signature::from_slice(&sig_bytes) else { return false };
    let secp = Secp256k1::new();
    secp.verify_schnorr(&sig, &msg, &pubkey.0).is_ok()
}
