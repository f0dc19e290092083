//! Public-key row encryption for reports.
//!
//! Each row gets a fresh symmetric key. The row (a JSON array of strings) is
//! sealed with that key, and the key itself is wrapped for the recipient's
//! X25519 public key with an ephemeral key agreement. A sealed row is stored
//! as two hex columns, so an encrypted report is still a valid CSV file and
//! the station only ever holds the public half.
//!
//! Layout:
//!
//! ```text
//! wrapped_key = ephemeral_public(32) || nonce(12) || seal(kek, row_key)
//! payload     = nonce(12) || seal(row_key, json_row)
//! kek         = SHA-256(domain || shared_secret || ephemeral_public || recipient_public)
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::errors::{AutoTestError, Result};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
const WRAPPED_KEY_LEN: usize = KEY_LEN + NONCE_LEN + KEY_LEN + 16;
const KDF_DOMAIN: &[u8] = b"autotest report row v1";

pub const PUBLIC_KEY_FILE: &str = "report.pub";
pub const SECRET_KEY_FILE: &str = "report.key";

// ============================================================================
// KEYS
// ============================================================================

/// Recipient key pair. Only the public half belongs on a station.
pub struct ReportKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl ReportKeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_hex(&self) -> String {
        hex::encode(self.public.as_bytes())
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret.to_bytes())
    }

    pub fn encryptor(&self) -> RowEncryptor {
        RowEncryptor::new(self.public)
    }

    pub fn decryptor(&self) -> RowDecryptor {
        RowDecryptor::new(self.secret.clone())
    }

    /// Writes `report.pub` and `report.key` into `dir`, returning both paths.
    pub fn write_to(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(dir)?;
        let public = dir.join(PUBLIC_KEY_FILE);
        let secret = dir.join(SECRET_KEY_FILE);
        fs::write(&public, format!("{}\n", self.public_hex()))?;
        fs::write(&secret, format!("{}\n", self.secret_hex()))?;
        Ok((public, secret))
    }
}

fn parse_key(text: &str) -> std::result::Result<[u8; KEY_LEN], String> {
    let bytes = hex::decode(text.trim()).map_err(|e| e.to_string())?;
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| format!("expected {} bytes, found {}", KEY_LEN, bytes.len()))
}

fn read_key(path: &Path) -> Result<[u8; KEY_LEN]> {
    let text = fs::read_to_string(path)?;
    parse_key(&text).map_err(|reason| AutoTestError::Key {
        path: path.to_path_buf(),
        reason,
    })
}

// ============================================================================
// SEALED ROWS
// ============================================================================

/// One encrypted line: the wrapped row key and the sealed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedRow {
    pub wrapped_key: Vec<u8>,
    pub payload: Vec<u8>,
}

impl SealedRow {
    pub fn to_fields(&self) -> Vec<String> {
        vec![hex::encode(&self.wrapped_key), hex::encode(&self.payload)]
    }

    pub fn from_fields(fields: &[String]) -> Result<Self> {
        let [wrapped_key, payload] = fields else {
            return Err(AutoTestError::Crypto(format!(
                "expected 2 columns per encrypted line, found {}",
                fields.len()
            )));
        };
        let decode = |field: &str| {
            hex::decode(field).map_err(|e| AutoTestError::Crypto(format!("bad hex column: {}", e)))
        };
        Ok(Self {
            wrapped_key: decode(wrapped_key.as_str())?,
            payload: decode(payload.as_str())?,
        })
    }
}

fn seal(key: &Key, plaintext: &[u8]) -> Result<Vec<u8>> {
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let sealed = ChaCha20Poly1305::new(key)
        .encrypt(&nonce, plaintext)
        .map_err(|_| AutoTestError::Crypto("encryption failed".to_string()))?;
    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

fn open(key: &Key, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(AutoTestError::Crypto("sealed data is truncated".to_string()));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    ChaCha20Poly1305::new(key)
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| {
            AutoTestError::Crypto("authentication failed, wrong key or corrupt row".to_string())
        })
}

fn key_encryption_key(shared: &[u8], ephemeral: &PublicKey, recipient: &PublicKey) -> Key {
    let digest = Sha256::new()
        .chain_update(KDF_DOMAIN)
        .chain_update(shared)
        .chain_update(ephemeral.as_bytes())
        .chain_update(recipient.as_bytes())
        .finalize();
    *Key::from_slice(&digest)
}

// ============================================================================
// ENCRYPTION
// ============================================================================

/// Seals rows for one recipient public key.
#[derive(Clone)]
pub struct RowEncryptor {
    recipient: PublicKey,
}

impl std::fmt::Debug for RowEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RowEncryptor({})", hex::encode(self.recipient.as_bytes()))
    }
}

impl RowEncryptor {
    pub fn new(recipient: PublicKey) -> Self {
        Self { recipient }
    }

    pub fn from_hex(text: &str) -> Result<Self> {
        let bytes = parse_key(text).map_err(AutoTestError::Crypto)?;
        Ok(Self::new(PublicKey::from(bytes)))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(PublicKey::from(read_key(path)?)))
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<SealedRow> {
        let row_key = ChaCha20Poly1305::generate_key(&mut OsRng);
        let payload = seal(&row_key, plaintext)?;

        let ephemeral = EphemeralSecret::random_from_rng(OsRng);
        let ephemeral_public = PublicKey::from(&ephemeral);
        let shared = ephemeral.diffie_hellman(&self.recipient);
        let kek = key_encryption_key(shared.as_bytes(), &ephemeral_public, &self.recipient);

        let mut wrapped_key = Vec::with_capacity(WRAPPED_KEY_LEN);
        wrapped_key.extend_from_slice(ephemeral_public.as_bytes());
        wrapped_key.extend(seal(&kek, &row_key)?);

        Ok(SealedRow {
            wrapped_key,
            payload,
        })
    }

    /// Seals a logical row into the two hex columns written to disk.
    pub fn seal_row(&self, row: &[String]) -> Result<Vec<String>> {
        let json = serde_json::to_vec(row).map_err(|e| AutoTestError::Crypto(e.to_string()))?;
        Ok(self.encrypt(&json)?.to_fields())
    }
}

// ============================================================================
// DECRYPTION
// ============================================================================

/// Opens rows sealed for the matching public key.
pub struct RowDecryptor {
    secret: StaticSecret,
}

impl RowDecryptor {
    pub fn new(secret: StaticSecret) -> Self {
        Self { secret }
    }

    pub fn from_hex(text: &str) -> Result<Self> {
        let bytes = parse_key(text).map_err(AutoTestError::Crypto)?;
        Ok(Self::new(StaticSecret::from(bytes)))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(StaticSecret::from(read_key(path)?)))
    }

    pub fn decrypt(&self, sealed: &SealedRow) -> Result<Vec<u8>> {
        if sealed.wrapped_key.len() != WRAPPED_KEY_LEN {
            return Err(AutoTestError::Crypto(format!(
                "wrapped key is {} bytes, expected {}",
                sealed.wrapped_key.len(),
                WRAPPED_KEY_LEN
            )));
        }
        let (ephemeral, wrapped) = sealed.wrapped_key.split_at(KEY_LEN);
        let mut ephemeral_bytes = [0u8; KEY_LEN];
        ephemeral_bytes.copy_from_slice(ephemeral);
        let ephemeral = PublicKey::from(ephemeral_bytes);

        let recipient = PublicKey::from(&self.secret);
        let shared = self.secret.diffie_hellman(&ephemeral);
        let kek = key_encryption_key(shared.as_bytes(), &ephemeral, &recipient);

        let row_key = open(&kek, wrapped)?;
        open(Key::from_slice(&row_key), &sealed.payload)
    }

    /// Opens the two hex columns of an encrypted line back into the row.
    pub fn open_row(&self, fields: &[String]) -> Result<Vec<String>> {
        let plain = self.decrypt(&SealedRow::from_fields(fields)?)?;
        serde_json::from_slice(&plain).map_err(|e| AutoTestError::Crypto(e.to_string()))
    }

    /// Decrypts every line of an encrypted CSV report, header first.
    pub fn open_report(&self, path: &Path) -> Result<Vec<Vec<String>>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(|source| AutoTestError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|source| AutoTestError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            let fields: Vec<String> = record.iter().map(str::to_string).collect();
            rows.push(self.open_row(&fields)?);
        }
        Ok(rows)
    }
}
