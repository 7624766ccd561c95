//! SQLite-backed store. Health-record snapshots and diary entries are sealed
//! with AES-256-GCM under a key derived from the store secret.

use super::StoreError;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

fn derive_key(seed: &[u8]) -> [u8; KEY_LEN] {
    use ring::digest;
    let mut out = [0u8; KEY_LEN];
    let h = digest::digest(&digest::SHA256, seed);
    out[..h.as_ref().len().min(KEY_LEN)].copy_from_slice(h.as_ref());
    out
}

fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<String, StoreError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| StoreError::Crypto(e.to_string()))?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt((&nonce).into(), plaintext)
        .map_err(|e| StoreError::Crypto(e.to_string()))?;
    let mut out = nonce.to_vec();
    out.extend(ciphertext);
    Ok(BASE64.encode(&out))
}

fn decrypt(key: &[u8; KEY_LEN], encoded: &str) -> Result<Vec<u8>, StoreError> {
    let raw = BASE64.decode(encoded)?;
    if raw.len() < NONCE_LEN {
        return Err(StoreError::Crypto("payload too short".into()));
    }
    let (nonce, ct) = raw.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| StoreError::Crypto(e.to_string()))?;
    cipher
        .decrypt(nonce.into(), ct)
        .map_err(|e| StoreError::Crypto(e.to_string()))
}

/// Durable store for user accounts, the append-only prediction log and sleep diaries.
pub struct SecureStore {
    conn: Mutex<Connection>,
    key: [u8; KEY_LEN],
}

impl SecureStore {
    /// Open or create the database at `path`, creating tables on first use.
    pub fn open(path: &Path, secret: &[u8]) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?, secret)
    }

    /// Volatile store, for tests and one-shot runs.
    pub fn open_in_memory(secret: &[u8]) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, secret)
    }

    fn with_connection(conn: Connection, secret: &[u8]) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL,
                is_admin INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS predictions (
                id TEXT PRIMARY KEY,
                ts INTEGER NOT NULL,
                day TEXT NOT NULL,
                username TEXT NOT NULL,
                input_enc TEXT NOT NULL,
                prediction TEXT NOT NULL,
                probabilities TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_predictions_ts ON predictions(ts);
            CREATE INDEX IF NOT EXISTS idx_predictions_day ON predictions(day);
            CREATE TABLE IF NOT EXISTS sleep_log (
                id TEXT PRIMARY KEY,
                ts INTEGER NOT NULL,
                day TEXT NOT NULL,
                username TEXT NOT NULL,
                entry_enc TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sleep_log_user ON sleep_log(username, day);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            key: derive_key(secret),
        })
    }

    pub(super) fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub(super) fn seal(&self, plaintext: &str) -> Result<String, StoreError> {
        encrypt(&self.key, plaintext.as_bytes())
    }

    pub(super) fn open_sealed(&self, encoded: &str) -> Result<String, StoreError> {
        let plain = decrypt(&self.key, encoded)?;
        String::from_utf8(plain).map_err(|e| StoreError::Crypto(e.to_string()))
    }
}
