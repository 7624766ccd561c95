//! User accounts: Argon2id password hashes (PHC strings), admin flag.

use super::{SecureStore, StoreError};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::Utc;
use rand::RngCore;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::info;

const SALT_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub username: String,
    pub is_admin: bool,
}

fn hasher() -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default())
}

/// Hash with a fresh random salt; the PHC string carries salt and parameters.
fn hash_password(password: &str) -> Result<String, StoreError> {
    let mut bytes = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    let salt = SaltString::encode_b64(&bytes).map_err(|e| StoreError::Crypto(e.to_string()))?;
    let hash = hasher()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| StoreError::Crypto(e.to_string()))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored: &str) -> Result<bool, StoreError> {
    let parsed = PasswordHash::new(stored).map_err(|e| StoreError::Corrupt(format!("password hash: {e}")))?;
    Ok(hasher().verify_password(password.as_bytes(), &parsed).is_ok())
}

impl SecureStore {
    pub fn create_user(&self, username: &str, password: &str, is_admin: bool) -> Result<UserAccount, StoreError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(StoreError::InvalidAccount("username and password are required".into()));
        }
        let hash = hash_password(password)?;
        let inserted = self.conn()?.execute(
            "INSERT OR IGNORE INTO users (username, password_hash, is_admin, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![username, hash, is_admin, Utc::now().timestamp_millis()],
        )?;
        if inserted == 0 {
            return Err(StoreError::DuplicateUser(username.to_string()));
        }
        info!(username, is_admin, "user created");
        Ok(UserAccount {
            username: username.to_string(),
            is_admin,
        })
    }

    /// `None` for an unknown user or a wrong password.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<UserAccount>, StoreError> {
        let row: Option<(String, bool)> = self
            .conn()?
            .query_row(
                "SELECT password_hash, is_admin FROM users WHERE username = ?1",
                params![username],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        let Some((stored, is_admin)) = row else {
            return Ok(None);
        };
        if !verify_password(password, &stored)? {
            return Ok(None);
        }
        Ok(Some(UserAccount {
            username: username.to_string(),
            is_admin,
        }))
    }

    pub fn list_users(&self) -> Result<Vec<UserAccount>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT username, is_admin FROM users ORDER BY username")?;
        let rows = stmt.query_map([], |r| {
            Ok(UserAccount {
                username: r.get(0)?,
                is_admin: r.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Seed an administrator when the store has no users yet. Returns whether one was created.
    pub fn ensure_admin(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
        if count > 0 {
            return Ok(false);
        }
        self.create_user(username, password, true)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_authenticate() {
        let store = SecureStore::open_in_memory(b"s").unwrap();
        store.create_user("alice", "pw1", false).unwrap();
        let user = store.authenticate("alice", "pw1").unwrap().unwrap();
        assert!(!user.is_admin);
        assert!(store.authenticate("alice", "wrong").unwrap().is_none());
        assert!(store.authenticate("bob", "pw1").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let store = SecureStore::open_in_memory(b"s").unwrap();
        store.create_user("alice", "pw1", false).unwrap();
        assert!(matches!(
            store.create_user("alice", "other", true),
            Err(StoreError::DuplicateUser(ref u)) if u == "alice"
        ));
    }

    #[test]
    fn stored_hash_is_an_argon2id_phc_string() {
        let store = SecureStore::open_in_memory(b"s").unwrap();
        store.create_user("alice", "pw1", false).unwrap();
        let stored: String = store
            .conn()
            .unwrap()
            .query_row("SELECT password_hash FROM users WHERE username = 'alice'", [], |r| r.get(0))
            .unwrap();
        assert!(stored.starts_with("$argon2id$v=19$"), "{stored}");
        assert!(!stored.contains("pw1"));
    }

    #[test]
    fn same_password_hashes_differently_per_user() {
        let store = SecureStore::open_in_memory(b"s").unwrap();
        store.create_user("alice", "same", false).unwrap();
        store.create_user("bob", "same", false).unwrap();
        let hashes: Vec<String> = {
            let conn = store.conn().unwrap();
            let mut stmt = conn.prepare("SELECT password_hash FROM users ORDER BY username").unwrap();
            let rows = stmt.query_map([], |r| r.get(0)).unwrap();
            let hashes = rows.collect::<Result<Vec<String>, _>>().unwrap();
            hashes
        };
        assert_ne!(hashes[0], hashes[1]);
        assert!(store.authenticate("bob", "same").unwrap().is_some());
    }

    #[test]
    fn admin_is_seeded_once() {
        let store = SecureStore::open_in_memory(b"s").unwrap();
        assert!(store.ensure_admin("admin", "admin123").unwrap());
        assert!(!store.ensure_admin("admin", "admin123").unwrap());
        let users = store.list_users().unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].is_admin);
    }
}
