//! Encrypted local storage for user accounts, the prediction log and sleep diaries.

mod encrypted;
mod predictions;
mod sleep_log;
mod users;

pub use encrypted::SecureStore;
pub use predictions::PredictionLogEntry;
pub use sleep_log::{AlcoholIntake, CaffeineIntake, SleepLogEntry};
pub use users::UserAccount;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("encryption error: {0}")]
    Crypto(String),

    #[error("encoding error: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("user {0:?} already exists")]
    DuplicateUser(String),

    #[error("invalid account: {0}")]
    InvalidAccount(String),

    #[error("user {0:?} is not allowed to perform this operation")]
    Unauthorized(String),
}
