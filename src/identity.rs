use std::fmt;

use anyhow::Result;
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::storage::LocalStorage;

/// Storage key the identifier lives under
pub const USER_ID_KEY: &str = "propertyUserId";

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;

/// Per-installation identifier attached to every query so the backend can
/// correlate one user's requests. Not a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// `user_<unix millis>_<9 base-36 chars>`
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect();

        Self(format!("user_{}_{}", Utc::now().timestamp_millis(), suffix))
    }

    /// Reuse the persisted identifier, or synthesize and persist a new one.
    pub fn load_or_create(storage: &mut LocalStorage) -> Result<Self> {
        if let Some(existing) = storage.get(USER_ID_KEY).filter(|id| !id.is_empty()) {
            return Ok(Self(existing.to_string()));
        }

        let id = Self::generate();
        storage.set(USER_ID_KEY, id.as_str())?;
        info!(user_id = %id, "created new user identifier");
        Ok(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
