use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use super::KeyValueStore;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Access and refresh bearer tokens. Always held together.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access: String,
    pub refresh: String,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

// Tokens stay out of logs
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

/// Persists the credential pair under fixed keys.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Load the stored pair. A lone token is discarded and removed.
    pub fn load(&self) -> Result<Option<CredentialPair>> {
        let access = self.backend.get(ACCESS_TOKEN_KEY)?;
        let refresh = self.backend.get(REFRESH_TOKEN_KEY)?;

        match (access, refresh) {
            (Some(access), Some(refresh)) => Ok(Some(CredentialPair { access, refresh })),
            (None, None) => Ok(None),
            _ => {
                warn!("Found only one stored token, discarding");
                self.clear()?;
                Ok(None)
            }
        }
    }

    /// Store both tokens. If the second write fails the first is rolled back.
    pub fn save(&self, pair: &CredentialPair) -> Result<()> {
        self.backend.set(ACCESS_TOKEN_KEY, &pair.access)?;
        if let Err(e) = self.backend.set(REFRESH_TOKEN_KEY, &pair.refresh) {
            let _ = self.backend.remove(ACCESS_TOKEN_KEY);
            return Err(e);
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let access = self.backend.remove(ACCESS_TOKEN_KEY);
        let refresh = self.backend.remove(REFRESH_TOKEN_KEY);
        access.and(refresh)
    }

    /// The underlying key-value backend, shared with other preferences
    pub fn backend(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStore;

    fn store() -> (Arc<MemoryStore>, CredentialStore) {
        let backend = Arc::new(MemoryStore::new());
        let creds = CredentialStore::new(backend.clone());
        (backend, creds)
    }

    #[test]
    fn test_save_load_round_trip() {
        let (_, creds) = store();
        assert_eq!(creds.load().unwrap(), None);

        creds.save(&CredentialPair::new("a1", "r1")).unwrap();
        assert_eq!(creds.load().unwrap(), Some(CredentialPair::new("a1", "r1")));

        creds.clear().unwrap();
        assert_eq!(creds.load().unwrap(), None);
    }

    #[test]
    fn test_lone_token_discarded() {
        let (backend, creds) = store();
        backend.set(ACCESS_TOKEN_KEY, "orphan").unwrap();

        assert_eq!(creds.load().unwrap(), None);
        assert_eq!(backend.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let shown = format!("{:?}", CredentialPair::new("secret-access", "secret-refresh"));
        assert!(!shown.contains("secret"));
    }
}
