//! Authentication: credential persistence and the session state machine.

pub mod credentials;
pub mod jwt;
pub mod session;
pub mod store;

pub use credentials::{CredentialPair, CredentialStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
pub use session::{SessionSnapshot, SessionStatus, SessionStore};
pub use store::{FileStore, KeyValueStore, KeyringStore, MemoryStore};
