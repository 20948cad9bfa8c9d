//! Session lifecycle: credential persistence, the token authority that
//! owns the session and runs the single-flight refresh, and the guard
//! facade the presentation layer consumes.

pub mod api;
pub mod authority;
pub mod guard;
pub mod session;
pub mod store;

pub use authority::TokenAuthority;
pub use guard::SessionGuard;
pub use session::{Session, TokenPair, UserIdentity};
pub use store::{CredentialStore, JsonFileStore, MemoryStore};
