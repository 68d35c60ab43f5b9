pub mod archive;
pub mod credentials;

pub use archive::ArchiveService;
pub use credentials::{CredentialScope, CredentialStore, MemoryCredentialStore, MASTER_PASSWORD_KEY};
