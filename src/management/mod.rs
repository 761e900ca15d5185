pub mod auth;
pub mod batch;
mod store;
pub mod upload;
pub mod walk;

pub use auth::{AuthPrompt, TokenManager, TokenState};
pub use store::CredentialStore;
pub use upload::{RetryPolicy, UploadOptions, UploadOrchestrator, UploadOutcome, UploadSession};
pub use walk::{Walk, walk};
