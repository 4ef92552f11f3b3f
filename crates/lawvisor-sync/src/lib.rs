//! Network collaborators for the analysis pipeline, behind the `http` feature.

#[cfg(feature = "http")]
pub mod chat;
#[cfg(feature = "http")]
pub mod gdpr;
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use chat::ChatJudge;
#[cfg(feature = "http")]
pub use gdpr::GdprInfoSource;
#[cfg(feature = "http")]
pub use http::SyncError;
