//! Client core for a betting-content marketplace.
//!
//! Two mechanisms live here: the session token lifecycle (acquire,
//! persist, attach, single-flight refresh, forced logout on terminal
//! failure) and the bet submission pipeline (evidence capture, remote
//! extraction, review with corrections, confirmation). Pages, routing,
//! and checkout are consumers of this crate, not part of it.

pub mod account;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod service;

// Re-export core components
pub use crate::auth::{SessionGuard, TokenAuthority, TokenPair, UserIdentity};
pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::http::{ApiRequest, HttpGateway};
pub use crate::pipeline::{
    BetDraft, ConfidenceTier, Evidence, ExtractionResult, ImageFormat, SubmissionPipeline,
    SubmissionState,
};
pub use crate::service::MarketplaceClient;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install a tracing subscriber honoring `RUST_LOG`. Embedders that
/// manage their own subscriber should skip this.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
