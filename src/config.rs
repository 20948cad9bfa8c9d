use std::env;
use std::path::PathBuf;

use tracing::debug;

/// Default API base URL when none is configured
const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Default credential store filename, placed in the working directory
const DEFAULT_STORE_FILE: &str = "betslip.credentials.json";

/// Runtime configuration for the client core.
///
/// Values come from the environment (with `.env` support via dotenvy):
/// - `BETSLIP_API_URL`: base URL of the marketplace API
/// - `BETSLIP_STORE_PATH`: path of the credential store file
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the marketplace API, without a trailing slash
    pub api_url: String,
    /// Location of the durable credential store
    pub store_path: PathBuf,
}

impl Config {
    /// Load configuration from the environment, applying defaults for
    /// anything unset.
    pub fn from_env() -> Self {
        // Loads .env if present; missing file is not an error.
        let _ = dotenvy::dotenv();

        let api_url = env::var("BETSLIP_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let store_path = env::var("BETSLIP_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORE_FILE));

        debug!(api_url = %api_url, store_path = %store_path.display(), "Loaded configuration");

        Self {
            api_url,
            store_path,
        }
    }

    /// Build a config with an explicit API base URL (used in tests and by
    /// embedding applications that manage their own settings).
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            store_path: PathBuf::from(DEFAULT_STORE_FILE),
        }
    }
}
