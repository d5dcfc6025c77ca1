//! SDK and synchronization settings
//!
//! `SdkSettings` identifies the application; `SyncSettings` configures the
//! endpoints and behavior of the synchronization pipeline.

use flagsync_core::SetupError;
use std::time::Duration;

const DEFAULT_CDN_BASE: &str = "https://cdn.flagsync.io/config";
const DEFAULT_API_BASE: &str = "https://api.flagsync.io/config";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Application identity for the SDK
#[derive(Debug, Clone)]
pub struct SdkSettings {
    /// Application key issued by the configuration service
    pub api_key: String,
    /// Secret enabling development-mode tooling; sent with every fetch
    /// request when set
    pub dev_mode_secret: Option<String>,
}

impl SdkSettings {
    /// Create settings for the given application key
    ///
    /// # Errors
    /// - `SetupError::InvalidApiKey` if the key is empty or contains
    ///   path-breaking characters
    pub fn new(api_key: impl Into<String>) -> Result<Self, SetupError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(SetupError::InvalidApiKey("key is empty".to_string()));
        }
        if api_key.contains('/') || api_key.contains(char::is_whitespace) {
            return Err(SetupError::InvalidApiKey(api_key));
        }
        Ok(Self {
            api_key,
            dev_mode_secret: None,
        })
    }

    /// With a development-mode secret
    #[must_use]
    pub fn with_dev_mode_secret(mut self, secret: impl Into<String>) -> Self {
        self.dev_mode_secret = Some(secret.into());
        self
    }
}

/// Endpoint and behavior configuration for the sync pipeline
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Static, cacheable endpoint serving the last published configuration
    pub cdn_base: String,
    /// Dynamic fallback endpoint
    pub api_base: String,
    /// Local development proxy; when set, the Roxy strategy replaces CDN/API
    pub roxy_url: Option<String>,
    /// Build-unique identifier of this SDK/application build
    pub buid: String,
    /// Bound on each network attempt
    pub timeout: Duration,
    /// Signed fallback document applied when no snapshot could be fetched yet
    pub embedded_configuration: Option<String>,
}

impl SyncSettings {
    /// Create settings for the given build-unique identifier
    #[must_use]
    pub fn new(buid: impl Into<String>) -> Self {
        Self {
            cdn_base: DEFAULT_CDN_BASE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            roxy_url: None,
            buid: buid.into(),
            timeout: DEFAULT_TIMEOUT,
            embedded_configuration: None,
        }
    }

    /// With a CDN base URL
    #[must_use]
    pub fn with_cdn_base(mut self, base: impl Into<String>) -> Self {
        self.cdn_base = trim_trailing_slash(base.into());
        self
    }

    /// With an API base URL
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = trim_trailing_slash(base.into());
        self
    }

    /// With a local development proxy URL
    #[must_use]
    pub fn with_roxy_url(mut self, url: impl Into<String>) -> Self {
        self.roxy_url = Some(trim_trailing_slash(url.into()));
        self
    }

    /// With a per-attempt network timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// With an embedded fallback configuration document
    #[must_use]
    pub fn with_embedded_configuration(mut self, document: impl Into<String>) -> Self {
        self.embedded_configuration = Some(document.into());
        self
    }
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdk_settings_rejects_empty_key() {
        assert!(SdkSettings::new("").is_err());
    }

    #[test]
    fn sdk_settings_rejects_path_breaking_key() {
        assert!(SdkSettings::new("a/b").is_err());
        assert!(SdkSettings::new("a key").is_err());
    }

    #[test]
    fn sdk_settings_accepts_plain_key() {
        let settings = SdkSettings::new("5e579ecfc45c395c43b42893").unwrap();
        assert_eq!(settings.api_key, "5e579ecfc45c395c43b42893");
        assert!(settings.dev_mode_secret.is_none());
    }

    #[test]
    fn sync_settings_defaults() {
        let settings = SyncSettings::new("buid-1");
        assert_eq!(settings.buid, "buid-1");
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert!(settings.roxy_url.is_none());
        assert!(settings.embedded_configuration.is_none());
    }

    #[test]
    fn sync_settings_trims_trailing_slashes() {
        let settings = SyncSettings::new("buid-1")
            .with_cdn_base("http://localhost:9000/cdn/")
            .with_roxy_url("http://localhost:4444//");
        assert_eq!(settings.cdn_base, "http://localhost:9000/cdn");
        assert_eq!(settings.roxy_url.as_deref(), Some("http://localhost:4444"));
    }
}
