//! Initialization contract for [`crate::ApiClient`].

use std::collections::BTreeMap;
use std::env;

use serde::Deserialize;

pub const ENV_BASE_URL: &str = "APIKIT_BASE_URL";
pub const ENV_AUTH_TOKEN: &str = "APIKIT_AUTH_TOKEN";
pub const ENV_RESOURCE_PATH: &str = "APIKIT_RESOURCE_PATH";

/// Settings applied by `ApiClient::new` and `ApiClient::initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    #[serde(alias = "base_url", rename = "baseURL")]
    pub base_url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, alias = "auth_token")]
    pub auth_token: Option<String>,
    #[serde(default, alias = "resource_path")]
    pub resource_path: String,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: BTreeMap::new(),
            auth_token: None,
            resource_path: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_resource_path(mut self, path: impl Into<String>) -> Self {
        self.resource_path = path.into();
        self
    }

    /// Read `APIKIT_BASE_URL`, `APIKIT_AUTH_TOKEN` and `APIKIT_RESOURCE_PATH`.
    ///
    /// Returns `None` when no base URL is set. Empty token values count as
    /// unset.
    pub fn from_env() -> Option<Self> {
        let base_url = env::var(ENV_BASE_URL).ok().filter(|v| !v.is_empty())?;
        let mut config = Self::new(base_url);
        config.auth_token = env::var(ENV_AUTH_TOKEN).ok().filter(|v| !v.is_empty());
        config.resource_path = env::var(ENV_RESOURCE_PATH).unwrap_or_default();
        Some(config)
    }
}
