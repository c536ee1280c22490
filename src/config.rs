use crate::error::{PdvError, Result};
use url::Url;

pub const ENV_URL: &str = "PDV_SUPABASE_URL";
pub const ENV_KEY: &str = "PDV_SUPABASE_KEY";

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub url: Url,
    pub api_key: String,
}

impl BackendConfig {
    pub fn new(url: Url, api_key: impl Into<String>) -> Self {
        Self {
            url,
            api_key: api_key.into(),
        }
    }

    /// Reads `PDV_SUPABASE_URL` and `PDV_SUPABASE_KEY` from the
    /// environment.
    pub fn from_env() -> Result<Self> {
        let raw_url = std::env::var(ENV_URL)
            .map_err(|_| PdvError::Config(format!("{ENV_URL} is not set")))?;
        let api_key = std::env::var(ENV_KEY)
            .map_err(|_| PdvError::Config(format!("{ENV_KEY} is not set")))?;
        let url = Url::parse(&raw_url)?;
        Ok(Self { url, api_key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_parts() {
        let config = BackendConfig::new(
            Url::parse("https://project.supabase.co").unwrap(),
            "service-key",
        );
        assert_eq!(config.url.host_str(), Some("project.supabase.co"));
        assert_eq!(config.api_key, "service-key");
    }
}
