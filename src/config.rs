use anyhow::{bail, Result};

pub const ES_URL_ENV: &str = "ES_URL";
pub const DEFAULT_ES_URL: &str = "http://localhost:9200";
pub const DEFAULT_SAMPLE_SIZE: u64 = 5;
pub const MAX_SAMPLE_SIZE: u64 = 100;

/// Process-wide settings resolved once at startup and passed to every component
/// that needs them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Base URL of the search backend, without a trailing slash.
    pub es_url: String,
    /// Number of documents `sample_docs` returns when the caller gives no `size`.
    pub default_sample_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            es_url: DEFAULT_ES_URL.to_string(),
            default_sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn new(es_url: &str, default_sample_size: u64) -> Result<Self> {
        let es_url = normalize_base_url(es_url)?;
        if default_sample_size == 0 || default_sample_size > MAX_SAMPLE_SIZE {
            bail!(
                "invalid --sample-size `{default_sample_size}`; expected a value between 1 and {MAX_SAMPLE_SIZE}"
            );
        }

        Ok(Self {
            es_url,
            default_sample_size,
        })
    }
}

pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        bail!("backend URL is empty; set --es-url or {ES_URL_ENV}");
    }

    let Some((scheme, rest)) = trimmed.split_once("://") else {
        bail!("backend URL `{raw}` has no scheme; expected http:// or https://");
    };
    if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
        bail!("unsupported backend URL scheme `{scheme}`; expected http or https");
    }
    if rest.is_empty() {
        bail!("backend URL `{raw}` has no host");
    }

    Ok(trimmed.to_string())
}
