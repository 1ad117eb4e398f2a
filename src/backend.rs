use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::ServerConfig;

/// Blocking access to the search engine's REST surface.
///
/// Every method is a single request/response with no retry. Implementations
/// must report a non-success HTTP status as [`BackendError::Status`] and a
/// network-level failure as [`BackendError::Unavailable`] so callers can tell
/// a missing index apart from a dead backend.
pub trait SearchBackend {
    fn list_indices(&self) -> Result<Vec<String>, BackendError>;
    fn index_exists(&self, index: &str) -> Result<bool, BackendError>;
    fn get_mapping(&self, index: &str) -> Result<Value, BackendError>;
    fn sample_docs(&self, index: &str, size: u64) -> Result<Vec<Value>, BackendError>;
    fn search(&self, index: &str, body: &Value) -> Result<Value, BackendError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("search backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("search backend at {url} is unreachable: {message}")]
    Unavailable { url: String, message: String },
    #[error("unexpected response from search backend: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[derive(Debug, Deserialize)]
struct CatIndex {
    index: String,
}

/// [`SearchBackend`] over HTTP, talking to an Elasticsearch-compatible service.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
            base_url: config.es_url.clone(),
        }
    }

    fn index_url(&self, index: &str, endpoint: &str) -> String {
        format!(
            "{}/{}{}",
            self.base_url,
            urlencoding::encode(index),
            endpoint
        )
    }

    fn check_response(
        &self,
        response: Result<ureq::Response, ureq::Error>,
    ) -> Result<ureq::Response, BackendError> {
        match response {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                tracing::debug!(status, %body, "backend returned error status");
                Err(BackendError::Status { status, body })
            }
            Err(ureq::Error::Transport(transport)) => {
                tracing::warn!(url = %self.base_url, error = %transport, "backend unreachable");
                Err(BackendError::Unavailable {
                    url: self.base_url.clone(),
                    message: transport.to_string(),
                })
            }
        }
    }

    fn read_json(response: ureq::Response) -> Result<Value, BackendError> {
        response
            .into_json::<Value>()
            .map_err(|err| BackendError::Decode(err.to_string()))
    }
}

impl SearchBackend for HttpBackend {
    fn list_indices(&self) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/_cat/indices", self.base_url);
        let response = self.check_response(
            self.agent
                .get(&url)
                .query("format", "json")
                .query("h", "index")
                .call(),
        )?;
        let rows = response
            .into_json::<Vec<CatIndex>>()
            .map_err(|err| BackendError::Decode(format!("index listing: {err}")))?;

        let mut names: Vec<String> = rows.into_iter().map(|row| row.index).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn index_exists(&self, index: &str) -> Result<bool, BackendError> {
        let url = self.index_url(index, "");
        match self.check_response(self.agent.head(&url).call()) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn get_mapping(&self, index: &str) -> Result<Value, BackendError> {
        let url = self.index_url(index, "/_mapping");
        let response = self.check_response(self.agent.get(&url).call())?;
        Self::read_json(response)
    }

    fn sample_docs(&self, index: &str, size: u64) -> Result<Vec<Value>, BackendError> {
        let response = self.search(index, &json!({ "size": size }))?;
        response
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| BackendError::Decode("search response has no `hits.hits` array".into()))
    }

    fn search(&self, index: &str, body: &Value) -> Result<Value, BackendError> {
        let url = self.index_url(index, "/_search");
        let response = self.check_response(self.agent.post(&url).send_json(body))?;
        Self::read_json(response)
    }
}
