//! Search backend boundary
//!
//! [`SearchBackend`] is the query-execution and index-lifecycle capability
//! the rest of the crate is written against. It is always passed in
//! explicitly. [`ElasticsearchClient`] talks to a real cluster over HTTP;
//! [`crate::search::InMemoryBackend`] evaluates the same request bodies
//! locally.

use std::time::Duration;

use reqwest::Method;
use reqwest::blocking::{Client, Response};
use serde_json::Value;

use crate::config::BackendConfig;
use crate::error::{EvalError, Result};

/// Query execution plus the index operations used by ingestion.
pub trait SearchBackend: Send + Sync {
    /// Run a search request body, returning the backend's response envelope.
    fn search(&self, index: &str, body: &Value) -> Result<Value>;

    fn index_exists(&self, index: &str) -> Result<bool>;

    fn delete_index(&self, index: &str) -> Result<()>;

    /// Create an index from a settings + mappings body.
    fn create_index(&self, index: &str, mapping: &Value) -> Result<()>;

    fn index_document(&self, index: &str, document: &Value) -> Result<()>;

    /// Make indexed documents visible to search.
    fn refresh(&self, index: &str) -> Result<()>;
}

impl<B: SearchBackend + ?Sized> SearchBackend for Box<B> {
    fn search(&self, index: &str, body: &Value) -> Result<Value> {
        (**self).search(index, body)
    }

    fn index_exists(&self, index: &str) -> Result<bool> {
        (**self).index_exists(index)
    }

    fn delete_index(&self, index: &str) -> Result<()> {
        (**self).delete_index(index)
    }

    fn create_index(&self, index: &str, mapping: &Value) -> Result<()> {
        (**self).create_index(index, mapping)
    }

    fn index_document(&self, index: &str, document: &Value) -> Result<()> {
        (**self).index_document(index, document)
    }

    fn refresh(&self, index: &str) -> Result<()> {
        (**self).refresh(index)
    }
}

/// Blocking Elasticsearch REST client.
pub struct ElasticsearchClient {
    base_url: String,
    client: Client,
}

impl std::fmt::Debug for ElasticsearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ElasticsearchClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let base_url = config.url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(EvalError::Config(
                "backend url is empty; set [backend].url".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|err| EvalError::Config(format!("backend http client: {err}")))?;

        Ok(Self { base_url, client })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, index: &str, suffix: &str) -> Result<String> {
        let index = index.trim();
        if index.is_empty() || index.contains('/') {
            return Err(EvalError::Validation(format!(
                "invalid index name: {index:?}"
            )));
        }
        Ok(format!("{}/{index}{suffix}", self.base_url))
    }

    fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Response> {
        let mut request = self.client.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .map_err(|err| EvalError::backend(format!("{method} {url}: {err}")))?;
        tracing::debug!(%method, url, status = response.status().as_u16(), "backend request");
        Ok(response)
    }

    /// Turn a non-2xx response into a typed backend error.
    fn check(response: Response, action: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().unwrap_or_default();
        Err(EvalError::backend_status(
            status.as_u16(),
            format!("{action} failed with HTTP {}: {}", status.as_u16(), error_reason(&text)),
        ))
    }
}

/// Best human-readable reason from an Elasticsearch error body.
fn error_reason(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let reason = parsed.as_ref().and_then(|value| {
        let error = value.get("error")?;
        match error {
            Value::String(message) => Some(message.clone()),
            Value::Object(_) => {
                let kind = error.get("type").and_then(Value::as_str).unwrap_or("error");
                let reason = error.get("reason").and_then(Value::as_str)?;
                Some(format!("{kind}: {reason}"))
            }
            _ => None,
        }
    });
    reason.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            "empty response body".to_string()
        } else {
            trimmed.chars().take(300).collect()
        }
    })
}

impl SearchBackend for ElasticsearchClient {
    fn search(&self, index: &str, body: &Value) -> Result<Value> {
        let url = self.url(index, "/_search")?;
        let response = Self::check(self.send(Method::POST, &url, Some(body))?, "search")?;
        response
            .json()
            .map_err(|err| EvalError::MalformedResponse(format!("search response from {url}: {err}")))
    }

    fn index_exists(&self, index: &str) -> Result<bool> {
        let url = self.url(index, "")?;
        let response = self.send(Method::HEAD, &url, None)?;
        match response.status().as_u16() {
            200..=299 => Ok(true),
            404 => Ok(false),
            _ => Self::check(response, "index exists check").map(|_| true),
        }
    }

    fn delete_index(&self, index: &str) -> Result<()> {
        let url = self.url(index, "")?;
        Self::check(self.send(Method::DELETE, &url, None)?, "delete index")?;
        tracing::info!(index, "deleted index");
        Ok(())
    }

    fn create_index(&self, index: &str, mapping: &Value) -> Result<()> {
        let url = self.url(index, "")?;
        Self::check(self.send(Method::PUT, &url, Some(mapping))?, "create index")?;
        tracing::info!(index, "created index");
        Ok(())
    }

    fn index_document(&self, index: &str, document: &Value) -> Result<()> {
        let url = self.url(index, "/_doc")?;
        Self::check(self.send(Method::POST, &url, Some(document))?, "index document")?;
        Ok(())
    }

    fn refresh(&self, index: &str) -> Result<()> {
        let url = self.url(index, "/_refresh")?;
        Self::check(self.send(Method::POST, &url, None)?, "refresh")?;
        Ok(())
    }
}
