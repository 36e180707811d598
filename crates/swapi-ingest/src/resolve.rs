//! Reference resolution
//!
//! A reference is a URL pointing at another resource; resolving it means
//! fetching that resource and reading one attribute out of it.

use serde_json::Value;
use swapi_common::types::LIST_SEPARATOR;
use swapi_common::{Result, SwapiError};
use tracing::debug;

use crate::http::JsonFetcher;

/// Resolves single links and ordered lists of links to text
pub struct LinkResolver<'a> {
    http: &'a dyn JsonFetcher,
}

impl<'a> LinkResolver<'a> {
    pub fn new(http: &'a dyn JsonFetcher) -> Self {
        Self { http }
    }

    /// Fetch `url` and return its `attribute` as text.
    ///
    /// A null attribute counts as missing. Non-string values are returned as
    /// their JSON text.
    pub async fn resolve(&self, url: &str, attribute: &str) -> Result<String> {
        let body = self.http.get_json(url).await?;

        match body.get(attribute) {
            None | Some(Value::Null) => Err(SwapiError::missing_attribute(url, attribute)),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
        }
    }

    /// Resolve each URL in order and join the values with `", "`.
    ///
    /// Links are fetched one after another so the output follows document
    /// order. An empty list yields an empty string; any failure fails the
    /// whole join.
    pub async fn join_all(&self, urls: &[String], attribute: &str) -> Result<String> {
        let mut values = Vec::with_capacity(urls.len());
        for url in urls {
            values.push(self.resolve(url, attribute).await?);
        }
        debug!(count = values.len(), attribute, "Joined linked values");
        Ok(values.join(LIST_SEPARATOR))
    }
}
