//! Record fetcher
//!
//! Fetches one primary resource by identifier and resolves every reference
//! field on it. A record either comes back fully resolved or not at all.

use futures::future::try_join_all;
use serde_json::Value;
use std::sync::Arc;
use swapi_common::types::{FieldKind, RawResource, ReferenceField, ResolvedRecord};
use swapi_common::{Result, SwapiError};
use tracing::{debug, instrument};

use crate::http::JsonFetcher;
use crate::resolve::LinkResolver;

/// Decides whether a primary response body means "no such record"
pub trait NotFoundPredicate: Send + Sync {
    fn is_not_found(&self, body: &RawResource) -> bool;
}

/// Treats any body with at most one top-level key as not found.
///
/// This matches how swapi.dev answers unknown identifiers
/// (`{"detail": "Not found"}`). It is a heuristic tied to that API; supply a
/// different predicate for other upstreams.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtMostOneKey;

impl NotFoundPredicate for AtMostOneKey {
    fn is_not_found(&self, body: &RawResource) -> bool {
        body.len() <= 1
    }
}

impl<F> NotFoundPredicate for F
where
    F: Fn(&RawResource) -> bool + Send + Sync,
{
    fn is_not_found(&self, body: &RawResource) -> bool {
        self(body)
    }
}

pub struct RecordFetcher {
    http: Arc<dyn JsonFetcher>,
    base_url: String,
    not_found: Arc<dyn NotFoundPredicate>,
}

impl RecordFetcher {
    pub fn new(http: Arc<dyn JsonFetcher>, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            not_found: Arc::new(AtMostOneKey),
        }
    }

    pub fn with_not_found_predicate(mut self, predicate: Arc<dyn NotFoundPredicate>) -> Self {
        self.not_found = predicate;
        self
    }

    pub fn resource_url(&self, id: u32) -> String {
        format!("{}/people/{}/", self.base_url, id)
    }

    /// Fetch and resolve the record with identifier `id`.
    ///
    /// Returns `Ok(None)` when the upstream reports the identifier as not
    /// found. Any failure while resolving references is returned as an
    /// error; no partially resolved record is ever produced.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch(&self, id: u32) -> Result<Option<ResolvedRecord>> {
        let url = self.resource_url(id);
        let raw = match self.http.get_json(&url).await? {
            Value::Object(map) => map,
            other => {
                return Err(SwapiError::transport(
                    url,
                    format!("expected a JSON object, got {}", other),
                ))
            },
        };

        if self.not_found.is_not_found(&raw) {
            debug!(id, "Identifier not found upstream");
            return Ok(None);
        }

        self.resolve_record(id, &raw).await.map(Some)
    }

    async fn resolve_record(&self, id: u32, raw: &RawResource) -> Result<ResolvedRecord> {
        // The body's own identity fields are ignored; `id` is authoritative.
        let mut record = ResolvedRecord::from_scalars(id, raw)?;

        for key in raw.keys() {
            if FieldKind::classify(key) == FieldKind::Unknown {
                debug!(id, key = %key, "Ignoring unrecognised field");
            }
        }

        let resolver = LinkResolver::new(self.http.as_ref());
        let resolver = &resolver;
        let resolved = try_join_all(ReferenceField::ALL.into_iter().map(|field| async move {
            let value = resolve_reference(resolver, id, field, raw.get(field.key())).await?;
            Ok::<_, SwapiError>((field, value))
        }))
        .await?;

        for (field, value) in resolved {
            record.set_reference(field, value);
        }

        Ok(record)
    }
}

/// Resolve one reference field of a raw resource.
///
/// A missing or null single link resolves to `None`; a missing or null list
/// resolves to an empty string.
async fn resolve_reference(
    resolver: &LinkResolver<'_>,
    id: u32,
    field: ReferenceField,
    value: Option<&Value>,
) -> Result<Option<String>> {
    match (field.is_list(), value) {
        (false, None | Some(Value::Null)) => Ok(None),
        (false, Some(Value::String(url))) => {
            resolver.resolve(url, field.attribute()).await.map(Some)
        },
        (true, None | Some(Value::Null)) => Ok(Some(String::new())),
        (true, Some(Value::Array(items))) => {
            let urls = items
                .iter()
                .map(|item| match item {
                    Value::String(url) => Ok(url.clone()),
                    other => Err(SwapiError::malformed(
                        id,
                        format!("'{}' contains a non-string link: {}", field, other),
                    )),
                })
                .collect::<Result<Vec<_>>>()?;
            resolver.join_all(&urls, field.attribute()).await.map(Some)
        },
        (_, Some(other)) => Err(SwapiError::malformed(
            id,
            format!("'{}' has unexpected shape: {}", field, other),
        )),
    }
}
