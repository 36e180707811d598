//! In-memory upstream used by unit tests

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use swapi_common::{Result, SwapiError};

use crate::http::JsonFetcher;

pub const BASE: &str = "http://swapi.test/api";

/// Serves canned JSON by URL; unknown URLs answer with the not-found body
#[derive(Default)]
pub struct FakeUpstream {
    documents: HashMap<String, Value>,
    failing: Vec<String>,
    fatal: Vec<String>,
    delays: HashMap<String, Duration>,
    requests: Mutex<Vec<String>>,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, body: Value) -> Self {
        self.documents.insert(url.into(), body);
        self
    }

    pub fn failing(mut self, url: impl Into<String>) -> Self {
        self.failing.push(url.into());
        self
    }

    /// Answer `url` with an error that is not scoped to one record
    pub fn fatal(mut self, url: impl Into<String>) -> Self {
        self.fatal.push(url.into());
        self
    }

    pub fn delayed(mut self, url: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(url.into(), delay);
        self
    }

    /// A person linked to one planet and one film
    pub fn with_person(self, id: u32, name: &str) -> Self {
        self.with(
            format!("{}/people/{}/", BASE, id),
            json!({
                "name": name,
                "height": "172",
                "mass": "77",
                "hair_color": "blond",
                "skin_color": "fair",
                "eye_color": "blue",
                "birth_year": "19BBY",
                "gender": "male",
                "homeworld": format!("{}/planets/1/", BASE),
                "films": [format!("{}/films/1/", BASE)],
                "species": [],
                "vehicles": [],
                "starships": [],
                "created": "2014-12-09T13:50:51.644000Z",
                "edited": "2014-12-20T21:17:56.891000Z",
                "url": format!("{}/people/{}/", BASE, id)
            }),
        )
    }

    pub fn with_planet_and_film(self) -> Self {
        self.with(format!("{}/planets/1/", BASE), json!({ "name": "Tatooine" }))
            .with(format!("{}/films/1/", BASE), json!({ "title": "A New Hope" }))
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl JsonFetcher for FakeUpstream {
    async fn get_json(&self, url: &str) -> Result<Value> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        if self.fatal.iter().any(|u| u == url) {
            return Err(SwapiError::Config(format!("no route configured for {}", url)));
        }
        if self.failing.iter().any(|u| u == url) {
            return Err(SwapiError::transport(url, "unexpected status 500"));
        }
        Ok(self
            .documents
            .get(url)
            .cloned()
            .unwrap_or_else(|| json!({ "detail": "Not found" })))
    }
}
