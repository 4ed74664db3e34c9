//! Mock catalog for testing purposes.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use url::Url;

use super::{ApiError, CatalogApi};

/// A mock catalog that answers from scripted responses.
///
/// A route matches a request when scheme, host, port and path are equal and
/// every query pair of the route also appears in the request; among several
/// matches the route with the most query pairs wins. Responses of a route
/// are consumed in order; the last one is repeated. Requests with no
/// matching route get HTTP 404.
#[derive(Debug, Default)]
pub struct MockApi {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<Url>>,
}

#[derive(Debug)]
struct Route {
    url: Url,
    responses: VecDeque<Result<Value, ApiError>>,
}

impl Route {
    fn matches(&self, request: &Url) -> bool {
        if self.url.scheme() != request.scheme()
            || self.url.host_str() != request.host_str()
            || self.url.port_or_known_default() != request.port_or_known_default()
            || self.url.path() != request.path()
        {
            return false;
        }

        let wanted: Vec<_> = request.query_pairs().collect();
        self.url.query_pairs().all(|pair| wanted.contains(&pair))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockApi {
    /// Create a new mock catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON body for `url`.
    pub fn respond(&self, url: &str, body: Value) {
        self.push(url, Ok(body));
    }

    /// Queue an error for `url`.
    pub fn fail(&self, url: &str, error: ApiError) {
        self.push(url, Err(error));
    }

    fn push(&self, url: &str, response: Result<Value, ApiError>) {
        let url = match Url::parse(url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("MockApi ignoring unparseable route {}: {}", url, e);
                return;
            }
        };

        let mut routes = lock(&self.routes);
        match routes.iter_mut().find(|r| r.url == url) {
            Some(route) => route.responses.push_back(response),
            None => routes.push(Route {
                url,
                responses: VecDeque::from([response]),
            }),
        }
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<Url> {
        lock(&self.requests).clone()
    }

    /// Number of requests whose path equals `path`.
    pub fn hits(&self, path: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|u| u.path() == path)
            .count()
    }
}

#[async_trait]
impl CatalogApi for MockApi {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get_json(&self, url: &Url) -> Result<Value, ApiError> {
        lock(&self.requests).push(url.clone());

        let mut routes = lock(&self.routes);
        let Some(route) = routes
            .iter_mut()
            .filter(|r| r.matches(url))
            .max_by_key(|r| r.url.query_pairs().count())
        else {
            return Err(ApiError::Status(404));
        };

        if route.responses.len() > 1 {
            route.responses.pop_front().unwrap_or(Err(ApiError::Status(404)))
        } else {
            route.responses.front().cloned().unwrap_or(Err(ApiError::Status(404)))
        }
    }
}

/// Build a search results page.
///
/// `results` are `(id, original_format)` pairs.
pub fn search_page(results: &[(&str, &str)], total: u64, next: Option<&str>) -> Value {
    let results: Vec<Value> = results
        .iter()
        .map(|(id, format)| {
            json!({
                "id": id,
                "original_format": [format],
                "title": format!("Page {}", id),
            })
        })
        .collect();

    json!({
        "results": results,
        "pagination": { "total": total, "next": next },
    })
}

/// Build an item detail document with typical loc.gov shapes.
pub fn item_detail(title: &str, date: &str, city: &str) -> Value {
    json!({
        "item": {
            "newspaper_title": [title],
            "date": date,
            "location_state": ["west virginia"],
            "location_city": [city],
            "number_lccn": ["sn84026844"],
            "contributor_names": ["West Virginia University", "Library of Congress"],
            "batch": ["wv_elk_ver01"],
        },
        "resources": [
            { "url": "https://www.loc.gov/resource/x/" },
            { "pdf": "https://tile.loc.gov/storage-services/page.pdf" },
        ],
        "pagination": { "current": 2 },
    })
}
