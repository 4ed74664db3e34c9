//! Integration tests for Chronicling Harvester
//!
//! These tests run the harvest, fetch and export stages end to end, against
//! the scripted mock catalog and against a local HTTP server.

use chronicling_harvester::api::mock::{item_detail, search_page, MockApi};
use chronicling_harvester::api::{ApiError, CatalogApi, LocApi};
use chronicling_harvester::config::ApiConfig;
use chronicling_harvester::export::export;
use chronicling_harvester::harvest::{HarvestError, HarvestSettings, Harvester, ItemFilter, StopReason};
use chronicling_harvester::metadata::{FailureReason, FetchSettings, MetadataFetcher};
use chronicling_harvester::models::{ItemReference, QueryBuilder, ResultRecord, SearchQuery};
use chronicling_harvester::utils::RateLimiter;
use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;
use url::Url;

const SEARCH: &str = "http://mock.test/collections/chronicling-america/";
const ITEM_HOST: &str = "http://www.loc.gov";

fn item_id(n: usize) -> String {
    format!("{}/item/sn{:04}/1872-01-04/ed-1/", ITEM_HOST, n)
}

fn query() -> SearchQuery {
    QueryBuilder::new("coolie").base(SEARCH).build().unwrap()
}

fn pipeline(api: Arc<dyn CatalogApi>, attempts: u32) -> (Harvester, MetadataFetcher) {
    let limiter = Arc::new(RateLimiter::unlimited());
    let harvester = Harvester::new(
        api.clone(),
        limiter.clone(),
        ItemFilter::for_host(ITEM_HOST),
        HarvestSettings::immediate(attempts),
    );
    let fetcher = MetadataFetcher::new(api, limiter, FetchSettings::immediate(attempts)).quiet(true);
    (harvester, fetcher)
}

/// Two pages of five newspaper pages each, plus one item detail per page.
///
/// The first page answers HTTP 429 `throttles` times before succeeding.
fn two_page_catalog(throttles: usize) -> MockApi {
    let api = MockApi::new();
    let ids: Vec<String> = (0..10).map(item_id).collect();
    let records: Vec<(&str, &str)> = ids.iter().map(|id| (id.as_str(), "newspaper page")).collect();

    let first_page = format!("{}?qs=coolie", SEARCH);
    for _ in 0..throttles {
        api.fail(&first_page, ApiError::Throttled { retry_after: None });
    }
    api.respond(&first_page, search_page(&records[..5], 10, Some("?sp=2")));
    api.respond(&format!("{}?sp=2", SEARCH), search_page(&records[5..], 10, None));

    for (n, id) in ids.iter().enumerate() {
        api.respond(id, item_detail(&format!("Paper {}", n % 3), "1872-01-04", "wheeling"));
    }
    api
}

#[tokio::test]
async fn test_two_pages_to_ten_row_csv() {
    let api = Arc::new(two_page_catalog(0));
    let (harvester, fetcher) = pipeline(api.clone(), 1);

    let outcome = harvester.harvest(&query()).await.unwrap();
    assert_eq!(outcome.stop, StopReason::Exhausted);
    assert_eq!(outcome.pages, 2);
    assert_eq!(outcome.items.len(), 10);

    let report = fetcher.fetch_metadata(outcome.items).await;
    assert_eq!(report.rows.len(), 10);
    assert!(report.failures.is_empty());

    let dir = tempdir().unwrap();
    let path = export(report.rows, &dir.path().join("out"), "coolie.csv").unwrap();

    let contents = std::fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 11);
    assert_eq!(
        lines[0],
        "Newspaper Title,Issue Date,Page Number,LCCN,City,State,Contributor,Batch,PDF Link"
    );
    assert!(lines[1].starts_with("Paper 0,01-04-1872,2,sn84026844,wheeling,west virginia,"));
    assert!(lines[1].ends_with("https://tile.loc.gov/storage-services/page.pdf"));
}

#[tokio::test]
async fn test_failed_item_is_skipped() {
    let api = Arc::new(two_page_catalog(0));
    // the most specific route wins, so this overrides item 3
    api.fail(&format!("{}?fo=json", item_id(3)), ApiError::Status(500));
    let (harvester, fetcher) = pipeline(api.clone(), 1);

    let outcome = harvester.harvest(&query()).await.unwrap();
    let report = fetcher.fetch_metadata(outcome.items).await;

    assert_eq!(report.rows.len(), 9);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].reference.as_str(), item_id(3));
    assert_eq!(report.failures[0].reason, FailureReason::Status(500));
}

#[tokio::test]
async fn test_null_next_stops_after_one_page() {
    let api = Arc::new(MockApi::new());
    api.respond(
        SEARCH,
        json!({
            "results": [{"id": item_id(1), "original_format": "newspaper page"}],
            "pagination": {"total": 1, "next": null}
        }),
    );
    let (harvester, _) = pipeline(api.clone(), 1);

    let outcome = harvester.harvest(&query()).await.unwrap();
    assert_eq!(outcome.pages, 1);
    assert_eq!(outcome.items.len(), 1);
    assert_eq!(api.requests().len(), 1);
}

#[tokio::test]
async fn test_throttled_page_retry_yields_same_items() {
    let (harvester, _) = pipeline(Arc::new(two_page_catalog(0)), 3);
    let expected = harvester.harvest(&query()).await.unwrap().items;

    let throttled = Arc::new(two_page_catalog(1));
    let (harvester, _) = pipeline(throttled.clone(), 3);
    let outcome = harvester.harvest(&query()).await.unwrap();

    assert_eq!(outcome.stop, StopReason::Exhausted);
    assert_eq!(outcome.items, expected);
    assert_eq!(throttled.requests().len(), 3);
}

#[tokio::test]
async fn test_detail_url_query_rejected() {
    let api = Arc::new(MockApi::new());
    let (harvester, _) = pipeline(api.clone(), 1);

    for url in [
        "https://www.loc.gov/item/sn84026844/1872-01-04/ed-1/",
        "https://www.loc.gov/resource/sn84026844/1872-01-04/ed-1/?sp=1",
    ] {
        let query = SearchQuery::from_url(url).unwrap();
        assert!(matches!(
            harvester.harvest(&query).await,
            Err(HarvestError::InvalidQuery(_))
        ));
    }
    assert!(api.requests().is_empty());
}

#[test]
fn test_filter_properties() {
    let filter = ItemFilter::for_host(ITEM_HOST);

    let accepted: Vec<ItemReference> = [
        ResultRecord::new(item_id(1), "newspaper page"),
        ResultRecord::new(format!("{}/resource/sn0001/1872/ed-1/?sp=2", ITEM_HOST), "newspaper page"),
        ResultRecord::new(item_id(2), "collection"),
        ResultRecord::new(item_id(3), "web page"),
        ResultRecord::new(format!("{}/collections/chronicling-america/", ITEM_HOST), "newspaper page"),
    ]
    .iter()
    .filter_map(|record| filter.accept(record))
    .collect();

    assert_eq!(accepted.len(), 2);
    assert_eq!(accepted[0].as_str(), item_id(1));
    assert!(accepted[1].as_str().contains("/resource/"));
}

// HTTP behavior of the loc.gov client against a local server

fn loc_api() -> LocApi {
    LocApi::from_config(&ApiConfig {
        timeout_secs: 5,
        connect_timeout_secs: 5,
        ..ApiConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_loc_api_classifies_responses() {
    let mut server = mockito::Server::new_async().await;

    let _ok = server
        .mock("GET", "/ok/")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json; charset=utf-8")
        .with_body(r#"{"results": [], "pagination": {"total": 0, "next": null}}"#)
        .create_async()
        .await;
    let _throttled = server
        .mock("GET", "/throttled/")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_header("retry-after", "7")
        .create_async()
        .await;
    let _error = server
        .mock("GET", "/error/")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;
    let _html = server
        .mock("GET", "/html/")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html>Too many requests</html>")
        .create_async()
        .await;

    let api = loc_api();
    let url = |path: &str| Url::parse(&format!("{}{}?fo=json", server.url(), path)).unwrap();

    let body = api.get_json(&url("/ok/")).await.unwrap();
    assert_eq!(body["pagination"]["total"], 0);

    assert_eq!(
        api.get_json(&url("/throttled/")).await,
        Err(ApiError::Throttled { retry_after: Some(7) })
    );
    assert_eq!(api.get_json(&url("/error/")).await, Err(ApiError::Status(500)));
    assert!(matches!(
        api.get_json(&url("/html/")).await,
        Err(ApiError::Malformed(_))
    ));
}

#[tokio::test]
async fn test_end_to_end_over_http() {
    let mut server = mockito::Server::new_async().await;
    let host = server.url();

    let _search = server
        .mock("GET", "/collections/chronicling-america/")
        .match_query(Matcher::UrlEncoded("qs".into(), "coolie".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "results": [
                    {"id": format!("{}/item/sn1/", host), "original_format": ["newspaper page"]},
                    {"id": format!("{}/collections/chronicling-america/", host), "original_format": ["collection"]},
                    {"id": format!("{}/resource/sn2/?sp=3", host), "original_format": ["newspaper page"]}
                ],
                "pagination": {"total": 2, "next": null}
            })
            .to_string(),
        )
        .create_async()
        .await;
    let _item = server
        .mock("GET", "/item/sn1/")
        .match_query(Matcher::UrlEncoded("fo".into(), "json".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(item_detail("Spirit of Jefferson", "1870-06-30", "charles town").to_string())
        .create_async()
        .await;
    let _resource = server
        .mock("GET", "/resource/sn2/")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("sp".into(), "3".into()),
            Matcher::UrlEncoded("fo".into(), "json".into()),
        ]))
        .with_status(404)
        .create_async()
        .await;

    let api: Arc<dyn CatalogApi> = Arc::new(loc_api());
    let limiter = Arc::new(RateLimiter::unlimited());
    let harvester = Harvester::new(
        api.clone(),
        limiter.clone(),
        ItemFilter::for_host(&host),
        HarvestSettings::immediate(1),
    );
    let fetcher = MetadataFetcher::new(api, limiter.clone(), FetchSettings::immediate(1)).quiet(true);

    let query = QueryBuilder::new("coolie")
        .base(format!("{}/collections/chronicling-america/", host))
        .build()
        .unwrap();
    let outcome = harvester.harvest(&query).await.unwrap();
    assert_eq!(outcome.items.len(), 2);

    let report = fetcher.fetch_metadata(outcome.items).await;
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].newspaper_title, "Spirit of Jefferson");
    assert_eq!(report.failures[0].reason, FailureReason::Status(404));
    assert_eq!(limiter.request_count().await, 3);

    let dir = tempdir().unwrap();
    let path = export(report.rows, dir.path(), "http.csv").unwrap();
    let contents = std::fs::read_to_string(path).unwrap();
    assert!(contents.contains("Spirit of Jefferson,06-30-1870,2,sn84026844,charles town,west virginia"));
}
