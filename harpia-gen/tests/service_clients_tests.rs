//! HTTP client tests against a local mock server

use harpia_gen::services::{
    BoundingBox, ElevationService, FeatureQueryService, GbifClient, NominatimClient, OccurrenceService,
    OpenElevationClient, OverpassClient, ReverseGeocoder,
};
use harpia_gen::ServiceError;
use reqwest::Client;
use serde_json::json;
use std::num::NonZeroU32;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> Client {
    Client::builder().timeout(Duration::from_secs(2)).build().unwrap()
}

fn fast_rate() -> NonZeroU32 {
    NonZeroU32::new(100).unwrap()
}

#[tokio::test]
async fn test_elevation_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lookup"))
        .and(query_param("locations", "9,-80"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "latitude": 9.0, "longitude": -80.0, "elevation": 312.0 }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let elevation = OpenElevationClient::new(client(), format!("{}/lookup", server.uri()));
    assert_eq!(elevation.elevation(9.0, -80.0).await, Ok(312.0));
}

#[tokio::test]
async fn test_elevation_empty_results_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .mount(&server)
        .await;

    let elevation = OpenElevationClient::new(client(), server.uri());
    assert!(matches!(elevation.elevation(9.0, -80.0).await, Err(ServiceError::Parse(_))));
}

#[tokio::test]
async fn test_elevation_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let elevation = OpenElevationClient::new(client(), server.uri());
    assert_eq!(
        elevation.elevation(9.0, -80.0).await,
        Err(ServiceError::Status {
            service: "Open-Elevation",
            code: 503
        })
    );
}

#[tokio::test]
async fn test_elevation_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let slow_client = Client::builder().timeout(Duration::from_millis(200)).build().unwrap();
    let elevation = OpenElevationClient::new(slow_client, server.uri());
    assert!(matches!(elevation.elevation(9.0, -80.0).await, Err(ServiceError::Timeout(_))));
}

#[tokio::test]
async fn test_nominatim_reverse() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .and(query_param("format", "jsonv2"))
        .and(query_param("lat", "9"))
        .and(query_param("lon", "-80"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "place_id": 1234,
            "category": "landuse",
            "type": "forest",
            "display_name": "Darién, Panamá"
        })))
        .mount(&server)
        .await;

    let geocoder = NominatimClient::new(client(), format!("{}/reverse", server.uri()), fast_rate());
    let place = geocoder.reverse(9.0, -80.0).await.unwrap();
    assert_eq!(place.category, "landuse");
    assert_eq!(place.place_type, "forest");
}

#[tokio::test]
async fn test_nominatim_unable_to_geocode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "Unable to geocode" })))
        .mount(&server)
        .await;

    let geocoder = NominatimClient::new(client(), server.uri(), fast_rate());
    assert_eq!(
        geocoder.reverse(9.0, -80.0).await,
        Err(ServiceError::Api {
            service: "Nominatim",
            message: "Unable to geocode".to_string()
        })
    );
}

#[tokio::test]
async fn test_nominatim_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let geocoder = NominatimClient::new(client(), server.uri(), fast_rate());
    assert_eq!(
        geocoder.reverse(9.0, -80.0).await,
        Err(ServiceError::RateLimited("Nominatim"))
    );
}

#[tokio::test]
async fn test_overpass_forest_count() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/interpreter"))
        .and(body_string_contains("out+count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "version": 0.6,
            "elements": [{
                "type": "count",
                "id": 0,
                "tags": { "nodes": "0", "ways": "2", "relations": "1", "total": "3" }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let overpass = OverpassClient::new(client(), format!("{}/interpreter", server.uri()), 8);
    assert_eq!(overpass.count_forest(9.0, -80.0, 50.0).await, Ok(3));
}

#[tokio::test]
async fn test_overpass_missing_count_element() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "elements": [] })))
        .mount(&server)
        .await;

    let overpass = OverpassClient::new(client(), server.uri(), 8);
    assert!(matches!(
        overpass.count_forest(9.0, -80.0, 50.0).await,
        Err(ServiceError::Parse(_))
    ));
}

#[tokio::test]
async fn test_gbif_occurrence_count() {
    let server = MockServer::start().await;
    let area = BoundingBox::around(9.0, -80.0, 10.0);

    Mock::given(method("GET"))
        .and(path("/occurrence/search"))
        .and(query_param("scientificName", "Alouatta"))
        .and(query_param("geometry", area.to_wkt().as_str()))
        .and(query_param("limit", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "offset": 0,
            "limit": 0,
            "endOfRecords": false,
            "count": 17,
            "results": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gbif = GbifClient::new(client(), format!("{}/occurrence/search", server.uri()));
    assert_eq!(gbif.count("Alouatta", &area).await, Ok(17));
}

#[tokio::test]
async fn test_gbif_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let gbif = GbifClient::new(client(), server.uri());
    let area = BoundingBox::around(9.0, -80.0, 10.0);
    assert!(matches!(gbif.count("Nasua", &area).await, Err(ServiceError::Parse(_))));
}
