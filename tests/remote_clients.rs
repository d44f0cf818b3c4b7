//! Wire-level tests for the REST datastore and the photo storage client.

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rent_a_bike::error::Error;
use rent_a_bike::models::{BikePatch, NewPayment};
use rent_a_bike::storage::{BlobStore, PhotoStorage};
use rent_a_bike::store::{BikeFilter, Datastore, RestStore};

fn store(server: &MockServer) -> RestStore {
    RestStore::new(
        &server.uri(),
        "test-key",
        reqwest::Client::new(),
        Some(Duration::from_secs(5)),
    )
}

#[tokio::test]
async fn bike_listing_speaks_postgrest() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/bike"))
        .and(header("apikey", "test-key"))
        .and(query_param("select", "*,bike_photo(*)"))
        .and(query_param("order", "id.desc"))
        .and(query_param("active", "eq.true"))
        .and(query_param("kind", "eq.inclusive"))
        .and(query_param("bike_number", "ilike.%24%"))
        .and(query_param("address", "ilike.%Gate%"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 12,
                "active": true,
                "address": "Main Gate",
                "coordinates": { "lat": 8.95742, "lng": 125.59735 },
                "bike_number": "2024-012",
                "kind": "inclusive",
                "bike_photo": [
                    { "id": 3, "bike_id": 12, "url": "https://example.test/p.jpg" }
                ]
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let filter = BikeFilter {
        bike_number: Some("24".to_string()),
        address: Some("Gate".to_string()),
        kind: Some("inclusive".to_string()),
        vehicle_type: None,
        active_only: true,
    };
    let bikes = store(&server).fetch_bikes(&filter).await.unwrap();

    assert_eq!(bikes.len(), 1);
    assert_eq!(bikes[0].id, 12);
    assert!(bikes[0].active);
    assert_eq!(bikes[0].photos.len(), 1);
    assert_eq!(bikes[0].photos[0].url, "https://example.test/p.jpg");
}

#[tokio::test]
async fn missing_bike_reads_as_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/bike"))
        .and(query_param("id", "eq.404"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let bike = store(&server).fetch_bike(404).await.unwrap();
    assert!(bike.is_none());
}

#[tokio::test]
async fn payment_insert_asks_for_minimal_return() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/payment"))
        .and(header("apikey", "test-key"))
        .and(header("Prefer", "return=minimal"))
        .and(body_json(json!({
            "renter_name": "Ana Reyes",
            "reference_code": "1234567890123",
            "amount": 15.0
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    store(&server)
        .insert_payment(&NewPayment {
            renter_name: "Ana Reyes".to_string(),
            reference_code: "1234567890123".to_string(),
            amount: 15.0,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn bike_patch_only_sends_touched_fields() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/bike"))
        .and(query_param("id", "eq.5"))
        .and(body_json(json!({ "active": true })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    store(&server)
        .update_bike(5, &BikePatch::activate())
        .await
        .unwrap();
}

#[tokio::test]
async fn server_failure_maps_to_remote_read() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/bike"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = store(&server)
        .fetch_bikes(&BikeFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RemoteRead(_)));
}

#[tokio::test]
async fn slow_server_trips_the_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/bike"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let slow_store = RestStore::new(
        &server.uri(),
        "test-key",
        reqwest::Client::new(),
        Some(Duration::from_millis(50)),
    );
    let err = slow_store
        .fetch_bikes(&BikeFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RemoteTimeout));
}

#[tokio::test]
async fn photo_upload_returns_the_public_url() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(
            r"^/storage/v1/object/bike-return-photos/[0-9a-f-]+-proof\.jpg$",
        ))
        .and(header("apikey", "test-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "Key": "bike-return-photos/x" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let storage = PhotoStorage::new(
        &server.uri(),
        "test-key",
        reqwest::Client::new(),
        Some(Duration::from_secs(5)),
    );
    let url = storage
        .upload_photo(
            "bike-return-photos",
            "proof.jpg",
            vec![0xff, 0xd8],
            "image/jpeg",
        )
        .await
        .unwrap();

    assert!(url.starts_with(&format!(
        "{}/storage/v1/object/public/bike-return-photos/",
        server.uri()
    )));
    assert!(url.ends_with("-proof.jpg"));
}

#[tokio::test]
async fn sign_in_resolves_the_current_user() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("apikey", "test-key"))
        .and(header("Authorization", "Bearer token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "email": "ana@campus.edu",
            "role": "admin",
            "user_metadata": {
                "full_name": "Ana Reyes",
                "avatar_url": "https://example.test/a.png"
            }
        })))
        .mount(&server)
        .await;

    let auth = rent_a_bike::auth::Auth::new(
        &server.uri(),
        "test-key",
        reqwest::Client::new(),
        Some(Duration::from_secs(5)),
    );

    assert!(auth.current_user().is_none());

    let user = auth.sign_in_with_token("token-123").await.unwrap();
    assert_eq!(user.full_name, "Ana Reyes");
    assert!(user.is_admin());

    assert_eq!(auth.access_token().as_deref(), Some("token-123"));
    auth.sign_out();
    assert!(auth.current_user().is_none());
}

#[tokio::test]
async fn rejected_sign_in_maps_to_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
        .mount(&server)
        .await;

    let auth = rent_a_bike::auth::Auth::new(
        &server.uri(),
        "test-key",
        reqwest::Client::new(),
        None,
    );
    let err = auth.sign_in_with_token("stale").await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
}

#[tokio::test]
async fn rejected_upload_maps_to_storage_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/storage/v1/object/.*$"))
        .respond_with(ResponseTemplate::new(403).set_body_string("bucket policy"))
        .mount(&server)
        .await;

    let storage = PhotoStorage::new(
        &server.uri(),
        "test-key",
        reqwest::Client::new(),
        None,
    );
    let err = storage
        .upload_photo("bike-return-photos", "proof.jpg", vec![1], "image/jpeg")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
}
