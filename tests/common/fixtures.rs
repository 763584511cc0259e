//! Mock GBIF server and occurrence record fixtures

use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Minimal JPEG header served as image content
pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

/// Canonical name every resolvable lookup returns
pub const CANONICAL_NAME: &str = "Quercus robur";

/// A wiremock server answering like the GBIF API and hosting the images
pub struct MockGbif {
    /// Underlying mock server
    pub server: MockServer,
}

impl MockGbif {
    /// Start an empty mock server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// API base URL to put in the configuration
    pub fn base_url(&self) -> String {
        format!("{}/v1/", self.server.uri())
    }

    /// Where the image for `key` is hosted
    pub fn image_url(&self, key: i64, extension: &str) -> String {
        format!("{}/media/{}{}", self.server.uri(), key, extension)
    }

    /// Answer name lookups with [`CANONICAL_NAME`]
    pub async fn resolves_name(&self) {
        Mock::given(method("GET"))
            .and(path("/v1/species/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "offset": 0,
                "limit": 20,
                "endOfRecords": true,
                "count": 1,
                "results": [{
                    "key": 2878688,
                    "scientificName": "Quercus robur L.",
                    "canonicalName": CANONICAL_NAME,
                    "species": CANONICAL_NAME
                }]
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer name lookups with zero matches
    pub async fn rejects_name(&self) {
        Mock::given(method("GET"))
            .and(path("/v1/species/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "offset": 0,
                "limit": 20,
                "endOfRecords": true,
                "count": 0,
                "results": []
            })))
            .mount(&self.server)
            .await;
    }

    /// Serve `records` for the occurrence page at `offset`
    pub async fn page(&self, offset: u64, records: Vec<Value>) {
        let count = records.len();
        Mock::given(method("GET"))
            .and(path("/v1/occurrence/search"))
            .and(query_param("offset", offset.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "offset": offset,
                "endOfRecords": count == 0,
                "results": records
            })))
            .mount(&self.server)
            .await;
    }

    /// Host an image for `key` answering with `status`
    pub async fn image_with_status(&self, key: i64, extension: &str, status: u16) {
        let image_path = format!("/media/{}{}", key, extension);
        Mock::given(method("HEAD"))
            .and(path(image_path.clone()))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path(image_path))
            .respond_with(ResponseTemplate::new(status).set_body_bytes(JPEG_BYTES))
            .mount(&self.server)
            .await;
    }

    /// Host a JPEG image for `key`
    pub async fn image(&self, key: i64) {
        self.image_with_status(key, ".jpg", 200).await;
    }

    /// Host JPEG images for every key
    pub async fn images(&self, keys: impl IntoIterator<Item = i64>) {
        for key in keys {
            self.image(key).await;
        }
    }

    /// A downloadable record whose image lives on this server
    pub fn record(&self, key: i64) -> Value {
        record(key, &self.image_url(key, ".jpg"), "image/jpeg")
    }

    /// Records for every key
    pub fn records(&self, keys: impl IntoIterator<Item = i64>) -> Vec<Value> {
        keys.into_iter().map(|key| self.record(key)).collect()
    }
}

/// An occurrence record with one media item
pub fn record(key: i64, url: &str, format: &str) -> Value {
    json!({
        "key": key,
        "scientificName": "Quercus robur L.",
        "publishingOrgKey": "e2e717bf-551a-4917-bdc9-4fa0f342c530",
        "license": "http://creativecommons.org/licenses/by/4.0/legalcode",
        "media": [{
            "type": "StillImage",
            "format": format,
            "identifier": url,
            "rights": "CC BY 4.0"
        }]
    })
}

/// Replace the publisher key of a record
pub fn published_by(mut record: Value, publisher: &str) -> Value {
    record["publishingOrgKey"] = json!(publisher);
    record
}
