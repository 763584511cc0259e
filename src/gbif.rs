//! GBIF API client
//!
//! [`OccurrenceApi`] is the seam between the acquisition loop and the
//! upstream provider. [`GbifClient`] is the HTTP implementation; tests and
//! embedders can plug in their own.

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::types::{NameLookup, SearchPage};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Occurrence search endpoint, relative to the API base
pub const OCCURRENCE_SEARCH: &str = "occurrence/search";

/// Species name search endpoint, relative to the API base
pub const SPECIES_SEARCH: &str = "species/search";

/// Upstream record provider
#[async_trait]
pub trait OccurrenceApi: Send + Sync {
    /// Fetch one page of occurrence records for the given query parameters
    async fn search(&self, params: &BTreeMap<String, String>) -> Result<SearchPage>;

    /// Resolve a raw scientific name against the taxonomic backbone
    async fn lookup_name(&self, raw: &str) -> Result<NameLookup>;
}

/// HTTP client for the GBIF API
#[derive(Clone, Debug)]
pub struct GbifClient {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: String,
}

impl GbifClient {
    /// Build a client from API settings
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse or the HTTP client
    /// cannot be constructed.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        url::Url::parse(&config.base_url)?;

        let http = reqwest::Client::builder()
            .timeout(config.search_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl OccurrenceApi for GbifClient {
    async fn search(&self, params: &BTreeMap<String, String>) -> Result<SearchPage> {
        let response = self
            .http
            .get(self.endpoint(OCCURRENCE_SEARCH))
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Upstream {
                endpoint: OCCURRENCE_SEARCH.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response.json::<SearchPage>().await?)
    }

    async fn lookup_name(&self, raw: &str) -> Result<NameLookup> {
        let response = self
            .http
            .get(self.endpoint(SPECIES_SEARCH))
            .query(&[("q", raw)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Upstream {
                endpoint: SPECIES_SEARCH.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response.json::<NameLookup>().await?)
    }
}
