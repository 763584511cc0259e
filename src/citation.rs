//! Citable download requests
//!
//! After an acquisition the identifier ledger can be turned into a GBIF
//! download request, which yields a DOI covering exactly the retained
//! records.

use crate::config::CitationConfig;
use crate::error::{Error, Result};
use crate::gbif::GbifClient;
use crate::ledger;
use crate::types::OccurrenceKey;
use serde::Serialize;
use std::path::Path;

/// Download request endpoint, relative to the API base
pub const DOWNLOAD_REQUEST: &str = "occurrence/download/request";

/// Predicate selecting records by GBIF identifier
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InPredicate {
    /// Always "in"
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Always "GBIF_ID"
    pub key: &'static str,
    /// Record identifiers, as strings
    pub values: Vec<String>,
}

/// Body of a download request
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    /// GBIF account that owns the download
    pub creator: String,
    /// Whether GBIF sends an email when the download is ready
    pub send_notification: bool,
    /// Addresses to notify
    pub notification_addresses: Vec<String>,
    /// Archive format, always "DWCA"
    pub format: &'static str,
    /// Record selection
    pub predicate: InPredicate,
}

impl DownloadRequest {
    /// Build a request covering `keys`
    pub fn new(
        creator: impl Into<String>,
        notification_address: Option<String>,
        keys: &[OccurrenceKey],
    ) -> Self {
        let notification_addresses: Vec<String> = notification_address.into_iter().collect();
        Self {
            creator: creator.into(),
            send_notification: !notification_addresses.is_empty(),
            notification_addresses,
            format: "DWCA",
            predicate: InPredicate {
                kind: "in",
                key: "GBIF_ID",
                values: keys.iter().map(|k| k.to_string()).collect(),
            },
        }
    }
}

impl GbifClient {
    /// Submit a download request for `keys`
    ///
    /// Returns the download key on `201 Created`. Any other status is a
    /// [`Error::CitationRejected`]; the request is not retried.
    pub async fn request_citation(
        &self,
        citation: &CitationConfig,
        keys: &[OccurrenceKey],
    ) -> Result<String> {
        let username = citation
            .username
            .clone()
            .ok_or_else(|| Error::config("citation.username", "required for download requests"))?;
        let password = citation
            .password
            .clone()
            .ok_or_else(|| Error::config("citation.password", "required for download requests"))?;
        if keys.is_empty() {
            return Err(Error::config(
                "citation",
                "no identifiers to request a download for",
            ));
        }

        let request =
            DownloadRequest::new(username.clone(), citation.notification_address.clone(), keys);

        let response = self
            .http
            .post(self.endpoint(DOWNLOAD_REQUEST))
            .basic_auth(username, Some(password))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != reqwest::StatusCode::CREATED {
            tracing::warn!(status = status.as_u16(), "citation request rejected");
            return Err(Error::CitationRejected {
                status: status.as_u16(),
                body,
            });
        }

        let download_key = body.trim().to_string();
        tracing::info!(download_key = %download_key, records = keys.len(), "citation download requested");
        Ok(download_key)
    }

    /// Submit a download request for every record in the identifier ledger
    pub async fn request_citation_for_ledger(
        &self,
        citation: &CitationConfig,
        ids_path: &Path,
    ) -> Result<String> {
        let keys: Vec<OccurrenceKey> = ledger::read_ids(ids_path).await?.into_iter().collect();
        self.request_citation(citation, &keys).await
    }
}
