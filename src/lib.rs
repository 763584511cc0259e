//! # specimen-dl
//!
//! Acquisition engine for licensable herbarium specimen images from GBIF.
//!
//! Given a scientific name and a target count, the engine resolves the name
//! against the GBIF taxonomic backbone, pages through preserved-specimen
//! occurrence records with still images, filters them, downloads the first
//! image of each record and keeps exactly the requested number of images on
//! disk together with an identifier ledger and a license ledger.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - no CLI, progress flows through a [`Reporter`]
//! - **Sensible defaults** - [`Config::rooted_at`] is enough to get started
//! - **Testable seams** - the upstream provider is the [`OccurrenceApi`] trait
//!
//! ## Quick Start
//!
//! ```no_run
//! use specimen_dl::{Acquirer, Config, EventReporter, GbifClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::rooted_at("herbarium");
//!     let api = Arc::new(GbifClient::new(&config.api)?);
//!     let reporter = Arc::new(EventReporter::default());
//!
//!     // Subscribe to events
//!     let mut events = reporter.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let acquirer = Acquirer::new(config, api, reporter)?;
//!     let summary = acquirer.acquire("Quercus robur", 100).await?;
//!     println!("kept {} images", summary.retained);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Acquisition orchestration
pub mod acquisition;
/// Acquisition state and ledger flushing
pub mod bookkeeper;
/// Citable download requests
pub mod citation;
/// Configuration types
pub mod config;
/// Image probing and transfer
pub mod downloader;
/// Error types
pub mod error;
/// Record filtering
pub mod filter;
/// GBIF API client
pub mod gbif;
/// Ledger and statistics artifacts
pub mod ledger;
/// Query planning and pagination
pub mod planner;
/// Progress reporting
pub mod progress;
/// Output directory reconciliation
pub mod reconciler;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use acquisition::Acquirer;
pub use bookkeeper::{AcquisitionState, Bookkeeper, Consideration};
pub use config::{
    ApiConfig, CitationConfig, Config, DownloadConfig, FilterConfig, LedgerConfig, RetryConfig,
};
pub use downloader::{AssetDownloader, Outcome};
pub use error::{DownloadError, Error, Result};
pub use filter::Rejection;
pub use gbif::{GbifClient, OccurrenceApi};
pub use ledger::{LicenseLedger, Statistics};
pub use planner::{Paginator, PlanOutcome};
pub use progress::{EventReporter, Reporter, SharedReporter, TracingReporter};
pub use reconciler::PruneReport;
pub use types::{
    AcceptedAsset, AcquisitionSummary, Event, MediaItem, MediaRef, NameLookup, NameMatch,
    OccurrenceKey, OccurrenceRecord, SavedAsset, SearchPage,
};
