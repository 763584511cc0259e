//! Record filter
//!
//! Decides whether an occurrence record is worth a download attempt and, if
//! so, extracts its first media item. Rejection is an ordinary outcome: every
//! variant of [`Rejection`] is a per-record skip that leaves the rest of the
//! page untouched.

use crate::config::FilterConfig;
use crate::types::{MediaItem, MediaRef, OccurrenceRecord};

/// Why a record was skipped
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// Strict mode is on and the publisher is not allow-listed
    PublisherNotAllowed {
        /// Publisher key on the record, if any
        publisher: Option<String>,
    },
    /// The record has no media items
    NoMedia,
    /// The first media item lacks a format or identifier
    IncompleteMedia,
    /// The first media item is not an accepted image format
    UnsupportedFormat {
        /// The format found
        format: String,
    },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::PublisherNotAllowed { publisher } => match publisher {
                Some(p) => write!(f, "publisher {} not allowed", p),
                None => write!(f, "record has no publisher"),
            },
            Rejection::NoMedia => write!(f, "record has no media"),
            Rejection::IncompleteMedia => write!(f, "first media item is incomplete"),
            Rejection::UnsupportedFormat { format } => {
                write!(f, "media format {} not accepted", format)
            }
        }
    }
}

/// Apply publisher and media policy to a record
pub fn accept(
    record: &OccurrenceRecord,
    policy: &FilterConfig,
) -> std::result::Result<MediaRef, Rejection> {
    if policy.strict && !is_allowed_publisher(record, &policy.allowed_publishers) {
        return Err(Rejection::PublisherNotAllowed {
            publisher: record.publishing_org.clone(),
        });
    }

    let media = first_media(record).ok_or(Rejection::NoMedia)?;
    let (format, url) = usable_fields(media).ok_or(Rejection::IncompleteMedia)?;

    if !policy.accepted_formats.iter().any(|f| f == format) {
        return Err(Rejection::UnsupportedFormat {
            format: format.to_string(),
        });
    }

    Ok(MediaRef {
        key: record.key,
        url: url.to_string(),
        license: record.license.clone().unwrap_or_default(),
        media: media.clone(),
    })
}

fn is_allowed_publisher(record: &OccurrenceRecord, allow_list: &[String]) -> bool {
    record
        .publishing_org
        .as_deref()
        .is_some_and(|org| allow_list.iter().any(|allowed| allowed == org))
}

fn first_media(record: &OccurrenceRecord) -> Option<&MediaItem> {
    record.media.as_deref().and_then(|media| media.first())
}

/// Format and locator of a media item, when both are present and non-blank
fn usable_fields(media: &MediaItem) -> Option<(&str, &str)> {
    let format = media.format.as_deref().filter(|s| !s.trim().is_empty())?;
    let url = media.identifier.as_deref().filter(|s| !s.trim().is_empty())?;
    Some((format, url))
}
