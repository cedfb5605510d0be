use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::DestinationKind;
use crate::text::truncate_chars;

/// Number of summary characters that take part in the dedup hash.
pub const HASH_SUMMARY_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub url: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub summary: String,
    pub content: Option<String>,
    pub cover_image: Option<String>,
    pub hash: Option<String>,
}

impl Article {
    /// Dedup fingerprint over the title and the first 100 characters of the summary.
    ///
    /// Collisions are tolerated: two articles sharing the same prefix are treated
    /// as the same content.
    pub fn content_hash(title: &str, summary: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(title.as_bytes());
        hasher.update(truncate_chars(summary, HASH_SUMMARY_CHARS).as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn with_computed_hash(mut self) -> Self {
        self.hash = Some(Self::content_hash(&self.title, &self.summary));
        self
    }

    /// Text the digest summarises: the summary when present, else the full content.
    pub fn summary_source(&self) -> &str {
        if !self.summary.is_empty() {
            &self.summary
        } else {
            self.content.as_deref().unwrap_or_default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Success,
    Failure,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub article_id: String,
    pub destination_id: String,
    pub destination_kind: DestinationKind,
    pub sent_at: DateTime<Utc>,
    pub status: DeliveryStatus,
}

impl DeliveryRecord {
    pub fn new(
        article_id: impl Into<String>,
        destination_id: impl Into<String>,
        destination_kind: DestinationKind,
        status: DeliveryStatus,
    ) -> Self {
        Self {
            article_id: article_id.into(),
            destination_id: destination_id.into(),
            destination_kind,
            sent_at: Utc::now(),
            status,
        }
    }
}
