use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{load_json, save_json, CatalogRecord, StoreError};
use crate::metadata::PublicationStatus;

/// One announcement entry of the news feed.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedRecord {
    pub id: String,
    pub date: NaiveDate,
    /// Display HTML with the title and venue emphasized.
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub related_id: String,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub auto_generated: bool,
}

impl FeedRecord {
    /// Build the announcement derived from a freshly cataloged publication.
    pub fn for_publication(record: &CatalogRecord) -> Self {
        let phrase = match record.status {
            PublicationStatus::Published => "was published in",
            PublicationStatus::Accepted => "was accepted by",
            PublicationStatus::UnderReview => "was submitted to",
            PublicationStatus::Other => "appeared in",
        };
        Self {
            id: format!("news_{}", record.id),
            date: record.added_date,
            content: format!(
                "Our paper on <em>{}</em> {} <em>{}</em>.",
                record.title, phrase, record.venue
            ),
            kind: "publication".to_owned(),
            related_id: record.id.clone(),
            pinned: false,
            auto_generated: true,
        }
    }
}

/// The persisted news feed. Pinned entries always precede unpinned ones;
/// within the unpinned block, newest insertions come first.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Feed {
    pub news: Vec<FeedRecord>,
}

impl Feed {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        load_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        save_json(path, self)
    }

    /// Insert at the top of the unpinned block, keeping every pinned entry
    /// above it. Returns false without modifying the feed when an entry
    /// with the same id already exists.
    pub fn insert(&mut self, record: FeedRecord) -> bool {
        if self.news.iter().any(|n| n.id == record.id) {
            tracing::info!(id = %record.id, "feed entry already exists, skipping");
            return false;
        }
        let (pinned, mut rest): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.news).into_iter().partition(|n| n.pinned);
        rest.insert(0, record);
        self.news = pinned;
        self.news.extend(rest);
        true
    }
}
