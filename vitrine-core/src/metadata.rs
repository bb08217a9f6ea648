use serde::{Deserialize, Serialize};

use crate::entities::Confidence;

/// Publication venue class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationKind {
    Journal,
    Conference,
    Preprint,
}

impl Default for PublicationKind {
    fn default() -> Self {
        Self::Journal
    }
}

/// Publication lifecycle stage. Hand-maintained catalog files may carry
/// status strings this version does not know; those deserialize as
/// `Other` instead of failing the whole file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum PublicationStatus {
    Published,
    Accepted,
    UnderReview,
    Other,
}

impl From<String> for PublicationStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "published" => Self::Published,
            "accepted" => Self::Accepted,
            "under_review" => Self::UnderReview,
            _ => Self::Other,
        }
    }
}

impl From<PublicationStatus> for String {
    fn from(status: PublicationStatus) -> Self {
        match status {
            PublicationStatus::Published => "published",
            PublicationStatus::Accepted => "accepted",
            PublicationStatus::UnderReview => "under_review",
            PublicationStatus::Other => "other",
        }
        .to_owned()
    }
}

impl Default for PublicationStatus {
    fn default() -> Self {
        Self::Published
    }
}

/// Raw publication metadata as produced by the extraction backend, before
/// it is shaped into a catalog record.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaperMetadata {
    pub title: String,
    pub authors: Vec<String>,
    #[serde(default)]
    pub author_note: String,
    pub venue: String,
    pub year: i32,
    #[serde(default)]
    pub volume: String,
    #[serde(default)]
    pub pages: String,
    #[serde(default)]
    pub doi: String,
    #[serde(default, rename = "type")]
    pub kind: PublicationKind,
    #[serde(default)]
    pub status: PublicationStatus,
    #[serde(default = "default_confidence")]
    pub confidence: Confidence,
    #[serde(default)]
    pub notes: String,
    /// Set by an online verification backend; the shipped verifier leaves
    /// it false.
    #[serde(default)]
    pub verified_online: bool,
}

fn default_confidence() -> Confidence {
    Confidence::Low
}

/// Metadata extraction backend. Consumes the leading-page text of a
/// document; returns `None` when nothing trustworthy could be extracted.
pub trait ExtractMetadata {
    fn extract(&self, text: &str, filename: &str) -> Option<PaperMetadata>;
}

/// Best-effort online verification seam (CrossRef, DOI resolution, ...).
pub trait VerifyRecord {
    fn verify(&self, metadata: PaperMetadata) -> PaperMetadata;
}

/// Placeholder verifier: the identity function.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopVerifier;

impl VerifyRecord for NoopVerifier {
    fn verify(&self, metadata: PaperMetadata) -> PaperMetadata {
        metadata
    }
}

/// Stable record identifier: the first three lowercase title words joined
/// by underscores, suffixed with the year, restricted to `[a-z0-9_]`.
pub fn record_id(title: &str, year: i32) -> String {
    let words: Vec<String> = title
        .to_lowercase()
        .split_whitespace()
        .take(3)
        .map(str::to_owned)
        .collect();
    let raw = format!("{}_{year}", words.join("_"));
    raw.chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}
