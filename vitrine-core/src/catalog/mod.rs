use std::path::Path;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::entities::Confidence;
use crate::metadata::{record_id, PaperMetadata, PublicationKind, PublicationStatus};

pub mod feed;

/// Persistence failure for the catalog and feed files. Any error here
/// leaves the previous on-disk state untouched.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("atomic replace: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// External link fields of a catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Links {
    pub pdf: String,
    pub doi: String,
}

/// Extraction provenance, kept under the `_metadata` key on disk.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Provenance {
    pub extracted_by: String,
    pub confidence: Confidence,
    pub verified_online: bool,
    #[serde(default)]
    pub notes: String,
}

/// One entry of the persisted publication collection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogRecord {
    pub id: String,
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
    #[serde(rename = "type")]
    pub kind: PublicationKind,
    pub status: PublicationStatus,
    #[serde(default)]
    pub badges: Vec<String>,
    /// Path of the generated cover asset, relative to the site root.
    pub image: String,
    pub links: Links,
    pub citation_key: String,
    pub added_date: NaiveDate,
    #[serde(rename = "_metadata")]
    pub provenance: Provenance,
}

impl CatalogRecord {
    /// Shape extracted metadata into a catalog record. `asset_stem` is the
    /// sanitized output stem shared with the asset writer so the identity
    /// probe and the writer always agree on paths.
    pub fn from_metadata(
        metadata: PaperMetadata,
        source_filename: &str,
        asset_stem: &str,
        added_date: NaiveDate,
        config: &PipelineConfig,
    ) -> Self {
        let id = record_id(&metadata.title, metadata.year);
        let doi = if metadata.doi.is_empty() {
            "#".to_owned()
        } else {
            format!("https://doi.org/{}", metadata.doi)
        };
        Self {
            citation_key: id.clone(),
            id,
            title: metadata.title,
            authors: metadata.authors,
            author_note: metadata.author_note,
            venue: metadata.venue,
            year: metadata.year,
            volume: metadata.volume,
            pages: metadata.pages,
            kind: metadata.kind,
            status: metadata.status,
            badges: Vec::new(),
            image: format!("{}/{}.png", config.asset_link_prefix, asset_stem),
            links: Links {
                pdf: format!("{}/{}", config.pdf_link_prefix, source_filename),
                doi,
            },
            added_date,
            provenance: Provenance {
                extracted_by: "AI".to_owned(),
                confidence: metadata.confidence,
                verified_online: metadata.verified_online,
                notes: metadata.notes,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Any identity match is skipped; existing entries are never touched.
    Normal,
    /// Identity matches are replaced by the incoming record.
    Force,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    pub inserted: usize,
    pub replaced: usize,
    pub skipped: usize,
}

impl ReconcileStats {
    fn tally(dispositions: &[RecordDisposition]) -> Self {
        let mut stats = Self::default();
        for disposition in dispositions {
            match disposition {
                RecordDisposition::Inserted => stats.inserted += 1,
                RecordDisposition::Replaced => stats.replaced += 1,
                RecordDisposition::Skipped => stats.skipped += 1,
            }
        }
        stats
    }
}

/// What the reconciler did with one incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordDisposition {
    Inserted,
    Replaced,
    Skipped,
}

/// Result of one reconcile call. `dispositions` is aligned with the
/// incoming record order, so callers can act per record (notifications
/// fire only for inserted or replaced entries).
#[derive(Debug)]
pub struct ReconcileReport {
    pub stats: ReconcileStats,
    pub dispositions: Vec<RecordDisposition>,
}

/// The persisted publication collection. Insertion order is display order.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Catalog {
    pub publications: Vec<CatalogRecord>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        load_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        save_json(path, self)
    }

    /// Identity probe: exact id match, else asset-path match, else
    /// pdf-link match. Returns the index of the matched entry.
    pub fn probe(&self, record: &CatalogRecord) -> Option<usize> {
        self.position(&record.id, &record.image, &record.links.pdf)
    }

    /// Probe by derived paths only, for deciding whether a source document
    /// was already processed before any extraction runs.
    pub fn find_by_paths(&self, image: &str, pdf_link: &str) -> Option<usize> {
        if let Some(idx) = self.publications.iter().position(|p| p.image == image) {
            return Some(idx);
        }
        self.publications.iter().position(|p| p.links.pdf == pdf_link)
    }

    fn position(&self, id: &str, image: &str, pdf_link: &str) -> Option<usize> {
        if let Some(idx) = self.publications.iter().position(|p| p.id == id) {
            return Some(idx);
        }
        self.find_by_paths(image, pdf_link)
    }

    /// Merge `new_records` into the collection.
    ///
    /// Normal mode appends unmatched records and skips the rest. Force mode
    /// replaces each matched entry in place, which keeps surrounding order
    /// intact; only when several incoming records match the same existing
    /// entry does it fall back to removing every matched entry and
    /// appending all incoming records at the end.
    pub fn reconcile(&mut self, new_records: Vec<CatalogRecord>, mode: ReconcileMode) -> ReconcileReport {
        let mut dispositions = Vec::with_capacity(new_records.len());
        match mode {
            ReconcileMode::Normal => {
                for record in new_records {
                    match self.probe(&record) {
                        Some(idx) => {
                            tracing::info!(id = %record.id, existing = idx, "already present, skipping");
                            dispositions.push(RecordDisposition::Skipped);
                        }
                        None => {
                            self.publications.push(record);
                            dispositions.push(RecordDisposition::Inserted);
                        }
                    }
                }
            }
            ReconcileMode::Force => {
                let matches: Vec<Option<usize>> =
                    new_records.iter().map(|r| self.probe(r)).collect();
                let mut matched: Vec<usize> = matches.iter().flatten().copied().collect();
                matched.sort_unstable();
                let overlapping = matched.windows(2).any(|w| w[0] == w[1]);

                if overlapping {
                    // Several incoming records collapse onto one existing
                    // entry: drop every matched entry once, append the
                    // whole batch. Surrounding order is not preserved here.
                    matched.dedup();
                    tracing::warn!(
                        removed = matched.len(),
                        "overlapping force replacements, re-appending batch"
                    );
                    for idx in matched.into_iter().rev() {
                        self.publications.remove(idx);
                    }
                    for (record, was_matched) in new_records.into_iter().zip(&matches) {
                        dispositions.push(if was_matched.is_some() {
                            RecordDisposition::Replaced
                        } else {
                            RecordDisposition::Inserted
                        });
                        self.publications.push(record);
                    }
                } else {
                    for (record, matched_idx) in new_records.into_iter().zip(matches) {
                        match matched_idx {
                            Some(idx) => {
                                tracing::info!(id = %record.id, existing = idx, "replacing entry in place");
                                self.publications[idx] = record;
                                dispositions.push(RecordDisposition::Replaced);
                            }
                            None => {
                                self.publications.push(record);
                                dispositions.push(RecordDisposition::Inserted);
                            }
                        }
                    }
                }
            }
        }
        ReconcileReport {
            stats: ReconcileStats::tally(&dispositions),
            dispositions,
        }
    }
}

/// Read a JSON store, defaulting when the file does not exist yet.
pub(crate) fn load_json<T: Default + DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// All-or-nothing write: serialize into a temporary file in the target
/// directory, then atomically replace the destination. A failure at any
/// point leaves the previous file untouched.
pub(crate) fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(tmp.as_file_mut(), value)?;
    tmp.persist(path)?;
    Ok(())
}
