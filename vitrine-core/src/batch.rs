use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use image::codecs::jpeg::JpegEncoder;

use crate::catalog::feed::{Feed, FeedRecord};
use crate::catalog::{Catalog, CatalogRecord, ReconcileMode, ReconcileStats, RecordDisposition};
use crate::config::PipelineConfig;
use crate::crop::{compute_crop, render_canvas, RenderStrategy};
use crate::detect::{DetectionChain, PageRanker};
use crate::metadata::{ExtractMetadata, VerifyRecord};
use crate::pages::{select_cover_page, SelectionOutcome};
use crate::raster::{PageRange, Rasterize};

/// Filesystem layout of one batch run.
#[derive(Debug, Clone)]
pub struct BatchPaths {
    /// Directory scanned for source PDFs.
    pub input_dir: PathBuf,
    /// Directory receiving generated cover assets.
    pub asset_dir: PathBuf,
    /// Directory receiving a copy of each processed PDF.
    pub pdf_dir: PathBuf,
    /// The publication collection file.
    pub catalog: PathBuf,
    /// The news feed file.
    pub feed: PathBuf,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Processed,
    Skipped,
    Failed,
}

/// Per-document audit line, kept so a run can report degraded outcomes
/// (cover-page fallback, missing metadata) instead of hiding them.
#[derive(Debug)]
pub struct ItemReport {
    pub source: PathBuf,
    pub outcome: ItemOutcome,
    pub cover: Option<SelectionOutcome>,
    pub note: String,
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct BatchReport {
    pub stats: BatchStats,
    pub reconcile: ReconcileStats,
    pub feed_inserted: usize,
    pub items: Vec<ItemReport>,
}

/// Replace characters that are unsafe in asset filenames. Whitespace is
/// dropped, anything else non-alphanumeric becomes a dash.
pub fn sanitize_stem(name: &str) -> String {
    name.chars()
        .filter_map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                Some(c)
            } else if c.is_whitespace() {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
}

/// Sequential document pipeline: rasterize, pick a cover page, crop,
/// write the asset, extract metadata and reconcile the catalog.
///
/// One failing document never aborts the run; it is logged, counted and
/// the loop moves on. The catalog and feed are written once at the end.
pub struct DocumentBatch<'a> {
    rasterizer: &'a dyn Rasterize,
    chain: &'a DetectionChain,
    ranker: Option<&'a dyn PageRanker>,
    extractor: Option<&'a dyn ExtractMetadata>,
    verifier: &'a dyn VerifyRecord,
    config: &'a PipelineConfig,
    paths: BatchPaths,
    mode: ReconcileMode,
    page_range: Option<PageRange>,
    added_date: NaiveDate,
}

impl<'a> DocumentBatch<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rasterizer: &'a dyn Rasterize,
        chain: &'a DetectionChain,
        ranker: Option<&'a dyn PageRanker>,
        extractor: Option<&'a dyn ExtractMetadata>,
        verifier: &'a dyn VerifyRecord,
        config: &'a PipelineConfig,
        paths: BatchPaths,
        mode: ReconcileMode,
        page_range: Option<PageRange>,
        added_date: NaiveDate,
    ) -> Self {
        Self {
            rasterizer,
            chain,
            ranker,
            extractor,
            verifier,
            config,
            paths,
            mode,
            page_range,
            added_date,
        }
    }

    /// Run the pipeline over every PDF in the input directory, in filename
    /// order. `progress` is invoked once per document before it is
    /// processed with `(index, total, path)`.
    pub fn run<F>(&self, mut progress: F) -> anyhow::Result<BatchReport>
    where
        F: FnMut(usize, usize, &Path),
    {
        let documents = self.list_documents()?;
        let mut catalog = Catalog::load(&self.paths.catalog)?;
        let mut stats = BatchStats::default();
        let mut items = Vec::with_capacity(documents.len());
        let mut new_records = Vec::new();

        let total = documents.len();
        for (idx, path) in documents.iter().enumerate() {
            progress(idx, total, path);

            if self.mode == ReconcileMode::Normal && self.already_processed(&catalog, path) {
                tracing::info!(doc = %path.display(), "already processed, skipping");
                stats.skipped += 1;
                items.push(ItemReport {
                    source: path.clone(),
                    outcome: ItemOutcome::Skipped,
                    cover: None,
                    note: "already processed".to_owned(),
                });
                continue;
            }

            match self.process_document(path) {
                Ok((record, cover)) => {
                    stats.succeeded += 1;
                    let note = match &record {
                        Some(r) => format!("cataloged as {}", r.id),
                        None => "asset only, no metadata backend".to_owned(),
                    };
                    if let Some(record) = record {
                        new_records.push(record);
                    }
                    items.push(ItemReport {
                        source: path.clone(),
                        outcome: ItemOutcome::Processed,
                        cover: Some(cover),
                        note,
                    });
                }
                Err(err) => {
                    tracing::error!(doc = %path.display(), error = %format!("{err:#}"), "document failed");
                    stats.failed += 1;
                    items.push(ItemReport {
                        source: path.clone(),
                        outcome: ItemOutcome::Failed,
                        cover: None,
                        note: format!("{err:#}"),
                    });
                }
            }
        }

        let outcome = catalog.reconcile(new_records.clone(), self.mode);
        catalog.save(&self.paths.catalog)?;

        let mut feed = Feed::load(&self.paths.feed)?;
        let mut feed_inserted = 0;
        for (record, disposition) in new_records.iter().zip(&outcome.dispositions) {
            // Only inserted or replaced records announce themselves; a
            // reconcile skip must not leak into the feed. The feed itself
            // dedups by id on top of that.
            if *disposition == RecordDisposition::Skipped {
                continue;
            }
            if feed.insert(FeedRecord::for_publication(record)) {
                feed_inserted += 1;
            }
        }
        if feed_inserted > 0 {
            feed.save(&self.paths.feed)?;
        }

        tracing::info!(
            succeeded = stats.succeeded,
            skipped = stats.skipped,
            failed = stats.failed,
            inserted = outcome.stats.inserted,
            replaced = outcome.stats.replaced,
            "batch finished"
        );
        Ok(BatchReport {
            stats,
            reconcile: outcome.stats,
            feed_inserted,
            items,
        })
    }

    fn list_documents(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut documents: Vec<PathBuf> = fs::read_dir(&self.paths.input_dir)
            .with_context(|| format!("can't read {}", self.paths.input_dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
            })
            .collect();
        documents.sort();
        Ok(documents)
    }

    fn already_processed(&self, catalog: &Catalog, path: &Path) -> bool {
        let (stem, filename) = stem_and_name(path);
        let image_link = format!("{}/{}.png", self.config.asset_link_prefix, stem);
        let pdf_link = format!("{}/{}", self.config.pdf_link_prefix, filename);
        if catalog.find_by_paths(&image_link, &pdf_link).is_some() {
            return true;
        }
        // Without a metadata backend no catalog entry ever exists, so the
        // asset file on disk is the only dedup witness. With a backend the
        // catalog alone decides; a surviving asset must not block
        // re-cataloging a lost entry.
        self.extractor.is_none() && self.paths.asset_dir.join(format!("{stem}.png")).exists()
    }

    fn process_document(
        &self,
        path: &Path,
    ) -> anyhow::Result<(Option<CatalogRecord>, SelectionOutcome)> {
        let (stem, filename) = stem_and_name(path);

        let candidates = self.rasterizer.render_pages(path, self.page_range.as_ref())?;
        let ((page, image), cover) = select_cover_page(candidates, self.ranker)
            .context("document produced no page renders")?;
        tracing::debug!(doc = %path.display(), page, "cover page selected");

        let detection = self.chain.detect(&image);
        let crop = compute_crop(image.width(), image.height(), &detection, self.config);
        let canvas = render_canvas(
            &image,
            &crop,
            self.config.cover_width,
            self.config.cover_height,
            RenderStrategy::CropThenResize,
        );

        fs::create_dir_all(&self.paths.asset_dir)?;
        let asset_path = self.paths.asset_dir.join(format!("{stem}.png"));
        canvas
            .save(&asset_path)
            .with_context(|| format!("can't save {}", asset_path.display()))?;

        fs::create_dir_all(&self.paths.pdf_dir)?;
        let pdf_copy = self.paths.pdf_dir.join(&filename);
        fs::copy(path, &pdf_copy)
            .with_context(|| format!("can't copy pdf to {}", pdf_copy.display()))?;

        let Some(extractor) = self.extractor else {
            return Ok((None, cover));
        };
        let text = self.rasterizer.extract_text(path, self.config.text_pages)?;
        let Some(metadata) = extractor.extract(&text, &filename) else {
            tracing::warn!(doc = %path.display(), "no metadata extracted, asset kept");
            return Ok((None, cover));
        };
        let metadata = self.verifier.verify(metadata);
        let record =
            CatalogRecord::from_metadata(metadata, &filename, &stem, self.added_date, self.config);
        Ok((Some(record), cover))
    }
}

fn stem_and_name(path: &Path) -> (String, String) {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|s| sanitize_stem(&s.to_string_lossy()))
        .unwrap_or_default();
    (stem, filename)
}

const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

/// Avatar pipeline: pick the newest photo in a directory, crop a square
/// region around the detected subject and write a fixed-size JPEG.
pub struct PhotoBatch<'a> {
    chain: &'a DetectionChain,
    config: &'a PipelineConfig,
}

impl<'a> PhotoBatch<'a> {
    pub fn new(chain: &'a DetectionChain, config: &'a PipelineConfig) -> Self {
        Self { chain, config }
    }

    /// Returns the source photo that was used.
    pub fn run(&self, input_dir: &Path, output: &Path) -> anyhow::Result<PathBuf> {
        let source = newest_photo(input_dir)?;
        tracing::info!(photo = %source.display(), "processing avatar source");

        let image = image::open(&source)
            .with_context(|| format!("can't open {}", source.display()))?;
        let detection = self.chain.detect(&image);
        let crop = compute_crop(image.width(), image.height(), &detection, self.config);
        let canvas = render_canvas(
            &image,
            &crop,
            self.config.avatar_size,
            self.config.avatar_size,
            RenderStrategy::CropThenResize,
        );

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(output)
            .with_context(|| format!("can't create {}", output.display()))?;
        let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), self.config.jpeg_quality);
        canvas
            .write_with_encoder(encoder)
            .with_context(|| format!("can't encode {}", output.display()))?;
        Ok(source)
    }
}

/// The most recently modified photo in `dir`, by extension.
fn newest_photo(dir: &Path) -> anyhow::Result<PathBuf> {
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(dir).with_context(|| format!("can't read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        let is_photo = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| PHOTO_EXTENSIONS.iter().any(|p| e.eq_ignore_ascii_case(p)));
        if !is_photo {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }
    newest
        .map(|(_, path)| path)
        .with_context(|| format!("no photos found in {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Links, Provenance};
    use crate::entities::{Confidence, PageNumber};
    use crate::metadata::{NoopVerifier, PaperMetadata, PublicationKind, PublicationStatus};
    use image::DynamicImage;

    struct StubRasterizer {
        pages: usize,
    }

    impl Rasterize for StubRasterizer {
        fn render_pages(
            &self,
            _path: &Path,
            range: Option<&PageRange>,
        ) -> anyhow::Result<Vec<(PageNumber, DynamicImage)>> {
            let selected: Vec<usize> = match range {
                Some(range) => range.indices(self.pages),
                None => (0..self.pages).collect(),
            };
            Ok(selected
                .into_iter()
                .map(|i| (i + 1, DynamicImage::new_rgb8(850, 1100)))
                .collect())
        }

        fn extract_text(&self, _path: &Path, _max_pages: usize) -> anyhow::Result<String> {
            Ok("A Study of X\nScientific Data, 2024".to_owned())
        }
    }

    struct FailingRasterizer;

    impl Rasterize for FailingRasterizer {
        fn render_pages(
            &self,
            path: &Path,
            _range: Option<&PageRange>,
        ) -> anyhow::Result<Vec<(PageNumber, DynamicImage)>> {
            anyhow::bail!("can't open {}", path.display())
        }

        fn extract_text(&self, _path: &Path, _max_pages: usize) -> anyhow::Result<String> {
            anyhow::bail!("no text")
        }
    }

    struct StubExtractor;

    impl ExtractMetadata for StubExtractor {
        fn extract(&self, _text: &str, _filename: &str) -> Option<PaperMetadata> {
            serde_json::from_str(
                r#"{"title":"A Study of X","authors":["Doe J"],"venue":"Scientific Data","year":2024}"#,
            )
            .ok()
        }
    }

    fn paths(root: &Path) -> BatchPaths {
        BatchPaths {
            input_dir: root.join("raw-papers"),
            asset_dir: root.join("images/papers"),
            pdf_dir: root.join("pdfs"),
            catalog: root.join("data/publications.json"),
            feed: root.join("data/news.json"),
        }
    }

    fn batch<'a>(
        rasterizer: &'a dyn Rasterize,
        chain: &'a DetectionChain,
        extractor: Option<&'a dyn ExtractMetadata>,
        verifier: &'a dyn VerifyRecord,
        config: &'a PipelineConfig,
        paths: BatchPaths,
        mode: ReconcileMode,
    ) -> DocumentBatch<'a> {
        DocumentBatch::new(
            rasterizer,
            chain,
            None,
            extractor,
            verifier,
            config,
            paths,
            mode,
            None,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        )
    }

    fn seed_pdf(dir: &Path, name: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), b"%PDF-1.4 stub").unwrap();
    }

    #[test]
    fn test_run_produces_asset_catalog_and_feed() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path());
        seed_pdf(&paths.input_dir, "study.pdf");

        let rasterizer = StubRasterizer { pages: 4 };
        let chain = DetectionChain::center_only();
        let config = PipelineConfig::default();
        let runner = batch(
            &rasterizer,
            &chain,
            Some(&StubExtractor),
            &NoopVerifier,
            &config,
            paths.clone(),
            ReconcileMode::Normal,
        );
        let report = runner.run(|_, _, _| {}).unwrap();

        assert_eq!(report.stats.succeeded, 1);
        assert_eq!(report.reconcile.inserted, 1);
        assert_eq!(report.feed_inserted, 1);
        assert!(paths.asset_dir.join("study.png").exists());
        assert!(paths.pdf_dir.join("study.pdf").exists());

        let catalog = Catalog::load(&paths.catalog).unwrap();
        assert_eq!(catalog.publications.len(), 1);
        assert_eq!(catalog.publications[0].id, "a_study_of_2024");
        assert_eq!(catalog.publications[0].image, "images/papers/study.png");

        let feed = Feed::load(&paths.feed).unwrap();
        assert_eq!(feed.news.len(), 1);
        assert_eq!(feed.news[0].related_id, "a_study_of_2024");
    }

    fn seeded_record(id: &str, image: &str, pdf: &str) -> CatalogRecord {
        CatalogRecord {
            id: id.to_owned(),
            title: "A Study of X".to_owned(),
            authors: vec!["Doe J".to_owned()],
            author_note: String::new(),
            venue: "Scientific Data".to_owned(),
            year: 2024,
            volume: String::new(),
            pages: String::new(),
            kind: PublicationKind::Journal,
            status: PublicationStatus::Published,
            badges: Vec::new(),
            image: image.to_owned(),
            links: Links {
                pdf: pdf.to_owned(),
                doi: "#".to_owned(),
            },
            citation_key: id.to_owned(),
            added_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            provenance: Provenance {
                extracted_by: "AI".to_owned(),
                confidence: Confidence::High,
                verified_online: false,
                notes: String::new(),
            },
        }
    }

    #[test]
    fn test_id_collision_skip_adds_no_feed_entry() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path());
        seed_pdf(&paths.input_dir, "study.pdf");

        // Same derived id, different asset and pdf paths: the path
        // pre-check cannot catch this, only the reconciler can.
        let mut seeded = Catalog::default();
        seeded.publications.push(seeded_record(
            "a_study_of_2024",
            "images/papers/other.png",
            "pdfs/other.pdf",
        ));
        seeded.save(&paths.catalog).unwrap();

        let rasterizer = StubRasterizer { pages: 2 };
        let chain = DetectionChain::center_only();
        let config = PipelineConfig::default();
        let runner = batch(
            &rasterizer,
            &chain,
            Some(&StubExtractor),
            &NoopVerifier,
            &config,
            paths.clone(),
            ReconcileMode::Normal,
        );
        let report = runner.run(|_, _, _| {}).unwrap();

        assert_eq!(report.reconcile.skipped, 1);
        assert_eq!(report.feed_inserted, 0);
        let catalog = Catalog::load(&paths.catalog).unwrap();
        assert_eq!(catalog.publications.len(), 1);
        assert_eq!(catalog.publications[0].image, "images/papers/other.png");
        let feed = Feed::load(&paths.feed).unwrap();
        assert!(feed.news.is_empty());
    }

    #[test]
    fn test_lost_catalog_entry_is_recataloged() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path());
        seed_pdf(&paths.input_dir, "study.pdf");

        let rasterizer = StubRasterizer { pages: 2 };
        let chain = DetectionChain::center_only();
        let config = PipelineConfig::default();
        let runner = batch(
            &rasterizer,
            &chain,
            Some(&StubExtractor),
            &NoopVerifier,
            &config,
            paths.clone(),
            ReconcileMode::Normal,
        );
        runner.run(|_, _, _| {}).unwrap();
        assert!(paths.asset_dir.join("study.png").exists());

        // The catalog entry is gone but the cover asset survived. With an
        // extraction backend the catalog alone decides, so the document is
        // processed again rather than skipped forever.
        Catalog::default().save(&paths.catalog).unwrap();
        let second = runner.run(|_, _, _| {}).unwrap();

        assert_eq!(second.stats.skipped, 0);
        assert_eq!(second.stats.succeeded, 1);
        assert_eq!(second.reconcile.inserted, 1);
        let catalog = Catalog::load(&paths.catalog).unwrap();
        assert_eq!(catalog.publications.len(), 1);
    }

    #[test]
    fn test_force_refreshes_pdf_copy() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path());
        seed_pdf(&paths.input_dir, "study.pdf");

        let rasterizer = StubRasterizer { pages: 2 };
        let chain = DetectionChain::center_only();
        let config = PipelineConfig::default();
        let normal = batch(
            &rasterizer,
            &chain,
            Some(&StubExtractor),
            &NoopVerifier,
            &config,
            paths.clone(),
            ReconcileMode::Normal,
        );
        normal.run(|_, _, _| {}).unwrap();

        fs::write(paths.input_dir.join("study.pdf"), b"%PDF-1.4 revised").unwrap();
        let force = batch(
            &rasterizer,
            &chain,
            Some(&StubExtractor),
            &NoopVerifier,
            &config,
            paths.clone(),
            ReconcileMode::Force,
        );
        force.run(|_, _, _| {}).unwrap();

        let copied = fs::read(paths.pdf_dir.join("study.pdf")).unwrap();
        assert_eq!(copied, b"%PDF-1.4 revised");
    }

    #[test]
    fn test_rerun_skips_processed_document() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path());
        seed_pdf(&paths.input_dir, "study.pdf");

        let rasterizer = StubRasterizer { pages: 2 };
        let chain = DetectionChain::center_only();
        let config = PipelineConfig::default();
        let runner = batch(
            &rasterizer,
            &chain,
            Some(&StubExtractor),
            &NoopVerifier,
            &config,
            paths.clone(),
            ReconcileMode::Normal,
        );
        runner.run(|_, _, _| {}).unwrap();
        let second = runner.run(|_, _, _| {}).unwrap();

        assert_eq!(second.stats.skipped, 1);
        assert_eq!(second.stats.succeeded, 0);
        let catalog = Catalog::load(&paths.catalog).unwrap();
        assert_eq!(catalog.publications.len(), 1);
        let feed = Feed::load(&paths.feed).unwrap();
        assert_eq!(feed.news.len(), 1);
    }

    #[test]
    fn test_force_reprocesses_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path());
        seed_pdf(&paths.input_dir, "study.pdf");

        let rasterizer = StubRasterizer { pages: 2 };
        let chain = DetectionChain::center_only();
        let config = PipelineConfig::default();
        let normal = batch(
            &rasterizer,
            &chain,
            Some(&StubExtractor),
            &NoopVerifier,
            &config,
            paths.clone(),
            ReconcileMode::Normal,
        );
        normal.run(|_, _, _| {}).unwrap();

        let force = batch(
            &rasterizer,
            &chain,
            Some(&StubExtractor),
            &NoopVerifier,
            &config,
            paths.clone(),
            ReconcileMode::Force,
        );
        let report = force.run(|_, _, _| {}).unwrap();

        assert_eq!(report.stats.succeeded, 1);
        assert_eq!(report.reconcile.replaced, 1);
        let catalog = Catalog::load(&paths.catalog).unwrap();
        assert_eq!(catalog.publications.len(), 1);
        // Replacement keeps its id, so the feed entry is not duplicated.
        let feed = Feed::load(&paths.feed).unwrap();
        assert_eq!(feed.news.len(), 1);
    }

    #[test]
    fn test_failure_does_not_abort_run() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path());
        seed_pdf(&paths.input_dir, "bad.pdf");

        let rasterizer = FailingRasterizer;
        let chain = DetectionChain::center_only();
        let config = PipelineConfig::default();
        let runner = batch(
            &rasterizer,
            &chain,
            Some(&StubExtractor),
            &NoopVerifier,
            &config,
            paths.clone(),
            ReconcileMode::Normal,
        );
        let report = runner.run(|_, _, _| {}).unwrap();

        assert_eq!(report.stats.failed, 1);
        assert_eq!(report.stats.succeeded, 0);
        assert_eq!(report.items[0].outcome, ItemOutcome::Failed);
        // The catalog is still written, empty.
        let catalog = Catalog::load(&paths.catalog).unwrap();
        assert!(catalog.publications.is_empty());
    }

    #[test]
    fn test_no_extractor_writes_asset_only() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path());
        seed_pdf(&paths.input_dir, "study.pdf");

        let rasterizer = StubRasterizer { pages: 3 };
        let chain = DetectionChain::center_only();
        let config = PipelineConfig::default();
        let runner = batch(
            &rasterizer,
            &chain,
            None,
            &NoopVerifier,
            &config,
            paths.clone(),
            ReconcileMode::Normal,
        );
        let report = runner.run(|_, _, _| {}).unwrap();

        assert_eq!(report.stats.succeeded, 1);
        assert_eq!(report.reconcile.inserted, 0);
        assert!(paths.asset_dir.join("study.png").exists());
        let catalog = Catalog::load(&paths.catalog).unwrap();
        assert!(catalog.publications.is_empty());

        // With no catalog entry the asset file is the dedup witness.
        let second = runner.run(|_, _, _| {}).unwrap();
        assert_eq!(second.stats.skipped, 1);
    }

    #[test]
    fn test_progress_callback_sees_every_document() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path());
        seed_pdf(&paths.input_dir, "a.pdf");
        seed_pdf(&paths.input_dir, "b.pdf");

        let rasterizer = StubRasterizer { pages: 1 };
        let chain = DetectionChain::center_only();
        let config = PipelineConfig::default();
        let runner = batch(
            &rasterizer,
            &chain,
            None,
            &NoopVerifier,
            &config,
            paths,
            ReconcileMode::Normal,
        );

        let mut seen = Vec::new();
        runner
            .run(|idx, total, path| {
                seen.push((idx, total, path.file_name().unwrap().to_owned()));
            })
            .unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].1, 2);
        assert_eq!(seen[0].2, "a.pdf");
        assert_eq!(seen[1].2, "b.pdf");
    }

    #[test]
    fn test_sanitize_stem() {
        assert_eq!(sanitize_stem("paper one"), "paperone");
        assert_eq!(sanitize_stem("study_v2-final"), "study_v2-final");
        assert_eq!(sanitize_stem("a/b:c"), "a-b-c");
    }

    #[test]
    fn test_newest_photo_wins() {
        let dir = tempfile::tempdir().unwrap();
        let older = dir.path().join("older.png");
        let newer = dir.path().join("newer.jpg");
        image::DynamicImage::new_rgb8(8, 8).save(&older).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        image::DynamicImage::new_rgb8(8, 8).save(&newer).unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        assert_eq!(newest_photo(dir.path()).unwrap(), newer);
    }

    #[test]
    fn test_photo_batch_writes_square_avatar() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw-avatars");
        fs::create_dir_all(&input).unwrap();
        image::DynamicImage::new_rgb8(1000, 600)
            .save(input.join("portrait.png"))
            .unwrap();

        let chain = DetectionChain::center_only();
        let config = PipelineConfig::default();
        let output = dir.path().join("images/profile.jpg");
        let source = PhotoBatch::new(&chain, &config).run(&input, &output).unwrap();

        assert_eq!(source, input.join("portrait.png"));
        let written = image::open(&output).unwrap();
        assert_eq!((written.width(), written.height()), (400, 400));
    }

    #[test]
    fn test_photo_batch_empty_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let chain = DetectionChain::center_only();
        let config = PipelineConfig::default();
        let result = PhotoBatch::new(&chain, &config)
            .run(dir.path(), &dir.path().join("out.jpg"));
        assert!(result.is_err());
    }
}
