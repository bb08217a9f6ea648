pub mod batch;
pub mod catalog;
pub mod config;
pub mod crop;
pub mod detect;
pub mod entities;
pub mod metadata;
pub mod pages;
pub mod raster;

pub use batch::{BatchPaths, BatchReport, DocumentBatch, PhotoBatch};
pub use catalog::{Catalog, ReconcileMode};
pub use config::PipelineConfig;
pub use detect::DetectionChain;
pub use raster::{PageRange, PdfiumRasterizer};
