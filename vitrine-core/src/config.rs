use serde::Deserialize;

/// Pipeline configuration.
///
/// Passed explicitly into the runners; nothing in the core reads the
/// environment at construction time.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Side of the square avatar output, in pixels.
    pub avatar_size: u32,
    /// Cover output dimensions, in pixels.
    pub cover_width: u32,
    pub cover_height: u32,
    /// Margin multiplier applied to a detected face extent when no explicit
    /// crop size hint is present.
    pub face_margin_factor: f32,
    /// Page render resolution for PDF rasterization.
    pub render_dpi: u32,
    /// JPEG quality for avatar output.
    pub jpeg_quality: u8,
    /// Number of leading pages fed to the metadata extractor.
    pub text_pages: usize,
    /// Path prefix recorded in catalog entries for generated cover assets.
    pub asset_link_prefix: String,
    /// Path prefix recorded in catalog entries for copied source PDFs.
    pub pdf_link_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            avatar_size: 400,
            cover_width: 400,
            cover_height: 300,
            face_margin_factor: 2.5,
            render_dpi: 300,
            jpeg_quality: 95,
            text_pages: 3,
            asset_link_prefix: "images/papers".to_owned(),
            pdf_link_prefix: "pdfs".to_owned(),
        }
    }
}
