//! Appeal document pipeline: shaped data, HTML rendering and PDF materialization.

pub mod helpers;
pub mod pdf;
pub mod renderer;
pub mod shaper;

pub use pdf::{
    PageLayout, PdfGenerationError, PdfMaterializer, RenderSurface, TransientPdf,
    WkhtmltopdfSurface,
};
pub use renderer::{AppealRenderer, RenderError};
pub use shaper::TemplateData;
