use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use tracing::{debug, warn};

use super::helpers;
use super::shaper::TemplateData;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("unable to read template {path}: {source}")]
    TemplateUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("template failed to render: {0}")]
    Template(#[from] handlebars::RenderError),
}

/// Compiles the appeal template against shaped data. Built once at startup with its
/// helpers registered and shared by every submission.
pub struct AppealRenderer {
    registry: Handlebars<'static>,
    template_path: PathBuf,
    debug_html_path: Option<PathBuf>,
}

impl AppealRenderer {
    pub fn new(template_path: impl Into<PathBuf>, debug_html_path: Option<PathBuf>) -> Self {
        let mut registry = Handlebars::new();
        helpers::register(&mut registry);

        Self {
            registry,
            template_path: template_path.into(),
            debug_html_path,
        }
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    /// Reads the template fresh, renders it, and drops a copy of the markup at the
    /// debug path when one is configured.
    pub async fn render(&self, data: &TemplateData) -> Result<String, RenderError> {
        let template = tokio::fs::read_to_string(&self.template_path)
            .await
            .map_err(|source| RenderError::TemplateUnreadable {
                path: self.template_path.clone(),
                source,
            })?;

        let html = self.render_template(&template, data)?;

        if let Some(path) = &self.debug_html_path {
            // Shared by all submissions without locking; last writer wins.
            match tokio::fs::write(path, &html).await {
                Ok(()) => debug!(path = %path.display(), "wrote debug appeal html"),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "unable to write debug html")
                }
            }
        }

        Ok(html)
    }

    pub fn render_template(
        &self,
        template: &str,
        data: &TemplateData,
    ) -> Result<String, RenderError> {
        Ok(self.registry.render_template(template, data)?)
    }
}

impl std::fmt::Debug for AppealRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppealRenderer")
            .field("template_path", &self.template_path)
            .field("debug_html_path", &self.debug_html_path)
            .finish_non_exhaustive()
    }
}
