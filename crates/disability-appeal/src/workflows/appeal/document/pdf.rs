use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum PdfGenerationError {
    #[error("unable to launch pdf converter {program}: {source}")]
    Launch {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("pdf converter exited with {status}: {stderr}")]
    ConverterFailed { status: String, stderr: String },
    #[error("pdf rendering timed out after {0:?}")]
    TimedOut(Duration),
    #[error("pdf converter produced no output at {0}")]
    EmptyOutput(PathBuf),
    #[error("pdf io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Page format handed to the render surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    pub page_size: &'static str,
    pub orientation: &'static str,
    pub print_background: bool,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            page_size: "A4",
            orientation: "Portrait",
            print_background: true,
        }
    }
}

/// HTML-to-PDF engine. Implementations write the document to `output` and must not
/// outlive the returned future.
#[async_trait]
pub trait RenderSurface: Send + Sync {
    async fn print_to_pdf(
        &self,
        html: &str,
        output: &Path,
        layout: &PageLayout,
    ) -> Result<(), PdfGenerationError>;
}

/// Drives a `wkhtmltopdf`-compatible converter, streaming the markup over stdin.
#[derive(Debug, Clone)]
pub struct WkhtmltopdfSurface {
    program: PathBuf,
}

impl WkhtmltopdfSurface {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn arguments(layout: &PageLayout, output: &Path) -> Vec<String> {
        let mut args = vec![
            "--quiet".to_string(),
            "--encoding".to_string(),
            "utf-8".to_string(),
            "--page-size".to_string(),
            layout.page_size.to_string(),
            "--orientation".to_string(),
            layout.orientation.to_string(),
        ];
        args.push(if layout.print_background {
            "--background".to_string()
        } else {
            "--no-background".to_string()
        });
        args.push("-".to_string());
        args.push(output.display().to_string());
        args
    }
}

#[async_trait]
impl RenderSurface for WkhtmltopdfSurface {
    async fn print_to_pdf(
        &self,
        html: &str,
        output: &Path,
        layout: &PageLayout,
    ) -> Result<(), PdfGenerationError> {
        let mut child = Command::new(&self.program)
            .args(Self::arguments(layout, output))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PdfGenerationError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(err) = stdin.write_all(html.as_bytes()).await {
                // The converter may bail out before reading everything; its exit status says why.
                debug!(error = %err, "pdf converter closed stdin early");
            }
        }

        let finished = child.wait_with_output().await?;
        if !finished.status.success() {
            return Err(PdfGenerationError::ConverterFailed {
                status: finished.status.to_string(),
                stderr: String::from_utf8_lossy(&finished.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

static LAST_FILE_STAMP: AtomicI64 = AtomicI64::new(0);

/// Epoch milliseconds, bumped when needed so no two files in this process share a stamp.
fn next_file_stamp() -> i64 {
    let now = Utc::now().timestamp_millis();
    let previous = LAST_FILE_STAMP
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    now.max(previous + 1)
}

/// A rendered PDF on local transient storage. The file is removed when this is dropped.
#[derive(Debug)]
pub struct TransientPdf {
    path: PathBuf,
}

impl TransientPdf {
    fn reserve(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub async fn read(&self) -> Result<Vec<u8>, std::io::Error> {
        tokio::fs::read(&self.path).await
    }

    /// Copies the document somewhere permanent before the transient file goes away.
    pub async fn persist_to(&self, destination: &Path) -> Result<u64, std::io::Error> {
        tokio::fs::copy(&self.path, destination).await
    }
}

impl Drop for TransientPdf {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed transient pdf"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "unable to remove transient pdf")
            }
        }
    }
}

/// Turns rendered markup into a single A4 portrait PDF within a bounded time.
pub struct PdfMaterializer {
    surface: Arc<dyn RenderSurface>,
    output_dir: PathBuf,
    timeout: Duration,
    layout: PageLayout,
}

impl PdfMaterializer {
    pub fn new(
        surface: Arc<dyn RenderSurface>,
        output_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            surface,
            output_dir: output_dir.into(),
            timeout,
            layout: PageLayout::default(),
        }
    }

    pub async fn materialize(&self, html: &str) -> Result<TransientPdf, PdfGenerationError> {
        let file_name = format!("Disability_Appeal_{}.pdf", next_file_stamp());
        // Reserved before rendering so a partial file is cleaned up on any failure below.
        let pdf = TransientPdf::reserve(self.output_dir.join(file_name));

        tokio::time::timeout(
            self.timeout,
            self.surface.print_to_pdf(html, pdf.path(), &self.layout),
        )
        .await
        .map_err(|_| PdfGenerationError::TimedOut(self.timeout))??;

        let written = match tokio::fs::metadata(pdf.path()).await {
            Ok(metadata) => metadata.len(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => 0,
            Err(err) => return Err(err.into()),
        };
        if written == 0 {
            return Err(PdfGenerationError::EmptyOutput(pdf.path().to_path_buf()));
        }

        info!(file = %pdf.file_name(), bytes = written, "pdf generated");
        Ok(pdf)
    }
}

impl std::fmt::Debug for PdfMaterializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfMaterializer")
            .field("output_dir", &self.output_dir)
            .field("timeout", &self.timeout)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}
