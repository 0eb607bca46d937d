use crate::infra::{build_materializer, build_renderer};
use chrono::Utc;
use clap::Args;
use disability_appeal::config::AppConfig;
use disability_appeal::error::AppError;
use disability_appeal::workflows::appeal::{
    validate_submission, AppealId, AppealSubmission, DocumentError, TemplateData,
};
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub(crate) struct RenderArgs {
    /// Submission JSON, in the same shape the intake endpoint accepts
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Destination file (defaults to the input name with a .pdf or .html extension)
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Stop after rendering the template and write the HTML instead of a PDF
    #[arg(long)]
    pub(crate) html_only: bool,
}

pub(crate) async fn run_render(args: RenderArgs) -> Result<(), AppError> {
    let RenderArgs {
        input,
        output,
        html_only,
    } = args;

    let mut config = AppConfig::load()?;
    config.document.debug_html_path = None;

    let raw = tokio::fs::read_to_string(&input).await?;
    let data = preview_data(&raw)?;

    let renderer = build_renderer(&config.document);
    let html = renderer.render(&data).await.map_err(DocumentError::from)?;

    let output = output.unwrap_or_else(|| default_output(&input, html_only));
    if html_only {
        tokio::fs::write(&output, &html).await?;
        println!("Rendered HTML for {} -> {}", data.name, output.display());
        return Ok(());
    }

    let materializer = build_materializer(&config.document);
    let pdf = materializer
        .materialize(&html)
        .await
        .map_err(DocumentError::from)?;
    let bytes = pdf.persist_to(&output).await?;
    println!(
        "Rendered PDF for {} -> {} ({} bytes)",
        data.name,
        output.display(),
        bytes
    );

    Ok(())
}

/// Validates the submission exactly as the endpoint would and shapes it for the template.
fn preview_data(raw: &str) -> Result<TemplateData, AppError> {
    let submission: AppealSubmission = serde_json::from_str(raw)?;
    let appeal = validate_submission(submission)?;
    let record = appeal.into_record(AppealId("preview".to_string()), Utc::now());
    Ok(TemplateData::from_record(&record))
}

fn default_output(input: &Path, html_only: bool) -> PathBuf {
    input.with_extension(if html_only { "html" } else { "pdf" })
}
