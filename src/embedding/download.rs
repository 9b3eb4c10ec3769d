//! Model file acquisition from the Hugging Face hub.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;

use super::catalog::ModelDescription;

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Local paths of a model's files.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub model: PathBuf,
    pub tokenizer: PathBuf,
}

impl ModelFiles {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            model: dir.join(MODEL_FILE),
            tokenizer: dir.join(TOKENIZER_FILE),
        }
    }

    pub fn exist(&self) -> bool {
        self.model.exists() && self.tokenizer.exists()
    }
}

/// Make sure the model and tokenizer are present in `dir`, downloading what is missing.
pub async fn ensure_model_files(desc: &ModelDescription, dir: &Path) -> Result<ModelFiles> {
    let files = ModelFiles::in_dir(dir);
    if files.exist() {
        return Ok(files);
    }

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create cache dir: {}", dir.display()))?;

    if !files.model.exists() {
        tracing::info!(model = desc.model, "downloading ONNX model");
        download_file(&desc.file_url(desc.model_file), &files.model).await?;
    }
    if !files.tokenizer.exists() {
        tracing::info!(model = desc.model, "downloading tokenizer");
        download_file(&desc.file_url(TOKENIZER_FILE), &files.tokenizer).await?;
    }

    Ok(files)
}

/// Download a file from a URL with progress bar. Uses atomic write (tmp + rename).
async fn download_file(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download of {url} failed with HTTP {}",
        response.status()
    );

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            if let Ok(style) =
                ProgressStyle::default_bar().template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
            {
                pb.set_style(style.progress_chars("##-"));
            }
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        file.write_all(&chunk)
            .await
            .context("error writing to file")?;
        pb.inc(chunk.len() as u64);
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    pb.finish_and_clear();
    tracing::info!(path = %dest.display(), "download complete");
    Ok(())
}
