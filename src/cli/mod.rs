//! Operator subcommands for managing the embedding model.

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::embedding::{self, catalog, fastembed};

/// Download (if needed) and load the configured model, then report its vector space.
pub async fn model_download(settings: &Settings) -> Result<()> {
    let provider = embedding::create_provider(&settings.embedding)?;
    let cache_dir = settings.resolved_cache_dir();

    println!(
        "Preparing {} in {}...",
        settings.embedding.model,
        cache_dir.display()
    );
    let size = provider
        .vector_size()
        .await
        .context("failed to load embedding model")?;

    println!("Vector name: {}", provider.vector_name());
    println!("Vector size: {size}");
    println!("Model ready for use.");
    Ok(())
}

/// Print every supported model with the vector name it is stored under.
pub fn model_list(settings: &Settings) {
    let configured = &settings.embedding.model;
    println!("{:<42} {:<32} {:>5}", "MODEL", "VECTOR NAME", "DIM");
    for desc in catalog::MODELS {
        let marker = if desc.model.eq_ignore_ascii_case(configured) {
            " *"
        } else {
            ""
        };
        println!(
            "{:<42} {:<32} {:>5}{marker}",
            desc.model,
            fastembed::vector_name(desc.model),
            desc.dim
        );
    }
}
