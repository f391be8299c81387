pub mod config;
pub mod info;
pub mod pairs;
pub mod stitch;

use std::path::Path;

use anyhow::{Context, Result};
use tilestitch_core::io::{DatasetManifest, FileImageSource};
use tilestitch_core::pipeline::config::StitchingConfig;
use tilestitch_core::view::SpimDataset;

/// Read a manifest and resolve its image paths against the manifest's directory.
pub fn load_dataset(path: &Path) -> Result<(SpimDataset, FileImageSource)> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    let manifest: DatasetManifest = toml::from_str(&contents).context("Invalid dataset manifest")?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(manifest.load(base_dir)?)
}

pub fn load_config(path: Option<&Path>) -> Result<StitchingConfig> {
    let Some(path) = path else {
        return Ok(StitchingConfig::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&contents).context("Invalid stitching config")
}

/// Parse a comma-separated list such as `2,2,1`.
pub fn parse_list<T: std::str::FromStr>(value: &str) -> Result<Vec<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .split(',')
        .map(|s| {
            s.trim()
                .parse()
                .with_context(|| format!("Invalid list entry '{}'", s.trim()))
        })
        .collect()
}
