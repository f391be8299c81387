use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StitchError};
use crate::view::{
    AttributeValue, SpimDataset, ViewDescription, ViewId, ViewRegistration, ViewRegistrations,
    ViewSetup,
};

use super::file::{FileImageSource, PixelType, RawVolume};

/// On-disk description of an acquisition: setups, time points and one file
/// plus stage translation per view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatasetManifest {
    #[serde(default)]
    pub timepoints: Vec<AttributeValue>,
    pub setups: Vec<ViewSetup>,
    pub images: Vec<ImageEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageEntry {
    pub timepoint: u32,
    pub setup: u32,
    /// Relative paths are resolved against the manifest directory.
    pub path: PathBuf,
    /// Set for headerless raw volumes; 2D image formats are detected otherwise.
    #[serde(default)]
    pub pixel_type: Option<PixelType>,
    #[serde(default)]
    pub translation: Vec<f64>,
}

/// Translation of one view, as written back after optimisation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistrationEntry {
    pub timepoint: u32,
    pub setup: u32,
    pub translation: Vec<f64>,
}

impl DatasetManifest {
    /// Build the in-memory dataset and a file-backed image source.
    pub fn load(&self, base_dir: &Path) -> Result<(SpimDataset, FileImageSource)> {
        let setups: HashMap<u32, Arc<ViewSetup>> = self
            .setups
            .iter()
            .map(|s| (s.id, Arc::new(s.clone())))
            .collect();

        let mut views = Vec::with_capacity(self.images.len());
        let mut registrations = ViewRegistrations::new();
        let mut source = FileImageSource::new();

        for entry in &self.images {
            let id = ViewId::new(entry.timepoint, entry.setup);
            let setup = setups.get(&entry.setup).ok_or_else(|| {
                StitchError::InvalidArgument(format!(
                    "image {} references unknown setup {}",
                    entry.path.display(),
                    entry.setup
                ))
            })?;
            let timepoint = self
                .timepoints
                .iter()
                .find(|t| t.id == entry.timepoint)
                .cloned()
                .unwrap_or_else(|| AttributeValue::new(entry.timepoint));

            let path = if entry.path.is_absolute() {
                entry.path.clone()
            } else {
                base_dir.join(&entry.path)
            };
            match entry.pixel_type {
                Some(pixel_type) => source.add_raw(
                    id,
                    RawVolume {
                        path,
                        size: setup.size.clone(),
                        pixel_type,
                    },
                ),
                None => source.add_image(id, path, Some(setup.size.clone())),
            }

            let registration = if entry.translation.is_empty() {
                ViewRegistration::default()
            } else {
                ViewRegistration::from_translation(&entry.translation)
            };
            registrations.insert(id, registration);
            views.push(ViewDescription::new(timepoint, Arc::clone(setup)));
        }

        views.sort_by_key(ViewDescription::id);
        Ok((SpimDataset::new(views, registrations), source))
    }
}

/// Flatten registrations into serialisable entries, ordered by view id.
pub fn registration_entries(registrations: &ViewRegistrations) -> Vec<RegistrationEntry> {
    registrations
        .iter()
        .map(|(id, r)| RegistrationEntry {
            timepoint: id.timepoint,
            setup: id.setup,
            translation: r.translation.clone(),
        })
        .collect()
}
