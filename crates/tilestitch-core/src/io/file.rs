use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StitchError};
use crate::view::ViewId;

use super::source::{downsample_block_mean, ImageSource};

/// Sample type of a raw volume file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelType {
    U8,
    U16,
    F32,
}

impl PixelType {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::F32 => 4,
        }
    }
}

/// Headerless little-endian volume, x fastest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawVolume {
    pub path: PathBuf,
    pub size: Vec<usize>,
    pub pixel_type: PixelType,
}

#[derive(Clone, Debug)]
enum ImageFile {
    /// Any 2D format the `image` crate decodes; converted to 16-bit luma.
    Planar(PathBuf),
    Raw(RawVolume),
}

/// Image source reading each view from its own file on every request.
#[derive(Clone, Debug, Default)]
pub struct FileImageSource {
    files: HashMap<ViewId, ImageFile>,
    sizes: HashMap<ViewId, Vec<usize>>,
}

impl FileImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a 2D image file. `size` is the expected (x, y) size if known.
    pub fn add_image(&mut self, view: ViewId, path: impl Into<PathBuf>, size: Option<Vec<usize>>) {
        self.files.insert(view, ImageFile::Planar(path.into()));
        if let Some(size) = size {
            self.sizes.insert(view, size);
        }
    }

    pub fn add_raw(&mut self, view: ViewId, volume: RawVolume) {
        self.sizes.insert(view, volume.size.clone());
        self.files.insert(view, ImageFile::Raw(volume));
    }

    fn load(&self, view: ViewId) -> Result<ArrayD<f32>> {
        let file = self.files.get(&view).ok_or_else(|| StitchError::ImageLoad {
            view,
            reason: "no file registered for this view".into(),
        })?;
        let loaded = match file {
            ImageFile::Planar(path) => load_planar(path),
            ImageFile::Raw(volume) => load_raw(volume),
        };
        loaded.map_err(|e| match e {
            StitchError::ImageLoad { .. } => e,
            other => StitchError::ImageLoad {
                view,
                reason: other.to_string(),
            },
        })
    }
}

impl ImageSource for FileImageSource {
    fn image(&self, view: ViewId, downsample: &[usize]) -> Result<ArrayD<f32>> {
        let data = self.load(view)?;
        debug!(%view, shape = ?data.shape(), "Loaded view");
        Ok(downsample_block_mean(&data, downsample))
    }

    fn size(&self, view: ViewId) -> Option<Vec<usize>> {
        self.sizes.get(&view).cloned()
    }
}

fn load_planar(path: &Path) -> Result<ArrayD<f32>> {
    let img = image::open(path)?;
    let gray = img.to_luma16();
    let (w, h) = gray.dimensions();
    let mut data = ArrayD::<f32>::zeros(IxDyn(&[w as usize, h as usize]));

    for (x, y, pixel) in gray.enumerate_pixels() {
        data[[x as usize, y as usize]] = pixel.0[0] as f32 / 65535.0;
    }

    Ok(data)
}

fn load_raw(volume: &RawVolume) -> Result<ArrayD<f32>> {
    let file = File::open(&volume.path)?;
    let mmap = unsafe { Mmap::map(&file)? };

    let count: usize = volume.size.iter().product();
    let bps = volume.pixel_type.bytes_per_sample();
    if mmap.len() < count * bps {
        return Err(StitchError::InvalidArgument(format!(
            "raw volume {} truncated: expected {} bytes, got {}",
            volume.path.display(),
            count * bps,
            mmap.len()
        )));
    }

    let samples: Vec<f32> = match volume.pixel_type {
        PixelType::U8 => mmap[..count].iter().map(|&b| b as f32 / 255.0).collect(),
        PixelType::U16 => mmap[..count * 2]
            .chunks_exact(2)
            .map(|c| LittleEndian::read_u16(c) as f32 / 65535.0)
            .collect(),
        PixelType::F32 => mmap[..count * 4]
            .chunks_exact(4)
            .map(LittleEndian::read_f32)
            .collect(),
    };

    // x is the fastest axis on disk, so build the array with reversed axes.
    let reversed: Vec<usize> = volume.size.iter().rev().copied().collect();
    let data = ArrayD::from_shape_vec(IxDyn(&reversed), samples)
        .map_err(|e| StitchError::InvalidArgument(e.to_string()))?;
    Ok(data.reversed_axes())
}
