#![allow(dead_code)]

use std::sync::Arc;

use ndarray::{ArrayD, IxDyn};
use tilestitch_core::io::InMemoryImageSource;
use tilestitch_core::view::{
    AttributeValue, SpimDataset, ViewDescription, ViewId, ViewRegistration, ViewRegistrations,
    ViewSetup,
};

/// Deterministic white noise in `[0, 1]` at integer position `(x, y)`.
pub fn hash_noise(x: i64, y: i64) -> f32 {
    let mut h = (x as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (y as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    h ^= h >> 29;
    h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h ^= h >> 32;
    (h & 0xFFFF) as f32 / 65535.0
}

/// Crop of the noise plane starting at `origin`, axis 0 = x.
pub fn noise_tile(origin: [i64; 2], size: [usize; 2], gain: f32, offset: f32) -> ArrayD<f32> {
    let mut data = ArrayD::<f32>::zeros(IxDyn(&size));
    for x in 0..size[0] {
        for y in 0..size[1] {
            data[[x, y]] = gain * hash_noise(origin[0] + x as i64, origin[1] + y as i64) + offset;
        }
    }
    data
}

pub fn setup(id: u32, channel: u32, tile: u32, size: &[usize]) -> Arc<ViewSetup> {
    Arc::new(ViewSetup {
        id,
        channel: AttributeValue::new(channel),
        illumination: AttributeValue::new(0),
        angle: AttributeValue::new(0),
        tile: AttributeValue::new(tile),
        size: size.to_vec(),
    })
}

/// One view per (timepoint, channel, tile), setups numbered tile-major.
pub fn attribute_grid(timepoints: u32, channels: u32, tiles: u32) -> Vec<ViewDescription> {
    let mut views = Vec::new();
    for tp in 0..timepoints {
        for tile in 0..tiles {
            for channel in 0..channels {
                let id = tile * channels + channel;
                views.push(ViewDescription::new(
                    AttributeValue::new(tp),
                    setup(id, channel, tile, &[16, 16]),
                ));
            }
        }
    }
    views
}

/// Synthetic tile scan cut out of one noise plane.
pub struct TileGrid {
    pub dataset: SpimDataset,
    pub source: InMemoryImageSource,
    /// True position of every tile, indexed by tile.
    pub origins: Vec<[i64; 2]>,
    pub channels: u32,
}

impl TileGrid {
    pub fn view(&self, tile: u32, channel: u32) -> ViewId {
        ViewId::new(0, tile * self.channels + channel)
    }
}

/// `cols` x `rows` tiles of `size` pixels at `spacing`, two channels each.
///
/// Channel 1 is a scaled and offset copy of channel 0. Registrations hold the
/// true origin perturbed by up to two pixels, except for tile 0.
pub fn tile_grid(cols: u32, rows: u32, size: usize, spacing: i64) -> TileGrid {
    let channels = 2;
    let mut views = Vec::new();
    let mut registrations = ViewRegistrations::new();
    let mut source = InMemoryImageSource::new();
    let mut origins = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            let tile = row * cols + col;
            let origin = [col as i64 * spacing, row as i64 * spacing];
            origins.push(origin);
            let jitter = if tile == 0 {
                [0.0, 0.0]
            } else {
                [((tile * 7) % 5) as f64 - 2.0, ((tile * 3) % 5) as f64 - 2.0]
            };

            for channel in 0..channels {
                let id = tile * channels + channel;
                let view = ViewDescription::new(AttributeValue::new(0), setup(id, channel, tile, &[size, size]));
                let (gain, offset) = if channel == 0 { (1.0, 0.0) } else { (0.5, 0.2) };
                source.insert(view.id(), noise_tile(origin, [size, size], gain, offset));
                registrations.insert(
                    view.id(),
                    ViewRegistration::from_translation(&[
                        origin[0] as f64 + jitter[0],
                        origin[1] as f64 + jitter[1],
                        0.0,
                    ]),
                );
                views.push(view);
            }
        }
    }

    TileGrid {
        dataset: SpimDataset::new(views, registrations),
        source,
        origins,
        channels,
    }
}
