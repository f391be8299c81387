pub mod file;
pub mod manifest;
pub mod source;

pub use file::{FileImageSource, PixelType, RawVolume};
pub use manifest::{registration_entries, DatasetManifest, ImageEntry, RegistrationEntry};
pub use source::{downsample_block_mean, ImageSource, InMemoryImageSource};
