//! Array contracts of the separation network
//!
//! The network itself lives elsewhere; these helpers give it the cropping
//! and band-splitting arithmetic it needs on `[batch, channel, freq, time]`
//! tensors.

pub mod bands;
pub mod crop;

pub use bands::{split_bands, stereo_difference, trim_offset, MULTIBAND_OFFSET};
pub use crop::{reconcile, CropMode};
