//! Mask post-processing
//!
//! - Refinement of predicted masks across low-energy time regions
//! - Application of masks to mixture spectrograms and resynthesis

pub mod apply;
pub mod refine;

pub use apply::{apply_mask, complement, reconstruct};
pub use refine::{find_low_energy_runs, refine, refine_in_place};
