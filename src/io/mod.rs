//! Audio and array I/O
//!
//! Audio decoding (Symphonia + rubato), `.npy` array persistence, and the
//! storage backends used by the spectrogram cache.

pub mod decoder;
pub mod npy;
pub mod storage;

pub use decoder::{AudioDecoder, SymphoniaDecoder};
pub use storage::{cache_key, FileStore, MemoryStore, SpectrogramStore};
