//! Memoized mixture/instrument spectrogram pairs
//!
//! The first request for a pair decodes both recordings, trims silence,
//! aligns them, computes magnitude spectrograms and stores the raw arrays.
//! Later requests read the stored arrays back. Either way the caller gets the
//! jointly normalized [`SpectrogramPair`].
//!
//! Stored arrays are trusted as-is: the sample rate and hop length they were
//! built with are not recorded or compared. After changing audio files or
//! preparation parameters, delete the `.npy` files next to the audio by hand.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use stratum_sep::cache::SpectrogramCache;
//!
//! let cache = SpectrogramCache::on_disk();
//! let pair = cache.load_or_compute(
//!     Path::new("dataset/mixtures/song01.wav"),
//!     Path::new("dataset/instruments/song01.wav"),
//!     44100,
//!     1024,
//! )?;
//! println!("{:?}, coefficient {}", pair.shape(), pair.coefficient);
//! # Ok::<(), stratum_sep::SeparationError>(())
//! ```

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::error::{Result, SeparationError};
use crate::io::decoder::{AudioDecoder, SymphoniaDecoder};
use crate::io::storage::{cache_key, FileStore, SpectrogramStore};
use crate::preprocessing::alignment::align;
use crate::preprocessing::normalization::SpectrogramPair;
use crate::preprocessing::silence::{trim_silence, SilenceTrimmer};
use crate::spectral::{analyze, Magnitude};
use crate::Waveform;

/// Build raw (un-normalized) magnitudes from two decoded recordings
///
/// Trims silence from each independently, aligns them, and runs the STFT
/// without keeping phase.
pub fn compute_raw_pair(
    mixture: &Waveform,
    instrument: &Waveform,
    sample_rate: u32,
    hop_length: usize,
    trimmer: &SilenceTrimmer,
) -> Result<(Magnitude, Magnitude)> {
    let (mixture, mixture_range) = trim_silence(mixture, trimmer)?;
    let (instrument, instrument_range) = trim_silence(instrument, trimmer)?;
    log::debug!(
        "Trimmed mixture to {:?}, instrument to {:?}",
        mixture_range,
        instrument_range
    );

    let (mixture, instrument) = align(&mixture, &instrument, sample_rate)?;

    let mixture = analyze(&mixture, hop_length)?;
    let instrument = analyze(&instrument, hop_length)?;
    Ok((mixture, instrument))
}

/// Spectrogram cache over a pluggable decoder and store
#[derive(Debug)]
pub struct SpectrogramCache<D = SymphoniaDecoder, S = FileStore> {
    decoder: D,
    store: S,
    silence: SilenceTrimmer,
}

impl SpectrogramCache<SymphoniaDecoder, FileStore> {
    /// Cache writing `.npy` files beside the audio, decoding with Symphonia
    pub fn on_disk() -> Self {
        Self::new(SymphoniaDecoder, FileStore)
    }
}

impl<D: AudioDecoder, S: SpectrogramStore> SpectrogramCache<D, S> {
    /// Create a cache from a decoder and a store
    pub fn new(decoder: D, store: S) -> Self {
        Self {
            decoder,
            store,
            silence: SilenceTrimmer::default(),
        }
    }

    /// Replace the silence trimming parameters
    pub fn with_silence(mut self, silence: SilenceTrimmer) -> Self {
        self.silence = silence;
        self
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load a normalized pair from the store, computing and storing it first if needed
    ///
    /// # Arguments
    ///
    /// * `mixture_path` - Mixture recording
    /// * `instrument_path` - Isolated instrument recording of the same piece
    /// * `sample_rate` - Rate to decode at
    /// * `hop_length` - STFT hop length (`n_fft = 2 * (hop_length - 1)`)
    ///
    /// # Errors
    ///
    /// - `DecodingError` if either recording cannot be decoded
    /// - `Io` if a stored array cannot be read or a new one cannot be written
    /// - `InvalidInput` if both paths map to the same cache entry, or for
    ///   audio too short to use
    /// - `NumericalError` for audio too silent to normalize
    pub fn load_or_compute(
        &self,
        mixture_path: &Path,
        instrument_path: &Path,
        sample_rate: u32,
        hop_length: usize,
    ) -> Result<SpectrogramPair> {
        let mixture_key = cache_key(mixture_path);
        let instrument_key = cache_key(instrument_path);
        if mixture_key == instrument_key {
            return Err(SeparationError::InvalidInput(format!(
                "{} and {} share the cache entry {}",
                mixture_path.display(),
                instrument_path.display(),
                mixture_key.display()
            )));
        }

        let cached = if self.store.contains(&mixture_key) && self.store.contains(&instrument_key)
        {
            match (
                self.store.get(&mixture_key)?,
                self.store.get(&instrument_key)?,
            ) {
                (Some(mixture), Some(instrument)) => Some((mixture, instrument)),
                // Removed between the existence check and the read
                _ => None,
            }
        } else {
            None
        };

        let (mixture, instrument) = match cached {
            Some(pair) => {
                log::debug!("Cache hit for {}", mixture_path.display());
                pair
            }
            None => {
                log::debug!("Cache miss for {}, computing", mixture_path.display());
                let (mixture, instrument) =
                    self.compute(mixture_path, instrument_path, sample_rate, hop_length)?;
                self.persist(&mixture_key, &mixture, &instrument_key, &instrument)?;
                (mixture, instrument)
            }
        };

        SpectrogramPair::normalized(mixture, instrument)
    }

    /// Run [`load_or_compute`](Self::load_or_compute) for many pairs on the rayon pool
    ///
    /// Results come back in input order. Pairs must be distinct: two workers
    /// on the same pair would both compute it and the last write wins.
    pub fn load_many(
        &self,
        pairs: &[(PathBuf, PathBuf)],
        sample_rate: u32,
        hop_length: usize,
    ) -> Vec<Result<SpectrogramPair>> {
        log::debug!("Loading {} spectrogram pairs in parallel", pairs.len());
        pairs
            .par_iter()
            .map(|(mixture, instrument)| {
                self.load_or_compute(mixture, instrument, sample_rate, hop_length)
            })
            .collect()
    }

    fn compute(
        &self,
        mixture_path: &Path,
        instrument_path: &Path,
        sample_rate: u32,
        hop_length: usize,
    ) -> Result<(Magnitude, Magnitude)> {
        let (mixture, _) = self.decoder.decode(mixture_path, sample_rate)?;
        let (instrument, _) = self.decoder.decode(instrument_path, sample_rate)?;
        compute_raw_pair(
            &mixture,
            &instrument,
            sample_rate,
            hop_length,
            &self.silence,
        )
    }

    /// Store both arrays; a pair is only complete when both entries exist
    fn persist(
        &self,
        mixture_key: &Path,
        mixture: &Magnitude,
        instrument_key: &Path,
        instrument: &Magnitude,
    ) -> Result<()> {
        self.store.put(mixture_key, mixture)?;
        if let Err(e) = self.store.put(instrument_key, instrument) {
            if let Err(cleanup) = self.store.remove(mixture_key) {
                log::warn!(
                    "Could not remove orphaned cache entry {}: {}",
                    mixture_key.display(),
                    cleanup
                );
            }
            return Err(e);
        }
        Ok(())
    }
}
