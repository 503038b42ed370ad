//! Waveform and spectrogram preprocessing
//!
//! This module contains the steps that turn a decoded mixture/instrument
//! recording pair into training material:
//! - Channel mixing (stereo to mono previews)
//! - Leading/trailing silence trimming
//! - Cross-correlation alignment
//! - Joint peak normalization of the resulting spectrograms

pub mod alignment;
pub mod channel_mixer;
pub mod normalization;
pub mod silence;
